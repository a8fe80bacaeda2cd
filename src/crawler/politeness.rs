//! Minimum-delay clock shared by every clone of a crawler.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

/// Enforces a minimum delay between the completion of one request and the
/// start of the next.
///
/// The clock is a single lock-protected timestamp. Cloning shares it, so
/// parallel workers crawling the same host queue behind one another instead
/// of each keeping their own delay.
#[derive(Clone, Debug)]
pub struct PolitenessClock {
    last_completed: Arc<Mutex<Option<Instant>>>,
    min_delay: Duration,
    jitter: Duration,
}

/// Exclusive right to issue one request.
///
/// Dropping the turn records the completion time, so the next caller's wait
/// is measured from the end of this request, including retries that bail out
/// early through `?`.
#[derive(Debug)]
pub struct PoliteTurn {
    last_completed: OwnedMutexGuard<Option<Instant>>,
}

impl PolitenessClock {
    /// Creates a clock with no random jitter.
    pub fn new(min_delay: Duration) -> Self {
        Self::with_jitter(min_delay, Duration::ZERO)
    }

    /// Creates a clock that adds a random extra delay in `0..=jitter` to every wait.
    pub fn with_jitter(min_delay: Duration, jitter: Duration) -> Self {
        PolitenessClock {
            last_completed: Arc::new(Mutex::new(None)),
            min_delay,
            jitter,
        }
    }

    /// Configured minimum delay.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Waits until the minimum delay since the previous request has elapsed,
    /// then returns the turn. The first request never waits.
    pub async fn wait_turn(&self) -> PoliteTurn {
        let guard = Arc::clone(&self.last_completed).lock_owned().await;
        if let Some(last) = *guard {
            let ready_at = last + self.min_delay + self.sample_jitter();
            if ready_at > Instant::now() {
                log::trace!(
                    "Politeness delay: sleeping {:?}",
                    ready_at.saturating_duration_since(Instant::now())
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        PoliteTurn {
            last_completed: guard,
        }
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Drop for PoliteTurn {
    fn drop(&mut self) {
        *self.last_completed = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_turn_does_not_wait() {
        let clock = PolitenessClock::new(Duration::from_secs(30));
        let started = Instant::now();
        drop(clock.wait_turn().await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_second_turn_waits_min_delay_after_completion() {
        let delay = Duration::from_millis(120);
        let clock = PolitenessClock::new(delay);

        drop(clock.wait_turn().await);
        let completed = Instant::now();
        drop(clock.wait_turn().await);

        assert!(completed.elapsed() >= delay - Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_clones_share_one_timestamp() {
        let delay = Duration::from_millis(100);
        let clock = PolitenessClock::new(delay);
        let other = clock.clone();

        drop(clock.wait_turn().await);
        let completed = Instant::now();
        drop(other.wait_turn().await);

        assert!(completed.elapsed() >= delay - Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_jitter_stays_within_bound() {
        let clock = PolitenessClock::with_jitter(Duration::ZERO, Duration::from_millis(50));
        for _ in 0..20 {
            assert!(clock.sample_jitter() <= Duration::from_millis(50));
        }
    }
}
