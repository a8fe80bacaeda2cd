//! Graceful shutdown handling.

use log::warn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `cancel` on the first Ctrl-C.
///
/// Units already in flight finish; no new unit starts after the signal.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        warn!("Interrupt received; finishing in-flight work and stopping");
                        cancel.cancel();
                    }
                    Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
            _ = cancel.cancelled() => {}
        }
    })
}

/// Stops the signal listener once the run is over.
pub async fn shutdown_gracefully(signal_task: Option<JoinHandle<()>>) {
    if let Some(task) = signal_task {
        task.abort();
        let _ = task.await;
    }
}
