//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and library configuration. The library structs (`CrawlConfig`,
//! `MigrateConfig`) carry no CLI dependencies and can be built directly.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::constants::{
    DEFAULT_DELAY_JITTER, DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_MEDIA_HOSTS,
    DEFAULT_MIN_REQUEST_DELAY, DEFAULT_PARALLEL_WORKERS, DEFAULT_PRODUCT_TABLE,
    DEFAULT_PROFILE_URL_TEMPLATE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    MAX_PARALLEL_WORKERS, RETRY_MAX_ATTEMPTS, UPLOAD_MAX_ATTEMPTS, UPLOAD_RETRY_DELAY_MS,
};
use crate::error_handling::PreconditionError;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Where subjects for a run come from.
///
/// Inline names and a subjects file are merged (inline first). When both are
/// empty, drivers fall back to what they can discover themselves (the
/// migrator uses the brand folders under its source directory).
#[derive(Debug, Clone, Default)]
pub struct SubjectSource {
    /// Inline subjects, each `Name` or `Name=handle`
    pub names: Vec<String>,
    /// File with a JSON array (names or `{displayName, remoteHandle,
    /// localPath}` objects), or one subject per line
    pub file: Option<PathBuf>,
    /// Maximum subjects to process (smoke testing)
    pub max_subjects: Option<usize>,
}

/// Storage backend selection for the migrator and the follow-up tools.
#[derive(Debug, Clone)]
pub enum SinkConfig {
    /// A local directory acting as the bucket
    Local {
        /// Bucket root directory
        root: PathBuf,
    },
    /// In-process sink; nothing survives the run
    Memory,
    /// Supabase-compatible REST object store
    Rest {
        /// Project base URL, e.g. `https://xyz.supabase.co`
        base_url: String,
        /// Service key sent as bearer token and `apikey`
        service_key: String,
        /// Bucket name
        bucket: String,
        /// Per-request timeout in seconds
        timeout_seconds: u64,
    },
}

/// Crawl driver configuration (no CLI dependencies).
///
/// # Examples
///
/// ```no_run
/// use brand_harvest::CrawlConfig;
/// use std::path::PathBuf;
///
/// let config = CrawlConfig {
///     output_dir: PathBuf::from("downloads"),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Subjects to crawl
    pub subjects: SubjectSource,
    /// Directory receiving one folder per subject
    pub output_dir: PathBuf,
    /// Directory receiving the failure export
    pub report_dir: PathBuf,
    /// Profile URL template containing `{handle}`
    pub profile_url_template: String,
    /// Minimum delay since the previous request completed
    pub min_delay: Duration,
    /// Random extra delay upper bound
    pub delay_jitter: Duration,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// Per-download timeout in seconds
    pub download_timeout_seconds: u64,
    /// Total attempts per request
    pub retry_attempts: usize,
    /// HTTP User-Agent header value
    pub user_agent: String,
    /// Session cookie for authenticated crawls
    pub session_cookie: Option<String>,
    /// Host allow-list for markup-scanned media
    pub media_hosts: Vec<String>,
    /// Download extracted media next to `profile.json`
    pub download_media: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            subjects: SubjectSource::default(),
            output_dir: PathBuf::from("downloads"),
            report_dir: PathBuf::from("."),
            profile_url_template: DEFAULT_PROFILE_URL_TEMPLATE.to_string(),
            min_delay: DEFAULT_MIN_REQUEST_DELAY,
            delay_jitter: DEFAULT_DELAY_JITTER,
            timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
            download_timeout_seconds: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            retry_attempts: RETRY_MAX_ATTEMPTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_cookie: None,
            media_hosts: DEFAULT_MEDIA_HOSTS.iter().map(|h| h.to_string()).collect(),
            download_media: true,
        }
    }
}

/// Migration driver configuration (no CLI dependencies).
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Brands to migrate (empty = every brand folder under `source_dir`)
    pub subjects: SubjectSource,
    /// Local content tree root
    pub source_dir: PathBuf,
    /// Storage backend
    pub sink: SinkConfig,
    /// Concurrent upload workers (1 = sequential)
    pub workers: usize,
    /// Total attempts per upload
    pub upload_attempts: usize,
    /// Fixed delay between upload attempts
    pub upload_retry_delay: Duration,
    /// Directory receiving the failure export
    pub report_dir: PathBuf,
    /// Failure export of an earlier run; narrows the plan to its keys
    pub retry_failures: Option<PathBuf>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            subjects: SubjectSource::default(),
            source_dir: PathBuf::from("downloads"),
            sink: SinkConfig::Local {
                root: PathBuf::from("bucket"),
            },
            workers: 1,
            upload_attempts: UPLOAD_MAX_ATTEMPTS,
            upload_retry_delay: Duration::from_millis(UPLOAD_RETRY_DELAY_MS),
            report_dir: PathBuf::from("."),
            retry_failures: None,
        }
    }
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Crawl two brands, one request every 3 seconds
/// brand_harvest crawl --subjects "ACME,Blue Fox" --min-delay-ms 3000
///
/// # Migrate a local tree into a REST bucket using 4 workers
/// brand_harvest migrate downloads --sink rest --parallel --workers 4
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "brand_harvest",
    about = "Crawls brand pages politely and migrates harvested media into storage."
)]
pub struct Opt {
    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch each subject's page, extract media and metadata, save to disk
    Crawl(CrawlArgs),
    /// Upload a local content tree into storage, skipping existing keys
    Migrate(MigrateArgs),
    /// Write an index.json manifest into every media folder in storage
    Index(IndexArgs),
    /// Insert one product row per product folder of a local tree
    Catalog(CatalogArgs),
}

/// Subject selection shared by all subcommands.
#[derive(Debug, Args)]
pub struct SubjectArgs {
    /// Comma-separated subjects, each `Name` or `Name=handle`
    #[arg(long, value_delimiter = ',')]
    pub subjects: Vec<String>,

    /// Subjects file (JSON array of names or objects, or one per line)
    #[arg(long)]
    pub subjects_file: Option<PathBuf>,

    /// Process at most this many subjects
    #[arg(long)]
    pub max_subjects: Option<usize>,
}

impl From<SubjectArgs> for SubjectSource {
    fn from(args: SubjectArgs) -> Self {
        SubjectSource {
            names: args.subjects,
            file: args.subjects_file,
            max_subjects: args.max_subjects,
        }
    }
}

/// Storage backend kind.
#[derive(Clone, Debug, ValueEnum)]
pub enum SinkKind {
    /// Local directory bucket
    Local,
    /// Supabase-compatible REST object store
    Rest,
}

/// Storage backend options shared by migrate/index/catalog.
#[derive(Debug, Args)]
pub struct StorageArgs {
    /// Storage backend: local|rest
    #[arg(long, value_enum, default_value_t = SinkKind::Local)]
    pub sink: SinkKind,

    /// Bucket directory for the local sink
    #[arg(long, default_value = "./bucket")]
    pub dest: PathBuf,

    /// REST storage base URL
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: Option<String>,

    /// REST storage service key
    #[arg(long, env = "STORAGE_SERVICE_KEY", hide_env_values = true)]
    pub storage_key: Option<String>,

    /// REST storage bucket name
    #[arg(long, env = "STORAGE_BUCKET", default_value = "media")]
    pub bucket: String,

    /// Per-request storage timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub storage_timeout_seconds: u64,
}

impl StorageArgs {
    /// Builds the sink configuration, failing when REST credentials are missing.
    pub fn into_sink_config(self) -> Result<SinkConfig, PreconditionError> {
        match self.sink {
            SinkKind::Local => Ok(SinkConfig::Local { root: self.dest }),
            SinkKind::Rest => {
                let base_url = self
                    .storage_url
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(PreconditionError::MissingCredential("STORAGE_URL"))?;
                let service_key = self
                    .storage_key
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(PreconditionError::MissingCredential("STORAGE_SERVICE_KEY"))?;
                Ok(SinkConfig::Rest {
                    base_url,
                    service_key,
                    bucket: self.bucket,
                    timeout_seconds: self.storage_timeout_seconds,
                })
            }
        }
    }
}

/// `crawl` options.
#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Subject selection
    #[command(flatten)]
    pub subjects: SubjectArgs,

    /// Output directory (one folder per subject)
    #[arg(long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Directory for the failure export
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,

    /// Profile URL template; `{handle}` is replaced by the subject handle
    #[arg(long, default_value = DEFAULT_PROFILE_URL_TEMPLATE)]
    pub url_template: String,

    /// Minimum delay between requests in milliseconds
    #[arg(long, default_value_t = DEFAULT_MIN_REQUEST_DELAY.as_millis() as u64)]
    pub min_delay_ms: u64,

    /// Random extra delay upper bound in milliseconds
    #[arg(long, default_value_t = DEFAULT_DELAY_JITTER.as_millis() as u64)]
    pub jitter_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_seconds: u64,

    /// Total attempts per request
    #[arg(long, default_value_t = RETRY_MAX_ATTEMPTS)]
    pub retry_attempts: usize,

    /// HTTP User-Agent header value
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Session cookie sent with every request (authenticated crawl)
    #[arg(long, env = "SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: Option<String>,

    /// Additional media host accepted by the markup scan (repeatable)
    #[arg(long = "media-host")]
    pub media_hosts: Vec<String>,

    /// Save profile.json only; do not download media
    #[arg(long)]
    pub skip_media: bool,
}

impl CrawlArgs {
    /// Converts CLI arguments into the library configuration.
    pub fn into_config(self) -> CrawlConfig {
        let mut media_hosts: Vec<String> =
            DEFAULT_MEDIA_HOSTS.iter().map(|h| h.to_string()).collect();
        media_hosts.extend(self.media_hosts);
        CrawlConfig {
            subjects: self.subjects.into(),
            output_dir: self.output_dir,
            report_dir: self.report_dir,
            profile_url_template: self.url_template,
            min_delay: Duration::from_millis(self.min_delay_ms),
            delay_jitter: Duration::from_millis(self.jitter_ms),
            timeout_seconds: self.timeout_seconds,
            retry_attempts: self.retry_attempts.max(1),
            user_agent: self.user_agent,
            session_cookie: self.session_cookie.filter(|c| !c.trim().is_empty()),
            media_hosts,
            download_media: !self.skip_media,
            ..Default::default()
        }
    }
}

/// `migrate` options.
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Local content tree (brand/… or brand/product/…)
    #[arg(value_parser, default_value = "downloads")]
    pub source_dir: PathBuf,

    /// Subject selection
    #[command(flatten)]
    pub subjects: SubjectArgs,

    /// Storage backend
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Upload with a bounded worker pool
    #[arg(long)]
    pub parallel: bool,

    /// Worker count in parallel mode (clamped to 1..=5)
    #[arg(long, default_value_t = DEFAULT_PARALLEL_WORKERS)]
    pub workers: usize,

    /// Total attempts per upload
    #[arg(long, default_value_t = UPLOAD_MAX_ATTEMPTS)]
    pub upload_attempts: usize,

    /// Delay between upload attempts in milliseconds
    #[arg(long, default_value_t = UPLOAD_RETRY_DELAY_MS)]
    pub upload_retry_delay_ms: u64,

    /// Directory for the failure export
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,

    /// Re-drive only the keys listed in an earlier failure export
    #[arg(long)]
    pub retry_failures: Option<PathBuf>,
}

impl MigrateArgs {
    /// Converts CLI arguments into the library configuration.
    pub fn into_config(self) -> Result<MigrateConfig, PreconditionError> {
        let workers = if self.parallel {
            self.workers.clamp(1, MAX_PARALLEL_WORKERS)
        } else {
            1
        };
        Ok(MigrateConfig {
            subjects: self.subjects.into(),
            source_dir: self.source_dir,
            sink: self.storage.into_sink_config()?,
            workers,
            upload_attempts: self.upload_attempts.max(1),
            upload_retry_delay: Duration::from_millis(self.upload_retry_delay_ms),
            report_dir: self.report_dir,
            retry_failures: self.retry_failures,
        })
    }
}

/// `index` options.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Subject selection
    #[command(flatten)]
    pub subjects: SubjectArgs,

    /// Storage backend
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Directory for the failure export
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,
}

/// `catalog` options.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Local content tree (brand/product/…)
    #[arg(value_parser, default_value = "downloads")]
    pub source_dir: PathBuf,

    /// Subject selection
    #[command(flatten)]
    pub subjects: SubjectArgs,

    /// Storage backend
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Destination table
    #[arg(long, default_value = DEFAULT_PRODUCT_TABLE)]
    pub table: String,

    /// Directory for the failure export
    #[arg(long, default_value = ".")]
    pub report_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Warn),
            log::LevelFilter::Warn
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Debug),
            log::LevelFilter::Debug
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_crawl_config_default() {
        let config = CrawlConfig::default();
        assert_eq!(config.min_delay, DEFAULT_MIN_REQUEST_DELAY);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.download_media);
        assert!(config.session_cookie.is_none());
        assert!(config.profile_url_template.contains("{handle}"));
    }

    #[test]
    fn test_migrate_config_default_is_sequential() {
        let config = MigrateConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.upload_attempts, 3);
        assert_eq!(config.upload_retry_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_cli_parses_migrate_parallel() {
        let opt = Opt::try_parse_from([
            "brand_harvest",
            "migrate",
            "tree",
            "--parallel",
            "--workers",
            "9",
            "--subjects",
            "ACME,Blue Fox",
        ])
        .expect("valid args");
        let Command::Migrate(args) = opt.command else {
            panic!("expected migrate subcommand");
        };
        let config = args.into_config().expect("local sink needs no credentials");
        assert_eq!(config.workers, MAX_PARALLEL_WORKERS);
        assert_eq!(config.source_dir, PathBuf::from("tree"));
        assert_eq!(config.subjects.names, vec!["ACME", "Blue Fox"]);
    }

    #[test]
    fn test_cli_migrate_without_parallel_ignores_workers() {
        let opt = Opt::try_parse_from(["brand_harvest", "migrate", "--workers", "4"])
            .expect("valid args");
        let Command::Migrate(args) = opt.command else {
            panic!("expected migrate subcommand");
        };
        assert_eq!(args.into_config().expect("config").workers, 1);
    }

    #[test]
    fn test_rest_sink_requires_credentials() {
        let args = StorageArgs {
            sink: SinkKind::Rest,
            dest: PathBuf::from("unused"),
            storage_url: Some("https://example.supabase.co".into()),
            storage_key: None,
            bucket: "media".into(),
            storage_timeout_seconds: 10,
        };
        let err = args.into_sink_config().unwrap_err();
        assert!(matches!(
            err,
            PreconditionError::MissingCredential("STORAGE_SERVICE_KEY")
        ));
    }

    #[test]
    fn test_crawl_args_extend_media_hosts() {
        let opt = Opt::try_parse_from([
            "brand_harvest",
            "crawl",
            "--media-host",
            "images.example.com",
            "--skip-media",
        ])
        .expect("valid args");
        let Command::Crawl(args) = opt.command else {
            panic!("expected crawl subcommand");
        };
        let config = args.into_config();
        assert!(config.media_hosts.iter().any(|h| h == "cdn.shopify.com"));
        assert!(config.media_hosts.iter().any(|h| h == "images.example.com"));
        assert!(!config.download_media);
    }
}
