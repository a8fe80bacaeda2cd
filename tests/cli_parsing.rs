//! Tests for CLI subcommand parsing and conversion into library configs.

use std::path::PathBuf;
use std::time::Duration;

use brand_harvest::config::{Command, Opt, DEFAULT_MEDIA_HOSTS};
use brand_harvest::{LogFormat, PreconditionError, SinkConfig};
use clap::Parser;

#[test]
fn test_crawl_defaults_and_overrides() {
    let opt = Opt::try_parse_from([
        "brand_harvest",
        "--log-format",
        "json",
        "crawl",
        "--subjects",
        "ACME,Blue Fox",
        "--min-delay-ms",
        "3500",
        "--media-host",
        "images.example-cdn.net",
        "--skip-media",
    ])
    .expect("valid crawl args");
    assert!(matches!(opt.log_format, LogFormat::Json));

    let Command::Crawl(args) = opt.command else {
        panic!("expected crawl subcommand");
    };
    let config = args.into_config();
    assert_eq!(config.subjects.names, ["ACME", "Blue Fox"]);
    assert_eq!(config.min_delay, Duration::from_millis(3500));
    assert_eq!(config.output_dir, PathBuf::from("downloads"));
    assert!(!config.download_media);
    assert_eq!(config.media_hosts.len(), DEFAULT_MEDIA_HOSTS.len() + 1);
    assert!(config
        .media_hosts
        .contains(&"images.example-cdn.net".to_string()));
}

#[test]
fn test_migrate_is_sequential_unless_parallel() {
    let opt = Opt::try_parse_from(["brand_harvest", "migrate", "--workers", "4"]).unwrap();
    let Command::Migrate(args) = opt.command else {
        panic!("expected migrate subcommand");
    };
    let config = args.into_config().unwrap();
    assert_eq!(config.workers, 1);
    assert_eq!(config.source_dir, PathBuf::from("downloads"));
    assert!(matches!(config.sink, SinkConfig::Local { .. }));
}

#[test]
fn test_rest_sink_without_credentials_is_rejected() {
    let opt = Opt::try_parse_from([
        "brand_harvest",
        "index",
        "--sink",
        "rest",
        "--storage-url",
        "https://project.supabase.co",
        "--storage-key",
        "",
    ])
    .unwrap();
    let Command::Index(args) = opt.command else {
        panic!("expected index subcommand");
    };
    let error = args.storage.into_sink_config().unwrap_err();
    assert!(matches!(
        error,
        PreconditionError::MissingCredential("STORAGE_SERVICE_KEY")
    ));
}

#[test]
fn test_catalog_table_and_rest_config() {
    let opt = Opt::try_parse_from([
        "brand_harvest",
        "catalog",
        "tree",
        "--table",
        "brand_products",
        "--sink",
        "rest",
        "--storage-url",
        "https://project.supabase.co",
        "--storage-key",
        "secret",
        "--bucket",
        "brand-media",
    ])
    .unwrap();
    let Command::Catalog(args) = opt.command else {
        panic!("expected catalog subcommand");
    };
    assert_eq!(args.table, "brand_products");
    assert_eq!(args.source_dir, PathBuf::from("tree"));
    match args.storage.into_sink_config().unwrap() {
        SinkConfig::Rest {
            base_url, bucket, ..
        } => {
            assert_eq!(base_url, "https://project.supabase.co");
            assert_eq!(bucket, "brand-media");
        }
        other => panic!("expected REST sink, got {:?}", other),
    }
}

#[test]
fn test_unknown_subcommand_is_an_error() {
    assert!(Opt::try_parse_from(["brand_harvest", "scan", "urls.txt"]).is_err());
}
