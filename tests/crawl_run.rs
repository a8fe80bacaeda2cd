//! End-to-end tests for the crawl driver against a mock profile host

use std::path::PathBuf;
use std::time::Duration;

use brand_harvest::{run_crawl, CrawlConfig, SubjectSource};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, output: &TempDir, names: &[&str]) -> CrawlConfig {
    CrawlConfig {
        subjects: SubjectSource {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        },
        output_dir: output.path().join("downloads"),
        report_dir: output.path().join("reports"),
        profile_url_template: format!("{}/{{handle}}/", server.uri()),
        min_delay: Duration::ZERO,
        delay_jitter: Duration::ZERO,
        timeout_seconds: 5,
        download_timeout_seconds: 5,
        retry_attempts: 1,
        ..Default::default()
    }
}

fn profile_page(server: &MockServer) -> String {
    format!(
        r#"<html><head>
<meta property="og:image" content="{}/media/blue-fox-linen-dress.jpg">
<meta property="og:description" content="Slow fashion from Lisbon">
</head><body></body></html>"#,
        server.uri()
    )
}

#[tokio::test]
async fn test_crawl_tries_handle_candidates_and_saves_profile_and_media() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bluefox/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blue_fox/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(profile_page(&server)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blue-fox/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/blue-fox-linen-dress.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8\xFFdress".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let result = run_crawl(config(&server, &output, &["Blue Fox"]), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.report.attempted, 1);
    assert_eq!(result.report.succeeded, 1);
    assert_eq!(result.report.failed, 0);
    assert!(result.failures_path.is_none());

    let subject_dir = output.path().join("downloads/Blue Fox");
    let profile: serde_json::Value =
        serde_json::from_slice(&std::fs::read(subject_dir.join("profile.json")).unwrap()).unwrap();
    assert_eq!(profile["subject"], "Blue Fox");
    assert_eq!(profile["handle"], "blue_fox");
    assert_eq!(profile["strategy"], "meta_tags");
    assert_eq!(profile["record"]["completeness"], "complete");
    assert_eq!(
        profile["record"]["metadata_fields"]["description"],
        "Slow fashion from Lisbon"
    );
    assert_eq!(
        std::fs::read(subject_dir.join("images/image_001.jpg")).unwrap(),
        b"\xFF\xD8\xFFdress"
    );
}

#[tokio::test]
async fn test_unreachable_subject_is_recorded_and_run_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/linenco/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Nothing to see</p></body></html>"),
        )
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let result = run_crawl(
        config(&server, &output, &["ACME", "LinenCo"]),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.report.attempted, 2);
    assert_eq!(result.report.failed, 1);
    assert_eq!(result.report.empty, 1);
    assert_eq!(result.report.succeeded, 0);
    let failure = &result.report.failures[0];
    assert_eq!(failure.subject, "ACME");
    assert_eq!(failure.category, "profile");
    assert_eq!(failure.error_message, "HTTP 404");
    assert!(!output.path().join("downloads/LinenCo/profile.json").exists());

    let export: PathBuf = result.failures_path.expect("failures exported");
    assert!(export.starts_with(output.path().join("reports")));
    let text = std::fs::read_to_string(export).unwrap();
    assert!(text.lines().nth(1).unwrap().contains("ACME"));
}

#[tokio::test]
async fn test_existing_media_is_not_downloaded_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(profile_page(&server)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/blue-fox-linen-dress.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    for _ in 0..2 {
        let result = run_crawl(config(&server, &output, &["ACME"]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.report.succeeded, 1);
    }
}

#[tokio::test]
async fn test_cancelled_crawl_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let output = TempDir::new().unwrap();
    let result = run_crawl(config(&server, &output, &["ACME", "LinenCo"]), cancel)
        .await
        .unwrap();

    assert!(result.report.interrupted);
    assert_eq!(result.report.attempted, 0);
}

#[tokio::test]
async fn test_missing_subjects_file_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = config(&server, &output, &[]);
    config.subjects.file = Some(output.path().join("no-such-brands.txt"));

    let error = run_crawl(config, CancellationToken::new())
        .await
        .expect_err("unreadable subjects file is a precondition failure");
    assert!(format!("{:#}", error).contains("no-such-brands.txt"));
}

#[tokio::test]
async fn test_subject_name_cannot_leave_the_output_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/escaped/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(profile_page(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut config = config(&server, &output, &["../escaped"]);
    config.download_media = false;
    let result = run_crawl(config, CancellationToken::new()).await.unwrap();

    assert_eq!(result.report.succeeded, 1);
    assert!(!output.path().join("escaped").exists());
    assert!(output
        .path()
        .join("downloads/..escaped/profile.json")
        .exists());
}

#[tokio::test]
async fn test_explicit_remote_handle_from_subjects_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme_official/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(profile_page(&server)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/acme/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let subjects_file = output.path().join("brands.json");
    std::fs::write(
        &subjects_file,
        r#"[{"displayName": "ACME", "remoteHandle": "acme_official"}]"#,
    )
    .unwrap();
    let mut config = config(&server, &output, &[]);
    config.subjects.file = Some(subjects_file);
    config.download_media = false;

    let result = run_crawl(config, CancellationToken::new()).await.unwrap();
    assert_eq!(result.report.succeeded, 1);

    let profile: serde_json::Value = serde_json::from_slice(
        &std::fs::read(output.path().join("downloads/ACME/profile.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(profile["handle"], "acme_official");
}
