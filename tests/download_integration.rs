//! Integration tests for the download module.
//!
//! These tests verify document fetching with mock HTTP servers.

use std::io::Read;

use giro_directory::download::{DownloadError, HttpClient};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a mock server with a file endpoint.
async fn setup_mock_file(path_str: &str, template: ResponseTemplate) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(template)
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_fetch_preserves_content() {
    let content = b"%PDF-1.4\nThis is the complete document.\n%%EOF\n";
    let server = setup_mock_file(
        "/files/EHT_20240301.pdf",
        ResponseTemplate::new(200).set_body_bytes(content.to_vec()),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let url = format!("{}/files/EHT_20240301.pdf", server.uri());
    let mut document = client
        .fetch(&url, &CancellationToken::new())
        .await
        .expect("fetch should succeed");

    assert_eq!(document.status, 200);
    assert_eq!(document.url, url);
    assert!(document.filename.is_none());
    assert!(!document.body.is_spilled());

    let mut downloaded = Vec::new();
    document.body.read_to_end(&mut downloaded).expect("read body");
    assert_eq!(downloaded, content);
}

#[tokio::test]
async fn test_fetch_large_body_spills_to_disk() {
    let content = vec![b'x'; 3 * 1024 * 1024];
    let server = setup_mock_file(
        "/files/big.xlsx",
        ResponseTemplate::new(200).set_body_bytes(content.clone()),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let mut document = client
        .fetch(
            &format!("{}/files/big.xlsx", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch should succeed");

    assert!(document.body.is_spilled());
    assert_eq!(document.body.len(), content.len() as u64);
    let mut downloaded = Vec::new();
    document.body.read_to_end(&mut downloaded).expect("read body");
    assert_eq!(downloaded.len(), content.len());
}

#[tokio::test]
async fn test_fetch_reports_content_disposition_filename() {
    let server = setup_mock_file(
        "/api/download",
        ResponseTemplate::new(200)
            .insert_header(
                "Content-Disposition",
                r#"attachment; filename="EHT_20240301.xlsx""#,
            )
            .set_body_bytes(b"PK\x03\x04".to_vec()),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let document = client
        .fetch(
            &format!("{}/api/download", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch should succeed");

    assert_eq!(document.filename.as_deref(), Some("EHT_20240301.xlsx"));
}

#[tokio::test]
async fn test_fetch_reports_extended_filename() {
    let server = setup_mock_file(
        "/api/download",
        ResponseTemplate::new(200)
            .insert_header(
                "Content-Disposition",
                "attachment; filename=fallback.pdf; filename*=UTF-8''bankfi%C3%B3kok.pdf",
            )
            .set_body_bytes(b"%PDF-1.4".to_vec()),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let document = client
        .fetch(
            &format!("{}/api/download", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch should succeed");

    assert_eq!(document.filename.as_deref(), Some("bankfiókok.pdf"));
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/documents/7"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/files/EHT_20240301.xlsx"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/EHT_20240301.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
        .mount(&server)
        .await;

    let client = HttpClient::new().expect("client");
    let document = client
        .fetch(
            &format!("{}/documents/7", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch should succeed");

    assert!(document.url.ends_with("/files/EHT_20240301.xlsx"));
    assert_eq!(document.body.len(), 2);
}

#[tokio::test]
async fn test_fetch_non_success_status_still_returns_body() {
    let server = setup_mock_file(
        "/not-found",
        ResponseTemplate::new(404).set_body_string("nincs ilyen"),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let document = client
        .fetch(
            &format!("{}/not-found", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("status is reported, not raised");

    assert_eq!(document.status, 404);
    assert_eq!(document.body.len(), "nincs ilyen".len() as u64);
}

#[tokio::test]
async fn test_probe_redirect_does_not_follow() {
    let server = setup_mock_file(
        "/documents/1",
        ResponseTemplate::new(302).insert_header("Location", "/files/EHT_20240301.pdf"),
    )
    .await;

    let client = HttpClient::new().expect("client");
    let probe = client
        .probe_redirect(
            &format!("{}/documents/1", server.uri()),
            &CancellationToken::new(),
        )
        .await
        .expect("probe should succeed");

    assert_eq!(probe.status, 302);
    assert_eq!(probe.location.as_deref(), Some("/files/EHT_20240301.pdf"));
}

#[tokio::test]
async fn test_fetch_connection_refused_is_network_error() {
    let client = HttpClient::new().expect("client");
    let err = client
        .fetch("http://127.0.0.1:1/file.pdf", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Network { .. }), "got {err:?}");
    assert!(err.is_transient());
}
