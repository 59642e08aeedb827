//! REST-level tests for the GitHub client against a local mock server.

use std::io::Write;

use nightwatch_github::{CodeHost, GithubClient, HostError, PullRequestSpec};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::FileOptions;
use zip::ZipWriter;

fn logs_archive() -> Vec<u8> {
    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("test/1_pytest.txt", FileOptions::default())
        .unwrap();
    writer
        .write_all(b"FAILED tests/test_x.py - TypeError")
        .unwrap();
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn downloads_and_extracts_run_logs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/x/actions/runs/1001/logs"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(logs_archive()))
        .mount(&server)
        .await;

    let client = GithubClient::new("test-token").with_api_base(server.uri());
    let logs = client.download_run_logs("acme/x", 1001).await.unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].job, "test");
    assert!(logs[0].text.contains("TypeError"));
}

#[tokio::test]
async fn creates_pull_request_and_returns_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/x/pulls"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "html_url": "https://github.test/acme/x/pull/7"
        })))
        .mount(&server)
        .await;

    let client = GithubClient::new("test-token").with_api_base(server.uri());
    let url = client
        .create_pull_request(
            "acme/x",
            &PullRequestSpec {
                title: "Fix TypeError in src/app.py".to_string(),
                body: "Automated fix".to_string(),
                head: "nightwatch/fix-1001".to_string(),
                base: "main".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(url, "https://github.test/acme/x/pull/7");
}

#[tokio::test]
async fn creates_issue_and_returns_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/acme/x/issues"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "html_url": "https://github.test/acme/x/issues/3"
        })))
        .mount(&server)
        .await;

    let client = GithubClient::new("test-token").with_api_base(server.uri());
    let url = client
        .create_issue("acme/x", "CI failure needs attention", "details")
        .await
        .unwrap();

    assert_eq!(url, "https://github.test/acme/x/issues/3");
}

#[tokio::test]
async fn api_errors_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/x/actions/runs/1001/logs"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let client = GithubClient::new("test-token").with_api_base(server.uri());
    match client.download_run_logs("acme/x", 1001).await {
        Err(HostError::Api { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("Not Found"));
        }
        other => panic!("expected Api error, got {:?}", other.map(|_| ())),
    }
}
