use ecosloader::browser::driver::driver_file_name;
use ecosloader::browser::service::wait_ready;
use ecosloader::browser::{ChromeOptions, DriverManager, DriverVersion, TableScraper, WebDriverClient};
use ecosloader::utils::error::LoaderError;
use httpmock::prelude::*;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const SESSION: &str = "4f2c1a";

async fn mock_new_session(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/session")
                .json_body_partial(r#"{"capabilities":{"alwaysMatch":{"browserName":"chrome"}}}"#);
            then.status(200).json_body(json!({
                "value": { "sessionId": SESSION, "capabilities": { "browserName": "chrome" } }
            }));
        })
        .await
}

#[tokio::test]
async fn test_scrape_table_session_flow() {
    let server = MockServer::start_async().await;
    let new_session = mock_new_session(&server).await;
    let navigate = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/session/{}/url", SESSION))
                .json_body(json!({ "url": "https://ecos.bok.or.kr/#/Short/af4c9f" }));
            then.status(200).json_body(json!({ "value": null }));
        })
        .await;
    let find = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/session/{}/element", SESSION))
                .json_body_partial(r#"{"using":"css selector","value":"table.grid"}"#);
            then.status(200).json_body(json!({
                "value": { "element-6066-11e4-a52e-4f735466cecf": "el-1" }
            }));
        })
        .await;
    let execute = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/session/{}/execute/sync", SESSION))
                .json_body_partial(r#"{"args":["table.grid"]}"#);
            then.status(200).json_body(json!({
                "value": {
                    "header": ["시점", "기준금리", "기준금리"],
                    "rows": [["2024.01", "3.50", ""], ["2024.02", "3.50", "3.50"]]
                }
            }));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path(format!("/session/{}", SESSION));
            then.status(200).json_body(json!({ "value": null }));
        })
        .await;

    let client = WebDriverClient::connect(&server.base_url(), &ChromeOptions::default().capabilities())
        .await
        .unwrap();
    assert_eq!(client.session_id(), SESSION);

    let table = TableScraper::new(&client)
        .with_timeout(Duration::from_secs(1))
        .scrape_table("https://ecos.bok.or.kr/#/Short/af4c9f", "table.grid")
        .await
        .unwrap();
    client.quit().await.unwrap();

    new_session.assert_async().await;
    navigate.assert_async().await;
    find.assert_async().await;
    execute.assert_async().await;
    delete.assert_async().await;

    assert_eq!(table.columns(), &["시점", "기준금리", "기준금리_2"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(0, "기준금리_2"), Some(&serde_json::Value::Null));
    assert_eq!(table.get(1, "기준금리"), Some(&json!("3.50")));
}

#[tokio::test]
async fn test_wait_for_times_out_on_missing_element() {
    let server = MockServer::start_async().await;
    mock_new_session(&server).await;
    let find = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/session/{}/element", SESSION));
            then.status(404).json_body(json!({
                "value": {
                    "error": "no such element",
                    "message": "Unable to locate element: table.grid",
                    "stacktrace": ""
                }
            }));
        })
        .await;

    let client = WebDriverClient::connect(&server.base_url(), &ChromeOptions::default().capabilities())
        .await
        .unwrap();
    let err = client
        .wait_for("table.grid", Duration::from_millis(200), Duration::from_millis(20))
        .await
        .unwrap_err();

    assert!(matches!(err, LoaderError::TimeoutError { .. }));
    assert!(find.hits_async().await >= 2);
}

#[tokio::test]
async fn test_protocol_error_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/session");
            then.status(500).json_body(json!({
                "value": {
                    "error": "session not created",
                    "message": "This version of ChromeDriver only supports Chrome version 120"
                }
            }));
        })
        .await;

    let err = WebDriverClient::connect(&server.base_url(), &ChromeOptions::default().capabilities())
        .await
        .unwrap_err();
    match err {
        LoaderError::WebDriverError { error, message } => {
            assert_eq!(error, "session not created");
            assert!(message.contains("Chrome version 120"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

fn driver_zip() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.add_directory("chromedriver-linux64/", SimpleFileOptions::default())
        .unwrap();
    zip.start_file(
        format!("chromedriver-linux64/{}", driver_file_name()),
        SimpleFileOptions::default(),
    )
    .unwrap();
    zip.write_all(b"#!/bin/sh\necho fake driver\n").unwrap();
    zip.start_file("chromedriver-linux64/LICENSE.chromedriver", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"license").unwrap();
    zip.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_driver_install_downloads_once() {
    let server = MockServer::start_async().await;
    let download_url = server.url("/cft/120.0.6099.109/linux64/chromedriver-linux64.zip");
    let manifest = server
        .mock_async(|when, then| {
            when.method(GET).path("/known-good-versions-with-downloads.json");
            then.status(200).json_body(json!({
                "timestamp": "2024-01-01T00:00:00.000Z",
                "versions": [
                    { "version": "120.0.6099.71", "revision": "1217362", "downloads": {
                        "chromedriver": [{ "platform": "linux64", "url": "http://unused.invalid/a.zip" }]
                    }},
                    { "version": "120.0.6099.109", "revision": "1217362", "downloads": {
                        "chrome": [],
                        "chromedriver": [
                            { "platform": "win64", "url": "http://unused.invalid/b.zip" },
                            { "platform": "linux64", "url": download_url }
                        ]
                    }}
                ]
            }));
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cft/120.0.6099.109/linux64/chromedriver-linux64.zip");
            then.status(200)
                .header("Content-Type", "application/zip")
                .body(driver_zip());
        })
        .await;

    let cache = TempDir::new().unwrap();
    let manager = DriverManager::with_cache_dir(cache.path())
        .unwrap()
        .with_manifest_url(server.url("/known-good-versions-with-downloads.json"))
        .with_platform("linux64");

    let requested: DriverVersion = "120".parse().unwrap();
    let path = manager.install(&requested).await.unwrap();
    assert_eq!(
        path,
        cache
            .path()
            .join("120.0.6099.109")
            .join("linux64")
            .join(driver_file_name())
    );
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"#!/bin/sh\necho fake driver\n".to_vec()
    );

    // 完整版本已在快取中：不再連線
    let again = manager
        .install(&DriverVersion::Exact("120.0.6099.109".to_string()))
        .await
        .unwrap();
    assert_eq!(again, path);

    manifest.assert_hits_async(1).await;
    download.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_wait_ready_polls_status() {
    let server = MockServer::start_async().await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path("/status");
            then.status(200).json_body(json!({
                "value": { "ready": true, "message": "ChromeDriver ready for new sessions." }
            }));
        })
        .await;

    let http = reqwest::Client::new();
    wait_ready(&http, &server.base_url(), Duration::from_secs(1), Duration::from_millis(20))
        .await
        .unwrap();
    status.assert_async().await;
}

#[tokio::test]
async fn test_wait_ready_times_out_when_busy() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/status");
            then.status(200)
                .json_body(json!({ "value": { "ready": false, "message": "busy" } }));
        })
        .await;

    let http = reqwest::Client::new();
    let err = wait_ready(&http, &server.base_url(), Duration::from_millis(150), Duration::from_millis(20))
        .await
        .unwrap_err();
    assert!(matches!(err, LoaderError::TimeoutError { .. }));
}

#[tokio::test]
async fn test_page_queries_and_element_text() {
    let server = MockServer::start_async().await;
    mock_new_session(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/session/{}/url", SESSION));
            then.status(200)
                .json_body(json!({ "value": "https://ecos.bok.or.kr/#/StatisticsByTheme" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/session/{}/title", SESSION));
            then.status(200).json_body(json!({ "value": "ECOS 경제통계시스템" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/session/{}/source", SESSION));
            then.status(200)
                .json_body(json!({ "value": "<html><body><table></table></body></html>" }));
        })
        .await;
    let find_all = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/session/{}/elements", SESSION))
                .json_body_partial(r#"{"using":"css selector","value":"td.unit"}"#);
            then.status(200).json_body(json!({
                "value": [
                    { "element-6066-11e4-a52e-4f735466cecf": "td-1" },
                    { "element-6066-11e4-a52e-4f735466cecf": "td-2" }
                ]
            }));
        })
        .await;
    let text = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/session/{}/element/td-2/text", SESSION));
            then.status(200).json_body(json!({ "value": "연%" }));
        })
        .await;

    let client = WebDriverClient::connect(&server.base_url(), &ChromeOptions::default().capabilities())
        .await
        .unwrap();

    assert_eq!(
        client.current_url().await.unwrap(),
        "https://ecos.bok.or.kr/#/StatisticsByTheme"
    );
    assert_eq!(client.title().await.unwrap(), "ECOS 경제통계시스템");
    assert!(client.source().await.unwrap().contains("<table>"));

    let cells = client.find_all("td.unit").await.unwrap();
    assert_eq!(cells.len(), 2);
    assert_eq!(cells[0].0, "td-1");
    assert_eq!(client.text(&cells[1]).await.unwrap(), "연%");

    find_all.assert_async().await;
    text.assert_async().await;
}

#[tokio::test]
async fn test_malformed_replies_are_format_errors() {
    let server = MockServer::start_async().await;
    mock_new_session(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/session/{}/elements", SESSION));
            then.status(200)
                .json_body(json!({ "value": { "element-6066-11e4-a52e-4f735466cecf": "solo" } }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/session/{}/title", SESSION));
            then.status(200).json_body(json!({ "value": 42 }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(format!("/session/{}/element", SESSION));
            then.status(200).json_body(json!({ "value": { "id": "not-w3c" } }));
        })
        .await;

    let client = WebDriverClient::connect(&server.base_url(), &ChromeOptions::default().capabilities())
        .await
        .unwrap();

    let err = client.find_all("td").await.unwrap_err();
    assert!(matches!(err, LoaderError::ResponseFormatError { .. }));
    let err = client.title().await.unwrap_err();
    assert!(matches!(err, LoaderError::ResponseFormatError { .. }));
    let err = client.find("td").await.unwrap_err();
    assert!(matches!(err, LoaderError::ResponseFormatError { .. }));
}
