use ecosloader::utils::validation::Validate;
use ecosloader::{EcosPipeline, EtlEngine, JobConfig, LocalStorage, Table};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn observation(code: &str, item: &str, time: &str, value: &str) -> serde_json::Value {
    json!({
        "STAT_CODE": code,
        "ITEM_CODE1": "0",
        "ITEM_NAME1": item,
        "UNIT_NAME": "%",
        "TIME": time,
        "DATA_VALUE": value
    })
}

fn job_toml(base_url: &str, output_path: &str, load_extra: &str) -> String {
    format!(
        r#"
[job]
name = "macro"
description = "Base rate and CPI"

[source]
api_key = "${{ECOSLOADER_IT_KEY}}"
base_url = "{base_url}"
page_size = 100
retry_attempts = 0

[[series]]
name = "base_rate"
stat_code = "722Y001"
cycle = "Q"
start = "2023Q1"
end = "2023Q2"
items = ["0101000"]

[[series]]
name = "cpi"
stat_code = "901Y009"
cycle = "Q"
start = "2023Q1"
end = "2023Q2"
items = ["0"]

[transform]
pivot = {{}}
sort_by = "TIME"

[load]
output_path = "{output_path}"
{load_extra}
"#
    )
}

async fn mock_series(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let base_rate = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/StatisticSearch/ITKEY/json/kr/1/100/722Y001/Q/2023Q1/2023Q2/0101000");
            then.status(200).json_body(json!({
                "StatisticSearch": {
                    "list_total_count": 2,
                    "row": [
                        observation("722Y001", "한국은행 기준금리", "2023Q2", "3.5"),
                        observation("722Y001", "한국은행 기준금리", "2023Q1", "3.5")
                    ]
                }
            }));
        })
        .await;
    let cpi = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/StatisticSearch/ITKEY/json/kr/1/100/901Y009/Q/2023Q1/2023Q2/0");
            then.status(200).json_body(json!({
                "StatisticSearch": {
                    "list_total_count": 2,
                    "row": [
                        observation("901Y009", "총지수", "2023Q1", "110.5"),
                        observation("901Y009", "총지수", "2023Q2", "111.2")
                    ]
                }
            }));
        })
        .await;
    (base_rate, cpi)
}

#[tokio::test]
async fn test_end_to_end_job_writes_pivoted_csv() {
    std::env::set_var("ECOSLOADER_IT_KEY", "ITKEY");
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().replace('\\', "/");

    let server = MockServer::start_async().await;
    let (base_rate, cpi) = mock_series(&server).await;

    let config_path = temp_dir.path().join("job.toml");
    std::fs::write(
        &config_path,
        job_toml(
            &server.base_url(),
            &output_path,
            r#"output_formats = ["csv", "json"]"#,
        ),
    )
    .unwrap();

    let config = JobConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let storage = LocalStorage::new(config.load.output_path.clone());
    let pipeline = EcosPipeline::new(storage, config).unwrap();
    let written = EtlEngine::new(pipeline).run().await.unwrap();

    base_rate.assert_async().await;
    cpi.assert_async().await;
    assert_eq!(written.len(), 2);
    assert!(written[0].ends_with("macro.csv"));

    let csv = std::fs::read(temp_dir.path().join("macro.csv")).unwrap();
    let table = Table::from_csv_reader(csv.as_slice(), b',').unwrap();
    assert_eq!(table.columns(), &["TIME", "base_rate", "cpi"]);
    assert_eq!(table.get(0, "TIME"), Some(&json!("2023Q1")));
    assert_eq!(table.get(0, "cpi"), Some(&json!("110.5")));
    assert_eq!(table.get(1, "base_rate"), Some(&json!("3.5")));

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join("macro.json")).unwrap())
            .unwrap();
    assert_eq!(json[1]["cpi"], json!(111.2));
}

#[tokio::test]
async fn test_end_to_end_job_zip_bundle() {
    std::env::set_var("ECOSLOADER_IT_KEY", "ITKEY");
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().replace('\\', "/");

    let server = MockServer::start_async().await;
    mock_series(&server).await;

    let config = JobConfig::from_toml_str(&job_toml(
        &server.base_url(),
        &output_path,
        r#"output_formats = ["tsv"]
compression = { enabled = true, filename = "macro.zip" }"#,
    ))
    .unwrap();
    config.validate().unwrap();

    let storage = LocalStorage::new(output_path.clone());
    let pipeline = EcosPipeline::new(storage, config).unwrap();
    let written = EtlEngine::new(pipeline).run().await.unwrap();
    assert_eq!(written.len(), 1);

    let zip_data = std::fs::read(temp_dir.path().join("macro.zip")).unwrap();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();

    let mut tsv = String::new();
    std::io::Read::read_to_string(&mut archive.by_name("macro.tsv").unwrap(), &mut tsv).unwrap();
    assert!(tsv.starts_with("TIME\tbase_rate\tcpi\n"));
    assert!(tsv.contains("2023Q2\t3.5\t111.2"));

    let metadata: serde_json::Value =
        serde_json::from_reader(archive.by_name("metadata.json").unwrap()).unwrap();
    assert_eq!(metadata["job"], "macro");
    assert_eq!(metadata["series"][0]["rows"], 2);
}

#[tokio::test]
async fn test_job_fails_on_api_error() {
    std::env::set_var("ECOSLOADER_IT_KEY", "ITKEY");
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().replace('\\', "/");

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/StatisticSearch/");
            then.status(200).json_body(json!({
                "RESULT": { "CODE": "ERROR-101", "MESSAGE": "주기와 다른 형식의 날짜 형식입니다." }
            }));
        })
        .await;

    let config = JobConfig::from_toml_str(&job_toml(
        &server.base_url(),
        &output_path,
        r#"output_formats = ["csv"]"#,
    ))
    .unwrap();

    let pipeline = EcosPipeline::new(LocalStorage::new(output_path), config).unwrap();
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();
    assert!(!err.is_retryable());
    assert!(!temp_dir.path().join("macro.csv").exists());
}
