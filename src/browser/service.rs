use crate::utils::error::{LoaderError, Result};
use reqwest::Client;
use serde_json::Value;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// 本機執行中的 chromedriver；drop 時結束子程序
#[derive(Debug)]
pub struct DriverService {
    child: Child,
    url: String,
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

impl DriverService {
    pub async fn start(driver: &Path, port: Option<u16>, timeout: Duration) -> Result<Self> {
        let port = match port {
            Some(port) => port,
            None => free_port()?,
        };
        let child = Command::new(driver)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LoaderError::DriverError {
                message: format!("failed to start {}: {}", driver.display(), e),
            })?;

        let url = format!("http://127.0.0.1:{}", port);
        tracing::debug!("🚗 {} listening on {}", driver.display(), url);
        let service = Self { child, url };

        let http = Client::builder().timeout(Duration::from_secs(2)).build()?;
        wait_ready(&http, &service.url, timeout, Duration::from_millis(200)).await?;
        Ok(service)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn stop(mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}

/// 輪詢 `GET /status` 直到 `value.ready` 為 true
pub async fn wait_ready(http: &Client, url: &str, timeout: Duration, interval: Duration) -> Result<()> {
    let status_url = format!("{}/status", url.trim_end_matches('/'));
    let started = Instant::now();
    loop {
        let ready = match http.get(&status_url).send().await {
            Ok(response) => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.pointer("/value/ready").and_then(Value::as_bool))
                .unwrap_or(false),
            Err(_) => false,
        };
        if ready {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(LoaderError::TimeoutError {
                what: format!("WebDriver at {}", url),
                seconds: timeout.as_secs(),
            });
        }
        tokio::time::sleep(interval).await;
    }
}
