use crate::utils::error::{LoaderError, Result};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

/// W3C 規範中代表元素參照的 key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// Chrome 啟動參數
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub binary: Option<PathBuf>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            args: Vec::new(),
            binary: None,
        }
    }
}

impl ChromeOptions {
    pub fn capabilities(&self) -> Value {
        let mut args: Vec<String> = Vec::new();
        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--window-size=1920,1080".to_string());
        args.extend(self.args.iter().cloned());

        let mut chrome = json!({ "args": args });
        if let Some(binary) = &self.binary {
            chrome["binary"] = Value::String(binary.to_string_lossy().into_owned());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome
                }
            }
        })
    }
}

pub fn is_no_such_element(err: &LoaderError) -> bool {
    matches!(err, LoaderError::WebDriverError { error, .. } if error == "no such element")
}

fn element_from(value: &Value) -> Result<ElementId> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
        .ok_or_else(|| LoaderError::ResponseFormatError {
            message: format!("not an element reference: {}", value),
        })
}

fn string_from(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(LoaderError::ResponseFormatError {
            message: format!("expected string, got {}", other),
        }),
    }
}

/// WebDriver 協定用戶端；一個實例對應一個瀏覽器 session
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: Client,
    base: Url,
    session_id: String,
}

impl WebDriverClient {
    pub async fn connect(server_url: &str, capabilities: &Value) -> Result<Self> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().build()?;

        let value = send(&http, Method::POST, base.join("session")?, Some(capabilities.clone())).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::ResponseFormatError {
                message: format!("new session response without sessionId: {}", value),
            })?
            .to_string();

        tracing::info!("🌐 WebDriver session {} started", session_id);
        Ok(Self {
            http,
            base,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let relative = if path.is_empty() {
            format!("session/{}", self.session_id)
        } else {
            format!("session/{}/{}", self.session_id, path)
        };
        Ok(self.base.join(&relative)?)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        send(&self.http, Method::GET, self.endpoint(path)?, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        send(&self.http, Method::POST, self.endpoint(path)?, Some(body)).await
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        tracing::debug!("🌐 navigate {}", url);
        self.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> Result<String> {
        string_from(self.get("url").await?)
    }

    pub async fn title(&self) -> Result<String> {
        string_from(self.get("title").await?)
    }

    pub async fn source(&self) -> Result<String> {
        string_from(self.get("source").await?)
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    pub async fn find(&self, css: &str) -> Result<ElementId> {
        let value = self
            .post("element", json!({ "using": "css selector", "value": css }))
            .await?;
        element_from(&value)
    }

    pub async fn find_all(&self, css: &str) -> Result<Vec<ElementId>> {
        let value = self
            .post("elements", json!({ "using": "css selector", "value": css }))
            .await?;
        match value {
            Value::Array(items) => items.iter().map(element_from).collect(),
            other => Err(LoaderError::ResponseFormatError {
                message: format!("expected element list, got {}", other),
            }),
        }
    }

    pub async fn text(&self, element: &ElementId) -> Result<String> {
        string_from(self.get(&format!("element/{}/text", element.0)).await?)
    }

    /// 輪詢直到元素出現；其他錯誤立即回傳
    pub async fn wait_for(&self, css: &str, timeout: Duration, interval: Duration) -> Result<ElementId> {
        let started = Instant::now();
        loop {
            match self.find(css).await {
                Ok(element) => return Ok(element),
                Err(e) if is_no_such_element(&e) => {
                    if started.elapsed() >= timeout {
                        return Err(LoaderError::TimeoutError {
                            what: format!("element '{}'", css),
                            seconds: timeout.as_secs(),
                        });
                    }
                    tokio::time::sleep(interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn quit(self) -> Result<()> {
        send(&self.http, Method::DELETE, self.endpoint("")?, None).await?;
        tracing::info!("🌐 WebDriver session {} closed", self.session_id);
        Ok(())
    }
}

/// 送出命令並取出回應的 `value`；協定錯誤轉成 WebDriverError
async fn send(http: &Client, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
    let mut request = http.request(method, url.clone());
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let parsed: Option<Value> = serde_json::from_str(&text).ok();
    let mut value = match parsed {
        Some(mut envelope) => envelope
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null),
        None if status.is_success() => Value::Null,
        None => {
            return Err(LoaderError::HttpStatusError {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(LoaderError::WebDriverError {
            error: error.to_string(),
            message,
        });
    }
    if !status.is_success() {
        return Err(LoaderError::WebDriverError {
            error: status.to_string(),
            message: value.take().to_string(),
        });
    }
    Ok(value)
}
