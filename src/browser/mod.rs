//! Browser automation for pages that only render their tables with JavaScript.

pub mod driver;
pub mod scrape;
pub mod service;
pub mod webdriver;

pub use driver::{DriverManager, DriverVersion};
pub use scrape::TableScraper;
pub use service::DriverService;
pub use webdriver::{ChromeOptions, WebDriverClient};

use crate::utils::error::Result;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub chrome: ChromeOptions,
    /// 既有的 chromedriver；未指定時自動下載
    pub driver_path: Option<PathBuf>,
    pub browser_version: Option<DriverVersion>,
    /// 已在執行的 WebDriver 伺服器（例如 Selenium Grid）；指定時不啟動本機驅動程式
    pub remote_url: Option<String>,
    pub startup_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome: ChromeOptions::default(),
            driver_path: None,
            browser_version: None,
            remote_url: None,
            startup_timeout: Duration::from_secs(15),
        }
    }
}

/// 驅動程式子程序與 WebDriver session 的組合
pub struct BrowserSession {
    client: WebDriverClient,
    service: Option<DriverService>,
}

impl BrowserSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let capabilities = options.chrome.capabilities();

        if let Some(remote) = &options.remote_url {
            let client = WebDriverClient::connect(remote, &capabilities).await?;
            return Ok(Self {
                client,
                service: None,
            });
        }

        let driver = match &options.driver_path {
            Some(path) => path.clone(),
            None => {
                let manager = DriverManager::new()?;
                match &options.browser_version {
                    Some(version) => manager.install(version).await?,
                    None => manager.install_for_local_browser().await?,
                }
            }
        };

        let service = DriverService::start(&driver, None, options.startup_timeout).await?;
        let client = WebDriverClient::connect(service.url(), &capabilities).await?;
        Ok(Self {
            client,
            service: Some(service),
        })
    }

    pub fn client(&self) -> &WebDriverClient {
        &self.client
    }

    pub async fn close(self) -> Result<()> {
        let quit = self.client.quit().await;
        if let Some(service) = self.service {
            service.stop().await?;
        }
        quit
    }
}
