use crate::domain::ports::ConfigProvider;
use crate::ecos::model::{
    parse_envelope, ItemInfo, KeyStatistic, MetaEntry, Page, Service, StatisticRow, TableInfo,
    WordEntry,
};
use crate::ecos::query::SeriesQuery;
use crate::utils::error::{LoaderError, Result};
use crate::utils::progress::Progress;
use crate::utils::validation::{
    validate_api_key, validate_positive_number, validate_range, validate_url, Validate,
};
use futures_util::{stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://ecos.bok.or.kr/api";
/// ECOS 單次請求可取得的最大筆數
pub const MAX_PAGE_SIZE: usize = 100_000;
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Korean,
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Korean => "kr",
            Language::English => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kr" | "ko" => Ok(Language::Korean),
            "en" => Ok(Language::English),
            other => Err(LoaderError::InvalidConfigValueError {
                field: "language".to_string(),
                value: other.to_string(),
                reason: "expected kr or en".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub base_url: String,
    pub language: Language,
    pub page_size: usize,
    pub concurrency: usize,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl ClientOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            language: Language::default(),
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: 4,
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn from_provider<C: ConfigProvider + ?Sized>(config: &C) -> Self {
        let mut options = Self::new(config.api_key());
        options.concurrency = config.concurrent_requests();
        options
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }
}

impl Validate for ClientOptions {
    fn validate(&self) -> Result<()> {
        validate_api_key("api_key", &self.api_key)?;
        validate_url("base_url", &self.base_url)?;
        validate_range("page_size", self.page_size, 1, MAX_PAGE_SIZE)?;
        validate_positive_number("concurrent_requests", self.concurrency, 1)?;
        Ok(())
    }
}

/// 第一頁之後依 page_size 切出的 (start, end) 區間，1-based 且包含端點
pub fn page_windows(total: usize, page_size: usize) -> Vec<(usize, usize)> {
    if total == 0 || page_size == 0 {
        return Vec::new();
    }
    (1..=total)
        .step_by(page_size)
        .map(|start| (start, (start + page_size - 1).min(total)))
        .collect()
}

/// ECOS Open API 用戶端
#[derive(Debug, Clone)]
pub struct EcosClient {
    http: Client,
    options: ClientOptions,
    base: Url,
}

impl EcosClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        options.validate()?;
        let base = Url::parse(&options.base_url)?;
        let http = Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("ecosloader/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            options,
            base,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// `{base}/{service}/{key}/json/{lang}/{start}/{end}/{params...}`
    ///
    /// 尾端的空參數省略；中間的空參數以 `?` 佔位。
    pub fn build_url(&self, service: Service, start: usize, end: usize, params: &[String]) -> Result<Url> {
        let keep = params
            .iter()
            .rposition(|p| !p.trim().is_empty())
            .map_or(0, |i| i + 1);

        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| LoaderError::ConfigError {
                message: format!("base URL '{}' cannot carry a path", self.base),
            })?;
            segments
                .pop_if_empty()
                .push(service.as_str())
                .push(&self.options.api_key)
                .push("json")
                .push(self.options.language.code())
                .push(&start.to_string())
                .push(&end.to_string());
            for param in &params[..keep] {
                let param = param.trim();
                segments.push(if param.is_empty() { "?" } else { param });
            }
        }
        Ok(url)
    }

    /// 日誌用：遮蔽 API 金鑰
    pub fn masked(&self, url: &Url) -> String {
        url.as_str()
            .replace(&format!("/{}/", self.options.api_key), "/***/")
    }

    async fn fetch_page_once<T: DeserializeOwned>(
        &self,
        service: Service,
        start: usize,
        end: usize,
        params: &[String],
    ) -> Result<Page<T>> {
        let url = self.build_url(service, start, end, params)?;
        tracing::debug!("📡 GET {}", self.masked(&url));

        // reqwest 的錯誤訊息帶完整 URL（含金鑰），先去除
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatusError {
                status: status.as_u16(),
                url: self.masked(&url),
            });
        }

        let body: serde_json::Value = response.json().await.map_err(reqwest::Error::without_url)?;
        parse_envelope(service, body)
    }

    /// 取單頁；暫時性錯誤依設定重試，延遲線性遞增
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        service: Service,
        start: usize,
        end: usize,
        params: &[String],
    ) -> Result<Page<T>> {
        let mut attempt: u32 = 0;
        loop {
            match self.fetch_page_once(service, start, end, params).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.options.retry_attempts => {
                    attempt += 1;
                    let delay = self.options.retry_delay * attempt;
                    tracing::warn!(
                        "⚠️ {} rows {}-{} failed ({}), retry {}/{} in {:?}",
                        service,
                        start,
                        end,
                        e,
                        attempt,
                        self.options.retry_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 取回查詢的全部資料列：先取第一頁得知總筆數，其餘頁面以有限並行取得，
    /// 結果依頁序排列。不論成功與否都會呼叫 `progress.finish()`
    pub async fn fetch_all<T>(
        &self,
        service: Service,
        params: &[String],
        progress: &dyn Progress,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let result = self.fetch_pages(service, params, progress).await;
        progress.finish();
        result
    }

    async fn fetch_pages<T>(
        &self,
        service: Service,
        params: &[String],
        progress: &dyn Progress,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let page_size = self.options.page_size;
        let first: Page<T> = self.fetch_page(service, 1, page_size, params).await?;
        let total = first.total;
        let mut rows = first.rows;

        progress.begin(total as u64, service.as_str());
        progress.advance(rows.len() as u64);

        let remaining: Vec<(usize, usize)> = page_windows(total, page_size).into_iter().skip(1).collect();
        if !remaining.is_empty() {
            tracing::info!(
                "📄 {}: {} rows over {} pages (concurrency {})",
                service,
                total,
                remaining.len() + 1,
                self.options.concurrency
            );
        }

        let pages: Vec<Page<T>> = stream::iter(remaining)
            .map(|(start, end)| async move {
                let page = self.fetch_page::<T>(service, start, end, params).await?;
                progress.advance(page.rows.len() as u64);
                Ok::<_, LoaderError>(page)
            })
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

        for page in pages {
            rows.extend(page.rows);
        }

        if rows.len() != total {
            tracing::warn!(
                "⚠️ {}: expected {} rows, received {}",
                service,
                total,
                rows.len()
            );
        }
        Ok(rows)
    }

    pub async fn statistic_search(
        &self,
        query: &SeriesQuery,
        progress: &dyn Progress,
    ) -> Result<Vec<StatisticRow>> {
        query.validate()?;
        self.fetch_all(Service::StatisticSearch, &query.path_params(), progress)
            .await
    }

    pub async fn statistic_tables(
        &self,
        stat_code: Option<&str>,
        progress: &dyn Progress,
    ) -> Result<Vec<TableInfo>> {
        let params: Vec<String> = stat_code.into_iter().map(str::to_string).collect();
        self.fetch_all(Service::StatisticTableList, &params, progress)
            .await
    }

    pub async fn statistic_items(
        &self,
        stat_code: &str,
        progress: &dyn Progress,
    ) -> Result<Vec<ItemInfo>> {
        crate::utils::validation::validate_url_segment("stat_code", stat_code)?;
        self.fetch_all(Service::StatisticItemList, &[stat_code.to_string()], progress)
            .await
    }

    pub async fn key_statistics(&self, progress: &dyn Progress) -> Result<Vec<KeyStatistic>> {
        self.fetch_all(Service::KeyStatisticList, &[], progress).await
    }

    pub async fn statistic_word(&self, word: &str, progress: &dyn Progress) -> Result<Vec<WordEntry>> {
        crate::utils::validation::validate_url_segment("word", word)?;
        self.fetch_all(Service::StatisticWord, &[word.to_string()], progress)
            .await
    }

    pub async fn statistic_meta(&self, name: &str, progress: &dyn Progress) -> Result<Vec<MetaEntry>> {
        crate::utils::validation::validate_url_segment("name", name)?;
        self.fetch_all(Service::StatisticMeta, &[name.to_string()], progress)
            .await
    }
}
