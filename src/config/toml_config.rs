use crate::domain::ports::ConfigProvider;
use crate::ecos::client::{ClientOptions, DEFAULT_PAGE_SIZE};
use crate::ecos::{Cycle, Language, SeriesQuery};
use crate::table::OutputFormat;
use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::{
    validate_api_key, validate_non_empty_string, validate_path, validate_positive_number,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// 一次載入工作的 TOML 設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobInfo,
    pub source: SourceConfig,
    pub series: Vec<SeriesConfig>,
    #[serde(default)]
    pub transform: TransformConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub language: Option<String>,
    pub page_size: Option<usize>,
    pub concurrent_requests: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub name: String,
    pub stat_code: String,
    pub cycle: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl SeriesConfig {
    pub fn to_query(&self) -> Result<SeriesQuery> {
        let cycle: Cycle = self.cycle.parse()?;
        Ok(SeriesQuery::new(&self.stat_code, cycle, &self.start, &self.end)
            .with_items(self.items.iter().cloned()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// DATA_VALUE 轉數值，預設開啟
    pub numeric: Option<bool>,
    pub pivot: Option<PivotConfig>,
    pub columns: Option<Vec<String>>,
    pub sort_by: Option<String>,
    pub descending: Option<bool>,
}

fn default_pivot_index() -> String {
    "TIME".to_string()
}

fn default_pivot_columns() -> String {
    "SERIES".to_string()
}

fn default_pivot_values() -> String {
    "DATA_VALUE".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotConfig {
    #[serde(default = "default_pivot_index")]
    pub index: String,
    #[serde(default = "default_pivot_columns")]
    pub columns: String,
    #[serde(default = "default_pivot_values")]
    pub values: String,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            index: default_pivot_index(),
            columns: default_pivot_columns(),
            values: default_pivot_values(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    /// 檔名樣式，支援 {job} 與 {timestamp}
    pub filename: Option<String>,
    pub compression: Option<CompressionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

impl JobConfig {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| LoaderError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ECOS_API_KEY})；未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").map_err(|e| LoaderError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn output_formats(&self) -> Result<Vec<OutputFormat>> {
        self.load
            .output_formats
            .iter()
            .map(|f| f.parse())
            .collect()
    }

    pub fn queries(&self) -> Result<Vec<(String, SeriesQuery)>> {
        self.series
            .iter()
            .map(|s| Ok((s.name.clone(), s.to_query()?)))
            .collect()
    }

    pub fn client_options(&self) -> Result<ClientOptions> {
        let source = &self.source;
        let mut options = ClientOptions::from_provider(self)
            .with_page_size(source.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
        if let Some(base_url) = &source.base_url {
            options = options.with_base_url(base_url);
        }
        if let Some(language) = &source.language {
            options = options.with_language(language.parse::<Language>()?);
        }
        if let Some(timeout) = source.timeout_seconds {
            options = options.with_timeout(Duration::from_secs(timeout));
        }
        let attempts = source.retry_attempts.unwrap_or(options.retry_attempts);
        let delay = source
            .retry_delay_seconds
            .map(Duration::from_secs)
            .unwrap_or(options.retry_delay);
        Ok(options.with_retry(attempts, delay))
    }

    /// 輸出檔名（不含副檔名）
    pub fn file_stem(&self) -> String {
        let pattern = self.load.filename.as_deref().unwrap_or("{job}");
        pattern
            .replace("{job}", &self.job.name)
            .replace(
                "{timestamp}",
                &chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string(),
            )
    }

    pub fn numeric(&self) -> bool {
        self.transform.numeric.unwrap_or(true)
    }
}

impl Validate for JobConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job.name", &self.job.name)?;
        validate_api_key("source.api_key", &self.source.api_key)?;
        if let Some(base_url) = &self.source.base_url {
            validate_url("source.base_url", base_url)?;
        }
        if let Some(concurrent) = self.source.concurrent_requests {
            validate_positive_number("source.concurrent_requests", concurrent, 1)?;
        }
        validate_path("load.output_path", &self.load.output_path)?;

        if self.series.is_empty() {
            return Err(LoaderError::MissingConfigError {
                field: "series".to_string(),
            });
        }
        let mut names = HashSet::new();
        for series in &self.series {
            validate_non_empty_string("series.name", &series.name)?;
            if !names.insert(series.name.as_str()) {
                return Err(LoaderError::InvalidConfigValueError {
                    field: "series.name".to_string(),
                    value: series.name.clone(),
                    reason: "series names must be unique".to_string(),
                });
            }
            series.to_query()?.validate()?;
        }

        if self.load.output_formats.is_empty() {
            return Err(LoaderError::MissingConfigError {
                field: "load.output_formats".to_string(),
            });
        }
        self.output_formats()?;

        if let Some(compression) = &self.load.compression {
            if compression.enabled {
                validate_non_empty_string("load.compression.filename", &compression.filename)?;
            }
        }

        self.client_options()?.validate()
    }
}

impl ConfigProvider for JobConfig {
    fn api_key(&self) -> &str {
        &self.source.api_key
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn concurrent_requests(&self) -> usize {
        self.source.concurrent_requests.unwrap_or(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[job]
name = "rates"
description = "Base rate and CPI"

[source]
api_key = "SAMPLEKEY"
page_size = 500
concurrent_requests = 2
retry_attempts = 1

[[series]]
name = "base_rate"
stat_code = "722Y001"
cycle = "M"
start = "202001"
end = "202312"
items = ["0101000"]

[[series]]
name = "cpi"
stat_code = "901Y009"
cycle = "m"
start = "202001"
end = "202312"
items = ["0"]

[transform]
pivot = {}

[load]
output_path = "./output"
output_formats = ["csv", "json"]
filename = "{job}_export"
"#;

    #[test]
    fn test_parse_sample() {
        let config = JobConfig::from_toml_str(SAMPLE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.series.len(), 2);
        assert_eq!(config.file_stem(), "rates_export");
        assert!(config.numeric());

        let pivot = config.transform.pivot.clone().unwrap();
        assert_eq!(pivot.index, "TIME");
        assert_eq!(pivot.columns, "SERIES");

        let options = config.client_options().unwrap();
        assert_eq!(options.page_size, 500);
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.retry_attempts, 1);

        let queries = config.queries().unwrap();
        assert_eq!(queries[1].1.cycle, Cycle::Monthly);
        assert_eq!(
            config.output_formats().unwrap(),
            vec![OutputFormat::Csv, OutputFormat::Json]
        );
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("ECOSLOADER_TEST_KEY", "FROMENV");
        let content = SAMPLE.replace("SAMPLEKEY", "${ECOSLOADER_TEST_KEY}");
        let config = JobConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.source.api_key, "FROMENV");
    }

    #[test]
    fn test_unresolved_placeholder_fails_validation() {
        let content = SAMPLE.replace("SAMPLEKEY", "${ECOSLOADER_SURELY_UNSET_VAR}");
        let config = JobConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.source.api_key, "${ECOSLOADER_SURELY_UNSET_VAR}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_settings() {
        let bad_format = SAMPLE.replace("\"csv\", \"json\"", "\"xlsx\"");
        assert!(JobConfig::from_toml_str(&bad_format).unwrap().validate().is_err());

        let dup = SAMPLE.replace("name = \"cpi\"", "name = \"base_rate\"");
        assert!(JobConfig::from_toml_str(&dup).unwrap().validate().is_err());

        let bad_period = SAMPLE.replace("start = \"202001\"", "start = \"2020\"");
        assert!(JobConfig::from_toml_str(&bad_period).unwrap().validate().is_err());

        assert!(JobConfig::from_toml_str("not = [valid").is_err());
    }
}
