use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("HTTP status {status} from {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("ECOS API error {code}: {message}")]
    ApiError { code: String, message: String },

    #[error("ECOS authentication failed ({code}): {message}")]
    AuthError { code: String, message: String },

    #[error("ECOS rejected the request ({code}): {message}")]
    RequestError { code: String, message: String },

    #[error("ECOS rate limit reached ({code}): {message}")]
    RateLimitError { code: String, message: String },

    #[error("ECOS server error ({code}): {message}")]
    ServerError { code: String, message: String },

    #[error("Unexpected response shape: {message}")]
    ResponseFormatError { message: String },

    #[error("WebDriver error '{error}': {message}")]
    WebDriverError { error: String, message: String },

    #[error("Timed out after {seconds}s waiting for {what}")]
    TimeoutError { what: String, seconds: u64 },

    #[error("Driver error: {message}")]
    DriverError { message: String },

    #[error("Table error: {message}")]
    TableError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Api,
    Browser,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LoaderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoaderError::HttpError(_)
            | LoaderError::HttpStatusError { .. }
            | LoaderError::UrlError(_) => ErrorCategory::Network,
            LoaderError::ApiError { .. }
            | LoaderError::AuthError { .. }
            | LoaderError::RequestError { .. }
            | LoaderError::RateLimitError { .. }
            | LoaderError::ServerError { .. }
            | LoaderError::ResponseFormatError { .. } => ErrorCategory::Api,
            LoaderError::WebDriverError { .. }
            | LoaderError::TimeoutError { .. }
            | LoaderError::DriverError { .. } => ErrorCategory::Browser,
            LoaderError::CsvError(_)
            | LoaderError::SerializationError(_)
            | LoaderError::TableError { .. }
            | LoaderError::ProcessingError { .. } => ErrorCategory::Data,
            LoaderError::ConfigError { .. }
            | LoaderError::ConfigValidationError { .. }
            | LoaderError::InvalidConfigValueError { .. }
            | LoaderError::MissingConfigError { .. } => ErrorCategory::Configuration,
            LoaderError::IoError(_) | LoaderError::ZipError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LoaderError::RateLimitError { .. }
            | LoaderError::ServerError { .. }
            | LoaderError::HttpError(_)
            | LoaderError::HttpStatusError { .. }
            | LoaderError::TimeoutError { .. } => ErrorSeverity::Medium,
            LoaderError::IoError(_) | LoaderError::ZipError(_) | LoaderError::DriverError { .. } => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::High,
        }
    }

    /// 可重試的錯誤：暫時性的網路或伺服器問題
    pub fn is_retryable(&self) -> bool {
        match self {
            LoaderError::RateLimitError { .. } | LoaderError::ServerError { .. } => true,
            LoaderError::HttpStatusError { status, .. } => *status >= 500 || *status == 429,
            LoaderError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LoaderError::AuthError { .. } => {
                "Check the ECOS API key (--api-key or ECOS_API_KEY); keys are issued at ecos.bok.or.kr"
            }
            LoaderError::RequestError { .. } => {
                "Check the statistic code, cycle and period format (e.g. A=2020, Q=2020Q1, M=202001, D=20200101)"
            }
            LoaderError::RateLimitError { .. } => "Wait a moment and retry, or lower concurrent_requests",
            LoaderError::ServerError { .. } | LoaderError::HttpStatusError { .. } => {
                "The ECOS service reported a failure; retry later"
            }
            LoaderError::HttpError(_) | LoaderError::UrlError(_) => {
                "Check network connectivity and the configured base URL"
            }
            LoaderError::WebDriverError { .. } | LoaderError::TimeoutError { .. } => {
                "Check the page URL and CSS selector, or run with --headed to watch the browser"
            }
            LoaderError::DriverError { .. } => {
                "Install Chrome, or pass --driver with the path of a chromedriver binary"
            }
            LoaderError::ConfigError { .. }
            | LoaderError::ConfigValidationError { .. }
            | LoaderError::InvalidConfigValueError { .. }
            | LoaderError::MissingConfigError { .. } => "Fix the configuration value and run again",
            LoaderError::TableError { .. } | LoaderError::ProcessingError { .. } => {
                "Check column names used in transform settings"
            }
            LoaderError::IoError(_) | LoaderError::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            LoaderError::CsvError(_)
            | LoaderError::SerializationError(_)
            | LoaderError::ResponseFormatError { .. }
            | LoaderError::ApiError { .. } => "Run with --verbose and inspect the logged response",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Api => format!("ECOS API problem: {}", self),
            ErrorCategory::Browser => format!("Browser automation problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let rate = LoaderError::RateLimitError {
            code: "ERROR-602".to_string(),
            message: "too many calls".to_string(),
        };
        assert!(rate.is_retryable());
        assert_eq!(rate.severity(), ErrorSeverity::Medium);

        let auth = LoaderError::AuthError {
            code: "INFO-100".to_string(),
            message: "invalid key".to_string(),
        };
        assert!(!auth.is_retryable());
        assert_eq!(auth.category(), ErrorCategory::Api);
        assert_eq!(auth.severity(), ErrorSeverity::High);

        let status = LoaderError::HttpStatusError {
            status: 503,
            url: "http://x".to_string(),
        };
        assert!(status.is_retryable());
        let not_found = LoaderError::HttpStatusError {
            status: 404,
            url: "http://x".to_string(),
        };
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_user_friendly_message_prefix() {
        let err = LoaderError::MissingConfigError {
            field: "api_key".to_string(),
        };
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
