use crate::utils::error::{LoaderError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// ECOS 或 WebDriver 端點；服務路徑會接在其後，因此不可帶查詢字串或片段
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    let invalid = |reason: String| LoaderError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: url_str.to_string(),
        reason,
    };

    if url_str.trim().is_empty() {
        return Err(invalid(
            "endpoint URL is empty; omit the field to use the default ECOS endpoint".to_string(),
        ));
    }

    let url = Url::parse(url_str).map_err(|e| invalid(format!("not an endpoint URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "endpoint must use http or https, not '{}'",
            url.scheme()
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(
            "endpoint cannot carry a query string or fragment; service paths are appended to it"
                .to_string(),
        ));
    }
    Ok(())
}

/// 輸出目錄：可以尚未存在，但不可指向既有的一般檔案
pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    let invalid = |reason: &str| LoaderError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("output directory is empty; use \".\" for the working directory"));
    }
    if path.contains('\0') {
        return Err(invalid("output directory contains a NUL byte"));
    }
    if std::path::Path::new(path).is_file() {
        return Err(invalid("output directory points to an existing file"));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("{} must be at least {}", field_name, min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LoaderError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    Ok(())
}

/// 統計代碼、項目代碼、用語等會直接成為 ECOS URL 的一段路徑
pub fn validate_url_segment(field_name: &str, value: &str) -> Result<()> {
    validate_non_empty_string(field_name, value)?;
    if let Some(bad) = value.chars().find(|c| matches!(c, '/' | '?' | '#')) {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("'{}' would split the ECOS request path", bad),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(LoaderError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// API 金鑰不可為空，也不可殘留未替換的 ${VAR}
pub fn validate_api_key(field_name: &str, key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(LoaderError::MissingConfigError {
            field: field_name.to_string(),
        });
    }
    if key.contains("${") {
        return Err(LoaderError::ConfigValidationError {
            field: field_name.to_string(),
            message: format!("unresolved environment placeholder in '{}'", key),
        });
    }
    if key.contains('/') || key.chars().any(char::is_whitespace) {
        return Err(LoaderError::ConfigValidationError {
            field: field_name.to_string(),
            message: "API key contains '/' or whitespace".to_string(),
        });
    }
    Ok(())
}
