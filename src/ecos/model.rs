use crate::utils::error::{LoaderError, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// ECOS Open API 服務名稱；同時是 URL 路徑與回應 JSON 的最外層 key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    StatisticSearch,
    StatisticTableList,
    StatisticItemList,
    KeyStatisticList,
    StatisticWord,
    StatisticMeta,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::StatisticSearch => "StatisticSearch",
            Service::StatisticTableList => "StatisticTableList",
            Service::StatisticItemList => "StatisticItemList",
            Service::KeyStatisticList => "KeyStatisticList",
            Service::StatisticWord => "StatisticWord",
            Service::StatisticMeta => "StatisticMeta",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ECOS 有時以數字、有時以字串回傳同一欄位，一律轉成字串
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// StatisticSearch 的一列觀測值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatisticRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code2: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name2: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code4: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name4: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wgt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_value: Option<String>,
}

/// StatisticTableList：統計表目錄
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct TableInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub p_stat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cycle: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub srch_yn: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub org_name: Option<String>,
}

impl TableInfo {
    /// SRCH_YN = "Y" 的表才能用 StatisticSearch 查詢
    pub fn is_searchable(&self) -> bool {
        self.srch_yn.as_deref() == Some("Y")
    }
}

/// StatisticItemList：統計表底下的項目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ItemInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grp_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grp_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub item_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub p_item_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub p_item_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cycle: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_cnt: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub weight: Option<String>,
}

/// KeyStatisticList：100 大統計指標
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct KeyStatistic {
    #[serde(default, deserialize_with = "lenient_string")]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub keystat_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_value: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cycle: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit_name: Option<String>,
}

/// StatisticWord：統計用語辭典
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WordEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub word: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
}

/// StatisticMeta：統計說明資料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MetaEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub lvl: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub p_cont_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cont_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cont_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub meta_data: Option<String>,
}

/// 回應中的 RESULT 區塊
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiStatus {
    #[serde(rename = "CODE")]
    pub code: String,
    #[serde(rename = "MESSAGE", default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ok,
    NoData,
    Auth,
    BadRequest,
    RateLimited,
    Server,
    Other,
}

impl ApiStatus {
    pub fn kind(&self) -> StatusKind {
        match self.code.as_str() {
            "INFO-000" => StatusKind::Ok,
            "INFO-200" => StatusKind::NoData,
            "INFO-100" => StatusKind::Auth,
            "ERROR-100" | "ERROR-101" => StatusKind::BadRequest,
            "ERROR-602" => StatusKind::RateLimited,
            "ERROR-500" | "ERROR-600" | "ERROR-601" => StatusKind::Server,
            _ => StatusKind::Other,
        }
    }

    /// 轉成錯誤；Ok / NoData 不是錯誤，回傳 None
    pub fn into_error(self) -> Option<LoaderError> {
        let kind = self.kind();
        let ApiStatus { code, message } = self;
        match kind {
            StatusKind::Ok | StatusKind::NoData => None,
            StatusKind::Auth => Some(LoaderError::AuthError { code, message }),
            StatusKind::BadRequest => Some(LoaderError::RequestError { code, message }),
            StatusKind::RateLimited => Some(LoaderError::RateLimitError { code, message }),
            StatusKind::Server => Some(LoaderError::ServerError { code, message }),
            StatusKind::Other => Some(LoaderError::ApiError { code, message }),
        }
    }
}

/// 單次請求取得的一頁
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// list_total_count：整個查詢的總筆數
    pub total: usize,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            rows: Vec::new(),
        }
    }
}

fn status_from(value: &Value) -> Option<ApiStatus> {
    value
        .get("RESULT")
        .and_then(|r| serde_json::from_value::<ApiStatus>(r.clone()).ok())
}

/// 解析 `{ "<Service>": { list_total_count, row } }` 或 `{ "RESULT": { CODE, MESSAGE } }`
pub fn parse_envelope<T: DeserializeOwned>(service: Service, body: Value) -> Result<Page<T>> {
    let status = status_from(&body).or_else(|| body.get(service.as_str()).and_then(status_from));
    if let Some(status) = status {
        let kind = status.kind();
        if let Some(err) = status.into_error() {
            return Err(err);
        }
        if kind == StatusKind::NoData {
            return Ok(Page::empty());
        }
    }

    let Value::Object(mut root) = body else {
        return Err(LoaderError::ResponseFormatError {
            message: "response is not a JSON object".to_string(),
        });
    };
    let Some(inner) = root.remove(service.as_str()) else {
        return Err(LoaderError::ResponseFormatError {
            message: format!(
                "missing '{}' key (found: {})",
                service,
                root.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        });
    };

    let rows_value = inner.get("row").cloned().unwrap_or(Value::Array(Vec::new()));
    let rows: Vec<T> = serde_json::from_value(rows_value)?;
    let total = inner
        .get("list_total_count")
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(rows.len());

    Ok(Page { total, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_statistic_search_page() {
        let body = json!({
            "StatisticSearch": {
                "list_total_count": 25,
                "row": [{
                    "STAT_CODE": "722Y001",
                    "STAT_NAME": "1.3.1. 한국은행 기준금리 및 여수신금리",
                    "ITEM_CODE1": "0101000",
                    "ITEM_NAME1": "한국은행 기준금리",
                    "ITEM_CODE2": null,
                    "UNIT_NAME": "연%",
                    "WGT": null,
                    "TIME": "202001",
                    "DATA_VALUE": "1.25"
                }]
            }
        });
        let page: Page<StatisticRow> = parse_envelope(Service::StatisticSearch, body).unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].time.as_deref(), Some("202001"));
        assert_eq!(page.rows[0].data_value.as_deref(), Some("1.25"));
        assert_eq!(page.rows[0].item_code2, None);
    }

    #[test]
    fn test_numeric_fields_become_strings() {
        let body = json!({
            "StatisticItemList": {
                "list_total_count": "1",
                "row": [{"STAT_CODE": "601Y002", "DATA_CNT": 240, "WEIGHT": null}]
            }
        });
        let page: Page<ItemInfo> = parse_envelope(Service::StatisticItemList, body).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].data_cnt.as_deref(), Some("240"));
    }

    #[test]
    fn test_no_data_is_empty_page() {
        let body = json!({"RESULT": {"CODE": "INFO-200", "MESSAGE": "해당하는 데이터가 없습니다."}});
        let page: Page<StatisticRow> = parse_envelope(Service::StatisticSearch, body).unwrap();
        assert_eq!(page, Page::empty());
    }

    #[test]
    fn test_error_codes_are_classified() {
        let auth = json!({"RESULT": {"CODE": "INFO-100", "MESSAGE": "인증키가 유효하지 않습니다."}});
        assert!(matches!(
            parse_envelope::<StatisticRow>(Service::StatisticSearch, auth),
            Err(LoaderError::AuthError { .. })
        ));

        let nested = json!({"StatisticSearch": {"RESULT": {"CODE": "ERROR-101", "MESSAGE": "날짜 형식"}}});
        assert!(matches!(
            parse_envelope::<StatisticRow>(Service::StatisticSearch, nested),
            Err(LoaderError::RequestError { .. })
        ));

        let limited = json!({"RESULT": {"CODE": "ERROR-602", "MESSAGE": "과도한 호출"}});
        let err = parse_envelope::<StatisticRow>(Service::StatisticSearch, limited).unwrap_err();
        assert!(err.is_retryable());

        let unknown = json!({"RESULT": {"CODE": "ERROR-999", "MESSAGE": "?"}});
        assert!(matches!(
            parse_envelope::<StatisticRow>(Service::StatisticSearch, unknown),
            Err(LoaderError::ApiError { .. })
        ));
    }

    #[test]
    fn test_missing_service_key() {
        let body = json!({"Other": {}});
        let err = parse_envelope::<WordEntry>(Service::StatisticWord, body).unwrap_err();
        assert!(matches!(err, LoaderError::ResponseFormatError { .. }));
    }

    #[test]
    fn test_searchable_flag() {
        let info = TableInfo {
            srch_yn: Some("Y".to_string()),
            ..Default::default()
        };
        assert!(info.is_searchable());
        assert!(!TableInfo::default().is_searchable());
    }
}
