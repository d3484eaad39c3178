use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 單筆資料列；欄位順序保留 API 回傳順序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// 將任意可序列化的列轉為 Record；非物件會包成 `value` 欄位
    pub fn from_serialize<T: Serialize>(row: &T) -> serde_json::Result<Self> {
        match serde_json::to_value(row)? {
            Value::Object(data) => Ok(Self { data }),
            other => {
                let mut data = Map::new();
                data.insert("value".to_string(), other);
                Ok(Self { data })
            }
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub table: Table,
    /// (series name, fetched row count) in job order
    pub series_counts: Vec<(String, usize)>,
}
