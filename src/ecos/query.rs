use crate::ecos::cycle::Cycle;
use crate::utils::error::{LoaderError, Result};
use crate::utils::validation::{validate_url_segment, Validate};
use serde::{Deserialize, Serialize};

/// StatisticSearch 最多接受四層項目代碼
pub const MAX_ITEM_CODES: usize = 4;

/// 一個統計序列的查詢條件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesQuery {
    pub stat_code: String,
    pub cycle: Cycle,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl SeriesQuery {
    pub fn new(
        stat_code: impl Into<String>,
        cycle: Cycle,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            stat_code: stat_code.into(),
            cycle,
            start: start.into(),
            end: end.into(),
            items: Vec::new(),
        }
    }

    pub fn with_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = items.into_iter().map(Into::into).collect();
        self
    }

    /// URL 參數：統計表代碼、週期、起訖期間、項目代碼
    pub fn path_params(&self) -> Vec<String> {
        let mut params = vec![
            self.stat_code.clone(),
            self.cycle.code().to_string(),
            self.start.clone(),
            self.end.clone(),
        ];
        params.extend(self.items.iter().cloned());
        params
    }
}

impl Validate for SeriesQuery {
    fn validate(&self) -> Result<()> {
        validate_url_segment("stat_code", &self.stat_code)?;
        // 空的項目代碼會以 "?" 送出，代表全部
        for item in self.items.iter().filter(|i| !i.is_empty()) {
            validate_url_segment("items", item)?;
        }
        let start = self.cycle.period_start(&self.start)?;
        let end = self.cycle.period_start(&self.end)?;
        if start > end {
            return Err(LoaderError::InvalidConfigValueError {
                field: "start".to_string(),
                value: self.start.clone(),
                reason: format!("start is after end ({})", self.end),
            });
        }
        if self.items.len() > MAX_ITEM_CODES {
            return Err(LoaderError::InvalidConfigValueError {
                field: "items".to_string(),
                value: self.items.join(","),
                reason: format!("at most {} item codes are allowed", MAX_ITEM_CODES),
            });
        }
        Ok(())
    }
}
