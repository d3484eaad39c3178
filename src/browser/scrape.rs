use crate::browser::webdriver::WebDriverClient;
use crate::table::Table;
use crate::utils::error::{LoaderError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// 在頁面內執行：回傳 `{ header: [...], rows: [[...], ...] }`，找不到表格時回傳 null
pub const EXTRACT_TABLE_SCRIPT: &str = r#"
const table = document.querySelector(arguments[0]);
if (!table) { return null; }
const text = (cell) => (cell.innerText || cell.textContent || '').trim();
const rows = Array.from(table.querySelectorAll('tr'));
let header = [];
let body = rows;
const headRow = table.querySelector('thead tr');
if (headRow) {
  header = Array.from(headRow.cells).map(text);
  body = rows.filter((r) => r.parentElement.tagName !== 'THEAD');
} else if (rows.length && rows[0].querySelector('th')) {
  header = Array.from(rows[0].cells).map(text);
  body = rows.slice(1);
}
return { header: header, rows: body.map((r) => Array.from(r.cells).map(text)) };
"#;

fn as_strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|cells| {
            cells
                .iter()
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// 表頭正規化：空白補 `column_{n}`，重複名稱加上 `_2`、`_3`
fn normalize_header(raw: Vec<String>, width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    (0..width)
        .map(|i| {
            let base = raw
                .get(i)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("column_{}", i + 1));
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// 把擷取腳本的結果轉成 Table；列寬以表頭為準，沒有表頭時取最寬的一列
pub fn table_from_extracted(value: Value) -> Result<Table> {
    if value.is_null() {
        return Err(LoaderError::ProcessingError {
            message: "no table matched the selector".to_string(),
        });
    }

    let header = as_strings(&value["header"]);
    let rows: Vec<Vec<String>> = value["rows"]
        .as_array()
        .map(|rows| rows.iter().map(as_strings).collect())
        .unwrap_or_default();
    let rows: Vec<Vec<String>> = rows.into_iter().filter(|r| !r.is_empty()).collect();

    let width = if header.is_empty() {
        rows.iter().map(Vec::len).max().unwrap_or(0)
    } else {
        header.len()
    };

    let mut table = Table::new(normalize_header(header, width))?;
    for mut row in rows {
        row.resize(width, String::new());
        table.push_row(
            row.into_iter()
                .map(|cell| if cell.is_empty() { Value::Null } else { Value::String(cell) })
                .collect(),
        )?;
    }
    Ok(table)
}

/// 以瀏覽器開啟頁面並擷取 HTML 表格
pub struct TableScraper<'a> {
    driver: &'a WebDriverClient,
    timeout: Duration,
    interval: Duration,
}

impl<'a> TableScraper<'a> {
    pub fn new(driver: &'a WebDriverClient) -> Self {
        Self {
            driver,
            timeout: Duration::from_secs(20),
            interval: Duration::from_millis(250),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn scrape_table(&self, url: &str, selector: &str) -> Result<Table> {
        self.driver.goto(url).await?;
        self.driver
            .wait_for(selector, self.timeout, self.interval)
            .await?;
        let extracted = self
            .driver
            .execute(EXTRACT_TABLE_SCRIPT, vec![Value::String(selector.to_string())])
            .await?;
        let table = table_from_extracted(extracted)?;
        tracing::info!(
            "🧾 scraped {} rows x {} columns from {}",
            table.len(),
            table.columns().len(),
            url
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_and_ragged_rows() {
        let table = table_from_extracted(json!({
            "header": ["시점", "", "값", "값"],
            "rows": [["2020", "a", "1.5"], ["2021", "b", "2.0", "x", "overflow"], []]
        }))
        .unwrap();
        assert_eq!(table.columns(), &["시점", "column_2", "값", "값_2"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "값_2"), Some(&Value::Null));
        assert_eq!(table.get(1, "값_2"), Some(&json!("x")));
    }

    #[test]
    fn test_headerless_table_uses_widest_row() {
        let table = table_from_extracted(json!({
            "header": [],
            "rows": [["a"], ["b", "c"]]
        }))
        .unwrap();
        assert_eq!(table.columns(), &["column_1", "column_2"]);
        assert_eq!(table.get(0, "column_2"), Some(&Value::Null));
    }

    #[test]
    fn test_null_means_no_table() {
        assert!(table_from_extracted(Value::Null).is_err());
    }
}
