//! In-memory data frame used for every tabular result.
//!
//! A [`Table`] is a list of named columns plus rows of JSON-valued cells.
//! Cells stay `serde_json::Value` so API rows, scraped strings and coerced
//! numbers share one representation and serialize straight to JSON.

pub mod output;

pub use output::OutputFormat;

use crate::domain::model::Record;
use crate::utils::error::{LoaderError, Result};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

fn table_error(message: impl Into<String>) -> LoaderError {
    LoaderError::TableError {
        message: message.into(),
    }
}

/// 表格輸出用的字串形式；null 輸出為空字串
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// 將 "1,234.5" 之類的字串轉成數字；空白、"-"、".." 視為缺值
/// 無法解析或非有限值（NaN、inf）時回傳 None
pub fn parse_numeric(raw: &str) -> Option<Value> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned == ".." {
        return Some(Value::Null);
    }
    let looks_integral = !cleaned.contains(['.', 'e', 'E']);
    if looks_integral {
        if let Ok(i) = cleaned.parse::<i64>() {
            return Some(Value::Number(i.into()));
        }
    }
    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        Value::Array(_) | Value::Object(_) => 3,
        Value::Null => 4,
    }
}

fn compare_non_null(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(table_error(format!("duplicate column '{}'", column)));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(table_error(format!(
                "row has {} cells but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// 欄位取所有 Record 的聯集（依首次出現順序），缺值補 null
    pub fn from_records(records: &[Record]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for record in records {
            for key in record.data.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![Value::Null; columns.len()];
                for (key, value) in &record.data {
                    row[positions[key]] = value.clone();
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn from_rows<T: Serialize>(rows: &[T]) -> Result<Self> {
        let records = rows
            .iter()
            .map(Record::from_serialize)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self::from_records(&records))
    }

    pub fn to_records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                let data: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Record { data }
            })
            .collect()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            table_error(format!(
                "unknown column '{}' (available: {})",
                name,
                self.columns.join(", ")
            ))
        })
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        let mut table = Table::new(names.iter().map(|n| n.to_string()).collect())?;
        for row in &self.rows {
            table.rows.push(indices.iter().map(|&i| row[i].clone()).collect());
        }
        Ok(table)
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let idx = self.require_column(from)?;
        if from != to && self.column_index(to).is_some() {
            return Err(table_error(format!("column '{}' already exists", to)));
        }
        self.columns[idx] = to.to_string();
        Ok(())
    }

    pub fn filter<F>(&self, column: &str, predicate: F) -> Result<Table>
    where
        F: Fn(&Value) -> bool,
    {
        let idx = self.require_column(column)?;
        Ok(Table {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| predicate(&row[idx]))
                .cloned()
                .collect(),
        })
    }

    /// 穩定排序；null 永遠排在最後
    pub fn sort_by(&mut self, column: &str, descending: bool) -> Result<()> {
        let idx = self.require_column(column)?;
        self.rows.sort_by(|a, b| match (&a[idx], &b[idx]) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Greater,
            (_, Value::Null) => Ordering::Less,
            (x, y) => {
                let ord = compare_non_null(x, y);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        });
        Ok(())
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// 移除完全相同的列，保留第一筆
    pub fn dedup(&self) -> Table {
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(Value::Array(row.to_vec()).to_string()))
            .cloned()
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn to_numeric(&mut self, column: &str) -> Result<()> {
        let idx = self.require_column(column)?;
        for (row_no, row) in self.rows.iter_mut().enumerate() {
            let converted = match &row[idx] {
                Value::String(raw) => parse_numeric(raw).ok_or_else(|| {
                    table_error(format!(
                        "row {}: '{}' in column '{}' is not numeric",
                        row_no, raw, column
                    ))
                })?,
                other => other.clone(),
            };
            row[idx] = converted;
        }
        Ok(())
    }

    /// 新增常數欄位
    pub fn with_column(&mut self, name: &str, value: Value) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(table_error(format!("column '{}' already exists", name)));
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.clone());
        }
        Ok(())
    }

    /// 依欄位名稱合併；兩邊缺少的欄位補 null
    pub fn concat(&mut self, other: Table) {
        let mut mapping = Vec::with_capacity(other.columns.len());
        for column in &other.columns {
            let idx = match self.column_index(column) {
                Some(idx) => idx,
                None => {
                    self.columns.push(column.clone());
                    for row in &mut self.rows {
                        row.push(Value::Null);
                    }
                    self.columns.len() - 1
                }
            };
            mapping.push(idx);
        }
        let width = self.columns.len();
        for row in other.rows {
            let mut merged = vec![Value::Null; width];
            for (value, &idx) in row.into_iter().zip(&mapping) {
                merged[idx] = value;
            }
            self.rows.push(merged);
        }
    }

    /// 長表轉寬表：`index` 成為第一欄，`columns` 的值成為欄名，填入 `values`
    pub fn pivot(&self, index: &str, columns: &str, values: &str) -> Result<Table> {
        let index_idx = self.require_column(index)?;
        let column_idx = self.require_column(columns)?;
        let value_idx = self.require_column(values)?;

        let mut column_labels: Vec<String> = Vec::new();
        let mut column_pos: HashMap<String, usize> = HashMap::new();
        let mut index_keys: Vec<Value> = Vec::new();
        let mut index_pos: HashMap<String, usize> = HashMap::new();
        let mut cells: HashMap<(usize, usize), Value> = HashMap::new();

        for row in &self.rows {
            let label = cell_to_string(&row[column_idx]);
            let c = *column_pos.entry(label.clone()).or_insert_with(|| {
                column_labels.push(label.clone());
                column_labels.len() - 1
            });
            let key = cell_to_string(&row[index_idx]);
            let r = *index_pos.entry(key.clone()).or_insert_with(|| {
                index_keys.push(row[index_idx].clone());
                index_keys.len() - 1
            });
            if cells.insert((r, c), row[value_idx].clone()).is_some() {
                return Err(table_error(format!(
                    "duplicate entry for {}='{}' and {}='{}'",
                    index, key, columns, label
                )));
            }
        }

        let mut header = vec![index.to_string()];
        header.extend(column_labels.iter().cloned());
        let mut table = Table::new(header)?;
        for (r, key) in index_keys.into_iter().enumerate() {
            let mut row = Vec::with_capacity(column_labels.len() + 1);
            row.push(key);
            for c in 0..column_labels.len() {
                row.push(cells.remove(&(r, c)).unwrap_or(Value::Null));
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    pub fn write_delimited<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(cell_to_string))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_delimited(&mut buffer, delimiter)?;
        String::from_utf8(buffer).map_err(|e| LoaderError::ProcessingError {
            message: format!("delimited output is not UTF-8: {}", e),
        })
    }

    /// 讀入 CSV/TSV；所有欄位為字串，空字串視為 null
    pub fn from_csv_reader<R: Read>(reader: R, delimiter: u8) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(headers)?;
        for record in rdr.records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::String(field.to_string())
                    }
                })
                .collect();
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn to_json(&self) -> Value {
        Value::Array(
            self.to_records()
                .into_iter()
                .map(|record| Value::Object(record.data))
                .collect(),
        )
    }
}
