use crate::config::toml_config::JobConfig;
use crate::core::{Pipeline, Record, Storage, TransformResult};
use crate::ecos::EcosClient;
use crate::table::Table;
use crate::utils::error::Result;
use crate::utils::progress::{NullProgress, Progress};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use zip::write::{SimpleFileOptions, ZipWriter};

/// 每列標記來源序列的欄位
pub const SERIES_COLUMN: &str = "SERIES";
pub const VALUE_COLUMN: &str = "DATA_VALUE";

/// 依 JobConfig 取回多個 ECOS 序列並輸出成表格
pub struct EcosPipeline<S: Storage> {
    storage: S,
    config: JobConfig,
    client: EcosClient,
    progress: Arc<dyn Progress>,
}

impl<S: Storage> EcosPipeline<S> {
    pub fn new(storage: S, config: JobConfig) -> Result<Self> {
        let client = EcosClient::new(config.client_options()?)?;
        Ok(Self {
            storage,
            config,
            client,
            progress: Arc::new(NullProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    fn metadata(&self, result: &TransformResult) -> Value {
        json!({
            "job": self.config.job.name,
            "description": self.config.job.description,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "rows": result.table.len(),
            "columns": result.table.columns(),
            "series": result
                .series_counts
                .iter()
                .map(|(name, count)| json!({ "name": name, "rows": count }))
                .collect::<Vec<_>>(),
        })
    }
}

fn count_series(table: &Table, names: &[String]) -> Vec<(String, usize)> {
    let values = table.column(SERIES_COLUMN).unwrap_or_default();
    names
        .iter()
        .map(|name| {
            let count = values.iter().filter(|v| v.as_str() == Some(name.as_str())).count();
            (name.clone(), count)
        })
        .collect()
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for EcosPipeline<S> {
    async fn extract(&self) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        for (name, query) in self.config.queries()? {
            tracing::info!(
                "📡 {}: {} {} {}..{}",
                name,
                query.stat_code,
                query.cycle,
                query.start,
                query.end
            );
            let rows = self
                .client
                .statistic_search(&query, self.progress.as_ref())
                .await?;
            if rows.is_empty() {
                tracing::warn!("⚠️ {}: no data for the requested period", name);
            } else {
                tracing::info!("📥 {}: {} rows", name, rows.len());
            }

            for row in &rows {
                let mut record = Record::new();
                record.insert(SERIES_COLUMN, name.clone());
                record.data.extend(Record::from_serialize(row)?.data);
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let names: Vec<String> = self.config.series.iter().map(|s| s.name.clone()).collect();
        let mut table = Table::from_records(&data);
        let series_counts = count_series(&table, &names);

        if table.is_empty() {
            tracing::warn!("⚠️ no rows fetched; writing empty output");
            return Ok(TransformResult {
                table,
                series_counts,
            });
        }

        let transform = &self.config.transform;
        if self.config.numeric() && table.column_index(VALUE_COLUMN).is_some() {
            table.to_numeric(VALUE_COLUMN)?;
        }
        if let Some(pivot) = &transform.pivot {
            table = table.pivot(&pivot.index, &pivot.columns, &pivot.values)?;
            tracing::debug!(
                "🔄 pivoted to {} rows x {} columns",
                table.len(),
                table.columns().len()
            );
        }
        if let Some(columns) = &transform.columns {
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            table = table.select(&names)?;
        }
        if let Some(sort_by) = &transform.sort_by {
            table.sort_by(sort_by, transform.descending.unwrap_or(false))?;
        }

        Ok(TransformResult {
            table,
            series_counts,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<Vec<String>> {
        let formats = self.config.output_formats()?;
        let stem = self.config.file_stem();

        if let Some(compression) = self.config.load.compression.as_ref().filter(|c| c.enabled) {
            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for format in &formats {
                    zip.start_file(
                        format!("{}.{}", stem, format.extension()),
                        SimpleFileOptions::default(),
                    )?;
                    zip.write_all(&format.render(&result.table)?)?;
                }

                zip.start_file("metadata.json", SimpleFileOptions::default())?;
                zip.write_all(&serde_json::to_vec_pretty(&self.metadata(&result))?)?;

                zip.finish()?.into_inner()
            };

            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage
                .write_file(&compression.filename, &zip_data)
                .await?;
            return Ok(vec![self.storage.display_path(&compression.filename)]);
        }

        let mut written = Vec::with_capacity(formats.len());
        for format in &formats {
            let filename = format!("{}.{}", stem, format.extension());
            let bytes = format.render(&result.table)?;
            self.storage.write_file(&filename, &bytes).await?;
            tracing::debug!("💾 {} ({} bytes)", filename, bytes.len());
            written.push(self.storage.display_path(&filename));
        }
        Ok(written)
    }
}
