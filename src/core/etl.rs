use crate::core::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// 依序執行 extract / transform / load，回傳寫出的檔案路徑
    pub async fn run(&self) -> Result<Vec<String>> {
        let started = Instant::now();
        tracing::info!("🚀 Starting ETL process");

        // Extract
        let stage = Instant::now();
        let raw_data = self.pipeline.extract().await?;
        tracing::info!(
            "📊 Extracted {} records in {:.2?}",
            raw_data.len(),
            stage.elapsed()
        );

        // Transform
        let stage = Instant::now();
        let result = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "🔄 Transformed into {} rows x {} columns in {:.2?}",
            result.table.len(),
            result.table.columns().len(),
            stage.elapsed()
        );

        // Load
        let stage = Instant::now();
        let written = self.pipeline.load(result).await?;
        tracing::info!(
            "💾 Wrote {} file(s) in {:.2?}",
            written.len(),
            stage.elapsed()
        );

        tracing::info!("✅ ETL process finished in {:.2?}", started.elapsed());
        Ok(written)
    }
}
