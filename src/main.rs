use clap::Parser;
use ecosloader::browser::{BrowserOptions, BrowserSession, ChromeOptions, DriverManager, DriverVersion, TableScraper};
use ecosloader::config::{Command, OutputArgs};
use ecosloader::core::pipeline::VALUE_COLUMN;
use ecosloader::utils::error::{ErrorSeverity, LoaderError, Result};
use ecosloader::utils::logger;
use ecosloader::utils::progress::{ConsoleProgress, NullProgress, Progress};
use ecosloader::utils::validation::Validate;
use ecosloader::{CliConfig, EcosClient, EcosPipeline, EtlEngine, JobConfig, LocalStorage, OutputFormat, SeriesQuery, Table};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config.command);

    if let Err(e) = run(config).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::debug!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }
}

fn progress(config: &CliConfig) -> Arc<dyn Progress> {
    if config.no_progress {
        Arc::new(NullProgress)
    } else {
        Arc::new(ConsoleProgress::new())
    }
}

fn client(config: &CliConfig) -> Result<EcosClient> {
    EcosClient::new(config.client_options()?)
}

/// 將表格輸出到 stdout 或指定檔案
fn emit(table: &Table, output: &OutputArgs) -> Result<()> {
    let format: OutputFormat = output.format.parse()?;
    let bytes = format.render(table)?;
    match &output.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &bytes)?;
            tracing::info!("📁 {} rows written to {}", table.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run(config: CliConfig) -> Result<()> {
    let progress = progress(&config);

    match &config.command {
        Command::Search {
            stat_code,
            cycle,
            start,
            end,
            items,
            pivot,
            output,
        } => {
            let query = SeriesQuery::new(stat_code, cycle.parse()?, start, end)
                .with_items(items.iter().cloned());
            query.validate()?;
            let rows = client(&config)?
                .statistic_search(&query, progress.as_ref())
                .await?;
            if rows.is_empty() {
                tracing::warn!("⚠️ No data for {} {}..{}", stat_code, start, end);
            }

            let mut table = Table::from_rows(&rows)?;
            if !table.is_empty() {
                table.to_numeric(VALUE_COLUMN)?;
                if *pivot {
                    table = table.pivot("TIME", "ITEM_NAME1", VALUE_COLUMN)?;
                }
            }
            emit(&table, output)
        }
        Command::Tables {
            stat_code,
            searchable,
            output,
        } => {
            let mut tables = client(&config)?
                .statistic_tables(stat_code.as_deref(), progress.as_ref())
                .await?;
            if *searchable {
                tables.retain(|t| t.is_searchable());
            }
            emit(&Table::from_rows(&tables)?, output)
        }
        Command::Items { stat_code, output } => {
            let items = client(&config)?
                .statistic_items(stat_code, progress.as_ref())
                .await?;
            emit(&Table::from_rows(&items)?, output)
        }
        Command::KeyStats { output } => {
            let stats = client(&config)?.key_statistics(progress.as_ref()).await?;
            emit(&Table::from_rows(&stats)?, output)
        }
        Command::Word { word, output } => {
            let entries = client(&config)?
                .statistic_word(word, progress.as_ref())
                .await?;
            emit(&Table::from_rows(&entries)?, output)
        }
        Command::Meta { name, output } => {
            let entries = client(&config)?
                .statistic_meta(name, progress.as_ref())
                .await?;
            emit(&Table::from_rows(&entries)?, output)
        }
        Command::Run {
            config: path,
            dry_run,
        } => run_job(path, *dry_run, progress).await,
        Command::Scrape {
            url,
            selector,
            headed,
            driver,
            browser_version,
            remote,
            timeout_seconds,
            output,
        } => {
            let options = BrowserOptions {
                chrome: ChromeOptions {
                    headless: !headed,
                    ..ChromeOptions::default()
                },
                driver_path: driver.clone(),
                browser_version: browser_version
                    .as_deref()
                    .map(str::parse::<DriverVersion>)
                    .transpose()?,
                remote_url: remote.clone(),
                ..BrowserOptions::default()
            };

            let session = BrowserSession::launch(&options).await?;
            let scraped = TableScraper::new(session.client())
                .with_timeout(Duration::from_secs(*timeout_seconds))
                .scrape_table(url, selector)
                .await;
            // 不論成功與否都要關閉瀏覽器
            if let Err(e) = session.close().await {
                tracing::warn!("⚠️ Failed to close browser session: {}", e);
            }
            let table = scraped?;
            tracing::info!("🌐 Scraped {} rows from {}", table.len(), url);
            emit(&table, output)
        }
        Command::Driver { version } => {
            let manager = DriverManager::new()?;
            let path = if version.eq_ignore_ascii_case("auto") {
                manager.install_for_local_browser().await?
            } else {
                manager.install(&version.parse()?).await?
            };
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn run_job(path: &std::path::Path, dry_run: bool, progress: Arc<dyn Progress>) -> Result<()> {
    if !path.exists() {
        return Err(LoaderError::MissingConfigError {
            field: path.display().to_string(),
        });
    }
    let job = JobConfig::from_file(path)?;
    job.validate()?;
    tracing::info!("📋 Loaded job '{}' with {} series", job.job.name, job.series.len());

    if dry_run {
        for (name, query) in job.queries()? {
            println!(
                "{}\t{}\t{}\t{}..{}\t{}",
                name,
                query.stat_code,
                query.cycle,
                query.start,
                query.end,
                query.items.join("/")
            );
        }
        println!(
            "output: {}/{}.{{{}}}",
            job.load.output_path,
            job.file_stem(),
            job.load.output_formats.join(",")
        );
        return Ok(());
    }

    let storage = LocalStorage::new(job.load.output_path.clone());
    let pipeline = EcosPipeline::new(storage, job)?.with_progress(progress);
    let engine = EtlEngine::new(pipeline);
    let written = engine.run().await?;

    for path in &written {
        println!("📁 {}", path);
    }
    Ok(())
}
