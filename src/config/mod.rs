pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use self::args::{CliConfig, Command, OutputArgs};

#[cfg(feature = "cli")]
mod args {
    use crate::domain::ports::ConfigProvider;
    use crate::ecos::client::{ClientOptions, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};
    use crate::ecos::Language;
    use crate::utils::error::Result;
    use clap::{Args, Parser, Subcommand};
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "ecosloader", version)]
    #[command(about = "Load Bank of Korea ECOS statistics into tables")]
    pub struct CliConfig {
        /// ECOS Open API key
        #[arg(long, env = "ECOS_API_KEY", global = true, hide_env_values = true)]
        pub api_key: Option<String>,

        #[arg(long, env = "ECOS_BASE_URL", global = true, default_value = DEFAULT_BASE_URL)]
        pub base_url: String,

        /// Response language: kr or en
        #[arg(long, global = true, default_value = "kr")]
        pub language: String,

        #[arg(long, global = true, default_value_t = 4)]
        pub concurrent_requests: usize,

        #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
        pub page_size: usize,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Hide progress bars")]
        pub no_progress: bool,

        #[arg(long, global = true, help = "Emit logs as JSON")]
        pub json_logs: bool,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Args)]
    pub struct OutputArgs {
        /// csv, tsv or json
        #[arg(long, default_value = "csv")]
        pub format: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        pub output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Subcommand)]
    pub enum Command {
        /// Fetch observations of one statistic (StatisticSearch)
        Search {
            #[arg(long)]
            stat_code: String,
            /// A, S, Q, M, SM or D
            #[arg(long)]
            cycle: String,
            #[arg(long)]
            start: String,
            #[arg(long)]
            end: String,
            /// Item codes, up to four levels
            #[arg(long = "item", value_delimiter = ',')]
            items: Vec<String>,
            /// Wide layout: TIME rows, one column per item
            #[arg(long)]
            pivot: bool,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// List statistic tables (StatisticTableList)
        Tables {
            #[arg(long)]
            stat_code: Option<String>,
            /// Only tables that accept StatisticSearch queries
            #[arg(long)]
            searchable: bool,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// List items of a statistic table (StatisticItemList)
        Items {
            #[arg(long)]
            stat_code: String,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// The 100 key statistics (KeyStatisticList)
        KeyStats {
            #[command(flatten)]
            output: OutputArgs,
        },
        /// Look up the statistical glossary (StatisticWord)
        Word {
            word: String,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// Statistic metadata (StatisticMeta)
        Meta {
            name: String,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// Run a TOML job file
        Run {
            #[arg(short, long, default_value = "ecosloader.toml")]
            config: PathBuf,
            /// Validate and print the plan without fetching
            #[arg(long)]
            dry_run: bool,
        },
        /// Scrape an HTML table from a page rendered in Chrome
        Scrape {
            #[arg(long)]
            url: String,
            #[arg(long, default_value = "table")]
            selector: String,
            /// Show the browser window
            #[arg(long)]
            headed: bool,
            /// Path of an existing chromedriver
            #[arg(long)]
            driver: Option<PathBuf>,
            /// Chrome version to fetch a driver for (default: detect)
            #[arg(long)]
            browser_version: Option<String>,
            /// URL of a running WebDriver server
            #[arg(long)]
            remote: Option<String>,
            #[arg(long, default_value_t = 20)]
            timeout_seconds: u64,
            #[command(flatten)]
            output: OutputArgs,
        },
        /// Download chromedriver into the cache and print its path
        Driver {
            /// "auto" to match the installed Chrome, "latest", or a version
            #[arg(long, default_value = "auto")]
            version: String,
        },
    }

    impl CliConfig {
        pub fn client_options(&self) -> Result<ClientOptions> {
            Ok(ClientOptions::from_provider(self)
                .with_base_url(&self.base_url)
                .with_language(self.language.parse::<Language>()?)
                .with_page_size(self.page_size))
        }
    }

    impl ConfigProvider for CliConfig {
        fn api_key(&self) -> &str {
            self.api_key.as_deref().unwrap_or_default()
        }

        fn output_path(&self) -> &str {
            "."
        }

        fn concurrent_requests(&self) -> usize {
            self.concurrent_requests
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_search_command() {
            let config = CliConfig::try_parse_from([
                "ecosloader",
                "--api-key",
                "KEY",
                "search",
                "--stat-code",
                "722Y001",
                "--cycle",
                "M",
                "--start",
                "202001",
                "--end",
                "202012",
                "--item",
                "0101000",
                "--pivot",
                "--format",
                "json",
            ])
            .unwrap();
            match &config.command {
                Command::Search {
                    stat_code,
                    items,
                    pivot,
                    output,
                    ..
                } => {
                    assert_eq!(stat_code, "722Y001");
                    assert_eq!(items, &vec!["0101000".to_string()]);
                    assert!(*pivot);
                    assert_eq!(output.format, "json");
                }
                other => panic!("unexpected command {:?}", other),
            }
            let options = config.client_options().unwrap();
            assert_eq!(options.api_key, "KEY");
            assert_eq!(options.concurrency, 4);
        }

        #[test]
        fn test_global_flags_after_subcommand() {
            let config = CliConfig::try_parse_from([
                "ecosloader",
                "key-stats",
                "--api-key",
                "K",
                "--language",
                "en",
                "-v",
            ])
            .unwrap();
            assert!(config.verbose);
            assert_eq!(
                config.client_options().unwrap().language,
                Language::English
            );
        }
    }
}
