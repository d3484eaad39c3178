pub mod browser;
pub mod config;
pub mod core;
pub mod domain;
pub mod ecos;
pub mod table;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{cli::LocalStorage, toml_config::JobConfig};
pub use self::core::{etl::EtlEngine, pipeline::EcosPipeline};
pub use ecos::{ClientOptions, Cycle, EcosClient, SeriesQuery};
pub use table::{OutputFormat, Table};
pub use utils::error::{LoaderError, Result};
