//! Client for the Bank of Korea ECOS Open API.
//!
//! Every service shares one URL layout and one JSON envelope; [`client`] pages
//! through results, [`model`] holds the row types and envelope parsing.

pub mod client;
pub mod cycle;
pub mod model;
pub mod query;

pub use client::{ClientOptions, EcosClient, Language, DEFAULT_BASE_URL};
pub use cycle::Cycle;
pub use model::{
    ItemInfo, KeyStatistic, MetaEntry, Service, StatisticRow, TableInfo, WordEntry,
};
pub use query::SeriesQuery;
