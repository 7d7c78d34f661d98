//! Core library for the CWA weather dashboard.
//!
//! This crate defines:
//! - Configuration & the persisted city selection
//! - The city → station/forecast-area table
//! - The CWA open-data client behind the `WeatherSource` abstraction
//! - The refresh cycle that merges observation and forecast into one record
//! - The day/night moment derived from sunrise/sunset data
//!
//! It is used by `cwa-weather`, but can also be reused by other front ends.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod location;
pub mod model;
pub mod provider;
pub mod store;
pub mod sun;

pub use config::Config;
pub use error::RetrievalError;
pub use fetcher::{RefreshOutcome, WeatherFetcher};
pub use location::{LocationInfo, resolve};
pub use model::{ForecastSummary, Observation, WeatherRecord};
pub use provider::{WeatherSource, source_from_config};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use sun::{Moment, SunTable};
