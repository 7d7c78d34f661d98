use crate::{
    Config,
    error::RetrievalError,
    model::{ForecastSummary, Observation},
    provider::cwa::CwaClient,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod cwa;

/// The two remote retrievals a refresh needs.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current_observation(&self, station: &str) -> Result<Observation, RetrievalError>;

    async fn forecast(&self, area: &str) -> Result<ForecastSummary, RetrievalError>;
}

/// Construct the CWA client from config.
pub fn source_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherSource>> {
    let api_key = config.api_key()?;
    let client = CwaClient::new(config.base_url(), api_key.to_owned(), config.timeout())?;
    Ok(Box::new(client))
}
