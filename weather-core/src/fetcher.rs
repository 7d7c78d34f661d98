//! Refresh cycle for one selected city.
//!
//! A refresh runs the observation and forecast retrievals concurrently and
//! publishes their merge as a new [`WeatherRecord`] snapshot. Every refresh
//! (and every city change) takes a fresh generation number; a result is only
//! published while its generation is still the newest, so a slow request can
//! never overwrite the outcome of a later one.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::{
    error::RetrievalError,
    location::{self, LocationInfo},
    model::WeatherRecord,
    provider::WeatherSource,
    store::{self, KeyValueStore},
};

/// What happened to the result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published,
    /// A newer refresh or city selection started first; the result was dropped.
    Superseded,
}

#[derive(Debug)]
pub struct WeatherFetcher {
    source: Box<dyn WeatherSource>,
    store: Box<dyn KeyValueStore>,
    location: &'static LocationInfo,
    generation: AtomicU64,
    record: watch::Sender<WeatherRecord>,
}

impl WeatherFetcher {
    pub fn new(
        source: Box<dyn WeatherSource>,
        store: Box<dyn KeyValueStore>,
        location: &'static LocationInfo,
    ) -> Self {
        let (record, _) = watch::channel(WeatherRecord::placeholder());
        Self {
            source,
            store,
            location,
            generation: AtomicU64::new(0),
            record,
        }
    }

    /// Start with the city saved in `store`, or the default city.
    pub fn restore(
        source: Box<dyn WeatherSource>,
        store: Box<dyn KeyValueStore>,
    ) -> anyhow::Result<Self> {
        let location = store::saved_city(&*store)?;
        tracing::debug!(city = location.city_name, "restored city");
        Ok(Self::new(source, store, location))
    }

    pub fn location(&self) -> &'static LocationInfo {
        self.location
    }

    pub fn snapshot(&self) -> WeatherRecord {
        self.record.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherRecord> {
        self.record.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.record.borrow().is_loading
    }

    /// Switch to `city_name` (the default city if unknown) and persist the
    /// choice. The record is reset and in-flight refreshes become stale.
    pub fn select_city(&mut self, city_name: &str) -> anyhow::Result<&'static LocationInfo> {
        let location = location::resolve_or_default(city_name);
        store::save_city(&mut *self.store, location)?;

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.location = location;
        self.record.send_replace(WeatherRecord::placeholder());

        tracing::info!(city = location.city_name, "city selected");
        Ok(location)
    }

    /// Fetch observation and forecast, then publish their merge.
    ///
    /// On failure the previous record is kept, the loading flag is cleared and
    /// the error is returned. Dropping the future before it completes also
    /// clears the loading flag.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RetrievalError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let location = self.location;

        self.record.send_modify(|rec| rec.is_loading = true);
        let _loading = LoadingGuard { fetcher: self, generation };

        let (observation, forecast) = tokio::try_join!(
            self.source.current_observation(location.station_name),
            self.source.forecast(location.forecast_area),
        )
        .inspect_err(|err| {
            tracing::warn!(city = location.city_name, generation, error = %err, "weather refresh failed");
        })?;

        let merged = WeatherRecord::merge(observation, forecast);
        let published = self.record.send_if_modified(|rec| {
            if !self.is_current(generation) {
                return false;
            }
            *rec = merged;
            true
        });

        if published {
            tracing::info!(city = location.city_name, generation, "weather refreshed");
            Ok(RefreshOutcome::Published)
        } else {
            tracing::debug!(generation, "discarding stale weather result");
            Ok(RefreshOutcome::Superseded)
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Clears the loading flag when a refresh ends without publishing, whether it
/// failed or its future was dropped. A newer refresh keeps its own flag.
struct LoadingGuard<'a> {
    fetcher: &'a WeatherFetcher,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.fetcher.record.send_if_modified(|rec| {
            if !rec.is_loading || !self.fetcher.is_current(self.generation) {
                return false;
            }
            rec.is_loading = false;
            true
        });
    }
}
