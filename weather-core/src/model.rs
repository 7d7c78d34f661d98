use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Current conditions reported by one observation station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub observation_time: Option<DateTime<FixedOffset>>,
    pub station_name: Option<String>,
    pub description: Option<String>,
    pub temperature_c: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub humidity_pct: Option<f64>,
}

/// The `Wx`, `PoP` and `CI` values of the nearest forecast slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub weather_code: Option<u32>,
    pub forecast_description: Option<String>,
    pub rain_possibility_pct: Option<u8>,
    pub comfortability: Option<String>,
}

/// Snapshot rendered by the dashboard.
///
/// Observation and forecast fields are disjoint, so a merge never has to pick
/// a winner. Fields stay `None` until a refresh fills them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub observation_time: Option<DateTime<FixedOffset>>,
    pub station_name: Option<String>,
    pub description: Option<String>,
    pub temperature_c: Option<f64>,
    pub wind_speed_mps: Option<f64>,
    pub humidity_pct: Option<f64>,

    pub weather_code: Option<u32>,
    pub forecast_description: Option<String>,
    pub rain_possibility_pct: Option<u8>,
    pub comfortability: Option<String>,

    pub is_loading: bool,
}

impl WeatherRecord {
    /// Initial state before the first refresh completes.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn merge(observation: Observation, forecast: ForecastSummary) -> Self {
        Self {
            observation_time: observation.observation_time,
            station_name: observation.station_name,
            description: observation.description,
            temperature_c: observation.temperature_c,
            wind_speed_mps: observation.wind_speed_mps,
            humidity_pct: observation.humidity_pct,
            weather_code: forecast.weather_code,
            forecast_description: forecast.forecast_description,
            rain_possibility_pct: forecast.rain_possibility_pct,
            comfortability: forecast.comfortability,
            is_loading: false,
        }
    }

    /// Temperature rounded for display; the stored value is untouched.
    pub fn display_temperature(&self) -> Option<i64> {
        self.temperature_c.map(|t| t.round() as i64)
    }

    /// Station description, or the forecast text when the station reports none.
    pub fn summary(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.forecast_description.as_deref())
    }
}
