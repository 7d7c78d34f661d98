//! Day/night moment derived from a sunrise/sunset dataset.
//!
//! The dataset uses the CWA sunrise/sunset layout: a list of counties, each
//! carrying one row per calendar date with local `HH:MM` sunrise and sunset
//! times.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Asia::Taipei;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fs, path::Path};

/// Current wall-clock time in Taiwan.
pub fn taipei_now() -> NaiveDateTime {
    taipei_local(Utc::now())
}

/// Wall-clock time in Taiwan at the instant `utc`.
pub fn taipei_local(utc: DateTime<Utc>) -> NaiveDateTime {
    utc.with_timezone(&Taipei).naive_local()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Moment {
    #[default]
    Day,
    Night,
}

impl Moment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Moment::Day => "day",
            Moment::Night => "night",
        }
    }
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCounty {
    location_name: String,
    time: Vec<RawDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDay {
    data_time: String,
    sunrise: String,
    sunset: String,
}

/// Read-only sunrise/sunset lookup, keyed by county then date.
#[derive(Debug, Clone, Default)]
pub struct SunTable {
    counties: HashMap<String, HashMap<NaiveDate, SunTimes>>,
}

impl SunTable {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: Vec<RawCounty> =
            serde_json::from_str(json).context("Failed to parse sunrise/sunset JSON")?;

        let mut counties: HashMap<String, HashMap<NaiveDate, SunTimes>> = HashMap::new();
        for county in raw {
            let days = counties.entry(county.location_name.clone()).or_default();
            for day in county.time {
                let date = NaiveDate::parse_from_str(&day.data_time, "%Y-%m-%d").with_context(
                    || format!("Invalid date '{}' for {}", day.data_time, county.location_name),
                )?;
                let times = SunTimes {
                    sunrise: parse_clock(&day.sunrise)?,
                    sunset: parse_clock(&day.sunset)?,
                };
                // First row for a (county, date) pair wins.
                if days.contains_key(&date) {
                    tracing::debug!(county = %county.location_name, %date, "duplicate sun entry ignored");
                    continue;
                }
                days.insert(date, times);
            }
        }

        Ok(Self { counties })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sunrise/sunset file: {}", path.display()))?;
        Self::from_json_str(&contents)
            .with_context(|| format!("Invalid sunrise/sunset file: {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn times(&self, county: &str, date: NaiveDate) -> Option<SunTimes> {
        self.counties.get(county)?.get(&date).copied()
    }

    /// Day when `sunrise <= now <= sunset` on `now`'s date, night otherwise.
    /// `None` when the county or the date is missing from the table.
    pub fn moment(&self, county: &str, now: NaiveDateTime) -> Option<Moment> {
        let date = now.date();
        let times = self.times(county, date)?;

        let sunrise = date.and_time(times.sunrise);
        let sunset = date.and_time(times.sunset);

        if sunrise <= now && now <= sunset {
            Some(Moment::Day)
        } else {
            Some(Moment::Night)
        }
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .with_context(|| format!("Invalid time of day '{s}'"))
}
