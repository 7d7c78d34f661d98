use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{
    error::RetrievalError,
    model::{ForecastSummary, Observation},
    sun::taipei_now,
};

use super::WeatherSource;

/// Automatic station current observations.
const OBSERVATION_DATASET: &str = "O-A0003-001";
/// 36-hour general forecast per county.
const FORECAST_DATASET: &str = "F-C0032-001";

/// Client for the CWA open-data datastore.
#[derive(Debug, Clone)]
pub struct CwaClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl CwaClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    async fn get_dataset<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        dataset: &str,
        filter: (&str, &str),
    ) -> Result<T, RetrievalError> {
        let url = format!("{}/{}", self.base_url, dataset);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("Authorization", self.api_key.as_str()),
                ("format", "JSON"),
                filter,
            ])
            .send()
            .await
            .map_err(|source| RetrievalError::Network { endpoint, source })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| RetrievalError::Network { endpoint, source })?;

        if !status.is_success() {
            return Err(RetrievalError::Status {
                endpoint,
                status,
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| RetrievalError::Parse { endpoint, source })
    }
}

#[async_trait]
impl WeatherSource for CwaClient {
    async fn current_observation(&self, station: &str) -> Result<Observation, RetrievalError> {
        let parsed: ObsResponse = self
            .get_dataset("observation", OBSERVATION_DATASET, ("StationName", station))
            .await?;

        let record = parsed
            .records
            .station
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::MissingStation(station.to_string()))?;

        let element = record.weather_element.unwrap_or_default();

        Ok(Observation {
            observation_time: record.obs_time.and_then(|t| t.date_time),
            station_name: record.station_name,
            description: element.weather,
            temperature_c: element.air_temperature,
            wind_speed_mps: element.wind_speed,
            humidity_pct: element.relative_humidity,
        })
    }

    async fn forecast(&self, area: &str) -> Result<ForecastSummary, RetrievalError> {
        let parsed: ForecastResponse = self
            .get_dataset("forecast", FORECAST_DATASET, ("locationName", area))
            .await?;

        let location = parsed
            .records
            .location
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::MissingArea(area.to_string()))?;

        Ok(summarize_forecast(&location.weather_element, taipei_now()))
    }
}

#[derive(Debug, Deserialize)]
struct ObsResponse {
    records: ObsRecords,
}

#[derive(Debug, Deserialize)]
struct ObsRecords {
    #[serde(rename = "Station", default)]
    station: Vec<ObsStation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObsStation {
    station_name: Option<String>,
    obs_time: Option<ObsTime>,
    weather_element: Option<ObsWeatherElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObsTime {
    date_time: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObsWeatherElement {
    weather: Option<String>,
    air_temperature: Option<f64>,
    wind_speed: Option<f64>,
    relative_humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    records: ForecastRecords,
}

#[derive(Debug, Deserialize)]
struct ForecastRecords {
    #[serde(default)]
    location: Vec<ForecastLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastLocation {
    #[serde(default)]
    weather_element: Vec<ForecastElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastElement {
    element_name: String,
    #[serde(default)]
    time: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastSlot {
    end_time: Option<String>,
    parameter: ForecastParameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastParameter {
    parameter_name: Option<String>,
    parameter_value: Option<String>,
}

/// Picks `Wx`, `PoP` and `CI` from the element list. Elements without any
/// time slot leave their fields unset.
fn summarize_forecast(elements: &[ForecastElement], now: NaiveDateTime) -> ForecastSummary {
    let mut summary = ForecastSummary::default();

    for element in elements {
        let Some(slot) = nearest_slot(&element.time, now) else {
            tracing::debug!(element = %element.element_name, "forecast element has no time slots");
            continue;
        };
        let param = &slot.parameter;

        match element.element_name.as_str() {
            "Wx" => {
                summary.forecast_description = param.parameter_name.clone();
                summary.weather_code = param
                    .parameter_value
                    .as_deref()
                    .and_then(|v| v.trim().parse().ok());
            }
            "PoP" => {
                summary.rain_possibility_pct = param
                    .parameter_name
                    .as_deref()
                    .and_then(|v| v.trim().parse::<u8>().ok())
                    .filter(|pct| *pct <= 100);
            }
            "CI" => summary.comfortability = param.parameter_name.clone(),
            _ => {}
        }
    }

    summary
}

/// First slot still running at `now`; the first slot when none is, since CWA
/// lists slots in chronological order.
fn nearest_slot(slots: &[ForecastSlot], now: NaiveDateTime) -> Option<&ForecastSlot> {
    slots
        .iter()
        .find(|slot| {
            slot.end_time
                .as_deref()
                .and_then(parse_slot_time)
                .is_some_and(|end| end > now)
        })
        .or_else(|| slots.first())
}

fn parse_slot_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CwaClient {
        CwaClient::new(&server.uri(), "TEST-KEY".into(), Duration::from_secs(5)).unwrap()
    }

    fn taipei_station() -> serde_json::Value {
        json!({
            "success": "true",
            "records": {
                "Station": [{
                    "StationName": "臺北",
                    "StationId": "466920",
                    "ObsTime": { "DateTime": "2024-03-01T14:00:00+08:00" },
                    "WeatherElement": {
                        "Weather": "多雲",
                        "AirTemperature": 23.4,
                        "WindSpeed": 2.1,
                        "RelativeHumidity": 60
                    }
                }]
            }
        })
    }

    fn slot(end: &str, name: &str, value: Option<&str>) -> serde_json::Value {
        json!({
            "startTime": "2024-03-01 06:00:00",
            "endTime": end,
            "parameter": { "parameterName": name, "parameterValue": value }
        })
    }

    fn parse_elements(value: serde_json::Value) -> Vec<ForecastElement> {
        serde_json::from_value(value).unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[tokio::test]
    async fn observation_fields_are_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/O-A0003-001"))
            .and(query_param("Authorization", "TEST-KEY"))
            .and(query_param("format", "JSON"))
            .and(query_param("StationName", "臺北"))
            .respond_with(ResponseTemplate::new(200).set_body_json(taipei_station()))
            .mount(&server)
            .await;

        let obs = client(&server).current_observation("臺北").await.unwrap();

        assert_eq!(obs.station_name.as_deref(), Some("臺北"));
        assert_eq!(obs.description.as_deref(), Some("多雲"));
        assert_eq!(obs.temperature_c, Some(23.4));
        assert_eq!(obs.wind_speed_mps, Some(2.1));
        assert_eq!(obs.humidity_pct, Some(60.0));
        assert_eq!(
            obs.observation_time,
            DateTime::parse_from_rfc3339("2024-03-01T14:00:00+08:00").ok()
        );
    }

    #[tokio::test]
    async fn missing_weather_fields_stay_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/O-A0003-001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": { "Station": [{ "StationName": "臺北" }] }
            })))
            .mount(&server)
            .await;

        let obs = client(&server).current_observation("臺北").await.unwrap();
        assert_eq!(obs.station_name.as_deref(), Some("臺北"));
        assert!(obs.temperature_c.is_none());
        assert!(obs.observation_time.is_none());
    }

    #[tokio::test]
    async fn empty_station_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/O-A0003-001"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "records": { "Station": [] } })),
            )
            .mount(&server)
            .await;

        let err = client(&server).current_observation("臺北").await.unwrap_err();
        assert!(matches!(err, RetrievalError::MissingStation(ref s) if s == "臺北"));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/O-A0003-001"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = client(&server).current_observation("臺北").await.unwrap_err();
        match err {
            RetrievalError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/F-C0032-001"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let err = client(&server).forecast("臺北市").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Parse { endpoint: "forecast", .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let uri = format!("http://127.0.0.1:{port}");
        let c = CwaClient::new(&uri, "KEY".into(), Duration::from_secs(1)).unwrap();
        let err = c.current_observation("臺北").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Network { .. }));
    }

    #[tokio::test]
    async fn forecast_with_empty_pop_leaves_rain_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/F-C0032-001"))
            .and(query_param("locationName", "臺北市"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": {
                    "location": [{
                        "locationName": "臺北市",
                        "weatherElement": [
                            { "elementName": "Wx", "time": [slot("2099-01-01 18:00:00", "多雲時晴", Some("3"))] },
                            { "elementName": "PoP", "time": [] },
                            { "elementName": "MinT", "time": [slot("2099-01-01 18:00:00", "18", None)] },
                            { "elementName": "CI", "time": [slot("2099-01-01 18:00:00", "舒適", None)] }
                        ]
                    }]
                }
            })))
            .mount(&server)
            .await;

        let summary = client(&server).forecast("臺北市").await.unwrap();

        assert_eq!(summary.rain_possibility_pct, None);
        assert_eq!(summary.forecast_description.as_deref(), Some("多雲時晴"));
        assert_eq!(summary.weather_code, Some(3));
        assert_eq!(summary.comfortability.as_deref(), Some("舒適"));
    }

    #[tokio::test]
    async fn empty_location_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/F-C0032-001"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "records": { "location": [] } })),
            )
            .mount(&server)
            .await;

        let err = client(&server).forecast("臺北市").await.unwrap_err();
        assert!(matches!(err, RetrievalError::MissingArea(ref s) if s == "臺北市"));
    }

    #[test]
    fn nearest_slot_skips_finished_slots() {
        let elements = parse_elements(json!([{
            "elementName": "PoP",
            "time": [
                slot("2024-03-01 18:00:00", "10", None),
                slot("2024-03-02 06:00:00", "40", None),
                slot("2024-03-02 18:00:00", "70", None)
            ]
        }]));

        let summary = summarize_forecast(&elements, at("2024-03-01 20:00:00"));
        assert_eq!(summary.rain_possibility_pct, Some(40));
    }

    #[test]
    fn nearest_slot_falls_back_to_first_when_all_finished() {
        let elements = parse_elements(json!([{
            "elementName": "CI",
            "time": [
                slot("2024-03-01 18:00:00", "舒適", None),
                slot("2024-03-02 06:00:00", "寒冷", None)
            ]
        }]));

        let summary = summarize_forecast(&elements, at("2024-03-05 00:00:00"));
        assert_eq!(summary.comfortability.as_deref(), Some("舒適"));
    }

    #[test]
    fn out_of_range_pop_is_dropped() {
        let elements = parse_elements(json!([
            { "elementName": "PoP", "time": [slot("2099-01-01 00:00:00", "250", None)] }
        ]));

        let summary = summarize_forecast(&elements, at("2024-03-01 00:00:00"));
        assert_eq!(summary.rain_possibility_pct, None);
    }

    #[test]
    fn slot_times_accept_rfc3339() {
        assert_eq!(
            parse_slot_time("2024-03-01T18:00:00+08:00"),
            Some(at("2024-03-01 18:00:00"))
        );
        assert!(parse_slot_time("tomorrow").is_none());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "臺".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
