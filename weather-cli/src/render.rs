use cwa_weather_core::{LocationInfo, Moment, WeatherRecord};

const MISSING: &str = "--";

/// Text rendering of the weather card.
pub fn card(location: &LocationInfo, record: &WeatherRecord, moment: Moment) -> String {
    let title = record.station_name.as_deref().unwrap_or(location.city_name);
    let summary = record.summary().unwrap_or(MISSING);
    let description = match record.comfortability.as_deref() {
        Some(ci) => format!("{summary} {ci}"),
        None => summary.to_string(),
    };

    let observed = record
        .observation_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| MISSING.to_string());
    let refreshing = if record.is_loading { " (refreshing...)" } else { "" };

    let lines = [
        format!("{title}  ({} · {moment})", location.city_name),
        description,
        format!("{} °C", opt(record.display_temperature())),
        format!("Wind      {} m/s", opt(record.wind_speed_mps)),
        format!("Humidity  {} %", opt(record.humidity_pct.map(|h| h.round() as i64))),
        format!("Rain      {} %", opt(record.rain_possibility_pct)),
        format!("Last observed {observed}{refreshing}"),
    ];

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| MISSING.to_string())
}
