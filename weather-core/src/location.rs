use serde::Serialize;

/// City shown when nothing has been selected yet, or when a stored name no
/// longer matches the table.
pub const DEFAULT_CITY: &str = "臺北市";

/// Identifiers needed to query CWA for one city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocationInfo {
    /// Display name, also the value persisted as the selected city.
    pub city_name: &'static str,
    /// Observation station queried for current conditions (O-A0003-001).
    pub station_name: &'static str,
    /// Forecast area queried for the 36-hour forecast (F-C0032-001).
    pub forecast_area: &'static str,
    /// County key in the sunrise/sunset dataset.
    pub sun_county: &'static str,
}

const fn entry(city: &'static str, station: &'static str) -> LocationInfo {
    LocationInfo {
        city_name: city,
        station_name: station,
        forecast_area: city,
        sun_county: city,
    }
}

static LOCATIONS: [LocationInfo; 22] = [
    entry("臺北市", "臺北"),
    entry("新北市", "板橋"),
    entry("基隆市", "基隆"),
    entry("桃園市", "新屋"),
    entry("新竹市", "新竹"),
    entry("新竹縣", "竹北"),
    entry("苗栗縣", "後龍"),
    entry("臺中市", "臺中"),
    entry("彰化縣", "田中"),
    entry("南投縣", "日月潭"),
    entry("雲林縣", "古坑"),
    entry("嘉義市", "嘉義"),
    entry("嘉義縣", "阿里山"),
    entry("臺南市", "臺南"),
    entry("高雄市", "高雄"),
    entry("屏東縣", "恆春"),
    entry("宜蘭縣", "宜蘭"),
    entry("花蓮縣", "花蓮"),
    entry("臺東縣", "臺東"),
    entry("澎湖縣", "澎湖"),
    entry("金門縣", "金門"),
    entry("連江縣", "馬祖"),
];

/// Every supported city, in picker order.
pub fn all() -> &'static [LocationInfo] {
    &LOCATIONS
}

/// Exact-match lookup by display name. No trimming, no case folding.
pub fn resolve(city_name: &str) -> Option<&'static LocationInfo> {
    LOCATIONS.iter().find(|loc| loc.city_name == city_name)
}

/// Like [`resolve`], but an unknown name falls back to [`DEFAULT_CITY`].
pub fn resolve_or_default(city_name: &str) -> &'static LocationInfo {
    match resolve(city_name) {
        Some(loc) => loc,
        None => {
            tracing::debug!(city = city_name, "unknown city, using {DEFAULT_CITY}");
            default_location()
        }
    }
}

pub fn default_location() -> &'static LocationInfo {
    // LOCATIONS[0] is DEFAULT_CITY; see `default_city_is_first` below.
    &LOCATIONS[0]
}
