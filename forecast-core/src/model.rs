use serde::{Deserialize, Serialize};

/// Forecasts are truncated to this many days.
pub const MAX_FORECAST_DAYS: usize = 15;

/// Hourly records expected per forecast day.
pub const HOURS_PER_DAY: usize = 24;

/// One row of the canonical condition table, e.g. `("03d", "Scattered Clouds")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub icon_code: String,
    pub description: String,
}

impl TaxonomyEntry {
    pub fn new(icon_code: impl Into<String>, description: impl Into<String>) -> Self {
        Self { icon_code: icon_code.into(), description: description.into() }
    }
}

/// Night variant of an icon code: a trailing `d` becomes `n`.
///
/// Codes without a trailing `d` are returned unchanged.
pub fn night_variant(icon_code: &str) -> String {
    match icon_code.strip_suffix('d') {
        Some(stem) => format!("{stem}n"),
        None => icon_code.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    #[serde(rename = "Celsius")]
    pub celsius: f64,
    #[serde(rename = "Fahrenheit")]
    pub fahrenheit: f64,
}

impl Temperature {
    /// Fahrenheit is derived and rounded to two decimals.
    pub fn from_celsius(celsius: f64) -> Self {
        let fahrenheit = ((celsius * 9.0 / 5.0 + 32.0) * 100.0).round() / 100.0;
        Self { celsius, fahrenheit }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Day-only icon attached to an hourly record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayIcon {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Icon Code")]
    pub icon_code: String,
    #[serde(rename = "Decoded Bytes", with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

/// Day and night image bytes for one icon code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPayload {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Icon Code")]
    pub icon_code: String,
    #[serde(rename = "Day Decoded Bytes", with = "base64_bytes")]
    pub day_bytes: Vec<u8>,
    #[serde(rename = "Night Decoded Bytes", with = "base64_bytes")]
    pub night_bytes: Vec<u8>,
}

impl IconPayload {
    pub fn day_icon(&self) -> DayIcon {
        DayIcon {
            description: self.description.clone(),
            icon_code: self.icon_code.clone(),
            bytes: self.day_bytes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    pub hour: String,
    pub temperature: Temperature,
    pub humidity: u8,
    /// Phrase as delivered by the weather provider.
    #[serde(rename = "raw_conditions", default)]
    pub raw_condition: String,
    /// Canonical description once resolved; the raw phrase until then.
    #[serde(rename = "conditions")]
    pub resolved_condition: String,
    #[serde(rename = "emoji", with = "emoji_field")]
    pub icon: Option<DayIcon>,
}

impl HourlyRecord {
    pub fn new(
        hour: impl Into<String>,
        temperature: Temperature,
        humidity: u8,
        condition: impl Into<String>,
    ) -> Self {
        let raw_condition = condition.into();
        Self {
            hour: hour.into(),
            temperature,
            humidity,
            resolved_condition: raw_condition.clone(),
            raw_condition,
            icon: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    /// `MM/DD/YYYY`
    pub date: String,
    pub min_temp: Temperature,
    pub max_temp: Temperature,
    #[serde(rename = "hourly_data")]
    pub hours: Vec<HourlyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub location: String,
    pub coordinates: Coordinates,
    pub day: Day,
}

/// Ordered forecast days, serialized as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(pub Vec<DayRecord>);

impl Dataset {
    pub fn new(days: Vec<DayRecord>) -> Self {
        Self(days)
    }

    pub fn days(&self) -> &[DayRecord] {
        &self.0
    }

    /// Every hourly record, in day order then hour order.
    pub fn hours(&self) -> impl Iterator<Item = &HourlyRecord> {
        self.0.iter().flat_map(|d| d.day.hours.iter())
    }

    pub fn hours_mut(&mut self) -> impl Iterator<Item = &mut HourlyRecord> {
        self.0.iter_mut().flat_map(|d| d.day.hours.iter_mut())
    }

    pub fn record_count(&self) -> usize {
        self.hours().count()
    }

    /// Where the forecast is for; every day shares the first day's place.
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.0.first().map(|d| d.coordinates)
    }
}

/// One archived hourly temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    /// °F; the archive leaves gaps as `null`.
    pub temperature_f: Option<f64>,
}

/// Current conditions for the simple weather report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location_name: String,
    /// `MM/DD/YYYY` of the provider's last update.
    pub date: String,
    pub condition: String,
    pub temperature_f: f64,
    pub feels_like_f: f64,
    pub wind_mph: f64,
    pub wind_dir: String,
    pub humidity_pct: u8,
}

/// Spelled-out name of a 16-point compass abbreviation.
pub fn wind_direction_name(abbrev: &str) -> Option<&'static str> {
    let name = match abbrev {
        "N" => "North",
        "S" => "South",
        "E" => "East",
        "W" => "West",
        "NE" => "Northeast",
        "NW" => "Northwest",
        "SE" => "Southeast",
        "SW" => "Southwest",
        "NNE" => "North-northeast",
        "NNW" => "North-northwest",
        "ENE" => "East-northeast",
        "ESE" => "East-southeast",
        "SSE" => "South-southeast",
        "SSW" => "South-southwest",
        "WSW" => "West-southwest",
        "WNW" => "West-northwest",
        _ => return None,
    };
    Some(name)
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// `emoji` is either an empty string or a [`DayIcon`] object.
mod emoji_field {
    use super::DayIcon;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Icon(DayIcon),
        Empty(String),
    }

    pub fn serialize<S: Serializer>(icon: &Option<DayIcon>, s: S) -> Result<S::Ok, S::Error> {
        match icon {
            Some(icon) => icon.serialize(s),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DayIcon>, D::Error> {
        Ok(match Repr::deserialize(d)? {
            Repr::Icon(icon) => Some(icon),
            Repr::Empty(_) => None,
        })
    }
}
