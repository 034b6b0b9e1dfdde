use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a report applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub name: String,
  pub country: Option<String>,
  pub latitude: f64,
  pub longitude: f64,
}

/// Current conditions at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub reference_time: DateTime<Utc>,
  pub location: Location,
  /// OWM condition code (e.g. 800 = clear sky)
  pub weather_code: u16,
  pub status: String,
  pub detailed_status: String,
  pub temperature: f64, // Celsius
  pub feels_like: Option<f64>,
  pub humidity: Option<f64>,
  pub pressure: Option<f64>, // hPa
  pub wind_speed: Option<f64>, // m/s
  pub wind_bearing: Option<f64>,
  pub clouds: Option<u8>,
  /// Precipitation over the last hour (or three, whichever OWM reported)
  pub rain: Option<f64>,
  pub snow: Option<f64>,
}

/// Spacing of the entries in a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastInterval {
  ThreeHours,
  Daily,
}

/// A forecast series for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
  pub interval: ForecastInterval,
  pub location: Location,
  pub weathers: Vec<ForecastWeather>,
}

/// Temperatures reported for one forecast entry.
///
/// Three-hour entries only carry `temp`/`min`/`max`; daily entries carry the
/// `day`/`night` split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
  pub temp: Option<f64>,
  pub day: Option<f64>,
  pub night: Option<f64>,
  pub min: Option<f64>,
  pub max: Option<f64>,
}

/// One entry of a forecast series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastWeather {
  pub reference_time: DateTime<Utc>,
  pub weather_code: u16,
  pub status: String,
  pub temperature: Temperatures,
  pub humidity: Option<f64>,
  pub pressure: Option<f64>,
  pub wind_speed: Option<f64>,
  pub wind_bearing: Option<f64>,
  /// Volume over the entry's interval, in mm
  pub rain: Option<f64>,
  pub snow: Option<f64>,
}
