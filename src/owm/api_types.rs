//! Serde-deserializable types matching OpenWeatherMap API responses.
//!
//! These types are separate from domain types so that wire quirks (nested
//! `main`/`wind` objects, `"3h"` keys, unix timestamps) stay out of what gets
//! cached.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::RemoteError;

use super::types::{
  Forecast, ForecastInterval, ForecastWeather, Location, Observation, Temperatures,
};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCoord {
  pub lat: f64,
  pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct ApiCondition {
  pub id: u16,
  #[serde(default)]
  pub main: String,
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMain {
  pub temp: f64,
  pub feels_like: Option<f64>,
  pub temp_min: Option<f64>,
  pub temp_max: Option<f64>,
  pub pressure: Option<f64>,
  pub humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWind {
  pub speed: Option<f64>,
  pub deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiClouds {
  pub all: Option<u8>,
}

/// Rain or snow volume, keyed by accumulation window
#[derive(Debug, Deserialize)]
pub struct ApiVolume {
  #[serde(rename = "1h")]
  pub one_hour: Option<f64>,
  #[serde(rename = "3h")]
  pub three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSys {
  pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCity {
  #[serde(default)]
  pub name: String,
  pub coord: ApiCoord,
  pub country: Option<String>,
}

impl From<ApiCity> for Location {
  fn from(city: ApiCity) -> Self {
    Location {
      name: city.name,
      country: city.country,
      latitude: city.coord.lat,
      longitude: city.coord.lon,
    }
  }
}

/// Error body returned alongside non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: String,
}

// ============================================================================
// Current weather endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCurrentWeather {
  pub coord: ApiCoord,
  #[serde(default)]
  pub weather: Vec<ApiCondition>,
  pub main: ApiMain,
  pub wind: Option<ApiWind>,
  pub clouds: Option<ApiClouds>,
  pub rain: Option<ApiVolume>,
  pub snow: Option<ApiVolume>,
  pub dt: i64,
  pub sys: Option<ApiSys>,
  #[serde(default)]
  pub name: String,
}

impl TryFrom<ApiCurrentWeather> for Observation {
  type Error = RemoteError;

  fn try_from(api: ApiCurrentWeather) -> Result<Self, Self::Error> {
    let condition = primary_condition(api.weather)?;
    let wind = api.wind.unwrap_or(ApiWind {
      speed: None,
      deg: None,
    });

    Ok(Observation {
      reference_time: timestamp(api.dt)?,
      location: Location {
        name: api.name,
        country: api.sys.and_then(|s| s.country),
        latitude: api.coord.lat,
        longitude: api.coord.lon,
      },
      weather_code: condition.id,
      status: condition.main,
      detailed_status: condition.description,
      temperature: api.main.temp,
      feels_like: api.main.feels_like,
      humidity: api.main.humidity,
      pressure: api.main.pressure,
      wind_speed: wind.speed,
      wind_bearing: wind.deg,
      clouds: api.clouds.and_then(|c| c.all),
      rain: api.rain.and_then(recent_volume),
      snow: api.snow.and_then(recent_volume),
    })
  }
}

/// Prefer the one-hour window, fall back to three hours.
fn recent_volume(volume: ApiVolume) -> Option<f64> {
  volume.one_hour.or(volume.three_hours)
}

// ============================================================================
// Three-hour forecast endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiThreeHourEntry {
  pub dt: i64,
  pub main: ApiMain,
  #[serde(default)]
  pub weather: Vec<ApiCondition>,
  pub wind: Option<ApiWind>,
  pub rain: Option<ApiVolume>,
  pub snow: Option<ApiVolume>,
}

#[derive(Debug, Deserialize)]
pub struct ApiThreeHourForecast {
  pub city: ApiCity,
  #[serde(default)]
  pub list: Vec<ApiThreeHourEntry>,
}

impl TryFrom<ApiThreeHourForecast> for Forecast {
  type Error = RemoteError;

  fn try_from(api: ApiThreeHourForecast) -> Result<Self, Self::Error> {
    let weathers = api
      .list
      .into_iter()
      .map(|entry| {
        let condition = primary_condition(entry.weather)?;
        let wind = entry.wind.unwrap_or(ApiWind {
          speed: None,
          deg: None,
        });

        Ok(ForecastWeather {
          reference_time: timestamp(entry.dt)?,
          weather_code: condition.id,
          status: condition.main,
          temperature: Temperatures {
            temp: Some(entry.main.temp),
            min: entry.main.temp_min,
            max: entry.main.temp_max,
            ..Default::default()
          },
          humidity: entry.main.humidity,
          pressure: entry.main.pressure,
          wind_speed: wind.speed,
          wind_bearing: wind.deg,
          rain: entry.rain.and_then(|v| v.three_hours),
          snow: entry.snow.and_then(|v| v.three_hours),
        })
      })
      .collect::<Result<Vec<_>, RemoteError>>()?;

    Ok(Forecast {
      interval: ForecastInterval::ThreeHours,
      location: api.city.into(),
      weathers,
    })
  }
}

// ============================================================================
// Daily forecast endpoint response
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ApiDailyTemp {
  pub day: Option<f64>,
  pub min: Option<f64>,
  pub max: Option<f64>,
  pub night: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDailyEntry {
  pub dt: i64,
  #[serde(default)]
  pub temp: ApiDailyTemp,
  pub pressure: Option<f64>,
  pub humidity: Option<f64>,
  #[serde(default)]
  pub weather: Vec<ApiCondition>,
  pub speed: Option<f64>,
  pub deg: Option<f64>,
  // Daily volumes are plain numbers, not {"3h": ..} objects
  pub rain: Option<f64>,
  pub snow: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDailyForecast {
  pub city: ApiCity,
  #[serde(default)]
  pub list: Vec<ApiDailyEntry>,
}

impl TryFrom<ApiDailyForecast> for Forecast {
  type Error = RemoteError;

  fn try_from(api: ApiDailyForecast) -> Result<Self, Self::Error> {
    let weathers = api
      .list
      .into_iter()
      .map(|entry| {
        let condition = primary_condition(entry.weather)?;

        Ok(ForecastWeather {
          reference_time: timestamp(entry.dt)?,
          weather_code: condition.id,
          status: condition.main,
          temperature: Temperatures {
            temp: None,
            day: entry.temp.day,
            night: entry.temp.night,
            min: entry.temp.min,
            max: entry.temp.max,
          },
          humidity: entry.humidity,
          pressure: entry.pressure,
          wind_speed: entry.speed,
          wind_bearing: entry.deg,
          rain: entry.rain,
          snow: entry.snow,
        })
      })
      .collect::<Result<Vec<_>, RemoteError>>()?;

    Ok(Forecast {
      interval: ForecastInterval::Daily,
      location: api.city.into(),
      weathers,
    })
  }
}

// ============================================================================
// Helpers
// ============================================================================

fn timestamp(dt: i64) -> Result<DateTime<Utc>, RemoteError> {
  DateTime::from_timestamp(dt, 0)
    .ok_or_else(|| RemoteError::Malformed(format!("timestamp {} out of range", dt)))
}

/// OWM lists conditions by relevance; the first one drives the display.
fn primary_condition(weather: Vec<ApiCondition>) -> Result<ApiCondition, RemoteError> {
  weather
    .into_iter()
    .next()
    .ok_or_else(|| RemoteError::Malformed("response has no weather condition".to_string()))
}
