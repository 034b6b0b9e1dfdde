//! Projection of raw forecast series into display entries.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use super::types::{Forecast, ForecastWeather};

/// How the forecast is fetched and presented
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
  /// Three-hour series, night entries dropped
  #[default]
  Hourly,
  /// Daily endpoint (paid OWM plans)
  Daily,
  /// One entry per day sampled from the free three-hour series
  Freedaily,
}

impl ForecastMode {
  /// Whether this mode reads the daily endpoint instead of the three-hour one.
  pub fn uses_daily_endpoint(self) -> bool {
    self == ForecastMode::Daily
  }
}

/// Weather condition classes as understood by home automation frontends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
  Cloudy,
  Fog,
  Hail,
  Lightning,
  LightningRainy,
  Partlycloudy,
  Pouring,
  Rainy,
  Snowy,
  SnowyRainy,
  Sunny,
  Windy,
  WindyVariant,
  Exceptional,
}

impl Condition {
  /// Map an OWM condition code. Codes outside the known classes give `None`.
  pub fn from_code(code: u16) -> Option<Self> {
    let condition = match code {
      803 | 804 => Self::Cloudy,
      701 | 741 => Self::Fog,
      906 => Self::Hail,
      210 | 211 | 212 | 221 => Self::Lightning,
      200 | 201 | 202 | 230 | 231 | 232 => Self::LightningRainy,
      801 | 802 => Self::Partlycloudy,
      314 | 502 | 503 | 504 | 522 => Self::Pouring,
      300..=302 | 310..=313 | 500 | 501 | 520 | 521 => Self::Rainy,
      600..=602 | 611 | 612 | 620..=622 => Self::Snowy,
      511 | 615 | 616 => Self::SnowyRainy,
      800 => Self::Sunny,
      905 | 951..=957 => Self::Windy,
      958..=961 => Self::WindyVariant,
      711 | 721 | 731 | 751 | 761 | 762 | 771 | 900 | 901 | 903 | 904 | 962 => Self::Exceptional,
      _ => return None,
    };
    Some(condition)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Cloudy => "cloudy",
      Self::Fog => "fog",
      Self::Hail => "hail",
      Self::Lightning => "lightning",
      Self::LightningRainy => "lightning-rainy",
      Self::Partlycloudy => "partlycloudy",
      Self::Pouring => "pouring",
      Self::Rainy => "rainy",
      Self::Snowy => "snowy",
      Self::SnowyRainy => "snowy-rainy",
      Self::Sunny => "sunny",
      Self::Windy => "windy",
      Self::WindyVariant => "windy-variant",
      Self::Exceptional => "exceptional",
    }
  }
}

/// One displayed forecast row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
  /// Unix time in milliseconds
  pub time: i64,
  pub temperature: Option<f64>,
  pub templow: Option<f64>,
  pub precipitation: Option<f64>,
  pub wind_speed: Option<f64>,
  pub wind_bearing: Option<f64>,
  pub condition: Option<Condition>,
}

/// Entries per day in the three-hour series
const ENTRIES_PER_DAY: usize = 8;

/// Entries before this UTC hour are dropped from hourly output
const NIGHT_END_HOUR: u32 = 6;

/// Turn a raw forecast into display entries for `mode`.
pub fn project_forecast(forecast: &Forecast, mode: ForecastMode) -> Vec<ForecastEntry> {
  match mode {
    ForecastMode::Daily => forecast.weathers.iter().map(daily_entry).collect(),
    ForecastMode::Hourly => forecast.weathers.iter().filter_map(hourly_entry).collect(),
    ForecastMode::Freedaily => forecast
      .weathers
      .iter()
      .step_by(ENTRIES_PER_DAY)
      .filter_map(hourly_entry)
      .collect(),
  }
}

fn daily_entry(weather: &ForecastWeather) -> ForecastEntry {
  ForecastEntry {
    time: weather.reference_time.timestamp_millis(),
    temperature: weather.temperature.day,
    templow: weather.temperature.night,
    precipitation: total_precipitation(weather.rain, weather.snow),
    wind_speed: weather.wind_speed,
    wind_bearing: weather.wind_bearing,
    condition: Condition::from_code(weather.weather_code),
  }
}

fn hourly_entry(weather: &ForecastWeather) -> Option<ForecastEntry> {
  if weather.reference_time.hour() < NIGHT_END_HOUR {
    return None;
  }

  let precipitation = weather.rain.map(round_tenth).filter(|rain| *rain > 0.0);

  Some(ForecastEntry {
    time: weather.reference_time.timestamp_millis(),
    temperature: weather.temperature.temp,
    templow: weather.temperature.night,
    precipitation,
    wind_speed: weather.wind_speed,
    wind_bearing: weather.wind_bearing,
    condition: Condition::from_code(weather.weather_code),
  })
}

/// Rain plus snow rounded to 0.1 mm; `None` when that rounds to zero.
fn total_precipitation(rain: Option<f64>, snow: Option<f64>) -> Option<f64> {
  let total = round_tenth(rain.unwrap_or(0.0) + snow.unwrap_or(0.0));
  (total != 0.0).then_some(total)
}

fn round_tenth(value: f64) -> f64 {
  (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::owm::types::{ForecastInterval, Location, Temperatures};
  use chrono::{DateTime, TimeZone, Utc};

  fn at(hour: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
  }

  fn weather(reference_time: DateTime<Utc>) -> ForecastWeather {
    ForecastWeather {
      reference_time,
      weather_code: 800,
      status: "Clear".to_string(),
      temperature: Temperatures {
        temp: Some(12.0),
        ..Default::default()
      },
      humidity: None,
      pressure: None,
      wind_speed: Some(2.5),
      wind_bearing: Some(180.0),
      rain: None,
      snow: None,
    }
  }

  fn forecast(interval: ForecastInterval, weathers: Vec<ForecastWeather>) -> Forecast {
    Forecast {
      interval,
      location: Location {
        name: "Paris".to_string(),
        country: Some("FR".to_string()),
        latitude: 48.85,
        longitude: 2.35,
      },
      weathers,
    }
  }

  /// Two days of three-hour entries starting at midnight
  fn three_hour_series() -> Vec<ForecastWeather> {
    (0..16).map(|i| weather(at((i % 8) * 3, 1 + i / 8))).collect()
  }

  #[test]
  fn test_hourly_drops_night_entries() {
    let entries = project_forecast(
      &forecast(ForecastInterval::ThreeHours, three_hour_series()),
      ForecastMode::Hourly,
    );

    // 00h and 03h are dropped on each day
    assert_eq!(entries.len(), 12);
    assert_eq!(entries[0].time, at(6, 1).timestamp_millis());
    assert_eq!(entries[0].temperature, Some(12.0));
    assert_eq!(entries[0].templow, None);
    assert_eq!(entries[0].condition, Some(Condition::Sunny));
  }

  #[test]
  fn test_freedaily_samples_one_entry_per_day() {
    let series: Vec<_> = (0..16)
      .map(|i| weather(at(9 + (i % 8), 1 + i / 8)))
      .collect();

    let entries = project_forecast(
      &forecast(ForecastInterval::ThreeHours, series),
      ForecastMode::Freedaily,
    );

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].time, at(9, 1).timestamp_millis());
    assert_eq!(entries[1].time, at(9, 2).timestamp_millis());
  }

  #[test]
  fn test_freedaily_sample_at_night_is_dropped() {
    let entries = project_forecast(
      &forecast(ForecastInterval::ThreeHours, three_hour_series()),
      ForecastMode::Freedaily,
    );

    assert!(entries.is_empty());
  }

  #[test]
  fn test_hourly_precipitation_rounding() {
    let mut wet = weather(at(12, 1));
    wet.rain = Some(0.26);
    let mut trace = weather(at(15, 1));
    trace.rain = Some(0.04);

    let entries = project_forecast(
      &forecast(ForecastInterval::ThreeHours, vec![wet, trace]),
      ForecastMode::Hourly,
    );

    assert_eq!(entries[0].precipitation, Some(0.3));
    assert_eq!(entries[1].precipitation, None);
  }

  #[test]
  fn test_daily_uses_day_and_night_temperatures() {
    let mut day = weather(at(11, 1));
    day.weather_code = 502;
    day.temperature = Temperatures {
      day: Some(15.0),
      night: Some(6.0),
      ..Default::default()
    };
    day.rain = Some(2.04);
    day.snow = Some(0.5);

    let entries = project_forecast(
      &forecast(ForecastInterval::Daily, vec![day]),
      ForecastMode::Daily,
    );

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].temperature, Some(15.0));
    assert_eq!(entries[0].templow, Some(6.0));
    assert_eq!(entries[0].precipitation, Some(2.5));
    assert_eq!(entries[0].condition, Some(Condition::Pouring));
  }

  #[test]
  fn test_daily_keeps_night_entries_and_zero_precipitation_is_none() {
    let entries = project_forecast(
      &forecast(ForecastInterval::Daily, vec![weather(at(0, 1))]),
      ForecastMode::Daily,
    );

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].precipitation, None);
  }

  #[test]
  fn test_condition_mapping() {
    assert_eq!(Condition::from_code(804), Some(Condition::Cloudy));
    assert_eq!(Condition::from_code(211), Some(Condition::Lightning));
    assert_eq!(Condition::from_code(232), Some(Condition::LightningRainy));
    assert_eq!(Condition::from_code(313), Some(Condition::Rainy));
    assert_eq!(Condition::from_code(621), Some(Condition::Snowy));
    assert_eq!(Condition::from_code(616), Some(Condition::SnowyRainy));
    assert_eq!(Condition::from_code(959), Some(Condition::WindyVariant));
    assert_eq!(Condition::from_code(781), None);
    assert_eq!(Condition::WindyVariant.as_str(), "windy-variant");
  }

  #[test]
  fn test_mode_endpoint_selection() {
    assert!(ForecastMode::Daily.uses_daily_endpoint());
    assert!(!ForecastMode::Hourly.uses_daily_endpoint());
    assert!(!ForecastMode::Freedaily.uses_daily_endpoint());
  }
}
