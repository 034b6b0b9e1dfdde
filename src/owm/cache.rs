//! Caching implementations for OpenWeatherMap types.

use crate::cache::Cacheable;

use super::types::{Forecast, Observation};

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Observation {
  fn entity_type() -> &'static str {
    "observation"
  }
}

impl Cacheable for Forecast {
  fn entity_type() -> &'static str {
    "forecast"
  }
}

// ============================================================================
// Slot keys
// ============================================================================

/// The remote operations that get their own slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwmSlot {
  WeatherAtCoords,
  DailyForecastAtCoords,
  ThreeHoursForecastAtCoords,
}

impl OwmSlot {
  pub const ALL: [OwmSlot; 3] = [
    OwmSlot::WeatherAtCoords,
    OwmSlot::DailyForecastAtCoords,
    OwmSlot::ThreeHoursForecastAtCoords,
  ];

  fn suffix(self) -> &'static str {
    match self {
      Self::WeatherAtCoords => "weather_at_coords",
      Self::DailyForecastAtCoords => "daily_forecast_at_coords",
      Self::ThreeHoursForecastAtCoords => "three_hours_forecast_at_coords",
    }
  }

  /// Slot name under the configured prefix (e.g. "CustomOpenWeatherMap_weather_at_coords")
  pub fn slot_name(self, prefix: &str) -> String {
    format!("{}_{}", prefix, self.suffix())
  }

  pub fn description(self) -> &'static str {
    match self {
      Self::WeatherAtCoords => "current weather",
      Self::DailyForecastAtCoords => "daily forecast",
      Self::ThreeHoursForecastAtCoords => "three-hour forecast",
    }
  }
}
