//! Cached OpenWeatherMap client that serves the last good response when the
//! service cannot be reached.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::cache::{fetch_with_fallback, FetchResult, RemoteError, Slot, SlotError, SlotStore};
use crate::config::OwmConfig;

use super::cache::OwmSlot;
use super::client::OwmClient;
use super::forecast::ForecastMode;
use super::types::{Forecast, Observation};

/// Slot state for status output
#[derive(Debug, Clone)]
pub struct SlotStatus {
  pub slot: OwmSlot,
  pub name: String,
  /// When the readable value was written; `None` if empty or corrupt
  pub cached_at: Option<DateTime<Utc>>,
}

/// OpenWeatherMap client with one fallback slot per operation.
///
/// Exposes the same operations as `OwmClient`, but every call resolves to a
/// `FetchResult` instead of an error.
#[derive(Clone)]
pub struct CachedOwmClient {
  /// Kept as a result so a construction failure is served from cache like any
  /// other remote failure
  inner: Result<OwmClient, RemoteError>,
  weather_at_coords: Slot<Observation>,
  daily_forecast_at_coords: Slot<Forecast>,
  three_hours_forecast_at_coords: Slot<Forecast>,
}

impl CachedOwmClient {
  /// Build the client and bind its slots. Only slot naming can fail here.
  pub fn new(config: &OwmConfig, store: &SlotStore) -> Result<Self, SlotError> {
    let inner = match config.resolve_api_key() {
      Some(api_key) => OwmClient::new(config, api_key),
      None => Err(RemoteError::ClientUnavailable(
        "No API key. Set owm.api_key, WEATHERVANE_OWM_API_KEY or OWM_API_KEY.".to_string(),
      )),
    };

    if let Err(e) = &inner {
      error!(error = %e, "OpenWeatherMap client unavailable, only cached data can be served");
    }

    Self::with_client(inner, &config.name, store)
  }

  fn with_client(
    inner: Result<OwmClient, RemoteError>,
    name: &str,
    store: &SlotStore,
  ) -> Result<Self, SlotError> {
    Ok(Self {
      inner,
      weather_at_coords: store.slot(&OwmSlot::WeatherAtCoords.slot_name(name))?,
      daily_forecast_at_coords: store.slot(&OwmSlot::DailyForecastAtCoords.slot_name(name))?,
      three_hours_forecast_at_coords: store
        .slot(&OwmSlot::ThreeHoursForecastAtCoords.slot_name(name))?,
    })
  }

  fn client(&self) -> Result<&OwmClient, RemoteError> {
    self.inner.as_ref().map_err(Clone::clone)
  }

  /// Current weather with fallback.
  pub async fn weather_at_coords(&self, latitude: f64, longitude: f64) -> FetchResult<Observation> {
    fetch_with_fallback(&self.weather_at_coords, move || async move {
      self.client()?.weather_at_coords(latitude, longitude).await
    })
    .await
  }

  /// Daily forecast with fallback.
  pub async fn daily_forecast_at_coords(
    &self,
    latitude: f64,
    longitude: f64,
    limit: Option<u32>,
  ) -> FetchResult<Forecast> {
    fetch_with_fallback(&self.daily_forecast_at_coords, move || async move {
      self
        .client()?
        .daily_forecast_at_coords(latitude, longitude, limit)
        .await
    })
    .await
  }

  /// Three-hour forecast with fallback.
  pub async fn three_hours_forecast_at_coords(
    &self,
    latitude: f64,
    longitude: f64,
  ) -> FetchResult<Forecast> {
    fetch_with_fallback(&self.three_hours_forecast_at_coords, move || async move {
      self
        .client()?
        .three_hours_forecast_at_coords(latitude, longitude)
        .await
    })
    .await
  }

  /// Forecast series for `mode`: the daily endpoint for `Daily`, the
  /// three-hour endpoint otherwise. `limit` only applies to the daily endpoint.
  pub async fn forecast(
    &self,
    latitude: f64,
    longitude: f64,
    mode: ForecastMode,
    limit: Option<u32>,
  ) -> FetchResult<Forecast> {
    if mode.uses_daily_endpoint() {
      self
        .daily_forecast_at_coords(latitude, longitude, limit)
        .await
    } else {
      self
        .three_hours_forecast_at_coords(latitude, longitude)
        .await
    }
  }

  /// What each slot currently holds.
  pub fn slot_status(&self) -> Vec<SlotStatus> {
    OwmSlot::ALL
      .iter()
      .map(|&slot| {
        let (name, cached_at) = match slot {
          OwmSlot::WeatherAtCoords => (
            self.weather_at_coords.name(),
            self.weather_at_coords.cached_at(),
          ),
          OwmSlot::DailyForecastAtCoords => (
            self.daily_forecast_at_coords.name(),
            self.daily_forecast_at_coords.cached_at(),
          ),
          OwmSlot::ThreeHoursForecastAtCoords => (
            self.three_hours_forecast_at_coords.name(),
            self.three_hours_forecast_at_coords.cached_at(),
          ),
        };
        SlotStatus {
          slot,
          name: name.to_string(),
          cached_at,
        }
      })
      .collect()
  }
}
