use crate::cache::RemoteError;
use crate::config::OwmConfig;
use crate::owm::api_types::{
  ApiCurrentWeather, ApiDailyForecast, ApiErrorBody, ApiThreeHourForecast,
};
use crate::owm::types::{Forecast, Observation};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// OpenWeatherMap API client
#[derive(Clone)]
pub struct OwmClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: String,
}

impl OwmClient {
  pub fn new(config: &OwmConfig, api_key: String) -> Result<Self, RemoteError> {
    if api_key.trim().is_empty() {
      return Err(RemoteError::ClientUnavailable(
        "OpenWeatherMap API key is empty".to_string(),
      ));
    }

    let base_url = parse_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| RemoteError::ClientUnavailable(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url,
      api_key,
    })
  }

  /// Current weather at the given coordinates
  pub async fn weather_at_coords(
    &self,
    latitude: f64,
    longitude: f64,
  ) -> Result<Observation, RemoteError> {
    let url = self.endpoint("weather", latitude, longitude, None)?;
    let response: ApiCurrentWeather = self.get_json(url).await?;
    response.try_into()
  }

  /// Five-day forecast in three-hour steps
  pub async fn three_hours_forecast_at_coords(
    &self,
    latitude: f64,
    longitude: f64,
  ) -> Result<Forecast, RemoteError> {
    let url = self.endpoint("forecast", latitude, longitude, None)?;
    let response: ApiThreeHourForecast = self.get_json(url).await?;
    response.try_into()
  }

  /// Daily forecast, optionally limited to `limit` days
  pub async fn daily_forecast_at_coords(
    &self,
    latitude: f64,
    longitude: f64,
    limit: Option<u32>,
  ) -> Result<Forecast, RemoteError> {
    let url = self.endpoint("forecast/daily", latitude, longitude, limit)?;
    let response: ApiDailyForecast = self.get_json(url).await?;
    response.try_into()
  }

  fn endpoint(
    &self,
    path: &str,
    latitude: f64,
    longitude: f64,
    limit: Option<u32>,
  ) -> Result<Url, RemoteError> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| RemoteError::ClientUnavailable(format!("Invalid endpoint {}: {}", path, e)))?;

    {
      let mut query = url.query_pairs_mut();
      query
        .append_pair("lat", &latitude.to_string())
        .append_pair("lon", &longitude.to_string())
        .append_pair("units", "metric")
        .append_pair("appid", &self.api_key);
      if let Some(limit) = limit {
        query.append_pair("cnt", &limit.to_string());
      }
    }

    Ok(url)
  }

  async fn get_json<R: DeserializeOwned>(&self, url: Url) -> Result<R, RemoteError> {
    debug!(path = url.path(), "requesting OpenWeatherMap");

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| RemoteError::Transport(e.without_url().to_string()))?;

    let status = response.status();
    let body = response
      .bytes()
      .await
      .map_err(|e| RemoteError::Transport(e.without_url().to_string()))?;

    if !status.is_success() {
      return Err(status_error(status, &body));
    }

    serde_json::from_slice(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
  }
}

/// The base URL must end with `/` for `Url::join` to keep its last segment.
fn parse_base_url(raw: &str) -> Result<Url, RemoteError> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };

  Url::parse(&normalized)
    .map_err(|e| RemoteError::ClientUnavailable(format!("Invalid base URL {}: {}", raw, e)))
}

fn status_error(status: StatusCode, body: &[u8]) -> RemoteError {
  let message = serde_json::from_slice::<ApiErrorBody>(body)
    .map(|b| b.message)
    .unwrap_or_else(|_| {
      status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
    });

  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
    _ => RemoteError::Upstream {
      status: status.as_u16(),
      message,
    },
  }
}
