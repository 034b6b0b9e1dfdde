//! CLI subcommands and their text output.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::fmt::Write;
use tracing::info;

use crate::cache::FetchResult;
use crate::config::Config;
use crate::owm::cached_client::{CachedOwmClient, SlotStatus};
use crate::owm::forecast::{project_forecast, Condition, ForecastEntry, ForecastMode};
use crate::owm::types::Observation;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Current conditions at the configured coordinates
  Current,
  /// Forecast at the configured coordinates
  Forecast {
    /// Overrides owm.mode from the config file
    #[arg(long, value_enum)]
    mode: Option<ForecastMode>,
    /// Maximum number of days (daily mode only)
    #[arg(long)]
    limit: Option<u32>,
  },
  /// Show what each cache slot holds
  Status,
}

/// Run one command against the cached client, printing to stdout.
pub async fn run(
  command: Command,
  config: &Config,
  client: &CachedOwmClient,
  json: bool,
) -> Result<()> {
  match command {
    Command::Current => {
      let (latitude, longitude) = config.coordinates()?;
      let result = client.weather_at_coords(latitude, longitude).await;
      let observation = available(result, "current weather")?;

      if json {
        print_json(&observation)
      } else {
        print!("{}", format_observation(&observation));
        Ok(())
      }
    }
    Command::Forecast { mode, limit } => {
      let (latitude, longitude) = config.coordinates()?;
      let mode = mode.unwrap_or(config.owm.mode);
      let result = client.forecast(latitude, longitude, mode, limit).await;
      let forecast = available(result, "forecast")?;
      let entries = project_forecast(&forecast, mode);

      if json {
        print_json(&entries)
      } else {
        print!("{}", format_forecast(&entries));
        Ok(())
      }
    }
    Command::Status => {
      let status = client.slot_status();

      if json {
        let view: Vec<StatusView<'_>> = status.iter().map(StatusView::from).collect();
        print_json(&view)
      } else {
        print!("{}", format_status(&status, Utc::now()));
        Ok(())
      }
    }
  }
}

/// Unwrap a fetch result; `Unavailable` becomes the command's error.
fn available<T>(result: FetchResult<T>, what: &str) -> Result<T> {
  info!(provenance = result.provenance(), "{} fetched", what);

  result.into_value().ok_or_else(|| {
    eyre!(
      "No {} available: OpenWeatherMap could not be reached and nothing is cached",
      what
    )
  })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let out =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", out);
  Ok(())
}

#[derive(Serialize)]
struct StatusView<'a> {
  slot: &'a str,
  description: &'static str,
  cached_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a SlotStatus> for StatusView<'a> {
  fn from(status: &'a SlotStatus) -> Self {
    Self {
      slot: &status.name,
      description: status.slot.description(),
      cached_at: status.cached_at,
    }
  }
}

fn optional(value: Option<f64>, unit: &str) -> String {
  match value {
    Some(v) => format!("{:.1} {}", v, unit),
    None => "-".to_string(),
  }
}

fn condition_label(code: u16) -> &'static str {
  Condition::from_code(code).map_or("unknown", Condition::as_str)
}

pub fn format_observation(observation: &Observation) -> String {
  let mut out = String::new();
  let place = match &observation.location.country {
    Some(country) => format!("{}, {}", observation.location.name, country),
    None => observation.location.name.clone(),
  };

  let _ = writeln!(
    out,
    "{} at {}",
    place,
    observation.reference_time.format("%Y-%m-%d %H:%M UTC")
  );
  let _ = writeln!(
    out,
    "  condition    {} ({})",
    condition_label(observation.weather_code),
    observation.detailed_status
  );
  let _ = writeln!(out, "  temperature  {:.1} °C", observation.temperature);
  let _ = writeln!(out, "  humidity     {}", optional(observation.humidity, "%"));
  let _ = writeln!(out, "  pressure     {}", optional(observation.pressure, "hPa"));
  let _ = writeln!(out, "  wind         {}", optional(observation.wind_speed, "m/s"));
  out
}

pub fn format_forecast(entries: &[ForecastEntry]) -> String {
  let mut out = String::new();

  if entries.is_empty() {
    out.push_str("No forecast entries\n");
    return out;
  }

  let _ = writeln!(
    out,
    "{:<17} {:<16} {:>9} {:>9} {:>9} {:>9}",
    "time", "condition", "temp", "low", "precip", "wind"
  );
  for entry in entries {
    let time = DateTime::from_timestamp_millis(entry.time)
      .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_else(|| "?".to_string());
    let _ = writeln!(
      out,
      "{:<17} {:<16} {:>9} {:>9} {:>9} {:>9}",
      time,
      entry.condition.map_or("unknown", Condition::as_str),
      optional(entry.temperature, "°C"),
      optional(entry.templow, "°C"),
      optional(entry.precipitation, "mm"),
      optional(entry.wind_speed, "m/s"),
    );
  }
  out
}

pub fn format_status(status: &[SlotStatus], now: DateTime<Utc>) -> String {
  let mut out = String::new();

  for slot in status {
    let state = match slot.cached_at {
      Some(cached_at) => {
        let age = now - cached_at;
        format!(
          "cached {} ({} min ago)",
          cached_at.format("%Y-%m-%d %H:%M:%S UTC"),
          age.num_minutes()
        )
      }
      None => "empty".to_string(),
    };
    let _ = writeln!(
      out,
      "{:<20} {:<45} {}",
      slot.slot.description(),
      slot.name,
      state
    );
  }
  out
}
