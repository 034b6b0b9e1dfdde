use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::owm::forecast::ForecastMode;

pub const DEFAULT_NAME: &str = "CustomOpenWeatherMap";
const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub owm: OwmConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmConfig {
  /// Falls back to WEATHERVANE_OWM_API_KEY, then OWM_API_KEY
  pub api_key: Option<String>,
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  #[serde(default)]
  pub mode: ForecastMode,
  /// Prefix for slot names, so several setups can share one storage root
  #[serde(default = "default_name")]
  pub name: String,
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for OwmConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      latitude: None,
      longitude: None,
      mode: ForecastMode::default(),
      name: default_name(),
      base_url: default_base_url(),
      timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
  }
}

fn default_name() -> String {
  DEFAULT_NAME.to_string()
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

impl OwmConfig {
  /// API key from the config file or the environment.
  pub fn resolve_api_key(&self) -> Option<String> {
    self.resolve_api_key_with(|name| std::env::var(name).ok())
  }

  /// First non-blank key from the config file, `WEATHERVANE_OWM_API_KEY`,
  /// then `OWM_API_KEY`, looking variables up through `env`.
  fn resolve_api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
    let not_blank = |key: &String| !key.trim().is_empty();

    self
      .api_key
      .clone()
      .filter(not_blank)
      .or_else(|| env("WEATHERVANE_OWM_API_KEY").filter(not_blank))
      .or_else(|| env("OWM_API_KEY").filter(not_blank))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Storage root; slots live in `<root>/cache`
  pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
  /// Also write a daily-rotated log file here
  pub directory: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./weathervane.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/weathervane/config.yaml
  ///
  /// Without a file, defaults are used and coordinates must come from the
  /// command line.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.validate()?;

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("weathervane.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("weathervane").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))
  }

  /// Check value ranges. Called after every override.
  pub fn validate(&self) -> Result<()> {
    if let Some(lat) = self.owm.latitude {
      if !(-90.0..=90.0).contains(&lat) {
        return Err(eyre!("Latitude {} is outside [-90, 90]", lat));
      }
    }
    if let Some(lon) = self.owm.longitude {
      if !(-180.0..=180.0).contains(&lon) {
        return Err(eyre!("Longitude {} is outside [-180, 180]", lon));
      }
    }
    if self.owm.timeout_secs == 0 {
      return Err(eyre!("owm.timeout_secs must be greater than zero"));
    }
    if self.owm.name.is_empty()
      || self.owm.name.starts_with('.')
      || self.owm.name.contains(['/', '\\', '\0'])
    {
      return Err(eyre!("owm.name '{}' cannot be used in file names", self.owm.name));
    }
    Ok(())
  }

  /// Latitude and longitude, both required for fetching.
  pub fn coordinates(&self) -> Result<(f64, f64)> {
    match (self.owm.latitude, self.owm.longitude) {
      (Some(lat), Some(lon)) => Ok((lat, lon)),
      _ => Err(eyre!(
        "Coordinates not configured. Set owm.latitude/owm.longitude or pass --latitude/--longitude."
      )),
    }
  }

  /// Storage root, defaulting to the platform data directory.
  pub fn storage_root(&self) -> Result<PathBuf> {
    if let Some(root) = &self.storage.root {
      return Ok(root.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("weathervane"))
  }
}
