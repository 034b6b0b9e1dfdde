use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing::debug;

use weathervane::cache::{SlotStore, StoreConfig};
use weathervane::owm::cached_client::CachedOwmClient;
use weathervane::{commands, config, logging};

#[derive(Parser, Debug)]
#[command(name = "weathervane")]
#[command(about = "OpenWeatherMap client that falls back to the last good data when offline")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./weathervane.yaml or $XDG_CONFIG_HOME/weathervane/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Latitude, overrides owm.latitude
  #[arg(long, allow_hyphen_values = true)]
  latitude: Option<f64>,

  /// Longitude, overrides owm.longitude
  #[arg(long, allow_hyphen_values = true)]
  longitude: Option<f64>,

  /// Print JSON instead of text
  #[arg(long)]
  json: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line coordinates win over the file
  if let Some(latitude) = args.latitude {
    config.owm.latitude = Some(latitude);
  }
  if let Some(longitude) = args.longitude {
    config.owm.longitude = Some(longitude);
  }
  config.validate()?;

  let _log_guard = logging::init(&config.logging)?;

  let root = config.storage_root()?;
  debug!(root = %root.display(), "using storage root");
  let store = SlotStore::open(StoreConfig::new(root))?;
  let client = CachedOwmClient::new(&config.owm, &store)?;

  commands::run(args.command, &config, &client, args.json).await
}
