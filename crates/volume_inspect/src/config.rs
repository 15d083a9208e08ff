//! Configuration parsing for the inspector.

use anyhow::{Context, Result};
use pointcloud_volume::VolumeConfig;
use serde::Deserialize;
use std::path::Path;

/// Root configuration for `volume_inspect`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Coordinator settings, the `[volume]` table.
	pub volume: VolumeConfig,
	/// Seconds to wait for background loading with `--wait`.
	pub wait_secs: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			volume: VolumeConfig::default(),
			wait_secs: 30,
		}
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		let config = Self::parse(&content)?;
		Ok(config)
	}

	fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if config.volume.top_manifest.trim().is_empty() {
			anyhow::bail!("volume.top_manifest must not be empty");
		}
		if config.volume.tile_manifest.trim().is_empty() {
			anyhow::bail!("volume.tile_manifest must not be empty");
		}
		if config.volume.top_manifest == config.volume.tile_manifest {
			anyhow::bail!(
				"top and tile manifests must differ, both are {}",
				config.volume.tile_manifest
			);
		}

		Ok(config)
	}
}
