//! Coordinator configuration.
//!
//! Per-dataset behavior comes from the top manifest ([`crate::manifest::TopManifest`]);
//! this is the process-level configuration a host hands to [`crate::Volume::new`].

use serde::Deserialize;

/// Root configuration for a [`crate::Volume`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
  /// Rebase every node so the global minimum becomes the origin.
  pub zero_shift: bool,
  /// File name of the multi-dataset manifest.
  pub top_manifest: String,
  /// File name marking a single-tile directory.
  pub tile_manifest: String,
  /// Reserved subdirectory skipped during dataset enumeration.
  pub static_data_dir: String,
  /// Hand a summary to the observer after each aggregation pass.
  pub report_summary: bool,
  pub loader: LoaderConfig,
}

impl Default for VolumeConfig {
  fn default() -> Self {
    Self {
      zero_shift: true,
      top_manifest: "top.json".to_string(),
      tile_manifest: "cloud.js".to_string(),
      static_data_dir: "StaticData".to_string(),
      report_summary: true,
      loader: LoaderConfig::default(),
    }
  }
}

/// Background loader settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
  /// Name given to the worker thread.
  pub thread_name: String,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      thread_name: "volume-loader".to_string(),
    }
  }
}
