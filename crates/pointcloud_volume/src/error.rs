//! Error type shared by the octree, manifest readers and loader.
//!
//! Most of these never reach the caller of [`crate::Volume::load_dir`]: the
//! coordinator absorbs them, logs, and continues with fewer tiles.

use std::path::PathBuf;

use thiserror::Error;

use crate::octree::NodeId;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VolumeError>;

#[derive(Debug, Error)]
pub enum VolumeError {
  /// A directory expected to hold a manifest does not.
  #[error("manifest not found: {}", path.display())]
  ManifestNotFound { path: PathBuf },

  /// A manifest exists but is not valid JSON or lacks required fields.
  #[error("invalid manifest {}: {source}", path.display())]
  InvalidManifest {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A binary hierarchy chunk is truncated or references missing parents.
  #[error("invalid hierarchy {}: {reason}", path.display())]
  InvalidHierarchy { path: PathBuf, reason: String },

  /// A child box is not contained in its parent's box.
  #[error("child octant {octant} of node {parent:?} lies outside the parent bounds")]
  ChildOutOfBounds { parent: NodeId, octant: u8 },

  #[error("child octant {octant} of node {parent:?} is already occupied")]
  ChildSlotOccupied { parent: NodeId, octant: u8 },

  #[error("unsupported: {0}")]
  Unsupported(String),

  /// The background worker thread is gone.
  #[error("background loader is not running")]
  LoaderUnavailable,
}

impl VolumeError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }
}
