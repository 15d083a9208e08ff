//! Tile - the root of one independently tiled dataset.

use std::path::{Path, PathBuf};

use crate::manifest::TileDescriptor;
use crate::octree::{DAabb3, NodeId};

/// Time-series index of a tile. Negative means static.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStep(pub i32);

impl TimeStep {
  /// Not part of any time series.
  pub const STATIC: Self = Self(-1);

  #[inline]
  pub fn is_static(self) -> bool {
    self.0 < 0
  }

  /// Step index for animated tiles.
  pub fn index(self) -> Option<u32> {
    u32::try_from(self.0).ok()
  }
}

impl Default for TimeStep {
  fn default() -> Self {
    Self::STATIC
  }
}

/// Root node of one dataset plus its per-dataset metadata.
#[derive(Clone, Debug)]
pub struct Tile {
  root: NodeId,
  name: String,
  directory: PathBuf,
  time_step: TimeStep,
  priority: u8,
  color_present: bool,
  declared_bounds: DAabb3,
  tight_bounds: Option<DAabb3>,
  declared_points: u64,
  spacing: f64,
  coordinate_scale: f64,
  data_dir: PathBuf,
  hierarchy_step: u32,
}

impl Tile {
  pub fn new(descriptor: TileDescriptor, directory: &Path, time_step: TimeStep) -> Self {
    let name = directory
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    Self {
      root: descriptor.root,
      name,
      directory: directory.to_path_buf(),
      time_step,
      priority: descriptor.priority,
      color_present: true,
      declared_bounds: descriptor.declared_bounds,
      tight_bounds: descriptor.tight_bounds,
      declared_points: descriptor.declared_points,
      spacing: descriptor.spacing,
      coordinate_scale: descriptor.coordinate_scale,
      data_dir: descriptor.data_dir,
      hierarchy_step: descriptor.hierarchy_step,
    }
  }

  /// Root node inside the owning cloud's arena.
  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn time_step(&self) -> TimeStep {
    self.time_step
  }

  /// Higher values win during priority culling and load first.
  pub fn priority(&self) -> u8 {
    self.priority
  }

  pub fn color_present(&self) -> bool {
    self.color_present
  }

  pub(crate) fn set_color_present(&mut self, color_present: bool) {
    self.color_present = color_present;
  }

  /// Root box from the tile manifest.
  pub fn declared_bounds(&self) -> DAabb3 {
    self.declared_bounds
  }

  /// Tight box from the tile manifest, if it declares one.
  pub fn tight_bounds(&self) -> Option<DAabb3> {
    self.tight_bounds
  }

  /// Point total claimed by the manifest (not the hierarchy sum).
  pub fn declared_points(&self) -> u64 {
    self.declared_points
  }

  pub fn spacing(&self) -> f64 {
    self.spacing
  }

  /// Scale applied to stored integer coordinates (1.0 when scaling is ignored).
  pub fn coordinate_scale(&self) -> f64 {
    self.coordinate_scale
  }

  /// Directory holding the octree payload files.
  pub fn data_dir(&self) -> &Path {
    &self.data_dir
  }

  pub fn hierarchy_step(&self) -> u32 {
    self.hierarchy_step
  }
}
