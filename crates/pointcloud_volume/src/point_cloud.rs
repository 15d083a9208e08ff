//! PointCloud - one loaded dataset: its tiles, their shared node arena, and
//! the display state the renderer needs.
//!
//! A cloud is built once per load and never re-read; only its transform and
//! flags change afterwards.

use std::path::{Path, PathBuf};

use glam::{DQuat, DVec3};
use tracing::{debug, warn};

use crate::discover::subdirectories;
use crate::error::{Result, VolumeError};
use crate::manifest::{PointType, TileReader, TopManifest};
use crate::octree::{DAabb3, NodeId, OctreeArena, OctreeNode};
use crate::tile::{Tile, TimeStep};

/// Per-cloud rendering and navigation flags.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorFlags {
  pub show_map: bool,
  pub gravity: bool,
  pub skybox: bool,
  pub play_button: bool,
  pub show_sphere: bool,
  pub point_type: PointType,
  pub color_present: bool,
  pub ground_height: f64,
  pub teleport_scale: f64,
}

impl Default for BehaviorFlags {
  fn default() -> Self {
    Self::from(&TopManifest::default())
  }
}

impl From<&TopManifest> for BehaviorFlags {
  fn from(top: &TopManifest) -> Self {
    Self {
      show_map: top.show_map,
      gravity: top.gravity,
      skybox: top.skybox,
      play_button: top.play_button,
      show_sphere: top.show_sphere,
      point_type: top.point_type,
      color_present: top.color_present,
      ground_height: top.ground_height,
      teleport_scale: top.teleport_scale,
    }
  }
}

/// Similarity transform used for manual registration.
///
/// `p' = rotation * ((p - pivot) * scale) + pivot + shift`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CloudTransform {
  pub scale: f64,
  pub shift: DVec3,
  pub rotation: DQuat,
  pub pivot: DVec3,
}

impl Default for CloudTransform {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl CloudTransform {
  pub const IDENTITY: Self = Self {
    scale: 1.0,
    shift: DVec3::ZERO,
    rotation: DQuat::IDENTITY,
    pivot: DVec3::ZERO,
  };

  pub fn is_identity(&self) -> bool {
    *self == Self::IDENTITY
  }

  #[inline]
  pub fn apply_point(&self, p: DVec3) -> DVec3 {
    self.rotation * ((p - self.pivot) * self.scale) + self.pivot + self.shift
  }

  pub fn apply(&self, b: &DAabb3) -> DAabb3 {
    if self.is_identity() {
      *b
    } else {
      b.transformed(|p| self.apply_point(p))
    }
  }
}

/// One dataset's tiles, node storage and display state.
#[derive(Debug, Default)]
pub struct PointCloud {
  name: String,
  tiles: Vec<Tile>,
  arena: OctreeArena,
  flags: BehaviorFlags,
  transform: CloudTransform,
  levels_ready: bool,
}

impl PointCloud {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      ..Default::default()
    }
  }

  /// Cloud named after the last component of `dir`.
  pub fn named_after(dir: &Path) -> Self {
    Self::new(
      dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string()),
    )
  }

  // ===========================================================================
  // Loading
  // ===========================================================================

  /// Load `path` as one tile, or every tile subdirectory of `path`.
  ///
  /// Every tile gets `time_step`. Unreadable tiles are skipped with a
  /// warning; an error comes back only when nothing was loaded, and then the
  /// cloud is left without tiles.
  pub fn load_potree_multi_dir(
    &mut self,
    reader: &dyn TileReader,
    path: &Path,
    time_step: TimeStep,
    ignore_scaling: bool,
  ) -> Result<usize> {
    let dirs = if reader.is_tile_dir(path) {
      vec![path.to_path_buf()]
    } else {
      subdirectories(path, None)
        .into_iter()
        .filter(|dir| reader.is_tile_dir(dir))
        .collect()
    };
    if dirs.is_empty() {
      warn!(path = %path.display(), "no tile manifest found");
      return Err(VolumeError::ManifestNotFound {
        path: path.to_path_buf(),
      });
    }
    self.load_tiles_from(reader, &dirs, time_step, ignore_scaling)
  }

  /// Load several tile directories into this one cloud (static time).
  pub fn load_multiple_tiles(&mut self, reader: &dyn TileReader, dirs: &[PathBuf], ignore_scaling: bool) -> Result<usize> {
    self.load_tiles_from(reader, dirs, TimeStep::STATIC, ignore_scaling)
  }

  fn load_tiles_from(
    &mut self,
    reader: &dyn TileReader,
    dirs: &[PathBuf],
    time_step: TimeStep,
    ignore_scaling: bool,
  ) -> Result<usize> {
    let mut loaded = 0;
    let mut last_error = None;
    for dir in dirs {
      match reader.read_tile(dir, &mut self.arena, ignore_scaling) {
        Ok(descriptor) => {
          let mut tile = Tile::new(descriptor, dir, time_step);
          tile.set_color_present(self.flags.color_present);
          self.tiles.push(tile);
          loaded += 1;
        }
        Err(err) => {
          warn!(dir = %dir.display(), error = %err, "skipping unreadable tile");
          last_error = Some(err);
        }
      }
    }
    self.levels_ready = false;
    debug!(cloud = %self.name, tiles = loaded, "loaded tiles");
    match last_error {
      Some(err) if loaded == 0 => Err(err),
      _ => Ok(loaded),
    }
  }

  // ===========================================================================
  // Per-load passes
  // ===========================================================================

  /// Compute `levels_below` for every tile. Call once after loading.
  pub fn set_levels_below(&mut self) {
    for tile in &self.tiles {
      self.arena.compute_levels_below(tile.root());
    }
    self.levels_ready = true;
  }

  /// True once [`set_levels_below`](Self::set_levels_below) ran for the
  /// current tiles.
  pub fn levels_ready(&self) -> bool {
    self.levels_ready
  }

  /// Rebase every node into the shared frame `min..max`.
  pub fn set_global_min_max(&mut self, min: DVec3, max: DVec3) {
    for node in self.arena.iter_mut() {
      node.set_global_min_max(min, max);
    }
  }

  /// Store a registration transform and re-place every node from its local
  /// box.
  pub fn set_xform(&mut self, transform: CloudTransform) {
    self.transform = transform;
    self.apply_xform();
  }

  /// Every node back to the identity frame with no registration applied.
  pub(crate) fn reset_frames(&mut self) {
    for node in self.arena.iter_mut() {
      node.reset_frame();
    }
  }

  /// Re-place every node with the stored transform.
  pub(crate) fn apply_xform(&mut self) {
    let transform = self.transform;
    if transform.is_identity() {
      for node in self.arena.iter_mut() {
        node.place(|p| p);
      }
    } else {
      for node in self.arena.iter_mut() {
        node.place(|p| transform.apply_point(p));
      }
    }
  }

  // ===========================================================================
  // Aggregate queries
  // ===========================================================================

  /// Box of the data actually present, registration applied.
  ///
  /// Per tile: the manifest's tight box, or else the union of leaves that
  /// hold points; always clipped to the declared box. `None` for a cloud
  /// without data.
  pub fn tight_octree_box(&self) -> Option<DAabb3> {
    self
      .tiles
      .iter()
      .filter_map(|tile| self.tile_tight_box(tile))
      .map(|b| self.transform.apply(&b))
      .reduce(|a, b| a.union(&b))
  }

  pub fn tight_octree_min(&self) -> Option<DVec3> {
    self.tight_octree_box().map(|b| b.min)
  }

  pub fn tight_octree_max(&self) -> Option<DVec3> {
    self.tight_octree_box().map(|b| b.max)
  }

  fn tile_tight_box(&self, tile: &Tile) -> Option<DAabb3> {
    let declared = tile.declared_bounds();
    let tight = match tile.tight_bounds() {
      Some(tight) => tight,
      None => DAabb3::from_points(
        self
          .arena
          .leaves(tile.root())
          .into_iter()
          .map(|id| &self.arena[id])
          .filter(|node| node.num_points() > 0)
          .flat_map(|node| [node.local_bounds().min, node.local_bounds().max]),
      )?,
    };
    tight.intersection(&declared)
  }

  /// Sum of node point counts over every tile.
  pub fn total_points(&self) -> u64 {
    self
      .tiles
      .iter()
      .map(|tile| self.arena.subtree_points(tile.root()))
      .sum()
  }

  /// Live nodes of every tile: tile order, then pre-order within a tile.
  pub fn all_nodes(&self) -> Vec<NodeId> {
    self
      .tiles
      .iter()
      .flat_map(|tile| self.arena.all_nodes(tile.root()))
      .collect()
  }

  /// Time step shared by this cloud's tiles.
  pub fn time_step(&self) -> TimeStep {
    self
      .tiles
      .iter()
      .map(Tile::time_step)
      .max()
      .unwrap_or(TimeStep::STATIC)
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn tiles(&self) -> &[Tile] {
    &self.tiles
  }

  pub fn is_empty(&self) -> bool {
    self.tiles.is_empty()
  }

  pub fn arena(&self) -> &OctreeArena {
    &self.arena
  }

  pub(crate) fn arena_mut(&mut self) -> &mut OctreeArena {
    &mut self.arena
  }

  pub fn node(&self, id: NodeId) -> Option<&OctreeNode> {
    self.arena.get(id)
  }

  pub fn flags(&self) -> &BehaviorFlags {
    &self.flags
  }

  /// Replace the flags; tiles pick up the color flag.
  pub fn set_flags(&mut self, flags: BehaviorFlags) {
    for tile in &mut self.tiles {
      tile.set_color_present(flags.color_present);
    }
    self.flags = flags;
  }

  pub fn transform(&self) -> &CloudTransform {
    &self.transform
  }
}

#[cfg(test)]
#[path = "point_cloud_test.rs"]
mod point_cloud_test;
