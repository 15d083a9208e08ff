//! On-disk manifests.
//!
//! - [`top`]: the multi-dataset `top.json` document and its behavior flags
//! - [`potree`]: Potree 1.x tile reader (`cloud.js` + `.hrc` hierarchy)
//!
//! The coordinator only talks to tiles through [`TileReader`], so another
//! tile format can be plugged in without touching aggregation.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::octree::{DAabb3, NodeId, OctreeArena};

pub mod potree;
pub mod top;

pub use potree::PotreeReader;
pub use top::{PointType, TopManifest};

/// What a reader reports about one parsed tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileDescriptor {
  /// Root inserted into the caller's arena.
  pub root: NodeId,
  pub declared_bounds: DAabb3,
  pub tight_bounds: Option<DAabb3>,
  /// Point total claimed by the manifest.
  pub declared_points: u64,
  pub spacing: f64,
  pub coordinate_scale: f64,
  pub priority: u8,
  /// Directory holding hierarchy and payload files.
  pub data_dir: PathBuf,
  /// Levels per hierarchy chunk.
  pub hierarchy_step: u32,
}

/// Tile format reader.
///
/// `read_tile` builds the whole hierarchy into `arena` and returns the root.
/// On error nothing reachable has been added.
pub trait TileReader: Send + Sync {
  /// True if `dir` holds a single tile manifest.
  fn is_tile_dir(&self, dir: &Path) -> bool;

  fn read_tile(&self, dir: &Path, arena: &mut OctreeArena, ignore_scaling: bool) -> Result<TileDescriptor>;
}

impl<T: TileReader + ?Sized> TileReader for std::sync::Arc<T> {
  fn is_tile_dir(&self, dir: &Path) -> bool {
    (**self).is_tile_dir(dir)
  }

  fn read_tile(&self, dir: &Path, arena: &mut OctreeArena, ignore_scaling: bool) -> Result<TileDescriptor> {
    (**self).read_tile(dir, arena, ignore_scaling)
  }
}
