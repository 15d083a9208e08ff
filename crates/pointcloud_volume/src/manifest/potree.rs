//! Potree 1.x tile reader.
//!
//! A tile directory holds `cloud.js` and an octree directory (`data` by
//! default). The hierarchy is split into chunks of `hierarchyStepSize`
//! levels; each chunk is a breadth-first list of 5-byte records:
//!
//! ```text
//! ┌──────────┬─────────────────────┐
//! │ u8 mask  │ u32 LE point count  │   first record = chunk root,
//! └──────────┴─────────────────────┘   then children in BFS order
//! ```
//!
//! Nodes at the bottom of a chunk keep their mask but their children live in
//! the next chunk, `<octreeDir>/r/<path>/<name>.hrc`. Payload files sit next
//! to the chunk as `<name>.bin`.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use glam::DVec3;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{TileDescriptor, TileReader};
use crate::error::{Result, VolumeError};
use crate::octree::{DAabb3, NodeId, OctreeArena};
use crate::payload::{PayloadRequest, PayloadSource, PointPayload};

/// Bytes per hierarchy record.
const RECORD_LEN: usize = 5;

/// Reads Potree 1.x tiles and their payload files.
#[derive(Clone, Debug)]
pub struct PotreeReader {
  manifest_name: String,
}

impl Default for PotreeReader {
  fn default() -> Self {
    Self::new("cloud.js")
  }
}

impl PotreeReader {
  pub fn new(manifest_name: impl Into<String>) -> Self {
    Self {
      manifest_name: manifest_name.into(),
    }
  }

  pub fn manifest_name(&self) -> &str {
    &self.manifest_name
  }

  fn read_cloud_js(&self, dir: &Path) -> Result<CloudJs> {
    let path = dir.join(&self.manifest_name);
    let text = std::fs::read_to_string(&path).map_err(|err| {
      if err.kind() == std::io::ErrorKind::NotFound {
        VolumeError::ManifestNotFound { path: path.clone() }
      } else {
        VolumeError::io(&path, err)
      }
    })?;
    serde_json::from_str(&text).map_err(|source| VolumeError::InvalidManifest { path, source })
  }
}

impl TileReader for PotreeReader {
  fn is_tile_dir(&self, dir: &Path) -> bool {
    dir.join(&self.manifest_name).is_file()
  }

  fn read_tile(&self, dir: &Path, arena: &mut OctreeArena, ignore_scaling: bool) -> Result<TileDescriptor> {
    let cloud = self.read_cloud_js(dir)?;
    let data_dir = dir.join(&cloud.octree_dir);
    let step = cloud.hierarchy_step_size.max(1);

    // decode the root chunk before touching the arena
    let root_chunk_path = chunk_path(&data_dir, "r", step);
    let root_chunk = read_chunk(&root_chunk_path)?;

    let declared_bounds = cloud.bounding_box.to_aabb();
    let start = arena.len();
    let root = arena.add_root("r", declared_bounds, 0);
    let mut pending = match attach_chunk(arena, root, root_chunk, &root_chunk_path) {
      Ok(pending) => pending,
      Err(err) => {
        arena.truncate(start);
        return Err(err);
      }
    };

    let mut visited = HashSet::from([root]);
    while let Some(id) = pending.pop() {
      if !visited.insert(id) {
        continue;
      }
      let name = arena[id].name().to_string();
      let path = chunk_path(&data_dir, &name, step);
      let attached = read_chunk(&path).and_then(|chunk| attach_chunk(arena, id, chunk, &path));
      match attached {
        Ok(more) => pending.extend(more),
        Err(err) => warn!(node = %name, error = %err, "hierarchy chunk unusable, subtree truncated"),
      }
    }

    debug!(
      dir = %dir.display(),
      nodes = arena.all_nodes(root).len(),
      points = cloud.points,
      "read potree tile"
    );

    Ok(TileDescriptor {
      root,
      declared_bounds,
      tight_bounds: cloud.tight_bounding_box.map(|b| b.to_aabb()),
      declared_points: cloud.points,
      spacing: cloud.spacing,
      coordinate_scale: if ignore_scaling { 1.0 } else { cloud.scale },
      priority: cloud.priority,
      data_dir,
      hierarchy_step: step,
    })
  }
}

impl PayloadSource for PotreeReader {
  fn load(&self, request: &PayloadRequest) -> Result<PointPayload> {
    let (path, points) = match request {
      PayloadRequest::Node(node) => {
        let path = node_dir(&node.data_dir, &node.name, node.hierarchy_step).join(format!("{}.bin", node.name));
        (path, node.num_points)
      }
      PayloadRequest::Mesh(mesh) => (mesh.path.clone(), mesh.num_points),
    };
    let bytes = std::fs::read(&path).map_err(|err| VolumeError::io(&path, err))?;
    Ok(PointPayload::new(points, bytes))
  }
}

/// Directory holding the chunk and payload of node `name`.
///
/// `r` + every full group of `step` digits after the root, e.g. with step 2
/// `r0123` lives in `r/01/23/`, `r012` in `r/01/`.
pub fn node_dir(data_dir: &Path, name: &str, step: u32) -> PathBuf {
  let mut path = data_dir.join("r");
  let digits = name.get(1..).unwrap_or_default().as_bytes();
  for group in digits.chunks_exact(step.max(1) as usize) {
    path.push(String::from_utf8_lossy(group).as_ref());
  }
  path
}

fn chunk_path(data_dir: &Path, name: &str, step: u32) -> PathBuf {
  node_dir(data_dir, name, step).join(format!("{name}.hrc"))
}

/// One decoded hierarchy record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HrcRecord {
  pub mask: u8,
  pub points: u32,
}

fn read_chunk(path: &Path) -> Result<Vec<HrcRecord>> {
  let bytes = std::fs::read(path).map_err(|err| VolumeError::io(path, err))?;
  decode_records(&bytes).map_err(|reason| VolumeError::InvalidHierarchy {
    path: path.to_path_buf(),
    reason,
  })
}

pub(crate) fn decode_records(bytes: &[u8]) -> std::result::Result<Vec<HrcRecord>, String> {
  if bytes.is_empty() {
    return Err("empty chunk".to_string());
  }
  if bytes.len() % RECORD_LEN != 0 {
    return Err(format!("{} bytes is not a whole number of records", bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(RECORD_LEN)
      .map(|r| HrcRecord {
        mask: r[0],
        points: u32::from_le_bytes([r[1], r[2], r[3], r[4]]),
      })
      .collect(),
  )
}

/// Hang a decoded chunk under `chunk_root`.
///
/// Returns the nodes whose children were cut off at the chunk's bottom.
fn attach_chunk(
  arena: &mut OctreeArena,
  chunk_root: NodeId,
  records: Vec<HrcRecord>,
  path: &Path,
) -> Result<Vec<NodeId>> {
  let mut records = records.into_iter();
  let Some(first) = records.next() else {
    return Ok(Vec::new());
  };
  arena[chunk_root].num_points = first.points as u64;

  let mut queue = VecDeque::from([(chunk_root, first.mask)]);
  let mut pending = Vec::new();
  while let Some((id, mask)) = queue.pop_front() {
    if mask == 0 {
      continue;
    }
    // records ran out: the rest of the queue continues in nested chunks
    if records.as_slice().is_empty() {
      if id == chunk_root {
        // a chunk never continues its own root
        warn!(path = %path.display(), node = %arena[id].name(), "chunk holds no children for its root, keeping it as a leaf");
        break;
      }
      pending.push(id);
      pending.extend(queue.drain(..).filter(|(_, m)| *m != 0).map(|(n, _)| n));
      break;
    }

    let parent_bounds = arena[id].local_bounds();
    let parent_name = arena[id].name().to_string();
    for octant in (0u8..8).filter(|o| mask & (1 << o) != 0) {
      let record = records.next().ok_or_else(|| VolumeError::InvalidHierarchy {
        path: path.to_path_buf(),
        reason: format!("chunk ends inside the children of {parent_name}"),
      })?;
      let child = arena.add_child(
        id,
        octant,
        format!("{parent_name}{octant}"),
        parent_bounds.octant(octant),
        record.points as u64,
      )?;
      queue.push_back((child, record.mask));
    }
  }
  Ok(pending)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudJs {
  #[serde(default = "default_octree_dir")]
  octree_dir: String,
  #[serde(default)]
  points: u64,
  bounding_box: BoxJs,
  #[serde(default)]
  tight_bounding_box: Option<BoxJs>,
  #[serde(default)]
  spacing: f64,
  #[serde(default = "default_scale")]
  scale: f64,
  #[serde(default = "default_step")]
  hierarchy_step_size: u32,
  #[serde(default)]
  priority: u8,
}

#[derive(Debug, Deserialize)]
struct BoxJs {
  lx: f64,
  ly: f64,
  lz: f64,
  ux: f64,
  uy: f64,
  uz: f64,
}

impl BoxJs {
  fn to_aabb(&self) -> DAabb3 {
    let lower = DVec3::new(self.lx, self.ly, self.lz);
    let upper = DVec3::new(self.ux, self.uy, self.uz);
    DAabb3::new(lower.min(upper), lower.max(upper))
  }
}

fn default_octree_dir() -> String {
  "data".to_string()
}

fn default_scale() -> f64 {
  1.0
}

fn default_step() -> u32 {
  5
}

#[cfg(test)]
#[path = "potree_test.rs"]
mod potree_test;
