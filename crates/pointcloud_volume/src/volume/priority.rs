//! Priority culling between overlapping tiles.
//!
//! Tiles with a priority above zero own the ground they cover. Nodes of
//! priority-0 tiles that sit mostly inside that ground are marked culled;
//! reclaiming them is a separate step ([`crate::Volume::compact_culled`]).

use tracing::debug;

use super::VolumeState;
use crate::octree::{DAabb3, NodeId, OctreeArena};

/// Octant slots that together span the XY footprint of a cell.
const FOOTPRINT_OCTANTS: [u8; 4] = [0, 2, 4, 6];

/// Corners of a node's footprint that must fall in some reference cell.
const CORNERS_REQUIRED: usize = 3;

impl VolumeState {
  /// Mark low-priority nodes covered by high-priority tiles.
  ///
  /// Returns how many subtrees were newly culled. Already-culled nodes are
  /// skipped, so a second call returns 0.
  pub(crate) fn prune_by_priority(&mut self) -> usize {
    let reference = self.reference_cells();
    if reference.is_empty() {
      return 0;
    }

    let mut culled = 0;
    for tile_ref in &self.tiles {
      let cloud = &mut self.point_clouds[tile_ref.cloud];
      let tile = &cloud.tiles()[tile_ref.tile];
      if tile.priority() > 0 {
        continue;
      }
      let root = tile.root();
      culled += cull_covered(cloud.arena_mut(), root, &reference);
    }
    debug!(culled, cells = reference.len(), "priority culling");
    culled
  }

  /// Boxes of the topmost nodes of priority tiles whose footprint octants
  /// are all present.
  fn reference_cells(&self) -> Vec<DAabb3> {
    self
      .tiles
      .iter()
      .filter_map(|tile_ref| {
        let cloud = &self.point_clouds[tile_ref.cloud];
        let tile = &cloud.tiles()[tile_ref.tile];
        (tile.priority() > 0).then_some((cloud, tile.root()))
      })
      .flat_map(|(cloud, root)| {
        cloud
          .arena()
          .nodes_with_occupied_children(root, &FOOTPRINT_OCTANTS)
          .into_iter()
          .map(|id| cloud.arena()[id].bounds())
      })
      .collect()
  }
}

fn covered(bounds: &DAabb3, reference: &[DAabb3]) -> bool {
  bounds
    .corners_xy()
    .iter()
    .filter(|&&corner| reference.iter().any(|cell| cell.contains_point_xy(corner)))
    .count()
    >= CORNERS_REQUIRED
}

/// Cull the topmost covered nodes under `root`; returns how many.
fn cull_covered(arena: &mut OctreeArena, root: NodeId, reference: &[DAabb3]) -> usize {
  let mut culled = 0;
  let mut stack = vec![root];
  while let Some(id) = stack.pop() {
    let node = &arena[id];
    if !node.is_live() {
      continue;
    }
    if covered(&node.bounds(), reference) {
      if arena[id].mark_for_deletion() {
        culled += 1;
      }
      continue;
    }
    stack.extend(arena.children(id));
  }
  culled
}
