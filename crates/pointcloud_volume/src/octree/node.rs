//! OctreeNode - one cell of a tile's octree, stored in an [`OctreeArena`].
//!
//! Children are owned through arena indices; the parent link is a plain index
//! used for upward traversal only.
//!
//! [`OctreeArena`]: super::OctreeArena

use std::sync::Arc;

use super::{CoordinateFrame, DAabb3};
use crate::payload::{LoadState, PayloadCell, PointPayload};

/// Index of a node inside its cloud's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// Liveness tag used by priority culling.
///
/// Marking and reclaiming are separate passes; a culled node stays in the
/// arena until the reclaim pass detaches it. Only live nodes receive uids.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Liveness {
  #[default]
  Live,
  /// Marked for deletion; traversals skip it and its subtree.
  Culled,
  /// Detached from its parent and payload released.
  Reclaimed,
}

/// Octree cell with declared bounds, point count and residency.
#[derive(Debug)]
pub struct OctreeNode {
  /// Name within the tile (`r`, `r0`, `r07`, ...).
  pub(crate) name: String,
  pub(crate) level: u32,
  /// Box in dataset-local coordinates, never rewritten.
  pub(crate) local_bounds: DAabb3,
  /// `local_bounds` after the owning cloud's registration transform.
  pub(crate) placed_bounds: DAabb3,
  pub(crate) frame: CoordinateFrame,
  pub(crate) parent: Option<NodeId>,
  pub(crate) children: [Option<NodeId>; 8],
  /// Points stored in this node itself.
  pub(crate) num_points: u64,
  pub(crate) levels_below: u32,
  pub(crate) uid: Option<u32>,
  pub(crate) tile_id: Option<u32>,
  pub(crate) liveness: Liveness,
  pub(crate) payload: Arc<PayloadCell>,
}

impl OctreeNode {
  pub(crate) fn new(name: String, level: u32, bounds: DAabb3, num_points: u64) -> Self {
    Self {
      name,
      level,
      local_bounds: bounds,
      placed_bounds: bounds,
      frame: CoordinateFrame::Identity,
      parent: None,
      children: [None; 8],
      num_points,
      levels_below: 0,
      uid: None,
      tile_id: None,
      liveness: Liveness::Live,
      payload: Arc::new(PayloadCell::new()),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Octree depth (tile root = 0).
  pub fn level(&self) -> u32 {
    self.level
  }

  /// Child slot `octant` (0..7). Never allocates.
  #[inline]
  pub fn child(&self, octant: u8) -> Option<NodeId> {
    self.children.get(octant as usize).copied().flatten()
  }

  pub fn parent(&self) -> Option<NodeId> {
    self.parent
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.iter().all(Option::is_none)
  }

  /// Bounds in the current coordinate frame, registration applied.
  #[inline]
  pub fn bounds(&self) -> DAabb3 {
    self.frame.apply(&self.placed_bounds)
  }

  /// Bounds as declared by the tile manifest.
  pub fn local_bounds(&self) -> DAabb3 {
    self.local_bounds
  }

  /// Bounds after registration, before the coordinate frame.
  pub fn placed_bounds(&self) -> DAabb3 {
    self.placed_bounds
  }

  pub fn frame(&self) -> CoordinateFrame {
    self.frame
  }

  /// Recompute the placed box from the local box. Never accumulates.
  pub(crate) fn place(&mut self, transform: impl Fn(glam::DVec3) -> glam::DVec3) {
    self.placed_bounds = self.local_bounds.transformed(transform);
  }

  /// Back to the `[0,0,0]–[1,1,1]` baseline with no registration.
  pub(crate) fn reset_frame(&mut self) {
    self.frame = CoordinateFrame::Identity;
    self.placed_bounds = self.local_bounds;
  }

  /// Rebase this node into the shared frame `min..max`.
  pub fn set_global_min_max(&mut self, min: glam::DVec3, max: glam::DVec3) {
    self.frame = CoordinateFrame::from_min_max(min, max);
  }

  /// Points held by this node alone.
  pub fn num_points(&self) -> u64 {
    self.num_points
  }

  /// Height of the subtree below this node (0 for a leaf).
  ///
  /// Valid once the owning cloud ran `set_levels_below`.
  pub fn levels_below(&self) -> u32 {
    self.levels_below
  }

  pub fn uid(&self) -> Option<u32> {
    self.uid
  }

  pub fn set_uid(&mut self, uid: u32) {
    self.uid = Some(uid);
  }

  pub fn tile_id(&self) -> Option<u32> {
    self.tile_id
  }

  pub fn liveness(&self) -> Liveness {
    self.liveness
  }

  #[inline]
  pub fn is_live(&self) -> bool {
    self.liveness == Liveness::Live
  }

  /// Exclude this node (and, for traversals, its subtree). Idempotent.
  ///
  /// Returns `true` only when the node was live before the call.
  pub fn mark_for_deletion(&mut self) -> bool {
    if self.liveness == Liveness::Live {
      self.liveness = Liveness::Culled;
      true
    } else {
      false
    }
  }

  pub fn load_state(&self) -> LoadState {
    self.payload.state()
  }

  /// Resident payload, if the worker has published one.
  pub fn payload(&self) -> Option<Arc<PointPayload>> {
    self.payload.payload()
  }

  pub(crate) fn payload_cell(&self) -> &Arc<PayloadCell> {
    &self.payload
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
