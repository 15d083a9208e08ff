//! OctreeArena - contiguous storage for every node of one point cloud.
//!
//! Tiles share a cloud's arena; each tile only remembers its root id. Ids are
//! handed out sequentially and never reused, so a [`NodeId`] stays valid for
//! the lifetime of the arena (culled nodes are detached, not removed).

use smallvec::SmallVec;

use super::{DAabb3, Liveness, NodeId, OctreeNode};
use crate::error::{Result, VolumeError};

/// Arena of octree nodes.
#[derive(Debug, Default)]
pub struct OctreeArena {
  nodes: Vec<OctreeNode>,
}

impl OctreeArena {
  pub fn new() -> Self {
    Self::default()
  }

  /// Total nodes ever inserted (including culled and reclaimed).
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn get(&self, id: NodeId) -> Option<&OctreeNode> {
    self.nodes.get(id.index())
  }

  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut OctreeNode> {
    self.nodes.get_mut(id.index())
  }

  /// Iterate over all stored nodes in insertion order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OctreeNode)> {
    self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (NodeId(i as u32), n))
  }

  pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut OctreeNode> {
    self.nodes.iter_mut()
  }

  /// Drop every node inserted at or after index `len`.
  ///
  /// Only valid while no surviving node links into the dropped range.
  pub(crate) fn truncate(&mut self, len: usize) {
    self.nodes.truncate(len);
  }

  /// Insert a tile root.
  pub fn add_root(&mut self, name: impl Into<String>, bounds: DAabb3, num_points: u64) -> NodeId {
    self.push(OctreeNode::new(name.into(), 0, bounds, num_points))
  }

  /// Insert a child into slot `octant` of `parent`.
  ///
  /// Rejects occupied slots and boxes that escape the parent's box, so the
  /// containment invariant holds for any tree built through this call.
  pub fn add_child(
    &mut self,
    parent: NodeId,
    octant: u8,
    name: impl Into<String>,
    bounds: DAabb3,
    num_points: u64,
  ) -> Result<NodeId> {
    let parent_node = &self[parent];
    if octant >= 8 {
      return Err(VolumeError::ChildOutOfBounds { parent, octant });
    }
    if parent_node.children[octant as usize].is_some() {
      return Err(VolumeError::ChildSlotOccupied { parent, octant });
    }
    if !parent_node.local_bounds.contains_aabb(&bounds) {
      return Err(VolumeError::ChildOutOfBounds { parent, octant });
    }

    let level = parent_node.level + 1;
    let mut node = OctreeNode::new(name.into(), level, bounds, num_points);
    node.parent = Some(parent);
    let id = self.push(node);
    self[parent].children[octant as usize] = Some(id);
    Ok(id)
  }

  /// Child `octant` of `id`, if present.
  #[inline]
  pub fn child(&self, id: NodeId, octant: u8) -> Option<NodeId> {
    self.get(id).and_then(|n| n.child(octant))
  }

  /// Present children of `id` in octant order.
  pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 8]> {
    self
      .get(id)
      .map(|n| n.children.iter().flatten().copied().collect())
      .unwrap_or_default()
  }

  pub fn parent(&self, id: NodeId) -> Option<NodeId> {
    self.get(id).and_then(|n| n.parent)
  }

  /// Detach every culled subtree and release its payloads.
  ///
  /// Returns the number of nodes reclaimed. Live nodes are untouched.
  pub fn compact_culled(&mut self) -> usize {
    let culled: Vec<NodeId> = self
      .iter()
      .filter(|(_, n)| n.liveness == Liveness::Culled)
      .map(|(id, _)| id)
      .collect();

    let mut reclaimed = 0;
    for root in culled {
      // Detach from the parent first so the subtree is unreachable.
      if let Some(parent) = self[root].parent {
        for slot in self[parent].children.iter_mut() {
          if *slot == Some(root) {
            *slot = None;
          }
        }
      }

      let mut stack = vec![root];
      while let Some(id) = stack.pop() {
        let node = &mut self[id];
        if node.liveness == Liveness::Reclaimed {
          continue;
        }
        node.liveness = Liveness::Reclaimed;
        node.payload.release();
        reclaimed += 1;
        stack.extend(node.children.iter().flatten().copied());
      }
    }
    reclaimed
  }

  fn push(&mut self, node: OctreeNode) -> NodeId {
    let id = NodeId(self.nodes.len() as u32);
    self.nodes.push(node);
    id
  }
}

impl std::ops::Index<NodeId> for OctreeArena {
  type Output = OctreeNode;

  #[inline]
  fn index(&self, id: NodeId) -> &OctreeNode {
    &self.nodes[id.index()]
  }
}

impl std::ops::IndexMut<NodeId> for OctreeArena {
  #[inline]
  fn index_mut(&mut self, id: NodeId) -> &mut OctreeNode {
    &mut self.nodes[id.index()]
  }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
