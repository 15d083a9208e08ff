//! Read-only tree queries over an [`OctreeArena`].
//!
//! All walks are iterative over an explicit stack and visit nodes in
//! pre-order with children in octant order 0..7. Culled and reclaimed nodes
//! are skipped together with their subtrees. Every query returns a fresh
//! `Vec`; nothing is cached.

use super::{NodeId, OctreeArena};

/// Whether a walk continues below the node just visited.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Descend {
  Yes,
  No,
}

impl OctreeArena {
  /// Pre-order walk from `root`, skipping non-live subtrees.
  fn walk(&self, root: NodeId, mut visit: impl FnMut(NodeId) -> Descend) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
      let Some(node) = self.get(id) else {
        continue;
      };
      if !node.is_live() {
        continue;
      }
      if visit(id) == Descend::Yes {
        // reversed so octant 0 is popped first
        stack.extend(node.children.iter().rev().flatten().copied());
      }
    }
  }

  /// Every live node under `root`, root included.
  pub fn all_nodes(&self, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(root, |id| {
      out.push(id);
      Descend::Yes
    });
    out
  }

  /// Live nodes without child slots.
  pub fn leaves(&self, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(root, |id| {
      if self[id].is_leaf() {
        out.push(id);
      }
      Descend::Yes
    });
    out
  }

  /// Nodes exactly at octree `level`; the walk stops there.
  pub fn nodes_at_level(&self, root: NodeId, level: u32) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(root, |id| {
      if self[id].level == level {
        out.push(id);
        Descend::No
      } else {
        Descend::Yes
      }
    });
    out
  }

  /// Topmost nodes whose subtree height is at most `levels`.
  pub fn nodes_at_levels_below(&self, root: NodeId, levels: u32) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(root, |id| {
      if self[id].levels_below <= levels {
        out.push(id);
        Descend::No
      } else {
        Descend::Yes
      }
    });
    out
  }

  /// Topmost nodes whose child slots listed in `octants` are all occupied.
  pub fn nodes_with_occupied_children(&self, root: NodeId, octants: &[u8]) -> Vec<NodeId> {
    let mut out = Vec::new();
    self.walk(root, |id| {
      let node = &self[id];
      if octants.iter().all(|&o| node.child(o).is_some()) {
        out.push(id);
        Descend::No
      } else {
        Descend::Yes
      }
    });
    out
  }

  /// Sum of point counts over the live subtree of `root`.
  pub fn subtree_points(&self, root: NodeId) -> u64 {
    let mut total = 0u64;
    self.walk(root, |id| {
      total += self[id].num_points;
      Descend::Yes
    });
    total
  }

  /// Compute and store `levels_below` for every node under `root`.
  ///
  /// Runs over the full topology regardless of liveness. Returns the root's
  /// value.
  pub fn compute_levels_below(&mut self, root: NodeId) -> u32 {
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
      order.push(id);
      stack.extend(self[id].children.iter().rev().flatten().copied());
    }

    // children always appear after their parent in pre-order
    for &id in order.iter().rev() {
      let height = self[id]
        .children
        .iter()
        .flatten()
        .map(|&c| self[c].levels_below + 1)
        .max()
        .unwrap_or(0);
      self[id].levels_below = height;
    }
    self[root].levels_below
  }
}

#[cfg(test)]
#[path = "traversal_test.rs"]
mod traversal_test;
