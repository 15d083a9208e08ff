use glam::DVec3;

use super::*;
use crate::octree::DAabb3;

/// Root with children in octants 0, 2, 5; child 0 has leaves 1 and 6.
///
/// ```text
/// r (0 pts)
/// ├── r0 (0 pts)
/// │   ├── r01 (10 pts)
/// │   └── r06 (20 pts)
/// ├── r2 (5 pts)
/// └── r5 (0 pts)
/// ```
struct Fixture {
  arena: OctreeArena,
  root: NodeId,
  r0: NodeId,
  r01: NodeId,
  r06: NodeId,
  r2: NodeId,
  r5: NodeId,
}

fn fixture() -> Fixture {
  let mut arena = OctreeArena::new();
  let root = arena.add_root("r", DAabb3::new(DVec3::ZERO, DVec3::splat(16.0)), 0);
  let rb = arena[root].local_bounds();
  let r0 = arena.add_child(root, 0, "r0", rb.octant(0), 0).unwrap();
  let r2 = arena.add_child(root, 2, "r2", rb.octant(2), 5).unwrap();
  let r5 = arena.add_child(root, 5, "r5", rb.octant(5), 0).unwrap();
  let b0 = arena[r0].local_bounds();
  let r01 = arena.add_child(r0, 1, "r01", b0.octant(1), 10).unwrap();
  let r06 = arena.add_child(r0, 6, "r06", b0.octant(6), 20).unwrap();
  Fixture {
    arena,
    root,
    r0,
    r01,
    r06,
    r2,
    r5,
  }
}

// =========================================================================
// Ordering
// =========================================================================

/// Pre-order, children in octant order.
#[test]
fn test_all_nodes_preorder() {
  let f = fixture();
  assert_eq!(
    f.arena.all_nodes(f.root),
    vec![f.root, f.r0, f.r01, f.r06, f.r2, f.r5]
  );
}

#[test]
fn test_leaves_in_order() {
  let f = fixture();
  assert_eq!(f.arena.leaves(f.root), vec![f.r01, f.r06, f.r2, f.r5]);
}

#[test]
fn test_nodes_at_level() {
  let f = fixture();
  assert_eq!(f.arena.nodes_at_level(f.root, 0), vec![f.root]);
  assert_eq!(f.arena.nodes_at_level(f.root, 1), vec![f.r0, f.r2, f.r5]);
  assert_eq!(f.arena.nodes_at_level(f.root, 2), vec![f.r01, f.r06]);
  assert!(f.arena.nodes_at_level(f.root, 3).is_empty());
}

/// Queries are recomputed on each call and agree.
#[test]
fn test_queries_not_cached() {
  let f = fixture();
  assert_eq!(f.arena.leaves(f.root), f.arena.leaves(f.root));
}

// =========================================================================
// Levels below
// =========================================================================

#[test]
fn test_compute_levels_below() {
  let mut f = fixture();
  assert_eq!(f.arena.compute_levels_below(f.root), 2);
  assert_eq!(f.arena[f.r0].levels_below(), 1);
  assert_eq!(f.arena[f.r01].levels_below(), 0);
  assert_eq!(f.arena[f.r2].levels_below(), 0);
}

/// levels_below == 1 + max(child.levels_below), or 0 for a leaf.
#[test]
fn test_levels_below_invariant() {
  let mut f = fixture();
  f.arena.compute_levels_below(f.root);
  for id in f.arena.all_nodes(f.root) {
    let expected = f
      .arena
      .children(id)
      .iter()
      .map(|&c| f.arena[c].levels_below() + 1)
      .max()
      .unwrap_or(0);
    assert_eq!(f.arena[id].levels_below(), expected);
  }
}

#[test]
fn test_nodes_at_levels_below() {
  let mut f = fixture();
  f.arena.compute_levels_below(f.root);
  assert_eq!(f.arena.nodes_at_levels_below(f.root, 2), vec![f.root]);
  assert_eq!(
    f.arena.nodes_at_levels_below(f.root, 1),
    vec![f.r0, f.r2, f.r5]
  );
  assert_eq!(
    f.arena.nodes_at_levels_below(f.root, 0),
    vec![f.r01, f.r06, f.r2, f.r5]
  );
}

// =========================================================================
// Occupancy
// =========================================================================

/// The root does not have 0,2,4,6 all occupied; descent finds nothing deeper
/// either, since no node has those four children.
#[test]
fn test_nodes_with_occupied_children() {
  let f = fixture();
  assert!(f
    .arena
    .nodes_with_occupied_children(f.root, &[0, 2, 4, 6])
    .is_empty());
  assert_eq!(
    f.arena.nodes_with_occupied_children(f.root, &[0, 2]),
    vec![f.root]
  );
  assert_eq!(
    f.arena.nodes_with_occupied_children(f.root, &[1, 6]),
    vec![f.r0]
  );
}

/// An empty octant list matches the root immediately.
#[test]
fn test_occupied_children_empty_list_matches_root() {
  let f = fixture();
  assert_eq!(f.arena.nodes_with_occupied_children(f.root, &[]), vec![f.root]);
}

// =========================================================================
// Aggregation and invariants
// =========================================================================

/// Leaves holding {10, 20, 5} sum to 35 at the root.
#[test]
fn test_subtree_points_sum() {
  let f = fixture();
  assert_eq!(f.arena.subtree_points(f.root), 35);
  assert_eq!(f.arena.subtree_points(f.r0), 30);
  assert_eq!(f.arena.subtree_points(f.r2), 5);
}

/// Every node's box contains each child's box.
#[test]
fn test_box_containment_recursive() {
  let f = fixture();
  for id in f.arena.all_nodes(f.root) {
    let parent = f.arena[id].bounds();
    for c in f.arena.children(id) {
      assert!(
        parent.contains_aabb(&f.arena[c].bounds()),
        "{} escapes {}",
        f.arena[c].name(),
        f.arena[id].name()
      );
    }
  }
}

/// Culled subtrees vanish from every query.
#[test]
fn test_culled_subtree_skipped() {
  let mut f = fixture();
  f.arena[f.r0].mark_for_deletion();
  assert_eq!(f.arena.all_nodes(f.root), vec![f.root, f.r2, f.r5]);
  assert_eq!(f.arena.leaves(f.root), vec![f.r2, f.r5]);
  assert_eq!(f.arena.subtree_points(f.root), 5);
}
