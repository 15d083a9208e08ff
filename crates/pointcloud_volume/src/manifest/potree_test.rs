use std::path::Path;

use glam::DVec3;

use super::*;
use crate::payload::NodeRequest;
use crate::test_utils::PotreeFixture;

fn cube(size: f64) -> DAabb3 {
  DAabb3::new(DVec3::ZERO, DVec3::splat(size))
}

fn read(dir: &Path) -> Result<(OctreeArena, TileDescriptor)> {
  let mut arena = OctreeArena::new();
  let descriptor = PotreeReader::default().read_tile(dir, &mut arena, false)?;
  Ok((arena, descriptor))
}

fn names(arena: &OctreeArena, root: NodeId) -> Vec<String> {
  arena
    .all_nodes(root)
    .into_iter()
    .map(|id| arena[id].name().to_string())
    .collect()
}

// =========================================================================
// Paths and records
// =========================================================================

#[test]
fn test_node_dir_groups_full_steps() {
  let data = Path::new("data");
  assert_eq!(node_dir(data, "r", 2), Path::new("data/r"));
  assert_eq!(node_dir(data, "r0", 2), Path::new("data/r"));
  assert_eq!(node_dir(data, "r01", 2), Path::new("data/r/01"));
  assert_eq!(node_dir(data, "r012", 2), Path::new("data/r/01"));
  assert_eq!(node_dir(data, "r0123", 2), Path::new("data/r/01/23"));
}

#[test]
fn test_decode_records() {
  let bytes = [0b1000_0001, 10, 0, 0, 0, 0, 0, 1, 0, 0];
  let records = decode_records(&bytes).unwrap();
  assert_eq!(
    records,
    vec![
      HrcRecord { mask: 0b1000_0001, points: 10 },
      HrcRecord { mask: 0, points: 256 },
    ]
  );
}

#[test]
fn test_decode_rejects_partial_records() {
  assert!(decode_records(&[]).is_err());
  assert!(decode_records(&[1, 2, 3]).is_err());
}

// =========================================================================
// Tiles
// =========================================================================

/// Single chunk: names, counts and boxes come back as written.
#[test]
fn test_read_single_chunk_tile() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(16.0))
    .node("r", 3)
    .node("r01", 10)
    .node("r06", 20)
    .node("r2", 5)
    .write(dir.path())
    .unwrap();

  let (arena, tile) = read(dir.path()).unwrap();
  assert_eq!(names(&arena, tile.root), vec!["r", "r0", "r01", "r06", "r2"]);
  assert_eq!(arena.subtree_points(tile.root), 38);
  assert_eq!(tile.declared_points, 38);
  assert_eq!(tile.declared_bounds, cube(16.0));
  assert_eq!(tile.hierarchy_step, 5);
  assert_eq!(tile.data_dir, dir.path().join("data"));

  let r2 = arena.child(tile.root, 2).unwrap();
  assert_eq!(arena[r2].local_bounds(), cube(16.0).octant(2));
}

/// With step 1 every level lives in its own nested chunk.
#[test]
fn test_read_nested_chunks() {
  let dir = tempfile::tempdir().unwrap();
  let fixture = PotreeFixture::new(cube(8.0))
    .step(1)
    .node("r", 1)
    .node("r0", 2)
    .node("r07", 3)
    .node("r073", 4)
    .node("r5", 5);
  fixture.write(dir.path()).unwrap();

  let (arena, tile) = read(dir.path()).unwrap();
  assert_eq!(arena.all_nodes(tile.root).len(), fixture.node_count());
  assert_eq!(arena.subtree_points(tile.root), 15);
  let deepest = arena.nodes_at_level(tile.root, 3);
  assert_eq!(deepest.len(), 1);
  assert_eq!(arena[deepest[0]].name(), "r073");
}

/// A missing nested chunk truncates that subtree; the rest still loads.
#[test]
fn test_missing_nested_chunk_makes_leaf() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(8.0))
    .step(1)
    .node("r0", 2)
    .node("r01", 3)
    .node("r4", 1)
    .write(dir.path())
    .unwrap();
  std::fs::remove_file(dir.path().join("data/r/0/r0.hrc")).unwrap();

  let (arena, tile) = read(dir.path()).unwrap();
  assert_eq!(names(&arena, tile.root), vec!["r", "r0", "r4"]);
  let r0 = arena.child(tile.root, 0).unwrap();
  assert!(arena[r0].is_leaf());
}

#[test]
fn test_optional_fields() {
  let dir = tempfile::tempdir().unwrap();
  let tight = DAabb3::new(DVec3::splat(1.0), DVec3::splat(3.0));
  PotreeFixture::new(cube(4.0))
    .tight(tight)
    .priority(2)
    .write(dir.path())
    .unwrap();

  let (_, tile) = read(dir.path()).unwrap();
  assert_eq!(tile.tight_bounds, Some(tight));
  assert_eq!(tile.priority, 2);
  assert_eq!(tile.coordinate_scale, 0.001);

  let mut arena = OctreeArena::new();
  let ignored = PotreeReader::default().read_tile(dir.path(), &mut arena, true).unwrap();
  assert_eq!(ignored.coordinate_scale, 1.0);
}

/// A root chunk with a child mask but no child records keeps the root as a
/// leaf instead of asking for the same chunk again.
#[test]
fn test_root_chunk_without_children() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(4.0)).node("r0", 1).write(dir.path()).unwrap();
  std::fs::write(dir.path().join("data/r/r.hrc"), [1u8, 3, 0, 0, 0]).unwrap();

  let (arena, tile) = read(dir.path()).unwrap();
  assert_eq!(names(&arena, tile.root), vec!["r"]);
  assert!(arena[tile.root].is_leaf());
  assert_eq!(arena.subtree_points(tile.root), 3);
}

/// Same for a nested chunk that repeats only its own root.
#[test]
fn test_nested_chunk_without_children() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(8.0))
    .step(1)
    .node("r0", 2)
    .node("r01", 3)
    .write(dir.path())
    .unwrap();
  std::fs::write(dir.path().join("data/r/0/r0.hrc"), [2u8, 2, 0, 0, 0]).unwrap();

  let (arena, tile) = read(dir.path()).unwrap();
  assert_eq!(names(&arena, tile.root), vec!["r", "r0"]);
  let r0 = arena.child(tile.root, 0).unwrap();
  assert!(arena[r0].is_leaf());
}

// =========================================================================
// Failures
// =========================================================================

#[test]
fn test_missing_manifest() {
  let dir = tempfile::tempdir().unwrap();
  let reader = PotreeReader::default();
  assert!(!reader.is_tile_dir(dir.path()));
  assert!(matches!(read(dir.path()), Err(VolumeError::ManifestNotFound { .. })));
}

#[test]
fn test_malformed_manifest() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("cloud.js"), "{ \"points\": ").unwrap();
  assert!(matches!(read(dir.path()), Err(VolumeError::InvalidManifest { .. })));
}

/// A broken root chunk fails the tile without leaving reachable nodes.
#[test]
fn test_truncated_root_chunk() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(4.0)).node("r0", 1).write(dir.path()).unwrap();
  std::fs::write(dir.path().join("data/r/r.hrc"), [1u8, 0, 0]).unwrap();

  let mut arena = OctreeArena::new();
  let result = PotreeReader::default().read_tile(dir.path(), &mut arena, false);
  assert!(matches!(result, Err(VolumeError::InvalidHierarchy { .. })));
  assert!(arena.is_empty());
}

// =========================================================================
// Payloads
// =========================================================================

#[test]
fn test_payload_read_from_bin() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(4.0))
    .step(1)
    .node("r3", 6)
    .write(dir.path())
    .unwrap();

  let request = PayloadRequest::Node(NodeRequest {
    uid: 1,
    tile_id: 0,
    level: 1,
    priority: 0,
    data_dir: dir.path().join("data"),
    hierarchy_step: 1,
    name: "r3".to_string(),
    num_points: 6,
  });
  let payload = PotreeReader::default().load(&request).unwrap();
  assert_eq!(payload.point_count, 6);
  assert_eq!(payload.byte_len(), 6);
}

#[test]
fn test_payload_missing_file() {
  let request = PayloadRequest::Node(NodeRequest {
    uid: 0,
    tile_id: 0,
    level: 0,
    priority: 0,
    data_dir: Path::new("/nonexistent").to_path_buf(),
    hierarchy_step: 5,
    name: "r".to_string(),
    num_points: 0,
  });
  assert!(matches!(
    PotreeReader::default().load(&request),
    Err(VolumeError::Io { .. })
  ));
}

/// A root chunk that ends between siblings leaves no nodes of the failed
/// tile behind, while earlier tiles in the same arena survive.
#[test]
fn test_root_chunk_ending_inside_children_rolls_back() {
  let dir = tempfile::tempdir().unwrap();
  PotreeFixture::new(cube(4.0)).node("r0", 1).write(dir.path()).unwrap();
  // root claims octants 0 and 1, only one child record follows
  std::fs::write(dir.path().join("data/r/r.hrc"), [3u8, 0, 0, 0, 0, 0, 1, 0, 0, 0]).unwrap();

  let mut arena = OctreeArena::new();
  let kept = arena.add_root("r", cube(1.0), 7);
  let result = PotreeReader::default().read_tile(dir.path(), &mut arena, false);
  assert!(matches!(result, Err(VolumeError::InvalidHierarchy { .. })));
  assert_eq!(arena.len(), 1);
  assert_eq!(arena[kept].num_points(), 7);
}
