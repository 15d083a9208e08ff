//! The post-load aggregation pass.
//!
//! Runs after every load. Nothing here reads the disk; every step derives
//! from the clouds' local boxes, so running it twice gives the same result.

use glam::DVec3;
use rayon::prelude::*;
use tracing::{debug, info_span};

use super::{TileRef, VolumeState};
use crate::octree::{CoordinateFrame, DAabb3};

impl VolumeState {
  /// Recompute every global attribute from the loaded clouds and meshes.
  pub(crate) fn aggregate(&mut self, zero_shift: bool) {
    {
      let _span = info_span!("levels_below").entered();
      self
        .point_clouds
        .par_iter_mut()
        .filter(|cloud| !cloud.levels_ready())
        .for_each(|cloud| cloud.set_levels_below());
    }

    self.flatten_tiles();
    self.place_nodes();

    let union = {
      let _span = info_span!("union_box").entered();
      self.union_box()
    };
    self.shift = DVec3::ZERO;
    if zero_shift && !union.is_degenerate_origin() {
      for cloud in &mut self.point_clouds {
        cloud.set_global_min_max(union.min, union.max);
      }
      let frame = CoordinateFrame::from_min_max(union.min, union.max);
      for mesh in &mut self.mesh_sets {
        mesh.set_frame(frame);
      }
      self.shift = union.min;
      self.coord_min = DVec3::ZERO;
      self.coord_max = union.max - union.min;
    } else {
      self.coord_min = union.min;
      self.coord_max = union.max;
    }

    self.assign_uids();

    let cloud_points: u64 = self.point_clouds.par_iter().map(|c| c.total_points()).sum();
    let mesh_points: u64 = self.mesh_sets.iter().map(|m| m.num_points()).sum();
    // zero would read as "nothing to show" to the renderer
    self.npoints = (cloud_points + mesh_points).max(1);

    debug!(
      clouds = self.point_clouds.len(),
      tiles = self.tiles.len(),
      nodes = self.node_count,
      points = self.npoints,
      "aggregated volume"
    );
  }

  /// One flat tile list across clouds; every node learns its tile index.
  fn flatten_tiles(&mut self) {
    self.tiles.clear();
    for (cloud_index, cloud) in self.point_clouds.iter().enumerate() {
      for tile_index in 0..cloud.tiles().len() {
        self.tiles.push(TileRef {
          cloud: cloud_index,
          tile: tile_index,
        });
      }
    }
    self.xform_tile_id = self.point_clouds.first().map_or(0, |c| c.tiles().len());

    for (tile_id, tile_ref) in self.tiles.iter().enumerate() {
      let cloud = &mut self.point_clouds[tile_ref.cloud];
      let root = cloud.tiles()[tile_ref.tile].root();
      let ids = cloud.arena().all_nodes(root);
      let arena = cloud.arena_mut();
      for id in ids {
        arena[id].tile_id = Some(tile_id as u32);
      }
    }
  }

  /// Back to local boxes, then the registration transform of each cloud.
  fn place_nodes(&mut self) {
    self.point_clouds.par_iter_mut().for_each(|cloud| {
      cloud.reset_frames();
      cloud.apply_xform();
    });
    for mesh in &mut self.mesh_sets {
      mesh.set_frame(CoordinateFrame::Identity);
    }
  }

  /// Union of mesh boxes and cloud tight boxes, with the manifest fallback.
  fn union_box(&self) -> DAabb3 {
    let meshes = self.mesh_sets.iter().map(|m| m.local_bounds());
    let clouds: Vec<DAabb3> = self
      .point_clouds
      .par_iter()
      .filter_map(|c| c.tight_octree_box())
      .collect();

    match meshes.chain(clouds).reduce(|a, b| a.union(&b)) {
      Some(union) if !union.is_degenerate_origin() => union,
      _ => self.manifest.box_size.unwrap_or(DAabb3::ZERO),
    }
  }

  /// Contiguous uids over live nodes: cloud order, then tile order, then
  /// pre-order.
  fn assign_uids(&mut self) {
    let mut next = 0u32;
    self.xform_node_id = 0;
    for (index, cloud) in self.point_clouds.iter_mut().enumerate() {
      let ids = cloud.all_nodes();
      let arena = cloud.arena_mut();
      for node in arena.iter_mut() {
        node.uid = None;
      }
      for id in ids {
        arena[id].set_uid(next);
        next += 1;
      }
      if index == 0 {
        self.xform_node_id = next;
      }
    }
    self.node_count = next;
  }
}
