//! Human-readable report of one aggregation pass.

use std::fmt;

use glam::DVec3;

/// Totals handed to the observer after `post_load`.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSummary {
  /// Total points, with the pending-data sentinel applied.
  pub points: u64,
  pub min: DVec3,
  pub max: DVec3,
  pub max_time_step: u32,
  pub point_clouds: usize,
  pub tiles: usize,
  /// Nodes carrying a uid.
  pub octree_nodes: u32,
  pub meshes: usize,
}

impl fmt::Display for VolumeSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Points : {}", self.points)?;
    writeln!(f, "Min : {} {} {}", self.min.x, self.min.y, self.min.z)?;
    writeln!(f, "Max : {} {} {}", self.max.x, self.max.y, self.max.z)?;
    if self.max_time_step > 0 {
      writeln!(f, "MAX TIME STEP : {}", self.max_time_step)?;
    }
    writeln!(f, "Point clouds : {}", self.point_clouds)?;
    writeln!(f, "Tile node count : {}", self.tiles)?;
    writeln!(f, "Octree node count : {}", self.octree_nodes)?;
    write!(f, "Meshes : {}", self.meshes)
  }
}
