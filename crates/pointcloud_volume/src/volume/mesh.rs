//! Mesh sets loaded next to the point clouds.
//!
//! Mesh parsing belongs to the host; the volume only needs a box, a point
//! count and a payload location.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::octree::{CoordinateFrame, DAabb3};
use crate::payload::{LoadState, PayloadCell, PointPayload};
use crate::tile::TimeStep;

/// Independently loaded mesh ("triset").
#[derive(Debug)]
pub struct MeshSet {
  name: String,
  path: PathBuf,
  bounds: DAabb3,
  num_points: u64,
  time_step: TimeStep,
  frame: CoordinateFrame,
  payload: Arc<PayloadCell>,
}

impl MeshSet {
  pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, bounds: DAabb3, num_points: u64) -> Self {
    Self {
      name: name.into(),
      path: path.into(),
      bounds,
      num_points,
      time_step: TimeStep::STATIC,
      frame: CoordinateFrame::Identity,
      payload: Arc::new(PayloadCell::new()),
    }
  }

  pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
    self.time_step = time_step;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Box as declared, before the shared frame.
  pub fn local_bounds(&self) -> DAabb3 {
    self.bounds
  }

  /// Box in the shared coordinate frame.
  pub fn bounds(&self) -> DAabb3 {
    self.frame.apply(&self.bounds)
  }

  pub fn num_points(&self) -> u64 {
    self.num_points
  }

  pub fn time_step(&self) -> TimeStep {
    self.time_step
  }

  pub(crate) fn set_frame(&mut self, frame: CoordinateFrame) {
    self.frame = frame;
  }

  pub fn load_state(&self) -> LoadState {
    self.payload.state()
  }

  pub fn payload(&self) -> Option<Arc<PointPayload>> {
    self.payload.payload()
  }

  pub(crate) fn payload_cell(&self) -> &Arc<PayloadCell> {
    &self.payload
  }
}
