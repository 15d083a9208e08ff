//! CoordinateFrame - shared coordinate space applied to every node.
//!
//! Nodes keep their dataset-local box forever; the frame decides how that box
//! is read back. Rebasing is a pure function of (local box, frame), so setting
//! the same frame twice is the same as setting it once.

use glam::DVec3;

use super::DAabb3;

/// Coordinate frame a node's box is expressed in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum CoordinateFrame {
  /// Baseline `[0,0,0]–[1,1,1]` frame: local coordinates pass through.
  #[default]
  Identity,
  /// Zero-shifted frame: `min` maps to the origin and coordinates are
  /// clamped to `[0, max - min]`.
  Shifted { min: DVec3, max: DVec3 },
}

impl CoordinateFrame {
  pub const IDENTITY_MIN: DVec3 = DVec3::ZERO;
  pub const IDENTITY_MAX: DVec3 = DVec3::ONE;

  /// Frame from a global min/max pair.
  ///
  /// The pair `(0,0,0)–(1,1,1)` is the identity baseline.
  pub fn from_min_max(min: DVec3, max: DVec3) -> Self {
    if min == Self::IDENTITY_MIN && max == Self::IDENTITY_MAX {
      Self::Identity
    } else {
      Self::Shifted { min, max }
    }
  }

  /// Frame extent, `max - min`. Identity reports the unit box.
  pub fn extent(&self) -> DVec3 {
    match self {
      Self::Identity => Self::IDENTITY_MAX - Self::IDENTITY_MIN,
      Self::Shifted { min, max } => (*max - *min).max(DVec3::ZERO),
    }
  }

  /// Offset subtracted from local coordinates.
  pub fn origin(&self) -> DVec3 {
    match self {
      Self::Identity => DVec3::ZERO,
      Self::Shifted { min, .. } => *min,
    }
  }

  /// Express a local point in this frame.
  #[inline]
  pub fn apply_point(&self, p: DVec3) -> DVec3 {
    match self {
      Self::Identity => p,
      Self::Shifted { min, .. } => (p - *min).clamp(DVec3::ZERO, self.extent()),
    }
  }

  /// Express a local box in this frame.
  #[inline]
  pub fn apply(&self, local: &DAabb3) -> DAabb3 {
    DAabb3 {
      min: self.apply_point(local.min),
      max: self.apply_point(local.max),
    }
  }
}
