//! Axis-aligned bounding box with double precision for georeferenced data.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Survey coordinates routinely sit at 10^5..10^7 metres from the origin, so
/// boxes stay in f64 until the volume has been zero-shifted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl DAabb3 {
	/// Box spanning `[0,0,0]–[0,0,0]`, the "extent unknown" placeholder.
	pub const ZERO: Self = Self {
		min: DVec3::ZERO,
		max: DVec3::ZERO,
	};

	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Smallest box containing every point. `None` for an empty iterator.
	pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
		let mut iter = points.into_iter();
		let first = iter.next()?;
		Some(iter.fold(Self { min: first, max: first }, |acc, p| Self {
			min: acc.min.min(p),
			max: acc.max.max(p),
		}))
	}

	/// Component-wise union.
	#[inline]
	pub fn union(&self, other: &DAabb3) -> DAabb3 {
		Self {
			min: self.min.min(other.min),
			max: self.max.max(other.max),
		}
	}

	/// Overlapping region, or `None` when the boxes are disjoint.
	pub fn intersection(&self, other: &DAabb3) -> Option<DAabb3> {
		if !self.overlaps(other) {
			return None;
		}
		Some(Self {
			min: self.min.max(other.min),
			max: self.max.min(other.max),
		})
	}

	/// Check if this AABB overlaps with another.
	///
	/// Two AABBs overlap if they share any interior or boundary points.
	#[inline]
	pub fn overlaps(&self, other: &DAabb3) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.x >= self.min.x
			&& point.x <= self.max.x
			&& point.y >= self.min.y
			&& point.y <= self.max.y
			&& point.z >= self.min.z
			&& point.z <= self.max.z
	}

	/// Point containment ignoring elevation.
	#[inline]
	pub fn contains_point_xy(&self, point: DVec3) -> bool {
		point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
	}

	/// Check if `other` lies entirely inside this box.
	#[inline]
	pub fn contains_aabb(&self, other: &DAabb3) -> bool {
		self.contains_point(other.min) && self.contains_point(other.max)
	}

	/// The four XY footprint corners, taken at `max.z`.
	pub fn corners_xy(&self) -> [DVec3; 4] {
		std::array::from_fn(|c| {
			DVec3::new(
				if c & 1 != 0 { self.min.x } else { self.max.x },
				if c & 2 != 0 { self.min.y } else { self.max.y },
				self.max.z,
			)
		})
	}

	/// All eight corners.
	pub fn corners(&self) -> [DVec3; 8] {
		std::array::from_fn(|c| {
			DVec3::new(
				if c & 4 != 0 { self.max.x } else { self.min.x },
				if c & 2 != 0 { self.max.y } else { self.min.y },
				if c & 1 != 0 { self.max.z } else { self.min.z },
			)
		})
	}

	/// Box of one octant after halving along every axis.
	///
	/// Octant bits follow the Potree convention: bit 0 → z, bit 1 → y,
	/// bit 2 → x. A set bit selects the upper half.
	pub fn octant(&self, octant: u8) -> DAabb3 {
		let half = self.size() * 0.5;
		let mut min = self.min;
		let mut max = self.max;
		if octant & 0b001 != 0 {
			min.z += half.z;
		} else {
			max.z -= half.z;
		}
		if octant & 0b010 != 0 {
			min.y += half.y;
		} else {
			max.y -= half.y;
		}
		if octant & 0b100 != 0 {
			min.x += half.x;
		} else {
			max.x -= half.x;
		}
		Self { min, max }
	}

	/// True when both corners sit exactly at the origin.
	#[inline]
	pub fn is_degenerate_origin(&self) -> bool {
		self.min.length_squared() == 0.0 && self.max.length_squared() == 0.0
	}

	/// Axis-aligned box of the eight transformed corners.
	pub fn transformed(&self, f: impl Fn(DVec3) -> DVec3) -> DAabb3 {
		let corners = self.corners().map(f);
		// eight corners, never empty
		Self::from_points(corners).unwrap_or(*self)
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_new() {
		let aabb = DAabb3::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(aabb.min, DVec3::new(-1.0, -2.0, -3.0));
		assert_eq!(aabb.max, DVec3::new(1.0, 2.0, 3.0));
	}

	#[test]
	fn test_from_points_empty() {
		assert!(DAabb3::from_points(std::iter::empty()).is_none());
	}

	#[test]
	fn test_union_is_componentwise() {
		let a = DAabb3::new(DVec3::new(0.0, 5.0, 0.0), DVec3::new(1.0, 6.0, 1.0));
		let b = DAabb3::new(DVec3::new(-1.0, 0.0, 2.0), DVec3::new(0.5, 1.0, 3.0));
		let u = a.union(&b);
		assert_eq!(u.min, DVec3::new(-1.0, 0.0, 0.0));
		assert_eq!(u.max, DVec3::new(1.0, 6.0, 3.0));
	}

	#[test]
	fn test_intersection() {
		let a = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = DAabb3::new(DVec3::splat(5.0), DVec3::splat(15.0));
		let i = a.intersection(&b).unwrap();
		assert_eq!(i, DAabb3::new(DVec3::splat(5.0), DVec3::splat(10.0)));

		let c = DAabb3::new(DVec3::splat(11.0), DVec3::splat(20.0));
		assert!(a.intersection(&c).is_none());
	}

	#[test]
	fn test_overlaps_touching() {
		// Touching at boundary should count as overlapping
		let a = DAabb3::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = DAabb3::new(DVec3::splat(10.0), DVec3::splat(20.0));
		assert!(a.overlaps(&b));
		assert!(b.overlaps(&a));
	}

	#[test]
	fn test_contains_point_xy_ignores_z() {
		let aabb = DAabb3::new(DVec3::ZERO, DVec3::new(10.0, 10.0, 1.0));
		assert!(aabb.contains_point_xy(DVec3::new(5.0, 5.0, 500.0)));
		assert!(!aabb.contains_point(DVec3::new(5.0, 5.0, 500.0)));
		assert!(!aabb.contains_point_xy(DVec3::new(11.0, 5.0, 0.0)));
	}

	#[test]
	fn test_octants_tile_parent() {
		let parent = DAabb3::new(DVec3::ZERO, DVec3::splat(8.0));
		let mut union = parent.octant(0);
		for octant in 0..8u8 {
			let child = parent.octant(octant);
			assert!(parent.contains_aabb(&child), "octant {octant} escapes parent");
			assert_eq!(child.size(), DVec3::splat(4.0));
			union = union.union(&child);
		}
		assert_eq!(union, parent);

		// bit 2 = x, bit 1 = y, bit 0 = z
		assert_eq!(parent.octant(0b100).min, DVec3::new(4.0, 0.0, 0.0));
		assert_eq!(parent.octant(0b010).min, DVec3::new(0.0, 4.0, 0.0));
		assert_eq!(parent.octant(0b001).min, DVec3::new(0.0, 0.0, 4.0));
	}

	#[test]
	fn test_corners_xy_cover_footprint() {
		let aabb = DAabb3::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0));
		let corners = aabb.corners_xy();
		assert!(corners.contains(&DVec3::new(1.0, 2.0, 6.0)));
		assert!(corners.contains(&DVec3::new(4.0, 5.0, 6.0)));
		assert!(corners.contains(&DVec3::new(1.0, 5.0, 6.0)));
		assert!(corners.contains(&DVec3::new(4.0, 2.0, 6.0)));
	}

	#[test]
	fn test_degenerate_origin() {
		assert!(DAabb3::ZERO.is_degenerate_origin());
		assert!(!DAabb3::new(DVec3::ZERO, DVec3::X).is_degenerate_origin());
	}

	#[test]
	fn test_transformed_translation() {
		let aabb = DAabb3::new(DVec3::ZERO, DVec3::ONE);
		let moved = aabb.transformed(|p| p + DVec3::new(10.0, 0.0, 0.0));
		assert_eq!(moved.min, DVec3::new(10.0, 0.0, 0.0));
		assert_eq!(moved.max, DVec3::new(11.0, 1.0, 1.0));
	}

	#[test]
	fn test_size_and_center() {
		let aabb = DAabb3::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(aabb.size(), DVec3::new(2.0, 4.0, 6.0));
		assert_eq!(aabb.center(), DVec3::ZERO);
	}
}
