//! Octree storage for point-cloud tiles.
//!
//! Every point cloud owns one [`OctreeArena`]; each tile is a root inside it.
//! Nodes carry their manifest-declared box in dataset-local coordinates and a
//! [`CoordinateFrame`] that rebases the box into the volume-wide frame on read.
//!
//! # Module Structure
//!
//! - [`bounds`]: `DAabb3` - f64 axis-aligned box
//! - [`frame`]: `CoordinateFrame` - identity or shifted rebase
//! - [`node`]: `OctreeNode`, `NodeId`, `Liveness`
//! - [`arena`]: `OctreeArena` - contiguous node storage and insertion
//! - [`traversal`]: iterative pre-order queries and `levels_below`
//!
//! # Octant Convention
//!
//! Child index bits follow the tile format: bit 0 selects the upper z half,
//! bit 1 the upper y half, bit 2 the upper x half.

pub mod arena;
pub mod bounds;
pub mod frame;
pub mod node;
pub mod traversal;

// Re-exports
pub use arena::OctreeArena;
pub use bounds::DAabb3;
pub use frame::CoordinateFrame;
pub use node::{Liveness, NodeId, OctreeNode};
