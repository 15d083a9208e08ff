//! pointcloud_volume - Octree spatial index and background streaming for
//! disk-resident point cloud tile sets
//!
//! This crate loads Potree-style tile sets into per-tile octrees, merges
//! every loaded dataset into one coordinate frame, and streams node payloads
//! on a background thread. Rendering and UI stay with the host; the crate
//! only hands out boxes, uids and payloads.
//!
//! # Overview
//!
//! - **Volume**: the coordinator. Classifies a directory, builds point
//!   clouds, aggregates global attributes and dispatches background loads
//! - **PointCloud / Tile**: one dataset and its independently rooted octrees
//! - **OctreeArena**: index-addressed node storage with iterative traversals
//! - **BackgroundLoader**: single worker thread with generation-tagged,
//!   cancellable batches
//!
//! # Example
//!
//! ```ignore
//! use pointcloud_volume::{Volume, VolumeConfig};
//!
//! let mut volume = Volume::new(VolumeConfig::default())?;
//! let summary = volume.load_dir("datasets/site".as_ref());
//! println!("{summary}");
//!
//! for node in volume.resident_nodes() {
//!     println!("{} {:?}", node.uid, node.bounds);
//! }
//! ```

pub mod config;
pub mod discover;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod tile;

pub use config::{LoaderConfig, VolumeConfig};
pub use error::{Result, VolumeError};
pub use tile::{Tile, TimeStep};

// Octree storage and traversal
pub mod octree;
pub use octree::{CoordinateFrame, DAabb3, Liveness, NodeId, OctreeArena, OctreeNode};

// Tile formats and manifests
pub mod manifest;
pub use manifest::{PointType, PotreeReader, TileDescriptor, TileReader, TopManifest};

// Background payload streaming
pub mod loader;
pub use loader::{BackgroundLoader, CancellationToken, LoadBatch, LoadGeneration, LoaderEvent};
pub use payload::{LoadState, PayloadCell, PayloadRequest, PayloadSource, PointPayload};

pub mod point_cloud;
pub use point_cloud::{BehaviorFlags, CloudTransform, PointCloud};

// Coordinator
pub mod volume;
pub use volume::{
  HeadlessObserver, MeshSet, ResidentNode, TileRef, Volume, VolumeObserver, VolumeState, VolumeSummary,
};

// Fixtures and mock sources for tests and benches
pub mod test_utils;
