//! Point payloads and the per-node cell the background loader writes into.
//!
//! A node's bounds, id and topology are frozen once aggregation finishes; the
//! [`PayloadCell`] is the only part of a node touched by two threads.
//!
//! ```text
//!               worker                         foreground
//!   Unloaded ──begin_loading──► Loading
//!   Loading  ──publish────────► Resident ──────► payload()  (read only)
//!   Loading  ──abandon────────► Unloaded
//!   Resident ──release────────► Unloaded   (reclaim pass only)
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::loader::CancellationToken;

/// Residency of a node's point payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadState {
  Unloaded = 0,
  Loading = 1,
  Resident = 2,
}

impl LoadState {
  fn from_u8(value: u8) -> Self {
    match value {
      1 => Self::Loading,
      2 => Self::Resident,
      _ => Self::Unloaded,
    }
  }
}

/// Decoded-or-raw point data for one node or mesh set.
///
/// The byte layout belongs to the tile format; the core only carries it to
/// the renderer.
#[derive(Clone, PartialEq, Eq)]
pub struct PointPayload {
  /// Number of points the buffer holds.
  pub point_count: u64,
  /// Raw buffer handed to the renderer.
  pub bytes: Vec<u8>,
}

impl PointPayload {
  pub fn new(point_count: u64, bytes: Vec<u8>) -> Self {
    Self { point_count, bytes }
  }

  pub fn byte_len(&self) -> usize {
    self.bytes.len()
  }
}

impl std::fmt::Debug for PointPayload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PointPayload")
      .field("point_count", &self.point_count)
      .field("bytes", &self.bytes.len())
      .finish()
  }
}

/// Shared residency cell for one node.
#[derive(Debug, Default)]
pub struct PayloadCell {
  state: AtomicU8,
  payload: RwLock<Option<Arc<PointPayload>>>,
}

impl PayloadCell {
  pub fn new() -> Self {
    Self::default()
  }

  /// Current load state (acquire).
  #[inline]
  pub fn state(&self) -> LoadState {
    LoadState::from_u8(self.state.load(Ordering::Acquire))
  }

  #[inline]
  pub fn is_resident(&self) -> bool {
    self.state() == LoadState::Resident
  }

  /// Fully written payload, or `None` unless resident.
  pub fn payload(&self) -> Option<Arc<PointPayload>> {
    if !self.is_resident() {
      return None;
    }
    self.payload.read().ok().and_then(|guard| guard.clone())
  }

  /// Claim the cell for loading. Fails unless currently unloaded.
  pub(crate) fn begin_loading(&self) -> bool {
    self
      .state
      .compare_exchange(
        LoadState::Unloaded as u8,
        LoadState::Loading as u8,
        Ordering::AcqRel,
        Ordering::Acquire,
      )
      .is_ok()
  }

  /// Store a payload and make it visible, unless `token` was cancelled.
  ///
  /// The cancellation check and the store happen under the write lock, so a
  /// cancelled generation can never land a payload after `cancel()` returned
  /// and the cell went back to `Unloaded`.
  pub(crate) fn publish(&self, payload: PointPayload, token: &CancellationToken) -> bool {
    let Ok(mut slot) = self.payload.write() else {
      return false;
    };
    if token.is_cancelled() {
      self.state.store(LoadState::Unloaded as u8, Ordering::Release);
      return false;
    }
    *slot = Some(Arc::new(payload));
    self.state.store(LoadState::Resident as u8, Ordering::Release);
    true
  }

  /// Give up a claimed load.
  pub(crate) fn abandon(&self) {
    let _ = self.state.compare_exchange(
      LoadState::Loading as u8,
      LoadState::Unloaded as u8,
      Ordering::AcqRel,
      Ordering::Acquire,
    );
  }

  /// Drop a resident payload.
  pub(crate) fn release(&self) {
    if let Ok(mut slot) = self.payload.write() {
      self.state.store(LoadState::Unloaded as u8, Ordering::Release);
      *slot = None;
    }
  }
}

/// What the worker needs to fetch one payload.
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadRequest {
  Node(NodeRequest),
  Mesh(MeshRequest),
}

/// Location of one octree node's payload.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRequest {
  /// Global uid assigned during aggregation.
  pub uid: u32,
  /// Flattened tile index.
  pub tile_id: u32,
  /// Octree level of the node (root = 0).
  pub level: u32,
  /// Tile priority (higher loads first).
  pub priority: u8,
  /// Directory holding the tile's octree data.
  pub data_dir: PathBuf,
  /// Levels per hierarchy chunk.
  pub hierarchy_step: u32,
  /// Node name within the tile (`r`, `r0`, `r07`, ...).
  pub name: String,
  /// Points the hierarchy declares for this node.
  pub num_points: u64,
}

/// Location of one mesh set's payload.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRequest {
  /// Index in the volume's mesh list.
  pub index: usize,
  pub path: PathBuf,
  pub num_points: u64,
}

/// Fetches payloads for the background loader.
///
/// Implementations run on the worker thread and must not touch node state.
pub trait PayloadSource: Send + Sync {
  fn load(&self, request: &PayloadRequest) -> Result<PointPayload>;
}

impl<T: PayloadSource + ?Sized> PayloadSource for Arc<T> {
  fn load(&self, request: &PayloadRequest) -> Result<PointPayload> {
    (**self).load(request)
  }
}
