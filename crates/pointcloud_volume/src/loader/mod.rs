//! Background payload loading.
//!
//! One worker thread owns all payload I/O. The coordinator hands it a
//! [`LoadBatch`] per load generation over a channel; the handoff itself is the
//! generation boundary. Cancellation is cooperative: the worker checks the
//! batch's [`CancellationToken`] between requests and again under each
//! node's payload lock before publishing.
//!
//! ```text
//! Foreground                          Worker thread
//! ┌──────────────┐   LoadBatch    ┌───────────────────┐
//! │ submit()     │ ─────────────► │ for each request  │
//! │ cancel()     │ ── token ────► │   check token     │
//! │              │                │   load payload    │
//! │ poll_events()│ ◄───────────── │   publish (cell)  │
//! └──────────────┘  LoaderEvent   └───────────────────┘
//! ```

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::payload::{PayloadCell, PayloadRequest};

mod worker;

pub use worker::BackgroundLoader;

/// Cooperative cancellation flag shared between the coordinator and the
/// worker. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation. Never blocks.
  pub fn cancel(&self) {
    self.0.store(true, Ordering::Release);
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

/// Counter identifying one `load_dir`/`load_tiles` result.
///
/// Events from the worker carry the generation they belong to, so the
/// coordinator can drop anything reported for a superseded load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadGeneration(pub u64);

impl LoadGeneration {
  pub fn new() -> Self {
    Self(0)
  }

  /// Advance to the next generation (called at the start of every load).
  pub fn increment(&mut self) {
    self.0 += 1;
  }
}

/// One payload to fetch and the cell to publish it into.
#[derive(Clone, Debug)]
pub struct LoadItem {
  pub request: PayloadRequest,
  pub cell: Arc<PayloadCell>,
}

impl LoadItem {
  pub fn new(request: PayloadRequest, cell: Arc<PayloadCell>) -> Self {
    Self { request, cell }
  }

  /// Higher tile priority first, then coarser level, then uid. Meshes last.
  fn order_key(&self) -> (u8, Reverse<u8>, u32, u64) {
    match &self.request {
      PayloadRequest::Node(node) => (0, Reverse(node.priority), node.level, node.uid as u64),
      PayloadRequest::Mesh(mesh) => (1, Reverse(0), 0, mesh.index as u64),
    }
  }
}

/// Work for one load generation.
#[derive(Debug)]
pub struct LoadBatch {
  pub generation: LoadGeneration,
  pub token: CancellationToken,
  pub items: Vec<LoadItem>,
}

impl LoadBatch {
  /// Build a batch with its items in load order.
  pub fn new(generation: LoadGeneration, mut items: Vec<LoadItem>) -> Self {
    items.sort_by_key(LoadItem::order_key);
    Self {
      generation,
      token: CancellationToken::new(),
      items,
    }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// Progress reported by the worker.
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderEvent {
  /// A payload was published and is now resident.
  NodeLoaded {
    generation: LoadGeneration,
    request: PayloadRequest,
    bytes: usize,
  },
  /// The source failed; the cell went back to unloaded.
  NodeFailed {
    generation: LoadGeneration,
    request: PayloadRequest,
    reason: String,
  },
  /// Every request of the batch was attempted.
  Finished {
    generation: LoadGeneration,
    loaded: usize,
    failed: usize,
  },
  /// The batch stopped early on cancellation.
  Cancelled { generation: LoadGeneration, loaded: usize },
}

impl LoaderEvent {
  pub fn generation(&self) -> LoadGeneration {
    match self {
      Self::NodeLoaded { generation, .. }
      | Self::NodeFailed { generation, .. }
      | Self::Finished { generation, .. }
      | Self::Cancelled { generation, .. } => *generation,
    }
  }

  /// True for the last event a batch produces.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Finished { .. } | Self::Cancelled { .. })
  }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;
