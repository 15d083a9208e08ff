use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::LoaderConfig;
use crate::payload::{LoadState, MeshRequest, NodeRequest, PayloadCell};
use crate::test_utils::{gated_source, FailingSource, StaticSource};

const WAIT: Duration = Duration::from_secs(10);

fn node_request(uid: u32, priority: u8, level: u32) -> PayloadRequest {
  PayloadRequest::Node(NodeRequest {
    uid,
    tile_id: 0,
    level,
    priority,
    data_dir: PathBuf::from("data"),
    hierarchy_step: 5,
    name: format!("r{uid}"),
    num_points: 1,
  })
}

fn item(request: PayloadRequest) -> (LoadItem, Arc<PayloadCell>) {
  let cell = Arc::new(PayloadCell::new());
  (LoadItem::new(request, Arc::clone(&cell)), cell)
}

fn uid_of(request: &PayloadRequest) -> Option<u32> {
  match request {
    PayloadRequest::Node(node) => Some(node.uid),
    PayloadRequest::Mesh(_) => None,
  }
}

// =========================================================================
// Batch ordering
// =========================================================================

/// Priority descending, then level ascending, then uid; meshes last.
#[test]
fn test_batch_orders_requests() {
  let mesh = PayloadRequest::Mesh(MeshRequest {
    index: 0,
    path: PathBuf::from("m.ply"),
    num_points: 0,
  });
  let items = vec![
    item(mesh).0,
    item(node_request(5, 0, 0)).0,
    item(node_request(4, 1, 2)).0,
    item(node_request(3, 1, 1)).0,
    item(node_request(2, 0, 1)).0,
    item(node_request(1, 1, 1)).0,
  ];
  let batch = LoadBatch::new(LoadGeneration(1), items);
  let order: Vec<Option<u32>> = batch.items.iter().map(|i| uid_of(&i.request)).collect();
  assert_eq!(
    order,
    vec![Some(1), Some(3), Some(4), Some(5), Some(2), None]
  );
}

#[test]
fn test_generation_increment() {
  let mut generation = LoadGeneration::new();
  generation.increment();
  generation.increment();
  assert_eq!(generation, LoadGeneration(2));
}

#[test]
fn test_token_clones_share_flag() {
  let token = CancellationToken::new();
  let clone = token.clone();
  assert!(!clone.is_cancelled());
  token.cancel();
  assert!(clone.is_cancelled());
}

// =========================================================================
// Worker
// =========================================================================

/// Every request is published and the batch reports Finished.
#[test]
fn test_submit_loads_every_request() {
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(StaticSource)).unwrap();
  let (a, cell_a) = item(node_request(0, 0, 0));
  let (b, cell_b) = item(node_request(1, 0, 1));

  loader.submit(LoadBatch::new(LoadGeneration(1), vec![a, b])).unwrap();
  assert!(loader.is_busy());
  let events = loader.wait_idle(WAIT);

  assert!(!loader.is_busy());
  assert_eq!(cell_a.state(), LoadState::Resident);
  assert_eq!(cell_b.state(), LoadState::Resident);
  assert_eq!(
    events.last(),
    Some(&LoaderEvent::Finished {
      generation: LoadGeneration(1),
      loaded: 2,
      failed: 0,
    })
  );
}

/// Source failures are reported per node and the batch keeps going.
#[test]
fn test_failures_are_reported_and_absorbed() {
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(FailingSource)).unwrap();
  let (a, cell_a) = item(node_request(0, 0, 0));
  let (b, _) = item(node_request(1, 0, 0));

  loader.submit(LoadBatch::new(LoadGeneration(3), vec![a, b])).unwrap();
  let events = loader.wait_idle(WAIT);

  let failures = events
    .iter()
    .filter(|e| matches!(e, LoaderEvent::NodeFailed { .. }))
    .count();
  assert_eq!(failures, 2);
  assert_eq!(cell_a.state(), LoadState::Unloaded);
  assert!(matches!(
    events.last(),
    Some(LoaderEvent::Finished { failed: 2, loaded: 0, .. })
  ));
}

/// Cells already resident are skipped, not reloaded.
#[test]
fn test_resident_cells_skipped() {
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(StaticSource)).unwrap();
  let (a, cell) = item(node_request(0, 0, 0));
  loader.submit(LoadBatch::new(LoadGeneration(1), vec![a.clone()])).unwrap();
  loader.wait_idle(WAIT);
  assert!(cell.is_resident());

  loader.submit(LoadBatch::new(LoadGeneration(2), vec![a])).unwrap();
  let events = loader.wait_idle(WAIT);
  assert_eq!(
    events,
    vec![LoaderEvent::Finished {
      generation: LoadGeneration(2),
      loaded: 0,
      failed: 0,
    }]
  );
}

/// A second generation submitted while the first is mid-load: nothing from
/// the first generation lands, the second loads completely.
#[test]
fn test_cancelled_generation_never_publishes() {
  let (source, mut gate) = gated_source();
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(source)).unwrap();

  let (a1, cell_a1) = item(node_request(0, 0, 0));
  let (a2, cell_a2) = item(node_request(1, 0, 0));
  loader.submit(LoadBatch::new(LoadGeneration(1), vec![a1, a2])).unwrap();

  // worker is now blocked inside the first request
  let entered = gate.wait_entered(WAIT).expect("worker never started");
  assert_eq!(uid_of(&entered), Some(0));
  assert_eq!(cell_a1.state(), LoadState::Loading);

  loader.cancel();
  let (b1, cell_b1) = item(node_request(10, 0, 0));
  let (b2, cell_b2) = item(node_request(11, 0, 0));
  loader.submit(LoadBatch::new(LoadGeneration(2), vec![b1, b2])).unwrap();
  assert_eq!(loader.active_generation(), Some(LoadGeneration(2)));

  gate.open();
  let events = loader.wait_idle(WAIT);

  assert_eq!(cell_a1.state(), LoadState::Unloaded);
  assert_eq!(cell_a2.state(), LoadState::Unloaded);
  assert!(cell_a1.payload().is_none());
  assert_eq!(cell_b1.state(), LoadState::Resident);
  assert_eq!(cell_b2.state(), LoadState::Resident);

  assert!(!events.iter().any(|e| matches!(
    e,
    LoaderEvent::NodeLoaded { generation: LoadGeneration(1), .. }
  )));
  assert!(events.contains(&LoaderEvent::Cancelled {
    generation: LoadGeneration(1),
    loaded: 0,
  }));
  assert!(matches!(
    events.last(),
    Some(LoaderEvent::Finished { generation: LoadGeneration(2), loaded: 2, .. })
  ));
}

/// Dropping the handle while a request is blocked still joins the worker.
#[test]
fn test_drop_cancels_and_joins() {
  let (source, mut gate) = gated_source();
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(source)).unwrap();
  let (a, cell) = item(node_request(0, 0, 0));
  loader.submit(LoadBatch::new(LoadGeneration(1), vec![a])).unwrap();
  gate.wait_entered(WAIT).expect("worker never started");

  gate.open();
  drop(loader);
  assert_ne!(cell.state(), LoadState::Loading);
}

/// Empty batches are not sent and leave the loader idle.
#[test]
fn test_empty_batch_is_idle() {
  let mut loader = BackgroundLoader::spawn(&LoaderConfig::default(), Arc::new(StaticSource)).unwrap();
  loader.submit(LoadBatch::new(LoadGeneration(1), Vec::new())).unwrap();
  assert!(!loader.is_busy());
  assert!(loader.poll_events().is_empty());
}
