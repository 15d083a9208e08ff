//! BackgroundLoader - the single worker thread and its foreground handle.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info_span, warn};
use web_time::Instant;

use super::{CancellationToken, LoadBatch, LoadGeneration, LoaderEvent};
use crate::config::LoaderConfig;
use crate::error::{Result, VolumeError};
use crate::metrics::LoaderMetrics;
use crate::payload::PayloadSource;

/// Handle to the payload worker.
///
/// Dropping the handle cancels the active batch, closes the queue and joins
/// the thread.
pub struct BackgroundLoader {
  batches: Option<Sender<LoadBatch>>,
  events: Receiver<LoaderEvent>,
  handle: Option<JoinHandle<()>>,
  /// Token of the most recently submitted batch.
  active: Option<(LoadGeneration, CancellationToken)>,
  /// Batches submitted whose terminal event has not been polled yet.
  in_flight: usize,
  metrics: Arc<Mutex<LoaderMetrics>>,
}

impl BackgroundLoader {
  /// Start the worker thread.
  pub fn spawn(config: &LoaderConfig, source: Arc<dyn PayloadSource>) -> Result<Self> {
    let (batch_tx, batch_rx) = channel::unbounded::<LoadBatch>();
    let (event_tx, event_rx) = channel::unbounded::<LoaderEvent>();
    let metrics = Arc::new(Mutex::new(LoaderMetrics::new()));

    let worker_metrics = Arc::clone(&metrics);
    let handle = std::thread::Builder::new()
      .name(config.thread_name.clone())
      .spawn(move || run_worker(batch_rx, event_tx, source, worker_metrics))
      .map_err(|err| {
        warn!(error = %err, "failed to spawn loader thread");
        VolumeError::LoaderUnavailable
      })?;

    Ok(Self {
      batches: Some(batch_tx),
      events: event_rx,
      handle: Some(handle),
      active: None,
      in_flight: 0,
      metrics,
    })
  }

  /// Queue a batch, superseding whatever was submitted before.
  ///
  /// Returns immediately. Empty batches are not sent.
  pub fn submit(&mut self, batch: LoadBatch) -> Result<()> {
    self.cancel();
    if batch.is_empty() {
      return Ok(());
    }
    let sender = self.batches.as_ref().ok_or(VolumeError::LoaderUnavailable)?;
    let generation = batch.generation;
    let token = batch.token.clone();
    debug!(generation = generation.0, requests = batch.len(), "submitting load batch");
    sender
      .send(batch)
      .map_err(|_| VolumeError::LoaderUnavailable)?;
    self.active = Some((generation, token));
    self.in_flight += 1;
    Ok(())
  }

  /// Cancel the active batch. Best effort; does not wait for the worker.
  pub fn cancel(&mut self) {
    if let Some((generation, token)) = self.active.take() {
      debug!(generation = generation.0, "cancelling load batch");
      token.cancel();
    }
  }

  /// Generation of the batch most recently submitted and not cancelled.
  pub fn active_generation(&self) -> Option<LoadGeneration> {
    self.active.as_ref().map(|(generation, _)| *generation)
  }

  /// True while a submitted batch has not reported its terminal event.
  ///
  /// Updated by [`poll_events`](Self::poll_events) and
  /// [`wait_idle`](Self::wait_idle).
  pub fn is_busy(&self) -> bool {
    self.in_flight > 0
  }

  /// Drain pending events (non-blocking).
  pub fn poll_events(&mut self) -> Vec<LoaderEvent> {
    let events: Vec<LoaderEvent> = self.events.try_iter().collect();
    self.account(&events);
    events
  }

  /// Block until every submitted batch reported back, or `timeout` passed.
  ///
  /// Returns all events received while waiting.
  pub fn wait_idle(&mut self, timeout: Duration) -> Vec<LoaderEvent> {
    let deadline = Instant::now() + timeout;
    let mut out = self.poll_events();
    while self.is_busy() {
      let remaining = deadline.saturating_duration_since(Instant::now());
      match self.events.recv_timeout(remaining) {
        Ok(event) => {
          self.account(std::slice::from_ref(&event));
          out.push(event);
        }
        Err(RecvTimeoutError::Timeout) => break,
        Err(RecvTimeoutError::Disconnected) => {
          self.in_flight = 0;
          break;
        }
      }
    }
    out
  }

  /// Snapshot of the worker's counters.
  pub fn metrics(&self) -> LoaderMetrics {
    self
      .metrics
      .lock()
      .map(|m| m.clone())
      .unwrap_or_default()
  }

  fn account(&mut self, events: &[LoaderEvent]) {
    let finished = events.iter().filter(|e| e.is_terminal()).count();
    self.in_flight = self.in_flight.saturating_sub(finished);
    if let Some((generation, _)) = self.active {
      if events
        .iter()
        .any(|e| e.is_terminal() && e.generation() == generation)
      {
        self.active = None;
      }
    }
  }
}

impl Drop for BackgroundLoader {
  fn drop(&mut self) {
    self.cancel();
    // closing the queue ends the worker loop
    self.batches = None;
    if let Some(handle) = self.handle.take() {
      if handle.join().is_err() {
        warn!("loader thread panicked");
      }
    }
  }
}

impl std::fmt::Debug for BackgroundLoader {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("BackgroundLoader")
      .field("active", &self.active_generation())
      .field("in_flight", &self.in_flight)
      .finish()
  }
}

fn run_worker(
  batches: Receiver<LoadBatch>,
  events: Sender<LoaderEvent>,
  source: Arc<dyn PayloadSource>,
  metrics: Arc<Mutex<LoaderMetrics>>,
) {
  for batch in batches.iter() {
    let event = run_batch(batch, &events, source.as_ref(), &metrics);
    // receiver gone means the handle was dropped
    if events.send(event).is_err() {
      break;
    }
  }
}

#[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "loader::batch"))]
fn run_batch(
  batch: LoadBatch,
  events: &Sender<LoaderEvent>,
  source: &dyn PayloadSource,
  metrics: &Mutex<LoaderMetrics>,
) -> LoaderEvent {
  let LoadBatch {
    generation,
    token,
    items,
  } = batch;
  let _span = info_span!("load_batch", generation = generation.0, requests = items.len()).entered();

  let mut loaded = 0;
  let mut failed = 0;
  for item in items {
    if token.is_cancelled() {
      return cancelled(generation, loaded, metrics);
    }
    // resident from an earlier batch, or claimed elsewhere
    if !item.cell.begin_loading() {
      continue;
    }

    let start = Instant::now();
    match source.load(&item.request) {
      Ok(payload) => {
        let bytes = payload.byte_len();
        if !item.cell.publish(payload, &token) {
          return cancelled(generation, loaded, metrics);
        }
        loaded += 1;
        if let Ok(mut m) = metrics.lock() {
          m.record_load(start.elapsed().as_micros() as u64, bytes as u64);
        }
        let _ = events.send(LoaderEvent::NodeLoaded {
          generation,
          request: item.request,
          bytes,
        });
      }
      Err(err) => {
        item.cell.abandon();
        failed += 1;
        warn!(error = %err, request = ?item.request, "payload load failed");
        if let Ok(mut m) = metrics.lock() {
          m.record_failure();
        }
        let _ = events.send(LoaderEvent::NodeFailed {
          generation,
          request: item.request,
          reason: err.to_string(),
        });
      }
    }
  }

  debug!(generation = generation.0, loaded, failed, "load batch finished");
  LoaderEvent::Finished {
    generation,
    loaded,
    failed,
  }
}

fn cancelled(generation: LoadGeneration, loaded: usize, metrics: &Mutex<LoaderMetrics>) -> LoaderEvent {
  debug!(generation = generation.0, loaded, "load batch cancelled");
  if let Ok(mut m) = metrics.lock() {
    m.record_cancelled_batch();
  }
  LoaderEvent::Cancelled { generation, loaded }
}
