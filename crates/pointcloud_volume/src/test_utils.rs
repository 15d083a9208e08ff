//! Test utilities shared by unit tests and benches.
//!
//! Provides an on-disk Potree fixture writer and mock payload sources for
//! exercising the loader without real datasets.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{self as channel, Receiver, Sender};

use crate::error::{Result, VolumeError};
use crate::manifest::potree::node_dir;
use crate::octree::DAabb3;
use crate::payload::{PayloadRequest, PayloadSource, PointPayload};

// =============================================================================
// Potree fixtures
// =============================================================================

/// Builder for a small Potree 1.x tile on disk.
///
/// Nodes are named as in the format (`r`, `r0`, `r06`, ...); missing
/// ancestors are added with zero points.
#[derive(Clone, Debug)]
pub struct PotreeFixture {
  bounds: DAabb3,
  tight: Option<DAabb3>,
  step: u32,
  priority: Option<u8>,
  nodes: BTreeMap<String, u32>,
}

impl PotreeFixture {
  pub fn new(bounds: DAabb3) -> Self {
    Self {
      bounds,
      tight: None,
      step: 5,
      priority: None,
      nodes: BTreeMap::from([("r".to_string(), 0)]),
    }
  }

  /// Add node `name` holding `points`.
  pub fn node(mut self, name: &str, points: u32) -> Self {
    for len in 1..name.len() {
      self.nodes.entry(name[..len].to_string()).or_insert(0);
    }
    self.nodes.insert(name.to_string(), points);
    self
  }

  pub fn tight(mut self, tight: DAabb3) -> Self {
    self.tight = Some(tight);
    self
  }

  /// Levels per hierarchy chunk.
  pub fn step(mut self, step: u32) -> Self {
    self.step = step.max(1);
    self
  }

  pub fn priority(mut self, priority: u8) -> Self {
    self.priority = Some(priority);
    self
  }

  /// Sum of every node's points.
  pub fn total_points(&self) -> u64 {
    self.nodes.values().map(|&p| p as u64).sum()
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }

  /// Write `cloud.js`, every `.hrc` chunk and a `.bin` per node into `dir`.
  pub fn write(&self, dir: &Path) -> std::io::Result<()> {
    let data_dir = dir.join("data");
    std::fs::create_dir_all(&data_dir)?;

    let mut cloud = serde_json::json!({
      "version": "1.7",
      "octreeDir": "data",
      "points": self.total_points(),
      "boundingBox": box_json(&self.bounds),
      "spacing": 1.0,
      "scale": 0.001,
      "hierarchyStepSize": self.step,
    });
    if let Some(tight) = &self.tight {
      cloud["tightBoundingBox"] = box_json(tight);
    }
    if let Some(priority) = self.priority {
      cloud["priority"] = serde_json::json!(priority);
    }
    std::fs::write(dir.join("cloud.js"), cloud.to_string())?;

    for (name, points) in &self.nodes {
      let node_path = node_dir(&data_dir, name, self.step);
      std::fs::create_dir_all(&node_path)?;
      std::fs::write(node_path.join(format!("{name}.bin")), vec![7u8; *points as usize])?;

      let depth = name.len() as u32 - 1;
      if depth % self.step == 0 {
        std::fs::write(node_path.join(format!("{name}.hrc")), self.chunk_bytes(name))?;
      }
    }
    Ok(())
  }

  fn mask(&self, name: &str) -> u8 {
    (0u8..8)
      .filter(|o| self.nodes.contains_key(&format!("{name}{o}")))
      .fold(0, |mask, o| mask | (1 << o))
  }

  /// Breadth-first records from `root` down to `step` levels below it.
  fn chunk_bytes(&self, root: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut queue = VecDeque::from([root.to_string()]);
    while let Some(name) = queue.pop_front() {
      bytes.push(self.mask(&name));
      bytes.extend_from_slice(&self.nodes[&name].to_le_bytes());
      if (name.len() - root.len()) as u32 >= self.step {
        continue;
      }
      for o in 0u8..8 {
        let child = format!("{name}{o}");
        if self.nodes.contains_key(&child) {
          queue.push_back(child);
        }
      }
    }
    bytes
  }
}

fn box_json(b: &DAabb3) -> serde_json::Value {
  serde_json::json!({
    "lx": b.min.x, "ly": b.min.y, "lz": b.min.z,
    "ux": b.max.x, "uy": b.max.y, "uz": b.max.z,
  })
}

/// Write a `top.json` with the given body.
pub fn write_top_json(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
  std::fs::create_dir_all(dir)?;
  let path = dir.join("top.json");
  std::fs::write(&path, body)?;
  Ok(path)
}

// =============================================================================
// Mock payload sources
// =============================================================================

fn point_count(request: &PayloadRequest) -> u64 {
  match request {
    PayloadRequest::Node(node) => node.num_points,
    PayloadRequest::Mesh(mesh) => mesh.num_points,
  }
}

/// Returns a small payload for every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticSource;

impl PayloadSource for StaticSource {
  fn load(&self, request: &PayloadRequest) -> Result<PointPayload> {
    Ok(PointPayload::new(point_count(request), vec![1, 2, 3, 4]))
  }
}

/// Fails every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSource;

impl PayloadSource for FailingSource {
  fn load(&self, _request: &PayloadRequest) -> Result<PointPayload> {
    Err(VolumeError::Unsupported("failing source".to_string()))
  }
}

/// Blocks every request until its [`Gate`] opens.
pub struct GatedSource {
  entered: Sender<PayloadRequest>,
  gate: Receiver<()>,
}

impl PayloadSource for GatedSource {
  fn load(&self, request: &PayloadRequest) -> Result<PointPayload> {
    let _ = self.entered.send(request.clone());
    // nothing is ever sent; recv returns once the gate's sender is dropped
    let _ = self.gate.recv();
    Ok(PointPayload::new(point_count(request), vec![1, 2, 3, 4]))
  }
}

/// Foreground side of a [`GatedSource`].
pub struct Gate {
  entered: Receiver<PayloadRequest>,
  open: Option<Sender<()>>,
}

impl Gate {
  /// Wait until the worker is blocked inside a request.
  pub fn wait_entered(&self, timeout: Duration) -> Option<PayloadRequest> {
    self.entered.recv_timeout(timeout).ok()
  }

  /// Release every current and future request.
  pub fn open(&mut self) {
    self.open = None;
  }
}

pub fn gated_source() -> (GatedSource, Gate) {
  let (entered_tx, entered_rx) = channel::unbounded();
  let (open_tx, open_rx) = channel::bounded(0);
  (
    GatedSource {
      entered: entered_tx,
      gate: open_rx,
    },
    Gate {
      entered: entered_rx,
      open: Some(open_tx),
    },
  )
}
