//! Volume - the coordinator over every loaded point cloud and mesh set.
//!
//! A `Volume` owns the clouds, the flattened tile list, the global
//! attributes derived from them, and the background loader that fills node
//! payloads. All mutation happens on the caller's thread; the loader only
//! ever writes into payload cells.
//!
//! # Load lifecycle
//!
//! ```text
//! load_dir ─┬─ cancel loader, reset state, next generation
//!           ├─ classify directory (top / tile / ambiguous / plain)
//!           ├─ build PointClouds
//!           ├─ post_load (aggregate + summary)
//!           └─ loadall? submit LoadBatch
//! ```

mod aggregate;
mod mesh;
mod observer;
mod priority;
mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use tracing::{info, info_span, warn};

pub use mesh::MeshSet;
pub use observer::{HeadlessObserver, VolumeObserver};
pub use summary::VolumeSummary;

use crate::config::VolumeConfig;
use crate::discover::{classify, DirLayout};
use crate::error::Result;
use crate::loader::{BackgroundLoader, LoadBatch, LoadGeneration, LoadItem, LoaderEvent};
use crate::manifest::{PotreeReader, TileReader, TopManifest};
use crate::metrics::LoaderMetrics;
use crate::octree::DAabb3;
use crate::payload::{MeshRequest, NodeRequest, PayloadRequest, PayloadSource, PointPayload};
use crate::point_cloud::{BehaviorFlags, PointCloud};
use crate::tile::{Tile, TimeStep};

/// Position of one tile in the flattened tile list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRef {
  /// Index into the point cloud list.
  pub cloud: usize,
  /// Index into that cloud's tiles.
  pub tile: usize,
}

/// A node whose payload is in memory.
#[derive(Clone, Debug)]
pub struct ResidentNode {
  pub uid: u32,
  pub tile_id: u32,
  pub bounds: DAabb3,
  pub payload: Arc<PointPayload>,
}

/// Everything one load produced. Replaced wholesale by the next load.
#[derive(Debug, Default)]
pub struct VolumeState {
  pub(crate) point_clouds: Vec<PointCloud>,
  pub(crate) mesh_sets: Vec<MeshSet>,
  pub(crate) tiles: Vec<TileRef>,
  pub(crate) manifest: TopManifest,
  pub(crate) coord_min: DVec3,
  pub(crate) coord_max: DVec3,
  /// Offset removed by zero-shifting (zero when not shifted).
  pub(crate) shift: DVec3,
  pub(crate) npoints: u64,
  pub(crate) xform_tile_id: usize,
  pub(crate) xform_node_id: u32,
  pub(crate) node_count: u32,
}

impl VolumeState {
  /// Drop every cloud, mesh and derived attribute of the previous load.
  pub(crate) fn reset(&mut self) {
    *self = Self::default();
  }
}

/// Coordinator for disk-resident point cloud tile sets.
pub struct Volume {
  config: VolumeConfig,
  state: VolumeState,
  generation: LoadGeneration,
  reader: Arc<dyn TileReader>,
  observer: Box<dyn VolumeObserver>,
  loader: BackgroundLoader,
}

impl Volume {
  /// Volume reading Potree tiles from disk, with a headless observer.
  pub fn new(config: VolumeConfig) -> Result<Self> {
    let reader = Arc::new(PotreeReader::new(config.tile_manifest.clone()));
    let payloads: Arc<dyn PayloadSource> = reader.clone();
    Self::with_collaborators(config, reader, payloads, Box::new(HeadlessObserver))
  }

  /// Volume with every collaborator supplied by the host.
  pub fn with_collaborators(
    config: VolumeConfig,
    reader: Arc<dyn TileReader>,
    payloads: Arc<dyn PayloadSource>,
    observer: Box<dyn VolumeObserver>,
  ) -> Result<Self> {
    let loader = BackgroundLoader::spawn(&config.loader, payloads)?;
    Ok(Self {
      config,
      state: VolumeState::default(),
      generation: LoadGeneration::new(),
      reader,
      observer,
      loader,
    })
  }

  pub fn set_observer(&mut self, observer: Box<dyn VolumeObserver>) {
    self.observer = observer;
  }

  // ===========================================================================
  // Loading
  // ===========================================================================

  /// Load a directory, replacing whatever was loaded before.
  ///
  /// Never fails: unreadable parts are skipped with a warning and an empty
  /// directory yields an empty volume.
  pub fn load_dir(&mut self, path: &Path) -> VolumeSummary {
    let _span = info_span!("load_dir", path = %path.display()).entered();
    self.begin_load();

    let layout = classify(
      path,
      self.reader.as_ref(),
      &self.config.top_manifest,
      &self.config.static_data_dir,
    );
    match layout {
      DirLayout::Top { manifest, datasets } => {
        self.state.manifest = TopManifest::load(&manifest);
        self.load_datasets(&datasets);
      }
      DirLayout::SingleTile => {
        let mut cloud = PointCloud::named_after(path);
        if let Err(err) = cloud.load_multiple_tiles(self.reader.as_ref(), &[path.to_path_buf()], false) {
          warn!(error = %err, "tile directory could not be read");
        }
        self.state.point_clouds.push(cloud);
      }
      DirLayout::Ambiguous { datasets } => {
        if self.observer.confirm_top_manifest(path) {
          let manifest = path.join(&self.config.top_manifest);
          if let Err(err) = std::fs::write(&manifest, "") {
            warn!(path = %manifest.display(), error = %err, "could not write top manifest");
          }
        }
        self.load_datasets(&datasets);
      }
      DirLayout::Plain => {
        let mut cloud = PointCloud::named_after(path);
        if let Err(err) = cloud.load_potree_multi_dir(self.reader.as_ref(), path, TimeStep::STATIC, false) {
          warn!(error = %err, "nothing loadable");
        }
        self.state.point_clouds.push(cloud);
      }
    }

    let summary = self.post_load(self.config.report_summary);
    if self.state.manifest.loadall {
      self.load_all();
    }
    summary
  }

  /// Load several tile directories as one point cloud.
  pub fn load_tiles(&mut self, dirs: &[PathBuf]) -> VolumeSummary {
    let _span = info_span!("load_tiles", tiles = dirs.len()).entered();
    self.begin_load();

    let mut cloud = match dirs.first() {
      Some(first) => PointCloud::named_after(first),
      None => PointCloud::new("tiles"),
    };
    if let Err(err) = cloud.load_multiple_tiles(self.reader.as_ref(), dirs, false) {
      warn!(error = %err, "no tile could be read");
    }
    self.state.point_clouds.push(cloud);
    self.post_load(self.config.report_summary)
  }

  /// Overlay one extra tile directory on the current volume.
  ///
  /// Only one overlay is kept: with two clouds present the previous overlay
  /// is replaced. Returns `false` (and changes nothing) when `dir` holds no
  /// tile manifest.
  pub fn load_on_top(&mut self, dir: &Path) -> bool {
    if !self.reader.is_tile_dir(dir) {
      return false;
    }
    let mut cloud = PointCloud::named_after(dir);
    cloud.set_flags(BehaviorFlags::from(&self.state.manifest));
    if let Err(err) = cloud.load_multiple_tiles(self.reader.as_ref(), &[dir.to_path_buf()], false) {
      warn!(error = %err, "overlay tile could not be read");
      return false;
    }
    if self.state.point_clouds.len() == 2 {
      self.state.point_clouds.pop();
    }
    self.state.point_clouds.push(cloud);
    self.post_load(self.config.report_summary);
    true
  }

  /// Register a mesh set. Takes effect at the next [`post_load`](Self::post_load).
  pub fn add_mesh_set(&mut self, mesh: MeshSet) {
    self.state.mesh_sets.push(mesh);
  }

  /// One point cloud per dataset directory, flags from the current manifest.
  fn load_datasets(&mut self, datasets: &[PathBuf]) {
    let manifest = &self.state.manifest;
    let flags = BehaviorFlags::from(manifest);
    let (timeseries, ignore_scaling) = (manifest.timeseries, manifest.ignore_scaling);

    for (index, dir) in datasets.iter().enumerate() {
      let time_step = if timeseries {
        TimeStep(index as i32)
      } else {
        TimeStep::STATIC
      };
      let mut cloud = PointCloud::named_after(dir);
      cloud.set_flags(flags.clone());
      if let Err(err) = cloud.load_potree_multi_dir(self.reader.as_ref(), dir, time_step, ignore_scaling) {
        warn!(dataset = %dir.display(), error = %err, "dataset left empty");
      }
      self.state.point_clouds.push(cloud);
    }
  }

  fn begin_load(&mut self) {
    self.loader.cancel();
    // drain stale events so they are not reported against the new load
    let _ = self.loader.poll_events();
    self.state.reset();
    self.generation.increment();
  }

  // ===========================================================================
  // Aggregation
  // ===========================================================================

  /// Recompute global attributes and optionally report them.
  #[cfg_attr(feature = "instrument", tracing::instrument(skip_all, name = "volume::post_load"))]
  pub fn post_load(&mut self, report: bool) -> VolumeSummary {
    self.state.aggregate(self.config.zero_shift);
    let summary = self.summary();
    info!(
      points = summary.points,
      clouds = summary.point_clouds,
      tiles = summary.tiles,
      nodes = summary.octree_nodes,
      "volume ready"
    );
    if report {
      self.observer.show_summary(&summary);
    }
    summary
  }

  /// Mark nodes of priority-0 tiles covered by higher-priority tiles.
  ///
  /// Returns the number of newly culled subtrees.
  pub fn prune_octree_nodes_based_on_priority(&mut self) -> usize {
    self.state.prune_by_priority()
  }

  /// Detach culled subtrees and release their payloads.
  pub fn compact_culled(&mut self) -> usize {
    self
      .state
      .point_clouds
      .iter_mut()
      .map(|cloud| cloud.arena_mut().compact_culled())
      .sum()
  }

  // ===========================================================================
  // Background loading
  // ===========================================================================

  /// Hand every live node and mesh set to the background loader.
  pub fn load_all(&mut self) {
    let mut items = Vec::new();
    for (tile_id, tile_ref) in self.state.tiles.iter().enumerate() {
      let cloud = &self.state.point_clouds[tile_ref.cloud];
      let tile = &cloud.tiles()[tile_ref.tile];
      for id in cloud.arena().all_nodes(tile.root()) {
        let node = &cloud.arena()[id];
        let Some(uid) = node.uid() else {
          continue;
        };
        let request = PayloadRequest::Node(NodeRequest {
          uid,
          tile_id: tile_id as u32,
          level: node.level(),
          priority: tile.priority(),
          data_dir: tile.data_dir().to_path_buf(),
          hierarchy_step: tile.hierarchy_step(),
          name: node.name().to_string(),
          num_points: node.num_points(),
        });
        items.push(LoadItem::new(request, Arc::clone(node.payload_cell())));
      }
    }
    for (index, mesh) in self.state.mesh_sets.iter().enumerate() {
      let request = PayloadRequest::Mesh(MeshRequest {
        index,
        path: mesh.path().to_path_buf(),
        num_points: mesh.num_points(),
      });
      items.push(LoadItem::new(request, Arc::clone(mesh.payload_cell())));
    }

    let batch = LoadBatch::new(self.generation, items);
    if let Err(err) = self.loader.submit(batch) {
      warn!(error = %err, "background loading unavailable");
    }
  }

  /// Loader events for the current load (non-blocking).
  pub fn poll_loader(&mut self) -> Vec<LoaderEvent> {
    let generation = self.generation;
    self
      .loader
      .poll_events()
      .into_iter()
      .filter(|event| event.generation() == generation)
      .collect()
  }

  /// Block until the loader is idle or `timeout` passed.
  pub fn wait_for_loader(&mut self, timeout: Duration) -> Vec<LoaderEvent> {
    let generation = self.generation;
    self
      .loader
      .wait_idle(timeout)
      .into_iter()
      .filter(|event| event.generation() == generation)
      .collect()
  }

  pub fn is_loading(&self) -> bool {
    self.loader.is_busy()
  }

  pub fn loader_metrics(&self) -> LoaderMetrics {
    self.loader.metrics()
  }

  /// Nodes whose payloads are in memory, in uid order.
  pub fn resident_nodes(&self) -> Vec<ResidentNode> {
    let mut out: Vec<ResidentNode> = self
      .state
      .point_clouds
      .iter()
      .flat_map(|cloud| cloud.all_nodes().into_iter().map(move |id| &cloud.arena()[id]))
      .filter_map(|node| {
        Some(ResidentNode {
          uid: node.uid()?,
          tile_id: node.tile_id()?,
          bounds: node.bounds(),
          payload: node.payload()?,
        })
      })
      .collect();
    out.sort_by_key(|n| n.uid);
    out
  }

  // ===========================================================================
  // Queries
  // ===========================================================================

  pub fn summary(&self) -> VolumeSummary {
    VolumeSummary {
      points: self.state.npoints,
      min: self.state.coord_min,
      max: self.state.coord_max,
      max_time_step: self.max_time(),
      point_clouds: self.state.point_clouds.len(),
      tiles: self.state.tiles.len(),
      octree_nodes: self.state.node_count,
      meshes: self.state.mesh_sets.len(),
    }
  }

  /// Highest time step over clouds and mesh sets; 0 when nothing animates.
  pub fn max_time(&self) -> u32 {
    let clouds = self.state.point_clouds.iter().map(PointCloud::time_step);
    let meshes = self.state.mesh_sets.iter().map(MeshSet::time_step);
    clouds.chain(meshes).filter_map(TimeStep::index).max().unwrap_or(0)
  }

  pub fn config(&self) -> &VolumeConfig {
    &self.config
  }

  pub fn set_zero_shift(&mut self, zero_shift: bool) {
    self.config.zero_shift = zero_shift;
  }

  pub fn generation(&self) -> LoadGeneration {
    self.generation
  }

  pub fn manifest(&self) -> &TopManifest {
    &self.state.manifest
  }

  pub fn point_clouds(&self) -> &[PointCloud] {
    &self.state.point_clouds
  }

  pub fn point_cloud_mut(&mut self, index: usize) -> Option<&mut PointCloud> {
    self.state.point_clouds.get_mut(index)
  }

  pub fn mesh_sets(&self) -> &[MeshSet] {
    &self.state.mesh_sets
  }

  /// Flattened tile list across clouds.
  pub fn tiles(&self) -> &[TileRef] {
    &self.state.tiles
  }

  /// Tile by flattened index.
  pub fn tile(&self, tile_id: usize) -> Option<&Tile> {
    let tile_ref = self.state.tiles.get(tile_id)?;
    self.state.point_clouds.get(tile_ref.cloud)?.tiles().get(tile_ref.tile)
  }

  pub fn coord_min(&self) -> DVec3 {
    self.state.coord_min
  }

  pub fn coord_max(&self) -> DVec3 {
    self.state.coord_max
  }

  /// Offset removed from every coordinate by zero-shifting.
  pub fn shift(&self) -> DVec3 {
    self.state.shift
  }

  /// Total points; 1 when nothing is loaded yet.
  pub fn npoints(&self) -> u64 {
    self.state.npoints
  }

  /// Number of tiles in the first point cloud.
  pub fn xform_tile_id(&self) -> usize {
    self.state.xform_tile_id
  }

  /// Number of uids handed to the first point cloud.
  pub fn xform_node_id(&self) -> u32 {
    self.state.xform_node_id
  }

  pub fn node_count(&self) -> u32 {
    self.state.node_count
  }

  pub fn timeseries(&self) -> bool {
    self.state.manifest.timeseries
  }
}

impl std::fmt::Debug for Volume {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Volume")
      .field("generation", &self.generation)
      .field("clouds", &self.state.point_clouds.len())
      .field("tiles", &self.state.tiles.len())
      .field("loader", &self.loader)
      .finish()
  }
}
