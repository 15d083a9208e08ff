//! Point cloud volume inspector.
//!
//! Loads a dataset directory (or a list of tile directories) the way an
//! interactive viewer would, then prints the aggregate summary. Optional
//! steps mirror the viewer's: overlay a tile, cull by priority, stream
//! every payload.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use pointcloud_volume::{LoaderEvent, Volume, VolumeObserver, VolumeSummary};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;

/// Headless loader and summary tool for point cloud tile sets.
#[derive(Parser, Debug)]
#[command(name = "volume_inspect")]
#[command(about = "Loads point cloud tile sets and prints their summary")]
struct Args {
	/// Dataset directory, or tile directories with `--tiles`.
	#[arg(required = true)]
	paths: Vec<PathBuf>,

	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Treat every path as one tile of a single point cloud.
	#[arg(long)]
	tiles: bool,

	/// Tile directory to overlay after loading.
	#[arg(long)]
	on_top: Option<PathBuf>,

	/// Cull low-priority nodes covered by high-priority tiles.
	#[arg(long)]
	prune: bool,

	/// Stream every payload and wait for the loader.
	#[arg(long)]
	wait: bool,

	/// Persist an empty top manifest when a directory is ambiguous.
	#[arg(long)]
	write_top: bool,
}

/// Prints summaries to stdout and answers the manifest question from the
/// command line.
struct PrintObserver {
	write_top: bool,
}

impl VolumeObserver for PrintObserver {
	fn confirm_top_manifest(&mut self, dir: &Path) -> bool {
		if self.write_top {
			info!(dir = %dir.display(), "writing empty top manifest");
		}
		self.write_top
	}

	fn show_summary(&mut self, summary: &VolumeSummary) {
		println!("{summary}\n");
	}
}

fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let args = Args::parse();
	let config = match &args.config {
		Some(path) => Config::load(path)?,
		None => Config::default(),
	};

	let reader = Arc::new(pointcloud_volume::PotreeReader::new(config.volume.tile_manifest.clone()));
	let mut volume = Volume::with_collaborators(
		config.volume.clone(),
		reader.clone(),
		reader,
		Box::new(PrintObserver {
			write_top: args.write_top,
		}),
	)
	.context("Failed to start the background loader")?;

	if args.tiles {
		volume.load_tiles(&args.paths);
	} else {
		for path in &args.paths {
			if !path.is_dir() {
				anyhow::bail!("Not a directory: {}", path.display());
			}
		}
		// each directory replaces the previous load; the last one stays
		for path in &args.paths {
			volume.load_dir(path);
		}
	}

	if let Some(dir) = &args.on_top {
		if !volume.load_on_top(dir) {
			warn!(dir = %dir.display(), "not a tile directory, overlay skipped");
		}
	}

	if args.prune {
		let culled = volume.prune_octree_nodes_based_on_priority();
		let reclaimed = volume.compact_culled();
		println!("Culled subtrees : {culled}");
		println!("Reclaimed nodes : {reclaimed}\n");
		volume.post_load(true);
	}

	if args.wait {
		if !volume.is_loading() {
			volume.load_all();
		}
		let events = volume.wait_for_loader(Duration::from_secs(config.wait_secs));
		report_loader(&volume, &events);
	}

	Ok(())
}

fn report_loader(volume: &Volume, events: &[LoaderEvent]) {
	let failed = events
		.iter()
		.filter(|e| matches!(e, LoaderEvent::NodeFailed { .. }))
		.count();
	let finished = events.iter().any(LoaderEvent::is_terminal);
	let resident = volume.resident_nodes();
	let bytes: usize = resident.iter().map(|n| n.payload.byte_len()).sum();

	println!("Resident nodes : {}", resident.len());
	println!("Resident bytes : {bytes}");
	println!("Failed loads : {failed}");
	if !finished {
		warn!("background loading did not finish in time");
	}

	let metrics = volume.loader_metrics();
	if pointcloud_volume::metrics::is_enabled() {
		println!("Avg load : {:.1} us", metrics.avg_load_timing_us());
		println!("Loaded : {:.2} MB", metrics.loaded_mb());
	}
}
