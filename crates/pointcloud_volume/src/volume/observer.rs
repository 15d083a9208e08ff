//! Hooks for the interactive host.

use std::path::Path;

use super::VolumeSummary;

/// UI-side collaborator of a [`super::Volume`].
///
/// Both hooks are optional; the defaults do nothing, which is the headless
/// behavior.
pub trait VolumeObserver: Send {
  /// A directory has several subdirectories and no manifest. Return `true`
  /// to persist an empty top manifest there for future loads.
  fn confirm_top_manifest(&mut self, _dir: &Path) -> bool {
    false
  }

  /// Called after every aggregation pass that reports.
  fn show_summary(&mut self, _summary: &VolumeSummary) {}
}

/// Observer that never persists anything and discards summaries.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessObserver;

impl VolumeObserver for HeadlessObserver {}
