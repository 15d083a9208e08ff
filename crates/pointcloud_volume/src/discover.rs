//! Directory classification for `load_dir`.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::manifest::TileReader;

/// What a directory handed to `load_dir` turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirLayout {
  /// Holds a top manifest; each subdirectory is one dataset.
  Top { manifest: PathBuf, datasets: Vec<PathBuf> },
  /// Holds a tile manifest itself.
  SingleTile,
  /// Several subdirectories and no manifest of either kind.
  Ambiguous { datasets: Vec<PathBuf> },
  /// Anything else: loaded as one multi-directory point cloud.
  Plain,
}

/// Immediate subdirectories sorted by name.
///
/// Symlinks are not followed and never listed. Unreadable entries are
/// skipped with a warning.
pub fn subdirectories(path: &Path, skip: Option<&str>) -> Vec<PathBuf> {
  WalkDir::new(path)
    .min_depth(1)
    .max_depth(1)
    .follow_links(false)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry),
      Err(err) => {
        warn!(error = %err, "skipping unreadable directory entry");
        None
      }
    })
    .filter(|entry| entry.file_type().is_dir())
    .filter(|entry| skip.map_or(true, |name| entry.file_name() != name))
    .map(|entry| entry.into_path())
    .collect()
}

/// Classify `path`.
pub fn classify(
  path: &Path,
  reader: &dyn TileReader,
  top_manifest: &str,
  static_data_dir: &str,
) -> DirLayout {
  let datasets = subdirectories(path, Some(static_data_dir));
  let manifest = path.join(top_manifest);
  if manifest.is_file() {
    return DirLayout::Top { manifest, datasets };
  }
  if reader.is_tile_dir(path) {
    return DirLayout::SingleTile;
  }
  if datasets.len() > 1 {
    return DirLayout::Ambiguous { datasets };
  }
  DirLayout::Plain
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::PotreeReader;

  #[test]
  fn subdirectories_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b", "a", "StaticData", "c"] {
      std::fs::create_dir(dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("file.txt"), "x").unwrap();

    let names: Vec<String> = subdirectories(dir.path(), Some("StaticData"))
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
  }

  #[cfg(unix)]
  #[test]
  fn subdirectories_skip_symlinks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("real")).unwrap();
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
    assert_eq!(subdirectories(dir.path(), None), vec![dir.path().join("real")]);
  }

  #[test]
  fn classify_layouts() {
    let reader = PotreeReader::default();
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(classify(dir.path(), &reader, "top.json", "StaticData"), DirLayout::Plain);

    std::fs::create_dir(dir.path().join("x")).unwrap();
    std::fs::create_dir(dir.path().join("y")).unwrap();
    assert!(matches!(
      classify(dir.path(), &reader, "top.json", "StaticData"),
      DirLayout::Ambiguous { ref datasets } if datasets.len() == 2
    ));

    std::fs::write(dir.path().join("cloud.js"), "{}").unwrap();
    assert_eq!(classify(dir.path(), &reader, "top.json", "StaticData"), DirLayout::SingleTile);

    std::fs::write(dir.path().join("top.json"), "").unwrap();
    assert!(matches!(
      classify(dir.path(), &reader, "top.json", "StaticData"),
      DirLayout::Top { .. }
    ));
  }
}
