//! TopManifest - per-dataset behavior read from `top.json`.
//!
//! ```json
//! { "top": { "timeseries": true, "point_type": "fixed", "box_size": "0 0 0 10 20 5" } }
//! ```
//!
//! Only keys under the `top` object count. Unknown keys are ignored, and an
//! absent, empty or malformed document yields the defaults.

use std::path::Path;

use glam::DVec3;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::octree::DAabb3;

/// Point sizing mode handed to the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PointType {
  /// Size adapts to node level and distance.
  #[default]
  Adaptive,
  Fixed,
}

/// Parsed `top` object.
#[derive(Clone, Debug, PartialEq)]
pub struct TopManifest {
  /// Subdirectories are successive time steps.
  pub timeseries: bool,
  pub ignore_scaling: bool,
  pub show_map: bool,
  pub gravity: bool,
  pub skybox: bool,
  pub play_button: bool,
  pub color_present: bool,
  pub show_sphere: bool,
  pub point_type: PointType,
  /// Hand every node to the background loader after aggregation.
  pub loadall: bool,
  pub ground_height: f64,
  pub teleport_scale: f64,
  /// Fallback union box when no geometry yields a non-degenerate one.
  pub box_size: Option<DAabb3>,
}

impl Default for TopManifest {
  fn default() -> Self {
    Self {
      timeseries: false,
      ignore_scaling: false,
      show_map: true,
      gravity: false,
      skybox: false,
      play_button: false,
      color_present: true,
      show_sphere: false,
      point_type: PointType::Adaptive,
      loadall: false,
      ground_height: 1.8,
      teleport_scale: 1.0,
      box_size: None,
    }
  }
}

impl TopManifest {
  /// Read `path`, absorbing every failure into defaults.
  pub fn load(path: &Path) -> Self {
    let text = match std::fs::read_to_string(path) {
      Ok(text) => text,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no top manifest, using defaults");
        return Self::default();
      }
      Err(err) => {
        warn!(path = %path.display(), error = %err, "unreadable top manifest, using defaults");
        return Self::default();
      }
    };
    Self::parse(&text).unwrap_or_else(|err| {
      warn!(path = %path.display(), error = %err, "malformed top manifest, using defaults");
      Self::default()
    })
  }

  /// Parse a document. Blank input is not an error.
  pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
    if text.trim().is_empty() {
      return Ok(Self::default());
    }
    let doc: Value = serde_json::from_str(text)?;
    Ok(Self::from_value(&doc))
  }

  /// Apply the keys of `doc["top"]` over the defaults.
  pub fn from_value(doc: &Value) -> Self {
    let mut manifest = Self::default();
    if let Some(top) = doc.get("top").and_then(Value::as_object) {
      manifest.apply(top);
    }
    manifest
  }

  fn apply(&mut self, top: &Map<String, Value>) {
    if let Some(v) = top.get("timeseries") {
      self.timeseries = as_flag(v);
    }
    if let Some(v) = top.get("ignore_scaling") {
      self.ignore_scaling = as_flag(v);
    }
    if let Some(v) = top.get("show_map") {
      self.show_map = as_flag(v);
    }
    if let Some(v) = top.get("gravity").or_else(|| top.get("ground")) {
      self.gravity = as_flag(v);
    }
    if let Some(v) = top.get("skybox") {
      self.skybox = as_flag(v);
    }
    if let Some(v) = top.get("play_button") {
      self.play_button = as_flag(v);
    }
    if let Some(v) = top.get("color") {
      self.color_present = match v {
        Value::Bool(b) => *b,
        other => other.as_f64().is_some_and(|n| n as i64 != 0),
      };
    }
    if top.contains_key("point_as_sphere") {
      self.show_sphere = true;
      self.point_type = PointType::Fixed;
    }
    if top.contains_key("loadall") {
      self.loadall = true;
    }
    if let Some(v) = top.get("ground_height") {
      self.ground_height = as_number(v, "ground_height").unwrap_or(self.ground_height);
    }
    if let Some(v) = top.get("teleport_scale") {
      self.teleport_scale = as_number(v, "teleport_scale").unwrap_or(self.teleport_scale);
    }
    // applied after point_as_sphere, so an explicit point_type wins
    if let Some(v) = top.get("point_type") {
      let first = v.as_str().and_then(|s| s.split_whitespace().next());
      self.point_type = if first == Some("fixed") {
        PointType::Fixed
      } else {
        PointType::Adaptive
      };
    }
    if let Some(v) = top.get("box_size") {
      match parse_box_size(v) {
        Some(b) => self.box_size = Some(b),
        None => warn!(value = %v, "box_size needs six numbers, ignoring"),
      }
    }
  }
}

/// JSON booleans; anything else reads as false.
fn as_flag(v: &Value) -> bool {
  v.as_bool().unwrap_or(false)
}

/// A JSON number, or a string holding one.
fn as_number(v: &Value, key: &str) -> Option<f64> {
  let n = v
    .as_f64()
    .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()));
  if n.is_none() {
    warn!(key, value = %v, "expected a number, keeping default");
  }
  n
}

/// `"minx miny minz maxx maxy maxz"` or an array of six numbers.
fn parse_box_size(v: &Value) -> Option<DAabb3> {
  let values: Vec<f64> = match v {
    Value::String(s) => s
      .split_whitespace()
      .map(str::parse::<f64>)
      .collect::<Result<_, _>>()
      .ok()?,
    Value::Array(items) => items.iter().map(Value::as_f64).collect::<Option<_>>()?,
    _ => return None,
  };
  let [minx, miny, minz, maxx, maxy, maxz] = values.as_slice() else {
    return None;
  };
  // corners may come swapped
  DAabb3::from_points([
    DVec3::new(*minx, *miny, *minz),
    DVec3::new(*maxx, *maxy, *maxz),
  ])
}

#[cfg(test)]
#[path = "top_test.rs"]
mod top_test;
