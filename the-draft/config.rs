//! Knobs for the policy choices [`Modifier`](crate::Modifier) makes.
//!
//! ```toml
//! validate = "always"
//!
//! [split]
//! keep-depth = true
//!
//! [segmentation]
//! default = "word"
//! ```

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::segment::Segmentation;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("failed to parse modifier config: {0}")]
  Parse(#[from] toml::de::Error),
}

/// What the block created by a split inherits from the block it came from.
/// Type is always inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SplitConfig {
  pub keep_depth: bool,
  pub keep_data:  bool,
}

impl Default for SplitConfig {
  fn default() -> Self {
    Self {
      keep_depth: false,
      keep_data:  true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FragmentConfig {
  /// Merge a single-block fragment's data into the block it lands in.
  pub merge_block_data: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SegmentationConfig {
  /// Segmenter for segmented entities whose type has none registered.
  pub default: Segmentation,
}

/// When the modifier re-runs [`ContentState::validate`] on the snapshots it
/// produces. The edit primitives keep the blocks they build contiguous in
/// every build, so this only adds the whole-document check.
///
/// [`ContentState::validate`]: crate::content::ContentState::validate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Validation {
  Never,
  /// Only in builds with `debug_assertions`.
  #[default]
  Debug,
  Always,
}

impl Validation {
  pub fn enabled(self) -> bool {
    match self {
      Validation::Never => false,
      Validation::Debug => cfg!(debug_assertions),
      Validation::Always => true,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ModifierConfig {
  pub split:        SplitConfig,
  pub fragment:     FragmentConfig,
  pub segmentation: SegmentationConfig,
  pub validate:     Validation,
}

impl ModifierConfig {
  pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(source)?)
  }
}
