//! Segmentation of SEGMENTED entities.
//!
//! A segmented entity (say, a mention of "Jane Q Doe") is removed one
//! segment at a time rather than all at once or character by character.
//! How its text divides into segments is pluggable through [`Segmenter`];
//! [`SegmenterRegistry`] picks a segmenter per entity type.
//!
//! # Removal Range
//!
//! A segmenter returns the segments themselves, e.g. `foo` and `bar` for
//! `"foo bar"`. The gaps between segments are attached by removal
//! direction: backward removal attaches a gap to the segment before it,
//! forward removal to the segment after it.
//!
//! ```text
//! text      "foo bar"
//! backward  [foo ][bar]
//! forward   [foo][ bar]
//! ```
//!
//! The removal range is the union of all such tiles the requested range
//! overlaps. When that union touches exactly one edge of the entity, it is
//! widened by one more code point in the removal direction so the separator
//! toward the surviving text goes too.

use std::{
  collections::HashMap,
  fmt,
  ops::Range,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
  Tendril,
  removal::RemovalDirection,
};

pub trait Segmenter: Send + Sync {
  /// Segments of `text` as sorted, non-overlapping code point ranges.
  fn segments(&self, text: &str) -> Vec<Range<usize>>;
}

/// Splits on U+0020. Consecutive spaces produce empty segments, so each
/// space is its own gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceSegmenter;

impl Segmenter for SpaceSegmenter {
  fn segments(&self, text: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut len = 0;
    for (idx, ch) in text.chars().enumerate() {
      if ch == ' ' {
        segments.push(start..idx);
        start = idx + 1;
      }
      len = idx + 1;
    }
    segments.push(start..len);
    segments
  }
}

/// Unicode word boundaries (UAX #29). Whitespace runs are gaps; words and
/// punctuation are segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordSegmenter;

impl Segmenter for WordSegmenter {
  fn segments(&self, text: &str) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    for token in text.split_word_bounds() {
      let len = token.chars().count();
      if !token.chars().all(char::is_whitespace) {
        segments.push(pos..pos + len);
      }
      pos += len;
    }
    segments
  }
}

/// Built-in segmenters selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Segmentation {
  #[default]
  Space,
  Word,
}

impl Segmentation {
  pub fn segmenter(self) -> Arc<dyn Segmenter> {
    match self {
      Segmentation::Space => Arc::new(SpaceSegmenter),
      Segmentation::Word => Arc::new(WordSegmenter),
    }
  }
}

/// Segmenters keyed by entity type, with a fallback.
#[derive(Clone)]
pub struct SegmenterRegistry {
  fallback: Arc<dyn Segmenter>,
  by_type:  HashMap<Tendril, Arc<dyn Segmenter>>,
}

impl SegmenterRegistry {
  pub fn new(fallback: Arc<dyn Segmenter>) -> Self {
    Self {
      fallback,
      by_type: HashMap::new(),
    }
  }

  #[must_use]
  pub fn with(mut self, entity_type: &str, segmenter: Arc<dyn Segmenter>) -> Self {
    self.register(entity_type, segmenter);
    self
  }

  pub fn register(&mut self, entity_type: &str, segmenter: Arc<dyn Segmenter>) {
    self.by_type.insert(Tendril::from(entity_type), segmenter);
  }

  pub fn for_type(&self, entity_type: &str) -> &dyn Segmenter {
    self
      .by_type
      .get(entity_type)
      .unwrap_or(&self.fallback)
      .as_ref()
  }
}

impl Default for SegmenterRegistry {
  fn default() -> Self {
    Self::new(Arc::new(SpaceSegmenter))
  }
}

impl fmt::Debug for SegmenterRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SegmenterRegistry")
      .field("types", &self.by_type.keys().collect::<Vec<_>>())
      .finish_non_exhaustive()
  }
}

/// Widens `requested` to whole segments of the entity occurrence that
/// starts at block offset `entity_start` and has text `text`.
///
/// `requested` is in block offsets. A range that overlaps no segment (for
/// example a collapsed one) is returned unchanged.
pub fn removal_range(
  segmenter: &dyn Segmenter,
  text: &str,
  entity_start: usize,
  requested: Range<usize>,
  direction: RemovalDirection,
) -> Range<usize> {
  let len = text.chars().count();
  let start = requested.start.saturating_sub(entity_start);
  let end = requested.end.saturating_sub(entity_start);
  if start >= end {
    return requested;
  }

  let mut removal: Option<Range<usize>> = None;
  for tile in tiles(&segmenter.segments(text), len, direction) {
    if tile.is_empty() {
      continue;
    }
    if start < tile.end && tile.start < end {
      removal = Some(match removal {
        Some(found) => found.start..tile.end,
        None => tile,
      });
    } else if removal.is_some() {
      break;
    }
  }
  let Some(mut removal) = removal else {
    return requested;
  };

  let at_start = removal.start == 0;
  let at_end = removal.end == len;
  if at_start != at_end {
    match direction {
      RemovalDirection::Forward if removal.end != len => removal.end += 1,
      RemovalDirection::Backward if removal.start != 0 => removal.start -= 1,
      _ => {},
    }
  }
  entity_start + removal.start..entity_start + removal.end
}

/// Segments extended over the gaps next to them, covering `0..len`.
fn tiles(segments: &[Range<usize>], len: usize, direction: RemovalDirection) -> Vec<Range<usize>> {
  let segments: Vec<Range<usize>> = segments
    .iter()
    .map(|seg| seg.start.min(len)..seg.end.min(len))
    .collect();
  if segments.is_empty() {
    return vec![0..len];
  }
  let last = segments.len() - 1;
  segments
    .iter()
    .enumerate()
    .map(|(idx, seg)| match direction {
      RemovalDirection::Backward => {
        let start = if idx == 0 { 0 } else { seg.start };
        let end = if idx == last { len } else { segments[idx + 1].start };
        start..end
      },
      RemovalDirection::Forward => {
        let start = if idx == 0 { 0 } else { segments[idx - 1].end };
        let end = if idx == last { len } else { seg.end };
        start..end
      },
    })
    .collect()
}
