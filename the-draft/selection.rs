//! Selection value object.
//!
//! A [`SelectionState`] names two points, `anchor` and `focus`, each as a
//! block key plus a code point offset into that block. The anchor is where
//! the selection started, the focus is where it ends up, so a selection
//! dragged leftwards has its focus before its anchor and `is_backward` set.
//!
//! ```text
//! anchor=(a,2) focus=(a,7): "he[llo w]orld"   forward
//! anchor=(a,7) focus=(a,2): "he]llo w[orld"   backward
//! anchor=(a,5) focus=(a,5): "hello|world"     collapsed
//! ```
//!
//! `start_*`/`end_*` return the direction-normalized bounds. The backward
//! flag is stored, not derived: comparing two different block keys needs the
//! snapshot's block order, so it is computed when the selection is built
//! against a snapshot (see
//! [`ContentState::selection_between`](crate::content::ContentState::selection_between)).
//!
//! A selection is only meaningful against the snapshot it was built for.

use crate::block::BlockKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
  anchor_key:    BlockKey,
  anchor_offset: usize,
  focus_key:     BlockKey,
  focus_offset:  usize,
  is_backward:   bool,
  has_focus:     bool,
}

impl SelectionState {
  pub fn new(
    anchor_key: BlockKey,
    anchor_offset: usize,
    focus_key: BlockKey,
    focus_offset: usize,
    is_backward: bool,
  ) -> Self {
    Self {
      anchor_key,
      anchor_offset,
      focus_key,
      focus_offset,
      is_backward,
      has_focus: false,
    }
  }

  /// A caret at `offset` in block `key`.
  pub fn collapsed_at(key: BlockKey, offset: usize) -> Self {
    Self::new(key.clone(), offset, key, offset, false)
  }

  /// A forward selection of `start..end` within block `key`.
  pub fn within(key: BlockKey, start: usize, end: usize) -> Self {
    if start <= end {
      Self::new(key.clone(), start, key, end, false)
    } else {
      Self::new(key.clone(), start, key, end, true)
    }
  }

  pub fn anchor_key(&self) -> &BlockKey {
    &self.anchor_key
  }

  pub fn anchor_offset(&self) -> usize {
    self.anchor_offset
  }

  pub fn focus_key(&self) -> &BlockKey {
    &self.focus_key
  }

  pub fn focus_offset(&self) -> usize {
    self.focus_offset
  }

  pub fn is_backward(&self) -> bool {
    self.is_backward
  }

  pub fn has_focus(&self) -> bool {
    self.has_focus
  }

  pub fn is_collapsed(&self) -> bool {
    self.anchor_key == self.focus_key && self.anchor_offset == self.focus_offset
  }

  pub fn start_key(&self) -> &BlockKey {
    if self.is_backward {
      &self.focus_key
    } else {
      &self.anchor_key
    }
  }

  pub fn start_offset(&self) -> usize {
    if self.is_backward {
      self.focus_offset
    } else {
      self.anchor_offset
    }
  }

  pub fn end_key(&self) -> &BlockKey {
    if self.is_backward {
      &self.anchor_key
    } else {
      &self.focus_key
    }
  }

  pub fn end_offset(&self) -> usize {
    if self.is_backward {
      self.anchor_offset
    } else {
      self.focus_offset
    }
  }

  /// Same bounds, anchored at the start.
  #[must_use]
  pub fn forward(&self) -> Self {
    if !self.is_backward {
      return self.clone();
    }
    Self {
      anchor_key:    self.focus_key.clone(),
      anchor_offset: self.focus_offset,
      focus_key:     self.anchor_key.clone(),
      focus_offset:  self.anchor_offset,
      is_backward:   false,
      has_focus:     self.has_focus,
    }
  }

  /// A caret at this selection's start, keeping the focus flag.
  #[must_use]
  pub fn collapse_to_start(&self) -> Self {
    self.with_caret(self.start_key().clone(), self.start_offset())
  }

  /// A caret at `offset` in block `key`, keeping the focus flag.
  #[must_use]
  pub fn with_caret(&self, key: BlockKey, offset: usize) -> Self {
    Self {
      anchor_key: key.clone(),
      anchor_offset: offset,
      focus_key: key,
      focus_offset: offset,
      is_backward: false,
      has_focus: self.has_focus,
    }
  }

  #[must_use]
  pub fn with_has_focus(&self, has_focus: bool) -> Self {
    Self {
      has_focus,
      ..self.clone()
    }
  }
}
