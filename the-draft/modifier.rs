//! The transaction API.
//!
//! [`Modifier`] composes the primitives in [`crate::removal`],
//! [`crate::splice`], [`crate::transform`] and [`crate::fragment`] into the
//! edits an editing surface issues: typing, deleting, pasting, splitting,
//! styling. Every method takes a snapshot and a selection and returns a new
//! snapshot; the input is never modified.
//!
//! The returned snapshot's `selection_before` is the selection the edit was
//! issued with, and its `selection_after` is where the caret should go.
//!
//! # Removal
//!
//! Which entity policy governs a removal is decided up front by
//! [`RemovalPlan`]:
//!
//! | requested range                          | plan                              |
//! |------------------------------------------|-----------------------------------|
//! | collapsed                                | nothing to do                     |
//! | one block, both ends in the same entity  | widen by policy, then remove      |
//! | anything else                            | detach cut entities, then remove  |

use std::{
  fmt,
  sync::Arc,
};

use crate::{
  block::{
    BlockData,
    BlockType,
  },
  character::{
    CharacterMetadata,
    InlineStyle,
    StyleSet,
  },
  config::ModifierConfig,
  content::{
    BlockMap,
    ContentState,
    EditError,
    Result,
  },
  entity::EntityKey,
  fragment::get_content_state_fragment,
  keys::{
    KeyGenerator,
    SequentialKeys,
  },
  removal::{
    RemovalDirection,
    get_character_removal_range,
    remove_entities_at_edges,
  },
  segment::{
    Segmenter,
    SegmenterRegistry,
  },
  selection::SelectionState,
  splice::{
    insert_fragment_into_content_state,
    insert_text_into_content_state,
    remove_range_from_content_state,
    split_block_in_content_state,
  },
  transform::{
    apply_entity_to_content_state,
    apply_inline_style,
    modify_block_for_content_state,
    remove_inline_style,
  },
};

/// How a removal treats the entities it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPlan {
  /// The range is collapsed.
  Noop,
  /// The range lies in one block and starts and ends in the same entity.
  WithinEntity(EntityKey),
  /// Everything else.
  AcrossEdges,
}

impl RemovalPlan {
  pub fn for_selection(content: &ContentState, selection: &SelectionState) -> Result<Self> {
    content.validate_selection(selection)?;
    if selection.is_collapsed() {
      return Ok(Self::Noop);
    }
    if selection.start_key() != selection.end_key() {
      return Ok(Self::AcrossEdges);
    }
    let block = content.try_block(selection.start_key())?;
    let start = block.entity_at(selection.start_offset());
    let end = block.entity_at(selection.end_offset() - 1);
    Ok(match (start, end) {
      (Some(a), Some(b)) if a == b => Self::WithinEntity(a),
      _ => Self::AcrossEdges,
    })
  }
}

/// Applies editing transactions to [`ContentState`] snapshots.
///
/// A modifier carries the configuration, the block key generator used for
/// new blocks and the segmenters used for segmented entities. It holds no
/// document state and can be shared freely.
#[derive(Clone)]
pub struct Modifier {
  config:     ModifierConfig,
  keys:       Arc<dyn KeyGenerator>,
  segmenters: SegmenterRegistry,
}

impl Default for Modifier {
  fn default() -> Self {
    Self::new(ModifierConfig::default())
  }
}

impl fmt::Debug for Modifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Modifier")
      .field("config", &self.config)
      .field("segmenters", &self.segmenters)
      .finish_non_exhaustive()
  }
}

impl Modifier {
  pub fn new(config: ModifierConfig) -> Self {
    Self {
      config,
      keys: Arc::new(SequentialKeys::default()),
      segmenters: SegmenterRegistry::new(config.segmentation.default.segmenter()),
    }
  }

  /// Uses `keys` for every block this modifier creates.
  #[must_use]
  pub fn with_keys(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
    self.keys = keys;
    self
  }

  /// Segments segmented entities of type `entity_type` with `segmenter`.
  #[must_use]
  pub fn with_segmenter(mut self, entity_type: &str, segmenter: Arc<dyn Segmenter>) -> Self {
    self.segmenters.register(entity_type, segmenter);
    self
  }

  pub fn config(&self) -> &ModifierConfig {
    &self.config
  }

  /// Stamps the caller's selection and re-validates the whole result when
  /// configured to.
  fn finish(
    &self,
    operation: &'static str,
    selection: &SelectionState,
    content: ContentState,
  ) -> Result<ContentState> {
    let content = content.with_selection_before(selection.clone());
    if self.config.validate.enabled() {
      if let Err(err) = content.validate() {
        tracing::warn!(operation, %err, "edit produced an invalid snapshot");
        return Err(err);
      }
    }
    Ok(content)
  }

  /// Replaces the selected text with `text`, styled with `style` and
  /// pointing at `entity`.
  pub fn replace_text(
    &self,
    content: &ContentState,
    range: &SelectionState,
    text: &str,
    style: &StyleSet,
    entity: Option<EntityKey>,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "replace_text", selection = ?range, len = text.len());
    let detached = remove_entities_at_edges(content, range)?;
    let removed = remove_range_from_content_state(&detached, range)?;
    let character = CharacterMetadata::new(style.clone(), entity);
    let target = removed.selection_after().clone();
    let inserted = insert_text_into_content_state(&removed, &target, text, &character)?;
    self.finish("replace_text", range, inserted)
  }

  /// Inserts `text` at a caret. A non-collapsed selection is an error; use
  /// [`Modifier::replace_text`] to overwrite a range.
  pub fn insert_text(
    &self,
    content: &ContentState,
    target: &SelectionState,
    text: &str,
    style: &StyleSet,
    entity: Option<EntityKey>,
  ) -> Result<ContentState> {
    if !target.is_collapsed() {
      return Err(EditError::SelectionNotCollapsed {
        operation: "insert_text",
      });
    }
    self.replace_text(content, target, text, style, entity)
  }

  /// Moves the text of `removal` to `target`.
  ///
  /// `target` is resolved against the document after `removal` has been
  /// taken out, so it must not point into the removed range.
  pub fn move_text(
    &self,
    content: &ContentState,
    removal: &SelectionState,
    target: &SelectionState,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "move_text", ?removal, ?target);
    let fragment = get_content_state_fragment(content, removal)?;
    let removed = self.remove_range(content, removal, RemovalDirection::Backward)?;
    let moved = self.replace_with_fragment(&removed, target, &fragment)?;
    self.finish("move_text", removal, moved)
  }

  /// Replaces the selected range with the blocks of `fragment`.
  pub fn replace_with_fragment(
    &self,
    content: &ContentState,
    target: &SelectionState,
    fragment: &BlockMap,
  ) -> Result<ContentState> {
    tracing::trace!(
      operation = "replace_with_fragment",
      selection = ?target,
      blocks = fragment.len()
    );
    let detached = remove_entities_at_edges(content, target)?;
    let removed = remove_range_from_content_state(&detached, target)?;
    let caret = removed.selection_after().clone();
    let inserted = insert_fragment_into_content_state(
      &removed,
      &caret,
      fragment,
      self.keys.as_ref(),
      &self.config.fragment,
    )?;
    self.finish("replace_with_fragment", target, inserted)
  }

  /// Removes the selected range, widened as the entities it touches
  /// require. `direction` decides which way segmented entities give way.
  pub fn remove_range(
    &self,
    content: &ContentState,
    range: &SelectionState,
    direction: RemovalDirection,
  ) -> Result<ContentState> {
    let plan = RemovalPlan::for_selection(content, range)?;
    tracing::trace!(operation = "remove_range", selection = ?range, ?direction, ?plan);
    let removed = match plan {
      RemovalPlan::Noop => remove_range_from_content_state(content, range)?,
      RemovalPlan::WithinEntity(_) => {
        let block = content.try_block(range.start_key())?;
        let adjusted = get_character_removal_range(
          content.entity_map(),
          &self.segmenters,
          block,
          block,
          range,
          direction,
        )?;
        remove_range_from_content_state(content, &adjusted)?
      },
      RemovalPlan::AcrossEdges => {
        let detached = remove_entities_at_edges(content, range)?;
        remove_range_from_content_state(&detached, range)?
      },
    };
    self.finish("remove_range", range, removed)
  }

  /// Removes the selected range and splits the block at the resulting
  /// caret.
  pub fn split_block(
    &self,
    content: &ContentState,
    selection: &SelectionState,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "split_block", ?selection);
    let detached = remove_entities_at_edges(content, selection)?;
    let removed = remove_range_from_content_state(&detached, selection)?;
    let caret = removed.selection_after().clone();
    let split =
      split_block_in_content_state(&removed, &caret, self.keys.as_ref(), &self.config.split)?;
    self.finish("split_block", selection, split)
  }

  pub fn apply_inline_style(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    style: &InlineStyle,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "apply_inline_style", ?selection, %style);
    let styled = apply_inline_style(content, selection, style)?;
    self.finish("apply_inline_style", selection, styled)
  }

  pub fn remove_inline_style(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    style: &InlineStyle,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "remove_inline_style", ?selection, %style);
    let unstyled = remove_inline_style(content, selection, style)?;
    self.finish("remove_inline_style", selection, unstyled)
  }

  /// Sets the type of every selected block and resets its depth.
  pub fn set_block_type(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    block_type: &BlockType,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "set_block_type", ?selection, block_type = block_type.as_str());
    let retyped = modify_block_for_content_state(content, selection, |block| {
      block.with_type(block_type.clone()).with_depth(0)
    })?;
    self.finish("set_block_type", selection, retyped)
  }

  pub fn set_block_data(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    data: &BlockData,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "set_block_data", ?selection);
    let updated =
      modify_block_for_content_state(content, selection, |block| block.with_data(data.clone()))?;
    self.finish("set_block_data", selection, updated)
  }

  /// Shallow-merges `data` into the data of every selected block.
  pub fn merge_block_data(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    data: &BlockData,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "merge_block_data", ?selection);
    let updated = modify_block_for_content_state(content, selection, |block| {
      let mut merged = block.data().clone();
      merged.extend(data.clone());
      block.with_data(merged)
    })?;
    self.finish("merge_block_data", selection, updated)
  }

  /// Points the selected characters at `entity`, or clears their entity when
  /// `entity` is `None`.
  pub fn apply_entity(
    &self,
    content: &ContentState,
    selection: &SelectionState,
    entity: Option<EntityKey>,
  ) -> Result<ContentState> {
    tracing::trace!(operation = "apply_entity", ?selection, ?entity);
    if let Some(key) = entity {
      content.entity_map().try_get(key)?;
    }
    let detached = remove_entities_at_edges(content, selection)?;
    let applied = apply_entity_to_content_state(&detached, selection, entity)?;
    self.finish("apply_entity", selection, applied)
  }
}
