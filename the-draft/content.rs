//! Document snapshots.
//!
//! A [`ContentState`] bundles the ordered [`BlockMap`], the [`EntityMap`]
//! and the selections before and after the edit that produced it. Snapshots
//! are persistent values: every transaction returns a new one, and blocks the
//! transaction did not touch are shared by `Arc` between the old and the new
//! snapshot.
//!
//! # Invariants
//!
//! - At least one block exists, and block keys are unique.
//! - Each block has exactly one [`CharacterMetadata`] per code point.
//! - Every entity reference points into the snapshot's entity map.
//! - An entity occupies one contiguous run per block.
//! - `selection_after` is valid against the snapshot that carries it.
//!
//! They hold by construction; [`ContentState::validate`] checks them
//! explicitly and reports the first violation.
//!
//! # Error Handling
//!
//! Every fallible operation in this crate returns [`Result<T, EditError>`].
//! There is no I/O here, so every error is a usage error: the variant names
//! the precondition the caller broke.

use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::{
  block::{
    BlockKey,
    ContentBlock,
  },
  character::CharacterMetadata,
  entity::{
    Entity,
    EntityData,
    EntityKey,
    EntityMap,
    EntityMutability,
  },
  keys::{
    KeyGenerator,
    SequentialKeys,
  },
  selection::SelectionState,
};

pub type Result<T> = std::result::Result<T, EditError>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditError {
  #[error("{operation} requires a collapsed selection")]
  SelectionNotCollapsed { operation: &'static str },
  #[error("block {key} does not exist in this snapshot")]
  UnknownBlock { key: BlockKey },
  #[error("offset {offset} is out of bounds for block {key} of length {len}")]
  OffsetOutOfBounds {
    key:    BlockKey,
    offset: usize,
    len:    usize,
  },
  #[error("selection starts in block {start} which comes after its end block {end}")]
  SelectionOutOfOrder { start: BlockKey, end: BlockKey },
  #[error("entity {key} does not exist in the entity map")]
  UnknownEntity { key: EntityKey },
  #[error("entity {key} has more than one occurrence touching the same offset in block {block}")]
  EntityOccurrenceNotUnique { key: EntityKey, block: BlockKey },
  #[error("entity {key} has no occurrence touching offset {offset} in block {block}")]
  EntityRangeMissing {
    key:    EntityKey,
    block:  BlockKey,
    offset: usize,
  },
  #[error("entity {key} reappears after a gap in block {block}")]
  EntityNotContiguous { key: EntityKey, block: BlockKey },
  #[error("block {key} has {text} code points but {characters} metadata entries")]
  CharacterListMismatch {
    key:        BlockKey,
    text:       usize,
    characters: usize,
  },
  #[error("block key {key} appears more than once")]
  DuplicateBlockKey { key: BlockKey },
  #[error("a document must contain at least one block")]
  EmptyBlockMap,
  #[error("a fragment must contain at least one block")]
  EmptyFragment,
}

/// Ordered map from block key to block, in document order.
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
  blocks: Arc<IndexMap<BlockKey, Arc<ContentBlock>>>,
}

impl BlockMap {
  /// Builds a map from blocks in document order.
  pub fn from_blocks(blocks: impl IntoIterator<Item = ContentBlock>) -> Result<Self> {
    let mut map = IndexMap::new();
    for block in blocks {
      let key = block.key().clone();
      if map.insert(key.clone(), Arc::new(block)).is_some() {
        return Err(EditError::DuplicateBlockKey { key });
      }
    }
    Ok(Self {
      blocks: Arc::new(map),
    })
  }

  /// Builds a map from already shared blocks. Later duplicates replace
  /// earlier ones, so callers must hand in unique keys.
  pub(crate) fn from_shared(blocks: impl IntoIterator<Item = Arc<ContentBlock>>) -> Self {
    let blocks = blocks
      .into_iter()
      .map(|block| (block.key().clone(), block))
      .collect();
    Self {
      blocks: Arc::new(blocks),
    }
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  pub fn contains_key(&self, key: &BlockKey) -> bool {
    self.blocks.contains_key(key)
  }

  pub fn get(&self, key: &BlockKey) -> Option<&ContentBlock> {
    self.blocks.get(key).map(Arc::as_ref)
  }

  /// The shared handle of a block, for identity checks across snapshots.
  pub fn get_shared(&self, key: &BlockKey) -> Option<&Arc<ContentBlock>> {
    self.blocks.get(key)
  }

  pub fn index_of(&self, key: &BlockKey) -> Option<usize> {
    self.blocks.get_index_of(key)
  }

  pub fn get_index(&self, index: usize) -> Option<&ContentBlock> {
    self.blocks.get_index(index).map(|(_, block)| block.as_ref())
  }

  pub fn first(&self) -> Option<&ContentBlock> {
    self.blocks.first().map(|(_, block)| block.as_ref())
  }

  pub fn last(&self) -> Option<&ContentBlock> {
    self.blocks.last().map(|(_, block)| block.as_ref())
  }

  pub fn keys(&self) -> impl Iterator<Item = &BlockKey> {
    self.blocks.keys()
  }

  pub fn iter(&self) -> impl Iterator<Item = &ContentBlock> {
    self.blocks.values().map(Arc::as_ref)
  }

  pub(crate) fn iter_shared(&self) -> impl Iterator<Item = &Arc<ContentBlock>> {
    self.blocks.values()
  }

  /// Positions of `start` and `end` in document order, `start <= end`.
  pub fn span(&self, start: &BlockKey, end: &BlockKey) -> Result<(usize, usize)> {
    let start_idx = self
      .index_of(start)
      .ok_or_else(|| EditError::UnknownBlock { key: start.clone() })?;
    let end_idx = self
      .index_of(end)
      .ok_or_else(|| EditError::UnknownBlock { key: end.clone() })?;
    if start_idx > end_idx {
      return Err(EditError::SelectionOutOfOrder {
        start: start.clone(),
        end:   end.clone(),
      });
    }
    Ok((start_idx, end_idx))
  }

  /// Blocks from `start` through `end`, inclusive.
  pub fn range(
    &self,
    start: &BlockKey,
    end: &BlockKey,
  ) -> Result<impl Iterator<Item = &ContentBlock>> {
    let (start_idx, end_idx) = self.span(start, end)?;
    Ok(
      self
        .blocks
        .values()
        .skip(start_idx)
        .take(end_idx - start_idx + 1)
        .map(Arc::as_ref),
    )
  }

  /// Replaces the blocks with matching keys, keeping their positions.
  #[must_use]
  pub(crate) fn with_updates(&self, updates: impl IntoIterator<Item = ContentBlock>) -> Self {
    let mut blocks = self.blocks.clone();
    let map = Arc::make_mut(&mut blocks);
    for block in updates {
      if let Some(slot) = map.get_mut(block.key()) {
        *slot = Arc::new(block);
      }
    }
    Self { blocks }
  }

  /// Whether both maps hold the same block allocations in the same order.
  pub fn ptr_eq(a: &Self, b: &Self) -> bool {
    Arc::ptr_eq(&a.blocks, &b.blocks)
  }
}

impl PartialEq for BlockMap {
  fn eq(&self, other: &Self) -> bool {
    self.len() == other.len()
      && self
        .blocks
        .iter()
        .zip(other.blocks.iter())
        .all(|((ka, a), (kb, b))| ka == kb && (Arc::ptr_eq(a, b) || a == b))
  }
}

/// An immutable document snapshot.
#[derive(Debug, Clone)]
pub struct ContentState {
  block_map:        BlockMap,
  entity_map:       EntityMap,
  selection_before: SelectionState,
  selection_after:  SelectionState,
}

impl ContentState {
  /// One unstyled block per line of `text`.
  pub fn from_text(text: &str) -> Self {
    Self::from_text_with_keys(text, &SequentialKeys::default())
  }

  pub fn from_text_with_keys(text: &str, keys: &dyn KeyGenerator) -> Self {
    let mut blocks: IndexMap<BlockKey, Arc<ContentBlock>> = IndexMap::new();
    for line in text.split('\n') {
      let line = line.strip_suffix('\r').unwrap_or(line);
      let key = crate::keys::fresh_key(keys, |key| blocks.contains_key(key));
      blocks.insert(key.clone(), Arc::new(ContentBlock::new(key, line)));
    }
    let block_map = BlockMap {
      blocks: Arc::new(blocks),
    };
    Self::with_initial_selection(block_map, EntityMap::new())
  }

  /// A snapshot over explicit blocks. Fails on an empty block list or on
  /// duplicate keys; other invariants are checked by [`Self::validate`].
  pub fn from_blocks(
    blocks: impl IntoIterator<Item = ContentBlock>,
    entity_map: EntityMap,
  ) -> Result<Self> {
    let block_map = BlockMap::from_blocks(blocks)?;
    if block_map.is_empty() {
      return Err(EditError::EmptyBlockMap);
    }
    Ok(Self::with_initial_selection(block_map, entity_map))
  }

  fn with_initial_selection(block_map: BlockMap, entity_map: EntityMap) -> Self {
    let first = block_map.blocks[0].key().clone();
    let selection = SelectionState::collapsed_at(first, 0);
    Self {
      block_map,
      entity_map,
      selection_before: selection.clone(),
      selection_after: selection,
    }
  }

  pub fn block_map(&self) -> &BlockMap {
    &self.block_map
  }

  pub fn entity_map(&self) -> &EntityMap {
    &self.entity_map
  }

  pub fn selection_before(&self) -> &SelectionState {
    &self.selection_before
  }

  /// Where editing continued after the transaction that produced this
  /// snapshot.
  pub fn selection_after(&self) -> &SelectionState {
    &self.selection_after
  }

  pub fn block_for_key(&self, key: &BlockKey) -> Option<&ContentBlock> {
    self.block_map.get(key)
  }

  /// Like [`Self::block_for_key`], but a missing block is an error.
  pub fn try_block(&self, key: &BlockKey) -> Result<&ContentBlock> {
    self
      .block_for_key(key)
      .ok_or_else(|| EditError::UnknownBlock { key: key.clone() })
  }

  pub fn first_block(&self) -> &ContentBlock {
    &self.block_map.blocks[0]
  }

  pub fn last_block(&self) -> &ContentBlock {
    &self.block_map.blocks[self.block_map.len() - 1]
  }

  pub fn block_before(&self, key: &BlockKey) -> Option<&ContentBlock> {
    let idx = self.block_map.index_of(key)?;
    idx.checked_sub(1).and_then(|idx| self.block_map.get_index(idx))
  }

  pub fn block_after(&self, key: &BlockKey) -> Option<&ContentBlock> {
    let idx = self.block_map.index_of(key)?;
    self.block_map.get_index(idx + 1)
  }

  pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
    self.entity_map.get(key)
  }

  /// Block texts joined with `delimiter`.
  pub fn plain_text(&self, delimiter: &str) -> String {
    let mut out = String::new();
    for (idx, block) in self.block_map.iter().enumerate() {
      if idx > 0 {
        out.push_str(delimiter);
      }
      for chunk in block.text().chunks() {
        out.push_str(chunk);
      }
    }
    out
  }

  pub fn has_text(&self) -> bool {
    self.block_map.len() > 1 || !self.first_block().is_empty()
  }

  /// Adds an entity and returns the new snapshot with the entity's key.
  #[must_use]
  pub fn create_entity(
    &self,
    kind: &str,
    mutability: EntityMutability,
    data: EntityData,
  ) -> (Self, EntityKey) {
    let (entity_map, key) = self.entity_map.create(Entity::new(kind, mutability, data));
    (self.with_entity_map(entity_map), key)
  }

  pub fn merge_entity_data(&self, key: EntityKey, data: EntityData) -> Result<Self> {
    Ok(self.with_entity_map(self.entity_map.merge_data(key, data)?))
  }

  pub fn replace_entity_data(&self, key: EntityKey, data: EntityData) -> Result<Self> {
    Ok(self.with_entity_map(self.entity_map.replace_data(key, data)?))
  }

  /// Builds a selection against this snapshot, validating both points and
  /// deriving the backward flag from block order.
  pub fn selection_between(
    &self,
    anchor_key: &BlockKey,
    anchor_offset: usize,
    focus_key: &BlockKey,
    focus_offset: usize,
  ) -> Result<SelectionState> {
    self.check_point(anchor_key, anchor_offset)?;
    self.check_point(focus_key, focus_offset)?;
    let is_backward = if anchor_key == focus_key {
      focus_offset < anchor_offset
    } else {
      self.block_map.index_of(focus_key) < self.block_map.index_of(anchor_key)
    };
    Ok(SelectionState::new(
      anchor_key.clone(),
      anchor_offset,
      focus_key.clone(),
      focus_offset,
      is_backward,
    ))
  }

  /// Checks that `selection` refers to existing blocks, in-bounds offsets
  /// and a start that does not come after its end.
  pub fn validate_selection(&self, selection: &SelectionState) -> Result<()> {
    self.check_point(selection.anchor_key(), selection.anchor_offset())?;
    self.check_point(selection.focus_key(), selection.focus_offset())?;
    let (start_key, end_key) = (selection.start_key(), selection.end_key());
    self.block_map.span(start_key, end_key)?;
    if start_key == end_key && selection.start_offset() > selection.end_offset() {
      return Err(EditError::SelectionOutOfOrder {
        start: start_key.clone(),
        end:   end_key.clone(),
      });
    }
    Ok(())
  }

  fn check_point(&self, key: &BlockKey, offset: usize) -> Result<()> {
    let block = self.try_block(key)?;
    if offset > block.len() {
      return Err(EditError::OffsetOutOfBounds {
        key: key.clone(),
        offset,
        len: block.len(),
      });
    }
    Ok(())
  }

  /// Checks every snapshot invariant, returning the first violation.
  pub fn validate(&self) -> Result<()> {
    if self.block_map.is_empty() {
      return Err(EditError::EmptyBlockMap);
    }
    for block in self.block_map.iter() {
      if block.len() != block.characters().len() {
        return Err(EditError::CharacterListMismatch {
          key:        block.key().clone(),
          text:       block.len(),
          characters: block.characters().len(),
        });
      }
      if let Some(key) = block
        .characters()
        .iter()
        .filter_map(CharacterMetadata::entity)
        .find(|key| !self.entity_map.contains(*key))
      {
        return Err(EditError::UnknownEntity { key });
      }
      block.check_entity_contiguity()?;
    }
    self.validate_selection(&self.selection_after)
  }

  /// The snapshot produced by an edit: new blocks, the selection the edit
  /// ran against and the one it leaves behind.
  #[must_use]
  pub(crate) fn with_edit(
    &self,
    block_map: BlockMap,
    selection_before: SelectionState,
    selection_after: SelectionState,
  ) -> Self {
    Self {
      block_map,
      entity_map: self.entity_map.clone(),
      selection_before,
      selection_after,
    }
  }

  #[must_use]
  pub(crate) fn with_block_map(&self, block_map: BlockMap) -> Self {
    Self {
      block_map,
      ..self.clone()
    }
  }

  #[must_use]
  pub(crate) fn with_entity_map(&self, entity_map: EntityMap) -> Self {
    Self {
      entity_map,
      ..self.clone()
    }
  }

  #[must_use]
  pub fn with_selection_before(&self, selection: SelectionState) -> Self {
    Self {
      selection_before: selection,
      ..self.clone()
    }
  }

  #[must_use]
  pub fn with_selection_after(&self, selection: SelectionState) -> Self {
    Self {
      selection_after: selection,
      ..self.clone()
    }
  }
}
