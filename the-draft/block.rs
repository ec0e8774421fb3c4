//! Blocks: one paragraph-like unit of the document.
//!
//! A [`ContentBlock`] holds its text as a [`Rope`] and a parallel list of
//! [`CharacterMetadata`], one entry per code point. Offsets everywhere in
//! this crate are code point offsets into that text.
//!
//! Blocks are immutable. The `with_*` methods return a new block that shares
//! every unchanged part (text rope, character list, data) with `self`.

use std::{
  fmt,
  ops::Range,
  sync::Arc,
};

use ropey::Rope;

use crate::{
  Tendril,
  character::{
    CharacterMetadata,
    StyleSet,
  },
  content::{
    EditError,
    Result,
  },
  entity::EntityKey,
};

/// Arbitrary per-block payload.
pub type BlockData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey(Tendril);

impl BlockKey {
  pub fn new(key: impl Into<Tendril>) -> Self {
    Self(key.into())
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl From<&str> for BlockKey {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for BlockKey {
  fn from(value: String) -> Self {
    Self::new(value)
  }
}

impl fmt::Display for BlockKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Block type, e.g. `unstyled`, `header-one` or `ordered-list-item`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockType(Tendril);

impl BlockType {
  pub const UNSTYLED: &'static str = "unstyled";

  pub fn new(kind: impl Into<Tendril>) -> Self {
    Self(kind.into())
  }

  pub fn unstyled() -> Self {
    Self::new(Self::UNSTYLED)
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl Default for BlockType {
  fn default() -> Self {
    Self::unstyled()
  }
}

impl From<&str> for BlockType {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
  key:        BlockKey,
  kind:       BlockType,
  depth:      usize,
  text:       Rope,
  characters: Arc<[CharacterMetadata]>,
  data:       Arc<BlockData>,
}

impl ContentBlock {
  /// An unstyled block whose characters carry no style and no entity.
  pub fn new(key: BlockKey, text: &str) -> Self {
    let characters = text.chars().map(|_| CharacterMetadata::empty()).collect();
    Self {
      key,
      kind: BlockType::unstyled(),
      depth: 0,
      text: Rope::from_str(text),
      characters,
      data: Arc::default(),
    }
  }

  /// A block with explicit per-character metadata.
  ///
  /// Fails when `characters` does not have exactly one entry per code point.
  pub fn with_characters(
    key: BlockKey,
    kind: BlockType,
    text: &str,
    characters: Vec<CharacterMetadata>,
  ) -> Result<Self> {
    let text = Rope::from_str(text);
    if text.len_chars() != characters.len() {
      return Err(EditError::CharacterListMismatch {
        key,
        text: text.len_chars(),
        characters: characters.len(),
      });
    }
    Ok(Self {
      key,
      kind,
      depth: 0,
      text,
      characters: characters.into(),
      data: Arc::default(),
    })
  }

  pub fn key(&self) -> &BlockKey {
    &self.key
  }

  pub fn block_type(&self) -> &BlockType {
    &self.kind
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn data(&self) -> &BlockData {
    &self.data
  }

  pub fn characters(&self) -> &[CharacterMetadata] {
    &self.characters
  }

  /// Length in code points.
  pub fn len(&self) -> usize {
    self.text.len_chars()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn character_at(&self, offset: usize) -> Option<&CharacterMetadata> {
    self.characters.get(offset)
  }

  pub fn entity_at(&self, offset: usize) -> Option<EntityKey> {
    self.character_at(offset).and_then(CharacterMetadata::entity)
  }

  pub fn style_at(&self, offset: usize) -> Option<&StyleSet> {
    self.character_at(offset).map(CharacterMetadata::style)
  }

  #[must_use]
  pub fn with_key(&self, key: BlockKey) -> Self {
    Self {
      key,
      ..self.clone()
    }
  }

  #[must_use]
  pub fn with_type(&self, kind: BlockType) -> Self {
    Self {
      kind,
      ..self.clone()
    }
  }

  #[must_use]
  pub fn with_depth(&self, depth: usize) -> Self {
    Self {
      depth,
      ..self.clone()
    }
  }

  #[must_use]
  pub fn with_data(&self, data: BlockData) -> Self {
    Self {
      data: Arc::new(data),
      ..self.clone()
    }
  }

  /// Replaces text and metadata together; they must have equal lengths.
  #[must_use]
  pub(crate) fn with_content(&self, text: Rope, characters: Arc<[CharacterMetadata]>) -> Self {
    debug_assert_eq!(text.len_chars(), characters.len());
    Self {
      text,
      characters,
      ..self.clone()
    }
  }

  #[must_use]
  pub(crate) fn with_characters_list(&self, characters: Arc<[CharacterMetadata]>) -> Self {
    debug_assert_eq!(self.text.len_chars(), characters.len());
    Self {
      characters,
      ..self.clone()
    }
  }

  /// Text and metadata of `range`, as a new rope and list.
  pub(crate) fn slice(&self, range: Range<usize>) -> (Rope, Vec<CharacterMetadata>) {
    let text = Rope::from(self.text.slice(range.clone()));
    (text, self.characters[range].to_vec())
  }

  /// Contiguous runs of characters, split wherever `same` says two
  /// neighbours differ, keeping only runs whose characters pass `filter`.
  pub fn find_ranges(
    &self,
    same: impl Fn(&CharacterMetadata, &CharacterMetadata) -> bool,
    filter: impl Fn(&CharacterMetadata) -> bool,
  ) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for end in 1..=self.characters.len() {
      let boundary = end == self.characters.len()
        || !same(&self.characters[end - 1], &self.characters[end]);
      if boundary {
        if filter(&self.characters[start]) {
          ranges.push(start..end);
        }
        start = end;
      }
    }
    ranges
  }

  /// Runs of equal entity reference whose reference passes `filter`.
  pub fn find_entity_ranges(
    &self,
    filter: impl Fn(Option<EntityKey>) -> bool,
  ) -> Vec<Range<usize>> {
    self.find_ranges(|a, b| a.entity() == b.entity(), |c| filter(c.entity()))
  }

  /// Every occurrence of entity `key` in this block.
  pub fn entity_ranges(&self, key: EntityKey) -> Vec<Range<usize>> {
    self.find_entity_ranges(|entity| entity == Some(key))
  }

  /// Occurrences of any entity, paired with the entity key.
  pub fn entity_runs(&self) -> Vec<(EntityKey, Range<usize>)> {
    self
      .find_ranges(|a, b| a.entity() == b.entity(), |c| c.entity().is_some())
      .into_iter()
      .filter_map(|range| self.entity_at(range.start).map(|key| (key, range)))
      .collect()
  }

  /// Checks that no entity reappears after a gap in this block.
  pub fn check_entity_contiguity(&self) -> Result<()> {
    let mut seen: Vec<EntityKey> = Vec::new();
    for (key, _) in self.entity_runs() {
      if seen.contains(&key) {
        return Err(EditError::EntityNotContiguous {
          key,
          block: self.key.clone(),
        });
      }
      seen.push(key);
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::character::InlineStyle;

  fn entity(id: u64) -> EntityKey {
    EntityKey::from_raw(id).unwrap()
  }

  fn block_with_entities(text: &str, entities: &[Option<u64>]) -> ContentBlock {
    let chars = entities
      .iter()
      .map(|id| CharacterMetadata::empty().with_entity(id.map(entity)))
      .collect();
    ContentBlock::with_characters(BlockKey::from("a"), BlockType::unstyled(), text, chars).unwrap()
  }

  #[test]
  fn test_new_block_is_plain() {
    let block = ContentBlock::new(BlockKey::from("a"), "héllo");
    assert_eq!(block.len(), 5);
    assert_eq!(block.characters().len(), 5);
    assert_eq!(block.block_type().as_str(), "unstyled");
    assert!(block.characters().iter().all(|c| c == &CharacterMetadata::empty()));
  }

  #[test]
  fn test_character_list_mismatch() {
    let err = ContentBlock::with_characters(
      BlockKey::from("a"),
      BlockType::unstyled(),
      "abc",
      vec![CharacterMetadata::empty()],
    )
    .unwrap_err();
    assert_eq!(err, EditError::CharacterListMismatch {
      key:        BlockKey::from("a"),
      text:       3,
      characters: 1,
    });
  }

  #[test]
  fn test_entity_ranges() {
    let block = block_with_entities("abcdef", &[None, Some(1), Some(1), Some(2), None, None]);
    assert_eq!(block.entity_ranges(entity(1)), vec![1..3]);
    assert_eq!(block.entity_ranges(entity(2)), vec![3..4]);
    assert_eq!(block.entity_runs(), vec![(entity(1), 1..3), (entity(2), 3..4)]);
    assert_eq!(block.entity_at(2), Some(entity(1)));
    assert_eq!(block.entity_at(4), None);
    assert_eq!(block.entity_at(10), None);
  }

  #[test]
  fn test_contiguity_check() {
    let ok = block_with_entities("abc", &[Some(1), Some(1), None]);
    assert!(ok.check_entity_contiguity().is_ok());

    let gap = block_with_entities("abc", &[Some(1), None, Some(1)]);
    assert_eq!(
      gap.check_entity_contiguity().unwrap_err(),
      EditError::EntityNotContiguous {
        key:   entity(1),
        block: BlockKey::from("a"),
      }
    );
  }

  #[test]
  fn test_builders_share_unchanged_parts() {
    let block = ContentBlock::new(BlockKey::from("a"), "text");
    let header = block.with_type(BlockType::from("header-one")).with_depth(2);
    assert_eq!(header.block_type().as_str(), "header-one");
    assert_eq!(header.depth(), 2);
    assert!(Arc::ptr_eq(&block.characters, &header.characters));
    assert_eq!(block.block_type().as_str(), "unstyled");
  }

  #[test]
  fn test_find_style_ranges() {
    let bold = InlineStyle::from("BOLD");
    let plain = CharacterMetadata::empty();
    let strong = plain.with_style(&bold);
    let block = ContentBlock::with_characters(
      BlockKey::from("a"),
      BlockType::unstyled(),
      "abcd",
      vec![plain.clone(), strong.clone(), strong, plain],
    )
    .unwrap();
    let ranges = block.find_ranges(|a, b| a.style() == b.style(), |c| c.has_style(&bold));
    assert_eq!(ranges, vec![1..3]);
  }
}
