//! Per-block and per-character transforms over a selection.
//!
//! None of these change text or block structure. Blocks and characters a
//! transform leaves alone are carried into the new snapshot by pointer, so
//! callers can detect untouched blocks with [`Arc::ptr_eq`].
//!
//! [`Arc::ptr_eq`]: std::sync::Arc::ptr_eq

use std::ops::Range;

use crate::{
  block::ContentBlock,
  character::{
    CharacterMetadata,
    InlineStyle,
  },
  content::{
    ContentState,
    Result,
  },
  entity::EntityKey,
  selection::SelectionState,
};

/// Offsets of `block` covered by `selection`, which must span the block.
fn covered(block: &ContentBlock, selection: &SelectionState) -> Range<usize> {
  let start = if block.key() == selection.start_key() {
    selection.start_offset()
  } else {
    0
  };
  let end = if block.key() == selection.end_key() {
    selection.end_offset()
  } else {
    block.len()
  };
  start..end
}

/// Maps the characters in `range` through `f`. Returns `None` when `f`
/// handed back every character unchanged.
fn map_characters(
  block: &ContentBlock,
  range: Range<usize>,
  f: impl Fn(&CharacterMetadata) -> CharacterMetadata,
) -> Option<ContentBlock> {
  let mut changed = false;
  let characters: Vec<CharacterMetadata> = block
    .characters()
    .iter()
    .enumerate()
    .map(|(offset, character)| {
      if !range.contains(&offset) {
        return character.clone();
      }
      let mapped = f(character);
      changed |= !CharacterMetadata::ptr_eq(&mapped, character);
      mapped
    })
    .collect();
  changed.then(|| block.with_characters_list(characters.into()))
}

/// The selected blocks whose characters `f` changed.
fn map_selected_characters(
  content: &ContentState,
  selection: &SelectionState,
  f: impl Fn(&CharacterMetadata) -> CharacterMetadata,
) -> Result<Vec<ContentBlock>> {
  content.validate_selection(selection)?;
  Ok(
    content
      .block_map()
      .range(selection.start_key(), selection.end_key())?
      .filter_map(|block| map_characters(block, covered(block, selection), &f))
      .collect(),
  )
}

fn commit(
  content: &ContentState,
  selection: &SelectionState,
  updates: Vec<ContentBlock>,
) -> ContentState {
  let block_map = if updates.is_empty() {
    content.block_map().clone()
  } else {
    content.block_map().with_updates(updates)
  };
  content.with_edit(block_map, selection.clone(), selection.clone())
}

/// Applies `f` to every block the selection touches, start and end block
/// included. The transformed block keeps the original's key.
pub fn modify_block_for_content_state(
  content: &ContentState,
  selection: &SelectionState,
  f: impl Fn(&ContentBlock) -> ContentBlock,
) -> Result<ContentState> {
  content.validate_selection(selection)?;
  let updates: Vec<ContentBlock> = content
    .block_map()
    .range(selection.start_key(), selection.end_key())?
    .map(|block| f(block).with_key(block.key().clone()))
    .collect();
  let block_map = content.block_map().with_updates(updates);
  Ok(content.with_edit(block_map, selection.clone(), selection.clone()))
}

pub fn apply_inline_style(
  content: &ContentState,
  selection: &SelectionState,
  style: &InlineStyle,
) -> Result<ContentState> {
  let updates = map_selected_characters(content, selection, |c| c.with_style(style))?;
  Ok(commit(content, selection, updates))
}

pub fn remove_inline_style(
  content: &ContentState,
  selection: &SelectionState,
  style: &InlineStyle,
) -> Result<ContentState> {
  let updates = map_selected_characters(content, selection, |c| c.without_style(style))?;
  Ok(commit(content, selection, updates))
}

/// Points every selected character at `entity`, or clears the reference
/// when `entity` is `None`.
///
/// Run [`remove_entities_at_edges`](crate::removal::remove_entities_at_edges)
/// first: an immutable entity cut by the selection edge would otherwise end
/// up half covered. A result in which some entity reappears after a gap,
/// such as `entity` applied apart from its existing occurrence or a link
/// cleared from its middle, is rejected.
pub fn apply_entity_to_content_state(
  content: &ContentState,
  selection: &SelectionState,
  entity: Option<EntityKey>,
) -> Result<ContentState> {
  if let Some(key) = entity {
    content.entity_map().try_get(key)?;
  }
  let updates = map_selected_characters(content, selection, |c| c.with_entity(entity))?;
  for block in &updates {
    block.check_entity_contiguity()?;
  }
  Ok(commit(content, selection, updates))
}

#[cfg(test)]
mod test {
  use std::sync::Arc;

  use super::*;
  use crate::{
    block::{
      BlockKey,
      BlockType,
    },
    content::EditError,
    entity::{
      Entity,
      EntityData,
      EntityMutability,
    },
  };

  fn bold() -> InlineStyle {
    InlineStyle::from("BOLD")
  }

  fn two_blocks() -> ContentState {
    ContentState::from_text("alpha\nbeta\ngamma")
  }

  fn key(raw: &str) -> BlockKey {
    BlockKey::from(raw)
  }

  #[test]
  fn test_style_partial_blocks() {
    let content = two_blocks();
    let sel = SelectionState::new(key("b1"), 3, key("b2"), 2, false);
    let out = apply_inline_style(&content, &sel, &bold()).unwrap();

    let first = out.block_for_key(&key("b1")).unwrap();
    let styled: Vec<bool> = first.characters().iter().map(|c| c.has_style(&bold())).collect();
    assert_eq!(styled, [false, false, false, true, true]);
    let second = out.block_for_key(&key("b2")).unwrap();
    let styled: Vec<bool> = second.characters().iter().map(|c| c.has_style(&bold())).collect();
    assert_eq!(styled, [true, true, false, false]);

    assert!(Arc::ptr_eq(
      out.block_map().get_shared(&key("b3")).unwrap(),
      content.block_map().get_shared(&key("b3")).unwrap(),
    ));
    assert_eq!(out.selection_after(), &sel);
  }

  #[test]
  fn test_style_round_trip() {
    let content = two_blocks();
    let sel = SelectionState::new(key("b1"), 1, key("b3"), 4, false);
    let styled = apply_inline_style(&content, &sel, &bold()).unwrap();
    let plain = remove_inline_style(&styled, &sel, &bold()).unwrap();
    assert_eq!(plain.block_map(), content.block_map());
  }

  #[test]
  fn test_style_noop_shares_blocks() {
    let content = two_blocks();
    let sel = SelectionState::within(key("b1"), 0, 5);
    let out = remove_inline_style(&content, &sel, &bold()).unwrap();
    assert!(crate::content::BlockMap::ptr_eq(out.block_map(), content.block_map()));
  }

  #[test]
  fn test_modify_block_keeps_key() {
    let content = two_blocks();
    let sel = SelectionState::new(key("b2"), 0, key("b3"), 1, false);
    let out = modify_block_for_content_state(&content, &sel, |block| {
      block
        .with_type(BlockType::from("blockquote"))
        .with_key(key("other"))
    })
    .unwrap();
    let kinds: Vec<&str> = out.block_map().iter().map(|b| b.block_type().as_str()).collect();
    assert_eq!(kinds, ["unstyled", "blockquote", "blockquote"]);
    let keys: Vec<&str> = out.block_map().keys().map(BlockKey::as_str).collect();
    assert_eq!(keys, ["b1", "b2", "b3"]);
  }

  #[test]
  fn test_apply_entity() {
    let content = two_blocks();
    let (content, link) =
      content.create_entity("LINK", EntityMutability::Mutable, EntityData::new());
    let sel = SelectionState::within(key("b1"), 1, 3);
    let out = apply_entity_to_content_state(&content, &sel, Some(link)).unwrap();
    let block = out.first_block();
    let refs: Vec<Option<EntityKey>> = (0..block.len()).map(|i| block.entity_at(i)).collect();
    assert_eq!(refs, [None, Some(link), Some(link), None, None]);

    let cleared = apply_entity_to_content_state(&out, &sel, None).unwrap();
    assert_eq!(cleared.block_map(), content.block_map());
  }

  #[test]
  fn test_apply_unknown_entity() {
    let content = two_blocks();
    let (other, ghost) = content.entity_map().create(Entity::new(
      "LINK",
      EntityMutability::Mutable,
      EntityData::new(),
    ));
    assert_eq!(other.len(), 1);
    let sel = SelectionState::within(key("b1"), 0, 1);
    let err = apply_entity_to_content_state(&content, &sel, Some(ghost)).unwrap_err();
    assert_eq!(err, EditError::UnknownEntity { key: ghost });
  }

  #[test]
  fn test_apply_entity_apart_from_its_occurrence_is_rejected() {
    let (content, link) =
      two_blocks().create_entity("LINK", EntityMutability::Mutable, EntityData::new());
    let linked = apply_entity_to_content_state(
      &content,
      &SelectionState::within(key("b1"), 0, 2),
      Some(link),
    )
    .unwrap();

    let err = apply_entity_to_content_state(
      &linked,
      &SelectionState::within(key("b1"), 3, 5),
      Some(link),
    )
    .unwrap_err();
    assert_eq!(err, EditError::EntityNotContiguous {
      key:   link,
      block: key("b1"),
    });

    // extending the occurrence is fine
    let grown = apply_entity_to_content_state(
      &linked,
      &SelectionState::within(key("b1"), 2, 5),
      Some(link),
    )
    .unwrap();
    assert_eq!(grown.first_block().entity_ranges(link), vec![0..5]);
  }

  #[test]
  fn test_clearing_middle_of_entity_is_rejected() {
    let (content, link) =
      two_blocks().create_entity("LINK", EntityMutability::Mutable, EntityData::new());
    let linked =
      apply_entity_to_content_state(&content, &SelectionState::within(key("b1"), 0, 5), Some(link))
        .unwrap();
    let err =
      apply_entity_to_content_state(&linked, &SelectionState::within(key("b1"), 2, 3), None)
        .unwrap_err();
    assert!(matches!(err, EditError::EntityNotContiguous { .. }));
  }
}
