//! Entity policy at the edges of an edit.
//!
//! Before text is removed or replaced, entities touching the selection have
//! to be dealt with according to their [`EntityMutability`]:
//!
//! - [`remove_entities_at_edges`] detaches IMMUTABLE and SEGMENTED entities
//!   that an edge cuts through, so no character is left holding a reference
//!   to an entity it only partly belongs to.
//! - [`get_character_removal_range`] widens a removal range that lies inside
//!   an entity: IMMUTABLE takes the whole occurrence, SEGMENTED takes whole
//!   segments (see [`crate::segment`]), MUTABLE takes what was asked for.

use std::ops::Range;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  block::ContentBlock,
  content::{
    ContentState,
    EditError,
    Result,
  },
  entity::{
    EntityKey,
    EntityMap,
    EntityMutability,
  },
  segment::{
    self,
    SegmenterRegistry,
  },
  selection::SelectionState,
};

/// Which way a removal deletes: backspace removes backward, delete removes
/// forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemovalDirection {
  #[default]
  Backward,
  Forward,
}

/// Clears entity references cut by either edge of `selection`.
///
/// An edge cuts an entity when the characters on both sides of it belong to
/// the same IMMUTABLE or SEGMENTED entity. The whole occurrence loses its
/// entity reference; MUTABLE entities are left alone. The returned snapshot
/// has `selection` as its `selection_after`.
pub fn remove_entities_at_edges(
  content: &ContentState,
  selection: &SelectionState,
) -> Result<ContentState> {
  content.validate_selection(selection)?;
  let entity_map = content.entity_map();

  let start_block = content.try_block(selection.start_key())?;
  let updated_start = detach_at(entity_map, start_block, selection.start_offset())?;

  let end_block = if selection.start_key() == selection.end_key() {
    updated_start.as_ref().unwrap_or(start_block)
  } else {
    content.try_block(selection.end_key())?
  };
  let updated_end = detach_at(entity_map, end_block, selection.end_offset())?;

  let mut updates = Vec::with_capacity(2);
  if selection.start_key() == selection.end_key() {
    updates.extend(updated_end.or(updated_start));
  } else {
    updates.extend(updated_start);
    updates.extend(updated_end);
  }

  let content = content.with_selection_after(selection.clone());
  if updates.is_empty() {
    return Ok(content);
  }
  let block_map = content.block_map().with_updates(updates);
  Ok(content.with_block_map(block_map))
}

/// The block with the entity cut at `offset` detached, or `None` when
/// nothing needs to change.
fn detach_at(
  entity_map: &EntityMap,
  block: &ContentBlock,
  offset: usize,
) -> Result<Option<ContentBlock>> {
  let before = offset.checked_sub(1).and_then(|idx| block.entity_at(idx));
  let after = block.entity_at(offset);
  let Some(key) = after.filter(|_| before == after) else {
    return Ok(None);
  };
  if entity_map.try_get(key)?.mutability() == EntityMutability::Mutable {
    return Ok(None);
  }

  let occurrence = occurrence_at(block, key, offset)?;
  tracing::debug!(
    entity = %key,
    block = %block.key(),
    ?occurrence,
    "detaching entity cut by selection edge"
  );
  let mut characters = block.characters().to_vec();
  for character in &mut characters[occurrence] {
    *character = character.with_entity(None);
  }
  Ok(Some(block.with_characters_list(characters.into())))
}

/// The single occurrence of entity `key` in `block` that touches `offset`.
pub(crate) fn occurrence_at(
  block: &ContentBlock,
  key: EntityKey,
  offset: usize,
) -> Result<Range<usize>> {
  let mut touching = block
    .entity_ranges(key)
    .into_iter()
    .filter(|range| range.start <= offset && offset <= range.end);
  let Some(occurrence) = touching.next() else {
    return Err(EditError::EntityRangeMissing {
      key,
      block: block.key().clone(),
      offset,
    });
  };
  if touching.next().is_some() {
    return Err(EditError::EntityOccurrenceNotUnique {
      key,
      block: block.key().clone(),
    });
  }
  Ok(occurrence)
}

/// Adjusts a removal range for the entities at its edges.
///
/// The character at the start offset and the one just before the end offset
/// decide. When both belong to the same entity the whole range is governed
/// by that entity's policy; otherwise each edge is widened independently by
/// the policy of the entity it falls in. The result is always a forward
/// selection. The content is not modified.
///
/// [`Modifier::remove_range`](crate::Modifier::remove_range) only calls this
/// for the same-entity case and detaches cut entities otherwise. The
/// per-edge widening serves callers that want to delete whole entities
/// rather than detach them, such as a delete-word command whose range
/// starts in one mention and ends in another.
pub fn get_character_removal_range(
  entity_map: &EntityMap,
  segmenters: &SegmenterRegistry,
  start_block: &ContentBlock,
  end_block: &ContentBlock,
  selection: &SelectionState,
  direction: RemovalDirection,
) -> Result<SelectionState> {
  let start = selection.start_offset();
  let end = selection.end_offset();
  let start_entity = start_block.entity_at(start);
  let end_entity = end.checked_sub(1).and_then(|idx| end_block.entity_at(idx));

  let edge = |block: &ContentBlock, key: EntityKey, side: Side| {
    entity_removal_range(entity_map, segmenters, block, key, start..end, side, direction)
  };

  let adjusted = match (start_entity, end_entity) {
    (None, None) => return Ok(selection.clone()),
    (Some(a), Some(b)) if a == b && start_block.key() == end_block.key() => {
      edge(start_block, a, Side::Within)?
    },
    (Some(a), Some(b)) => {
      edge(start_block, a, Side::Start)?.start..edge(end_block, b, Side::End)?.end
    },
    (Some(a), None) => edge(start_block, a, Side::Start)?.start..end,
    (None, Some(b)) => start..edge(end_block, b, Side::End)?.end,
  };

  if adjusted != (start..end) {
    tracing::debug!(
      requested = ?(start..end),
      ?adjusted,
      ?direction,
      "widened removal range for entity policy"
    );
  }
  Ok(SelectionState::new(
    selection.start_key().clone(),
    adjusted.start,
    selection.end_key().clone(),
    adjusted.end,
    false,
  )
  .with_has_focus(selection.has_focus()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
  /// The whole requested range lies in one occurrence.
  Within,
  /// The entity sits at the start edge; the range continues past it.
  Start,
  /// The entity sits at the end edge; the range began before it.
  End,
}

fn entity_removal_range(
  entity_map: &EntityMap,
  segmenters: &SegmenterRegistry,
  block: &ContentBlock,
  key: EntityKey,
  requested: Range<usize>,
  side: Side,
  direction: RemovalDirection,
) -> Result<Range<usize>> {
  let entity = entity_map.try_get(key)?;
  let anchor = match side {
    Side::Within | Side::Start => requested.start,
    Side::End => requested.end,
  };

  match entity.mutability() {
    EntityMutability::Mutable => Ok(requested),
    EntityMutability::Immutable => {
      let occurrence = occurrence_at(block, key, anchor)?;
      Ok(occurrence.start.min(requested.start)..occurrence.end.max(requested.end))
    },
    EntityMutability::Segmented => {
      let occurrence = occurrence_at(block, key, anchor)?;
      let scoped = match side {
        Side::Within => requested,
        Side::Start => requested.start..occurrence.end,
        Side::End => occurrence.start..requested.end,
      };
      let text = block.text().slice(occurrence.clone()).to_string();
      Ok(segment::removal_range(
        segmenters.for_type(entity.kind()),
        &text,
        occurrence.start,
        scoped,
        direction,
      ))
    },
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    block::{
      BlockKey,
      BlockType,
    },
    character::CharacterMetadata,
    entity::EntityData,
  };

  /// One block "a" with `text`, entity `kind` (of `mutability`) on `span`.
  fn doc(
    text: &str,
    span: Range<usize>,
    mutability: EntityMutability,
  ) -> (ContentState, EntityKey) {
    let (entity_map, key) = EntityMap::new().create(crate::entity::Entity::new(
      "TOKEN",
      mutability,
      EntityData::new(),
    ));
    let characters = (0..text.chars().count())
      .map(|idx| CharacterMetadata::empty().with_entity(span.contains(&idx).then_some(key)))
      .collect();
    let block =
      ContentBlock::with_characters(BlockKey::from("a"), BlockType::unstyled(), text, characters)
        .unwrap();
    (ContentState::from_blocks([block], entity_map).unwrap(), key)
  }

  fn entities(content: &ContentState) -> Vec<Option<u64>> {
    content
      .first_block()
      .characters()
      .iter()
      .map(|c| c.entity().map(EntityKey::get))
      .collect()
  }

  fn removal(
    content: &ContentState,
    start: usize,
    end: usize,
    dir: RemovalDirection,
  ) -> (usize, usize) {
    let block = content.first_block();
    let sel = SelectionState::within(block.key().clone(), start, end);
    let adjusted = get_character_removal_range(
      content.entity_map(),
      &SegmenterRegistry::default(),
      block,
      block,
      &sel,
      dir,
    )
    .unwrap();
    (adjusted.start_offset(), adjusted.end_offset())
  }

  #[test]
  fn test_edge_inside_immutable_detaches_whole_occurrence() {
    let (content, _) = doc("hello world", 6..11, EntityMutability::Immutable);
    let sel = SelectionState::within(BlockKey::from("a"), 0, 8);
    let out = remove_entities_at_edges(&content, &sel).unwrap();
    assert!(entities(&out).iter().all(Option::is_none));
    assert_eq!(out.selection_after(), &sel);
    // input snapshot untouched
    assert_eq!(entities(&content)[6], Some(1));
  }

  #[test]
  fn test_edge_on_entity_boundary_keeps_entity() {
    let (content, _) = doc("hello world", 6..11, EntityMutability::Immutable);
    let sel = SelectionState::within(BlockKey::from("a"), 0, 6);
    let out = remove_entities_at_edges(&content, &sel).unwrap();
    assert_eq!(entities(&out), entities(&content));
    assert!(crate::content::BlockMap::ptr_eq(out.block_map(), content.block_map()));
  }

  #[test]
  fn test_mutable_entity_is_not_detached() {
    let (content, _) = doc("hello world", 6..11, EntityMutability::Mutable);
    let sel = SelectionState::within(BlockKey::from("a"), 0, 8);
    let out = remove_entities_at_edges(&content, &sel).unwrap();
    assert_eq!(entities(&out), entities(&content));
  }

  #[test]
  fn test_segmented_is_detached_like_immutable() {
    let (content, _) = doc("foo bar", 0..7, EntityMutability::Segmented);
    let sel = SelectionState::collapsed_at(BlockKey::from("a"), 2);
    let out = remove_entities_at_edges(&content, &sel).unwrap();
    assert!(entities(&out).iter().all(Option::is_none));
  }

  #[test]
  fn test_immutable_removal_takes_whole_occurrence() {
    let (content, _) = doc("abcde0123456", 5..10, EntityMutability::Immutable);
    assert_eq!(removal(&content, 6, 7, RemovalDirection::Forward), (5, 10));
    assert_eq!(removal(&content, 6, 7, RemovalDirection::Backward), (5, 10));
  }

  #[test]
  fn test_mutable_removal_is_literal() {
    let (content, _) = doc("abcde0123456", 5..10, EntityMutability::Mutable);
    assert_eq!(removal(&content, 6, 7, RemovalDirection::Forward), (6, 7));
  }

  #[test]
  fn test_segmented_removal_by_direction() {
    let (content, _) = doc("foo bar", 0..7, EntityMutability::Segmented);
    assert_eq!(removal(&content, 3, 4, RemovalDirection::Backward), (0, 4));
    assert_eq!(removal(&content, 3, 4, RemovalDirection::Forward), (3, 7));
    assert_eq!(removal(&content, 5, 6, RemovalDirection::Backward), (3, 7));
  }

  #[test]
  fn test_range_starting_in_immutable_extends_to_its_start() {
    // "xx[ENTITY]yy", removal from inside the entity to past its end
    let (content, _) = doc("xxENTITYyy", 2..8, EntityMutability::Immutable);
    assert_eq!(removal(&content, 4, 9, RemovalDirection::Backward), (2, 9));
    // and ending inside it
    assert_eq!(removal(&content, 0, 4, RemovalDirection::Backward), (0, 8));
  }

  #[test]
  fn test_edges_in_different_entities_widen_independently() {
    let immutable =
      || crate::entity::Entity::new("TOKEN", EntityMutability::Immutable, EntityData::new());
    let (entity_map, first) = EntityMap::new().create(immutable());
    let (entity_map, second) = entity_map.create(immutable());
    let characters = (0..9)
      .map(|idx| {
        let entity = match idx {
          0..3 => Some(first),
          6..9 => Some(second),
          _ => None,
        };
        CharacterMetadata::empty().with_entity(entity)
      })
      .collect();
    let block = ContentBlock::with_characters(
      BlockKey::from("a"),
      BlockType::unstyled(),
      "ABCxyzDEF",
      characters,
    )
    .unwrap();
    let content = ContentState::from_blocks([block], entity_map).unwrap();
    assert_eq!(removal(&content, 1, 8, RemovalDirection::Backward), (0, 9));
    assert_eq!(removal(&content, 1, 5, RemovalDirection::Backward), (0, 5));
    assert_eq!(removal(&content, 4, 7, RemovalDirection::Backward), (4, 9));
  }

  #[test]
  fn test_plain_range_is_unchanged() {
    let (content, _) = doc("xxENTITYyy", 2..8, EntityMutability::Immutable);
    assert_eq!(removal(&content, 0, 2, RemovalDirection::Forward), (0, 2));
  }

  #[test]
  fn test_unknown_entity_is_an_error() {
    let ghost = EntityKey::from_raw(7).unwrap();
    let linked = CharacterMetadata::empty().with_entity(Some(ghost));
    let block = ContentBlock::with_characters(
      BlockKey::from("a"),
      BlockType::unstyled(),
      "ab",
      vec![linked.clone(), linked],
    )
    .unwrap();
    let content = ContentState::from_blocks([block], EntityMap::new()).unwrap();
    let sel = SelectionState::collapsed_at(BlockKey::from("a"), 1);
    assert_eq!(
      remove_entities_at_edges(&content, &sel).unwrap_err(),
      EditError::UnknownEntity { key: ghost }
    );
  }
}
