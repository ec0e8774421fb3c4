//! The primitives that change block text and block structure.
//!
//! Everything else in the crate is built from these four functions. Each
//! takes a snapshot and a selection and returns a new snapshot whose
//! `selection_after` marks where editing continues. None of them applies
//! entity policy; callers run [`crate::removal`] first where it matters.
//!
//! Every block these functions build is checked for entity contiguity
//! before it goes into the result. Inserted text or fragments that would
//! split an entity occurrence are rejected with
//! [`EditError::EntityNotContiguous`]. Merging two blocks that hold the same
//! entity keeps the first occurrence and detaches the later ones.

use std::{
  collections::HashSet,
  iter,
  sync::Arc,
};

use ropey::Rope;

use crate::{
  block::{
    BlockKey,
    ContentBlock,
  },
  character::CharacterMetadata,
  config::{
    FragmentConfig,
    SplitConfig,
  },
  content::{
    BlockMap,
    ContentState,
    EditError,
    Result,
  },
  entity::EntityKey,
  keys::{
    KeyGenerator,
    fresh_key,
  },
  selection::SelectionState,
};

fn require_collapsed(selection: &SelectionState, operation: &'static str) -> Result<()> {
  if selection.is_collapsed() {
    Ok(())
  } else {
    Err(EditError::SelectionNotCollapsed { operation })
  }
}

fn concat(parts: &[&[CharacterMetadata]]) -> Arc<[CharacterMetadata]> {
  parts.iter().flat_map(|part| part.iter().cloned()).collect()
}

fn join(mut head: Rope, tail: Rope) -> Rope {
  head.append(tail);
  head
}

/// Rejects `block` if an entity reappears in it after a gap.
fn contiguous(block: ContentBlock) -> Result<ContentBlock> {
  block.check_entity_contiguity()?;
  Ok(block)
}

/// Clears the entity of every run that repeats an entity seen in an earlier
/// run, and returns the entities that lost an occurrence.
fn detach_repeated_occurrences(characters: &mut [CharacterMetadata]) -> Vec<EntityKey> {
  let mut seen: Vec<EntityKey> = Vec::new();
  let mut detached: Vec<EntityKey> = Vec::new();
  let mut run: Option<EntityKey> = None;
  let mut clearing = false;
  for character in characters.iter_mut() {
    let entity = character.entity();
    if entity != run {
      run = entity;
      clearing = match entity {
        Some(key) if seen.contains(&key) => {
          if !detached.contains(&key) {
            detached.push(key);
          }
          true
        },
        Some(key) => {
          seen.push(key);
          false
        },
        None => false,
      };
    }
    if clearing {
      *character = character.with_entity(None);
    }
  }
  detached
}

/// Deletes everything between the selection's start and end.
///
/// A range spanning several blocks merges the start and end blocks into
/// one, keeping the start block's key, type, depth and data; blocks in
/// between disappear. If the merged block ends up holding an entity in two
/// separate runs, the run coming from the end block loses its reference.
/// The result's `selection_after` is a caret at the start of the range. A
/// collapsed range changes nothing.
pub fn remove_range_from_content_state(
  content: &ContentState,
  selection: &SelectionState,
) -> Result<ContentState> {
  content.validate_selection(selection)?;
  let caret = selection.collapse_to_start();
  if selection.is_collapsed() {
    return Ok(content.with_edit(content.block_map().clone(), selection.clone(), caret));
  }

  let block_map = content.block_map();
  let (start_key, start_offset) = (selection.start_key(), selection.start_offset());
  let (end_key, end_offset) = (selection.end_key(), selection.end_offset());
  let (start_idx, end_idx) = block_map.span(start_key, end_key)?;
  let start_block = content.try_block(start_key)?;
  let end_block = content.try_block(end_key)?;

  let text = if start_key == end_key {
    let mut text = start_block.text().clone();
    text.remove(start_offset..end_offset);
    text
  } else {
    join(
      Rope::from(start_block.text().slice(..start_offset)),
      Rope::from(end_block.text().slice(end_offset..)),
    )
  };
  let mut characters: Vec<CharacterMetadata> = start_block.characters()[..start_offset]
    .iter()
    .chain(&end_block.characters()[end_offset..])
    .cloned()
    .collect();
  if start_key != end_key {
    let detached = detach_repeated_occurrences(&mut characters);
    if !detached.is_empty() {
      tracing::debug!(
        block = %start_key,
        ?detached,
        "detached repeated entity occurrences after merging blocks"
      );
    }
  }
  let merged = Arc::new(contiguous(start_block.with_content(text, characters.into()))?);

  let blocks = block_map
    .iter_shared()
    .enumerate()
    .filter(|(idx, _)| *idx <= start_idx || *idx > end_idx)
    .map(|(idx, block)| {
      if idx == start_idx {
        merged.clone()
      } else {
        block.clone()
      }
    });

  Ok(content.with_edit(BlockMap::from_shared(blocks), selection.clone(), caret))
}

/// Inserts `text` at a caret, every new character carrying `metadata`.
///
/// Never splits blocks: the text lands in the caret's block as-is. Text
/// that would leave an entity occurrence on both sides of it without
/// carrying that entity is rejected. The result's `selection_after` is a
/// caret right after the inserted text.
pub fn insert_text_into_content_state(
  content: &ContentState,
  target: &SelectionState,
  text: &str,
  metadata: &CharacterMetadata,
) -> Result<ContentState> {
  require_collapsed(target, "insert_text")?;
  content.validate_selection(target)?;
  if let Some(key) = metadata.entity() {
    content.entity_map().try_get(key)?;
  }

  let key = target.start_key();
  let offset = target.start_offset();
  let len = text.chars().count();
  if len == 0 {
    return Ok(content.with_selection_after(target.clone()));
  }

  let block = content.try_block(key)?;
  let mut new_text = block.text().clone();
  new_text.insert(offset, text);
  let characters = block.characters()[..offset]
    .iter()
    .cloned()
    .chain(iter::repeat_n(metadata.clone(), len))
    .chain(block.characters()[offset..].iter().cloned())
    .collect();

  let updated = contiguous(block.with_content(new_text, characters))?;
  let block_map = content.block_map().with_updates([updated]);
  let after = target.with_caret(key.clone(), offset + len);
  Ok(
    content
      .with_block_map(block_map)
      .with_selection_after(after),
  )
}

/// Splits the caret's block in two.
///
/// The upper half keeps the block's key; the lower half gets a fresh key
/// from `keys` and the block's type, with depth and data carried over as
/// `config` says. The result's `selection_after` is a caret at the start of
/// the lower half.
pub fn split_block_in_content_state(
  content: &ContentState,
  target: &SelectionState,
  keys: &dyn KeyGenerator,
  config: &SplitConfig,
) -> Result<ContentState> {
  require_collapsed(target, "split_block")?;
  content.validate_selection(target)?;

  let block_map = content.block_map();
  let key = target.start_key();
  let offset = target.start_offset();
  let block = content.try_block(key)?;

  let (above_text, above_chars) = block.slice(0..offset);
  let (below_text, below_chars) = block.slice(offset..block.len());
  let above = Arc::new(block.with_content(above_text, above_chars.into()));

  let below_key = fresh_key(keys, |candidate| block_map.contains_key(candidate));
  let mut below = block
    .with_key(below_key.clone())
    .with_content(below_text, below_chars.into());
  if !config.keep_depth {
    below = below.with_depth(0);
  }
  if !config.keep_data {
    below = below.with_data(Default::default());
  }
  let below = Arc::new(below);

  let blocks = block_map.iter_shared().flat_map(|shared| {
    if shared.key() == key {
      vec![above.clone(), below.clone()]
    } else {
      vec![shared.clone()]
    }
  });

  let after = target.with_caret(below_key, 0);
  Ok(content.with_edit(BlockMap::from_shared(blocks), target.clone(), after))
}

/// Inserts a fragment of blocks at a caret.
///
/// A single-block fragment is spliced into the caret's block. Otherwise the
/// caret's block is cut in two: the fragment's first block is appended to
/// the part before the caret (which keeps its key), the fragment's last
/// block is prepended to the part after it, and the blocks in between go in
/// as they are. Fragment keys are kept unless they collide with a key
/// already in the document, in which case `keys` supplies a new one. A
/// fragment whose entities would end up split around other text is
/// rejected. The result's `selection_after` is a caret at the end of the
/// inserted fragment.
pub fn insert_fragment_into_content_state(
  content: &ContentState,
  target: &SelectionState,
  fragment: &BlockMap,
  keys: &dyn KeyGenerator,
  config: &FragmentConfig,
) -> Result<ContentState> {
  require_collapsed(target, "insert_fragment")?;
  content.validate_selection(target)?;
  let (Some(first), Some(last)) = (fragment.first(), fragment.last()) else {
    return Err(EditError::EmptyFragment);
  };
  for key in fragment
    .iter()
    .flat_map(|block| block.characters().iter().filter_map(CharacterMetadata::entity))
  {
    content.entity_map().try_get(key)?;
  }

  let key = target.start_key();
  let offset = target.start_offset();
  let block = content.try_block(key)?;

  if fragment.len() == 1 {
    let mut text = block.text().clone();
    text.insert(offset, &first.text().to_string());
    let characters = concat(&[
      &block.characters()[..offset],
      first.characters(),
      &block.characters()[offset..],
    ]);
    let mut updated = block.with_content(text, characters);
    if config.merge_block_data {
      let mut data = block.data().clone();
      data.extend(first.data().clone());
      updated = updated.with_data(data);
    }
    let block_map = content.block_map().with_updates([contiguous(updated)?]);
    let after = target.with_caret(key.clone(), offset + first.len());
    return Ok(content.with_edit(block_map, target.clone(), after));
  }

  let (head_text, head_chars) = block.slice(0..offset);
  let mut head = block.with_content(
    join(head_text, first.text().clone()),
    concat(&[&head_chars[..], first.characters()]),
  );
  if offset == 0 {
    head = head
      .with_type(first.block_type().clone())
      .with_data(first.data().clone());
  }

  let mut taken: HashSet<BlockKey> = content.block_map().keys().cloned().collect();
  let mut claim = |wanted: &BlockKey| {
    let key = if taken.contains(wanted) {
      fresh_key(keys, |candidate| taken.contains(candidate))
    } else {
      wanted.clone()
    };
    taken.insert(key.clone());
    key
  };

  let mut inserted = vec![Arc::new(contiguous(head)?)];
  for middle in fragment.iter().skip(1).take(fragment.len() - 2) {
    let middle_key = claim(middle.key());
    inserted.push(Arc::new(contiguous(middle.with_key(middle_key))?));
  }

  let (tail_text, tail_chars) = block.slice(offset..block.len());
  let tail_key = claim(last.key());
  let tail = last.with_key(tail_key.clone()).with_content(
    join(last.text().clone(), tail_text),
    concat(&[last.characters(), &tail_chars[..]]),
  );
  inserted.push(Arc::new(contiguous(tail)?));

  let blocks = content.block_map().iter_shared().flat_map(|shared| {
    if shared.key() == key {
      inserted.clone()
    } else {
      vec![shared.clone()]
    }
  });

  let after = target.with_caret(tail_key, last.len());
  Ok(content.with_edit(BlockMap::from_shared(blocks), target.clone(), after))
}
