//! Extracting the selected part of a document as a standalone [`BlockMap`].

use std::sync::Arc;

use crate::{
  content::{
    BlockMap,
    ContentState,
    Result,
  },
  removal::remove_entities_at_edges,
  selection::SelectionState,
};

/// Copies of the blocks `selection` covers, the first and last cut to the
/// selection's start and end offsets.
///
/// Immutable and segmented entities cut by a selection edge are detached
/// first, so the fragment never carries half an entity. Block keys are kept
/// as they are; insertion re-keys on collision. A collapsed selection yields
/// one empty block.
pub fn get_content_state_fragment(
  content: &ContentState,
  selection: &SelectionState,
) -> Result<BlockMap> {
  let detached = remove_entities_at_edges(content, selection)?;
  let (start_key, start_offset) = (selection.start_key(), selection.start_offset());
  let (end_key, end_offset) = (selection.end_key(), selection.end_offset());

  let blocks = detached
    .block_map()
    .range(start_key, end_key)?
    .map(|block| {
      let start = if block.key() == start_key { start_offset } else { 0 };
      let end = if block.key() == end_key {
        end_offset
      } else {
        block.len()
      };
      if start == 0 && end == block.len() {
        return Arc::new(block.clone());
      }
      let (text, characters) = block.slice(start..end);
      Arc::new(block.with_content(text, characters.into()))
    })
    .collect::<Vec<_>>();

  Ok(BlockMap::from_shared(blocks))
}
