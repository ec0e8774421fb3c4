//! Immutable rich-text document model and its editing transactions.
//!
//! A [`ContentState`] is a persistent snapshot: an ordered map of blocks,
//! each holding text plus one [`CharacterMetadata`] per code point, and an
//! append-only [`EntityMap`]. Every edit goes through [`Modifier`], which
//! takes a snapshot and a [`SelectionState`] and returns a new snapshot.
//! The input snapshot is never touched, and unaffected blocks are shared by
//! reference between the two.
//!
//! ```
//! use the_draft::{
//!   ContentState,
//!   Modifier,
//!   SelectionState,
//!   StyleSet,
//! };
//!
//! let content = ContentState::from_text("hello");
//! let key = content.first_block().key().clone();
//! let modifier = Modifier::default();
//!
//! let at_end = SelectionState::collapsed_at(key, 5);
//! let content = modifier
//!   .insert_text(&content, &at_end, " world", &StyleSet::new(), None)
//!   .unwrap();
//!
//! assert_eq!(content.plain_text("\n"), "hello world");
//! assert_eq!(content.selection_after().focus_offset(), 11);
//! ```

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod block;
pub mod character;
pub mod config;
pub mod content;
pub mod entity;
pub mod fragment;
pub mod keys;
pub mod modifier;
pub mod removal;
pub mod segment;
pub mod selection;
pub mod splice;
pub mod transform;

pub type Tendril = SmartString<LazyCompact>;

pub use block::{
  BlockData,
  BlockKey,
  BlockType,
  ContentBlock,
};
pub use character::{
  CharacterMetadata,
  InlineStyle,
  StyleSet,
};
pub use config::ModifierConfig;
pub use content::{
  BlockMap,
  ContentState,
  EditError,
};
pub use entity::{
  Entity,
  EntityData,
  EntityKey,
  EntityMap,
  EntityMutability,
};
pub use keys::{
  KeyGenerator,
  SequentialKeys,
};
pub use modifier::Modifier;
pub use removal::RemovalDirection;
pub use segment::{
  Segmenter,
  SpaceSegmenter,
  WordSegmenter,
};
pub use selection::SelectionState;
