//! Per-character style and entity metadata.
//!
//! Every code point of a block carries one [`CharacterMetadata`]: the set of
//! inline styles applied to it and an optional reference into the
//! document's [`EntityMap`](crate::entity::EntityMap).
//!
//! Metadata values are interned. Two values with equal contents share one
//! allocation, so a block with thousands of identically styled characters
//! costs one pointer per character, and comparing two values is usually a
//! pointer comparison.
//!
//! Values are immutable. The `with_*`/`without_*` methods return the
//! interned value for the updated contents, and return `self` unchanged when
//! the update is a no-op so callers can rely on [`CharacterMetadata::ptr_eq`]
//! to detect untouched characters.

use std::{
  fmt,
  hash::{
    Hash,
    Hasher,
  },
  sync::{
    Arc,
    LazyLock,
  },
};

use hashbrown::HashSet;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{
  Tendril,
  entity::EntityKey,
};

/// Name of an inline style, e.g. `BOLD` or `CODE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InlineStyle(Tendril);

impl InlineStyle {
  pub fn new(name: impl Into<Tendril>) -> Self {
    Self(name.into())
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl From<&str> for InlineStyle {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl fmt::Display for InlineStyle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A set of inline styles.
///
/// Kept sorted and deduplicated so that equal sets compare and hash equally
/// regardless of the order styles were applied in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StyleSet(SmallVec<[InlineStyle; 2]>);

impl StyleSet {
  pub fn new() -> Self {
    Self(SmallVec::new())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, style: &InlineStyle) -> bool {
    self.0.binary_search(style).is_ok()
  }

  pub fn iter(&self) -> impl Iterator<Item = &InlineStyle> {
    self.0.iter()
  }

  #[must_use]
  pub fn with(&self, style: InlineStyle) -> Self {
    let mut styles = self.clone();
    if let Err(idx) = styles.0.binary_search(&style) {
      styles.0.insert(idx, style);
    }
    styles
  }

  #[must_use]
  pub fn without(&self, style: &InlineStyle) -> Self {
    let mut styles = self.clone();
    if let Ok(idx) = styles.0.binary_search(style) {
      styles.0.remove(idx);
    }
    styles
  }
}

impl<S: Into<InlineStyle>> FromIterator<S> for StyleSet {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let mut styles: SmallVec<[InlineStyle; 2]> = iter.into_iter().map(Into::into).collect();
    styles.sort_unstable();
    styles.dedup();
    Self(styles)
  }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Metadata {
  style:  StyleSet,
  entity: Option<EntityKey>,
}

static POOL: LazyLock<Mutex<HashSet<Arc<Metadata>>>> =
  LazyLock::new(|| Mutex::new(HashSet::new()));

fn intern(metadata: Metadata) -> Arc<Metadata> {
  let mut pool = POOL.lock();
  if let Some(existing) = pool.get(&metadata) {
    return existing.clone();
  }
  let interned = Arc::new(metadata);
  pool.insert(interned.clone());
  interned
}

/// Style set and entity reference of a single character.
#[derive(Clone)]
pub struct CharacterMetadata(Arc<Metadata>);

impl CharacterMetadata {
  pub fn new(style: StyleSet, entity: Option<EntityKey>) -> Self {
    Self(intern(Metadata { style, entity }))
  }

  /// Metadata with no style and no entity.
  pub fn empty() -> Self {
    static EMPTY: LazyLock<CharacterMetadata> =
      LazyLock::new(|| CharacterMetadata::new(StyleSet::new(), None));
    EMPTY.clone()
  }

  pub fn style(&self) -> &StyleSet {
    &self.0.style
  }

  pub fn entity(&self) -> Option<EntityKey> {
    self.0.entity
  }

  pub fn has_style(&self, style: &InlineStyle) -> bool {
    self.0.style.contains(style)
  }

  #[must_use]
  pub fn with_style(&self, style: &InlineStyle) -> Self {
    if self.has_style(style) {
      return self.clone();
    }
    Self::new(self.0.style.with(style.clone()), self.0.entity)
  }

  #[must_use]
  pub fn without_style(&self, style: &InlineStyle) -> Self {
    if !self.has_style(style) {
      return self.clone();
    }
    Self::new(self.0.style.without(style), self.0.entity)
  }

  #[must_use]
  pub fn with_entity(&self, entity: Option<EntityKey>) -> Self {
    if self.0.entity == entity {
      return self.clone();
    }
    Self::new(self.0.style.clone(), entity)
  }

  /// Whether both values are the same interned allocation.
  pub fn ptr_eq(a: &Self, b: &Self) -> bool {
    Arc::ptr_eq(&a.0, &b.0)
  }
}

impl Default for CharacterMetadata {
  fn default() -> Self {
    Self::empty()
  }
}

impl PartialEq for CharacterMetadata {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
  }
}

impl Eq for CharacterMetadata {}

impl Hash for CharacterMetadata {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.hash(state);
  }
}

impl fmt::Debug for CharacterMetadata {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CharacterMetadata")
      .field("style", &self.0.style)
      .field("entity", &self.0.entity)
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn bold() -> InlineStyle {
    InlineStyle::from("BOLD")
  }

  #[test]
  fn test_equal_contents_are_interned() {
    let a = CharacterMetadata::new(StyleSet::from_iter(["BOLD", "ITALIC"]), None);
    let b = CharacterMetadata::new(StyleSet::from_iter(["ITALIC", "BOLD"]), None);
    assert!(CharacterMetadata::ptr_eq(&a, &b));
    assert_eq!(a, b);
  }

  #[test]
  fn test_style_round_trip() {
    let plain = CharacterMetadata::empty();
    let styled = plain.with_style(&bold());
    assert!(styled.has_style(&bold()));
    assert_ne!(plain, styled);

    let unstyled = styled.without_style(&bold());
    assert!(CharacterMetadata::ptr_eq(&plain, &unstyled));
  }

  #[test]
  fn test_noop_updates_keep_identity() {
    let styled = CharacterMetadata::empty().with_style(&bold());
    assert!(CharacterMetadata::ptr_eq(&styled, &styled.with_style(&bold())));
    assert!(CharacterMetadata::ptr_eq(
      &styled,
      &styled.without_style(&InlineStyle::from("CODE"))
    ));
    assert!(CharacterMetadata::ptr_eq(&styled, &styled.with_entity(None)));
  }

  #[test]
  fn test_entity_keeps_style() {
    let key = EntityKey::from_raw(3).unwrap();
    let linked = CharacterMetadata::empty().with_style(&bold()).with_entity(Some(key));
    assert_eq!(linked.entity(), Some(key));
    assert!(linked.has_style(&bold()));
    assert_eq!(linked.with_entity(None).entity(), None);
  }

  #[test]
  fn test_style_set_dedups() {
    let styles = StyleSet::from_iter(["CODE", "BOLD", "CODE"]);
    assert_eq!(styles.len(), 2);
    let names: Vec<_> = styles.iter().map(InlineStyle::as_str).collect();
    assert_eq!(names, ["BOLD", "CODE"]);
  }
}
