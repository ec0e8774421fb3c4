//! Out-of-line annotations referenced by character metadata.
//!
//! Entities are stored once in an append-only [`EntityMap`] and referenced
//! by key from every character they cover. A reference must point at an
//! entity that exists in the map of the snapshot holding it. Entities are
//! never removed, even when nothing references them anymore.

use std::{
  fmt,
  num::NonZeroU64,
  sync::Arc,
};

use indexmap::IndexMap;
use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  Tendril,
  content::{
    EditError,
    Result,
  },
};

/// Arbitrary entity payload, e.g. `{"url": "https://..."}` for a link.
pub type EntityData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(NonZeroU64);

impl EntityKey {
  pub const fn new(id: NonZeroU64) -> Self {
    Self(id)
  }

  pub fn from_raw(id: u64) -> Option<Self> {
    NonZeroU64::new(id).map(Self)
  }

  pub fn get(self) -> u64 {
    self.0.get()
  }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// How an entity behaves when part of its text is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityMutability {
  /// Text may be edited freely; the entity follows whatever remains.
  Mutable,
  /// Removal of any part removes the whole occurrence.
  Immutable,
  /// Removal takes whole segments (see [`crate::segment`]).
  Segmented,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
  kind:       Tendril,
  mutability: EntityMutability,
  data:       EntityData,
}

impl Entity {
  pub fn new(kind: impl Into<Tendril>, mutability: EntityMutability, data: EntityData) -> Self {
    Self {
      kind: kind.into(),
      mutability,
      data,
    }
  }

  /// Entity type, e.g. `LINK` or `MENTION`.
  pub fn kind(&self) -> &str {
    self.kind.as_str()
  }

  pub fn mutability(&self) -> EntityMutability {
    self.mutability
  }

  pub fn data(&self) -> &EntityData {
    &self.data
  }
}

/// Append-only registry of entities.
///
/// Cloning is cheap: the map is shared until a snapshot appends to or
/// updates it, at which point that snapshot gets its own copy of the index
/// while the entities themselves stay shared.
#[derive(Debug, Clone, Default)]
pub struct EntityMap {
  entities: Arc<IndexMap<EntityKey, Arc<Entity>>>,
}

impl EntityMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entities.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entities.is_empty()
  }

  pub fn contains(&self, key: EntityKey) -> bool {
    self.entities.contains_key(&key)
  }

  pub fn get(&self, key: EntityKey) -> Option<&Entity> {
    self.entities.get(&key).map(Arc::as_ref)
  }

  /// Like [`EntityMap::get`], but a missing key is an error.
  pub fn try_get(&self, key: EntityKey) -> Result<&Entity> {
    self.get(key).ok_or(EditError::UnknownEntity { key })
  }

  pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
    self.entities.iter().map(|(key, entity)| (*key, entity.as_ref()))
  }

  /// Key of the most recently added entity.
  pub fn last_created_key(&self) -> Option<EntityKey> {
    self.entities.last().map(|(key, _)| *key)
  }

  /// Appends an entity and returns the updated map together with its key.
  #[must_use]
  pub fn create(&self, entity: Entity) -> (Self, EntityKey) {
    let next = self.last_created_key().map_or(1, |key| key.get() + 1);
    let key = EntityKey::from_raw(next).unwrap_or(EntityKey(NonZeroU64::MIN));
    let mut entities = self.entities.clone();
    Arc::make_mut(&mut entities).insert(key, Arc::new(entity));
    (Self { entities }, key)
  }

  /// Shallow-merges `data` into the entity's existing data.
  pub fn merge_data(&self, key: EntityKey, data: EntityData) -> Result<Self> {
    let entity = self.try_get(key)?;
    let mut merged = entity.data.clone();
    merged.extend(data);
    Ok(self.with_data(key, entity, merged))
  }

  pub fn replace_data(&self, key: EntityKey, data: EntityData) -> Result<Self> {
    let entity = self.try_get(key)?;
    Ok(self.with_data(key, entity, data))
  }

  fn with_data(&self, key: EntityKey, entity: &Entity, data: EntityData) -> Self {
    let updated = Entity {
      kind: entity.kind.clone(),
      mutability: entity.mutability,
      data,
    };
    let mut entities = self.entities.clone();
    Arc::make_mut(&mut entities).insert(key, Arc::new(updated));
    Self { entities }
  }
}

#[cfg(test)]
mod test {
  use serde_json::json;

  use super::*;

  fn data(value: serde_json::Value) -> EntityData {
    match value {
      serde_json::Value::Object(map) => map,
      _ => panic!("expected an object"),
    }
  }

  #[test]
  fn test_create_assigns_sequential_keys() {
    let map = EntityMap::new();
    let link = Entity::new("LINK", EntityMutability::Mutable, EntityData::new());
    let mention = Entity::new("MENTION", EntityMutability::Immutable, EntityData::new());
    let (map, first) = map.create(link);
    let (map, second) = map.create(mention);
    assert_eq!(first.get(), 1);
    assert_eq!(second.get(), 2);
    assert_eq!(map.last_created_key(), Some(second));
    assert_eq!(map.get(second).unwrap().kind(), "MENTION");
  }

  #[test]
  fn test_create_leaves_original_untouched() {
    let empty = EntityMap::new();
    let link = Entity::new("LINK", EntityMutability::Mutable, EntityData::new());
    let (created, key) = empty.create(link);
    assert!(empty.is_empty());
    assert!(created.contains(key));
  }

  #[test]
  fn test_merge_and_replace_data() {
    let (map, key) = EntityMap::new().create(Entity::new(
      "LINK",
      EntityMutability::Mutable,
      data(json!({"url": "a", "title": "t"})),
    ));

    let merged = map.merge_data(key, data(json!({"url": "b"}))).unwrap();
    assert_eq!(merged.get(key).unwrap().data(), &data(json!({"url": "b", "title": "t"})));

    let replaced = map.replace_data(key, data(json!({"url": "c"}))).unwrap();
    assert_eq!(replaced.get(key).unwrap().data(), &data(json!({"url": "c"})));

    // the source map is a separate snapshot
    assert_eq!(map.get(key).unwrap().data()["url"], json!("a"));
  }

  #[test]
  fn test_unknown_entity() {
    let key = EntityKey::from_raw(9).unwrap();
    let err = EntityMap::new().replace_data(key, EntityData::new()).unwrap_err();
    assert_eq!(err, EditError::UnknownEntity { key });
  }
}
