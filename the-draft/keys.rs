//! Block key generation.
//!
//! New blocks (from splits, fragment insertion or
//! [`ContentState::from_text`](crate::content::ContentState::from_text)) need
//! keys that do not collide with the keys already in the document. Where
//! keys come from is up to the caller; a collaborative editor would
//! typically hand in a generator that mixes in a site id. Keys only have to
//! be unique, not monotonic.

use std::sync::atomic::{
  AtomicU64,
  Ordering,
};

use crate::block::BlockKey;

pub trait KeyGenerator: Send + Sync {
  fn next_key(&self) -> BlockKey;
}

/// Keys of the form `b1`, `b2`, ... from a per-generator counter.
#[derive(Debug)]
pub struct SequentialKeys {
  prefix: &'static str,
  next:   AtomicU64,
}

impl SequentialKeys {
  pub const fn new(prefix: &'static str) -> Self {
    Self {
      prefix,
      next: AtomicU64::new(1),
    }
  }
}

impl Default for SequentialKeys {
  fn default() -> Self {
    Self::new("b")
  }
}

impl KeyGenerator for SequentialKeys {
  fn next_key(&self) -> BlockKey {
    let id = self.next.fetch_add(1, Ordering::Relaxed);
    BlockKey::from(format!("{}{id}", self.prefix))
  }
}

/// Draws keys from `keys` until one is not `taken`.
pub(crate) fn fresh_key(keys: &dyn KeyGenerator, taken: impl Fn(&BlockKey) -> bool) -> BlockKey {
  loop {
    let key = keys.next_key();
    if !taken(&key) {
      return key;
    }
  }
}
