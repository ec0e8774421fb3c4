#![no_main]

mod common;

use std::mem;

use libfuzzer_sys::fuzz_target;

use crate::common::{
  apply_op,
  session_from_bytes,
};

fuzz_target!(|data: &[u8]| {
  let mut session = session_from_bytes(data);

  for op in mem::take(&mut session.ops) {
    let before = session.content.clone();
    let Ok(next) = apply_op(&session.modifier, &session.content, &op) else {
      continue;
    };
    if let Err(err) = next.validate() {
      panic!("{op:?} produced an invalid snapshot: {err}");
    }
    // snapshots are persistent: the input must still be intact
    if let Err(err) = before.validate() {
      panic!("{op:?} corrupted its input snapshot: {err}");
    }
    session.content = next;
  }
});
