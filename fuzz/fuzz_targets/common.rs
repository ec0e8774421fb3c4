use the_draft::{
  BlockType,
  ContentState,
  EditError,
  EntityData,
  EntityKey,
  EntityMutability,
  InlineStyle,
  Modifier,
  ModifierConfig,
  RemovalDirection,
  SelectionState,
  StyleSet,
  config::Validation,
  fragment::get_content_state_fragment,
};

const MAX_INITIAL_BYTES: usize = 2 * 1024;
const MAX_OPS: usize = 64;
const MAX_INSERT_BYTES: usize = 32;

const STYLES: &[&str] = &["BOLD", "ITALIC", "CODE"];
const BLOCK_TYPES: &[&str] = &["unstyled", "header-one", "blockquote", "code-block"];

#[derive(Debug, Clone, Copy)]
pub struct Point {
  block:  u16,
  offset: u16,
}

#[derive(Debug, Clone)]
pub enum EditOp {
  InsertText { at: Point, text: Vec<u8>, style: u8 },
  ReplaceText { anchor: Point, focus: Point, text: Vec<u8> },
  RemoveRange { anchor: Point, focus: Point, forward: bool },
  SplitBlock { anchor: Point, focus: Point },
  ToggleStyle { anchor: Point, focus: Point, style: u8, remove: bool },
  SetBlockType { anchor: Point, focus: Point, kind: u8 },
  ApplyEntity { anchor: Point, focus: Point, mutability: u8 },
  MoveText { anchor: Point, focus: Point, target: Point },
  Paste { anchor: Point, focus: Point, target: Point },
}

pub struct FuzzSession {
  pub modifier: Modifier,
  pub content:  ContentState,
  pub ops:      Vec<EditOp>,
}

pub fn session_from_bytes(data: &[u8]) -> FuzzSession {
  let mut cursor = ByteCursor::new(data);
  let initial_len = cursor.next_usize(MAX_INITIAL_BYTES);
  let initial = lossy_text(cursor.next_bytes(initial_len));
  let op_count = cursor.next_usize(MAX_OPS);
  let ops = (0..op_count).map(|_| decode_op(&mut cursor)).collect();

  FuzzSession {
    modifier: Modifier::new(ModifierConfig {
      validate: Validation::Always,
      ..ModifierConfig::default()
    }),
    content: ContentState::from_text(&initial),
    ops,
  }
}

/// Applies `op` and returns the next snapshot. Errors are precondition
/// failures the op's random coordinates can legitimately trigger.
pub fn apply_op(
  modifier: &Modifier,
  content: &ContentState,
  op: &EditOp,
) -> Result<ContentState, EditError> {
  match op {
    EditOp::InsertText { at, text, style } => {
      let caret = resolve(content, *at, *at)?;
      let style: StyleSet = match style_for(*style) {
        Some(name) => [name].into_iter().collect(),
        None => style_before(content, &caret),
      };
      modifier.insert_text(content, &caret, &lossy_text(text), &style, None)
    },
    EditOp::ReplaceText {
      anchor,
      focus,
      text,
    } => {
      let range = resolve(content, *anchor, *focus)?;
      modifier.replace_text(content, &range, &lossy_text(text), &StyleSet::new(), None)
    },
    EditOp::RemoveRange {
      anchor,
      focus,
      forward,
    } => {
      let range = resolve(content, *anchor, *focus)?;
      let direction = if *forward {
        RemovalDirection::Forward
      } else {
        RemovalDirection::Backward
      };
      modifier.remove_range(content, &range, direction)
    },
    EditOp::SplitBlock { anchor, focus } => {
      let range = resolve(content, *anchor, *focus)?;
      modifier.split_block(content, &range)
    },
    EditOp::ToggleStyle {
      anchor,
      focus,
      style,
      remove,
    } => {
      let range = resolve(content, *anchor, *focus)?;
      let style = InlineStyle::from(STYLES[*style as usize % STYLES.len()]);
      if *remove {
        modifier.remove_inline_style(content, &range, &style)
      } else {
        modifier.apply_inline_style(content, &range, &style)
      }
    },
    EditOp::SetBlockType {
      anchor,
      focus,
      kind,
    } => {
      let range = resolve(content, *anchor, *focus)?;
      let kind = BlockType::from(BLOCK_TYPES[*kind as usize % BLOCK_TYPES.len()]);
      modifier.set_block_type(content, &range, &kind)
    },
    EditOp::ApplyEntity {
      anchor,
      focus,
      mutability,
    } => {
      let range = resolve(content, *anchor, *focus)?;
      let (content, entity) = match mutability % 4 {
        0 => (content.clone(), None),
        1 => create(content, EntityMutability::Mutable),
        2 => create(content, EntityMutability::Immutable),
        _ => create(content, EntityMutability::Segmented),
      };
      modifier.apply_entity(&content, &range, entity)
    },
    EditOp::MoveText {
      anchor,
      focus,
      target,
    } => {
      let removal = resolve(content, *anchor, *focus)?;
      let removed = modifier.remove_range(content, &removal, RemovalDirection::Backward)?;
      let target = resolve(&removed, *target, *target)?;
      modifier.move_text(content, &removal, &target)
    },
    EditOp::Paste {
      anchor,
      focus,
      target,
    } => {
      let source = resolve(content, *anchor, *focus)?;
      let fragment = get_content_state_fragment(content, &source)?;
      let target = resolve(content, *target, *target)?;
      modifier.replace_with_fragment(content, &target, &fragment)
    },
  }
}

fn create(
  content: &ContentState,
  mutability: EntityMutability,
) -> (ContentState, Option<EntityKey>) {
  let (content, key) = content.create_entity("FUZZ", mutability, EntityData::new());
  (content, Some(key))
}

fn style_for(style: u8) -> Option<&'static str> {
  STYLES.get(style as usize).copied()
}

/// The style of the character left of `caret`, the way typing continues it.
fn style_before(content: &ContentState, caret: &SelectionState) -> StyleSet {
  caret
    .start_offset()
    .checked_sub(1)
    .and_then(|idx| content.block_for_key(caret.start_key())?.style_at(idx))
    .cloned()
    .unwrap_or_default()
}

/// Folds two raw points into a valid selection of `content`.
fn resolve(
  content: &ContentState,
  anchor: Point,
  focus: Point,
) -> Result<SelectionState, EditError> {
  let point = |raw: Point| {
    let blocks = content.block_map();
    let idx = raw.block as usize % blocks.len();
    let block = blocks.get_index(idx).unwrap_or_else(|| content.first_block());
    let offset = raw.offset as usize % (block.len() + 1);
    (block.key().clone(), offset)
  };
  let (anchor_key, anchor_offset) = point(anchor);
  let (focus_key, focus_offset) = point(focus);
  content.selection_between(&anchor_key, anchor_offset, &focus_key, focus_offset)
}

fn lossy_text(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into_owned()
}

fn decode_op(cursor: &mut ByteCursor<'_>) -> EditOp {
  let tag = cursor.next_u8();
  let anchor = cursor.next_point();
  let focus = cursor.next_point();
  match tag % 9 {
    0 => {
      let len = cursor.next_usize(MAX_INSERT_BYTES);
      EditOp::InsertText {
        at:    anchor,
        text:  cursor.next_bytes(len).to_vec(),
        style: cursor.next_u8(),
      }
    },
    1 => {
      let len = cursor.next_usize(MAX_INSERT_BYTES);
      EditOp::ReplaceText {
        anchor,
        focus,
        text: cursor.next_bytes(len).to_vec(),
      }
    },
    2 => EditOp::RemoveRange {
      anchor,
      focus,
      forward: cursor.next_u8() & 1 == 1,
    },
    3 => EditOp::SplitBlock { anchor, focus },
    4 => EditOp::ToggleStyle {
      anchor,
      focus,
      style: cursor.next_u8(),
      remove: cursor.next_u8() & 1 == 1,
    },
    5 => EditOp::SetBlockType {
      anchor,
      focus,
      kind: cursor.next_u8(),
    },
    6 => EditOp::ApplyEntity {
      anchor,
      focus,
      mutability: cursor.next_u8(),
    },
    7 => EditOp::MoveText {
      anchor,
      focus,
      target: cursor.next_point(),
    },
    _ => EditOp::Paste {
      anchor,
      focus,
      target: cursor.next_point(),
    },
  }
}

struct ByteCursor<'a> {
  data: &'a [u8],
  pos:  usize,
}

impl<'a> ByteCursor<'a> {
  fn new(data: &'a [u8]) -> Self {
    Self { data, pos: 0 }
  }

  fn next_u8(&mut self) -> u8 {
    let value = self.data.get(self.pos).copied().unwrap_or(0);
    self.pos = self.pos.saturating_add(1);
    value
  }

  fn next_u16(&mut self) -> u16 {
    let lo = self.next_u8() as u16;
    let hi = self.next_u8() as u16;
    lo | (hi << 8)
  }

  fn next_usize(&mut self, max: usize) -> usize {
    if max == 0 {
      return 0;
    }
    (self.next_u16() as usize) % (max + 1)
  }

  fn next_point(&mut self) -> Point {
    Point {
      block:  self.next_u16(),
      offset: self.next_u16(),
    }
  }

  fn next_bytes(&mut self, len: usize) -> &'a [u8] {
    let start = self.pos.min(self.data.len());
    let end = start.saturating_add(len).min(self.data.len());
    self.pos = end;
    &self.data[start..end]
  }
}
