//! Shared data types for the vision pipeline: pixel positions, bounding
//! boxes and their type flags. Mirrors `Position`/`BoundingBox` from the
//! original tracker, kept as plain `Copy` structs since they are produced
//! and compared by the million during a single frame's Phase A/B/E.

use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;
use utoipa::ToSchema;

/// A pixel coordinate inside a frame. `row` grows downward, `col` rightward,
/// matching `opencv::core::Mat` row-major indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub fn new(row: i32, col: i32) -> Self {
        Position { row, col }
    }
}

/// Bit flags attached to a [`BoundingBox`]. Combined by set union, as spec'd.
/// A hand-rolled `u8` bitset: four bits do not warrant pulling in `bitflags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[schema(value_type = Vec<String>)]
pub struct TypeFlags(u8);

impl TypeFlags {
    pub const NORMAL: TypeFlags = TypeFlags(0b0000);
    pub const PUSHED_OUT: TypeFlags = TypeFlags(0b0001);
    pub const PUSHER: TypeFlags = TypeFlags(0b0010);
    pub const FILLED: TypeFlags = TypeFlags(0b0100);

    pub fn contains(self, other: TypeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Names of the set bits, for display/serialization; `["Normal"]` when none are set.
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(TypeFlags::PUSHED_OUT) {
            names.push("PushedOut");
        }
        if self.contains(TypeFlags::PUSHER) {
            names.push("Pusher");
        }
        if self.contains(TypeFlags::FILLED) {
            names.push("Filled");
        }
        if names.is_empty() {
            names.push("Normal");
        }
        names
    }
}

impl Serialize for TypeFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.names().serialize(serializer)
    }
}

impl BitOr for TypeFlags {
    type Output = TypeFlags;
    fn bitor(self, rhs: TypeFlags) -> TypeFlags {
        TypeFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypeFlags {
    fn bitor_assign(&mut self, rhs: TypeFlags) {
        self.0 |= rhs.0;
    }
}

/// Mean BGR color of a set of pixels (u8 per channel, as read off a frame).
pub type MeanColor = (u8, u8, u8);

/// A labeled region in one frame: the tight axis-aligned rectangle enclosing
/// a tracked object's accepted pixels, plus its type flags and mean color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct BoundingBox {
    pub min_row: i32,
    pub max_row: i32,
    pub min_col: i32,
    pub max_col: i32,
    pub frame_index: u64,
    pub type_flags: TypeFlags,
    #[schema(value_type = Vec<u8>)]
    pub mean_color: MeanColor,
}

impl BoundingBox {
    pub fn new(min_row: i32, max_row: i32, min_col: i32, max_col: i32, frame_index: u64, mean_color: MeanColor) -> Self {
        BoundingBox {
            min_row,
            max_row,
            min_col,
            max_col,
            frame_index,
            type_flags: TypeFlags::NORMAL,
            mean_color,
        }
    }

    pub fn width(&self) -> i32 {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> i32 {
        self.max_row - self.min_row + 1
    }

    /// Linear interpolation between two boxes at step `i` of `n`, used to
    /// fill history gaps left by a push-out/dispose interval (spec §4.6
    /// Phase F rule 1, §9 design notes). The interpolated box is tagged
    /// `Filled` by the caller.
    pub fn lerp(start: &BoundingBox, end: &BoundingBox, i: i32, n: i32, frame_index: u64) -> BoundingBox {
        let lerp_field = |a: i32, b: i32| -> i32 { ((n - i - 1) * a + (i + 1) * b) / n };
        BoundingBox {
            min_row: lerp_field(start.min_row, end.min_row),
            max_row: lerp_field(start.max_row, end.max_row),
            min_col: lerp_field(start.min_col, end.min_col),
            max_col: lerp_field(start.max_col, end.max_col),
            frame_index,
            type_flags: TypeFlags::FILLED,
            mean_color: start.mean_color,
        }
    }

    /// Expands `(min_row, max_row, min_col, max_col)` to also enclose `(row, col)`.
    pub fn grow_to_include(&mut self, row: i32, col: i32) {
        if row < self.min_row {
            self.min_row = row;
        }
        if row > self.max_row {
            self.max_row = row;
        }
        if col < self.min_col {
            self.min_col = col;
        }
        if col > self.max_col {
            self.max_col = col;
        }
    }
}

/// A flat row-major boolean mask the size of one frame. Shared between the
/// field/terrain/foreground stages so each can consume the previous one's
/// output without round-tripping through an `opencv::core::Mat`.
#[derive(Debug, Clone)]
pub struct Mask {
    pub rows: i32,
    pub cols: i32,
    flags: Vec<bool>,
}

impl Mask {
    pub fn new(rows: i32, cols: i32) -> Self {
        Mask {
            rows,
            cols,
            flags: vec![false; (rows as usize) * (cols as usize)],
        }
    }

    #[inline]
    fn index(&self, row: i32, col: i32) -> usize {
        (row as usize) * (self.cols as usize) + (col as usize)
    }

    #[inline]
    pub fn get(&self, row: i32, col: i32) -> bool {
        self.flags[self.index(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: i32, col: i32, value: bool) {
        let idx = self.index(row, col);
        self.flags[idx] = value;
    }

    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && row < self.rows && col >= 0 && col < self.cols
    }

    pub fn count_set(&self) -> usize {
        self.flags.iter().filter(|v| **v).count()
    }
}

/// Computes the tight bounding rectangle of a set of positions. Panics on an
/// empty slice -- callers must special-case the empty-object case (spec §8
/// boundary: zero-position objects never reach this, they report
/// `mean_position = (-1, -1)` directly).
pub fn bounding_rect(positions: &[Position]) -> (i32, i32, i32, i32) {
    let mut min_row = positions[0].row;
    let mut max_row = positions[0].row;
    let mut min_col = positions[0].col;
    let mut max_col = positions[0].col;
    for p in &positions[1..] {
        if p.row < min_row {
            min_row = p.row;
        }
        if p.row > max_row {
            max_row = p.row;
        }
        if p.col < min_col {
            min_col = p.col;
        }
        if p.col > max_col {
            max_col = p.col;
        }
    }
    (min_row, max_row, min_col, max_col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_flags_union() {
        let mut flags = TypeFlags::NORMAL;
        flags |= TypeFlags::PUSHED_OUT;
        flags |= TypeFlags::FILLED;
        assert!(flags.contains(TypeFlags::PUSHED_OUT));
        assert!(flags.contains(TypeFlags::FILLED));
        assert!(!flags.contains(TypeFlags::PUSHER));
    }

    #[test]
    fn bounding_box_lerp_endpoints() {
        let start = BoundingBox::new(0, 10, 0, 10, 0, (0, 0, 0));
        let end = BoundingBox::new(100, 110, 100, 110, 10, (0, 0, 0));
        let mid = BoundingBox::lerp(&start, &end, 4, 10, 5);
        assert!(mid.type_flags.contains(TypeFlags::FILLED));
        assert!(mid.min_row > start.min_row && mid.min_row < end.min_row);
    }

    #[test]
    fn bounding_rect_tight() {
        let positions = vec![Position::new(5, 5), Position::new(2, 9), Position::new(8, 1)];
        let (min_row, max_row, min_col, max_col) = bounding_rect(&positions);
        assert_eq!((min_row, max_row, min_col, max_col), (2, 8, 1, 9));
    }
}
