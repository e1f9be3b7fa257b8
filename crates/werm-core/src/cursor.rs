//! Cursor position, overflow state, shape, and DECSC snapshots.

use serde::{Deserialize, Serialize};

use crate::cell::Pen;
use crate::charset::CharsetState;

/// Cursor within one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    /// Row, 0-indexed from the top of the screen.
    pub row: u16,
    /// Column, 0-indexed from the left.
    pub col: u16,
    /// The last write filled the final column; the next printable character
    /// wraps (or overwrites, with wraparound off) instead of advancing.
    #[serde(default)]
    pub overflow: bool,
}

impl Cursor {
    #[must_use]
    pub fn at(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            overflow: false,
        }
    }

    /// Clamp the position into a `rows` x `cols` screen.
    pub fn clamp(&mut self, rows: u16, cols: u16) {
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(cols.saturating_sub(1));
        self.overflow = false;
    }
}

/// DECSCUSR cursor shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Visual cursor style set by `CSI Ps SP q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorStyle {
    pub shape: CursorShape,
    pub blink: bool,
}

impl Default for CursorStyle {
    fn default() -> Self {
        Self {
            shape: CursorShape::Block,
            blink: true,
        }
    }
}

impl CursorStyle {
    /// Decode a DECSCUSR parameter. Unknown values select the default.
    #[must_use]
    pub fn from_decscusr(ps: u16) -> Self {
        let (shape, blink) = match ps {
            2 => (CursorShape::Block, false),
            3 => (CursorShape::Underline, true),
            4 => (CursorShape::Underline, false),
            5 => (CursorShape::Bar, true),
            6 => (CursorShape::Bar, false),
            _ => (CursorShape::Block, true),
        };
        Self { shape, blink }
    }
}

/// State captured by DECSC (`ESC 7`) and restored by DECRC (`ESC 8`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedCursor {
    pub row: u16,
    pub col: u16,
    pub overflow: bool,
    pub pen: Pen,
    pub charsets: CharsetState,
    pub origin_mode: bool,
}

impl SavedCursor {
    #[must_use]
    pub fn capture(cursor: Cursor, pen: &Pen, charsets: CharsetState, origin_mode: bool) -> Self {
        Self {
            row: cursor.row,
            col: cursor.col,
            overflow: cursor.overflow,
            pen: pen.clone(),
            charsets,
            origin_mode,
        }
    }

    /// The saved position, clamped into a `rows` x `cols` screen. The
    /// overflow flag survives only when the position did not move.
    #[must_use]
    pub fn cursor_within(&self, rows: u16, cols: u16) -> Cursor {
        let mut cursor = Cursor::at(self.row, self.col);
        cursor.clamp(rows, cols);
        cursor.overflow = self.overflow && cursor.row == self.row && cursor.col == self.col;
        cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_pulls_cursor_inside_and_drops_overflow() {
        let mut c = Cursor {
            row: 30,
            col: 100,
            overflow: true,
        };
        c.clamp(24, 80);
        assert_eq!((c.row, c.col, c.overflow), (23, 79, false));
    }

    #[test]
    fn decscusr_decoding() {
        assert_eq!(CursorStyle::from_decscusr(0), CursorStyle::default());
        assert_eq!(
            CursorStyle::from_decscusr(4),
            CursorStyle {
                shape: CursorShape::Underline,
                blink: false
            }
        );
        assert_eq!(CursorStyle::from_decscusr(5).shape, CursorShape::Bar);
        assert_eq!(CursorStyle::from_decscusr(99), CursorStyle::default());
    }

    #[test]
    fn saved_cursor_restores_exactly_when_screen_unchanged() {
        let saved = SavedCursor::capture(
            Cursor {
                row: 5,
                col: 79,
                overflow: true,
            },
            &Pen::default(),
            CharsetState::default(),
            false,
        );
        let c = saved.cursor_within(24, 80);
        assert_eq!((c.row, c.col, c.overflow), (5, 79, true));
    }

    #[test]
    fn saved_cursor_clamps_after_shrink() {
        let saved = SavedCursor::capture(Cursor::at(20, 70), &Pen::default(), CharsetState::default(), false);
        let c = saved.cursor_within(10, 40);
        assert_eq!((c.row, c.col), (9, 39));
    }
}
