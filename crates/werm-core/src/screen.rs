//! One screen buffer: rows, cursor, pen, charsets and palette overrides.
//!
//! The terminal owns two of these (primary and alternate). Text operations
//! here never wrap: callers hand over text that starts at the cursor, and
//! anything pushed past the right margin is dropped. Writing into the last
//! column leaves the cursor there with its overflow flag set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Color, Pen};
use crate::charset::CharsetState;
use crate::cursor::{Cursor, SavedCursor};
use crate::grid::{Grid, Row};
use crate::palette::Rgb;
use crate::width::WidthPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    grid: Grid,
    pub cursor: Cursor,
    pub pen: Pen,
    pub charsets: CharsetState,
    /// DECSC slot. Each screen keeps its own.
    #[serde(default)]
    pub saved_cursor: Option<SavedCursor>,
    /// Palette entries this screen changed with OSC 4.
    #[serde(default)]
    pub palette_overrides: BTreeMap<u8, Rgb>,
    #[serde(default)]
    width_policy: WidthPolicy,
}

impl Screen {
    #[must_use]
    pub fn new(cols: u16, rows: u16, width_policy: WidthPolicy) -> Self {
        Self {
            grid: Grid::new(cols, rows),
            cursor: Cursor::default(),
            pen: Pen::default(),
            charsets: CharsetState::default(),
            saved_cursor: None,
            palette_overrides: BTreeMap::new(),
            width_policy,
        }
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.grid.cols()
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.grid.rows()
    }

    #[must_use]
    pub fn row(&self, row: u16) -> Option<&Row> {
        self.grid.row(row)
    }

    #[must_use]
    pub fn width_policy(&self) -> WidthPolicy {
        self.width_policy
    }

    pub(crate) fn set_width_policy(&mut self, policy: WidthPolicy) {
        self.width_policy = policy;
    }

    /// Background used for erased cells (BCE).
    #[must_use]
    pub fn erase_bg(&self) -> Color {
        self.pen.attrs.bg
    }

    fn cursor_row_mut(&mut self) -> Option<&mut Row> {
        self.grid.row_mut(self.cursor.row)
    }

    /// Cells for `text` written with the current pen. Zero-width code points
    /// join the preceding cell; leading ones are dropped.
    fn cells_for(&self, text: &str) -> (Vec<Cell>, u16) {
        let mut cells: Vec<Cell> = Vec::with_capacity(text.len());
        let mut width = 0u16;
        for ch in text.chars() {
            match self.width_policy.char_width(ch) {
                0 => {
                    if let Some(prev) = cells.iter_mut().rev().find(|c| !c.is_wide_continuation()) {
                        prev.push_combining(ch);
                    }
                }
                2 => {
                    let (lead, cont) = Cell::wide(ch, &self.pen);
                    cells.push(lead);
                    cells.push(cont);
                    width += 2;
                }
                _ => {
                    cells.push(Cell::styled(ch, &self.pen));
                    width += 1;
                }
            }
        }
        (cells, width)
    }

    /// Move the cursor right by `width` after a write. Reaching the margin
    /// parks the cursor on the last column with overflow set.
    fn advance_after_write(&mut self, width: u16) {
        let cols = self.cols();
        let end = self.cursor.col.saturating_add(width);
        if end >= cols {
            self.cursor.col = cols.saturating_sub(1);
            self.cursor.overflow = true;
        } else {
            self.cursor.col = end;
            self.cursor.overflow = false;
        }
    }

    // ── Text ────────────────────────────────────────────────────────

    /// Insert `text` at the cursor, shifting the rest of the row right.
    pub fn insert_text(&mut self, text: &str) {
        let (cells, width) = self.cells_for(text);
        if width == 0 {
            return;
        }
        let col = self.cursor.col;
        let bg = self.erase_bg();
        if let Some(row) = self.cursor_row_mut() {
            row.insert_cells(col, cells, bg);
        }
        self.advance_after_write(width);
    }

    /// Overwrite cells at the cursor with `text`.
    ///
    /// Returns `false` when the row already held exactly these cells, in
    /// which case only the cursor moves.
    pub fn overwrite_text(&mut self, text: &str) -> bool {
        let (cells, width) = self.cells_for(text);
        if width == 0 {
            return false;
        }
        let col = self.cursor.col;
        let bg = self.erase_bg();
        let changed = match self.cursor_row_mut() {
            Some(row) if row.matches_at(col, &cells) => false,
            Some(row) => {
                row.put_cells(col, &cells, bg);
                true
            }
            None => false,
        };
        self.advance_after_write(width);
        changed
    }

    /// Join a zero-width code point onto the character left of the cursor.
    /// Returns `false` when there is no such character.
    pub fn combine_with_previous(&mut self, mark: char) -> bool {
        let Cursor { row, col, overflow } = self.cursor;
        let mut target = if overflow {
            col
        } else if col > 0 {
            col - 1
        } else {
            return false;
        };
        let Some(r) = self.grid.row_mut(row) else {
            return false;
        };
        if target > 0 && r.cell(target).is_some_and(Cell::is_wide_continuation) {
            target -= 1;
        }
        match r.cell_mut(target) {
            Some(cell) => {
                cell.push_combining(mark);
                true
            }
            None => false,
        }
    }

    /// DCH: delete `count` cells at the cursor. Returns the number of
    /// columns actually deleted.
    pub fn delete_chars(&mut self, count: u16) -> u16 {
        let col = self.cursor.col;
        let bg = self.erase_bg();
        self.cursor.overflow = false;
        self.cursor_row_mut()
            .map_or(0, |row| row.delete_cells(col, count, bg))
    }

    /// ICH: insert `count` blanks at the cursor.
    pub fn insert_blank_chars(&mut self, count: u16) {
        let col = self.cursor.col;
        let bg = self.erase_bg();
        self.cursor.overflow = false;
        if let Some(row) = self.cursor_row_mut() {
            row.insert_blanks(col, count, bg);
        }
    }

    /// ECH: blank `count` cells from the cursor without shifting.
    pub fn erase_chars(&mut self, count: u16) {
        let col = self.cursor.col;
        let bg = self.erase_bg();
        self.cursor.overflow = false;
        if let Some(row) = self.cursor_row_mut() {
            row.erase(col, col.saturating_add(count), bg);
        }
    }

    /// Erase the cursor row entirely.
    pub fn clear_row(&mut self) {
        let bg = self.erase_bg();
        if let Some(row) = self.cursor_row_mut() {
            row.clear(bg);
        }
    }

    // ── Erase ───────────────────────────────────────────────────────

    /// EL: 0 = to end, 1 = to start (inclusive), 2 = whole line.
    pub fn erase_in_line(&mut self, mode: u16) {
        let Cursor { col, .. } = self.cursor;
        let cols = self.cols();
        let bg = self.erase_bg();
        self.cursor.overflow = false;
        let Some(row) = self.cursor_row_mut() else {
            return;
        };
        match mode {
            0 => {
                row.erase(col, cols, bg);
                row.set_wrapped(false);
            }
            1 => row.erase(0, col.saturating_add(1), bg),
            2 => row.clear(bg),
            _ => tracing::trace!(mode, "unknown EL mode"),
        }
    }

    /// ED 0/1/2 on this screen's rows.
    pub fn erase_in_display(&mut self, mode: u16) {
        let Cursor { row, col, .. } = self.cursor;
        let bg = self.erase_bg();
        self.cursor.overflow = false;
        match mode {
            0 => self.grid.erase_below(row, col, bg),
            1 => self.grid.erase_above(row, col, bg),
            2 => self.grid.erase_all(bg),
            _ => tracing::trace!(mode, "unknown ED mode"),
        }
    }

    // ── Cursor ──────────────────────────────────────────────────────

    /// Move the cursor, clamped to the screen; clears overflow.
    pub fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor.row = row;
        self.cursor.col = col;
        self.cursor.clamp(self.rows(), self.cols());
    }

    /// Make every row exactly as wide as the screen and pull the cursor
    /// inside it.
    pub fn clip_to_column_count(&mut self) {
        let cols = self.cols();
        self.grid.set_cols(cols);
        if self.cursor.col >= cols {
            self.cursor.col = cols.saturating_sub(1);
            self.cursor.overflow = false;
        }
    }

    /// Change the column count (no reflow).
    pub(crate) fn set_cols(&mut self, cols: u16) {
        self.grid.set_cols(cols);
        self.clip_to_column_count();
    }

    /// Reset to a blank screen of the same size with default state.
    pub fn reset(&mut self) {
        *self = Self::new(self.cols(), self.rows(), self.width_policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{SgrAttrs, SgrFlags};

    fn screen(cols: u16, rows: u16) -> Screen {
        Screen::new(cols, rows, WidthPolicy::Standard)
    }

    fn row_text(s: &Screen, row: u16) -> String {
        s.row(row).map(Row::text).unwrap_or_default()
    }

    fn bold() -> Pen {
        Pen {
            attrs: SgrAttrs {
                flags: SgrFlags::BOLD,
                ..SgrAttrs::default()
            },
            hyperlink: None,
        }
    }

    #[test]
    fn overwrite_advances_cursor() {
        let mut s = screen(10, 2);
        assert!(s.overwrite_text("hello"));
        assert_eq!(row_text(&s, 0), "hello");
        assert_eq!((s.cursor.col, s.cursor.overflow), (5, false));
    }

    #[test]
    fn writing_last_column_sets_overflow() {
        let mut s = screen(5, 1);
        s.overwrite_text("abcde");
        assert_eq!((s.cursor.col, s.cursor.overflow), (4, true));
    }

    #[test]
    fn overwrite_with_identical_cells_is_a_noop() {
        let mut s = screen(10, 1);
        s.overwrite_text("abc");
        s.set_cursor(0, 0);
        assert!(!s.overwrite_text("abc"));
        assert_eq!(s.cursor.col, 3);
        s.set_cursor(0, 0);
        s.pen = bold();
        assert!(s.overwrite_text("abc"));
    }

    #[test]
    fn insert_shifts_right_and_drops_past_margin() {
        let mut s = screen(6, 1);
        s.overwrite_text("abcdef");
        s.set_cursor(0, 1);
        s.insert_text("XY");
        assert_eq!(row_text(&s, 0), "aXYbcd");
        assert_eq!(s.cursor.col, 3);
    }

    #[test]
    fn wide_text_occupies_two_columns() {
        let mut s = screen(6, 1);
        s.overwrite_text("a中b");
        assert_eq!(row_text(&s, 0), "a中b");
        assert_eq!(s.cursor.col, 4);
        let row = s.row(0).unwrap();
        assert!(row.cell(1).unwrap().is_wide());
        assert!(row.cell(2).unwrap().is_wide_continuation());
    }

    #[test]
    fn combining_mark_joins_previous_cell() {
        let mut s = screen(6, 1);
        s.overwrite_text("e");
        assert!(s.combine_with_previous('\u{0301}'));
        assert_eq!(row_text(&s, 0), "e\u{0301}");
        s.overwrite_text("中");
        assert!(s.combine_with_previous('\u{FE0F}'));
        assert_eq!(s.row(0).unwrap().cell(1).unwrap().combining(), Some("\u{FE0F}"));
        s.set_cursor(0, 0);
        assert!(!s.combine_with_previous('\u{0301}'));
    }

    #[test]
    fn combining_at_overflow_targets_last_column() {
        let mut s = screen(3, 1);
        s.overwrite_text("abc");
        assert!(s.cursor.overflow);
        s.combine_with_previous('\u{0308}');
        assert_eq!(row_text(&s, 0), "abc\u{0308}");
    }

    #[test]
    fn delete_chars_reports_actual_count() {
        let mut s = screen(6, 1);
        s.overwrite_text("abcdef");
        s.set_cursor(0, 4);
        assert_eq!(s.delete_chars(10), 2);
        assert_eq!(row_text(&s, 0), "abcd");
    }

    #[test]
    fn erase_uses_pen_background() {
        let mut s = screen(4, 1);
        s.overwrite_text("abcd");
        s.pen.attrs.bg = Color::Indexed(4);
        s.set_cursor(0, 2);
        s.erase_in_line(0);
        let row = s.row(0).unwrap();
        assert_eq!(row.cell(3).unwrap().attrs.bg, Color::Indexed(4));
        assert_eq!(row.cell(1).unwrap().content(), 'b');
    }

    #[test]
    fn erase_in_line_modes() {
        let mut s = screen(5, 1);
        s.overwrite_text("abcde");
        s.set_cursor(0, 2);
        s.erase_in_line(1);
        assert_eq!(row_text(&s, 0), "   de");
        s.erase_in_line(2);
        assert_eq!(row_text(&s, 0), "");
    }

    #[test]
    fn set_cursor_clamps() {
        let mut s = screen(10, 5);
        s.set_cursor(50, 50);
        assert_eq!((s.cursor.row, s.cursor.col), (4, 9));
    }

    #[test]
    fn clip_to_column_count_after_narrowing() {
        let mut s = screen(10, 2);
        s.set_cursor(1, 9);
        s.set_cols(4);
        assert_eq!(s.cursor.col, 3);
        assert!(s.grid().is_consistent());
    }

    #[test]
    fn serde_round_trip() {
        let mut s = screen(4, 2);
        s.pen = bold();
        s.overwrite_text("hi");
        s.palette_overrides.insert(1, Rgb::new(1, 2, 3));
        let json = serde_json::to_string(&s).unwrap();
        let back: Screen = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
