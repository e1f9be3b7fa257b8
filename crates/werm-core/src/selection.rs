//! Selection and copy over scrollback plus the visible screen.
//!
//! Lines are numbered over the combined buffer: `0..scrollback.len()` are
//! history rows (oldest first) followed by the screen rows (top first).
//! Rows flagged `wrapped` continue into the next line, so copying joins them
//! without a newline.

use crate::cell::Cell;
use crate::grid::{Grid, Row};
use crate::scrollback::Scrollback;
use crate::terminal::Terminal;

/// A cell position in the combined buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferPos {
    pub line: u32,
    pub col: u16,
}

impl BufferPos {
    #[must_use]
    pub const fn new(line: u32, col: u16) -> Self {
        Self { line, col }
    }

    /// A screen position translated into the combined buffer.
    #[must_use]
    pub fn from_screen(scrollback_lines: usize, row: u16, col: u16) -> Self {
        Self {
            line: scrollback_lines as u32 + u32::from(row),
            col,
        }
    }
}

/// Inclusive range of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: BufferPos,
    pub end: BufferPos,
}

/// Borrowed view of the combined buffer.
#[derive(Debug, Clone, Copy)]
struct Buffer<'a> {
    grid: &'a Grid,
    scrollback: &'a Scrollback,
}

impl<'a> Buffer<'a> {
    fn lines(self) -> u32 {
        (self.scrollback.len() + usize::from(self.grid.rows())) as u32
    }

    fn row(self, line: u32) -> Option<&'a Row> {
        let history = self.scrollback.len() as u32;
        if line < history {
            self.scrollback.get(line as usize)
        } else {
            u16::try_from(line - history)
                .ok()
                .and_then(|r| self.grid.row(r))
        }
    }

    fn cell(self, line: u32, col: u16) -> Option<&'a Cell> {
        self.row(line).and_then(|r| r.cell(col))
    }

    fn is_wrapped(self, line: u32) -> bool {
        self.row(line).is_some_and(Row::is_wrapped)
    }

    /// Step left off a continuation cell onto its wide lead.
    fn lead_col(self, line: u32, col: u16) -> u16 {
        match self.cell(line, col) {
            Some(cell) if col > 0 && cell.is_wide_continuation() => col - 1,
            _ => col,
        }
    }

    /// Last column covered by the character starting at `col`.
    fn char_end(self, line: u32, col: u16) -> u16 {
        match self.cell(line, col) {
            Some(cell) if cell.is_wide() => col.saturating_add(1).min(self.grid.cols().saturating_sub(1)),
            _ => col,
        }
    }

    fn class_at(self, line: u32, col: u16) -> CharClass {
        classify(self.cell(line, col).map_or(' ', Cell::content))
    }
}

impl Selection {
    #[must_use]
    pub const fn new(start: BufferPos, end: BufferPos) -> Self {
        Self { start, end }
    }

    /// Start before end.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.start <= self.end {
            self
        } else {
            Self {
                start: self.end,
                end: self.start,
            }
        }
    }

    /// One character; a wide character selects both columns.
    #[must_use]
    pub fn char_at(pos: BufferPos, grid: &Grid, scrollback: &Scrollback) -> Self {
        let buf = Buffer { grid, scrollback };
        let col = buf.lead_col(pos.line, pos.col.min(grid.cols().saturating_sub(1)));
        Self::new(
            BufferPos::new(pos.line, col),
            BufferPos::new(pos.line, buf.char_end(pos.line, col)),
        )
    }

    /// The whole logical line through `line`, following wrapped rows in
    /// both directions.
    #[must_use]
    pub fn line_at(line: u32, grid: &Grid, scrollback: &Scrollback) -> Self {
        let buf = Buffer { grid, scrollback };
        let line = line.min(buf.lines().saturating_sub(1));
        let mut first = line;
        while first > 0 && buf.is_wrapped(first - 1) {
            first -= 1;
        }
        let mut last = line;
        while last + 1 < buf.lines() && buf.is_wrapped(last) {
            last += 1;
        }
        Self::new(
            BufferPos::new(first, 0),
            BufferPos::new(last, grid.cols().saturating_sub(1)),
        )
    }

    /// A run of word characters (identifiers, paths, URLs) or of blanks
    /// around `pos`, within one row.
    #[must_use]
    pub fn word_at(pos: BufferPos, grid: &Grid, scrollback: &Scrollback) -> Self {
        let buf = Buffer { grid, scrollback };
        let cols = grid.cols();
        if cols == 0 || buf.lines() == 0 {
            return Self::new(pos, pos);
        }
        let line = pos.line.min(buf.lines() - 1);
        let col = buf.lead_col(line, pos.col.min(cols - 1));
        let class = buf.class_at(line, col);

        let mut start = col;
        while start > 0 {
            let probe = buf.lead_col(line, start - 1);
            if buf.class_at(line, probe) != class {
                break;
            }
            start = probe;
        }
        let mut end = buf.char_end(line, col);
        while end + 1 < cols {
            let probe = end + 1;
            if buf.class_at(line, probe) != class {
                break;
            }
            end = buf.char_end(line, probe);
        }
        Self::new(BufferPos::new(line, start), BufferPos::new(line, end))
    }

    /// Copy the selected text.
    ///
    /// Wide characters appear once, combining marks stay with their base,
    /// trailing blanks are trimmed per row, and a row that wraps into the
    /// next is joined without a newline.
    #[must_use]
    pub fn extract_text(&self, grid: &Grid, scrollback: &Scrollback) -> String {
        let buf = Buffer { grid, scrollback };
        let cols = grid.cols();
        if cols == 0 || buf.lines() == 0 {
            return String::new();
        }
        let sel = self.normalized();
        let last_line = buf.lines() - 1;
        let (first, last) = (sel.start.line.min(last_line), sel.end.line.min(last_line));

        let mut out = String::new();
        for line in first..=last {
            let start = if line == first { sel.start.col } else { 0 };
            let end = if line == last { sel.end.col.min(cols - 1) } else { cols - 1 };
            let wrapped = buf.is_wrapped(line);
            if let Some(row) = buf.row(line).filter(|_| start <= end) {
                if wrapped && line != last {
                    // Trailing blanks of a wrapped row belong to the line.
                    for cell in row.cells().iter().take(usize::from(end) + 1).skip(usize::from(start)) {
                        cell.push_text(&mut out);
                    }
                } else {
                    out.push_str(&row.text_range(start, end + 1));
                }
            }
            if line != last && !wrapped {
                out.push('\n');
            }
        }
        out
    }
}

impl Terminal {
    /// Selected text over this terminal's scrollback and active screen.
    #[must_use]
    pub fn selection_text(&self, selection: &Selection) -> String {
        selection.extract_text(self.active_screen().grid(), self.scrollback())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Word,
    Blank,
    Other,
}

fn classify(ch: char) -> CharClass {
    if ch.is_whitespace() {
        CharClass::Blank
    } else if ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/' | '\\' | ':' | '@' | '~') {
        CharClass::Word
    } else {
        CharClass::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fed(cols: u16, rows: u16, input: &str) -> Terminal {
        let mut t = Terminal::new(cols, rows).unwrap();
        t.feed(input.as_bytes());
        t
    }

    fn copy(t: &Terminal, start: (u32, u16), end: (u32, u16)) -> String {
        t.selection_text(&Selection::new(
            BufferPos::new(start.0, start.1),
            BufferPos::new(end.0, end.1),
        ))
    }

    #[test]
    fn hard_newlines_are_kept() {
        let t = fed(10, 3, "one\r\ntwo\r\nthree");
        assert_eq!(copy(&t, (0, 0), (2, 9)), "one\ntwo\nthree");
    }

    #[test]
    fn wrapped_rows_join_without_newline() {
        let t = fed(4, 3, "abcdefg\r\nxy");
        assert_eq!(copy(&t, (0, 0), (2, 3)), "abcdefg\nxy");
    }

    #[test]
    fn wrapped_row_keeps_trailing_blanks() {
        let t = fed(4, 3, "ab  cd");
        assert_eq!(copy(&t, (0, 0), (1, 3)), "ab  cd");
    }

    #[test]
    fn selection_spans_scrollback() {
        let t = fed(5, 2, "old\r\nmid\r\nnew");
        assert_eq!(t.scrollback().len(), 1);
        assert_eq!(copy(&t, (0, 0), (2, 4)), "old\nmid\nnew");
        // A reversed drag ends on the anchor cell.
        assert_eq!(copy(&t, (2, 0), (0, 0)), "old\nmid\nn");
    }

    #[test]
    fn wide_characters_copy_once() {
        let t = fed(10, 1, "a中b");
        assert_eq!(copy(&t, (0, 0), (0, 9)), "a中b");
        let sel = Selection::char_at(
            BufferPos::new(0, 2),
            t.active_screen().grid(),
            t.scrollback(),
        );
        assert_eq!((sel.start.col, sel.end.col), (1, 2));
    }

    #[test]
    fn line_at_follows_wrapping() {
        let t = fed(4, 4, "\r\nabcdefgh\r\nz");
        let sel = Selection::line_at(2, t.active_screen().grid(), t.scrollback());
        assert_eq!((sel.start.line, sel.end.line), (1, 2));
        assert_eq!(t.selection_text(&sel), "abcdefgh");
    }

    #[test]
    fn word_selection_covers_paths() {
        let t = fed(30, 1, "ls /usr/local/bin; echo");
        let sel = Selection::word_at(
            BufferPos::new(0, 6),
            t.active_screen().grid(),
            t.scrollback(),
        );
        assert_eq!(t.selection_text(&sel), "/usr/local/bin");
    }
}
