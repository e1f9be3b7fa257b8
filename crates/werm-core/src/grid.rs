//! Screen rows and the row grid.
//!
//! A [`Row`] always holds exactly one cell per column. Wide characters are
//! kept paired by every mutator here: whenever an edit would leave one half
//! of a wide character behind, the surviving half is blanked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Color, SgrAttrs};

/// A run of adjacent cells sharing one style, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub start_col: u16,
    /// Width of the run in columns.
    pub width: u16,
    pub text: String,
    pub attrs: SgrAttrs,
    pub hyperlink: Option<Arc<str>>,
    /// A wide character always forms a run of its own.
    pub wide: bool,
}

/// One line of the screen (or of scrollback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    cells: Vec<Cell>,
    /// The line overflowed: it logically continues on the next row.
    #[serde(default)]
    wrapped: bool,
}

impl Row {
    #[must_use]
    pub fn new(cols: u16) -> Self {
        Self::filled(cols, Color::Default)
    }

    /// A row of blanks carrying background `bg`.
    #[must_use]
    pub fn filled(cols: u16, bg: Color) -> Self {
        Self {
            cells: vec![Cell::blank(bg); usize::from(cols)],
            wrapped: false,
        }
    }

    /// Build a row from cells. Used by tests and snapshot restore.
    #[must_use]
    pub fn from_cells(cells: Vec<Cell>, wrapped: bool) -> Self {
        Self { cells, wrapped }
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, col: u16) -> Option<&Cell> {
        self.cells.get(usize::from(col))
    }

    pub(crate) fn cell_mut(&mut self, col: u16) -> Option<&mut Cell> {
        self.cells.get_mut(usize::from(col))
    }

    #[must_use]
    pub fn len(&self) -> u16 {
        self.cells.len() as u16
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn set_wrapped(&mut self, wrapped: bool) {
        self.wrapped = wrapped;
    }

    /// Whether every cell is an untouched blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_blank)
    }

    /// Row text with trailing spaces trimmed.
    #[must_use]
    pub fn text(&self) -> String {
        self.text_range(0, self.len())
    }

    /// Text of columns `[start, end)`, trailing spaces trimmed.
    #[must_use]
    pub fn text_range(&self, start: u16, end: u16) -> String {
        let end = usize::from(end).min(self.cells.len());
        let start = usize::from(start).min(end);
        let mut out = String::new();
        for cell in &self.cells[start..end] {
            cell.push_text(&mut out);
        }
        let trimmed = out.trim_end_matches(' ').len();
        out.truncate(trimmed);
        out
    }

    /// Coalesce cells into styled runs for rendering.
    #[must_use]
    pub fn runs(&self) -> Vec<StyledRun> {
        let mut runs: Vec<StyledRun> = Vec::new();
        for (col, cell) in self.cells.iter().enumerate() {
            if cell.is_wide_continuation() {
                continue;
            }
            let wide = cell.is_wide();
            if !wide
                && let Some(last) = runs.last_mut()
                && !last.wide
                && last.attrs == cell.attrs
                && last.hyperlink == cell.hyperlink
            {
                cell.push_text(&mut last.text);
                last.width += 1;
                continue;
            }
            let mut text = String::new();
            cell.push_text(&mut text);
            runs.push(StyledRun {
                start_col: col as u16,
                width: if wide { 2 } else { 1 },
                text,
                attrs: cell.attrs,
                hyperlink: cell.hyperlink.clone(),
                wide,
            });
        }
        runs
    }

    // ── Wide-character fixups ───────────────────────────────────────

    /// If `col` holds a continuation, its lead lies outside the edit: blank
    /// both halves.
    fn split_left(&mut self, col: usize, bg: Color) {
        if col > 0 && col < self.cells.len() && self.cells[col].is_wide_continuation() {
            self.cells[col - 1].erase(bg);
            self.cells[col].erase(bg);
        }
    }

    /// If `end` holds a continuation, its lead is inside the edit: blank it.
    fn split_right(&mut self, end: usize, bg: Color) {
        if end < self.cells.len() && self.cells[end].is_wide_continuation() {
            self.cells[end].erase(bg);
        }
    }

    /// A lead in the last column has lost its continuation.
    fn trim_dangling_lead(&mut self, bg: Color) {
        if let Some(last) = self.cells.last_mut()
            && last.is_wide()
        {
            last.erase(bg);
        }
    }

    // ── Edits ───────────────────────────────────────────────────────

    /// Erase columns `[start, end)` to blanks with background `bg`.
    pub fn erase(&mut self, start: u16, end: u16, bg: Color) {
        let end = usize::from(end).min(self.cells.len());
        let start = usize::from(start).min(end);
        if start == end {
            return;
        }
        self.split_left(start, bg);
        self.split_right(end, bg);
        for cell in &mut self.cells[start..end] {
            cell.erase(bg);
        }
    }

    /// Erase the whole row and drop its overflow marker.
    pub fn clear(&mut self, bg: Color) {
        for cell in &mut self.cells {
            cell.erase(bg);
        }
        self.wrapped = false;
    }

    /// Overwrite cells starting at `col`. Cells past the margin are dropped.
    pub fn put_cells(&mut self, col: u16, new_cells: &[Cell], bg: Color) {
        let col = usize::from(col);
        if col >= self.cells.len() {
            return;
        }
        let n = new_cells.len().min(self.cells.len() - col);
        if n == 0 {
            return;
        }
        self.split_left(col, bg);
        self.split_right(col + n, bg);
        self.cells[col..col + n].clone_from_slice(&new_cells[..n]);
        if self.cells[col + n - 1].is_wide() {
            self.cells[col + n - 1].erase(bg);
        }
    }

    /// Insert cells at `col`, shifting the rest right. Cells pushed past the
    /// margin are lost.
    pub fn insert_cells(&mut self, col: u16, new_cells: Vec<Cell>, bg: Color) {
        let col = usize::from(col);
        let width = self.cells.len();
        if col >= width || new_cells.is_empty() {
            return;
        }
        self.split_left(col, bg);
        self.cells.splice(col..col, new_cells);
        self.cells.truncate(width);
        self.trim_dangling_lead(bg);
    }

    /// ICH: insert `count` blanks at `col`.
    pub fn insert_blanks(&mut self, col: u16, count: u16, bg: Color) {
        let n = count.min(self.len().saturating_sub(col));
        if n == 0 {
            return;
        }
        self.insert_cells(col, vec![Cell::blank(bg); usize::from(n)], bg);
    }

    /// DCH: delete `count` cells at `col`, shifting the rest of the row
    /// left and filling the right margin with blanks.
    ///
    /// A wide character split by either edge of the deleted span leaves a
    /// single blank column behind. Returns the number of columns deleted.
    pub fn delete_cells(&mut self, col: u16, count: u16, bg: Color) -> u16 {
        let c = usize::from(col);
        let width = self.cells.len();
        if c >= width || count == 0 {
            return 0;
        }
        let n = usize::from(count).min(width - c);
        if c > 0 && self.cells[c].is_wide_continuation() {
            self.cells[c - 1].erase(bg);
        }
        self.split_right(c + n, bg);
        self.cells.drain(c..c + n);
        self.cells.resize(width, Cell::blank(bg));
        n as u16
    }

    /// Whether `cells` already occupy the row at `col` exactly.
    #[must_use]
    pub fn matches_at(&self, col: u16, cells: &[Cell]) -> bool {
        let col = usize::from(col);
        self.cells
            .get(col..col + cells.len())
            .is_some_and(|existing| existing == cells)
    }

    /// Truncate or pad to `cols` columns without reflowing content.
    pub fn set_width(&mut self, cols: u16) {
        let cols = usize::from(cols);
        if cols == self.cells.len() {
            return;
        }
        if cols < self.cells.len() {
            self.cells.truncate(cols);
            self.trim_dangling_lead(Color::Default);
        } else {
            self.cells.resize(cols, Cell::default());
        }
    }
}

/// The on-screen rows of one screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    rows: Vec<Row>,
    cols: u16,
}

impl Grid {
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            cols,
        }
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows.len() as u16
    }

    #[must_use]
    pub fn row(&self, row: u16) -> Option<&Row> {
        self.rows.get(usize::from(row))
    }

    pub fn row_mut(&mut self, row: u16) -> Option<&mut Row> {
        self.rows.get_mut(usize::from(row))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Row> + ExactSizeIterator {
        self.rows.iter()
    }

    #[must_use]
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.row(row).and_then(|r| r.cell(col))
    }

    /// Whether the rows all have the grid's column count.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.cols)
    }

    // ── Erase ───────────────────────────────────────────────────────

    /// ED 0: cursor to end of display.
    pub fn erase_below(&mut self, row: u16, col: u16, bg: Color) {
        let cols = self.cols;
        if let Some(r) = self.row_mut(row) {
            r.erase(col, cols, bg);
        }
        for r in self.rows.iter_mut().skip(usize::from(row) + 1) {
            r.clear(bg);
        }
    }

    /// ED 1: start of display through the cursor (inclusive).
    pub fn erase_above(&mut self, row: u16, col: u16, bg: Color) {
        for r in self.rows.iter_mut().take(usize::from(row)) {
            r.clear(bg);
        }
        if let Some(r) = self.row_mut(row) {
            r.erase(0, col.saturating_add(1), bg);
        }
    }

    /// ED 2.
    pub fn erase_all(&mut self, bg: Color) {
        for r in &mut self.rows {
            r.clear(bg);
        }
    }

    /// DECALN: fill every cell with `ch`.
    pub fn fill_all(&mut self, ch: char) {
        for r in &mut self.rows {
            r.clear(Color::Default);
            let filled: Vec<Cell> = (0..self.cols).map(|_| Cell::new(ch)).collect();
            r.put_cells(0, &filled, Color::Default);
        }
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll rows `[top, bottom]` up by `count`, returning the rows that
    /// left the region (oldest first). Blank rows enter at the bottom.
    pub fn scroll_up(&mut self, top: u16, bottom: u16, count: u16, bg: Color) -> Vec<Row> {
        let bottom = bottom.min(self.rows().saturating_sub(1));
        if top > bottom || count == 0 {
            return Vec::new();
        }
        let count = count.min(bottom - top + 1);
        let (top, bottom, n) = (usize::from(top), usize::from(bottom), usize::from(count));
        let removed: Vec<Row> = self.rows.drain(top..top + n).collect();
        let insert_at = bottom + 1 - n;
        for _ in 0..n {
            self.rows.insert(insert_at, Row::filled(self.cols, bg));
        }
        removed
    }

    /// Scroll rows `[top, bottom]` down by `count`. Rows pushed past
    /// `bottom` are discarded; blank rows enter at the top.
    pub fn scroll_down(&mut self, top: u16, bottom: u16, count: u16, bg: Color) {
        let bottom = bottom.min(self.rows().saturating_sub(1));
        if top > bottom || count == 0 {
            return;
        }
        let count = count.min(bottom - top + 1);
        let (top, bottom, n) = (usize::from(top), usize::from(bottom), usize::from(count));
        self.rows.drain(bottom + 1 - n..=bottom);
        for _ in 0..n {
            self.rows.insert(top, Row::filled(self.cols, bg));
        }
    }

    // ── Size ────────────────────────────────────────────────────────

    /// Change the column count of every row without reflow.
    pub fn set_cols(&mut self, cols: u16) {
        self.cols = cols;
        for r in &mut self.rows {
            r.set_width(cols);
        }
    }

    /// Remove and return the top row.
    pub(crate) fn remove_top(&mut self) -> Option<Row> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rows.remove(0))
        }
    }

    /// Remove and return the bottom row.
    pub(crate) fn remove_bottom(&mut self) -> Option<Row> {
        self.rows.pop()
    }

    /// Append a row at the bottom, fitted to the grid width.
    pub(crate) fn push_bottom(&mut self, mut row: Row) {
        row.set_width(self.cols);
        self.rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Pen, SgrFlags};

    fn row_of(text: &str) -> Row {
        Row::from_cells(text.chars().map(Cell::new).collect(), false)
    }

    fn wide_row(prefix: &str, wide: char, suffix: &str) -> Row {
        let mut cells: Vec<Cell> = prefix.chars().map(Cell::new).collect();
        let (lead, cont) = Cell::wide(wide, &Pen::default());
        cells.push(lead);
        cells.push(cont);
        cells.extend(suffix.chars().map(Cell::new));
        Row::from_cells(cells, false)
    }

    fn assert_paired(row: &Row) {
        let cells = row.cells();
        for (i, cell) in cells.iter().enumerate() {
            if cell.is_wide() {
                assert!(
                    cells.get(i + 1).is_some_and(Cell::is_wide_continuation),
                    "lead at {i} lacks continuation"
                );
            }
            if cell.is_wide_continuation() {
                assert!(i > 0 && cells[i - 1].is_wide(), "orphan continuation at {i}");
            }
        }
    }

    fn grid_text(g: &Grid) -> Vec<String> {
        g.iter().map(Row::text).collect()
    }

    fn letters(cols: u16, rows: u16) -> Grid {
        let mut g = Grid::new(cols, rows);
        for r in 0..rows {
            let ch = char::from(b'A' + r as u8);
            let cells: Vec<Cell> = (0..cols).map(|_| Cell::new(ch)).collect();
            g.row_mut(r).unwrap().put_cells(0, &cells, Color::Default);
        }
        g
    }

    // ── Row text and runs ───────────────────────────────────────────

    #[test]
    fn text_trims_trailing_blanks_and_skips_continuations() {
        let row = wide_row("a", '中', "b  ");
        assert_eq!(row.text(), "a中b");
    }

    #[test]
    fn runs_coalesce_same_style_and_isolate_wide() {
        let bold = Pen {
            attrs: SgrAttrs {
                flags: SgrFlags::BOLD,
                ..SgrAttrs::default()
            },
            hyperlink: None,
        };
        let mut cells = vec![Cell::new('a'), Cell::new('b'), Cell::styled('c', &bold)];
        let (lead, cont) = Cell::wide('中', &Pen::default());
        cells.push(lead);
        cells.push(cont);
        cells.push(Cell::new('d'));
        let runs = Row::from_cells(cells, false).runs();
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "c", "中", "d"]);
        assert_eq!(runs[2].start_col, 3);
        assert_eq!(runs[2].width, 2);
        assert!(runs[2].wide);
        assert_eq!(runs[3].start_col, 5);
    }

    // ── Row edits ───────────────────────────────────────────────────

    #[test]
    fn delete_cells_shifts_left_and_pads() {
        let mut row = row_of("abcdef");
        assert_eq!(row.delete_cells(1, 2, Color::Default), 2);
        assert_eq!(row.text(), "adef");
        assert_eq!(row.len(), 6);
    }

    #[test]
    fn delete_cells_clamps_to_row_end() {
        let mut row = row_of("abcdef");
        assert_eq!(row.delete_cells(4, 10, Color::Default), 2);
        assert_eq!(row.text(), "abcd");
        assert_eq!(row.delete_cells(6, 1, Color::Default), 0);
    }

    #[test]
    fn delete_cells_splitting_wide_on_the_right_leaves_blank() {
        let mut row = wide_row("a", '中', "b");
        assert_eq!(row.delete_cells(0, 2, Color::Default), 2);
        assert_eq!(row.text(), " b");
        assert_paired(&row);
    }

    #[test]
    fn delete_cells_starting_on_continuation_blanks_lead() {
        let mut row = wide_row("a", '中', "bc");
        assert_eq!(row.delete_cells(2, 1, Color::Default), 1);
        assert_eq!(row.text(), "a bc");
        assert_paired(&row);
    }

    #[test]
    fn insert_blanks_pushes_wide_off_margin() {
        let mut row = wide_row("abc", '中', "");
        row.insert_blanks(0, 1, Color::Default);
        assert_eq!(row.text(), " abc");
        assert_paired(&row);
    }

    #[test]
    fn put_cells_over_half_of_wide_blanks_the_other_half() {
        let mut row = wide_row("a", '中', "b");
        row.put_cells(2, &[Cell::new('x')], Color::Default);
        assert_eq!(row.text(), "a xb");
        assert_paired(&row);

        let mut row = wide_row("a", '中', "b");
        row.put_cells(1, &[Cell::new('y')], Color::Default);
        assert_eq!(row.text(), "ay b");
        assert_paired(&row);
    }

    #[test]
    fn put_cells_truncated_wide_lead_is_blanked() {
        let mut row = row_of("abc");
        let (lead, cont) = Cell::wide('中', &Pen::default());
        row.put_cells(2, &[lead, cont], Color::Default);
        assert_eq!(row.text(), "ab");
        assert_paired(&row);
    }

    #[test]
    fn erase_range_fixes_both_edges() {
        let mut row = wide_row("a", '中', "b");
        let mut row2 = row.clone();
        row.erase(2, 4, Color::Default);
        assert_eq!(row.text(), "a");
        assert_paired(&row);
        row2.erase(0, 2, Color::Default);
        assert_eq!(row2.text(), "   b");
        assert_paired(&row2);
    }

    #[test]
    fn matches_at_compares_exact_cells() {
        let row = row_of("hello");
        let probe: Vec<Cell> = "ell".chars().map(Cell::new).collect();
        assert!(row.matches_at(1, &probe));
        assert!(!row.matches_at(0, &probe));
        assert!(!row.matches_at(4, &probe));
    }

    #[test]
    fn set_width_drops_dangling_wide_lead() {
        let mut row = wide_row("ab", '中', "");
        row.set_width(3);
        assert_eq!(row.len(), 3);
        assert_eq!(row.text(), "ab");
        row.set_width(6);
        assert_eq!(row.len(), 6);
    }

    // ── Grid ────────────────────────────────────────────────────────

    #[test]
    fn scroll_up_returns_removed_rows() {
        let mut g = letters(3, 5);
        let gone = g.scroll_up(1, 3, 2, Color::Default);
        let gone: Vec<String> = gone.iter().map(Row::text).collect();
        assert_eq!(gone, vec!["BBB", "CCC"]);
        assert_eq!(grid_text(&g), vec!["AAA", "DDD", "", "", "EEE"]);
    }

    #[test]
    fn scroll_down_inserts_blank_rows_at_top_of_region() {
        let mut g = letters(3, 5);
        g.scroll_down(1, 3, 1, Color::Default);
        assert_eq!(grid_text(&g), vec!["AAA", "", "BBB", "CCC", "EEE"]);
    }

    #[test]
    fn scroll_count_is_clamped_to_region() {
        let mut g = letters(2, 4);
        let gone = g.scroll_up(0, 3, 99, Color::Default);
        assert_eq!(gone.len(), 4);
        assert_eq!(g.rows(), 4);
        assert!(g.iter().all(Row::is_blank));
    }

    #[test]
    fn erase_below_and_above() {
        let mut g = letters(4, 3);
        g.erase_below(1, 2, Color::Default);
        assert_eq!(grid_text(&g), vec!["AAAA", "BB", ""]);
        let mut g = letters(4, 3);
        g.erase_above(1, 1, Color::Default);
        assert_eq!(grid_text(&g), vec!["", "  BB", "CCCC"]);
    }

    #[test]
    fn fill_all_for_alignment_test() {
        let mut g = Grid::new(3, 2);
        g.fill_all('E');
        assert_eq!(grid_text(&g), vec!["EEE", "EEE"]);
    }

    #[test]
    fn set_cols_keeps_rows_consistent() {
        let mut g = letters(5, 2);
        g.set_cols(3);
        assert!(g.is_consistent());
        assert_eq!(grid_text(&g), vec!["AAA", "BBB"]);
        g.set_cols(6);
        assert!(g.is_consistent());
    }

    #[test]
    fn rows_iterate_in_reverse() {
        let g = letters(2, 3);
        let texts: Vec<String> = g.iter().rev().map(Row::text).collect();
        assert_eq!(texts, vec!["CC", "BB", "AA"]);
        assert_eq!(g.iter().len(), 3);
    }
}
