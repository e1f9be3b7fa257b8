//! The terminal controller.
//!
//! [`Terminal`] owns the parser, both screens, scrollback, modes, scroll
//! region, tab stops and palette. Bytes go in through [`Terminal::feed`];
//! the renderer reads [`Terminal::active_screen`] and drains
//! [`Terminal::take_damage`], the host drains [`Terminal::take_replies`] and
//! [`Terminal::take_events`].

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use web_time::Instant;

use crate::cell::{Color, Pen, SgrFlags};
use crate::config::TerminalConfig;
use crate::cursor::{Cursor, CursorStyle, SavedCursor};
use crate::damage::Damage;
use crate::error::DimensionError;
use crate::grid::Row;
use crate::modes::{ModeFlags, Modes};
use crate::palette::{DynamicColor, Palette, Rgb, parse_color_spec};
use crate::parser::{Action, Parser};
use crate::screen::Screen;
use crate::scrollback::Scrollback;
use crate::tabs::TabStops;

/// Something the host should act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    TitleChanged(String),
    Bell,
    /// OSC 52 payload, already base64-decoded.
    ClipboardWrite(String),
    /// A palette entry or dynamic color changed; repaint with new colors.
    PaletteChanged,
    TmuxLine(Option<String>),
    DeviceControl(String),
}

/// Terminal state machine driven by a byte stream.
#[derive(Debug)]
pub struct Terminal {
    config: TerminalConfig,
    parser: Parser,
    primary: Screen,
    alternate: Screen,
    alternate_active: bool,
    cols: u16,
    rows: u16,
    scrollback: Scrollback,
    /// VT scroll region, inclusive; `None` is the full screen.
    scroll_region: Option<(u16, u16)>,
    tabs: TabStops,
    modes: Modes,
    cursor_style: CursorStyle,
    palette: Palette,
    title: String,
    last_printed: Option<char>,
    damage: Damage,
    replies: Vec<String>,
    events: Vec<TerminalEvent>,
}

fn check_dimensions(cols: u16, rows: u16) -> Result<(), DimensionError> {
    if cols == 0 || rows == 0 {
        return Err(DimensionError::InvalidDimension { cols, rows });
    }
    Ok(())
}

impl Terminal {
    /// A blank terminal with the default configuration.
    pub fn new(cols: u16, rows: u16) -> Result<Self, DimensionError> {
        Self::with_config(cols, rows, TerminalConfig::default())
    }

    pub fn with_config(cols: u16, rows: u16, config: TerminalConfig) -> Result<Self, DimensionError> {
        check_dimensions(cols, rows)?;
        Ok(Self {
            parser: Parser::with_config(&config),
            primary: Screen::new(cols, rows, config.width_policy),
            alternate: Screen::new(cols, rows, config.width_policy),
            alternate_active: false,
            cols,
            rows,
            scrollback: Scrollback::new(config.scrollback_capacity),
            scroll_region: None,
            tabs: TabStops::new(cols),
            modes: Modes::new(),
            cursor_style: CursorStyle::default(),
            palette: Palette::default(),
            title: String::new(),
            last_printed: None,
            damage: Damage {
                full: true,
                ..Damage::default()
            },
            replies: Vec::new(),
            events: Vec::new(),
            config,
        })
    }

    /// Rebuild from restored parts. Used by snapshot restore.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        config: TerminalConfig,
        primary: Screen,
        alternate: Screen,
        alternate_active: bool,
        scrollback: Scrollback,
        scroll_region: Option<(u16, u16)>,
        tabs: TabStops,
        modes: Modes,
        cursor_style: CursorStyle,
        palette: Palette,
        title: String,
    ) -> Self {
        let active = if alternate_active { &alternate } else { &primary };
        let (cols, rows) = (active.cols(), active.rows());
        let mut term = Self {
            parser: Parser::with_config(&config),
            primary,
            alternate,
            alternate_active,
            cols,
            rows,
            scrollback,
            scroll_region,
            tabs,
            modes,
            cursor_style,
            palette,
            title,
            last_printed: None,
            damage: Damage {
                full: true,
                ..Damage::default()
            },
            replies: Vec::new(),
            events: Vec::new(),
            config,
        };
        term.primary.set_width_policy(config.width_policy);
        term.alternate.set_width_policy(config.width_policy);
        term
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    #[must_use]
    pub fn active_screen(&self) -> &Screen {
        if self.alternate_active {
            &self.alternate
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut Screen {
        if self.alternate_active {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    #[must_use]
    pub fn primary_screen(&self) -> &Screen {
        &self.primary
    }

    #[must_use]
    pub fn alternate_screen(&self) -> &Screen {
        &self.alternate
    }

    #[must_use]
    pub fn is_alternate_active(&self) -> bool {
        self.alternate_active
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.active_screen().cursor
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.modes.cursor_visible()
    }

    #[must_use]
    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    #[must_use]
    pub fn scrollback(&self) -> &Scrollback {
        &self.scrollback
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn tab_stops(&self) -> &TabStops {
        &self.tabs
    }

    #[must_use]
    pub fn scroll_region(&self) -> Option<(u16, u16)> {
        self.scroll_region
    }

    /// First row of the scroll region.
    #[must_use]
    pub fn vt_scroll_top(&self) -> u16 {
        self.scroll_region.map_or(0, |(top, _)| top)
    }

    /// Last row of the scroll region, inclusive.
    #[must_use]
    pub fn vt_scroll_bottom(&self) -> u16 {
        self.scroll_region
            .map_or(self.rows.saturating_sub(1), |(_, bottom)| bottom)
    }

    /// Rows evicted from history for good.
    #[must_use]
    pub fn discarded_rows(&self) -> u64 {
        self.scrollback.discarded()
    }

    /// Absolute index of a screen row, stable while rows scroll into history.
    #[must_use]
    pub fn absolute_row(&self, screen_row: u16) -> u64 {
        self.scrollback.discarded() + self.scrollback.len() as u64 + u64::from(screen_row)
    }

    /// Text of the cursor row.
    #[must_use]
    pub fn current_row_text(&self) -> String {
        let screen = self.active_screen();
        screen
            .row(screen.cursor.row)
            .map(Row::text)
            .unwrap_or_default()
    }

    /// Text of the lowest row with any content.
    #[must_use]
    pub fn bottom_nonempty_row_text(&self) -> String {
        self.active_screen()
            .grid()
            .iter()
            .rev()
            .map(Row::text)
            .find(|text| !text.trim().is_empty())
            .unwrap_or_default()
    }

    /// Resolve a color source to RGB, honoring reverse video (DECSCNM swaps
    /// the default foreground and background).
    #[must_use]
    pub fn resolve_color(&self, color: Color, foreground: bool) -> Rgb {
        let reverse = self.modes.contains(ModeFlags::REVERSE_VIDEO);
        if color == Color::Default && reverse {
            return self.palette.resolve(color, !foreground);
        }
        self.palette.resolve(color, foreground)
    }

    pub fn take_damage(&mut self) -> Damage {
        self.damage.take()
    }

    /// Bytes owed to the host (device reports), oldest first.
    pub fn take_replies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.replies)
    }

    pub fn take_events(&mut self) -> Vec<TerminalEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Interpret a chunk of the host byte stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.feed_at(bytes, Instant::now());
    }

    /// [`Terminal::feed`] with an explicit clock for the string time budget.
    ///
    /// Actions are applied byte by byte so charset and coding-system changes
    /// take effect exactly where they occur in the stream.
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) {
        self.parser.expire_string(now);
        let mut actions = Vec::new();
        let mut text = String::new();
        for &b in bytes {
            self.parser.advance(b, now, &mut actions);
            for action in actions.drain(..) {
                if let Action::Print(ch) = action {
                    let eight_bit = self.parser.is_eight_bit();
                    let ch = self.active_mut().charsets.translate(ch, eight_bit);
                    text.push(ch);
                    continue;
                }
                if !text.is_empty() {
                    self.print(&std::mem::take(&mut text));
                }
                self.apply(action);
            }
        }
        if !text.is_empty() {
            self.print(&text);
        }
    }

    /// Apply one parsed action.
    pub fn apply(&mut self, action: Action) {
        let before = self.active_screen().cursor.row;
        self.dispatch(action);
        let after = self.active_screen().cursor.row;
        self.damage.mark_row(before);
        self.damage.mark_row(after);
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::Print(ch) => {
                let mut buf = [0u8; 4];
                self.print(ch.encode_utf8(&mut buf));
            }
            Action::Bell => self.events.push(TerminalEvent::Bell),
            Action::Backspace => self.cursor_left(1),
            Action::Tab => self.tab_forward(1),
            Action::LineFeed => self.line_feed(),
            Action::CarriageReturn => self.carriage_return(),
            Action::LockingShift(slot) => self.active_mut().charsets.lock_gl(slot),
            Action::LockingShiftRight(slot) => self.active_mut().charsets.lock_gr(slot),
            Action::SingleShift(slot) => self.active_mut().charsets.single_shift(slot),
            Action::DesignateCharset { slot, charset } => {
                self.active_mut().charsets.designate(slot, charset);
            }
            Action::Index => self.index(),
            Action::NextLine => self.new_line(),
            Action::SetTabStop => {
                let col = self.cursor().col;
                self.tabs.set(col);
            }
            Action::ReverseIndex => self.reverse_index(),
            Action::SaveCursor | Action::SaveCursorPosition => self.save_cursor(),
            Action::RestoreCursor | Action::RestoreCursorPosition => self.restore_cursor(),
            Action::FullReset => self.full_reset(),
            Action::ApplicationKeypad => self.modes.set(ModeFlags::APPLICATION_KEYPAD, true),
            Action::NormalKeypad => self.modes.set(ModeFlags::APPLICATION_KEYPAD, false),
            Action::ScreenAlignment => self.screen_alignment(),
            Action::CursorUp(n) => self.cursor_up(n),
            Action::CursorDown(n) => self.cursor_down(n),
            Action::CursorForward(n) => self.cursor_right(n),
            Action::CursorBack(n) => self.cursor_left(n),
            Action::CursorNextLine(n) => {
                self.cursor_down(n);
                self.set_cursor_column(0);
            }
            Action::CursorPrevLine(n) => {
                self.cursor_up(n);
                self.set_cursor_column(0);
            }
            Action::CursorColumn(col) => self.set_cursor_column(col),
            Action::CursorColumnRelative(n) => {
                let col = self.cursor().col.saturating_add(n);
                self.set_cursor_column(col);
            }
            Action::CursorRow(row) => {
                let col = self.cursor().col;
                self.set_cursor_position(row, col);
            }
            Action::CursorRowRelative(n) => self.cursor_down(n),
            Action::CursorPosition { row, col } => self.set_cursor_position(row, col),
            Action::TabForward(n) => self.tab_forward(n),
            Action::TabBackward(n) => self.tab_backward(n),
            Action::ClearTabStop(mode) => match mode {
                0 => {
                    let col = self.cursor().col;
                    self.tabs.clear(col);
                }
                3 => self.tabs.clear_all(),
                _ => tracing::trace!(mode, "unknown TBC mode"),
            },
            Action::EraseInDisplay(mode) => self.erase_in_display(mode),
            Action::EraseInLine(mode) => self.active_mut().erase_in_line(mode),
            Action::InsertLines(n) => self.insert_lines(n),
            Action::DeleteLines(n) => self.delete_lines(n),
            Action::InsertChars(n) => self.active_mut().insert_blank_chars(n),
            Action::DeleteChars(n) => {
                self.active_mut().delete_chars(n);
            }
            Action::EraseChars(n) => self.active_mut().erase_chars(n),
            Action::ScrollUp(n) => self.scroll_region_up(n),
            Action::ScrollDown(n) => self.scroll_region_down(n),
            Action::RepeatPrevious(n) => self.repeat_previous(n),
            Action::SetModes {
                private,
                modes,
                enable,
            } => {
                for mode in modes {
                    if private {
                        self.set_dec_mode(mode, enable);
                    } else if !self.modes.set_ansi_mode(mode, enable) {
                        tracing::trace!(mode, "ignoring unknown ANSI mode");
                    }
                }
            }
            Action::Sgr(params) => self.active_mut().pen.attrs.apply_sgr(&params),
            Action::DeviceStatusReport { private, code } => self.device_status_report(private, code),
            Action::PrimaryDeviceAttributes => self.replies.push("\x1b[?1;2c".to_owned()),
            Action::SecondaryDeviceAttributes => self.replies.push("\x1b[>0;256;0c".to_owned()),
            Action::SetScrollRegion { top, bottom } => self.set_scroll_region(top, bottom),
            Action::SoftReset => self.soft_reset(),
            Action::SetCursorStyle(style) => self.cursor_style = style,
            Action::SetTitle(title) => {
                self.title.clone_from(&title);
                self.events.push(TerminalEvent::TitleChanged(title));
            }
            Action::SetPaletteColor { index, spec } => self.set_palette_color(index, &spec),
            Action::ResetPaletteColors(indexes) => self.reset_palette_colors(&indexes),
            Action::SetDynamicColor { code, spec } => self.set_dynamic_color(code, &spec),
            Action::ResetDynamicColor(code) => {
                if let Some(which) = DynamicColor::from_osc(code) {
                    self.palette.reset_dynamic(which);
                    self.palette_changed();
                }
            }
            Action::Hyperlink(uri) => {
                self.active_mut().pen.hyperlink = uri.map(Arc::from);
            }
            Action::ClipboardWrite { selection, data } => self.clipboard_write(&selection, &data),
            Action::DeviceControl(payload) => {
                self.events.push(TerminalEvent::DeviceControl(payload));
            }
            Action::TmuxLine(line) => self.events.push(TerminalEvent::TmuxLine(line)),
        }
    }

    // ── Printing ────────────────────────────────────────────────────

    /// Print already-translated text at the cursor, wrapping per DECAWM.
    pub fn print(&mut self, text: &str) {
        let policy = self.config.width_policy;
        let mut pending = String::new();
        let mut pending_width = 0u16;
        for ch in text.chars() {
            let width = u16::from(policy.char_width(ch));
            if width == 0 {
                self.flush_print(&mut pending, &mut pending_width);
                if self.active_mut().combine_with_previous(ch) {
                    let row = self.cursor().row;
                    self.damage.mark_row(row);
                } else {
                    tracing::trace!(mark = %ch.escape_unicode(), "combining mark with no base");
                }
                continue;
            }
            let cursor = self.cursor();
            let overflowing = pending.is_empty() && cursor.overflow;
            if overflowing || cursor.col + pending_width + width > self.cols {
                self.flush_print(&mut pending, &mut pending_width);
                self.wrap_before(width);
            }
            pending.push(ch);
            pending_width += width;
            self.last_printed = Some(ch);
        }
        self.flush_print(&mut pending, &mut pending_width);
    }

    fn flush_print(&mut self, pending: &mut String, width: &mut u16) {
        if pending.is_empty() {
            return;
        }
        let insert = self.modes.insert();
        let screen = self.active_mut();
        let row = screen.cursor.row;
        let changed = if insert {
            screen.insert_text(pending);
            true
        } else {
            screen.overwrite_text(pending)
        };
        if changed {
            self.damage.mark_row(row);
        }
        pending.clear();
        *width = 0;
    }

    /// Make room for a character of `width` columns at the right margin.
    fn wrap_before(&mut self, width: u16) {
        let cols = self.cols;
        if self.modes.wraparound() {
            let screen = self.active_mut();
            let row = screen.cursor.row;
            if let Some(r) = screen.grid_mut().row_mut(row) {
                r.set_wrapped(true);
            }
            self.new_line();
        } else {
            let screen = self.active_mut();
            screen.cursor.col = cols.saturating_sub(width);
            screen.cursor.overflow = false;
        }
    }

    fn repeat_previous(&mut self, count: u16) {
        let Some(ch) = self.last_printed else {
            return;
        };
        let limit = usize::from(self.cols) * usize::from(self.rows);
        let text: String = std::iter::repeat_n(ch, usize::from(count).min(limit)).collect();
        self.print(&text);
    }

    /// Write `text` in inverse video, then back the cursor up over it so
    /// the next output overwrites the notice.
    pub fn show_notice(&mut self, text: &str) {
        let saved = self.active_screen().pen.clone();
        self.active_mut().pen = Pen::default();
        self.active_mut().pen.attrs.flags.insert(SgrFlags::INVERSE);
        self.print(text);
        self.active_mut().pen = saved;
        let width = self.config.width_policy.str_width(text);
        for _ in 0..width {
            self.cursor_left(1);
        }
    }

    // ── Line movement ───────────────────────────────────────────────

    /// Move to column 0 of the next row, scrolling as needed.
    ///
    /// At the bottom of an active scroll region the region scrolls in place.
    /// On the last physical row the whole screen scrolls and the top row
    /// goes to scrollback (primary screen only).
    pub fn new_line(&mut self) {
        let row = self.cursor().row;
        if self.scroll_region.is_some() && row == self.vt_scroll_bottom() {
            self.scroll_region_up(1);
        } else if row + 1 >= self.rows {
            self.append_rows(1);
        } else {
            self.active_mut().cursor.row = row + 1;
        }
        let screen = self.active_mut();
        screen.cursor.col = 0;
        screen.cursor.overflow = false;
    }

    /// LF / VT / FF: like [`Terminal::new_line`] but keeps the column unless
    /// LNM is set.
    fn line_feed(&mut self) {
        if self.modes.auto_cr() {
            self.new_line();
        } else {
            self.index();
        }
    }

    /// IND: new line keeping the column.
    fn index(&mut self) {
        let col = self.cursor().col;
        self.new_line();
        self.active_mut().cursor.col = col;
    }

    fn reverse_index(&mut self) {
        let cursor = self.cursor();
        if cursor.row == self.vt_scroll_top() {
            self.scroll_region_down(1);
        } else if cursor.row > 0 {
            self.active_mut().cursor.row = cursor.row - 1;
        }
        self.active_mut().cursor.overflow = false;
    }

    fn carriage_return(&mut self) {
        let screen = self.active_mut();
        screen.cursor.col = 0;
        screen.cursor.overflow = false;
    }

    /// Scroll the whole screen up; the primary screen feeds scrollback.
    fn append_rows(&mut self, count: u16) {
        let bottom = self.rows.saturating_sub(1);
        let primary = !self.alternate_active;
        let screen = self.active_mut();
        let bg = screen.erase_bg();
        let removed = screen.grid_mut().scroll_up(0, bottom, count, bg);
        if primary {
            for row in removed {
                let _ = self.scrollback.push(row);
            }
        }
        self.damage.mark_full();
    }

    /// SU and newline at the region bottom. Never feeds scrollback.
    fn scroll_region_up(&mut self, count: u16) {
        let (top, bottom) = (self.vt_scroll_top(), self.vt_scroll_bottom());
        let screen = self.active_mut();
        let bg = screen.erase_bg();
        let _ = screen.grid_mut().scroll_up(top, bottom, count, bg);
        self.damage.mark_rows(top, bottom);
    }

    fn scroll_region_down(&mut self, count: u16) {
        let (top, bottom) = (self.vt_scroll_top(), self.vt_scroll_bottom());
        let screen = self.active_mut();
        let bg = screen.erase_bg();
        screen.grid_mut().scroll_down(top, bottom, count, bg);
        self.damage.mark_rows(top, bottom);
    }

    fn insert_lines(&mut self, count: u16) {
        let (top, bottom) = (self.vt_scroll_top(), self.vt_scroll_bottom());
        let row = self.cursor().row;
        if row < top || row > bottom {
            return;
        }
        let screen = self.active_mut();
        let bg = screen.erase_bg();
        screen.grid_mut().scroll_down(row, bottom, count, bg);
        screen.cursor.col = 0;
        screen.cursor.overflow = false;
        self.damage.mark_rows(row, bottom);
    }

    fn delete_lines(&mut self, count: u16) {
        let (top, bottom) = (self.vt_scroll_top(), self.vt_scroll_bottom());
        let row = self.cursor().row;
        if row < top || row > bottom {
            return;
        }
        let screen = self.active_mut();
        let bg = screen.erase_bg();
        let _ = screen.grid_mut().scroll_up(row, bottom, count, bg);
        screen.cursor.col = 0;
        screen.cursor.overflow = false;
        self.damage.mark_rows(row, bottom);
    }

    // ── Cursor movement ─────────────────────────────────────────────

    fn set_cursor_column(&mut self, col: u16) {
        let cols = self.cols;
        let screen = self.active_mut();
        screen.cursor.col = col.min(cols.saturating_sub(1));
        screen.cursor.overflow = false;
    }

    /// CUP / VPA. Rows are relative to the region top under DECOM and then
    /// clamped into the region.
    fn set_cursor_position(&mut self, row: u16, col: u16) {
        let row = if self.modes.origin() {
            (self.vt_scroll_top().saturating_add(row)).min(self.vt_scroll_bottom())
        } else {
            row
        };
        self.active_mut().set_cursor(row, col);
    }

    fn home_cursor(&mut self) {
        self.set_cursor_position(0, 0);
    }

    /// CUU: stops at the region top when starting inside the region.
    fn cursor_up(&mut self, count: u16) {
        let top = self.vt_scroll_top();
        let screen = self.active_mut();
        let limit = if screen.cursor.row >= top { top } else { 0 };
        screen.cursor.row = screen.cursor.row.saturating_sub(count).max(limit);
        screen.cursor.overflow = false;
    }

    /// CUD: stops at the region bottom when starting inside the region.
    fn cursor_down(&mut self, count: u16) {
        let bottom = self.vt_scroll_bottom();
        let last = self.rows.saturating_sub(1);
        let screen = self.active_mut();
        let limit = if screen.cursor.row <= bottom { bottom } else { last };
        screen.cursor.row = screen.cursor.row.saturating_add(count).min(limit);
        screen.cursor.overflow = false;
    }

    fn cursor_right(&mut self, count: u16) {
        let col = self.cursor().col.saturating_add(count);
        self.set_cursor_column(col);
    }

    /// CUB / BS.
    ///
    /// With reverse-wraparound the cursor walks back through the screen as
    /// one linear sequence of cells, wrapping from row 0 to the last row. A
    /// pending overflow consumes one step.
    fn cursor_left(&mut self, count: u16) {
        if count == 0 {
            return;
        }
        let (cols, rows) = (i64::from(self.cols), i64::from(self.rows));
        let reverse = self.modes.reverse_wraparound();
        let screen = self.active_mut();
        if !reverse {
            screen.cursor.col = screen.cursor.col.saturating_sub(count);
            screen.cursor.overflow = false;
            return;
        }
        let mut count = i64::from(count);
        if screen.cursor.overflow {
            screen.cursor.overflow = false;
            count -= 1;
            if count == 0 {
                return;
            }
        }
        let linear = i64::from(screen.cursor.row) * cols + i64::from(screen.cursor.col) - count;
        let linear = linear.rem_euclid(rows * cols);
        screen.cursor.row = (linear / cols) as u16;
        screen.cursor.col = (linear % cols) as u16;
    }

    fn tab_forward(&mut self, count: u16) {
        let mut col = self.cursor().col;
        for _ in 0..count {
            col = self.tabs.next_after(col);
        }
        self.set_cursor_column(col);
    }

    fn tab_backward(&mut self, count: u16) {
        let mut col = self.cursor().col;
        for _ in 0..count {
            col = self.tabs.prev_before(col);
        }
        self.set_cursor_column(col);
    }

    // ── Save / restore ──────────────────────────────────────────────

    fn save_cursor(&mut self) {
        let origin = self.modes.origin();
        let screen = self.active_mut();
        screen.saved_cursor = Some(SavedCursor::capture(
            screen.cursor,
            &screen.pen,
            screen.charsets,
            origin,
        ));
    }

    /// DECRC. With nothing saved the cursor homes and the pen resets.
    fn restore_cursor(&mut self) {
        let (rows, cols) = (self.rows, self.cols);
        let saved = self.active_screen().saved_cursor.clone().unwrap_or_default();
        let screen = self.active_mut();
        screen.cursor = saved.cursor_within(rows, cols);
        screen.pen = saved.pen;
        screen.charsets = saved.charsets;
        self.modes.set(ModeFlags::ORIGIN, saved.origin_mode);
    }

    // ── Erase ───────────────────────────────────────────────────────

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0..=2 => {
                self.active_mut().erase_in_display(mode);
                if mode == 2 {
                    self.damage.mark_full();
                } else {
                    let row = self.cursor().row;
                    let last = self.rows.saturating_sub(1);
                    if mode == 0 {
                        self.damage.mark_rows(row, last);
                    } else {
                        self.damage.mark_rows(0, row);
                    }
                }
            }
            3 => {
                self.scrollback.clear();
                self.damage.mark_full();
            }
            _ => tracing::trace!(mode, "unknown ED mode"),
        }
    }

    fn screen_alignment(&mut self) {
        self.scroll_region = None;
        self.active_mut().grid_mut().fill_all('E');
        self.active_mut().set_cursor(0, 0);
        self.damage.mark_full();
    }

    // ── Modes ───────────────────────────────────────────────────────

    fn set_dec_mode(&mut self, mode: u16, enable: bool) {
        match mode {
            3 => {
                // DECCOLM: the width is fixed by the host; clear and home.
                self.scroll_region = None;
                self.active_mut().erase_in_display(2);
                self.active_mut().set_cursor(0, 0);
                self.damage.mark_full();
                return;
            }
            47 | 1047 | 1049 => {
                self.set_alternate_mode(enable, mode);
                let _ = self.modes.set_dec_mode(mode, enable);
                return;
            }
            _ => {}
        }
        if !self.modes.set_dec_mode(mode, enable) {
            tracing::trace!(mode, "ignoring unknown DEC private mode");
            return;
        }
        match mode {
            5 => self.damage.mark_full(),
            6 => self.home_cursor(),
            12 => self.cursor_style.blink = enable,
            _ => {}
        }
    }

    /// Swap the active screen.
    ///
    /// The incoming screen catches up on any resize it missed, 1047/1049
    /// clear the alternate screen on entry, 1049 saves the primary cursor
    /// on entry and restores it on exit, and palette overrides are swapped.
    pub fn set_alternate_mode(&mut self, enable: bool, mode: u16) {
        if enable == self.alternate_active {
            return;
        }
        if enable && mode == 1049 {
            self.save_cursor();
        }
        let old_overrides = self.active_screen().palette_overrides.clone();
        self.alternate_active = enable;
        self.sync_active_size();
        if enable && matches!(mode, 1047 | 1049) {
            let screen = self.active_mut();
            screen.grid_mut().erase_all(Color::Default);
            screen.set_cursor(0, 0);
        }
        if !enable && mode == 1049 {
            self.restore_cursor();
        }
        let new_overrides = self.active_screen().palette_overrides.clone();
        let mut changed = false;
        for index in old_overrides.keys() {
            if !new_overrides.contains_key(index) {
                self.palette.reset(*index);
                changed = true;
            }
        }
        for (index, rgb) in &new_overrides {
            self.palette.set(*index, *rgb);
            changed = true;
        }
        if changed {
            self.events.push(TerminalEvent::PaletteChanged);
        }
        self.damage.mark_full();
    }

    // ── Reports ─────────────────────────────────────────────────────

    fn device_status_report(&mut self, private: bool, code: u16) {
        let cursor = self.cursor();
        match (private, code) {
            (false, 5) => self.replies.push("\x1b[0n".to_owned()),
            (false, 6) => {
                let top = if self.modes.origin() {
                    self.vt_scroll_top()
                } else {
                    0
                };
                let row = cursor.row.saturating_sub(top) + 1;
                self.replies
                    .push(format!("\x1b[{row};{}R", cursor.col + 1));
            }
            (true, 6) => {
                self.replies
                    .push(format!("\x1b[?{};{}R", cursor.row + 1, cursor.col + 1));
            }
            _ => tracing::trace!(private, code, "ignoring unsupported DSR"),
        }
    }

    // ── Scroll region ───────────────────────────────────────────────

    /// DECSTBM. A region covering the whole screen clears it; an empty or
    /// inverted region is ignored. The cursor homes either way.
    fn set_scroll_region(&mut self, top: u16, bottom: Option<u16>) {
        let last = self.rows.saturating_sub(1);
        let bottom = bottom.unwrap_or(last).min(last);
        if top >= bottom {
            tracing::trace!(top, bottom, "ignoring empty scroll region");
            return;
        }
        self.scroll_region = if top == 0 && bottom == last {
            None
        } else {
            Some((top, bottom))
        };
        self.home_cursor();
    }

    // ── Colors ──────────────────────────────────────────────────────

    fn palette_changed(&mut self) {
        self.events.push(TerminalEvent::PaletteChanged);
        self.damage.mark_full();
    }

    fn set_palette_color(&mut self, index: u8, spec: &str) {
        if spec == "?" {
            let rgb = self.palette.get(index);
            self.replies
                .push(format!("\x1b]4;{index};{}\x07", rgb.to_xparse()));
            return;
        }
        let Some(rgb) = parse_color_spec(spec) else {
            tracing::debug!(index, spec, "unparseable palette color");
            return;
        };
        self.palette.set(index, rgb);
        self.active_mut().palette_overrides.insert(index, rgb);
        self.palette_changed();
    }

    fn reset_palette_colors(&mut self, indexes: &[u8]) {
        if indexes.is_empty() {
            for index in 0..=u8::MAX {
                self.palette.reset(index);
            }
            self.active_mut().palette_overrides.clear();
        } else {
            for &index in indexes {
                self.palette.reset(index);
                self.active_mut().palette_overrides.remove(&index);
            }
        }
        self.palette_changed();
    }

    fn set_dynamic_color(&mut self, code: u16, spec: &str) {
        let Some(which) = DynamicColor::from_osc(code) else {
            return;
        };
        if spec == "?" {
            tracing::trace!(code, "dynamic color queries are not answered");
            return;
        }
        match parse_color_spec(spec) {
            Some(rgb) => {
                self.palette.set_dynamic(which, rgb);
                self.palette_changed();
            }
            None => tracing::debug!(code, spec, "unparseable dynamic color"),
        }
    }

    fn clipboard_write(&mut self, selection: &str, data: &str) {
        match STANDARD.decode(data.trim()) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                self.events.push(TerminalEvent::ClipboardWrite(text));
            }
            Err(err) => {
                tracing::warn!(selection, error = %err, "dropping OSC 52 with invalid base64");
            }
        }
    }

    // ── Resets ──────────────────────────────────────────────────────

    /// DECSTR: modes, pens, charsets, region and saved cursors go back to
    /// their defaults. Screen contents and the active screen are kept.
    pub fn soft_reset(&mut self) {
        for flag in [
            ModeFlags::INSERT,
            ModeFlags::ORIGIN,
            ModeFlags::APPLICATION_CURSOR,
            ModeFlags::APPLICATION_KEYPAD,
            ModeFlags::REVERSE_WRAPAROUND,
            ModeFlags::AUTO_CR,
        ] {
            self.modes.set(flag, false);
        }
        self.modes.set(ModeFlags::WRAPAROUND, true);
        self.modes.set(ModeFlags::CURSOR_VISIBLE, true);
        for screen in [&mut self.primary, &mut self.alternate] {
            screen.pen = Pen::default();
            screen.charsets = Default::default();
            screen.saved_cursor = None;
        }
        self.scroll_region = None;
        self.cursor_style = CursorStyle::default();
    }

    /// RIS. Everything except the size, title and scrollback returns to
    /// power-on state.
    pub fn full_reset(&mut self) {
        self.primary.reset();
        self.alternate.reset();
        self.sync_screen_size(false);
        self.sync_screen_size(true);
        self.alternate_active = false;
        self.scroll_region = None;
        self.tabs = TabStops::new(self.cols);
        self.modes.reset();
        self.cursor_style = CursorStyle::default();
        self.palette.reset_all();
        self.last_printed = None;
        self.events.push(TerminalEvent::PaletteChanged);
        self.damage.mark_full();
    }

    // ── Resize ──────────────────────────────────────────────────────

    /// Change the screen size. Rows are not reflowed.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), DimensionError> {
        check_dimensions(cols, rows)?;
        if cols == self.cols && rows == self.rows {
            return Ok(());
        }
        tracing::debug!(cols, rows, "resizing terminal");
        self.cols = cols;
        self.rows = rows;
        self.tabs.realize_width(cols);
        self.scroll_region = None;
        self.sync_active_size();
        self.damage.mark_full();
        Ok(())
    }

    fn sync_active_size(&mut self) {
        self.sync_screen_size(self.alternate_active);
    }

    /// Bring one screen to the current size. Only the active screen is
    /// resized live; the other catches up when it becomes active.
    fn sync_screen_size(&mut self, alternate: bool) {
        let (cols, rows) = (self.cols, self.rows);
        let screen = if alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        };
        if screen.cols() != cols {
            screen.set_cols(cols);
        }
        let old_rows = screen.rows();
        if rows < old_rows {
            let mut excess = old_rows - rows;
            while excess > 0 {
                let last = screen.rows() - 1;
                let blank = screen.row(last).is_some_and(Row::is_blank);
                if last <= screen.cursor.row || !blank {
                    break;
                }
                let _ = screen.grid_mut().remove_bottom();
                excess -= 1;
            }
            for _ in 0..excess {
                if let Some(row) = screen.grid_mut().remove_top() {
                    if !alternate {
                        let _ = self.scrollback.push(row);
                    }
                }
                screen.cursor.row = screen.cursor.row.saturating_sub(1);
            }
        } else {
            for _ in old_rows..rows {
                screen.grid_mut().push_bottom(Row::new(cols));
            }
        }
        let cursor = screen.cursor;
        screen.cursor.clamp(rows, cols);
        if screen.cursor.row == cursor.row && screen.cursor.col == cursor.col {
            screen.cursor.overflow = cursor.overflow;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::SgrAttrs;

    fn term(cols: u16, rows: u16) -> Terminal {
        Terminal::new(cols, rows).unwrap()
    }

    fn fed(cols: u16, rows: u16, input: &str) -> Terminal {
        let mut t = term(cols, rows);
        t.feed(input.as_bytes());
        t
    }

    fn row(t: &Terminal, r: u16) -> String {
        t.active_screen().row(r).map(Row::text).unwrap_or_default()
    }

    fn pos(t: &Terminal) -> (u16, u16) {
        let c = t.cursor();
        (c.row, c.col)
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(
            Terminal::new(0, 24).unwrap_err(),
            DimensionError::InvalidDimension { cols: 0, rows: 24 }
        );
        let mut t = term(80, 24);
        assert!(t.resize(80, 0).is_err());
        assert_eq!((t.cols(), t.rows()), (80, 24));
    }

    // ── Printing and wrapping ───────────────────────────────────────

    #[test]
    fn hello_crlf() {
        let t = fed(80, 24, "hello\r\n");
        assert_eq!(row(&t, 0), "hello");
        assert_eq!(pos(&t), (1, 0));
    }

    #[test]
    fn overflow_is_deferred_until_next_printable() {
        let mut t = fed(5, 3, "abcde");
        assert_eq!(pos(&t), (0, 4));
        assert!(t.cursor().overflow);
        t.feed(b"\x1b[6n");
        assert_eq!(t.take_replies(), vec!["\x1b[1;5R".to_owned()]);
        t.feed(b"f");
        assert_eq!(row(&t, 1), "f");
        assert!(t.active_screen().row(0).unwrap().is_wrapped());
        assert_eq!(pos(&t), (1, 1));
    }

    #[test]
    fn no_wraparound_overwrites_last_column() {
        let t = fed(5, 2, "\x1b[?7labcdefg");
        assert_eq!(row(&t, 0), "abcdg");
        assert_eq!(row(&t, 1), "");
    }

    #[test]
    fn wide_char_wraps_when_it_does_not_fit() {
        let t = fed(5, 2, "abcd中");
        assert_eq!(row(&t, 0), "abcd");
        assert_eq!(row(&t, 1), "中");
        assert!(t.active_screen().row(0).unwrap().is_wrapped());
    }

    #[test]
    fn combining_mark_joins_previous_character() {
        let t = fed(10, 1, "e\u{0301}x");
        assert_eq!(row(&t, 0), "e\u{0301}x");
        assert_eq!(pos(&t), (0, 2));
    }

    #[test]
    fn insert_mode_shifts_row() {
        let t = fed(10, 1, "abcd\r\x1b[4hXY");
        assert_eq!(row(&t, 0), "XYabcd");
    }

    #[test]
    fn charset_translation_applies_to_printing() {
        let t = fed(10, 1, "\x1b(0qx\x1b(Bq");
        assert_eq!(row(&t, 0), "─│q");
    }

    #[test]
    fn repeat_previous_character() {
        let t = fed(10, 1, "a\x1b[3b");
        assert_eq!(row(&t, 0), "aaaa");
    }

    // ── Newlines and scrolling ──────────────────────────────────────

    #[test]
    fn newline_at_bottom_feeds_scrollback() {
        let t = fed(10, 2, "one\r\ntwo\r\nthree");
        assert_eq!(t.scrollback().len(), 1);
        assert_eq!(t.scrollback().get(0).unwrap().text(), "one");
        assert_eq!(row(&t, 0), "two");
        assert_eq!(row(&t, 1), "three");
        assert_eq!(t.absolute_row(0), 1);
    }

    #[test]
    fn scrollback_capacity_counts_discarded_rows() {
        let config = TerminalConfig::default().with_scrollback_capacity(2);
        let mut t = Terminal::with_config(5, 1, config).unwrap();
        t.feed(b"a\r\nb\r\nc\r\nd\r\ne");
        assert_eq!(t.scrollback().len(), 2);
        assert_eq!(t.discarded_rows(), 2);
        assert_eq!(t.absolute_row(0), 4);
    }

    #[test]
    fn line_feed_keeps_column_unless_auto_cr() {
        let t = fed(10, 3, "ab\n");
        assert_eq!(pos(&t), (1, 2));
        let t = fed(10, 3, "\x1b[20hab\n");
        assert_eq!(pos(&t), (1, 0));
    }

    #[test]
    fn region_scrolls_in_place_without_scrollback() {
        let mut t = fed(10, 6, "0\r\n1\r\n2\r\n3\r\n4\r\n5");
        t.feed(b"\x1b[2;4r\x1b[4;1Hx\r\ny\r\nz");
        assert_eq!(t.scrollback().len(), 0);
        assert_eq!(row(&t, 0), "0");
        assert_eq!(row(&t, 1), "x");
        assert_eq!(row(&t, 2), "y");
        assert_eq!(row(&t, 3), "z");
        assert_eq!(row(&t, 4), "4");
        assert_eq!(row(&t, 5), "5");
    }

    #[test]
    fn reverse_index_at_region_top_scrolls_down() {
        let mut t = fed(5, 4, "a\r\nb\r\nc\r\nd");
        t.feed(b"\x1b[2;3r\x1b[2;1H\x1bM");
        assert_eq!(row(&t, 0), "a");
        assert_eq!(row(&t, 1), "");
        assert_eq!(row(&t, 2), "b");
        assert_eq!(row(&t, 3), "d");
    }

    #[test]
    fn scroll_up_never_feeds_scrollback() {
        let t = fed(5, 3, "a\r\nb\r\nc\x1b[2S");
        assert_eq!(t.scrollback().len(), 0);
        assert_eq!(row(&t, 0), "c");
    }

    #[test]
    fn insert_and_delete_lines_stay_in_region() {
        let mut t = fed(5, 5, "a\r\nb\r\nc\r\nd\r\ne");
        t.feed(b"\x1b[2;4r\x1b[3;3H\x1b[L");
        assert_eq!(pos(&t), (2, 0));
        assert_eq!(
            (0..5).map(|r| row(&t, r)).collect::<Vec<_>>(),
            vec!["a", "b", "", "c", "e"]
        );
        t.feed(b"\x1b[2M");
        assert_eq!(
            (0..5).map(|r| row(&t, r)).collect::<Vec<_>>(),
            vec!["a", "b", "", "", "e"]
        );
    }

    #[test]
    fn full_screen_region_is_none() {
        let t = fed(10, 5, "\x1b[1;5r");
        assert_eq!(t.scroll_region(), None);
        let t = fed(10, 5, "\x1b[2;4r");
        assert_eq!(t.scroll_region(), Some((1, 3)));
        let t = fed(10, 5, "\x1b[4;2r");
        assert_eq!(t.scroll_region(), None);
    }

    // ── Cursor movement ─────────────────────────────────────────────

    #[test]
    fn cup_is_one_based() {
        let t = fed(80, 24, "\x1b[5;10H");
        assert_eq!(pos(&t), (4, 9));
    }

    #[test]
    fn origin_mode_offsets_and_clamps() {
        let mut t = fed(10, 10, "\x1b[3;6r\x1b[?6h");
        assert_eq!(pos(&t), (2, 0));
        t.feed(b"\x1b[2;2H");
        assert_eq!(pos(&t), (3, 1));
        t.feed(b"\x1b[9;1H");
        assert_eq!(pos(&t), (5, 0));
        t.feed(b"\x1b[6n");
        assert_eq!(t.take_replies(), vec!["\x1b[4;1R".to_owned()]);
        t.feed(b"\x1b[?6n");
        assert_eq!(t.take_replies(), vec!["\x1b[?6;1R".to_owned()]);
    }

    #[test]
    fn cuu_cud_stop_at_region_edges() {
        let mut t = fed(10, 10, "\x1b[3;6r\x1b[4;1H\x1b[9A");
        assert_eq!(pos(&t), (2, 0));
        t.feed(b"\x1b[9B");
        assert_eq!(pos(&t), (5, 0));
        t.feed(b"\x1b[10;1H\x1b[2A");
        assert_eq!(pos(&t), (7, 0));
    }

    #[test]
    fn backspace_clamps_without_reverse_wrap() {
        let t = fed(10, 3, "\x1b[2;1H\x08\x08");
        assert_eq!(pos(&t), (1, 0));
    }

    #[test]
    fn tabs_move_to_stops() {
        let mut t = fed(20, 1, "\t");
        assert_eq!(pos(&t), (0, 8));
        t.feed(b"\t\t");
        assert_eq!(pos(&t), (0, 19));
        t.feed(b"\x1b[Z");
        assert_eq!(pos(&t), (0, 16));
        t.feed(b"\x1b[3g\r\t");
        assert_eq!(pos(&t), (0, 19));
        t.feed(b"\x1b[5G\x1bH\r\t");
        assert_eq!(pos(&t), (0, 4));
    }

    // ── Save / restore ──────────────────────────────────────────────

    #[test]
    fn save_restore_includes_pen_and_charsets() {
        let mut t = fed(10, 5, "\x1b[2;3H\x1b[1;31m\x1b(0\x1b7\x1b[0m\x1b(B\x1b[H");
        t.feed(b"\x1b8");
        assert_eq!(pos(&t), (1, 2));
        let pen = &t.active_screen().pen;
        assert!(pen.attrs.flags.contains(SgrFlags::BOLD));
        assert_eq!(pen.attrs.fg, Color::Indexed(1));
        t.feed(b"q");
        assert_eq!(row(&t, 1), "  ─");
    }

    #[test]
    fn restore_without_save_homes() {
        let t = fed(10, 5, "\x1b[3;3H\x1b[1m\x1b8");
        assert_eq!(pos(&t), (0, 0));
        assert!(t.active_screen().pen.attrs.is_default());
    }

    // ── Alternate screen ────────────────────────────────────────────

    #[test]
    fn alternate_screen_keeps_primary_and_own_cursor() {
        let mut t = fed(10, 3, "main\x1b[?1049h");
        assert!(t.is_alternate_active());
        assert_eq!(row(&t, 0), "");
        t.feed(b"alt\r\n\r\n\r\nmore");
        assert_eq!(t.scrollback().len(), 0);
        t.feed(b"\x1b[?1049l");
        assert!(!t.is_alternate_active());
        assert_eq!(row(&t, 0), "main");
        assert_eq!(pos(&t), (0, 4));
    }

    #[test]
    fn alternate_screen_catches_up_on_resize() {
        let mut t = fed(10, 4, "\x1b[?47h");
        t.feed(b"\x1b[?47l");
        t.resize(6, 3).unwrap();
        t.feed(b"\x1b[?47h");
        assert_eq!(t.active_screen().cols(), 6);
        assert_eq!(t.active_screen().rows(), 3);
        assert!(t.active_screen().grid().is_consistent());
    }

    #[test]
    fn palette_overrides_follow_the_screen() {
        let mut t = fed(10, 3, "\x1b]4;1;#102030\x07");
        assert_eq!(t.palette().get(1), Rgb::new(0x10, 0x20, 0x30));
        t.feed(b"\x1b[?47h");
        assert_eq!(t.palette().get(1), crate::palette::default_color(1));
        t.feed(b"\x1b]4;2;#ffffff\x07\x1b[?47l");
        assert_eq!(t.palette().get(1), Rgb::new(0x10, 0x20, 0x30));
        assert_eq!(t.palette().get(2), crate::palette::default_color(2));
    }

    // ── Modes and reports ───────────────────────────────────────────

    #[test]
    fn device_attributes_and_status() {
        let mut t = fed(10, 3, "\x1b[c\x1b[>c\x1b[5n");
        assert_eq!(
            t.take_replies(),
            vec!["\x1b[?1;2c", "\x1b[>0;256;0c", "\x1b[0n"]
        );
        assert!(t.take_replies().is_empty());
    }

    #[test]
    fn palette_query_replies_with_xparse_color() {
        let mut t = fed(10, 3, "\x1b]4;1;?\x07");
        assert_eq!(t.take_replies(), vec!["\x1b]4;1;rgb:cdcd/0000/0000\x07"]);
    }

    #[test]
    fn reverse_video_swaps_default_colors() {
        let mut t = term(10, 3);
        let fg = t.resolve_color(Color::Default, true);
        let bg = t.resolve_color(Color::Default, false);
        t.feed(b"\x1b[?5h");
        assert_eq!(t.resolve_color(Color::Default, true), bg);
        assert_eq!(t.resolve_color(Color::Default, false), fg);
        assert_eq!(t.resolve_color(Color::Indexed(1), true), Rgb::new(205, 0, 0));
    }

    #[test]
    fn deccolm_clears_and_homes() {
        let t = fed(10, 3, "abc\r\ndef\x1b[?3h");
        assert_eq!(row(&t, 0), "");
        assert_eq!(row(&t, 1), "");
        assert_eq!(pos(&t), (0, 0));
        assert_eq!(t.cols(), 10);
    }

    #[test]
    fn host_events() {
        let mut t = fed(10, 3, "\x07\x1b]0;title\x07\x1b]52;c;aGVsbG8=\x07");
        assert_eq!(t.title(), "title");
        assert_eq!(
            t.take_events(),
            vec![
                TerminalEvent::Bell,
                TerminalEvent::TitleChanged("title".into()),
                TerminalEvent::ClipboardWrite("hello".into()),
            ]
        );
    }

    #[test]
    fn hyperlink_is_shared_by_written_cells() {
        let t = fed(10, 1, "\x1b]8;;https://a.test\x07ab\x1b]8;;\x07c");
        let r = t.active_screen().row(0).unwrap();
        let a = r.cell(0).unwrap().hyperlink.clone().unwrap();
        let b = r.cell(1).unwrap().hyperlink.clone().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(r.cell(2).unwrap().hyperlink.is_none());
    }

    // ── Resets ──────────────────────────────────────────────────────

    #[test]
    fn full_reset_keeps_scrollback_and_size() {
        let mut t = fed(5, 2, "a\r\nb\r\nc\x1b[?6h\x1b[1m\x1b[2;2r");
        t.feed(b"\x1bc");
        assert_eq!(t.scrollback().len(), 1);
        assert_eq!((t.cols(), t.rows()), (5, 2));
        assert_eq!(row(&t, 0), "");
        assert!(!t.modes().origin());
        assert_eq!(t.scroll_region(), None);
        assert_eq!(t.active_screen().pen.attrs, SgrAttrs::default());
    }

    #[test]
    fn soft_reset_keeps_screen_contents() {
        let t = fed(10, 3, "keep\x1b[4h\x1b[?6h\x1b[7m\x1b[!p");
        assert_eq!(row(&t, 0), "keep");
        assert!(!t.modes().insert());
        assert!(!t.modes().origin());
        assert!(t.active_screen().pen.attrs.is_default());
    }

    // ── Resize ──────────────────────────────────────────────────────

    #[test]
    fn shrinking_drops_blank_rows_below_cursor_first() {
        let mut t = fed(10, 5, "a\r\nb");
        t.resize(10, 3).unwrap();
        assert_eq!(t.scrollback().len(), 0);
        assert_eq!(row(&t, 0), "a");
        assert_eq!(pos(&t), (1, 1));
    }

    #[test]
    fn shrinking_past_cursor_pushes_rows_to_scrollback() {
        let mut t = fed(10, 4, "a\r\nb\r\nc\r\nd");
        t.resize(10, 2).unwrap();
        assert_eq!(t.scrollback().len(), 2);
        assert_eq!(row(&t, 0), "c");
        assert_eq!(pos(&t), (1, 1));
        t.resize(10, 4).unwrap();
        assert_eq!(row(&t, 0), "c");
        assert_eq!(row(&t, 3), "");
    }

    #[test]
    fn narrowing_truncates_rows_and_tabs() {
        let mut t = fed(20, 2, "0123456789abcdefghij");
        t.resize(8, 2).unwrap();
        assert_eq!(row(&t, 0), "01234567");
        assert_eq!(pos(&t).1, 7);
        t.feed(b"\r\t");
        assert_eq!(pos(&t).1, 7);
    }

    #[test]
    fn resize_clears_scroll_region() {
        let mut t = fed(10, 10, "\x1b[2;5r");
        t.resize(10, 8).unwrap();
        assert_eq!(t.scroll_region(), None);
    }

    #[test]
    fn notice_is_inverse_and_cursor_returns() {
        let mut t = fed(40, 2, "$ ");
        t.show_notice("[lost]");
        assert_eq!(row(&t, 0), "$ [lost]");
        assert_eq!(pos(&t), (0, 2));
        let cell = t.active_screen().row(0).unwrap().cell(2).unwrap();
        assert!(cell.attrs.flags.contains(SgrFlags::INVERSE));
        assert!(t.active_screen().pen.attrs.is_default());
    }

    #[test]
    fn damage_tracks_touched_rows() {
        let mut t = term(10, 5);
        let _ = t.take_damage();
        t.feed(b"\x1b[3;1Hx");
        let damage = t.take_damage();
        assert!(!damage.full);
        assert!(damage.contains(2));
        assert!(!damage.contains(4));
        assert!(t.take_damage().is_empty());
    }
}
