//! Damaged rows as styled runs for the JS drawing side.
//!
//! A [`RenderFrame`] carries only the rows named by a [`Damage`] set (or all
//! rows on a full repaint). Colors are resolved to `#rrggbb` against the
//! live palette, with inverse video already applied, so the drawing code
//! never needs the palette itself.

use serde::Serialize;
use werm_core::{Color, CursorShape, Damage, SgrFlags, StyledRun, Terminal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderFrame {
    pub cols: u16,
    pub rows: u16,
    /// Every row is present; stale drawing state may be discarded.
    pub full: bool,
    pub lines: Vec<LinePatch>,
    pub cursor: CursorPatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinePatch {
    /// Screen row, 0-based.
    pub row: u16,
    /// Absolute row id, stable while the row scrolls through history.
    pub id: u64,
    pub wrapped: bool,
    pub runs: Vec<RunPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunPatch {
    pub col: u16,
    pub width: u16,
    pub text: String,
    pub fg: String,
    pub bg: String,
    /// [`SgrFlags`] bits.
    pub flags: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub wide: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CursorPatch {
    pub row: u16,
    pub col: u16,
    pub visible: bool,
    pub shape: CursorShape,
    pub blink: bool,
}

impl RenderFrame {
    /// Build the frame for `damage` from the active screen.
    #[must_use]
    pub fn collect(terminal: &Terminal, damage: &Damage) -> Self {
        let screen = terminal.active_screen();
        let rows = terminal.rows();
        let lines = (0..rows)
            .filter(|&r| damage.contains(r))
            .filter_map(|r| {
                let row = screen.row(r)?;
                Some(LinePatch {
                    row: r,
                    id: terminal.absolute_row(r),
                    wrapped: row.is_wrapped(),
                    runs: row.runs().iter().map(|run| run_patch(terminal, run)).collect(),
                })
            })
            .collect();

        let cursor = terminal.cursor();
        let style = terminal.cursor_style();
        Self {
            cols: terminal.cols(),
            rows,
            full: damage.full,
            lines,
            cursor: CursorPatch {
                row: cursor.row,
                col: cursor.col,
                visible: terminal.cursor_visible(),
                shape: style.shape,
                blink: style.blink,
            },
        }
    }

    /// Whether there is nothing to draw but the cursor.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && !self.full
    }
}

fn run_patch(terminal: &Terminal, run: &StyledRun) -> RunPatch {
    let flags = run.attrs.flags;
    let (mut fg, mut bg) = (
        terminal.resolve_color(run.attrs.fg, true),
        terminal.resolve_color(run.attrs.bg, false),
    );
    if flags.contains(SgrFlags::INVERSE) {
        std::mem::swap(&mut fg, &mut bg);
    }
    let underline = (flags.intersects(SgrFlags::ANY_UNDERLINE)
        && run.attrs.underline_color != Color::Default)
        .then(|| terminal.resolve_color(run.attrs.underline_color, true).to_hex());
    RunPatch {
        col: run.start_col,
        width: run.width,
        text: run.text.clone(),
        fg: fg.to_hex(),
        bg: bg.to_hex(),
        flags: flags.bits(),
        underline,
        link: run.hyperlink.as_deref().map(str::to_owned),
        wide: run.wide,
    }
}
