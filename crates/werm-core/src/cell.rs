//! Terminal cell: the fundamental unit of a screen row.
//!
//! Each cell stores one base character (plus any combining marks that joined
//! it), its display width, and the SGR attributes of the pen that wrote it.
//! Wide characters occupy two cells: a leading cell flagged
//! [`CellFlags::WIDE_CHAR`] and an empty [`CellFlags::WIDE_CONTINUATION`]
//! cell immediately to its right.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// SGR text attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SgrFlags: u16 {
        const BOLD             = 1 << 0;
        const FAINT            = 1 << 1;
        const ITALIC           = 1 << 2;
        const UNDERLINE        = 1 << 3;
        const DOUBLE_UNDERLINE = 1 << 4;
        const CURLY_UNDERLINE  = 1 << 5;
        const BLINK            = 1 << 6;
        const INVERSE          = 1 << 7;
        const INVISIBLE        = 1 << 8;
        const STRIKETHROUGH    = 1 << 9;
        const OVERLINE         = 1 << 10;

        const ANY_UNDERLINE = Self::UNDERLINE.bits()
            | Self::DOUBLE_UNDERLINE.bits()
            | Self::CURLY_UNDERLINE.bits();
    }
}

bitflags! {
    /// Cell-level flags that are orthogonal to SGR attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        /// Leading (left) cell of a two-column character.
        const WIDE_CHAR = 1 << 0;
        /// Trailing half of a two-column character. Carries no content.
        const WIDE_CONTINUATION = 1 << 1;
    }
}

/// Where a cell takes a color from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// Terminal default (SGR 39 / 49 / 59).
    #[default]
    Default,
    /// Palette entry 0-255.
    Indexed(u8),
    /// Literal 24-bit color.
    Rgb(u8, u8, u8),
}

/// SGR attributes shared by every cell a pen writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SgrAttrs {
    pub flags: SgrFlags,
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `Color::Default` follows the foreground.
    pub underline_color: Color,
}

impl SgrAttrs {
    /// Reset all attributes to default (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether every attribute is at its default value.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// The current text-attribute state used for newly written cells.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pen {
    pub attrs: SgrAttrs,
    /// Active OSC 8 hyperlink target, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Arc<str>>,
}

impl Pen {
    /// Whether this pen would write unstyled, unlinked cells.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.attrs.is_default() && self.hyperlink.is_none()
    }
}

/// A single cell in a screen row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    ch: char,
    /// Zero-width code points that joined `ch` (combining marks, ZWJ, VS16).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    combining: Option<Box<str>>,
    width: u8,
    #[serde(default)]
    pub flags: CellFlags,
    #[serde(default)]
    pub attrs: SgrAttrs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hyperlink: Option<Arc<str>>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            combining: None,
            width: 1,
            flags: CellFlags::empty(),
            attrs: SgrAttrs::default(),
            hyperlink: None,
        }
    }
}

impl Cell {
    /// Create a narrow cell with default attributes.
    #[must_use]
    pub fn new(ch: char) -> Self {
        Self {
            ch,
            ..Self::default()
        }
    }

    /// Create a narrow cell written with `pen`.
    #[must_use]
    pub fn styled(ch: char, pen: &Pen) -> Self {
        Self {
            ch,
            combining: None,
            width: 1,
            flags: CellFlags::empty(),
            attrs: pen.attrs,
            hyperlink: pen.hyperlink.clone(),
        }
    }

    /// Create the `(leading, continuation)` pair for a wide character.
    #[must_use]
    pub fn wide(ch: char, pen: &Pen) -> (Self, Self) {
        let leading = Self {
            ch,
            combining: None,
            width: 2,
            flags: CellFlags::WIDE_CHAR,
            attrs: pen.attrs,
            hyperlink: pen.hyperlink.clone(),
        };
        let continuation = Self {
            ch: ' ',
            combining: None,
            width: 0,
            flags: CellFlags::WIDE_CONTINUATION,
            attrs: pen.attrs,
            hyperlink: pen.hyperlink.clone(),
        };
        (leading, continuation)
    }

    /// A blank cell carrying only a background color (erase with BCE).
    #[must_use]
    pub fn blank(bg: Color) -> Self {
        Self {
            attrs: SgrAttrs {
                bg,
                ..SgrAttrs::default()
            },
            ..Self::default()
        }
    }

    /// The base character of this cell.
    #[must_use]
    pub fn content(&self) -> char {
        self.ch
    }

    /// Combining marks attached to the base character.
    #[must_use]
    pub fn combining(&self) -> Option<&str> {
        self.combining.as_deref()
    }

    /// Display width in columns (0 for continuation cells).
    #[must_use]
    pub fn width(&self) -> u8 {
        self.width
    }

    #[must_use]
    pub fn is_wide(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CHAR)
    }

    #[must_use]
    pub fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Whether this cell is visually and semantically an untouched blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.ch == ' '
            && self.combining.is_none()
            && self.flags.is_empty()
            && self.attrs.is_default()
            && self.hyperlink.is_none()
    }

    /// Whether the cell was written with exactly this pen.
    #[must_use]
    pub fn has_pen(&self, pen: &Pen) -> bool {
        self.attrs == pen.attrs && self.hyperlink == pen.hyperlink
    }

    /// Append a zero-width code point to this cell's grapheme.
    pub fn push_combining(&mut self, mark: char) {
        let mut joined = self.combining.take().map(String::from).unwrap_or_default();
        joined.push(mark);
        self.combining = Some(joined.into_boxed_str());
    }

    /// Append this cell's grapheme to `out`. Continuation cells add nothing.
    pub fn push_text(&self, out: &mut String) {
        if self.is_wide_continuation() {
            return;
        }
        out.push(self.ch);
        if let Some(marks) = &self.combining {
            out.push_str(marks);
        }
    }

    /// Reset this cell to a blank that keeps only the given background.
    pub fn erase(&mut self, bg: Color) {
        *self = Self::blank(bg);
    }
}
