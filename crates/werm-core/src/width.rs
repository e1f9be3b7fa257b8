//! Configurable Unicode character width policy.
//!
//! Terminals disagree on East Asian Ambiguous characters (box drawing, Greek,
//! some arrows). CJK locales draw them double-width; Western locales do not.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

/// How the engine measures the display width of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WidthPolicy {
    /// `UnicodeWidthChar::width`: ambiguous characters are narrow.
    #[default]
    Standard,
    /// `UnicodeWidthChar::width_cjk`: ambiguous characters are wide.
    CjkAmbiguousWide,
}

impl WidthPolicy {
    /// Terminal width of `ch`: 0 for marks and format controls, else 1 or 2.
    #[inline]
    #[must_use]
    pub fn char_width(self, ch: char) -> u8 {
        let w = match self {
            Self::Standard => UnicodeWidthChar::width(ch).unwrap_or(0),
            Self::CjkAmbiguousWide => UnicodeWidthChar::width_cjk(ch).unwrap_or(0),
        };
        w.min(2) as u8
    }

    /// Total column width of a string under this policy.
    #[must_use]
    pub fn str_width(self, text: &str) -> usize {
        text.chars().map(|ch| usize::from(self.char_width(ch))).sum()
    }
}
