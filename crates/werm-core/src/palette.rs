//! 256-entry color palette plus the dynamic default colors.
//!
//! Entries start at the xterm defaults (16 base colors, the 6x6x6 cube,
//! a 24-step gray ramp). OSC 4 / 104 change and restore single entries and
//! OSC 10-12 / 110-112 the default foreground, background and cursor.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::cell::Color;

/// An RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `rgb:rrrr/gggg/bbbb`, the form xterm uses to answer color queries.
    #[must_use]
    pub fn to_xparse(self) -> String {
        let mut out = String::with_capacity(18);
        let _ = write!(
            out,
            "rgb:{:04x}/{:04x}/{:04x}",
            u16::from(self.r) * 257,
            u16::from(self.g) * 257,
            u16::from(self.b) * 257
        );
        out
    }

    /// `#rrggbb`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

const BASE16: [Rgb; 16] = [
    Rgb::new(0, 0, 0),
    Rgb::new(205, 0, 0),
    Rgb::new(0, 205, 0),
    Rgb::new(205, 205, 0),
    Rgb::new(0, 0, 238),
    Rgb::new(205, 0, 205),
    Rgb::new(0, 205, 205),
    Rgb::new(229, 229, 229),
    Rgb::new(127, 127, 127),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(92, 92, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 255),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// The xterm default for palette entry `index`.
#[must_use]
pub fn default_color(index: u8) -> Rgb {
    match index {
        0..=15 => BASE16[usize::from(index)],
        16..=231 => {
            let i = index - 16;
            Rgb::new(
                CUBE_LEVELS[usize::from(i / 36)],
                CUBE_LEVELS[usize::from((i / 6) % 6)],
                CUBE_LEVELS[usize::from(i % 6)],
            )
        }
        232..=255 => {
            let gray = 8 + 10 * (index - 232);
            Rgb::new(gray, gray, gray)
        }
    }
}

/// The three dynamic colors addressed by OSC 10, 11 and 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicColor {
    Foreground,
    Background,
    Cursor,
}

impl DynamicColor {
    /// Map OSC 10..=12 (or 110..=112) to a dynamic color.
    #[must_use]
    pub fn from_osc(code: u16) -> Option<Self> {
        match code {
            10 | 110 => Some(Self::Foreground),
            11 | 111 => Some(Self::Background),
            12 | 112 => Some(Self::Cursor),
            _ => None,
        }
    }
}

const DEFAULT_FOREGROUND: Rgb = Rgb::new(229, 229, 229);
const DEFAULT_BACKGROUND: Rgb = Rgb::new(0, 0, 0);
const DEFAULT_CURSOR: Rgb = Rgb::new(255, 255, 255);

/// The effective color table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<Rgb>,
    pub foreground: Rgb,
    pub background: Rgb,
    pub cursor: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            entries: (0..=255).map(default_color).collect(),
            foreground: DEFAULT_FOREGROUND,
            background: DEFAULT_BACKGROUND,
            cursor: DEFAULT_CURSOR,
        }
    }
}

impl Palette {
    #[must_use]
    pub fn get(&self, index: u8) -> Rgb {
        self.entries
            .get(usize::from(index))
            .copied()
            .unwrap_or_else(|| default_color(index))
    }

    pub fn set(&mut self, index: u8, rgb: Rgb) {
        if let Some(entry) = self.entries.get_mut(usize::from(index)) {
            *entry = rgb;
        }
    }

    /// Restore one entry to its default.
    pub fn reset(&mut self, index: u8) {
        self.set(index, default_color(index));
    }

    /// Restore every entry and the dynamic colors.
    pub fn reset_all(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn dynamic(&self, which: DynamicColor) -> Rgb {
        match which {
            DynamicColor::Foreground => self.foreground,
            DynamicColor::Background => self.background,
            DynamicColor::Cursor => self.cursor,
        }
    }

    pub fn set_dynamic(&mut self, which: DynamicColor, rgb: Rgb) {
        match which {
            DynamicColor::Foreground => self.foreground = rgb,
            DynamicColor::Background => self.background = rgb,
            DynamicColor::Cursor => self.cursor = rgb,
        }
    }

    pub fn reset_dynamic(&mut self, which: DynamicColor) {
        let rgb = match which {
            DynamicColor::Foreground => DEFAULT_FOREGROUND,
            DynamicColor::Background => DEFAULT_BACKGROUND,
            DynamicColor::Cursor => DEFAULT_CURSOR,
        };
        self.set_dynamic(which, rgb);
    }

    /// Resolve a cell color source. `Color::Default` picks the default
    /// foreground or background depending on `foreground`.
    #[must_use]
    pub fn resolve(&self, color: Color, foreground: bool) -> Rgb {
        match color {
            Color::Default if foreground => self.foreground,
            Color::Default => self.background,
            Color::Indexed(i) => self.get(i),
            Color::Rgb(r, g, b) => Rgb::new(r, g, b),
        }
    }
}

/// Parse an X11 color specification: `rgb:r/g/b` with 1-4 hex digits per
/// channel, or `#rgb` / `#rrggbb` / `#rrrgggbbb` / `#rrrrggggbbbb`.
#[must_use]
pub fn parse_color_spec(spec: &str) -> Option<Rgb> {
    let spec = spec.trim();
    if let Some(body) = spec.strip_prefix("rgb:") {
        let mut parts = body.split('/');
        let r = scale_channel(parts.next()?)?;
        let g = scale_channel(parts.next()?)?;
        let b = scale_channel(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        return Some(Rgb::new(r, g, b));
    }
    let hex = spec.strip_prefix('#')?;
    if hex.is_empty() || hex.len() % 3 != 0 || hex.len() > 12 || !hex.is_ascii() {
        return None;
    }
    let n = hex.len() / 3;
    let channel = |i: usize| -> Option<u8> {
        let v = u32::from_str_radix(&hex[i * n..(i + 1) * n], 16).ok()?;
        let bits = 4 * n as u32;
        let scaled = if bits <= 8 { v << (8 - bits) } else { v >> (bits - 8) };
        Some(scaled as u8)
    };
    Some(Rgb::new(channel(0)?, channel(1)?, channel(2)?))
}

/// Scale an `rgb:` channel of 1-4 hex digits to 8 bits.
fn scale_channel(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let v = u32::from_str_radix(digits, 16).ok()?;
    let max = (1u32 << (4 * digits.len())) - 1;
    Some(((v * 255 + max / 2) / max) as u8)
}
