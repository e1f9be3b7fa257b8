//! Character set designation and invocation (G0-G3, GL/GR, single shifts).

use serde::{Deserialize, Serialize};

/// A 94/96-character graphic set that can be designated into G0-G3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    /// US ASCII (`ESC ( B`).
    #[default]
    Ascii,
    /// DEC Special Graphics / line drawing (`ESC ( 0`).
    DecSpecialGraphics,
    /// United Kingdom: `#` becomes `£` (`ESC ( A`).
    British,
}

impl Charset {
    /// Map a designator final byte to a charset. Unknown sets fall back to
    /// ASCII so stray designations never garble output.
    #[must_use]
    pub fn from_designator(final_byte: u8) -> Self {
        match final_byte {
            b'0' | b'2' => Self::DecSpecialGraphics,
            b'A' => Self::British,
            _ => Self::Ascii,
        }
    }

    /// Translate a 7-bit graphic character through this set.
    #[must_use]
    pub fn map(self, ch: char) -> char {
        match self {
            Self::Ascii => ch,
            Self::British => {
                if ch == '#' {
                    '£'
                } else {
                    ch
                }
            }
            Self::DecSpecialGraphics => dec_special_graphics(ch),
        }
    }
}

fn dec_special_graphics(ch: char) -> char {
    match ch {
        '_' => '\u{00A0}',
        '`' => '◆',
        'a' => '▒',
        'b' => '␉',
        'c' => '␌',
        'd' => '␍',
        'e' => '␊',
        'f' => '°',
        'g' => '±',
        'h' => '␤',
        'i' => '␋',
        'j' => '┘',
        'k' => '┐',
        'l' => '┌',
        'm' => '└',
        'n' => '┼',
        'o' => '⎺',
        'p' => '⎻',
        'q' => '─',
        'r' => '⎼',
        's' => '⎽',
        't' => '├',
        'u' => '┤',
        'v' => '┴',
        'w' => '┬',
        'x' => '│',
        'y' => '≤',
        'z' => '≥',
        '{' => 'π',
        '|' => '≠',
        '}' => '£',
        '~' => '·',
        other => other,
    }
}

/// Designated sets plus which of them GL and GR currently invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharsetState {
    slots: [Charset; 4],
    gl: u8,
    gr: u8,
    single_shift: Option<u8>,
}

impl CharsetState {
    /// Designate `charset` into slot G`slot` (0-3).
    pub fn designate(&mut self, slot: u8, charset: Charset) {
        if let Some(entry) = self.slots.get_mut(usize::from(slot)) {
            *entry = charset;
        }
    }

    /// Locking shift into GL (SI = 0, SO = 1, LS2, LS3).
    pub fn lock_gl(&mut self, slot: u8) {
        if slot < 4 {
            self.gl = slot;
        }
    }

    /// Locking shift into GR (LS1R, LS2R, LS3R).
    pub fn lock_gr(&mut self, slot: u8) {
        if slot < 4 {
            self.gr = slot;
        }
    }

    /// SS2 / SS3: the next graphic character alone uses `slot`.
    pub fn single_shift(&mut self, slot: u8) {
        if slot < 4 {
            self.single_shift = Some(slot);
        }
    }

    #[must_use]
    pub fn slot(&self, slot: u8) -> Charset {
        self.slots
            .get(usize::from(slot))
            .copied()
            .unwrap_or_default()
    }

    /// Translate one printable character.
    ///
    /// 7-bit graphics go through GL (or the pending single shift). In 8-bit
    /// mode, 0xA0-0xFF go through GR. Everything else passes unchanged.
    pub fn translate(&mut self, ch: char, eight_bit: bool) -> char {
        let shifted = self.single_shift.take();
        let code = u32::from(ch);
        if (0x20..0x7F).contains(&code) {
            let slot = shifted.unwrap_or(self.gl);
            return self.slot(slot).map(ch);
        }
        if eight_bit && (0xA0..=0xFF).contains(&code) {
            let slot = shifted.unwrap_or(self.gr);
            let low = char::from_u32(code - 0x80).unwrap_or(ch);
            let mapped = self.slot(slot).map(low);
            if mapped == low {
                return ch;
            }
            return mapped;
        }
        ch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_ascii_passthrough() {
        let mut cs = CharsetState::default();
        assert_eq!(cs.translate('q', false), 'q');
        assert_eq!(cs.translate('中', false), '中');
    }

    #[test]
    fn dec_graphics_in_g0_draws_lines() {
        let mut cs = CharsetState::default();
        cs.designate(0, Charset::from_designator(b'0'));
        assert_eq!(cs.translate('q', false), '─');
        assert_eq!(cs.translate('x', false), '│');
        assert_eq!(cs.translate('A', false), 'A');
    }

    #[test]
    fn shift_out_selects_g1() {
        let mut cs = CharsetState::default();
        cs.designate(1, Charset::DecSpecialGraphics);
        assert_eq!(cs.translate('l', false), 'l');
        cs.lock_gl(1);
        assert_eq!(cs.translate('l', false), '┌');
        cs.lock_gl(0);
        assert_eq!(cs.translate('l', false), 'l');
    }

    #[test]
    fn single_shift_applies_to_one_character() {
        let mut cs = CharsetState::default();
        cs.designate(2, Charset::British);
        cs.single_shift(2);
        assert_eq!(cs.translate('#', false), '£');
        assert_eq!(cs.translate('#', false), '#');
    }

    #[test]
    fn gr_only_applies_in_eight_bit_mode() {
        let mut cs = CharsetState::default();
        cs.designate(2, Charset::DecSpecialGraphics);
        cs.lock_gr(2);
        assert_eq!(cs.translate('\u{00F1}', false), '\u{00F1}');
        assert_eq!(cs.translate('\u{00F1}', true), '─');
    }

    #[test]
    fn unknown_designator_is_ascii() {
        assert_eq!(Charset::from_designator(b'Z'), Charset::Ascii);
    }
}
