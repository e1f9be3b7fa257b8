//! SGR (`CSI ... m`) interpretation.
//!
//! Extended colors are accepted in both the colon form (`38:2::r:g:b`,
//! `38:5:n`) and the legacy semicolon form (`38;2;r;g;b`, `38;5;n`).

use crate::cell::{Color, SgrAttrs, SgrFlags};
use crate::parser::CsiParams;

fn channel(v: Option<u16>) -> u8 {
    v.unwrap_or(0).min(255) as u8
}

/// Decode an extended color from colon sub-parameters (`38:5:n`,
/// `38:2:r:g:b`, `38:2:cs:r:g:b`).
fn color_from_subs(subs: &[Option<u16>]) -> Option<Color> {
    match subs.first().copied().flatten()? {
        5 => Some(Color::Indexed(channel(subs.get(1).copied().flatten()))),
        2 => {
            let rgb = if subs.len() >= 5 { &subs[2..5] } else { subs.get(1..4)? };
            Some(Color::Rgb(channel(rgb[0]), channel(rgb[1]), channel(rgb[2])))
        }
        _ => None,
    }
}

impl SgrAttrs {
    /// Apply one SGR parameter list. An empty list is `SGR 0`.
    pub fn apply_sgr(&mut self, params: &CsiParams) {
        if params.is_empty() {
            self.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            let code = params.raw(i).unwrap_or(0);
            let subs = params.subs(i);
            match code {
                0 => self.reset(),
                1 => self.flags.insert(SgrFlags::BOLD),
                2 => self.flags.insert(SgrFlags::FAINT),
                3 => self.flags.insert(SgrFlags::ITALIC),
                4 => {
                    self.flags.remove(SgrFlags::ANY_UNDERLINE);
                    match subs.first().copied().flatten().unwrap_or(1) {
                        0 => {}
                        2 => self.flags.insert(SgrFlags::DOUBLE_UNDERLINE),
                        3 => self.flags.insert(SgrFlags::CURLY_UNDERLINE),
                        _ => self.flags.insert(SgrFlags::UNDERLINE),
                    }
                }
                5 | 6 => self.flags.insert(SgrFlags::BLINK),
                7 => self.flags.insert(SgrFlags::INVERSE),
                8 => self.flags.insert(SgrFlags::INVISIBLE),
                9 => self.flags.insert(SgrFlags::STRIKETHROUGH),
                21 => {
                    self.flags.remove(SgrFlags::ANY_UNDERLINE);
                    self.flags.insert(SgrFlags::DOUBLE_UNDERLINE);
                }
                22 => self.flags.remove(SgrFlags::BOLD | SgrFlags::FAINT),
                23 => self.flags.remove(SgrFlags::ITALIC),
                24 => self.flags.remove(SgrFlags::ANY_UNDERLINE),
                25 => self.flags.remove(SgrFlags::BLINK),
                27 => self.flags.remove(SgrFlags::INVERSE),
                28 => self.flags.remove(SgrFlags::INVISIBLE),
                29 => self.flags.remove(SgrFlags::STRIKETHROUGH),
                30..=37 => self.fg = Color::Indexed((code - 30) as u8),
                39 => self.fg = Color::Default,
                40..=47 => self.bg = Color::Indexed((code - 40) as u8),
                49 => self.bg = Color::Default,
                53 => self.flags.insert(SgrFlags::OVERLINE),
                55 => self.flags.remove(SgrFlags::OVERLINE),
                59 => self.underline_color = Color::Default,
                90..=97 => self.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.bg = Color::Indexed((code - 100 + 8) as u8),
                38 | 48 | 58 => {
                    let color = if subs.is_empty() {
                        let (color, used) = Self::color_from_list(params, i + 1);
                        i += used;
                        color
                    } else {
                        color_from_subs(subs)
                    };
                    if let Some(color) = color {
                        match code {
                            38 => self.fg = color,
                            48 => self.bg = color,
                            _ => self.underline_color = color,
                        }
                    }
                }
                _ => tracing::trace!(code, "ignoring unsupported SGR parameter"),
            }
            i += 1;
        }
    }

    /// Legacy semicolon form starting at `at`: returns the color and how
    /// many parameters it consumed.
    fn color_from_list(params: &CsiParams, at: usize) -> (Option<Color>, usize) {
        match params.raw(at) {
            Some(5) => {
                let index = channel(params.raw(at + 1));
                (Some(Color::Indexed(index)), 2)
            }
            Some(2) => {
                let color = Color::Rgb(
                    channel(params.raw(at + 1)),
                    channel(params.raw(at + 2)),
                    channel(params.raw(at + 3)),
                );
                (Some(color), 4)
            }
            _ => (None, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Action, Parser};

    fn sgr(seq: &str) -> SgrAttrs {
        sgr_from(SgrAttrs::default(), seq)
    }

    fn sgr_from(mut attrs: SgrAttrs, seq: &str) -> SgrAttrs {
        let mut parser = Parser::new();
        for action in parser.feed(format!("\x1b[{seq}m").as_bytes()) {
            if let Action::Sgr(params) = action {
                attrs.apply_sgr(&params);
            }
        }
        attrs
    }

    #[test]
    fn reset_forms() {
        let bold = sgr("1;31");
        assert!(sgr_from(bold, "").is_default());
        assert!(sgr_from(bold, "0").is_default());
    }

    #[test]
    fn basic_flags_and_their_resets() {
        let a = sgr("1;2;3;4;5;7;8;9;53");
        for flag in [
            SgrFlags::BOLD,
            SgrFlags::FAINT,
            SgrFlags::ITALIC,
            SgrFlags::UNDERLINE,
            SgrFlags::BLINK,
            SgrFlags::INVERSE,
            SgrFlags::INVISIBLE,
            SgrFlags::STRIKETHROUGH,
            SgrFlags::OVERLINE,
        ] {
            assert!(a.flags.contains(flag), "{flag:?}");
        }
        let cleared = sgr_from(a, "22;23;24;25;27;28;29;55");
        assert!(cleared.flags.is_empty());
    }

    #[test]
    fn ansi_and_bright_colors() {
        let a = sgr("31;42");
        assert_eq!(a.fg, Color::Indexed(1));
        assert_eq!(a.bg, Color::Indexed(2));
        let a = sgr("91;107");
        assert_eq!(a.fg, Color::Indexed(9));
        assert_eq!(a.bg, Color::Indexed(15));
        let a = sgr_from(a, "39;49");
        assert_eq!((a.fg, a.bg), (Color::Default, Color::Default));
    }

    #[test]
    fn extended_colors_semicolon_form() {
        let a = sgr("38;5;196;48;2;1;2;3;1");
        assert_eq!(a.fg, Color::Indexed(196));
        assert_eq!(a.bg, Color::Rgb(1, 2, 3));
        assert!(a.flags.contains(SgrFlags::BOLD));
    }

    #[test]
    fn extended_colors_colon_form() {
        let a = sgr("38:2::10:20:30;48:5:17;58:2:1:2:3");
        assert_eq!(a.fg, Color::Rgb(10, 20, 30));
        assert_eq!(a.bg, Color::Indexed(17));
        assert_eq!(a.underline_color, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn underline_styles() {
        assert!(sgr("4:3").flags.contains(SgrFlags::CURLY_UNDERLINE));
        assert!(sgr("4:2").flags.contains(SgrFlags::DOUBLE_UNDERLINE));
        assert!(sgr("21").flags.contains(SgrFlags::DOUBLE_UNDERLINE));
        let none = sgr_from(sgr("4"), "4:0");
        assert!(!none.flags.intersects(SgrFlags::ANY_UNDERLINE));
    }

    #[test]
    fn unknown_parameters_are_skipped() {
        let a = sgr("1;73;31");
        assert!(a.flags.contains(SgrFlags::BOLD));
        assert_eq!(a.fg, Color::Indexed(1));
    }
}
