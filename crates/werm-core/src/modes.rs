//! Terminal modes (ANSI SM/RM and DEC private DECSET/DECRST).
//!
//! Pure state with small helpers so the controller can toggle modes by
//! number. Modes with side effects (alternate screen, DECCOLM) are applied by
//! [`crate::terminal::Terminal`]; this module only records them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Boolean mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ModeFlags: u32 {
        /// DECCKM (?1): cursor keys send SS3 sequences.
        const APPLICATION_CURSOR = 1 << 0;
        /// DECSCNM (?5): swap default foreground and background.
        const REVERSE_VIDEO = 1 << 1;
        /// DECOM (?6): cursor addressing relative to the scroll region.
        const ORIGIN = 1 << 2;
        /// DECAWM (?7): wrap at the right margin.
        const WRAPAROUND = 1 << 3;
        /// ?12: blinking cursor.
        const CURSOR_BLINK = 1 << 4;
        /// DECTCEM (?25).
        const CURSOR_VISIBLE = 1 << 5;
        /// ?45: backspace past column 0 wraps to the previous row.
        const REVERSE_WRAPAROUND = 1 << 6;
        /// ?47 / ?1047 / ?1049.
        const ALTERNATE_SCREEN = 1 << 7;
        /// ?1004: report focus in/out.
        const FOCUS_EVENTS = 1 << 8;
        /// ?1007: wheel sends arrow keys on the alternate screen.
        const ALTERNATE_SCROLL = 1 << 9;
        /// ?2004.
        const BRACKETED_PASTE = 1 << 10;
        /// DECKPAM / DECKPNM.
        const APPLICATION_KEYPAD = 1 << 11;
        /// IRM (4): printing shifts the rest of the row right.
        const INSERT = 1 << 12;
        /// LNM (20): line feed also returns the carriage.
        const AUTO_CR = 1 << 13;
    }
}

/// Which mouse events are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseTracking {
    #[default]
    Off,
    /// ?9: press only, no modifiers.
    X10,
    /// ?1000: press and release.
    Normal,
    /// ?1002: plus motion while a button is held.
    ButtonEvent,
    /// ?1003: all motion.
    AnyEvent,
}

/// How mouse coordinates are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseEncoding {
    #[default]
    Default,
    /// ?1005.
    Utf8,
    /// ?1006.
    Sgr,
}

/// Combined mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    pub flags: ModeFlags,
    pub mouse_tracking: MouseTracking,
    pub mouse_encoding: MouseEncoding,
}

impl Default for Modes {
    fn default() -> Self {
        Self::new()
    }
}

impl Modes {
    /// Power-on defaults: wraparound on, cursor visible and blinking.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: ModeFlags::WRAPAROUND | ModeFlags::CURSOR_VISIBLE | ModeFlags::CURSOR_BLINK,
            mouse_tracking: MouseTracking::Off,
            mouse_encoding: MouseEncoding::Default,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[must_use]
    pub fn contains(&self, flag: ModeFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn set(&mut self, flag: ModeFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    #[must_use]
    pub fn origin(&self) -> bool {
        self.contains(ModeFlags::ORIGIN)
    }

    #[must_use]
    pub fn wraparound(&self) -> bool {
        self.contains(ModeFlags::WRAPAROUND)
    }

    #[must_use]
    pub fn reverse_wraparound(&self) -> bool {
        self.contains(ModeFlags::REVERSE_WRAPAROUND)
    }

    #[must_use]
    pub fn insert(&self) -> bool {
        self.contains(ModeFlags::INSERT)
    }

    #[must_use]
    pub fn auto_cr(&self) -> bool {
        self.contains(ModeFlags::AUTO_CR)
    }

    #[must_use]
    pub fn cursor_visible(&self) -> bool {
        self.contains(ModeFlags::CURSOR_VISIBLE)
    }

    #[must_use]
    pub fn mouse_reporting(&self) -> bool {
        self.mouse_tracking != MouseTracking::Off
    }

    // ── By number ───────────────────────────────────────────────────

    fn dec_flag_for_mode(mode: u16) -> Option<ModeFlags> {
        Some(match mode {
            1 => ModeFlags::APPLICATION_CURSOR,
            5 => ModeFlags::REVERSE_VIDEO,
            6 => ModeFlags::ORIGIN,
            7 => ModeFlags::WRAPAROUND,
            12 => ModeFlags::CURSOR_BLINK,
            25 => ModeFlags::CURSOR_VISIBLE,
            45 => ModeFlags::REVERSE_WRAPAROUND,
            47 | 1047 | 1049 => ModeFlags::ALTERNATE_SCREEN,
            1004 => ModeFlags::FOCUS_EVENTS,
            1007 => ModeFlags::ALTERNATE_SCROLL,
            2004 => ModeFlags::BRACKETED_PASTE,
            _ => return None,
        })
    }

    /// Record a DEC private mode. Returns `false` for unknown modes.
    ///
    /// Resetting a mouse tracking or encoding mode only takes effect when it
    /// is the one currently selected.
    pub fn set_dec_mode(&mut self, mode: u16, enabled: bool) -> bool {
        let tracking = match mode {
            9 => Some(MouseTracking::X10),
            1000 => Some(MouseTracking::Normal),
            1002 => Some(MouseTracking::ButtonEvent),
            1003 => Some(MouseTracking::AnyEvent),
            _ => None,
        };
        if let Some(tracking) = tracking {
            if enabled {
                self.mouse_tracking = tracking;
            } else if self.mouse_tracking == tracking {
                self.mouse_tracking = MouseTracking::Off;
            }
            return true;
        }
        let encoding = match mode {
            1005 => Some(MouseEncoding::Utf8),
            1006 => Some(MouseEncoding::Sgr),
            _ => None,
        };
        if let Some(encoding) = encoding {
            if enabled {
                self.mouse_encoding = encoding;
            } else if self.mouse_encoding == encoding {
                self.mouse_encoding = MouseEncoding::Default;
            }
            return true;
        }
        let Some(flag) = Self::dec_flag_for_mode(mode) else {
            return false;
        };
        self.flags.set(flag, enabled);
        true
    }

    /// Record an ANSI mode. Returns `false` for unknown modes.
    pub fn set_ansi_mode(&mut self, mode: u16, enabled: bool) -> bool {
        let flag = match mode {
            4 => ModeFlags::INSERT,
            20 => ModeFlags::AUTO_CR,
            _ => return false,
        };
        self.flags.set(flag, enabled);
        true
    }
}
