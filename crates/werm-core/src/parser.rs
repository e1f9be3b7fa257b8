//! VT/xterm escape-sequence parser.
//!
//! A deterministic, byte-at-a-time state machine that turns the host output
//! stream into [`Action`]s for the terminal. Every state survives a chunk
//! boundary, so the actions produced for a byte stream do not depend on how
//! the stream was split. It covers:
//!
//! - printable characters (UTF-8, or Latin-1 after `ESC % @`) -> `Action::Print`
//! - C0 controls, and C1 controls (raw in 8-bit mode, decoded U+0080..U+009F
//!   otherwise)
//! - ESC sequences, including charset designation
//! - CSI sequences with colon sub-parameters
//! - OSC, DCS, PM, APC and SOS strings, bounded in time and length
//! - tmux control mode (`DCS 1000 p`)
//!
//! Unknown or malformed sequences produce no action; they are logged at
//! `trace` level and dropped.

use std::time::Duration;

use web_time::Instant;

use crate::charset::Charset;
use crate::config::{DEFAULT_MAX_STRING_LEN, DEFAULT_STRING_TIMEOUT, TerminalConfig};
use crate::cursor::CursorStyle;

/// Most parameters kept for one CSI sequence; extras are dropped.
pub const MAX_CSI_PARAMS: usize = 32;

/// One CSI parameter with its colon sub-parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiParam {
    /// `None` when the parameter was omitted (`CSI ;5H`).
    pub value: Option<u16>,
    pub subs: Vec<Option<u16>>,
}

/// Parameters of a CSI (or DCS) sequence.
///
/// Every consumer resolves defaults through [`CsiParams::get_or`] or
/// [`CsiParams::count`]: an omitted parameter and a literal `0` both mean
/// "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsiParams {
    params: Vec<CsiParam>,
}

impl CsiParams {
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// The value as written; `None` when omitted or absent.
    #[must_use]
    pub fn raw(&self, i: usize) -> Option<u16> {
        self.params.get(i).and_then(|p| p.value)
    }

    /// Colon sub-parameters of parameter `i`.
    #[must_use]
    pub fn subs(&self, i: usize) -> &[Option<u16>] {
        self.params.get(i).map_or(&[], |p| p.subs.as_slice())
    }

    /// The value, with omitted and `0` both replaced by `default`.
    #[must_use]
    pub fn get_or(&self, i: usize, default: u16) -> u16 {
        match self.raw(i) {
            None | Some(0) => default,
            Some(v) => v,
        }
    }

    /// A repeat count: omitted and `0` mean 1.
    #[must_use]
    pub fn count(&self, i: usize) -> u16 {
        self.get_or(i, 1)
    }

    /// The value, with omitted and `0` both reported as `None`.
    #[must_use]
    pub fn opt(&self, i: usize) -> Option<u16> {
        self.raw(i).filter(|&v| v != 0)
    }

    /// Every parameter value, omitted ones as `0`.
    pub fn values(&self) -> impl Iterator<Item = u16> + '_ {
        self.params.iter().map(|p| p.value.unwrap_or(0))
    }
}

/// The kind of string sequence being collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    Osc,
    Dcs,
    Pm,
    Apc,
    Sos,
}

/// Parser output actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A printable character, before charset translation.
    Print(char),
    Bell,
    Backspace,
    Tab,
    /// LF, VT and FF.
    LineFeed,
    CarriageReturn,
    /// SI (0), SO (1), LS2, LS3: invoke G`n` into GL.
    LockingShift(u8),
    /// LS1R, LS2R, LS3R: invoke G`n` into GR.
    LockingShiftRight(u8),
    /// SS2 / SS3.
    SingleShift(u8),
    /// `ESC ( F` and friends.
    DesignateCharset { slot: u8, charset: Charset },
    /// IND (`ESC D`).
    Index,
    /// NEL (`ESC E`).
    NextLine,
    /// HTS (`ESC H`).
    SetTabStop,
    /// RI (`ESC M`).
    ReverseIndex,
    /// DECSC (`ESC 7`).
    SaveCursor,
    /// DECRC (`ESC 8`).
    RestoreCursor,
    /// RIS (`ESC c`).
    FullReset,
    /// DECKPAM (`ESC =`).
    ApplicationKeypad,
    /// DECKPNM (`ESC >`).
    NormalKeypad,
    /// DECALN (`ESC # 8`).
    ScreenAlignment,
    CursorUp(u16),
    CursorDown(u16),
    CursorForward(u16),
    CursorBack(u16),
    CursorNextLine(u16),
    CursorPrevLine(u16),
    /// CHA / HPA, 0-indexed.
    CursorColumn(u16),
    /// HPR.
    CursorColumnRelative(u16),
    /// VPA, 0-indexed.
    CursorRow(u16),
    /// VPR.
    CursorRowRelative(u16),
    /// CUP / HVP, 0-indexed.
    CursorPosition { row: u16, col: u16 },
    /// CHT.
    TabForward(u16),
    /// CBT.
    TabBackward(u16),
    /// TBC: 0 = at cursor, 3 = all.
    ClearTabStop(u16),
    /// ED / DECSED.
    EraseInDisplay(u16),
    /// EL / DECSEL.
    EraseInLine(u16),
    InsertLines(u16),
    DeleteLines(u16),
    InsertChars(u16),
    DeleteChars(u16),
    EraseChars(u16),
    /// SU.
    ScrollUp(u16),
    /// SD.
    ScrollDown(u16),
    /// REP.
    RepeatPrevious(u16),
    /// SM/RM (`private == false`) or DECSET/DECRST.
    SetModes {
        private: bool,
        modes: Vec<u16>,
        enable: bool,
    },
    Sgr(CsiParams),
    /// DSR (`CSI n`) or DECDSR (`CSI ? n`).
    DeviceStatusReport { private: bool, code: u16 },
    /// DA1 (`CSI c`).
    PrimaryDeviceAttributes,
    /// DA2 (`CSI > c`).
    SecondaryDeviceAttributes,
    /// DECSTBM, 0-indexed inclusive. `bottom == None` means the last row.
    SetScrollRegion { top: u16, bottom: Option<u16> },
    /// SCOSC (`CSI s`).
    SaveCursorPosition,
    /// SCORC (`CSI u`).
    RestoreCursorPosition,
    /// DECSTR (`CSI ! p`).
    SoftReset,
    /// DECSCUSR (`CSI Ps SP q`).
    SetCursorStyle(CursorStyle),
    /// OSC 0 / 2.
    SetTitle(String),
    /// OSC 4. `spec == "?"` is a query.
    SetPaletteColor { index: u8, spec: String },
    /// OSC 104. Empty means every entry.
    ResetPaletteColors(Vec<u8>),
    /// OSC 10 / 11 / 12.
    SetDynamicColor { code: u16, spec: String },
    /// OSC 110 / 111 / 112.
    ResetDynamicColor(u16),
    /// OSC 8: `Some(uri)` opens a link, `None` closes it.
    Hyperlink(Option<String>),
    /// OSC 52, payload still base64 encoded.
    ClipboardWrite { selection: String, data: String },
    /// A DCS string other than tmux control mode: header and payload.
    DeviceControl(String),
    /// One tmux control-mode line; `None` when control mode ends.
    TmuxLine(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    /// ESC plus one intermediate byte; the next byte completes the sequence.
    EscIntermediate(u8),
    Csi,
    /// DCS parameters and intermediates, up to the final byte.
    DcsHeader,
    String(StringKind),
    /// ESC seen inside a string: `\` terminates, anything else aborts.
    StringEsc(StringKind),
    Tmux,
    TmuxEsc,
}

/// Outcome of feeding one byte to the shared CSI/DCS header grammar.
enum HeaderStep {
    Continue,
    Final(u8),
    Abort,
}

/// VT parser state.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    /// Latin-1 decoding with raw C1 controls (`ESC % @`).
    eight_bit: bool,
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_need: u8,

    leading: Option<u8>,
    trailing: Vec<u8>,
    params: Vec<CsiParam>,
    current: CsiParam,
    in_sub: bool,
    saw_param_bytes: bool,

    dcs_header: Vec<u8>,
    string: Vec<u8>,
    string_started: Option<Instant>,
    string_overflow: bool,
    /// A 0xC2 inside a string that may start a UTF-8 encoded ST.
    pending_c2: bool,
    tmux_line: Vec<u8>,

    string_timeout: Duration,
    max_string_len: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser in the ground state with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_STRING_TIMEOUT, DEFAULT_MAX_STRING_LEN)
    }

    #[must_use]
    pub fn with_config(config: &TerminalConfig) -> Self {
        Self::with_limits(config.string_timeout, config.max_string_len)
    }

    #[must_use]
    pub fn with_limits(string_timeout: Duration, max_string_len: usize) -> Self {
        Self {
            state: State::Ground,
            eight_bit: false,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
            leading: None,
            trailing: Vec::with_capacity(2),
            params: Vec::new(),
            current: CsiParam::default(),
            in_sub: false,
            saw_param_bytes: false,
            dcs_header: Vec::new(),
            string: Vec::new(),
            string_started: None,
            string_overflow: false,
            pending_c2: false,
            tmux_line: Vec::new(),
            string_timeout,
            max_string_len,
        }
    }

    /// Whether the coding system is 8-bit (Latin-1) rather than UTF-8.
    #[must_use]
    pub fn is_eight_bit(&self) -> bool {
        self.eight_bit
    }

    /// Return to the initial state, dropping any partial sequence.
    pub fn reset(&mut self) {
        *self = Self::with_limits(self.string_timeout, self.max_string_len);
    }

    /// Feed a chunk using the current time for string time budgets.
    #[must_use]
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Action> {
        self.feed_at(bytes, Instant::now())
    }

    /// Feed a chunk with an explicit clock reading.
    ///
    /// A string sequence whose time budget expired before this chunk arrived
    /// is abandoned first.
    #[must_use]
    pub fn feed_at(&mut self, bytes: &[u8], now: Instant) -> Vec<Action> {
        self.expire_string(now);
        let mut out = Vec::new();
        for &b in bytes {
            self.advance(b, now, &mut out);
        }
        out
    }

    /// Abandon a string sequence whose time budget ran out before `now`.
    pub fn expire_string(&mut self, now: Instant) {
        if !matches!(self.state, State::String(_) | State::StringEsc(_)) {
            return;
        }
        let Some(started) = self.string_started else {
            return;
        };
        let elapsed = now.saturating_duration_since(started);
        if elapsed > self.string_timeout {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                len = self.string.len(),
                "string sequence timed out, discarding"
            );
            self.state = State::Ground;
            self.clear_string();
        }
    }

    /// Advance the parser by one byte.
    pub fn advance(&mut self, b: u8, now: Instant, out: &mut Vec<Action>) {
        match self.state {
            State::Ground => self.advance_ground(b, now, out),
            State::Escape => self.advance_escape(b, now, out),
            State::EscIntermediate(i) => self.advance_esc_intermediate(i, b, out),
            State::Csi => self.advance_csi(b, out),
            State::DcsHeader => self.advance_dcs_header(b, now, out),
            State::String(kind) => self.advance_string(kind, b, out),
            State::StringEsc(kind) => self.advance_string_esc(kind, b, now, out),
            State::Tmux => self.advance_tmux(b, out),
            State::TmuxEsc => self.advance_tmux_esc(b, out),
        }
    }

    // ── Ground and decoding ─────────────────────────────────────────

    fn advance_ground(&mut self, b: u8, now: Instant, out: &mut Vec<Action>) {
        if self.utf8_need > 0 {
            if (0x80..=0xBF).contains(&b) {
                self.utf8_buf[usize::from(self.utf8_len)] = b;
                self.utf8_len += 1;
                self.utf8_need -= 1;
                if self.utf8_need == 0 {
                    let len = usize::from(self.utf8_len);
                    self.utf8_len = 0;
                    match std::str::from_utf8(&self.utf8_buf[..len])
                        .ok()
                        .and_then(|s| s.chars().next())
                    {
                        Some(ch) => self.dispatch_char(ch, now, out),
                        None => {
                            tracing::warn!(bytes = ?&self.utf8_buf[..len], "invalid UTF-8 sequence");
                            out.push(Action::Print(char::REPLACEMENT_CHARACTER));
                        }
                    }
                }
                return;
            }
            tracing::warn!(byte = b, "truncated UTF-8 sequence");
            out.push(Action::Print(char::REPLACEMENT_CHARACTER));
            self.utf8_len = 0;
            self.utf8_need = 0;
        }

        match b {
            0x00..=0x1F => self.execute(b, out),
            0x20..=0x7E => out.push(Action::Print(char::from(b))),
            0x7F => {}
            _ if self.eight_bit => self.dispatch_char(char::from(b), now, out),
            0xC2..=0xDF => self.start_utf8(b, 1),
            0xE0..=0xEF => self.start_utf8(b, 2),
            0xF0..=0xF4 => self.start_utf8(b, 3),
            _ => {
                tracing::warn!(byte = b, "invalid UTF-8 lead byte");
                out.push(Action::Print(char::REPLACEMENT_CHARACTER));
            }
        }
    }

    fn start_utf8(&mut self, b: u8, need: u8) {
        self.utf8_buf[0] = b;
        self.utf8_len = 1;
        self.utf8_need = need;
    }

    /// A decoded character: C1 controls act, everything else prints.
    fn dispatch_char(&mut self, ch: char, now: Instant, out: &mut Vec<Action>) {
        let code = u32::from(ch);
        if (0x80..=0x9F).contains(&code) {
            self.execute_c1(code as u8, now, out);
        } else {
            out.push(Action::Print(ch));
        }
    }

    /// C0 control. Valid in every state that executes controls.
    fn execute(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x07 => out.push(Action::Bell),
            0x08 => out.push(Action::Backspace),
            0x09 => out.push(Action::Tab),
            0x0A..=0x0C => out.push(Action::LineFeed),
            0x0D => out.push(Action::CarriageReturn),
            0x0E => out.push(Action::LockingShift(1)),
            0x0F => out.push(Action::LockingShift(0)),
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.state = State::Escape,
            _ => tracing::trace!(byte = b, "ignoring C0 control"),
        }
    }

    fn execute_c1(&mut self, code: u8, now: Instant, out: &mut Vec<Action>) {
        match code {
            0x84 => out.push(Action::Index),
            0x85 => out.push(Action::NextLine),
            0x88 => out.push(Action::SetTabStop),
            0x8D => out.push(Action::ReverseIndex),
            0x8E => out.push(Action::SingleShift(2)),
            0x8F => out.push(Action::SingleShift(3)),
            0x90 => self.begin_dcs(),
            0x98 => self.begin_string(StringKind::Sos, now),
            0x9B => self.begin_csi(),
            0x9C => {}
            0x9D => self.begin_string(StringKind::Osc, now),
            0x9E => self.begin_string(StringKind::Pm, now),
            0x9F => self.begin_string(StringKind::Apc, now),
            _ => tracing::trace!(code, "ignoring C1 control"),
        }
    }

    // ── ESC ─────────────────────────────────────────────────────────

    fn advance_escape(&mut self, b: u8, now: Instant, out: &mut Vec<Action>) {
        if b < 0x20 {
            self.execute(b, out);
            return;
        }
        self.state = State::Ground;
        match b {
            b'[' => self.begin_csi(),
            b']' => self.begin_string(StringKind::Osc, now),
            b'P' => self.begin_dcs(),
            b'^' => self.begin_string(StringKind::Pm, now),
            b'_' => self.begin_string(StringKind::Apc, now),
            b'X' => self.begin_string(StringKind::Sos, now),
            b'7' => out.push(Action::SaveCursor),
            b'8' => out.push(Action::RestoreCursor),
            b'c' => out.push(Action::FullReset),
            b'D' => out.push(Action::Index),
            b'E' => out.push(Action::NextLine),
            b'H' => out.push(Action::SetTabStop),
            b'M' => out.push(Action::ReverseIndex),
            b'N' => out.push(Action::SingleShift(2)),
            b'O' => out.push(Action::SingleShift(3)),
            b'n' => out.push(Action::LockingShift(2)),
            b'o' => out.push(Action::LockingShift(3)),
            b'~' => out.push(Action::LockingShiftRight(1)),
            b'}' => out.push(Action::LockingShiftRight(2)),
            b'|' => out.push(Action::LockingShiftRight(3)),
            b'=' => out.push(Action::ApplicationKeypad),
            b'>' => out.push(Action::NormalKeypad),
            b'\\' => {}
            0x20..=0x2F => self.state = State::EscIntermediate(b),
            _ => tracing::trace!(byte = b, "unhandled ESC sequence"),
        }
    }

    fn advance_esc_intermediate(&mut self, inter: u8, b: u8, out: &mut Vec<Action>) {
        if b < 0x20 {
            self.execute(b, out);
            return;
        }
        self.state = State::Ground;
        let slot = match inter {
            b'(' => Some(0),
            b')' | b'-' => Some(1),
            b'*' | b'.' => Some(2),
            b'+' | b'/' => Some(3),
            _ => None,
        };
        if let Some(slot) = slot {
            out.push(Action::DesignateCharset {
                slot,
                charset: Charset::from_designator(b),
            });
            return;
        }
        match (inter, b) {
            (b'#', b'8') => out.push(Action::ScreenAlignment),
            (b'%', b'@') => self.eight_bit = true,
            (b'%', b'G') => self.eight_bit = false,
            (b' ', b'F' | b'G') => {}
            _ => tracing::trace!(intermediate = inter, byte = b, "unhandled ESC sequence"),
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn reset_header(&mut self) {
        self.leading = None;
        self.trailing.clear();
        self.params.clear();
        self.current = CsiParam::default();
        self.in_sub = false;
        self.saw_param_bytes = false;
    }

    fn begin_csi(&mut self) {
        self.reset_header();
        self.state = State::Csi;
    }

    fn push_digit(&mut self, digit: u8) {
        let slot = if self.in_sub {
            match self.current.subs.last_mut() {
                Some(slot) => slot,
                None => return,
            }
        } else {
            &mut self.current.value
        };
        let next = u32::from(slot.unwrap_or(0)) * 10 + u32::from(digit);
        *slot = Some(next.min(u32::from(u16::MAX)) as u16);
    }

    fn finish_param(&mut self) {
        let param = std::mem::take(&mut self.current);
        self.in_sub = false;
        if self.params.len() < MAX_CSI_PARAMS {
            self.params.push(param);
        }
    }

    /// Shared grammar for CSI sequences and DCS headers.
    fn header_byte(&mut self, b: u8) -> HeaderStep {
        match b {
            0x3C..=0x3F => {
                if self.leading.is_some() || self.saw_param_bytes || !self.trailing.is_empty() {
                    return HeaderStep::Abort;
                }
                self.leading = Some(b);
            }
            b'0'..=b'9' => {
                if !self.trailing.is_empty() {
                    return HeaderStep::Abort;
                }
                self.saw_param_bytes = true;
                self.push_digit(b - b'0');
            }
            b';' => {
                if !self.trailing.is_empty() {
                    return HeaderStep::Abort;
                }
                self.saw_param_bytes = true;
                self.finish_param();
            }
            b':' => {
                if !self.trailing.is_empty() {
                    return HeaderStep::Abort;
                }
                self.saw_param_bytes = true;
                self.current.subs.push(None);
                self.in_sub = true;
            }
            0x20..=0x2F => {
                if self.trailing.len() >= 2 {
                    return HeaderStep::Abort;
                }
                self.trailing.push(b);
            }
            0x40..=0x7E => {
                if self.saw_param_bytes {
                    self.finish_param();
                }
                return HeaderStep::Final(b);
            }
            0x7F => {}
            _ => return HeaderStep::Abort,
        }
        HeaderStep::Continue
    }

    fn advance_csi(&mut self, b: u8, out: &mut Vec<Action>) {
        if b < 0x20 {
            self.execute(b, out);
            return;
        }
        match self.header_byte(b) {
            HeaderStep::Continue => {}
            HeaderStep::Abort => {
                tracing::trace!(byte = b, "malformed CSI sequence, discarding");
                self.state = State::Ground;
            }
            HeaderStep::Final(f) => {
                self.state = State::Ground;
                self.dispatch_csi(f, out);
            }
        }
    }

    fn dispatch_csi(&mut self, final_byte: u8, out: &mut Vec<Action>) {
        let p = CsiParams {
            params: std::mem::take(&mut self.params),
        };
        let leading = self.leading;
        let action = match (leading, self.trailing.as_slice(), final_byte) {
            (None, [], b'@') => Action::InsertChars(p.count(0)),
            (None, [], b'A') => Action::CursorUp(p.count(0)),
            (None, [], b'B') => Action::CursorDown(p.count(0)),
            (None, [], b'C') => Action::CursorForward(p.count(0)),
            (None, [], b'D') => Action::CursorBack(p.count(0)),
            (None, [], b'E') => Action::CursorNextLine(p.count(0)),
            (None, [], b'F') => Action::CursorPrevLine(p.count(0)),
            (None, [], b'G' | b'`') => Action::CursorColumn(p.count(0) - 1),
            (None, [], b'H' | b'f') => Action::CursorPosition {
                row: p.count(0) - 1,
                col: p.count(1) - 1,
            },
            (None, [], b'I') => Action::TabForward(p.count(0)),
            (None | Some(b'?'), [], b'J') => Action::EraseInDisplay(p.get_or(0, 0)),
            (None | Some(b'?'), [], b'K') => Action::EraseInLine(p.get_or(0, 0)),
            (None, [], b'L') => Action::InsertLines(p.count(0)),
            (None, [], b'M') => Action::DeleteLines(p.count(0)),
            (None, [], b'P') => Action::DeleteChars(p.count(0)),
            (None, [], b'S') => Action::ScrollUp(p.count(0)),
            (None, [], b'T') => Action::ScrollDown(p.count(0)),
            (None, [], b'X') => Action::EraseChars(p.count(0)),
            (None, [], b'Z') => Action::TabBackward(p.count(0)),
            (None, [], b'a') => Action::CursorColumnRelative(p.count(0)),
            (None, [], b'b') => Action::RepeatPrevious(p.count(0)),
            (None, [], b'c') if p.get_or(0, 0) == 0 => Action::PrimaryDeviceAttributes,
            (Some(b'>'), [], b'c') if p.get_or(0, 0) == 0 => Action::SecondaryDeviceAttributes,
            (None, [], b'd') => Action::CursorRow(p.count(0) - 1),
            (None, [], b'e') => Action::CursorRowRelative(p.count(0)),
            (None, [], b'g') => Action::ClearTabStop(p.get_or(0, 0)),
            (None | Some(b'?'), [], b'h' | b'l') => Action::SetModes {
                private: leading.is_some(),
                modes: p.values().collect(),
                enable: final_byte == b'h',
            },
            (None, [], b'm') => Action::Sgr(p),
            (None | Some(b'?'), [], b'n') => Action::DeviceStatusReport {
                private: leading.is_some(),
                code: p.get_or(0, 0),
            },
            (None, [], b'r') => Action::SetScrollRegion {
                top: p.count(0) - 1,
                bottom: p.opt(1).map(|b| b - 1),
            },
            (None, [], b's') => Action::SaveCursorPosition,
            (None, [], b'u') => Action::RestoreCursorPosition,
            (None, [b'!'], b'p') => Action::SoftReset,
            (None, [b' '], b'q') => Action::SetCursorStyle(CursorStyle::from_decscusr(p.get_or(0, 0))),
            _ => {
                tracing::trace!(
                    leading = ?leading.map(char::from),
                    trailing = ?self.trailing,
                    final_byte = %char::from(final_byte),
                    "unhandled CSI sequence"
                );
                return;
            }
        };
        out.push(action);
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn begin_dcs(&mut self) {
        self.reset_header();
        self.dcs_header.clear();
        self.state = State::DcsHeader;
    }

    fn advance_dcs_header(&mut self, b: u8, now: Instant, out: &mut Vec<Action>) {
        if b < 0x20 {
            self.execute(b, out);
            return;
        }
        self.dcs_header.push(b);
        match self.header_byte(b) {
            HeaderStep::Continue => {}
            HeaderStep::Abort => {
                tracing::trace!(byte = b, "malformed DCS header, discarding");
                self.state = State::Ground;
            }
            HeaderStep::Final(f) => {
                let tmux = self.leading.is_none()
                    && self.trailing.is_empty()
                    && f == b'p'
                    && self.params.len() == 1
                    && self.params[0].value == Some(1000);
                if tmux {
                    tracing::debug!("entering tmux control mode");
                    self.tmux_line.clear();
                    self.state = State::Tmux;
                } else {
                    let header = std::mem::take(&mut self.dcs_header);
                    self.begin_string(StringKind::Dcs, now);
                    self.dcs_header = header;
                }
            }
        }
    }

    // ── Strings ─────────────────────────────────────────────────────

    fn clear_string(&mut self) {
        self.string.clear();
        self.string_started = None;
        self.string_overflow = false;
        self.pending_c2 = false;
    }

    fn begin_string(&mut self, kind: StringKind, now: Instant) {
        self.clear_string();
        self.string_started = Some(now);
        self.state = State::String(kind);
    }

    fn push_string_byte(&mut self, b: u8) {
        if self.string_overflow {
            return;
        }
        if self.string.len() >= self.max_string_len {
            tracing::warn!(
                limit = self.max_string_len,
                "string sequence too long, ignoring until terminator"
            );
            self.string_overflow = true;
            self.string.clear();
            return;
        }
        self.string.push(b);
    }

    fn advance_string(&mut self, kind: StringKind, b: u8, out: &mut Vec<Action>) {
        if self.pending_c2 {
            self.pending_c2 = false;
            if b == 0x9C {
                self.finish_string(kind, out);
                return;
            }
            self.push_string_byte(0xC2);
        }
        match b {
            0x07 => self.finish_string(kind, out),
            0x1B => self.state = State::StringEsc(kind),
            0x18 | 0x1A => {
                tracing::debug!(?kind, "string sequence cancelled");
                self.state = State::Ground;
                self.clear_string();
            }
            0xC2 if !self.eight_bit => self.pending_c2 = true,
            0x9C if self.eight_bit => self.finish_string(kind, out),
            _ => self.push_string_byte(b),
        }
    }

    fn advance_string_esc(&mut self, kind: StringKind, b: u8, now: Instant, out: &mut Vec<Action>) {
        if b == b'\\' {
            self.finish_string(kind, out);
            return;
        }
        tracing::debug!(?kind, "string sequence interrupted by ESC");
        self.clear_string();
        self.state = State::Escape;
        self.advance_escape(b, now, out);
    }

    fn string_text(&self) -> String {
        if self.eight_bit {
            self.string.iter().copied().map(char::from).collect()
        } else {
            String::from_utf8_lossy(&self.string).into_owned()
        }
    }

    fn finish_string(&mut self, kind: StringKind, out: &mut Vec<Action>) {
        self.state = State::Ground;
        if self.string_overflow {
            self.clear_string();
            return;
        }
        let text = self.string_text();
        self.clear_string();
        match kind {
            StringKind::Osc => Self::dispatch_osc(&text, out),
            StringKind::Dcs => {
                let mut payload = String::from_utf8_lossy(&self.dcs_header).into_owned();
                payload.push_str(&text);
                self.dcs_header.clear();
                out.push(Action::DeviceControl(payload));
            }
            StringKind::Pm | StringKind::Apc | StringKind::Sos => {
                tracing::trace!(?kind, len = text.len(), "ignoring string sequence");
            }
        }
    }

    fn dispatch_osc(text: &str, out: &mut Vec<Action>) {
        let (code, rest) = text.split_once(';').unwrap_or((text, ""));
        let Ok(code) = code.parse::<u16>() else {
            tracing::trace!(code, "malformed OSC");
            return;
        };
        match code {
            0 | 2 => out.push(Action::SetTitle(rest.to_string())),
            4 => {
                let mut parts = rest.split(';');
                while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
                    match index.parse::<u8>() {
                        Ok(index) => out.push(Action::SetPaletteColor {
                            index,
                            spec: spec.to_string(),
                        }),
                        Err(_) => tracing::trace!(index, "bad OSC 4 palette index"),
                    }
                }
            }
            104 => {
                let indexes = rest
                    .split(';')
                    .filter(|s| !s.is_empty())
                    .filter_map(|s| s.parse::<u8>().ok())
                    .collect();
                out.push(Action::ResetPaletteColors(indexes));
            }
            8 => {
                let uri = rest.split_once(';').map_or("", |(_, uri)| uri);
                let link = (!uri.is_empty()).then(|| uri.to_string());
                out.push(Action::Hyperlink(link));
            }
            10..=12 => {
                let spec = rest.split(';').next().unwrap_or("");
                out.push(Action::SetDynamicColor {
                    code,
                    spec: spec.to_string(),
                });
            }
            110..=112 => out.push(Action::ResetDynamicColor(code)),
            52 => {
                let (selection, data) = rest.split_once(';').unwrap_or(("", rest));
                if data == "?" {
                    tracing::debug!("ignoring clipboard read request");
                } else {
                    out.push(Action::ClipboardWrite {
                        selection: selection.to_string(),
                        data: data.to_string(),
                    });
                }
            }
            _ => tracing::trace!(code, "unhandled OSC"),
        }
    }

    // ── tmux control mode ───────────────────────────────────────────

    fn advance_tmux(&mut self, b: u8, out: &mut Vec<Action>) {
        match b {
            0x1B => self.state = State::TmuxEsc,
            b'\n' => {
                if self.tmux_line.last() == Some(&b'\r') {
                    self.tmux_line.pop();
                }
                let line = String::from_utf8_lossy(&self.tmux_line).into_owned();
                self.tmux_line.clear();
                out.push(Action::TmuxLine(Some(line)));
            }
            _ if self.tmux_line.len() >= self.max_string_len => {}
            _ => self.tmux_line.push(b),
        }
    }

    fn advance_tmux_esc(&mut self, b: u8, out: &mut Vec<Action>) {
        if b == b'\\' {
            tracing::debug!("leaving tmux control mode");
            self.tmux_line.clear();
            self.state = State::Ground;
            out.push(Action::TmuxLine(None));
            return;
        }
        self.state = State::Tmux;
        if self.tmux_line.len() < self.max_string_len {
            self.tmux_line.push(0x1B);
        }
        self.advance_tmux(b, out);
    }
}
