#![forbid(unsafe_code)]

//! Keyboard, mouse, wheel, paste and focus encoding for `werm-web`.
//!
//! The web host (JS) hands over DOM-level facts as JSON: `key`/`code`
//! strings and modifier bits for keys, cell coordinates for the pointer,
//! and quantized wheel steps. This module normalizes them and encodes what
//! the remote host should receive.
//!
//! Every encoder returns wire-ready text: character payloads are already
//! [`sanitize`]d, and navigation keys use the server's short backslash forms
//! (`\^`, `\v`, `\>`, `\<`, `\e`, `\h`), which are transport escapes of their
//! own and go out verbatim.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use werm_core::{ModeFlags, Modes, MouseEncoding, MouseTracking};

use crate::framing::sanitize;

bitflags! {
    /// Modifier keys held during an input event.
    ///
    /// These flags are encoded as a compact `u8` bitset in JSON (`mods`).
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

/// Phase for key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPhase {
    Down,
    Up,
}

/// Phase for mouse events in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MousePhase {
    Down,
    Up,
    /// Motion with no button held.
    Move,
    /// Motion with a button held.
    Drag,
}

/// Normalized key code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// The context-menu key.
    Menu,
    F(u8),
    Unidentified { key: Box<str>, code: Box<str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    Other(u8),
}

impl MouseButton {
    #[must_use]
    pub const fn from_u8(n: u8) -> Self {
        match n {
            0 => Self::Left,
            1 => Self::Middle,
            2 => Self::Right,
            other => Self::Other(other),
        }
    }

    const fn code(self) -> u16 {
        match self {
            Self::Left => 0,
            Self::Middle => 1,
            Self::Right => 2,
            Self::Other(n) => (n & 0b11) as u16,
        }
    }
}

/// Normalized key input event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyInput {
    pub phase: KeyPhase,
    pub code: KeyCode,
    pub mods: Modifiers,
}

impl KeyInput {
    /// A key press with the given modifiers.
    #[must_use]
    pub fn down(code: KeyCode, mods: Modifiers) -> Self {
        Self {
            phase: KeyPhase::Down,
            code,
            mods,
        }
    }
}

/// Normalized mouse input event in 0-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseInput {
    pub phase: MousePhase,
    pub button: Option<MouseButton>,
    pub x: u16,
    pub y: u16,
    pub mods: Modifiers,
}

/// Wheel input in whole steps; positive `dy` scrolls down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WheelInput {
    pub x: u16,
    pub y: u16,
    pub dx: i16,
    pub dy: i16,
    pub mods: Modifiers,
}

/// Normalized web input event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Key(KeyInput),
    Mouse(MouseInput),
    Wheel(WheelInput),
    Paste(String),
    /// IME commit.
    Composition(String),
    Focus(bool),
}

/// Result of encoding a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Send this text to the host.
    Send(String),
    /// Swallow the key without sending anything.
    Consumed,
    /// Let the browser (or the macro layer) have it.
    Unhandled,
}

/// Key encoding preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Text the context-menu key types.
    pub menu_key_inserts: String,
    /// Leave Ctrl+L to the browser.
    pub pass_ctrl_l: bool,
    /// Meta prefixes the key with ESC instead of going to the browser.
    pub meta_sends_escape: bool,
    /// Wheel sends arrow keys on the alternate screen when mouse reporting
    /// is off, even without DECSET 1007.
    pub alternate_scroll: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            menu_key_inserts: String::new(),
            pass_ctrl_l: false,
            meta_sends_escape: true,
            alternate_scroll: true,
        }
    }
}

// ── DOM normalization ───────────────────────────────────────────────────

/// Deterministic normalization of DOM key/code strings into a [`KeyCode`].
#[must_use]
pub fn normalize_dom_key_code(dom_key: &str, dom_code: &str, mods: Modifiers) -> KeyCode {
    // Ctrl+Shift chords are matched by physical key: the logical key of
    // Shift+2 depends on the layout.
    if mods.contains(Modifiers::CTRL | Modifiers::SHIFT)
        && let Some(digit) = dom_code.strip_prefix("Digit")
        && let Some(ch) = single_char(digit)
    {
        return KeyCode::Char(ch);
    }

    // Prefer the logical `key` for printable characters (already includes shift).
    if let Some(ch) = single_char(dom_key) {
        return KeyCode::Char(ch);
    }

    match dom_key {
        "Enter" => KeyCode::Enter,
        "Escape" | "Esc" => KeyCode::Escape,
        "Backspace" => KeyCode::Backspace,
        "Tab" => KeyCode::Tab,
        "Delete" | "Del" => KeyCode::Delete,
        "Insert" => KeyCode::Insert,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        "ArrowUp" | "Up" => KeyCode::Up,
        "ArrowDown" | "Down" => KeyCode::Down,
        "ArrowLeft" | "Left" => KeyCode::Left,
        "ArrowRight" | "Right" => KeyCode::Right,
        "ContextMenu" | "Apps" => KeyCode::Menu,
        "Spacebar" => KeyCode::Char(' '),
        _ => {
            if let Some(n) = parse_function_key(dom_key) {
                return KeyCode::F(n);
            }
            // Fall back to the physical `code` for keys the layout left unnamed.
            key_code_from_dom_code(dom_code).unwrap_or_else(|| KeyCode::Unidentified {
                key: dom_key.into(),
                code: dom_code.into(),
            })
        }
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

fn parse_function_key(s: &str) -> Option<u8> {
    let rest = s.strip_prefix('F')?;
    rest.parse::<u8>().ok().filter(|n| (1..=24).contains(n))
}

fn key_code_from_dom_code(dom_code: &str) -> Option<KeyCode> {
    Some(match dom_code {
        "Enter" | "NumpadEnter" => KeyCode::Enter,
        "Escape" => KeyCode::Escape,
        "Backspace" => KeyCode::Backspace,
        "Tab" => KeyCode::Tab,
        "Delete" => KeyCode::Delete,
        "Insert" => KeyCode::Insert,
        "Home" => KeyCode::Home,
        "End" => KeyCode::End,
        "PageUp" => KeyCode::PageUp,
        "PageDown" => KeyCode::PageDown,
        "ArrowUp" => KeyCode::Up,
        "ArrowDown" => KeyCode::Down,
        "ArrowLeft" => KeyCode::Left,
        "ArrowRight" => KeyCode::Right,
        "ContextMenu" => KeyCode::Menu,
        _ => return None,
    })
}

// ── JSON schema ─────────────────────────────────────────────────────────

/// Wire form of [`InputEvent`] as the JS host sends it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEventJson {
    Key {
        phase: KeyPhase,
        /// DOM `KeyboardEvent.key`.
        key: String,
        /// DOM `KeyboardEvent.code`.
        #[serde(default)]
        code: String,
        #[serde(default)]
        mods: u8,
    },
    Mouse {
        phase: MousePhase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<u8>,
        x: u16,
        y: u16,
        #[serde(default)]
        mods: u8,
    },
    Wheel {
        x: u16,
        y: u16,
        #[serde(default)]
        dx: i16,
        dy: i16,
        #[serde(default)]
        mods: u8,
    },
    Paste {
        text: String,
    },
    Composition {
        data: String,
    },
    Focus {
        focused: bool,
    },
}

impl InputEvent {
    /// Decode one event from the host's JSON.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let json: InputEventJson = serde_json::from_str(s)?;
        Ok(Self::from(json))
    }
}

impl From<InputEventJson> for InputEvent {
    fn from(value: InputEventJson) -> Self {
        match value {
            InputEventJson::Key {
                phase,
                key,
                code,
                mods,
            } => {
                let mods = Modifiers::from_bits_truncate(mods);
                Self::Key(KeyInput {
                    phase,
                    code: normalize_dom_key_code(&key, &code, mods),
                    mods,
                })
            }
            InputEventJson::Mouse {
                phase,
                button,
                x,
                y,
                mods,
            } => Self::Mouse(MouseInput {
                phase,
                button: button.map(MouseButton::from_u8),
                x,
                y,
                mods: Modifiers::from_bits_truncate(mods),
            }),
            InputEventJson::Wheel { x, y, dx, dy, mods } => Self::Wheel(WheelInput {
                x,
                y,
                dx,
                dy,
                mods: Modifiers::from_bits_truncate(mods),
            }),
            InputEventJson::Paste { text } => Self::Paste(text),
            InputEventJson::Composition { data } => Self::Composition(data),
            InputEventJson::Focus { focused } => Self::Focus(focused),
        }
    }
}

// ── Keys ────────────────────────────────────────────────────────────────

/// Encode a key press.
#[must_use]
pub fn encode_key(key: &KeyInput, config: &EncoderConfig) -> KeyOutcome {
    if key.phase != KeyPhase::Down || key.mods.contains(Modifiers::ALT) {
        return KeyOutcome::Unhandled;
    }
    let prefix = if key.mods.contains(Modifiers::META) {
        if !config.meta_sends_escape {
            return KeyOutcome::Unhandled;
        }
        "\x1b"
    } else {
        ""
    };
    let ctrl = key.mods.contains(Modifiers::CTRL);
    let shift = key.mods.contains(Modifiers::SHIFT);
    let send_chars = |text: &str| KeyOutcome::Send(sanitize(&format!("{prefix}{text}")));
    let send_verbatim = |text: &str| KeyOutcome::Send(format!("{prefix}{text}"));

    if ctrl && shift {
        return match key.code {
            KeyCode::Char('2') => send_chars("\x00"),
            KeyCode::Char('6') => send_chars("\x1e"),
            _ => KeyOutcome::Unhandled,
        };
    }

    let KeyCode::Char(ch) = key.code else {
        return encode_special_key(&key.code, ctrl, shift, config, send_verbatim);
    };

    if ctrl {
        let mut code = u32::from(ch);
        // `{|}~`, DEL and everything below `@` stay with the browser.
        if code >= 0x7B || code < 0x40 {
            return KeyOutcome::Unhandled;
        }
        if code >= 0x61 {
            code -= 0x20;
        }
        code -= 0x40;
        if code == 0x0C && config.pass_ctrl_l && prefix.is_empty() {
            return KeyOutcome::Unhandled;
        }
        return char::from_u32(code).map_or(KeyOutcome::Unhandled, |c| {
            send_chars(c.encode_utf8(&mut [0; 4]))
        });
    }

    send_chars(ch.encode_utf8(&mut [0; 4]))
}

fn encode_special_key(
    code: &KeyCode,
    ctrl: bool,
    shift: bool,
    config: &EncoderConfig,
    send: impl Fn(&str) -> KeyOutcome,
) -> KeyOutcome {
    if ctrl {
        return match code {
            KeyCode::Backspace | KeyCode::Delete => KeyOutcome::Consumed,
            KeyCode::Menu => send("\x1f"),
            _ => KeyOutcome::Unhandled,
        };
    }

    if shift {
        return match code {
            KeyCode::Backspace => send("\x17"),
            KeyCode::Enter => send("\x0e"),
            KeyCode::Tab => send("\x1b[Z"),
            KeyCode::PageUp
            | KeyCode::PageDown
            | KeyCode::Home
            | KeyCode::End
            | KeyCode::Up
            | KeyCode::Down
            | KeyCode::Left
            | KeyCode::Right => KeyOutcome::Consumed,
            _ => KeyOutcome::Unhandled,
        };
    }

    match code {
        KeyCode::Up => send("\\^"),
        KeyCode::Down => send("\\v"),
        KeyCode::Right => send("\\>"),
        KeyCode::Left => send("\\<"),
        KeyCode::End => send("\\e"),
        KeyCode::Home => send("\\h"),
        KeyCode::Insert => send("\x1b[2~"),
        KeyCode::Delete => send("\x1b[3~"),
        KeyCode::PageUp => send("\x1b[5~"),
        KeyCode::PageDown => send("\x1b[6~"),
        KeyCode::Enter => send("\r"),
        KeyCode::Backspace => send("\x7f"),
        KeyCode::Escape => send("\x1b"),
        KeyCode::Tab => send("\t"),
        KeyCode::Menu => send(&sanitize(&config.menu_key_inserts)),
        KeyCode::F(n) => function_key(*n).map_or(KeyOutcome::Unhandled, send),
        KeyCode::Char(_) | KeyCode::Unidentified { .. } => KeyOutcome::Unhandled,
    }
}

fn function_key(n: u8) -> Option<&'static str> {
    Some(match n {
        1 => "\x1bOP",
        2 => "\x1bOQ",
        3 => "\x1bOR",
        4 => "\x1bOS",
        5 => "\x1b[15~",
        6 => "\x1b[17~",
        7 => "\x1b[18~",
        8 => "\x1b[19~",
        9 => "\x1b[20~",
        10 => "\x1b[21~",
        11 => "\x1b[23~",
        12 => "\x1b[24~",
        _ => return None,
    })
}

// ── Mouse ───────────────────────────────────────────────────────────────

/// Largest value the X10 and UTF-8 encodings put in one position.
const LEGACY_MOUSE_MAX: u16 = 127;
/// Offset the X10 encoding adds to every value.
const LEGACY_MOUSE_OFFSET: u16 = 32;

/// Encode a pointer event under the tracking and encoding modes in force.
///
/// Returns `None` when the current tracking mode does not report this event.
#[must_use]
pub fn encode_mouse(mouse: &MouseInput, modes: &Modes) -> Option<String> {
    let tracking = modes.mouse_tracking;
    let reported = match mouse.phase {
        MousePhase::Down => tracking != MouseTracking::Off,
        MousePhase::Up => matches!(
            tracking,
            MouseTracking::Normal | MouseTracking::ButtonEvent | MouseTracking::AnyEvent
        ),
        MousePhase::Drag => matches!(
            tracking,
            MouseTracking::ButtonEvent | MouseTracking::AnyEvent
        ),
        MousePhase::Move => tracking == MouseTracking::AnyEvent,
    };
    if !reported {
        return None;
    }

    let sgr = modes.mouse_encoding == MouseEncoding::Sgr;
    let button = mouse.button.map_or(0, MouseButton::code);
    let mut code = match mouse.phase {
        MousePhase::Down => button,
        // Legacy encodings cannot say which button went up.
        MousePhase::Up if sgr => button,
        MousePhase::Up => 3,
        MousePhase::Drag => 32 + button,
        MousePhase::Move => 32 + 3,
    };
    if tracking != MouseTracking::X10 {
        code += mouse_mod_bits(mouse.mods);
    }
    Some(encode_mouse_report(
        code,
        mouse.x,
        mouse.y,
        mouse.phase == MousePhase::Up,
        modes.mouse_encoding,
    ))
}

fn encode_mouse_report(code: u16, x: u16, y: u16, release: bool, encoding: MouseEncoding) -> String {
    let (x, y) = (x.saturating_add(1), y.saturating_add(1));
    match encoding {
        MouseEncoding::Sgr => {
            let final_byte = if release { 'm' } else { 'M' };
            format!("\x1b[<{code};{x};{y}{final_byte}")
        }
        // UTF-8 could go further, but hosts disagree past 127.
        MouseEncoding::Default | MouseEncoding::Utf8 => {
            let mut out = String::from("\x1b[M");
            for value in [code, x, y] {
                let value = value.saturating_add(LEGACY_MOUSE_OFFSET).min(LEGACY_MOUSE_MAX);
                out.push(char::from(value as u8));
            }
            sanitize(&out)
        }
    }
}

fn mouse_mod_bits(mods: Modifiers) -> u16 {
    let mut bits = 0;
    if mods.contains(Modifiers::SHIFT) {
        bits |= 4;
    }
    if mods.contains(Modifiers::ALT) {
        bits |= 8;
    }
    if mods.contains(Modifiers::CTRL) {
        bits |= 16;
    }
    bits
}

/// Most steps a single wheel event may produce.
const MAX_WHEEL_STEPS: i16 = 16;

/// Encode a wheel event.
///
/// With mouse reporting on, each step is a press of button 64 (up) or 65
/// (down), or 66/67 for horizontal motion. With reporting off on the
/// alternate screen, vertical steps become arrow keys. Otherwise the wheel
/// belongs to the browser and `None` is returned.
#[must_use]
pub fn encode_wheel(
    wheel: &WheelInput,
    modes: &Modes,
    alternate_screen: bool,
    config: &EncoderConfig,
) -> Option<String> {
    let steps = wheel.dx.abs().max(wheel.dy.abs()).min(MAX_WHEEL_STEPS);
    if steps == 0 {
        return None;
    }

    if modes.mouse_reporting() {
        let base = match (wheel.dy.signum(), wheel.dx.signum()) {
            (-1, _) => 64,
            (1, _) => 65,
            (_, -1) => 66,
            _ => 67,
        };
        let report = encode_mouse_report(
            base + mouse_mod_bits(wheel.mods),
            wheel.x,
            wheel.y,
            false,
            modes.mouse_encoding,
        );
        return Some(report.repeat(steps as usize));
    }

    let alternate_scroll = config.alternate_scroll || modes.contains(ModeFlags::ALTERNATE_SCROLL);
    if !alternate_screen || !alternate_scroll || wheel.dy == 0 {
        return None;
    }
    let arrow = if wheel.dy < 0 { "\\^" } else { "\\v" };
    Some(arrow.repeat(wheel.dy.abs().min(MAX_WHEEL_STEPS) as usize))
}

// ── Paste and focus ─────────────────────────────────────────────────────

/// Encode pasted text: CRLF becomes LF, and bracketed paste wraps it.
#[must_use]
pub fn encode_paste(text: &str, bracketed_paste: bool) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = text.replace("\r\n", "\n");
    if bracketed_paste {
        sanitize(&format!("\x1b[200~{text}\x1b[201~"))
    } else {
        sanitize(&text)
    }
}

/// `ESC [ I` / `ESC [ O` when focus reporting is on.
#[must_use]
pub fn encode_focus(focused: bool, modes: &Modes) -> Option<String> {
    if !modes.contains(ModeFlags::FOCUS_EVENTS) {
        return None;
    }
    Some(if focused { "\x1b[I" } else { "\x1b[O" }.to_owned())
}
