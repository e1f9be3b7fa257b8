//! One browser terminal session: the socket protocol around a [`Terminal`].
//!
//! The session is host-agnostic. It never touches the DOM or the socket
//! itself; it queues [`SessionAction`]s that the wasm layer (or a test)
//! carries out, and it is told about socket events through [`Session::on_open`],
//! [`Session::on_message`] and [`Session::on_close`].

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;
use werm_core::{
    Damage, DimensionError, ModeFlags, Selection, Terminal, TerminalConfig, TerminalEvent,
};

use crate::framing::{self, FrameDecoder, Inbound, sanitize};
use crate::input::{
    EncoderConfig, InputEvent, KeyOutcome, encode_focus, encode_key, encode_mouse, encode_paste,
    encode_wheel,
};

/// Banner written into the terminal when the socket drops.
pub const LOST_CONNECTION: &str = "[lost connection to server]";

/// Shown when a per-session page is requested without a session id.
pub const EPHEMERAL_SESSION: &str = "Not available in ephemeral session.";

/// How long a row-derived window title is held before it may change again.
pub const TITLE_HOLD: Duration = Duration::from_secs(2);

/// Length of an endpoint id.
pub const ENDPOINT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host name shown at the end of the window title.
    pub host: String,
    pub terminal: TerminalConfig,
    pub encoder: EncoderConfig,
    /// Control frames longer than this are dropped unparsed.
    pub max_frame_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            terminal: TerminalConfig::default(),
            encoder: EncoderConfig::default(),
            max_frame_len: framing::DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Effects the host must carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "arg", rename_all = "snake_case")]
pub enum SessionAction {
    /// Open (or reopen) the socket.
    OpenSocket,
    /// Send one text frame.
    Send(String),
    SetWindowTitle(String),
    /// Load `/aux.js?<spec>`.
    LoadAuxScript(String),
    /// Replace the page URL without navigating.
    ReplaceUrl(String),
    /// Open a URL in a new window.
    OpenUrl(String),
    WriteClipboard(String),
    /// Call back into [`Session::redraw`] on the next animation frame.
    ScheduleRedraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    Connecting,
    Open,
}

/// Which row a locked title is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    /// The cursor row.
    CurrentRow,
    /// The lowest row with any text.
    BottomRow,
}

/// Debounces redraw requests: at most one deferred redraw is outstanding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RedrawScheduler {
    pending: bool,
}

impl RedrawScheduler {
    /// Note that a redraw is needed. Returns `true` only when the caller must
    /// schedule one, i.e. none is outstanding yet.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    /// The scheduled redraw is running.
    pub fn fire(&mut self) {
        self.pending = false;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Whether `id` is a usable stored endpoint id: exactly eight characters in
/// `\0`..=`~`.
#[must_use]
pub fn is_valid_endpoint_id(id: &str) -> bool {
    id.chars().count() == ENDPOINT_ID_LEN && id.chars().all(|c| c <= '~')
}

/// Reuse a valid stored endpoint id, or derive a fresh one from eight random
/// bytes masked to seven bits.
#[must_use]
pub fn endpoint_id(stored: Option<&str>, random: [u8; ENDPOINT_ID_LEN]) -> String {
    match stored {
        Some(id) if is_valid_endpoint_id(id) => id.to_owned(),
        _ => random.iter().map(|&b| char::from(b & 0x7f)).collect(),
    }
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    terminal: Terminal,
    decoder: FrameDecoder,
    socket: SocketState,
    send_queue: VecDeque<String>,
    endpoint_id: String,
    /// Server session id; grows through `@appendid`.
    termid: String,
    row_title: String,
    title_locked: bool,
    title_held_until: Option<Instant>,
    title_stale: bool,
    window_title: String,
    redraw: RedrawScheduler,
    actions: Vec<SessionAction>,
}

impl Session {
    pub fn new(
        cols: u16,
        rows: u16,
        endpoint_id: String,
        termid: Option<String>,
        config: SessionConfig,
    ) -> Result<Self, DimensionError> {
        let terminal = Terminal::with_config(cols, rows, config.terminal)?;
        let decoder = FrameDecoder::with_max_frame_len(config.max_frame_len);
        let mut session = Self {
            config,
            terminal,
            decoder,
            socket: SocketState::Closed,
            send_queue: VecDeque::new(),
            endpoint_id,
            termid: termid.unwrap_or_default(),
            row_title: String::new(),
            title_locked: false,
            title_held_until: None,
            title_stale: false,
            window_title: String::new(),
            redraw: RedrawScheduler::default(),
            actions: Vec::new(),
        };
        session.refresh_window_title();
        Ok(session)
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal {
        &mut self.terminal
    }

    #[must_use]
    pub fn socket_state(&self) -> SocketState {
        self.socket
    }

    #[must_use]
    pub fn termid(&self) -> &str {
        &self.termid
    }

    #[must_use]
    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    #[must_use]
    pub fn window_title(&self) -> &str {
        &self.window_title
    }

    /// Frames waiting for the socket to open.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.send_queue.len()
    }

    /// Drain the effects queued since the last call.
    pub fn take_actions(&mut self) -> Vec<SessionAction> {
        std::mem::take(&mut self.actions)
    }

    // ── Socket lifecycle ────────────────────────────────────────────

    /// Ask the host to open the socket unless one is open or opening.
    pub fn connect(&mut self) {
        if self.socket == SocketState::Closed {
            tracing::debug!("opening socket");
            self.socket = SocketState::Connecting;
            self.actions.push(SessionAction::OpenSocket);
        }
    }

    /// The socket is open: identify, report the size, then flush the queue.
    pub fn on_open(&mut self) {
        tracing::info!(termid = %self.termid, "connected");
        self.socket = SocketState::Open;
        let size = framing::window_size(self.terminal.rows(), self.terminal.cols());
        self.send_queue.push_front(size);
        self.send_queue.push_front(framing::hello(&self.endpoint_id));
        self.flush_queue();
    }

    /// The socket closed: show the banner. The next [`Self::signal`] reconnects.
    pub fn on_close(&mut self) {
        tracing::info!(queued = self.send_queue.len(), "connection lost");
        self.socket = SocketState::Closed;
        self.terminal.show_notice(LOST_CONNECTION);
        self.request_redraw();
    }

    /// Queue text for the host and send everything queued if the socket is
    /// open. A closed socket is reopened.
    pub fn signal(&mut self, text: impl Into<String>) {
        self.send_queue.push_back(text.into());
        match self.socket {
            SocketState::Open => self.flush_queue(),
            SocketState::Closed => self.connect(),
            SocketState::Connecting => {}
        }
    }

    fn flush_queue(&mut self) {
        while let Some(frame) = self.send_queue.pop_front() {
            tracing::trace!(len = frame.len(), "send");
            self.actions.push(SessionAction::Send(frame));
        }
    }

    // ── Inbound ─────────────────────────────────────────────────────

    /// Handle one socket message.
    pub fn on_message(&mut self, chunk: &str) {
        self.on_message_at(chunk, Instant::now());
    }

    /// [`Self::on_message`] with an explicit clock, for deterministic callers.
    pub fn on_message_at(&mut self, chunk: &str, now: Instant) {
        let mut displayed = false;
        for inbound in self.decoder.decode(chunk) {
            match inbound {
                Inbound::Display(bytes) => {
                    self.terminal.feed_at(&bytes, now);
                    self.drain_terminal();
                    displayed = true;
                }
                Inbound::State(json) => self.restore_state(&json),
                Inbound::Title(title) => {
                    self.title_locked = !title.is_empty();
                    self.row_title = title;
                    self.refresh_window_title();
                }
                Inbound::AuxJs(spec) => {
                    self.actions
                        .push(SessionAction::LoadAuxScript(format!("/aux.js?{spec}")));
                }
                Inbound::AppendId(suffix) => {
                    self.termid.push_str(&suffix);
                    tracing::debug!(termid = %self.termid, "session id extended");
                    self.actions.push(SessionAction::ReplaceUrl(format!(
                        "/?termid={}",
                        self.termid
                    )));
                    self.refresh_window_title();
                }
            }
        }
        if displayed {
            self.request_redraw();
            self.follow_cursor_row(now);
        }
    }

    fn drain_terminal(&mut self) {
        for reply in self.terminal.take_replies() {
            self.signal(sanitize(&reply));
        }
        for event in self.terminal.take_events() {
            match event {
                TerminalEvent::ClipboardWrite(text) => {
                    self.actions.push(SessionAction::WriteClipboard(text));
                }
                TerminalEvent::PaletteChanged => self.request_redraw(),
                TerminalEvent::TitleChanged(title) => {
                    tracing::trace!(%title, "ignoring OSC title; the window follows the cursor row");
                }
                TerminalEvent::Bell => tracing::trace!("bell"),
                TerminalEvent::TmuxLine(line) => tracing::trace!(?line, "tmux control line"),
                TerminalEvent::DeviceControl(payload) => {
                    tracing::trace!(len = payload.len(), "ignoring device control string");
                }
            }
        }
    }

    /// Replace the terminal from `@state`, or start blank if it cannot be used.
    fn restore_state(&mut self, json: &str) {
        let (cols, rows) = (self.terminal.cols(), self.terminal.rows());
        let restored = Terminal::restore_json(json, self.config.terminal).and_then(|mut t| {
            t.resize(cols, rows)?;
            Ok(t)
        });
        self.terminal = match restored {
            Ok(t) => {
                tracing::debug!(cols, rows, "restored terminal state");
                t
            }
            Err(err) => {
                tracing::warn!(%err, "unusable terminal state, starting blank");
                match Terminal::with_config(cols, rows, self.config.terminal) {
                    Ok(t) => t,
                    Err(_) => return,
                }
            }
        };
        self.request_redraw();
    }

    // ── Titles ──────────────────────────────────────────────────────

    /// Let the window title follow the cursor row, at most once per hold.
    fn follow_cursor_row(&mut self, now: Instant) {
        if self.title_locked {
            return;
        }
        if self.title_held_until.is_some_and(|until| now < until) {
            self.title_stale = true;
            return;
        }
        self.title_held_until = Some(now + TITLE_HOLD);
        self.title_stale = false;
        self.refresh_window_title();
    }

    fn refresh_window_title(&mut self) {
        if !self.title_locked {
            let row = self.terminal.current_row_text();
            if !row.is_empty() {
                self.row_title = row;
            }
        }
        let mut parts = Vec::with_capacity(3);
        if !self.termid.is_empty() {
            parts.push(format!("[{}]", self.termid));
        }
        if !self.row_title.is_empty() {
            parts.push(self.row_title.clone());
        }
        if !self.config.host.is_empty() {
            parts.push(self.config.host.clone());
        }
        let title = parts.join(" | ");
        if title != self.window_title {
            self.window_title.clone_from(&title);
            self.actions.push(SessionAction::SetWindowTitle(title));
        }
    }

    /// Ask the server to lock the title to a row's text.
    pub fn set_locked_title(&mut self, source: TitleSource) {
        let text = match source {
            TitleSource::CurrentRow => self.terminal.current_row_text(),
            TitleSource::BottomRow => self.terminal.bottom_nonempty_row_text(),
        };
        if !text.is_empty() {
            self.signal(framing::lock_title(&text));
        }
    }

    pub fn unlock_title(&mut self) {
        self.signal(framing::UNLOCK_TITLE);
        self.title_locked = false;
        self.refresh_window_title();
    }

    pub fn request_dump(&mut self) {
        self.signal(framing::REQUEST_DUMP);
    }

    // ── Pages ───────────────────────────────────────────────────────

    /// Open a new terminal attached to the same base session.
    pub fn open_child_term(&mut self) {
        let base = self.termid.split('.').next().unwrap_or_default();
        self.actions.push(SessionAction::OpenUrl(format!(
            "/?termid={}",
            encode_uri_component(base)
        )));
    }

    /// Open the server's log view of this session.
    pub fn open_log_view(&mut self) {
        self.open_for_term("/?logview=");
    }

    /// Open the server's scrollback page for this session.
    pub fn open_scrollback_view(&mut self) {
        self.open_for_term("/scrollback?termid=");
    }

    fn open_for_term(&mut self, prefix: &str) {
        if self.termid.is_empty() {
            self.terminal.show_notice(EPHEMERAL_SESSION);
            self.request_redraw();
            return;
        }
        let url = format!("{prefix}{}", encode_uri_component(&self.termid));
        self.actions.push(SessionAction::OpenUrl(url));
    }

    /// Copy a selection to the clipboard.
    pub fn copy_selection(&mut self, selection: &Selection) {
        let text = self.terminal.selection_text(selection);
        if !text.is_empty() {
            self.actions.push(SessionAction::WriteClipboard(text));
        }
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Route one input event. Returns `true` when the session took it and the
    /// browser's default handling should be suppressed.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        let modes = *self.terminal.modes();
        let out = match event {
            InputEvent::Key(key) => match encode_key(key, &self.config.encoder) {
                KeyOutcome::Send(text) => Some(text),
                KeyOutcome::Consumed => return true,
                KeyOutcome::Unhandled => return false,
            },
            InputEvent::Mouse(mouse) => encode_mouse(mouse, &modes),
            InputEvent::Wheel(wheel) => encode_wheel(
                wheel,
                &modes,
                self.terminal.is_alternate_active(),
                &self.config.encoder,
            ),
            InputEvent::Paste(text) => {
                Some(encode_paste(text, modes.contains(ModeFlags::BRACKETED_PASTE)))
            }
            InputEvent::Composition(data) => Some(sanitize(data)),
            InputEvent::Focus(focused) => encode_focus(*focused, &modes),
        };
        match out {
            Some(text) if !text.is_empty() => {
                self.signal(text);
                true
            }
            _ => false,
        }
    }

    /// The viewport changed size.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), DimensionError> {
        if (cols, rows) == (self.terminal.cols(), self.terminal.rows()) {
            return Ok(());
        }
        self.terminal.resize(cols, rows)?;
        // A connecting socket reports the size itself once open.
        if self.socket == SocketState::Open {
            self.signal(framing::window_size(rows, cols));
        }
        self.request_redraw();
        Ok(())
    }

    // ── Redraw ──────────────────────────────────────────────────────

    fn request_redraw(&mut self) {
        if self.redraw.request() {
            self.actions.push(SessionAction::ScheduleRedraw);
        }
    }

    /// The scheduled redraw runs: return what changed since the last one.
    pub fn redraw(&mut self, now: Instant) -> Damage {
        self.redraw.fire();
        if self.title_stale && self.title_held_until.is_none_or(|until| now >= until) {
            self.follow_cursor_row(now);
        }
        self.terminal.take_damage()
    }
}

/// Percent-encode everything but the characters `encodeURIComponent` keeps.
fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&b) {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}
