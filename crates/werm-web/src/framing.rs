//! Transport framing between the browser and the werm server.
//!
//! Inbound text is mostly literal terminal output. A backslash starts an
//! escape: `\XX` carries one raw byte as two hex digits, and `\@name:payload`
//! up to a newline carries a control frame. Literal newlines are framing
//! noise and are dropped; the terminal sees `\0a` instead.
//!
//! Outbound text uses the same convention in reverse: character payloads are
//! [`sanitize`]d and commands are short backslash forms (`\i`, `\w`, `\t`,
//! `\d`).

use std::fmt::Write as _;

/// One decoded inbound item, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Raw terminal output. The terminal's parser owns character decoding,
    /// so bytes are passed through whatever coding system is selected.
    Display(Vec<u8>),
    /// `\@state:` snapshot JSON.
    State(String),
    /// `\@title:` locked title, unescaped. Empty unlocks.
    Title(String),
    /// `\@auxjs:` auxiliary script spec.
    AuxJs(String),
    /// `\@appendid:` suffix for the session id.
    AppendId(String),
}

/// Longest `name:payload` a control frame may carry before it is dropped.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 << 20;

/// Stateful decoder for the inbound stream.
///
/// Output does not depend on how the stream is split into chunks: an escape
/// cut short is held until the rest arrives. Display bytes are not decoded
/// here, so a character split across chunks reaches the terminal in pieces
/// and is reassembled by its parser.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    /// Start of an escape whose end has not arrived.
    partial: String,
    /// Display bytes gathered during the current chunk.
    pending: Vec<u8>,
    max_frame_len: usize,
    /// Inside an oversized control frame; input is dropped up to its newline.
    skipping: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            partial: String::new(),
            pending: Vec::new(),
            max_frame_len,
            skipping: false,
        }
    }

    /// An escape is waiting for the rest of its frame.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.partial.is_empty() || self.skipping
    }

    /// Decode one chunk of socket text.
    pub fn decode(&mut self, mut chunk: &str) -> Vec<Inbound> {
        if self.skipping {
            let Some(nl) = chunk.find('\n') else {
                return Vec::new();
            };
            self.skipping = false;
            chunk = &chunk[nl + 1..];
        }

        let joined;
        let mut s: &str = if self.partial.is_empty() {
            chunk
        } else {
            joined = std::mem::take(&mut self.partial) + chunk;
            &joined
        };

        let mut out = Vec::new();
        loop {
            let next_esc = s.find('\\').unwrap_or(s.len());
            for part in s[..next_esc].split('\n') {
                self.pending.extend_from_slice(part.as_bytes());
            }
            s = &s[next_esc..];
            if s.is_empty() {
                break;
            }

            if let Some(frame) = s.strip_prefix("\\@") {
                let Some(nl) = frame.find('\n') else {
                    if frame.len() > self.max_frame_len {
                        tracing::warn!(len = frame.len(), "oversized control frame, dropping");
                        self.skipping = true;
                    } else {
                        self.partial = s.to_owned();
                    }
                    break;
                };
                if nl > self.max_frame_len {
                    tracing::warn!(len = nl, "oversized control frame, dropping");
                } else {
                    let (name, payload) =
                        frame[..nl].split_once(':').unwrap_or((&frame[..nl], ""));
                    self.control_frame(name, payload, &mut out);
                }
                s = &frame[nl + 1..];
                continue;
            }

            let mut chars = s[1..].chars();
            let (Some(hi), Some(lo)) = (chars.next(), chars.next()) else {
                self.partial = s.to_owned();
                break;
            };
            let len = 1 + hi.len_utf8() + lo.len_utf8();
            match (hi.to_digit(16), lo.to_digit(16)) {
                (Some(hi), Some(lo)) => self.pending.push((hi * 16 + lo) as u8),
                _ => tracing::warn!(escape = &s[..len], "malformed byte escape, dropping"),
            }
            s = &s[len..];
        }

        self.flush_display(&mut out);
        out
    }

    fn control_frame(&mut self, name: &str, payload: &str, out: &mut Vec<Inbound>) {
        let frame = match name {
            "state" => Inbound::State(payload.to_owned()),
            "title" => Inbound::Title(unescape(payload)),
            "auxjs" => Inbound::AuxJs(payload.to_owned()),
            "appendid" => Inbound::AppendId(payload.to_owned()),
            _ => {
                tracing::warn!(name, len = payload.len(), "unknown control frame, dropping");
                return;
            }
        };
        // Display that came before the frame must reach the terminal first.
        self.flush_display(out);
        out.push(frame);
    }

    fn flush_display(&mut self, out: &mut Vec<Inbound>) {
        if !self.pending.is_empty() {
            out.push(Inbound::Display(std::mem::take(&mut self.pending)));
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────────

/// Escape a character payload for the wire: `\` becomes `\\` and a newline
/// becomes `\n`.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`sanitize`]. Unknown escapes are kept as written.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// `\i<id>`: identify this endpoint.
#[must_use]
pub fn hello(endpoint_id: &str) -> String {
    format!("\\i{endpoint_id}")
}

/// `\w<rows><cols>`, each zero-padded to four digits.
#[must_use]
pub fn window_size(rows: u16, cols: u16) -> String {
    let mut out = String::with_capacity(10);
    let _ = write!(out, "\\w{rows:04}{cols:04}");
    out
}

/// `\t<title>\n`: lock the title on the server.
#[must_use]
pub fn lock_title(title: &str) -> String {
    let title: String = title.chars().filter(|&c| c != '\n').collect();
    format!("\\t{title}\n")
}

/// Unlock the server-side title.
pub const UNLOCK_TITLE: &str = "\\t\n";

/// Ask the server to dump the session.
pub const REQUEST_DUMP: &str = "\\d";

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn decode_all(chunks: &[&str]) -> Vec<Inbound> {
        let mut d = FrameDecoder::new();
        chunks.iter().flat_map(|c| d.decode(c)).collect()
    }

    #[test]
    fn literal_text_drops_newlines() {
        assert_eq!(
            decode_all(&["ab\ncd"]),
            vec![Inbound::Display(b"abcd".to_vec())]
        );
    }

    #[test]
    fn hex_escapes_carry_raw_bytes() {
        assert_eq!(
            decode_all(&["a\\0d\\0Ab"]),
            vec![Inbound::Display(b"a\r\nb".to_vec())]
        );
    }

    #[test]
    fn escaped_newline_in_title_is_unescaped() {
        let out = decode_all(&["\\@title:hello\\nworld\n"]);
        assert_eq!(out, vec![Inbound::Title("hello\nworld".into())]);
    }

    #[test]
    fn frames_keep_stream_order() {
        let out = decode_all(&["before\\@auxjs:x=1\nafter\\@appendid:.2\n"]);
        assert_eq!(
            out,
            vec![
                Inbound::Display(b"before".to_vec()),
                Inbound::AuxJs("x=1".into()),
                Inbound::Display(b"after".to_vec()),
                Inbound::AppendId(".2".into()),
            ]
        );
    }

    #[test]
    fn partial_frame_waits_for_newline() {
        let mut d = FrameDecoder::new();
        assert!(d.decode("x\\@state:{\"a\"").len() == 1);
        assert!(d.has_partial());
        assert_eq!(d.decode(":1}\n"), vec![Inbound::State("{\"a\":1}".into())]);
        assert!(!d.has_partial());
    }

    #[test]
    fn partial_hex_escape_waits() {
        assert_eq!(
            decode_all(&["\\", "4", "1"]),
            vec![Inbound::Display(b"A".to_vec())]
        );
    }

    #[test]
    fn high_bytes_pass_through_undecoded() {
        let mut d = FrameDecoder::new();
        assert_eq!(d.decode("\\e4\\b8"), vec![Inbound::Display(vec![0xe4, 0xb8])]);
        assert_eq!(d.decode("\\ad"), vec![Inbound::Display(vec![0xad])]);
        // A lone Latin-1 byte is not held back waiting for a continuation.
        assert_eq!(d.decode("\\e9"), vec![Inbound::Display(vec![0xe9])]);
    }

    #[test]
    #[traced_test]
    fn unknown_frame_is_dropped_with_warning() {
        assert_eq!(
            decode_all(&["a\\@bogus:zzz\nb"]),
            vec![Inbound::Display(b"ab".to_vec())]
        );
        assert!(logs_contain("unknown control frame"));
    }

    #[test]
    #[traced_test]
    fn oversized_frame_is_dropped_through_its_newline() {
        let mut d = FrameDecoder::with_max_frame_len(8);
        assert_eq!(d.decode("a\\@title:0123456789"), vec![Inbound::Display(b"a".to_vec())]);
        assert!(logs_contain("oversized control frame"));
        assert!(d.has_partial());
        assert!(d.decode("still the same frame").is_empty());
        assert_eq!(d.decode("rest\nb"), vec![Inbound::Display(b"b".to_vec())]);
        assert!(!d.has_partial());
        assert_eq!(d.decode("\\@title:ok\n"), vec![Inbound::Title("ok".into())]);
    }

    #[test]
    #[traced_test]
    fn oversized_complete_frame_is_dropped() {
        let mut d = FrameDecoder::with_max_frame_len(8);
        assert_eq!(d.decode("\\@title:0123456789\nb"), vec![Inbound::Display(b"b".to_vec())]);
        assert!(logs_contain("oversized control frame"));
    }

    #[test]
    #[traced_test]
    fn malformed_hex_is_dropped() {
        assert_eq!(decode_all(&["\\zzok"]), vec![Inbound::Display(b"ok".to_vec())]);
        assert!(logs_contain("malformed byte escape"));
    }

    #[test]
    fn sanitize_round_trips() {
        let text = "a\\b\nc";
        assert_eq!(sanitize(text), "a\\\\b\\nc");
        assert_eq!(unescape(&sanitize(text)), text);
    }

    #[test]
    fn outbound_commands() {
        assert_eq!(hello("abcdefgh"), "\\iabcdefgh");
        assert_eq!(window_size(24, 80), "\\w00240080");
        assert_eq!(lock_title("vim"), "\\tvim\n");
        assert_eq!(UNLOCK_TITLE, "\\t\n");
        assert_eq!(REQUEST_DUMP, "\\d");
    }
}
