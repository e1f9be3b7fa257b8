//! Property tests for the inbound frame decoder and the session around it.

use proptest::prelude::*;
use werm_web::framing::{FrameDecoder, Inbound, sanitize, unescape};
use werm_web::session::{Session, SessionConfig};

// ── Strategy helpers ──────────────────────────────────────────────────

/// One well-formed piece of the inbound stream.
fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z \n\u{e9}\u{4e2d}]{1,6}",
        3 => any::<u8>().prop_map(|b| format!("\\{b:02x}")),
        2 => (0x80u8..=0xff).prop_map(|b| format!("\\{b:02x}")),
        1 => Just("\\1b%@".to_string()),
        1 => Just("\\1b%G".to_string()),
        1 => "[a-z]{0,5}".prop_map(|s| format!("\\@title:{s}\n")),
        1 => "[a-z.]{0,5}".prop_map(|s| format!("\\@appendid:{s}\n")),
        1 => "[a-z=]{0,5}".prop_map(|s| format!("\\@auxjs:{s}\n")),
    ]
}

fn arb_stream() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_token(), 0..24).prop_map(|tokens| tokens.concat())
}

/// Join adjacent display items so that only chunk-independent structure is
/// compared.
fn merged(items: Vec<Inbound>) -> Vec<Inbound> {
    let mut out: Vec<Inbound> = Vec::new();
    for item in items {
        if let (Some(Inbound::Display(prev)), Inbound::Display(bytes)) = (out.last_mut(), &item) {
            prev.extend_from_slice(bytes);
            continue;
        }
        out.push(item);
    }
    out
}

fn decode_chunks(stream: &str, cuts: &[usize]) -> Vec<Inbound> {
    let mut bounds: Vec<usize> = cuts
        .iter()
        .map(|&c| c % (stream.len() + 1))
        .filter(|&c| stream.is_char_boundary(c))
        .collect();
    bounds.push(0);
    bounds.push(stream.len());
    bounds.sort_unstable();
    bounds.dedup();

    let mut decoder = FrameDecoder::new();
    let mut out = Vec::new();
    for pair in bounds.windows(2) {
        out.extend(decoder.decode(&stream[pair[0]..pair[1]]));
    }
    assert!(!decoder.has_partial());
    merged(out)
}

// ── Properties ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decoding_is_chunk_independent(
        stream in arb_stream(),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
    ) {
        let whole = decode_chunks(&stream, &[]);
        prop_assert_eq!(decode_chunks(&stream, &cuts), whole);
    }

    #[test]
    fn decoded_display_never_contains_literal_newlines(text in "[a-z\n]{0,30}") {
        for item in FrameDecoder::new().decode(&text) {
            if let Inbound::Display(d) = item {
                prop_assert!(!d.contains(&b'\n'));
            }
        }
    }

    #[test]
    fn sanitize_is_inverted_by_unescape(text in ".{0,40}") {
        let wire = sanitize(&text);
        prop_assert!(!wire.contains('\n'));
        prop_assert_eq!(unescape(&wire), text);
    }

    #[test]
    fn session_screen_is_chunk_independent(
        stream in arb_stream(),
        cuts in prop::collection::vec(any::<usize>(), 0..8),
    ) {
        let screen = |cuts: &[usize]| {
            let mut s = Session::new(12, 4, "ABCDEFGH".into(), None, SessionConfig::default()).unwrap();
            let mut bounds: Vec<usize> = cuts
                .iter()
                .map(|&c| c % (stream.len() + 1))
                .filter(|&c| stream.is_char_boundary(c))
                .chain([0, stream.len()])
                .collect();
            bounds.sort_unstable();
            bounds.dedup();
            for pair in bounds.windows(2) {
                s.on_message(&stream[pair[0]..pair[1]]);
            }
            s.terminal().snapshot()
        };
        prop_assert_eq!(screen(&cuts), screen(&[]));
    }
}

#[test]
fn escaped_newline_title_sets_title_without_printing() {
    let mut s = Session::new(20, 2, "ABCDEFGH".into(), None, SessionConfig::default()).unwrap();
    s.on_message("\\@title:hello\\nworld\n");
    assert_eq!(s.terminal().current_row_text(), "");
    assert!(s.window_title().contains("hello\nworld"));
}
