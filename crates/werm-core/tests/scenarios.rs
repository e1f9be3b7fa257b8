//! End-to-end scenarios: realistic host output fed through the public API.

use std::time::Duration;

use web_time::Instant;
use werm_core::{Terminal, TerminalConfig, TerminalEvent};

fn fed(cols: u16, rows: u16, input: &[u8]) -> Terminal {
    let mut t = Terminal::new(cols, rows).unwrap();
    t.feed(input);
    t
}

fn row(t: &Terminal, r: u16) -> String {
    t.active_screen().row(r).unwrap().text()
}

fn pos(t: &Terminal) -> (u16, u16) {
    let c = t.cursor();
    (c.row, c.col)
}

// ── Basic scenarios ─────────────────────────────────────────────────────

#[test]
fn hello_then_crlf() {
    let t = fed(80, 24, b"hello\r\n");
    let first = t.active_screen().row(0).unwrap();
    assert_eq!(first.text(), "hello");
    assert!(first.cells()[5..].iter().all(|c| c.is_blank()));
    assert_eq!(pos(&t), (1, 0));
}

#[test]
fn cup_converts_to_zero_based() {
    let t = fed(80, 24, b"\x1b[5;10H");
    assert_eq!(pos(&t), (4, 9));
}

#[test]
fn sgr_zero_resets_every_attribute() {
    let mut t = fed(80, 24, b"\x1b[1;3;4;5;7;9;31;44m");
    assert!(!t.active_screen().pen.is_default());
    t.feed(b"\x1b[0m");
    assert!(t.active_screen().pen.attrs.is_default());
    t.feed(b"x");
    assert!(t.active_screen().row(0).unwrap().cells()[0].has_pen(&Default::default()));
}

#[test]
fn utf8_split_across_chunks_prints_once() {
    let mut split = Terminal::new(10, 1).unwrap();
    split.feed(&[0xE4]);
    assert_eq!(row(&split, 0), "");
    split.feed(&[0xB8, 0xAD]);

    let whole = fed(10, 1, "中".as_bytes());
    assert_eq!(row(&split, 0), "中");
    assert_eq!(split.snapshot(), whole.snapshot());
    assert_eq!(pos(&split), (0, 2));
}

// ── Shell session ───────────────────────────────────────────────────────

#[test]
fn long_output_scrolls_into_history_with_stable_row_ids() {
    let mut t = Terminal::new(20, 3).unwrap();
    let before = t.absolute_row(0);
    for n in 0..10 {
        t.feed(format!("line {n}\r\n").as_bytes());
    }
    t.feed(b"$ ");
    assert_eq!(t.scrollback().len(), 8);
    assert_eq!(t.scrollback().get(0).unwrap().text(), "line 0");
    assert_eq!(row(&t, 0), "line 8");
    assert_eq!(t.current_row_text(), "$");
    assert_eq!(t.absolute_row(0), before + 8);
}

#[test]
fn prompt_redraw_with_erase_line() {
    let t = fed(30, 2, b"$ git stauts\r\x1b[K$ git status");
    assert_eq!(row(&t, 0), "$ git status");
    assert_eq!(pos(&t), (0, 12));
}

#[test]
fn bottom_nonempty_row_skips_blank_tail() {
    let t = fed(20, 5, b"one\r\ntwo\r\n\r\n");
    assert_eq!(t.bottom_nonempty_row_text(), "two");
}

// ── Full-screen application ─────────────────────────────────────────────

#[test]
fn pager_session_leaves_primary_untouched() {
    let mut t = fed(20, 4, b"$ less file\r\n");
    t.feed(b"\x1b[?1049h\x1b[1;3r\x1b[Hpage 1\r\npage 2\r\npage 3\r\npage 4");
    assert!(t.is_alternate_active());
    assert_eq!(row(&t, 0), "page 2");
    assert_eq!(row(&t, 2), "page 4");
    assert!(t.scrollback().is_empty());

    t.feed(b"\x1b[r\x1b[?1049l");
    assert!(!t.is_alternate_active());
    assert_eq!(row(&t, 0), "$ less file");
    assert_eq!(pos(&t), (1, 0));
}

#[test]
fn status_line_stays_put_while_region_scrolls() {
    let mut t = Terminal::new(10, 4).unwrap();
    t.feed(b"\x1b[4;1Hstatus\x1b[1;3r\x1b[1;1H");
    for n in 0..6 {
        t.feed(format!("\r\nl{n}").as_bytes());
    }
    assert_eq!(row(&t, 3), "status");
    assert_eq!(row(&t, 2), "l5");
    assert!(t.scrollback().is_empty());
}

// ── Reverse wraparound ──────────────────────────────────────────────────

#[test]
fn reverse_wraparound_walks_every_position() {
    let (cols, rows) = (3u16, 2u16);
    let cells = i64::from(cols) * i64::from(rows);
    for start_row in 0..rows {
        for start_col in 0..cols {
            for count in 1u16..=13 {
                let input = format!(
                    "\x1b[?45h\x1b[{};{}H\x1b[{count}D",
                    start_row + 1,
                    start_col + 1
                );
                let t = fed(cols, rows, input.as_bytes());
                let linear = (i64::from(start_row) * i64::from(cols) + i64::from(start_col)
                    - i64::from(count))
                .rem_euclid(cells);
                let expected = ((linear / i64::from(cols)) as u16, (linear % i64::from(cols)) as u16);
                assert_eq!(
                    pos(&t),
                    expected,
                    "from ({start_row}, {start_col}) back {count}"
                );
            }
        }
    }
}

#[test]
fn reverse_wraparound_consumes_pending_wrap_first() {
    let t = fed(3, 2, b"\x1b[?45habc\x08");
    assert_eq!(pos(&t), (0, 2));
    assert!(!t.cursor().overflow);

    let t = fed(3, 2, b"\x1b[?45habc\x1b[2D");
    assert_eq!(pos(&t), (0, 1));
}

#[test]
fn without_reverse_wraparound_backspace_stops_at_margin() {
    let t = fed(3, 2, b"\x1b[2;1H\x08\x08");
    assert_eq!(pos(&t), (1, 0));
    let t = fed(3, 2, b"abc\x08");
    assert_eq!(pos(&t), (0, 1));
}

// ── Host integration ────────────────────────────────────────────────────

#[test]
fn tmux_control_lines_become_events() {
    let mut t = fed(20, 2, b"\x1bP1000p%begin 1\r\n%end 1\r\n\x1b\\after");
    assert_eq!(
        t.take_events(),
        vec![
            TerminalEvent::TmuxLine(Some("%begin 1".into())),
            TerminalEvent::TmuxLine(Some("%end 1".into())),
            TerminalEvent::TmuxLine(None),
        ]
    );
    assert_eq!(row(&t, 0), "after");
}

#[test]
fn stalled_osc_is_abandoned_after_timeout() {
    let config = TerminalConfig::default().with_string_timeout(Duration::from_secs(1));
    let mut t = Terminal::with_config(20, 2, config).unwrap();
    let start = Instant::now();
    t.feed_at(b"\x1b]0;never finished", start);
    t.feed_at(b"visible", start + Duration::from_secs(5));
    assert_eq!(row(&t, 0), "visible");
    assert_eq!(t.title(), "");
}

#[test]
fn terminal_queries_queue_replies_in_order() {
    let mut t = fed(80, 24, b"\x1b[3;7H\x1b[c\x1b[6n\x1b[5n");
    assert_eq!(
        t.take_replies(),
        vec![
            "\x1b[?1;2c".to_string(),
            "\x1b[3;7R".to_string(),
            "\x1b[0n".to_string(),
        ]
    );
    assert!(t.take_replies().is_empty());
}

#[test]
fn session_survives_snapshot_restore() {
    let mut t = fed(20, 3, b"\x1b]2;work\x07a\r\nb\r\nc\r\nd\x1b[?1049h\x1b[2;2Hvi");
    let json = t.snapshot().to_json().unwrap();
    let mut restored = Terminal::restore_json(&json, TerminalConfig::default()).unwrap();
    assert_eq!(restored.title(), "work");
    assert!(restored.is_alternate_active());

    for term in [&mut t, &mut restored] {
        term.feed(b"\x1b[?1049le");
    }
    assert_eq!(restored.snapshot(), t.snapshot());
    assert_eq!(row(&restored, 2), "de");
}
