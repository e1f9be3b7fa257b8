#![forbid(unsafe_code)]

//! Host-agnostic VT100/xterm terminal engine.
//!
//! `werm-core` is the platform-independent half of werm: it turns the byte
//! stream a remote host writes into screen state, and nothing else. Sockets,
//! DOM and drawing live in `werm-web`.
//!
//! # Pieces
//!
//! - **Parser**: byte-driven escape-sequence state machine emitting [`Action`]s.
//!   Survives any chunking of its input.
//! - **Screen**: rows of [`Cell`]s with a cursor, pen and charset state. Two
//!   exist (primary and alternate).
//! - **Terminal**: applies actions, owns modes, scroll region, tab stops,
//!   palette and scrollback, and queues replies and host events.
//! - **Snapshot**: versioned serde schema for restoring a session.
//!
//! # Example
//!
//! ```
//! use werm_core::Terminal;
//!
//! let mut term = Terminal::new(80, 24).unwrap();
//! term.feed(b"hello\r\n\x1b[1mbold");
//! assert_eq!(term.active_screen().row(0).unwrap().text(), "hello");
//! assert_eq!(term.cursor().row, 1);
//! ```

pub mod cell;
pub mod charset;
pub mod config;
pub mod cursor;
pub mod damage;
pub mod error;
pub mod grid;
pub mod modes;
pub mod palette;
pub mod parser;
pub mod screen;
pub mod scrollback;
pub mod selection;
mod sgr;
pub mod snapshot;
pub mod tabs;
pub mod terminal;
pub mod width;

pub use cell::{Cell, CellFlags, Color, Pen, SgrAttrs, SgrFlags};
pub use charset::{Charset, CharsetState};
pub use config::TerminalConfig;
pub use cursor::{Cursor, CursorShape, CursorStyle, SavedCursor};
pub use damage::Damage;
pub use error::{DimensionError, SnapshotError};
pub use grid::{Grid, Row, StyledRun};
pub use modes::{ModeFlags, Modes, MouseEncoding, MouseTracking};
pub use palette::{DynamicColor, Palette, Rgb};
pub use parser::{Action, CsiParams, Parser};
pub use screen::Screen;
pub use scrollback::Scrollback;
pub use selection::{BufferPos, Selection};
pub use snapshot::{SNAPSHOT_VERSION, TerminalSnapshot};
pub use tabs::TabStops;
pub use terminal::{Terminal, TerminalEvent};
pub use width::WidthPolicy;
