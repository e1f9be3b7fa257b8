#![forbid(unsafe_code)]

//! Browser side of werm.
//!
//! Everything except the `wasm` module is plain Rust and runs natively:
//! - [`framing`]: the backslash-escaped socket protocol,
//! - [`session`]: socket lifecycle, titles and host actions around a terminal,
//! - [`input`]: DOM keyboard, mouse, wheel, paste and focus encoding,
//! - [`frame`]: damaged rows as styled runs for drawing.

pub mod frame;
pub mod framing;
pub mod input;
pub mod session;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::WermWeb;

pub use frame::RenderFrame;
pub use framing::{FrameDecoder, Inbound};
pub use input::{EncoderConfig, InputEvent, KeyOutcome};
pub use session::{Session, SessionAction, SessionConfig, SocketState, TitleSource};

/// Native builds compile this crate as a stub so `cargo check --workspace` stays
/// green on non-wasm targets.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct WermWeb;

#[cfg(not(target_arch = "wasm32"))]
impl WermWeb {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}
