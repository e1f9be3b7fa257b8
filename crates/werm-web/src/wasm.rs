#![forbid(unsafe_code)]

use wasm_bindgen::prelude::*;
use web_time::Instant;
use werm_core::{BufferPos, Selection};

use crate::frame::RenderFrame;
use crate::input::InputEvent;
use crate::session::{ENDPOINT_ID_LEN, Session, SessionConfig, TitleSource, endpoint_id};

/// localStorage key holding this browser's endpoint id.
const ENDPOINT_ID_KEY: &str = "endptid";

fn js_error(err: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}

/// Reuse the stored endpoint id or mint and store a new one.
fn load_endpoint_id() -> Result<String, JsValue> {
    let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
    let storage = window.local_storage()?;
    let stored = match &storage {
        Some(storage) => storage.get_item(ENDPOINT_ID_KEY)?,
        None => None,
    };
    let mut random = [0u8; ENDPOINT_ID_LEN];
    window.crypto()?.get_random_values_with_u8_array(&mut random)?;
    let id = endpoint_id(stored.as_deref(), random);
    if let Some(storage) = storage.filter(|_| stored.as_deref() != Some(id.as_str())) {
        storage.set_item(ENDPOINT_ID_KEY, &id)?;
    }
    Ok(id)
}

/// Browser terminal session.
///
/// JS owns the socket, the canvas and the window. It forwards socket events
/// and DOM input here, then drains [`WermWeb::take_actions`] and carries
/// each action out. Rendering pulls a frame from [`WermWeb::redraw`] when a
/// scheduled animation frame fires.
#[wasm_bindgen]
pub struct WermWeb {
    session: Session,
}

#[wasm_bindgen]
impl WermWeb {
    /// `options` is optional JSON for the session configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(
        cols: u16,
        rows: u16,
        termid: Option<String>,
        options: Option<String>,
    ) -> Result<WermWeb, JsValue> {
        let config = match options.as_deref() {
            Some(json) => serde_json::from_str::<SessionConfig>(json).map_err(js_error)?,
            None => SessionConfig::default(),
        };
        let termid = termid.filter(|id| !id.is_empty());
        let session = Session::new(cols, rows, load_endpoint_id()?, termid, config)
            .map_err(js_error)?;
        Ok(Self { session })
    }

    pub fn connect(&mut self) {
        self.session.connect();
    }

    #[wasm_bindgen(js_name = onOpen)]
    pub fn on_open(&mut self) {
        self.session.on_open();
    }

    #[wasm_bindgen(js_name = onMessage)]
    pub fn on_message(&mut self, data: &str) {
        self.session.on_message(data);
    }

    #[wasm_bindgen(js_name = onClose)]
    pub fn on_close(&mut self) {
        self.session.on_close();
    }

    /// Route one DOM input event, given as JSON. Returns `true` when the
    /// browser default should be prevented.
    pub fn input(&mut self, event: &str) -> Result<bool, JsValue> {
        let event = InputEvent::from_json_str(event).map_err(js_error)?;
        Ok(self.session.handle_input(&event))
    }

    /// Send text as if typed.
    pub fn signal(&mut self, text: &str) {
        self.session.signal(crate::framing::sanitize(text));
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), JsValue> {
        self.session.resize(cols, rows).map_err(js_error)
    }

    /// Pending host actions as a JSON array.
    #[wasm_bindgen(js_name = takeActions)]
    pub fn take_actions(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.take_actions()).map_err(js_error)
    }

    /// Run the scheduled redraw and return the render frame as JSON.
    pub fn redraw(&mut self) -> Result<String, JsValue> {
        let damage = self.session.redraw(Instant::now());
        let frame = RenderFrame::collect(self.session.terminal(), &damage);
        serde_json::to_string(&frame).map_err(js_error)
    }

    /// Lock the server title to the cursor row (`"c"`) or the bottom
    /// non-empty row (`"b"`).
    #[wasm_bindgen(js_name = setLockedTitle)]
    pub fn set_locked_title(&mut self, which: &str) -> Result<(), JsValue> {
        let source = match which {
            "c" => TitleSource::CurrentRow,
            "b" => TitleSource::BottomRow,
            other => return Err(js_error(format!("unknown title source {other:?}"))),
        };
        self.session.set_locked_title(source);
        Ok(())
    }

    #[wasm_bindgen(js_name = unlockTitle)]
    pub fn unlock_title(&mut self) {
        self.session.unlock_title();
    }

    #[wasm_bindgen(js_name = requestDump)]
    pub fn request_dump(&mut self) {
        self.session.request_dump();
    }

    #[wasm_bindgen(js_name = openChildTerm)]
    pub fn open_child_term(&mut self) {
        self.session.open_child_term();
    }

    #[wasm_bindgen(js_name = openLogView)]
    pub fn open_log_view(&mut self) {
        self.session.open_log_view();
    }

    #[wasm_bindgen(js_name = openScrollbackView)]
    pub fn open_scrollback_view(&mut self) {
        self.session.open_scrollback_view();
    }

    /// Copy an inclusive range of the combined history + screen buffer.
    #[wasm_bindgen(js_name = copySelection)]
    pub fn copy_selection(&mut self, start_line: u32, start_col: u16, end_line: u32, end_col: u16) {
        self.session.copy_selection(&Selection {
            start: BufferPos::new(start_line, start_col),
            end: BufferPos::new(end_line, end_col),
        });
    }

    #[wasm_bindgen(getter, js_name = windowTitle)]
    pub fn window_title(&self) -> String {
        self.session.window_title().to_owned()
    }

    #[wasm_bindgen(getter)]
    pub fn termid(&self) -> String {
        self.session.termid().to_owned()
    }
}
