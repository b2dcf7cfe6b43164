//! `postMessage` to the parent and top frames.

use super::describe;
use crate::bus::{Transport, ANY_ORIGIN};
use crate::error::BridgeError;
use serde::Serialize;
use wasm_bindgen::JsValue;
use web_sys::Window;

pub(crate) struct WindowTransport {
    window: Window,
}

impl WindowTransport {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn deliver(&self, frame: Option<Window>, message: &serde_json::Value, origin: &str) -> Result<(), BridgeError> {
        let failed = |detail: String| BridgeError::Delivery {
            origin: origin.to_string(),
            detail,
        };
        let frame = frame.ok_or_else(|| failed("no target frame".to_string()))?;
        let value: JsValue = message
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| failed(e.to_string()))?;
        frame.post_message(&value, origin).map_err(|e| failed(describe(&e)))
    }
}

impl Transport for WindowTransport {
    fn post(&self, message: &serde_json::Value, target_origin: &str) -> Result<(), BridgeError> {
        let parent = self.window.parent().ok().flatten();
        self.deliver(parent, message, target_origin)
    }

    fn post_to_top(&self, message: &serde_json::Value) -> Result<(), BridgeError> {
        let top = self.window.top().ok().flatten();
        self.deliver(top, message, ANY_ORIGIN)
    }
}
