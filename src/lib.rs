//! Selector Bridge
//!
//! Injected into a hosted preview page. Forwards the page's console output,
//! fetch traffic and uncaught errors to the embedding editor frame, and lets
//! the editor highlight, pick and edit rendered elements by their source
//! location.
//!
//! Everything outside [`web`] is plain Rust over the [`dom`] and [`bus`]
//! seams and runs natively under test.

#![allow(clippy::type_complexity)]

pub mod bridge;
pub mod bus;
pub mod config;
pub mod dom;
pub mod error;
pub mod locator;
pub mod navigation;
pub mod protocol;
pub mod selector;
pub mod serializer;
pub mod telemetry;
pub mod tree;

#[cfg(test)]
mod testing;

#[cfg(target_arch = "wasm32")]
mod web;

pub use bridge::{Bridge, Reaction};
pub use bus::{MessageBus, OriginGate, Transport};
pub use config::{BridgeConfig, SerializerConfig, SerializerOverrides};
pub use dom::{DomElement, Page};
pub use error::BridgeError;
pub use protocol::{ElementData, Inbound, Outbound, SourceLocation};
pub use selector::{Deferred, Effect, EventVerdict, Selector, Timer};
pub use serializer::{serialize, SerializedValue};

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    web::boot();
}
