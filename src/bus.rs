//! Origin gate and outbound message bus.

use crate::error::BridgeError;
use crate::protocol::Outbound;

/// Wildcard origin: admits every sender and posts without a target check.
pub const ANY_ORIGIN: &str = "*";

/// Cross-frame posting, implemented over `window.parent`/`window.top` by the
/// web runtime.
pub trait Transport {
    /// Post to the parent frame with `target_origin`.
    fn post(&self, message: &serde_json::Value, target_origin: &str) -> Result<(), BridgeError>;

    /// Post to the top-level window with a wildcard target.
    fn post_to_top(&self, message: &serde_json::Value) -> Result<(), BridgeError>;
}

/// Allow-list of origins.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginGate {
    allowed: Vec<String>,
}

impl OriginGate {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Whether a message from `origin` may be processed. Empty origins never
    /// pass, not even the wildcard.
    pub fn admits(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }
        self.allowed.iter().any(|o| o == ANY_ORIGIN || o == origin)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Fire-and-forget broadcast to every allowed origin.
pub struct MessageBus<T> {
    transport: T,
    gate: OriginGate,
}

impl<T: Transport> MessageBus<T> {
    pub fn new(transport: T, gate: OriginGate) -> Self {
        Self { transport, gate }
    }

    pub fn gate(&self) -> &OriginGate {
        &self.gate
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Post `message` to each allowed origin. A failed origin is logged and
    /// skipped; the rest still receive the message.
    pub fn send(&self, message: &Outbound) {
        let value = match serde_json::to_value(message) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Invalid message format: {}", e);
                return;
            }
        };
        for origin in self.gate.allowed() {
            if let Err(e) = self.transport.post(&value, origin) {
                tracing::warn!("{}", e);
            }
        }
    }

    /// Post to the top window regardless of the allow-list.
    pub fn send_to_top(&self, message: &Outbound) {
        let result = serde_json::to_value(message)
            .map_err(BridgeError::from)
            .and_then(|value| self.transport.post_to_top(&value));
        if let Err(e) = result {
            tracing::warn!("{}", e);
        }
    }
}
