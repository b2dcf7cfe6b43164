//! Error types for the bridge.
//!
//! Nothing here is allowed to escape into the host page. Errors are either
//! logged where they occur (delivery failures, malformed inbound messages) or
//! caught at the dispatch boundary, where they trigger a selector teardown.

use thiserror::Error;

/// Bridge error - every fallible core operation returns one of these.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Inbound message had a known `type` but a payload of the wrong shape.
    #[error("Malformed {kind} payload: {reason}")]
    MalformedPayload { kind: String, reason: String },

    /// A DOM operation was rejected by the host page.
    #[error("DOM operation '{operation}' failed: {detail}")]
    Dom {
        operation: &'static str,
        detail: String,
    },

    /// Posting to a single origin failed.
    #[error("Failed to send message to {origin}: {detail}")]
    Delivery { origin: String, detail: String },

    /// Outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Configuration could not be read.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A browser facility the bridge needs is missing (no window, no body...).
    #[error("{0} is not available")]
    Unavailable(&'static str),
}

impl BridgeError {
    /// Build a DOM error from any displayable detail.
    pub fn dom(operation: &'static str, detail: impl std::fmt::Display) -> Self {
        BridgeError::Dom {
            operation,
            detail: detail.to_string(),
        }
    }

    /// Build a malformed-payload error for an inbound message kind.
    pub fn malformed(kind: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        BridgeError::MalformedPayload {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }

    /// Malformed input only aborts its own handler; everything else tears
    /// the selector down.
    pub fn is_malformed(&self) -> bool {
        matches!(self, BridgeError::MalformedPayload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_is_distinguished_from_handler_failures() {
        assert!(BridgeError::malformed("SET_STYLESHEET", "missing field").is_malformed());
        assert!(!BridgeError::dom("querySelectorAll", "SyntaxError").is_malformed());
        assert!(!BridgeError::Unavailable("document").is_malformed());
    }

    #[test]
    fn display_names_the_failing_piece() {
        let err = BridgeError::Delivery {
            origin: "https://editor.example".into(),
            detail: "DataCloneError".into(),
        };
        assert!(err.to_string().contains("https://editor.example"));

        let err = BridgeError::malformed("GET_PARENT_ELEMENT", "missing field `id`");
        assert_eq!(
            err.to_string(),
            "Malformed GET_PARENT_ELEMENT payload: missing field `id`"
        );
    }
}
