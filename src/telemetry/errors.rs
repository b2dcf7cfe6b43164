//! Uncaught error and unhandled rejection reporting with time-windowed
//! deduplication.

use crate::protocol::{FailureReport, Outbound, RuntimeErrorReport};
use std::collections::HashMap;

/// Message used when a rejection reason has no message of its own.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Unhandled promise rejection";

/// Keys seen within the last `ttl_ms`.
#[derive(Debug, Clone)]
pub struct DedupSet {
    ttl_ms: f64,
    expiries: HashMap<String, f64>,
}

impl DedupSet {
    pub fn new(ttl_ms: f64) -> Self {
        Self {
            ttl_ms,
            expiries: HashMap::new(),
        }
    }

    /// Admit `key` at `now_ms` unless it was admitted less than `ttl_ms`
    /// ago. Expired keys are purged first.
    pub fn admit(&mut self, key: &str, now_ms: f64) -> bool {
        self.expiries.retain(|_, expiry| *expiry > now_ms);
        if self.expiries.contains_key(key) {
            return false;
        }
        self.expiries.insert(key.to_string(), now_ms + self.ttl_ms);
        true
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }
}

/// Fields of a window `error` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEventInfo {
    pub message: String,
    pub filename: String,
    pub lineno: u32,
    pub colno: u32,
    /// `event.error.stack`, when the thrown value had one.
    pub stack: Option<String>,
}

impl ErrorEventInfo {
    pub fn key(&self) -> String {
        format!("{}|{}|{}|{}", self.message, self.filename, self.lineno, self.colno)
    }
}

/// What can be read off an unhandled rejection's `reason`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RejectionReason {
    pub stack: Option<String>,
    pub message: Option<String>,
    /// `String(reason)`; `None` when the reason is `undefined` or `null`.
    pub display: Option<String>,
}

impl RejectionReason {
    /// Stack, else message, else string form. Empty candidates are skipped.
    pub fn key(&self) -> Option<String> {
        [&self.stack, &self.message, &self.display]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.is_empty())
}

/// Turns error events into deduplicated outbound reports.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    seen: DedupSet,
}

impl ErrorReporter {
    pub fn new(ttl_ms: f64) -> Self {
        Self {
            seen: DedupSet::new(ttl_ms),
        }
    }

    /// `RUNTIME_ERROR`, unless the same error was reported within the window.
    pub fn runtime_error(&mut self, event: ErrorEventInfo, now_ms: f64) -> Option<Outbound> {
        if !self.seen.admit(&event.key(), now_ms) {
            tracing::debug!("Suppressing repeated error: {}", event.message);
            return None;
        }
        Some(Outbound::RuntimeError {
            error: RuntimeErrorReport {
                message: event.message,
                lineno: event.lineno,
                colno: event.colno,
                filename: event.filename,
                stack: event.stack,
            },
        })
    }

    /// `UNHANDLED_PROMISE_REJECTION`, unless nothing identifies the reason
    /// or it was reported within the window.
    pub fn rejection(&mut self, reason: RejectionReason, now_ms: f64) -> Option<Outbound> {
        let key = reason.key()?;
        if !self.seen.admit(&key, now_ms) {
            tracing::debug!("Suppressing repeated rejection");
            return None;
        }
        Some(Outbound::UnhandledPromiseRejection {
            error: FailureReport {
                message: non_empty(&reason.message).unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string()),
                stack: non_empty(&reason.stack).or(reason.display),
            },
        })
    }
}
