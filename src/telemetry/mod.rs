//! Telemetry capture
//!
//! Console output, fetch traffic and uncaught errors are observed by
//! patching the page once and reporting through the message bus.
//!
//! ```text
//! console.* ──► console::ConsoleCapture ──┐
//! fetch()   ──► network::PendingRequest ──┼──► Outbound ──► MessageBus
//! onerror   ──► errors::ErrorReporter ────┘
//! ```

pub mod console;
pub mod errors;
pub mod network;

use chrono::{DateTime, SecondsFormat, Utc};

/// Runs a patch at most once.
#[derive(Debug, Default)]
pub struct Installer {
    installed: bool,
}

impl Installer {
    /// Run `patch` unless a previous call already succeeded. Returns whether
    /// the patch ran. A failed patch leaves the installer uninstalled.
    pub fn install<E>(&mut self, patch: impl FnOnce() -> Result<(), E>) -> Result<bool, E> {
        if self.installed {
            return Ok(false);
        }
        patch()?;
        self.installed = true;
        Ok(true)
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

/// One installer per patch site.
#[derive(Debug, Default)]
pub struct Instrumentation {
    pub console: Installer,
    pub fetch: Installer,
    pub errors: Installer,
}

/// Current time as ISO-8601 with milliseconds, UTC.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds as ISO-8601 with milliseconds, UTC.
pub fn iso_at(epoch_ms: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
