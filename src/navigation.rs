//! URL change detection for client-side routing.

use crate::protocol::Outbound;

/// Remembers the last `location.href` seen.
#[derive(Debug, Clone, Default)]
pub struct UrlWatcher {
    last: Option<String>,
}

impl UrlWatcher {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            last: Some(initial.into()),
        }
    }

    /// `URL_CHANGED` when `href` differs from the last value seen.
    pub fn observe(&mut self, href: &str) -> Option<Outbound> {
        if self.last.as_deref() == Some(href) {
            return None;
        }
        self.last = Some(href.to_string());
        Some(Outbound::UrlChanged {
            url: href.to_string(),
        })
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
