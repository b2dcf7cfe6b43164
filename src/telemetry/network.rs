//! Fetch capture
//!
//! The web runtime describes each intercepted call as a [`PendingRequest`]
//! before forwarding it, then settles it with the response or the rejection.
//! Settling never changes what the page's own `fetch` caller sees.

use crate::protocol::{FailureReport, NetworkRequestRecord, Outbound};
use std::collections::BTreeMap;

/// Placeholder when a body cannot be turned into text.
pub const UNSERIALIZABLE_BODY: &str = "Could not serialize request body";

/// Request body as handed to `fetch`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Form(Vec<(String, String)>),
    /// `URLSearchParams`, already in its string form.
    Search(String),
    /// Anything else, JSON-encoded when possible.
    Json(Option<String>),
}

impl RequestBody {
    pub fn describe(&self) -> String {
        match self {
            RequestBody::Text(text) | RequestBody::Search(text) => text.clone(),
            RequestBody::Form(entries) => format!(
                "FormData: {}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&")
            ),
            RequestBody::Json(Some(json)) => json.clone(),
            RequestBody::Json(None) => UNSERIALIZABLE_BODY.to_string(),
        }
    }
}

/// A fetch call in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub origin: String,
    /// Epoch ms when the call was intercepted.
    pub started_at: f64,
}

/// What the page received from the real `fetch`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSummary {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub ok: bool,
    pub body: Option<String>,
}

impl PendingRequest {
    pub fn new(url: impl Into<String>, method: Option<String>, origin: impl Into<String>, started_at: f64) -> Self {
        let method = method.filter(|m| !m.is_empty()).unwrap_or_else(|| "GET".to_string());
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            origin: origin.into(),
            started_at,
        }
    }

    fn record(&self, finished_at: f64, timestamp: String) -> NetworkRequestRecord {
        NetworkRequestRecord {
            url: self.url.clone(),
            method: self.method.clone(),
            request_body: self.body.as_ref().map(RequestBody::describe),
            timestamp,
            duration: (finished_at - self.started_at).max(0.0),
            origin: self.origin.clone(),
            headers: self.headers.clone(),
            ..Default::default()
        }
    }

    /// Record for a resolved call. An empty request url falls back to the
    /// response url.
    pub fn into_success(self, response: ResponseSummary, finished_at: f64, timestamp: String) -> Outbound {
        let mut request = self.record(finished_at, timestamp);
        if request.url.is_empty() {
            request.url = response.url;
        }
        request.status = Some(response.status);
        request.status_text = Some(response.status_text);
        request.ok = Some(response.ok);
        request.response_body = response.body;
        Outbound::NetworkRequest { request }
    }

    /// Record for a rejected call: error details, no status.
    pub fn into_failure(self, error: FailureReport, finished_at: f64, timestamp: String) -> Outbound {
        let mut request = self.record(finished_at, timestamp);
        request.error = Some(error);
        Outbound::NetworkRequest { request }
    }
}
