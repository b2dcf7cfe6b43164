//! Wire protocol between the bridge and the embedding editor.
//!
//! Every type that crosses the frame boundary lives here.
//!
//! ## Rules
//!
//! 1. Messages are tagged enums on `type`: `#[serde(tag = "type")]`
//! 2. Tags are the fixed `SCREAMING_SNAKE_CASE` strings the editor expects
//! 3. Field names keep the editor's spelling (`filePath`, `isMultiSelect`,
//!    `logged_at`), so renames are explicit

use crate::serializer::SerializedValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// SOURCE LOCATION
// ============================================================================

/// Source origin of a rendered element. Many nodes may share one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default)]
    pub col: u32,
}

impl SourceLocation {
    pub fn new(file_path: impl Into<String>, line_number: u32, col: u32) -> Self {
        Self {
            file_path: file_path.into(),
            line_number,
            col,
        }
    }

    /// Parse a `filePath:lineNumber:col` key. Missing or non-numeric parts
    /// read as 0; colons inside the path are kept when both trailing parts
    /// are numeric.
    pub fn parse(key: &str) -> Self {
        if key.is_empty() {
            return Self::default();
        }
        let mut tail = key.rsplitn(3, ':');
        if let (Some(col), Some(line), Some(path)) = (tail.next(), tail.next(), tail.next()) {
            if let (Ok(line), Ok(col)) = (line.parse::<u32>(), col.parse::<u32>()) {
                return Self::new(path, line, col);
            }
        }
        let mut parts = key.split(':');
        let path = parts.next().unwrap_or_default();
        let line = parts.next().map(parse_int_prefix).unwrap_or(0);
        let col = parts.next().map(parse_int_prefix).unwrap_or(0);
        Self::new(path, line, col)
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or_default()
    }

    /// A location names something only with a path and a non-zero line.
    pub fn is_complete(&self) -> bool {
        !self.file_path.is_empty() && self.line_number != 0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_path, self.line_number, self.col)
    }
}

/// `parseInt(s, 10) || 0` for non-negative values: leading whitespace, then
/// the longest digit prefix.
pub fn parse_int_prefix(s: &str) -> u32 {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

// ============================================================================
// ELEMENT SUMMARIES
// ============================================================================

/// Editor-facing description of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementData {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub line_number: u32,
    pub col: u32,
    pub element_type: String,
    pub content: String,
    pub children: Vec<ElementData>,
    pub class_name: String,
    pub text_content: String,
    pub attrs: BTreeMap<String, String>,
}

impl ElementData {
    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file_path.clone(), self.line_number, self.col)
    }
}

/// Component tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DomNode {
    Node {
        #[serde(rename = "tagName")]
        tag_name: String,
        attrs: BTreeMap<String, String>,
        data: ElementData,
        children: Vec<DomNode>,
    },
    Text {
        #[serde(rename = "textContent")]
        text_content: String,
    },
}

// ============================================================================
// TELEMETRY PAYLOADS
// ============================================================================

/// Normalized console level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Info,
    Warning,
    Error,
}

/// One observed fetch call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequestRecord {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    pub timestamp: String,
    pub duration: f64,
    pub origin: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
}

/// Message and stack of a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Uncaught error as reported by the window `error` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeErrorReport {
    pub message: String,
    pub lineno: u32,
    pub colno: u32,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Keyboard chord forwarded to the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeybindPayload {
    pub composite_key: String,
    pub raw_event: RawKeyEvent,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKeyEvent {
    pub key: String,
    pub code: String,
    pub meta_key: bool,
    pub ctrl_key: bool,
    pub alt_key: bool,
    pub shift_key: bool,
}

// ============================================================================
// OUTBOUND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptLoaded {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorStatePayload {
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTreePayload {
    pub tree: DomNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUpdate {
    pub id: SourceLocation,
    pub content: String,
}

/// Messages the bridge sends to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outbound {
    NetworkRequest {
        request: NetworkRequestRecord,
    },
    RuntimeError {
        error: RuntimeErrorReport,
    },
    UnhandledPromiseRejection {
        error: FailureReport,
    },
    ConsoleOutput {
        level: ConsoleLevel,
        message: String,
        logged_at: String,
        raw: Vec<SerializedValue>,
    },
    SelectorScriptLoaded {
        payload: ScriptLoaded,
    },
    SelectorStateResponse {
        payload: SelectorStatePayload,
    },
    RequestPickerState,
    RequestSelectedElements,
    ComponentTree {
        payload: ComponentTreePayload,
    },
    ElementClicked {
        payload: ElementData,
        #[serde(rename = "isMultiSelect")]
        is_multi_select: bool,
    },
    ElementDoubleClicked {
        payload: ElementData,
    },
    ElementTextUpdated {
        payload: TextUpdate,
    },
    ParentElement {
        payload: Option<ElementData>,
    },
    UrlChanged {
        url: String,
    },
    Keybind {
        payload: KeybindPayload,
    },
}

// ============================================================================
// INBOUND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetPayload {
    pub id: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentPayload {
    pub id: SourceLocation,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttrsPayload {
    pub id: SourceLocation,
    pub attrs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StylesheetPayload {
    pub stylesheet: String,
}

/// Messages the editor sends to the bridge.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Inbound {
    /// Any payload; activation follows its truthiness.
    ToggleSelector {
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// Validated item by item when handled.
    UpdateSelectedElements {
        #[serde(default)]
        payload: serde_json::Value,
    },
    GetSelectorState,
    SetElementContent {
        payload: ContentPayload,
    },
    SetElementAttrs {
        payload: AttrsPayload,
    },
    DuplicateElementRequested {
        payload: TargetPayload,
    },
    SetStylesheet {
        payload: StylesheetPayload,
    },
    EditTextRequested {
        payload: TargetPayload,
    },
    HoverElementRequested {
        payload: TargetPayload,
    },
    UnhoverElementRequested {
        payload: TargetPayload,
    },
    GetParentElement {
        payload: TargetPayload,
    },
    RequestComponentTree,
    ReloadPage,
    /// Our own console capture echoed back by the editor.
    ConsoleOutput,
    #[serde(other)]
    Unknown,
}

impl Inbound {
    /// Decode raw message data.
    ///
    /// `Ok(None)` means the data carries no usable `type` and is dropped
    /// without comment; a known type with a bad payload is an error.
    pub fn decode(data: serde_json::Value) -> Result<Option<(String, Inbound)>, crate::BridgeError> {
        let kind = match data.get("type").and_then(|t| t.as_str()) {
            Some(kind) if !kind.is_empty() => kind.to_string(),
            _ => return Ok(None),
        };
        let message = serde_json::from_value::<Inbound>(data)
            .map_err(|e| crate::BridgeError::malformed(kind.clone(), e))?;
        Ok(Some((kind, message)))
    }
}

/// JS truthiness of a decoded JSON value.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn location_parses_plain_keys() {
        assert_eq!(
            SourceLocation::parse("src/App.tsx:12:3"),
            SourceLocation::new("src/App.tsx", 12, 3)
        );
        assert_eq!(SourceLocation::parse(""), SourceLocation::default());
    }

    #[test]
    fn location_keeps_colons_in_path() {
        assert_eq!(
            SourceLocation::parse("C:/work/App.tsx:4:1"),
            SourceLocation::new("C:/work/App.tsx", 4, 1)
        );
    }

    #[test]
    fn location_tolerates_missing_parts() {
        assert_eq!(SourceLocation::parse("App.tsx:7"), SourceLocation::new("App.tsx", 7, 0));
        assert_eq!(SourceLocation::parse("App.tsx"), SourceLocation::new("App.tsx", 0, 0));
        assert_eq!(SourceLocation::parse("App.tsx:9px:x"), SourceLocation::new("App.tsx", 9, 0));
    }

    #[test]
    fn location_display_is_the_key() {
        let loc = SourceLocation::new("src/pages/Home.tsx", 40, 8);
        assert_eq!(loc.to_string(), "src/pages/Home.tsx:40:8");
        assert_eq!(loc.file_name(), "Home.tsx");
    }

    #[test]
    fn outbound_uses_editor_tags_and_field_names() {
        let msg = Outbound::ElementClicked {
            payload: ElementData::default(),
            is_multi_select: true,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "ELEMENT_CLICKED");
        assert_eq!(value["isMultiSelect"], true);
        assert_eq!(value["payload"]["filePath"], "");

        let value = serde_json::to_value(Outbound::RequestPickerState).unwrap();
        assert_eq!(value, json!({"type": "REQUEST_PICKER_STATE"}));

        let value = serde_json::to_value(Outbound::ParentElement { payload: None }).unwrap();
        assert_eq!(value, json!({"type": "PARENT_ELEMENT", "payload": null}));
    }

    #[test]
    fn console_output_keeps_snake_case_timestamp() {
        let msg = Outbound::ConsoleOutput {
            level: ConsoleLevel::Warning,
            message: "careful".into(),
            logged_at: "2024-01-01T00:00:00.000Z".into(),
            raw: vec![SerializedValue::from("careful")],
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "type": "CONSOLE_OUTPUT",
                "level": "warning",
                "message": "careful",
                "logged_at": "2024-01-01T00:00:00.000Z",
                "raw": ["careful"]
            })
        );
    }

    #[test]
    fn failed_request_has_error_and_no_status() {
        let record = NetworkRequestRecord {
            url: "https://api.example/x".into(),
            method: "GET".into(),
            error: Some(FailureReport {
                message: "Failed to fetch".into(),
                stack: None,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("status").is_none());
        assert_eq!(value["error"]["message"], "Failed to fetch");
    }

    #[test]
    fn decode_known_messages() {
        let (kind, msg) = Inbound::decode(json!({"type": "TOGGLE_SELECTOR", "payload": true}))
            .unwrap()
            .unwrap();
        assert_eq!(kind, "TOGGLE_SELECTOR");
        assert_eq!(msg, Inbound::ToggleSelector { payload: json!(true) });

        let (_, msg) = Inbound::decode(json!({
            "type": "SET_ELEMENT_ATTRS",
            "payload": {"id": {"filePath": "A.tsx", "lineNumber": 5}, "attrs": {"alt": "logo"}}
        }))
        .unwrap()
        .unwrap();
        let Inbound::SetElementAttrs { payload } = msg else {
            panic!("wrong variant");
        };
        assert_eq!(payload.id, SourceLocation::new("A.tsx", 5, 0));
        assert_eq!(payload.attrs["alt"], "logo");
    }

    #[test]
    fn decode_unit_messages_ignore_extra_fields() {
        let (_, msg) = Inbound::decode(json!({"type": "GET_SELECTOR_STATE", "payload": 1}))
            .unwrap()
            .unwrap();
        assert_eq!(msg, Inbound::GetSelectorState);
    }

    #[test]
    fn decode_unknown_type_is_forward_compatible() {
        let (kind, msg) = Inbound::decode(json!({"type": "SOMETHING_NEW"})).unwrap().unwrap();
        assert_eq!(kind, "SOMETHING_NEW");
        assert_eq!(msg, Inbound::Unknown);
    }

    #[test]
    fn decode_without_type_is_dropped() {
        assert!(Inbound::decode(json!({"payload": true})).unwrap().is_none());
        assert!(Inbound::decode(json!({"type": ""})).unwrap().is_none());
        assert!(Inbound::decode(json!("TOGGLE_SELECTOR")).unwrap().is_none());
    }

    #[test]
    fn decode_bad_payload_is_malformed() {
        let err = Inbound::decode(json!({"type": "SET_STYLESHEET", "payload": {}})).unwrap_err();
        assert!(err.is_malformed());
        assert!(err.to_string().contains("SET_STYLESHEET"));
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }
}
