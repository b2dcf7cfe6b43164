//! Value serializer
//!
//! Converts arbitrary runtime values into bounded, circular-safe, type-tagged
//! plain data that survives structured cloning and JSON encoding.
//!
//! The serializer never sees JS directly. Values are described through the
//! [`Inspect`] trait, implemented for `JsValue` by the web runtime and for
//! in-memory models by the tests:
//!
//! ```text
//! JsValue ──Inspect──► Inspected<V> ──serialize_at──► SerializedValue ──serde──► wire
//!                          │
//!                          └── Visited (identity → first path), one per call
//! ```

use crate::config::SerializerConfig;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Path of the top-level value.
pub const ROOT_PATH: &str = "root";

/// `Number.MAX_SAFE_INTEGER`; integral numbers up to here are written as
/// JSON integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

// =============================================================================
// OUTPUT
// =============================================================================

/// Serializer output.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<SerializedValue>),
    /// Plain object, members kept in enumeration order.
    Object(Vec<(String, SerializedValue)>),
    /// Wrapper for values plain data cannot represent.
    Typed {
        kind: String,
        data: Box<SerializedValue>,
    },
}

impl SerializedValue {
    pub fn typed(kind: impl Into<String>, data: impl Into<SerializedValue>) -> Self {
        SerializedValue::Typed {
            kind: kind.into(),
            data: Box::new(data.into()),
        }
    }

    pub fn object<K: Into<String>>(members: impl IntoIterator<Item = (K, SerializedValue)>) -> Self {
        SerializedValue::Object(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `kind` of a typed wrapper.
    pub fn kind(&self) -> Option<&str> {
        match self {
            SerializedValue::Typed { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// Data of a typed wrapper.
    pub fn data(&self) -> Option<&SerializedValue> {
        match self {
            SerializedValue::Typed { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SerializedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Member lookup on plain objects.
    pub fn get(&self, key: &str) -> Option<&SerializedValue> {
        match self {
            SerializedValue::Object(members) => {
                members.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Human-readable form used when joining console arguments: strings
    /// verbatim, everything else as JSON indented by `indent` spaces.
    pub fn to_display(&self, indent: usize) -> String {
        if let SerializedValue::String(s) = self {
            return s.clone();
        }
        let spaces = " ".repeat(indent);
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(spaces.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        match self.serialize(&mut serializer) {
            Ok(()) => String::from_utf8(out).unwrap_or_default(),
            Err(_) => String::new(),
        }
    }
}

impl From<&str> for SerializedValue {
    fn from(value: &str) -> Self {
        SerializedValue::String(value.to_string())
    }
}

impl From<String> for SerializedValue {
    fn from(value: String) -> Self {
        SerializedValue::String(value)
    }
}

impl From<f64> for SerializedValue {
    fn from(value: f64) -> Self {
        SerializedValue::Number(value)
    }
}

impl From<bool> for SerializedValue {
    fn from(value: bool) -> Self {
        SerializedValue::Bool(value)
    }
}

impl Serialize for SerializedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SerializedValue::Null => serializer.serialize_unit(),
            SerializedValue::Bool(b) => serializer.serialize_bool(*b),
            SerializedValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            SerializedValue::String(s) => serializer.serialize_str(s),
            SerializedValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            SerializedValue::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (key, value) in members {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            SerializedValue::Typed { kind, data } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("_type", kind)?;
                map.serialize_entry("value", data)?;
                map.end()
            }
        }
    }
}

// =============================================================================
// INPUT
// =============================================================================

/// Identity-keyed record of objects already entered during one call.
pub trait Visited<V>: Default {
    /// Path under which `value` was first seen, if it was.
    fn path_of(&self, value: &V) -> Option<String>;
    /// Remember `value` under `path`.
    fn record(&mut self, value: &V, path: &str);
}

/// A runtime value the serializer can look into.
///
/// Implementations must cap collections themselves: at most
/// `max_array_length` array/set items and at most `max_object_keys` map
/// entries or object members, while reporting the full size alongside.
pub trait Inspect: Sized {
    type Visited: Visited<Self>;

    fn inspect(&self, config: &SerializerConfig) -> Inspected<Self>;
}

/// One level of a runtime value.
#[derive(Debug, Clone)]
pub enum Inspected<V> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(String),
    Symbol(String),
    Function { name: String, source: String },
    Object(ObjectShape<V>),
}

/// Shape of an object-typed value.
#[derive(Debug, Clone)]
pub enum ObjectShape<V> {
    Error {
        name: String,
        message: String,
        stack: Option<String>,
        /// Own properties other than name/message/stack; `Err` carries the
        /// message of a failed read.
        extra: Vec<(String, Result<V, String>)>,
    },
    Date {
        /// `None` for invalid dates.
        iso: Option<String>,
        value: f64,
        local: String,
    },
    RegExp {
        source: String,
        flags: String,
    },
    Promise,
    /// WeakMap / WeakSet, which cannot be enumerated.
    Weak {
        constructor: String,
    },
    Set {
        size: usize,
        values: Vec<V>,
    },
    Map {
        size: usize,
        entries: Vec<(V, V)>,
    },
    TypedArray {
        constructor: String,
        length: usize,
        byte_length: usize,
        sample: Vec<f64>,
    },
    Array {
        length: usize,
        items: Vec<V>,
    },
    Plain {
        /// Total own keys, symbols included when enabled.
        key_count: usize,
        /// Members in order; `Err` carries the message of a failed read.
        members: Vec<(String, Result<V, String>)>,
    },
}

// =============================================================================
// SERIALIZE
// =============================================================================

/// Serialize `value` with a fresh visited set.
pub fn serialize<V: Inspect>(value: &V, config: &SerializerConfig) -> SerializedValue {
    let mut visited = V::Visited::default();
    serialize_at(value, config, &mut visited, ROOT_PATH)
}

/// Serialize `value` found at `path`, sharing `visited` with the enclosing
/// call.
pub fn serialize_at<V: Inspect>(
    value: &V,
    config: &SerializerConfig,
    visited: &mut V::Visited,
    path: &str,
) -> SerializedValue {
    if path.split('.').count() > config.max_depth {
        return marker(
            config,
            "MaxDepthReached",
            format!("[Max depth of {} reached]", config.max_depth),
        );
    }

    match value.inspect(config) {
        Inspected::Undefined => marker(config, "undefined", "undefined"),
        Inspected::Null => SerializedValue::Null,
        Inspected::Bool(b) => SerializedValue::Bool(b),
        Inspected::Number(n) => number(config, n),
        Inspected::String(s) => string(config, s),
        Inspected::BigInt(s) => marker(config, "BigInt", s),
        Inspected::Symbol(s) => marker(config, "Symbol", s),
        Inspected::Function { name, source } => {
            let name = if name.is_empty() {
                "anonymous".to_string()
            } else {
                name
            };
            let source = utf16_prefix(&source, config.max_string_length).to_string();
            marker(
                config,
                "Function",
                SerializedValue::object([
                    ("name", SerializedValue::String(name)),
                    ("stringValue", SerializedValue::String(source)),
                ]),
            )
        }
        Inspected::Object(shape) => {
            if let Some(first) = visited.path_of(value) {
                return marker(
                    config,
                    "CircularReference",
                    format!("[Circular Reference to {}]", first),
                );
            }
            visited.record(value, path);
            object(shape, config, visited, path)
        }
    }
}

/// Typed wrapper, or its bare data when types are not preserved.
fn marker(
    config: &SerializerConfig,
    kind: &str,
    data: impl Into<SerializedValue>,
) -> SerializedValue {
    if config.preserve_types {
        SerializedValue::typed(kind, data)
    } else {
        data.into()
    }
}

fn number(config: &SerializerConfig, n: f64) -> SerializedValue {
    if n.is_nan() {
        marker(config, "Number", "NaN")
    } else if n.is_infinite() {
        marker(config, "Number", if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        SerializedValue::Number(n)
    }
}

/// Longest prefix of `s` spanning at most `units` UTF-16 code units, the
/// unit JS string lengths count in. A surrogate pair is never split.
fn utf16_prefix(s: &str, units: usize) -> &str {
    let mut taken = 0;
    for (index, c) in s.char_indices() {
        taken += c.len_utf16();
        if taken > units {
            return &s[..index];
        }
    }
    s
}

fn string(config: &SerializerConfig, s: String) -> SerializedValue {
    let length = s.encode_utf16().count();
    if length <= config.max_string_length {
        return SerializedValue::String(s);
    }
    let head = utf16_prefix(&s, config.max_string_length);
    marker(
        config,
        "String",
        format!(
            "{}... [{} more characters]",
            head,
            length - config.max_string_length
        ),
    )
}

/// One named member of an error or plain object.
fn member<V: Inspect>(
    value: Result<V, String>,
    config: &SerializerConfig,
    visited: &mut V::Visited,
    path: &str,
    key: &str,
) -> SerializedValue {
    match value {
        Ok(value) => serialize_at(&value, config, visited, &format!("{}.{}", path, key)),
        Err(message) => marker(config, "Error", format!("[Unable to serialize: {}]", message)),
    }
}

fn object<V: Inspect>(
    shape: ObjectShape<V>,
    config: &SerializerConfig,
    visited: &mut V::Visited,
    path: &str,
) -> SerializedValue {
    match shape {
        ObjectShape::Error {
            name,
            message,
            stack,
            extra,
        } => {
            let mut members = vec![
                ("name".to_string(), SerializedValue::String(name)),
                ("message".to_string(), SerializedValue::String(message)),
            ];
            if let Some(stack) = stack {
                members.push(("stack".to_string(), SerializedValue::String(stack)));
            }
            for (prop, value) in extra {
                let serialized = member(value, config, visited, path, &prop);
                members.push((prop, serialized));
            }
            marker(config, "Error", SerializedValue::Object(members))
        }
        ObjectShape::Date { iso, value, local } => marker(
            config,
            "Date",
            SerializedValue::object([
                ("iso", iso.map(SerializedValue::String).unwrap_or(SerializedValue::Null)),
                ("value", number(config, value)),
                ("local", SerializedValue::String(local)),
            ]),
        ),
        ObjectShape::RegExp { source, flags } => {
            let string = format!("/{}/{}", source, flags);
            marker(
                config,
                "RegExp",
                SerializedValue::object([
                    ("source", SerializedValue::String(source)),
                    ("flags", SerializedValue::String(flags)),
                    ("string", SerializedValue::String(string)),
                ]),
            )
        }
        ObjectShape::Promise => marker(config, "Promise", "[Promise]"),
        ObjectShape::Weak { constructor } => {
            let text = format!("[{}]", constructor);
            marker(config, &constructor, text)
        }
        ObjectShape::Set { size, values } => {
            let values: Vec<SerializedValue> = values
                .iter()
                .take(config.max_array_length)
                .enumerate()
                .map(|(i, item)| serialize_at(item, config, visited, &format!("{}.Set[{}]", path, i)))
                .collect();
            let mut members = vec![("values".to_string(), SerializedValue::Array(values))];
            if size > config.max_array_length {
                members.push((
                    "truncated".to_string(),
                    SerializedValue::Number((size - config.max_array_length) as f64),
                ));
            }
            marker(config, "Set", SerializedValue::Object(members))
        }
        ObjectShape::Map { size, entries } => {
            let mut rendered = Vec::new();
            for (key, value) in entries.iter().take(config.max_object_keys) {
                let key = map_key(key, config, visited, path);
                let value = serialize_at(value, config, visited, &format!("{}.Map[{}]", path, key));
                rendered.push((key, value));
            }
            let mut members = vec![("entries".to_string(), SerializedValue::Object(rendered))];
            let truncated = size.saturating_sub(config.max_object_keys);
            if truncated > 0 {
                members.push(("truncated".to_string(), SerializedValue::Number(truncated as f64)));
            }
            marker(config, "Map", SerializedValue::Object(members))
        }
        ObjectShape::TypedArray {
            constructor,
            length,
            byte_length,
            sample,
        } => marker(
            config,
            &constructor,
            SerializedValue::object([
                ("length", SerializedValue::Number(length as f64)),
                ("byteLength", SerializedValue::Number(byte_length as f64)),
                (
                    "sample",
                    SerializedValue::Array(
                        sample.into_iter().take(10).map(SerializedValue::Number).collect(),
                    ),
                ),
            ]),
        ),
        ObjectShape::Array { length, items } => {
            let mut out: Vec<SerializedValue> = items
                .iter()
                .take(config.max_array_length)
                .enumerate()
                .map(|(i, item)| serialize_at(item, config, visited, &format!("{}[{}]", path, i)))
                .collect();
            if length > config.max_array_length {
                out.push(SerializedValue::String(format!(
                    "... {} more items",
                    length - config.max_array_length
                )));
            }
            SerializedValue::Array(out)
        }
        ObjectShape::Plain { key_count, members } => {
            let mut out = Vec::new();
            for (key, value) in members.into_iter().take(config.max_object_keys) {
                let serialized = member(value, config, visited, path, &key);
                out.push((key, serialized));
            }
            if key_count > config.max_object_keys {
                out.push((
                    "...".to_string(),
                    SerializedValue::String(format!(
                        "{} more properties",
                        key_count - config.max_object_keys
                    )),
                ));
            }
            SerializedValue::Object(out)
        }
    }
}

/// Map keys become object member names: objects by the JSON of their
/// serialization, primitives the way `String()` renders them.
fn map_key<V: Inspect>(
    key: &V,
    config: &SerializerConfig,
    visited: &mut V::Visited,
    path: &str,
) -> String {
    match key.inspect(config) {
        Inspected::Object(_) => {
            let serialized = serialize_at(key, config, visited, &format!("{}.MapKey", path));
            serde_json::to_string(&serialized).unwrap_or_else(|_| "[unserializable key]".to_string())
        }
        Inspected::Undefined => "undefined".to_string(),
        Inspected::Null => "null".to_string(),
        Inspected::Bool(b) => b.to_string(),
        Inspected::Number(n) => js_number_string(n),
        Inspected::String(s) | Inspected::BigInt(s) | Inspected::Symbol(s) => s,
        Inspected::Function { source, .. } => source,
    }
}

/// Number formatting matching `String(n)` for the common cases.
pub fn js_number_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
