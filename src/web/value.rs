//! [`Inspect`] for live JS values.

use super::{describe, js_display, string_prop};
use crate::config::SerializerConfig;
use crate::serializer::{Inspect, Inspected, ObjectShape, Visited};
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::{JsCast, JsValue};

/// Visited set keyed by object identity.
pub struct JsSeen(js_sys::Map);

impl Default for JsSeen {
    fn default() -> Self {
        JsSeen(js_sys::Map::new())
    }
}

impl Visited<JsValue> for JsSeen {
    fn path_of(&self, value: &JsValue) -> Option<String> {
        self.0.get(value).as_string()
    }

    fn record(&mut self, value: &JsValue, path: &str) {
        self.0.set(value, &JsValue::from_str(path));
    }
}

impl Inspect for JsValue {
    type Visited = JsSeen;

    fn inspect(&self, config: &SerializerConfig) -> Inspected<JsValue> {
        if self.is_undefined() {
            return Inspected::Undefined;
        }
        if self.is_null() {
            return Inspected::Null;
        }
        if let Some(b) = self.as_bool() {
            return Inspected::Bool(b);
        }
        if let Some(n) = self.as_f64() {
            return Inspected::Number(n);
        }
        if let Some(s) = self.as_string() {
            return Inspected::String(s);
        }
        if self.is_bigint() {
            return Inspected::BigInt(js_display(self));
        }
        if self.is_symbol() {
            return Inspected::Symbol(js_display(self));
        }
        if let Some(f) = self.dyn_ref::<js_sys::Function>() {
            return Inspected::Function {
                name: String::from(f.name()),
                source: String::from(f.to_string()),
            };
        }
        Inspected::Object(shape(self, config))
    }
}

fn shape(value: &JsValue, config: &SerializerConfig) -> ObjectShape<JsValue> {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return ObjectShape::Error {
            name: String::from(error.name()),
            message: String::from(error.message()),
            stack: string_prop(value, "stack"),
            extra: own_members(value, false)
                .into_iter()
                .filter(|(key, _)| !matches!(key.as_str(), "name" | "message" | "stack"))
                .collect(),
        };
    }
    if let Some(date) = value.dyn_ref::<js_sys::Date>() {
        let time = date.get_time();
        return ObjectShape::Date {
            iso: (!time.is_nan()).then(|| String::from(date.to_iso_string())),
            value: time,
            local: String::from(date.to_string()),
        };
    }
    if let Some(regexp) = value.dyn_ref::<js_sys::RegExp>() {
        return ObjectShape::RegExp {
            source: String::from(regexp.source()),
            flags: String::from(regexp.flags()),
        };
    }
    if value.is_instance_of::<js_sys::Promise>() {
        return ObjectShape::Promise;
    }
    if value.is_instance_of::<js_sys::WeakMap>() || value.is_instance_of::<js_sys::WeakSet>() {
        return ObjectShape::Weak {
            constructor: constructor_name(value),
        };
    }
    if let Some(set) = value.dyn_ref::<js_sys::Set>() {
        let mut values = Vec::new();
        set.for_each(&mut |item, _, _| {
            if values.len() < config.max_array_length {
                values.push(item);
            }
        });
        return ObjectShape::Set {
            size: set.size() as usize,
            values,
        };
    }
    if let Some(map) = value.dyn_ref::<js_sys::Map>() {
        let mut entries = Vec::new();
        map.for_each(&mut |item, key| {
            if entries.len() < config.max_object_keys {
                entries.push((key, item));
            }
        });
        return ObjectShape::Map {
            size: map.size() as usize,
            entries,
        };
    }
    if js_sys::ArrayBuffer::is_view(value) && !value.is_instance_of::<js_sys::DataView>() {
        let length = number_prop(value, "length");
        let sample = (0..length.min(config.max_array_length) as u32)
            .map(|i| Reflect::get_u32(value, i).ok().and_then(|v| v.as_f64()).unwrap_or_default())
            .collect();
        return ObjectShape::TypedArray {
            constructor: constructor_name(value),
            length,
            byte_length: number_prop(value, "byteLength"),
            sample,
        };
    }
    if let Some(array) = value.dyn_ref::<Array>() {
        let length = array.length();
        return ObjectShape::Array {
            length: length as usize,
            items: (0..length.min(config.max_array_length as u32))
                .map(|i| array.get(i))
                .collect(),
        };
    }

    let members = own_members(value, config.include_symbols);
    ObjectShape::Plain {
        key_count: members.len(),
        members: members.into_iter().take(config.max_object_keys).collect(),
    }
}

/// Own property names, then own symbols when asked. Getters that throw
/// yield `Err` with the thrown message.
fn own_members(value: &JsValue, include_symbols: bool) -> Vec<(String, Result<JsValue, String>)> {
    let Some(object) = value.dyn_ref::<Object>() else {
        return Vec::new();
    };
    let mut keys: Vec<JsValue> = Object::get_own_property_names(object).iter().collect();
    if include_symbols {
        keys.extend(Object::get_own_property_symbols(object).iter());
    }
    keys.into_iter()
        .map(|key| {
            let name = key.as_string().unwrap_or_else(|| js_display(&key));
            let member = Reflect::get(value, &key).map_err(|e| describe(&e));
            (name, member)
        })
        .collect()
}

fn constructor_name(value: &JsValue) -> String {
    Reflect::get(value, &JsValue::from_str("constructor"))
        .ok()
        .and_then(|ctor| ctor.dyn_into::<js_sys::Function>().ok())
        .map(|ctor| String::from(ctor.name()))
        .unwrap_or_else(|| "Object".to_string())
}

fn number_prop(value: &JsValue, key: &str) -> usize {
    Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or_default() as usize
}
