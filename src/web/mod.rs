//! Browser runtime
//!
//! `web_sys` implementations of the core seams plus everything that needs
//! the event loop: listeners, timers, readiness waits and the page patches.
//!
//! ```text
//! start() ──► boot() ──► document ready ──► Runtime::launch
//!                                              ├── intercept (console, fetch, errors)
//!                                              ├── permanent listeners (message, mousemove, keydown)
//!                                              ├── URL observer
//!                                              └── announce
//! ```

mod intercept;
mod page;
mod readiness;
mod runtime;
mod transport;
mod value;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[cfg(test)]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

/// Page global holding a partial [`BridgeConfig`].
const CONFIG_GLOBAL: &str = "__IMAGINE_BRIDGE_CONFIG__";
/// Page global holding the announced script version.
const VERSION_GLOBAL: &str = "IMAGINE_SELECTOR_SCRIPT_VERSION";

#[wasm_bindgen(inline_js = "
let reporting = false;
export function wrap_variadic(original, sink, withStack) {
    return function (...args) {
        const result = original.apply(this, args);
        if (reporting) {
            return result;
        }
        const stack = withStack ? new Error().stack : undefined;
        reporting = true;
        try {
            sink(args, stack);
        } finally {
            reporting = false;
        }
        return result;
    };
}
export function display(value) {
    return String(value);
}
")]
extern "C" {
    /// A function that calls `original` with its own `this` and arguments,
    /// then hands `sink` the arguments as one array plus, when `with_stack`,
    /// the stack of an `Error` created in the wrapper. Console calls made
    /// while `sink` runs only reach the original.
    fn wrap_variadic(original: &js_sys::Function, sink: &js_sys::Function, with_stack: bool) -> js_sys::Function;

    /// `String(value)`.
    #[wasm_bindgen(js_name = display)]
    fn js_display(value: &JsValue) -> String;
}

/// Load config, install logging and start the runtime once the document is
/// ready.
pub(crate) fn boot() {
    let (config, config_error) = load_config();
    init_logging(&config);
    if let Some(e) = config_error {
        tracing::warn!("{}; using defaults", e);
    }
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(e) = runtime::Runtime::launch(config).await {
            tracing::error!("Bridge failed to start: {}", e);
        }
    });
}

fn load_config() -> (BridgeConfig, Option<BridgeError>) {
    let Some(window) = web_sys::window() else {
        return (BridgeConfig::default(), Some(BridgeError::Unavailable("window")));
    };
    let raw = js_sys::Reflect::get(&window, &JsValue::from_str(CONFIG_GLOBAL)).unwrap_or(JsValue::UNDEFINED);
    let (mut config, error) = if raw.is_undefined() || raw.is_null() {
        (BridgeConfig::default(), None)
    } else {
        match serde_wasm_bindgen::from_value::<BridgeConfig>(raw) {
            Ok(config) => (config, None),
            Err(e) => (BridgeConfig::default(), Some(BridgeError::Config(e.to_string()))),
        }
    };
    if config.script_version.is_none() {
        config.script_version = js_sys::Reflect::get(&window, &JsValue::from_str(VERSION_GLOBAL))
            .ok()
            .and_then(|v| v.as_string());
    }
    (config, error)
}

fn init_logging(config: &BridgeConfig) {
    let level = config.log_level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    let layer = tracing_wasm::WASMLayerConfigBuilder::new()
        .set_max_level(level)
        .set_report_logs_in_timings(false)
        .set_console_config(tracing_wasm::ConsoleConfig::ReportWithoutConsoleColor)
        .build();
    tracing_wasm::set_as_global_default_with_config(layer);
}

/// Readable text for a thrown JS value.
pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| js_display(value))
}

/// Map a rejected DOM call into [`BridgeError::Dom`].
pub(crate) fn dom_error(operation: &'static str) -> impl Fn(JsValue) -> BridgeError {
    move |e| BridgeError::dom(operation, describe(&e))
}

/// String property of an object, if present.
pub(crate) fn string_prop(target: &JsValue, key: &str) -> Option<String> {
    if !target.is_object() {
        return None;
    }
    js_sys::Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}
