//! Page patches: console methods and `fetch`.
//!
//! Each wrapper forwards to the original first and reports afterwards; the
//! page always sees the original result or rejection. Patches take the
//! object they replace a method on, so they run against any global.

use super::{describe, dom_error, js_display, string_prop, wrap_variadic};
use crate::error::BridgeError;
use crate::protocol::{FailureReport, Outbound};
use crate::telemetry::console::ConsoleMethod;
use crate::telemetry::iso_at;
use crate::telemetry::network::{PendingRequest, RequestBody, ResponseSummary};
use js_sys::{Array, Date, Function, Promise, Reflect};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};
use web_sys::{FormData, Headers, Request, Response, UrlSearchParams};

/// Receives each console call after the original method ran: method,
/// arguments and, for `warn`/`error`, the wrapper's stack.
pub(crate) type ConsoleSink = Rc<dyn Fn(ConsoleMethod, &[JsValue], Option<&str>)>;

/// Receives each finished `NETWORK_REQUEST`.
pub(crate) type NetworkSink = Rc<dyn Fn(&Outbound)>;

fn method_of(host: &JsValue, name: &'static str) -> Result<Function, BridgeError> {
    Reflect::get(host, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into().ok())
        .ok_or(BridgeError::Unavailable(name))
}

// =============================================================================
// CONSOLE
// =============================================================================

pub(crate) fn patch_console(console: &JsValue, sink: ConsoleSink) -> Result<(), BridgeError> {
    for method in ConsoleMethod::ALL {
        let original = method_of(console, method.name())?;
        let sink = sink.clone();
        let forward = Closure::<dyn Fn(Array, JsValue)>::new(move |args: Array, stack: JsValue| {
            sink(method, &args.to_vec(), stack.as_string().as_deref());
        });
        let wrapped = wrap_variadic(&original, forward.as_ref().unchecked_ref(), method.captures_stack());
        forward.forget();
        Reflect::set(console, &JsValue::from_str(method.name()), &wrapped).map_err(dom_error("console patch"))?;
    }
    Ok(())
}

// =============================================================================
// FETCH
// =============================================================================

/// Replace `host.fetch`. `origin` is the page origin recorded on every
/// request.
pub(crate) fn patch_fetch(host: &JsValue, origin: String, sink: NetworkSink) -> Result<(), BridgeError> {
    let original = method_of(host, "fetch")?;
    let this = host.clone();
    let wrapper = Closure::<dyn Fn(JsValue, JsValue) -> Promise>::new(move |input: JsValue, init: JsValue| {
        let pending = describe_request(&input, &init, &origin);
        let forwarded = match original.call2(&this, &input, &init) {
            Ok(promise) => promise.unchecked_into::<Promise>(),
            Err(error) => {
                sink(&failed(pending, &error));
                return Promise::reject(&error);
            }
        };
        let sink = sink.clone();
        future_to_promise(async move {
            match JsFuture::from(forwarded).await {
                Ok(response) => {
                    if let Some(resp) = response.dyn_ref::<Response>() {
                        let summary = summarize(resp).await;
                        let now = Date::now();
                        sink(&pending.into_success(summary, now, iso_at(now)));
                    }
                    Ok(response)
                }
                Err(error) => {
                    sink(&failed(pending, &error));
                    Err(error)
                }
            }
        })
    });
    Reflect::set(host, &JsValue::from_str("fetch"), wrapper.as_ref()).map_err(dom_error("fetch patch"))?;
    wrapper.forget();
    Ok(())
}

fn failed(pending: PendingRequest, error: &JsValue) -> Outbound {
    let now = Date::now();
    pending.into_failure(failure_report(error), now, iso_at(now))
}

fn describe_request(input: &JsValue, init: &JsValue, origin: &str) -> PendingRequest {
    let request = input.dyn_ref::<Request>();
    let url = match (input.as_string(), request) {
        (Some(url), _) => url,
        (None, Some(request)) => request.url(),
        (None, None) => js_display(input),
    };
    let method = string_prop(init, "method").or_else(|| request.map(Request::method));
    let mut pending = PendingRequest::new(url, method, origin, Date::now());

    let headers = if init.is_object() {
        Reflect::get(init, &JsValue::from_str("headers"))
            .ok()
            .filter(|h| !h.is_undefined() && !h.is_null())
            .and_then(|h| Headers::new_with_str_sequence_sequence(&h).ok())
    } else {
        None
    };
    if let Some(headers) = headers.or_else(|| request.map(Request::headers)) {
        pending.headers = header_entries(&headers);
    }

    pending.body = if init.is_object() {
        Reflect::get(init, &JsValue::from_str("body"))
            .ok()
            .filter(|b| !b.is_undefined() && !b.is_null())
            .map(|body| describe_body(&body))
    } else {
        None
    };
    pending
}

fn header_entries(headers: &Headers) -> std::collections::BTreeMap<String, String> {
    pairs(headers.as_ref()).into_iter().collect()
}

/// `[key, value]` entries of an iterable such as `Headers` or `FormData`.
fn pairs(iterable: &JsValue) -> Vec<(String, String)> {
    let Ok(Some(iter)) = js_sys::try_iter(iterable) else {
        return Vec::new();
    };
    iter.filter_map(Result::ok)
        .map(|entry| {
            let entry = Array::from(&entry);
            (js_display(&entry.get(0)), js_display(&entry.get(1)))
        })
        .collect()
}

fn describe_body(body: &JsValue) -> RequestBody {
    if let Some(text) = body.as_string() {
        return RequestBody::Text(text);
    }
    if body.is_instance_of::<FormData>() {
        return RequestBody::Form(pairs(body));
    }
    if let Some(params) = body.dyn_ref::<UrlSearchParams>() {
        return RequestBody::Search(String::from(params.to_string()));
    }
    RequestBody::Json(
        js_sys::JSON::stringify(body)
            .ok()
            .and_then(|json| json.as_string()),
    )
}

async fn summarize(response: &Response) -> ResponseSummary {
    let body = match response.clone().and_then(|copy| copy.text()) {
        Ok(text) => JsFuture::from(text).await.ok().and_then(|t| t.as_string()),
        Err(e) => {
            tracing::debug!("Response body unavailable: {}", describe(&e));
            None
        }
    };
    ResponseSummary {
        url: response.url(),
        status: response.status(),
        status_text: response.status_text(),
        ok: response.ok(),
        body,
    }
}

fn failure_report(error: &JsValue) -> FailureReport {
    FailureReport {
        message: describe(error),
        stack: string_prop(error, "stack"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use js_sys::Object;
    use std::cell::RefCell;
    use wasm_bindgen_test::wasm_bindgen_test;

    type Calls = Rc<RefCell<Vec<(ConsoleMethod, Vec<JsValue>, Option<String>)>>>;

    /// A console whose methods record `[method, ...args]` into `calls`.
    fn fake_console() -> JsValue {
        Function::new_no_args(
            "const calls = [];
             const record = (name) => (...args) => calls.push([name, ...args]);
             return { calls, log: record('log'), warn: record('warn'), error: record('error') };",
        )
        .call0(&JsValue::NULL)
        .unwrap()
    }

    fn original_calls(console: &JsValue) -> Array {
        Reflect::get(console, &"calls".into()).unwrap().unchecked_into()
    }

    fn call(host: &JsValue, name: &str, args: &[JsValue]) -> JsValue {
        let f: Function = Reflect::get(host, &name.into()).unwrap().unchecked_into();
        f.apply(host, &args.iter().collect::<Array>()).unwrap()
    }

    fn recording_sink() -> (ConsoleSink, Calls) {
        let calls: Calls = Rc::default();
        let seen = calls.clone();
        let sink: ConsoleSink = Rc::new(move |method: ConsoleMethod, args: &[JsValue], stack: Option<&str>| {
            seen.borrow_mut().push((method, args.to_vec(), stack.map(str::to_string)));
        });
        (sink, calls)
    }

    #[wasm_bindgen_test]
    fn console_calls_reach_original_then_sink() {
        let console = fake_console();
        let (sink, calls) = recording_sink();
        patch_console(&console, sink).unwrap();

        call(&console, "log", &[JsValue::from("user"), JsValue::from(7)]);
        call(&console, "warn", &[JsValue::from("slow")]);

        assert_eq!(original_calls(&console).length(), 2);
        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, ConsoleMethod::Log);
        assert_eq!(calls[0].1, vec![JsValue::from("user"), JsValue::from(7)]);
        assert_eq!(calls[0].2, None);
        assert_eq!(calls[1].0, ConsoleMethod::Warn);
        assert!(calls[1].2.as_deref().is_some_and(|stack| !stack.is_empty()));
    }

    #[wasm_bindgen_test]
    fn console_calls_made_while_reporting_only_reach_original() {
        let console = fake_console();
        let reentered = console.clone();
        let reports = Rc::new(RefCell::new(0));
        let counted = reports.clone();
        let sink: ConsoleSink = Rc::new(move |_: ConsoleMethod, _: &[JsValue], _: Option<&str>| {
            *counted.borrow_mut() += 1;
            call(&reentered, "warn", &[JsValue::from("delivery failed")]);
        });
        patch_console(&console, sink).unwrap();

        call(&console, "error", &[JsValue::from("boom")]);
        assert_eq!(*reports.borrow(), 1);
        assert_eq!(original_calls(&console).length(), 2);
    }

    fn fake_fetch(body: &str) -> JsValue {
        let host = Object::new();
        let failure = js_sys::Error::new("offline");
        Reflect::set(&host, &"failure".into(), &failure).unwrap();
        let fetch = Function::new_with_args("input, init", body);
        Reflect::set(&host, &"fetch".into(), &fetch).unwrap();
        host.into()
    }

    fn recording_network() -> (NetworkSink, Rc<RefCell<Vec<serde_json::Value>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let seen = sent.clone();
        let sink: NetworkSink = Rc::new(move |message: &Outbound| {
            seen.borrow_mut().push(serde_json::to_value(message).unwrap());
        });
        (sink, sent)
    }

    #[wasm_bindgen_test]
    async fn rejected_fetch_rethrows_original_error_and_reports_once() {
        let host = fake_fetch("return Promise.reject(this.failure);");
        let failure = Reflect::get(&host, &"failure".into()).unwrap();
        let (sink, sent) = recording_network();
        patch_fetch(&host, "https://app.example".into(), sink).unwrap();

        let promise: Promise = call(&host, "fetch", &[JsValue::from("/api/items")]).unchecked_into();
        let error = JsFuture::from(promise).await.unwrap_err();
        assert!(Object::is(&error, &failure));

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        let request = &sent[0]["request"];
        assert_eq!(sent[0]["type"], "NETWORK_REQUEST");
        assert_eq!(request["url"], "/api/items");
        assert_eq!(request["method"], "GET");
        assert_eq!(request["error"]["message"], "offline");
        assert!(request.get("status").is_none());
    }

    #[wasm_bindgen_test]
    async fn throwing_fetch_still_rejects_with_the_thrown_value() {
        let host = fake_fetch("throw this.failure;");
        let failure = Reflect::get(&host, &"failure".into()).unwrap();
        let (sink, sent) = recording_network();
        patch_fetch(&host, "https://app.example".into(), sink).unwrap();

        let promise: Promise = call(&host, "fetch", &[JsValue::from("/api/items")]).unchecked_into();
        let error = JsFuture::from(promise).await.unwrap_err();
        assert!(Object::is(&error, &failure));
        assert_eq!(sent.borrow().len(), 1);
    }

    #[wasm_bindgen_test]
    async fn successful_fetch_reports_status_and_body() {
        let host = fake_fetch("return Promise.resolve(new Response('created', { status: 201 }));");
        let (sink, sent) = recording_network();
        patch_fetch(&host, "https://app.example".into(), sink).unwrap();

        let init = Object::new();
        Reflect::set(&init, &"method".into(), &"POST".into()).unwrap();
        Reflect::set(&init, &"body".into(), &"{\"name\":\"a\"}".into()).unwrap();
        let promise: Promise = call(&host, "fetch", &[JsValue::from("/api/items"), init.into()]).unchecked_into();
        let response = JsFuture::from(promise).await.unwrap();
        assert!(response.is_instance_of::<Response>());

        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);
        let request = &sent[0]["request"];
        assert_eq!(request["method"], "POST");
        assert_eq!(request["status"], 201);
        assert_eq!(request["ok"], true);
        assert_eq!(request["responseBody"], "created");
        assert_eq!(request["requestBody"], "{\"name\":\"a\"}");
        assert_eq!(request["origin"], "https://app.example");
        assert!(request.get("error").is_none());
    }
}
