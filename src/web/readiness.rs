//! Readiness gate: futures for the points the bridge waits on.

use crate::config::BridgeConfig;
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, Document, MutationObserver, MutationObserverInit, Window};

/// Resolves once the document has left the `loading` state.
pub(crate) async fn document_ready(document: &Document) {
    if document.ready_state() != "loading" {
        return;
    }
    let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        if let Err(e) = document.add_event_listener_with_callback_and_add_event_listener_options(
            "DOMContentLoaded",
            &resolve,
            &options,
        ) {
            tracing::warn!("Could not wait for DOMContentLoaded: {:?}", e);
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

pub(crate) async fn sleep(window: &Window, ms: u32) {
    let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
        if window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32)
            .is_err()
        {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

/// Document ready and the dev server's hot module reports no pending update.
pub(crate) async fn settled(window: &Window, document: &Document, config: &BridgeConfig) {
    document_ready(document).await;
    let Some(global) = &config.hot_module_global else {
        return;
    };
    while hot_update_pending(window, global) {
        sleep(window, config.hot_reload_poll_ms).await;
    }
}

fn hot_update_pending(window: &Window, global: &str) -> bool {
    let Ok(hot) = Reflect::get(window, &JsValue::from_str(global)) else {
        return false;
    };
    if !hot.is_object() {
        return false;
    }
    Reflect::get(&hot, &JsValue::from_str("data"))
        .ok()
        .filter(JsValue::is_object)
        .and_then(|data| Reflect::get(&data, &JsValue::from_str("pending")).ok())
        .is_some_and(|pending| pending.is_truthy())
}

fn root_has_children(document: &Document, root_id: &str) -> bool {
    document
        .get_element_by_id(root_id)
        .is_some_and(|root| root.child_element_count() > 0)
}

/// Resolves once the mount root exists and has element children.
pub(crate) async fn root_ready(document: &Document, root_id: &str) {
    if root_has_children(document, root_id) {
        return;
    }
    let Some(body) = document.body() else {
        tracing::warn!("No <body> to observe for #{}", root_id);
        return;
    };
    let promise = Promise::new(&mut |resolve: Function, _reject: Function| {
        let document = document.clone();
        let root_id = root_id.to_string();
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, observer: MutationObserver| {
                if root_has_children(&document, &root_id) {
                    observer.disconnect();
                    let _ = resolve.call0(&JsValue::NULL);
                }
            },
        );
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        let observed = MutationObserver::new(callback.as_ref().unchecked_ref())
            .and_then(|observer| observer.observe_with_options(&body, &init));
        if let Err(e) = observed {
            tracing::warn!("Could not observe mount root: {:?}", e);
        }
        callback.forget();
    });
    let _ = JsFuture::from(promise).await;
}
