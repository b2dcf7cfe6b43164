//! Event-loop side of the bridge: listeners, timers and effect execution.

use super::intercept;
use super::page::{WebElement, WebPage};
use super::readiness;
use super::string_prop;
use super::transport::WindowTransport;
use crate::bridge::{Bridge, Reaction};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::protocol::{Outbound, RawKeyEvent, SourceLocation};
use crate::selector::debounce::Ticket;
use crate::selector::{Deferred, Effect, EventVerdict, Timer};
use crate::telemetry::console::ConsoleMethod;
use crate::telemetry::errors::{ErrorEventInfo, RejectionReason};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Document, Element, ErrorEvent, Event, EventTarget, HtmlElement, KeyboardEvent,
    MessageEvent, MouseEvent, MutationObserver, MutationObserverInit, PromiseRejectionEvent, Window,
};

type WebBridge = Bridge<WebPage, WindowTransport>;
type Handler = fn(&Rc<Runtime>, &Event);

thread_local! {
    static RUNTIME: RefCell<Option<Rc<Runtime>>> = const { RefCell::new(None) };
}

#[derive(Clone, Copy)]
enum Scope {
    Window,
    Document,
}

/// One registered (or registrable) listener. The closure lives as long as
/// the runtime, so a listener may detach itself while running.
struct Listener {
    target: EventTarget,
    kind: &'static str,
    capture: bool,
    passive: bool,
    callback: Closure<dyn FnMut(Event)>,
}

impl Listener {
    fn attach(&self) -> Result<(), BridgeError> {
        let options = AddEventListenerOptions::new();
        options.set_capture(self.capture);
        options.set_passive(self.passive);
        self.target
            .add_event_listener_with_callback_and_add_event_listener_options(
                self.kind,
                self.callback.as_ref().unchecked_ref(),
                &options,
            )
            .map_err(super::dom_error("addEventListener"))
    }

    fn detach(&self) {
        let removed = self.target.remove_event_listener_with_callback_and_bool(
            self.kind,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        );
        if let Err(e) = removed {
            tracing::warn!("Failed to remove {} listener: {:?}", self.kind, e);
        }
    }
}

/// Listeners that only run while the picker is active.
const SELECTOR_LISTENERS: [(Scope, &str, bool, bool, Handler); 9] = [
    (Scope::Document, "mouseover", false, false, Runtime::on_mouse_over),
    (Scope::Document, "mouseout", false, false, Runtime::on_mouse_out),
    (Scope::Document, "click", true, false, Runtime::on_click),
    (Scope::Document, "dblclick", true, false, Runtime::on_double_click),
    (Scope::Window, "scroll", false, true, Runtime::on_scroll),
    (Scope::Document, "mousedown", true, false, Runtime::on_mouse_down),
    (Scope::Document, "submit", true, false, Runtime::on_blocked),
    (Scope::Document, "touchstart", true, false, Runtime::on_blocked),
    (Scope::Document, "touchend", true, false, Runtime::on_blocked),
];

/// Listeners installed for the lifetime of the page.
const PERMANENT_LISTENERS: [(Scope, &str, bool, bool, Handler); 3] = [
    (Scope::Window, "message", false, false, Runtime::on_message),
    (Scope::Document, "mousemove", false, true, Runtime::on_mouse_move),
    (Scope::Document, "keydown", false, false, Runtime::on_key_down),
];

const ERROR_LISTENERS: [(Scope, &str, bool, bool, Handler); 2] = [
    (Scope::Window, "error", false, false, Runtime::on_error),
    (Scope::Window, "unhandledrejection", false, false, Runtime::on_rejection),
];

pub(crate) struct Runtime {
    bridge: RefCell<WebBridge>,
    window: Window,
    document: Document,
    selector_listeners: Vec<Listener>,
    permanent_listeners: Vec<Listener>,
    error_listeners: Vec<Listener>,
    listening: Cell<bool>,
}

impl Runtime {
    /// Wait for the document, then install everything and announce.
    pub async fn launch(config: BridgeConfig) -> Result<(), BridgeError> {
        let window = web_sys::window().ok_or(BridgeError::Unavailable("window"))?;
        let document = window.document().ok_or(BridgeError::Unavailable("document"))?;
        readiness::document_ready(&document).await;

        let href = window.location().href().map_err(super::dom_error("location.href"))?;
        let page = WebPage::new(window.clone(), document.clone());
        let bridge = Bridge::new(config, page, WindowTransport::new(window.clone()), href);

        let runtime = Rc::new_cyclic(|weak: &Weak<Runtime>| {
            let build = |table: &[(Scope, &'static str, bool, bool, Handler)]| -> Vec<Listener> {
                table
                    .iter()
                    .map(|&(scope, kind, capture, passive, handler)| Listener {
                        target: match scope {
                            Scope::Window => window.clone().into(),
                            Scope::Document => document.clone().into(),
                        },
                        kind,
                        capture,
                        passive,
                        callback: callback(weak, handler),
                    })
                    .collect()
            };
            Runtime {
                selector_listeners: build(&SELECTOR_LISTENERS),
                permanent_listeners: build(&PERMANENT_LISTENERS),
                error_listeners: build(&ERROR_LISTENERS),
                bridge: RefCell::new(bridge),
                window: window.clone(),
                document: document.clone(),
                listening: Cell::new(false),
            }
        });
        RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime.clone()));

        runtime.instrument();
        for listener in &runtime.permanent_listeners {
            listener.attach()?;
        }
        runtime.watch_url()?;
        tracing::info!("Selector bridge ready");

        let effects = match runtime.bridge.try_borrow() {
            Ok(bridge) => bridge.announce(),
            Err(_) => Vec::new(),
        };
        runtime.apply(effects);
        Ok(())
    }

    fn instrument(self: &Rc<Self>) {
        let Ok(mut bridge) = self.bridge.try_borrow_mut() else {
            return;
        };
        let config = bridge.config().clone();
        let installers = bridge.instrumentation_mut();

        if config.capture_console {
            if let Err(e) = installers.console.install(|| self.patch_console()) {
                tracing::warn!("Console capture disabled: {}", e);
            }
        }
        if config.capture_network {
            if let Err(e) = installers.fetch.install(|| self.patch_fetch()) {
                tracing::warn!("Network capture disabled: {}", e);
            }
        }
        if config.capture_errors {
            let attached = installers.errors.install(|| {
                self.error_listeners.iter().try_for_each(Listener::attach)
            });
            if let Err(e) = attached {
                tracing::warn!("Error capture disabled: {}", e);
            }
        }
    }

    fn patch_console(self: &Rc<Self>) -> Result<(), BridgeError> {
        let console = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("console"))
            .map_err(|_| BridgeError::Unavailable("console"))?;
        let weak = Rc::downgrade(self);
        intercept::patch_console(
            &console,
            Rc::new(move |method: ConsoleMethod, args: &[JsValue], stack: Option<&str>| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.console_output(method, args, stack);
                }
            }),
        )
    }

    fn patch_fetch(self: &Rc<Self>) -> Result<(), BridgeError> {
        let origin = self.window.location().origin().map_err(super::dom_error("location.origin"))?;
        let weak = Rc::downgrade(self);
        intercept::patch_fetch(
            self.window.as_ref(),
            origin,
            Rc::new(move |message: &Outbound| {
                if let Some(runtime) = weak.upgrade() {
                    runtime.report_network(message);
                }
            }),
        )
    }

    fn watch_url(self: &Rc<Self>) -> Result<(), BridgeError> {
        let Some(body) = self.document.body() else {
            return Err(BridgeError::Unavailable("document.body"));
        };
        let weak = Rc::downgrade(self);
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                let Some(runtime) = weak.upgrade() else {
                    return;
                };
                let Ok(href) = runtime.window.location().href() else {
                    return;
                };
                runtime.update(|bridge| {
                    bridge.location_changed(&href);
                    Vec::new()
                });
            },
        );
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        MutationObserver::new(callback.as_ref().unchecked_ref())
            .and_then(|observer| observer.observe_with_options(&body, &init))
            .map_err(super::dom_error("MutationObserver"))?;
        callback.forget();
        Ok(())
    }

    // =========================================================================
    // EFFECTS
    // =========================================================================

    /// Run `f` against the bridge, then carry out what it asked for. Events
    /// arriving while the bridge is borrowed are dropped.
    fn update(self: &Rc<Self>, f: impl FnOnce(&mut WebBridge) -> Vec<Effect<WebElement>>) {
        let effects = match self.bridge.try_borrow_mut() {
            Ok(mut bridge) => f(&mut *bridge),
            Err(_) => {
                tracing::debug!("Bridge busy, event dropped");
                return;
            }
        };
        self.apply(effects);
    }

    fn react(self: &Rc<Self>, event: &Event, f: impl FnOnce(&mut WebBridge) -> Reaction<WebElement>) {
        let reaction = match self.bridge.try_borrow_mut() {
            Ok(mut bridge) => f(&mut *bridge),
            Err(_) => return,
        };
        apply_verdict(event, reaction.verdict);
        self.apply(reaction.effects);
    }

    fn apply(self: &Rc<Self>, effects: Vec<Effect<WebElement>>) {
        for effect in effects {
            match effect {
                Effect::AttachListeners => self.set_listening(true),
                Effect::DetachListeners => self.set_listening(false),
                Effect::Schedule {
                    timer,
                    ticket,
                    delay_ms,
                } => self.schedule(timer, ticket, delay_ms),
                Effect::WhenRootReady(deferred) => {
                    let runtime = self.clone();
                    let root_id = self.config_value(|c| c.root_id.clone());
                    wasm_bindgen_futures::spawn_local(async move {
                        readiness::root_ready(&runtime.document, &root_id).await;
                        runtime.run_deferred(deferred);
                    });
                }
                Effect::WhenSettled(deferred) => {
                    let runtime = self.clone();
                    let config = self.config_value(BridgeConfig::clone);
                    wasm_bindgen_futures::spawn_local(async move {
                        readiness::settled(&runtime.window, &runtime.document, &config).await;
                        runtime.run_deferred(deferred);
                    });
                }
                Effect::BridgeTextEdits { element, id } => self.bridge_text_edits(element, id),
            }
        }
    }

    fn config_value<R: Default>(&self, f: impl FnOnce(&BridgeConfig) -> R) -> R {
        self.bridge
            .try_borrow()
            .map(|bridge| f(bridge.config()))
            .unwrap_or_default()
    }

    fn run_deferred(self: &Rc<Self>, deferred: Deferred) {
        self.update(|bridge| bridge.run_deferred(deferred));
    }

    fn set_listening(&self, on: bool) {
        if self.listening.replace(on) == on {
            return;
        }
        for listener in &self.selector_listeners {
            if on {
                if let Err(e) = listener.attach() {
                    tracing::warn!("{}", e);
                }
            } else {
                listener.detach();
            }
        }
    }

    fn schedule(self: &Rc<Self>, timer: Timer, ticket: Ticket, delay_ms: u32) {
        let weak = Rc::downgrade(self);
        let fire = Closure::once_into_js(move || {
            if let Some(runtime) = weak.upgrade() {
                runtime.update(|bridge| bridge.timer_fired(timer, ticket));
            }
        });
        let scheduled = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(fire.unchecked_ref(), delay_ms as i32);
        if let Err(e) = scheduled {
            tracing::warn!("Failed to schedule {:?} timer: {:?}", timer, e);
        }
    }

    /// Forward `input` on `element` until it blurs.
    fn bridge_text_edits(self: &Rc<Self>, element: WebElement, id: SourceLocation) {
        let target: EventTarget = element.0.clone().into();

        let weak = Rc::downgrade(self);
        let edited = element.clone();
        let on_input = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            if let Some(runtime) = weak.upgrade() {
                if let Ok(bridge) = runtime.bridge.try_borrow() {
                    bridge.text_edited(&id, &edited);
                }
            }
        });
        if let Err(e) = target.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref()) {
            tracing::warn!("Failed to bridge text edits: {:?}", e);
            return;
        }

        let weak = Rc::downgrade(self);
        let blur_target = target.clone();
        let on_blur = Closure::once_into_js(move || {
            let _ = blur_target.remove_event_listener_with_callback("input", on_input.as_ref().unchecked_ref());
            drop(on_input);
            if let Some(runtime) = weak.upgrade() {
                runtime.update(|bridge| bridge.text_edit_finished(&element));
            }
        });
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        if let Err(e) = target.add_event_listener_with_callback_and_add_event_listener_options(
            "blur",
            on_blur.unchecked_ref(),
            &options,
        ) {
            tracing::warn!("Failed to watch blur: {:?}", e);
        }
    }

    // =========================================================================
    // TELEMETRY
    // =========================================================================

    fn console_output(&self, method: ConsoleMethod, args: &[JsValue], raw_stack: Option<&str>) {
        if let Ok(bridge) = self.bridge.try_borrow() {
            bridge.console_output(method, args, raw_stack);
        }
    }

    fn report_network(&self, message: &Outbound) {
        if let Ok(bridge) = self.bridge.try_borrow() {
            bridge.report_network(message);
        }
    }

    // =========================================================================
    // HANDLERS
    // =========================================================================

    fn on_message(self: &Rc<Self>, event: &Event) {
        let Some(event) = event.dyn_ref::<MessageEvent>() else {
            return;
        };
        let origin = event.origin();
        let Ok(data) = serde_wasm_bindgen::from_value::<serde_json::Value>(event.data()) else {
            return;
        };
        self.update(|bridge| bridge.handle_message(&origin, data));
    }

    fn on_mouse_move(self: &Rc<Self>, event: &Event) {
        if let Some(event) = event.dyn_ref::<MouseEvent>() {
            let (x, y) = (event.client_x() as f64, event.client_y() as f64);
            self.update(|bridge| {
                bridge.pointer_moved(x, y);
                Vec::new()
            });
        }
    }

    fn on_key_down(self: &Rc<Self>, event: &Event) {
        let Some(key) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        let (raw, timestamp) = key_input(key);
        if let Ok(bridge) = self.bridge.try_borrow() {
            apply_verdict(event, bridge.key_down(raw, timestamp));
        }
    }

    fn on_mouse_over(self: &Rc<Self>, event: &Event) {
        if let Some(target) = html_target(event) {
            self.update(|bridge| bridge.mouse_over(target));
        }
    }

    fn on_mouse_out(self: &Rc<Self>, _event: &Event) {
        self.update(|bridge| bridge.mouse_out());
    }

    fn on_scroll(self: &Rc<Self>, _event: &Event) {
        self.update(|bridge| bridge.scroll());
    }

    fn on_click(self: &Rc<Self>, event: &Event) {
        let Some(target) = element_target(event) else {
            return;
        };
        let multi = event
            .dyn_ref::<MouseEvent>()
            .is_some_and(|mouse| mouse.meta_key() || mouse.ctrl_key());
        self.react(event, |bridge| bridge.click(&target, multi));
    }

    fn on_double_click(self: &Rc<Self>, event: &Event) {
        if let Some(target) = element_target(event) {
            self.react(event, |bridge| bridge.double_click(&target));
        }
    }

    fn on_mouse_down(self: &Rc<Self>, event: &Event) {
        if let (Some(target), Ok(bridge)) = (element_target(event), self.bridge.try_borrow()) {
            apply_verdict(event, bridge.mouse_down(&target));
        }
    }

    fn on_blocked(self: &Rc<Self>, event: &Event) {
        if let Ok(bridge) = self.bridge.try_borrow() {
            apply_verdict(event, bridge.block_interaction());
        }
    }

    fn on_error(self: &Rc<Self>, event: &Event) {
        let Some(event) = event.dyn_ref::<ErrorEvent>() else {
            return;
        };
        let info = ErrorEventInfo {
            message: event.message(),
            filename: event.filename(),
            lineno: event.lineno(),
            colno: event.colno(),
            stack: string_prop(&event.error(), "stack"),
        };
        let now = js_sys::Date::now();
        self.update(|bridge| {
            bridge.runtime_error(info, now);
            Vec::new()
        });
    }

    fn on_rejection(self: &Rc<Self>, event: &Event) {
        let Some(event) = event.dyn_ref::<PromiseRejectionEvent>() else {
            return;
        };
        let reason = event.reason();
        let rejection = RejectionReason {
            stack: string_prop(&reason, "stack"),
            message: string_prop(&reason, "message"),
            display: (!reason.is_undefined() && !reason.is_null()).then(|| super::js_display(&reason)),
        };
        let now = js_sys::Date::now();
        self.update(|bridge| {
            bridge.rejection(rejection, now);
            Vec::new()
        });
    }
}

fn callback(weak: &Weak<Runtime>, handler: Handler) -> Closure<dyn FnMut(Event)> {
    let weak = weak.clone();
    Closure::new(move |event: Event| {
        if let Some(runtime) = weak.upgrade() {
            handler(&runtime, &event);
        }
    })
}

/// Key fields plus the epoch-ms time the chord is stamped with. The
/// event's own `timeStamp` counts from page load.
fn key_input(event: &KeyboardEvent) -> (RawKeyEvent, f64) {
    let raw = RawKeyEvent {
        key: event.key(),
        code: event.code(),
        meta_key: event.meta_key(),
        ctrl_key: event.ctrl_key(),
        alt_key: event.alt_key(),
        shift_key: event.shift_key(),
    };
    (raw, js_sys::Date::now())
}

fn apply_verdict(event: &Event, verdict: EventVerdict) {
    if verdict.prevent_default {
        event.prevent_default();
    }
    if verdict.stop_propagation {
        event.stop_propagation();
    }
}

fn element_target(event: &Event) -> Option<WebElement> {
    event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .map(WebElement)
}

/// Hover only reacts to HTML elements.
fn html_target(event: &Event) -> Option<WebElement> {
    event
        .target()
        .and_then(|target| target.dyn_into::<HtmlElement>().ok())
        .map(|el| WebElement(el.into()))
}
