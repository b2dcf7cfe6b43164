//! Bridge
//!
//! Owns every component and the single state value. The web runtime feeds it
//! DOM events, timer expiries and inbound messages; it answers with
//! [`Effect`]s and [`EventVerdict`]s for the runtime to carry out.
//!
//! ```text
//!  message ──► OriginGate ──► Inbound::decode ──► dispatch ──┐
//!  DOM event ────────────────────────────────► Selector ─────┼──► Effect / MessageBus
//!  capture   ──► telemetry ──────────────────────────────────┘
//! ```
//!
//! A failed handler never escapes: malformed payloads are logged, anything
//! else tears the selector down.

use crate::bus::{MessageBus, OriginGate, Transport};
use crate::config::BridgeConfig;
use crate::dom::Page;
use crate::error::BridgeError;
use crate::navigation::UrlWatcher;
use crate::protocol::{is_truthy, ComponentTreePayload, Inbound, Outbound, RawKeyEvent, ScriptLoaded, SourceLocation};
use crate::selector::debounce::Ticket;
use crate::selector::{keys, Deferred, Effect, EventVerdict, Selector, Timer};
use crate::serializer::Inspect;
use crate::telemetry::console::{self, ConsoleMethod};
use crate::telemetry::errors::{ErrorEventInfo, ErrorReporter, RejectionReason};
use crate::telemetry::{iso_now, Instrumentation};
use crate::tree::dom_node;

/// Verdict for a DOM event plus any follow-up work.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction<E> {
    pub verdict: EventVerdict,
    pub effects: Vec<Effect<E>>,
}

pub struct Bridge<P: Page, T: Transport> {
    config: BridgeConfig,
    page: P,
    bus: MessageBus<T>,
    selector: Selector<P::Element>,
    errors: ErrorReporter,
    instrumentation: Instrumentation,
    url: UrlWatcher,
}

impl<P: Page, T: Transport> Bridge<P, T> {
    pub fn new(config: BridgeConfig, page: P, transport: T, href: impl Into<String>) -> Self {
        let gate = OriginGate::new(config.allowed_origins.clone());
        Self {
            bus: MessageBus::new(transport, gate),
            selector: Selector::new(config.clone()),
            errors: ErrorReporter::new(config.dedup_ttl_ms),
            instrumentation: Instrumentation::default(),
            url: UrlWatcher::new(href),
            page,
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn bus(&self) -> &MessageBus<T> {
        &self.bus
    }

    pub fn selector(&self) -> &Selector<P::Element> {
        &self.selector
    }

    pub fn instrumentation_mut(&mut self) -> &mut Instrumentation {
        &mut self.instrumentation
    }

    /// `SELECTOR_SCRIPT_LOADED`, then ask for the picker state once the app
    /// has rendered.
    pub fn announce(&self) -> Vec<Effect<P::Element>> {
        self.bus.send(&Outbound::SelectorScriptLoaded {
            payload: ScriptLoaded {
                version: self.config.announced_version(),
            },
        });
        vec![Effect::WhenRootReady(Deferred::RequestPickerState)]
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Entry point for `message` events.
    pub fn handle_message(&mut self, origin: &str, data: serde_json::Value) -> Vec<Effect<P::Element>> {
        if !self.bus.gate().admits(origin) {
            return Vec::new();
        }
        let (kind, message) = match Inbound::decode(data) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("{}", e);
                return Vec::new();
            }
        };
        match self.dispatch(&kind, message) {
            Ok(effects) => effects,
            Err(e) => self.recover(&kind, e),
        }
    }

    fn dispatch(&mut self, kind: &str, message: Inbound) -> Result<Vec<Effect<P::Element>>, BridgeError> {
        let page = &self.page;
        match message {
            Inbound::ToggleSelector { payload } => return self.selector.toggle(page, is_truthy(&payload)),
            Inbound::UpdateSelectedElements { payload } => self.selector.replace_selection(page, &payload)?,
            Inbound::GetSelectorState => self.bus.send(&self.selector.state_response()),
            Inbound::SetElementContent { payload } => {
                self.selector.set_content(page, &payload.id, &payload.content)?
            }
            Inbound::SetElementAttrs { payload } => self.selector.set_attributes(page, &payload.id, &payload.attrs)?,
            Inbound::DuplicateElementRequested { payload } => self.selector.duplicate(page, &payload.id)?,
            Inbound::SetStylesheet { payload } => self.selector.set_stylesheet(page, &payload.stylesheet)?,
            Inbound::EditTextRequested { payload } => return self.selector.edit_text(page, &payload.id),
            Inbound::HoverElementRequested { payload } => self.selector.hover_requested(page, &payload.id)?,
            Inbound::UnhoverElementRequested { payload } => self.selector.unhover_requested(page, &payload.id)?,
            Inbound::GetParentElement { payload } => {
                let parent = self.selector.parent_of(page, &payload.id, &self.config.root_id)?;
                self.bus.send(&Outbound::ParentElement { payload: parent });
            }
            Inbound::RequestComponentTree => {
                return Ok(vec![Effect::WhenSettled(Deferred::SendComponentTree)]);
            }
            Inbound::ReloadPage => page.reload()?,
            Inbound::ConsoleOutput => {}
            Inbound::Unknown => tracing::warn!("Unknown message type: {}", kind),
        }
        Ok(Vec::new())
    }

    /// Malformed input aborts only its own branch; any other failure resets
    /// the selector.
    fn recover(&mut self, context: &str, error: BridgeError) -> Vec<Effect<P::Element>> {
        if error.is_malformed() {
            tracing::warn!("{}", error);
            return Vec::new();
        }
        tracing::error!("Error handling {}: {}", context, error);
        self.selector.teardown(&self.page)
    }

    fn settle(&mut self, context: &str, result: Result<Vec<Effect<P::Element>>, BridgeError>) -> Vec<Effect<P::Element>> {
        result.unwrap_or_else(|e| self.recover(context, e))
    }

    /// Run work that was waiting on a readiness point.
    pub fn run_deferred(&mut self, deferred: Deferred) -> Vec<Effect<P::Element>> {
        match deferred {
            Deferred::ForceEnableButtons => {
                let result = self.selector.force_enable_buttons(&self.page).map(|_| Vec::new());
                self.settle("button enabling", result)
            }
            Deferred::RequestPickerState => {
                self.bus.send(&Outbound::RequestPickerState);
                self.bus.send(&Outbound::RequestSelectedElements);
                Vec::new()
            }
            Deferred::SendComponentTree => {
                match self.page.element_by_id(&self.config.root_id) {
                    Some(root) => self.bus.send(&Outbound::ComponentTree {
                        payload: ComponentTreePayload {
                            tree: dom_node(&root, self.config.tree_max_depth),
                        },
                    }),
                    None => tracing::warn!("Mount root #{} not found, component tree not sent", self.config.root_id),
                }
                Vec::new()
            }
        }
    }

    // =========================================================================
    // DOM EVENTS
    // =========================================================================

    pub fn timer_fired(&mut self, timer: Timer, ticket: Ticket) -> Vec<Effect<P::Element>> {
        let result = self.selector.timer_fired(&self.page, timer, ticket);
        self.settle("timer", result)
    }

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.selector.pointer_moved(x, y);
    }

    pub fn mouse_over(&mut self, target: P::Element) -> Vec<Effect<P::Element>> {
        self.selector.mouse_over(target)
    }

    pub fn mouse_out(&mut self) -> Vec<Effect<P::Element>> {
        self.selector.mouse_out()
    }

    pub fn scroll(&mut self) -> Vec<Effect<P::Element>> {
        let result = self.selector.scroll(&self.page);
        self.settle("scroll", result)
    }

    pub fn mouse_down(&self, target: &P::Element) -> EventVerdict {
        self.selector.mouse_down(target)
    }

    pub fn click(&mut self, target: &P::Element, multi_select: bool) -> Reaction<P::Element> {
        match self.selector.click(&self.page, &self.bus, target, multi_select) {
            Ok(verdict) => Reaction {
                verdict,
                effects: Vec::new(),
            },
            Err(e) => Reaction {
                verdict: EventVerdict::BLOCK,
                effects: self.recover("click", e),
            },
        }
    }

    pub fn double_click(&mut self, target: &P::Element) -> Reaction<P::Element> {
        match self.selector.double_click(&self.bus, target) {
            Ok(verdict) => Reaction {
                verdict,
                effects: Vec::new(),
            },
            Err(e) => Reaction {
                verdict: EventVerdict::BLOCK,
                effects: self.recover("dblclick", e),
            },
        }
    }

    /// `submit`, `touchstart`, `touchend`.
    pub fn block_interaction(&self) -> EventVerdict {
        self.selector.block_interaction()
    }

    pub fn key_down(&self, event: RawKeyEvent, timestamp: f64) -> EventVerdict {
        let chord = keys::chord(event, timestamp);
        if let Some(message) = &chord.message {
            self.bus.send(message);
        }
        if chord.prevent_default {
            EventVerdict::PREVENT
        } else {
            EventVerdict::PASS
        }
    }

    pub fn text_edited(&self, id: &SourceLocation, element: &P::Element) {
        self.selector.text_edited(&self.bus, id, element);
    }

    pub fn text_edit_finished(&mut self, element: &P::Element) -> Vec<Effect<P::Element>> {
        let result = self.selector.text_edit_finished(element).map(|_| Vec::new());
        self.settle("blur", result)
    }

    /// Body mutation observed: report a changed `location.href` to the top
    /// window.
    pub fn location_changed(&mut self, href: &str) {
        if let Some(message) = self.url.observe(href) {
            self.bus.send_to_top(&message);
        }
    }

    // =========================================================================
    // TELEMETRY
    // =========================================================================

    pub fn console_output<V: Inspect>(&self, method: ConsoleMethod, args: &[V], raw_stack: Option<&str>) {
        let message = console::capture(&self.config, method, args, raw_stack, iso_now());
        self.bus.send(&message);
    }

    /// A settled fetch record.
    pub fn report_network(&self, message: &Outbound) {
        self.bus.send(message);
    }

    pub fn runtime_error(&mut self, event: ErrorEventInfo, now_ms: f64) {
        if let Some(message) = self.errors.runtime_error(event, now_ms) {
            self.bus.send(&message);
        }
    }

    pub fn rejection(&mut self, reason: RejectionReason, now_ms: f64) {
        if let Some(message) = self.errors.rejection(reason, now_ms) {
            self.bus.send(&message);
        }
    }
}
