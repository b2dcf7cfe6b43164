//! Selector state machine
//!
//! Owns the hover/select/edit lifecycle of the element picker.
//!
//! ```text
//!            TOGGLE_SELECTOR(true)
//!    ┌──────┐ ──────────────────► ┌────────┐
//!    │ Idle │                     │ Active │ ◄── mouseover / mouseout / scroll
//!    └──────┘ ◄────────────────── └────────┘     click / dblclick / mousedown
//!            TOGGLE_SELECTOR(false)
//!            or handler failure
//! ```
//!
//! The selection lives in [`SelectorState::selected`]; the
//! `data-imagine-selected` attribute is a projection of it. Work that needs
//! the event loop (listeners, timers, waiting for the mount root) is handed
//! back to the caller as [`Effect`]s.

mod commands;
pub mod debounce;
pub mod keys;
pub mod style;

use crate::bus::{MessageBus, Transport};
use crate::config::BridgeConfig;
use crate::dom::{DomElement, Page};
use crate::error::BridgeError;
use crate::locator::{find_by_location, is_selectable, location_of};
use crate::protocol::{Outbound, SourceLocation};
use crate::serializer::js_number_string;
use crate::tree::element_data;
use debounce::{Debouncer, Ticket};
use style::{
    FORCE_ENABLED_ATTR, FULL_WIDTH_ATTR, HOVERED_ATTR, SCROLL_OVERRIDE_CSS, SELECTED_ATTR,
    TOOLTIP_CLASS,
};

/// Debounced timers owned by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    Hover,
    Unhover,
    Scroll,
}

/// Work deferred until the page reaches a readiness point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Lift `disabled` from buttons so they stay pickable.
    ForceEnableButtons,
    /// Ask the editor for the picker state and current selection.
    RequestPickerState,
    /// Send `COMPONENT_TREE`.
    SendComponentTree,
}

/// Side effects the event-loop side must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<E> {
    /// Register the picker's pointer/scroll listeners.
    AttachListeners,
    DetachListeners,
    /// Call `timer_fired(timer, ticket)` after `delay_ms`.
    Schedule {
        timer: Timer,
        ticket: Ticket,
        delay_ms: u32,
    },
    /// Run once the mount root has children.
    WhenRootReady(Deferred),
    /// Run once the document is ready and no hot update is pending.
    WhenSettled(Deferred),
    /// Forward `input` events on `element` until it blurs.
    BridgeTextEdits { element: E, id: SourceLocation },
}

/// What a DOM listener should do with the event it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventVerdict {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventVerdict {
    pub const PASS: EventVerdict = EventVerdict {
        prevent_default: false,
        stop_propagation: false,
    };
    pub const BLOCK: EventVerdict = EventVerdict {
        prevent_default: true,
        stop_propagation: true,
    };
    pub const PREVENT: EventVerdict = EventVerdict {
        prevent_default: true,
        stop_propagation: false,
    };
}

/// Last known pointer position (client coordinates).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pointer {
    pub x: f64,
    pub y: f64,
}

/// The single picker state value.
#[derive(Debug)]
pub struct SelectorState<E> {
    pub is_active: bool,
    /// Listeners are attached.
    pub listening: bool,
    pub hovered: Option<E>,
    /// Target of the armed hover timer.
    pub pending_hover: Option<E>,
    pub tooltip: Option<E>,
    pub highlight_style: Option<E>,
    pub scroll_style: Option<E>,
    pub pointer: Pointer,
    /// Selected locations in selection order, without duplicates.
    pub selected: Vec<SourceLocation>,
    pub hover_timer: Debouncer,
    pub unhover_timer: Debouncer,
    pub scroll_timer: Debouncer,
}

impl<E> Default for SelectorState<E> {
    fn default() -> Self {
        Self {
            is_active: false,
            listening: false,
            hovered: None,
            pending_hover: None,
            tooltip: None,
            highlight_style: None,
            scroll_style: None,
            pointer: Pointer::default(),
            selected: Vec::new(),
            hover_timer: Debouncer::default(),
            unhover_timer: Debouncer::default(),
            scroll_timer: Debouncer::default(),
        }
    }
}

impl<E> SelectorState<E> {
    /// Add `location` to the selection. Returns false if it was there.
    pub fn select(&mut self, location: SourceLocation) -> bool {
        if self.selected.contains(&location) {
            return false;
        }
        self.selected.push(location);
        true
    }
}

/// Form controls whose pointer-down is swallowed while picking.
const FORM_CONTROLS: [&str; 3] = ["input", "textarea", "select"];

pub struct Selector<E> {
    config: BridgeConfig,
    state: SelectorState<E>,
}

impl<E: DomElement> Selector<E> {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            state: SelectorState::default(),
        }
    }

    pub fn state(&self) -> &SelectorState<E> {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Apply `TOGGLE_SELECTOR`. Redundant toggles do nothing.
    pub fn toggle<P: Page<Element = E>>(
        &mut self,
        page: &P,
        activate: bool,
    ) -> Result<Vec<Effect<E>>, BridgeError> {
        if activate == self.state.is_active {
            return Ok(Vec::new());
        }
        if activate {
            self.activate(page)
        } else {
            Ok(self.teardown(page))
        }
    }

    fn activate<P: Page<Element = E>>(&mut self, page: &P) -> Result<Vec<Effect<E>>, BridgeError> {
        tracing::info!("Element selector activated");
        self.state.is_active = true;
        self.state.listening = true;
        let mut effects = vec![Effect::AttachListeners];

        self.ensure_chrome(page)?;
        if self.state.scroll_style.is_none() {
            let style = page.create_element("style")?;
            style.set_text_content(SCROLL_OVERRIDE_CSS);
            page.head()
                .ok_or(BridgeError::Unavailable("document.head"))?
                .append_child(&style)?;
            self.state.scroll_style = Some(style);
        }
        self.project_selection(page)?;

        effects.push(Effect::WhenRootReady(Deferred::ForceEnableButtons));
        Ok(effects)
    }

    /// Tooltip and highlight stylesheet, created on first activation and
    /// kept so selected highlights render while idle.
    fn ensure_chrome<P: Page<Element = E>>(&mut self, page: &P) -> Result<(), BridgeError> {
        if self.state.tooltip.is_none() {
            let tooltip = page.create_element("div")?;
            tooltip.set_attribute("class", TOOLTIP_CLASS)?;
            tooltip.set_attribute("role", "tooltip")?;
            page.body()
                .ok_or(BridgeError::Unavailable("document.body"))?
                .append_child(&tooltip)?;
            self.state.tooltip = Some(tooltip);
        }
        if self.state.highlight_style.is_none() {
            let style = page.create_element("style")?;
            style.set_text_content(&style::highlight_css(&self.config));
            page.head()
                .ok_or(BridgeError::Unavailable("document.head"))?
                .append_child(&style)?;
            self.state.highlight_style = Some(style);
        }
        Ok(())
    }

    /// Leave Active. Also the defensive reset after a failed handler, so it
    /// runs every step regardless of earlier failures and may be repeated.
    pub fn teardown<P: Page<Element = E>>(&mut self, page: &P) -> Vec<Effect<E>> {
        let mut effects = Vec::new();
        if self.state.listening {
            effects.push(Effect::DetachListeners);
            self.state.listening = false;
        }
        if self.state.is_active {
            tracing::info!("Element selector deactivated");
        }
        self.state.is_active = false;

        if let Some(style) = self.state.scroll_style.take() {
            style.remove();
        }
        if let Err(e) = self.restore_buttons(page) {
            tracing::warn!("Failed to restore disabled buttons: {}", e);
        }
        if let Err(e) = self.strip_hover_markers(page) {
            tracing::warn!("Failed to clear hover highlight: {}", e);
        }

        self.state.hover_timer.cancel();
        self.state.unhover_timer.cancel();
        self.state.scroll_timer.cancel();
        self.state.pending_hover = None;
        if let Some(hovered) = self.state.hovered.take() {
            clear_highlight(&hovered);
        }
        self.hide_tooltip();

        if let Some(body) = page.body() {
            for property in ["cursor", "user-select"] {
                if let Err(e) = body.set_style(property, "") {
                    tracing::warn!("{}", e);
                }
            }
        }
        effects
    }

    fn restore_buttons<P: Page<Element = E>>(&self, page: &P) -> Result<(), BridgeError> {
        for button in page.query_all(&format!("[{}]", FORCE_ENABLED_ATTR))? {
            button.remove_attribute(FORCE_ENABLED_ATTR)?;
            button.set_attribute("disabled", "")?;
        }
        Ok(())
    }

    fn strip_hover_markers<P: Page<Element = E>>(&self, page: &P) -> Result<(), BridgeError> {
        let selector = format!("[{}], [{}]", HOVERED_ATTR, FULL_WIDTH_ATTR);
        for element in page.query_all(&selector)? {
            clear_highlight(&element);
        }
        Ok(())
    }

    /// Deferred half of activation: runs once the mount root has content.
    pub fn force_enable_buttons<P: Page<Element = E>>(&self, page: &P) -> Result<(), BridgeError> {
        if !self.state.is_active {
            return Ok(());
        }
        for button in page.query_all("button[disabled]")? {
            button.remove_attribute("disabled")?;
            button.set_attribute(FORCE_ENABLED_ATTR, "")?;
        }
        Ok(())
    }

    // =========================================================================
    // POINTER
    // =========================================================================

    pub fn pointer_moved(&mut self, x: f64, y: f64) {
        self.state.pointer = Pointer { x, y };
    }

    pub fn mouse_over(&mut self, target: E) -> Vec<Effect<E>> {
        if !self.state.is_active {
            return Vec::new();
        }
        self.state.pending_hover = Some(target);
        vec![Effect::Schedule {
            timer: Timer::Hover,
            ticket: self.state.hover_timer.arm(),
            delay_ms: self.config.debounce_ms,
        }]
    }

    pub fn mouse_out(&mut self) -> Vec<Effect<E>> {
        if !self.state.is_active {
            return Vec::new();
        }
        vec![Effect::Schedule {
            timer: Timer::Unhover,
            ticket: self.state.unhover_timer.arm(),
            delay_ms: self.config.debounce_ms,
        }]
    }

    pub fn scroll<P: Page<Element = E>>(&mut self, page: &P) -> Result<Vec<Effect<E>>, BridgeError> {
        if !self.state.is_active {
            return Ok(Vec::new());
        }
        self.hide_tooltip();
        if let Some(hovered) = self.state.hovered.clone() {
            self.clear_hover_group(page, &hovered)?;
        }
        Ok(vec![Effect::Schedule {
            timer: Timer::Scroll,
            ticket: self.state.scroll_timer.arm(),
            delay_ms: self.config.scroll_debounce_ms,
        }])
    }

    /// A scheduled timer elapsed. Superseded tickets do nothing.
    pub fn timer_fired<P: Page<Element = E>>(
        &mut self,
        page: &P,
        timer: Timer,
        ticket: Ticket,
    ) -> Result<Vec<Effect<E>>, BridgeError> {
        match timer {
            Timer::Hover => {
                if self.state.hover_timer.fire(ticket) {
                    if let Some(target) = self.state.pending_hover.take() {
                        self.hover(page, target)?;
                    }
                }
                Ok(Vec::new())
            }
            Timer::Unhover => {
                if self.state.unhover_timer.fire(ticket) {
                    self.unhover(page)?;
                }
                Ok(Vec::new())
            }
            Timer::Scroll => {
                if !self.state.scroll_timer.fire(ticket) || !self.state.is_active {
                    return Ok(Vec::new());
                }
                let Pointer { x, y } = self.state.pointer;
                match page.element_from_point(x, y) {
                    Some(element) => Ok(self.mouse_over(element)),
                    None => Ok(Vec::new()),
                }
            }
        }
    }

    /// Whether `target` can be hovered or clicked: annotated, not the root
    /// `<html>`, not drawn inside an SVG.
    fn is_pickable(&self, target: &E) -> Result<bool, BridgeError> {
        if !is_selectable(target) || target.tag() == "html" {
            return Ok(false);
        }
        let in_svg = target.tag() != "svg" && target.closest("svg")?.is_some();
        Ok(!in_svg)
    }

    fn hover<P: Page<Element = E>>(&mut self, page: &P, target: E) -> Result<(), BridgeError> {
        if !self.state.is_active || !self.is_pickable(&target)? {
            return Ok(());
        }
        if let Some(previous) = self.state.hovered.take() {
            self.clear_hover_group(page, &previous)?;
        }
        for element in find_by_location(page, &location_of(&target))? {
            if !element.has_attribute(SELECTED_ATTR) {
                self.mark(page, &element, HOVERED_ATTR)?;
            }
        }
        self.show_tooltip(page, &target);
        self.state.hovered = Some(target);
        Ok(())
    }

    fn unhover<P: Page<Element = E>>(&mut self, page: &P) -> Result<(), BridgeError> {
        if !self.state.is_active {
            return Ok(());
        }
        if let Some(previous) = self.state.hovered.take() {
            self.clear_hover_group(page, &previous)?;
        }
        self.hide_tooltip();
        Ok(())
    }

    fn clear_hover_group<P: Page<Element = E>>(&self, page: &P, member: &E) -> Result<(), BridgeError> {
        for element in find_by_location(page, &location_of(member))? {
            clear_highlight(&element);
        }
        Ok(())
    }

    /// Set `attr` on `element`, plus the full-width marker when it spans the
    /// viewport.
    fn mark<P: Page<Element = E>>(&self, page: &P, element: &E, attr: &str) -> Result<(), BridgeError> {
        element.set_attribute(attr, "true")?;
        if self
            .config
            .is_full_width(element.bounding_rect().width, page.viewport_width())
        {
            element.set_attribute(FULL_WIDTH_ATTR, "true")?;
        }
        Ok(())
    }

    pub fn mouse_down(&self, target: &E) -> EventVerdict {
        if self.state.is_active && FORM_CONTROLS.contains(&target.tag().as_str()) {
            EventVerdict::PREVENT
        } else {
            EventVerdict::PASS
        }
    }

    /// Capture-phase click. Every click is blocked while active; a click on
    /// a pickable target selects the hovered location group.
    pub fn click<P: Page<Element = E>, T: Transport>(
        &mut self,
        page: &P,
        bus: &MessageBus<T>,
        target: &E,
        multi_select: bool,
    ) -> Result<EventVerdict, BridgeError> {
        if !self.state.is_active {
            return Ok(EventVerdict::PASS);
        }
        if !self.is_pickable(target)? {
            return Ok(EventVerdict::BLOCK);
        }
        if let Some(hovered) = self.state.hovered.clone() {
            let payload = element_data(&hovered);
            let location = location_of(&hovered);
            for element in find_by_location(page, &location)? {
                self.mark(page, &element, SELECTED_ATTR)?;
                element.remove_attribute(HOVERED_ATTR)?;
            }
            self.state.select(location);
            bus.send(&Outbound::ElementClicked {
                payload,
                is_multi_select: multi_select,
            });
        }
        Ok(EventVerdict::BLOCK)
    }

    /// Capture-phase double click: report the target, selection untouched.
    pub fn double_click<T: Transport>(
        &self,
        bus: &MessageBus<T>,
        target: &E,
    ) -> Result<EventVerdict, BridgeError> {
        if !self.state.is_active || !self.is_pickable(target)? {
            return Ok(EventVerdict::PASS);
        }
        bus.send(&Outbound::ElementDoubleClicked {
            payload: element_data(target),
        });
        Ok(EventVerdict::BLOCK)
    }

    /// `submit`, `touchstart` and `touchend` while picking.
    pub fn block_interaction(&self) -> EventVerdict {
        if self.state.is_active {
            EventVerdict::BLOCK
        } else {
            EventVerdict::PASS
        }
    }

    // =========================================================================
    // SELECTION & TOOLTIP
    // =========================================================================

    /// Re-apply the selected marker to every element of every selected
    /// location.
    fn project_selection<P: Page<Element = E>>(&self, page: &P) -> Result<(), BridgeError> {
        for location in &self.state.selected {
            for element in find_by_location(page, location)? {
                self.mark(page, &element, SELECTED_ATTR)?;
            }
        }
        Ok(())
    }

    fn show_tooltip<P: Page<Element = E>>(&self, page: &P, target: &E) {
        let Some(tooltip) = &self.state.tooltip else {
            return;
        };
        if let Err(e) = self.position_tooltip(page, tooltip, target) {
            tracing::error!("Error updating tooltip: {}", e);
            self.hide_tooltip();
        }
    }

    fn position_tooltip<P: Page<Element = E>>(&self, page: &P, tooltip: &E, target: &E) -> Result<(), BridgeError> {
        let rect = target.bounding_rect();
        tooltip.set_style(
            "max-width",
            &format!("{}px", js_number_string(self.config.max_tooltip_width)),
        )?;
        if self.config.is_full_width(rect.width, page.viewport_width()) {
            tooltip.set_style("left", &self.config.full_width_tooltip_offset)?;
            tooltip.set_style("top", &self.config.full_width_tooltip_offset)?;
        } else {
            let top = (rect.top - self.config.tooltip_offset).max(0.0);
            tooltip.set_style("left", &format!("{}px", js_number_string(rect.left.max(0.0))))?;
            tooltip.set_style("top", &format!("{}px", js_number_string(top)))?;
        }
        tooltip.set_text_content(&target.tag());
        tooltip.set_style("display", "block")?;
        tooltip.set_style("opacity", "1")?;
        Ok(())
    }

    fn hide_tooltip(&self) {
        if let Some(tooltip) = &self.state.tooltip {
            let hidden = tooltip
                .set_style("opacity", "0")
                .and_then(|_| tooltip.set_style("display", "none"));
            if let Err(e) = hidden {
                tracing::warn!("{}", e);
            }
        }
    }
}

/// Drop hover and full-width markers and the inline cursor.
/// Drop the hover marker. Selected elements keep their full-width marker.
fn clear_highlight<E: DomElement>(element: &E) {
    let selected = element.has_attribute(SELECTED_ATTR);
    let cleared = element.remove_attribute(HOVERED_ATTR).and_then(|_| {
        if selected {
            return Ok(());
        }
        element
            .remove_attribute(FULL_WIDTH_ATTR)
            .and_then(|_| element.set_style("cursor", ""))
    });
    if let Err(e) = cleared {
        tracing::warn!("{}", e);
    }
}
