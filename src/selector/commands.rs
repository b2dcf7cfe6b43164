//! Editor commands that act on located elements, whether or not the picker
//! is active.

use super::style::{
    FULL_WIDTH_ATTR, HOVERED_ATTR, OVERRIDE_STYLESHEET_ID, SELECTED_ATTR, TEMPORARY_ATTR,
    UNIDENTIFIED_LOCATION,
};
use super::{Effect, Selector};
use crate::bus::{MessageBus, Transport};
use crate::dom::{DomElement, Page};
use crate::error::BridgeError;
use crate::locator::{find_by_location, LOCATION_ATTR};
use crate::protocol::{ElementData, Outbound, SelectorStatePayload, SourceLocation, TextUpdate};
use crate::tree::element_data;
use std::collections::BTreeMap;

const EDITABLE_ATTR: &str = "contenteditable";

impl<E: DomElement> Selector<E> {
    /// `UPDATE_SELECTED_ELEMENTS`: replace the selection wholesale.
    ///
    /// Every selected/hovered marker in the document is cleared first. Items
    /// without a path or line are skipped and logged.
    pub fn replace_selection<P: Page<Element = E>>(
        &mut self,
        page: &P,
        payload: &serde_json::Value,
    ) -> Result<(), BridgeError> {
        let items = payload.as_array().ok_or_else(|| {
            BridgeError::malformed("UPDATE_SELECTED_ELEMENTS", "payload is not an array")
        })?;

        let selector = format!("[{}], [{}]", SELECTED_ATTR, HOVERED_ATTR);
        for element in page.query_all(&selector)? {
            element.remove_attribute(SELECTED_ATTR)?;
            element.remove_attribute(HOVERED_ATTR)?;
            element.remove_attribute(FULL_WIDTH_ATTR)?;
        }

        self.state.selected.clear();
        for item in items {
            match serde_json::from_value::<SourceLocation>(item.clone()) {
                Ok(location) if location.is_complete() => {
                    self.state.select(location);
                }
                _ => tracing::error!("Invalid element data: {}", item),
            }
        }
        self.project_selection(page)
    }

    pub fn state_response(&self) -> Outbound {
        Outbound::SelectorStateResponse {
            payload: SelectorStatePayload {
                is_active: self.state.is_active,
            },
        }
    }

    /// `SET_ELEMENT_CONTENT`: replace the markup of every match.
    pub fn set_content<P: Page<Element = E>>(
        &self,
        page: &P,
        id: &SourceLocation,
        content: &str,
    ) -> Result<(), BridgeError> {
        tracing::debug!("Setting element content for {}", id);
        for element in find_by_location(page, id)? {
            element.set_inner_html(content);
        }
        Ok(())
    }

    /// `SET_ELEMENT_ATTRS`: write each attribute onto every match.
    pub fn set_attributes<P: Page<Element = E>>(
        &self,
        page: &P,
        id: &SourceLocation,
        attrs: &BTreeMap<String, String>,
    ) -> Result<(), BridgeError> {
        for element in find_by_location(page, id)? {
            for (name, value) in attrs {
                element.set_attribute(name, value)?;
            }
        }
        Ok(())
    }

    /// `DUPLICATE_ELEMENT_REQUESTED`: append a temporary deep clone of each
    /// match to its parent. Clones no longer resolve to the location.
    pub fn duplicate<P: Page<Element = E>>(&self, page: &P, id: &SourceLocation) -> Result<(), BridgeError> {
        for element in find_by_location(page, id)? {
            let clone = element.deep_clone()?;
            clone.set_attribute(LOCATION_ATTR, UNIDENTIFIED_LOCATION)?;
            clone.set_attribute(TEMPORARY_ATTR, "true")?;
            if let Some(parent) = element.parent_element() {
                parent.append_child(&clone)?;
            }
        }
        Ok(())
    }

    /// `SET_STYLESHEET`: create the override stylesheet once, overwrite it
    /// afterwards.
    pub fn set_stylesheet<P: Page<Element = E>>(&self, page: &P, css: &str) -> Result<(), BridgeError> {
        if let Some(existing) = page.element_by_id(OVERRIDE_STYLESHEET_ID) {
            existing.set_text_content(css);
            return Ok(());
        }
        let style = page.create_element("style")?;
        style.set_attribute("id", OVERRIDE_STYLESHEET_ID)?;
        style.set_text_content(css);
        page.head()
            .ok_or(BridgeError::Unavailable("document.head"))?
            .append_child(&style)
    }

    /// `EDIT_TEXT_REQUESTED`: make every match editable and focus it.
    pub fn edit_text<P: Page<Element = E>>(
        &self,
        page: &P,
        id: &SourceLocation,
    ) -> Result<Vec<Effect<E>>, BridgeError> {
        let mut effects = Vec::new();
        for element in find_by_location(page, id)? {
            element.set_attribute(EDITABLE_ATTR, "true")?;
            element.focus()?;
            effects.push(Effect::BridgeTextEdits {
                element,
                id: id.clone(),
            });
        }
        Ok(effects)
    }

    /// `input` on an element being edited.
    pub fn text_edited<T: Transport>(&self, bus: &MessageBus<T>, id: &SourceLocation, element: &E) {
        bus.send(&Outbound::ElementTextUpdated {
            payload: TextUpdate {
                id: id.clone(),
                content: element.inner_text(),
            },
        });
    }

    /// `blur` on an element being edited.
    pub fn text_edit_finished(&self, element: &E) -> Result<(), BridgeError> {
        element.remove_attribute(EDITABLE_ATTR)
    }

    /// `HOVER_ELEMENT_REQUESTED`: move the hover marker to the location.
    pub fn hover_requested<P: Page<Element = E>>(&self, page: &P, id: &SourceLocation) -> Result<(), BridgeError> {
        for element in page.query_all(&format!("[{}]", HOVERED_ATTR))? {
            element.remove_attribute(HOVERED_ATTR)?;
        }
        for element in find_by_location(page, id)? {
            element.set_attribute(HOVERED_ATTR, "true")?;
        }
        Ok(())
    }

    /// `UNHOVER_ELEMENT_REQUESTED`.
    pub fn unhover_requested<P: Page<Element = E>>(&self, page: &P, id: &SourceLocation) -> Result<(), BridgeError> {
        for element in find_by_location(page, id)? {
            element.remove_attribute(HOVERED_ATTR)?;
        }
        Ok(())
    }

    /// `GET_PARENT_ELEMENT`: the first match's parent, unless that is the
    /// mount root, `<html>` or `<body>`.
    pub fn parent_of<P: Page<Element = E>>(
        &self,
        page: &P,
        id: &SourceLocation,
        root_id: &str,
    ) -> Result<Option<ElementData>, BridgeError> {
        let parent = find_by_location(page, id)?
            .into_iter()
            .next()
            .and_then(|element| element.parent_element());
        Ok(parent
            .filter(|p| p.id() != root_id && !matches!(p.tag().as_str(), "html" | "body"))
            .map(|p| element_data(&p)))
    }
}
