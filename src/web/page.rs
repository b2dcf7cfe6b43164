//! `Page` and `DomElement` over `web_sys`.

use super::dom_error;
use crate::dom::{ChildNode, DomElement, Page, Rect};
use crate::error::BridgeError;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node, Window};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WebElement(pub Element);

impl WebElement {
    fn html(&self) -> Option<&HtmlElement> {
        self.0.dyn_ref::<HtmlElement>()
    }
}

impl DomElement for WebElement {
    fn tag_name(&self) -> String {
        self.0.tag_name()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), BridgeError> {
        self.0.set_attribute(name, value).map_err(dom_error("setAttribute"))
    }

    fn remove_attribute(&self, name: &str) -> Result<(), BridgeError> {
        self.0.remove_attribute(name).map_err(dom_error("removeAttribute"))
    }

    fn attributes(&self) -> Vec<(String, String)> {
        let attrs = self.0.attributes();
        (0..attrs.length())
            .filter_map(|i| attrs.item(i))
            .map(|attr| (attr.name(), attr.value()))
            .collect()
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent_element().map(WebElement)
    }

    fn children(&self) -> Vec<Self> {
        let children = self.0.children();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(WebElement)
            .collect()
    }

    fn child_nodes(&self) -> Vec<ChildNode<Self>> {
        let nodes = self.0.child_nodes();
        (0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .map(|node| {
                if let Some(el) = node.dyn_ref::<HtmlElement>() {
                    ChildNode::Element(WebElement(el.clone().into()))
                } else if node.node_type() == Node::TEXT_NODE {
                    ChildNode::Text(node.text_content().unwrap_or_default())
                } else {
                    ChildNode::Other
                }
            })
            .collect()
    }

    fn inner_text(&self) -> String {
        match self.html() {
            Some(el) => el.inner_text(),
            None => self.0.text_content().unwrap_or_default(),
        }
    }

    fn set_inner_html(&self, html: &str) {
        self.0.set_inner_html(html);
    }

    fn set_text_content(&self, text: &str) {
        self.0.set_text_content(Some(text));
    }

    fn bounding_rect(&self) -> Rect {
        let rect = self.0.get_bounding_client_rect();
        Rect {
            left: rect.left(),
            top: rect.top(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn closest(&self, selector: &str) -> Result<Option<Self>, BridgeError> {
        self.0
            .closest(selector)
            .map(|found| found.map(WebElement))
            .map_err(dom_error("closest"))
    }

    fn set_style(&self, property: &str, value: &str) -> Result<(), BridgeError> {
        let Some(el) = self.html() else {
            return Ok(());
        };
        let style = el.style();
        if value.is_empty() {
            style.remove_property(property).map(|_| ())
        } else {
            style.set_property(property, value)
        }
        .map_err(dom_error("style"))
    }

    fn focus(&self) -> Result<(), BridgeError> {
        match self.html() {
            Some(el) => el.focus().map_err(dom_error("focus")),
            None => Ok(()),
        }
    }

    fn deep_clone(&self) -> Result<Self, BridgeError> {
        self.0
            .clone_node_with_deep(true)
            .map_err(dom_error("cloneNode"))?
            .dyn_into::<Element>()
            .map(WebElement)
            .map_err(|_| BridgeError::dom("cloneNode", "clone is not an element"))
    }

    fn append_child(&self, child: &Self) -> Result<(), BridgeError> {
        self.0
            .append_child(&child.0)
            .map(|_| ())
            .map_err(dom_error("appendChild"))
    }

    fn remove(&self) {
        self.0.remove();
    }
}

/// The live window and document.
#[derive(Debug, Clone)]
pub(crate) struct WebPage {
    window: Window,
    document: Document,
}

impl WebPage {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }
}

impl Page for WebPage {
    type Element = WebElement;

    fn query_all(&self, selector: &str) -> Result<Vec<WebElement>, BridgeError> {
        let nodes = self
            .document
            .query_selector_all(selector)
            .map_err(dom_error("querySelectorAll"))?;
        Ok((0..nodes.length())
            .filter_map(|i| nodes.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .map(WebElement)
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<WebElement> {
        self.document.get_element_by_id(id).map(WebElement)
    }

    fn element_from_point(&self, x: f64, y: f64) -> Option<WebElement> {
        self.document.element_from_point(x as f32, y as f32).map(WebElement)
    }

    fn create_element(&self, tag: &str) -> Result<WebElement, BridgeError> {
        self.document
            .create_element(tag)
            .map(WebElement)
            .map_err(dom_error("createElement"))
    }

    fn head(&self) -> Option<WebElement> {
        self.document.head().map(|head| WebElement(head.into()))
    }

    fn body(&self) -> Option<WebElement> {
        self.document.body().map(|body| WebElement(body.into()))
    }

    fn viewport_width(&self) -> f64 {
        self.window
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or_default()
    }

    fn reload(&self) -> Result<(), BridgeError> {
        self.window.location().reload().map_err(dom_error("location.reload"))
    }
}
