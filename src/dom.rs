//! DOM seam
//!
//! The core reads and mutates the host page only through these traits. The
//! web runtime implements them over `web_sys`; tests use an in-memory page.
//! Methods mirror the DOM calls they stand for, so failures that the browser
//! can raise (bad selectors, rejected attribute names) surface as
//! [`BridgeError`] while infallible reads return plain values.

use crate::error::BridgeError;

/// Viewport-relative box of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A child node as seen by the tree serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildNode<E> {
    /// HTML element child.
    Element(E),
    /// Text node with its content.
    Text(String),
    /// Comments, SVG children and anything else the summary skips.
    Other,
}

/// An element handle. Cloning clones the handle, not the node.
pub trait DomElement: Clone + PartialEq + std::fmt::Debug {
    /// Tag name as the DOM reports it (upper case for HTML elements).
    fn tag_name(&self) -> String;

    /// Lower-cased tag name.
    fn tag(&self) -> String {
        self.tag_name().to_lowercase()
    }

    fn id(&self) -> String {
        self.attribute("id").unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<String>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), BridgeError>;
    fn remove_attribute(&self, name: &str) -> Result<(), BridgeError>;

    /// All attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;

    fn parent_element(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn child_nodes(&self) -> Vec<ChildNode<Self>>;

    /// Rendered text (`innerText`).
    fn inner_text(&self) -> String;
    fn set_inner_html(&self, html: &str);
    fn set_text_content(&self, text: &str);

    fn bounding_rect(&self) -> Rect;
    fn closest(&self, selector: &str) -> Result<Option<Self>, BridgeError>;

    /// Set an inline style property; an empty value clears it.
    fn set_style(&self, property: &str, value: &str) -> Result<(), BridgeError>;

    fn focus(&self) -> Result<(), BridgeError>;

    /// Deep clone of the node (not attached anywhere).
    fn deep_clone(&self) -> Result<Self, BridgeError>;
    fn append_child(&self, child: &Self) -> Result<(), BridgeError>;

    /// Detach from the document.
    fn remove(&self);
}

/// The document and window the bridge runs in.
pub trait Page {
    type Element: DomElement;

    /// `document.querySelectorAll`.
    fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>, BridgeError>;
    fn element_by_id(&self, id: &str) -> Option<Self::Element>;
    fn element_from_point(&self, x: f64, y: f64) -> Option<Self::Element>;
    fn create_element(&self, tag: &str) -> Result<Self::Element, BridgeError>;
    fn head(&self) -> Option<Self::Element>;
    fn body(&self) -> Option<Self::Element>;
    fn viewport_width(&self) -> f64;
    fn reload(&self) -> Result<(), BridgeError>;
}
