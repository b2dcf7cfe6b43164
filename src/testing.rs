//! In-memory fixtures shared by the unit tests: a value model for the
//! serializer, a tiny DOM for the locator/selector, and a transport that
//! records what was posted.

use crate::bus::Transport;
use crate::config::SerializerConfig;
use crate::dom::{ChildNode, DomElement, Page, Rect};
use crate::error::BridgeError;
use crate::serializer::{Inspect, Inspected, ObjectShape, Visited};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

// =============================================================================
// VALUES
// =============================================================================

/// Runtime value model. Objects are shared handles so tests can build
/// cycles and shared references the way JS code does.
#[derive(Clone)]
pub enum TestValue {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    BigInt(String),
    Symbol(String),
    Func { name: String, source: String },
    Obj(Rc<RefCell<TestObject>>),
}

pub enum TestObject {
    Plain(Vec<(String, Result<TestValue, String>)>),
    Array(Vec<TestValue>),
    Error {
        name: String,
        message: String,
        stack: Option<String>,
        extra: Vec<(String, Result<TestValue, String>)>,
    },
    Map(Vec<(TestValue, TestValue)>),
    Set(Vec<TestValue>),
    TypedArray {
        constructor: String,
        values: Vec<f64>,
        bytes_per_element: usize,
    },
}

impl TestValue {
    fn wrap(object: TestObject) -> Self {
        TestValue::Obj(Rc::new(RefCell::new(object)))
    }

    pub fn str(text: &str) -> Self {
        TestValue::Str(text.to_string())
    }

    pub fn object(members: Vec<(&str, TestValue)>) -> Self {
        Self::wrap(TestObject::Plain(
            members
                .into_iter()
                .map(|(k, v)| (k.to_string(), Ok(v)))
                .collect(),
        ))
    }

    pub fn object_with_failures(members: Vec<(&str, Result<TestValue, String>)>) -> Self {
        Self::wrap(TestObject::Plain(
            members.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        ))
    }

    pub fn array(items: Vec<TestValue>) -> Self {
        Self::wrap(TestObject::Array(items))
    }

    pub fn error(
        name: &str,
        message: &str,
        stack: Option<&str>,
        extra: Vec<(&str, Result<TestValue, String>)>,
    ) -> Self {
        Self::wrap(TestObject::Error {
            name: name.to_string(),
            message: message.to_string(),
            stack: stack.map(str::to_string),
            extra: extra.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        })
    }

    pub fn map(entries: Vec<(TestValue, TestValue)>) -> Self {
        Self::wrap(TestObject::Map(entries))
    }

    pub fn set_of(values: Vec<TestValue>) -> Self {
        Self::wrap(TestObject::Set(values))
    }

    pub fn typed_array(constructor: &str, values: Vec<f64>, bytes_per_element: usize) -> Self {
        Self::wrap(TestObject::TypedArray {
            constructor: constructor.to_string(),
            values,
            bytes_per_element,
        })
    }

    /// Assign a member on a plain object, like `obj[key] = value`.
    pub fn set(&self, key: &str, value: TestValue) {
        let TestValue::Obj(object) = self else {
            panic!("set on a non-object");
        };
        let mut object = object.borrow_mut();
        let TestObject::Plain(members) = &mut *object else {
            panic!("set on a non-plain object");
        };
        match members.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = Ok(value),
            None => members.push((key.to_string(), Ok(value))),
        }
    }
}

/// Identity-keyed visited set over the shared object handles.
#[derive(Default)]
pub struct TestVisited(HashMap<usize, String>);

fn identity(value: &TestValue) -> Option<usize> {
    match value {
        TestValue::Obj(object) => Some(Rc::as_ptr(object) as *const () as usize),
        _ => None,
    }
}

impl Visited<TestValue> for TestVisited {
    fn path_of(&self, value: &TestValue) -> Option<String> {
        identity(value).and_then(|id| self.0.get(&id).cloned())
    }

    fn record(&mut self, value: &TestValue, path: &str) {
        if let Some(id) = identity(value) {
            self.0.insert(id, path.to_string());
        }
    }
}

impl Inspect for TestValue {
    type Visited = TestVisited;

    fn inspect(&self, config: &SerializerConfig) -> Inspected<Self> {
        match self {
            TestValue::Undefined => Inspected::Undefined,
            TestValue::Null => Inspected::Null,
            TestValue::Bool(b) => Inspected::Bool(*b),
            TestValue::Num(n) => Inspected::Number(*n),
            TestValue::Str(s) => Inspected::String(s.clone()),
            TestValue::BigInt(s) => Inspected::BigInt(s.clone()),
            TestValue::Symbol(s) => Inspected::Symbol(s.clone()),
            TestValue::Func { name, source } => Inspected::Function {
                name: name.clone(),
                source: source.clone(),
            },
            TestValue::Obj(object) => Inspected::Object(match &*object.borrow() {
                TestObject::Plain(members) => ObjectShape::Plain {
                    key_count: members.len(),
                    members: members.iter().take(config.max_object_keys).cloned().collect(),
                },
                TestObject::Array(items) => ObjectShape::Array {
                    length: items.len(),
                    items: items.iter().take(config.max_array_length).cloned().collect(),
                },
                TestObject::Error {
                    name,
                    message,
                    stack,
                    extra,
                } => ObjectShape::Error {
                    name: name.clone(),
                    message: message.clone(),
                    stack: stack.clone(),
                    extra: extra.clone(),
                },
                TestObject::Map(entries) => ObjectShape::Map {
                    size: entries.len(),
                    entries: entries.iter().take(config.max_object_keys).cloned().collect(),
                },
                TestObject::Set(values) => ObjectShape::Set {
                    size: values.len(),
                    values: values.iter().take(config.max_array_length).cloned().collect(),
                },
                TestObject::TypedArray {
                    constructor,
                    values,
                    bytes_per_element,
                } => ObjectShape::TypedArray {
                    constructor: constructor.clone(),
                    length: values.len(),
                    byte_length: values.len() * bytes_per_element,
                    sample: values.iter().take(10).copied().collect(),
                },
            }),
        }
    }
}

// =============================================================================
// DOM
// =============================================================================

struct NodeData {
    tag: String,
    attrs: RefCell<Vec<(String, String)>>,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<FakeChild>>,
    styles: RefCell<BTreeMap<String, String>>,
    rect: Cell<Rect>,
    focused: Cell<bool>,
}

#[derive(Clone)]
enum FakeChild {
    Element(FakeElement),
    Text(String),
    Comment,
}

/// Element handle; equality is node identity.
#[derive(Clone)]
pub struct FakeElement(Rc<NodeData>);

impl PartialEq for FakeElement {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.0.tag.to_lowercase())?;
        for (name, value) in self.0.attrs.borrow().iter() {
            write!(f, " {}=\"{}\"", name, value)?;
        }
        write!(f, ">")
    }
}

impl FakeElement {
    fn detached(tag: &str) -> Self {
        FakeElement(Rc::new(NodeData {
            tag: tag.to_uppercase(),
            attrs: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            styles: RefCell::new(BTreeMap::new()),
            rect: Cell::new(Rect::default()),
            focused: Cell::new(false),
        }))
    }

    /// Append a new element child and return it.
    pub fn add(&self, tag: &str, attrs: &[(&str, &str)]) -> FakeElement {
        let child = FakeElement::detached(tag);
        for (name, value) in attrs {
            child.0.attrs.borrow_mut().push((name.to_string(), value.to_string()));
        }
        self.attach(child.clone());
        child
    }

    pub fn add_text(&self, text: &str) {
        self.0.children.borrow_mut().push(FakeChild::Text(text.to_string()));
    }

    pub fn add_comment(&self) {
        self.0.children.borrow_mut().push(FakeChild::Comment);
    }

    pub fn set_rect(&self, rect: Rect) {
        self.0.rect.set(rect);
    }

    pub fn style(&self, property: &str) -> Option<String> {
        self.0.styles.borrow().get(property).cloned()
    }

    pub fn is_focused(&self) -> bool {
        self.0.focused.get()
    }

    pub fn is_attached(&self) -> bool {
        self.0.parent.borrow().upgrade().is_some()
    }

    /// `textContent`, concatenated over descendants.
    pub fn text(&self) -> String {
        self.inner_text()
    }

    fn attach(&self, child: FakeElement) {
        child.remove();
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(FakeChild::Element(child));
    }

    fn descendants(&self, out: &mut Vec<FakeElement>) {
        for child in self.0.children.borrow().iter() {
            if let FakeChild::Element(el) = child {
                out.push(el.clone());
                el.descendants(out);
            }
        }
    }
}

impl DomElement for FakeElement {
    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attrs
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), BridgeError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(BridgeError::dom("setAttribute", format!("'{}' is not a valid attribute name", name)));
        }
        let mut attrs = self.0.attrs.borrow_mut();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn remove_attribute(&self, name: &str) -> Result<(), BridgeError> {
        self.0.attrs.borrow_mut().retain(|(k, _)| k != name);
        Ok(())
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.0.attrs.borrow().clone()
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent.borrow().upgrade().map(FakeElement)
    }

    fn children(&self) -> Vec<Self> {
        self.0
            .children
            .borrow()
            .iter()
            .filter_map(|c| match c {
                FakeChild::Element(el) => Some(el.clone()),
                _ => None,
            })
            .collect()
    }

    fn child_nodes(&self) -> Vec<ChildNode<Self>> {
        self.0
            .children
            .borrow()
            .iter()
            .map(|c| match c {
                FakeChild::Element(el) => ChildNode::Element(el.clone()),
                FakeChild::Text(text) => ChildNode::Text(text.clone()),
                FakeChild::Comment => ChildNode::Other,
            })
            .collect()
    }

    fn inner_text(&self) -> String {
        self.0
            .children
            .borrow()
            .iter()
            .map(|c| match c {
                FakeChild::Element(el) => el.inner_text(),
                FakeChild::Text(text) => text.clone(),
                FakeChild::Comment => String::new(),
            })
            .collect()
    }

    fn set_inner_html(&self, html: &str) {
        // Markup is kept as a single text node; the fixture has no parser.
        self.set_text_content(html);
    }

    fn set_text_content(&self, text: &str) {
        let mut children = self.0.children.borrow_mut();
        for child in children.iter() {
            if let FakeChild::Element(el) = child {
                *el.0.parent.borrow_mut() = Weak::new();
            }
        }
        *children = vec![FakeChild::Text(text.to_string())];
    }

    fn bounding_rect(&self) -> Rect {
        self.0.rect.get()
    }

    fn closest(&self, selector: &str) -> Result<Option<Self>, BridgeError> {
        let selector = parse_selector(selector)?;
        let mut current = Some(self.clone());
        while let Some(el) = current {
            if selector.iter().any(|c| c.matches(&el)) {
                return Ok(Some(el));
            }
            current = el.parent_element();
        }
        Ok(None)
    }

    fn set_style(&self, property: &str, value: &str) -> Result<(), BridgeError> {
        let mut styles = self.0.styles.borrow_mut();
        if value.is_empty() {
            styles.remove(property);
        } else {
            styles.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn focus(&self) -> Result<(), BridgeError> {
        self.0.focused.set(true);
        Ok(())
    }

    fn deep_clone(&self) -> Result<Self, BridgeError> {
        let copy = FakeElement::detached(&self.0.tag);
        *copy.0.attrs.borrow_mut() = self.0.attrs.borrow().clone();
        *copy.0.styles.borrow_mut() = self.0.styles.borrow().clone();
        copy.0.rect.set(self.0.rect.get());
        for child in self.0.children.borrow().iter() {
            match child {
                FakeChild::Element(el) => copy.attach(el.deep_clone()?),
                other => copy.0.children.borrow_mut().push(other.clone()),
            }
        }
        Ok(copy)
    }

    fn append_child(&self, child: &Self) -> Result<(), BridgeError> {
        self.attach(child.clone());
        Ok(())
    }

    fn remove(&self) {
        let parent = self.0.parent.borrow().upgrade();
        if let Some(parent) = parent {
            parent.children.borrow_mut().retain(|c| match c {
                FakeChild::Element(el) => !Rc::ptr_eq(&el.0, &self.0),
                _ => true,
            });
        }
        *self.0.parent.borrow_mut() = Weak::new();
    }
}

/// One compound selector: optional tag, optional id, attribute tests.
#[derive(Debug)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, el: &FakeElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !el.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.attrs.iter().all(|(name, value)| match value {
            None => el.has_attribute(name),
            Some(value) => el.attribute(name).as_deref() == Some(value.as_str()),
        })
    }
}

/// Parses the selector subset the bridge emits: comma lists of
/// `tag#id[attr][attr="value"]`, values with backslash escapes.
fn parse_selector(selector: &str) -> Result<Vec<Compound>, BridgeError> {
    selector
        .split(',')
        .map(|part| {
            parse_compound(part.trim())
                .ok_or_else(|| BridgeError::dom("querySelectorAll", format!("'{}' is not a valid selector", selector)))
        })
        .collect()
}

fn parse_compound(text: &str) -> Option<Compound> {
    let (head, mut rest) = text.split_at(text.find('[').unwrap_or(text.len()));
    let (tag, id) = match head.split_once('#') {
        Some((tag, id)) => (tag, Some(id.to_string())),
        None => (head, None),
    };
    let mut attrs = Vec::new();
    while let Some(body) = rest.strip_prefix('[') {
        let (name, after) = body.split_at(body.find([']', '='])?);
        if let Some(after) = after.strip_prefix(']') {
            attrs.push((name.to_string(), None));
            rest = after;
            continue;
        }
        let quoted = after.strip_prefix("=\"")?;
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        let end = loop {
            match chars.next()? {
                (_, '\\') => value.push(chars.next()?.1),
                (i, '"') => break i,
                (_, c) => value.push(c),
            }
        };
        rest = quoted[end + 1..].strip_prefix(']')?;
        attrs.push((name.to_string(), Some(value)));
    }
    let empty = tag.is_empty() && id.is_none() && attrs.is_empty();
    (rest.is_empty() && !empty).then(|| Compound {
        tag: (!tag.is_empty()).then(|| tag.to_string()),
        id,
        attrs,
    })
}

struct PageData {
    html: FakeElement,
    head: FakeElement,
    body: FakeElement,
    viewport_width: Cell<f64>,
    at_point: RefCell<Option<FakeElement>>,
    reloads: Cell<u32>,
    broken: Cell<bool>,
}

/// `<html><head/><body/></html>` with a settable viewport.
#[derive(Clone)]
pub struct FakePage(Rc<PageData>);

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        let html = FakeElement::detached("html");
        let head = html.add("head", &[]);
        let body = html.add("body", &[]);
        FakePage(Rc::new(PageData {
            html,
            head,
            body,
            viewport_width: Cell::new(1280.0),
            at_point: RefCell::new(None),
            reloads: Cell::new(0),
            broken: Cell::new(false),
        }))
    }

    /// Append an element to `<body>`.
    pub fn add(&self, tag: &str, attrs: &[(&str, &str)]) -> FakeElement {
        self.0.body.add(tag, attrs)
    }

    pub fn html(&self) -> FakeElement {
        self.0.html.clone()
    }

    pub fn body_element(&self) -> FakeElement {
        self.0.body.clone()
    }

    pub fn head_element(&self) -> FakeElement {
        self.0.head.clone()
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.0.viewport_width.set(width);
    }

    pub fn set_element_at_point(&self, element: Option<FakeElement>) {
        *self.0.at_point.borrow_mut() = element;
    }

    pub fn reloads(&self) -> u32 {
        self.0.reloads.get()
    }

    /// Make every following query fail, as a detached document would.
    pub fn break_queries(&self) {
        self.0.broken.set(true);
    }

    /// Elements carrying `name`, in document order.
    pub fn with_attribute(&self, name: &str) -> Vec<FakeElement> {
        self.all().into_iter().filter(|el| el.has_attribute(name)).collect()
    }

    fn all(&self) -> Vec<FakeElement> {
        let mut out = vec![self.0.html.clone()];
        self.0.html.descendants(&mut out);
        out
    }
}

impl Page for FakePage {
    type Element = FakeElement;

    fn query_all(&self, selector: &str) -> Result<Vec<FakeElement>, BridgeError> {
        if self.0.broken.get() {
            return Err(BridgeError::dom("querySelectorAll", "document is detached"));
        }
        let compounds = parse_selector(selector)?;
        Ok(self
            .all()
            .into_iter()
            .filter(|el| compounds.iter().any(|c| c.matches(el)))
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<FakeElement> {
        self.all()
            .into_iter()
            .find(|el| el.attribute("id").as_deref() == Some(id))
    }

    fn element_from_point(&self, _x: f64, _y: f64) -> Option<FakeElement> {
        self.0.at_point.borrow().clone()
    }

    fn create_element(&self, tag: &str) -> Result<FakeElement, BridgeError> {
        Ok(FakeElement::detached(tag))
    }

    fn head(&self) -> Option<FakeElement> {
        Some(self.0.head.clone())
    }

    fn body(&self) -> Option<FakeElement> {
        Some(self.0.body.clone())
    }

    fn viewport_width(&self) -> f64 {
        self.0.viewport_width.get()
    }

    fn reload(&self) -> Result<(), BridgeError> {
        self.0.reloads.set(self.0.reloads.get() + 1);
        Ok(())
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

#[derive(Default)]
struct TransportLog {
    delivered: Vec<(String, serde_json::Value)>,
    top: Vec<serde_json::Value>,
}

/// Records posted messages; posts to listed origins fail. Clones share the
/// log, so a test can keep a handle after moving one into the bridge.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    log: Rc<RefCell<TransportLog>>,
    failing: Vec<String>,
}

impl RecordingTransport {
    pub fn failing_for(origins: &[&str]) -> Self {
        Self {
            log: Rc::default(),
            failing: origins.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn delivered(&self) -> Vec<(String, serde_json::Value)> {
        self.log.borrow().delivered.clone()
    }

    pub fn top_messages(&self) -> Vec<serde_json::Value> {
        self.log.borrow().top.clone()
    }

    /// Delivered messages without their origin.
    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.log
            .borrow()
            .delivered
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// `type` tags of delivered messages, in order.
    pub fn types(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }

    pub fn of_type(&self, kind: &str) -> Vec<serde_json::Value> {
        self.messages()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    pub fn clear(&self) {
        let mut log = self.log.borrow_mut();
        log.delivered.clear();
        log.top.clear();
    }
}

impl Transport for RecordingTransport {
    fn post(&self, message: &serde_json::Value, target_origin: &str) -> Result<(), BridgeError> {
        if self.failing.iter().any(|o| o == target_origin) {
            return Err(BridgeError::Delivery {
                origin: target_origin.to_string(),
                detail: "DataCloneError".to_string(),
            });
        }
        self.log
            .borrow_mut()
            .delivered
            .push((target_origin.to_string(), message.clone()));
        Ok(())
    }

    fn post_to_top(&self, message: &serde_json::Value) -> Result<(), BridgeError> {
        self.log.borrow_mut().top.push(message.clone());
        Ok(())
    }
}
