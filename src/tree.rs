//! Component tree serializer
//!
//! Lossy summaries of rendered elements for the editor: one
//! [`ElementData`] per element and a recursive [`DomNode`] tree below the
//! mount root.

use crate::dom::{ChildNode, DomElement};
use crate::locator::{is_selectable, location_of, CONTENT_ATTR, LOCATION_ATTR};
use crate::protocol::{DomNode, ElementData, SourceLocation};
use std::collections::{BTreeMap, HashSet};

/// Summary of `element` and its direct selectable children.
///
/// Children rendered from the element's own location are skipped, and
/// children sharing a location are reported once (first occurrence).
pub fn element_data<E: DomElement>(element: &E) -> ElementData {
    let own = location_of(element);
    let mut seen: HashSet<SourceLocation> = HashSet::new();
    let children = element
        .children()
        .into_iter()
        .filter(|child| is_selectable(child))
        .filter_map(|child| {
            let location = location_of(&child);
            if location == own || !seen.insert(location.clone()) {
                return None;
            }
            Some(summary(&child, location, Vec::new()))
        })
        .collect();
    summary(element, own, children)
}

fn summary<E: DomElement>(element: &E, location: SourceLocation, children: Vec<ElementData>) -> ElementData {
    let mut attrs = BTreeMap::new();
    attrs.insert("src".to_string(), element.attribute("src").unwrap_or_default());
    ElementData {
        id: element.attribute(LOCATION_ATTR).unwrap_or_default(),
        file_name: location.file_name().to_string(),
        file_path: location.file_path,
        line_number: location.line_number,
        col: location.col,
        element_type: element.tag(),
        content: element.attribute(CONTENT_ATTR).unwrap_or_default(),
        children,
        class_name: element.attribute("class").unwrap_or_default(),
        text_content: element.inner_text(),
        attrs,
    }
}

/// Tree below `element`. Element children recurse, text children become
/// text nodes, anything else is dropped. Nodes `max_depth` levels down are
/// emitted without children.
pub fn dom_node<E: DomElement>(element: &E, max_depth: usize) -> DomNode {
    node_at(element, 0, max_depth)
}

fn node_at<E: DomElement>(element: &E, depth: usize, max_depth: usize) -> DomNode {
    let children = if depth >= max_depth {
        Vec::new()
    } else {
        element
            .child_nodes()
            .into_iter()
            .filter_map(|child| match child {
                ChildNode::Element(el) => Some(node_at(&el, depth + 1, max_depth)),
                ChildNode::Text(text_content) => Some(DomNode::Text { text_content }),
                ChildNode::Other => None,
            })
            .collect()
    };

    DomNode::Node {
        tag_name: element.tag_name(),
        attrs: element.attributes().into_iter().collect(),
        data: element_data(element),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn element_data_summarizes_distinct_children() {
        let page = FakePage::new();
        let card = page.add(
            "div",
            &[
                (LOCATION_ATTR, "src/components/Card.tsx:4:2"),
                ("class", "card"),
                (CONTENT_ATTR, "%7B%7D"),
            ],
        );
        // Same location as the parent: skipped.
        card.add("div", &[(LOCATION_ATTR, "src/components/Card.tsx:4:2")]);
        let title = card.add("h2", &[(LOCATION_ATTR, "src/components/Title.tsx:3:4")]);
        title.add_text("Hello");
        // Duplicate of the title location: skipped.
        card.add("h2", &[(LOCATION_ATTR, "src/components/Title.tsx:3:4")]);
        // Same file, different line: kept.
        card.add("img", &[(LOCATION_ATTR, "src/components/Title.tsx:9:4"), ("src", "/logo.png")]);
        // Not selectable.
        card.add("span", &[]);

        let data = element_data(&card);
        assert_eq!(data.id, "src/components/Card.tsx:4:2");
        assert_eq!(data.file_name, "Card.tsx");
        assert_eq!(data.element_type, "div");
        assert_eq!(data.class_name, "card");
        assert_eq!(data.content, "%7B%7D");
        assert_eq!(data.text_content, "Hello");
        assert_eq!(data.attrs["src"], "");

        let children: Vec<_> = data.children.iter().map(|c| (c.line_number, c.element_type.as_str())).collect();
        assert_eq!(children, vec![(3, "h2"), (9, "img")]);
        assert!(data.children.iter().all(|c| c.children.is_empty()));
        assert_eq!(data.children[1].attrs["src"], "/logo.png");
    }

    #[test]
    fn fallback_attributes_feed_element_data() {
        let page = FakePage::new();
        let el = page.add(
            "section",
            &[("data-component-path", "src/Hero.tsx"), ("data-component-line", "14")],
        );
        let data = element_data(&el);
        assert_eq!(data.id, "");
        assert_eq!(data.file_path, "src/Hero.tsx");
        assert_eq!(data.line_number, 14);
        assert_eq!(data.col, 0);
    }

    #[test]
    fn dom_node_keeps_elements_and_text_only() {
        let page = FakePage::new();
        let root = page.add("div", &[("id", "root")]);
        let p = root.add("p", &[(LOCATION_ATTR, "App.tsx:2:1")]);
        p.add_text("hi");
        root.add_comment();

        let tree = serde_json::to_value(dom_node(&root, 64)).unwrap();
        assert_eq!(tree["type"], "node");
        assert_eq!(tree["tagName"], "DIV");
        assert_eq!(tree["attrs"], json!({"id": "root"}));
        assert_eq!(tree["children"].as_array().unwrap().len(), 1);
        assert_eq!(tree["children"][0]["tagName"], "P");
        assert_eq!(tree["children"][0]["data"]["lineNumber"], 2);
        assert_eq!(
            tree["children"][0]["children"],
            json!([{"type": "text", "textContent": "hi"}])
        );
    }

    #[test]
    fn recursion_stops_at_max_depth() {
        let page = FakePage::new();
        let root = page.add("div", &[]);
        let mut current = root.clone();
        for _ in 0..5 {
            current = current.add("div", &[]);
        }

        let tree = dom_node(&root, 2);
        let DomNode::Node { children, .. } = &tree else {
            panic!("expected node");
        };
        let DomNode::Node { children, .. } = &children[0] else {
            panic!("expected node");
        };
        let DomNode::Node { children, .. } = &children[0] else {
            panic!("expected node");
        };
        assert!(children.is_empty());
    }
}
