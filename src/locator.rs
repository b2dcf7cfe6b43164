//! DOM locator
//!
//! Maps elements to the source location written into their attributes at
//! build time, and locations back to every element rendered from them.
//!
//! ```text
//! <div data-imagine-id="src/App.tsx:12:3">          primary
//! <div data-component-path="src/App.tsx"
//!      data-component-line="12">                     fallback, col = 0
//! ```

use crate::dom::{DomElement, Page};
use crate::error::BridgeError;
use crate::protocol::{parse_int_prefix, SourceLocation};

/// Primary location attribute, `"filePath:lineNumber:col"`.
pub const LOCATION_ATTR: &str = "data-imagine-id";
/// Fallback path attribute.
pub const PATH_ATTR: &str = "data-component-path";
/// Fallback line attribute.
pub const LINE_ATTR: &str = "data-component-line";
/// Optional component content hint.
pub const CONTENT_ATTR: &str = "data-component-content";

/// Whether the element carries any location attribute.
pub fn is_selectable<E: DomElement>(element: &E) -> bool {
    element.has_attribute(LOCATION_ATTR) || element.has_attribute(PATH_ATTR)
}

/// Source location of an element; empty location when unannotated.
pub fn location_of<E: DomElement>(element: &E) -> SourceLocation {
    match element.attribute(LOCATION_ATTR) {
        Some(key) if !key.is_empty() => SourceLocation::parse(&key),
        _ => SourceLocation {
            file_path: element.attribute(PATH_ATTR).unwrap_or_default(),
            line_number: element
                .attribute(LINE_ATTR)
                .map(|line| parse_int_prefix(&line))
                .unwrap_or(0),
            col: 0,
        },
    }
}

/// Selector matching the primary attribute.
pub fn primary_selector(location: &SourceLocation) -> String {
    format!(
        "[{}=\"{}\"]",
        LOCATION_ATTR,
        escape_attr_value(&location.to_string())
    )
}

/// Selector matching the fallback attribute pair.
pub fn fallback_selector(location: &SourceLocation) -> String {
    format!(
        "[{}=\"{}\"][{}=\"{}\"]",
        PATH_ATTR,
        escape_attr_value(&location.file_path),
        LINE_ATTR,
        location.line_number
    )
}

/// Every element rendered from `location`: primary matches, or the fallback
/// matches when there are none.
pub fn find_by_location<P: Page>(
    page: &P,
    location: &SourceLocation,
) -> Result<Vec<P::Element>, BridgeError> {
    let selector = primary_selector(location);
    let elements = page.query_all(&selector)?;
    tracing::debug!("Found {} elements with selector: {}", elements.len(), selector);
    if !elements.is_empty() {
        return Ok(elements);
    }

    let alternate = fallback_selector(location);
    let elements = page.query_all(&alternate)?;
    tracing::debug!(
        "Found {} elements with alternate selector: {}",
        elements.len(),
        alternate
    );
    Ok(elements)
}

/// Escape a value for a double-quoted CSS attribute selector.
pub fn escape_attr_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
