//! Selector generation and re-resolution for form controls.
//!
//! A generated selector is `#id` when the element has one, otherwise a
//! child-combinator path from the nearest ancestor with an id (or from
//! `html`), using `:nth-of-type` to tell same-tag siblings apart.

use crate::dom::{Document, NodeId};
use crate::field::FieldInfo;

/// Compute a selector that locates `node` in `doc`.
///
/// # Examples
///
/// ```
/// use formsnap::{get_selector, Document};
///
/// let doc = Document::parse(r#"<form id="f"><input><input name="b"></form>"#);
/// let inputs = doc.query_selector_all("input").unwrap();
/// assert_eq!(get_selector(&doc, inputs[1]), "form#f > input:nth-of-type(2)");
/// ```
pub fn get_selector(doc: &Document, node: NodeId) -> String {
    if let Some(id) = doc.id_attr(node) {
        return format!("#{}", id);
    }

    let mut parts: Vec<String> = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        let Some(tag) = doc.tag_name(n) else {
            break;
        };
        let mut segment = tag.to_string();

        if let Some(id) = doc.id_attr(n) {
            segment.push('#');
            segment.push_str(id);
            parts.push(segment);
            break;
        }

        let nth = 1 + doc
            .previous_element_siblings(n)
            .into_iter()
            .filter(|s| doc.tag_name(*s) == Some(tag))
            .count();
        if nth > 1 {
            segment.push_str(&format!(":nth-of-type({})", nth));
        }

        parts.push(segment);
        current = doc.parent_element(n);
    }

    parts.reverse();
    parts.join(" > ")
}

/// Re-locate the control a [`FieldInfo`] was collected from.
///
/// The recorded selector is tried first. With `fallback` set, a miss falls
/// back to `tag[name="…"]` and then to the recorded id. A selector that no
/// longer parses counts as a miss.
pub fn find_element(doc: &Document, info: &FieldInfo, fallback: bool) -> Option<NodeId> {
    if let Some(node) = query(doc, &info.selector) {
        return Some(node);
    }
    if !fallback {
        return None;
    }

    if let Some(name) = info.name.as_deref().filter(|n| !n.is_empty()) {
        let tag = if info.tag.is_empty() { "*" } else { info.tag.as_str() };
        let by_name = format!("{}[name=\"{}\"]", tag, css_escape(name));
        if let Some(node) = query(doc, &by_name) {
            log::debug!("{} resolved by name fallback", info.selector);
            return Some(node);
        }
    }

    let id = info.id.as_deref().filter(|id| !id.is_empty())?;
    let found = doc.get_element_by_id(id);
    if found.is_some() {
        log::debug!("{} resolved by id fallback", info.selector);
    }
    found
}

fn query(doc: &Document, selector: &str) -> Option<NodeId> {
    match doc.query_selector(selector) {
        Ok(found) => found,
        Err(err) => {
            log::debug!("treating unparsable selector as not found: {}", err);
            None
        }
    }
}

/// Escape a value for use inside a CSS selector, like `CSS.escape`.
pub fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    if cssparser::serialize_identifier(value, &mut out).is_err() {
        return value.to_string();
    }
    out
}
