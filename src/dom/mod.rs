//! In-memory HTML document with live form-control state.
//!
//! The markup is parsed once with `scraper` and its structure never changes
//! afterwards. What a browser keeps beside the markup (the current value of a
//! text box, checkedness, option selectedness) lives in a side table keyed by
//! node id and falls back to the content attributes until it is written, the
//! same split HTML makes between attributes and IDL properties.
//!
//! ```
//! use formsnap::Document;
//!
//! let mut doc = Document::parse(r#"<input id="q" value="rust">"#);
//! let q = doc.get_element_by_id("q").unwrap();
//! assert_eq!(doc.value(q), "rust");
//! doc.set_value_native(q, "serde").unwrap();
//! assert_eq!(doc.value(q), "serde");
//! ```

pub mod events;
mod load;
mod serialize;
pub mod style;

pub use ego_tree::NodeId;
pub use events::{DomEvent, EventHandler};
pub use load::LoadConfig;
pub use style::{ComputedStyle, StyleCache, StyleSheet};

use crate::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Hook run by [`Document::assign_value`] before the value is stored.
///
/// This stands in for a UI framework that patches an element's `value`
/// setter to keep its own copy of the value.
pub type ValueSetterHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Input types a browser recognises; anything else reads back as `text`.
const INPUT_TYPES: &[&str] = &[
    "button",
    "checkbox",
    "color",
    "date",
    "datetime-local",
    "email",
    "file",
    "hidden",
    "image",
    "month",
    "number",
    "password",
    "radio",
    "range",
    "reset",
    "search",
    "submit",
    "tel",
    "text",
    "time",
    "url",
    "week",
];

#[derive(Debug, Clone, Default)]
struct ControlState {
    value: Option<String>,
    checked: Option<bool>,
    selected: Option<bool>,
    // Set on a select once its selection was written; disables the
    // implicit first-option selection.
    selection_dirty: bool,
}

/// A parsed HTML document plus the live state of its form controls.
#[derive(Clone)]
pub struct Document {
    html: Html,
    url: Option<String>,
    sheet: StyleSheet,
    state: HashMap<NodeId, ControlState>,
    listeners: HashMap<NodeId, Vec<(String, EventHandler)>>,
    value_hooks: HashMap<NodeId, ValueSetterHook>,
    event_log: Vec<DomEvent>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.url)
            .field("style_rules", &self.sheet.len())
            .field("dirty_controls", &self.state.len())
            .field("events_dispatched", &self.event_log.len())
            .finish()
    }
}

impl Document {
    /// Parse a complete HTML document.
    pub fn parse(html: &str) -> Self {
        Self::from_parts(html, None)
    }

    /// Read and parse an HTML file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let html = std::fs::read_to_string(path)
            .map_err(|e| Error::LoadError(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_parts(&html, None))
    }

    pub(crate) fn from_parts(source: &str, url: Option<String>) -> Self {
        let html = Html::parse_document(source);
        let mut sheet = StyleSheet::user_agent();
        for css in style::style_blocks(&html) {
            sheet.add_author_css(&css);
        }
        log::debug!(
            "parsed document ({} bytes, {} style rules)",
            source.len(),
            sheet.len()
        );
        Self {
            html,
            url,
            sheet,
            state: HashMap::new(),
            listeners: HashMap::new(),
            value_hooks: HashMap::new(),
            event_log: Vec::new(),
        }
    }

    /// URL the document was fetched from, if any.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The underlying parsed tree.
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Append author CSS, e.g. a stylesheet fetched separately.
    pub fn add_stylesheet(&mut self, css: &str) {
        self.sheet.add_author_css(css);
    }

    /// The document node (parent of `<html>`).
    pub fn root(&self) -> NodeId {
        self.html.tree.root().id()
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        self.html.root_element().id()
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    fn ensure_element(&self, node: NodeId) -> Result<()> {
        match self.element(node) {
            Some(_) => Ok(()),
            None => Err(Error::NodeNotFound(format!("{:?}", node))),
        }
    }

    /// Lowercase local name of an element, `None` for non-element nodes.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.value().name())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.value().attr(name))
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// The `id` attribute when present and non-empty.
    pub fn id_attr(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id").filter(|id| !id.is_empty())
    }

    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.html
            .tree
            .get(node)?
            .parent()
            .and_then(ElementRef::wrap)
            .map(|el| el.id())
    }

    /// Element siblings before `node`, nearest first.
    pub fn previous_element_siblings(&self, node: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(node)
            .map(|n| {
                n.prev_siblings()
                    .filter_map(ElementRef::wrap)
                    .map(|el| el.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every element below `root` in document order, excluding `root`.
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        self.html
            .tree
            .get(root)
            .map(|n| {
                n.descendants()
                    .skip(1)
                    .filter_map(ElementRef::wrap)
                    .map(|el| el.id())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.element(node)
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    // --- queries ---

    /// First element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).next().map(|el| el.id()))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let sel = parse_selector(selector)?;
        Ok(self.html.select(&sel).map(|el| el.id()).collect())
    }

    /// Matching descendants of `root` (the root itself is never returned).
    pub fn query_selector_all_within(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        if root == self.root() {
            return self.query_selector_all(selector);
        }
        let sel = parse_selector(selector)?;
        let el = self
            .element(root)
            .ok_or_else(|| Error::NodeNotFound(format!("{:?}", root)))?;
        Ok(el
            .select(&sel)
            .map(|found| found.id())
            .filter(|id| *id != root)
            .collect())
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(id))
            .map(|el| el.id())
    }

    /// `input`, `select` and `textarea` elements below `root`, in document order.
    pub fn form_controls(&self, root: NodeId) -> Result<Vec<NodeId>> {
        self.query_selector_all_within(root, "input, select, textarea")
    }

    /// Nearest ancestor `<form>`.
    pub fn form_owner(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.parent_element(node);
        while let Some(n) = current {
            if self.tag_name(n) == Some("form") {
                return Some(n);
            }
            current = self.parent_element(n);
        }
        None
    }

    // --- reflected properties ---

    /// Normalised `type` of an `<input>`; `None` for other elements.
    pub fn input_type(&self, node: NodeId) -> Option<String> {
        if self.tag_name(node)? != "input" {
            return None;
        }
        let raw = self
            .attr(node, "type")
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if INPUT_TYPES.contains(&raw.as_str()) {
            Some(raw)
        } else {
            Some("text".to_string())
        }
    }

    fn is_toggle(&self, node: NodeId) -> bool {
        matches!(self.input_type(node).as_deref(), Some("checkbox" | "radio"))
    }

    pub fn disabled(&self, node: NodeId) -> bool {
        self.has_attr(node, "disabled")
    }

    /// `readOnly` only exists on `<input>` and `<textarea>`.
    pub fn read_only(&self, node: NodeId) -> bool {
        matches!(self.tag_name(node), Some("input" | "textarea")) && self.has_attr(node, "readonly")
    }

    pub fn required(&self, node: NodeId) -> bool {
        self.has_attr(node, "required")
    }

    pub fn multiple(&self, node: NodeId) -> bool {
        self.tag_name(node) == Some("select") && self.has_attr(node, "multiple")
    }

    // --- live state ---

    /// Current value, the way the `value` property reads it.
    pub fn value(&self, node: NodeId) -> String {
        let dirty = self.state.get(&node).and_then(|s| s.value.clone());
        match self.tag_name(node) {
            Some("input") => dirty.unwrap_or_else(|| match self.attr(node, "value") {
                Some(v) => v.to_string(),
                None if self.is_toggle(node) => "on".to_string(),
                None => String::new(),
            }),
            Some("textarea") => dirty.unwrap_or_else(|| self.text_content(node)),
            Some("select") => self
                .selected_options(node)
                .first()
                .map(|opt| self.option_value(*opt))
                .unwrap_or_default(),
            Some("option") => self.option_value(node),
            _ => String::new(),
        }
    }

    /// Current checkedness. Until a radio group is written, only the last
    /// member carrying the `checked` attribute reads as checked.
    pub fn checked(&self, node: NodeId) -> bool {
        if let Some(checked) = self.state.get(&node).and_then(|s| s.checked) {
            return checked;
        }
        if !self.has_attr(node, "checked") {
            return false;
        }
        if self.input_type(node).as_deref() != Some("radio") {
            return true;
        }
        let group = self.radio_group(node);
        let written = group
            .iter()
            .any(|n| self.state.get(n).and_then(|s| s.checked) == Some(true));
        !written && group.iter().rev().find(|n| self.has_attr(**n, "checked")) == Some(&node)
    }

    /// `<option>` elements of a select, including those inside `<optgroup>`.
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        let Some(el) = self.element(select) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for child in el.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "option" => out.push(child.id()),
                "optgroup" => out.extend(
                    child
                        .children()
                        .filter_map(ElementRef::wrap)
                        .filter(|c| c.value().name() == "option")
                        .map(|c| c.id()),
                ),
                _ => {}
            }
        }
        out
    }

    /// Option label: text content with whitespace collapsed and trimmed.
    pub fn option_text(&self, option: NodeId) -> String {
        self.text_content(option)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn option_value(&self, option: NodeId) -> String {
        match self.attr(option, "value") {
            Some(v) => v.to_string(),
            None => self.option_text(option),
        }
    }

    fn option_flag(&self, option: NodeId) -> bool {
        self.state
            .get(&option)
            .and_then(|s| s.selected)
            .unwrap_or_else(|| self.has_attr(option, "selected"))
    }

    fn owner_select(&self, option: NodeId) -> Option<NodeId> {
        let parent = self.parent_element(option)?;
        match self.tag_name(parent) {
            Some("select") => Some(parent),
            Some("optgroup") => self
                .parent_element(parent)
                .filter(|p| self.tag_name(*p) == Some("select")),
            _ => None,
        }
    }

    /// Currently selected options of a select, in option order.
    pub fn selected_options(&self, select: NodeId) -> Vec<NodeId> {
        let options = self.options(select);
        if self.multiple(select) {
            return options
                .into_iter()
                .filter(|opt| self.option_flag(*opt))
                .collect();
        }
        if let Some(last) = options.iter().rev().find(|opt| self.option_flag(**opt)) {
            return vec![*last];
        }
        let dirty = self
            .state
            .get(&select)
            .map_or(false, |s| s.selection_dirty);
        if dirty {
            return Vec::new();
        }
        options
            .into_iter()
            .find(|opt| !self.disabled(*opt))
            .into_iter()
            .collect()
    }

    pub fn selected(&self, option: NodeId) -> bool {
        match self.owner_select(option) {
            Some(select) => self.selected_options(select).contains(&option),
            None => self.option_flag(option),
        }
    }

    pub fn selected_index(&self, select: NodeId) -> Option<usize> {
        let first = *self.selected_options(select).first()?;
        self.options(select).iter().position(|opt| *opt == first)
    }

    /// Radios sharing `radio`'s name and form owner. A nameless radio is
    /// a group of its own.
    pub fn radio_group(&self, radio: NodeId) -> Vec<NodeId> {
        let name = match self.attr(radio, "name") {
            Some(name) if !name.is_empty() => name,
            _ => return vec![radio],
        };
        let owner = self.form_owner(radio);
        self.descendant_elements(self.root())
            .into_iter()
            .filter(|n| {
                self.input_type(*n).as_deref() == Some("radio")
                    && self.attr(*n, "name") == Some(name)
                    && self.form_owner(*n) == owner
            })
            .collect()
    }

    // --- writes ---

    fn state_mut(&mut self, node: NodeId) -> &mut ControlState {
        self.state.entry(node).or_default()
    }

    /// Store a value through the unwrapped write path. No setter hook runs.
    pub fn set_value_native(&mut self, node: NodeId, value: &str) -> Result<()> {
        self.ensure_element(node)?;
        if self.tag_name(node) == Some("select") {
            return self.set_select_value(node, value);
        }
        self.state_mut(node).value = Some(value.to_string());
        Ok(())
    }

    /// Store a value the way page script assignment would: any registered
    /// setter hook observes it first.
    pub fn assign_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        if let Some(hook) = self.value_hooks.get(&node).cloned() {
            hook(value);
        }
        self.set_value_native(node, value)
    }

    /// Register a hook on `node`'s value setter. See [`ValueSetterHook`].
    pub fn intercept_value_setter<F>(&mut self, node: NodeId, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.value_hooks.insert(node, Arc::new(hook));
    }

    pub fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<()> {
        self.ensure_element(node)?;
        if checked && self.input_type(node).as_deref() == Some("radio") {
            for other in self.radio_group(node) {
                if other != node {
                    self.state_mut(other).checked = Some(false);
                }
            }
        }
        self.state_mut(node).checked = Some(checked);
        Ok(())
    }

    pub fn set_selected(&mut self, option: NodeId, selected: bool) -> Result<()> {
        self.ensure_element(option)?;
        if let Some(select) = self.owner_select(option) {
            if selected && !self.multiple(select) {
                for other in self.options(select) {
                    if other != option {
                        self.state_mut(other).selected = Some(false);
                    }
                }
            }
            self.state_mut(select).selection_dirty = true;
        }
        self.state_mut(option).selected = Some(selected);
        Ok(())
    }

    /// Select the first option whose value equals `value` and deselect the
    /// rest. With no match nothing stays selected.
    pub fn set_select_value(&mut self, select: NodeId, value: &str) -> Result<()> {
        self.ensure_element(select)?;
        let mut matched = false;
        for option in self.options(select) {
            let hit = !matched && self.option_value(option) == value;
            matched |= hit;
            self.state_mut(option).selected = Some(hit);
        }
        self.state_mut(select).selection_dirty = true;
        if !matched {
            log::trace!("no option with value {:?}; selection cleared", value);
        }
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| Error::InvalidSelector(selector.to_string()))
}
