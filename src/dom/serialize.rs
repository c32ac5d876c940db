//! Write a document back to HTML with live control state reflected into
//! markup, so a filled page can be saved and reopened elsewhere.
//!
//! The parsed tree is cloned, live state is written into the clone's
//! attributes and text, and html5ever serializes the result.

use super::{Document, NodeId};
use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use html5ever::serialize::{serialize, Serialize, SerializeOpts, Serializer, TraversalScope};
use html5ever::tendril::StrTendril;
use html5ever::{LocalName, Namespace, QualName};
use scraper::node::{Doctype, Text};
use scraper::{Html, Node};
use std::io;

impl Document {
    /// Serialize the document. Written values, checkedness and selectedness
    /// replace the corresponding attributes; a written textarea value
    /// replaces its text.
    pub fn to_html(&self) -> String {
        let snapshot = self.reflected_tree();
        let opts = SerializeOpts {
            scripting_enabled: false,
            traversal_scope: TraversalScope::ChildrenOnly(None),
            create_missing_parent: false,
        };
        let mut out = Vec::new();
        if let Err(err) = serialize(&mut out, &WholeDocument(snapshot.tree.root()), opts) {
            log::debug!("serialization stopped early: {}", err);
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// A copy of the tree whose markup carries the live control state.
    fn reflected_tree(&self) -> Html {
        let mut html = self.html.clone();
        for node in self.descendant_elements(self.root()) {
            match self.tag_name(node) {
                Some("input") => {
                    if let Some(value) = self.state.get(&node).and_then(|s| s.value.as_deref()) {
                        set_attr(&mut html, node, "value", Some(value));
                    }
                    let checked = self.checked(node);
                    if self.is_toggle(node) && checked != self.has_attr(node, "checked") {
                        set_attr(&mut html, node, "checked", checked.then_some(""));
                    }
                }
                Some("textarea") => {
                    if let Some(value) = self.state.get(&node).and_then(|s| s.value.as_deref()) {
                        replace_text(&mut html, node, value);
                    }
                }
                Some("option") if self.option_touched(node) => {
                    let selected = self.selected(node);
                    set_attr(&mut html, node, "selected", selected.then_some(""));
                }
                _ => {}
            }
        }
        html
    }

    // options of a written select need their selectedness too
    fn option_touched(&self, option: NodeId) -> bool {
        self.state.get(&option).map_or(false, |s| s.selected.is_some())
            || self
                .owner_select(option)
                .and_then(|s| self.state.get(&s))
                .map_or(false, |s| s.selection_dirty)
    }
}

/// `None` removes the attribute.
fn set_attr(html: &mut Html, node: NodeId, name: &str, value: Option<&str>) {
    let Some(mut target) = html.tree.get_mut(node) else {
        return;
    };
    if let Node::Element(el) = target.value() {
        let key = QualName::new(None, Namespace::from(""), LocalName::from(name));
        match value {
            Some(value) => {
                el.attrs.insert(key, StrTendril::from(value));
            }
            None => {
                el.attrs.shift_remove(&key);
            }
        }
    }
}

fn replace_text(html: &mut Html, node: NodeId, text: &str) {
    let children: Vec<NodeId> = match html.tree.get(node) {
        Some(el) => el.children().map(|c| c.id()).collect(),
        None => return,
    };
    for child in children {
        if let Some(mut child) = html.tree.get_mut(child) {
            child.detach();
        }
    }
    if let Some(mut el) = html.tree.get_mut(node) {
        el.append(Node::Text(Text {
            text: StrTendril::from(text),
        }));
    }
}

/// Doctype as written after `<!DOCTYPE `, identifiers included.
fn doctype_text(doctype: &Doctype) -> String {
    let mut out = doctype.name().to_string();
    match (doctype.public_id(), doctype.system_id()) {
        ("", "") => {}
        ("", system) => out.push_str(&format!(" SYSTEM \"{}\"", system)),
        (public, "") => out.push_str(&format!(" PUBLIC \"{}\"", public)),
        (public, system) => out.push_str(&format!(" PUBLIC \"{}\" \"{}\"", public, system)),
    }
    out
}

/// Every child of the document node: doctype, comments and the root element.
struct WholeDocument<'a>(NodeRef<'a, Node>);

impl Serialize for WholeDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: &mut S, _: TraversalScope) -> io::Result<()> {
        for edge in self.0.traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Doctype(doctype) => serializer.write_doctype(&doctype_text(doctype))?,
                    Node::Comment(comment) => serializer.write_comment(comment)?,
                    Node::Text(text) => serializer.write_text(text)?,
                    Node::ProcessingInstruction(pi) => {
                        serializer.write_processing_instruction(&pi.target, &pi.data)?
                    }
                    Node::Element(el) => serializer.start_elem(
                        el.name.clone(),
                        el.attrs.iter().map(|(name, value)| (name, &value[..])),
                    )?,
                    Node::Document | Node::Fragment => {}
                },
                Edge::Close(node) => {
                    if let Node::Element(el) = node.value() {
                        serializer.end_elem(el.name.clone())?;
                    }
                }
            }
        }
        Ok(())
    }
}
