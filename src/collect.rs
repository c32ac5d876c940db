//! Field collection: enumerate controls, filter them, snapshot the rest.

use crate::dom::{Document, NodeId, StyleCache};
use crate::field::{self, FieldInfo, FieldKind, SelectOption, SelectedValue};
use crate::selector::{css_escape, get_selector};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Options for [`collect_fields`]
///
/// Every flag defaults to `false`, which keeps only visible, editable,
/// non-empty data controls.
///
/// # Examples
///
/// ```
/// let opts = formsnap::CollectOptions {
///     include_empty: true,
///     ..Default::default()
/// };
/// assert!(!opts.include_hidden);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectOptions {
    /// Keep controls hidden by `type="hidden"`, `display` or `visibility`
    pub include_hidden: bool,
    /// Keep disabled and read-only controls
    pub include_disabled: bool,
    /// Keep `button|submit|reset|image` inputs
    pub include_buttons: bool,
    /// Keep controls with no value or selection
    pub include_empty: bool,
    /// Attach the full option list to select records
    pub include_options: bool,
}

/// Hidden inputs are never visible. Anything else is visible unless it or
/// an ancestor computes to `display: none` or `visibility: hidden`.
pub fn is_visible(doc: &Document, node: NodeId) -> bool {
    visible_with(&mut StyleCache::new(doc), doc, node)
}

fn visible_with(styles: &mut StyleCache<'_>, doc: &Document, node: NodeId) -> bool {
    let hidden_type = doc
        .attr(node, "type")
        .map_or(false, |t| t.trim().eq_ignore_ascii_case("hidden"));
    !hidden_type && !styles.hidden_in_tree(node)
}

pub fn is_editable(doc: &Document, node: NodeId) -> bool {
    !doc.disabled(node) && !doc.read_only(node)
}

pub fn is_button_type(doc: &Document, node: NodeId) -> bool {
    doc.input_type(node)
        .map_or(false, |t| field::is_button_type(&t))
}

/// Unchecked toggles, selects with nothing selected and controls with an
/// empty value are empty.
pub fn is_empty(doc: &Document, node: NodeId) -> bool {
    if doc.tag_name(node) == Some("select") {
        if doc.multiple(node) {
            return doc.selected_options(node).is_empty();
        }
        return doc.value(node).is_empty();
    }
    match doc.input_type(node).as_deref() {
        Some("checkbox" | "radio") => !doc.checked(node),
        _ => doc.value(node).is_empty(),
    }
}

/// Snapshot one control.
pub fn extract_info(doc: &Document, node: NodeId, include_options: bool) -> FieldInfo {
    snapshot(doc, node, is_visible(doc, node), include_options)
}

fn snapshot(doc: &Document, node: NodeId, visible: bool, include_options: bool) -> FieldInfo {
    let tag = doc.tag_name(node).unwrap_or_default().to_string();
    let input_type = doc.input_type(node);

    let kind = if tag == "select" {
        select_kind(doc, node, include_options)
    } else {
        match input_type.as_deref() {
            Some("checkbox") => FieldKind::Checkbox {
                value: Some(doc.value(node)),
                checked: doc.checked(node),
            },
            Some("radio") => FieldKind::Radio {
                value: Some(doc.value(node)),
                checked: doc.checked(node),
                group_selected_value: group_selected_value(doc, node),
            },
            Some(t) if field::is_button_type(t) => FieldKind::Button {
                input_type: t.to_string(),
                value: Some(doc.value(node)),
            },
            _ => FieldKind::Text {
                input_type,
                value: Some(doc.value(node)),
            },
        }
    };

    FieldInfo {
        selector: get_selector(doc, node),
        tag,
        name: doc
            .attr(node, "name")
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        id: doc.id_attr(node).map(str::to_string),
        disabled: doc.disabled(node),
        read_only: doc.read_only(node),
        required: doc.required(node),
        visible,
        kind,
    }
}

fn select_kind(doc: &Document, select: NodeId, include_options: bool) -> FieldKind {
    let options = include_options.then(|| {
        doc.options(select)
            .into_iter()
            .map(|opt| SelectOption {
                value: doc.option_value(opt),
                text: doc.option_text(opt),
                selected: doc.selected(opt),
            })
            .collect()
    });

    if doc.multiple(select) {
        let selected_values = doc
            .selected_options(select)
            .into_iter()
            .map(|opt| SelectedValue {
                value: doc.option_value(opt),
                text: doc.option_text(opt),
            })
            .collect();
        return FieldKind::MultiSelect {
            selected_values,
            options,
        };
    }

    let selected_text = doc
        .selected_index(select)
        .and_then(|i| doc.options(select).get(i).copied())
        .map(|opt| doc.option_text(opt))
        .unwrap_or_default();
    FieldKind::Select {
        value: Some(doc.value(select)),
        selected_text: Some(selected_text),
        options,
    }
}

// The group is looked up by name across the whole document, whatever root
// the collection was scoped to.
fn group_selected_value(doc: &Document, radio: NodeId) -> Option<String> {
    let name = match doc.attr(radio, "name") {
        Some(name) if !name.is_empty() => name,
        _ => return doc.checked(radio).then(|| doc.value(radio)),
    };
    let selector = format!("input[name=\"{}\"]", css_escape(name));
    let members = match doc.query_selector_all(&selector) {
        Ok(found) => found,
        Err(err) => {
            log::debug!("radio group lookup failed: {}", err);
            return None;
        }
    };
    members
        .into_iter()
        .filter(|n| doc.input_type(*n).as_deref() == Some("radio"))
        .find(|n| doc.checked(*n))
        .map(|n| doc.value(n))
}

/// Collect every kept control in the document, in document order.
///
/// # Examples
///
/// ```
/// use formsnap::{collect_fields, CollectOptions, Document};
///
/// let doc = Document::parse(r#"<form><input id="a" value="hello"><input type="hidden" value="t"></form>"#);
/// let fields = collect_fields(&doc, &CollectOptions::default());
/// assert_eq!(fields.len(), 1);
/// assert_eq!(fields[0].value(), Some("hello"));
/// ```
pub fn collect_fields(doc: &Document, opts: &CollectOptions) -> Vec<FieldInfo> {
    // the document node always exists, so this cannot fail
    collect_fields_within(doc, doc.root(), opts).unwrap_or_default()
}

/// Like [`collect_fields`], but only for controls below `root`.
pub fn collect_fields_within(
    doc: &Document,
    root: NodeId,
    opts: &CollectOptions,
) -> Result<Vec<FieldInfo>> {
    let controls = doc.form_controls(root)?;
    let total = controls.len();

    let mut styles = StyleCache::new(doc);
    let mut fields = Vec::new();
    for node in controls {
        let visible = visible_with(&mut styles, doc, node);
        if let Some(reason) = exclusion(doc, node, visible, opts) {
            log::trace!("skipping {}: {}", get_selector(doc, node), reason);
            continue;
        }
        let info = snapshot(doc, node, visible, opts.include_options);
        log::trace!("collected {}", info.selector);
        fields.push(info);
    }

    log::debug!("collected {} of {} controls", fields.len(), total);
    Ok(fields)
}

fn exclusion(
    doc: &Document,
    node: NodeId,
    visible: bool,
    opts: &CollectOptions,
) -> Option<&'static str> {
    if !opts.include_buttons && is_button_type(doc, node) {
        return Some("button");
    }
    if !opts.include_hidden && !visible {
        return Some("hidden");
    }
    if !opts.include_disabled && !is_editable(doc, node) {
        return Some("not editable");
    }
    if !opts.include_empty && is_empty(doc, node) {
        return Some("empty");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.get_element_by_id(id).expect("fixture element")
    }

    #[test]
    fn hidden_input_is_dropped_by_default() {
        let doc = Document::parse(
            r#"<form><input type="text" value="hello"><input type="hidden" name="csrf" value="t"></form>"#,
        );
        let fields = collect_fields(&doc, &CollectOptions::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value(), Some("hello"));
        assert_eq!(fields[0].input_type(), Some("text"));

        let all = collect_fields(
            &doc,
            &CollectOptions {
                include_hidden: true,
                ..Default::default()
            },
        );
        assert_eq!(all.len(), 2);
        assert!(!all[1].visible);
    }

    #[test]
    fn visibility_follows_ancestors_and_styles() {
        let doc = Document::parse(
            r#"<style>.gone { display: none } .ghost { visibility: hidden }</style>
               <div class="gone"><input id="a"></div>
               <div class="ghost"><p><input id="b"></p></div>
               <div style="opacity: 0; position: absolute; left: -9999px"><input id="c"></div>
               <div hidden><input id="d"></div>
               <input id="e" type="HIDDEN">"#,
        );
        assert!(!is_visible(&doc, by_id(&doc, "a")));
        assert!(!is_visible(&doc, by_id(&doc, "b")));
        assert!(is_visible(&doc, by_id(&doc, "c")));
        assert!(!is_visible(&doc, by_id(&doc, "d")));
        assert!(!is_visible(&doc, by_id(&doc, "e")));
    }

    #[test]
    fn specificity_decides_visibility() {
        let doc = Document::parse(
            r#"<style>div:not(#z){display:none} .show.x{display:block}</style>
               <div class="show x"><input value=1></div>"#,
        );
        assert!(collect_fields(&doc, &CollectOptions::default()).is_empty());
    }

    #[test]
    fn screen_media_rules_hide_controls() {
        let doc = Document::parse(
            r#"<style>@media screen { .honeypot { display:none } } @media print { .q { display:none } }</style>
               <form><input name="q" class="q" value="rust"><input name="website" class="honeypot" value="spam"></form>"#,
        );
        let names: Vec<_> = collect_fields(&doc, &CollectOptions::default())
            .into_iter()
            .filter_map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["q"]);
    }

    #[test]
    fn deep_trees_with_large_sheets_collect_consistently() {
        let mut css = String::new();
        for i in 0..500 {
            css.push_str(&format!(".r{} > .n{} {{ display: block }}\n", i, i % 20));
        }
        css.push_str(".n19.off { visibility: hidden }");

        let mut body = String::new();
        for row in 0..200 {
            for depth in 0..20 {
                let off = if row % 10 == 0 && depth == 19 { " off" } else { "" };
                body.push_str(&format!(r#"<div class="n{}{}">"#, depth, off));
            }
            body.push_str(&format!(r#"<input name="f{}" value="v">"#, row));
            body.push_str(&"</div>".repeat(20));
        }
        let doc = Document::parse(&format!("<style>{}</style><form>{}</form>", css, body));

        let fields = collect_fields(&doc, &CollectOptions::default());
        assert_eq!(fields.len(), 180);
        assert!(fields.iter().all(|f| f.visible));

        let all = collect_fields(
            &doc,
            &CollectOptions {
                include_hidden: true,
                ..Default::default()
            },
        );
        assert_eq!(all.len(), 200);
        let first = doc.query_selector("input").unwrap().unwrap();
        assert!(!all[0].visible);
        assert_eq!(all[0].visible, is_visible(&doc, first));
        assert_eq!(all[0], extract_info(&doc, first, false));
    }

    #[test]
    fn radio_records_carry_group_selection() {
        let doc = Document::parse(
            r#"<form>
                 <input type="radio" name="color" value="red">
                 <input type="radio" name="color" value="green" checked>
                 <input type="radio" name="color" value="blue">
               </form>"#,
        );
        let radios = doc.query_selector_all("input").unwrap();
        for radio in radios {
            let info = extract_info(&doc, radio, false);
            match info.kind {
                FieldKind::Radio {
                    group_selected_value,
                    ..
                } => assert_eq!(group_selected_value.as_deref(), Some("green")),
                other => panic!("expected radio, got {:?}", other),
            }
        }

        // unchecked radios are empty, so only the checked one is kept
        let fields = collect_fields(&doc, &CollectOptions::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].value(), Some("green"));
    }

    #[test]
    fn only_the_last_checked_radio_is_collected() {
        let doc = Document::parse(
            r#"<form><input type="radio" name="g" value="a" checked><input type="radio" name="g" value="b" checked></form>"#,
        );
        let fields = collect_fields(&doc, &CollectOptions::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields[0].kind,
            FieldKind::Radio {
                value: Some("b".into()),
                checked: true,
                group_selected_value: Some("b".into()),
            }
        );
    }

    #[test]
    fn group_lookup_escapes_name_and_ignores_scope() {
        let doc = Document::parse(
            r#"<div id="one"><input type="radio" name="pick[x]" value="a" id="r1"></div>
               <div id="two"><input type="radio" name="pick[x]" value="b" checked></div>"#,
        );
        let scoped = collect_fields_within(
            &doc,
            by_id(&doc, "one"),
            &CollectOptions {
                include_empty: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(
            scoped[0].kind,
            FieldKind::Radio {
                value: Some("a".into()),
                checked: false,
                group_selected_value: Some("b".into()),
            }
        );
    }

    #[test]
    fn nameless_radio_is_its_own_group() {
        let doc = Document::parse(r#"<input type="radio" id="a" value="x" checked><input type="radio" id="b" value="y">"#);
        let a = extract_info(&doc, by_id(&doc, "a"), false);
        let b = extract_info(&doc, by_id(&doc, "b"), false);
        assert!(matches!(a.kind, FieldKind::Radio { group_selected_value: Some(ref v), .. } if v == "x"));
        assert!(matches!(b.kind, FieldKind::Radio { group_selected_value: None, .. }));
    }

    #[test]
    fn buttons_are_opt_in() {
        let doc = Document::parse(
            r#"<form><input name="q" value="rust"><input type="submit" value="Go"><input type="reset" value="Clear"><input type="image" src="x.png" alt="go"><input type="button" value="B"></form>"#,
        );
        assert_eq!(collect_fields(&doc, &CollectOptions::default()).len(), 1);

        let with_buttons = collect_fields(
            &doc,
            &CollectOptions {
                include_buttons: true,
                include_empty: true,
                ..Default::default()
            },
        );
        assert_eq!(with_buttons.len(), 5);
        assert!(with_buttons[1..].iter().all(FieldInfo::is_button));
    }

    #[test]
    fn emptiness_filter() {
        let doc = Document::parse(
            r#"<input id="t"><input id="c" type="checkbox"><textarea id="a"></textarea>
               <select id="m" multiple><option>a</option></select>
               <select id="s"><option value="">Pick one</option><option value="x">X</option></select>"#,
        );
        for id in ["t", "c", "a", "m", "s"] {
            assert!(is_empty(&doc, by_id(&doc, id)), "{} should be empty", id);
        }
        assert!(collect_fields(&doc, &CollectOptions::default()).is_empty());
        let all = collect_fields(
            &doc,
            &CollectOptions {
                include_empty: true,
                ..Default::default()
            },
        );
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].value(), Some(""));
    }

    #[test]
    fn disabled_and_readonly_are_excluded_by_default() {
        let doc = Document::parse(
            r#"<input id="a" value="1" disabled><input id="b" value="2" readonly><input id="c" value="3">"#,
        );
        let fields = collect_fields(&doc, &CollectOptions::default());
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].selector, "#c");

        let all = collect_fields(
            &doc,
            &CollectOptions {
                include_disabled: true,
                ..Default::default()
            },
        );
        assert_eq!(all.len(), 3);
        assert!(all[0].disabled);
        assert!(all[1].read_only);
    }

    #[test]
    fn select_records() {
        let doc = Document::parse(
            r#"<select id="plan" name="plan"><option value="free">Free</option><option value="pro" selected>  Pro
               plan </option></select>
               <select id="tags" multiple><option value="a" selected>A</option><option value="b">B</option><option value="c" selected>C</option></select>"#,
        );
        let plan = extract_info(&doc, by_id(&doc, "plan"), true);
        assert_eq!(plan.input_type(), None);
        match &plan.kind {
            FieldKind::Select {
                value,
                selected_text,
                options,
            } => {
                assert_eq!(value.as_deref(), Some("pro"));
                assert_eq!(selected_text.as_deref(), Some("Pro plan"));
                let options = options.as_ref().unwrap();
                assert_eq!(options.len(), 2);
                assert!(!options[0].selected && options[1].selected);
            }
            other => panic!("expected select, got {:?}", other),
        }

        let tags = extract_info(&doc, by_id(&doc, "tags"), false);
        let values: Vec<_> = tags
            .selected_values()
            .unwrap()
            .iter()
            .map(|v| v.value.as_str())
            .collect();
        assert_eq!(values, vec!["a", "c"]);
        assert_eq!(tags.options(), None);
    }

    #[test]
    fn records_are_compact() {
        let doc = Document::parse(r#"<input name="" id="" value="v" required>"#);
        let fields = collect_fields(&doc, &CollectOptions::default());
        let json = serde_json::to_value(&fields[0]).unwrap();
        assert!(json.get("name").is_none());
        assert!(json.get("id").is_none());
        assert!(json.get("disabled").is_none());
        assert_eq!(json["required"], true);
        assert_eq!(json["type"], "text");
    }

    #[test]
    fn options_deserialize_from_partial_camel_case() {
        let opts: CollectOptions = serde_json::from_str(r#"{"includeHidden": true}"#).unwrap();
        assert!(opts.include_hidden);
        assert!(!opts.include_options);
    }
}
