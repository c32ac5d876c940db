//! Field filling: re-locate each recorded control and write its state back.

use crate::dom::{Document, NodeId};
use crate::field::{FieldInfo, FieldKind};
use crate::selector::find_element;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Options for [`fill_fields`]
///
/// Defaults fire `input`/`change` events, allow fallback matching and
/// respect `disabled` and `readonly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FillOptions {
    /// Dispatch bubbling `input` then `change` after each write
    pub fire_events: bool,
    /// Fall back to name and id lookup when the selector misses
    pub fallback_match: bool,
    pub fill_readonly: bool,
    pub fill_disabled: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            fire_events: true,
            fallback_match: true,
            fill_readonly: false,
            fill_disabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Ok,
    Skip,
    Fail,
}

/// Why a field was skipped or failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FillReason {
    /// The record is a button input
    Button,
    /// Neither the selector nor the fallbacks found an element
    NotFound,
    Disabled,
    Readonly,
    /// The record had nothing to write
    FillFailed,
}

impl FillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FillReason::Button => "button",
            FillReason::NotFound => "not-found",
            FillReason::Disabled => "disabled",
            FillReason::Readonly => "readonly",
            FillReason::FillFailed => "fill-failed",
        }
    }
}

impl fmt::Display for FillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one input record. Results line up with the input list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    pub selector: String,
    pub status: FillStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FillReason>,
}

impl FillResult {
    pub fn ok(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            status: FillStatus::Ok,
            reason: None,
        }
    }

    pub fn skip(selector: impl Into<String>, reason: FillReason) -> Self {
        Self {
            selector: selector.into(),
            status: FillStatus::Skip,
            reason: Some(reason),
        }
    }

    pub fn fail(selector: impl Into<String>, reason: FillReason) -> Self {
        Self {
            selector: selector.into(),
            status: FillStatus::Fail,
            reason: Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FillStatus::Ok
    }
}

impl fmt::Display for FillResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            FillStatus::Ok => "ok",
            FillStatus::Skip => "skip",
            FillStatus::Fail => "fail",
        };
        write!(f, "{} {}", status, self.selector)?;
        if let Some(reason) = self.reason {
            write!(f, " ({})", reason)?;
        }
        Ok(())
    }
}

/// Counts over a result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSummary {
    pub filled: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FillSummary {
    pub fn from_results(results: &[FillResult]) -> Self {
        let mut summary = Self::default();
        for r in results {
            match r.status {
                FillStatus::Ok => summary.filled += 1,
                FillStatus::Skip => summary.skipped += 1,
                FillStatus::Fail => summary.failed += 1,
            }
        }
        summary
    }
}

impl fmt::Display for FillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "filled {}, skipped {}, failed {}",
            self.filled, self.skipped, self.failed
        )
    }
}

/// Dispatch bubbling `input` then `change` at `node`.
pub fn fire_events(doc: &mut Document, node: NodeId) {
    doc.dispatch_event(node, "input", true);
    doc.dispatch_event(node, "change", true);
}

/// Write the state recorded in `info` into `node`.
///
/// Selects and toggles always count as written, even when the recorded value
/// matches no option. Other controls fail when the record holds no value.
/// Values go through the native setter so a framework's patched setter never
/// sees them; the events that follow are what it reacts to.
pub fn fill_element(doc: &mut Document, node: NodeId, info: &FieldInfo, fire: bool) -> bool {
    match write_state(doc, node, info) {
        Ok(true) => {
            if fire {
                fire_events(doc, node);
            }
            true
        }
        Ok(false) => false,
        Err(err) => {
            log::debug!("write to {} failed: {}", info.selector, err);
            false
        }
    }
}

fn write_state(doc: &mut Document, node: NodeId, info: &FieldInfo) -> Result<bool> {
    if doc.tag_name(node) == Some("select") {
        match &info.kind {
            FieldKind::MultiSelect {
                selected_values, ..
            } => {
                let wanted: HashSet<&str> =
                    selected_values.iter().map(|v| v.value.as_str()).collect();
                for option in doc.options(node) {
                    let hit = wanted.contains(doc.option_value(option).as_str());
                    doc.set_selected(option, hit)?;
                }
            }
            _ => {
                if let Some(value) = info.value() {
                    doc.set_select_value(node, value)?;
                }
            }
        }
        return Ok(true);
    }

    if matches!(doc.input_type(node).as_deref(), Some("checkbox" | "radio")) {
        doc.set_checked(node, info.checked())?;
        return Ok(true);
    }

    match info.value() {
        Some(value) => {
            doc.set_value_native(node, value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Fill every record into `doc`, returning one result per record in input
/// order.
///
/// # Examples
///
/// ```
/// use formsnap::{fill_fields, Document, FieldInfo, FieldKind, FillOptions};
///
/// let mut doc = Document::parse(r#"<input id="email">"#);
/// let info = FieldInfo::new(
///     "#email",
///     "input",
///     FieldKind::Text { input_type: Some("email".into()), value: Some("a@b.c".into()) },
/// );
/// let results = fill_fields(&mut doc, &[info], &FillOptions::default());
/// assert!(results[0].is_ok());
/// let email = doc.get_element_by_id("email").unwrap();
/// assert_eq!(doc.value(email), "a@b.c");
/// ```
pub fn fill_fields(doc: &mut Document, fields: &[FieldInfo], opts: &FillOptions) -> Vec<FillResult> {
    let results: Vec<FillResult> = fields
        .iter()
        .map(|info| fill_one(doc, info, opts))
        .collect();
    log::debug!("{}", FillSummary::from_results(&results));
    results
}

fn fill_one(doc: &mut Document, info: &FieldInfo, opts: &FillOptions) -> FillResult {
    if info.is_button() {
        return FillResult::skip(&info.selector, FillReason::Button);
    }

    let Some(node) = find_element(doc, info, opts.fallback_match) else {
        log::debug!("{} not found", info.selector);
        return FillResult::fail(&info.selector, FillReason::NotFound);
    };

    if doc.disabled(node) && !opts.fill_disabled {
        return FillResult::skip(&info.selector, FillReason::Disabled);
    }
    if doc.read_only(node) && !opts.fill_readonly {
        return FillResult::skip(&info.selector, FillReason::Readonly);
    }

    if fill_element(doc, node, info, opts.fire_events) {
        log::trace!("filled {}", info.selector);
        FillResult::ok(&info.selector)
    } else {
        FillResult::fail(&info.selector, FillReason::FillFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SelectedValue;
    use std::sync::{Arc, Mutex};

    fn text(selector: &str, value: Option<&str>) -> FieldInfo {
        FieldInfo::new(
            selector,
            "input",
            FieldKind::Text {
                input_type: Some("text".into()),
                value: value.map(str::to_string),
            },
        )
    }

    fn by_id(doc: &Document, id: &str) -> NodeId {
        doc.get_element_by_id(id).expect("fixture element")
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let mut doc = Document::parse("<input>");
        assert!(fill_fields(&mut doc, &[], &FillOptions::default()).is_empty());
    }

    #[test]
    fn results_follow_input_order() {
        let mut doc = Document::parse(r#"<input id="a"><input id="b" disabled>"#);
        let submit = FieldInfo::new(
            "#go",
            "input",
            FieldKind::Button {
                input_type: "submit".into(),
                value: Some("Go".into()),
            },
        );
        let fields = vec![
            text("#missing", Some("x")),
            text("#a", Some("1")),
            submit,
            text("#b", Some("2")),
            text("#a", None),
        ];
        let results = fill_fields(&mut doc, &fields, &FillOptions::default());
        assert_eq!(
            results,
            vec![
                FillResult::fail("#missing", FillReason::NotFound),
                FillResult::ok("#a"),
                FillResult::skip("#go", FillReason::Button),
                FillResult::skip("#b", FillReason::Disabled),
                FillResult::fail("#a", FillReason::FillFailed),
            ]
        );
        assert_eq!(
            FillSummary::from_results(&results).to_string(),
            "filled 1, skipped 2, failed 2"
        );
    }

    #[test]
    fn submit_is_skipped_whatever_the_options() {
        let mut doc = Document::parse(r#"<input type="submit" id="go" value="Go">"#);
        let mut info = text("#go", Some("Go"));
        info.kind = FieldKind::Button {
            input_type: "submit".into(),
            value: Some("Go".into()),
        };
        let opts = FillOptions {
            fill_disabled: true,
            fill_readonly: true,
            ..Default::default()
        };
        let results = fill_fields(&mut doc, &[info], &opts);
        assert_eq!(results[0], FillResult::skip("#go", FillReason::Button));
    }

    #[test]
    fn not_found_without_fallback() {
        let mut doc = Document::parse(r#"<input name="q" id="q">"#);
        let mut info = text("#nothing", Some("x"));
        info.name = Some("q".into());
        let opts = FillOptions {
            fallback_match: false,
            ..Default::default()
        };
        assert_eq!(
            fill_fields(&mut doc, &[info.clone()], &opts)[0],
            FillResult::fail("#nothing", FillReason::NotFound)
        );
        // with fallback the name lookup succeeds
        assert!(fill_fields(&mut doc, &[info], &FillOptions::default())[0].is_ok());
        assert_eq!(doc.value(by_id(&doc, "q")), "x");
    }

    #[test]
    fn policy_guards_can_be_overridden() {
        let mut doc = Document::parse(r#"<input id="d" disabled><input id="r" readonly>"#);
        let fields = [text("#d", Some("1")), text("#r", Some("2"))];

        let results = fill_fields(&mut doc, &fields, &FillOptions::default());
        assert_eq!(results[0].reason, Some(FillReason::Disabled));
        assert_eq!(results[1].reason, Some(FillReason::Readonly));
        assert_eq!(results[1].to_string(), "skip #r (readonly)");
        assert_eq!(doc.value(by_id(&doc, "d")), "");

        let opts = FillOptions {
            fill_disabled: true,
            fill_readonly: true,
            ..Default::default()
        };
        let results = fill_fields(&mut doc, &fields, &opts);
        assert!(results.iter().all(FillResult::is_ok));
        assert_eq!(doc.value(by_id(&doc, "d")), "1");
        assert_eq!(doc.value(by_id(&doc, "r")), "2");
    }

    #[test]
    fn multi_select_selection_is_replaced() {
        let mut doc = Document::parse(
            r#"<select id="m" multiple><option value="a" selected>A</option><option value="b">B</option><option value="c">C</option><option value="d" selected>D</option></select>"#,
        );
        let info = FieldInfo::new(
            "#m",
            "select",
            FieldKind::MultiSelect {
                selected_values: vec![
                    SelectedValue {
                        value: "b".into(),
                        text: String::new(),
                    },
                    SelectedValue {
                        value: "c".into(),
                        text: String::new(),
                    },
                ],
                options: None,
            },
        );
        assert!(fill_fields(&mut doc, &[info], &FillOptions::default())[0].is_ok());

        let m = by_id(&doc, "m");
        let selected: Vec<String> = doc
            .selected_options(m)
            .into_iter()
            .map(|o| doc.option_value(o))
            .collect();
        assert_eq!(selected, vec!["b", "c"]);
    }

    #[test]
    fn select_value_without_match_still_succeeds() {
        let mut doc = Document::parse(
            r#"<select id="s"><option value="a">A</option><option value="b">B</option></select>"#,
        );
        let info = FieldInfo::new(
            "#s",
            "select",
            FieldKind::Select {
                value: Some("zzz".into()),
                selected_text: None,
                options: None,
            },
        );
        assert!(fill_fields(&mut doc, &[info], &FillOptions::default())[0].is_ok());
        assert_eq!(doc.value(by_id(&doc, "s")), "");
    }

    #[test]
    fn toggles_take_recorded_checkedness() {
        let mut doc = Document::parse(
            r#"<input type="checkbox" id="c" checked><input type="radio" name="g" id="r1" checked><input type="radio" name="g" id="r2">"#,
        );
        let unchecked = FieldInfo::new(
            "#c",
            "input",
            FieldKind::Checkbox {
                value: Some("on".into()),
                checked: false,
            },
        );
        let pick = FieldInfo::new(
            "#r2",
            "input",
            FieldKind::Radio {
                value: Some("on".into()),
                checked: true,
                group_selected_value: Some("on".into()),
            },
        );
        // a text record against a checkbox unchecks it
        let stray = text("#c", Some("on"));
        let results = fill_fields(&mut doc, &[unchecked, pick, stray], &FillOptions::default());
        assert!(results.iter().all(FillResult::is_ok));
        assert!(!doc.checked(by_id(&doc, "c")));
        assert!(!doc.checked(by_id(&doc, "r1")));
        assert!(doc.checked(by_id(&doc, "r2")));
    }

    #[test]
    fn events_fire_after_write_and_only_when_asked() {
        let mut doc = Document::parse(r#"<form id="f"><input id="a"></form>"#);
        let form = by_id(&doc, "f");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        doc.add_event_listener(form, "input", move |doc, ev| {
            sink.lock().unwrap().push(doc.value(ev.target));
        });

        let quiet = FillOptions {
            fire_events: false,
            ..Default::default()
        };
        fill_fields(&mut doc, &[text("#a", Some("first"))], &quiet);
        assert!(doc.event_log().is_empty());

        fill_fields(&mut doc, &[text("#a", Some("second"))], &FillOptions::default());
        let types: Vec<&str> = doc
            .event_log()
            .iter()
            .map(|e| e.event_type.as_str())
            .collect();
        assert_eq!(types, vec!["input", "change"]);
        assert!(doc.event_log().iter().all(|e| e.bubbles));
        assert_eq!(*seen.lock().unwrap(), vec!["second".to_string()]);
    }

    #[test]
    fn framework_value_tracker_sees_native_writes() {
        // A tracker that mirrors what the framework last assigned, and a
        // delegated listener that reports a change only when the live value
        // differs from the tracked one.
        let mut doc = Document::parse(r#"<input id="name">"#);
        let input = by_id(&doc, "name");
        let tracked = Arc::new(Mutex::new(String::new()));
        let changes = Arc::new(Mutex::new(Vec::new()));

        let t = tracked.clone();
        doc.intercept_value_setter(input, move |v| *t.lock().unwrap() = v.to_string());
        let (t, c) = (tracked.clone(), changes.clone());
        doc.add_event_listener(doc.root(), "input", move |doc, ev| {
            let live = doc.value(ev.target);
            let mut last = t.lock().unwrap();
            if *last != live {
                *last = live.clone();
                c.lock().unwrap().push(live);
            }
        });

        fill_fields(&mut doc, &[text("#name", Some("Ada"))], &FillOptions::default());
        assert_eq!(*changes.lock().unwrap(), vec!["Ada".to_string()]);

        // an ordinary assignment updates the tracker, so the event is a no-op
        doc.assign_value(input, "Grace").unwrap();
        fire_events(&mut doc, input);
        assert_eq!(changes.lock().unwrap().len(), 1);
    }

    #[test]
    fn wire_spelling() {
        let r = FillResult::fail("#x", FillReason::NotFound);
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            serde_json::json!({"selector": "#x", "status": "fail", "reason": "not-found"})
        );
        let ok = serde_json::to_value(FillResult::ok("#y")).unwrap();
        assert!(ok.get("reason").is_none());

        let opts: FillOptions = serde_json::from_str(r#"{"fillReadonly": true}"#).unwrap();
        assert!(opts.fire_events && opts.fallback_match && opts.fill_readonly);
    }
}
