//! Field records: the snapshot of one form control.
//!
//! In memory a record is a set of shared attributes plus a [`FieldKind`]
//! that only admits the payload fields legal for that kind of control. On
//! the wire it is one flat camelCase JSON object, compatible with records
//! produced by any collector shell:
//!
//! ```json
//! { "selector": "#plan", "tag": "select", "visible": true,
//!   "multiple": false, "value": "pro", "selectedText": "Pro" }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Input types that never carry form data.
pub const BUTTON_TYPES: [&str; 4] = ["button", "submit", "reset", "image"];

pub fn is_button_type(input_type: &str) -> bool {
    BUTTON_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(input_type))
}

/// One selected option of a multi-select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedValue {
    pub value: String,
    #[serde(default)]
    pub text: String,
}

/// One entry of a select's option catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub selected: bool,
}

/// Kind-specific payload of a [`FieldInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Text-like input, textarea, or anything else holding a plain value
    Text {
        input_type: Option<String>,
        value: Option<String>,
    },
    /// `button|submit|reset|image` input; never filled
    Button {
        input_type: String,
        value: Option<String>,
    },
    Checkbox {
        value: Option<String>,
        checked: bool,
    },
    Radio {
        value: Option<String>,
        checked: bool,
        /// Value of the checked radio in the same group, if any
        group_selected_value: Option<String>,
    },
    Select {
        value: Option<String>,
        selected_text: Option<String>,
        options: Option<Vec<SelectOption>>,
    },
    MultiSelect {
        selected_values: Vec<SelectedValue>,
        options: Option<Vec<SelectOption>>,
    },
}

/// Snapshot of one form control. Holds no reference to the live document;
/// `selector` is the only link back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireField", into = "WireField")]
pub struct FieldInfo {
    pub selector: String,
    /// Lowercase tag name
    pub tag: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub disabled: bool,
    pub read_only: bool,
    pub required: bool,
    /// Visibility at collection time
    pub visible: bool,
    pub kind: FieldKind,
}

impl FieldInfo {
    /// A visible, enabled record with no name or id.
    pub fn new(selector: impl Into<String>, tag: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            selector: selector.into(),
            tag: tag.into(),
            name: None,
            id: None,
            disabled: false,
            read_only: false,
            required: false,
            visible: true,
            kind,
        }
    }

    pub fn input_type(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Text { input_type, .. } => input_type.as_deref(),
            FieldKind::Button { input_type, .. } => Some(input_type),
            FieldKind::Checkbox { .. } => Some("checkbox"),
            FieldKind::Radio { .. } => Some("radio"),
            FieldKind::Select { .. } | FieldKind::MultiSelect { .. } => None,
        }
    }

    pub fn is_button(&self) -> bool {
        self.input_type().map_or(false, is_button_type)
    }

    /// The scalar value, for kinds that record one.
    pub fn value(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Text { value, .. }
            | FieldKind::Button { value, .. }
            | FieldKind::Checkbox { value, .. }
            | FieldKind::Radio { value, .. }
            | FieldKind::Select { value, .. } => value.as_deref(),
            FieldKind::MultiSelect { .. } => None,
        }
    }

    /// Recorded checkedness; `false` for kinds without one.
    pub fn checked(&self) -> bool {
        match &self.kind {
            FieldKind::Checkbox { checked, .. } | FieldKind::Radio { checked, .. } => *checked,
            _ => false,
        }
    }

    pub fn selected_values(&self) -> Option<&[SelectedValue]> {
        match &self.kind {
            FieldKind::MultiSelect {
                selected_values, ..
            } => Some(selected_values),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[SelectOption]> {
        match &self.kind {
            FieldKind::Select { options, .. } | FieldKind::MultiSelect { options, .. } => {
                options.as_deref()
            }
            _ => None,
        }
    }
}

/// Encode records as pretty-printed JSON (2-space indent).
pub fn to_json_pretty(fields: &[FieldInfo]) -> Result<String> {
    Ok(serde_json::to_string_pretty(fields)?)
}

/// Decode a JSON array of records. Anything other than an array is rejected
/// before individual records are looked at.
pub fn from_json(text: &str) -> Result<Vec<FieldInfo>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_array() {
        return Err(Error::Serialization(
            "field data must be a JSON array".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

// Flat wire shape. Key order follows what collectors emit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireField {
    selector: String,
    #[serde(default)]
    tag: String,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    input_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    disabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    read_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    multiple: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_values: Option<Vec<SelectedValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<SelectOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checked: Option<bool>,
    // Outer None: key absent. Some(None): explicit null.
    #[serde(
        default,
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    group_selected_value: Option<Option<String>>,
}

fn default_visible() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn explicit_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

enum Shape {
    Button,
    Select,
    MultiSelect,
    Radio,
    Checkbox,
    Text,
}

impl From<WireField> for FieldInfo {
    fn from(w: WireField) -> Self {
        let tag = w.tag.to_ascii_lowercase();
        let input_type = w.input_type.map(|t| t.to_ascii_lowercase());

        let shape = match input_type.as_deref() {
            Some(t) if is_button_type(t) => Shape::Button,
            _ if tag == "select" => {
                if w.multiple == Some(true) && w.selected_values.is_some() {
                    Shape::MultiSelect
                } else {
                    Shape::Select
                }
            }
            Some("radio") => Shape::Radio,
            Some("checkbox") => Shape::Checkbox,
            _ if w.checked.is_some() => Shape::Checkbox,
            _ => Shape::Text,
        };

        let checked = w.checked.unwrap_or(false);
        let kind = match shape {
            Shape::Button => FieldKind::Button {
                input_type: input_type.unwrap_or_default(),
                value: w.value,
            },
            Shape::Select => FieldKind::Select {
                value: w.value,
                selected_text: w.selected_text,
                options: w.options,
            },
            Shape::MultiSelect => FieldKind::MultiSelect {
                selected_values: w.selected_values.unwrap_or_default(),
                options: w.options,
            },
            Shape::Radio => FieldKind::Radio {
                value: w.value,
                checked,
                group_selected_value: w.group_selected_value.flatten(),
            },
            Shape::Checkbox => FieldKind::Checkbox {
                value: w.value,
                checked,
            },
            Shape::Text => FieldKind::Text {
                input_type,
                value: w.value,
            },
        };

        FieldInfo {
            selector: w.selector,
            tag,
            name: w.name,
            id: w.id,
            disabled: w.disabled,
            read_only: w.read_only,
            required: w.required,
            visible: w.visible,
            kind,
        }
    }
}

impl From<FieldInfo> for WireField {
    fn from(info: FieldInfo) -> Self {
        let mut w = WireField {
            selector: info.selector,
            tag: info.tag,
            visible: info.visible,
            name: info.name,
            id: info.id,
            disabled: info.disabled,
            read_only: info.read_only,
            required: info.required,
            ..Default::default()
        };
        match info.kind {
            FieldKind::Text { input_type, value } => {
                w.input_type = input_type;
                w.value = value;
            }
            FieldKind::Button { input_type, value } => {
                w.input_type = Some(input_type);
                w.value = value;
            }
            FieldKind::Checkbox { value, checked } => {
                w.input_type = Some("checkbox".to_string());
                w.value = value;
                w.checked = Some(checked);
            }
            FieldKind::Radio {
                value,
                checked,
                group_selected_value,
            } => {
                w.input_type = Some("radio".to_string());
                w.value = value;
                w.checked = Some(checked);
                w.group_selected_value = Some(group_selected_value);
            }
            FieldKind::Select {
                value,
                selected_text,
                options,
            } => {
                w.multiple = Some(false);
                w.value = value;
                w.selected_text = selected_text;
                w.options = options;
            }
            FieldKind::MultiSelect {
                selected_values,
                options,
            } => {
                w.multiple = Some(true);
                w.selected_values = Some(selected_values);
                w.options = options;
            }
        }
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> FieldInfo {
        serde_json::from_value(value).expect("decode field")
    }

    #[test]
    fn minimal_text_record_decodes() {
        let info = decode(json!({"selector": "input", "tag": "input", "visible": true, "value": "hello"}));
        assert_eq!(
            info.kind,
            FieldKind::Text {
                input_type: None,
                value: Some("hello".into())
            }
        );
        assert_eq!(info.value(), Some("hello"));
        assert!(!info.is_button());
    }

    #[test]
    fn checked_without_type_decodes_as_toggle() {
        let info = decode(json!({"selector": "input", "tag": "input", "visible": true, "checked": true}));
        assert!(info.checked());
        assert!(matches!(info.kind, FieldKind::Checkbox { .. }));
    }

    #[test]
    fn button_type_wins_over_tag() {
        let info = decode(json!({"selector": "x", "tag": "input", "type": "SUBMIT", "visible": true}));
        assert!(info.is_button());
        assert_eq!(info.input_type(), Some("submit"));
    }

    #[test]
    fn multi_select_values_may_omit_text() {
        let info = decode(json!({
            "selector": "#m", "tag": "select", "visible": true,
            "multiple": true, "selectedValues": [{"value": "b"}, {"value": "c"}]
        }));
        let values = info.selected_values().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].text, "");
    }

    #[test]
    fn multiple_without_selected_values_falls_back_to_value() {
        let info = decode(json!({"selector": "#m", "tag": "select", "visible": true, "multiple": true, "value": "a"}));
        assert_eq!(info.selected_values(), None);
        assert_eq!(info.value(), Some("a"));
    }

    #[test]
    fn wire_shape_is_flat_and_compact() {
        let mut info = FieldInfo::new(
            "#r2",
            "input",
            FieldKind::Radio {
                value: Some("green".into()),
                checked: false,
                group_selected_value: None,
            },
        );
        info.name = Some("color".into());
        info.required = true;

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(
            value,
            json!({
                "selector": "#r2", "tag": "input", "visible": true, "type": "radio",
                "name": "color", "required": true, "value": "green", "checked": false,
                "groupSelectedValue": null
            })
        );
        assert_eq!(decode(value), info);
    }

    #[test]
    fn select_record_keeps_catalogue() {
        let info = decode(json!({
            "selector": "#s", "tag": "select", "visible": true, "multiple": false,
            "value": "b", "selectedText": "Bee",
            "options": [{"value": "a", "text": "A", "selected": false}, {"value": "b", "text": "Bee", "selected": true}]
        }));
        assert_eq!(info.options().map(<[_]>::len), Some(2));
        let back = serde_json::to_value(&info).unwrap();
        assert_eq!(back["selectedText"], "Bee");
        assert_eq!(back["multiple"], false);
    }

    #[test]
    fn from_json_rejects_non_arrays() {
        assert!(matches!(
            from_json(r#"{"selector": "x"}"#),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(from_json("not json"), Err(Error::Serialization(_))));
        assert!(from_json("[]").unwrap().is_empty());
    }

    #[test]
    fn pretty_json_uses_two_space_indent() {
        let info = FieldInfo::new(
            "#a",
            "textarea",
            FieldKind::Text {
                input_type: None,
                value: Some("x".into()),
            },
        );
        let text = to_json_pretty(&[info]).unwrap();
        assert!(text.starts_with("[\n  {\n    \"selector\": \"#a\""));
    }
}
