//! formsnap
//!
//! Snapshot the state of an HTML page's form controls into portable field
//! records and fill those records back into the same page, a reloaded copy
//! of it, or a structurally similar one.
//!
//! # Features
//!
//! - **Collection**: visibility, editability, button and emptiness filters
//!   over `input`, `select` and `textarea`, each kept control becoming a
//!   [`FieldInfo`] with a stable selector
//! - **Filling**: selector re-resolution with name/id fallback, disabled and
//!   readonly guards, native value writes followed by `input`/`change`
//!   events
//! - **Fetching** (default feature `fetch`): load a page and its linked
//!   stylesheets over HTTP
//!
//! # Example
//!
//! ```
//! use formsnap::{collect_fields, fill_fields, CollectOptions, Document, FillOptions};
//!
//! # fn main() -> formsnap::Result<()> {
//! let page = r#"<form><input id="email" value="ada@example.com"><input type="submit"></form>"#;
//!
//! let source = Document::parse(page);
//! let json = formsnap::to_json_pretty(&collect_fields(&source, &CollectOptions::default()))?;
//!
//! let mut target = Document::parse(&page.replace("ada@example.com", ""));
//! let fields = formsnap::from_json(&json)?;
//! let results = fill_fields(&mut target, &fields, &FillOptions::default());
//! assert!(results.iter().all(|r| r.is_ok()));
//!
//! let email = target.get_element_by_id("email").unwrap();
//! assert_eq!(target.value(email), "ada@example.com");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// In-memory document: parsed markup, live control state, styles, events
pub mod dom;

pub mod selector;

// Field record schema and its JSON wire mapping
pub mod field;

pub mod collect;
pub mod fill;

pub use collect::{collect_fields, collect_fields_within, extract_info, CollectOptions};
pub use dom::{Document, DomEvent, LoadConfig, NodeId};
pub use field::{
    from_json, to_json_pretty, FieldInfo, FieldKind, SelectOption, SelectedValue, BUTTON_TYPES,
};
pub use fill::{
    fill_element, fill_fields, fire_events, FillOptions, FillReason, FillResult, FillStatus,
    FillSummary,
};
pub use selector::{css_escape, find_element, get_selector};

/// Where a document comes from: an `http(s)` URL or a file path.
///
/// # Examples
///
/// ```
/// use formsnap::Source;
///
/// assert!(matches!(Source::parse("https://example.com/signup"), Source::Url(_)));
/// assert!(matches!(Source::parse("./page.html"), Source::File(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File(std::path::PathBuf),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Source::Url(raw.to_string())
        } else {
            Source::File(raw.into())
        }
    }

    /// Load the document this source names.
    pub fn load(&self, config: &LoadConfig) -> Result<Document> {
        match self {
            #[cfg(feature = "fetch")]
            Source::Url(url) => Document::fetch(url, config),
            #[cfg(not(feature = "fetch"))]
            Source::Url(url) => {
                let _ = config;
                Err(Error::LoadError(format!(
                    "{}: built without the `fetch` feature",
                    url
                )))
            }
            Source::File(path) => Document::from_file(path),
        }
    }
}
