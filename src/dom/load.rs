//! Loading documents over HTTP.

use super::Document;
use crate::{Error, Result};
use std::collections::HashMap;

/// Configuration for fetching a page
///
/// Defaults are conservative: a 30 second timeout and linked stylesheets
/// fetched so visibility checks see the page's real rules.
///
/// # Examples
///
/// ```
/// let cfg = formsnap::LoadConfig::default();
/// assert!(cfg.user_agent.starts_with("formsnap/"));
/// assert!(cfg.fetch_stylesheets);
/// ```
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for each request in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers
    pub headers: HashMap<String, String>,
    /// Whether to fetch `<link rel="stylesheet">` sheets
    pub fetch_stylesheets: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("formsnap/{}", env!("CARGO_PKG_VERSION")),
            timeout_ms: 30000,
            headers: HashMap::new(),
            fetch_stylesheets: true,
        }
    }
}

impl LoadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be greater than zero".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::ConfigError("user_agent must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(feature = "fetch")]
impl Document {
    /// Fetch and parse a page, then pull in its linked stylesheets.
    ///
    /// A stylesheet that fails to load is logged and skipped; only the page
    /// itself is required.
    pub fn fetch(url: &str, config: &LoadConfig) -> Result<Self> {
        use reqwest::blocking::Client;
        use std::time::Duration;

        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::LoadError(format!("Failed to build HTTP client: {}", e)))?;

        let get = |target: &str| -> Result<String> {
            let mut req = client
                .get(target)
                .header("User-Agent", config.user_agent.clone());
            for (k, v) in &config.headers {
                req = req.header(k.as_str(), v.as_str());
            }
            let resp = req.send()?.error_for_status()?;
            Ok(resp.text()?)
        };

        let body = get(url).map_err(|e| Error::LoadError(format!("Failed to fetch {}: {}", url, e)))?;
        let mut doc = Document::from_parts(&body, Some(url.to_string()));

        if config.fetch_stylesheets {
            let base = url::Url::parse(url).ok();
            for href in doc.stylesheet_links() {
                let css_url = base
                    .as_ref()
                    .and_then(|b| b.join(&href).ok())
                    .map(|u| u.to_string())
                    .unwrap_or(href);
                match get(&css_url) {
                    Ok(css) if !css.trim().is_empty() => doc.add_stylesheet(&css),
                    Ok(_) => {}
                    Err(e) => log::warn!("skipping stylesheet {}: {}", css_url, e),
                }
            }
        }

        log::debug!("loaded {} ({} stylesheet rules)", url, doc.sheet.len());
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = LoadConfig::default();
        assert_eq!(cfg.timeout_ms, 30000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = LoadConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn fetch_applies_linked_stylesheets() {
        // Skip on CI where binding a local port may not be allowed
        if std::env::var("CI").is_ok() {
            return;
        }

        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            for request in server.incoming_requests().take(2) {
                let body = match request.url() {
                    "/site.css" => ".secret { display: none }",
                    _ => r#"<html><head><link rel="stylesheet" href="/site.css"></head><body><input id="a" class="secret"></body></html>"#,
                };
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });

        let url = format!("http://{}/", addr);
        let doc = Document::fetch(&url, &LoadConfig::default()).expect("fetch page");
        assert_eq!(doc.url(), Some(url.as_str()));
        let a = doc.get_element_by_id("a").unwrap();
        assert_eq!(doc.computed_style(a).display, "none");
    }
}
