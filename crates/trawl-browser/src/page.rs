use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Capabilities the extraction core needs from a rendered page.
///
/// Implementations own navigation, timeouts and teardown. Element queries
/// return detached [`Element`] snapshots, so reading text or attributes
/// never goes back to the page.
#[async_trait::async_trait]
pub trait RenderedPage: Send + Sync {
    /// Run a script in the page and return its JSON-serializable result
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// All elements matching `selector`, document-wide or under `scope`
    async fn query_all(&self, scope: Option<&Element>, selector: &str) -> Result<Vec<Element>>;

    /// First element matching `selector`, document-wide or under `scope`
    async fn query_one(&self, scope: Option<&Element>, selector: &str) -> Result<Option<Element>> {
        Ok(self.query_all(scope, selector).await?.into_iter().next())
    }

    /// Remove every element matching `selector` from the live document
    async fn remove_all(&self, selector: &str) -> Result<usize>;

    /// Scroll the window to a vertical offset
    async fn scroll_to(&self, y: u64) -> Result<()>;

    /// Current document height and viewport height
    async fn scroll_metrics(&self) -> Result<ScrollMetrics>;

    /// Pause for a fixed duration
    async fn wait(&self, duration: Duration);

    /// URL relative links on this page resolve against
    fn base_url(&self) -> &str;
}

/// Scrollable height of the document and height of the viewport, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub height: u64,
    pub viewport: u64,
}

/// Detached snapshot of one element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Child positions from the document root, when read from a full document
    pub(crate) path: Option<Vec<usize>>,
    pub(crate) tag: String,
    pub(crate) attributes: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) outer_html: String,
}

impl Element {
    /// Lower-case tag name
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value, if present
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Rendered text, trimmed, with block boundaries as line breaks
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Serialized element, used to run scoped queries
    #[must_use]
    pub fn outer_html(&self) -> &str {
        &self.outer_html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_accessors() {
        let el = Element {
            path: None,
            tag: "a".to_string(),
            attributes: BTreeMap::from([("href".to_string(), "/x".to_string())]),
            text: "Go".to_string(),
            outer_html: "<a href=\"/x\">Go</a>".to_string(),
        };
        assert_eq!(el.tag(), "a");
        assert_eq!(el.attr("href"), Some("/x"));
        assert_eq!(el.attr("title"), None);
        assert_eq!(el.text(), "Go");
    }

    #[test]
    fn test_scroll_metrics_from_json() {
        let metrics: ScrollMetrics =
            serde_json::from_value(serde_json::json!({ "height": 3000, "viewport": 800 }))
                .unwrap();
        assert_eq!(metrics.height, 3000);
        assert_eq!(metrics.viewport, 800);
    }
}
