use crate::dom;
use crate::error::{BrowserError, Result};
use crate::page::{Element, RenderedPage, ScrollMetrics};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

/// Page backed by a fixed HTML document.
///
/// Scripts cannot run here: `evaluate` only answers scripts registered with
/// [`StaticPage::with_script_result`]. Scrolling and waiting are recorded
/// instead of performed.
pub struct StaticPage {
    html: RwLock<String>,
    base_url: String,
    metrics: ScrollMetrics,
    script_results: HashMap<String, serde_json::Value>,
    scroll_log: Mutex<Vec<u64>>,
    waited: Mutex<Duration>,
}

impl StaticPage {
    /// Create a page from markup and the URL it was served from.
    ///
    /// # Errors
    /// Returns error if `base_url` is not an absolute URL.
    pub fn new(html: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {e}")))?;

        Ok(Self {
            html: RwLock::new(html.into()),
            base_url,
            metrics: ScrollMetrics::default(),
            script_results: HashMap::new(),
            scroll_log: Mutex::new(Vec::new()),
            waited: Mutex::new(Duration::ZERO),
        })
    }

    /// Report these dimensions from `scroll_metrics`.
    #[must_use]
    pub fn with_metrics(mut self, height: u64, viewport: u64) -> Self {
        self.metrics = ScrollMetrics { height, viewport };
        self
    }

    /// Answer `evaluate(script)` with a canned value.
    #[must_use]
    pub fn with_script_result(mut self, script: &str, value: serde_json::Value) -> Self {
        self.script_results.insert(script.to_string(), value);
        self
    }

    /// Current markup, after any removals.
    #[must_use]
    pub fn html(&self) -> String {
        self.html.read().expect("acquire read lock on html").clone()
    }

    /// Offsets passed to `scroll_to`, in call order.
    #[must_use]
    pub fn scroll_positions(&self) -> Vec<u64> {
        self.scroll_log
            .lock()
            .expect("acquire scroll log lock")
            .clone()
    }

    /// Total time requested through `wait`.
    #[must_use]
    pub fn waited(&self) -> Duration {
        *self.waited.lock().expect("acquire wait lock")
    }
}

#[async_trait::async_trait]
impl RenderedPage for StaticPage {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.script_results
            .get(script)
            .cloned()
            .ok_or_else(|| BrowserError::Unsupported("script evaluation".to_string()))
    }

    async fn query_all(&self, scope: Option<&Element>, selector: &str) -> Result<Vec<Element>> {
        let html = self.html.read().expect("acquire read lock on html");
        match scope {
            Some(scope) => dom::select_in_element(&html, scope, selector),
            None => dom::select_in_document(&html, selector),
        }
    }

    async fn remove_all(&self, selector: &str) -> Result<usize> {
        let mut html = self.html.write().expect("acquire write lock on html");
        let (updated, removed) = dom::remove_from_document(&html, selector)?;
        *html = updated;
        Ok(removed)
    }

    async fn scroll_to(&self, y: u64) -> Result<()> {
        self.scroll_log
            .lock()
            .expect("acquire scroll log lock")
            .push(y);
        Ok(())
    }

    async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
        Ok(self.metrics)
    }

    async fn wait(&self, duration: Duration) {
        *self.waited.lock().expect("acquire wait lock") += duration;
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
