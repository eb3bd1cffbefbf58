use crate::dom;
use crate::error::{BrowserError, Result};
use crate::page::{Element, RenderedPage, ScrollMetrics};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use trawl_core::BrowserConfig;

const SCROLL_METRICS_SCRIPT: &str =
    "({ height: document.body.scrollHeight, viewport: window.innerHeight })";

/// Headless Chromium instance that opens pages for extraction.
pub struct BrowserEngine {
    browser: Browser,
    settings: BrowserConfig,
    handler: JoinHandle<()>,
}

impl BrowserEngine {
    /// Launch a browser with the given settings
    pub async fn launch(settings: &BrowserConfig) -> Result<Self> {
        let mut builder = ChromiumConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Drive the CDP connection until the browser goes away
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event failed");
                }
            }
        });

        Ok(Self {
            browser,
            settings: settings.clone(),
            handler,
        })
    }

    /// Open `url` in a new tab and wait for it to load
    pub async fn open(&self, url: &str) -> Result<ChromiumPage> {
        let timeout = Duration::from_secs(self.settings.navigation_timeout_secs);

        let page = tokio::time::timeout(timeout, async {
            let page = self
                .browser
                .new_page(url)
                .await
                .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
            Ok::<_, BrowserError>(page)
        })
        .await
        .map_err(|_| BrowserError::Timeout(format!("loading {url} took over {timeout:?}")))??;

        // Redirects change the URL relative links resolve against
        let base_url = match page.url().await {
            Ok(Some(current)) => current,
            _ => url.to_string(),
        };

        tracing::debug!(url = %url, base_url = %base_url, "page opened");
        Ok(ChromiumPage::new(page, base_url))
    }

    /// Close the browser and stop the event handler
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        self.handler.abort();
        Ok(())
    }
}

/// A live Chromium tab.
pub struct ChromiumPage {
    page: Page,
    base_url: String,
}

impl ChromiumPage {
    /// Wrap a page that was opened elsewhere
    #[must_use]
    pub fn new(page: Page, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
        }
    }

    /// The underlying chromiumoxide page
    #[must_use]
    pub fn inner(&self) -> &Page {
        &self.page
    }
}

#[async_trait::async_trait]
impl RenderedPage for ChromiumPage {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn query_all(&self, scope: Option<&Element>, selector: &str) -> Result<Vec<Element>> {
        let content = self
            .page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        match scope {
            Some(scope) => dom::select_in_element(&content, scope, selector),
            None => dom::select_in_document(&content, selector),
        }
    }

    async fn remove_all(&self, selector: &str) -> Result<usize> {
        // Reject bad selectors before they reach the page
        dom::parse_selector(selector)?;
        let quoted = serde_json::to_string(selector)
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        let script = format!(
            "(() => {{ const els = document.querySelectorAll({quoted}); \
             els.forEach(el => el.remove()); return els.length; }})()"
        );
        let removed = self.evaluate(&script).await?;
        Ok(removed
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0))
    }

    async fn scroll_to(&self, y: u64) -> Result<()> {
        self.evaluate(&format!("window.scrollTo(0, {y})")).await?;
        Ok(())
    }

    async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
        let value = self.evaluate(SCROLL_METRICS_SCRIPT).await?;
        serde_json::from_value(value).map_err(|e| BrowserError::ScriptError(e.to_string()))
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
