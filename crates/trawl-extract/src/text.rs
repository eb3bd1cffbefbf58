//! Page text: title, meta description, headings and paragraphs.

use crate::error::Result;
use trawl_browser::RenderedPage;
use trawl_core::{Record, TextContent};

/// Page regions dropped before reading text.
pub const NOISE_SELECTOR: &str = "nav, header, footer, script, style, aside, .ad, .advertisement";

pub const MAX_HEADINGS: usize = 50;
pub const MAX_PARAGRAPHS: usize = 100;

/// Paragraphs this short or shorter are skipped.
const MIN_PARAGRAPH_CHARS: usize = 20;

/// Reads title, meta description, headings and body paragraphs.
///
/// Removes navigation, chrome and ad regions from the page first, so it
/// should run after strategies that read those regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStrategy;

impl TextStrategy {
    pub async fn extract(&self, page: &dyn RenderedPage, _base_url: &str) -> Result<Vec<Record>> {
        let removed = page.remove_all(NOISE_SELECTOR).await?;
        tracing::debug!(removed, "noise regions removed");

        let title = page
            .query_one(None, "title")
            .await?
            .map(|el| el.text().to_string())
            .unwrap_or_default();

        let meta = page
            .query_one(None, r#"meta[name="description"]"#)
            .await?
            .and_then(|el| el.attr("content").map(String::from))
            .unwrap_or_default();

        let headings = page
            .query_all(None, "h1, h2, h3")
            .await?
            .iter()
            .map(|el| el.text().trim().to_string())
            .filter(|text| !text.is_empty())
            .take(MAX_HEADINGS)
            .collect();

        let paragraphs = page
            .query_all(None, "p")
            .await?
            .iter()
            .map(|el| el.text().trim().to_string())
            .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
            .take(MAX_PARAGRAPHS)
            .collect();

        Ok(vec![Record::Text(TextContent {
            title,
            meta,
            headings,
            paragraphs,
            ..TextContent::default()
        })])
    }

    /// Coarse check: some title, heading or paragraph text.
    #[must_use]
    pub fn validate(text: &TextContent) -> bool {
        !text.title.is_empty() || !text.headings.is_empty() || !text.paragraphs.is_empty()
    }
}
