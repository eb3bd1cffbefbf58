//! Downloadable file links.

use crate::error::Result;
use trawl_browser::RenderedPage;
use trawl_core::{Asset, Record};
use trawl_normalize::resolve_url;

/// Most assets returned from one page.
pub const MAX_ASSETS: usize = 50;

/// Downloadable file extensions, lower case.
pub const ASSET_EXTENSIONS: &[&str] = &["pdf", "zip", "mp4", "docx", "csv", "xlsx", "ppt", "mp3"];

/// Links to downloadable files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetStrategy;

impl AssetStrategy {
    pub async fn extract(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Record>> {
        let mut assets = Vec::new();

        for link in page.query_all(None, "a[href]").await? {
            let Some(href) = link.attr("href").filter(|h| !h.trim().is_empty()) else {
                continue;
            };
            let url = resolve_url(href.trim(), base_url);
            if let Some(asset) = asset_from_url(&url) {
                assets.push(asset);
            }
        }

        let assets: Vec<Record> = assets
            .into_iter()
            .filter(Self::validate)
            .take(MAX_ASSETS)
            .map(Record::Asset)
            .collect();

        tracing::debug!(count = assets.len(), "assets collected");
        Ok(assets)
    }

    /// Coarse check: an asset needs a filename and a URL.
    #[must_use]
    pub fn validate(asset: &Asset) -> bool {
        !asset.filename.is_empty() && !asset.url.is_empty()
    }
}

/// Asset for `url` when its last path segment has a known extension.
/// Query string and fragment are ignored.
fn asset_from_url(url: &str) -> Option<Asset> {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let filename = path.rsplit('/').next().unwrap_or_default();
    let (_, extension) = filename.rsplit_once('.')?;
    let extension = extension.to_lowercase();

    if !ASSET_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    Some(Asset {
        filename: filename.to_string(),
        url: url.to_string(),
        kind: extension.to_uppercase(),
        ..Asset::default()
    })
}
