//! Image extraction with a lazy-load scroll pass.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use trawl_browser::{Element, RenderedPage};
use trawl_core::{ExtractionConfig, Image, Record};
use trawl_normalize::resolve_url;

/// Most images returned from one page.
pub const MAX_IMAGES: usize = 100;

/// Upper bound on scroll steps, for pages that keep growing.
const MAX_SCROLL_STEPS: u32 = 500;

/// `img` attributes that may hold the image URL, in priority order.
pub const SOURCE_ATTRIBUTES: &[&str] = &[
    "src",
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-image",
    "data-lazy",
    "data-url",
    "data-img-src",
    "data-full-src",
    "data-zoom-image",
    "data-large-src",
];

const DATA_ATTRIBUTES: &[&str] = &["data-image", "data-src", "data-background", "data-bg"];

/// URLs containing any of these are trackers or spacers.
const NOISE_MARKERS: &[&str] = &["pixel", "tracking", "beacon", "1x1", "spacer"];

static BACKGROUND_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(['"]*([^'")]+)['"]*\)"#).expect("Background URL regex is hardcoded and valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStrategy {
    scroll_pause: Duration,
    settle: Duration,
}

impl Default for ImageStrategy {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Unique raw URLs with the element details they were found with.
#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    found: Vec<Image>,
}

impl Candidates {
    fn add(&mut self, url: &str, source: Option<&Element>) {
        let url = url.trim();
        if url.is_empty() || url.starts_with("data:") || !self.seen.insert(url.to_string()) {
            return;
        }

        let dimension = |name: &str| {
            source
                .and_then(|el| el.attr(name))
                .and_then(|v| v.trim().parse().ok())
        };

        self.found.push(Image {
            url: url.to_string(),
            alt: source
                .and_then(|el| el.attr("alt"))
                .filter(|alt| !alt.is_empty())
                .map(String::from),
            width: dimension("width"),
            height: dimension("height"),
            ..Image::default()
        });
    }
}

impl ImageStrategy {
    #[must_use]
    pub fn new(scroll_pause: Duration, settle: Duration) -> Self {
        Self {
            scroll_pause,
            settle,
        }
    }

    #[must_use]
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            Duration::from_millis(config.scroll_pause_ms),
            Duration::from_millis(config.settle_ms),
        )
    }

    pub async fn extract(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Record>> {
        if let Err(e) = self.scroll_through(page).await {
            tracing::warn!(error = %e, "lazy-load scroll pass failed");
        }
        page.wait(self.settle).await;

        let mut candidates = Candidates::default();

        for img in page.query_all(None, "img").await? {
            let srcset = img.attr("srcset").or_else(|| img.attr("data-srcset"));
            if let Some(best) = srcset.and_then(largest_candidate) {
                candidates.add(best, Some(&img));
            }
            for attr in SOURCE_ATTRIBUTES {
                if let Some(src) = img.attr(attr) {
                    candidates.add(src, Some(&img));
                }
            }
        }

        for source in page.query_all(None, "picture source").await? {
            let srcset = source.attr("srcset").or_else(|| source.attr("data-srcset"));
            for url in srcset.map(srcset_urls).unwrap_or_default() {
                candidates.add(url, None);
            }
        }

        for el in page.query_all(None, r#"[style*="background"]"#).await? {
            if let Some(url) = el
                .attr("style")
                .and_then(|style| BACKGROUND_URL.captures(style))
                .and_then(|caps| caps.get(1))
            {
                candidates.add(url.as_str(), None);
            }
        }

        for el in page
            .query_all(None, "[data-image], [data-src], [data-background]")
            .await?
        {
            for attr in DATA_ATTRIBUTES {
                if let Some(url) = el.attr(attr) {
                    candidates.add(url, None);
                }
            }
        }

        for a in page.query_all(None, "a[data-image], a[data-src]").await? {
            if let Some(url) = a.attr("data-image").or_else(|| a.attr("data-src")) {
                candidates.add(url, None);
            }
        }

        let images: Vec<Record> = candidates
            .found
            .into_iter()
            .filter_map(|mut image| {
                image.url = resolve_url(&image.url, base_url);
                is_content_image(&image.url).then_some(image)
            })
            .filter(Self::validate)
            .take(MAX_IMAGES)
            .map(Record::Image)
            .collect();

        tracing::debug!(count = images.len(), "images collected");
        Ok(images)
    }

    /// Coarse check: an image needs a URL.
    #[must_use]
    pub fn validate(image: &Image) -> bool {
        !image.url.is_empty()
    }

    /// Step through the page half a viewport at a time so lazy images load,
    /// then return to the top.
    async fn scroll_through(&self, page: &dyn RenderedPage) -> Result<()> {
        let metrics = page.scroll_metrics().await?;
        let step = (metrics.viewport / 2).max(1);
        let mut height = metrics.height;
        let mut position = 0;
        let mut steps = 0;

        while position < height && steps < MAX_SCROLL_STEPS {
            page.scroll_to(position).await?;
            page.wait(self.scroll_pause).await;
            position += step;
            steps += 1;
            height = page.scroll_metrics().await?.height;
        }

        page.scroll_to(0).await?;
        tracing::debug!(steps, height, "scroll pass complete");
        Ok(())
    }
}

/// URL of the widest `srcset` candidate. `w` descriptors count as widths,
/// `x` densities as a thousand per unit; missing descriptors mean `1x`.
fn largest_candidate(srcset: &str) -> Option<&str> {
    let mut best: Option<(&str, f64)> = None;

    for candidate in srcset.split(',').map(str::trim) {
        let mut parts = candidate.split_whitespace();
        let Some(url) = parts.next() else {
            continue;
        };
        let descriptor = parts.next().unwrap_or("1x");

        let width = if let Some(w) = descriptor.strip_suffix('w') {
            w.parse::<f64>().unwrap_or(0.0)
        } else if let Some(x) = descriptor.strip_suffix('x') {
            x.parse::<f64>().unwrap_or(0.0) * 1000.0
        } else {
            0.0
        };

        if width > best.map_or(0.0, |(_, w)| w) {
            best = Some((url, width));
        }
    }

    best.map(|(url, _)| url)
}

fn srcset_urls(srcset: &str) -> Vec<&str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .collect()
}

fn is_content_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    !lower.is_empty()
        && !NOISE_MARKERS.iter().any(|marker| lower.contains(marker))
        && !lower.ends_with(".gif")
}
