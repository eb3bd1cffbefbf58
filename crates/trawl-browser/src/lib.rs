//! Rendered-page capability for the extraction pipeline.
//!
//! Extraction strategies talk to a page only through [`RenderedPage`].
//! Two adapters are provided: [`StaticPage`] over a fixed HTML document and
//! [`ChromiumPage`] over a live headless Chromium tab.

pub mod dom;
pub mod engine;
pub mod error;
pub mod page;
pub mod static_page;

pub use engine::{BrowserEngine, ChromiumPage};
pub use error::{BrowserError, Result};
pub use page::{Element, RenderedPage, ScrollMetrics};
pub use static_page::StaticPage;
