//! Trawl Extract - per-category extraction strategies.
//!
//! Each strategy reads one category of records from a
//! [`RenderedPage`](trawl_browser::RenderedPage): products (JSON-LD, then
//! DOM selectors), images (after a lazy-load scroll pass), contacts, page
//! text and downloadable assets. Strategies are a closed [`Strategy`] enum
//! looked up by category in a [`StrategyRegistry`].

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod asset;
pub mod contact;
pub mod error;
pub mod image;
pub mod product;
pub mod strategy;
pub mod text;

pub use asset::AssetStrategy;
pub use contact::ContactStrategy;
pub use error::{ExtractError, Result};
pub use image::ImageStrategy;
pub use product::ProductStrategy;
pub use strategy::{Strategy, StrategyRegistry};
pub use text::TextStrategy;
