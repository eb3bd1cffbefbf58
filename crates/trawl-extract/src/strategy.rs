//! Strategy dispatch and the per-category registry.

use crate::asset::AssetStrategy;
use crate::contact::ContactStrategy;
use crate::error::{ExtractError, Result};
use crate::image::ImageStrategy;
use crate::product::ProductStrategy;
use crate::text::TextStrategy;
use std::collections::BTreeMap;
use trawl_browser::RenderedPage;
use trawl_core::{Category, ExtractionConfig, Record};

/// One extraction strategy per category.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Products(ProductStrategy),
    Images(ImageStrategy),
    Contacts(ContactStrategy),
    Text(TextStrategy),
    Assets(AssetStrategy),
}

impl Strategy {
    /// Default strategy for `category`.
    #[must_use]
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Products => Self::Products(ProductStrategy::default()),
            Category::Images => Self::Images(ImageStrategy::default()),
            Category::Contacts => Self::Contacts(ContactStrategy),
            Category::Text => Self::Text(TextStrategy),
            Category::Assets => Self::Assets(AssetStrategy),
        }
    }

    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Products(_) => Category::Products,
            Self::Images(_) => Category::Images,
            Self::Contacts(_) => Category::Contacts,
            Self::Text(_) => Category::Text,
            Self::Assets(_) => Category::Assets,
        }
    }

    /// Read this strategy's records from `page`.
    pub async fn extract(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Record>> {
        match self {
            Self::Products(s) => s.extract(page, base_url).await,
            Self::Images(s) => s.extract(page, base_url).await,
            Self::Contacts(s) => s.extract(page, base_url).await,
            Self::Text(s) => s.extract(page, base_url).await,
            Self::Assets(s) => s.extract(page, base_url).await,
        }
    }

    /// Coarse pre-filter. Records of another category never pass.
    #[must_use]
    pub fn validate(&self, record: &Record) -> bool {
        match (self, record) {
            (Self::Products(_), Record::Product(p)) => ProductStrategy::validate(p),
            (Self::Images(_), Record::Image(i)) => ImageStrategy::validate(i),
            (Self::Contacts(_), Record::Contacts(c)) => ContactStrategy::validate(c),
            (Self::Text(_), Record::Text(t)) => TextStrategy::validate(t),
            (Self::Assets(_), Record::Asset(a)) => AssetStrategy::validate(a),
            _ => false,
        }
    }
}

/// Strategies keyed by the category they produce.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: BTreeMap<Category, Strategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self {
            strategies: Category::ALL
                .into_iter()
                .map(|c| (c, Strategy::for_category(c)))
                .collect(),
        }
    }
}

impl StrategyRegistry {
    /// A registry with no strategies.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// All strategies, configured from `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let mut registry = Self::default();
        registry.register(Strategy::Products(ProductStrategy::with_overrides(
            &config.product_selectors,
        )?));
        registry.register(Strategy::Images(ImageStrategy::from_config(config)));
        Ok(registry)
    }

    /// Add or replace the strategy for its category.
    pub fn register(&mut self, strategy: Strategy) -> Option<Strategy> {
        self.strategies.insert(strategy.category(), strategy)
    }

    #[must_use]
    pub fn get(&self, category: Category) -> Option<&Strategy> {
        self.strategies.get(&category)
    }

    /// Like [`get`](Self::get), but a missing strategy is an error.
    pub fn require(&self, category: Category) -> Result<&Strategy> {
        self.get(category).ok_or(ExtractError::NoStrategy(category))
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.strategies.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trawl_core::{Image, Product, ProductSelectorOverrides};

    #[test]
    fn test_default_registry_covers_every_category() {
        let registry = StrategyRegistry::default();
        for category in Category::ALL {
            assert_eq!(registry.get(category).unwrap().category(), category);
        }
    }

    #[test]
    fn test_validate_rejects_other_categories() {
        let products = Strategy::for_category(Category::Products);
        let product = Record::Product(Product {
            title: "Lamp".to_string(),
            ..Product::default()
        });
        let image = Record::Image(Image {
            url: "https://x.com/a.png".to_string(),
            ..Image::default()
        });

        assert!(products.validate(&product));
        assert!(!products.validate(&image));
        assert!(Strategy::for_category(Category::Images).validate(&image));
    }

    #[test]
    fn test_from_config_applies_settings() {
        let mut config = ExtractionConfig {
            scroll_pause_ms: 10,
            settle_ms: 20,
            ..ExtractionConfig::default()
        };
        let registry = StrategyRegistry::from_config(&config).unwrap();
        assert_eq!(
            registry.get(Category::Images),
            Some(&Strategy::Images(ImageStrategy::new(
                std::time::Duration::from_millis(10),
                std::time::Duration::from_millis(20),
            )))
        );

        config.product_selectors = ProductSelectorOverrides {
            title: Some(vec!["h1[".to_string()]),
            ..ProductSelectorOverrides::default()
        };
        assert!(StrategyRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = StrategyRegistry::empty();
        assert!(matches!(
            registry.require(Category::Text),
            Err(ExtractError::NoStrategy(Category::Text))
        ));

        assert!(registry
            .register(Strategy::for_category(Category::Text))
            .is_none());
        assert_eq!(registry.categories().collect::<Vec<_>>(), vec![Category::Text]);
    }
}
