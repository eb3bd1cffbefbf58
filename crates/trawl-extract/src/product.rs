//! Product extraction: embedded JSON-LD first, DOM selectors as fallback.

use crate::error::{ExtractError, Result};
use serde_json::Value;
use trawl_browser::{dom, Element, RenderedPage};
use trawl_core::{Product, ProductSelectorOverrides, Record};
use trawl_normalize::resolve_url;

/// Most products returned from one page.
pub const MAX_PRODUCTS: usize = 50;

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
const CONTAINER_SELECTOR: &str = ".product, [data-product], .product-item, .product-card";
const LINK_SELECTOR: &str = "a[href]";

const DEFAULT_TITLE: &[&str] = &["h1.product-title", ".product-name", "[data-product-title]", "h1"];
const DEFAULT_PRICE: &[&str] = &[".price", "[data-price]", ".product-price"];
const DEFAULT_IMAGE: &[&str] = &[".product-image img", "img.product-photo", "[data-product-image]"];
const DEFAULT_DESCRIPTION: &[&str] = &[".description", ".product-details"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStrategy {
    title: Vec<String>,
    price: Vec<String>,
    image: Vec<String>,
    description: Vec<String>,
}

impl Default for ProductStrategy {
    fn default() -> Self {
        Self {
            title: owned(DEFAULT_TITLE),
            price: owned(DEFAULT_PRICE),
            image: owned(DEFAULT_IMAGE),
            description: owned(DEFAULT_DESCRIPTION),
        }
    }
}

fn owned(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| (*s).to_string()).collect()
}

fn checked(field: &str, selectors: &[String]) -> Result<Vec<String>> {
    for selector in selectors {
        dom::check_selector(selector).map_err(|e| ExtractError::InvalidSelector {
            field: field.to_string(),
            selector: selector.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(selectors.to_vec())
}

impl ProductStrategy {
    /// Candidate selectors with per-field replacements.
    ///
    /// Every replacement selector must parse.
    pub fn with_overrides(overrides: &ProductSelectorOverrides) -> Result<Self> {
        let mut strategy = Self::default();
        if let Some(title) = &overrides.title {
            strategy.title = checked("title", title)?;
        }
        if let Some(price) = &overrides.price {
            strategy.price = checked("price", price)?;
        }
        if let Some(image) = &overrides.image {
            strategy.image = checked("image", image)?;
        }
        if let Some(description) = &overrides.description {
            strategy.description = checked("description", description)?;
        }
        Ok(strategy)
    }

    pub async fn extract(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Record>> {
        let mut products = match self.read_json_ld(page, base_url).await {
            Ok(products) => products,
            Err(e) => {
                tracing::warn!(error = %e, "JSON-LD product extraction failed");
                Vec::new()
            }
        };

        if products.is_empty() {
            products = self.read_dom(page, base_url).await?;
        } else {
            tracing::debug!(count = products.len(), "products read from JSON-LD");
        }

        Ok(products
            .into_iter()
            .filter(Self::validate)
            .take(MAX_PRODUCTS)
            .map(Record::Product)
            .collect())
    }

    /// Coarse check: a product needs a title.
    #[must_use]
    pub fn validate(product: &Product) -> bool {
        !product.title.trim().is_empty()
    }

    async fn read_json_ld(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Product>> {
        let scripts = page.query_all(None, JSON_LD_SELECTOR).await?;

        let mut documents = Vec::with_capacity(scripts.len());
        for script in &scripts {
            match serde_json::from_str::<Value>(script.text()) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::debug!(error = %e, "skipping malformed JSON-LD block"),
            }
        }

        let mut found = Vec::new();
        for doc in &documents {
            collect_json_ld_products(doc, &mut found);
        }

        Ok(found
            .into_iter()
            .map(|data| product_from_json_ld(data, base_url))
            .collect())
    }

    async fn read_dom(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Product>> {
        let containers = page.query_all(None, CONTAINER_SELECTOR).await?;

        if containers.is_empty() {
            // Single-product page
            let product = self.read_scope(page, None, base_url).await;
            return Ok(product.into_iter().collect());
        }

        let mut products = Vec::new();
        for container in containers.iter().take(MAX_PRODUCTS) {
            if let Some(product) = self.read_scope(page, Some(container), base_url).await {
                products.push(product);
            }
        }
        Ok(products)
    }

    async fn read_scope(
        &self,
        page: &dyn RenderedPage,
        scope: Option<&Element>,
        base_url: &str,
    ) -> Option<Product> {
        let title = first_text(page, scope, &self.title).await?;
        if title.trim().is_empty() {
            return None;
        }

        let link = match scope {
            Some(_) => first_match(page, scope, LINK_SELECTOR)
                .await
                .and_then(|a| a.attr("href").map(String::from))
                .filter(|href| !href.is_empty())
                .map(|href| resolve_url(&href, base_url)),
            None => None,
        };

        Some(Product {
            title,
            price: first_text(page, scope, &self.price).await,
            image: first_src(page, scope, &self.image)
                .await
                .map(|src| resolve_url(&src, base_url)),
            link: Some(link.unwrap_or_else(|| base_url.to_string())),
            description: first_text(page, scope, &self.description).await,
            ..Product::default()
        })
    }
}

async fn first_match(
    page: &dyn RenderedPage,
    scope: Option<&Element>,
    selector: &str,
) -> Option<Element> {
    match page.query_one(scope, selector).await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(selector, error = %e, "candidate selector failed");
            None
        }
    }
}

// Text of the first element matched by the first selector that matches.
async fn first_text(
    page: &dyn RenderedPage,
    scope: Option<&Element>,
    selectors: &[String],
) -> Option<String> {
    for selector in selectors {
        if let Some(el) = first_match(page, scope, selector).await {
            return Some(el.text().to_string());
        }
    }
    None
}

// First non-empty `src` among the matches of the first selector that has one.
async fn first_src(
    page: &dyn RenderedPage,
    scope: Option<&Element>,
    selectors: &[String],
) -> Option<String> {
    for selector in selectors {
        let matches = match page.query_all(scope, selector).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!(selector = %selector, error = %e, "candidate selector failed");
                continue;
            }
        };
        if let Some(src) = matches
            .iter()
            .filter_map(|el| el.attr("src"))
            .find(|src| !src.is_empty())
        {
            return Some(src.to_string());
        }
    }
    None
}

fn has_type(value: &Value, expected: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == expected,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(expected)),
        _ => false,
    }
}

/// Gather `Product` nodes from a JSON-LD document: top-level arrays,
/// `@graph` members, and items of an `ItemList`.
fn collect_json_ld_products<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_json_ld_products(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(graph)) = map.get("@graph") {
                for item in graph {
                    collect_json_ld_products(item, out);
                }
            }

            if has_type(value, "Product") {
                out.push(value);
            } else if has_type(value, "ItemList") {
                if let Some(Value::Array(elements)) = map.get("itemListElement") {
                    out.extend(
                        elements
                            .iter()
                            .filter_map(|element| element.get("item"))
                            .filter(|item| has_type(item, "Product")),
                    );
                }
            }
        }
        _ => {}
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_ld_price(data: &Value) -> Option<String> {
    match data.get("offers")? {
        offer @ Value::Object(_) => scalar(offer.get("price")),
        Value::Array(offers) => scalar(offers.first()?.get("price")),
        _ => None,
    }
}

fn json_ld_image(data: &Value) -> Option<String> {
    let image = match data.get("image")? {
        Value::Array(images) => images.first()?,
        other => other,
    };
    match image {
        Value::String(url) if !url.is_empty() => Some(url.clone()),
        Value::Object(_) => scalar(image.get("url")),
        _ => None,
    }
}

fn product_from_json_ld(data: &Value, base_url: &str) -> Product {
    let link = scalar(data.get("url")).map_or_else(
        || base_url.to_string(),
        |url| resolve_url(&url, base_url),
    );

    Product {
        title: scalar(data.get("name")).unwrap_or_default(),
        price: json_ld_price(data),
        image: json_ld_image(data).map(|url| resolve_url(&url, base_url)),
        link: Some(link),
        description: scalar(data.get("description")),
        ..Product::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trawl_browser::StaticPage;

    const BASE: &str = "https://shop.example.com/category/";

    async fn extract(html: &str) -> Vec<Product> {
        let page = StaticPage::new(html, BASE).unwrap();
        ProductStrategy::default()
            .extract(&page, BASE)
            .await
            .unwrap()
            .into_iter()
            .map(|r| match r {
                Record::Product(p) => p,
                other => panic!("unexpected record {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_json_ld_product() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "Product", "name": "Desk Lamp", "url": "/p/lamp",
             "image": ["/img/lamp.jpg"], "description": "Warm light",
             "offers": {"price": "19.99", "priceCurrency": "USD"}}
            </script></head>
            <body><div class="product"><h1>Ignored</h1></div></body></html>"#;

        let products = extract(html).await;
        assert_eq!(products.len(), 1);
        let lamp = &products[0];
        assert_eq!(lamp.title, "Desk Lamp");
        assert_eq!(lamp.price.as_deref(), Some("19.99"));
        assert_eq!(lamp.link.as_deref(), Some("https://shop.example.com/p/lamp"));
        assert_eq!(
            lamp.image.as_deref(),
            Some("https://shop.example.com/img/lamp.jpg")
        );
        assert_eq!(lamp.description.as_deref(), Some("Warm light"));
    }

    #[tokio::test]
    async fn test_json_ld_item_list_and_graph() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "ItemList", "itemListElement": [
                {"item": {"@type": "Product", "name": "A", "offers": [{"price": 5}]}},
                {"item": {"@type": "Thing", "name": "not a product"}}
            ]}
            </script>
            <script type="application/ld+json">
            {"@graph": [{"@type": ["Product", "IndividualProduct"], "name": "B",
                         "image": {"url": "https://cdn.example.com/b.png"}}]}
            </script>
            <script type="application/ld+json">{ broken</script>
            </head><body></body></html>"#;

        let products = extract(html).await;
        let titles: Vec<_> = products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(products[0].price.as_deref(), Some("5"));
        assert_eq!(products[0].link.as_deref(), Some(BASE));
        assert_eq!(
            products[1].image.as_deref(),
            Some("https://cdn.example.com/b.png")
        );
    }

    #[tokio::test]
    async fn test_dom_containers() {
        let html = r#"<html><body>
            <div class="product-card">
                <a href="/p/1"><span class="product-name">Chair</span></a>
                <span class="price">$49.00</span>
                <div class="product-image"><img alt="no src"><img src="/img/chair.png"></div>
            </div>
            <div class="product-card">
                <span class="product-name">Table</span>
                <p class="description">Oak</p>
            </div>
            <div class="product-card"><span class="price">$1</span></div>
        </body></html>"#;

        let products = extract(html).await;
        assert_eq!(products.len(), 2);

        assert_eq!(products[0].title, "Chair");
        assert_eq!(products[0].price.as_deref(), Some("$49.00"));
        assert_eq!(
            products[0].link.as_deref(),
            Some("https://shop.example.com/p/1")
        );
        assert_eq!(
            products[0].image.as_deref(),
            Some("https://shop.example.com/img/chair.png")
        );

        assert_eq!(products[1].title, "Table");
        assert_eq!(products[1].link.as_deref(), Some(BASE));
        assert_eq!(products[1].description.as_deref(), Some("Oak"));
        assert!(products[1].price.is_none());
    }

    #[tokio::test]
    async fn test_single_product_page() {
        let html = r#"<html><body>
            <h1>Standing Desk</h1>
            <div class="price">€399,00</div>
        </body></html>"#;

        let products = extract(html).await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Standing Desk");
        assert_eq!(products[0].price.as_deref(), Some("€399,00"));
        assert_eq!(products[0].link.as_deref(), Some(BASE));
    }

    #[tokio::test]
    async fn test_table_row_containers() {
        let html = r#"<html><body><table class="catalog">
            <tr class="product">
                <td><a href="/chair"><span class="product-name">Chair</span></a></td>
                <td class="price">$40.00</td>
            </tr>
            <tr class="product">
                <td><a href="/table"><span class="product-name">Table</span></a></td>
                <td class="price">$90.00</td>
            </tr>
        </table></body></html>"#;

        let products = extract(html).await;
        let titles: Vec<_> = products.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Chair", "Table"]);
        assert_eq!(products[1].price.as_deref(), Some("$90.00"));
        assert_eq!(
            products[0].link.as_deref(),
            Some("https://shop.example.com/chair")
        );
    }

    #[tokio::test]
    async fn test_override_with_ancestor_context() {
        let overrides = ProductSelectorOverrides {
            title: Some(vec![".catalog .label".to_string()]),
            ..ProductSelectorOverrides::default()
        };
        let strategy = ProductStrategy::with_overrides(&overrides).unwrap();
        let page = StaticPage::new(
            r#"<html><body><section class="catalog">
                <div class="product-card"><span class="label">Lamp</span></div>
            </section></body></html>"#,
            BASE,
        )
        .unwrap();

        let records = strategy.extract(&page, BASE).await.unwrap();
        assert!(matches!(&records[..], [Record::Product(p)] if p.title == "Lamp"));
    }

    #[tokio::test]
    async fn test_no_title_no_product() {
        let products = extract("<html><body><p>Nothing here</p></body></html>").await;
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_caps_at_fifty() {
        let cards: String = (0..60)
            .map(|i| format!(r#"<div class="product"><h1>Item {i}</h1></div>"#))
            .collect();
        let products = extract(&format!("<html><body>{cards}</body></html>")).await;
        assert_eq!(products.len(), MAX_PRODUCTS);
    }

    #[tokio::test]
    async fn test_selector_overrides() {
        let overrides = ProductSelectorOverrides {
            title: Some(vec![".headline".to_string()]),
            ..ProductSelectorOverrides::default()
        };
        let strategy = ProductStrategy::with_overrides(&overrides).unwrap();
        let page = StaticPage::new(
            r#"<html><body><h1>Site name</h1><div class="headline">Sofa</div></body></html>"#,
            BASE,
        )
        .unwrap();

        let records = strategy.extract(&page, BASE).await.unwrap();
        assert!(matches!(&records[0], Record::Product(p) if p.title == "Sofa"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = ProductSelectorOverrides {
            price: Some(vec!["span[".to_string()]),
            ..ProductSelectorOverrides::default()
        };
        assert!(matches!(
            ProductStrategy::with_overrides(&overrides),
            Err(ExtractError::InvalidSelector { ref field, .. }) if field == "price"
        ));
    }

    #[test]
    fn test_json_ld_type_matching() {
        assert!(has_type(&json!({"@type": "Product"}), "Product"));
        assert!(has_type(&json!({"@type": ["Thing", "Product"]}), "Product"));
        assert!(!has_type(&json!({"name": "x"}), "Product"));
    }
}
