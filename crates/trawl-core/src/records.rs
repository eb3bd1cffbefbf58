//! Typed record model.
//!
//! Every category has a struct with its known fields plus an `extra` map
//! that keeps unrecognized fields through normalization, validation and
//! snapshotting. Optional fields are omitted from the serialized form when
//! absent, so identities never see `null` placeholders.

use crate::types::Category;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields not covered by a record's known schema.
pub type ExtraFields = BTreeMap<String, Value>;

/// A product listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Product {
    /// Product name
    pub title: String,
    /// Display price (raw before normalization, `<CODE><value>` after)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Parsed numeric price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_value: Option<f64>,
    /// Three-letter currency code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_currency: Option<String>,
    /// Absolute image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Absolute product page URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Free-text description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// An image reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Image {
    /// Absolute image URL
    pub url: String,
    /// Alternative text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Declared width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Declared height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Contact details found anywhere on a page, as one synthetic record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contacts {
    /// Email addresses
    pub emails: Vec<String>,
    /// Phone numbers
    pub phones: Vec<String>,
    /// Social profile URLs
    pub socials: Vec<String>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Contacts {
    /// Whether no contact detail of any kind was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty() && self.phones.is_empty() && self.socials.is_empty()
    }
}

/// Readable text content of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextContent {
    /// Document title
    pub title: String,
    /// Meta description
    pub meta: String,
    /// `h1`-`h3` texts
    pub headings: Vec<String>,
    /// Paragraph texts
    pub paragraphs: Vec<String>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A downloadable file linked from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Asset {
    /// Last path segment of the URL
    pub filename: String,
    /// Absolute URL
    pub url: String,
    /// Upper-cased file extension
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable size, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// One record of any category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    /// See [`Product`]
    Product(Product),
    /// See [`Image`]
    Image(Image),
    /// See [`Contacts`]
    Contacts(Contacts),
    /// See [`TextContent`]
    Text(TextContent),
    /// See [`Asset`]
    Asset(Asset),
}

impl Record {
    /// Category this record belongs to.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Product(_) => Category::Products,
            Self::Image(_) => Category::Images,
            Self::Contacts(_) => Category::Contacts,
            Self::Text(_) => Category::Text,
            Self::Asset(_) => Category::Assets,
        }
    }
}

/// The produced result object, keyed by category.
///
/// Categories that were not requested (or whose extraction failed) are
/// `None` and omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeResult {
    /// Product records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    /// Image records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<Image>>,
    /// The contact record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Contacts>,
    /// The text record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextContent>,
    /// Asset records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<Vec<Asset>>,
}

impl ScrapeResult {
    /// Store extracted records under `category`.
    ///
    /// Records of other categories are ignored. For singleton categories
    /// only the first matching record is kept.
    pub fn set_records(&mut self, category: Category, records: Vec<Record>) {
        match category {
            Category::Products => {
                self.products = Some(
                    records
                        .into_iter()
                        .filter_map(|r| match r {
                            Record::Product(p) => Some(p),
                            _ => None,
                        })
                        .collect(),
                );
            }
            Category::Images => {
                self.images = Some(
                    records
                        .into_iter()
                        .filter_map(|r| match r {
                            Record::Image(i) => Some(i),
                            _ => None,
                        })
                        .collect(),
                );
            }
            Category::Contacts => {
                self.contacts = records.into_iter().find_map(|r| match r {
                    Record::Contacts(c) => Some(c),
                    _ => None,
                });
            }
            Category::Text => {
                self.text = records.into_iter().find_map(|r| match r {
                    Record::Text(t) => Some(t),
                    _ => None,
                });
            }
            Category::Assets => {
                self.assets = Some(
                    records
                        .into_iter()
                        .filter_map(|r| match r {
                            Record::Asset(a) => Some(a),
                            _ => None,
                        })
                        .collect(),
                );
            }
        }
    }

    /// Records stored under `category`, singletons as a one-element list.
    #[must_use]
    pub fn records(&self, category: Category) -> Vec<Record> {
        match category {
            Category::Products => self
                .products
                .iter()
                .flatten()
                .cloned()
                .map(Record::Product)
                .collect(),
            Category::Images => self
                .images
                .iter()
                .flatten()
                .cloned()
                .map(Record::Image)
                .collect(),
            Category::Contacts => self.contacts.iter().cloned().map(Record::Contacts).collect(),
            Category::Text => self.text.iter().cloned().map(Record::Text).collect(),
            Category::Assets => self
                .assets
                .iter()
                .flatten()
                .cloned()
                .map(Record::Asset)
                .collect(),
        }
    }

    /// Whether the category is present in the result (possibly empty).
    #[must_use]
    pub fn contains(&self, category: Category) -> bool {
        match category {
            Category::Products => self.products.is_some(),
            Category::Images => self.images.is_some(),
            Category::Contacts => self.contacts.is_some(),
            Category::Text => self.text.is_some(),
            Category::Assets => self.assets.is_some(),
        }
    }

    /// Number of records stored under `category`.
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Products => self.products.as_ref().map_or(0, Vec::len),
            Category::Images => self.images.as_ref().map_or(0, Vec::len),
            Category::Contacts => usize::from(self.contacts.is_some()),
            Category::Text => usize::from(self.text.is_some()),
            Category::Assets => self.assets.as_ref().map_or(0, Vec::len),
        }
    }

    /// Categories present in the result, in pipeline order.
    #[must_use]
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }
}
