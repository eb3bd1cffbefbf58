//! Schema validation with an error log and an error-rate threshold.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use trawl_core::{Asset, Category, Contacts, Image, Product, ScrapeResult, TextContent};

/// Longest accepted product title, in characters.
pub const MAX_TITLE_CHARS: usize = 500;

/// Headings and paragraphs kept per text record.
pub const MAX_TEXT_ENTRIES: usize = 100;

/// Default ratio of invalid records above which the threshold is exceeded.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 0.5;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Email regex is hardcoded and valid")
});

/// Why a record failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,

    #[error("title is {0} characters long, max is {MAX_TITLE_CHARS}")]
    TitleTooLong(usize),

    #[error("price must contain a number: '{0}'")]
    PriceWithoutDigits(String),

    #[error("{field} must be an http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("invalid email format: '{0}'")]
    InvalidEmail(String),

    #[error("filename is required")]
    MissingFilename,
}

/// One rejected record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorLogEntry {
    pub category: Category,
    /// Position of the record within its category
    pub index: usize,
    pub message: String,
    /// The record as it was before validation
    pub original_record: serde_json::Value,
}

/// Error rate of a validation run compared with the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThresholdStatus {
    Within {
        ratio: f64,
    },
    Exceeded {
        ratio: f64,
        invalid: usize,
        total: usize,
        threshold: f64,
    },
}

impl ThresholdStatus {
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        match self {
            Self::Within { ratio } | Self::Exceeded { ratio, .. } => *ratio,
        }
    }
}

/// Outcome of validating one result object.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// The result with invalid records removed
    pub result: ScrapeResult,
    /// Entries logged during this run
    pub errors: Vec<ErrorLogEntry>,
    pub invalid: usize,
    pub total: usize,
    pub threshold: ThresholdStatus,
}

/// Product title is required (stored trimmed) and bounded; a price must
/// carry at least one digit.
pub fn check_product(product: &mut Product) -> Result<(), ValidationError> {
    let title = product.title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingTitle);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_CHARS {
        return Err(ValidationError::TitleTooLong(len));
    }
    product.title = title.to_string();

    if let Some(price) = &product.price {
        if !price.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::PriceWithoutDigits(price.clone()));
        }
    }
    Ok(())
}

pub fn check_image(image: &Image) -> Result<(), ValidationError> {
    if !image.url.starts_with("http") {
        return Err(ValidationError::InvalidUrl {
            field: "url",
            value: image.url.clone(),
        });
    }
    Ok(())
}

pub fn check_contacts(contacts: &Contacts) -> Result<(), ValidationError> {
    match contacts.emails.iter().find(|e| !EMAIL.is_match(e)) {
        Some(bad) => Err(ValidationError::InvalidEmail(bad.clone())),
        None => Ok(()),
    }
}

pub fn check_asset(asset: &Asset) -> Result<(), ValidationError> {
    if !asset.url.starts_with("http") {
        return Err(ValidationError::InvalidUrl {
            field: "url",
            value: asset.url.clone(),
        });
    }
    if asset.filename.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }
    Ok(())
}

/// Text records always pass; long heading and paragraph lists are cut.
pub fn check_text(text: &mut TextContent) {
    text.headings.truncate(MAX_TEXT_ENTRIES);
    text.paragraphs.truncate(MAX_TEXT_ENTRIES);
}

/// Validates result objects and keeps a log of rejected records.
#[derive(Debug, Clone)]
pub struct Validator {
    error_threshold: f64,
    errors: Vec<ErrorLogEntry>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_THRESHOLD)
    }
}

impl Validator {
    #[must_use]
    pub fn new(error_threshold: f64) -> Self {
        Self {
            error_threshold,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn error_threshold(&self) -> f64 {
        self.error_threshold
    }

    /// Every entry logged since construction or the last [`clear_errors`](Self::clear_errors).
    #[must_use]
    pub fn errors(&self) -> &[ErrorLogEntry] {
        &self.errors
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Drop invalid records from `result` and report the error rate.
    ///
    /// The filtered result is always returned; exceeding the threshold is
    /// only signaled through [`ValidationReport::threshold`].
    pub fn validate_result(&mut self, result: ScrapeResult) -> ValidationReport {
        let logged_before = self.errors.len();
        let mut total = 0;
        let mut validated = ScrapeResult::default();

        if let Some(products) = result.products {
            total += products.len();
            validated.products = Some(self.filter(Category::Products, products, |p| {
                check_product(p)
            }));
        }

        if let Some(images) = result.images {
            total += images.len();
            validated.images = Some(self.filter(Category::Images, images, |i| check_image(i)));
        }

        if let Some(contacts) = result.contacts {
            total += 1;
            validated.contacts = self
                .filter(Category::Contacts, vec![contacts], |c| check_contacts(c))
                .pop();
        }

        if let Some(mut text) = result.text {
            total += 1;
            check_text(&mut text);
            validated.text = Some(text);
        }

        if let Some(assets) = result.assets {
            total += assets.len();
            validated.assets = Some(self.filter(Category::Assets, assets, |a| check_asset(a)));
        }

        let errors = self.errors[logged_before..].to_vec();
        let invalid = errors.len();
        let threshold = self.threshold_status(invalid, total);

        if threshold.is_exceeded() {
            tracing::warn!(
                invalid,
                total,
                ratio = threshold.ratio(),
                threshold = self.error_threshold,
                "validation error rate exceeds threshold"
            );
        } else {
            tracing::debug!(invalid, total, "validation complete");
        }

        ValidationReport {
            result: validated,
            errors,
            invalid,
            total,
            threshold,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn threshold_status(&self, invalid: usize, total: usize) -> ThresholdStatus {
        let ratio = if total == 0 {
            0.0
        } else {
            invalid as f64 / total as f64
        };

        if ratio > self.error_threshold {
            ThresholdStatus::Exceeded {
                ratio,
                invalid,
                total,
                threshold: self.error_threshold,
            }
        } else {
            ThresholdStatus::Within { ratio }
        }
    }

    fn filter<T, F>(&mut self, category: Category, records: Vec<T>, check: F) -> Vec<T>
    where
        T: Serialize,
        F: Fn(&mut T) -> Result<(), ValidationError>,
    {
        let mut valid = Vec::with_capacity(records.len());

        for (index, mut record) in records.into_iter().enumerate() {
            let original_record = serde_json::to_value(&record).unwrap_or_default();
            match check(&mut record) {
                Ok(()) => valid.push(record),
                Err(e) => {
                    tracing::warn!(category = %category, index, error = %e, "invalid record");
                    self.errors.push(ErrorLogEntry {
                        category,
                        index,
                        message: e.to_string(),
                        original_record,
                    });
                }
            }
        }

        valid
    }
}
