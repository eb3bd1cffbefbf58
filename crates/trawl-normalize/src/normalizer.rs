//! Field canonicalization.
//!
//! Every function here is total: input that cannot be interpreted leaves
//! the field absent (or unchanged) instead of failing the record.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use trawl_core::{Asset, Contacts, Image, Product, ScrapeResult, TextContent};

/// Named entities replaced by their literal characters, in replacement order.
const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&hellip;", "..."),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
];

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#\d+;").expect("Numeric entity regex is hardcoded and valid"));

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&\w+;").expect("Named entity regex is hardcoded and valid"));

/// A parsed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Numeric amount
    pub value: f64,
    /// Three-letter currency code
    pub currency: String,
    /// The string the price was parsed from
    pub original: String,
}

impl Price {
    /// `<CODE><value with two decimals>`, e.g. `USD19.99`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency, self.value)
    }
}

/// Parse a price string such as `$19.99`, `€15,50` or `£1.234,56`.
///
/// When both `.` and `,` occur, whichever comes last is the decimal
/// separator. A lone `,` is decimal only when exactly two digits follow it.
/// The currency comes from the first of `$ € £ ¥ ₹` in the input and
/// defaults to `USD`.
#[must_use]
pub fn normalize_price(price: &str) -> Option<Price> {
    if price.trim().is_empty() {
        return None;
    }

    let cleaned: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let cleaned = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => {
            let parts: Vec<&str> = cleaned.split(',').collect();
            if parts.len() == 2 && parts[1].len() == 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };

    let value: f64 = cleaned.parse().ok()?;

    let currency = price
        .chars()
        .find_map(|c| match c {
            '$' => Some("USD"),
            '€' => Some("EUR"),
            '£' => Some("GBP"),
            '¥' => Some("JPY"),
            '₹' => Some("INR"),
            _ => None,
        })
        .unwrap_or("USD");

    Some(Price {
        value,
        currency: currency.to_string(),
        original: price.to_string(),
    })
}

/// Normalize a phone number to `+<digits>`.
///
/// Numbers with fewer than ten digits are rejected; a bare ten-digit number
/// is taken as North American and gets country code `1`.
#[must_use]
pub fn normalize_phone(phone: &str) -> Option<String> {
    let has_plus = phone
        .chars()
        .find(|c| c.is_ascii_digit() || *c == '+')
        .is_some_and(|c| c == '+');
    let mut digits: String = phone.chars().filter(char::is_ascii_digit).collect();

    if digits.len() < 10 {
        return None;
    }
    if digits.len() == 10 && !has_plus {
        digits.insert(0, '1');
    }

    Some(format!("+{digits}"))
}

/// Resolve common HTML entities, drop the rest, and collapse whitespace.
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut text = text.to_string();
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }

    let text = NUMERIC_ENTITY.replace_all(&text, "");
    let text = NAMED_ENTITY.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve `url` against `base_url` unless it already carries a scheme.
///
/// Unresolvable input is returned unchanged.
#[must_use]
pub fn resolve_url(url: &str, base_url: &str) -> String {
    if url::Url::parse(url).is_ok() {
        return url.to_string();
    }

    url::Url::parse(base_url)
        .and_then(|base| base.join(url))
        .map_or_else(|_| url.to_string(), String::from)
}

fn resolve_optional(url: Option<String>, base_url: &str) -> Option<String> {
    url.map(|u| {
        if u.is_empty() {
            u
        } else {
            resolve_url(&u, base_url)
        }
    })
}

fn dedup_by_key<F>(values: Vec<String>, key: F) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(key(v)))
        .collect()
}

/// Clean text fields, parse the price, and resolve URLs of a product.
///
/// A parsed price adds `price_value` and `price_currency` and rewrites the
/// display price as `<CODE><value:.2>`; an unparsable price is kept as-is.
#[must_use]
pub fn normalize_product(mut product: Product, base_url: &str) -> Product {
    product.title = clean_text(&product.title);
    product.description = product.description.map(|d| clean_text(&d));

    if let Some(parsed) = product.price.as_deref().and_then(normalize_price) {
        product.price = Some(parsed.display());
        product.price_value = Some(parsed.value);
        product.price_currency = Some(parsed.currency);
    }

    product.image = resolve_optional(product.image, base_url);
    product.link = resolve_optional(product.link, base_url);
    product
}

#[must_use]
pub fn normalize_image(mut image: Image, base_url: &str) -> Image {
    image.url = resolve_url(image.url.trim(), base_url);
    image.alt = image.alt.map(|a| clean_text(&a));
    image
}

/// Phones become `+<digits>` (unparsable ones are dropped); emails and
/// socials are trimmed. Each list keeps its first occurrence of a value.
#[must_use]
pub fn normalize_contacts(mut contacts: Contacts) -> Contacts {
    let emails = contacts
        .emails
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    contacts.emails = dedup_by_key(emails, str::to_lowercase);

    let phones = contacts
        .phones
        .iter()
        .filter_map(|p| normalize_phone(p))
        .collect();
    contacts.phones = dedup_by_key(phones, str::to_string);

    let socials = contacts
        .socials
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    contacts.socials = dedup_by_key(socials, str::to_string);

    contacts
}

#[must_use]
pub fn normalize_text(mut text: TextContent) -> TextContent {
    text.title = clean_text(&text.title);
    text.meta = clean_text(&text.meta);
    text.headings = text
        .headings
        .iter()
        .map(|h| clean_text(h))
        .filter(|h| !h.is_empty())
        .collect();
    text.paragraphs = text
        .paragraphs
        .iter()
        .map(|p| clean_text(p))
        .filter(|p| !p.is_empty())
        .collect();
    text
}

#[must_use]
pub fn normalize_asset(mut asset: Asset, base_url: &str) -> Asset {
    asset.filename = asset.filename.trim().to_string();
    asset.url = resolve_url(asset.url.trim(), base_url);
    asset
}

/// Normalize every category present in `result`.
#[must_use]
pub fn normalize_result(result: ScrapeResult, base_url: &str) -> ScrapeResult {
    ScrapeResult {
        products: result.products.map(|products| {
            products
                .into_iter()
                .map(|p| normalize_product(p, base_url))
                .collect()
        }),
        images: result.images.map(|images| {
            images
                .into_iter()
                .map(|i| normalize_image(i, base_url))
                .collect()
        }),
        contacts: result.contacts.map(normalize_contacts),
        text: result.text.map(normalize_text),
        assets: result.assets.map(|assets| {
            assets
                .into_iter()
                .map(|a| normalize_asset(a, base_url))
                .collect()
        }),
    }
}
