//! Contact extraction: emails, phone numbers and social profile links.

use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use trawl_browser::RenderedPage;
use trawl_core::{Contacts, Record};
use trawl_normalize::resolve_url;

/// Most values kept per contact kind.
pub const MAX_PER_KIND: usize = 20;

/// Hosts whose links count as social profiles.
pub const SOCIAL_HOSTS: &[&str] = &[
    "linkedin.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "youtube.com",
    "github.com",
    "tiktok.com",
];

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
        .expect("Email regex is hardcoded and valid")
});

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?1[-.]?)?\(?([0-9]{3})\)?[-.]?([0-9]{3})[-.]?([0-9]{4})")
        .expect("Phone regex is hardcoded and valid")
});

/// Ordered set capped at [`MAX_PER_KIND`].
#[derive(Default)]
struct Collected {
    seen: HashSet<String>,
    values: Vec<String>,
}

impl Collected {
    fn push(&mut self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() && self.seen.insert(value.clone()) {
            self.values.push(value);
        }
    }

    fn into_vec(mut self) -> Vec<String> {
        self.values.truncate(MAX_PER_KIND);
        self.values
    }
}

/// Collects emails, phone numbers and social profile links into one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactStrategy;

impl ContactStrategy {
    pub async fn extract(&self, page: &dyn RenderedPage, base_url: &str) -> Result<Vec<Record>> {
        let body_text = page
            .query_one(None, "body")
            .await?
            .map(|body| body.text().to_string())
            .unwrap_or_default();

        let mut emails = Collected::default();
        for link in page.query_all(None, r#"a[href^="mailto:"]"#).await? {
            if let Some(href) = link.attr("href") {
                let address = href.trim_start_matches("mailto:");
                emails.push(address.split('?').next().unwrap_or_default().trim());
            }
        }
        for found in EMAIL.find_iter(&body_text) {
            emails.push(found.as_str());
        }

        let mut phones = Collected::default();
        for link in page.query_all(None, r#"a[href^="tel:"]"#).await? {
            if let Some(href) = link.attr("href") {
                let number: String = href
                    .trim_start_matches("tel:")
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '+')
                    .collect();
                phones.push(number);
            }
        }
        for found in PHONE.find_iter(&body_text) {
            phones.push(found.as_str());
        }

        let mut socials = Collected::default();
        for link in page.query_all(None, "a[href]").await? {
            let Some(href) = link.attr("href") else {
                continue;
            };
            let lower = href.to_lowercase();
            if SOCIAL_HOSTS.iter().any(|host| lower.contains(host)) {
                socials.push(resolve_url(href, base_url));
            }
        }

        let contacts = Contacts {
            emails: emails.into_vec(),
            phones: phones.into_vec(),
            socials: socials.into_vec(),
            ..Contacts::default()
        };

        tracing::debug!(
            emails = contacts.emails.len(),
            phones = contacts.phones.len(),
            socials = contacts.socials.len(),
            "contacts collected"
        );

        Ok(vec![Record::Contacts(contacts)])
    }

    /// Coarse check: at least one contact of any kind.
    #[must_use]
    pub fn validate(contacts: &Contacts) -> bool {
        !contacts.is_empty()
    }
}
