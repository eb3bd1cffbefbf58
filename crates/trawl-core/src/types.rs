//! Shared identifiers and enums used across the pipeline.

use crate::error::CoreError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Record categories a page can be scraped for.
///
/// The serialized name doubles as the key of the category in result
/// objects and snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Product listings
    Products,
    /// Image URLs
    Images,
    /// Emails, phone numbers and social profile links
    Contacts,
    /// Title, meta description, headings and paragraphs
    Text,
    /// Downloadable files
    Assets,
}

impl Category {
    /// All categories, in pipeline order.
    pub const ALL: [Category; 5] = [
        Self::Products,
        Self::Images,
        Self::Contacts,
        Self::Text,
        Self::Assets,
    ];

    /// Name used in result objects and snapshot files.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Images => "images",
            Self::Contacts => "contacts",
            Self::Text => "text",
            Self::Assets => "assets",
        }
    }

    /// Whether the category produces a single synthetic record per page.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Contacts | Self::Text)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCategory(s.to_string()))
    }
}

/// Newtype for job identifiers.
///
/// Job IDs name a snapshot directory, so they are restricted to
/// 1-64 ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Create a new `JobId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is empty, too long, or contains characters
    /// outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static JOB_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            JOB_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid job ID: must be 1-64 characters of [A-Za-z0-9_-], got '{id}'"
            )))
        }
    }
}

impl TryFrom<String> for JobId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
