//! Content hashing for records.
//!
//! A record is serialized to JSON with object keys sorted at every level
//! and hashed with SHA-256. The identity hashes only the configured key
//! fields; the fingerprint hashes the whole record.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Hash of a record's key fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

/// Hash of a whole record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Identity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Fingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity of `record` over `key_fields`.
///
/// Key fields the record does not carry are left out of the hash, so two
/// records missing the same field can still share an identity.
pub fn identity<R, S>(record: &R, key_fields: &[S]) -> Result<Identity>
where
    R: Serialize + ?Sized,
    S: AsRef<str>,
{
    let value = serde_json::to_value(record)?;
    let mut keyed = Map::new();

    if let Value::Object(fields) = &value {
        for key in key_fields {
            let key = key.as_ref();
            if let Some(field) = fields.get(key) {
                keyed.insert(key.to_string(), field.clone());
            }
        }
    }

    Ok(Identity(digest(&Value::Object(keyed))?))
}

/// Fingerprint of the full `record`.
pub fn fingerprint<R>(record: &R) -> Result<Fingerprint>
where
    R: Serialize + ?Sized,
{
    let value = serde_json::to_value(record)?;
    Ok(Fingerprint(digest(&value)?))
}

/// Keep the first record of every identity, preserving order.
pub fn deduplicate<R, S>(records: Vec<R>, key_fields: &[S]) -> Result<Vec<R>>
where
    R: Serialize,
    S: AsRef<str>,
{
    let mut seen = HashSet::with_capacity(records.len());
    let mut unique = Vec::with_capacity(records.len());

    for record in records {
        if seen.insert(identity(&record, key_fields)?) {
            unique.push(record);
        }
    }

    Ok(unique)
}

fn digest(value: &Value) -> Result<String> {
    let canonical = serde_json::to_vec(&sorted(value))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

// Rebuild objects with their keys in sorted order, whatever map backend
// serde_json was compiled with.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trawl_core::Product;

    fn product(title: &str, link: Option<&str>, price: &str) -> Product {
        Product {
            title: title.to_string(),
            link: link.map(String::from),
            price: Some(price.to_string()),
            ..Product::default()
        }
    }

    #[test]
    fn test_identity_ignores_non_key_fields() {
        let a = product("Lamp", Some("https://x.com/lamp"), "USD10.00");
        let b = product("Lamp", Some("https://x.com/lamp"), "USD12.00");
        let keys = ["title", "link"];

        assert_eq!(identity(&a, &keys).unwrap(), identity(&b, &keys).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_identity_independent_of_key_order() {
        let record = json!({ "title": "Lamp", "url": "https://x.com" });
        assert_eq!(
            identity(&record, &["title", "url"]).unwrap(),
            identity(&record, &["url", "title"]).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_independent_of_field_order() {
        let a = json!({ "a": 1, "b": { "y": 2, "x": [1, { "q": 1, "p": 2 }] } });
        let b = json!({ "b": { "x": [1, { "p": 2, "q": 1 }], "y": 2 }, "a": 1 });
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_missing_key_fields_are_skipped() {
        let with_missing = json!({ "title": "Lamp" });
        let with_null = json!({ "title": "Lamp", "link": null });

        let keys = ["title", "link"];
        assert_ne!(
            identity(&with_missing, &keys).unwrap(),
            identity(&with_null, &keys).unwrap()
        );
        assert_eq!(
            identity(&with_missing, &keys).unwrap(),
            identity(&json!({ "title": "Lamp", "price": "1" }), &keys).unwrap()
        );
    }

    #[test]
    fn test_digest_is_lowercase_sha256_hex() {
        let id = identity(&json!({}), &["title"]).unwrap();
        assert_eq!(id.as_str().len(), 64);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        // sha256("{}")
        assert_eq!(
            id.as_str(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let records = vec![
            product("Lamp", Some("/a"), "USD1.00"),
            product("Desk", Some("/b"), "USD2.00"),
            product("Lamp", Some("/a"), "USD3.00"),
        ];

        let unique = deduplicate(records, &["title", "link"]).unwrap();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].price.as_deref(), Some("USD1.00"));
        assert_eq!(unique[1].title, "Desk");
    }

    #[test]
    fn test_deduplicate_empty() {
        let unique = deduplicate(Vec::<Product>::new(), &["title"]).unwrap();
        assert!(unique.is_empty());
    }
}
