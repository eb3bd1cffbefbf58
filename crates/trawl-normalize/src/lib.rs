//! Trawl Normalize - field canonicalization and schema validation.
//!
//! Normalization never fails: prices, phones, text and URLs are brought to
//! canonical form where possible and otherwise left as found. Validation
//! then drops records that break their category's rules, logs them, and
//! reports whether the error rate of the run exceeds a threshold.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod normalizer;
pub mod validator;

pub use normalizer::{
    clean_text, normalize_asset, normalize_contacts, normalize_image, normalize_phone,
    normalize_price, normalize_product, normalize_result, normalize_text, resolve_url, Price,
};
pub use validator::{
    ErrorLogEntry, ThresholdStatus, ValidationError, ValidationReport, Validator,
    DEFAULT_ERROR_THRESHOLD,
};
