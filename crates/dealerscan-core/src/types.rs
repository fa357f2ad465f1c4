//! Shared types used across the DealerScan application.
//!
//! This module defines the newtypes that flow through a scan: the postal code
//! driving one resolver call, the raw dealer record that comes back, and the
//! identity key used to recognise the same dealer twice within a run.

use crate::error::DealerScanError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

/// Field holding the dealer's company name in a raw record.
pub const COMPANY_NAME_FIELD: &str = "company_name";

/// Field holding the dealer's street address in a raw record.
pub const CONTACT_ADDR_FIELD: &str = "contact_addr";

/// Newtype for postal code identifiers with validation.
///
/// Postal codes are treated as opaque: 3-10 ASCII letters, digits, spaces or
/// hyphens, starting with a letter or digit. Surrounding whitespace is trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    /// Create a new `ZipCode` from a string.
    ///
    /// # Errors
    /// Returns error if the trimmed value doesn't match the accepted format.
    pub fn new(code: impl AsRef<str>) -> Result<Self, DealerScanError> {
        let code = code.as_ref().trim();
        Self::validate(code)?;
        Ok(Self(code.to_string()))
    }

    /// Create a `ZipCode` from its numeric form, restoring leading zeros
    /// dropped by integer storage (`7001` becomes `07001`).
    ///
    /// # Errors
    /// Returns error if the number has more than ten digits.
    pub fn from_number(code: u64) -> Result<Self, DealerScanError> {
        Self::new(format!("{code:05}"))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), DealerScanError> {
        static ZIP_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = ZIP_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 -]{2,9}$").expect("valid regex"));

        if regex.is_match(code) {
            Ok(())
        } else {
            Err(DealerScanError::Validation(format!(
                "invalid postal code: expected 3-10 letters, digits, spaces or hyphens, got '{code}'"
            )))
        }
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = DealerScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// Unstructured dealer data returned by the resolver for one postal code.
///
/// No field is guaranteed to be present; readers go through [`RawRecord::field`],
/// which renders missing values as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Set a field, returning the record for chaining.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Render a field as text.
    ///
    /// Strings are returned verbatim, numbers and booleans in their display
    /// form. Missing, null, array and object values become `""`.
    #[must_use]
    pub fn field(&self, name: &str) -> String {
        match self.0.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Null | Value::Array(_) | Value::Object(_)) | None => String::new(),
        }
    }

    /// Derive the identity key used for duplicate detection.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::from_parts(
            &self.field(COMPANY_NAME_FIELD),
            &self.field(CONTACT_ADDR_FIELD),
        )
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = DealerScanError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DealerScanError::Validation(format!(
                "dealer record must be a JSON object, got {other}"
            ))),
        }
    }
}

/// Normalized company + address string identifying one dealer within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Build a key as `normalize(company) + "-" + normalize(address)`.
    #[must_use]
    pub fn from_parts(company_name: &str, address: &str) -> Self {
        Self(format!("{}-{}", normalize(company_name), normalize(address)))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
