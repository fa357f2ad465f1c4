//! Dealer lookup for a single postal code.
//!
//! The scan loop only sees the [`RecordResolver`] trait. [`HttpResolver`] is the
//! production adapter: it geocodes the postal code, then queries the dealer
//! locator around the resulting coordinates.

use crate::error::ResolveError;
use async_trait::async_trait;
use dealerscan_core::{RawRecord, ResolverConfig, ZipCode};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Keys under which locator responses wrap their dealer array.
const WRAPPER_KEYS: [&str; 3] = ["dealers", "results", "data"];

/// Source of raw dealer records for a postal code.
///
/// "No dealers" is an empty vector, never an error.
#[async_trait]
pub trait RecordResolver: Send + Sync {
    /// Look up every dealer the locator returns for `zip`.
    async fn resolve(&self, zip: &ZipCode) -> Result<Vec<RawRecord>, ResolveError>;
}

/// Coordinates returned by the geocoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

/// Resolver backed by a geocoding service and an HTTP dealer locator.
pub struct HttpResolver {
    client: Client,
    config: ResolverConfig,
}

impl HttpResolver {
    /// Build the HTTP client from configuration.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ResolveError> {
        let response = self.client.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }

    async fn geocode(&self, zip: &ZipCode) -> Result<Option<Coordinates>, ResolveError> {
        let body = self
            .get_text(
                &self.config.geocode_url,
                &[
                    ("postalcode", zip.to_string()),
                    ("country", "us".to_string()),
                    ("format", "json".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        parse_geocode(&body)
    }
}

#[async_trait]
impl RecordResolver for HttpResolver {
    async fn resolve(&self, zip: &ZipCode) -> Result<Vec<RawRecord>, ResolveError> {
        let Some(coords) = self.geocode(zip).await? else {
            tracing::debug!("Geocoder has no match for {}", zip);
            return Ok(Vec::new());
        };

        let body = self
            .get_text(
                &self.config.dealer_search_url,
                &[
                    ("lat", coords.lat.to_string()),
                    ("lng", coords.lon.to_string()),
                    ("radius", self.config.search_radius_miles.to_string()),
                    ("zip", zip.to_string()),
                ],
            )
            .await?;
        parse_dealers(&body)
    }
}

/// Read the first hit of a Nominatim-style geocoder response.
///
/// Coordinates may be JSON strings or numbers. An empty array means the
/// postal code is unknown.
pub fn parse_geocode(body: &str) -> Result<Option<Coordinates>, ResolveError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResolveError::Parse(format!("geocoder response is not JSON: {e}")))?;

    let hits = value
        .as_array()
        .ok_or_else(|| ResolveError::Parse("geocoder response is not an array".to_string()))?;

    let Some(first) = hits.first() else {
        return Ok(None);
    };

    let lat = coordinate(first, "lat")?;
    let lon = coordinate(first, "lon")?;
    Ok(Some(Coordinates { lat, lon }))
}

fn coordinate(hit: &Value, key: &str) -> Result<f64, ResolveError> {
    let parsed = match hit.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ResolveError::Parse(format!("geocoder hit has no usable '{key}'")))
}

/// Extract dealer records from a locator response.
///
/// Accepts a bare array or an object wrapping the array under `dealers`,
/// `results` or `data`. Entries that are not JSON objects are skipped.
pub fn parse_dealers(body: &str) -> Result<Vec<RawRecord>, ResolveError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResolveError::Parse(format!("dealer response is not JSON: {e}")))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(entries)) => Some(entries),
                _ => None,
            })
            .ok_or_else(|| {
                ResolveError::Parse(format!(
                    "dealer response has none of {WRAPPER_KEYS:?} holding an array"
                ))
            })?,
        other => {
            return Err(ResolveError::Parse(format!(
                "unexpected dealer response shape: {other}"
            )))
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match RawRecord::try_from(entry) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping dealer entry: {}", e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_geocode_string_coordinates() {
        let body = r#"[{"lat": "40.7506", "lon": "-73.9971", "display_name": "10001"}]"#;
        let coords = parse_geocode(body).unwrap().expect("one hit");
        assert!((coords.lat - 40.7506).abs() < 1e-9);
        assert!((coords.lon + 73.9971).abs() < 1e-9);
    }

    #[test]
    fn test_parse_geocode_numeric_coordinates() {
        let coords = parse_geocode(r#"[{"lat": 40.5, "lon": -74.25}]"#)
            .unwrap()
            .expect("one hit");
        assert_eq!(coords, Coordinates { lat: 40.5, lon: -74.25 });
    }

    #[test]
    fn test_parse_geocode_no_results() {
        assert_eq!(parse_geocode("[]").unwrap(), None);
    }

    #[test]
    fn test_parse_geocode_errors() {
        assert!(matches!(parse_geocode("<html>"), Err(ResolveError::Parse(_))));
        assert!(matches!(parse_geocode("{}"), Err(ResolveError::Parse(_))));
        assert!(matches!(
            parse_geocode(r#"[{"lat": "north"}]"#),
            Err(ResolveError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_dealers_bare_array() {
        let body = r#"[{"company_name": "Acme", "contact_addr": "1 Main St"}, {"id": 7}]"#;
        let records = parse_dealers(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].field("company_name"), "Acme");
        assert_eq!(records[1].field("id"), "7");
    }

    #[test]
    fn test_parse_dealers_wrapped() {
        for key in WRAPPER_KEYS {
            let body = format!(r#"{{"total": 1, "{key}": [{{"company_name": "Acme"}}]}}"#);
            let records = parse_dealers(&body).unwrap();
            assert_eq!(records.len(), 1, "wrapper key {key}");
        }
    }

    #[test]
    fn test_parse_dealers_empty() {
        assert!(parse_dealers("[]").unwrap().is_empty());
        assert!(parse_dealers(r#"{"dealers": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_dealers_skips_non_objects() {
        let records = parse_dealers(r#"[{"company_name": "Acme"}, "junk", 3]"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_dealers_errors() {
        assert!(matches!(parse_dealers("not json"), Err(ResolveError::Parse(_))));
        assert!(matches!(
            parse_dealers(r#"{"message": "ok"}"#),
            Err(ResolveError::Parse(_))
        ));
        assert!(matches!(parse_dealers("42"), Err(ResolveError::Parse(_))));
    }

    #[test]
    fn test_http_resolver_builds_from_default_config() {
        assert!(HttpResolver::new(ResolverConfig::default()).is_ok());
    }
}
