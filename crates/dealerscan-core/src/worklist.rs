//! The fixed, ordered list of postal codes a scan walks through.

use crate::error::{DealerScanError, Result};
use crate::types::ZipCode;
use std::fs;
use std::path::Path;

/// Postal codes bundled with the application.
const BUNDLED_ZIP_CODES: &str = include_str!("../data/zip_codes.txt");

/// Ordered, immutable list of work items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    items: Vec<ZipCode>,
}

impl WorkList {
    /// The list shipped with the application.
    ///
    /// # Errors
    /// Returns error if the bundled file contains a malformed code.
    pub fn bundled() -> Result<Self> {
        Self::parse(BUNDLED_ZIP_CODES)
    }

    /// Load a work list from a text file.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading work list from {}", path.display());
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse one postal code per line, skipping blank lines and `#` comments.
    ///
    /// Purely numeric codes shorter than five digits are treated as exports
    /// that lost their leading zeros and are padded back (`7001` is `07001`).
    ///
    /// # Errors
    /// Returns a validation error naming the first malformed line.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut items = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let zip = match line.parse::<u64>() {
                Ok(number) if line.len() < 5 => ZipCode::from_number(number),
                _ => ZipCode::new(line),
            }
            .map_err(|e| {
                DealerScanError::Validation(format!("work list line {}: {e}", index + 1))
            })?;
            items.push(zip);
        }
        Ok(Self { items })
    }

    /// Take every `factor`th item starting at index 0.
    ///
    /// A factor larger than the list yields only the first item; an empty
    /// list yields an empty subset.
    ///
    /// # Errors
    /// Returns a validation error if `factor` is zero.
    pub fn sparsify(&self, factor: usize) -> Result<Vec<ZipCode>> {
        if factor == 0 {
            return Err(DealerScanError::Validation(
                "sparsify factor must be at least 1".to_string(),
            ));
        }
        Ok(self.items.iter().step_by(factor).cloned().collect())
    }

    /// Number of items in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn codes(list: &[ZipCode]) -> Vec<&str> {
        list.iter().map(ZipCode::as_str).collect()
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let list = WorkList::parse("# header\n10001\n\n  10002  \n# trailing\n").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(codes(&list.sparsify(1).unwrap()), vec!["10001", "10002"]);
    }

    #[test]
    fn test_parse_restores_leading_zeros() {
        let list = WorkList::parse("7001\n501\n07002\n10001\n").unwrap();
        assert_eq!(
            codes(&list.sparsify(1).unwrap()),
            vec!["07001", "00501", "07002", "10001"]
        );
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let err = WorkList::parse("10001\nnot;a;zip\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "got: {err}");
    }

    #[test]
    fn test_sparsify_every_nth_from_zero() {
        let list = WorkList::parse(
            &(10001..=10010)
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
        .unwrap();

        assert_eq!(codes(&list.sparsify(5).unwrap()), vec!["10001", "10006"]);
        assert_eq!(list.sparsify(1).unwrap().len(), 10);
        assert_eq!(codes(&list.sparsify(100).unwrap()), vec!["10001"]);
    }

    #[test]
    fn test_sparsify_zero_rejected() {
        let list = WorkList::parse("10001").unwrap();
        assert!(matches!(
            list.sparsify(0),
            Err(DealerScanError::Validation(_))
        ));
    }

    #[test]
    fn test_sparsify_empty_list() {
        let list = WorkList::default();
        assert!(list.is_empty());
        assert!(list.sparsify(3).unwrap().is_empty());
    }

    #[test]
    fn test_bundled_list_is_valid() {
        let list = WorkList::bundled().expect("bundled list parses");
        assert!(!list.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "07001\n07002").expect("write work list");

        let list = WorkList::load(file.path()).expect("load work list");
        assert_eq!(list.len(), 2);
    }
}
