//! Incremental CSV output of accepted dealer records.

use crate::error::{Result, ScanError};
use dealerscan_core::RawRecord;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Column order of the output table. Also the verbatim header row.
pub const COLUMNS: [&str; 8] = [
    "id",
    "first_name",
    "last_name",
    "phone",
    "tel",
    "email",
    "company_name",
    "contact_addr",
];

/// Appends accepted records to a CSV file, one batch per postal code.
///
/// The file is truncated once per run by [`CsvRecordWriter::reset`] and only
/// ever appended to afterwards.
#[derive(Debug, Clone)]
pub struct CsvRecordWriter {
    path: PathBuf,
}

impl CsvRecordWriter {
    /// Create a writer targeting `path`. Nothing is touched on disk yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create or truncate the output file to zero length.
    pub fn reset(&self) -> Result<()> {
        self.try_reset().map_err(|source| ScanError::Write {
            path: self.path.clone(),
            written: 0,
            lost: 0,
            source,
        })
    }

    fn try_reset(&self) -> std::result::Result<(), csv::Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        File::create(&self.path)?;
        tracing::debug!("Truncated output file {}", self.path.display());
        Ok(())
    }

    /// Append `records` as rows, writing the header first if the file is empty.
    ///
    /// An empty slice is a no-op and leaves the file byte-for-byte unchanged.
    /// Returns the number of rows written. On failure the error carries how
    /// many rows of the batch reached the file before it.
    pub fn append(&self, records: &[RawRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut written = 0;
        self.try_append(records, &mut written)
            .map_err(|source| ScanError::Write {
                path: self.path.clone(),
                written,
                lost: records.len() - written,
                source,
            })?;
        Ok(written)
    }

    fn try_append(
        &self,
        records: &[RawRecord],
        written: &mut usize,
    ) -> std::result::Result<(), csv::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;
        write_rows(file, needs_header, records, written)
    }
}

/// Write the optional header and one row per record to `out`.
///
/// Every row is flushed on its own, so `written` counts the rows that were
/// handed to `out` in full.
fn write_rows<W: Write>(
    out: W,
    header: bool,
    records: &[RawRecord],
    written: &mut usize,
) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    if header {
        writer.write_record(COLUMNS)?;
        writer.flush()?;
    }
    for record in records {
        writer.write_record(COLUMNS.iter().map(|column| record.field(column)))?;
        writer.flush()?;
        *written += 1;
    }
    Ok(())
}
