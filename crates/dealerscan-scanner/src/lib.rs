//! DealerScan Scanner - Background dealer locator scan orchestration.
//!
//! This crate walks a fixed list of postal codes, asks the dealer locator for
//! each one, drops dealers already seen during the run, and appends the new
//! ones to a CSV file while exposing progress through a single-flight job
//! tracker.
//!
//! # Features
//!
//! - At most one background scan at a time
//! - Fixed pause between resolver calls to respect the locator's rate limit
//! - Per-item failures are counted and logged, never abort the run
//! - Incremental, append-only CSV output truncated once per run
//!
//! # Example
//!
//! ```rust,ignore
//! use dealerscan_core::AppConfig;
//! use dealerscan_scanner::ScanService;
//!
//! let service = ScanService::from_config(&AppConfig::load_with_env()?)?;
//! let response = service.start_scan(1)?;
//! assert!(response.accepted);
//!
//! let status = service.get_status();
//! println!("{:.1}% complete", status.percent_complete);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod dedup;
#[allow(missing_docs)]
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod service;
pub mod tracker;
pub mod writer;

// Re-export commonly used types
pub use dedup::DedupStore;
pub use error::{ResolveError, Result, ScanError};
pub use orchestrator::{ItemOutcome, ScanHandle, ScanOrchestrator, ScanSummary};
pub use resolver::{HttpResolver, RecordResolver};
pub use service::{ScanService, StartScanResponse};
pub use tracker::{JobSnapshot, JobState, JobStatus, JobTracker};
pub use writer::{CsvRecordWriter, COLUMNS};
