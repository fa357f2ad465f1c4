//! DealerScan Core - Foundation crate for the DealerScan dealer locator scanner.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the postal code work list that the other DealerScan crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`ZipCode`, `RawRecord`, `IdentityKey`)
//! - [`worklist`] - The ordered postal code list and its sparsified subsets
//!
//! # Example
//!
//! ```rust
//! use dealerscan_core::{AppConfig, WorkList};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let work_list = WorkList::bundled()?;
//! let subset = work_list.sparsify(config.scan.default_sparsify)?;
//! assert_eq!(subset.len(), work_list.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;
pub mod worklist;

// Re-export commonly used types
pub use config::{AppConfig, ResolverConfig, ScanConfig};
pub use error::{ConfigError, ConfigResult, DealerScanError, Result};
pub use types::{IdentityKey, RawRecord, ZipCode};
pub use worklist::WorkList;
