//! Operations exposed to the front door: start, status, test scan, debug.
//!
//! `ScanService` owns the orchestrator and the work list and translates raw
//! caller input (stride, postal code strings) into validated calls.

use crate::error::{Result, ScanError};
use crate::orchestrator::{ScanOrchestrator, ScanSummary};
use crate::resolver::{HttpResolver, RecordResolver};
use crate::tracker::JobSnapshot;
use crate::writer::CsvRecordWriter;
use dealerscan_core::{AppConfig, RawRecord, WorkList, ZipCode};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Longest list accepted by [`ScanService::run_test_scan`].
pub const MAX_TEST_SCAN_ITEMS: usize = 25;

/// Acknowledgment of a start request.
#[derive(Debug, Clone, Serialize)]
pub struct StartScanResponse {
    /// False if a scan was already running
    pub accepted: bool,
    /// Postal codes in the new run (0 when rejected)
    pub total: usize,
    /// Identifier of the new run
    pub run_id: Option<Uuid>,
}

/// Front-door facade over the scan orchestrator.
pub struct ScanService {
    orchestrator: Arc<ScanOrchestrator>,
    work_list: WorkList,
    active: Mutex<Option<CancellationToken>>,
}

impl ScanService {
    /// Create a service over an existing orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<ScanOrchestrator>, work_list: WorkList) -> Self {
        Self {
            orchestrator,
            work_list,
            active: Mutex::new(None),
        }
    }

    /// Wire the production resolver, output file and work list from config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let resolver =
            HttpResolver::new(config.resolver.clone()).map_err(ScanError::ResolverSetup)?;
        let work_list = match &config.scan.work_list_path {
            Some(path) => WorkList::load(path)?,
            None => WorkList::bundled()?,
        };
        tracing::info!("Work list holds {} postal codes", work_list.len());

        Self::with_resolver(config, Arc::new(resolver), work_list)
    }

    /// Like [`ScanService::from_config`] with a caller-supplied resolver.
    pub fn with_resolver(
        config: &AppConfig,
        resolver: Arc<dyn RecordResolver>,
        work_list: WorkList,
    ) -> Result<Self> {
        let orchestrator = ScanOrchestrator::new(
            resolver,
            CsvRecordWriter::new(config.output_path()?),
        )
        .with_item_delay(Duration::from_millis(config.scan.item_delay_ms));

        Ok(Self::new(Arc::new(orchestrator), work_list))
    }

    /// Start a background scan over every `sparsify`th postal code.
    ///
    /// Returns `accepted: false` if a scan is already running.
    ///
    /// # Errors
    /// `InvalidInput` if `sparsify` is zero, `Write` if the output file cannot
    /// be truncated.
    pub fn start_scan(&self, sparsify: usize) -> Result<StartScanResponse> {
        let items = self
            .work_list
            .sparsify(sparsify)
            .map_err(ScanError::invalid_input)?;
        let total = items.len();

        match self.orchestrator.start(items) {
            Ok(handle) => {
                tracing::info!(
                    "Accepted scan request: {} of {} postal codes (every {})",
                    total,
                    self.work_list.len(),
                    sparsify
                );
                *self.lock_active() = Some(handle.cancel_token());
                Ok(StartScanResponse {
                    accepted: true,
                    total,
                    run_id: Some(handle.run_id()),
                })
            }
            Err(ScanError::AlreadyRunning) => {
                tracing::info!("Rejected scan request: a scan is already running");
                Ok(StartScanResponse {
                    accepted: false,
                    total: 0,
                    run_id: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Current job state.
    #[must_use]
    pub fn get_status(&self) -> JobSnapshot {
        self.orchestrator.tracker().snapshot()
    }

    /// Run the scan logic synchronously over a short caller-supplied list.
    ///
    /// # Errors
    /// `InvalidInput` if the list is empty, too long, or holds a malformed code.
    pub async fn run_test_scan<S: AsRef<str>>(&self, codes: &[S]) -> Result<ScanSummary> {
        if codes.is_empty() || codes.len() > MAX_TEST_SCAN_ITEMS {
            return Err(ScanError::InvalidInput(format!(
                "test scans take 1-{MAX_TEST_SCAN_ITEMS} postal codes, got {}",
                codes.len()
            )));
        }
        let items = codes
            .iter()
            .map(|code| ZipCode::new(code).map_err(ScanError::invalid_input))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.orchestrator.run_test_scan(&items).await)
    }

    /// Resolve one postal code and return its raw records.
    ///
    /// # Errors
    /// `InvalidInput` for a malformed code, `Resolve` if the lookup fails.
    pub async fn debug_one(&self, code: &str) -> Result<Vec<RawRecord>> {
        let zip = ZipCode::new(code).map_err(ScanError::invalid_input)?;
        self.orchestrator.debug_one(&zip).await
    }

    /// Ask a running scan to stop before its next postal code.
    pub fn shutdown(&self) {
        if let Some(token) = self.lock_active().take() {
            tracing::info!("Stopping background scan");
            token.cancel();
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active
            .lock()
            .expect("Mutex poisoned: another thread panicked while holding the scan token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoDealers;

    #[async_trait]
    impl RecordResolver for NoDealers {
        async fn resolve(&self, _zip: &ZipCode) -> std::result::Result<Vec<RawRecord>, ResolveError> {
            Ok(Vec::new())
        }
    }

    fn service(tmp: &TempDir, codes: &str) -> ScanService {
        let mut config = AppConfig::default();
        config.scan.output_path = Some(tmp.path().join("dealers.csv"));
        config.scan.item_delay_ms = 0;
        ScanService::with_resolver(&config, Arc::new(NoDealers), WorkList::parse(codes).unwrap())
            .expect("build service")
    }

    #[tokio::test]
    async fn test_start_scan_rejects_zero_sparsify() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp, "10001\n10002");

        let err = service.start_scan(0).unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput(_)));
        assert_eq!(service.get_status().status, crate::tracker::JobStatus::Idle);
    }

    #[tokio::test]
    async fn test_test_scan_input_validation() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp, "10001");

        let empty: [&str; 0] = [];
        assert!(matches!(
            service.run_test_scan(&empty).await,
            Err(ScanError::InvalidInput(_))
        ));

        let too_many = vec!["10001"; MAX_TEST_SCAN_ITEMS + 1];
        assert!(matches!(
            service.run_test_scan(too_many.as_slice()).await,
            Err(ScanError::InvalidInput(_))
        ));

        assert!(matches!(
            service.run_test_scan(&["10001", "bad;zip"]).await,
            Err(ScanError::InvalidInput(_))
        ));

        let summary = service.run_test_scan(&["10001", "10002"]).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.accepted, 0);
    }

    #[tokio::test]
    async fn test_debug_one_rejects_malformed_code() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp, "10001");

        assert!(matches!(
            service.debug_one("").await,
            Err(ScanError::InvalidInput(_))
        ));
        assert!(service.debug_one("10001").await.unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_without_scan_is_noop() {
        let tmp = TempDir::new().unwrap();
        let service = service(&tmp, "10001");
        service.shutdown();
        assert_eq!(service.get_status().status, crate::tracker::JobStatus::Idle);
    }
}
