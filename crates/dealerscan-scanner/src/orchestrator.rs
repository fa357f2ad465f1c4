//! Scan orchestrator driving postal codes through resolve, dedup and write.
//!
//! This module provides the `ScanOrchestrator`, which walks a work list one
//! postal code at a time, pausing between resolver calls, and records every
//! item in the [`JobTracker`]. A failing item is counted and logged; it never
//! stops the loop.

use crate::dedup::DedupStore;
use crate::error::{Result, ScanError};
use crate::resolver::RecordResolver;
use crate::tracker::JobTracker;
use crate::writer::CsvRecordWriter;
use dealerscan_core::config::DEFAULT_ITEM_DELAY_MS;
use dealerscan_core::{RawRecord, ZipCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default pause between two resolver calls.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(DEFAULT_ITEM_DELAY_MS);

/// What happened to one postal code.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Resolved; `accepted` are the records new to this run (already
    /// persisted when the scan has a writer).
    Resolved {
        /// Records new to this run
        accepted: Vec<RawRecord>,
        /// Records rejected as already seen
        duplicates: usize,
    },
    /// The resolver failed; nothing was deduplicated or written.
    ResolveFailed(ScanError),
    /// New records were found but not all of them reached the output file.
    WriteFailed {
        /// The write error, carrying the number of records lost
        error: ScanError,
        /// Records appended before the failure
        written: usize,
        /// Records rejected as already seen
        duplicates: usize,
    },
}

/// Aggregate result of a foreground test scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Postal codes handled
    pub processed: usize,
    /// Unique records found
    pub accepted: usize,
    /// Records rejected as already seen
    pub duplicates: usize,
    /// Postal codes whose lookup failed
    pub errors: usize,
    /// Postal codes whose lookup failed, in order
    pub failed_items: Vec<ZipCode>,
    /// The unique records, in acceptance order
    pub records: Vec<RawRecord>,
}

/// Handle to a scan running in the background.
#[derive(Debug)]
pub struct ScanHandle {
    run_id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// Identifier the tracker assigned to this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Token checked by the loop before every postal code.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to end.
    pub async fn wait(self) -> std::result::Result<(), JoinError> {
        self.task.await
    }
}

/// Releases the single-flight gate if the loop exits without finishing,
/// e.g. when it panics or its task is dropped at runtime shutdown.
///
/// Only ever aborts its own run; once that run has ended the guard is inert.
struct RunGuard<'a> {
    tracker: &'a JobTracker,
    run_id: Uuid,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.tracker.abort(self.run_id) {
            error!("Scan loop exited before finishing, marking job aborted");
        }
    }
}

/// Orchestrates the postal code scan.
pub struct ScanOrchestrator {
    /// Dealer lookup per postal code
    resolver: Arc<dyn RecordResolver>,
    /// Output table for accepted records
    writer: CsvRecordWriter,
    /// Single-flight job state
    tracker: Arc<JobTracker>,
    /// Pause between resolver calls
    item_delay: Duration,
}

impl ScanOrchestrator {
    /// Create a new scan orchestrator with an idle tracker.
    #[must_use]
    pub fn new(resolver: Arc<dyn RecordResolver>, writer: CsvRecordWriter) -> Self {
        Self {
            resolver,
            writer,
            tracker: Arc::new(JobTracker::new()),
            item_delay: DEFAULT_ITEM_DELAY,
        }
    }

    /// Set the pause between resolver calls.
    #[must_use]
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Job state shared with status queries.
    #[must_use]
    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Start a background scan over `items`.
    ///
    /// Admission and output truncation happen before this returns; the loop
    /// itself runs on a spawned task. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// - `AlreadyRunning` if another scan has not finished yet
    /// - `Write` if the output file cannot be truncated
    pub fn start(self: &Arc<Self>, items: Vec<ZipCode>) -> Result<ScanHandle> {
        // Truncation happens inside admission, so a failure keeps the
        // previous run's status.
        let run_id = match self
            .tracker
            .try_start_with(items.len(), || self.writer.reset())
        {
            Ok(Some(run_id)) => run_id,
            Ok(None) => return Err(ScanError::AlreadyRunning),
            Err(err) => {
                error!("Cannot prepare output file: {}", err);
                return Err(err);
            }
        };

        let cancel = CancellationToken::new();
        let orchestrator = Arc::clone(self);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            orchestrator.run_scan(run_id, items, token).await;
        });

        Ok(ScanHandle {
            run_id,
            cancel,
            task,
        })
    }

    async fn run_scan(&self, run_id: Uuid, items: Vec<ZipCode>, cancel: CancellationToken) {
        let _guard = RunGuard {
            tracker: &self.tracker,
            run_id,
        };
        let mut dedup = DedupStore::new();
        let total = items.len();

        info!(
            "Scan started: {} postal codes, writing to {}",
            total,
            self.writer.path().display()
        );

        for (index, zip) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Scan cancelled after {}/{} postal codes", index, total);
                self.tracker.abort(run_id);
                return;
            }

            match self.process_item(zip, &mut dedup, Some(&self.writer)).await {
                ItemOutcome::Resolved {
                    accepted,
                    duplicates,
                } => {
                    debug!(
                        "{}: {} new dealers, {} duplicates ({}/{})",
                        zip,
                        accepted.len(),
                        duplicates,
                        index + 1,
                        total
                    );
                    self.tracker
                        .record_processed(run_id, zip, accepted.len(), duplicates, false);
                }
                ItemOutcome::ResolveFailed(err) => {
                    warn!("Skipping {}: {}", zip, err);
                    self.tracker.record_processed(run_id, zip, 0, 0, true);
                }
                ItemOutcome::WriteFailed {
                    error,
                    written,
                    duplicates,
                } => {
                    error!("Dealer records lost for {}: {}", zip, error);
                    self.tracker
                        .record_processed(run_id, zip, written, duplicates, true);
                }
            }

            if index + 1 < total {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(self.item_delay) => {}
                }
            }
        }

        // Read the final counters while the run still owns the tracker.
        let state = self.tracker.snapshot().state;
        self.tracker.finish(run_id);

        info!(
            "Scan completed: {} postal codes, {} unique dealers, {} duplicates, {} errors",
            state.processed, state.accepted, state.duplicates, state.errors
        );
    }

    /// Resolve one postal code, deduplicate, and append new records if a
    /// writer is given.
    async fn process_item(
        &self,
        zip: &ZipCode,
        dedup: &mut DedupStore,
        writer: Option<&CsvRecordWriter>,
    ) -> ItemOutcome {
        let records = match self.resolver.resolve(zip).await {
            Ok(records) => records,
            Err(source) => {
                return ItemOutcome::ResolveFailed(ScanError::Resolve {
                    zip: zip.clone(),
                    source,
                })
            }
        };

        let (accepted, duplicates) = dedup.partition(records);

        if let Some(writer) = writer {
            if let Err(error) = writer.append(&accepted) {
                let written = match &error {
                    ScanError::Write { written, .. } => *written,
                    _ => 0,
                };
                return ItemOutcome::WriteFailed {
                    error,
                    written,
                    duplicates,
                };
            }
        }

        ItemOutcome::Resolved {
            accepted,
            duplicates,
        }
    }

    /// Run the scan logic in the foreground over a short list.
    ///
    /// Uses its own dedup set, writes nothing and leaves the tracker alone.
    /// The inter-item pause still applies.
    pub async fn run_test_scan(&self, items: &[ZipCode]) -> ScanSummary {
        let mut dedup = DedupStore::new();
        let mut summary = ScanSummary::default();

        for (index, zip) in items.iter().enumerate() {
            match self.process_item(zip, &mut dedup, None).await {
                ItemOutcome::Resolved {
                    accepted,
                    duplicates,
                } => {
                    summary.accepted += accepted.len();
                    summary.duplicates += duplicates;
                    summary.records.extend(accepted);
                }
                ItemOutcome::ResolveFailed(err) => {
                    warn!("Test scan: skipping {}: {}", zip, err);
                    summary.errors += 1;
                    summary.failed_items.push(zip.clone());
                }
                ItemOutcome::WriteFailed {
                    error, duplicates, ..
                } => {
                    error!("Test scan: {}", error);
                    summary.errors += 1;
                    summary.duplicates += duplicates;
                    summary.failed_items.push(zip.clone());
                }
            }
            summary.processed += 1;

            if index + 1 < items.len() {
                tokio::time::sleep(self.item_delay).await;
            }
        }

        summary
    }

    /// Resolve a single postal code, bypassing dedup and persistence.
    pub async fn debug_one(&self, zip: &ZipCode) -> Result<Vec<RawRecord>> {
        self.resolver
            .resolve(zip)
            .await
            .map_err(|source| ScanError::Resolve {
                zip: zip.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Returns one dealer named after the postal code, failing for "99999".
    struct EchoResolver;

    #[async_trait]
    impl RecordResolver for EchoResolver {
        async fn resolve(&self, zip: &ZipCode) -> std::result::Result<Vec<RawRecord>, ResolveError> {
            if zip.as_str() == "99999" {
                return Err(ResolveError::Parse("unexpected token".to_string()));
            }
            Ok(vec![RawRecord::new()
                .with("company_name", format!("Dealer {zip}"))
                .with("contact_addr", "1 Main St")])
        }
    }

    fn zips(codes: &[&str]) -> Vec<ZipCode> {
        codes.iter().map(|c| ZipCode::new(c).unwrap()).collect()
    }

    fn orchestrator(tmp: &TempDir) -> Arc<ScanOrchestrator> {
        Arc::new(
            ScanOrchestrator::new(
                Arc::new(EchoResolver),
                CsvRecordWriter::new(tmp.path().join("dealers.csv")),
            )
            .with_item_delay(Duration::from_secs(1)),
        )
    }

    #[test]
    fn test_default_delay() {
        const _: () = assert!(DEFAULT_ITEM_DELAY_MS > 0);
        assert_eq!(DEFAULT_ITEM_DELAY, Duration::from_millis(DEFAULT_ITEM_DELAY_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_items_only() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);

        let started = tokio::time::Instant::now();
        let handle = orchestrator
            .start(zips(&["10001", "10002", "10003"]))
            .expect("start scan");
        handle.wait().await.expect("scan task");

        // Two pauses for three items; none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_before_next_item() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);

        let handle = orchestrator
            .start(zips(&["10001", "10002", "10003"]))
            .expect("start scan");
        let token = handle.cancel_token();
        while orchestrator.tracker().snapshot().state.processed == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();
        handle.wait().await.expect("scan task");

        let snapshot = orchestrator.tracker().snapshot();
        assert_eq!(snapshot.status, crate::tracker::JobStatus::Aborted);
        assert!(snapshot.state.processed < snapshot.state.total);
        assert!(!orchestrator.tracker().snapshot().state.running);
    }

    #[tokio::test]
    async fn test_start_fails_when_output_unwritable() {
        let tmp = TempDir::new().unwrap();
        // The output path is an existing directory
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::new(EchoResolver),
            CsvRecordWriter::new(tmp.path()),
        ));

        let err = orchestrator.start(zips(&["10001"])).unwrap_err();
        assert!(matches!(err, ScanError::Write { .. }));
        assert!(!orchestrator.tracker().snapshot().state.running);
        assert_eq!(
            orchestrator.tracker().snapshot().status,
            crate::tracker::JobStatus::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_truncation_keeps_last_run_status() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);
        let handle = orchestrator
            .start(zips(&["10001", "10002"]))
            .expect("start scan");
        handle.wait().await.expect("scan task");
        let finished = orchestrator.tracker().snapshot().state;

        // Replace the output file with a directory so truncation fails
        let output = tmp.path().join("dealers.csv");
        std::fs::remove_file(&output).unwrap();
        std::fs::create_dir(&output).unwrap();

        let err = orchestrator.start(zips(&["10003"])).unwrap_err();
        assert!(matches!(err, ScanError::Write { .. }));

        let snapshot = orchestrator.tracker().snapshot();
        assert_eq!(snapshot.status, crate::tracker::JobStatus::Completed);
        assert_eq!(snapshot.state, finished);
        assert_eq!(snapshot.state.processed, 2);
        assert_eq!(snapshot.state.accepted, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leftover_guard_of_ended_run_is_inert() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);

        let first = orchestrator.start(zips(&["10001"])).expect("first start");
        let first_run = first.run_id();
        first.wait().await.expect("first scan task");

        // A guard still alive when the next run is admitted, as happens when
        // a start slips in between `finish` and the end of the old loop.
        let leftover = RunGuard {
            tracker: &*orchestrator.tracker,
            run_id: first_run,
        };
        let second = orchestrator
            .start(zips(&["10002", "10003"]))
            .expect("second start");
        drop(leftover);

        let snapshot = orchestrator.tracker().snapshot();
        assert_eq!(snapshot.status, crate::tracker::JobStatus::Running);
        assert_eq!(snapshot.state.run_id, Some(second.run_id()));
        assert!(matches!(
            orchestrator.start(zips(&["10004"])),
            Err(ScanError::AlreadyRunning)
        ));

        second.wait().await.expect("second scan task");
        let snapshot = orchestrator.tracker().snapshot();
        assert_eq!(snapshot.status, crate::tracker::JobStatus::Completed);
        assert_eq!(snapshot.state.processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_test_scan_summary() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);

        let summary = orchestrator
            .run_test_scan(&zips(&["10001", "99999", "10001"]))
            .await;

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failed_items, zips(&["99999"]));
        assert_eq!(summary.records.len(), 1);
        assert!(!tmp.path().join("dealers.csv").exists(), "test scans write nothing");
        assert_eq!(
            orchestrator.tracker().snapshot().status,
            crate::tracker::JobStatus::Idle
        );
    }

    #[tokio::test]
    async fn test_debug_one() {
        let tmp = TempDir::new().unwrap();
        let orchestrator = orchestrator(&tmp);

        let records = orchestrator
            .debug_one(&ZipCode::new("10001").unwrap())
            .await
            .expect("resolve");
        assert_eq!(records[0].field("company_name"), "Dealer 10001");

        let err = orchestrator
            .debug_one(&ZipCode::new("99999").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Resolve { .. }));
    }
}
