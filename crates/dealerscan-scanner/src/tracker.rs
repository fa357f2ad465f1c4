//! Single-flight job state for the background scan.
//!
//! The tracker is the only admission gate for scans: [`JobTracker::try_start`]
//! checks and sets the running flag inside one critical section, so two
//! callers can never both observe an idle tracker. No lock is held across an
//! `.await`, which keeps every snapshot consistent with the last completed
//! iteration of the scan loop.

use chrono::{DateTime, Utc};
use dealerscan_core::ZipCode;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;
use uuid::Uuid;

/// Counters and timing of the current (or most recent) scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    /// Identifier of the run, assigned by `try_start`
    pub run_id: Option<Uuid>,
    /// True from `try_start` until the loop ends
    pub running: bool,
    /// Set when the loop stopped before reaching the end of its work list
    pub aborted: bool,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the run ended
    pub finished_at: Option<DateTime<Utc>>,
    /// Postal codes handled so far
    pub processed: usize,
    /// Postal codes in this run's work subset
    pub total: usize,
    /// Unique dealer records written
    pub accepted: usize,
    /// Records rejected as already seen in this run
    pub duplicates: usize,
    /// Postal codes whose resolve or write failed
    pub errors: usize,
    /// Last postal code handled
    pub current_item: Option<ZipCode>,
}

impl JobState {
    /// Lifecycle phase derived from the flags.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        if self.running {
            JobStatus::Running
        } else if self.started_at.is_none() {
            JobStatus::Idle
        } else if self.aborted {
            JobStatus::Aborted
        } else {
            JobStatus::Completed
        }
    }

    /// `processed / total` as a percentage; 0 when the run has no items.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Lifecycle phase of the scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No scan has run since the process started
    Idle,
    /// A scan loop is in progress
    Running,
    /// The last scan went through its whole work list
    Completed,
    /// The last scan stopped early (shutdown or a crashed loop)
    Aborted,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Read-only view of the job handed to status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    /// Raw counters
    #[serde(flatten)]
    pub state: JobState,
    /// Derived lifecycle phase
    pub status: JobStatus,
    /// Derived progress percentage
    pub percent_complete: f64,
    /// Seconds since start (until finish once the run has ended)
    pub elapsed_secs: Option<i64>,
}

/// Owner of the process-wide scan job state.
#[derive(Debug, Default)]
pub struct JobTracker {
    state: Mutex<JobState>,
}

impl JobTracker {
    /// Create a tracker in the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state
            .lock()
            .expect("Mutex poisoned: another thread panicked while holding the job state")
    }

    /// Admit a new run of `total` items and return its id.
    ///
    /// Returns `None` without touching any counter if a run is already in
    /// progress. Otherwise resets every counter and marks the job running.
    pub fn try_start(&self, total: usize) -> Option<Uuid> {
        match self.try_start_with(total, || Ok::<(), Infallible>(())) {
            Ok(run_id) => run_id,
            Err(never) => match never {},
        }
    }

    /// Like [`JobTracker::try_start`], running `prepare` between the idle
    /// check and the state reset.
    ///
    /// `prepare` runs with the state locked, so it must not block for long.
    /// If it fails, the previous run's state is kept and the error returned.
    pub fn try_start_with<E>(
        &self,
        total: usize,
        prepare: impl FnOnce() -> Result<(), E>,
    ) -> Result<Option<Uuid>, E> {
        let mut state = self.lock();
        if state.running {
            return Ok(None);
        }
        prepare()?;

        let run_id = Uuid::new_v4();
        *state = JobState {
            run_id: Some(run_id),
            running: true,
            started_at: Some(Utc::now()),
            total,
            ..JobState::default()
        };
        Ok(Some(run_id))
    }

    /// Lock the state if `run_id` is the run in progress.
    fn lock_active(&self, run_id: Uuid) -> Option<MutexGuard<'_, JobState>> {
        let state = self.lock();
        (state.running && state.run_id == Some(run_id)).then_some(state)
    }

    /// Account for one handled postal code of run `run_id`.
    pub fn record_processed(
        &self,
        run_id: Uuid,
        current_item: &ZipCode,
        accepted: usize,
        duplicates: usize,
        failed: bool,
    ) {
        let Some(mut state) = self.lock_active(run_id) else {
            warn!("Ignoring progress for {} from inactive run {}", current_item, run_id);
            return;
        };
        state.processed += 1;
        state.accepted += accepted;
        state.duplicates += duplicates;
        if failed {
            state.errors += 1;
        }
        state.current_item = Some(current_item.clone());
    }

    /// Mark run `run_id` as completed.
    ///
    /// # Panics
    /// Panics if fewer or more items were processed than the run was started
    /// with. That can only happen through a bug in the scan loop. The running
    /// flag is cleared before panicking so the tracker accepts new runs.
    pub fn finish(&self, run_id: Uuid) {
        let (processed, total) = {
            let Some(mut state) = self.lock_active(run_id) else {
                warn!("Ignoring finish of inactive run {}", run_id);
                return;
            };
            state.running = false;
            state.finished_at = Some(Utc::now());
            (state.processed, state.total)
        };
        assert_eq!(
            processed, total,
            "scan loop finished with processed ({processed}) != total ({total})"
        );
    }

    /// End run `run_id` before its work list was exhausted.
    ///
    /// Returns false, changing nothing, if that run is no longer in progress.
    pub fn abort(&self, run_id: Uuid) -> bool {
        let Some(mut state) = self.lock_active(run_id) else {
            return false;
        };
        state.running = false;
        state.aborted = true;
        state.finished_at = Some(Utc::now());
        true
    }

    /// Copy of the current state with derived fields filled in.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock().clone();
        let elapsed_secs = state.started_at.map(|started| {
            let end = state.finished_at.unwrap_or_else(Utc::now);
            (end - started).num_seconds()
        });
        JobSnapshot {
            status: state.status(),
            percent_complete: state.percent_complete(),
            elapsed_secs,
            state,
        }
    }
}
