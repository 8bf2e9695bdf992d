//! Long-running job registry.
//!
//! At most one batch job runs at a time. Starting a second job while one
//! is running is rejected instead of queued. A retry job (re-grading
//! failed items) occupies the running slot like any other job but never
//! overwrites the recorded primary run. All transitions happen atomically
//! behind one mutex; stop requests are flags the driver polls at year
//! boundaries.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from illegal job transitions.
#[derive(Debug, Error)]
pub enum JobError {
    /// A job is already running; only one may run at a time.
    #[error("Job '{active}' is already running")]
    AlreadyRunning {
        /// Identifier of the job that holds the slot.
        active: String,
    },

    /// A terminal transition was requested with no running job.
    #[error("No job is running")]
    NotRunning,
}

/// Terminal state of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    /// Ran to the end of the batch.
    Completed,
    /// A stop request was honored at a year boundary.
    Stopped,
    /// Aborted by an error.
    Error,
}

/// Record of a finished job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: String,
    /// How the job ended.
    pub outcome: JobOutcome,
    /// When the job started.
    pub started_at: DateTime<Utc>,
    /// When the job ended.
    pub finished_at: DateTime<Utc>,
    /// One-line result summary.
    pub summary: String,
}

#[derive(Debug)]
struct ActiveJob {
    id: String,
    retry: bool,
    stop_requested: bool,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct RegistryState {
    active: Option<ActiveJob>,
    last_primary: Option<JobRecord>,
}

/// Mutex-guarded single-slot job registry.
#[derive(Debug, Default)]
pub struct JobRegistry {
    state: Mutex<RegistryState>,
}

impl JobRegistry {
    /// Create an idle registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the running slot for a primary job.
    pub fn begin(&self, id: impl Into<String>) -> Result<(), JobError> {
        self.begin_inner(id.into(), false)
    }

    /// Claim the running slot for a retry job. Its record is discarded on
    /// finish so the primary run's record stays intact.
    pub fn begin_retry(&self, id: impl Into<String>) -> Result<(), JobError> {
        self.begin_inner(id.into(), true)
    }

    fn begin_inner(&self, id: String, retry: bool) -> Result<(), JobError> {
        let mut state = self.lock();
        if let Some(active) = &state.active {
            return Err(JobError::AlreadyRunning {
                active: active.id.clone(),
            });
        }
        state.active = Some(ActiveJob {
            id,
            retry,
            stop_requested: false,
            started_at: Utc::now(),
        });
        Ok(())
    }

    /// Finish the running job, releasing the slot.
    ///
    /// Returns the finished record. Primary records are kept and
    /// retrievable via [`Self::last_run`]; retry records are returned
    /// only.
    pub fn finish(
        &self,
        outcome: JobOutcome,
        summary: impl Into<String>,
    ) -> Result<JobRecord, JobError> {
        let mut state = self.lock();
        let active = state.active.take().ok_or(JobError::NotRunning)?;
        let record = JobRecord {
            id: active.id,
            outcome,
            started_at: active.started_at,
            finished_at: Utc::now(),
            summary: summary.into(),
        };
        if active.retry {
            log::info!("retry job '{}' finished: {:?}", record.id, record.outcome);
        } else {
            state.last_primary = Some(record.clone());
        }
        Ok(record)
    }

    /// Flag the running job to stop at the next year boundary.
    ///
    /// Returns whether a running job was flagged.
    pub fn request_stop(&self) -> bool {
        let mut state = self.lock();
        match state.active.as_mut() {
            Some(active) => {
                active.stop_requested = true;
                true
            }
            None => false,
        }
    }

    /// Whether the running job has been asked to stop.
    pub fn stop_requested(&self) -> bool {
        self.lock()
            .active
            .as_ref()
            .is_some_and(|active| active.stop_requested)
    }

    /// Whether a job holds the running slot.
    pub fn is_running(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Identifier of the running job, if any.
    pub fn active_job(&self) -> Option<String> {
        self.lock().active.as_ref().map(|active| active.id.clone())
    }

    /// Record of the most recently finished primary job.
    pub fn last_run(&self) -> Option<JobRecord> {
        self.lock().last_primary.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
