//! Process-wide job table.
//!
//! The registry hands out at most one [`JobWriter`] per job. The writer holds
//! the job's entry directly, so record mutations never touch the map and a
//! running pipeline never blocks readers of other jobs.

use super::failure::{FailureRecord, JobFailure};
use super::record::{JobId, JobInputs, JobRecord, JobResult, PROGRESS_COMPLETED};
use crate::core::{JobState, StageResult};
use crate::errors::RegistryError;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

struct JobEntry {
    record: RwLock<JobRecord>,
    claimed: AtomicBool,
}

/// Job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Jobs not yet finished.
    pub active: usize,
    /// Jobs ever created.
    pub total: usize,
}

/// Thread-safe store of job records.
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, Arc<JobEntry>>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.len())
            .finish()
    }
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a job in the `Created` state.
    pub fn create(&self, inputs: JobInputs) -> JobId {
        self.insert(inputs, false).0
    }

    /// Creates a job and hands out its writer in one step.
    pub fn register(&self, inputs: JobInputs) -> JobWriter {
        let (id, entry) = self.insert(inputs, true);
        JobWriter { id, entry }
    }

    /// Returns a snapshot of one job.
    #[must_use]
    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        let entry = self.entry(id)?;
        let record = entry.record.read().clone();
        Some(record)
    }

    /// Hands out the job's single writer.
    pub fn claim(&self, id: &JobId) -> Result<JobWriter, RegistryError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if entry.claimed.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::AlreadyClaimed(id.to_string()));
        }
        Ok(JobWriter { id: *id, entry })
    }

    /// Snapshot of every job, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.snapshot_entries().iter().map(|e| e.record.read().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Snapshot of jobs not yet completed or failed, oldest first.
    #[must_use]
    pub fn list_active(&self) -> Vec<JobRecord> {
        let mut records = self.list();
        records.retain(|record| record.state.is_active());
        records
    }

    /// Active and total job counts.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let entries = self.snapshot_entries();
        let active = entries
            .iter()
            .filter(|entry| entry.record.read().state.is_active())
            .count();
        RegistryStats {
            active,
            total: entries.len(),
        }
    }

    /// Number of jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn insert(&self, inputs: JobInputs, claimed: bool) -> (JobId, Arc<JobEntry>) {
        let id = JobId::new();
        let entry = Arc::new(JobEntry {
            record: RwLock::new(JobRecord::new(id, inputs)),
            claimed: AtomicBool::new(claimed),
        });
        self.jobs.insert(id, Arc::clone(&entry));
        debug!(job_id = %id, "Job created");
        (id, entry)
    }

    fn entry(&self, id: &JobId) -> Option<Arc<JobEntry>> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    // Shard locks are released before any record lock is taken.
    fn snapshot_entries(&self) -> Vec<Arc<JobEntry>> {
        self.jobs.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

/// Exclusive write access to one job's record.
///
/// Obtained through [`JobRegistry::register`] or [`JobRegistry::claim`];
/// not cloneable.
pub struct JobWriter {
    id: JobId,
    entry: Arc<JobEntry>,
}

impl std::fmt::Debug for JobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWriter").field("id", &self.id).finish_non_exhaustive()
    }
}

impl JobWriter {
    /// The job this writer owns.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.entry.record.read().state
    }

    /// Snapshot of the record.
    #[must_use]
    pub fn snapshot(&self) -> JobRecord {
        self.entry.record.read().clone()
    }

    /// Moves the job to `Running`.
    pub fn start(&self, progress: impl Into<String>) -> Result<(), RegistryError> {
        let progress = progress.into();
        self.transition(JobState::Running, |record| {
            record.progress = progress;
        })
    }

    /// Overwrites the progress text. Ignored once the job is finished.
    pub fn set_progress(&self, progress: impl Into<String>) {
        self.mutate(|record| record.progress = progress.into());
    }

    /// Appends a stage result. Ignored once the job is finished.
    pub fn push_output(&self, output: StageResult) {
        self.mutate(|record| record.stage_outputs.push(output));
    }

    /// Records a tolerated failure. Ignored once the job is finished.
    pub fn record_tolerated(&self, failure: FailureRecord) {
        self.mutate(|record| record.tolerated_failures.push(failure));
    }

    /// Moves the job to `Completed` with its result summary.
    pub fn complete(&self, result: JobResult) -> Result<(), RegistryError> {
        self.transition(JobState::Completed, |record| {
            record.progress = PROGRESS_COMPLETED.to_string();
            record.result = Some(result);
        })
    }

    /// Moves the job to `Failed` with its fatal cause.
    pub fn fail(&self, failure: JobFailure) -> Result<(), RegistryError> {
        self.transition(JobState::Failed, |record| {
            record.progress = format!("Generation failed: {}", failure.message);
            record.error = Some(failure);
        })
    }

    fn mutate(&self, apply: impl FnOnce(&mut JobRecord)) {
        let mut record = self.entry.record.write();
        if record.state.is_terminal() {
            debug!(job_id = %self.id, state = %record.state, "Ignoring update to finished job");
            return;
        }
        apply(&mut record);
        record.updated_at = Utc::now();
    }

    fn transition(
        &self,
        to: JobState,
        apply: impl FnOnce(&mut JobRecord),
    ) -> Result<(), RegistryError> {
        let mut record = self.entry.record.write();
        let from = record.state;
        if !from.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition {
                job_id: self.id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        record.state = to;
        apply(&mut record);
        record.updated_at = Utc::now();
        debug!(job_id = %self.id, from = %from, to = %to, "Job state changed");
        Ok(())
    }
}
