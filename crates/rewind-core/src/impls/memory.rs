//! In-memory repository implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::JsonCodec;
use crate::app::JobCounts;
use crate::domain::{Job, JobId, JobRow, RepositoryError, TaskName};
use crate::ports::{Codec, IdGenerator, Repository, SystemClock, UlidGenerator};

/// Lookup key: (function, args hash, parent).
type CandidateKey = (String, String, Option<JobId>);

/// In-memory repository state.
#[derive(Default)]
struct InMemoryRepositoryState {
    /// All rows (single source of truth).
    rows: HashMap<JobId, JobRow>,

    /// Insertion order, for stable listing.
    order: Vec<JobId>,

    /// Candidate index; a hash bucket may hold colliding argument sets.
    index: HashMap<CandidateKey, Vec<JobId>>,
}

impl InMemoryRepositoryState {
    fn insert(&mut self, row: JobRow) -> Result<(), RepositoryError> {
        if let Some(parent) = row.parent_id
            && !self.rows.contains_key(&parent)
        {
            return Err(RepositoryError::UnknownParent(parent));
        }
        let key = (row.function_id.clone(), row.args_hash.clone(), row.parent_id);
        self.index.entry(key).or_default().push(row.id);
        self.order.push(row.id);
        self.rows.insert(row.id, row);
        Ok(())
    }

    fn candidates(&self, key: &CandidateKey) -> impl Iterator<Item = &JobRow> {
        self.index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.rows.get(id))
    }
}

/// Content-addressed repository held entirely in memory.
///
/// Behaves like a persistent store for the lifetime of the value, so a
/// "restart" can be simulated by building a new `Runner` over the same repository.
pub struct InMemoryRepository {
    state: Mutex<InMemoryRepositoryState>,
    codec: Arc<dyn Codec>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(JsonCodec))
    }

    pub fn with_codec(codec: Arc<dyn Codec>) -> Self {
        Self {
            state: Mutex::new(InMemoryRepositoryState::default()),
            codec,
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Snapshot of every stored row, in insertion order.
    pub async fn rows(&self) -> Vec<JobRow> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect()
    }

    pub async fn counts_by_status(&self) -> JobCounts {
        let state = self.state.lock().await;
        let mut counts = JobCounts::default();
        for row in state.rows.values() {
            counts.record(row.status);
        }
        counts
    }

    fn row_for(&self, job: &Job, id: JobId) -> Result<JobRow, RepositoryError> {
        Ok(JobRow {
            id,
            parent_id: job.parent(),
            status: job.status(),
            function_id: job.function().as_str().to_string(),
            args_hash: job.args_hash().as_str().to_string(),
            args_encoding: job.args_encoding().to_vec(),
            result_encoding: self.encode_result(job)?,
        })
    }

    fn encode_result(&self, job: &Job) -> Result<Option<Vec<u8>>, RepositoryError> {
        match job.result() {
            Some(result) => Ok(Some(self.codec.encode(result)?)),
            None => Ok(None),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_or_create_job(
        &self,
        function: &TaskName,
        args: Value,
        parent: Option<JobId>,
    ) -> Result<Job, RepositoryError> {
        let canonical = self.codec.canonicalize(args)?;
        let key = (
            function.as_str().to_string(),
            canonical.hash.as_str().to_string(),
            parent,
        );

        let mut state = self.state.lock().await;

        for row in state.candidates(&key) {
            if self.codec.decode(&row.args_encoding)? != canonical.value {
                continue;
            }
            let result = match &row.result_encoding {
                Some(bytes) => Some(self.codec.decode(bytes)?),
                None => None,
            };
            let job = Job::restore(
                row.id,
                function.clone(),
                canonical,
                parent,
                row.status,
                result,
            );
            debug!(job = %job, id = %row.id, status = ?row.status, "loaded");
            return Ok(job);
        }

        let mut job = Job::pending(function.clone(), canonical, parent);
        let id = self.ids.generate_job_id();
        state.insert(self.row_for(&job, id)?)?;
        job.assign_id(id)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        debug!(job = %job, id = %id, "inserted");
        Ok(job)
    }

    async fn save(&self, job: &mut Job) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;

        match job.id() {
            Some(id) => {
                let result_encoding = self.encode_result(job)?;
                let row = state
                    .rows
                    .get_mut(&id)
                    .ok_or(RepositoryError::UnknownJob(id))?;
                row.status = job.status();
                row.result_encoding = result_encoding;
                debug!(job = %job, id = %id, status = ?row.status, "updated");
            }
            None => {
                let id = self.ids.generate_job_id();
                state.insert(self.row_for(job, id)?)?;
                job.assign_id(id)
                    .map_err(|e| RepositoryError::Storage(e.to_string()))?;
                debug!(job = %job, id = %id, "inserted");
            }
        }
        Ok(())
    }
}
