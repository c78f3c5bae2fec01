//! NoopRepository - 何も記憶しない Repository
//!
//! すべての呼び出しで新しい Pending の Job を返すので、task は毎回実行されます。
//! 永続化なしで task を動かしたいときや、Runner 単体のテストに使います。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::JsonCodec;
use crate::domain::{Job, JobId, RepositoryError, TaskName};
use crate::ports::{Codec, IdGenerator, Repository, SystemClock, UlidGenerator};

pub struct NoopRepository {
    codec: Arc<dyn Codec>,
    ids: Arc<dyn IdGenerator>,
}

impl NoopRepository {
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }
}

impl Default for NoopRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for NoopRepository {
    async fn get_or_create_job(
        &self,
        function: &TaskName,
        args: Value,
        parent: Option<JobId>,
    ) -> Result<Job, RepositoryError> {
        let canonical = self.codec.canonicalize(args)?;
        let mut job = Job::pending(function.clone(), canonical, parent);
        self.save(&mut job).await?;
        Ok(job)
    }

    /// Only hands out an id; nothing is stored.
    async fn save(&self, job: &mut Job) -> Result<(), RepositoryError> {
        if job.id().is_none() {
            job.assign_id(self.ids.generate_job_id())
                .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}
