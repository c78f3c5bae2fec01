//! Errors - エラー型と分類
//!
//! - CodecError: 引数・結果の encode/decode 失敗（job は作られない）
//! - RepositoryError: ストアの読み書き失敗（内部でリトライしない）
//! - JobError: Job の状態遷移違反
//! - RunError: Runner が呼び出し元に返すエラー（task body の失敗を含む）

use thiserror::Error;

use super::ids::JobId;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("parent {0} is not persisted")]
    UnknownParent(JobId),

    #[error("job {0} not found")]
    UnknownJob(JobId),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("repository returned a job without an id")]
    MissingId,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} is already done")]
    AlreadyDone(String),

    #[error("job {job} already has id {id}")]
    IdAlreadyAssigned { job: String, id: JobId },
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Job(#[from] JobError),

    /// The task body itself failed.
    #[error("task failed: {0}")]
    Task(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RunError {
    /// Wrap an arbitrary body error.
    pub fn task(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Task(err.into())
    }

    /// Body failure from a plain message.
    pub fn failed(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Task(message.into())
    }

    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::Task(_))
    }
}
