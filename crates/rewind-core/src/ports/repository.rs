//! Repository port - job forest の永続化
//!
//! Runner が使う操作は 2 つだけです：
//! - `get_or_create_job`: content addressing による lookup-or-create
//! - `save`: 完了時の永続化
//!
//! # 実装
//! - InMemoryRepository（テスト用・正本として完全に動作）
//! - NoopRepository（memoize しない）
//! - SqliteRepository（`sqlite` feature）

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Job, JobId, RepositoryError, TaskName};

/// Durable, content-addressed storage of jobs.
///
/// # 契約
/// - `get_or_create_job` は (function, hash, parent) で候補を引き、decode した引数が
///   `args` と完全一致した最初の行を返す。一致がなければ Pending の Job を insert して返す。
/// - `save` は id があれば status/result のみ update、なければ insert して id を割り当てる。
/// - どちらも単一の atomic な書き込みとして commit される。
/// - lookup と insert はひとつの transaction ではない（single writer 前提）。
#[async_trait]
pub trait Repository: Send + Sync {
    /// Find the job for `(function, args, parent)` or create it as Pending.
    ///
    /// `args` must already be in canonical form (e.g. produced by `serde_json::to_value`).
    async fn get_or_create_job(
        &self,
        function: &TaskName,
        args: Value,
        parent: Option<JobId>,
    ) -> Result<Job, RepositoryError>;

    /// Persist the job's status and result, inserting it first if it has no id.
    async fn save(&self, job: &mut Job) -> Result<(), RepositoryError>;
}
