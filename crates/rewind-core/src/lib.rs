//! rewind-core
//!
//! Durable, resumable task execution.
//!
//! 関数を「task」として wrap し、その呼び出しを永続ストアに記録します。
//! 再実行時、完了済みの呼び出しは body を実行せずキャッシュ済みの結果を返すため、
//! プロセスが落ちても call tree を replay して未完了部分だけを再開できます。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_name, job, errors）
//! - **ports**: 抽象化レイヤー（Repository, Codec, Clock, IdGenerator）
//! - **impls**: 実装（JsonCodec, InMemoryRepository, NoopRepository, SqliteRepository）
//! - **app**: 実行エンジン（ExecutionContext, Runner, status）
//! - **typed**: 型付き Task API（Task trait）
//!
//! # Example
//! ```ignore
//! let runner = Runner::new(Arc::new(InMemoryRepository::new()));
//! let double = runner.wrap("double", |_cx, n: i64| async move { Ok(n * 2) });
//!
//! let cx = ExecutionContext::root();
//! assert_eq!(double.call(&cx, 5).await?, 10);
//! // second call is served from the repository
//! assert_eq!(double.call(&cx, 5).await?, 10);
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{ExecutionContext, JobCounts, Runner, Wrapped};
pub use domain::{
    CodecError, ExecutionId, Job, JobError, JobId, JobRow, JobStatus, RepositoryError, RunError,
    TaskName,
};
pub use impls::{InMemoryRepository, JsonCodec, NoopRepository};
pub use ports::{ArgsHash, CanonicalArgs, Codec, Repository};
pub use typed::Task;

#[cfg(feature = "sqlite")]
pub use impls::{SqliteConfig, SqliteRepository};
