//! App - 実行エンジン
//!
//! - **context**: 論理実行ごとの Job スタック（parent の決定に使う）
//! - **runner**: skip / execute の判定と完了時の永続化
//! - **status**: 観測用の集計

pub mod context;
pub mod runner;
pub mod status;

pub use self::context::ExecutionContext;
pub use self::runner::{Runner, TaskFuture, Wrapped};
pub use self::status::JobCounts;
