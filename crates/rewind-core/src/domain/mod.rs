//! Domain model (ids, task names, jobs, errors).

pub mod errors;
pub mod ids;
pub mod job;
pub mod task_name;

pub use self::errors::{CodecError, JobError, RepositoryError, RunError};
pub use self::ids::{ExecutionId, JobId};
pub use self::job::{Job, JobRow, JobStatus};
pub use self::task_name::TaskName;
