//! Job record and status management.

use std::fmt;

use serde_json::Value;

use super::errors::{JobError, RepositoryError};
use super::ids::JobId;
use super::task_name::TaskName;
use crate::ports::{ArgsHash, CanonicalArgs};

/// Job status.
///
/// State transitions:
/// - Pending -> Done (once, never reversed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Done,
}

impl JobStatus {
    /// Integer form used by the persisted layout.
    pub fn as_i64(self) -> i64 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Done => 1,
        }
    }
}

impl TryFrom<i64> for JobStatus {
    type Error = RepositoryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(JobStatus::Pending),
            1 => Ok(JobStatus::Done),
            other => Err(RepositoryError::Corrupt(format!("unknown status {other}"))),
        }
    }
}

/// One durable invocation of a task under a specific parent.
///
/// Design:
/// - Identity is (function, canonical args, parent).
/// - `id` is absent until the first save.
/// - State transitions via methods (not direct field access).
#[derive(Debug, Clone)]
pub struct Job {
    id: Option<JobId>,
    function: TaskName,
    args: CanonicalArgs,
    parent: Option<JobId>,
    status: JobStatus,
    result: Option<Value>,
}

impl Job {
    /// A fresh, unsaved job.
    pub fn pending(function: TaskName, args: CanonicalArgs, parent: Option<JobId>) -> Self {
        Self {
            id: None,
            function,
            args,
            parent,
            status: JobStatus::Pending,
            result: None,
        }
    }

    /// Materialize a job from a stored row.
    pub fn restore(
        id: JobId,
        function: TaskName,
        args: CanonicalArgs,
        parent: Option<JobId>,
        status: JobStatus,
        result: Option<Value>,
    ) -> Self {
        Self {
            id: Some(id),
            function,
            args,
            parent,
            status,
            result,
        }
    }

    pub fn id(&self) -> Option<JobId> {
        self.id
    }

    pub fn function(&self) -> &TaskName {
        &self.function
    }

    pub fn args(&self) -> &Value {
        &self.args.value
    }

    pub fn args_encoding(&self) -> &[u8] {
        &self.args.encoding
    }

    pub fn args_hash(&self) -> &ArgsHash {
        &self.args.hash
    }

    pub fn parent(&self) -> Option<JobId> {
        self.parent
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }

    /// Result value; only meaningful once done.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Record the generated identifier after the first insert.
    pub fn assign_id(&mut self, id: JobId) -> Result<(), JobError> {
        if let Some(existing) = self.id {
            return Err(JobError::IdAlreadyAssigned {
                job: self.to_string(),
                id: existing,
            });
        }
        self.id = Some(id);
        Ok(())
    }

    /// Pending -> Done, storing the result.
    pub fn complete(&mut self, result: Value) -> Result<(), JobError> {
        if self.is_done() {
            return Err(JobError::AlreadyDone(self.to_string()));
        }
        self.result = Some(result);
        self.status = JobStatus::Done;
        Ok(())
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args.value {
            Value::Null => write!(f, "{}()", self.function),
            Value::Array(items) => {
                write!(f, "{}(", self.function)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            other => write!(f, "{}({other})", self.function),
        }
    }
}

/// Persisted record layout (storage-engine agnostic).
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: JobId,
    pub parent_id: Option<JobId>,
    pub status: JobStatus,
    pub function_id: String,
    pub args_hash: String,
    pub args_encoding: Vec<u8>,
    pub result_encoding: Option<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::JsonCodec;
    use crate::ports::Codec;
    use rstest::rstest;
    use serde_json::json;
    use ulid::Ulid;

    fn job(name: &str, args: Value) -> Job {
        let args = JsonCodec.canonicalize(args).unwrap();
        Job::pending(TaskName::new(name), args, None)
    }

    #[test]
    fn new_job_is_pending_without_id() {
        let job = job("double", json!(5));
        assert_eq!(job.status(), JobStatus::Pending);
        assert!(job.id().is_none());
        assert!(job.result().is_none());
    }

    #[test]
    fn complete_sets_result_once() {
        let mut job = job("double", json!(5));
        job.complete(json!(10)).unwrap();

        assert!(job.is_done());
        assert_eq!(job.result(), Some(&json!(10)));

        let err = job.complete(json!(11)).unwrap_err();
        assert!(matches!(err, JobError::AlreadyDone(_)));
        assert_eq!(job.result(), Some(&json!(10)));
    }

    #[test]
    fn id_can_only_be_assigned_once() {
        let mut job = job("double", json!(5));
        let first = JobId::from_ulid(Ulid::new());
        job.assign_id(first).unwrap();

        let err = job.assign_id(JobId::from_ulid(Ulid::new())).unwrap_err();
        assert!(matches!(err, JobError::IdAlreadyAssigned { id, .. } if id == first));
        assert_eq!(job.id(), Some(first));
    }

    #[rstest]
    #[case::unit(json!(null), "slp()")]
    #[case::scalar(json!(5), "slp(5)")]
    #[case::tuple(json!([1, "a"]), "slp(1, \"a\")")]
    #[case::object(json!({"d": 1}), "slp({\"d\":1})")]
    fn display_renders_call_form(#[case] args: Value, #[case] expected: &str) {
        assert_eq!(job("slp", args).to_string(), expected);
    }

    #[rstest]
    #[case(JobStatus::Pending)]
    #[case(JobStatus::Done)]
    fn status_integer_form_is_stable(#[case] status: JobStatus) {
        assert_eq!(JobStatus::try_from(status.as_i64()).unwrap(), status);
    }

    #[test]
    fn unknown_status_is_corrupt() {
        assert!(matches!(
            JobStatus::try_from(7),
            Err(RepositoryError::Corrupt(_))
        ));
    }
}
