//! ExecutionContext - 論理実行ごとの Job スタック
//!
//! # 学習ポイント
//! - 共有グローバルではなく、明示的に受け渡す handle
//! - 同時に await される分岐は `fork()` で別スタックを持つ
//!
//! スタックは「いま実行中の Job」の入れ子（lexical nesting）を表し、
//! 新しく呼ばれた task の parent を決めるためだけに使われます。
//! body が他の処理を待って suspend しても、完了するまでは積まれたままです。

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ulid::Ulid;

use crate::domain::{ExecutionId, JobId, TaskName};

#[derive(Debug, Clone)]
struct Frame {
    job_id: JobId,
    function: TaskName,
}

/// Handle to one logical execution and its stack of in-flight jobs.
///
/// Clones share the same logical execution. Branches that are awaited
/// concurrently (e.g. inside `tokio::join!`) must each get their own
/// [`fork`](Self::fork), or their pushes and pops would interleave.
#[derive(Clone)]
pub struct ExecutionContext {
    id: ExecutionId,
    stack: Arc<Mutex<Vec<Frame>>>,
}

impl ExecutionContext {
    /// Start a new logical execution with an empty stack.
    pub fn root() -> Self {
        Self::with_frames(Vec::new())
    }

    fn with_frames(frames: Vec<Frame>) -> Self {
        Self {
            id: ExecutionId::from_ulid(Ulid::new()),
            stack: Arc::new(Mutex::new(frames)),
        }
    }

    /// Start a new logical execution nested under the current one.
    ///
    /// Tasks invoked through the fork get the same parent as tasks invoked
    /// here, but the fork's pushes and pops never touch this stack.
    pub fn fork(&self) -> Self {
        Self::with_frames(self.frames().clone())
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    /// The job a newly invoked task should be attached to, if any.
    pub fn current_parent(&self) -> Option<JobId> {
        self.frames().last().map(|frame| frame.job_id)
    }

    pub fn depth(&self) -> usize {
        self.frames().len()
    }

    pub(crate) fn push(&self, job_id: JobId, function: &TaskName) {
        self.frames().push(Frame {
            job_id,
            function: function.clone(),
        });
    }

    /// Pop `job_id`, which must be the most recent push of this execution.
    ///
    /// # Panics
    /// On mismatch: the stack no longer mirrors call nesting, which is an engine bug.
    pub(crate) fn pop(&self, job_id: JobId) {
        let popped = self.frames().pop();
        match popped {
            Some(frame) if frame.job_id == job_id => {}
            Some(frame) => panic!(
                "execution {}: popped {} ({}) but expected {}",
                self.id, frame.job_id, frame.function, job_id
            ),
            None => panic!(
                "execution {}: popped {} from an empty stack",
                self.id, job_id
            ),
        }
    }

    fn frames(&self) -> MutexGuard<'_, Vec<Frame>> {
        // the lock is never held across a panic, but stay usable regardless
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .field("parent", &self.current_parent())
            .finish()
    }
}
