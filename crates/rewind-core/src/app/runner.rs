//! Task runner: decides skip vs. execute and records completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use super::context::ExecutionContext;
use crate::domain::{CodecError, Job, RepositoryError, RunError, TaskName};
use crate::ports::{Repository, to_value};
use crate::typed::Task;

/// Boxed future returned by a wrapped task body.
pub type TaskFuture<R> = Pin<Box<dyn Future<Output = Result<R, RunError>> + Send>>;

type Body<A, R> = dyn Fn(ExecutionContext, A) -> TaskFuture<R> + Send + Sync;

fn decode_result<R: DeserializeOwned>(job: &Job) -> Result<R, RunError> {
    let result = job
        .result()
        .ok_or_else(|| RepositoryError::Corrupt(format!("{job} is done without a result")))?;
    serde_json::from_value(result.clone())
        .map_err(|e| CodecError::Decode(format!("{job}: {e}")).into())
}

/// Runs tasks against a repository.
///
/// Cheap to clone; every clone shares the same repository.
#[derive(Clone)]
pub struct Runner {
    repository: Arc<dyn Repository>,
}

impl Runner {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    /// Register `body` as a durable task named `name`.
    ///
    /// The name is the function identity stored with every job, so it must stay
    /// stable across runs and be unique per body.
    pub fn wrap<A, R, F, Fut>(&self, name: impl Into<TaskName>, body: F) -> Wrapped<A, R>
    where
        A: Serialize + Send + 'static,
        R: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(ExecutionContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, RunError>> + Send + 'static,
    {
        let body: Arc<Body<A, R>> =
            Arc::new(move |cx: ExecutionContext, args: A| -> TaskFuture<R> {
                Box::pin(body(cx, args))
            });
        Wrapped {
            name: name.into(),
            runner: self.clone(),
            body,
        }
    }

    /// Run a struct-shaped task; `T::NAME` is its identity and the struct its arguments.
    pub async fn run<T: Task>(&self, cx: &ExecutionContext, task: T) -> Result<T::Output, RunError> {
        let name = TaskName::new(T::NAME);
        let args = to_value(&task)?;
        let runner = self.clone();
        self.invoke(cx, &name, args, move |cx| async move { task.run(&runner, cx).await })
            .await
    }

    /// Shared path for every wrapped call.
    ///
    /// 1. parent = top of the caller's stack
    /// 2. look up or create the job
    /// 3. done: return the stored result, no push, no extra suspension
    /// 4. otherwise push, run the body, complete, pop, save
    async fn invoke<R, F, Fut>(
        &self,
        cx: &ExecutionContext,
        function: &TaskName,
        args: Value,
        body: F,
    ) -> Result<R, RunError>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce(ExecutionContext) -> Fut,
        Fut: Future<Output = Result<R, RunError>>,
    {
        let parent = cx.current_parent();
        let mut job = self
            .repository
            .get_or_create_job(function, args, parent)
            .await?;

        if job.is_done() {
            info!(job = %job, execution = %cx.id(), "skipping");
            return decode_result(&job);
        }

        // children must never reference an unpersisted parent
        let job_id = match job.id() {
            Some(id) => id,
            None => {
                self.repository.save(&mut job).await?;
                job.id().ok_or(RepositoryError::MissingId)?
            }
        };

        cx.push(job_id, function);
        info!(job = %job, execution = %cx.id(), depth = cx.depth(), "beginning");

        let output = match body(cx.clone()).await {
            Ok(output) => output,
            Err(err) => {
                cx.pop(job_id);
                warn!(job = %job, execution = %cx.id(), error = %err, "failed");
                return Err(err);
            }
        };

        let completed = to_value(&output)
            .map_err(RunError::from)
            .and_then(|result| job.complete(result).map_err(RunError::from));
        cx.pop(job_id);
        completed?;

        self.repository.save(&mut job).await?;
        let result = job.result().unwrap_or(&serde_json::Value::Null);
        info!(job = %job, execution = %cx.id(), result = %result, "ended");
        Ok(output)
    }
}

/// A function registered through [`Runner::wrap`].
pub struct Wrapped<A, R> {
    name: TaskName,
    runner: Runner,
    body: Arc<Body<A, R>>,
}

impl<A, R> Clone for Wrapped<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            runner: self.runner.clone(),
            body: Arc::clone(&self.body),
        }
    }
}

impl<A, R> Wrapped<A, R>
where
    A: Serialize + Send + 'static,
    R: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn name(&self) -> &TaskName {
        &self.name
    }

    /// Invoke the task from within the logical execution `cx`.
    ///
    /// Resolves immediately with the stored result if this invocation already
    /// completed in an earlier run.
    pub async fn call(&self, cx: &ExecutionContext, args: A) -> Result<R, RunError> {
        let value = to_value(&args)?;
        let body = Arc::clone(&self.body);
        self.runner
            .invoke(cx, &self.name, value, move |cx| body(cx, args))
            .await
    }
}
