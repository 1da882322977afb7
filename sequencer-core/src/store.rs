use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::progress::TaskProgress;

/// A block of checkpoint writes that must be committed together.
pub type TransactionScope<'a> = BoxFuture<'a, Result<()>>;

/// Pluggable checkpoint persistence consumed by the orchestration engine.
///
/// Implementations are expected to upsert by task name so a single logical
/// run never produces duplicate rows. Calls may perform blocking I/O against
/// an external store; the engine tolerates arbitrary latency here.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Persists a checkpoint. Fails when `task_name` is empty or does not
    /// match `progress.task_name`.
    async fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<()>;

    /// Loads the last checkpoint for a task, if any.
    async fn load(&self, task_name: &str) -> Result<Option<TaskProgress>>;

    /// Marks a task completed. Creates a checkpoint when absent; otherwise
    /// updates the status and completion time without clobbering an existing
    /// start time.
    async fn mark_completed(&self, task_name: &str) -> Result<()>;

    /// Removes a task's checkpoint. Clearing an absent task is not an error.
    async fn clear(&self, task_name: &str) -> Result<()>;

    /// Runs `scope` inside a store transaction so its checkpoint writes are
    /// durable independent of whatever transaction the task's own business
    /// logic might be using. Stores without transactions pass through.
    async fn transaction<'a>(&'a self, scope: TransactionScope<'a>) -> Result<()> {
        scope.await
    }
}
