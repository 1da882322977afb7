use async_trait::async_trait;
use sequencer_core::{ProgressStore, Result, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Execution mode carried through the context. Informational only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Run,
    DryRun,
    Resume,
}

/// Extracts a resume identifier from an item.
pub type IdExtractorFn = dyn Fn(&serde_json::Value) -> String + Send + Sync;

/// Default identifier extraction: the `id` field of object-like items,
/// otherwise the stringified item.
pub fn default_id_extractor(item: &serde_json::Value) -> String {
    match item {
        serde_json::Value::Object(map) => match map.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => item.to_string(),
        },
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ===== Task Result =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskResult {
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            data,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            data: serde_json::Value::Null,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// True iff the status is `Completed`.
    pub fn is_success(&self) -> bool {
        self.status.is_successful()
    }
}

// ===== Execution Context =====

/// Per-run state threaded through every task invocation: the validated
/// order, results of already-executed tasks, free-form metadata, and a
/// handle to the progress store for checkpointing.
#[derive(Clone)]
pub struct ExecutionContext {
    pub run_id: Uuid,
    pub task_order: Vec<String>,
    pub results: HashMap<String, TaskResult>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub progress_store: Option<Arc<dyn ProgressStore>>,
    pub mode: ExecutionMode,
    pub resume: bool,
    pub id_extractor: Option<Arc<IdExtractorFn>>,
}

impl ExecutionContext {
    pub fn new(task_order: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task_order,
            results: HashMap::new(),
            metadata: HashMap::new(),
            progress_store: None,
            mode: ExecutionMode::Run,
            resume: false,
            id_extractor: None,
        }
    }

    pub fn with_progress_store(mut self, store: Arc<dyn ProgressStore>) -> Self {
        self.progress_store = Some(store);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Result of an already-executed task, if it has run in this sequence.
    pub fn result(&self, task_name: &str) -> Option<&TaskResult> {
        self.results.get(task_name)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("run_id", &self.run_id)
            .field("task_order", &self.task_order)
            .field("results", &self.results)
            .field("metadata", &self.metadata)
            .field("mode", &self.mode)
            .field("resume", &self.resume)
            .field("has_progress_store", &self.progress_store.is_some())
            .field("has_id_extractor", &self.id_extractor.is_some())
            .finish()
    }
}

// ===== Task Contracts =====

/// A named, independently executable unit of work with declared
/// dependencies. A task never mutates the registry or context beyond what
/// it returns; results flow to later tasks through `TaskResult.data`.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// Names of tasks that must have completed before this one runs.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Executes the task. Only `Completed` or `Failed` results are
    /// meaningful here; an `Err` is converted by the orchestrator into a
    /// failed result.
    async fn execute(&self, context: &ExecutionContext) -> Result<TaskResult>;

    /// Capability probe for item-iterating tasks.
    fn as_iterable(&self) -> Option<&dyn IterableTask> {
        None
    }
}

/// A task that processes a collection of items, suitable for checkpointed
/// iteration through a [`ResumeIterator`](crate::iterators::ResumeIterator).
#[async_trait]
pub trait IterableTask: Task {
    async fn items(&self, context: &ExecutionContext) -> Result<Vec<serde_json::Value>>;

    async fn execute_for_item(
        &self,
        item: &serde_json::Value,
        context: &ExecutionContext,
    ) -> Result<()>;
}
