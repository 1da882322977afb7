use chrono::Utc;
use sequencer_core::{ProgressStore, Result, SequencerError, TaskProgress, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::registry::TaskRegistry;
use crate::tasks::{
    default_id_extractor, ExecutionContext, ExecutionMode, IterableTask, Task, TaskResult,
};
use crate::validator::DependencyValidator;

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// `Completed` iff every task in the order completed.
    pub status: TaskStatus,
    pub results: HashMap<String, TaskResult>,
    pub completed_tasks: Vec<String>,
    pub failed_tasks: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Drives a full run: validates the order upfront, then executes tasks
/// strictly sequentially, checkpointing state transitions through the
/// progress store and stopping at the first failure.
pub struct Orchestrator {
    registry: TaskRegistry,
    progress_store: Arc<dyn ProgressStore>,
    validator: DependencyValidator,
}

impl Orchestrator {
    pub fn new(
        registry: TaskRegistry,
        progress_store: Arc<dyn ProgressStore>,
        validator: DependencyValidator,
    ) -> Self {
        Self {
            registry,
            progress_store,
            validator,
        }
    }

    pub async fn execute(&self, task_order: &[String]) -> Result<ExecutionResult> {
        self.execute_with(task_order, ExecutionMode::Run, false).await
    }

    pub async fn execute_with(
        &self,
        task_order: &[String],
        mode: ExecutionMode,
        resume: bool,
    ) -> Result<ExecutionResult> {
        // Fails fast before any task runs.
        self.validator.validate(task_order, &self.registry)?;

        let mut context = ExecutionContext::new(task_order.to_vec())
            .with_progress_store(Arc::clone(&self.progress_store))
            .with_mode(mode)
            .with_resume(resume);

        tracing::info!(
            run_id = %context.run_id,
            tasks = task_order.len(),
            ?mode,
            resume,
            "starting task sequence"
        );

        let mut completed_tasks: Vec<String> = Vec::new();
        let mut completed: HashSet<String> = HashSet::new();
        let mut results: HashMap<String, TaskResult> = HashMap::new();

        for task_name in task_order {
            let task = self.registry.get(task_name)?;

            // Defensive re-assertion of what validation already proved.
            if !task.depends_on().iter().all(|dep| completed.contains(dep)) {
                return Err(SequencerError::Dependency(format!(
                    "task '{}' dependencies not satisfied",
                    task_name
                )));
            }

            // Idempotent start stamp: a task already mid-flight from a prior
            // interrupted run keeps its original start time.
            let already_in_progress = matches!(
                self.progress_store.load(task_name).await?,
                Some(ref progress) if progress.status == TaskStatus::InProgress
            );
            if !already_in_progress {
                self.mark_task_started(task_name).await?;
            }

            if resume && task.as_iterable().is_some() {
                if context.id_extractor.is_none() {
                    context.id_extractor = Some(Arc::new(default_id_extractor));
                }
                context.resume = true;
            }

            let result = match self.run_task(task.as_ref(), &context).await {
                Ok(result) => result,
                Err(error) => TaskResult::failure(error.to_string()),
            };
            results.insert(task_name.clone(), result.clone());
            context.results.insert(task_name.clone(), result.clone());

            if result.is_success() {
                completed_tasks.push(task_name.clone());
                completed.insert(task_name.clone());
                let store = Arc::clone(&self.progress_store);
                let name = task_name.clone();
                self.progress_store
                    .transaction(Box::pin(async move { store.mark_completed(&name).await }))
                    .await?;
            } else {
                let message = result.error.as_deref().unwrap_or("Unknown error");
                self.mark_task_failed(task_name, message).await?;
                // Fail fast: no further tasks are attempted.
                break;
            }
        }

        let failed_tasks: Vec<String> = task_order
            .iter()
            .filter(|name| {
                results
                    .get(name.as_str())
                    .map(|r| !r.is_success())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        let status = if completed_tasks.len() == task_order.len() {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        let mut metadata = HashMap::new();
        metadata.insert("mode".to_string(), serde_json::to_value(mode)?);
        metadata.insert("resume".to_string(), serde_json::Value::Bool(resume));
        metadata.insert(
            "run_id".to_string(),
            serde_json::Value::String(context.run_id.to_string()),
        );

        tracing::info!(
            run_id = %context.run_id,
            ?status,
            completed = completed_tasks.len(),
            failed = failed_tasks.len(),
            "task sequence finished"
        );

        Ok(ExecutionResult {
            status,
            results,
            completed_tasks,
            failed_tasks,
            metadata,
        })
    }

    async fn run_task(&self, task: &dyn Task, context: &ExecutionContext) -> Result<TaskResult> {
        if let Some(iterable) = task.as_iterable() {
            self.run_iterable_task(iterable, context).await
        } else {
            tracing::debug!(task = task.name(), "executing task");
            match task.execute(context).await {
                Ok(result) => {
                    tracing::info!(
                        task = task.name(),
                        success = result.is_success(),
                        "task finished"
                    );
                    Ok(result)
                }
                Err(error) => Err(SequencerError::TaskExecution {
                    task: task.name().to_string(),
                    message: error.to_string(),
                }),
            }
        }
    }

    async fn run_iterable_task(
        &self,
        task: &dyn IterableTask,
        context: &ExecutionContext,
    ) -> Result<TaskResult> {
        tracing::debug!(task = task.name(), "executing iterable task");

        let total = match task.items(context).await {
            Ok(items) => items.len(),
            Err(error) => {
                return Err(SequencerError::TaskExecution {
                    task: task.name().to_string(),
                    message: error.to_string(),
                })
            }
        };
        if total == 0 {
            tracing::info!(task = task.name(), "no items to process");
            return Ok(TaskResult::success(serde_json::Value::Null));
        }
        tracing::info!(task = task.name(), total_items = total, "processing items");

        let result = match task.execute(context).await {
            Ok(result) => result,
            Err(error) => {
                return Err(SequencerError::TaskExecution {
                    task: task.name().to_string(),
                    message: error.to_string(),
                })
            }
        };

        // Report progress from the last checkpoint when one is available.
        if let Some(progress) = self.progress_store.load(task.name()).await? {
            tracing::info!(
                task = task.name(),
                processed_items = progress.processed_items,
                total_items = total,
                success = result.is_success(),
                "iterable task finished"
            );
        } else {
            tracing::info!(
                task = task.name(),
                success = result.is_success(),
                "iterable task finished"
            );
        }

        Ok(result)
    }

    async fn mark_task_started(&self, task_name: &str) -> Result<()> {
        let store = Arc::clone(&self.progress_store);
        let name = task_name.to_string();
        self.progress_store
            .transaction(Box::pin(async move {
                let progress = TaskProgress::new(&name, TaskStatus::InProgress)
                    .with_started_at(Utc::now());
                store.save(&name, &progress).await
            }))
            .await
    }

    async fn mark_task_failed(&self, task_name: &str, error_message: &str) -> Result<()> {
        let store = Arc::clone(&self.progress_store);
        let name = task_name.to_string();
        let message = error_message.to_string();
        self.progress_store
            .transaction(Box::pin(async move {
                let progress = TaskProgress::new(&name, TaskStatus::Failed)
                    .with_error_message(message)
                    .with_completed_at(Utc::now());
                store.save(&name, &progress).await
            }))
            .await
    }
}
