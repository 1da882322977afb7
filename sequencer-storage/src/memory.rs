use async_trait::async_trait;
use chrono::Utc;
use sequencer_core::{ProgressStore, Result, SequencerError, TaskProgress, TaskStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory progress store. No persistence between processes; used for
/// tests and simple embedders. The transaction scope is the trait's
/// pass-through default.
#[derive(Default)]
pub struct MemoryProgressStore {
    storage: RwLock<HashMap<String, TaskProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_task_name(task_name: &str) -> Result<()> {
        if task_name.is_empty() {
            return Err(SequencerError::Progress(
                "task name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn save(&self, task_name: &str, progress: &TaskProgress) -> Result<()> {
        Self::check_task_name(task_name)?;
        if progress.task_name != task_name {
            return Err(SequencerError::Progress(format!(
                "task name mismatch: expected '{}', got '{}'",
                task_name, progress.task_name
            )));
        }

        self.storage
            .write()
            .await
            .insert(task_name.to_string(), progress.clone());
        Ok(())
    }

    async fn load(&self, task_name: &str) -> Result<Option<TaskProgress>> {
        Self::check_task_name(task_name)?;
        Ok(self.storage.read().await.get(task_name).cloned())
    }

    async fn mark_completed(&self, task_name: &str) -> Result<()> {
        Self::check_task_name(task_name)?;

        let mut storage = self.storage.write().await;
        let now = Utc::now();
        match storage.get_mut(task_name) {
            Some(progress) => {
                progress.status = TaskStatus::Completed;
                progress.completed_at = Some(now);
                if progress.started_at.is_none() {
                    progress.started_at = Some(now);
                }
            }
            None => {
                let progress = TaskProgress::new(task_name, TaskStatus::Completed)
                    .with_started_at(now)
                    .with_completed_at(now);
                storage.insert(task_name.to_string(), progress);
            }
        }
        Ok(())
    }

    async fn clear(&self, task_name: &str) -> Result<()> {
        Self::check_task_name(task_name)?;
        self.storage.write().await.remove(task_name);
        Ok(())
    }
}
