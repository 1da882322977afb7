use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SequencerError};

// ===== Task Status =====

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

// ===== Task Progress Checkpoint =====

/// Persisted checkpoint for one task. Created when a task starts, updated
/// during item iteration, finalized when the task completes or fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskProgress {
    pub task_name: String,
    pub status: TaskStatus,
    pub total_items: Option<u64>,
    pub processed_items: u64,
    pub last_processed_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskProgress {
    pub fn new(task_name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_name: task_name.into(),
            status,
            total_items: None,
            processed_items: 0,
            last_processed_id: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata: HashMap::new(),
        }
    }

    /// Sets the item counters. Fails when `processed` exceeds `total`.
    pub fn with_counts(mut self, processed: u64, total: Option<u64>) -> Result<Self> {
        if let Some(total) = total {
            if processed > total {
                return Err(SequencerError::Validation(format!(
                    "processed_items ({}) cannot be greater than total_items ({})",
                    processed, total
                )));
            }
        }
        self.processed_items = processed;
        self.total_items = total;
        Ok(self)
    }

    pub fn with_last_processed_id(mut self, id: impl Into<String>) -> Self {
        self.last_processed_id = Some(id.into());
        self
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}
