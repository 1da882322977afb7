#![allow(dead_code)]

use async_trait::async_trait;
use sequencer_core::Result;
use sequencer_engine::{ExecutionContext, Task, TaskResult};
use std::sync::Arc;

/// Task stub that either succeeds with a small payload or fails with an
/// explicit failure result.
pub struct StubTask {
    name: String,
    depends_on: Vec<String>,
    fail: bool,
}

impl StubTask {
    pub fn new(name: &str, depends_on: &[&str]) -> Arc<dyn Task> {
        Arc::new(Self {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            fail: false,
        })
    }

    pub fn failing(name: &str, depends_on: &[&str]) -> Arc<dyn Task> {
        Arc::new(Self {
            name: name.to_string(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            fail: true,
        })
    }
}

#[async_trait]
impl Task for StubTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn depends_on(&self) -> Vec<String> {
        self.depends_on.clone()
    }

    async fn execute(&self, _context: &ExecutionContext) -> Result<TaskResult> {
        if self.fail {
            Ok(TaskResult::failure(format!("{} exploded", self.name)))
        } else {
            Ok(TaskResult::success(serde_json::json!({ "task": self.name })))
        }
    }
}

/// Task stub whose `execute` returns an `Err` instead of a failed result.
pub struct ErroringTask {
    name: String,
}

impl ErroringTask {
    pub fn new(name: &str) -> Arc<dyn Task> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Task for ErroringTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _context: &ExecutionContext) -> Result<TaskResult> {
        Err(sequencer_core::SequencerError::TaskExecution {
            task: self.name.clone(),
            message: "boom".to_string(),
        })
    }
}

pub fn order(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}
