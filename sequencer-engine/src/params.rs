use async_trait::async_trait;
use sequencer_core::{Result, SequencerError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::tasks::{ExecutionContext, Task, TaskResult};

/// Per-parameter failure handling strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Abort the whole parameter list at the first failure.
    Stop,
    /// Abandon the failing parameter and proceed to the next.
    Continue,
    /// Re-attempt a failing parameter up to `max_retries` additional times,
    /// then abandon it and continue.
    Retry { max_retries: u32 },
}

/// Per-parameter work, composed with an [`ErrorStrategy`] through
/// [`ParameterizedTask`]. Parameters typically come from the results of
/// earlier tasks in the context.
#[async_trait]
pub trait ParameterSource<P>: Send + Sync
where
    P: Send + Sync,
{
    fn name(&self) -> &str;

    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    async fn parameters(&self, context: &ExecutionContext) -> Result<Vec<P>>;

    async fn execute_for_parameter(&self, param: &P, context: &ExecutionContext) -> Result<()>;

    /// Optional override hook consulted before the configured strategy.
    /// `Some(true)` continues (and permits another retry attempt under the
    /// retry strategy), `Some(false)` stops the whole list, `None` defers to
    /// the strategy.
    fn on_error(
        &self,
        _param: &P,
        _error: &SequencerError,
        _context: &ExecutionContext,
    ) -> Option<bool> {
        None
    }
}

/// Execution-policy wrapper turning a [`ParameterSource`] into a [`Task`]:
/// obtains the parameter list once, attempts each parameter under the
/// configured strategy, and aggregates per-parameter outcomes into the
/// task result.
pub struct ParameterizedTask<P> {
    source: Arc<dyn ParameterSource<P>>,
    strategy: ErrorStrategy,
}

impl<P> ParameterizedTask<P>
where
    P: Serialize + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn ParameterSource<P>>, strategy: ErrorStrategy) -> Result<Self> {
        if let ErrorStrategy::Retry { max_retries } = strategy {
            if max_retries == 0 {
                return Err(SequencerError::Configuration(
                    "max_retries must be greater than zero for the retry strategy".to_string(),
                ));
            }
        }
        Ok(Self { source, strategy })
    }

    pub fn strategy(&self) -> ErrorStrategy {
        self.strategy
    }

    fn aggregate(
        &self,
        errors: Vec<(serde_json::Value, String)>,
        processed: usize,
        total: usize,
    ) -> TaskResult {
        let error_entries: Vec<serde_json::Value> = errors
            .iter()
            .map(|(param, message)| json!({ "parameter": param, "error": message }))
            .collect();
        let data = json!({
            "processed": processed,
            "total": total,
            "errors": error_entries,
        });

        if errors.is_empty() {
            TaskResult::success(data)
        } else {
            let mut result =
                TaskResult::failure(format!("failed to process {} parameter(s)", errors.len()));
            result.data = data;
            result
        }
    }
}

#[async_trait]
impl<P> Task for ParameterizedTask<P>
where
    P: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.source.name()
    }

    fn depends_on(&self) -> Vec<String> {
        self.source.depends_on()
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<TaskResult> {
        let parameters = self.source.parameters(context).await?;
        let total = parameters.len();
        let max_retries = match self.strategy {
            ErrorStrategy::Retry { max_retries } => max_retries,
            _ => 0,
        };

        let mut errors: Vec<(serde_json::Value, String)> = Vec::new();
        let mut processed = 0usize;

        'params: for param in &parameters {
            let mut attempts = 0u32;
            loop {
                match self.source.execute_for_parameter(param, context).await {
                    Ok(()) => {
                        processed += 1;
                        continue 'params;
                    }
                    Err(error) => {
                        tracing::warn!(
                            task = self.source.name(),
                            attempt = attempts + 1,
                            error = %error,
                            "parameter execution failed"
                        );

                        // The hook's definite decision wins over the strategy.
                        match self.source.on_error(param, &error, context) {
                            Some(false) => {
                                errors.push((serde_json::to_value(param)?, error.to_string()));
                                return Ok(self.aggregate(errors, processed, total));
                            }
                            Some(true) => {
                                if attempts < max_retries {
                                    attempts += 1;
                                    continue;
                                }
                                errors.push((serde_json::to_value(param)?, error.to_string()));
                                continue 'params;
                            }
                            None => match self.strategy {
                                ErrorStrategy::Stop => {
                                    errors
                                        .push((serde_json::to_value(param)?, error.to_string()));
                                    return Ok(self.aggregate(errors, processed, total));
                                }
                                ErrorStrategy::Continue => {
                                    errors
                                        .push((serde_json::to_value(param)?, error.to_string()));
                                    continue 'params;
                                }
                                ErrorStrategy::Retry { max_retries } => {
                                    if attempts < max_retries {
                                        attempts += 1;
                                        continue;
                                    }
                                    errors
                                        .push((serde_json::to_value(param)?, error.to_string()));
                                    continue 'params;
                                }
                            },
                        }
                    }
                }
            }
        }

        Ok(self.aggregate(errors, processed, total))
    }
}
