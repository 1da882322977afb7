use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Task '{task}' execution failed: {message}")]
    TaskExecution { task: String, message: String },

    #[error("Progress store error: {0}")]
    Progress(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, SequencerError>;

// Implement From for common error types
#[cfg(feature = "database")]
impl From<sqlx::Error> for SequencerError {
    fn from(err: sqlx::Error) -> Self {
        SequencerError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for SequencerError {
    fn from(err: serde_json::Error) -> Self {
        SequencerError::Serialization(err.to_string())
    }
}
