use thiserror::Error;

use crate::llm::LlmError;

/// Startup failures: anything that stops the service from coming up.
#[derive(Error, Debug)]
pub enum ReverieError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Llm(#[from] LlmError),
}
