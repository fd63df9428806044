//! Harness error type.

use std::path::PathBuf;

use firstfit_core::{ArenaError, IntegrityError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("arena: {0}")]
    Arena(#[from] ArenaError),
    #[error("arena integrity: {0}")]
    Integrity(#[from] IntegrityError),
    /// A scripted step did not behave as expected.
    #[error("scenario '{scenario}' failed at step {step}: {message}")]
    Scenario {
        scenario: &'static str,
        step: usize,
        message: String,
    },
    #[error("{path}: {count} structured-log violation(s), first: {first}")]
    InvalidLog {
        path: PathBuf,
        count: usize,
        first: String,
    },
    #[error("{count} artifact(s) do not match the index, first: {first}")]
    ArtifactMismatch { count: usize, first: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
