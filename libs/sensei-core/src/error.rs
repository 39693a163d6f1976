//! Error types for sensei-core.

use thiserror::Error;

/// Errors from the JSON salvage pipeline.
#[derive(Debug, Error)]
pub enum SalvageError {
    #[error("empty input")]
    Empty,

    #[error("unrecoverable JSON: {0}")]
    Unrecoverable(String),
}

/// Errors raised while validating a salvaged value into a quiz.
#[derive(Debug, Error)]
pub enum QuizShapeError {
    #[error("expected an object with a \"questions\" array or a bare array, got {0}")]
    UnexpectedRoot(&'static str),

    #[error("no valid questions ({} rejected)", rejected.len())]
    NoValidQuestions { rejected: Vec<String> },

    #[error(transparent)]
    Unparseable(#[from] SalvageError),
}
