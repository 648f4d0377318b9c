//! Error types for occurrence-engine operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid event record: {0}")]
    InvalidEvent(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
