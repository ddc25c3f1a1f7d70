//! Worker error types

use std::time::Duration;

use chess_core::ChessError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Evaluation oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Evaluation oracle timed out after {0:?}")]
    OracleTimeout(Duration),

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Notation error: {0}")]
    Notation(#[from] ChessError),

    #[error("Game record has no moves")]
    EmptyGame,

    #[error("Game starts from a non-standard position: {0}")]
    CustomStart(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
