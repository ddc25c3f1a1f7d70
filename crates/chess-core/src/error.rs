//! Chess rules error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Ambiguous move '{token}': {candidates} candidates")]
    AmbiguousMove { token: String, candidates: usize },

    #[error("Unresolvable move: {0}")]
    UnresolvableMove(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid square: {0}")]
    InvalidSquare(String),
}
