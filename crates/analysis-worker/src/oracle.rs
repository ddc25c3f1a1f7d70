//! Evaluation oracle abstraction.
//!
//! The analyzer only talks to these traits. A factory hands out one oracle
//! per analysis run; each oracle answers one request at a time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::stockfish::{EngineOptions, StockfishEngine};

/// Score of the position reached after a move sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Centipawns from the perspective of the side to move in that position.
    pub score: i32,
    /// Engine's preferred reply in long algebraic form, if it reported one.
    pub best_move: Option<String>,
}

impl Evaluation {
    pub fn new(score: i32) -> Self {
        Self {
            score,
            best_move: None,
        }
    }
}

#[async_trait]
pub trait EvaluationOracle: Send {
    /// Evaluate the position after `moves` (long algebraic, from the initial position).
    async fn evaluate(&mut self, moves: &[String], depth: u32) -> Result<Evaluation, WorkerError>;

    /// Release the oracle. The default does nothing.
    async fn shutdown(&mut self) {}
}

#[async_trait]
pub trait OracleFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn EvaluationOracle>, WorkerError>;
}

/// Spawns a fresh Stockfish process per analysis run.
#[derive(Debug, Clone)]
pub struct StockfishFactory {
    path: String,
    options: EngineOptions,
}

impl StockfishFactory {
    pub fn new(path: impl Into<String>, options: EngineOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

#[async_trait]
impl OracleFactory for StockfishFactory {
    async fn connect(&self) -> Result<Box<dyn EvaluationOracle>, WorkerError> {
        let engine = StockfishEngine::new(&self.path, &self.options).await?;
        Ok(Box::new(engine))
    }
}

#[async_trait]
impl EvaluationOracle for StockfishEngine {
    async fn evaluate(&mut self, moves: &[String], depth: u32) -> Result<Evaluation, WorkerError> {
        StockfishEngine::evaluate(self, moves, depth).await
    }

    async fn shutdown(&mut self) {
        self.quit().await;
    }
}
