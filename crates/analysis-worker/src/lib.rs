//! Game precision analysis against an external evaluation oracle.
//!
//! `PrecisionAnalyzer` replays a recorded game, asks an oracle (Stockfish over
//! UCI in production) to score the position around every ply and reports the
//! centipawn loss per ply. Results are cached per (move list, depth).

pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod oracle;
pub mod precision;
pub mod stockfish;

pub use analysis::{AnalysisResult, Classification, PlyLoss, SideSummary};
pub use cache::{AnalysisCache, CacheKey};
pub use config::WorkerConfig;
pub use error::WorkerError;
pub use oracle::{Evaluation, EvaluationOracle, OracleFactory, StockfishFactory};
pub use precision::PrecisionAnalyzer;
