//! Worker configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::WorkerError;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Fixed search depth for every oracle request
    pub depth: u32,

    /// Upper bound on a single oracle round-trip (spawn or evaluate)
    pub oracle_timeout: Duration,

    /// How long a cached analysis stays valid
    pub cache_ttl: Duration,

    /// Where the cache snapshot is read from and written to, if anywhere
    pub cache_file: Option<PathBuf>,

    pub stockfish_hash_mb: u32,
    pub stockfish_threads: u32,

    /// Independent analysis runs (one engine process each) allowed at once
    pub max_concurrent_runs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            depth: 12,
            oracle_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(5 * 60 * 60),
            cache_file: None,
            stockfish_hash_mb: 64,
            stockfish_threads: 1,
            max_concurrent_runs: num_cpus::get(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn load() -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let stockfish_path = env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path);

        let depth = parse_var("ANALYSIS_DEPTH").unwrap_or(defaults.depth);
        if depth == 0 {
            return Err(WorkerError::Config("ANALYSIS_DEPTH must be greater than 0"));
        }

        let oracle_timeout = parse_var("ORACLE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.oracle_timeout);
        if oracle_timeout.is_zero() {
            return Err(WorkerError::Config("ORACLE_TIMEOUT_SECS must be greater than 0"));
        }

        let cache_ttl = parse_var("CACHE_TTL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let cache_file = env::var("CACHE_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let stockfish_hash_mb = parse_var("STOCKFISH_HASH_MB").unwrap_or(defaults.stockfish_hash_mb);
        let stockfish_threads = parse_var("STOCKFISH_THREADS").unwrap_or(defaults.stockfish_threads);

        let max_concurrent_runs = parse_var("MAX_CONCURRENT_RUNS")
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.max_concurrent_runs);

        Ok(Self {
            stockfish_path,
            depth,
            oracle_timeout,
            cache_ttl,
            cache_file,
            stockfish_hash_mb,
            stockfish_threads,
            max_concurrent_runs,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
