use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use analysis_worker::{Evaluation, EvaluationOracle, OracleFactory, WorkerError};
use async_trait::async_trait;

/// Oracle that replays a fixed score list, one entry per request, cycling.
pub struct ScriptedOracle {
    scores: Arc<Vec<i32>>,
    next: usize,
    log: Arc<Mutex<Vec<Vec<String>>>>,
}

#[async_trait]
impl EvaluationOracle for ScriptedOracle {
    async fn evaluate(&mut self, moves: &[String], _depth: u32) -> Result<Evaluation, WorkerError> {
        self.log.lock().unwrap().push(moves.to_vec());
        let score = self.scores[self.next % self.scores.len()];
        self.next += 1;
        Ok(Evaluation::new(score))
    }
}

/// Factory for [`ScriptedOracle`]s that counts connections and logs every request.
pub struct ScriptedFactory {
    scores: Arc<Vec<i32>>,
    connects: AtomicUsize,
    log: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedFactory {
    pub fn new(scores: Vec<i32>) -> Arc<Self> {
        Arc::new(Self {
            scores: Arc::new(scores),
            connects: AtomicUsize::new(0),
            log: Arc::default(),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl OracleFactory for ScriptedFactory {
    async fn connect(&self) -> Result<Box<dyn EvaluationOracle>, WorkerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedOracle {
            scores: self.scores.clone(),
            next: 0,
            log: self.log.clone(),
        }))
    }
}

/// Generate a unique suffix based on timestamp to avoid collisions.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

/// Scratch file path under the system temp directory.
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{name}-{}-{}", std::process::id(), unique_suffix()))
}
