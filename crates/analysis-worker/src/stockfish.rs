//! Stockfish engine wrapper using UCI protocol (async I/O)

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use crate::error::WorkerError;
use crate::oracle::Evaluation;

/// Magnitude of a mate-in-0 score; mate in n is reported as `MATE_SCORE - 10 * n`.
pub const MATE_SCORE: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub hash_mb: u32,
    pub threads: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            hash_mb: 64,
            threads: 1,
        }
    }
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str, options: &EngineOptions) -> Result<Self, WorkerError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::OracleUnavailable(format!("Failed to spawn {path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::OracleUnavailable("Stockfish stdin not piped".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| WorkerError::OracleUnavailable("Stockfish stdout not piped".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", options.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", options.hash_mb))
            .await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::OracleUnavailable(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::OracleUnavailable(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    /// Next output line, trimmed. EOF means the process went away.
    async fn read_line(&mut self, line: &mut String) -> Result<(), WorkerError> {
        line.clear();
        let read = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| WorkerError::OracleUnavailable(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(WorkerError::OracleUnavailable("Stockfish closed its output".into()));
        }
        let trimmed_len = line.trim_end().len();
        line.truncate(trimmed_len);
        debug!(line = line.as_str(), "SF >");
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            if line.trim() == expected {
                return Ok(());
            }
        }
    }

    /// Search the position after `moves` to `depth` and report the last score seen.
    pub async fn evaluate(&mut self, moves: &[String], depth: u32) -> Result<Evaluation, WorkerError> {
        self.send(&position_command(moves)).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut score = None;
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();

            if trimmed.starts_with("info") && trimmed.contains(" score ") {
                if let Some(cp) = parse_cp(trimmed) {
                    score = Some(cp);
                } else if let Some(mate) = parse_mate(trimmed) {
                    score = Some(mate_to_cp(mate));
                }
            } else if trimmed.starts_with("bestmove") {
                let best_move = trimmed
                    .split_whitespace()
                    .nth(1)
                    .filter(|mv| *mv != "(none)")
                    .map(str::to_string);
                let score = score.ok_or_else(|| {
                    WorkerError::MalformedResponse(format!("bestmove without a score: {trimmed}"))
                })?;
                return Ok(Evaluation { score, best_move });
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

fn position_command(moves: &[String]) -> String {
    if moves.is_empty() {
        "position startpos".to_string()
    } else {
        format!("position startpos moves {}", moves.join(" "))
    }
}

/// Mate in `n` for the side to move maps to `MATE_SCORE - 10n`; being mated is negative.
pub fn mate_to_cp(n: i32) -> i32 {
    if n > 0 {
        MATE_SCORE - 10 * n
    } else {
        -(MATE_SCORE - 10 * n.abs())
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "cp" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "mate" && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}
