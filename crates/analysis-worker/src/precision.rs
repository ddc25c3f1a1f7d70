//! Precision analyzer: per-ply centipawn loss of a recorded game.
//!
//! Tokens are replayed from the initial position into long algebraic moves,
//! then the oracle scores the position before and after every ply, strictly
//! in order and one request at a time. Any oracle failure aborts the run, so
//! a result is either complete or absent.

use std::sync::Arc;
use std::time::Duration;

use chess_core::notation::{normalize, san_to_uci};
use chess_core::pgn;
use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::analysis::{calculate_cp_loss, classify_move, AnalysisResult, PlyLoss};
use crate::cache::{AnalysisCache, CacheKey};
use crate::error::WorkerError;
use crate::oracle::{EvaluationOracle, OracleFactory};

pub struct PrecisionAnalyzer {
    factory: Arc<dyn OracleFactory>,
    cache: Arc<AnalysisCache>,
    oracle_timeout: Duration,
}

impl PrecisionAnalyzer {
    pub fn new(factory: Arc<dyn OracleFactory>, cache: Arc<AnalysisCache>, oracle_timeout: Duration) -> Self {
        Self {
            factory,
            cache,
            oracle_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    /// Analyze the first game in `pgn`. Fails with `CustomStart` for a game set
    /// up from another position and with `EmptyGame` when it has no moves.
    pub async fn analyze_pgn(&self, pgn: &str, depth: u32) -> Result<Arc<AnalysisResult>, WorkerError> {
        if let Some(fen) = pgn::custom_start(pgn) {
            return Err(WorkerError::CustomStart(fen));
        }
        let record = pgn::parse_pgn(pgn).ok_or(WorkerError::EmptyGame)?;
        self.analyze_moves(&record.moves, depth).await
    }

    /// Analyze a token list, serving repeated requests from the cache.
    pub async fn analyze_moves<S: AsRef<str>>(
        &self,
        tokens: &[S],
        depth: u32,
    ) -> Result<Arc<AnalysisResult>, WorkerError> {
        let normalized: Vec<String> = tokens
            .iter()
            .map(|t| normalize(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        let key = CacheKey::new(&normalized, depth);
        self.cache
            .get_or_try_init(key, || self.run(normalized, depth))
            .await
    }

    async fn run(&self, tokens: Vec<String>, depth: u32) -> Result<AnalysisResult, WorkerError> {
        let uci = san_to_uci(&tokens)?;
        if uci.is_empty() {
            return Ok(AnalysisResult::from_plies(depth, Vec::new(), Utc::now()));
        }

        let mut oracle = match timeout(self.oracle_timeout, self.factory.connect()).await {
            Ok(oracle) => oracle?,
            Err(_) => return Err(WorkerError::OracleTimeout(self.oracle_timeout)),
        };

        let outcome = self.score_plies(oracle.as_mut(), &tokens, &uci, depth).await;
        if timeout(self.oracle_timeout, oracle.shutdown()).await.is_err() {
            warn!("Oracle did not shut down in time");
        }

        let plies = outcome.map_err(|e| {
            warn!(error = %e, plies = uci.len(), "Analysis aborted");
            e
        })?;
        let result = AnalysisResult::from_plies(depth, plies, Utc::now());
        info!(
            plies = uci.len(),
            depth,
            acpl = result.average_centipawn_loss,
            "Analysis complete"
        );
        Ok(result)
    }

    async fn score_plies(
        &self,
        oracle: &mut dyn EvaluationOracle,
        tokens: &[String],
        uci: &[String],
        depth: u32,
    ) -> Result<Vec<PlyLoss>, WorkerError> {
        let mut plies = Vec::with_capacity(uci.len());
        for (i, (san, mv)) in tokens.iter().zip(uci).enumerate() {
            let best = self.evaluate(oracle, &uci[..i], depth).await?;
            let after = self.evaluate(oracle, &uci[..=i], depth).await?;

            // White's plies compare raw scores; black's flip the post-move score.
            let actual = if i % 2 == 0 { after } else { -after };
            let loss = calculate_cp_loss(best, actual);
            debug!(ply = i, san = san.as_str(), best, actual, loss, "Scored ply");

            plies.push(PlyLoss {
                ply: i,
                san: san.clone(),
                uci: mv.clone(),
                best,
                actual,
                loss,
                classification: classify_move(loss),
            });
        }
        Ok(plies)
    }

    async fn evaluate(
        &self,
        oracle: &mut dyn EvaluationOracle,
        moves: &[String],
        depth: u32,
    ) -> Result<i32, WorkerError> {
        match timeout(self.oracle_timeout, oracle.evaluate(moves, depth)).await {
            Ok(evaluation) => Ok(evaluation?.score),
            Err(_) => Err(WorkerError::OracleTimeout(self.oracle_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Evaluation;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Script {
        scores: Vec<i32>,
        fail_at: Option<usize>,
        hang: bool,
        delay: Option<Duration>,
    }

    struct ScriptedOracle {
        script: Arc<Script>,
        calls: usize,
        requests: Arc<Mutex<Vec<Vec<String>>>>,
    }

    #[async_trait]
    impl EvaluationOracle for ScriptedOracle {
        async fn evaluate(&mut self, moves: &[String], _depth: u32) -> Result<Evaluation, WorkerError> {
            self.requests.lock().unwrap().push(moves.to_vec());
            let call = self.calls;
            self.calls += 1;
            if self.script.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = self.script.delay {
                tokio::time::sleep(delay).await;
            }
            if self.script.fail_at == Some(call) {
                return Err(WorkerError::MalformedResponse("garbage".into()));
            }
            Ok(Evaluation::new(self.script.scores[call % self.script.scores.len()]))
        }
    }

    struct ScriptedFactory {
        script: Arc<Script>,
        connects: AtomicUsize,
        requests: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl ScriptedFactory {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script: Arc::new(script),
                connects: AtomicUsize::new(0),
                requests: Arc::default(),
            })
        }
    }

    #[async_trait]
    impl OracleFactory for ScriptedFactory {
        async fn connect(&self) -> Result<Box<dyn EvaluationOracle>, WorkerError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedOracle {
                script: self.script.clone(),
                calls: 0,
                requests: self.requests.clone(),
            }))
        }
    }

    struct DownFactory;

    #[async_trait]
    impl OracleFactory for DownFactory {
        async fn connect(&self) -> Result<Box<dyn EvaluationOracle>, WorkerError> {
            Err(WorkerError::OracleUnavailable("no engine".into()))
        }
    }

    fn analyzer(factory: Arc<dyn OracleFactory>, oracle_timeout: Duration) -> PrecisionAnalyzer {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(300)));
        PrecisionAnalyzer::new(factory, cache, oracle_timeout)
    }

    const OPENING: [&str; 4] = ["e4", "e5", "Nf3", "Nc6"];

    fn reference_script() -> Script {
        Script {
            scores: vec![50, 40, 30, 20, 30, 25, 20, 15],
            ..Script::default()
        }
    }

    #[tokio::test]
    async fn test_reference_average_loss() {
        let factory = ScriptedFactory::new(reference_script());
        let analyzer = analyzer(factory.clone(), Duration::from_secs(5));

        let result = analyzer.analyze_moves(&OPENING, 12).await.unwrap();
        let losses: Vec<i32> = result.plies.iter().map(|p| p.loss).collect();
        assert_eq!(losses, vec![10, 50, 5, 35]);
        assert!((result.average_centipawn_loss.unwrap() - 25.0).abs() < 1e-9);
        assert_eq!(result.plies[2].uci, "g1f3");

        let requests = factory.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 8);
        assert!(requests[0].is_empty());
        assert_eq!(requests[1], vec!["e2e4"]);
        assert_eq!(requests[2], vec!["e2e4"]);
        assert_eq!(requests[7], vec!["e2e4", "e7e5", "g1f3", "b8c6"]);
    }

    #[tokio::test]
    async fn test_repeat_request_uses_cache() {
        let factory = ScriptedFactory::new(reference_script());
        let analyzer = analyzer(factory.clone(), Duration::from_secs(5));

        let first = analyzer.analyze_moves(&OPENING, 12).await.unwrap();
        // Spelling variants normalize to the same key.
        let second = analyzer
            .analyze_moves(&["e4!", "e5", "Nf3+", "Nc6?!"], 12)
            .await
            .unwrap();
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        analyzer.analyze_moves(&OPENING, 14).await.unwrap();
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_run() {
        let factory = ScriptedFactory::new(Script {
            delay: Some(Duration::from_millis(5)),
            ..reference_script()
        });
        let analyzer = analyzer(factory.clone(), Duration::from_secs(5));

        let (a, b) = tokio::join!(
            analyzer.analyze_moves(&OPENING, 12),
            analyzer.analyze_moves(&OPENING, 12)
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_aborts_run() {
        let factory = ScriptedFactory::new(Script {
            hang: true,
            ..reference_script()
        });
        let analyzer = analyzer(factory, Duration::from_millis(20));

        let err = analyzer.analyze_moves(&OPENING, 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::OracleTimeout(_)));
        assert!(analyzer.cache().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_leaves_nothing_cached() {
        let factory = ScriptedFactory::new(Script {
            fail_at: Some(3),
            ..reference_script()
        });
        let analyzer = analyzer(factory.clone(), Duration::from_secs(5));

        let err = analyzer.analyze_moves(&OPENING, 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::MalformedResponse(_)));
        assert!(analyzer.cache().is_empty());

        // The next run gets a fresh oracle and fails the same way; nothing partial leaks.
        assert!(analyzer.analyze_moves(&OPENING, 12).await.is_err());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_oracle_unavailable() {
        let analyzer = analyzer(Arc::new(DownFactory), Duration::from_secs(5));
        let err = analyzer.analyze_moves(&OPENING, 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::OracleUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_game_needs_no_oracle() {
        let analyzer = analyzer(Arc::new(DownFactory), Duration::from_secs(5));
        let result = analyzer.analyze_moves::<&str>(&[], 12).await.unwrap();
        assert!(result.plies.is_empty());
        assert_eq!(result.average_centipawn_loss, None);

        let err = analyzer.analyze_pgn("[White \"A\"]\n\n*", 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::EmptyGame));
    }

    #[tokio::test]
    async fn test_unresolvable_token_fails_before_oracle() {
        let factory = ScriptedFactory::new(reference_script());
        let analyzer = analyzer(factory.clone(), Duration::from_secs(5));

        let err = analyzer.analyze_moves(&["e4", "Ke3"], 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::Notation(_)));
        assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_start_reported_distinctly() {
        let analyzer = analyzer(Arc::new(DownFactory), Duration::from_secs(5));
        let pgn = "[SetUp \"1\"]\n[FEN \"8/8/8/8/8/8/8/K6k w - - 0 1\"]\n\n1. Kb2 *";
        let err = analyzer.analyze_pgn(pgn, 12).await.unwrap_err();
        assert!(matches!(err, WorkerError::CustomStart(ref fen) if fen == "8/8/8/8/8/8/8/K6k w - - 0 1"));
    }
}
