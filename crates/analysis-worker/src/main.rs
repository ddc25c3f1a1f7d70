//! Analysis worker CLI
//!
//! Reads PGN files (paths or glob patterns), analyzes every game with a
//! Stockfish process per run and prints one JSON line per game.
//!
//! Usage: analysis-worker [--depth N] <pgn-file-or-glob>...

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use analysis_worker::stockfish::EngineOptions;
use analysis_worker::{AnalysisCache, PrecisionAnalyzer, StockfishFactory, WorkerConfig};
use chess_core::pgn;

struct CliArgs {
    depth: Option<u32>,
    inputs: Vec<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut depth = None;
    let mut inputs = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--depth" => {
                let value = args.get(i + 1).context("--depth needs a value")?;
                depth = Some(value.parse().with_context(|| format!("invalid depth: {value}"))?);
                i += 2;
            }
            other => {
                inputs.push(other.to_string());
                i += 1;
            }
        }
    }

    if inputs.is_empty() {
        bail!("usage: analysis-worker [--depth N] <pgn-file-or-glob>...");
    }
    Ok(CliArgs { depth, inputs })
}

fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let matched: Vec<PathBuf> = glob::glob(input)?.filter_map(|p| p.ok()).collect();
            if matched.is_empty() {
                warn!(pattern = %input, "No files matched");
            }
            files.extend(matched);
        } else {
            files.push(PathBuf::from(input));
        }
    }
    Ok(files)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON results.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;
    let config = WorkerConfig::load()?;
    let depth = args.depth.unwrap_or(config.depth);
    if depth == 0 {
        bail!("--depth must be greater than 0");
    }
    info!(
        stockfish_path = %config.stockfish_path,
        depth,
        max_concurrent_runs = config.max_concurrent_runs,
        "Worker config loaded"
    );

    let cache = match &config.cache_file {
        Some(path) if path.exists() => AnalysisCache::load(path, config.cache_ttl).unwrap_or_else(|e| {
            warn!(error = %e, path = %path.display(), "Ignoring unreadable cache snapshot");
            AnalysisCache::new(config.cache_ttl)
        }),
        _ => AnalysisCache::new(config.cache_ttl),
    };

    let factory = Arc::new(StockfishFactory::new(
        config.stockfish_path.clone(),
        EngineOptions {
            hash_mb: config.stockfish_hash_mb,
            threads: config.stockfish_threads,
        },
    ));
    let analyzer = Arc::new(PrecisionAnalyzer::new(
        factory,
        Arc::new(cache),
        config.oracle_timeout,
    ));

    let mut games = Vec::new();
    for path in expand_inputs(&args.inputs)? {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        for (i, game) in pgn::split_games(&text).into_iter().enumerate() {
            games.push((format!("{}#{}", path.display(), i + 1), game.to_string()));
        }
    }
    info!(games = games.len(), "Starting analysis");

    // Bound the number of concurrent runs (one Stockfish process each)
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_runs));
    let mut handles = Vec::with_capacity(games.len());
    for (label, text) in games {
        let permit = semaphore.clone().acquire_owned().await?;
        let analyzer = analyzer.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit; // Hold until done
            let outcome = analyzer.analyze_pgn(&text, depth).await;
            (label, outcome)
        }));
    }

    let mut failed = 0u32;
    for joined in futures::future::join_all(handles).await {
        let (label, outcome) = joined?;
        match outcome {
            Ok(result) => {
                let line = serde_json::json!({ "game": label, "analysis": &*result });
                println!("{line}");
            }
            Err(e) => {
                error!(game = %label, error = %e, "Analysis failed");
                failed += 1;
            }
        }
    }

    if let Some(path) = &config.cache_file {
        analyzer.cache().purge_expired();
        analyzer.cache().save(path)?;
    }

    info!(failed, "Analysis finished");
    Ok(())
}
