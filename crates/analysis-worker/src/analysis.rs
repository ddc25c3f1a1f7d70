//! Move classification and result types: pure functions only
//! (no engine or cache dependencies)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification thresholds (centipawn loss)
const THRESHOLD_BEST: i32 = 0;
const THRESHOLD_EXCELLENT: i32 = 10;
const THRESHOLD_GOOD: i32 = 50;
const THRESHOLD_INACCURACY: i32 = 100;
const THRESHOLD_MISTAKE: i32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifications {
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl Classifications {
    pub fn record(&mut self, classification: Classification) {
        let slot = match classification {
            Classification::Best => &mut self.best,
            Classification::Excellent => &mut self.excellent,
            Classification::Good => &mut self.good,
            Classification::Inaccuracy => &mut self.inaccuracy,
            Classification::Mistake => &mut self.mistake,
            Classification::Blunder => &mut self.blunder,
        };
        *slot += 1;
    }
}

/// Loss of a single ply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlyLoss {
    pub ply: usize,
    /// Token as recorded, normalized.
    pub san: String,
    pub uci: String,
    /// Score before the move, mover's perspective.
    pub best: i32,
    /// Score after the move, mover's perspective.
    pub actual: i32,
    pub loss: i32,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    pub plies: u32,
    pub average_centipawn_loss: Option<f64>,
    pub accuracy: Option<f64>,
    pub classifications: Classifications,
}

/// Outcome of one analysis run. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub depth: u32,
    pub plies: Vec<PlyLoss>,
    /// Mean loss over all plies; `None` when the game has no plies.
    pub average_centipawn_loss: Option<f64>,
    pub accuracy: Option<f64>,
    pub white: SideSummary,
    pub black: SideSummary,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn from_plies(depth: u32, plies: Vec<PlyLoss>, analyzed_at: DateTime<Utc>) -> Self {
        let average = mean_loss(plies.iter());
        let white = summarize(plies.iter().filter(|p| p.ply % 2 == 0));
        let black = summarize(plies.iter().filter(|p| p.ply % 2 == 1));
        Self {
            depth,
            average_centipawn_loss: average,
            accuracy: average.map(calculate_accuracy),
            plies,
            white,
            black,
            analyzed_at,
        }
    }
}

fn mean_loss<'a>(plies: impl Iterator<Item = &'a PlyLoss>) -> Option<f64> {
    let (count, total) = plies.fold((0u32, 0i64), |(n, sum), p| (n + 1, sum + i64::from(p.loss)));
    (count > 0).then(|| total as f64 / f64::from(count))
}

fn summarize<'a>(plies: impl Iterator<Item = &'a PlyLoss> + Clone) -> SideSummary {
    let mut classifications = Classifications::default();
    let mut count = 0;
    for p in plies.clone() {
        classifications.record(p.classification);
        count += 1;
    }
    let average = mean_loss(plies);
    SideSummary {
        plies: count,
        average_centipawn_loss: average,
        accuracy: average.map(calculate_accuracy),
        classifications,
    }
}

/// Per-ply loss from the mover's perspective; never negative.
pub fn calculate_cp_loss(best: i32, actual: i32) -> i32 {
    best.saturating_sub(actual).max(0)
}

pub fn classify_move(cp_loss: i32) -> Classification {
    if cp_loss <= THRESHOLD_BEST {
        Classification::Best
    } else if cp_loss < THRESHOLD_EXCELLENT {
        Classification::Excellent
    } else if cp_loss < THRESHOLD_GOOD {
        Classification::Good
    } else if cp_loss < THRESHOLD_INACCURACY {
        Classification::Inaccuracy
    } else if cp_loss < THRESHOLD_MISTAKE {
        Classification::Mistake
    } else {
        Classification::Blunder
    }
}

/// Accuracy percentage from an average centipawn loss.
pub fn calculate_accuracy(acpl: f64) -> f64 {
    let accuracy = 100.0 * (1.0 / (1.0 + acpl.max(0.0) / 100.0)).sqrt();
    accuracy.clamp(0.0, 100.0)
}
