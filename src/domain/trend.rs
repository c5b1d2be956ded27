//! Cross-frequency trend detection.
//!
//! Each frequency contributes one vote (BUY = +1, HOLD = 0, SELL = -1). The
//! votes are averaged, optionally weighted by frequency rank, and the result is
//! compared against a dead band around zero. A score sitting exactly on the
//! band edge is a HOLD.

use std::fmt;

use crate::domain::decision::{Decision, FrequencyDecision, TrendDecision};
use crate::domain::error::InvestrError;

pub const DEFAULT_BAND: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendAlgorithm {
    /// Plain average of scores.
    Mean { band: f64 },
    /// Frequencies ranked shortest to longest get weights 1..=n.
    RankWeighted { band: f64 },
}

impl TrendAlgorithm {
    /// Builds the algorithm named in config (`mean` or `rank_weighted`).
    pub fn from_name(name: &str, band: f64) -> Result<Self, String> {
        if !(band >= 0.0 && band < 1.0) {
            return Err(format!("band {} must be in [0, 1)", band));
        }
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "mean" | "average" => Ok(TrendAlgorithm::Mean { band }),
            "rank_weighted" | "ranked" => Ok(TrendAlgorithm::RankWeighted { band }),
            other => Err(format!("unknown trend algorithm '{}'", other)),
        }
    }

    pub fn band(&self) -> f64 {
        match *self {
            TrendAlgorithm::Mean { band } | TrendAlgorithm::RankWeighted { band } => band,
        }
    }

    /// Weighted score of `sorted` (ascending frequency), in [-1, 1].
    fn score(&self, sorted: &[FrequencyDecision]) -> f64 {
        let weight = |rank: usize| -> f64 {
            match self {
                TrendAlgorithm::Mean { .. } => 1.0,
                TrendAlgorithm::RankWeighted { .. } => (rank + 1) as f64,
            }
        };
        let (total, weights) = sorted
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(total, weights), (rank, fd)| {
                let w = weight(rank);
                (total + w * fd.decision.score() as f64, weights + w)
            });
        total / weights
    }
}

impl Default for TrendAlgorithm {
    fn default() -> Self {
        TrendAlgorithm::Mean { band: DEFAULT_BAND }
    }
}

impl fmt::Display for TrendAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendAlgorithm::Mean { band } => write!(f, "mean(band={})", band),
            TrendAlgorithm::RankWeighted { band } => write!(f, "rank_weighted(band={})", band),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendDetector {
    algorithm: TrendAlgorithm,
}

impl TrendDetector {
    pub fn new(algorithm: TrendAlgorithm) -> Self {
        TrendDetector { algorithm }
    }

    pub fn algorithm(&self) -> TrendAlgorithm {
        self.algorithm
    }

    /// Combines one decision per frequency into a trend decision.
    ///
    /// The result depends only on the set of inputs, never on their order.
    /// Two entries for the same frequency are an `InvariantViolation`.
    pub fn evaluate(
        &self,
        decisions: &[FrequencyDecision],
    ) -> Result<TrendDecision, InvestrError> {
        if decisions.is_empty() {
            return Ok(TrendDecision::hold());
        }

        let mut sorted = decisions.to_vec();
        sorted.sort_by_key(|fd| fd.frequency);
        if let Some(pair) = sorted
            .windows(2)
            .find(|pair| pair[0].frequency == pair[1].frequency)
        {
            return Err(InvestrError::invariant(format!(
                "duplicate frequency {} in trend input",
                pair[0].frequency
            )));
        }

        let score = self.algorithm.score(&sorted);
        let band = self.algorithm.band();
        let decision = if score > band {
            Decision::Buy
        } else if score < -band {
            Decision::Sell
        } else {
            Decision::Hold
        };

        tracing::debug!(score, band, decision = %decision, "trend evaluated");

        Ok(TrendDecision {
            decision,
            contributions: sorted,
        })
    }
}
