//! Per-frequency aggregation of indicator decisions.
//!
//! An `IndicatorGroup` runs every indicator configured for one frequency over
//! the same candle window and folds their decisions into a single
//! `FrequencyDecision` with a policy chosen at construction. The raw votes are
//! kept alongside the result so callers can see which indicator held the group
//! back.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::decision::{Decision, FrequencyDecision};
use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::indicator::Indicator;
use crate::domain::ohlcv::Candle;

/// Combination function over member decisions, in member order.
pub type Policy = Arc<dyn Fn(&[Decision]) -> Decision + Send + Sync>;

/// BUY only if every member says BUY, SELL only if every member says SELL.
pub fn unanimous(decisions: &[Decision]) -> Decision {
    match decisions.split_first() {
        Some((&first, rest)) if rest.iter().all(|&d| d == first) => first,
        _ => Decision::Hold,
    }
}

/// Majority without conflict.
///
/// HOLD when BUY and SELL are both present, or when every member disagrees
/// with every other. Otherwise the single directional decision present wins,
/// even if some members abstained.
pub fn consensus(decisions: &[Decision]) -> Decision {
    let has_buy = decisions.contains(&Decision::Buy);
    let has_sell = decisions.contains(&Decision::Sell);
    if has_buy && has_sell {
        return Decision::Hold;
    }

    let distinct = [Decision::Buy, Decision::Sell, Decision::Hold]
        .iter()
        .filter(|d| decisions.contains(d))
        .count();
    if decisions.len() > 1 && distinct >= decisions.len() {
        return Decision::Hold;
    }

    if has_buy {
        Decision::Buy
    } else if has_sell {
        Decision::Sell
    } else {
        Decision::Hold
    }
}

/// Named policies selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Unanimous,
    Consensus,
}

impl PolicyKind {
    pub fn policy(self) -> Policy {
        match self {
            PolicyKind::Unanimous => Arc::new(unanimous),
            PolicyKind::Consensus => Arc::new(consensus),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Unanimous => write!(f, "unanimous"),
            PolicyKind::Consensus => write!(f, "consensus"),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unanimous" | "unison" => Ok(PolicyKind::Unanimous),
            "consensus" | "majority" => Ok(PolicyKind::Consensus),
            other => Err(format!("unknown policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Decided(Decision),
    InsufficientData,
}

impl VoteOutcome {
    /// What the policy sees: a short window abstains.
    pub fn decision(self) -> Decision {
        match self {
            VoteOutcome::Decided(d) => d,
            VoteOutcome::InsufficientData => Decision::Hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub indicator: String,
    pub outcome: VoteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEvaluation {
    pub frequency_decision: FrequencyDecision,
    pub votes: Vec<Vote>,
}

impl GroupEvaluation {
    pub fn decision(&self) -> Decision {
        self.frequency_decision.decision
    }

    pub fn insufficient_count(&self) -> usize {
        self.votes
            .iter()
            .filter(|v| v.outcome == VoteOutcome::InsufficientData)
            .count()
    }
}

pub struct IndicatorGroup {
    frequency: Frequency,
    indicators: Vec<Box<dyn Indicator>>,
    policy: Policy,
}

impl IndicatorGroup {
    /// Group with the unanimous-or-hold policy.
    pub fn new(frequency: Frequency, indicators: Vec<Box<dyn Indicator>>) -> Self {
        Self::with_policy(frequency, indicators, PolicyKind::Unanimous.policy())
    }

    pub fn with_policy(
        frequency: Frequency,
        indicators: Vec<Box<dyn Indicator>>,
        policy: Policy,
    ) -> Self {
        IndicatorGroup {
            frequency,
            indicators,
            policy,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn indicators(&self) -> &[Box<dyn Indicator>] {
        &self.indicators
    }

    /// Candles needed to give every member a full window.
    pub fn lookback(&self) -> usize {
        self.indicators
            .iter()
            .map(|i| i.lookback())
            .max()
            .unwrap_or(0)
    }

    /// Runs every member over `window`.
    ///
    /// A member that reports `InsufficientData` votes HOLD. Malformed windows
    /// (`InvariantViolation`) are not absorbed.
    pub fn evaluate(&self, window: &[Candle]) -> Result<GroupEvaluation, InvestrError> {
        let mut votes = Vec::with_capacity(self.indicators.len());
        for indicator in &self.indicators {
            let outcome = match indicator.decide(window) {
                Ok(d) => VoteOutcome::Decided(d),
                Err(InvestrError::InsufficientData { .. }) => VoteOutcome::InsufficientData,
                Err(e) => return Err(e),
            };
            votes.push(Vote {
                indicator: indicator.name(),
                outcome,
            });
        }

        let decisions: Vec<Decision> = votes.iter().map(|v| v.outcome.decision()).collect();
        let decision = if decisions.is_empty() {
            Decision::Hold
        } else {
            (self.policy)(&decisions)
        };

        tracing::debug!(
            frequency = %self.frequency,
            decision = %decision,
            votes = ?decisions,
            "indicator group evaluated"
        );

        Ok(GroupEvaluation {
            frequency_decision: FrequencyDecision::new(self.frequency, decision),
            votes,
        })
    }
}

impl fmt::Debug for IndicatorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorGroup")
            .field("frequency", &self.frequency)
            .field("indicators", &self.indicators)
            .finish_non_exhaustive()
    }
}
