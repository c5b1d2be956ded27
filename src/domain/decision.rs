//! Trading decisions and their provenance.
//!
//! A `Decision` is a pure three-way verdict with no
//! magnitude attached; aggregation works on the verdicts alone.

use std::fmt;

use crate::domain::frequency::Frequency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    /// Buy = +1, Hold = 0, Sell = -1.
    pub fn score(self) -> i32 {
        match self {
            Decision::Buy => 1,
            Decision::Hold => 0,
            Decision::Sell => -1,
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Decision::Buy => Some(Side::Buy),
            Decision::Sell => Some(Side::Sell),
            Decision::Hold => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Output of one indicator group for the latest bar of its frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrequencyDecision {
    pub frequency: Frequency,
    pub decision: Decision,
}

impl FrequencyDecision {
    pub fn new(frequency: Frequency, decision: Decision) -> Self {
        FrequencyDecision {
            frequency,
            decision,
        }
    }
}

/// Final verdict across frequencies, with the votes that produced it.
///
/// `contributions` is sorted by ascending frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendDecision {
    pub decision: Decision,
    pub contributions: Vec<FrequencyDecision>,
}

impl TrendDecision {
    pub fn hold() -> Self {
        TrendDecision {
            decision: Decision::Hold,
            contributions: Vec::new(),
        }
    }

    pub fn vote_of(&self, frequency: Frequency) -> Option<Decision> {
        self.contributions
            .iter()
            .find(|c| c.frequency == frequency)
            .map(|c| c.decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores() {
        assert_eq!(Decision::Buy.score(), 1);
        assert_eq!(Decision::Hold.score(), 0);
        assert_eq!(Decision::Sell.score(), -1);
    }

    #[test]
    fn decision_to_side() {
        assert_eq!(Decision::Buy.side(), Some(Side::Buy));
        assert_eq!(Decision::Sell.side(), Some(Side::Sell));
        assert_eq!(Decision::Hold.side(), None);
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn display() {
        assert_eq!(Decision::Hold.to_string(), "HOLD");
        assert_eq!(Side::Buy.to_string(), "buy");
    }

    #[test]
    fn vote_lookup() {
        let trend = TrendDecision {
            decision: Decision::Buy,
            contributions: vec![
                FrequencyDecision::new(Frequency::ONE_HOUR, Decision::Buy),
                FrequencyDecision::new(Frequency::ONE_DAY, Decision::Hold),
            ],
        };
        assert_eq!(trend.vote_of(Frequency::ONE_DAY), Some(Decision::Hold));
        assert_eq!(trend.vote_of(Frequency::SIX_HOURS), None);
        assert!(TrendDecision::hold().contributions.is_empty());
    }
}
