//! Orders, order requests and the records kept for orders that never filled.

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::decision::Side;

/// A filled order as reported by the market.
///
/// Everything except `paired_with` is fixed once the order exists; the ledger
/// sets `paired_with` exactly once when the order is matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    /// Base asset quantity.
    pub amount: f64,
    /// Quote price per unit of base.
    pub rate: f64,
    /// Quote asset spent (BUY) or received (SELL).
    pub cost: f64,
    pub timestamp: NaiveDateTime,
    pub paired_with: Option<u64>,
}

impl Order {
    pub fn is_paired(&self) -> bool {
        self.paired_with.is_some()
    }

    /// Market value of `amount` at `rate`.
    pub fn value_at(&self, rate: f64) -> f64 {
        self.amount * rate
    }

    /// Mark-to-market profit of this order if it were closed at `rate`.
    pub fn unrealized_pnl(&self, rate: f64) -> f64 {
        match self.side {
            Side::Buy => self.value_at(rate) - self.cost,
            Side::Sell => self.cost - self.value_at(rate),
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {:.8} @ {:.2} (cost {:.2}) {}",
            self.id, self.side, self.amount, self.rate, self.cost, self.timestamp
        )
    }
}

/// What a strategy asks the market to do.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub amount: f64,
    pub rate: f64,
    pub timestamp: NaiveDateTime,
}

impl OrderRequest {
    pub fn notional(&self) -> f64 {
        self.amount * self.rate
    }
}

/// A request the market refused.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedOrder {
    pub request: OrderRequest,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Capital slice rounds to nothing.
    InsufficientCapital,
    /// Too many open BUYs already.
    OrderLimit,
    /// Closing the position would earn less than the configured minimum.
    NotProfitable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InsufficientCapital => write!(f, "insufficient capital"),
            SkipReason::OrderLimit => write!(f, "order limit reached"),
            SkipReason::NotProfitable => write!(f, "not profitable"),
        }
    }
}

/// A trade the strategy wanted but decided not to submit.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedProposal {
    pub timestamp: NaiveDateTime,
    pub side: Side,
    pub rate: f64,
    pub reason: SkipReason,
}
