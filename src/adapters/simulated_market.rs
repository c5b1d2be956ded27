//! Replay market that fills every valid order at the requested rate.
//!
//! No slippage, no partial fills, no fees. Order ids count up from 1.
//! Rejections can be scripted per submission index for testing the
//! strategy's failure paths.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::domain::error::InvestrError;
use crate::domain::order::{Order, OrderRequest};
use crate::ports::market_port::Market;

#[derive(Debug, Clone, Default)]
pub struct SimulatedMarket {
    next_id: u64,
    submissions: usize,
    clock: Option<(NaiveDateTime, f64)>,
    scripted_rejections: BTreeMap<usize, String>,
    fills: Vec<Order>,
}

impl SimulatedMarket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the `nth` submission (0-based, counting rejected ones too).
    pub fn reject_submission(mut self, nth: usize, reason: impl Into<String>) -> Self {
        self.scripted_rejections.insert(nth, reason.into());
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// Every order filled so far, oldest first.
    pub fn fills(&self) -> &[Order] {
        &self.fills
    }

    pub fn now(&self) -> Option<NaiveDateTime> {
        self.clock.map(|(at, _)| at)
    }
}

impl Market for SimulatedMarket {
    fn submit(&mut self, request: &OrderRequest) -> Result<Order, InvestrError> {
        let nth = self.submissions;
        self.submissions += 1;

        if let Some(reason) = self.scripted_rejections.remove(&nth) {
            return Err(InvestrError::MarketRejected {
                side: request.side,
                reason,
            });
        }
        if !(request.amount > 0.0) || !(request.rate > 0.0) {
            return Err(InvestrError::MarketRejected {
                side: request.side,
                reason: format!(
                    "amount {} and rate {} must be positive",
                    request.amount, request.rate
                ),
            });
        }

        self.next_id += 1;
        let order = Order {
            id: self.next_id,
            side: request.side,
            amount: request.amount,
            rate: request.rate,
            cost: request.notional(),
            timestamp: self.now().unwrap_or(request.timestamp),
            paired_with: None,
        };
        self.fills.push(order.clone());
        Ok(order)
    }

    fn current_rate(&self, symbol: &str) -> Result<f64, InvestrError> {
        self.clock
            .map(|(_, rate)| rate)
            .ok_or_else(|| InvestrError::DataSource {
                reason: format!("no rate observed yet for {}", symbol),
            })
    }

    fn observe(&mut self, at: NaiveDateTime, rate: f64) {
        self.clock = Some((at, rate));
    }
}
