//! Trading strategy state machine.
//!
//! The strategy turns one `TrendDecision` per tick into at most one order:
//!
//! ```text
//!   IDLE ──BUY──▶ HOLDING ──SELL──▶ IDLE
//!                    │
//!                 timeout
//!                    ▼
//!                COOLDOWN ──expires──▶ IDLE
//! ```
//!
//! Time-based transitions are checked before signal-driven ones, except that
//! a SELL which fills while holding wins over the timeout. A timeout never
//! forces a sale: the BUY stays unpaired in the ledger and is reported
//! through `unpaired_orders` until a later SELL closes it.

use chrono::{Duration, NaiveDateTime};
use std::fmt;

use crate::domain::decision::{Decision, Side, TrendDecision};
use crate::domain::error::InvestrError;
use crate::domain::ledger::{OrderLedger, RealizedTrade, UnpairedOrders};
use crate::domain::order::{Order, OrderRequest, RejectedOrder, SkipReason, SkippedProposal};
use crate::ports::market_port::Market;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub symbol: String,
    /// Starting quote capital.
    pub capital: f64,
    /// Fraction of available capital committed per BUY.
    pub position_size: f64,
    /// Maximum number of unpaired BUYs at once.
    pub order_limit: usize,
    pub timeout: Duration,
    pub cooldown: Duration,
    /// Minimum profit a SELL must realize, if set.
    pub min_profit: Option<f64>,
    /// Sell stale unpaired BUYs on a SELL signal while idle.
    pub liquidate_stale: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            symbol: String::new(),
            capital: 1000.0,
            position_size: 0.25,
            order_limit: 4,
            timeout: Duration::hours(6),
            cooldown: Duration::hours(12),
            min_profit: None,
            liquidate_stale: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    Holding { since: NaiveDateTime, buy_id: u64 },
    Cooldown { until: NaiveDateTime },
}

impl fmt::Display for StrategyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyState::Idle => write!(f, "IDLE"),
            StrategyState::Holding { buy_id, .. } => write!(f, "HOLDING(#{})", buy_id),
            StrategyState::Cooldown { until } => write!(f, "COOLDOWN(until {})", until),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: NaiveDateTime,
    pub rate: f64,
    pub trend: TrendDecision,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    None,
    Filled {
        order: Order,
        realized: Option<RealizedTrade>,
    },
    Skipped(SkipReason),
}

/// What a single `step` did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub previous: StrategyState,
    pub state: StrategyState,
    pub action: Action,
}

impl StepOutcome {
    pub fn transitioned(&self) -> bool {
        self.previous != self.state
    }

    pub fn filled(&self) -> Option<&Order> {
        match &self.action {
            Action::Filled { order, .. } => Some(order),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Strategy {
    config: StrategyConfig,
    state: StrategyState,
    ledger: OrderLedger,
    available_capital: f64,
    assets: f64,
    rejected: Vec<RejectedOrder>,
    skipped: Vec<SkippedProposal>,
}

impl Strategy {
    pub fn new(config: StrategyConfig) -> Self {
        let available_capital = config.capital;
        Strategy {
            config,
            state: StrategyState::Idle,
            ledger: OrderLedger::new(),
            available_capital,
            assets: 0.0,
            rejected: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Advances the state machine by one tick.
    ///
    /// On any error the state is left as it was before the tick, including
    /// a cooldown that would have expired. A `MarketRejected` request is
    /// kept in `rejected_orders` and the error is returned to the caller.
    pub fn step(
        &mut self,
        tick: &Tick,
        market: &mut dyn Market,
    ) -> Result<StepOutcome, InvestrError> {
        let previous = self.state;
        match self.advance(tick, market) {
            Ok(action) => {
                let outcome = self.outcome(previous, action);
                if outcome.transitioned() {
                    tracing::info!(from = %outcome.previous, to = %outcome.state, "state transition");
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state = previous;
                Err(e)
            }
        }
    }

    fn advance(&mut self, tick: &Tick, market: &mut dyn Market) -> Result<Action, InvestrError> {
        if let StrategyState::Cooldown { until } = self.state {
            if tick.timestamp < until {
                return Ok(Action::None);
            }
            tracing::info!(at = %tick.timestamp, "cooldown expired");
            self.state = StrategyState::Idle;
        }

        let action = match (self.state, tick.trend.decision) {
            (StrategyState::Holding { since, buy_id }, decision) => {
                let action = if decision == Decision::Sell {
                    self.sell_oldest(tick, market)?
                } else {
                    Action::None
                };
                if matches!(action, Action::Filled { .. }) {
                    self.state = StrategyState::Idle;
                } else if tick.timestamp - since > self.config.timeout {
                    let until = tick.timestamp + self.config.cooldown;
                    tracing::info!(
                        buy_id,
                        since = %since,
                        until = %until,
                        "holding timed out, cooling down"
                    );
                    self.state = StrategyState::Cooldown { until };
                }
                action
            }
            (StrategyState::Idle, Decision::Buy) => {
                let action = self.buy(tick, market)?;
                if let Action::Filled { order, .. } = &action {
                    self.state = StrategyState::Holding {
                        since: tick.timestamp,
                        buy_id: order.id,
                    };
                }
                action
            }
            (StrategyState::Idle, Decision::Sell)
                if self.config.liquidate_stale && self.ledger.unpaired_count(Side::Buy) > 0 =>
            {
                self.sell_oldest(tick, market)?
            }
            _ => Action::None,
        };
        Ok(action)
    }

    fn outcome(&self, previous: StrategyState, action: Action) -> StepOutcome {
        StepOutcome {
            previous,
            state: self.state,
            action,
        }
    }

    fn buy(&mut self, tick: &Tick, market: &mut dyn Market) -> Result<Action, InvestrError> {
        if self.ledger.unpaired_count(Side::Buy) >= self.config.order_limit {
            return Ok(self.skip(tick, Side::Buy, SkipReason::OrderLimit));
        }
        let slice = self.available_capital * self.config.position_size;
        if !(slice > 0.0 && tick.rate > 0.0) {
            return Ok(self.skip(tick, Side::Buy, SkipReason::InsufficientCapital));
        }

        let request = self.request(tick, Side::Buy, slice / tick.rate);
        self.execute(request, market)
    }

    fn sell_oldest(
        &mut self,
        tick: &Tick,
        market: &mut dyn Market,
    ) -> Result<Action, InvestrError> {
        let Some(buy) = self.ledger.oldest_unpaired(Side::Buy) else {
            return Ok(Action::None);
        };
        let (amount, buy_cost) = (buy.amount, buy.cost);

        if let Some(min_profit) = self.config.min_profit {
            if amount * tick.rate - buy_cost < min_profit {
                return Ok(self.skip(tick, Side::Sell, SkipReason::NotProfitable));
            }
        }

        let request = self.request(tick, Side::Sell, amount);
        self.execute(request, market)
    }

    fn request(&self, tick: &Tick, side: Side, amount: f64) -> OrderRequest {
        OrderRequest {
            symbol: self.config.symbol.clone(),
            side,
            amount,
            rate: tick.rate,
            timestamp: tick.timestamp,
        }
    }

    fn execute(
        &mut self,
        request: OrderRequest,
        market: &mut dyn Market,
    ) -> Result<Action, InvestrError> {
        let order = match market.submit(&request) {
            Ok(order) => order,
            Err(InvestrError::MarketRejected { side, reason }) => {
                tracing::warn!(
                    side = %side,
                    amount = request.amount,
                    rate = request.rate,
                    reason = %reason,
                    "order rejected"
                );
                self.rejected.push(RejectedOrder {
                    request,
                    reason: reason.clone(),
                });
                return Err(InvestrError::MarketRejected { side, reason });
            }
            Err(e) => return Err(e),
        };

        let realized = self.ledger.record(order.clone())?;
        match order.side {
            Side::Buy => {
                self.available_capital -= order.cost;
                self.assets += order.amount;
            }
            Side::Sell => {
                self.available_capital += order.cost;
                self.assets -= order.amount;
            }
        }

        tracing::info!(
            id = order.id,
            side = %order.side,
            amount = order.amount,
            rate = order.rate,
            cost = order.cost,
            profit = realized.as_ref().map(|t| t.profit),
            "order filled"
        );
        Ok(Action::Filled { order, realized })
    }

    fn skip(&mut self, tick: &Tick, side: Side, reason: SkipReason) -> Action {
        tracing::debug!(side = %side, reason = %reason, "proposal skipped");
        self.skipped.push(SkippedProposal {
            timestamp: tick.timestamp,
            side,
            rate: tick.rate,
            reason,
        });
        Action::Skipped(reason)
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    pub fn pnl(&self, rate: f64) -> f64 {
        self.ledger.pnl(rate)
    }

    pub fn unpaired_orders(&self) -> UnpairedOrders {
        self.ledger.unpaired_orders()
    }

    pub fn rejected_orders(&self) -> &[RejectedOrder] {
        &self.rejected
    }

    pub fn skipped(&self) -> &[SkippedProposal] {
        &self.skipped
    }

    pub fn available_capital(&self) -> f64 {
        self.available_capital
    }

    /// Base asset currently held.
    pub fn assets(&self) -> f64 {
        self.assets
    }

    /// Capital plus held assets marked at `rate`.
    pub fn equity(&self, rate: f64) -> f64 {
        self.available_capital + self.assets * rate
    }
}
