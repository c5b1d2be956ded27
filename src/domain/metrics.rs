//! PnL summary and run statistics.

use chrono::NaiveDateTime;

use crate::domain::decision::Side;
use crate::domain::ledger::OrderLedger;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PnlSummary {
    pub rate: f64,
    pub realized: f64,
    pub unrealized: f64,
    pub total: f64,
    /// `total` as a percentage of starting capital.
    pub growth_pct: f64,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub unpaired_buys: usize,
    pub unpaired_sells: usize,
}

impl PnlSummary {
    pub fn compute(
        ledger: &OrderLedger,
        rate: f64,
        starting_capital: f64,
        equity_curve: &[EquityPoint],
    ) -> Self {
        let realized = ledger.realized_pnl();
        let unrealized = ledger.unrealized_pnl(rate);
        let total = realized + unrealized;
        let growth_pct = if starting_capital > 0.0 {
            total / starting_capital * 100.0
        } else {
            0.0
        };

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut gross_win = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in ledger.realized_trades() {
            let profit = trade.profit;
            if profit > 0.0 {
                wins += 1;
                gross_win += profit;
                largest_win = largest_win.max(profit);
            } else if profit < 0.0 {
                losses += 1;
                gross_loss += profit.abs();
                largest_loss = largest_loss.max(profit.abs());
            }
        }

        let trades = ledger.realized_trades().len();
        let win_rate = if trades > 0 {
            wins as f64 / trades as f64
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        PnlSummary {
            rate,
            realized,
            unrealized,
            total,
            growth_pct,
            trades,
            wins,
            losses,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            max_drawdown: max_drawdown(equity_curve),
            unpaired_buys: ledger.unpaired_count(Side::Buy),
            unpaired_sells: ledger.unpaired_count(Side::Sell),
        }
    }
}

/// Largest peak-to-trough fall as a fraction of the peak.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let Some(first) = equity_curve.first() else {
        return 0.0;
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }
    max_dd
}
