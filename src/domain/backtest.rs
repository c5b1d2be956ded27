//! Backtest driver.
//!
//! Walks the configured time range one `step` at a time. At each tick every
//! indicator group gets its own window from the candle source, the group
//! decisions are combined into a trend, and the strategy acts on it against
//! the market. All windows for a tick are fetched before the trend is
//! computed.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::decision::{Decision, FrequencyDecision, TrendDecision};
use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::indicator_group::{GroupEvaluation, IndicatorGroup};
use crate::domain::metrics::{EquityPoint, PnlSummary};
use crate::domain::ohlcv::check_window;
use crate::domain::strategy::{Action, StrategyState, Strategy, Tick};
use crate::domain::trend::TrendDetector;
use crate::ports::candle_port::CandleSource;
use crate::ports::market_port::Market;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Tick spacing; the close of this frequency's candle is the tick rate.
    pub step: Frequency,
    /// Extra attempts per tick after a market rejection.
    pub retry_rejected: u32,
}

impl BacktestConfig {
    /// Tick timestamps `start, start + step, ...` up to and including `end`.
    pub fn ticks(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        let step = self.step.duration();
        std::iter::successors(Some(self.start), move |&t| Some(t + step))
            .take_while(move |&t| t <= self.end)
    }

    pub fn tick_count(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        let span = (self.end - self.start).num_minutes();
        (span / self.step.minutes() as i64) as usize + 1
    }
}

/// Indicator groups plus the detector that combines them.
#[derive(Debug)]
pub struct SignalPipeline {
    groups: Vec<IndicatorGroup>,
    detector: TrendDetector,
}

/// Signals for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Signals {
    pub trend: TrendDecision,
    pub groups: Vec<GroupEvaluation>,
    /// Frequencies that voted HOLD without consulting their indicators, because
    /// the window was empty or malformed.
    pub degraded: Vec<Frequency>,
}

impl SignalPipeline {
    /// Fails if two groups share a frequency.
    pub fn new(groups: Vec<IndicatorGroup>, detector: TrendDetector) -> Result<Self, InvestrError> {
        let mut seen = BTreeSet::new();
        for group in &groups {
            if !seen.insert(group.frequency()) {
                return Err(InvestrError::invariant(format!(
                    "more than one indicator group for {}",
                    group.frequency()
                )));
            }
        }
        Ok(SignalPipeline { groups, detector })
    }

    pub fn groups(&self) -> &[IndicatorGroup] {
        &self.groups
    }

    pub fn frequencies(&self) -> Vec<Frequency> {
        self.groups.iter().map(|g| g.frequency()).collect()
    }

    /// Evaluates every group as of `at`.
    ///
    /// A frequency whose window cannot be filled, or arrives out of order,
    /// votes HOLD. Any other source error is returned.
    pub fn evaluate(
        &self,
        source: &dyn CandleSource,
        at: NaiveDateTime,
    ) -> Result<Signals, InvestrError> {
        let mut evaluations = Vec::with_capacity(self.groups.len());
        let mut degraded = Vec::new();

        for group in &self.groups {
            let frequency = group.frequency();
            let window = match source.latest(frequency, group.lookback().max(1), at) {
                Ok(window) => window,
                // members with shorter lookbacks can still vote
                Err(InvestrError::InsufficientData { have, .. }) if have > 0 => {
                    source.latest(frequency, have, at)?
                }
                Err(InvestrError::InsufficientData { need, .. }) => {
                    tracing::debug!(%frequency, need, "no candles yet, voting HOLD");
                    degraded.push(frequency);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if let Err(e) = check_window(&window) {
                tracing::warn!(%frequency, error = %e, "malformed window, voting HOLD");
                degraded.push(frequency);
                continue;
            }
            evaluations.push(group.evaluate(&window)?);
        }

        let mut decisions: Vec<_> = evaluations.iter().map(|e| e.frequency_decision).collect();
        decisions.extend(
            degraded
                .iter()
                .map(|&f| FrequencyDecision::new(f, Decision::Hold)),
        );
        let trend = self.detector.evaluate(&decisions)?;

        Ok(Signals {
            trend,
            groups: evaluations,
            degraded,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub timestamp: NaiveDateTime,
    pub rate: f64,
    pub trend: TrendDecision,
    pub degraded: Vec<Frequency>,
    pub state: StrategyState,
    pub action: Action,
    /// Market rejections seen on this tick.
    pub rejections: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub ticks: Vec<TickRecord>,
    /// Ticks with no step candle at or before them.
    pub skipped_ticks: usize,
    pub rejected: usize,
    pub final_rate: Option<f64>,
    pub equity_curve: Vec<EquityPoint>,
    pub summary: PnlSummary,
}

/// Runs `strategy` over the configured range.
///
/// Market rejections are counted and, if `retry_rejected` allows, retried on
/// the same tick. An `InvariantViolation` stops the run; the ledger is
/// re-verified before the summary is built.
pub fn run_backtest(
    config: &BacktestConfig,
    pipeline: &SignalPipeline,
    strategy: &mut Strategy,
    source: &dyn CandleSource,
    market: &mut dyn Market,
) -> Result<BacktestResult, InvestrError> {
    let total = config.tick_count();
    let mut ticks = Vec::with_capacity(total);
    let mut equity_curve = Vec::with_capacity(total);
    let mut skipped_ticks = 0usize;
    let mut rejected = 0usize;
    let mut final_rate = None;
    let mut degraded_counts: BTreeMap<Frequency, usize> = BTreeMap::new();
    let mut next_progress = 1usize;

    tracing::info!(
        symbol = %config.symbol,
        start = %config.start,
        end = %config.end,
        step = %config.step,
        ticks = total,
        "backtest started"
    );

    for (idx, at) in config.ticks().enumerate() {
        let pct = (idx + 1) * 100 / total.max(1);
        if pct >= next_progress * 10 {
            tracing::info!("progress {}% ({}/{})", pct, idx + 1, total);
            next_progress = pct / 10 + 1;
        }

        let rate = match source.latest(config.step, 1, at) {
            Ok(window) => match window.last() {
                Some(candle) => candle.close,
                None => {
                    skipped_ticks += 1;
                    continue;
                }
            },
            Err(InvestrError::InsufficientData { .. }) => {
                tracing::debug!(at = %at, "no candle for tick, skipping");
                skipped_ticks += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        market.observe(at, rate);

        let signals = pipeline.evaluate(source, at)?;
        for &f in &signals.degraded {
            *degraded_counts.entry(f).or_default() += 1;
        }
        tracing::debug!(
            at = %at,
            rate,
            trend = %signals.trend.decision,
            "tick"
        );

        let tick = Tick {
            timestamp: at,
            rate,
            trend: signals.trend,
        };

        let mut rejections = 0u32;
        let action = loop {
            match strategy.step(&tick, market) {
                Ok(outcome) => break outcome.action,
                Err(InvestrError::MarketRejected { .. }) => {
                    rejected += 1;
                    rejections += 1;
                    if rejections > config.retry_rejected {
                        break Action::None;
                    }
                    tracing::info!(at = %at, attempt = rejections, "retrying rejected order");
                }
                Err(e) => return Err(e),
            }
        };

        equity_curve.push(EquityPoint {
            timestamp: at,
            equity: strategy.equity(rate),
        });
        ticks.push(TickRecord {
            timestamp: at,
            rate,
            trend: tick.trend,
            degraded: signals.degraded,
            state: strategy.state(),
            action,
            rejections,
        });
        final_rate = Some(rate);
    }

    for (frequency, count) in &degraded_counts {
        tracing::warn!(%frequency, ticks = count, "frequency voted HOLD for lack of data");
    }

    strategy.ledger().verify()?;

    let summary = PnlSummary::compute(
        strategy.ledger(),
        final_rate.unwrap_or(0.0),
        strategy.config().capital,
        &equity_curve,
    );

    tracing::info!(
        ticks = ticks.len(),
        skipped = skipped_ticks,
        rejected,
        realized = summary.realized,
        unrealized = summary.unrealized,
        "backtest finished"
    );

    Ok(BacktestResult {
        ticks,
        skipped_ticks,
        rejected,
        final_rate,
        equity_curve,
        summary,
    })
}
