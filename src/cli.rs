//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::adapters::csv_adapter::CsvCandleLoader;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::simulated_market::SimulatedMarket;
use crate::domain::backtest::{run_backtest, BacktestConfig, BacktestResult, SignalPipeline};
use crate::domain::config_validation::{
    duration_value, frequencies, indicators_for, parse_value, require_value, timestamp_value,
    trend_algorithm, validate_config,
};
use crate::domain::error::InvestrError;
use crate::domain::frequency::Frequency;
use crate::domain::indicator_group::{IndicatorGroup, PolicyKind};
use crate::domain::strategy::{Strategy, StrategyConfig};
use crate::domain::trend::TrendDetector;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "investr", about = "Multi-frequency signal backtester")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over CSV candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [backtest] data_dir
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// A finished backtest and the strategy that ran it.
pub struct BacktestRun {
    pub result: BacktestResult,
    pub strategy: Strategy,
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);
    match cli.command {
        Command::Backtest { config, data_dir } => run_backtest_command(&config, data_dir.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, InvestrError> {
    FileConfigAdapter::from_file(path).map_err(|e| InvestrError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn run_backtest_command(config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    match backtest_from_config(config_path, data_dir) {
        Ok(run) => {
            print_summary(&run);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Loads and validates the config, reads the CSV candles and runs the
/// backtest against a simulated market.
pub fn backtest_from_config(
    config_path: &Path,
    data_dir: Option<&Path>,
) -> Result<BacktestRun, InvestrError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;

    let bt_config = build_backtest_config(&adapter)?;
    let strategy_config = build_strategy_config(&adapter)?;
    let pipeline = build_pipeline(&adapter)?;

    let data_dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => resolve_data_dir(&adapter, config_path),
    };
    let mut needed = pipeline.frequencies();
    if !needed.contains(&bt_config.step) {
        needed.push(bt_config.step);
    }
    eprintln!(
        "Loading {} candles for {} from {}",
        needed
            .iter()
            .map(Frequency::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        bt_config.symbol,
        data_dir.display()
    );
    let source = CsvCandleLoader::new(data_dir).load_source(&bt_config.symbol, &needed)?;

    eprintln!(
        "Running backtest: {} to {} every {}",
        bt_config.start, bt_config.end, bt_config.step
    );
    eprintln!("  Processing: {} ticks", bt_config.tick_count());

    let mut strategy = Strategy::new(strategy_config);
    let mut market = SimulatedMarket::new();
    let result = run_backtest(&bt_config, &pipeline, &mut strategy, &source, &mut market)?;
    Ok(BacktestRun { result, strategy })
}

/// `[backtest] data_dir`, relative to the config file's directory.
fn resolve_data_dir(adapter: &dyn ConfigPort, config_path: &Path) -> PathBuf {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    match adapter.get_value("backtest", "data_dir") {
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, InvestrError> {
    let step = match parse_value::<Frequency>(adapter, "backtest", "step")? {
        Some(step) => step,
        // finest signal frequency
        None => frequencies(adapter)?
            .into_iter()
            .min()
            .unwrap_or(Frequency::ONE_HOUR),
    };

    Ok(BacktestConfig {
        symbol: require_value(adapter, "backtest", "symbol")?,
        start: timestamp_value(adapter, "backtest", "start")?,
        end: timestamp_value(adapter, "backtest", "end")?,
        step,
        retry_rejected: parse_value(adapter, "backtest", "retry_rejected")?.unwrap_or(0),
    })
}

pub fn build_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, InvestrError> {
    let defaults = StrategyConfig::default();
    Ok(StrategyConfig {
        symbol: require_value(adapter, "backtest", "symbol")?,
        capital: parse_value(adapter, "strategy", "capital")?.unwrap_or(defaults.capital),
        position_size: parse_value(adapter, "strategy", "position_size")?
            .unwrap_or(defaults.position_size),
        order_limit: parse_value(adapter, "strategy", "order_limit")?
            .unwrap_or(defaults.order_limit),
        timeout: duration_value(adapter, "strategy", "timeout", defaults.timeout)?,
        cooldown: duration_value(adapter, "strategy", "cooldown", defaults.cooldown)?,
        min_profit: parse_value(adapter, "strategy", "min_profit")?,
        liquidate_stale: adapter.get_bool("strategy", "liquidate_stale", defaults.liquidate_stale),
    })
}

/// One indicator group per configured frequency, plus the trend detector.
pub fn build_pipeline(adapter: &dyn ConfigPort) -> Result<SignalPipeline, InvestrError> {
    let policy = parse_value::<PolicyKind>(adapter, "signals", "policy")?.unwrap_or_default();

    let groups = frequencies(adapter)?
        .into_iter()
        .map(|frequency| {
            let indicators = indicators_for(adapter, frequency)?
                .iter()
                .map(|kind| kind.build())
                .collect();
            Ok(IndicatorGroup::with_policy(
                frequency,
                indicators,
                policy.policy(),
            ))
        })
        .collect::<Result<Vec<_>, InvestrError>>()?;

    SignalPipeline::new(groups, TrendDetector::new(trend_algorithm(adapter)?))
}

fn print_summary(run: &BacktestRun) {
    let summary = &run.result.summary;
    let config = run.strategy.config();

    eprintln!("\n=== PnL Summary ({}) ===", config.symbol);
    eprintln!("Reference Rate:   {:.4}", summary.rate);
    eprintln!("Realized:         {:+.2}", summary.realized);
    eprintln!("Unrealized:       {:+.2}", summary.unrealized);
    eprintln!("Total:            {:+.2}", summary.total);
    eprintln!("Growth:           {:+.2}%", summary.growth_pct);
    eprintln!("Max Drawdown:     -{:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Closed Trades:    {}", summary.trades);
    eprintln!("Win Rate:         {:.1}%", summary.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", summary.profit_factor);
    eprintln!(
        "Ticks:            {} run, {} skipped",
        run.result.ticks.len(),
        run.result.skipped_ticks
    );
    eprintln!("Rejected Orders:  {}", run.result.rejected);
    eprintln!("Skipped Signals:  {}", run.strategy.skipped().len());
    eprintln!("Final State:      {}", run.strategy.state());

    let unpaired = run.strategy.unpaired_orders();
    if !unpaired.is_empty() {
        eprintln!(
            "\n=== Unpaired Orders ({} buys, {} sells) ===",
            summary.unpaired_buys, summary.unpaired_sells
        );
        for order in unpaired.iter() {
            eprintln!(
                "  {}  unrealized {:+.2}",
                order,
                order.unrealized_pnl(summary.rate)
            );
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let pipeline = match validate_config(&adapter).and_then(|()| build_pipeline(&adapter)) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nSignal Groups:");
    for group in pipeline.groups() {
        let names: Vec<String> = group.indicators().iter().map(|i| i.name()).collect();
        eprintln!("  {:>4}: {}", group.frequency().to_string(), names.join(", "));
    }
    if let Ok(algorithm) = trend_algorithm(&adapter) {
        eprintln!("Trend: {}", algorithm);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trend::TrendAlgorithm;
    use chrono::Duration;

    const CONFIG: &str = r#"
[backtest]
symbol = BTCUSD
start = 2024-01-01 00:00:00
end = 2024-01-02 00:00:00

[strategy]
capital = 500
timeout = 3h
min_profit = 1.5

[signals]
frequencies = 6h, 1h
indicators = macd(6,26,9), bollinger
indicators.6h = ma(10)
policy = consensus

[trend]
algorithm = rank_weighted
band = 0.25
"#;

    fn adapter() -> FileConfigAdapter {
        FileConfigAdapter::from_string(CONFIG).unwrap()
    }

    #[test]
    fn step_defaults_to_finest_frequency() {
        let config = build_backtest_config(&adapter()).unwrap();
        assert_eq!(config.step, Frequency::ONE_HOUR);
        assert_eq!(config.retry_rejected, 0);
        assert_eq!(config.tick_count(), 25);
    }

    #[test]
    fn strategy_config_fills_defaults() {
        let config = build_strategy_config(&adapter()).unwrap();
        assert_eq!(config.symbol, "BTCUSD");
        assert_eq!(config.capital, 500.0);
        assert_eq!(config.position_size, 0.25);
        assert_eq!(config.order_limit, 4);
        assert_eq!(config.timeout, Duration::hours(3));
        assert_eq!(config.cooldown, Duration::hours(12));
        assert_eq!(config.min_profit, Some(1.5));
        assert!(!config.liquidate_stale);
    }

    #[test]
    fn pipeline_keeps_file_order_and_overrides() {
        let pipeline = build_pipeline(&adapter()).unwrap();
        assert_eq!(
            pipeline.frequencies(),
            vec![Frequency::SIX_HOURS, Frequency::ONE_HOUR]
        );
        let six_hour: Vec<String> = pipeline.groups()[0]
            .indicators()
            .iter()
            .map(|i| i.name())
            .collect();
        assert_eq!(six_hour, vec!["MA(10)".to_string()]);
        assert_eq!(pipeline.groups()[1].indicators().len(), 2);
    }

    #[test]
    fn trend_algorithm_from_config() {
        assert_eq!(
            trend_algorithm(&adapter()).unwrap(),
            TrendAlgorithm::RankWeighted { band: 0.25 }
        );
    }

    #[test]
    fn data_dir_relative_to_config() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ndata_dir = candles\n").unwrap();
        assert_eq!(
            resolve_data_dir(&adapter, Path::new("/etc/investr/run.ini")),
            PathBuf::from("/etc/investr/candles")
        );
        let empty = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        assert_eq!(
            resolve_data_dir(&empty, Path::new("/etc/investr/run.ini")),
            PathBuf::from("/etc/investr")
        );
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let err = load_config(Path::new("/nonexistent/investr.ini")).unwrap_err();
        assert!(matches!(err, InvestrError::ConfigParse { .. }));
    }
}
