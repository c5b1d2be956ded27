//! Core domain types and logic.

pub mod ohlcv;
pub mod frequency;
pub mod decision;
pub mod indicator;
pub mod indicator_group;
pub mod trend;
pub mod order;
pub mod ledger;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
pub mod error;
