//! Port traits the domain talks through.

pub mod candle_port;
pub mod config_port;
pub mod market_port;
