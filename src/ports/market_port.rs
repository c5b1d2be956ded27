//! Market access port trait.

use chrono::NaiveDateTime;

use crate::domain::error::InvestrError;
use crate::domain::order::{Order, OrderRequest};

/// Where orders are executed.
///
/// `submit` either fills the request and returns the resulting `Order`, or
/// refuses it with `InvestrError::MarketRejected`. Order ids handed out by a
/// market must be strictly increasing.
pub trait Market {
    fn submit(&mut self, request: &OrderRequest) -> Result<Order, InvestrError>;

    fn current_rate(&self, symbol: &str) -> Result<f64, InvestrError>;

    /// Clock hook called by replay drivers before each tick.
    fn observe(&mut self, _at: NaiveDateTime, _rate: f64) {}
}
