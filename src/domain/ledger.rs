//! Order ledger and PnL accounting.
//!
//! Every filled order is appended to the ledger. A new order is matched
//! against the oldest unpaired order of the opposite side; if there is none it
//! waits in its own side's queue. Each order is therefore either paired with
//! exactly one other order or sitting in exactly one unpaired queue, which is
//! what makes realized + unrealized PnL equal to the cash result.

use chrono::NaiveDateTime;
use std::collections::{HashSet, VecDeque};

use crate::domain::decision::Side;
use crate::domain::error::InvestrError;
use crate::domain::order::Order;

/// A BUY/SELL pair closed by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizedTrade {
    pub buy_id: u64,
    pub sell_id: u64,
    /// SELL.cost - BUY.cost, whichever came first.
    pub profit: f64,
    pub closed_at: NaiveDateTime,
}

impl RealizedTrade {
    pub fn is_win(&self) -> bool {
        self.profit > 0.0
    }
}

/// Snapshot of both unpaired queues, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnpairedOrders {
    pub buys: Vec<Order>,
    pub sells: Vec<Order>,
}

impl UnpairedOrders {
    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.buys.iter().chain(self.sells.iter())
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderLedger {
    orders: Vec<Order>,
    unpaired_buys: VecDeque<u64>,
    unpaired_sells: VecDeque<u64>,
    realized: Vec<RealizedTrade>,
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filled order and pairs it FIFO against the opposite side.
    ///
    /// The order is validated first; a rejected order leaves the ledger
    /// exactly as it was. Returns the realized trade when the order closed one.
    pub fn record(&mut self, order: Order) -> Result<Option<RealizedTrade>, InvestrError> {
        self.validate(&order)?;

        let Some(counter_id) = self.queue(order.side.opposite()).front().copied() else {
            match order.side {
                Side::Buy => self.unpaired_buys.push_back(order.id),
                Side::Sell => self.unpaired_sells.push_back(order.id),
            }
            self.orders.push(order);
            return Ok(None);
        };

        let counter_idx = self.index_of(counter_id).ok_or_else(|| {
            InvestrError::invariant(format!("unpaired queue holds unknown order #{}", counter_id))
        })?;
        let counter = &mut self.orders[counter_idx];
        if counter.paired_with.is_some() {
            return Err(InvestrError::invariant(format!(
                "order #{} is queued but already paired with {:?}",
                counter.id, counter.paired_with
            )));
        }
        counter.paired_with = Some(order.id);
        let counter_cost = counter.cost;

        let (buy_id, sell_id, profit) = match order.side {
            Side::Sell => (counter_id, order.id, order.cost - counter_cost),
            Side::Buy => (order.id, counter_id, counter_cost - order.cost),
        };
        let trade = RealizedTrade {
            buy_id,
            sell_id,
            profit,
            closed_at: order.timestamp,
        };

        match order.side {
            Side::Buy => self.unpaired_sells.pop_front(),
            Side::Sell => self.unpaired_buys.pop_front(),
        };
        let mut order = order;
        order.paired_with = Some(counter_id);
        self.orders.push(order);
        self.realized.push(trade.clone());

        tracing::debug!(buy_id, sell_id, profit, "orders paired");
        Ok(Some(trade))
    }

    fn validate(&self, order: &Order) -> Result<(), InvestrError> {
        if !(order.amount > 0.0 && order.rate > 0.0 && order.cost > 0.0) {
            return Err(InvestrError::invariant(format!(
                "order #{} has non-positive amount, rate or cost",
                order.id
            )));
        }
        if order.paired_with.is_some() {
            return Err(InvestrError::invariant(format!(
                "order #{} arrived already paired",
                order.id
            )));
        }
        if let Some(last) = self.orders.last() {
            if order.id <= last.id {
                return Err(InvestrError::invariant(format!(
                    "order id #{} not greater than last recorded #{}",
                    order.id, last.id
                )));
            }
        }
        Ok(())
    }

    fn index_of(&self, id: u64) -> Option<usize> {
        self.orders.binary_search_by_key(&id, |o| o.id).ok()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn order(&self, id: u64) -> Option<&Order> {
        self.index_of(id).map(|idx| &self.orders[idx])
    }

    pub fn realized_trades(&self) -> &[RealizedTrade] {
        &self.realized
    }

    fn queue(&self, side: Side) -> &VecDeque<u64> {
        match side {
            Side::Buy => &self.unpaired_buys,
            Side::Sell => &self.unpaired_sells,
        }
    }

    pub fn unpaired_count(&self, side: Side) -> usize {
        self.queue(side).len()
    }

    /// Next order the opposite side would be matched against.
    pub fn oldest_unpaired(&self, side: Side) -> Option<&Order> {
        self.queue(side).front().and_then(|&id| self.order(id))
    }

    pub fn unpaired_orders(&self) -> UnpairedOrders {
        let collect = |queue: &VecDeque<u64>| -> Vec<Order> {
            queue
                .iter()
                .filter_map(|&id| self.order(id).cloned())
                .collect()
        };
        UnpairedOrders {
            buys: collect(&self.unpaired_buys),
            sells: collect(&self.unpaired_sells),
        }
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized.iter().map(|t| t.profit).sum()
    }

    pub fn unrealized_pnl(&self, rate: f64) -> f64 {
        self.unpaired_buys
            .iter()
            .chain(self.unpaired_sells.iter())
            .filter_map(|&id| self.order(id))
            .map(|o| o.unrealized_pnl(rate))
            .sum()
    }

    pub fn pnl(&self, rate: f64) -> f64 {
        self.realized_pnl() + self.unrealized_pnl(rate)
    }

    /// Quote received from SELLs minus quote spent on BUYs.
    pub fn net_cash_flow(&self) -> f64 {
        self.orders
            .iter()
            .map(|o| match o.side {
                Side::Buy => -o.cost,
                Side::Sell => o.cost,
            })
            .sum()
    }

    /// Base asset bought minus base asset sold.
    pub fn net_position(&self) -> f64 {
        self.orders
            .iter()
            .map(|o| match o.side {
                Side::Buy => o.amount,
                Side::Sell => -o.amount,
            })
            .sum()
    }

    /// Re-checks the pairing invariant over the whole ledger.
    pub fn verify(&self) -> Result<(), InvestrError> {
        let mut queued = HashSet::new();
        for (side, queue) in [
            (Side::Buy, &self.unpaired_buys),
            (Side::Sell, &self.unpaired_sells),
        ] {
            for &id in queue {
                if !queued.insert(id) {
                    return Err(InvestrError::invariant(format!(
                        "order #{} appears in more than one unpaired slot",
                        id
                    )));
                }
                let order = self.order(id).ok_or_else(|| {
                    InvestrError::invariant(format!("unpaired queue holds unknown order #{}", id))
                })?;
                if order.side != side || order.is_paired() {
                    return Err(InvestrError::invariant(format!(
                        "order #{} is in the {} queue but is a paired or {} order",
                        id, side, order.side
                    )));
                }
            }
        }

        let mut paired = 0usize;
        for order in &self.orders {
            match order.paired_with {
                None if !queued.contains(&order.id) => {
                    return Err(InvestrError::invariant(format!(
                        "order #{} is neither paired nor queued",
                        order.id
                    )));
                }
                None => {}
                Some(other_id) => {
                    let other = self.order(other_id).ok_or_else(|| {
                        InvestrError::invariant(format!(
                            "order #{} paired with unknown #{}",
                            order.id, other_id
                        ))
                    })?;
                    if other.paired_with != Some(order.id) || other.side == order.side {
                        return Err(InvestrError::invariant(format!(
                            "orders #{} and #{} are not mutually paired",
                            order.id, other_id
                        )));
                    }
                    paired += 1;
                }
            }
        }

        if paired != 2 * self.realized.len() {
            return Err(InvestrError::invariant(format!(
                "{} paired orders but {} realized trades",
                paired,
                self.realized.len()
            )));
        }
        Ok(())
    }
}
