//! Read models derived by folding the published event stream.
//!
//! Projections consume [`DomainEvent`]s only — they never call into the
//! engine or book. They seed from the replayed event sequence at startup and
//! are thereafter fed by a timer-driven drain of the propagation channel, so
//! they may lag the engine arbitrarily: this is the eventual-consistency
//! boundary of the system.

use crate::{channel::EventChannel, events::{DomainEvent, Side}};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One executed trade, as remembered by the tape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TapeEntry {
    pub buy_id: String,
    pub sell_id: String,
    pub qty: u64,
    pub price: u64,
}

/// Ordered record of every trade seen on the stream.
#[derive(Default)]
pub struct TradeTape {
    trades: Vec<TapeEntry>,
}

impl TradeTape {
    fn apply(&mut self, event: &DomainEvent) {
        if let DomainEvent::Trade {
            buy_id,
            sell_id,
            qty,
            price,
        } = event
        {
            self.trades.push(TapeEntry {
                buy_id: buy_id.clone(),
                sell_id: sell_id.clone(),
                qty: *qty,
                price: *price,
            });
        }
    }

    /// The most recent `limit` trades, newest last.
    pub fn recent(&self, limit: usize) -> Vec<TapeEntry> {
        let skip = self.trades.len().saturating_sub(limit);
        self.trades[skip..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

/// Per-side price → total resting quantity, maintained purely from the event
/// stream. Mirrors the book's levels once the consumer catches up.
#[derive(Default)]
pub struct DepthSummary {
    bids: BTreeMap<u64, u64>,
    asks: BTreeMap<u64, u64>,
    // Remaining qty per live order id, needed to fold cancels and fills.
    open: HashMap<String, (Side, u64, u64)>,
}

impl DepthSummary {
    fn levels(&mut self, side: Side) -> &mut BTreeMap<u64, u64> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn reduce(&mut self, order_id: &str, by: u64) {
        let Some((side, price, qty)) = self.open.get_mut(order_id) else {
            return;
        };
        let (side, price) = (*side, *price);
        let fill = by.min(*qty);
        *qty -= fill;
        if *qty == 0 {
            self.open.remove(order_id);
        }
        let levels = self.levels(side);
        if let Some(total) = levels.get_mut(&price) {
            *total = total.saturating_sub(fill);
            if *total == 0 {
                levels.remove(&price);
            }
        }
    }

    fn apply(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::NewOrder { order } => {
                self.open
                    .insert(order.id.clone(), (order.side, order.price, order.qty));
                *self.levels(order.side).entry(order.price).or_insert(0) += order.qty;
            }
            DomainEvent::CancelOrder { order_id } => {
                let remaining = self.open.get(order_id).map(|(_, _, q)| *q).unwrap_or(0);
                self.reduce(order_id, remaining);
            }
            DomainEvent::Trade {
                buy_id,
                sell_id,
                qty,
                ..
            } => {
                self.reduce(buy_id, *qty);
                self.reduce(sell_id, *qty);
            }
        }
    }

    /// Bid levels, best (highest) first.
    pub fn bids(&self) -> Vec<(u64, u64)> {
        self.bids.iter().rev().map(|(p, q)| (*p, *q)).collect()
    }

    /// Ask levels, best (lowest) first.
    pub fn asks(&self) -> Vec<(u64, u64)> {
        self.asks.iter().map(|(p, q)| (*p, *q)).collect()
    }
}

/// The read-model set fed from one event stream.
#[derive(Default)]
pub struct Projections {
    pub tape: TradeTape,
    pub depth: DepthSummary,
}

impl Projections {
    pub fn apply(&mut self, event: &DomainEvent) {
        self.tape.apply(event);
        self.depth.apply(event);
    }

    /// Seed from the replayed event sequence (startup only).
    pub fn seed(&mut self, events: &[DomainEvent]) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Timer-driven consumer: every `interval`, drain up to `batch` events off the
/// channel and fold them into the projections. Runs until `cancel` fires.
pub async fn run_drainer(
    channel: Arc<EventChannel>,
    projections: Arc<Mutex<Projections>>,
    interval: Duration,
    batch: usize,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("drainer shutting down");
                break;
            }
            _ = ticker.tick() => {
                let events = channel.drain(batch);
                if events.is_empty() {
                    continue;
                }
                debug!(drained = events.len(), backlog = channel.len(), "folding events");
                let mut p = projections.lock().unwrap();
                for event in &events {
                    p.apply(event);
                }
            }
        }
    }
}
