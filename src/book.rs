use crate::{
    events::{Order, Side},
    fifo::{FifoQueue, Handle},
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Where a resting order lives: which side, which price level, and its queue
/// handle within that level.
#[derive(Debug, Clone, Copy)]
struct OrderRef {
    side: Side,
    price: u64,
    handle: Handle,
}

/// An [`OrderBook`] stores **active** buy and sell orders in two separate
/// [`BTreeMap`]s keyed by price:
/// - `bids` (buy orders) — best price is the *highest* key,
/// - `asks` (sell orders) — best price is the *lowest* key.
///
/// Each price level is a [`FifoQueue`] so price-time priority within a level
/// is simply queue order, and the `index` maps order id → queue handle so
/// cancellation is O(1) once the level is located.
///
/// Invariants, maintained by every mutation:
/// - a resting order appears in exactly one level (matching its side+price)
///   and exactly once in `index`;
/// - a level with zero orders is deleted immediately (no empty levels);
/// - `index` and the level queues never disagree (no dangling handles).
pub struct OrderBook {
    bids: BTreeMap<u64, FifoQueue<Order>>,
    asks: BTreeMap<u64, FifoQueue<Order>>,
    index: HashMap<String, OrderRef>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Number of resting orders.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn side_levels(&mut self, side: Side) -> &mut BTreeMap<u64, FifoQueue<Order>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Insert a resting order into its side's price level, creating the level
    /// if absent.
    ///
    /// Precondition: `order.id` is not already resting — the engine only
    /// accepts unique ids, so a duplicate here is a bug upstream.
    pub fn insert(&mut self, order: Order) {
        debug_assert!(
            !self.index.contains_key(&order.id),
            "duplicate order id {}",
            order.id
        );
        let (id, side, price) = (order.id.clone(), order.side, order.price);
        let level = self.side_levels(side).entry(price).or_default();
        let handle = level.push_back(order);
        self.index.insert(id, OrderRef { side, price, handle });
    }

    /// Cancel by id. Unknown ids are a defined no-op (`false`), not an error:
    /// cancel racing a fill is normal traffic in a matching system.
    pub fn cancel(&mut self, order_id: &str) -> bool {
        let Some(OrderRef { side, price, handle }) = self.index.remove(order_id) else {
            debug!(order_id, "cancel for unknown id ignored");
            return false;
        };
        let levels = self.side_levels(side);
        let level = levels
            .get_mut(&price)
            .expect("indexed order has no price level");
        level.remove(handle);
        if level.is_empty() {
            levels.remove(&price);
        }
        true
    }

    /// The order at the front of the highest-priced bid level.
    pub fn best_buy(&self) -> Option<&Order> {
        self.bids.last_key_value().and_then(|(_, q)| q.front())
    }

    /// The order at the front of the lowest-priced ask level.
    pub fn best_sell(&self) -> Option<&Order> {
        self.asks.first_key_value().and_then(|(_, q)| q.front())
    }

    /// Decrement a resting order's remaining quantity by a fill. When the
    /// remainder hits exactly zero the order is removed, along with its level
    /// if that was the last order there.
    ///
    /// Engine-internal: `order_id` is always one of the two orders the
    /// matching loop just paired, so it must be resting.
    pub(crate) fn reduce(&mut self, order_id: &str, qty: u64) {
        let OrderRef { side, price, handle } = *self
            .index
            .get(order_id)
            .expect("reduce target is not resting");
        let order = self
            .side_levels(side)
            .get_mut(&price)
            .and_then(|level| level.get_mut(handle))
            .expect("indexed order has no queue node");
        debug_assert!(qty <= order.qty, "fill exceeds remaining quantity");
        order.qty -= qty;
        if order.qty == 0 {
            self.cancel(order_id);
        }
    }

    /// Aggregated (price, total quantity) bid levels, best (highest) first.
    pub fn bid_levels(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.bids
            .iter()
            .rev()
            .map(|(price, q)| (*price, q.iter().map(|o| o.qty).sum()))
    }

    /// Aggregated (price, total quantity) ask levels, best (lowest) first.
    pub fn ask_levels(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.asks
            .iter()
            .map(|(price, q)| (*price, q.iter().map(|o| o.qty).sum()))
    }

    /// Every resting order in a deterministic order (asks low→high then bids
    /// low→high, queue order within a level). Two books with equal snapshots
    /// hold identical resting state.
    pub fn snapshot(&self) -> Vec<Order> {
        let mut out = Vec::with_capacity(self.index.len());
        for q in self.asks.values() {
            out.extend(q.iter().cloned());
        }
        for q in self.bids.values() {
            out.extend(q.iter().cloned());
        }
        out
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
