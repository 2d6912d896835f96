use crate::{
    book::OrderBook,
    channel::EventChannel,
    errors::EngineError,
    events::{Command, DomainEvent, Order},
    wal::EventLog,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Processing mode, supplied per invocation so one engine instance can
/// bootstrap via replay and then serve live traffic without reconstruction.
///
/// - `Live`: every accepted command and every synthesized trade is appended to
///   the durability log and published on the channel.
/// - `Replay`: pure state reconstruction — zero log appends, zero publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Replay,
}

/// Deterministic price-time matching engine. Owns the [`OrderBook`]; the book
/// is never mutated from anywhere else.
///
/// Single-threaded by design: `process` runs to completion with no suspension
/// points, so total input ordering — which price-time correctness depends on —
/// comes for free. Callers that share an engine wrap it in a mutex
/// (see `AppState`); that lock is the serialization boundary.
pub struct MatchingEngine {
    book: OrderBook,
    wal: EventLog,
    channel: Arc<EventChannel>,
    next_ts: u64,
}

impl MatchingEngine {
    pub fn new(wal: EventLog, channel: Arc<EventChannel>) -> Self {
        Self {
            book: OrderBook::new(),
            wal,
            channel,
            next_ts: 1,
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn wal(&self) -> &EventLog {
        &self.wal
    }

    /// Rebuild book state from the durability log. Must run before any live
    /// traffic. Returns the replayed event sequence so callers can seed
    /// projections from it.
    pub fn bootstrap(&mut self) -> Result<Vec<DomainEvent>, EngineError> {
        let events = self.wal.replay()?;
        for event in &events {
            // Trades map to no command: the matching loop re-derives them.
            if let Some(cmd) = event.as_command() {
                self.process(cmd, Mode::Replay)?;
            }
        }
        info!(
            replayed = events.len(),
            resting = self.book.len(),
            "book reconstructed from log"
        );
        Ok(events)
    }

    /// Sole mutation entry point. Returns the trades synthesized while
    /// handling this command (empty for cancels and non-crossing orders).
    ///
    /// In live mode the inbound event is logged and published **before** the
    /// book is touched: once the append succeeds the command is durable, and
    /// a crash before matching completes just means replay re-derives the
    /// same trades. A failed append is fatal to the command — nothing is
    /// published and the book is left unmutated.
    pub fn process(
        &mut self,
        cmd: Command,
        mode: Mode,
    ) -> Result<Vec<DomainEvent>, EngineError> {
        match cmd {
            Command::NewOrder(mut order) => {
                match mode {
                    Mode::Live => {
                        order.ts = self.next_ts;
                        self.next_ts += 1;
                    }
                    // Replayed orders keep their original arrival sequence.
                    Mode::Replay => self.next_ts = self.next_ts.max(order.ts + 1),
                }
                let event = DomainEvent::NewOrder {
                    order: order.clone(),
                };
                if mode == Mode::Live {
                    self.wal.append(&event)?;
                    self.channel.publish(event);
                }
                debug!(id = %order.id, side = ?order.side, price = order.price, qty = order.qty, "order accepted");
                self.book.insert(order);
                self.match_crossing(mode)
            }
            Command::CancelOrder { order_id } => {
                let event = DomainEvent::CancelOrder {
                    order_id: order_id.clone(),
                };
                if mode == Mode::Live {
                    self.wal.append(&event)?;
                    self.channel.publish(event);
                }
                // Unknown ids are a defined no-op in any mode.
                self.book.cancel(&order_id);
                Ok(Vec::new())
            }
        }
    }

    /// The matching loop: runs after every accepted order, while the book is
    /// crossed (best bid ≥ best ask, both sides non-empty).
    ///
    /// Execution price is the resting order's price — the earlier arrival of
    /// the crossed pair — so the incoming aggressive order receives the
    /// passive side's price. Execution quantity is the smaller remainder.
    /// Each iteration strictly reduces total resting quantity, so the loop
    /// needs no iteration guard to terminate.
    fn match_crossing(&mut self, mode: Mode) -> Result<Vec<DomainEvent>, EngineError> {
        let mut trades = Vec::new();
        loop {
            let (Some(buy), Some(sell)) = (self.book.best_buy(), self.book.best_sell()) else {
                break;
            };
            if buy.price < sell.price {
                break;
            }
            let qty = buy.qty.min(sell.qty);
            let price = if buy.ts <= sell.ts { buy.price } else { sell.price };
            let (buy_id, sell_id) = (buy.id.clone(), sell.id.clone());

            let trade = DomainEvent::Trade {
                buy_id: buy_id.clone(),
                sell_id: sell_id.clone(),
                qty,
                price,
            };
            if mode == Mode::Live {
                self.wal.append(&trade)?;
                self.channel.publish(trade.clone());
            }
            debug!(%buy_id, %sell_id, qty, price, "trade");

            // Fully filled orders leave the book the moment they hit zero.
            self.book.reduce(&buy_id, qty);
            self.book.reduce(&sell_id, qty);
            trades.push(trade);
        }
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Side;
    use tempfile::{TempDir, tempdir};

    fn engine() -> (MatchingEngine, Arc<EventChannel>, TempDir) {
        let dir = tempdir().unwrap();
        let channel = Arc::new(EventChannel::new());
        let wal = EventLog::open(dir.path().join("events.log")).unwrap();
        (MatchingEngine::new(wal, channel.clone()), channel, dir)
    }

    fn new_order(id: &str, side: Side, price: u64, qty: u64) -> Command {
        Command::NewOrder(Order {
            id: id.into(),
            side,
            price,
            qty,
            ts: 0,
            symbol: None,
        })
    }

    fn trade_of(ev: &DomainEvent) -> (&str, &str, u64, u64) {
        match ev {
            DomainEvent::Trade {
                buy_id,
                sell_id,
                qty,
                price,
            } => (buy_id, sell_id, *qty, *price),
            other => panic!("expected trade, got {other:?}"),
        }
    }

    #[test]
    fn resting_bid_then_partial_then_sweep() {
        let (mut eng, _ch, _dir) = engine();

        // Empty book: BUY 10@100 rests, no trade.
        let trades = eng.process(new_order("b1", Side::Buy, 100, 10), Mode::Live).unwrap();
        assert!(trades.is_empty());
        assert_eq!(eng.book().len(), 1);

        // SELL 4@100 crosses: one trade of 4 at 100, bid keeps 6.
        let trades = eng.process(new_order("s1", Side::Sell, 100, 4), Mode::Live).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trade_of(&trades[0]), ("b1", "s1", 4, 100));
        assert_eq!(eng.book().best_buy().unwrap().qty, 6);
        assert!(eng.book().best_sell().is_none());

        // SELL 10@99: fills the remaining bid at the *resting* price 100,
        // then the leftover 4@99 rests on the ask side.
        let trades = eng.process(new_order("s2", Side::Sell, 99, 10), Mode::Live).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trade_of(&trades[0]), ("b1", "s2", 6, 100));
        assert!(eng.book().best_buy().is_none());
        let ask = eng.book().best_sell().unwrap();
        assert_eq!((ask.id.as_str(), ask.price, ask.qty), ("s2", 99, 4));
    }

    #[test]
    fn same_price_orders_match_in_arrival_order() {
        let (mut eng, _ch, _dir) = engine();
        eng.process(new_order("b1", Side::Buy, 100, 5), Mode::Live).unwrap();
        eng.process(new_order("b2", Side::Buy, 100, 5), Mode::Live).unwrap();

        let trades = eng.process(new_order("s1", Side::Sell, 100, 5), Mode::Live).unwrap();
        assert_eq!(trades.len(), 1);
        // The first-arrived bid must fill first.
        assert_eq!(trade_of(&trades[0]).0, "b1");
        assert_eq!(eng.book().best_buy().unwrap().id, "b2");
    }

    #[test]
    fn aggressive_buy_receives_the_resting_ask_price() {
        let (mut eng, _ch, _dir) = engine();
        eng.process(new_order("s1", Side::Sell, 100, 5), Mode::Live).unwrap();

        let trades = eng.process(new_order("b1", Side::Buy, 105, 5), Mode::Live).unwrap();
        assert_eq!(trade_of(&trades[0]), ("b1", "s1", 5, 100));
        assert!(eng.book().is_empty());
    }

    #[test]
    fn incoming_order_sweeps_multiple_levels() {
        let (mut eng, _ch, _dir) = engine();
        eng.process(new_order("s1", Side::Sell, 100, 3), Mode::Live).unwrap();
        eng.process(new_order("s2", Side::Sell, 101, 3), Mode::Live).unwrap();

        let trades = eng.process(new_order("b1", Side::Buy, 101, 8), Mode::Live).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trade_of(&trades[0]), ("b1", "s1", 3, 100));
        assert_eq!(trade_of(&trades[1]), ("b1", "s2", 3, 101));
        // Unfilled remainder rests as the new best bid.
        let bid = eng.book().best_buy().unwrap();
        assert_eq!((bid.price, bid.qty), (101, 2));
    }

    #[test]
    fn double_cancel_matches_single_cancel_state() {
        let (mut eng, _ch, _dir) = engine();
        eng.process(new_order("b1", Side::Buy, 100, 5), Mode::Live).unwrap();

        eng.process(
            Command::CancelOrder { order_id: "b1".into() },
            Mode::Live,
        )
        .unwrap();
        let after_one = eng.book().snapshot();

        eng.process(
            Command::CancelOrder { order_id: "b1".into() },
            Mode::Live,
        )
        .unwrap();
        assert_eq!(eng.book().snapshot(), after_one);
        assert!(eng.book().is_empty());
    }

    #[test]
    fn cancel_of_unknown_id_is_accepted_and_logged() {
        let (mut eng, ch, _dir) = engine();
        eng.process(
            Command::CancelOrder { order_id: "ghost".into() },
            Mode::Live,
        )
        .unwrap();
        assert_eq!(eng.wal().len(), 1);
        assert_eq!(ch.len(), 1);
    }

    #[test]
    fn replay_rebuilds_identical_state_with_no_side_effects() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");

        let live_snapshot = {
            let channel = Arc::new(EventChannel::new());
            let wal = EventLog::open(&path).unwrap();
            let mut eng = MatchingEngine::new(wal, channel);
            eng.process(new_order("b1", Side::Buy, 100, 10), Mode::Live).unwrap();
            eng.process(new_order("b2", Side::Buy, 101, 3), Mode::Live).unwrap();
            eng.process(new_order("s1", Side::Sell, 100, 7), Mode::Live).unwrap();
            eng.process(
                Command::CancelOrder { order_id: "b1".into() },
                Mode::Live,
            )
            .unwrap();
            eng.process(new_order("s2", Side::Sell, 99, 2), Mode::Live).unwrap();
            eng.book().snapshot()
        };

        let channel = Arc::new(EventChannel::new());
        let wal = EventLog::open(&path).unwrap();
        let before = wal.len();
        let mut fresh = MatchingEngine::new(wal, channel.clone());
        fresh.bootstrap().unwrap();

        assert_eq!(fresh.book().snapshot(), live_snapshot);
        // Replay is pure reconstruction: nothing appended, nothing published.
        assert_eq!(fresh.wal().len(), before);
        assert!(channel.is_empty());
    }

    #[test]
    fn fill_decrements_each_side_by_exactly_the_traded_qty() {
        let (mut eng, _ch, _dir) = engine();
        eng.process(new_order("b1", Side::Buy, 100, 10), Mode::Live).unwrap();
        let trades = eng.process(new_order("s1", Side::Sell, 100, 4), Mode::Live).unwrap();

        let (_, _, qty, _) = trade_of(&trades[0]);
        assert_eq!(qty, 4);
        // Seller fully filled and gone; buyer reduced by exactly 4.
        assert_eq!(eng.book().best_buy().unwrap().qty, 10 - qty);
        assert_eq!(eng.book().len(), 1);
    }

    #[test]
    fn live_mode_logs_and_publishes_inputs_before_trades() {
        let (mut eng, ch, _dir) = engine();
        eng.process(new_order("s1", Side::Sell, 100, 5), Mode::Live).unwrap();
        eng.process(new_order("b1", Side::Buy, 100, 5), Mode::Live).unwrap();

        let published = ch.drain(16);
        assert_eq!(published.len(), 3);
        assert!(matches!(published[0], DomainEvent::NewOrder { .. }));
        assert!(matches!(published[1], DomainEvent::NewOrder { .. }));
        assert!(matches!(published[2], DomainEvent::Trade { .. }));
        assert_eq!(eng.wal().len(), 3);
    }
}
