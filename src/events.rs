use serde::{Deserialize, Serialize};

/// Which side of the market an order is on.
///
/// # Intuition
/// - `Buy` (Bid): buy orders compete from **highest to lowest price** —
///   a higher bid is more aggressive.
/// - `Sell` (Ask): sell orders compete from **lowest to highest price** —
///   a lower ask is more aggressive.
///
/// The matching loop therefore always pairs the **highest bid** with the
/// **lowest ask**.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,  // Bid
    Sell, // Ask
}

/// A limit order as accepted by the venue.
///
/// - `id` is caller-assigned (the HTTP layer mints a UUID) and must be unique
///   for the lifetime of the book.
/// - `ts` is the arrival sequence: a monotonic logical timestamp assigned when
///   the order is accepted. It drives time priority within a price level and
///   identifies the resting (earlier) side of a match; it never overrides a
///   price comparison.
/// - `qty` is the remaining quantity; the only field that mutates while the
///   order rests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub side: Side,
    pub price: u64,
    pub qty: u64,
    pub ts: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

/// Inbound instructions the engine consumes.
///
/// This set is deliberately separate from [`DomainEvent`]: trades are an
/// *output* of matching and simply have no inbound representation, so the
/// engine never needs a runtime "reject trade as input" branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewOrder(Order),
    CancelOrder { order_id: String },
}

/// The canonical event contract: the unit appended to the durability log and
/// carried on the propagation channel. Immutable once produced.
///
/// Wire format is one JSON record per line, tagged by `type`:
///
/// ```json
/// {"type":"NEW_ORDER","order":{"id":"…","side":"BUY","price":100,"qty":10,"ts":1}}
/// {"type":"CANCEL_ORDER","orderId":"…"}
/// {"type":"TRADE","buyId":"…","sellId":"…","qty":4,"price":100}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    #[serde(rename = "NEW_ORDER")]
    NewOrder { order: Order },

    #[serde(rename = "CANCEL_ORDER")]
    CancelOrder {
        #[serde(rename = "orderId")]
        order_id: String,
    },

    #[serde(rename = "TRADE")]
    Trade {
        #[serde(rename = "buyId")]
        buy_id: String,
        #[serde(rename = "sellId")]
        sell_id: String,
        qty: u64,
        price: u64,
    },
}

impl DomainEvent {
    /// Map a logged event back to the command that produced it.
    ///
    /// `Trade` records map to `None`: replay re-derives every trade
    /// deterministically by re-running the matching loop, so the logged copies
    /// exist for projections and audit, not for the engine.
    pub fn as_command(&self) -> Option<Command> {
        match self {
            DomainEvent::NewOrder { order } => Some(Command::NewOrder(order.clone())),
            DomainEvent::CancelOrder { order_id } => Some(Command::CancelOrder {
                order_id: order_id.clone(),
            }),
            DomainEvent::Trade { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: "ord-1".into(),
            side: Side::Buy,
            price: 100,
            qty: 10,
            ts: 1,
            symbol: Some("BTC-USD".into()),
        }
    }

    #[test]
    fn new_order_wire_format() {
        let ev = DomainEvent::NewOrder {
            order: sample_order(),
        };
        let json: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "NEW_ORDER");
        assert_eq!(json["order"]["side"], "BUY");
        assert_eq!(json["order"]["price"], 100);
        assert_eq!(json["order"]["symbol"], "BTC-USD");
    }

    #[test]
    fn cancel_and_trade_wire_format() {
        let cancel = DomainEvent::CancelOrder {
            order_id: "ord-1".into(),
        };
        let json = serde_json::to_value(&cancel).unwrap();
        assert_eq!(json["type"], "CANCEL_ORDER");
        assert_eq!(json["orderId"], "ord-1");

        let trade = DomainEvent::Trade {
            buy_id: "b".into(),
            sell_id: "s".into(),
            qty: 4,
            price: 100,
        };
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["type"], "TRADE");
        assert_eq!(json["buyId"], "b");
        assert_eq!(json["sellId"], "s");
    }

    #[test]
    fn symbol_is_optional_on_the_wire() {
        let mut order = sample_order();
        order.symbol = None;
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("symbol").is_none());

        let parsed: Order =
            serde_json::from_str(r#"{"id":"x","side":"SELL","price":9,"qty":1,"ts":0}"#).unwrap();
        assert_eq!(parsed.side, Side::Sell);
        assert_eq!(parsed.symbol, None);
    }

    #[test]
    fn trades_never_map_back_to_a_command() {
        let trade = DomainEvent::Trade {
            buy_id: "b".into(),
            sell_id: "s".into(),
            qty: 1,
            price: 1,
        };
        assert!(trade.as_command().is_none());

        let ev = DomainEvent::NewOrder {
            order: sample_order(),
        };
        assert!(matches!(ev.as_command(), Some(Command::NewOrder(_))));
    }
}
