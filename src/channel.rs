use crate::events::DomainEvent;
use std::collections::VecDeque;
use std::sync::Mutex;

/// In-memory, order-preserving queue decoupling the engine (producer) from
/// projection consumers that drain at their own pace.
///
/// `publish` never blocks the hot path beyond an uncontended lock and never
/// drops an accepted event; the backlog is deliberately unbounded — `len` is
/// for observability, not flow control. This is **not** a durability boundary:
/// an event lost here after its WAL append is recovered by replay, never by
/// the channel.
pub struct EventChannel {
    inner: Mutex<VecDeque<DomainEvent>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn publish(&self, event: DomainEvent) {
        self.inner.lock().unwrap().push_back(event);
    }

    /// Remove and return up to `max` events, in publish order.
    pub fn drain(&self, max: usize) -> Vec<DomainEvent> {
        let mut queue = self.inner.lock().unwrap();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    /// Current backlog.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancel(id: &str) -> DomainEvent {
        DomainEvent::CancelOrder {
            order_id: id.into(),
        }
    }

    #[test]
    fn drain_returns_events_in_publish_order() {
        let ch = EventChannel::new();
        ch.publish(cancel("1"));
        ch.publish(cancel("2"));
        ch.publish(cancel("3"));

        assert_eq!(ch.len(), 3);
        assert_eq!(ch.drain(10), vec![cancel("1"), cancel("2"), cancel("3")]);
        assert!(ch.is_empty());
    }

    #[test]
    fn drain_respects_the_batch_bound() {
        let ch = EventChannel::new();
        for i in 0..5 {
            ch.publish(cancel(&i.to_string()));
        }

        let first = ch.drain(2);
        assert_eq!(first, vec![cancel("0"), cancel("1")]);
        assert_eq!(ch.len(), 3);

        // Remaining events keep their order across drains.
        assert_eq!(ch.drain(100), vec![cancel("2"), cancel("3"), cancel("4")]);
    }

    #[test]
    fn drain_on_empty_channel_is_empty() {
        let ch = EventChannel::new();
        assert!(ch.drain(8).is_empty());
    }
}
