// ── In-process event bus ──
//
// Topic-keyed publish/subscribe joining the correlator and the point
// façades. Delivery is synchronous: `publish` returns after every
// handler for the topic has run.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use creskit_proto::Topic;

type OnceHandler = Box<dyn FnOnce(Option<i64>) + Send>;
type DurableHandler = Arc<dyn Fn(Option<i64>) + Send + Sync>;

#[derive(Default)]
struct Subscriptions {
    once: VecDeque<OnceHandler>,
    durable: Vec<DurableHandler>,
}

impl Subscriptions {
    fn is_empty(&self) -> bool {
        self.once.is_empty() && self.durable.is_empty()
    }
}

/// Publish/subscribe keyed by [`Topic`].
///
/// A publish hands the value to the oldest one-shot subscriber on the
/// topic (which is removed first), then to every durable subscriber in
/// registration order. Handlers run outside the internal lock, so they
/// may subscribe again.
#[derive(Default)]
pub struct EventBus {
    topics: Mutex<HashMap<Topic, Subscriptions>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler consumed by the next publish on `topic`.
    pub fn subscribe_once<F>(&self, topic: Topic, handler: F)
    where
        F: FnOnce(Option<i64>) + Send + 'static,
    {
        self.lock()
            .entry(topic)
            .or_default()
            .once
            .push_back(Box::new(handler));
    }

    /// Register a handler that sees every publish on `topic` for the
    /// lifetime of the bus. There is no unsubscribe.
    pub fn subscribe_durable<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(Option<i64>) + Send + Sync + 'static,
    {
        self.lock()
            .entry(topic)
            .or_default()
            .durable
            .push(Arc::new(handler));
    }

    /// Drop the oldest one-shot handler on `topic` without running it.
    ///
    /// Returns `false` if there was none.
    pub fn cancel_once(&self, topic: &Topic) -> bool {
        let mut topics = self.lock();
        let Some(subs) = topics.get_mut(topic) else {
            return false;
        };
        let removed = subs.once.pop_front();
        if subs.is_empty() {
            topics.remove(topic);
        }
        // Run the handler's drop glue outside the lock.
        drop(topics);
        removed.is_some()
    }

    /// Deliver `value` to the subscribers of `topic`.
    ///
    /// Returns how many handlers ran.
    pub fn publish(&self, topic: &Topic, value: Option<i64>) -> usize {
        let (once, durable) = {
            let mut topics = self.lock();
            let Some(subs) = topics.get_mut(topic) else {
                return 0;
            };
            let once = subs.once.pop_front();
            let durable = subs.durable.clone();
            if subs.is_empty() {
                topics.remove(topic);
            }
            (once, durable)
        };

        let mut delivered = 0;
        if let Some(handler) = once {
            handler(value);
            delivered += 1;
        }
        for handler in &durable {
            handler(value);
            delivered += 1;
        }
        delivered
    }

    /// Number of one-shot handlers waiting on `topic`.
    pub fn pending_once(&self, topic: &Topic) -> usize {
        self.lock().get(topic).map_or(0, |subs| subs.once.len())
    }

    /// Number of durable handlers registered on `topic`.
    pub fn durable_count(&self, topic: &Topic) -> usize {
        self.lock().get(topic).map_or(0, |subs| subs.durable.len())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Topic, Subscriptions>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn topic(command: &str) -> Topic {
        Topic::new("Lightbulb", "5", command)
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str, Option<i64>) + Clone) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let record = move |who: &str, v: Option<i64>| {
            sink.lock().unwrap().push(format!("{who}={v:?}"));
        };
        (log, record)
    }

    #[test]
    fn publish_without_subscribers_delivers_nothing() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&topic("getPowerState"), Some(1)), 0);
    }

    #[test]
    fn one_shot_is_consumed_by_first_publish() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        bus.subscribe_once(topic("getPowerState"), move |v| record("once", v));

        assert_eq!(bus.publish(&topic("getPowerState"), Some(1)), 1);
        assert_eq!(bus.publish(&topic("getPowerState"), Some(0)), 0);
        assert_eq!(*log.lock().unwrap(), vec!["once=Some(1)"]);
    }

    #[test]
    fn only_oldest_one_shot_runs_per_publish() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        let r2 = record.clone();
        bus.subscribe_once(topic("getPowerState"), move |v| record("first", v));
        bus.subscribe_once(topic("getPowerState"), move |v| r2("second", v));

        bus.publish(&topic("getPowerState"), Some(1));
        assert_eq!(*log.lock().unwrap(), vec!["first=Some(1)"]);
        assert_eq!(bus.pending_once(&topic("getPowerState")), 1);

        bus.publish(&topic("getPowerState"), Some(0));
        assert_eq!(*log.lock().unwrap(), vec!["first=Some(1)", "second=Some(0)"]);
    }

    #[test]
    fn durable_handlers_run_in_order_after_one_shot() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        let (r1, r2, r3) = (record.clone(), record.clone(), record);
        bus.subscribe_durable(topic("eventPowerState"), move |v| r1("durable-a", v));
        bus.subscribe_once(topic("eventPowerState"), move |v| r2("once", v));
        bus.subscribe_durable(topic("eventPowerState"), move |v| r3("durable-b", v));

        assert_eq!(bus.publish(&topic("eventPowerState"), Some(1)), 3);
        assert_eq!(bus.publish(&topic("eventPowerState"), None), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "once=Some(1)",
                "durable-a=Some(1)",
                "durable-b=Some(1)",
                "durable-a=None",
                "durable-b=None",
            ]
        );
        assert_eq!(bus.durable_count(&topic("eventPowerState")), 2);
    }

    #[test]
    fn topics_are_isolated() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        bus.subscribe_durable(topic("eventPowerState"), move |v| record("power", v));

        assert_eq!(bus.publish(&Topic::new("Lightbulb", "6", "eventPowerState"), Some(1)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn cancel_once_drops_without_delivery() {
        let bus = EventBus::new();
        let (log, record) = recorder();
        bus.subscribe_once(topic("getPowerState"), move |v| record("once", v));

        assert!(bus.cancel_once(&topic("getPowerState")));
        assert!(!bus.cancel_once(&topic("getPowerState")));
        assert_eq!(bus.publish(&topic("getPowerState"), Some(1)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_may_resubscribe_during_delivery() {
        let bus = Arc::new(EventBus::new());
        let (log, record) = recorder();
        let inner_bus = Arc::clone(&bus);
        bus.subscribe_once(topic("getPowerState"), move |_| {
            inner_bus.subscribe_once(topic("getPowerState"), move |v| record("again", v));
        });

        bus.publish(&topic("getPowerState"), Some(1));
        bus.publish(&topic("getPowerState"), Some(0));
        assert_eq!(*log.lock().unwrap(), vec!["again=Some(0)"]);
    }
}
