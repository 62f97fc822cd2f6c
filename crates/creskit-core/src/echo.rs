// ── Echo suppression ──
//
// When the controller reports a change, the host model mirrors it and
// immediately calls back with a set for the same value. The controller
// already knows that state, so the set must not go back on the wire.

use std::sync::{Mutex, MutexGuard, PoisonError};

use creskit_proto::Topic;

/// Identical reports kept per topic before the oldest is dropped.
pub const MAX_TOKENS_PER_TOPIC: usize = 8;

/// A `(topic, value)` pair seen on an unsolicited event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoToken {
    pub topic: Topic,
    pub value: Option<i64>,
}

/// Record of peer-originated values awaiting their mirrored set.
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    tokens: Mutex<Vec<EchoToken>>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that the peer just reported `value` on `topic`.
    ///
    /// Tokens for the same topic carrying another value are dropped: the
    /// state they mirror is no longer current. Duplicates of the same value
    /// are kept, up to [`MAX_TOKENS_PER_TOPIC`]; see
    /// [`would_echo`](Self::would_echo).
    pub fn record_echo(&self, topic: Topic, value: Option<i64>) {
        let mut tokens = self.lock();
        tokens.retain(|t| t.topic != topic || t.value == value);
        let held = tokens.iter().filter(|t| t.topic == topic).count();
        if held >= MAX_TOKENS_PER_TOPIC {
            if let Some(oldest) = tokens.iter().position(|t| t.topic == topic) {
                tokens.remove(oldest);
            }
        }
        tracing::trace!(topic = %topic, ?value, "echo token recorded");
        tokens.push(EchoToken { topic, value });
    }

    /// Check whether sending `value` for `topic` would only echo a peer
    /// report back.
    ///
    /// On a match every token for the exact pair is removed at once, so
    /// two identical reports are cleared by a single set.
    pub fn would_echo(&self, topic: &Topic, value: Option<i64>) -> bool {
        let mut tokens = self.lock();
        let before = tokens.len();
        tokens.retain(|t| !(t.topic == *topic && t.value == value));
        let removed = before - tokens.len();
        if removed > 0 {
            tracing::debug!(topic = %topic, ?value, removed, "suppressing echo");
        }
        removed > 0
    }

    /// Number of tokens currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EchoToken>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn power_event() -> Topic {
        Topic::new("Lightbulb", "5", "eventPowerState")
    }

    #[test]
    fn unknown_pair_is_not_an_echo() {
        let echo = EchoSuppressor::new();
        assert!(!echo.would_echo(&power_event(), Some(1)));
        assert!(echo.is_empty());
    }

    #[test]
    fn token_is_consumed_exactly_once() {
        let echo = EchoSuppressor::new();
        echo.record_echo(power_event(), Some(1));

        assert!(echo.would_echo(&power_event(), Some(1)));
        assert!(!echo.would_echo(&power_event(), Some(1)));
    }

    #[test]
    fn one_check_clears_every_duplicate() {
        let echo = EchoSuppressor::new();
        echo.record_echo(power_event(), Some(1));
        echo.record_echo(power_event(), Some(1));
        assert_eq!(echo.len(), 2);

        assert!(echo.would_echo(&power_event(), Some(1)));
        assert!(echo.is_empty());
        assert!(!echo.would_echo(&power_event(), Some(1)));
    }

    #[test]
    fn other_topics_are_left_alone() {
        let echo = EchoSuppressor::new();
        echo.record_echo(power_event(), Some(0));
        echo.record_echo(Topic::new("Lightbulb", "6", "eventPowerState"), Some(1));

        assert!(echo.would_echo(&power_event(), Some(0)));
        assert_eq!(echo.len(), 1);
        assert!(!echo.would_echo(&power_event(), Some(0)));
    }

    #[test]
    fn newer_report_supersedes_older_value() {
        let echo = EchoSuppressor::new();
        echo.record_echo(power_event(), Some(0));
        echo.record_echo(power_event(), Some(1));

        assert_eq!(echo.len(), 1);
        assert!(!echo.would_echo(&power_event(), Some(0)));
        assert!(echo.would_echo(&power_event(), Some(1)));
    }

    #[test]
    fn alternating_reports_stay_bounded() {
        let echo = EchoSuppressor::new();
        for i in 0..10_000 {
            echo.record_echo(power_event(), Some(i % 2));
        }

        assert_eq!(echo.len(), 1);
        assert!(!echo.would_echo(&power_event(), Some(0)));
        assert!(echo.would_echo(&power_event(), Some(1)));
        assert!(echo.is_empty());
    }

    #[test]
    fn identical_reports_are_capped_per_topic() {
        let echo = EchoSuppressor::new();
        let other = Topic::new("Lightbulb", "6", "eventPowerState");
        echo.record_echo(other.clone(), Some(1));
        for _ in 0..100 {
            echo.record_echo(power_event(), Some(1));
        }

        assert_eq!(echo.len(), MAX_TOKENS_PER_TOPIC + 1);
        assert!(echo.would_echo(&power_event(), Some(1)));
        assert_eq!(echo.len(), 1);
        assert!(echo.would_echo(&other, Some(1)));
    }
}
