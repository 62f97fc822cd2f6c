// ── Request correlation and retry ──
//
// The protocol has no request ids: a get is answered by the next frame
// on the same topic, whatever its origin. Outstanding gets sit in an
// insertion-ordered queue and are re-sent verbatim on every retry tick
// until something arrives on their topic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

use creskit_proto::{FrameSink, Topic};

use crate::bus::EventBus;
use crate::error::CoreError;

/// What a waiting caller eventually receives.
pub type Reply = Result<Option<i64>, CoreError>;

/// An unanswered get.
struct PendingRequest {
    /// Exact text sent, re-sent unchanged.
    wire: String,
    created_at: Instant,
    retransmissions: u32,
    /// Every caller waiting on this topic; all are answered together.
    waiters: Vec<oneshot::Sender<Reply>>,
}

/// Tracks outstanding gets and matches them to inbound frames.
pub struct Correlator {
    bus: Arc<EventBus>,
    pending: Mutex<IndexMap<Topic, PendingRequest>>,
    /// Retransmissions allowed before a request expires. `None` = forever.
    max_retries: Option<u32>,
}

impl Correlator {
    pub fn new(bus: Arc<EventBus>, max_retries: Option<u32>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            pending: Mutex::new(IndexMap::new()),
            max_retries,
        })
    }

    /// Send a get and wait for the next frame on `topic`.
    ///
    /// A caller asking for a topic that is already pending joins the
    /// existing wait instead of queueing a second one-shot behind it; the
    /// wire text is still sent again.
    pub fn request_once(
        self: &Arc<Self>,
        link: &dyn FrameSink,
        topic: Topic,
        wire: String,
    ) -> oneshot::Receiver<Reply> {
        let (tx, rx) = oneshot::channel();

        let first = {
            let mut pending = self.lock();
            if let Some(entry) = pending.get_mut(&topic) {
                entry.waiters.push(tx);
                false
            } else {
                pending.insert(
                    topic.clone(),
                    PendingRequest {
                        wire: wire.clone(),
                        created_at: Instant::now(),
                        retransmissions: 0,
                        waiters: vec![tx],
                    },
                );
                true
            }
        };

        // Subscribe before the frame goes out so a fast answer can't slip past.
        if first {
            let correlator = Arc::downgrade(self);
            let key = topic.clone();
            self.bus.subscribe_once(topic.clone(), move |value| {
                if let Some(correlator) = correlator.upgrade() {
                    correlator.resolve(&key, value);
                }
            });
        }

        let sent = link.send(&wire);
        tracing::debug!(topic = %topic, joined = !first, sent, "get issued");
        rx
    }

    /// Answer every waiter on `topic` and stop retrying it.
    pub fn resolve(&self, topic: &Topic, value: Option<i64>) {
        let Some(entry) = self.lock().shift_remove(topic) else {
            return;
        };

        tracing::debug!(
            topic = %topic,
            ?value,
            waiters = entry.waiters.len(),
            retransmissions = entry.retransmissions,
            elapsed_ms = u64::try_from(entry.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "get resolved"
        );
        for waiter in entry.waiters {
            // Receiver gone means the caller stopped waiting.
            let _ = waiter.send(Ok(value));
        }
    }

    /// Re-send every outstanding request, oldest first.
    ///
    /// Requests past `max_retries` are dropped instead and their waiters
    /// get [`CoreError::RequestExpired`]. Only sends the link accepted
    /// count as retransmissions. Returns how many were re-sent.
    pub fn resend_outstanding(&self, link: &dyn FrameSink) -> usize {
        let mut expired = Vec::new();
        let resend: Vec<(Topic, String)> = {
            let mut pending = self.lock();
            if let Some(max) = self.max_retries {
                pending.retain(|topic, entry| {
                    if entry.retransmissions >= max {
                        expired.push((topic.clone(), std::mem::take(&mut entry.waiters), max));
                        false
                    } else {
                        true
                    }
                });
            }
            pending
                .iter()
                .map(|(topic, entry)| (topic.clone(), entry.wire.clone()))
                .collect()
        };

        for (topic, waiters, attempts) in expired {
            tracing::warn!(topic = %topic, attempts, "get expired without an answer");
            self.bus.cancel_once(&topic);
            for waiter in waiters {
                let _ = waiter.send(Err(CoreError::RequestExpired {
                    topic: topic.to_string(),
                    attempts,
                }));
            }
        }

        let sent: Vec<Topic> = resend
            .into_iter()
            .filter_map(|(topic, wire)| {
                let accepted = link.send(&wire);
                tracing::debug!(topic = %topic, sent = accepted, "get re-sent");
                accepted.then_some(topic)
            })
            .collect();

        // An answer may have landed between the send and this lock.
        let mut pending = self.lock();
        for topic in &sent {
            if let Some(entry) = pending.get_mut(topic) {
                entry.retransmissions += 1;
            }
        }
        sent.len()
    }

    /// Drop every outstanding request, failing its waiters with
    /// [`CoreError::Disconnected`]. Returns how many were dropped.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<(Topic, PendingRequest)> = self.lock().drain(..).collect();
        for (topic, entry) in &drained {
            self.bus.cancel_once(topic);
            tracing::debug!(topic = %topic, waiters = entry.waiters.len(), "get abandoned");
        }
        let count = drained.len();
        for (_, entry) in drained {
            for waiter in entry.waiters {
                let _ = waiter.send(Err(CoreError::Disconnected));
            }
        }
        count
    }

    /// Topics still waiting for an answer, oldest first.
    pub fn outstanding(&self) -> Vec<Topic> {
        self.lock().keys().cloned().collect()
    }

    /// How many times the request on `topic` has been re-sent.
    pub fn retransmissions(&self, topic: &Topic) -> Option<u32> {
        self.lock().get(topic).map(|entry| entry.retransmissions)
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<Topic, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
