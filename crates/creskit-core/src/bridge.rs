// ── Bridge abstraction ──
//
// Full lifecycle management for one controller link: the event bus,
// request correlator, echo suppressor, connection task and dispatcher
// all hang off a single `Bridge` instance. Point façades borrow it by
// handle.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use creskit_proto::{encode, ConnectionHandle, ConnectionState, Frame, FrameSink};

use crate::bus::EventBus;
use crate::config::BridgeConfig;
use crate::correlator::Correlator;
use crate::echo::EchoSuppressor;
use crate::error::CoreError;
use crate::model::{Characteristic, PointConfig, PointKind, PointUpdate};
use crate::point::Point;
use crate::sink::PointSink;

const FRAME_CHANNEL_SIZE: usize = 256;

// ── Bridge ───────────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Owns every piece of
/// correlation state; nothing is process-global, so several bridges can
/// run side by side against different controllers.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    points: IndexMap<(PointKind, String), PointConfig>,
    bus: Arc<EventBus>,
    correlator: Arc<Correlator>,
    echo: Arc<EchoSuppressor>,
    sink: Arc<dyn PointSink>,
    link: StdMutex<Option<Arc<dyn FrameSink>>>,
    connection: StdMutex<Option<ConnectionHandle>>,
    frame_tx: broadcast::Sender<Arc<Frame>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Build a bridge and register the event subscriptions of every
    /// configured point. Does NOT connect; call [`connect()`](Self::connect)
    /// or [`attach()`](Self::attach).
    pub fn new(config: BridgeConfig, sink: Arc<dyn PointSink>) -> Result<Self, CoreError> {
        config.validate()?;

        let bus = Arc::new(EventBus::new());
        let correlator = Correlator::new(Arc::clone(&bus), config.max_retries);
        let echo = Arc::new(EchoSuppressor::new());
        let (frame_tx, _) = broadcast::channel(FRAME_CHANNEL_SIZE);

        let mut points = IndexMap::with_capacity(config.points.len());
        for point in &config.points {
            register_event(&bus, &echo, &sink, point);
            points.insert((point.kind, point.id.clone()), point.clone());
        }

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                points,
                bus,
                correlator,
                echo,
                sink,
                link: StdMutex::new(None),
                connection: StdMutex::new(None),
                frame_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the TCP link to the configured controller and start the
    /// dispatcher.
    ///
    /// Returns once the background tasks are running; the first connect
    /// happens in the background. Use [`wait_connected`](Self::wait_connected)
    /// to block on it.
    pub async fn connect(&self) -> Result<(), CoreError> {
        self.ensure_detached()?;
        let peer = self.inner.config.peer.clone();
        peer.validate()?;

        info!(addr = %peer.addr(), "starting controller link");
        let (handle, inbound) = ConnectionHandle::spawn(peer, self.inner.cancel.child_token());
        *lock(&self.inner.connection) = Some(handle.clone());
        self.attach(Arc::new(handle), inbound).await
    }

    /// Start the bridge on an already-running transport.
    ///
    /// `link` carries outbound wire text, `inbound` delivers decoded
    /// frames in arrival order. [`connect()`](Self::connect) calls this
    /// with a TCP [`ConnectionHandle`].
    pub async fn attach(
        &self,
        link: Arc<dyn FrameSink>,
        inbound: mpsc::Receiver<Frame>,
    ) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }
        {
            let mut slot = lock(&self.inner.link);
            if slot.is_some() {
                return Err(CoreError::Internal("bridge is already attached".into()));
            }
            *slot = Some(Arc::clone(&link));
        }

        let period = self.inner.config.retry_interval;
        let mut retry = tokio::time::interval_at(Instant::now() + period, period);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let dispatcher = Dispatcher {
            bus: Arc::clone(&self.inner.bus),
            correlator: Arc::clone(&self.inner.correlator),
            link: Arc::clone(&link),
            frame_tx: self.inner.frame_tx.clone(),
            cancel: self.inner.cancel.clone(),
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(dispatch_task(dispatcher, inbound, retry)));

        if self.inner.config.prime_on_start {
            let primer = Primer {
                points: self.inner.points.values().cloned().collect(),
                correlator: Arc::clone(&self.inner.correlator),
                echo: Arc::clone(&self.inner.echo),
                sink: Arc::clone(&self.inner.sink),
                link,
                cancel: self.inner.cancel.clone(),
            };
            // A bare attached transport is already up; a TCP link primes
            // each time it reaches Connected.
            let state = self.watch_connection();
            let mut waiters = JoinSet::new();
            if state.is_none() {
                primer.prime_all(&mut waiters);
            }
            handles.push(tokio::spawn(prime_task(primer, waiters, state)));
        }

        info!(points = self.inner.points.len(), "bridge started");
        Ok(())
    }

    /// Stop the bridge.
    ///
    /// Cancels and joins the background tasks, fails every outstanding
    /// get with [`CoreError::Disconnected`] and waits for the connection
    /// task to close the socket. A stopped bridge cannot be restarted.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let abandoned = self.inner.correlator.abandon_all();
        if abandoned > 0 {
            debug!(abandoned, "dropped outstanding gets");
        }

        let connection = lock(&self.inner.connection).clone();
        if let Some(connection) = connection {
            connection.closed().await;
        }
        debug!("bridge stopped");
    }

    /// Wait until the TCP link reports Connected.
    ///
    /// Bridges started with [`attach()`](Self::attach) are considered
    /// connected as soon as they are attached.
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), CoreError> {
        let Some(mut state) = self.watch_connection() else {
            return if self.is_attached() {
                Ok(())
            } else {
                Err(CoreError::Disconnected)
            };
        };

        let addr = self.inner.config.peer.addr();
        match tokio::time::timeout(timeout, state.wait_for(|s| *s == ConnectionState::Connected))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::ConnectionFailed {
                addr,
                reason: match self.inner.config.peer.max_attempts {
                    Some(n) => format!("gave up after {n} failed connect attempt(s)"),
                    None => "connection loop stopped".into(),
                },
            }),
            Err(_) => Err(CoreError::ConnectionFailed {
                addr,
                reason: format!("not connected after {}s", timeout.as_secs()),
            }),
        }
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: connect, wait for the link, run closure, disconnect.
    ///
    /// Skips startup priming since only a single request is needed.
    pub async fn oneshot<F, Fut, T>(
        config: BridgeConfig,
        sink: Arc<dyn PointSink>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Bridge) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.prime_on_start = false;
        let connect_timeout = cfg.peer.connect_timeout;

        let bridge = Bridge::new(cfg, sink)?;
        bridge.connect().await?;
        let result = match bridge.wait_connected(connect_timeout).await {
            Ok(()) => f(bridge.clone()).await,
            Err(e) => Err(e),
        };
        bridge.disconnect().await;
        result
    }

    // ── State observation ────────────────────────────────────────────

    /// Current link state.
    pub fn connection_state(&self) -> ConnectionState {
        if let Some(connection) = lock(&self.inner.connection).as_ref() {
            return connection.state();
        }
        if self.is_attached() && !self.inner.cancel.is_cancelled() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Subscribe to link state changes. `None` until
    /// [`connect()`](Self::connect) has run.
    pub fn watch_connection(&self) -> Option<watch::Receiver<ConnectionState>> {
        lock(&self.inner.connection)
            .as_ref()
            .map(ConnectionHandle::watch_state)
    }

    /// Subscribe to every inbound frame, after it has been dispatched.
    pub fn frames(&self) -> broadcast::Receiver<Arc<Frame>> {
        self.inner.frame_tx.subscribe()
    }

    /// Topics of gets still waiting for an answer, oldest first.
    pub fn outstanding(&self) -> Vec<creskit_proto::Topic> {
        self.inner.correlator.outstanding()
    }

    // ── Points ───────────────────────────────────────────────────────

    /// Façade for one configured point.
    pub fn point(&self, kind: PointKind, id: &str) -> Result<Point, CoreError> {
        self.inner
            .points
            .get(&(kind, id.to_owned()))
            .map(|config| Point::new(self.clone(), config.clone()))
            .ok_or_else(|| CoreError::PointNotFound {
                kind: kind.to_string(),
                id: id.to_owned(),
            })
    }

    /// Façades for every configured point, in configuration order.
    pub fn points(&self) -> Vec<Point> {
        self.inner
            .points
            .values()
            .map(|config| Point::new(self.clone(), config.clone()))
            .collect()
    }

    // ── Crate-internal accessors for the point façade ────────────────

    pub(crate) fn correlator(&self) -> &Arc<Correlator> {
        &self.inner.correlator
    }

    pub(crate) fn echo(&self) -> &EchoSuppressor {
        &self.inner.echo
    }

    /// The active link, or `Disconnected` when the bridge was never
    /// started or has been stopped.
    pub(crate) fn link(&self) -> Result<Arc<dyn FrameSink>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Disconnected);
        }
        lock(&self.inner.link)
            .as_ref()
            .map(Arc::clone)
            .ok_or(CoreError::Disconnected)
    }

    fn is_attached(&self) -> bool {
        lock(&self.inner.link).is_some()
    }

    fn ensure_detached(&self) -> Result<(), CoreError> {
        if self.is_attached() {
            return Err(CoreError::Internal("bridge is already attached".into()));
        }
        Ok(())
    }
}

// ── Startup priming ──────────────────────────────────────────────────

/// Startup reads for the points whose kind has one.
struct Primer {
    points: Vec<PointConfig>,
    correlator: Arc<Correlator>,
    echo: Arc<EchoSuppressor>,
    sink: Arc<dyn PointSink>,
    link: Arc<dyn FrameSink>,
    cancel: CancellationToken,
}

impl Primer {
    fn prime_all(&self, waiters: &mut JoinSet<()>) {
        for point in &self.points {
            self.prime(point, waiters);
        }
    }

    /// Issue the startup read for `point`, if its kind has one, and apply
    /// the answer as though the controller had sent it as an event.
    fn prime(&self, point: &PointConfig, waiters: &mut JoinSet<()>) {
        let profile = point.kind.profile();
        let Some(characteristic) = profile.prime else {
            return;
        };
        let Some(binding) = profile.event.as_ref() else {
            return;
        };

        let command = characteristic.get_command();
        let wire = encode(&point.kind.to_string(), &point.id, &command, None);
        let rx = self
            .correlator
            .request_once(self.link.as_ref(), point.topic(&command), wire);

        let event_topic = point.topic(binding.command);
        let echo = Arc::clone(&self.echo);
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        let point = point.clone();

        waiters.spawn(async move {
            let reply = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                reply = rx => reply,
            };
            match reply {
                Ok(Ok(value)) => {
                    debug!(topic = %event_topic, ?value, "primed");
                    echo.record_echo(event_topic, value);
                    push_updates(sink.as_ref(), &point, binding.updates, value);
                }
                Ok(Err(e)) => warn!(kind = %point.kind, id = %point.id, error = %e, "startup read failed"),
                Err(_) => {}
            }
        });
    }
}

/// Prime on every transition to Connected, then wait for the replies.
///
/// Without a state watch the reads were already issued by the caller.
async fn prime_task(
    primer: Primer,
    mut waiters: JoinSet<()>,
    state: Option<watch::Receiver<ConnectionState>>,
) {
    if let Some(mut state) = state {
        loop {
            let up = tokio::select! {
                biased;
                () = primer.cancel.cancelled() => break,
                up = async { state.wait_for(|s| *s == ConnectionState::Connected).await.is_ok() } => up,
            };
            if !up {
                break;
            }

            while waiters.try_join_next().is_some() {}
            debug!("link up, priming");
            primer.prime_all(&mut waiters);

            // Any later transition counts, even one already back at Connected.
            let changed = tokio::select! {
                biased;
                () = primer.cancel.cancelled() => break,
                changed = state.changed() => changed.is_ok(),
            };
            if !changed {
                break;
            }
        }
    }

    while waiters.join_next().await.is_some() {}
}

// ── Event wiring ─────────────────────────────────────────────────────

/// Durable subscription for a point's unsolicited event: remember the
/// value for echo suppression, then mirror it to the host.
fn register_event(
    bus: &EventBus,
    echo: &Arc<EchoSuppressor>,
    sink: &Arc<dyn PointSink>,
    point: &PointConfig,
) {
    let Some(binding) = point.kind.profile().event.as_ref() else {
        return;
    };
    let topic = point.topic(binding.command);

    let echo = Arc::clone(echo);
    let sink = Arc::clone(sink);
    let point = point.clone();
    let key = topic.clone();
    bus.subscribe_durable(topic, move |value| {
        debug!(topic = %key, ?value, "peer event");
        echo.record_echo(key.clone(), value);
        push_updates(sink.as_ref(), &point, binding.updates, value);
    });
}

fn push_updates(
    sink: &dyn PointSink,
    point: &PointConfig,
    characteristics: &[Characteristic],
    value: Option<i64>,
) {
    for &characteristic in characteristics {
        sink.push(PointUpdate {
            kind: point.kind,
            id: point.id.clone(),
            name: point.name.clone(),
            characteristic,
            value,
        });
    }
}

// ── Background dispatcher ────────────────────────────────────────────

/// The single consumer of inbound frames. Bus delivery and retry ticks
/// both run here, so they never interleave.
struct Dispatcher {
    bus: Arc<EventBus>,
    correlator: Arc<Correlator>,
    link: Arc<dyn FrameSink>,
    frame_tx: broadcast::Sender<Arc<Frame>>,
    cancel: CancellationToken,
}

impl Dispatcher {
    fn dispatch(&self, frame: Frame) {
        let topic = frame.topic();
        let delivered = self.bus.publish(&topic, frame.value);
        debug!(topic = %topic, value = ?frame.value, delivered, "frame dispatched");
        // No observers is fine.
        let _ = self.frame_tx.send(Arc::new(frame));
    }
}

async fn dispatch_task(
    dispatcher: Dispatcher,
    mut inbound: mpsc::Receiver<Frame>,
    mut retry: Interval,
) {
    loop {
        tokio::select! {
            biased;
            () = dispatcher.cancel.cancelled() => break,
            // Ahead of inbound so a busy link cannot starve retries.
            _ = retry.tick() => {
                let resent = dispatcher.correlator.resend_outstanding(dispatcher.link.as_ref());
                if resent > 0 {
                    debug!(resent, "retry tick");
                }
            }
            frame = inbound.recv() => {
                let Some(frame) = frame else {
                    debug!("inbound channel closed");
                    break;
                };
                dispatcher.dispatch(frame);
            }
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
