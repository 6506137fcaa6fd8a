//! # Live Match Dispatcher
//!
//! The `Dispatcher` fans the live match set out to every connected subscriber
//! (typically one per WebSocket session).
//!
//! ## Core Design Principles:
//!
//! 1.  **Serialize Once, Share Everywhere**: each publish serializes the live set
//!     a single time. Every subscriber receives a `LiveFrame` pointing at the same
//!     `Arc`-held payload, so fan-out cost does not grow with payload size.
//!
//! 2.  **Per-Subscriber Cadence**: every subscriber remembers the fingerprint and
//!     time of its last delivery. On publish, a subscriber gets a frame when the
//!     content differs from what it last saw, or when its heartbeat interval has
//!     passed with nothing sent. Otherwise it is skipped. Two subscribers that
//!     joined at different times can receive different frames from one publish.
//!
//! 3.  **Non-Blocking, Bounded Sends**: each subscriber owns a bounded MPSC
//!     channel fed with `try_send`, so a slow consumer never delays the others or
//!     the poll loop. A send fails when the receiver is gone or when the queue is
//!     full (a stalled consumer); either way that subscriber is removed on the
//!     spot with no retry, which caps the memory one client can pin.
//!
//! 4.  **Immediate First Frame**: a new subscriber is sent the current live set as
//!     soon as it subscribes, without waiting for the next poll cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::errors::HubError;
use crate::utils::fingerprint::{fingerprint, Fingerprint};

/// Default interval after which unchanged content is re-sent.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);

/// Default number of undelivered frames a subscriber may have queued.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Opaque handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Why a frame was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// First frame after subscribing.
    Snapshot,
    /// Content changed since this subscriber's last frame.
    Update,
    /// Content unchanged, but the heartbeat interval elapsed.
    Heartbeat,
    /// Last delivery before shutdown.
    Final,
}

/// One serialized live set, shared by every frame that carries it.
#[derive(Debug)]
struct Content {
    fingerprint: Fingerprint,
    payload: String,
}

/// A delivery to a single subscriber.
#[derive(Debug, Clone)]
pub struct LiveFrame {
    kind: FrameKind,
    content: Arc<Content>,
}

impl LiveFrame {
    /// Why this frame was sent.
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Fingerprint of the payload.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.content.fingerprint
    }

    /// The live set as a JSON array.
    pub fn payload(&self) -> &str {
        &self.content.payload
    }
}

/// The receiving side handed to a new subscriber.
pub struct Subscription {
    /// Handle to pass back to `unsubscribe`.
    pub id: SubscriberId,
    /// Frames for this subscriber. Yields `None` once the subscriber was
    /// removed or the dispatcher closed.
    pub frames: mpsc::Receiver<LiveFrame>,
}

/// Counts from a single publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that were sent a frame.
    pub sent: usize,
    /// Subscribers skipped because content was unchanged and their heartbeat
    /// had not elapsed.
    pub skipped: usize,
    /// Subscribers removed because their channel was closed or full.
    pub dropped: usize,
    /// Fingerprint of the published content. `None` if it could not be serialized.
    pub fingerprint: Option<Fingerprint>,
}

/// Bookkeeping for a single connected subscriber.
struct ClientHandle {
    sender: mpsc::Sender<LiveFrame>,
    last_fingerprint: Option<Fingerprint>,
    last_sent: Instant,
}

impl ClientHandle {
    fn deliver(
        &mut self,
        kind: FrameKind,
        content: &Arc<Content>,
        now: Instant,
    ) -> Result<(), TrySendError<LiveFrame>> {
        let frame = LiveFrame {
            kind,
            content: Arc::clone(content),
        };
        self.sender.try_send(frame)?;
        self.last_fingerprint = Some(content.fingerprint.clone());
        self.last_sent = now;
        Ok(())
    }
}

/// Subscriber registry and publish policy.
pub struct Dispatcher {
    clients: Mutex<HashMap<SubscriberId, ClientHandle>>,
    latest: Mutex<Option<Arc<Content>>>,
    heartbeat: Duration,
    queue_capacity: usize,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Dispatcher {
    /// Creates a dispatcher that re-sends unchanged content every `heartbeat`.
    pub fn new(heartbeat: Duration) -> Self {
        Self::with_queue_capacity(heartbeat, DEFAULT_QUEUE_CAPACITY)
    }

    /// Like `new`, but a subscriber is dropped once `queue_capacity` frames are
    /// waiting for it. A capacity of zero is treated as one.
    pub fn with_queue_capacity(heartbeat: Duration, queue_capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            latest: Mutex::new(None),
            heartbeat,
            queue_capacity: queue_capacity.max(1),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers a subscriber using the current time.
    pub fn subscribe(&self) -> Result<Subscription, HubError> {
        self.subscribe_at(Instant::now())
    }

    /// Registers a subscriber and, if a live set has been published, sends it
    /// as the subscriber's first frame.
    pub fn subscribe_at(&self, now: Instant) -> Result<Subscription, HubError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HubError::Closed);
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handle = ClientHandle {
            sender: tx,
            last_fingerprint: None,
            last_sent: now,
        };

        // Lock order: latest, then clients.
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            return Err(HubError::Closed);
        }
        if let Some(content) = latest.as_ref() {
            // Fresh channel with the receiver still in hand: cannot fail.
            let _ = handle.deliver(FrameKind::Snapshot, content, now);
        }
        clients.insert(id, handle);
        log::info!("Subscriber {} registered ({} connected)", id, clients.len());

        Ok(Subscription { id, frames: rx })
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = clients.remove(&id).is_some();
        if removed {
            log::info!("Subscriber {} removed ({} connected)", id, clients.len());
        }
        removed
    }

    /// Publishes `matches` using the current time.
    pub fn publish(&self, matches: &[Value]) -> PublishReport {
        self.publish_at(matches, Instant::now())
    }

    /// Publishes the live set and decides, per subscriber, whether to send it.
    pub fn publish_at(&self, matches: &[Value], now: Instant) -> PublishReport {
        let payload = match serde_json::to_string(matches) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to serialize live set for publish: {}", e);
                return PublishReport::default();
            }
        };
        let content = Arc::new(Content {
            fingerprint: fingerprint(&payload),
            payload,
        });

        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(Arc::clone(&content));

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = PublishReport {
            fingerprint: Some(content.fingerprint.clone()),
            ..Default::default()
        };

        clients.retain(|id, client| {
            let kind = if client.last_fingerprint.as_ref() != Some(&content.fingerprint) {
                FrameKind::Update
            } else if now.saturating_duration_since(client.last_sent) > self.heartbeat {
                FrameKind::Heartbeat
            } else {
                report.skipped += 1;
                return true;
            };

            match client.deliver(kind, &content, now) {
                Ok(()) => {
                    report.sent += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} is not draining its queue. Removing from dispatcher.", id);
                    report.dropped += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    log::info!("Subscriber {} disconnected. Removing from dispatcher.", id);
                    report.dropped += 1;
                    false
                }
            }
        });

        log::debug!(
            "Published live set {} to {} subscribers ({} skipped, {} dropped)",
            content.fingerprint,
            report.sent,
            report.skipped,
            report.dropped
        );
        report
    }

    /// Stops accepting subscribers, sends the latest content to everyone who
    /// has not seen it yet, then drops every subscriber channel.
    ///
    /// Returns how many final frames were sent.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let now = Instant::now();

        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        let mut flushed = 0;
        if let Some(content) = latest.as_ref() {
            for client in clients.values_mut() {
                if client.last_fingerprint.as_ref() != Some(&content.fingerprint)
                    && client.deliver(FrameKind::Final, content, now).is_ok()
                {
                    flushed += 1;
                }
            }
        }

        let count = clients.len();
        clients.clear();
        log::info!("Dispatcher closed: {} subscribers released, {} final frames sent", count, flushed);
        flushed
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The configured heartbeat interval.
    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Frames a subscriber may have waiting before it is dropped.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT)
    }
}
