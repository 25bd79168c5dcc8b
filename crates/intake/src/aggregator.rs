//! Quiescence aggregator: coalesces album members into one batch.
//!
//! Members of an album arrive as independent events that share a group key,
//! with no marker for the last one.  Each open group gets its own actor task
//! holding a sliding quiescence window: every new member restarts the window,
//! and once the window elapses with no arrival the actor retires the group and
//! hands the accumulated events to the sink as one batch.
//!
//! The routing table is locked only for the lookup-and-send of a new member or
//! the actor's removal of its own entry, so append and flush for one key are
//! atomic with respect to each other while unrelated groups never wait on each
//! other's timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use shelf_domain::error::Result;
use shelf_domain::trace::TraceEvent;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events and batches
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Event<T> {
    pub group_key: Option<String>,
    pub payload: T,
    /// Monotonic across the aggregator; assigned under the table lock so it
    /// matches the order members join their group.
    pub arrival_order: u64,
}

/// A flushed group, events in arrival order.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub group_key: Option<String>,
    pub events: Vec<Event<T>>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn payloads(&self) -> impl Iterator<Item = &T> {
        self.events.iter().map(|e| &e.payload)
    }

    pub fn into_payloads(self) -> Vec<T> {
        self.events.into_iter().map(|e| e.payload).collect()
    }
}

/// Downstream consumer of flushed batches.
///
/// Called exactly once per batch.  Errors are logged by the aggregator and
/// otherwise ignored; retrying is the sink's business.
#[async_trait]
pub trait BatchSink<T>: Send + Sync + 'static {
    async fn deliver(&self, batch: Batch<T>) -> Result<()>;
}

/// Outcome of [`Aggregator::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// No group key: the one-element batch was handed to the sink before
    /// `submit` returned.
    Delivered,
    /// Joined (or opened) a group; `position` is its index within the group.
    Buffered { group_key: String, position: usize },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct GroupHandle<T> {
    tx: mpsc::UnboundedSender<Event<T>>,
    generation: u64,
    len: usize,
}

struct Table<T> {
    groups: HashMap<String, GroupHandle<T>>,
    next_order: u64,
    next_generation: u64,
}

pub struct Aggregator<T> {
    window: Duration,
    sink: Arc<dyn BatchSink<T>>,
    table: Arc<Mutex<Table<T>>>,
}

impl<T: Send + 'static> Aggregator<T> {
    pub fn new(window: Duration, sink: Arc<dyn BatchSink<T>>) -> Self {
        Self {
            window,
            sink,
            table: Arc::new(Mutex::new(Table {
                groups: HashMap::new(),
                next_order: 0,
                next_generation: 0,
            })),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Submit one event.
    ///
    /// Ungrouped events are delivered immediately.  Grouped events join the
    /// open group for their key, or open a new one; a key whose group has
    /// already flushed starts a fresh group.
    pub async fn submit(&self, group_key: Option<String>, payload: T) -> Submitted {
        match group_key {
            Some(key) => self.buffer(key, payload),
            None => {
                let arrival_order = {
                    let mut table = self.table.lock();
                    let order = table.next_order;
                    table.next_order += 1;
                    order
                };
                let batch = Batch {
                    group_key: None,
                    events: vec![Event {
                        group_key: None,
                        payload,
                        arrival_order,
                    }],
                };
                deliver(self.sink.as_ref(), batch, Duration::ZERO).await;
                Submitted::Delivered
            }
        }
    }

    /// Number of groups currently waiting for quiescence.
    pub fn open_groups(&self) -> usize {
        self.table.lock().groups.len()
    }

    fn buffer(&self, key: String, payload: T) -> Submitted {
        let mut table = self.table.lock();
        let arrival_order = table.next_order;
        table.next_order += 1;

        let mut event = Event {
            group_key: Some(key.clone()),
            payload,
            arrival_order,
        };

        if let Some(handle) = table.groups.get_mut(&key) {
            match handle.tx.send(event) {
                Ok(()) => {
                    handle.len += 1;
                    return Submitted::Buffered {
                        position: handle.len - 1,
                        group_key: key,
                    };
                }
                Err(mpsc::error::SendError(returned)) => {
                    // The actor is gone without retiring its entry (it can
                    // only get here by panicking in the sink).  Start over.
                    tracing::warn!(group_key = %key, "stale group handle replaced");
                    event = returned;
                    table.groups.remove(&key);
                }
            }
        }

        let generation = table.next_generation;
        table.next_generation += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = tx.send(event);
        table.groups.insert(
            key.clone(),
            GroupHandle {
                tx,
                generation,
                len: 1,
            },
        );
        drop(table);

        tracing::debug!(group_key = %key, "group opened");
        tokio::spawn(run_group(
            key.clone(),
            generation,
            rx,
            self.window,
            self.table.clone(),
            self.sink.clone(),
        ));

        Submitted::Buffered {
            group_key: key,
            position: 0,
        }
    }
}

/// Per-group actor.  Collects members until the window elapses with no
/// arrival, retires the group under the table lock, then delivers.
async fn run_group<T: Send + 'static>(
    key: String,
    generation: u64,
    mut rx: mpsc::UnboundedReceiver<Event<T>>,
    window: Duration,
    table: Arc<Mutex<Table<T>>>,
    sink: Arc<dyn BatchSink<T>>,
) {
    let opened_at = Instant::now();
    let mut events: Vec<Event<T>> = Vec::new();

    loop {
        match tokio::time::timeout(window, rx.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => break,
            Err(_) => {
                {
                    let mut table = table.lock();
                    let ours = table
                        .groups
                        .get(&key)
                        .is_some_and(|h| h.generation == generation);
                    if ours {
                        table.groups.remove(&key);
                    }
                }
                // Sends only happen under the table lock, so after removal
                // the channel holds everything this group will ever get.
                while let Ok(event) = rx.try_recv() {
                    events.push(event);
                }
                break;
            }
        }
    }

    let batch = Batch {
        group_key: Some(key),
        events,
    };
    deliver(sink.as_ref(), batch, opened_at.elapsed()).await;
}

async fn deliver<T: 'static>(sink: &dyn BatchSink<T>, batch: Batch<T>, waited: Duration) {
    if batch.is_empty() {
        return;
    }
    TraceEvent::BatchFlushed {
        group_key: batch.group_key.clone(),
        size: batch.len(),
        waited_ms: waited.as_millis() as u64,
    }
    .emit();

    let group_key = batch.group_key.clone();
    if let Err(e) = sink.deliver(batch).await {
        tracing::warn!(
            group_key = ?group_key,
            error = %e,
            "batch sink failed; batch not retried"
        );
    }
}
