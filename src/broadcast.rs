//! Broadcast hub fanning verdicts out to live observers.
//!
//! Each observer owns the receiving half of a bounded queue; the transport
//! task behind it (WebSocket, NATS bridge) drains the queue and writes to the
//! wire. Sends from the hub never wait: a closed queue removes the observer,
//! a full queue drops that one payload for that one observer.

use crate::error::DeliveryError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Identifier of a subscribed observer
pub type ObserverId = Uuid;

/// Receiving side handed to a new observer
#[derive(Debug)]
pub struct ObserverHandle {
    id: ObserverId,
    receiver: mpsc::Receiver<String>,
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next payload, or `None` once the observer has been removed
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for draining in tests and bridges
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Stop accepting payloads without dropping the handle.
    ///
    /// Already queued payloads can still be drained; the hub removes the
    /// observer on its next broadcast, exactly as if the handle were dropped.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers that accepted the payload
    pub delivered: usize,
    /// Observers whose queue was full; they stay subscribed
    pub dropped: Vec<ObserverId>,
    /// Observers removed because their connection was gone
    pub removed: Vec<ObserverId>,
}

/// Lifetime delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub broadcasts: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub removed: u64,
}

/// Mutex-guarded observer set exposed only through subscribe/unsubscribe/broadcast
pub struct BroadcastHub {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<String>>>,
    buffer: usize,
    broadcasts: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    removed: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub with a per-observer queue depth
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
            broadcasts: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            removed: AtomicU64::new(0),
        }
    }

    /// Register a new observer; it only sees payloads sent after this call
    pub fn subscribe(&self) -> ObserverHandle {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();

        let count = {
            let mut observers = self.lock();
            observers.insert(id, sender);
            observers.len()
        };

        debug!(observer_id = %id, observers = count, "Observer subscribed");
        ObserverHandle { id, receiver }
    }

    /// Remove an observer; returns false if it was already gone
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(observer_id = %id, "Observer unsubscribed");
        }
        removed
    }

    /// Serialize and deliver a payload to every current observer
    pub fn broadcast<T: Serialize>(&self, payload: &T) -> BroadcastReport {
        match serde_json::to_string(payload) {
            Ok(text) => self.broadcast_text(text),
            Err(e) => {
                error!(error = %e, "Failed to serialize broadcast payload");
                BroadcastReport::default()
            }
        }
    }

    /// Deliver a text payload to every current observer
    pub fn broadcast_text(&self, text: String) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        {
            let mut observers = self.lock();

            for (&id, sender) in observers.iter() {
                match deliver(sender, text.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(DeliveryError::Lagging) => {
                        warn!(observer_id = %id, "Observer queue full, payload dropped");
                        report.dropped.push(id);
                    }
                    Err(DeliveryError::Closed) => {
                        warn!(observer_id = %id, "Observer connection gone, removing");
                        report.removed.push(id);
                    }
                }
            }

            for id in &report.removed {
                observers.remove(id);
            }
        }

        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(report.dropped.len() as u64, Ordering::Relaxed);
        self.removed
            .fetch_add(report.removed.len() as u64, Ordering::Relaxed);

        report
    }

    /// Number of currently subscribed observers
    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_subscribed(&self, id: ObserverId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
        }
    }

    // Map updates never panic mid-way, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, mpsc::Sender<String>>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

fn deliver(sender: &mpsc::Sender<String>, text: String) -> Result<(), DeliveryError> {
    sender.try_send(text).map_err(|e| match e {
        TrySendError::Full(_) => DeliveryError::Lagging,
        TrySendError::Closed(_) => DeliveryError::Closed,
    })
}
