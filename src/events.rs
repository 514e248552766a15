//! Lifecycle event feed.
//!
//! Observers get a bounded channel of [`LifecycleEvent`]s. An observer that
//! lets its buffer fill up is dropped rather than slowing the client down.
//!
//! # Example
//!
//! ```ignore
//! let handle = client.events().subscribe(16);
//! client.start(&bus)?;
//! while let Ok(event) = handle.try_recv() {
//!     println!("{:?}", event);
//! }
//! ```

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Something that happened to a subscription client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// `start` began waiting for the subscription service.
    Starting { service_uri: String },
    /// First refresh received.
    Ready { elapsed_ms: u64 },
    /// No refresh within the start timeout.
    TimedOut { timeout_ms: u64 },
    /// Coordinator stopped and released.
    Stopped,
    /// Client disposed.
    Disposed,
}

/// Unique identifier for an observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Receiving side of an observer.
pub struct EventHandle {
    pub id: ObserverId,
    receiver: Receiver<LifecycleEvent>,
}

impl EventHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<LifecycleEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<LifecycleEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LifecycleEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything currently buffered.
    pub fn drain(&self) -> Vec<LifecycleEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Broadcasts lifecycle events to observers.
pub struct EventFeed {
    observers: RwLock<HashMap<ObserverId, Sender<LifecycleEvent>>>,
    next_id: AtomicU64,
}

impl EventFeed {
    /// Create a feed with no observers.
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add an observer with room for `buffer_size` undelivered events.
    pub fn subscribe(&self, buffer_size: usize) -> EventHandle {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(buffer_size.max(1));

        self.observers.write().insert(id, sender);

        EventHandle { id, receiver }
    }

    /// Remove an observer. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: ObserverId) {
        self.observers.write().remove(&id);
    }

    /// Number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Send to every observer, dropping those that are full or gone.
    pub fn publish(&self, event: LifecycleEvent) {
        let mut to_remove = Vec::new();

        {
            let observers = self.observers.read();
            for (id, sender) in observers.iter() {
                match sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                        to_remove.push(*id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            let mut observers = self.observers.write();
            for id in to_remove {
                observers.remove(&id);
            }
        }
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}
