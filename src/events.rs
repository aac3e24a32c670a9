//! Event vocabulary and the broker that fans notifications out to
//! application listeners.
//!
//! The vocabulary is closed: `join`, `leave`, `change`. Listeners are stored
//! as `Arc<dyn Fn(&UserEvent)>` per kind; emission takes a snapshot of the
//! listener list before calling out, so:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! A panicking listener is isolated — the remaining listeners in the round
//! still run. The broker's lock is never held while a listener executes, so
//! listeners may freely call `on()`/`off()`.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::UserCacheError;

/// The closed vocabulary of events the cache emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Leave,
    Change,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Join, EventKind::Leave, EventKind::Change];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Join => "join",
            EventKind::Leave => "leave",
            EventKind::Change => "change",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UserCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "join" => Ok(EventKind::Join),
            "leave" => Ok(EventKind::Leave),
            "change" => Ok(EventKind::Change),
            other => Err(UserCacheError::InvalidEvent(other.to_string())),
        }
    }
}

/// A notification emitted by the cache after it has updated its snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// A user entered the session.
    Join { user: Value },
    /// A user left the session.
    Leave { user: Value },
    /// A field of a cached user record changed.
    Change {
        /// The record as of this change.
        user: Value,
        /// Full hierarchical path of the changed field.
        key: String,
    },
}

impl UserEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UserEvent::Join { .. } => EventKind::Join,
            UserEvent::Leave { .. } => EventKind::Leave,
            UserEvent::Change { .. } => EventKind::Change,
        }
    }

    /// The user record carried by this event.
    pub fn user(&self) -> &Value {
        match self {
            UserEvent::Join { user } => user,
            UserEvent::Leave { user } => user,
            UserEvent::Change { user, .. } => user,
        }
    }
}

/// A listener ID returned by [`EventBroker::on`] that can be passed to
/// [`EventBroker::off`] to remove the listener.
pub type ListenerId = u64;

/// Closure type for event listeners.
pub type ListenerFn = dyn Fn(&UserEvent) + Send + Sync;

/// Typed synchronous pub/sub over the fixed event vocabulary.
pub struct EventBroker {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Arc<ListenerFn>)>>>,
    next_id: AtomicU64,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for `kind` and return its [`ListenerId`].
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&UserEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove the listener identified by `id` from `kind`.
    ///
    /// Does nothing if `id` is not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) {
        if let Some(entries) = self.listeners.lock().get_mut(&kind) {
            entries.retain(|(lid, _)| *lid != id);
        }
    }

    /// Remove every listener registered for `kind`.
    pub fn off_event(&self, kind: EventKind) {
        self.listeners.lock().remove(&kind);
    }

    /// Remove every listener for every kind.
    pub fn off_all(&self) {
        self.listeners.lock().clear();
    }

    /// Emit `event` to all listeners registered for its kind, synchronously,
    /// in registration order.
    ///
    /// A panic in one listener does not prevent the remaining listeners in
    /// the round from running.
    pub fn emit(&self, event: &UserEvent) {
        let snapshot: Vec<Arc<ListenerFn>> = {
            let guard = self.listeners.lock();
            match guard.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };
        // Lock is released — listeners can safely call on()/off().
        for cb in snapshot {
            let _ = catch_unwind(AssertUnwindSafe(|| cb(event)));
        }
    }

    /// Number of listeners currently registered for `kind`.
    pub fn size(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .get(&kind)
            .map_or(0, |entries| entries.len())
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
