//! Room collaborator contract — the abstract transport the cache consumes.
//!
//! Implementations own connection management, subscription mechanics and any
//! retry policy. The cache only fetches current state and reacts to the
//! notifications delivered through listeners registered here.
//!
//! Listener identity for `off` is `Arc` pointer identity: unsubscribing
//! requires passing the same `Arc` that was registered.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Session-level notifications delivered by the room itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    Join,
    Leave,
}

/// Field-level notifications delivered by a key subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    Set,
    Remove,
}

/// Listener invoked with the user record attached to a session event.
pub type SessionListener = dyn Fn(&Value) + Send + Sync;

/// Listener invoked with the new value and routing context of a field change.
pub type KeyListener = dyn Fn(&Value, &KeyContext) + Send + Sync;

/// Routing context for one field-level notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContext {
    /// Id of the user whose subtree changed.
    pub user_id: String,
    /// Full hierarchical path of the changed field, e.g. `/.users/one/status`.
    pub key: String,
}

/// Options carried by a key subscription.
#[derive(Clone)]
pub struct KeySubscribeOptions {
    /// Deliver locally-originated changes too.
    pub local: bool,
    /// Deliver changes from nested descendants of the key.
    pub bubble: bool,
    pub listener: Arc<KeyListener>,
}

/// Transport-level failure reported by the room collaborator.
#[derive(Debug, Clone, Error)]
#[error("Transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A capability handle addressing one subtree of the remote store.
#[async_trait]
pub trait RoomKey: std::fmt::Debug + Send + Sync {
    /// Slash-delimited hierarchical address of this key.
    fn name(&self) -> &str;

    /// Fetch the full current value under this key.
    async fn get(&self) -> Result<Value, TransportError>;

    /// Subscribe to `set`/`remove` notifications on this subtree.
    fn on(&self, event: KeyEvent, options: KeySubscribeOptions);

    /// Unsubscribe a listener previously registered with the same options.
    fn off(&self, event: KeyEvent, options: &KeySubscribeOptions);
}

/// The room: session membership events plus key handles into its store.
pub trait Room: Send + Sync {
    /// Key handle for the local participant's own subtree.
    fn self_key(&self) -> Arc<dyn RoomKey>;

    /// Key handle addressing a specific user's subtree.
    fn user(&self, id: &str) -> Arc<dyn RoomKey>;

    /// Key handle addressing the aggregate collection of all users.
    fn users(&self) -> Arc<dyn RoomKey>;

    /// Subscribe to session `join`/`leave` notifications.
    fn on(&self, event: SessionEvent, listener: Arc<SessionListener>);

    /// Unsubscribe a session listener (matched by `Arc` identity).
    fn off(&self, event: SessionEvent, listener: &Arc<SessionListener>);
}
