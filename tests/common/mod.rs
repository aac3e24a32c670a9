//! Mock room collaborator for the engine tests.
//!
//! `MockRoom`/`MockKey` stand in for the remote store: `get` serves a stored
//! value (or a canned failure), and the `emit_*` helpers drive the listener
//! tables the way the real transport would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use usercache::{
    KeyContext, KeyEvent, KeyListener, KeySubscribeOptions, Room, RoomKey, SessionEvent,
    SessionListener, TransportError,
};

// ============================================================================
// MockKey
// ============================================================================

pub struct MockKey {
    name: String,
    value: Mutex<Value>,
    fail_with: Mutex<Option<String>>,
    listeners: Mutex<HashMap<KeyEvent, Vec<KeySubscribeOptions>>>,
}

impl MockKey {
    pub fn new(name: &str, value: Value) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            value: Mutex::new(value),
            fail_with: Mutex::new(None),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// Make subsequent `get` calls fail with `message`.
    pub fn fail_gets_with(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    /// Deliver a notification to every listener registered for `event`.
    pub fn emit(&self, event: KeyEvent, value: &Value, context: &KeyContext) {
        let snapshot: Vec<Arc<KeyListener>> = self
            .listeners
            .lock()
            .get(&event)
            .map(|options| options.iter().map(|o| Arc::clone(&o.listener)).collect())
            .unwrap_or_default();
        for listener in snapshot {
            listener(value, context);
        }
    }

    pub fn listener_count(&self, event: KeyEvent) -> usize {
        self.listeners
            .lock()
            .get(&event)
            .map_or(0, |options| options.len())
    }
}

impl std::fmt::Debug for MockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockKey").field("name", &self.name).finish()
    }
}

#[async_trait]
impl RoomKey for MockKey {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self) -> Result<Value, TransportError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(TransportError::new(message));
        }
        Ok(self.value.lock().clone())
    }

    fn on(&self, event: KeyEvent, options: KeySubscribeOptions) {
        self.listeners.lock().entry(event).or_default().push(options);
    }

    fn off(&self, event: KeyEvent, options: &KeySubscribeOptions) {
        if let Some(registered) = self.listeners.lock().get_mut(&event) {
            registered.retain(|o| !Arc::ptr_eq(&o.listener, &options.listener));
        }
    }
}

// ============================================================================
// MockRoom
// ============================================================================

pub struct MockRoom {
    self_id: String,
    users_key: Arc<MockKey>,
    user_keys: Mutex<HashMap<String, Arc<MockKey>>>,
    session_listeners: Mutex<HashMap<SessionEvent, Vec<Arc<SessionListener>>>>,
}

impl MockRoom {
    /// A room whose aggregate users key serves `initial_users`, with the
    /// local participant identified as `"local"`.
    pub fn with_users(initial_users: Value) -> Arc<Self> {
        Arc::new(Self {
            self_id: "local".to_string(),
            users_key: MockKey::new("/.users", initial_users),
            user_keys: Mutex::new(HashMap::new()),
            session_listeners: Mutex::new(HashMap::new()),
        })
    }

    /// A room whose initial fetch fails with `message`.
    pub fn failing(message: &str) -> Arc<Self> {
        let room = Self::with_users(Value::Null);
        room.users_key.fail_gets_with(message);
        room
    }

    /// The `MockKey` handle for `id`, created on first access.
    pub fn user_mock(&self, id: &str) -> Arc<MockKey> {
        let mut keys = self.user_keys.lock();
        Arc::clone(
            keys.entry(id.to_string())
                .or_insert_with(|| MockKey::new(&format!("/.users/{id}"), Value::Null)),
        )
    }

    /// The aggregate users key, for listener-count assertions.
    pub fn users_mock(&self) -> &Arc<MockKey> {
        &self.users_key
    }

    pub fn emit_join(&self, user: &Value) {
        self.emit_session(SessionEvent::Join, user);
    }

    pub fn emit_leave(&self, user: &Value) {
        self.emit_session(SessionEvent::Leave, user);
    }

    /// Deliver a field-set notification on the aggregate users key.
    pub fn emit_set(&self, value: Value, user_id: &str, key: &str) {
        let context = KeyContext {
            user_id: user_id.to_string(),
            key: key.to_string(),
        };
        self.users_key.emit(KeyEvent::Set, &value, &context);
    }

    /// Deliver a field-remove notification on the aggregate users key.
    pub fn emit_remove(&self, user_id: &str, key: &str) {
        let context = KeyContext {
            user_id: user_id.to_string(),
            key: key.to_string(),
        };
        self.users_key.emit(KeyEvent::Remove, &Value::Null, &context);
    }

    pub fn session_listener_count(&self, event: SessionEvent) -> usize {
        self.session_listeners
            .lock()
            .get(&event)
            .map_or(0, |listeners| listeners.len())
    }

    fn emit_session(&self, event: SessionEvent, user: &Value) {
        let snapshot: Vec<Arc<SessionListener>> = self
            .session_listeners
            .lock()
            .get(&event)
            .cloned()
            .unwrap_or_default();
        for listener in snapshot {
            listener(user);
        }
    }
}

impl Room for MockRoom {
    fn self_key(&self) -> Arc<dyn RoomKey> {
        self.user(&self.self_id)
    }

    fn user(&self, id: &str) -> Arc<dyn RoomKey> {
        self.user_mock(id)
    }

    fn users(&self) -> Arc<dyn RoomKey> {
        Arc::clone(&self.users_key) as Arc<dyn RoomKey>
    }

    fn on(&self, event: SessionEvent, listener: Arc<SessionListener>) {
        self.session_listeners
            .lock()
            .entry(event)
            .or_default()
            .push(listener);
    }

    fn off(&self, event: SessionEvent, listener: &Arc<SessionListener>) {
        if let Some(registered) = self.session_listeners.lock().get_mut(&event) {
            registered.retain(|l| !Arc::ptr_eq(l, listener));
        }
    }
}
