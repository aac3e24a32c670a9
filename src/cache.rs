//! UserCache — the synchronization engine.
//!
//! Maintains the authoritative local snapshot of all user records in the
//! session, keeps it aligned with the room collaborator's notifications, and
//! re-emits normalized `join` / `leave` / `change` events through the
//! [`EventBroker`].
//!
//! # Locking
//!
//! Snapshot, registry and lifecycle state live behind `parking_lot` mutexes.
//! No lock is held while a listener callback runs or across an `await`;
//! handlers mutate under a short critical section and emit afterwards, so
//! events observe the post-mutation snapshot and listeners may re-enter the
//! cache freely.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, UserCacheError};
use crate::events::{EventBroker, EventKind, ListenerId, UserEvent};
use crate::path::{apply_at_path, parse_key_path, remove_at_path};
use crate::registry::KeyRegistry;
use crate::room::{
    KeyContext, KeyEvent, KeySubscribeOptions, Room, RoomKey, SessionEvent, SessionListener,
};

/// Index of the user-id segment in a parsed key name (`.users/<id>/...`).
const USER_ID_SEGMENT: usize = 1;
/// First in-record segment in a parsed key name.
const RECORD_PATH_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Ready,
    Destroyed,
}

/// Shared engine state. Every notification handler is a free function of
/// `(&CacheShared, payload)`; the registered closures capture nothing but an
/// `Arc` of this struct.
struct CacheShared {
    room: Arc<dyn Room>,
    users: Mutex<HashMap<String, Value>>,
    keys: KeyRegistry,
    local_user_id: Mutex<Option<String>>,
    broker: EventBroker,
    state: Mutex<Lifecycle>,
}

/// Subscriptions registered with the room, retained so `destroy` can hand
/// the same listener identities back to `off`.
struct Subscriptions {
    join: Arc<SessionListener>,
    leave: Arc<SessionListener>,
    set: KeySubscribeOptions,
    remove: KeySubscribeOptions,
}

pub struct UserCache {
    shared: Arc<CacheShared>,
    subscriptions: Mutex<Option<Subscriptions>>,
}

impl UserCache {
    pub fn new(room: Arc<dyn Room>) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                room,
                users: Mutex::new(HashMap::new()),
                keys: KeyRegistry::new(),
                local_user_id: Mutex::new(None),
                broker: EventBroker::new(),
                state: Mutex::new(Lifecycle::Uninitialized),
            }),
            subscriptions: Mutex::new(None),
        }
    }

    /// Resolve the local identity, bind to the room's notifications and load
    /// the initial user set.
    ///
    /// On a transport failure the subscriptions registered so far are torn
    /// down again and the error is returned; the cache is destroyed and
    /// cannot be retried. Calling `initialize` a second time fails with
    /// [`UserCacheError::AlreadyInitialized`].
    pub async fn initialize(&self) -> Result<()> {
        match *self.shared.state.lock() {
            Lifecycle::Uninitialized => {}
            Lifecycle::Ready => return Err(UserCacheError::AlreadyInitialized),
            Lifecycle::Destroyed => return Err(UserCacheError::Destroyed),
        }

        self.resolve_local_user_id();
        self.bind_events();

        let fetched = self.shared.room.users().get().await;
        let users = match fetched {
            Ok(users) => users,
            Err(err) => {
                self.destroy();
                return Err(err.into());
            }
        };

        // A never-written aggregate key fetches as null — an empty session.
        if let Value::Object(records) = users {
            for (id, record) in records {
                let handle = self.shared.room.user(&id);
                self.shared.users.lock().insert(id.clone(), record);
                self.shared.keys.register(id, handle);
            }
        }

        *self.shared.state.lock() = Lifecycle::Ready;
        Ok(())
    }

    /// Tear down the room subscriptions and silence the event broker.
    ///
    /// Safe to call when `initialize` never ran or failed partway; calling
    /// it twice is a no-op the second time. A `destroy` racing an in-flight
    /// `initialize` is unsupported — wait for `initialize` to return first.
    pub fn destroy(&self) {
        let taken = self.subscriptions.lock().take();
        if let Some(subs) = taken {
            let room = &self.shared.room;
            room.off(SessionEvent::Leave, &subs.leave);
            room.off(SessionEvent::Join, &subs.join);
            let users = room.users();
            users.off(KeyEvent::Set, &subs.set);
            users.off(KeyEvent::Remove, &subs.remove);
        }
        self.shared.broker.off_all();
        *self.shared.state.lock() = Lifecycle::Destroyed;
    }

    // -----------------------------------------------------------------------
    // Read surface
    // -----------------------------------------------------------------------

    /// The cached record for `id`.
    pub fn get_user(&self, id: &str) -> Result<Value> {
        self.ensure_ready()?;
        self.shared
            .users
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| UserCacheError::UserNotFound { id: id.to_string() })
    }

    /// All cached records, in no particular order.
    pub fn get_all(&self) -> Result<Vec<Value>> {
        self.ensure_ready()?;
        Ok(self.shared.users.lock().values().cloned().collect())
    }

    /// The record of the local participant.
    pub fn get_local_user(&self) -> Result<Value> {
        self.ensure_ready()?;
        let id = self
            .shared
            .local_user_id
            .lock()
            .clone()
            .ok_or(UserCacheError::NotInitialized)?;
        self.get_user(&id)
    }

    /// The registered key handle for `id`.
    pub fn get_user_key(&self, id: &str) -> Result<Arc<dyn RoomKey>> {
        self.ensure_ready()?;
        self.shared.keys.get(id)
    }

    /// All registered key handles, in no particular order.
    pub fn get_all_user_keys(&self) -> Result<Vec<Arc<dyn RoomKey>>> {
        self.ensure_ready()?;
        Ok(self.shared.keys.all())
    }

    /// The room's current notion of "self" — fetched live, never cached.
    pub fn get_local_user_key(&self) -> Result<Arc<dyn RoomKey>> {
        self.ensure_ready()?;
        Ok(self.shared.room.self_key())
    }

    /// Whether a record for `id` is currently cached.
    pub fn contains(&self, id: &str) -> bool {
        self.shared.users.lock().contains_key(id)
    }

    /// Number of currently cached records.
    pub fn user_count(&self) -> usize {
        self.shared.users.lock().len()
    }

    // -----------------------------------------------------------------------
    // Event surface
    // -----------------------------------------------------------------------

    /// Register `listener` for `event` and return its id.
    pub fn on(
        &self,
        event: EventKind,
        listener: impl Fn(&UserEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId> {
        if *self.shared.state.lock() == Lifecycle::Destroyed {
            return Err(UserCacheError::Destroyed);
        }
        Ok(self.shared.broker.on(event, listener))
    }

    /// Remove exactly the listener identified by `id`.
    pub fn off(&self, event: EventKind, id: ListenerId) {
        self.shared.broker.off(event, id);
    }

    /// Remove every listener for `event`.
    pub fn off_event(&self, event: EventKind) {
        self.shared.broker.off_event(event);
    }

    /// Remove every listener for every event.
    pub fn off_all(&self) {
        self.shared.broker.off_all();
    }

    // -----------------------------------------------------------------------
    // Initialization steps
    // -----------------------------------------------------------------------

    fn resolve_local_user_id(&self) {
        let self_key = self.shared.room.self_key();
        let segments = parse_key_path(self_key.name());
        // `/.users/<id>` — the id follows the aggregate segment.
        *self.shared.local_user_id.lock() = segments.get(USER_ID_SEGMENT).cloned();
    }

    fn bind_events(&self) {
        let join: Arc<SessionListener> = {
            let shared = Arc::clone(&self.shared);
            Arc::new(move |user: &Value| handle_join(&shared, user))
        };
        let leave: Arc<SessionListener> = {
            let shared = Arc::clone(&self.shared);
            Arc::new(move |user: &Value| handle_leave(&shared, user))
        };
        let set = KeySubscribeOptions {
            local: true,
            bubble: true,
            listener: {
                let shared = Arc::clone(&self.shared);
                Arc::new(move |value: &Value, context: &KeyContext| {
                    apply_field_update(&shared, context, Some(value.clone()));
                })
            },
        };
        let remove = KeySubscribeOptions {
            local: true,
            bubble: true,
            listener: {
                let shared = Arc::clone(&self.shared);
                Arc::new(move |_value: &Value, context: &KeyContext| {
                    apply_field_update(&shared, context, None);
                })
            },
        };

        let room = &self.shared.room;
        room.on(SessionEvent::Leave, Arc::clone(&leave));
        room.on(SessionEvent::Join, Arc::clone(&join));
        let users = room.users();
        users.on(KeyEvent::Set, set.clone());
        users.on(KeyEvent::Remove, remove.clone());

        *self.subscriptions.lock() = Some(Subscriptions {
            join,
            leave,
            set,
            remove,
        });
    }

    fn ensure_ready(&self) -> Result<()> {
        match *self.shared.state.lock() {
            Lifecycle::Ready => Ok(()),
            Lifecycle::Uninitialized => Err(UserCacheError::NotInitialized),
            Lifecycle::Destroyed => Err(UserCacheError::Destroyed),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification handlers
// ---------------------------------------------------------------------------

/// Cache the joining user's record, register its key handle and emit `join`.
/// A join for an already-present id overwrites the cached record.
fn handle_join(shared: &CacheShared, user: &Value) {
    let Some(id) = user.get("id").and_then(Value::as_str) else {
        return;
    };
    let handle = shared.room.user(id);
    shared.users.lock().insert(id.to_string(), user.clone());
    shared.keys.register(id, handle);
    shared.broker.emit(&UserEvent::Join { user: user.clone() });
}

/// Drop the leaving user's record and key handle, then emit `leave` carrying
/// the record from the notification payload.
fn handle_leave(shared: &CacheShared, user: &Value) {
    let Some(id) = user.get("id").and_then(Value::as_str) else {
        return;
    };
    shared.users.lock().remove(id);
    shared.keys.unregister(id);
    shared.broker.emit(&UserEvent::Leave { user: user.clone() });
}

/// Apply one field-level update (`Some(value)` for set, `None` for remove)
/// to the addressed user record, then emit `change` with the updated record
/// and the full field path.
///
/// Updates addressed to an unknown user id, or without an in-record path,
/// are dropped without emitting.
fn apply_field_update(shared: &CacheShared, context: &KeyContext, value: Option<Value>) {
    let segments = parse_key_path(&context.key);
    // `.users/<id>/<field...>` — everything past the addressing prefix is
    // the in-record path.
    let record_path = match segments.get(RECORD_PATH_OFFSET..) {
        Some(path) if !path.is_empty() => path,
        _ => return,
    };

    let updated = {
        let mut users = shared.users.lock();
        let Some(fields) = users
            .get_mut(&context.user_id)
            .and_then(Value::as_object_mut)
        else {
            return;
        };
        let applied = match value {
            Some(v) => apply_at_path(fields, record_path, v),
            None => remove_at_path(fields, record_path).map(|_| ()),
        };
        if applied.is_err() {
            return;
        }
        Value::Object(fields.clone())
    };

    shared.broker.emit(&UserEvent::Change {
        user: updated,
        key: context.key.clone(),
    });
}
