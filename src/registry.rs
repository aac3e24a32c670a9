//! KeyRegistry — user-id to remote key handle bookkeeping.
//!
//! The registry never infers handles; every registration is driven by an
//! explicit call from the engine after a room-collaborator lookup. Its
//! entries are kept in lockstep with the user snapshot: every cached user id
//! has exactly one registered handle.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, UserCacheError};
use crate::room::RoomKey;

pub struct KeyRegistry {
    keys: Mutex<HashMap<String, Arc<dyn RoomKey>>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Store `handle` for `user_id`, replacing any previous handle.
    pub fn register(&self, user_id: impl Into<String>, handle: Arc<dyn RoomKey>) {
        self.keys.lock().insert(user_id.into(), handle);
    }

    /// Remove and return the handle for `user_id`, if registered.
    pub fn unregister(&self, user_id: &str) -> Option<Arc<dyn RoomKey>> {
        self.keys.lock().remove(user_id)
    }

    /// Look up the handle for `user_id`.
    pub fn get(&self, user_id: &str) -> Result<Arc<dyn RoomKey>> {
        self.keys
            .lock()
            .get(user_id)
            .cloned()
            .ok_or_else(|| UserCacheError::KeyNotFound {
                id: user_id.to_string(),
            })
    }

    /// All registered handles, in no particular order.
    pub fn all(&self) -> Vec<Arc<dyn RoomKey>> {
        self.keys.lock().values().cloned().collect()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.keys.lock().contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    /// Drop every registered handle.
    pub fn clear(&self) {
        self.keys.lock().clear();
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
