//! Client-side cache of the user records present in a shared real-time
//! collaboration session.
//!
//! [`UserCache`] loads the full user set from an abstract room collaborator,
//! then keeps its snapshot aligned by applying the room's join/leave and
//! field-level `set`/`remove` notifications, re-emitting each as a
//! normalized [`UserEvent`] (`join`, `leave`, `change`).
//!
//! # Modules
//!
//! - [`error`] — [`UserCacheError`] taxonomy and the crate [`Result`] alias.
//! - [`path`] — slash-path parsing and nested patch application.
//! - [`room`] — the [`Room`]/[`RoomKey`] collaborator contract.
//! - [`events`] — [`EventKind`], [`UserEvent`] and the [`EventBroker`].
//! - [`registry`] — [`KeyRegistry`] user-id → key handle bookkeeping.
//! - [`cache`] — the [`UserCache`] engine.

pub mod cache;
pub mod error;
pub mod events;
pub mod path;
pub mod registry;
pub mod room;

pub use cache::UserCache;
pub use error::{Result, UserCacheError};
pub use events::{EventBroker, EventKind, ListenerFn, ListenerId, UserEvent};
pub use path::{apply_at_path, parse_key_path, remove_at_path};
pub use registry::KeyRegistry;
pub use room::{
    KeyContext, KeyEvent, KeyListener, KeySubscribeOptions, Room, RoomKey, SessionEvent,
    SessionListener, TransportError,
};
