use thiserror::Error;

use crate::room::TransportError;

/// Errors surfaced by the cache's public API.
///
/// Misuse (bad event names, absent ids, lifecycle violations) is reported
/// synchronously through these variants; transport failures are only ever
/// returned from `initialize`, wrapped in [`UserCacheError::Transport`].
#[derive(Debug, Error)]
pub enum UserCacheError {
    #[error(r#"Invalid event: "{0}" is not a valid event."#)]
    InvalidEvent(String),

    #[error("Invalid id: user not found: {id}")]
    UserNotFound { id: String },

    #[error("Invalid id: user key not found: {id}")]
    KeyNotFound { id: String },

    #[error("Cache not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Cache already initialized.")]
    AlreadyInitialized,

    #[error("Cache has been destroyed.")]
    Destroyed,

    #[error("Empty key path")]
    EmptyKeyPath,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Convenience alias — the default error type is `UserCacheError`.
pub type Result<T, E = UserCacheError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
