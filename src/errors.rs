//! Configuration Sync Error Hierarchy
//!
//! Defines the error types of the watch-and-stage-apply engine, categorized by the
//! layer that produced them: the store client, the watch session, and commit-time
//! validation of staged values.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Key-value store failures (missing keys, transport, closed client)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Watch session failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Staged values rejected at commit time
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Settings loading/validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Zero results for a required key or prefix
    #[error("'{0}' not found")]
    NotFound(String),

    /// Network/store failure reported by the client
    #[error("Store transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured deadline
    #[error("Store request for '{path}' timed out after {duration:?}")]
    Timeout { path: String, duration: Duration },

    /// Backend was closed while the request was in flight
    #[error("Store backend is closed")]
    Closed,
}

/// Faults that end a watch session.
///
/// Carried inside a terminal [`ChangeEvent`](crate::ChangeEvent), so every variant is
/// cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The store cancelled the watch on its side
    #[error("Store cancelled watch: {reason}")]
    Canceled { reason: String },

    /// The native watch stream failed
    #[error("Watch stream failed: {0}")]
    Transport(String),

    /// The event consumer went away before the stream ended
    #[error("Watch consumer dropped")]
    ConsumerGone,

    /// `watch()` was called while a session is still active
    #[error("Backend is already watching '{0}'")]
    AlreadyWatching(String),

    /// Re-watch attempts were exhausted
    #[error("Reconnect failed after {attempts} attempts: {reason}")]
    ReconnectExhausted { attempts: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required option has no value and no default
    #[error("config '{0}' is required")]
    Required(String),

    #[error("config '{name}' expected an integer, got '{value}'")]
    InvalidInt { name: String, value: String },

    #[error("config '{name}' expected a boolean, got '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("config '{name}' value is not valid UTF-8")]
    InvalidUtf8 { name: String },
}

impl Error {
    /// True for the "leave default" class of failures during the initial load.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(StoreError::NotFound(_)))
    }

    /// False when repeating the same request can never succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store(StoreError::Closed) => false,
            Error::Store(_) => true,
            Error::Watch(WatchError::Transport(_) | WatchError::Canceled { .. }) => true,
            Error::Watch(WatchError::AlreadyWatching(_)) => true,
            Error::Watch(_) => false,
            Error::Validation(_) | Error::Config(_) | Error::Fatal(_) => false,
        }
    }
}
