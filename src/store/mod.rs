//! Store Module
//!
//! Abstraction over the remote key-value store plus the connection
//! supervisor that keeps the single shared connection alive.

mod connector;
mod keys;
mod memory;
mod redis;
mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use connector::{spawn_connector, ConnectionState, Connector, Dialer, Lease};
pub use keys::{cache_key, counter_key, CACHE_PREFIX, COUNTER_PREFIX};
pub use memory::MemoryStore;
pub use self::redis::{RedisDialer, RedisStore};
pub use retry::{Backoff, Decision, FailureKind, RetryPolicy};

// == Store Error ==
/// Failures surfaced by a store operation.
///
/// A missing key is never an error; it is reported as `None` by [`KvStore::get`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the connection
    #[error("connection refused: {0}")]
    Refused(String),

    /// The connection was closed underneath us
    #[error("connection closed: {0}")]
    Closed(String),

    /// Any other transport-level failure (I/O, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The store understood the request and rejected it
    #[error("command failed: {0}")]
    Command(String),

    /// Reconnection gave up; nothing will succeed until restart
    #[error("connection retries exhausted")]
    Exhausted,

    /// The connector was closed during shutdown
    #[error("store connection closed for shutdown")]
    Stopped,

    /// The connection string could not be parsed
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Returns the reconnection class of this error, or `None` when the
    /// connection itself is still healthy.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            StoreError::Refused(_) => Some(FailureKind::Refused),
            StoreError::Closed(_) => Some(FailureKind::Closed),
            StoreError::Transport(_) => Some(FailureKind::Transient),
            StoreError::Command(_)
            | StoreError::Exhausted
            | StoreError::Stopped
            | StoreError::InvalidUrl(_) => None,
        }
    }
}

/// Convenience Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Key-Value Store Trait ==
/// The four primitives the HTTP layer needs from the backing store.
///
/// Each call is a single atomic operation at the store; implementations are
/// shared across requests without any caller-side locking.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetches the raw value at `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrites (or creates) `key`, returning the store's acknowledgement if it sent one.
    async fn set(&self, key: &str, value: &str) -> StoreResult<Option<String>>;

    /// Atomically adds one, treating an absent key as zero.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Atomically subtracts one, treating an absent key as zero.
    async fn decr(&self, key: &str) -> StoreResult<i64>;
}
