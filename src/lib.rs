//! KV Facade - A small HTTP front for a remote key-value store
//!
//! Exposes a JSON cache and named integer counters over HTTP, backed by a
//! single supervised Redis connection.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use api::AppState;
pub use config::Config;
pub use store::{KvStore, MemoryStore, RedisStore};
