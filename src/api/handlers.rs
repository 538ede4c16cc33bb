//! API Handlers
//!
//! HTTP request handlers for the cache, counter and info endpoints. Each
//! handler issues exactly one store operation.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};
use crate::models::info::hostname;
use crate::models::{CacheAck, CacheDocument, CounterText, InfoPage};
use crate::store::{cache_key, counter_key, KvStore, MemoryStore};

/// Application state shared across all handlers.
///
/// Holds the one store handle for the life of the process. The store
/// serializes operations itself, so no lock is taken here.
#[derive(Clone)]
pub struct AppState {
    /// Backing key-value store
    pub store: Arc<dyn KvStore>,
    /// Host name shown on the info page
    pub host: Arc<str>,
}

impl AppState {
    /// Creates a new AppState around `store`, naming this host from the environment.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_host(store, hostname())
    }

    pub fn with_host(store: Arc<dyn KvStore>, host: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            host: host.into(),
        }
    }

    /// State backed by a fresh in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

/// Handler for GET /
pub async fn info_handler(State(state): State<AppState>) -> InfoPage {
    InfoPage::now(&*state.host)
}

/// Handler for GET /cache/:name
///
/// Returns the stored document, or `{}` if nothing was ever stored.
pub async fn get_cache_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let key = cache_key(&name);

    match state.store.get(&key).await? {
        None => Ok(Json(Value::Object(Map::new()))),
        Some(raw) => serde_json::from_str(&raw)
            .map(Json)
            .map_err(|source| ApiError::CorruptEntry { key, source }),
    }
}

/// Handler for POST /cache/:name
///
/// Overwrites the entry with the request body, whatever its content type.
pub async fn set_cache_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<CacheAck> {
    let document = CacheDocument::from_body(&body).map_err(ApiError::InvalidBody)?;
    let ack = state
        .store
        .set(&cache_key(&name), &document.to_stored())
        .await?;

    Ok(CacheAck::from(ack))
}

/// Handler for GET /counter/:name
pub async fn get_counter_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<CounterText> {
    let value = state.store.get(&counter_key(&name)).await?;
    Ok(value.map(CounterText).unwrap_or_else(CounterText::zero))
}

/// Handler for POST /counter/:name
pub async fn incr_counter_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<CounterText> {
    let value = state.store.incr(&counter_key(&name)).await?;
    Ok(CounterText::from(value))
}

/// Handler for DELETE /counter/:name
///
/// Decrements; the key is never removed.
pub async fn decr_counter_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<CounterText> {
    let value = state.store.decr(&counter_key(&name)).await?;
    Ok(CounterText::from(value))
}
