//! API Module
//!
//! HTTP handlers and routing for the cache and counter REST API.
//!
//! # Endpoints
//! - `GET /` - Info page with host name and Seoul time
//! - `GET /cache/:name` - Read a cached JSON document
//! - `POST /cache/:name` - Store a JSON document
//! - `GET /counter/:name` - Read a counter
//! - `POST /counter/:name` - Increment a counter
//! - `DELETE /counter/:name` - Decrement a counter

pub mod handlers;
pub mod routes;


pub use handlers::*;
pub use routes::{create_router, create_router_with_assets};
