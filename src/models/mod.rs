//! Request and Response models for the HTTP API
//!
//! Bodies accepted and produced by the cache, counter and info endpoints.

pub mod info;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use info::InfoPage;
pub use requests::CacheDocument;
pub use responses::{CacheAck, CounterText, ErrorResponse};
