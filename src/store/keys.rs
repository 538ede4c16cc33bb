//! Composite key construction for the two resource namespaces.

/// Prefix for JSON cache entries
pub const CACHE_PREFIX: &str = "cache:";

/// Prefix for integer counters
pub const COUNTER_PREFIX: &str = "counter:";

/// Store key for the cache entry called `name`. The name is used verbatim.
pub fn cache_key(name: &str) -> String {
    format!("{CACHE_PREFIX}{name}")
}

/// Store key for the counter called `name`. The name is used verbatim.
pub fn counter_key(name: &str) -> String {
    format!("{COUNTER_PREFIX}{name}")
}
