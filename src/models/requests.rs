//! Request bodies
//!
//! The cache accepts any JSON document, so the only model here is a thin
//! wrapper around `serde_json::Value`.

use serde_json::{Map, Value};

/// A document posted to `POST /cache/:name`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheDocument(pub Value);

impl CacheDocument {
    /// Parses a raw request body.
    ///
    /// The `Content-Type` header is not consulted. An empty (or
    /// whitespace-only) body is read as an empty object.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(Value::Object(Map::new())));
        }
        serde_json::from_slice(body).map(Self)
    }

    /// Compact text form written to the store.
    pub fn to_stored(&self) -> String {
        self.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body_is_empty_object() {
        assert_eq!(CacheDocument::from_body(b"").unwrap().0, json!({}));
        assert_eq!(CacheDocument::from_body(b"  \n").unwrap().0, json!({}));
    }

    #[test]
    fn test_body_is_compacted() {
        let doc = CacheDocument::from_body(b"{ \"x\" : 1 }").unwrap();
        assert_eq!(doc.to_stored(), r#"{"x":1}"#);
    }

    #[test]
    fn test_non_object_documents_accepted() {
        assert_eq!(CacheDocument::from_body(b"[1,2]").unwrap().0, json!([1, 2]));
        assert_eq!(CacheDocument::from_body(b"\"hi\"").unwrap().0, json!("hi"));
    }

    #[test]
    fn test_invalid_body_rejected() {
        assert!(CacheDocument::from_body(b"{not json").is_err());
    }
}
