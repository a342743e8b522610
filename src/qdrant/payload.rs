//! Helpers for constructing point payloads and hashing chunk content.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Build the payload object stored alongside each indexed chunk.
///
/// `source` and `chunk_index` make every record traceable back to the exact
/// slice of the page it came from; `chunk_hash` records the content that was
/// embedded so re-ingestion tooling can detect unchanged chunks.
pub(crate) fn build_payload(
    source_url: &str,
    chunk_index: usize,
    text: &str,
    timestamp_rfc3339: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("source".into(), Value::String(source_url.to_string()));
    payload.insert("chunk_index".into(), json!(chunk_index));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "chunk_hash".into(),
        Value::String(compute_chunk_hash(text)),
    );
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_stable() {
        let text = "Hello world";
        let h1 = compute_chunk_hash(text);
        let h2 = compute_chunk_hash(text);
        assert_eq!(h1, h2);
        assert!(!h1.is_empty());
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_carries_traceability_fields() {
        let now = "2026-01-01T00:00:00Z";
        let payload = build_payload("https://docs.example.com/a", 3, "sample", now);
        assert_eq!(payload["source"], "https://docs.example.com/a");
        assert_eq!(payload["chunk_index"], 3);
        assert_eq!(payload["text"], "sample");
        assert_eq!(payload["chunk_hash"], compute_chunk_hash("sample"));
        assert_eq!(payload["timestamp"], now);
    }
}
