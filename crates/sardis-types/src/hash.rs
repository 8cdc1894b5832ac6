use chrono::{DateTime, SecondsFormat, Utc};

/// Digest of a serializable value over its canonical JSON form.
///
/// serde_json orders map keys lexicographically, which gives a stable,
/// newline-free byte sequence for identical logical content. All Sardis
/// content addressing (mandate audit hashes, payload digests, idempotency
/// request digests) goes through here.
pub fn canonical_digest<T: serde::Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

/// RFC 3339 UTC timestamp with millisecond precision, the only wire form
/// Sardis emits for instants.
pub fn rfc3339_ms(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
