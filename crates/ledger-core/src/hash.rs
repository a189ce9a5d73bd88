//! Canonical hashing of ledger values.
//!
//! A value is first converted to a JSON tree with every object's keys in
//! sorted order, so two values with the same fields serialize to the same
//! bytes no matter how they were built. Those bytes are hashed once with
//! SHA-256 and hex encoded.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::block::Block;

/// Compact JSON with object keys in lexicographic order.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    // Only maps with non-string keys fail to convert; ledger types have none.
    let tree = serde_json::to_value(value).unwrap_or(Value::Null);
    sort_keys(tree).to_string().into_bytes()
}

/// Rebuild every object with its keys inserted in sorted order, so the
/// result holds even when serde_json is built with `preserve_order`.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of any serializable value in canonical form.
pub fn digest_value<T: Serialize + ?Sized>(value: &T) -> String {
    sha256_hex(&canonical_bytes(value))
}

/// Digest of a block: canonicalize, hash once, hex encode.
pub fn digest(block: &Block) -> String {
    digest_value(block)
}
