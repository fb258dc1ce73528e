// src/status/hash.rs - Structural hashing for change detection
use std::hash::{Hash, Hasher};

use serde_json::Value;

// Variant tags keep e.g. Null, false and 0 from colliding.
const TAG_NULL: u64 = 0x6e75;
const TAG_BOOL: u64 = 0x626f;
const TAG_NUM: u64 = 0x6e6d;
const TAG_STR: u64 = 0x7374;
const TAG_SEQ: u64 = 0x7371;
const TAG_MAP: u64 = 0x6d70;

fn mix(tag: u64, payload: u64) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    tag.hash(&mut h);
    payload.hash(&mut h);
    h.finish()
}

fn hash_str(s: &str) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

/// Content hash over the closed set of JSON value shapes.
///
/// Object members are combined with XOR so key insertion order never
/// affects the result; arrays combine in order. Numbers hash by `f64`
/// bit pattern, so `1` and `1.0` agree.
pub fn structural_hash(value: &Value) -> u64 {
    match value {
        Value::Null => mix(TAG_NULL, 0),
        Value::Bool(b) => mix(TAG_BOOL, *b as u64),
        Value::Number(n) => match n.as_f64() {
            Some(f) => mix(TAG_NUM, f.to_bits()),
            None => mix(TAG_NUM, hash_str(&n.to_string())),
        },
        Value::String(s) => mix(TAG_STR, hash_str(s)),
        Value::Array(items) => {
            let mut acc = TAG_SEQ;
            for item in items {
                acc = mix(acc, structural_hash(item));
            }
            acc
        }
        Value::Object(map) => {
            // Each entry hashes key paired with value, then XOR-folds, so
            // {a:1, b:2} and {b:2, a:1} agree but {a:2, b:1} does not.
            let mut acc = 0u64;
            for (key, val) in map {
                acc ^= mix(hash_str(key), structural_hash(val));
            }
            mix(TAG_MAP, acc)
        }
    }
}
