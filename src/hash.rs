//! Structural hashing of JSON values and CRDT node trees.
//!
//! Two layers:
//!
//! 1. A numeric 32-bit hash (DJB-style, 32-bit wrapping arithmetic) over
//!    JSON values. String lengths and character codes use UTF-16 semantics
//!    so hashes stay stable across the wire format the documents came from.
//! 2. A *structural* hash: a printable, newline-free ASCII string that keeps
//!    spatial information — every node in the tree contributes its own
//!    token, so two trees with equal fingerprints are structurally equal
//!    with overwhelming probability, while unequal fingerprints pinpoint
//!    where they diverge.
//!
//! The diff engine compares structural fingerprints of a CRDT subtree and a
//! target JSON value to detect in-place array element updates.

use serde_json::{Map, Value};

use crate::node::{Node, NodeIndex};
use crate::patch::ops::ConValue;

// ── Type discriminators ───────────────────────────────────────────────────

pub const START_STATE: i32 = 5381;

pub const NULL_CONST: i32 = 982452847;
pub const TRUE_CONST: i32 = 982453247;
pub const FALSE_CONST: i32 = 982454243;
pub const ARRAY_CONST: i32 = 982452259;
pub const STRING_CONST: i32 = 982453601;
pub const OBJECT_CONST: i32 = 982454533;
pub const BINARY_CONST: i32 = 982454837;

// ── Numeric hash ──────────────────────────────────────────────────────────

/// `state = (state << 5) + state + num`, wrapping at 32 bits.
pub fn update_num(state: i32, num: i32) -> i32 {
    state.wrapping_shl(5).wrapping_add(state).wrapping_add(num)
}

/// Mix a string into the state, iterating UTF-16 code units in reverse.
pub fn update_str(mut state: i32, s: &str) -> i32 {
    let utf16: Vec<u16> = s.encode_utf16().collect();
    state = update_num(state, STRING_CONST);
    state = update_num(state, utf16.len() as i32);
    for &unit in utf16.iter().rev() {
        state = update_num(state, unit as i32);
    }
    state
}

/// Mix a byte blob into the state, iterating bytes in reverse.
pub fn update_bin(mut state: i32, bin: &[u8]) -> i32 {
    state = update_num(state, BINARY_CONST);
    state = update_num(state, bin.len() as i32);
    for &b in bin.iter().rev() {
        state = update_num(state, b as i32);
    }
    state
}

/// Mix any JSON value into the state.
pub fn update_json(state: i32, json: &Value) -> i32 {
    match json {
        Value::Null => update_num(state, NULL_CONST),
        Value::Bool(b) => update_num(state, if *b { TRUE_CONST } else { FALSE_CONST }),
        Value::Number(n) => update_num(state, n.as_f64().unwrap_or(0.0) as i32),
        Value::String(s) => {
            // The string discriminator appears twice: once here, once inside
            // update_str.
            let state = update_num(state, STRING_CONST);
            update_str(state, s)
        }
        Value::Array(arr) => {
            let mut state = update_num(state, ARRAY_CONST);
            for v in arr {
                state = update_json(state, v);
            }
            state
        }
        Value::Object(map) => update_json_object(state, map),
    }
}

fn update_json_object(state: i32, map: &Map<String, Value>) -> i32 {
    let mut state = update_num(state, OBJECT_CONST);
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        state = update_str(state, key);
        state = update_json(state, &map[key]);
    }
    state
}

/// 32-bit hash of any JSON value.
pub fn hash(json: &Value) -> u32 {
    update_json(START_STATE, json) as u32
}

/// 32-bit hash of a bare string.
pub fn hash_str(s: &str) -> u32 {
    let state = update_num(START_STATE, STRING_CONST);
    update_str(state, s) as u32
}

/// 32-bit hash of a bare byte blob.
pub fn hash_bin(bytes: &[u8]) -> u32 {
    update_bin(START_STATE, bytes) as u32
}

// ── Structural hash over JSON values ──────────────────────────────────────

/// Structural fingerprint of a JSON value. Printable ASCII, no newlines.
///
/// - `null` → `"N"`, booleans → `"T"` / `"F"`
/// - numbers → base-36
/// - strings → 32-bit hash in base-36
/// - arrays → `"[h1;h2;...;]"`
/// - objects → `"{kh1:vh1,kh2:vh2,...,}"` with keys sorted and hashed
pub fn struct_hash(val: &Value) -> String {
    match val {
        Value::Null => "N".to_string(),
        Value::Bool(b) => if *b { "T" } else { "F" }.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i < 0 {
                    format!("-{}", radix_36((-i) as u64))
                } else {
                    radix_36(i as u64)
                }
            } else if let Some(u) = n.as_u64() {
                radix_36(u)
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                if f < 0.0 {
                    format!("-{}", radix_36((-f) as u64))
                } else {
                    radix_36(f as u64)
                }
            }
        }
        Value::String(s) => radix_36(hash_str(s) as u64),
        Value::Array(arr) => {
            let mut res = String::from("[");
            for v in arr {
                res.push_str(&struct_hash(v));
                res.push(';');
            }
            res.push(']');
            res
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut res = String::from("{");
            for key in keys {
                res.push_str(&radix_36(hash_str(key) as u64));
                res.push(':');
                res.push_str(&struct_hash(&map[key]));
                res.push(',');
            }
            res.push('}');
            res
        }
    }
}

// ── Structural hash over CRDT nodes ───────────────────────────────────────

/// Structural fingerprint of a CRDT node tree. Produces the same token
/// shapes as [`struct_hash`], so a node and a JSON value that view equal
/// hash equal.
///
/// Missing nodes and `con(undefined)` hash to `"U"`.
pub fn struct_hash_node(node: Option<&Node>, index: &NodeIndex) -> String {
    let Some(node) = node else {
        return "U".to_string();
    };

    match node {
        Node::Con(con) => match &con.val {
            ConValue::Undefined => "U".to_string(),
            ConValue::Bytes(b) => radix_36(hash_bin(b) as u64),
            _ => struct_hash(&con.view()),
        },
        Node::Val(val) => struct_hash_node(index.get(&val.val), index),
        Node::Str(str_node) => radix_36(hash_str(&str_node.view_str()) as u64),
        Node::Bin(bin_node) => radix_36(hash_bin(&bin_node.view_bytes()) as u64),
        Node::Obj(obj_node) => {
            let mut keys: Vec<&String> = obj_node.keys.keys().collect();
            keys.sort();
            let mut res = String::from("{");
            for key in keys {
                let child = index.get(&obj_node.keys[key.as_str()]);
                res.push_str(&radix_36(hash_str(key) as u64));
                res.push(':');
                res.push_str(&struct_hash_node(child, index));
                res.push(',');
            }
            res.push('}');
            res
        }
        Node::Arr(arr_node) => {
            let mut res = String::from("[");
            for chunk in arr_node.rga.iter_live() {
                if let Some(ids) = &chunk.data {
                    for id in ids {
                        res.push_str(&struct_hash_node(index.get(id), index));
                        res.push(';');
                    }
                }
            }
            res.push(']');
            res
        }
        Node::Vec(vec_node) => {
            let mut res = String::from("[");
            for id in vec_node.elements.iter().flatten() {
                res.push_str(&struct_hash_node(index.get(id), index));
                res.push(';');
            }
            res.push(']');
            res
        }
    }
}

/// Base-36 with lowercase letters.
fn radix_36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}
