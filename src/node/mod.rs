//! JSON CRDT node types.
//!
//! Seven node kinds make up a document tree:
//!
//! | Kind  | Semantics                       |
//! |-------|---------------------------------|
//! | `con` | Immutable constant value        |
//! | `val` | Last-write-wins register        |
//! | `obj` | LWW key→value map               |
//! | `vec` | Fixed-length LWW tuple          |
//! | `str` | RGA string                      |
//! | `bin` | RGA binary blob                 |
//! | `arr` | RGA array of node references    |
//!
//! plus the document root, which is an anonymous LWW register addressed by
//! the origin identifier.

pub mod rga;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::clock::{Id, IdSpan, ORIGIN, UNDEF};
use crate::patch::ops::ConValue;
use rga::Rga;

// ── ConNode ───────────────────────────────────────────────────────────────

/// Immutable constant node.
#[derive(Debug, Clone)]
pub struct ConNode {
    pub id: Id,
    pub val: ConValue,
}

impl ConNode {
    pub fn new(id: Id, val: ConValue) -> Self {
        Self { id, val }
    }

    /// JSON view of the constant. `Undefined` and unresolved references
    /// render as `null`; byte blobs render as arrays of numbers.
    pub fn view(&self) -> Value {
        match &self.val {
            ConValue::Json(v) => v.clone(),
            ConValue::Bytes(b) => {
                Value::Array(b.iter().map(|&byte| Value::Number(byte.into())).collect())
            }
            ConValue::Undefined | ConValue::Ref(_) => Value::Null,
        }
    }
}

// ── ValNode ───────────────────────────────────────────────────────────────

/// Last-write-wins register. Stores the ID of the node that currently wins.
#[derive(Debug, Clone)]
pub struct ValNode {
    pub id: Id,
    pub val: Id,
}

impl ValNode {
    pub fn new(id: Id) -> Self {
        // ORIGIN loses against every user identifier, so the first write
        // always lands.
        Self { id, val: ORIGIN }
    }

    /// Set `new_val` if it outranks the current value. Returns the replaced
    /// ID when the write wins.
    pub fn set(&mut self, new_val: Id) -> Option<Id> {
        if new_val > self.val {
            let old = self.val;
            self.val = new_val;
            Some(old)
        } else {
            None
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Value {
        match index.get(&self.val) {
            Some(node) => node.view(index),
            None => Value::Null,
        }
    }
}

// ── ObjNode ───────────────────────────────────────────────────────────────

/// Last-write-wins map from string keys to node IDs. Keys preserve their
/// insertion order.
#[derive(Debug, Clone)]
pub struct ObjNode {
    pub id: Id,
    pub keys: IndexMap<String, Id>,
}

impl ObjNode {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            keys: IndexMap::new(),
        }
    }

    /// Write `new_id` under `key` if it outranks the existing entry.
    /// Returns the replaced ID when the write wins.
    pub fn put(&mut self, key: &str, new_id: Id) -> Option<Id> {
        match self.keys.get(key).copied() {
            Some(old) if new_id <= old => None,
            old => {
                self.keys.insert(key.to_string(), new_id);
                old
            }
        }
    }

    /// JSON view. Keys whose value is `con(undefined)` are logically deleted
    /// and omitted.
    pub fn view(&self, index: &NodeIndex) -> Value {
        let mut map = serde_json::Map::new();
        for (key, id) in &self.keys {
            match index.get(id) {
                Some(Node::Con(con)) if con.val == ConValue::Undefined => continue,
                Some(node) => {
                    map.insert(key.clone(), node.view(index));
                }
                None => continue,
            }
        }
        Value::Object(map)
    }
}

// ── VecNode ───────────────────────────────────────────────────────────────

/// Fixed-length LWW tuple. Each slot is an independent register.
#[derive(Debug, Clone)]
pub struct VecNode {
    pub id: Id,
    pub elements: Vec<Option<Id>>,
}

impl VecNode {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            elements: Vec::new(),
        }
    }

    /// Write `new_id` into slot `index` if it outranks the existing entry.
    pub fn put(&mut self, index: usize, new_id: Id) -> Option<Id> {
        if index >= self.elements.len() {
            self.elements.resize(index + 1, None);
        }
        match self.elements[index] {
            Some(old) if new_id <= old => None,
            old => {
                self.elements[index] = Some(new_id);
                old
            }
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Value {
        let items: Vec<Value> = self
            .elements
            .iter()
            .map(|e| match e {
                Some(id) => match index.get(id) {
                    Some(node) => node.view(index),
                    None => Value::Null,
                },
                None => Value::Null,
            })
            .collect();
        Value::Array(items)
    }
}

// ── StrNode ───────────────────────────────────────────────────────────────

/// RGA string node.
#[derive(Debug, Clone)]
pub struct StrNode {
    pub id: Id,
    pub rga: Rga<String>,
}

impl StrNode {
    pub fn new(id: Id) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Id, id: Id, data: String) {
        // The node's own ID anchors "insert at the beginning".
        let after = if after == self.id { ORIGIN } else { after };
        let span = data.chars().count() as u64;
        self.rga.insert(after, id, span, data);
    }

    pub fn delete(&mut self, spans: &[IdSpan]) {
        self.rga.delete(spans);
    }

    pub fn view_str(&self) -> String {
        self.rga
            .iter_live()
            .filter_map(|c| c.data.as_deref())
            .collect()
    }

    pub fn view(&self) -> Value {
        Value::String(self.view_str())
    }

    /// Live character count.
    pub fn size(&self) -> usize {
        self.rga
            .iter_live()
            .filter_map(|c| c.data.as_deref())
            .map(|s| s.chars().count())
            .sum()
    }

    /// Identifier of the character at live position `pos`.
    pub fn find(&self, pos: usize) -> Option<Id> {
        let mut count = 0usize;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let len = data.chars().count();
                if pos < count + len {
                    return Some(Id::new(chunk.id.sid, chunk.id.time + (pos - count) as u64));
                }
                count += len;
            }
        }
        None
    }

    /// Identifier spans covering live positions `[pos, pos + len)`.
    pub fn find_interval(&self, pos: usize, len: usize) -> Vec<IdSpan> {
        let mut result = Vec::new();
        let mut count = 0usize;
        let end = pos + len;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let chunk_len = data.chars().count();
                let chunk_start = count;
                let chunk_end = count + chunk_len;
                if chunk_end > pos && chunk_start < end {
                    let local_start = pos.saturating_sub(chunk_start);
                    let local_end = (end - chunk_start).min(chunk_len);
                    result.push(IdSpan::new(
                        chunk.id.sid,
                        chunk.id.time + local_start as u64,
                        (local_end - local_start) as u64,
                    ));
                }
                count = chunk_end;
            }
        }
        result
    }
}

// ── BinNode ───────────────────────────────────────────────────────────────

/// RGA binary node.
#[derive(Debug, Clone)]
pub struct BinNode {
    pub id: Id,
    pub rga: Rga<Vec<u8>>,
}

impl BinNode {
    pub fn new(id: Id) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Id, id: Id, data: Vec<u8>) {
        let after = if after == self.id { ORIGIN } else { after };
        let span = data.len() as u64;
        self.rga.insert(after, id, span, data);
    }

    pub fn delete(&mut self, spans: &[IdSpan]) {
        self.rga.delete(spans);
    }

    pub fn view_bytes(&self) -> Vec<u8> {
        self.rga
            .iter_live()
            .flat_map(|c| c.data.as_deref().unwrap_or(&[]))
            .copied()
            .collect()
    }

    /// JSON view as an array of byte values.
    pub fn view(&self) -> Value {
        Value::Array(
            self.view_bytes()
                .into_iter()
                .map(|b| Value::Number(b.into()))
                .collect(),
        )
    }

    /// Live byte count.
    pub fn size(&self) -> usize {
        self.rga
            .iter_live()
            .filter_map(|c| c.data.as_ref())
            .map(|d| d.len())
            .sum()
    }

    /// Identifier of the byte at live position `pos`.
    pub fn find(&self, pos: usize) -> Option<Id> {
        let mut count = 0usize;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let len = data.len();
                if pos < count + len {
                    return Some(Id::new(chunk.id.sid, chunk.id.time + (pos - count) as u64));
                }
                count += len;
            }
        }
        None
    }

    /// Identifier spans covering live positions `[pos, pos + len)`.
    pub fn find_interval(&self, pos: usize, len: usize) -> Vec<IdSpan> {
        let mut result = Vec::new();
        let mut count = 0usize;
        let end = pos + len;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let chunk_len = data.len();
                let chunk_start = count;
                let chunk_end = count + chunk_len;
                if chunk_end > pos && chunk_start < end {
                    let local_start = pos.saturating_sub(chunk_start);
                    let local_end = (end - chunk_start).min(chunk_len);
                    result.push(IdSpan::new(
                        chunk.id.sid,
                        chunk.id.time + local_start as u64,
                        (local_end - local_start) as u64,
                    ));
                }
                count = chunk_end;
            }
        }
        result
    }
}

// ── ArrNode ───────────────────────────────────────────────────────────────

/// RGA array of node-ID references.
///
/// Each live slot has two identifiers: the slot ID assigned by the RGA when
/// the slot was inserted, and the data ID of the node the slot points to.
#[derive(Debug, Clone)]
pub struct ArrNode {
    pub id: Id,
    pub rga: Rga<Vec<Id>>,
}

impl ArrNode {
    pub fn new(id: Id) -> Self {
        Self { id, rga: Rga::new() }
    }

    pub fn ins(&mut self, after: Id, id: Id, data: Vec<Id>) {
        let after = if after == self.id { ORIGIN } else { after };
        let span = data.len() as u64;
        self.rga.insert(after, id, span, data);
    }

    pub fn delete(&mut self, spans: &[IdSpan]) {
        self.rga.delete(spans);
    }

    /// Live element count.
    pub fn size(&self) -> usize {
        self.rga
            .iter_live()
            .filter_map(|c| c.data.as_ref())
            .map(|v| v.len())
            .sum()
    }

    /// Slot ID of the element at live position `pos`.
    pub fn find(&self, pos: usize) -> Option<Id> {
        let mut count = 0usize;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let len = data.len();
                if pos < count + len {
                    return Some(Id::new(chunk.id.sid, chunk.id.time + (pos - count) as u64));
                }
                count += len;
            }
        }
        None
    }

    /// Data-node ID (what the slot points to) at live position `pos`.
    pub fn get_data_id(&self, pos: usize) -> Option<Id> {
        let mut count = 0usize;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let len = data.len();
                if pos < count + len {
                    return Some(data[pos - count]);
                }
                count += len;
            }
        }
        None
    }

    /// Slot-ID spans covering live positions `[pos, pos + len)`.
    pub fn find_interval(&self, pos: usize, len: usize) -> Vec<IdSpan> {
        let mut result = Vec::new();
        let mut count = 0usize;
        let end = pos + len;
        for chunk in self.rga.iter_live() {
            if let Some(data) = &chunk.data {
                let chunk_len = data.len();
                let chunk_start = count;
                let chunk_end = count + chunk_len;
                if chunk_end > pos && chunk_start < end {
                    let local_start = pos.saturating_sub(chunk_start);
                    let local_end = (end - chunk_start).min(chunk_len);
                    result.push(IdSpan::new(
                        chunk.id.sid,
                        chunk.id.time + local_start as u64,
                        (local_end - local_start) as u64,
                    ));
                }
                count = chunk_end;
            }
        }
        result
    }

    pub fn view(&self, index: &NodeIndex) -> Value {
        let mut items = Vec::new();
        for chunk in self.rga.iter_live() {
            if let Some(ids) = &chunk.data {
                for id in ids {
                    items.push(match index.get(id) {
                        Some(node) => node.view(index),
                        None => Value::Null,
                    });
                }
            }
        }
        Value::Array(items)
    }
}

// ── RootNode ──────────────────────────────────────────────────────────────

/// The document root — an anonymous LWW register.
#[derive(Debug, Clone)]
pub struct RootNode {
    pub val: Id,
}

impl RootNode {
    pub fn new() -> Self {
        Self { val: UNDEF }
    }

    pub fn set(&mut self, new_val: Id) -> Option<Id> {
        if new_val > self.val {
            let old = self.val;
            self.val = new_val;
            Some(old)
        } else {
            None
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Value {
        match index.get(&self.val) {
            Some(node) => node.view(index),
            None => Value::Null,
        }
    }
}

impl Default for RootNode {
    fn default() -> Self {
        Self::new()
    }
}

// ── Node ──────────────────────────────────────────────────────────────────

/// Any CRDT node.
#[derive(Debug, Clone)]
pub enum Node {
    Con(ConNode),
    Val(ValNode),
    Obj(ObjNode),
    Vec(VecNode),
    Str(StrNode),
    Bin(BinNode),
    Arr(ArrNode),
}

impl Node {
    pub fn id(&self) -> Id {
        match self {
            Self::Con(n) => n.id,
            Self::Val(n) => n.id,
            Self::Obj(n) => n.id,
            Self::Vec(n) => n.id,
            Self::Str(n) => n.id,
            Self::Bin(n) => n.id,
            Self::Arr(n) => n.id,
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Value {
        match self {
            Self::Con(n) => n.view(),
            Self::Val(n) => n.view(index),
            Self::Obj(n) => n.view(index),
            Self::Vec(n) => n.view(index),
            Self::Str(n) => n.view(),
            Self::Bin(n) => n.view(),
            Self::Arr(n) => n.view(index),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Con(_) => "con",
            Self::Val(_) => "val",
            Self::Obj(_) => "obj",
            Self::Vec(_) => "vec",
            Self::Str(_) => "str",
            Self::Bin(_) => "bin",
            Self::Arr(_) => "arr",
        }
    }
}

/// Map from node ID to node.
pub type NodeIndex = HashMap<Id, Node>;
