//! The CRDT patch operation set.

use serde_json::Value;

use crate::clock::{Id, IdSpan};

// ── ConValue ──────────────────────────────────────────────────────────────

/// The payload of a `new_con` operation.
///
/// `Undefined` is distinct from JSON `null`: writing `con(undefined)` into an
/// object key is the tombstone convention for logical key removal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConValue {
    /// A reference to another CRDT node.
    Ref(Id),
    /// The deletion/absence sentinel.
    Undefined,
    /// A constant JSON value.
    Json(Value),
    /// A constant binary blob.
    Bytes(Vec<u8>),
}

// ── Op ────────────────────────────────────────────────────────────────────

/// A single CRDT patch operation.
///
/// Each variant carries an `id` identifying the operation in the global
/// logical clock space. Most operations consume one clock tick; `InsStr`,
/// `InsBin` and `InsArr` consume one tick per inserted element, and `Nop`
/// consumes `len` ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Create a constant `con` node.
    NewCon { id: Id, val: ConValue },
    /// Create a `val` LWW register.
    NewVal { id: Id },
    /// Create an `obj` LWW map.
    NewObj { id: Id },
    /// Create a `vec` LWW tuple.
    NewVec { id: Id },
    /// Create a `str` RGA string.
    NewStr { id: Id },
    /// Create a `bin` RGA blob.
    NewBin { id: Id },
    /// Create an `arr` RGA array.
    NewArr { id: Id },

    /// Set the value of a `val` register (or the document root).
    InsVal { id: Id, obj: Id, val: Id },
    /// Set key→value pairs in an `obj` map.
    InsObj {
        id: Id,
        obj: Id,
        data: Vec<(String, Id)>,
    },
    /// Set index→value pairs in a `vec` tuple.
    InsVec { id: Id, obj: Id, data: Vec<(u8, Id)> },
    /// Insert text into a `str` node after the element `after`.
    InsStr {
        id: Id,
        obj: Id,
        after: Id,
        data: String,
    },
    /// Insert bytes into a `bin` node after the element `after`.
    InsBin {
        id: Id,
        obj: Id,
        after: Id,
        data: Vec<u8>,
    },
    /// Insert node references into an `arr` node after the element `after`.
    InsArr {
        id: Id,
        obj: Id,
        after: Id,
        data: Vec<Id>,
    },
    /// Delete identifier spans from a `str`, `bin`, or `arr` node.
    Del { id: Id, obj: Id, what: Vec<IdSpan> },
    /// Skip clock cycles without any CRDT effect.
    Nop { id: Id, len: u64 },
}

impl Op {
    /// The ID (first identifier) of this operation.
    pub fn id(&self) -> Id {
        match self {
            Op::NewCon { id, .. }
            | Op::NewVal { id }
            | Op::NewObj { id }
            | Op::NewVec { id }
            | Op::NewStr { id }
            | Op::NewBin { id }
            | Op::NewArr { id }
            | Op::InsVal { id, .. }
            | Op::InsObj { id, .. }
            | Op::InsVec { id, .. }
            | Op::InsStr { id, .. }
            | Op::InsBin { id, .. }
            | Op::InsArr { id, .. }
            | Op::Del { id, .. }
            | Op::Nop { id, .. } => *id,
        }
    }

    /// Number of logical clock cycles consumed by this operation.
    pub fn span(&self) -> u64 {
        match self {
            Op::InsStr { data, .. } => data.chars().count() as u64,
            Op::InsBin { data, .. } => data.len() as u64,
            Op::InsArr { data, .. } => data.len() as u64,
            Op::Nop { len, .. } => *len,
            _ => 1,
        }
    }

    /// Short mnemonic name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Op::NewCon { .. } => "new_con",
            Op::NewVal { .. } => "new_val",
            Op::NewObj { .. } => "new_obj",
            Op::NewVec { .. } => "new_vec",
            Op::NewStr { .. } => "new_str",
            Op::NewBin { .. } => "new_bin",
            Op::NewArr { .. } => "new_arr",
            Op::InsVal { .. } => "ins_val",
            Op::InsObj { .. } => "ins_obj",
            Op::InsVec { .. } => "ins_vec",
            Op::InsStr { .. } => "ins_str",
            Op::InsBin { .. } => "ins_bin",
            Op::InsArr { .. } => "ins_arr",
            Op::Del { .. } => "del",
            Op::Nop { .. } => "nop",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let span = self.span();
        if span > 1 {
            write!(f, "{} {}!{}", self.name(), self.id(), span)?;
        } else {
            write!(f, "{} {}", self.name(), self.id())?;
        }
        match self {
            Op::InsVal { obj, val, .. } => write!(f, ", obj = {obj}, val = {val}"),
            Op::InsStr {
                obj, after, data, ..
            } => write!(f, ", obj = {obj} {{ {after} ← {data:?} }}"),
            Op::InsBin {
                obj, after, data, ..
            } => write!(f, ", obj = {obj} {{ {after} ← {data:?} }}"),
            Op::Del { obj, what, .. } => {
                let spans: Vec<String> = what.iter().map(|s| s.to_string()).collect();
                write!(f, ", obj = {obj} {{ {} }}", spans.join(", "))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_of_ins_str_counts_chars() {
        let op = Op::InsStr {
            id: Id::new(1, 0),
            obj: Id::new(1, 0),
            after: Id::new(1, 0),
            data: "héllo".into(),
        };
        assert_eq!(op.span(), 5);
    }

    #[test]
    fn span_of_nop() {
        let op = Op::Nop {
            id: Id::new(1, 0),
            len: 7,
        };
        assert_eq!(op.span(), 7);
    }

    #[test]
    fn span_of_creation_op() {
        assert_eq!(Op::NewObj { id: Id::new(1, 0) }.span(), 1);
    }

    #[test]
    fn undefined_is_not_null() {
        assert_ne!(ConValue::Undefined, ConValue::Json(Value::Null));
    }
}
