//! [`PatchBuilder`] — accumulates operations for exactly one patch.

use serde_json::Value;

use crate::clock::{Id, IdSpan, LogicalClock, ORIGIN};
use crate::patch::ops::{ConValue, Op};
use crate::patch::Patch;

/// Fluent builder for constructing a [`Patch`] operation by operation.
///
/// Holds a mutable clock snapshot; construct a fresh builder per patch so
/// concurrent builders on the same document never interfere.
pub struct PatchBuilder {
    pub clock: LogicalClock,
    pub patch: Patch,
}

impl PatchBuilder {
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            clock: LogicalClock::new(sid, time),
            patch: Patch::new(),
        }
    }

    /// Returns the accumulated patch and resets the builder.
    pub fn flush(&mut self) -> Patch {
        std::mem::take(&mut self.patch)
    }

    /// Adds a `Nop` if the clock has drifted ahead of the patch's last op.
    fn pad(&mut self) {
        let next_time = self.patch.next_time();
        if next_time == 0 {
            return;
        }
        let drift = self.clock.time.saturating_sub(next_time);
        if drift > 0 {
            let id = Id::new(self.clock.sid, next_time);
            self.patch.ops.push(Op::Nop { id, len: drift });
        }
    }

    fn push(&mut self, op: Op) -> Id {
        let id = op.id();
        self.patch.ops.push(op);
        id
    }

    // ── Creation operations ──────────────────────────────────────────────

    /// Create a `con` constant node.
    pub fn con(&mut self, val: ConValue) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewCon { id, val })
    }

    /// Create the `con(undefined)` tombstone sentinel.
    pub fn con_undefined(&mut self) -> Id {
        self.con(ConValue::Undefined)
    }

    /// Create a `val` LWW register.
    pub fn val(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewVal { id })
    }

    /// Create an `obj` LWW map.
    pub fn obj(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewObj { id })
    }

    /// Create a `vec` LWW tuple.
    pub fn vec(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewVec { id })
    }

    /// Create a `str` RGA string.
    pub fn str_node(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewStr { id })
    }

    /// Create a `bin` RGA blob.
    pub fn bin(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewBin { id })
    }

    /// Create an `arr` RGA array.
    pub fn arr(&mut self) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewArr { id })
    }

    // ── Mutation operations ──────────────────────────────────────────────

    /// Set the document root register.
    pub fn root(&mut self, val: Id) -> Id {
        self.set_val(ORIGIN, val)
    }

    /// Set the value of a `val` register.
    pub fn set_val(&mut self, obj: Id, val: Id) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::InsVal { id, obj, val })
    }

    /// Set key→value pairs in an `obj` map.
    pub fn ins_obj(&mut self, obj: Id, data: Vec<(String, Id)>) -> Id {
        assert!(!data.is_empty(), "EMPTY_TUPLES");
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::InsObj { id, obj, data })
    }

    /// Set index→value pairs in a `vec` tuple.
    pub fn ins_vec(&mut self, obj: Id, data: Vec<(u8, Id)>) -> Id {
        assert!(!data.is_empty(), "EMPTY_TUPLES");
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::InsVec { id, obj, data })
    }

    /// Insert text into a `str` node.
    pub fn ins_str(&mut self, obj: Id, after: Id, data: String) -> Id {
        assert!(!data.is_empty(), "EMPTY_STRING");
        self.pad();
        let id = self.clock.tick(1);
        let op = Op::InsStr {
            id,
            obj,
            after,
            data,
        };
        let span = op.span();
        if span > 1 {
            self.clock.tick(span - 1);
        }
        self.push(op)
    }

    /// Insert bytes into a `bin` node.
    pub fn ins_bin(&mut self, obj: Id, after: Id, data: Vec<u8>) -> Id {
        assert!(!data.is_empty(), "EMPTY_BINARY");
        self.pad();
        let id = self.clock.tick(1);
        let op = Op::InsBin {
            id,
            obj,
            after,
            data,
        };
        let span = op.span();
        if span > 1 {
            self.clock.tick(span - 1);
        }
        self.push(op)
    }

    /// Insert node references into an `arr` node.
    pub fn ins_arr(&mut self, obj: Id, after: Id, data: Vec<Id>) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        let op = Op::InsArr {
            id,
            obj,
            after,
            data,
        };
        let span = op.span();
        if span > 1 {
            self.clock.tick(span - 1);
        }
        self.push(op)
    }

    /// Delete identifier spans from a `str`, `bin`, or `arr` node.
    pub fn del(&mut self, obj: Id, what: Vec<IdSpan>) -> Id {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::Del { id, obj, what })
    }

    // ── Value builders ───────────────────────────────────────────────────

    /// Materialize an arbitrary JSON value as a structured node subtree and
    /// return the ID of its top node.
    ///
    /// Scalars are wrapped in a `val` register around a `con` so that later
    /// edits can replace them in place; strings, arrays and objects become
    /// their mutable node kinds.
    pub fn json(&mut self, value: &Value) -> Id {
        match value {
            Value::String(s) => {
                let str_id = self.str_node();
                if !s.is_empty() {
                    // The node's own ID is the head anchor of its RGA.
                    self.ins_str(str_id, str_id, s.clone());
                }
                str_id
            }
            Value::Array(items) => {
                let arr_id = self.arr();
                if !items.is_empty() {
                    let ids: Vec<Id> = items.iter().map(|item| self.json(item)).collect();
                    self.ins_arr(arr_id, arr_id, ids);
                }
                arr_id
            }
            Value::Object(map) => {
                let obj_id = self.obj();
                let pairs: Vec<(String, Id)> = map
                    .iter()
                    .map(|(key, val)| (key.clone(), self.con_or_json(val)))
                    .collect();
                if !pairs.is_empty() {
                    self.ins_obj(obj_id, pairs);
                }
                obj_id
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {
                let val_id = self.val();
                let con_id = self.con(ConValue::Json(value.clone()));
                self.set_val(val_id, con_id);
                val_id
            }
        }
    }

    /// Like [`json`](Self::json), but scalars become bare `con` nodes.
    pub fn con_or_json(&mut self, value: &Value) -> Id {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => {
                self.con(ConValue::Json(value.clone()))
            }
            _ => self.json(value),
        }
    }
}
