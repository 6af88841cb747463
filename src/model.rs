//! The in-memory JSON CRDT document.
//!
//! A [`Model`] holds the node index (every known node keyed by its ID), the
//! document root register, and a vector clock tracking which operations have
//! been observed. Patches advance it through [`Model::apply_patch`]; the
//! materialized JSON state comes from [`Model::view`].

use rand::Rng;
use serde_json::Value;

use crate::clock::{session, ClockVector, ORIGIN};
use crate::node::{ArrNode, BinNode, ConNode, Node, NodeIndex, ObjNode, RootNode, StrNode, ValNode, VecNode};
use crate::patch::ops::Op;
use crate::patch::Patch;

#[derive(Debug, Clone)]
pub struct Model {
    /// The document root register.
    pub root: RootNode,
    /// All CRDT nodes keyed by ID.
    pub index: NodeIndex,
    /// Local logical time plus the highest time seen from every peer.
    pub clock: ClockVector,
}

impl Model {
    /// New empty model with the given session ID.
    ///
    /// The clock starts at time 1; time 0 is the reserved origin sentinel.
    pub fn new(sid: u64) -> Self {
        Self {
            root: RootNode::new(),
            index: NodeIndex::default(),
            clock: ClockVector::new(sid, 1),
        }
    }

    /// New empty model with a random session ID.
    pub fn create() -> Self {
        let sid = rand::thread_rng().gen_range(65536..=session::MAX);
        Self::new(sid)
    }

    /// The JSON view of the current document state.
    pub fn view(&self) -> Value {
        self.root.view(&self.index)
    }

    /// Apply every operation in `patch`, in order.
    pub fn apply_patch(&mut self, patch: &Patch) {
        for op in &patch.ops {
            self.apply_op(op);
        }
    }

    /// Apply a single operation.
    ///
    /// All operations are idempotent: re-creating an existing node is a
    /// no-op, and register writes only land when they outrank the current
    /// value.
    pub fn apply_op(&mut self, op: &Op) {
        self.clock.observe(op.id(), op.span());

        match op {
            Op::NewCon { id, val } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Con(ConNode::new(*id, val.clone())));
            }
            Op::NewVal { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Val(ValNode::new(*id)));
            }
            Op::NewObj { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Obj(ObjNode::new(*id)));
            }
            Op::NewVec { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Vec(VecNode::new(*id)));
            }
            Op::NewStr { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Str(StrNode::new(*id)));
            }
            Op::NewBin { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Bin(BinNode::new(*id)));
            }
            Op::NewArr { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| Node::Arr(ArrNode::new(*id)));
            }

            Op::InsVal { obj, val, .. } => {
                if *obj == ORIGIN {
                    self.root.set(*val);
                } else if let Some(Node::Val(node)) = self.index.get_mut(obj) {
                    node.set(*val);
                }
            }

            Op::InsObj { obj, data, .. } => {
                if let Some(Node::Obj(node)) = self.index.get_mut(obj) {
                    for (key, val_id) in data {
                        // A value cannot predate its container.
                        if node.id.time >= val_id.time {
                            continue;
                        }
                        node.put(key, *val_id);
                    }
                }
            }

            Op::InsVec { obj, data, .. } => {
                if let Some(Node::Vec(node)) = self.index.get_mut(obj) {
                    for (idx, val_id) in data {
                        if node.id.time >= val_id.time {
                            continue;
                        }
                        node.put(*idx as usize, *val_id);
                    }
                }
            }

            Op::InsStr {
                id,
                obj,
                after,
                data,
            } => {
                if let Some(Node::Str(node)) = self.index.get_mut(obj) {
                    node.ins(*after, *id, data.clone());
                }
            }

            Op::InsBin {
                id,
                obj,
                after,
                data,
            } => {
                if let Some(Node::Bin(node)) = self.index.get_mut(obj) {
                    node.ins(*after, *id, data.clone());
                }
            }

            Op::InsArr {
                id,
                obj,
                after,
                data,
            } => {
                if let Some(Node::Arr(node)) = self.index.get_mut(obj) {
                    // Slot IDs are offsets from the op ID, so dropping
                    // individual stamps would misalign the rest. An op
                    // referencing anything that predates the container is
                    // rejected whole.
                    if !data.is_empty() && data.iter().all(|stamp| node.id.time < stamp.time) {
                        node.ins(*after, *id, data.clone());
                    }
                }
            }

            Op::Del { obj, what, .. } => match self.index.get_mut(obj) {
                Some(Node::Str(node)) => node.delete(what),
                Some(Node::Bin(node)) => node.delete(what),
                Some(Node::Arr(node)) => node.delete(what),
                _ => {}
            },

            Op::Nop { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Id, IdSpan};
    use crate::patch::ops::ConValue;
    use serde_json::json;

    const SID: u64 = 123456;

    fn id(time: u64) -> Id {
        Id::new(SID, time)
    }

    #[test]
    fn empty_model_view_is_null() {
        assert_eq!(Model::new(SID).view(), json!(null));
    }

    #[test]
    fn con_at_root() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewCon {
            id: id(1),
            val: ConValue::Json(json!(42)),
        });
        model.apply_op(&Op::InsVal {
            id: id(2),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!(42));
    }

    #[test]
    fn str_insert_and_delete() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewStr { id: id(1) });
        model.apply_op(&Op::InsStr {
            id: id(2),
            obj: id(1),
            after: id(1),
            data: "hello".into(),
        });
        model.apply_op(&Op::InsVal {
            id: id(7),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!("hello"));

        // Delete "ell" (ids 3..5).
        model.apply_op(&Op::Del {
            id: id(8),
            obj: id(1),
            what: vec![IdSpan::new(SID, 3, 3)],
        });
        assert_eq!(model.view(), json!("ho"));
    }

    #[test]
    fn obj_with_str_value() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewObj { id: id(1) });
        model.apply_op(&Op::NewStr { id: id(2) });
        model.apply_op(&Op::InsStr {
            id: id(3),
            obj: id(2),
            after: id(2),
            data: "hello".into(),
        });
        model.apply_op(&Op::InsObj {
            id: id(8),
            obj: id(1),
            data: vec![("key".into(), id(2))],
        });
        model.apply_op(&Op::InsVal {
            id: id(9),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!({ "key": "hello" }));
    }

    #[test]
    fn vec_view() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewVec { id: id(1) });
        model.apply_op(&Op::NewCon {
            id: id(2),
            val: ConValue::Json(json!(true)),
        });
        model.apply_op(&Op::NewCon {
            id: id(3),
            val: ConValue::Json(json!(99)),
        });
        model.apply_op(&Op::InsVec {
            id: id(4),
            obj: id(1),
            data: vec![(0, id(2)), (1, id(3))],
        });
        model.apply_op(&Op::InsVal {
            id: id(5),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!([true, 99]));
    }

    #[test]
    fn arr_view() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewArr { id: id(1) });
        model.apply_op(&Op::NewCon {
            id: id(2),
            val: ConValue::Json(json!(10)),
        });
        model.apply_op(&Op::NewCon {
            id: id(3),
            val: ConValue::Json(json!(20)),
        });
        model.apply_op(&Op::InsArr {
            id: id(4),
            obj: id(1),
            after: id(1),
            data: vec![id(2), id(3)],
        });
        model.apply_op(&Op::InsVal {
            id: id(6),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!([10, 20]));
    }

    #[test]
    fn bin_view_is_byte_array() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewBin { id: id(1) });
        model.apply_op(&Op::InsBin {
            id: id(2),
            obj: id(1),
            after: id(1),
            data: vec![0xDE, 0xAD],
        });
        model.apply_op(&Op::InsVal {
            id: id(4),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!([0xDE, 0xAD]));
    }

    #[test]
    fn arr_insert_with_stale_reference_is_rejected_whole() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewArr { id: id(5) });
        model.apply_op(&Op::NewCon {
            id: id(6),
            val: ConValue::Json(json!(1)),
        });
        // id(2) predates the container, so the whole insert is dropped and
        // no slot identifiers shift.
        model.apply_op(&Op::InsArr {
            id: id(7),
            obj: id(5),
            after: id(5),
            data: vec![id(6), id(2)],
        });
        model.apply_op(&Op::InsVal {
            id: id(9),
            obj: ORIGIN,
            val: id(5),
        });
        assert_eq!(model.view(), json!([]));
    }

    #[test]
    fn duplicate_creation_is_idempotent() {
        let mut model = Model::new(SID);
        let op = Op::NewStr { id: id(1) };
        model.apply_op(&op);
        model.apply_op(&op);
        assert_eq!(model.index.len(), 1);
    }

    #[test]
    fn root_register_is_lww() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewCon {
            id: id(1),
            val: ConValue::Json(json!(1)),
        });
        model.apply_op(&Op::NewCon {
            id: id(2),
            val: ConValue::Json(json!(2)),
        });
        model.apply_op(&Op::InsVal {
            id: id(3),
            obj: ORIGIN,
            val: id(2),
        });
        // Older write loses, regardless of arrival order.
        model.apply_op(&Op::InsVal {
            id: id(4),
            obj: ORIGIN,
            val: id(1),
        });
        assert_eq!(model.view(), json!(2));
    }

    #[test]
    fn clock_tracks_applied_ops() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewStr { id: Id::new(777, 10) });
        assert!(model.clock.time > 10);
        assert_eq!(model.clock.peers.get(&777), Some(&10));
    }
}
