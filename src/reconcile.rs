//! View reconciliation — compute a minimal patch that transforms the live
//! view of a CRDT subtree into a target JSON value.
//!
//! The orchestrator dispatches on node kind. Container routines recurse into
//! children and catch [`Incompatible`] from below, substituting a whole-slot
//! replacement; only the outermost call propagates the error to the caller.
//! Sequences (`arr`) are aligned by fingerprinting children and running the
//! line differ over the fingerprints.

use std::cell::RefCell;

use serde_json::Value;
use thiserror::Error;

use crate::clock::{Id, IdSpan};
use crate::diff::{bytes as bytes_diff, chars as chars_diff, lines as lines_diff};
use crate::hash::{struct_hash, struct_hash_node};
use crate::model::Model;
use crate::node::{ArrNode, BinNode, Node, NodeIndex, ObjNode, StrNode, ValNode, VecNode};
use crate::patch::builder::PatchBuilder;
use crate::patch::ops::ConValue;
use crate::patch::Patch;

/// Structural-incompatibility signal: the two structures cannot be diffed in
/// place at this point, and the nearest container must replace instead of
/// recurse. Expected and frequent; never an invalid state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("incompatible structures: {0}")]
pub struct Incompatible(pub &'static str);

// ── ViewDiff ──────────────────────────────────────────────────────────────

/// One diff computation: accumulates operations into a fresh patch builder
/// while walking the source node against the destination value.
pub struct ViewDiff<'a> {
    pub builder: PatchBuilder,
    index: &'a NodeIndex,
}

impl<'a> ViewDiff<'a> {
    pub fn new(sid: u64, time: u64, index: &'a NodeIndex) -> Self {
        Self {
            builder: PatchBuilder::new(sid, time),
            index,
        }
    }

    /// Compute the patch that makes `src` view-equal to `dst`.
    ///
    /// Consumes the differ: the builder accumulates state for exactly one
    /// diff call. An error means even the root pair is incompatible and the
    /// caller must replace the whole node.
    pub fn diff(mut self, src: &Node, dst: &Value) -> Result<Patch, Incompatible> {
        self.diff_any(src, dst)?;
        Ok(self.builder.flush())
    }

    // ── Str ──────────────────────────────────────────────────────────────

    fn diff_str(&mut self, src: &StrNode, dst: &str) -> Result<(), Incompatible> {
        let view = src.view_str();
        if view == dst {
            return Ok(());
        }

        let src_id = src.id;
        let script = chars_diff::diff(&view, dst);

        enum StrEdit {
            Ins(Id, String),
            Del(Vec<IdSpan>),
        }
        let edits: RefCell<Vec<StrEdit>> = RefCell::new(Vec::new());

        chars_diff::apply(
            &script,
            view.chars().count(),
            |pos, text| {
                // Position 0 anchors on the node's own ID (the RGA head).
                let after = if pos == 0 {
                    src_id
                } else {
                    src.find(pos - 1).unwrap_or(src_id)
                };
                edits.borrow_mut().push(StrEdit::Ins(after, text.to_string()));
            },
            |pos, len, _| {
                let spans = src.find_interval(pos, len);
                if !spans.is_empty() {
                    edits.borrow_mut().push(StrEdit::Del(spans));
                }
            },
        );

        for edit in edits.into_inner() {
            match edit {
                StrEdit::Ins(after, text) => {
                    self.builder.ins_str(src_id, after, text);
                }
                StrEdit::Del(spans) => {
                    self.builder.del(src_id, spans);
                }
            }
        }
        Ok(())
    }

    // ── Bin ──────────────────────────────────────────────────────────────

    fn diff_bin(&mut self, src: &BinNode, dst: &[u8]) -> Result<(), Incompatible> {
        let view = src.view_bytes();
        if view == dst {
            return Ok(());
        }

        let src_id = src.id;
        let script = bytes_diff::diff(&view, dst);

        enum BinEdit {
            Ins(Id, Vec<u8>),
            Del(Vec<IdSpan>),
        }
        let edits: RefCell<Vec<BinEdit>> = RefCell::new(Vec::new());

        bytes_diff::apply(
            &script,
            view.len(),
            |pos, data| {
                let after = if pos == 0 {
                    src_id
                } else {
                    src.find(pos - 1).unwrap_or(src_id)
                };
                edits.borrow_mut().push(BinEdit::Ins(after, data));
            },
            |pos, len, _| {
                let spans = src.find_interval(pos, len);
                if !spans.is_empty() {
                    edits.borrow_mut().push(BinEdit::Del(spans));
                }
            },
        );

        for edit in edits.into_inner() {
            match edit {
                BinEdit::Ins(after, data) => {
                    self.builder.ins_bin(src_id, after, data);
                }
                BinEdit::Del(spans) => {
                    self.builder.del(src_id, spans);
                }
            }
        }
        Ok(())
    }

    // ── Arr ──────────────────────────────────────────────────────────────

    fn diff_arr(&mut self, src: &ArrNode, dst: &[Value]) -> Result<(), Incompatible> {
        let src_size = src.size();
        if src_size == 0 {
            if dst.is_empty() {
                return Ok(());
            }
            // Chain each insert after the previous one.
            let mut after = src.id;
            for view in dst {
                let view_id = self.builder.json(view);
                after = self.builder.ins_arr(src.id, after, vec![view_id]);
            }
            return Ok(());
        } else if dst.is_empty() {
            let mut spans: Vec<IdSpan> = Vec::new();
            for chunk in src.rga.iter_live() {
                spans.push(IdSpan::new(chunk.id.sid, chunk.id.time, chunk.span));
            }
            if !spans.is_empty() {
                self.builder.del(src.id, spans);
            }
            return Ok(());
        }

        // Align by structural fingerprint: equal fingerprints mean "same
        // element", so the line differ finds moves, inserts, and deletes.
        let mut src_lines: Vec<String> = Vec::with_capacity(src_size);
        for pos in 0..src_size {
            let child = src.get_data_id(pos).and_then(|id| self.index.get(&id));
            src_lines.push(struct_hash_node(child, self.index));
        }
        let dst_lines: Vec<String> = dst.iter().map(struct_hash).collect();

        let src_refs: Vec<&str> = src_lines.iter().map(String::as_str).collect();
        let dst_refs: Vec<&str> = dst_lines.iter().map(String::as_str).collect();
        let line_script = lines_diff::diff(&src_refs, &dst_refs);
        if line_script.is_empty() {
            return Ok(());
        }

        let mut inserts: Vec<(Id, Value)> = Vec::new();
        let mut deletes: Vec<IdSpan> = Vec::new();

        // Back-to-front walk: source indices stay valid because edits at
        // higher positions cannot shift lower ones.
        for (kind, pos_src, pos_dst) in line_script.iter().rev().copied() {
            match kind {
                lines_diff::LineKind::Eql => {}
                lines_diff::LineKind::Del => {
                    let span = src.find_interval(pos_src as usize, 1);
                    if span.is_empty() {
                        return Err(Incompatible("ARR_DELETE_INTERVAL_MISSING"));
                    }
                    deletes.extend(span);
                }
                lines_diff::LineKind::Ins => {
                    let after = if pos_src >= 0 {
                        src.find(pos_src as usize)
                            .ok_or(Incompatible("ARR_INSERT_ANCHOR_MISSING"))?
                    } else {
                        src.id
                    };
                    inserts.push((after, dst[pos_dst as usize].clone()));
                }
                lines_diff::LineKind::Mix => {
                    let view = &dst[pos_dst as usize];
                    let child_id = src
                        .get_data_id(pos_src as usize)
                        .ok_or(Incompatible("ARR_CHILD_MISSING"))?;
                    let child = self
                        .index
                        .get(&child_id)
                        .cloned()
                        .ok_or(Incompatible("ARR_CHILD_UNRESOLVED"))?;
                    if self.diff_any(&child, view).is_err() {
                        // Incompatible in place: delete the old slot and
                        // insert the new value just before it.
                        let span = src.find_interval(pos_src as usize, 1);
                        if span.is_empty() {
                            return Err(Incompatible("ARR_REPLACE_INTERVAL_MISSING"));
                        }
                        deletes.extend(span);
                        let after = if pos_src > 0 {
                            src.find((pos_src - 1) as usize)
                                .ok_or(Incompatible("ARR_REPLACE_ANCHOR_MISSING"))?
                        } else {
                            src.id
                        };
                        inserts.push((after, view.clone()));
                    }
                }
            }
        }

        for (after, view) in inserts {
            let view_id = self.builder.json(&view);
            self.builder.ins_arr(src.id, after, vec![view_id]);
        }
        if !deletes.is_empty() {
            self.builder.del(src.id, deletes);
        }
        Ok(())
    }

    // ── Obj ──────────────────────────────────────────────────────────────

    fn diff_obj(
        &mut self,
        src: &ObjNode,
        dst: &serde_json::Map<String, Value>,
    ) -> Result<(), Incompatible> {
        let mut upserts: Vec<(String, Id)> = Vec::new();

        // Keys visible in the source but absent from the destination get an
        // explicit removal sentinel. Already-tombstoned keys are skipped.
        for (key, &val_id) in &src.keys {
            let visible = match self.index.get(&val_id) {
                Some(Node::Con(con)) if con.val == ConValue::Undefined => false,
                Some(_) => true,
                None => false,
            };
            if visible && !dst.contains_key(key) {
                let undef_id = self.builder.con_undefined();
                upserts.push((key.clone(), undef_id));
            }
        }

        for (key, dst_val) in dst {
            let mut src_was_con = false;
            if let Some(&val_id) = src.keys.get(key) {
                if let Some(src_node) = self.index.get(&val_id) {
                    src_was_con = matches!(src_node, Node::Con(_));
                    let src_node = src_node.clone();
                    if self.diff_any(&src_node, dst_val).is_ok() {
                        continue;
                    }
                }
            }
            // A con slot stays a con; anything else gets a structured
            // subtree for scalars-in-con, mutable nodes otherwise.
            let new_id = if src_was_con {
                self.builder.con(ConValue::Json(dst_val.clone()))
            } else {
                self.builder.con_or_json(dst_val)
            };
            upserts.push((key.clone(), new_id));
        }

        if !upserts.is_empty() {
            self.builder.ins_obj(src.id, upserts);
        }
        Ok(())
    }

    // ── Val ──────────────────────────────────────────────────────────────

    fn diff_val(&mut self, src: &ValNode, dst: &Value) -> Result<(), Incompatible> {
        if let Some(child) = self.index.get(&src.val) {
            let child = child.clone();
            if self.diff_any(&child, dst).is_ok() {
                return Ok(());
            }
        }
        let new_id = self.builder.con_or_json(dst);
        self.builder.set_val(src.id, new_id);
        Ok(())
    }

    // ── Vec ──────────────────────────────────────────────────────────────

    fn diff_vec(&mut self, src: &VecNode, dst: &[Value]) -> Result<(), Incompatible> {
        let elements = &src.elements;
        let src_len = elements.len();
        let dst_len = dst.len();

        // Truncation guard: if any slot past the destination length is
        // already deleted, abort the whole vec diff without emitting
        // anything. Documented early return, not an error.
        for elem in elements.iter().skip(dst_len) {
            let already_deleted = match elem {
                None => true,
                Some(id) => match self.index.get(id) {
                    None => true,
                    Some(Node::Con(con)) => con.val == ConValue::Undefined,
                    Some(_) => false,
                },
            };
            if already_deleted {
                return Ok(());
            }
        }

        let mut edits: Vec<(u8, Id)> = Vec::new();

        for i in dst_len..src_len {
            if i > u8::MAX as usize {
                break;
            }
            edits.push((i as u8, self.builder.con_undefined()));
        }

        for (i, value) in dst.iter().enumerate().take(src_len.min(dst_len)) {
            if i > u8::MAX as usize {
                break;
            }
            let child = elements[i].and_then(|id| self.index.get(&id).cloned());
            if let Some(child) = child {
                if self.diff_any(&child, value).is_ok() {
                    continue;
                }
                if matches!(child, Node::Con(_)) {
                    edits.push((i as u8, self.builder.con(ConValue::Json(value.clone()))));
                    continue;
                }
            }
            edits.push((i as u8, self.builder.con_or_json(value)));
        }

        for (i, value) in dst.iter().enumerate().skip(src_len) {
            if i > u8::MAX as usize {
                break;
            }
            edits.push((i as u8, self.builder.con_or_json(value)));
        }

        if !edits.is_empty() {
            self.builder.ins_vec(src.id, edits);
        }
        Ok(())
    }

    // ── Dispatch ─────────────────────────────────────────────────────────

    fn diff_any(&mut self, src: &Node, dst: &Value) -> Result<(), Incompatible> {
        match src {
            Node::Con(node) => {
                if con_matches(&node.val, dst) {
                    Ok(())
                } else {
                    Err(Incompatible("CON_MISMATCH"))
                }
            }
            Node::Val(node) => {
                let node = node.clone();
                self.diff_val(&node, dst)
            }
            Node::Str(node) => match dst {
                Value::String(s) => {
                    let node = node.clone();
                    self.diff_str(&node, s)
                }
                _ => Err(Incompatible("STR_TYPE_MISMATCH")),
            },
            Node::Bin(node) => match dst {
                Value::Array(arr) => match as_bytes(arr) {
                    Some(bytes) => {
                        let node = node.clone();
                        self.diff_bin(&node, &bytes)
                    }
                    None => Err(Incompatible("BIN_TYPE_MISMATCH")),
                },
                _ => Err(Incompatible("BIN_TYPE_MISMATCH")),
            },
            Node::Obj(node) => match dst {
                Value::Object(map) => {
                    let node = node.clone();
                    self.diff_obj(&node, map)
                }
                _ => Err(Incompatible("OBJ_TYPE_MISMATCH")),
            },
            Node::Arr(node) => match dst {
                Value::Array(arr) => {
                    let node = node.clone();
                    self.diff_arr(&node, arr)
                }
                _ => Err(Incompatible("ARR_TYPE_MISMATCH")),
            },
            Node::Vec(node) => match dst {
                Value::Array(arr) => {
                    let node = node.clone();
                    self.diff_vec(&node, arr)
                }
                _ => Err(Incompatible("VEC_TYPE_MISMATCH")),
            },
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Content equality between a constant and a destination value. Undefined
/// tombstones never match anything, including JSON `null`.
fn con_matches(val: &ConValue, dst: &Value) -> bool {
    match val {
        ConValue::Ref(_) => false,
        ConValue::Undefined => false,
        ConValue::Json(v) => v == dst,
        ConValue::Bytes(b) => match dst {
            Value::Array(arr) => {
                arr.len() == b.len()
                    && arr
                        .iter()
                        .zip(b.iter())
                        .all(|(v, &byte)| v.as_u64() == Some(byte as u64))
            }
            _ => false,
        },
    }
}

fn as_bytes(arr: &[Value]) -> Option<Vec<u8>> {
    arr.iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Diff `src` against `dst` and return the patch, or `None` when no
/// operations are needed.
pub fn diff_node(
    src: &Node,
    index: &NodeIndex,
    sid: u64,
    time: u64,
    dst: &Value,
) -> Result<Option<Patch>, Incompatible> {
    let patch = ViewDiff::new(sid, time, index).diff(src, dst)?;
    Ok(if patch.is_empty() { None } else { Some(patch) })
}

/// Reconcile a whole document to `dst`: diff from the root, apply the
/// resulting patch, and return it. When the root is missing or wholly
/// incompatible, the root register is replaced with a freshly built
/// subtree.
///
/// Returns `None` when the document already matches `dst`.
pub fn merge(model: &mut Model, dst: &Value) -> Option<Patch> {
    let root_node = model.index.get(&model.root.val).cloned();
    let patch = match root_node {
        Some(node) => {
            let differ = ViewDiff::new(model.clock.sid, model.clock.time, &model.index);
            match differ.diff(&node, dst) {
                Ok(patch) => patch,
                Err(_) => replace_root(model, dst),
            }
        }
        None => replace_root(model, dst),
    };
    if patch.is_empty() {
        return None;
    }
    model.apply_patch(&patch);
    Some(patch)
}

fn replace_root(model: &Model, dst: &Value) -> Patch {
    let mut builder = PatchBuilder::new(model.clock.sid, model.clock.time);
    let root_id = builder.json(dst);
    builder.root(root_id);
    builder.flush()
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ORIGIN;
    use crate::patch::ops::Op;
    use serde_json::json;

    const SID: u64 = 123456;

    fn id(time: u64) -> Id {
        Id::new(SID, time)
    }

    fn model_with_str(s: &str) -> (Model, Id) {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewStr { id: id(1) });
        if !s.is_empty() {
            model.apply_op(&Op::InsStr {
                id: id(2),
                obj: id(1),
                after: id(1),
                data: s.to_string(),
            });
        }
        let next = 2 + s.chars().count() as u64;
        model.apply_op(&Op::InsVal {
            id: id(next),
            obj: ORIGIN,
            val: id(1),
        });
        (model, id(1))
    }

    fn diff_root(model: &Model, dst: &Value) -> Result<Option<Patch>, Incompatible> {
        let node = model.index.get(&model.root.val).unwrap().clone();
        diff_node(&node, &model.index, model.clock.sid, model.clock.time, dst)
    }

    #[test]
    fn str_no_change_is_empty() {
        let (model, _) = model_with_str("hello");
        assert!(diff_root(&model, &json!("hello")).unwrap().is_none());
    }

    #[test]
    fn str_change_applies() {
        let (mut model, _) = model_with_str("hello");
        let patch = diff_root(&model, &json!("world")).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!("world"));
    }

    #[test]
    fn str_double_space_collapse_is_single_del() {
        let (mut model, _) = model_with_str("hello  world");
        let patch = diff_root(&model, &json!("hello world")).unwrap().unwrap();
        assert_eq!(patch.ops.len(), 1);
        assert!(matches!(patch.ops[0], Op::Del { .. }));
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!("hello world"));
    }

    #[test]
    fn str_prepend_anchors_on_head() {
        let (mut model, _) = model_with_str("world");
        let patch = diff_root(&model, &json!("hello world")).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!("hello world"));
    }

    #[test]
    fn empty_str_insert() {
        let (mut model, _) = model_with_str("");
        let patch = diff_root(&model, &json!("hi")).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!("hi"));
    }

    fn model_with_obj(pairs: &[(&str, Value)]) -> Model {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewObj { id: id(1) });
        let mut time = 2;
        let mut data = Vec::new();
        for (key, value) in pairs {
            match value {
                Value::String(s) => {
                    model.apply_op(&Op::NewStr { id: id(time) });
                    let str_id = id(time);
                    time += 1;
                    if !s.is_empty() {
                        model.apply_op(&Op::InsStr {
                            id: id(time),
                            obj: str_id,
                            after: str_id,
                            data: s.clone(),
                        });
                        time += s.chars().count() as u64;
                    }
                    data.push((key.to_string(), str_id));
                }
                _ => {
                    model.apply_op(&Op::NewCon {
                        id: id(time),
                        val: ConValue::Json(value.clone()),
                    });
                    data.push((key.to_string(), id(time)));
                    time += 1;
                }
            }
        }
        if !data.is_empty() {
            model.apply_op(&Op::InsObj {
                id: id(time),
                obj: id(1),
                data,
            });
            time += 1;
        }
        model.apply_op(&Op::InsVal {
            id: id(time),
            obj: ORIGIN,
            val: id(1),
        });
        model
    }

    #[test]
    fn obj_add_key() {
        let mut model = model_with_obj(&[("a", json!(1))]);
        let patch = diff_root(&model, &json!({"a": 1, "b": 2})).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn obj_removed_key_gets_tombstone() {
        let mut model = model_with_obj(&[("foo", json!("abc")), ("bar", json!("xyz"))]);
        let patch = diff_root(&model, &json!({"foo": "abc"})).unwrap().unwrap();
        // One con(undefined) plus one ins_obj staging it.
        assert_eq!(patch.ops.len(), 2);
        assert!(matches!(
            patch.ops[0],
            Op::NewCon {
                val: ConValue::Undefined,
                ..
            }
        ));
        match &patch.ops[1] {
            Op::InsObj { data, .. } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].0, "bar");
            }
            other => panic!("expected ins_obj, got {other:?}"),
        }
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!({"foo": "abc"}));
    }

    #[test]
    fn obj_con_slot_stays_con() {
        let mut model = model_with_obj(&[("a", json!(1))]);
        let patch = diff_root(&model, &json!({"a": "hello"})).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!({"a": "hello"}));

        let a_id = match model.index.get(&id(1)) {
            Some(Node::Obj(obj)) => obj.keys["a"],
            _ => panic!("root should be obj"),
        };
        assert!(matches!(model.index.get(&a_id), Some(Node::Con(_))));
    }

    #[test]
    fn obj_str_slot_replacement_builds_str_node() {
        let mut model = model_with_obj(&[("a", json!("text"))]);
        let patch = diff_root(&model, &json!({"a": [1, 2]})).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!({"a": [1, 2]}));

        let a_id = match model.index.get(&id(1)) {
            Some(Node::Obj(obj)) => obj.keys["a"],
            _ => panic!("root should be obj"),
        };
        assert!(matches!(model.index.get(&a_id), Some(Node::Arr(_))));
    }

    fn model_with_arr(items: &[Value]) -> Model {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewArr { id: id(1) });
        let mut time = 2;
        let mut elems = Vec::new();
        for value in items {
            model.apply_op(&Op::NewCon {
                id: id(time),
                val: ConValue::Json(value.clone()),
            });
            elems.push(id(time));
            time += 1;
        }
        if !elems.is_empty() {
            model.apply_op(&Op::InsArr {
                id: id(time),
                obj: id(1),
                after: id(1),
                data: elems,
            });
            time += items.len() as u64;
        }
        model.apply_op(&Op::InsVal {
            id: id(time),
            obj: ORIGIN,
            val: id(1),
        });
        model
    }

    #[test]
    fn arr_grow_from_one() {
        let mut model = model_with_arr(&[json!(1)]);
        let patch = diff_root(&model, &json!([10, 20])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([10, 20]));
    }

    #[test]
    fn arr_delete_middle_element_is_one_del() {
        let mut model = model_with_arr(&[json!(1), json!(2), json!(3)]);
        let patch = diff_root(&model, &json!([1, 3])).unwrap().unwrap();
        // The unchanged neighbors are untouched.
        assert_eq!(patch.ops.len(), 1);
        assert!(matches!(patch.ops[0], Op::Del { .. }));
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([1, 3]));
    }

    #[test]
    fn arr_swap_is_not_full_replace() {
        let mut model = model_with_arr(&[json!("aaa"), json!("bbb")]);
        let patch = diff_root(&model, &json!(["bbb", "aaa"])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!(["bbb", "aaa"]));
        // One element moves: one del plus one insert subtree, never a
        // rebuild of both elements.
        let dels = patch.ops.iter().filter(|op| matches!(op, Op::Del { .. })).count();
        assert_eq!(dels, 1);
    }

    #[test]
    fn arr_inserted_primitives_are_wrapped_in_val() {
        let mut model = model_with_arr(&[]);
        let patch = diff_root(&model, &json!([42])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([42]));

        let elem_id = match model.index.get(&id(1)) {
            Some(Node::Arr(arr)) => arr.get_data_id(0).unwrap(),
            _ => panic!("root should be arr"),
        };
        assert!(matches!(model.index.get(&elem_id), Some(Node::Val(_))));
    }

    #[test]
    fn arr_clear_deletes_all_spans() {
        let mut model = model_with_arr(&[json!(1), json!(2)]);
        let patch = diff_root(&model, &json!([])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([]));
    }

    #[test]
    fn con_equal_bytes_short_circuit() {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewCon {
            id: id(1),
            val: ConValue::Bytes(vec![1, 2, 3]),
        });
        model.apply_op(&Op::InsVal {
            id: id(2),
            obj: ORIGIN,
            val: id(1),
        });
        assert!(diff_root(&model, &json!([1, 2, 3])).unwrap().is_none());
        // Differing contents widen to a replacement error at the root.
        assert!(diff_root(&model, &json!([1, 2, 4])).is_err());
    }

    #[test]
    fn top_level_type_mismatch_is_error() {
        let (model, _) = model_with_str("hello");
        assert_eq!(
            diff_root(&model, &json!(42)),
            Err(Incompatible("STR_TYPE_MISMATCH"))
        );
    }

    fn model_with_vec(items: &[Value]) -> Model {
        let mut model = Model::new(SID);
        model.apply_op(&Op::NewVec { id: id(1) });
        let mut time = 2;
        let mut data = Vec::new();
        for (i, value) in items.iter().enumerate() {
            model.apply_op(&Op::NewCon {
                id: id(time),
                val: ConValue::Json(value.clone()),
            });
            data.push((i as u8, id(time)));
            time += 1;
        }
        if !data.is_empty() {
            model.apply_op(&Op::InsVec {
                id: id(time),
                obj: id(1),
                data,
            });
            time += 1;
        }
        model.apply_op(&Op::InsVal {
            id: id(time),
            obj: ORIGIN,
            val: id(1),
        });
        model
    }

    #[test]
    fn vec_truncation_tombstones_tail() {
        let mut model = model_with_vec(&[json!(1), json!(2), json!(3)]);
        let patch = diff_root(&model, &json!([1, 2])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([1, 2, null]));
    }

    #[test]
    fn vec_truncation_aborts_when_tail_already_deleted() {
        let mut model = model_with_vec(&[json!(1), json!(2), json!(3)]);
        // Tombstone the last slot first.
        let patch = diff_root(&model, &json!([1, 2])).unwrap().unwrap();
        model.apply_patch(&patch);
        // Shrinking further hits the already-deleted slot: nothing emitted.
        assert!(diff_root(&model, &json!([1])).unwrap().is_none());
    }

    #[test]
    fn vec_in_range_replace() {
        let mut model = model_with_vec(&[json!(1), json!(2)]);
        let patch = diff_root(&model, &json!([1, "two"])).unwrap().unwrap();
        model.apply_patch(&patch);
        assert_eq!(model.view(), json!([1, "two"]));
    }

    #[test]
    fn merge_applies_and_returns_patch() {
        let (mut model, _) = model_with_str("hello");
        let patch = merge(&mut model, &json!("hello!")).unwrap();
        assert!(!patch.is_empty());
        assert_eq!(model.view(), json!("hello!"));
        // Idempotent: nothing left to do.
        assert!(merge(&mut model, &json!("hello!")).is_none());
    }

    #[test]
    fn merge_replaces_incompatible_root() {
        let (mut model, _) = model_with_str("hello");
        let patch = merge(&mut model, &json!({"k": 1})).unwrap();
        assert!(!patch.is_empty());
        assert_eq!(model.view(), json!({"k": 1}));
    }

    #[test]
    fn merge_on_empty_document() {
        let mut model = Model::new(SID);
        merge(&mut model, &json!({"a": [1, "x"]})).unwrap();
        assert_eq!(model.view(), json!({"a": [1, "x"]}));
    }
}
