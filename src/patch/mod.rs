//! [`Patch`] — an ordered batch of CRDT operations.
//!
//! A patch is produced by a [`PatchBuilder`](builder::PatchBuilder) and is
//! never mutated after being flushed; applying it through
//! [`Model::apply_patch`](crate::model::Model::apply_patch) advances a
//! document to a new state.

pub mod builder;
pub mod ops;

use crate::clock::Id;
use ops::Op;

/// An ordered, immutable-once-built batch of CRDT operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    /// The operations, in emission order.
    pub ops: Vec<Op>,
}

impl Patch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Returns `true` if the patch carries no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The ID of the first operation, if any.
    pub fn get_id(&self) -> Option<Id> {
        self.ops.first().map(|op| op.id())
    }

    /// Total logical clock span consumed by all operations.
    pub fn span(&self) -> u64 {
        self.ops.iter().map(|op| op.span()).sum()
    }

    /// The logical time expected for the next operation, or 0 if empty.
    pub fn next_time(&self) -> u64 {
        match self.ops.last() {
            None => 0,
            Some(op) => op.id().time + op.span(),
        }
    }
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get_id() {
            Some(id) => write!(f, "Patch {}!{}", id, self.span())?,
            None => write!(f, "Patch (nil)")?,
        }
        for op in &self.ops {
            write!(f, "\n  {op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Id;

    #[test]
    fn empty_patch() {
        let p = Patch::new();
        assert!(p.is_empty());
        assert_eq!(p.get_id(), None);
        assert_eq!(p.span(), 0);
        assert_eq!(p.next_time(), 0);
    }

    #[test]
    fn next_time_follows_last_op() {
        let mut p = Patch::new();
        p.ops.push(Op::NewStr { id: Id::new(1, 10) });
        p.ops.push(Op::InsStr {
            id: Id::new(1, 11),
            obj: Id::new(1, 10),
            after: Id::new(1, 10),
            data: "hi".into(),
        });
        assert_eq!(p.get_id(), Some(Id::new(1, 10)));
        assert_eq!(p.span(), 3);
        assert_eq!(p.next_time(), 13);
    }
}
