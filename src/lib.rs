//! json-crdt-reconcile — minimal-patch reconciliation of a JSON CRDT
//! document against a target JSON value.
//!
//! The crate models a JSON CRDT document (`con`, `val`, `obj`, `vec`, `str`,
//! `bin`, `arr` nodes under an anonymous root register), a patch protocol
//! with a builder, structural hashing for fingerprinting subtrees, and
//! character/binary/line differs. [`reconcile`] ties them together: given a
//! live document and a destination JSON value it computes the smallest patch
//! it can that makes the document's view equal to the destination.
//!
//! ```
//! use json_crdt_reconcile::{reconcile, Model};
//! use serde_json::json;
//!
//! let mut doc = Model::new(123456);
//! reconcile::merge(&mut doc, &json!({"greeting": "hello"}));
//! assert_eq!(doc.view(), json!({"greeting": "hello"}));
//!
//! // Only the changed characters travel in the second patch.
//! let patch = reconcile::merge(&mut doc, &json!({"greeting": "hello!"}));
//! assert_eq!(doc.view(), json!({"greeting": "hello!"}));
//! assert!(patch.is_some());
//! ```

pub mod clock;
pub mod diff;
pub mod hash;
pub mod model;
pub mod node;
pub mod patch;
pub mod reconcile;

pub use clock::{Id, IdSpan};
pub use model::Model;
pub use patch::builder::PatchBuilder;
pub use patch::Patch;
pub use reconcile::{merge, Incompatible, ViewDiff};
