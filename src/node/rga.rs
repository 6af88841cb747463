//! A linear-scan RGA (Replicated Growable Array) sequence.
//!
//! Chunks are stored in a flat `Vec` and scanned on every operation. That is
//! O(n) per edit rather than the O(log n) a balanced tree would give, but the
//! diff engine only touches documents it has fully materialized, so the
//! simpler structure wins.

use crate::clock::{Id, IdSpan, ORIGIN};

// ── SplitData ─────────────────────────────────────────────────────────────

/// Chunk payloads that can be cut at a logical item offset.
///
/// Partial-chunk deletion needs this: when a deletion span covers only part
/// of a chunk, the chunk is split first so only the covered items become a
/// tombstone.
pub trait SplitData: Clone {
    /// Cut `self` at item offset `at`. Leaves items `[0, at)` in `self` and
    /// returns items `[at, len)`.
    fn split_at_offset(&mut self, at: usize) -> Self;
}

impl SplitData for String {
    fn split_at_offset(&mut self, at: usize) -> Self {
        let byte_pos = self
            .char_indices()
            .nth(at)
            .map(|(i, _)| i)
            .unwrap_or(self.len());
        self.split_off(byte_pos)
    }
}

impl SplitData for Vec<u8> {
    fn split_at_offset(&mut self, at: usize) -> Self {
        self.split_off(at)
    }
}

impl SplitData for Vec<Id> {
    fn split_at_offset(&mut self, at: usize) -> Self {
        self.split_off(at)
    }
}

// ── Chunk ─────────────────────────────────────────────────────────────────

/// A contiguous run of items inserted by one operation.
///
/// Items in a chunk carry consecutive identifiers `id, id+1, id+2, ...`.
#[derive(Debug, Clone)]
pub struct Chunk<T: Clone> {
    /// Identifier of the first item.
    pub id: Id,
    /// Logical item count, tombstoned items included.
    pub span: u64,
    /// Whether every item in the chunk has been deleted.
    pub deleted: bool,
    /// The payload; `None` once the chunk is a tombstone.
    pub data: Option<T>,
}

impl<T: Clone> Chunk<T> {
    pub fn new(id: Id, span: u64, data: T) -> Self {
        Self {
            id,
            span,
            deleted: false,
            data: Some(data),
        }
    }
}

// ── Rga ───────────────────────────────────────────────────────────────────

/// The RGA sequence itself.
#[derive(Debug, Clone, Default)]
pub struct Rga<T: Clone> {
    pub chunks: Vec<Chunk<T>>,
}

impl<T: Clone + SplitData> Rga<T> {
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Index of the chunk whose identifier range covers `id`, if any.
    pub fn find_by_id(&self, id: Id) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| c.id.sid == id.sid && c.id.time <= id.time && id.time < c.id.time + c.span)
    }

    /// Insert `data` (stamped `id`, `span` items) after the item `after`.
    /// `after == ORIGIN` means insert at the beginning.
    ///
    /// If `after` sits in the middle of a chunk, the chunk is split so the
    /// new items land directly after the targeted item. Concurrent inserts
    /// at the same anchor are ordered so higher identifiers go left.
    pub fn insert(&mut self, after: Id, id: Id, span: u64, data: T) {
        let insert_pos = if after == ORIGIN {
            0
        } else {
            match self.find_by_id(after) {
                Some(idx) => {
                    let chunk_last_time = self.chunks[idx].id.time + self.chunks[idx].span - 1;
                    if after.time < chunk_last_time {
                        let offset = (after.time - self.chunks[idx].id.time + 1) as usize;
                        self.split_chunk_at(idx, offset);
                    }
                    idx + 1
                }
                None => self.chunks.len(),
            }
        };

        let mut pos = insert_pos;
        while pos < self.chunks.len() {
            if self.chunks[pos].id > id {
                pos += 1;
            } else {
                break;
            }
        }

        self.chunks.insert(pos, Chunk::new(id, span, data));
    }

    /// Split chunk `chunk_idx` at item offset `at_offset`. Afterwards the
    /// left half holds items `[0, at_offset)` and a new right chunk holds
    /// the rest. No-op at either boundary.
    fn split_chunk_at(&mut self, chunk_idx: usize, at_offset: usize) {
        if at_offset == 0 {
            return;
        }
        let span = self.chunks[chunk_idx].span;
        if at_offset as u64 >= span {
            return;
        }

        let chunk = &mut self.chunks[chunk_idx];
        let id = chunk.id;
        let deleted = chunk.deleted;

        // Tombstones stay `None` on both halves.
        let right_data = chunk.data.as_mut().map(|d| d.split_at_offset(at_offset));

        let right = Chunk {
            id: Id::new(id.sid, id.time + at_offset as u64),
            span: span - at_offset as u64,
            deleted,
            data: right_data,
        };

        self.chunks[chunk_idx].span = at_offset as u64;
        self.chunks.insert(chunk_idx + 1, right);
    }

    /// Tombstone every item covered by the given identifier spans, splitting
    /// partially-covered chunks at the span boundaries.
    pub fn delete(&mut self, spans: &[IdSpan]) {
        for span in spans {
            let del_start = span.time;
            let del_end = span.time + span.len;

            let mut i = 0;
            while i < self.chunks.len() {
                let chunk = &self.chunks[i];

                if chunk.id.sid != span.sid {
                    i += 1;
                    continue;
                }

                let chunk_start = chunk.id.time;
                let chunk_end = chunk.id.time + chunk.span;

                if chunk_start >= del_end || chunk_end <= del_start {
                    i += 1;
                    continue;
                }

                let overlap_start = del_start.max(chunk_start);
                let overlap_end = del_end.min(chunk_end);

                // Carve off the untouched prefix, then the untouched suffix,
                // so chunks[i] covers exactly the overlap.
                if overlap_start > chunk_start {
                    self.split_chunk_at(i, (overlap_start - chunk_start) as usize);
                    i += 1;
                }

                let chunk_end = self.chunks[i].id.time + self.chunks[i].span;
                if overlap_end < chunk_end {
                    let keep = (overlap_end - self.chunks[i].id.time) as usize;
                    self.split_chunk_at(i, keep);
                }

                let chunk = &mut self.chunks[i];
                chunk.deleted = true;
                chunk.data = None;

                i += 1;
            }
        }
    }

    /// Iterate chunks that still carry live items.
    pub fn iter_live(&self) -> impl Iterator<Item = &Chunk<T>> {
        self.chunks.iter().filter(|c| !c.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(time: u64) -> Id {
        Id::new(1, time)
    }

    #[test]
    fn insert_and_view() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, id(1), 5, "hello".to_string());
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "hello");
    }

    #[test]
    fn delete_middle_splits_chunk() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, id(1), 5, "hello".to_string());
        rga.delete(&[IdSpan::new(1, 2, 3)]);
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "ho");
        assert_eq!(rga.chunks.len(), 3);
    }

    #[test]
    fn delete_prefix_and_suffix() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, id(1), 5, "hello".to_string());
        rga.delete(&[IdSpan::new(1, 1, 2)]);
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "llo");

        rga.delete(&[IdSpan::new(1, 5, 1)]);
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "ll");
    }

    #[test]
    fn delete_spanning_two_chunks() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, id(1), 2, "he".to_string());
        rga.insert(id(2), id(3), 3, "llo".to_string());
        rga.delete(&[IdSpan::new(1, 2, 2)]);
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "hlo");
    }

    #[test]
    fn insert_mid_chunk_splits() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, id(1), 4, "abcd".to_string());
        // Insert "X" after 'b' (time 2).
        rga.insert(id(2), id(10), 1, "X".to_string());
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "abXcd");
    }

    #[test]
    fn concurrent_inserts_order_by_id() {
        let mut rga: Rga<String> = Rga::new();
        rga.insert(ORIGIN, Id::new(2, 5), 1, "b".to_string());
        // Same anchor, higher time goes first.
        rga.insert(ORIGIN, Id::new(2, 9), 1, "a".to_string());
        let s: String = rga.iter_live().filter_map(|c| c.data.as_deref()).collect();
        assert_eq!(s, "ab");
    }
}
