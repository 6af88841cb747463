//! Binary diff, implemented on top of the character differ.
//!
//! Each byte maps to the Unicode code point of the same value, so byte
//! sequences become strings of chars in `U+0000..=U+00FF` and round-trip
//! losslessly through the string algorithm.

use super::chars::{self, EditKind, EditScript};

/// Map bytes to a string of one char per byte.
pub fn to_str(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Map a string produced by [`to_str`] back to bytes.
pub fn to_bin(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u8).collect()
}

/// Compute the edit script turning `src` bytes into `dst` bytes.
pub fn diff(src: &[u8], dst: &[u8]) -> EditScript {
    chars::diff(&to_str(src), &to_str(dst))
}

/// Reconstruct the source bytes from an edit script.
pub fn src_bytes(script: &EditScript) -> Vec<u8> {
    to_bin(&chars::src_text(script))
}

/// Reconstruct the destination bytes from an edit script.
pub fn dst_bytes(script: &EditScript) -> Vec<u8> {
    to_bin(&chars::dst_text(script))
}

/// Walk the script last-to-first, reporting insertions and deletions at
/// their source byte positions. Inserted data arrives as bytes.
pub fn apply<FIns, FDel>(script: &EditScript, src_len: usize, mut on_insert: FIns, on_delete: FDel)
where
    FIns: FnMut(usize, Vec<u8>),
    FDel: FnMut(usize, usize, &str),
{
    chars::apply(
        script,
        src_len,
        |pos, text| on_insert(pos, to_bin(text)),
        on_delete,
    );
}

/// True if the script contains no actual edits.
pub fn is_noop(script: &EditScript) -> bool {
    script.iter().all(|(kind, _)| *kind == EditKind::Eql)
}
