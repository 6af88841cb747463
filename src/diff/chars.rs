//! Character-level string diff — Myers O(ND) difference algorithm.
//!
//! All positions and lengths are in Unicode scalar values (Rust `char`s),
//! never bytes.

// ── Types ─────────────────────────────────────────────────────────────────

/// Kind of a single edit in a character edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Del = -1,
    Eql = 0,
    Ins = 1,
}

/// One edit: a kind and the text it covers.
pub type Edit = (EditKind, String);

/// An ordered edit script transforming a source string into a destination.
pub type EditScript = Vec<Edit>;

// ── Public API ────────────────────────────────────────────────────────────

/// Merge consecutive edits of the same kind and drop empty edits.
pub fn normalize(script: EditScript) -> EditScript {
    let mut result: EditScript = Vec::with_capacity(script.len());
    for (kind, text) in script {
        if text.is_empty() {
            continue;
        }
        match result.last_mut() {
            Some(last) if last.0 == kind => last.1.push_str(&text),
            _ => result.push((kind, text)),
        }
    }
    result
}

/// Character count of the common prefix of two strings.
pub fn pfx(a: &str, b: &str) -> usize {
    pfx_chars(
        &a.chars().collect::<Vec<_>>(),
        &b.chars().collect::<Vec<_>>(),
    )
}

/// Character count of the common suffix of two strings.
pub fn sfx(a: &str, b: &str) -> usize {
    sfx_chars(
        &a.chars().collect::<Vec<_>>(),
        &b.chars().collect::<Vec<_>>(),
    )
}

/// Length of the longest suffix of `a` that is also a prefix of `b`.
pub fn overlap(a: &str, b: &str) -> usize {
    let c1: Vec<char> = a.chars().collect();
    let c2: Vec<char> = b.chars().collect();
    overlap_chars(&c1, &c2)
}

/// Compute the edit script turning `src` into `dst`. `Eql` edits are kept
/// for context.
pub fn diff(src: &str, dst: &str) -> EditScript {
    diff_full(src, dst)
}

/// Fast path when the caret position in `dst` after a local edit is known:
/// a single contiguous insertion or deletion ending at the caret is detected
/// without running the full algorithm. `caret < 0` disables the shortcut.
pub fn diff_edit(src: &str, dst: &str, caret: i64) -> EditScript {
    if caret >= 0 {
        let caret = caret as usize;
        let src_chars: Vec<char> = src.chars().collect();
        let dst_chars: Vec<char> = dst.chars().collect();
        let src_len = src_chars.len();
        let dst_len = dst_chars.len();

        if src_len != dst_len && caret <= dst_len {
            let dst_sfx = &dst_chars[caret..];
            let sfx_len = dst_sfx.len();
            if sfx_len <= src_len && src_chars[src_len - sfx_len..] == *dst_sfx {
                if dst_len > src_len {
                    let pfx_len = src_len - sfx_len;
                    if src_chars[..pfx_len] == dst_chars[..pfx_len] {
                        let mut script: EditScript = Vec::new();
                        if pfx_len > 0 {
                            script.push((EditKind::Eql, src_chars[..pfx_len].iter().collect()));
                        }
                        let insert: String = dst_chars[pfx_len..caret].iter().collect();
                        if !insert.is_empty() {
                            script.push((EditKind::Ins, insert));
                        }
                        if !dst_sfx.is_empty() {
                            script.push((EditKind::Eql, dst_sfx.iter().collect()));
                        }
                        return script;
                    }
                } else {
                    let pfx_len = dst_len - sfx_len;
                    if src_chars[..pfx_len] == dst_chars[..pfx_len] {
                        let mut script: EditScript = Vec::new();
                        if pfx_len > 0 {
                            script.push((EditKind::Eql, src_chars[..pfx_len].iter().collect()));
                        }
                        let del: String = src_chars[pfx_len..src_len - sfx_len].iter().collect();
                        if !del.is_empty() {
                            script.push((EditKind::Del, del));
                        }
                        if !dst_sfx.is_empty() {
                            script.push((EditKind::Eql, dst_sfx.iter().collect()));
                        }
                        return script;
                    }
                }
            }
        }
    }
    diff(src, dst)
}

/// Reconstruct the source string from an edit script.
pub fn src_text(script: &EditScript) -> String {
    let mut txt = String::new();
    for (kind, text) in script {
        if *kind != EditKind::Ins {
            txt.push_str(text);
        }
    }
    txt
}

/// Reconstruct the destination string from an edit script.
pub fn dst_text(script: &EditScript) -> String {
    let mut txt = String::new();
    for (kind, text) in script {
        if *kind != EditKind::Del {
            txt.push_str(text);
        }
    }
    txt
}

/// Flip a script so it transforms dst → src.
pub fn invert(script: EditScript) -> EditScript {
    script
        .into_iter()
        .map(|(kind, text)| {
            let inv = match kind {
                EditKind::Eql => EditKind::Eql,
                EditKind::Ins => EditKind::Del,
                EditKind::Del => EditKind::Ins,
            };
            (inv, text)
        })
        .collect()
}

/// Walk the script last-to-first, reporting insertions and deletions at
/// their source character positions.
///
/// Reverse order is load-bearing: every reported position is valid against
/// the original source because later edits have not yet disturbed earlier
/// offsets.
pub fn apply<FIns, FDel>(script: &EditScript, src_len: usize, mut on_insert: FIns, mut on_delete: FDel)
where
    FIns: FnMut(usize, &str),
    FDel: FnMut(usize, usize, &str),
{
    let mut pos = src_len;
    for i in (0..script.len()).rev() {
        let (kind, ref text) = script[i];
        match kind {
            EditKind::Eql => {
                pos -= text.chars().count();
            }
            EditKind::Ins => {
                on_insert(pos, text);
            }
            EditKind::Del => {
                let len = text.chars().count();
                pos -= len;
                on_delete(pos, len, text);
            }
        }
    }
}

// ── Char-slice helpers ────────────────────────────────────────────────────

fn pfx_chars(c1: &[char], c2: &[char]) -> usize {
    if c1.is_empty() || c2.is_empty() || c1[0] != c2[0] {
        return 0;
    }
    // Binary search for the longest equal prefix.
    let mut min = 0usize;
    let mut max = c1.len().min(c2.len());
    let mut mid = max;
    let mut start = 0;
    while min < mid {
        if c1[start..mid] == c2[start..mid] {
            min = mid;
            start = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

fn sfx_chars(c1: &[char], c2: &[char]) -> usize {
    let n1 = c1.len();
    let n2 = c2.len();
    if n1 == 0 || n2 == 0 || c1[n1 - 1] != c2[n2 - 1] {
        return 0;
    }
    let mut min = 0usize;
    let mut max = n1.min(n2);
    let mut mid = max;
    let mut end = 0;
    while min < mid {
        if c1[n1 - mid..n1 - end] == c2[n2 - mid..n2 - end] {
            min = mid;
            end = min;
        } else {
            max = mid;
        }
        mid = (max - min) / 2 + min;
    }
    mid
}

fn overlap_chars(c1: &[char], c2: &[char]) -> usize {
    let n1 = c1.len();
    let n2 = c2.len();
    if n1 == 0 || n2 == 0 {
        return 0;
    }

    let min_len = n1.min(n2);
    let c1_trim = if n1 > n2 { &c1[n1 - n2..] } else { c1 };
    let c2_trim = if n1 < n2 { &c2[..n1] } else { c2 };

    if c1_trim == c2_trim {
        return min_len;
    }

    let mut best = 0usize;
    let mut length = 1usize;
    loop {
        let pattern = &c1_trim[min_len - length..];
        match find_chars(c2_trim, pattern) {
            None => return best,
            Some(found) => {
                length += found;
                if found == 0 || c1_trim[min_len - length..] == c2_trim[..length] {
                    best = length;
                    length += 1;
                }
            }
        }
    }
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn to_string(chars: &[char]) -> String {
    chars.iter().collect()
}

// ── Core algorithm ────────────────────────────────────────────────────────

fn diff_full(src: &str, dst: &str) -> EditScript {
    if src == dst {
        return if src.is_empty() {
            vec![]
        } else {
            vec![(EditKind::Eql, src.to_string())]
        };
    }

    let c_src: Vec<char> = src.chars().collect();
    let c_dst: Vec<char> = dst.chars().collect();

    let prefix_len = pfx_chars(&c_src, &c_dst);
    let prefix = to_string(&c_src[..prefix_len]);
    let c_src = &c_src[prefix_len..];
    let c_dst = &c_dst[prefix_len..];

    let suffix_len = sfx_chars(c_src, c_dst);
    let suffix = if suffix_len > 0 {
        to_string(&c_src[c_src.len() - suffix_len..])
    } else {
        String::new()
    };
    let c_src = &c_src[..c_src.len() - suffix_len];
    let c_dst = &c_dst[..c_dst.len() - suffix_len];

    let mut result = diff_middle(c_src, c_dst);
    if !prefix.is_empty() {
        result.insert(0, (EditKind::Eql, prefix));
    }
    if !suffix.is_empty() {
        result.push((EditKind::Eql, suffix));
    }

    cleanup_merge(&mut result);
    result
}

/// Diff two blocks that share no common prefix or suffix.
fn diff_middle(c1: &[char], c2: &[char]) -> EditScript {
    if c1.is_empty() {
        return if c2.is_empty() {
            vec![]
        } else {
            vec![(EditKind::Ins, to_string(c2))]
        };
    }
    if c2.is_empty() {
        return vec![(EditKind::Del, to_string(c1))];
    }

    let n1 = c1.len();
    let n2 = c2.len();

    // Shorter text contained inside the longer one.
    let (long, short, long_is_src) = if n1 > n2 { (c1, c2, true) } else { (c2, c1, false) };
    if let Some(idx) = find_chars(long, short) {
        let edit = if long_is_src { EditKind::Del } else { EditKind::Ins };
        let mut script = vec![];
        if idx > 0 {
            script.push((edit, to_string(&long[..idx])));
        }
        script.push((EditKind::Eql, to_string(short)));
        if idx + short.len() < long.len() {
            script.push((edit, to_string(&long[idx + short.len()..])));
        }
        return script;
    }

    if short.len() == 1 {
        // Single char on one side with no containment: pure replace.
        return vec![(EditKind::Del, to_string(c1)), (EditKind::Ins, to_string(c2))];
    }

    bisect(c1, c2)
}

/// Myers bisect: walk the forward and reverse d-paths simultaneously until
/// they overlap, then recurse on the two halves.
fn bisect(c1: &[char], c2: &[char]) -> EditScript {
    let n1 = c1.len();
    let n2 = c2.len();
    let max_d = (n1 + n2).div_ceil(2) + 1;
    let v_offset = max_d;
    let v_length = 2 * max_d;

    let mut v1: Vec<i64> = vec![-1; v_length];
    let mut v2: Vec<i64> = vec![-1; v_length];
    v1[v_offset + 1] = 0;
    v2[v_offset + 1] = 0;

    let delta = n1 as i64 - n2 as i64;
    // With an odd delta the forward path detects the overlap; with an even
    // delta the reverse path does.
    let front = delta % 2 != 0;

    let mut k1start = 0i64;
    let mut k1end = 0i64;
    let mut k2start = 0i64;
    let mut k2end = 0i64;

    for d in 0..max_d as i64 {
        let mut k1 = -d + k1start;
        while k1 <= d - k1end {
            let k1_offset = (v_offset as i64 + k1) as usize;
            let mut x1: i64 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n1 as i64 && y1 < n2 as i64 && c1[x1 as usize] == c2[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;
            if x1 > n1 as i64 {
                k1end += 2;
            } else if y1 > n2 as i64 {
                k1start += 2;
            } else if front {
                let k2_offset = (v_offset as i64 + delta - k1) as usize;
                if k2_offset < v_length && v2[k2_offset] != -1 && x1 >= n1 as i64 - v2[k2_offset] {
                    return bisect_split(c1, c2, x1 as usize, y1 as usize);
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2start;
        while k2 <= d - k2end {
            let k2_offset = (v_offset as i64 + k2) as usize;
            let mut x2: i64 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n1 as i64
                && y2 < n2 as i64
                && c1[n1 - 1 - x2 as usize] == c2[n2 - 1 - y2 as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;
            if x2 > n1 as i64 {
                k2end += 2;
            } else if y2 > n2 as i64 {
                k2start += 2;
            } else if !front {
                let k1_offset = (v_offset as i64 + delta - k2) as usize;
                if k1_offset < v_length {
                    let x1 = v1[k1_offset];
                    if x1 != -1 {
                        let y1 = v_offset as i64 + x1 - k1_offset as i64;
                        let x2_real = n1 as i64 - x2;
                        if x1 >= x2_real {
                            return bisect_split(c1, c2, x1 as usize, y1 as usize);
                        }
                    }
                }
            }
            k2 += 2;
        }
    }

    // Paths never overlapped: full replace.
    vec![(EditKind::Del, to_string(c1)), (EditKind::Ins, to_string(c2))]
}

fn bisect_split(c1: &[char], c2: &[char], x: usize, y: usize) -> EditScript {
    let src_a: String = c1[..x].iter().collect();
    let dst_a: String = c2[..y].iter().collect();
    let src_b: String = c1[x..].iter().collect();
    let dst_b: String = c2[y..].iter().collect();
    let mut result = diff_full(&src_a, &dst_a);
    result.extend(diff_full(&src_b, &dst_b));
    result
}

// ── cleanup_merge ─────────────────────────────────────────────────────────

/// Canonicalize an edit script: merge runs of the same kind, factor common
/// prefixes/suffixes out of del+ins pairs into the surrounding equalities,
/// and shift single edits sideways to eliminate tiny equalities.
pub(crate) fn cleanup_merge(script: &mut EditScript) {
    // Dummy terminator so the final run gets flushed.
    script.push((EditKind::Eql, String::new()));
    let mut pointer = 0usize;
    let mut del_cnt = 0usize;
    let mut ins_cnt = 0usize;
    let mut del_txt = String::new();
    let mut ins_txt = String::new();

    while pointer < script.len() {
        if pointer < script.len() - 1 && script[pointer].1.is_empty() {
            script.remove(pointer);
            continue;
        }

        match script[pointer].0 {
            EditKind::Ins => {
                ins_cnt += 1;
                let txt = script[pointer].1.clone();
                ins_txt.push_str(&txt);
                pointer += 1;
            }
            EditKind::Del => {
                del_cnt += 1;
                let txt = script[pointer].1.clone();
                del_txt.push_str(&txt);
                pointer += 1;
            }
            EditKind::Eql => {
                let prev_eq: Option<usize> = {
                    let p = pointer as i64 - ins_cnt as i64 - del_cnt as i64 - 1;
                    if p >= 0 {
                        Some(p as usize)
                    } else {
                        None
                    }
                };

                if !del_txt.is_empty() || !ins_txt.is_empty() {
                    if !del_txt.is_empty() && !ins_txt.is_empty() {
                        // Factor out a common prefix into the preceding EQL.
                        let del_chars: Vec<char> = del_txt.chars().collect();
                        let ins_chars: Vec<char> = ins_txt.chars().collect();
                        let common = pfx_chars(&ins_chars, &del_chars);
                        if common > 0 {
                            let prefix: String = ins_chars[..common].iter().collect();
                            if let Some(pq) = prev_eq {
                                script[pq].1.push_str(&prefix);
                            } else {
                                script.insert(0, (EditKind::Eql, prefix));
                                pointer += 1;
                            }
                            ins_txt = ins_chars[common..].iter().collect();
                            del_txt = del_chars[common..].iter().collect();
                        }

                        // Factor out a common suffix into the current EQL.
                        let del_chars: Vec<char> = del_txt.chars().collect();
                        let ins_chars: Vec<char> = ins_txt.chars().collect();
                        let common = sfx_chars(&ins_chars, &del_chars);
                        if common > 0 {
                            let ins_len = ins_chars.len();
                            let suffix: String = ins_chars[ins_len - common..].iter().collect();
                            let cur_txt = script[pointer].1.clone();
                            script[pointer].1 = suffix + &cur_txt;
                            ins_txt = ins_chars[..ins_len - common].iter().collect();
                            del_txt = del_chars[..del_chars.len() - common].iter().collect();
                        }
                    }

                    // Replace the accumulated run with at most one Del and
                    // one Ins.
                    let n = ins_cnt + del_cnt;
                    let start = pointer - n;
                    let del_empty = del_txt.is_empty();
                    let ins_empty = ins_txt.is_empty();

                    if del_empty && ins_empty {
                        let _ = script.splice(start..pointer, []);
                        pointer = start;
                    } else if del_empty {
                        let ins = ins_txt.clone();
                        let _ = script.splice(start..pointer, [(EditKind::Ins, ins)]);
                        pointer = start + 1;
                    } else if ins_empty {
                        let del = del_txt.clone();
                        let _ = script.splice(start..pointer, [(EditKind::Del, del)]);
                        pointer = start + 1;
                    } else {
                        let del = del_txt.clone();
                        let ins = ins_txt.clone();
                        let _ = script
                            .splice(start..pointer, [(EditKind::Del, del), (EditKind::Ins, ins)]);
                        pointer = start + 2;
                    }
                }

                if pointer != 0 && script[pointer - 1].0 == EditKind::Eql {
                    let cur_txt = script[pointer].1.clone();
                    script[pointer - 1].1.push_str(&cur_txt);
                    script.remove(pointer);
                } else {
                    pointer += 1;
                }

                ins_cnt = 0;
                del_cnt = 0;
                del_txt.clear();
                ins_txt.clear();
            }
        }
    }

    if script.last().map(|(_, s)| s.is_empty()) == Some(true) {
        script.pop();
    }

    // Single edits surrounded by equalities can sometimes be shifted
    // sideways to eliminate one of the equalities.
    let mut changes = false;
    let mut pointer = 1usize;
    while pointer + 1 < script.len() {
        if script[pointer - 1].0 == EditKind::Eql && script[pointer + 1].0 == EditKind::Eql {
            let prev_chars: Vec<char> = script[pointer - 1].1.chars().collect();
            let cur_chars: Vec<char> = script[pointer].1.chars().collect();
            let next_chars: Vec<char> = script[pointer + 1].1.chars().collect();

            if cur_chars.len() >= prev_chars.len()
                && cur_chars[cur_chars.len() - prev_chars.len()..] == prev_chars[..]
            {
                let new_cur: String = prev_chars
                    .iter()
                    .chain(cur_chars[..cur_chars.len() - prev_chars.len()].iter())
                    .collect();
                let new_next: String = prev_chars.iter().chain(next_chars.iter()).collect();
                script[pointer].1 = new_cur;
                script[pointer + 1].1 = new_next;
                script.remove(pointer - 1);
                changes = true;
            } else if cur_chars.len() >= next_chars.len()
                && cur_chars[..next_chars.len()] == next_chars[..]
            {
                let new_prev: String = prev_chars.iter().chain(next_chars.iter()).collect();
                let new_cur: String = cur_chars[next_chars.len()..]
                    .iter()
                    .chain(next_chars.iter())
                    .collect();
                script[pointer - 1].1 = new_prev;
                script[pointer].1 = new_cur;
                script.remove(pointer + 1);
                changes = true;
                pointer += 1;
            } else {
                pointer += 1;
            }
        } else {
            pointer += 1;
        }
    }

    if changes {
        cleanup_merge(script);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
