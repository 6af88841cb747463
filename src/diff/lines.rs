//! Line-level diff, built on top of the character differ.
//!
//! Lines are joined with `"\n"` and diffed as one string; the resulting
//! character edit script is then aggregated back into per-line sub-scripts
//! and classified. Two repair passes move edits across line boundaries so
//! that whole-line inserts and deletes are reported as such instead of as
//! smeared mixed edits.

use super::chars::{self, normalize, EditKind, EditScript};

/// Classification of one line in a line-level diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// The whole line was deleted.
    Del = -1,
    /// The line is unchanged.
    Eql = 0,
    /// The whole line was inserted.
    Ins = 1,
    /// The line was modified in place.
    Mix = 2,
}

/// One line-level entry: `(kind, src_index, dst_index)`.
///
/// An index is `-1` when the line has no counterpart on that side.
pub type LineEdit = (LineKind, i64, i64);

/// An ordered list of line edits.
pub type LineScript = Vec<LineEdit>;

fn push_segment(line: &mut EditScript, kind: EditKind, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = line.last_mut() {
        if last.0 == kind {
            last.1.push_str(text);
            return;
        }
    }
    line.push((kind, text.to_string()));
}

/// Split a character edit script at newlines into one sub-script per line.
///
/// After the split, two repair passes run:
///
/// 1. A line of the shape `[Eql prefix][single-kind tail]` donates its
///    prefix to a later line that starts with the same-kind segment equal
///    to the prefix — turning a smeared edit back into a whole-line one.
/// 2. A trailing `Del` is shortened when a later line can absorb its suffix
///    as an equality, again restoring whole-line shapes.
pub fn agg(script: &EditScript) -> Vec<EditScript> {
    let mut lines: Vec<EditScript> = Vec::new();
    let mut line: EditScript = Vec::new();

    for (kind, text) in script {
        let mut remaining = text.as_str();
        loop {
            match remaining.find('\n') {
                None => {
                    push_segment(&mut line, *kind, remaining);
                    break;
                }
                Some(idx) => {
                    // The newline stays with this line's segment.
                    push_segment(&mut line, *kind, &remaining[..idx + 1]);
                    if !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                    }
                    remaining = &remaining[idx + 1..];
                }
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }

    for i in 0..lines.len() {
        lines[i] = normalize(std::mem::take(&mut lines[i]));
    }

    for i in 0..lines.len() {
        // Pass 1: migrate a leading equality forward.
        'line_start: {
            if lines[i].len() < 2 {
                break 'line_start;
            }

            let second_kind = lines[i][1].0;
            if lines[i][0].0 != EditKind::Eql {
                break 'line_start;
            }
            if second_kind != EditKind::Del && second_kind != EditKind::Ins {
                break 'line_start;
            }
            if lines[i][2..].iter().any(|(k, _)| *k != second_kind) {
                break 'line_start;
            }

            let pfx = lines[i][0].1.clone();
            for j in (i + 1)..lines.len() {
                lines[j] = normalize(std::mem::take(&mut lines[j]));

                if lines[j].len() > 1
                    && lines[j][0].0 == second_kind
                    && lines[j][1].0 == EditKind::Eql
                    && lines[j][0].1 == pfx
                {
                    lines[i].remove(0);
                    let merged = format!("{pfx}{}", lines[i][0].1);
                    lines[i][0].1 = merged;
                    let merged_target = format!("{pfx}{}", lines[j][1].1);
                    lines[j][1].1 = merged_target;
                    lines[j].remove(0);
                    break 'line_start;
                }

                if lines[j].iter().any(|(k, _)| *k != second_kind) {
                    break 'line_start;
                }
            }
        }

        // Pass 2: let a later line absorb the suffix of a trailing delete.
        'line_end: {
            if lines[i].len() < 2 {
                break 'line_end;
            }

            if lines[i].last().map(|op| op.0) != Some(EditKind::Del) {
                break 'line_end;
            }

            for j in (i + 1)..lines.len() {
                lines[j] = normalize(std::mem::take(&mut lines[j]));
                let target_len = lines[j].len();
                if target_len == 0 {
                    continue;
                }

                let target_last_idx;
                if target_len == 1 {
                    let target_kind = lines[j][0].0;
                    if target_kind == EditKind::Del {
                        continue;
                    }
                    if target_kind != EditKind::Eql {
                        break 'line_end;
                    }
                    target_last_idx = 0usize;
                } else {
                    if target_len > 2 {
                        break 'line_end;
                    }
                    if lines[j][0].0 != EditKind::Del {
                        break 'line_end;
                    }
                    target_last_idx = 1usize;
                }

                let target_last_kind = lines[j][target_last_idx].0;
                if target_last_kind == EditKind::Del {
                    continue;
                }
                if target_last_kind != EditKind::Eql {
                    break 'line_end;
                }

                let moved = lines[j][target_last_idx].1.clone();
                let last_idx = lines[i].len() - 1;
                let last_text = lines[i][last_idx].1.clone();
                if moved.len() > last_text.len() {
                    break 'line_end;
                }
                let Some(prefix) = last_text.strip_suffix(moved.as_str()) else {
                    break 'line_end;
                };

                lines[i][last_idx].1 = prefix.to_string();
                lines[i].push((EditKind::Eql, moved));
                lines[j][target_last_idx].0 = EditKind::Del;

                lines[i] = normalize(std::mem::take(&mut lines[i]));
                lines[j] = normalize(std::mem::take(&mut lines[j]));
                break 'line_end;
            }
        }
    }

    lines
}

/// Compute a line-level diff between two lists of lines.
pub fn diff(src: &[&str], dst: &[&str]) -> LineScript {
    if dst.is_empty() {
        return src
            .iter()
            .enumerate()
            .map(|(i, _)| (LineKind::Del, i as i64, -1))
            .collect();
    }
    if src.is_empty() {
        return dst
            .iter()
            .enumerate()
            .map(|(i, _)| (LineKind::Ins, -1, i as i64))
            .collect();
    }

    let src_txt = src.join("\n") + "\n";
    let dst_txt = dst.join("\n") + "\n";
    if src_txt == dst_txt {
        return vec![];
    }

    let script = chars::diff(&src_txt, &dst_txt);
    let lines = agg(&script);

    let mut result: LineScript = Vec::new();
    let mut src_idx: i64 = -1;
    let mut dst_idx: i64 = -1;
    let src_len = src.len() as i64;
    let dst_len = dst.len() as i64;

    for (i, line) in lines.iter().enumerate() {
        let mut line_work = line.clone();
        if line_work.is_empty() {
            continue;
        }

        let last_kind = line_work[line_work.len() - 1].0;
        let last_txt = line_work[line_work.len() - 1].1.clone();

        // Trailing newline belongs to the separator, not the line content.
        if last_txt == "\n" {
            line_work.pop();
        } else if last_txt.ends_with('\n') {
            let trimmed = last_txt[..last_txt.len() - 1].to_string();
            if let Some(last) = line_work.last_mut() {
                last.1 = trimmed;
            }
        }

        let kind: LineKind;
        if line_work.is_empty() {
            // The line was only a newline; classify by the separator's kind.
            match last_kind {
                EditKind::Eql => {
                    kind = LineKind::Eql;
                    src_idx += 1;
                    dst_idx += 1;
                }
                EditKind::Ins => {
                    kind = LineKind::Ins;
                    dst_idx += 1;
                }
                EditKind::Del => {
                    kind = LineKind::Del;
                    src_idx += 1;
                }
            }
        } else {
            let is_last = i + 1 == lines.len();
            if is_last {
                // The final line carries no separator, so classification
                // falls back to which sides still have lines left.
                if src_idx + 1 < src_len {
                    if dst_idx + 1 < dst_len {
                        kind = if line_work.len() == 1 && line_work[0].0 == EditKind::Eql {
                            LineKind::Eql
                        } else {
                            LineKind::Mix
                        };
                        src_idx += 1;
                        dst_idx += 1;
                    } else {
                        kind = LineKind::Del;
                        src_idx += 1;
                    }
                } else {
                    kind = LineKind::Ins;
                    dst_idx += 1;
                }
            } else if line_work.len() == 1 && line_work[0].0 == EditKind::Eql {
                kind = LineKind::Eql;
                src_idx += 1;
                dst_idx += 1;
            } else {
                match last_kind {
                    EditKind::Eql => {
                        kind = LineKind::Mix;
                        src_idx += 1;
                        dst_idx += 1;
                    }
                    EditKind::Ins => {
                        kind = LineKind::Ins;
                        dst_idx += 1;
                    }
                    EditKind::Del => {
                        kind = LineKind::Del;
                        src_idx += 1;
                    }
                }
            }
        }

        // An Eql whose literal lines differ is really a modification.
        let kind = if kind == LineKind::Eql {
            let si = src_idx as usize;
            let di = dst_idx as usize;
            if si < src.len() && di < dst.len() && src[si] != dst[di] {
                LineKind::Mix
            } else {
                LineKind::Eql
            }
        } else {
            kind
        };

        result.push((kind, src_idx, dst_idx));
    }

    result
}

/// Walk a line script last-to-first, invoking a callback per changed line.
///
/// Reverse order keeps every reported source index valid: edits at higher
/// indices cannot shift lines at lower ones.
pub fn apply<FDel, FIns, FMix>(script: &LineScript, mut on_delete: FDel, mut on_insert: FIns, mut on_mix: FMix)
where
    FDel: FnMut(usize),
    FIns: FnMut(i64, usize),
    FMix: FnMut(usize, usize),
{
    for i in (0..script.len()).rev() {
        let (kind, pos_src, pos_dst) = script[i];
        match kind {
            LineKind::Eql => {}
            LineKind::Del => on_delete(pos_src as usize),
            LineKind::Ins => on_insert(pos_src, pos_dst as usize),
            LineKind::Mix => on_mix(pos_src as usize, pos_dst as usize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Replay a line script against `src`: remove on delete, splice in the
    /// destination line on insert, overwrite in place on mix.
    fn replay(src: &[&str], dst: &[&str]) -> Vec<String> {
        let script = diff(src, dst);
        let out: RefCell<Vec<String>> =
            RefCell::new(src.iter().map(|s| s.to_string()).collect());
        apply(
            &script,
            |pos| {
                out.borrow_mut().remove(pos);
            },
            |pos_src, pos_dst| {
                out.borrow_mut()
                    .insert((pos_src + 1) as usize, dst[pos_dst].to_string());
            },
            |pos_src, pos_dst| {
                out.borrow_mut()[pos_src] = dst[pos_dst].to_string();
            },
        );
        out.into_inner()
    }

    #[test]
    fn equal_lines_are_empty_script() {
        assert!(diff(&["hello", "world"], &["hello", "world"]).is_empty());
    }

    #[test]
    fn middle_line_delete_keeps_neighbors() {
        let script = diff(&["a", "b", "c"], &["a", "c"]);
        assert_eq!(
            script,
            vec![
                (LineKind::Eql, 0, 0),
                (LineKind::Del, 1, 0),
                (LineKind::Eql, 2, 1),
            ]
        );
    }

    #[test]
    fn appended_line_is_ins() {
        let script = diff(&["hello"], &["hello", "world"]);
        assert!(script.iter().any(|(k, _, _)| *k == LineKind::Ins));
        assert!(script.iter().all(|(k, _, _)| *k != LineKind::Del));
    }

    #[test]
    fn removed_trailing_line_is_del() {
        let script = diff(&["hello", "world"], &["hello"]);
        assert!(script.iter().any(|(k, _, _)| *k == LineKind::Del));
    }

    #[test]
    fn empty_src_is_all_ins() {
        let script = diff(&[], &["a", "b"]);
        assert_eq!(
            script,
            vec![(LineKind::Ins, -1, 0), (LineKind::Ins, -1, 1)]
        );
    }

    #[test]
    fn empty_dst_is_all_del() {
        let script = diff(&["a", "b"], &[]);
        assert_eq!(
            script,
            vec![(LineKind::Del, 0, -1), (LineKind::Del, 1, -1)]
        );
    }

    #[test]
    fn modified_line_is_mix() {
        let script = diff(&["aaa", "bbb", "ccc"], &["aaa", "bXb", "ccc"]);
        assert_eq!(
            script,
            vec![
                (LineKind::Eql, 0, 0),
                (LineKind::Mix, 1, 1),
                (LineKind::Eql, 2, 2),
            ]
        );
    }

    #[test]
    fn indices_track_both_sides() {
        let script = diff(&["a", "b"], &["x", "a", "b"]);
        // "x" inserted at the front.
        assert_eq!(script[0].0, LineKind::Ins);
        assert_eq!(script[0].1, -1);
        assert_eq!(script[0].2, 0);
        for (kind, s, d) in &script[1..] {
            assert_eq!(*kind, LineKind::Eql);
            assert_eq!(*d, *s + 1);
        }
    }

    #[test]
    fn apply_runs_in_reverse_order() {
        let script = diff(&["a", "b", "c", "d"], &["a", "c", "x"]);
        let touched: RefCell<Vec<i64>> = RefCell::new(Vec::new());
        apply(
            &script,
            |pos| touched.borrow_mut().push(pos as i64),
            |pos_src, _| touched.borrow_mut().push(pos_src),
            |pos_src, _| touched.borrow_mut().push(pos_src as i64),
        );
        let touched = touched.into_inner();
        assert!(!touched.is_empty());
        for pair in touched.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn replaying_a_script_reconstructs_the_destination() {
        let cases: Vec<(Vec<&str>, Vec<&str>)> = vec![
            (vec!["a", "b", "c"], vec!["a", "c"]),
            (vec!["a", "c"], vec!["a", "b", "c"]),
            (vec!["a", "b"], vec!["b", "a"]),
            (vec![], vec!["x", "y"]),
            (vec!["x", "y"], vec![]),
            (vec!["a", "a", "b"], vec!["b", "a", "a"]),
            (vec!["dup", "dup"], vec!["dup"]),
            (vec!["one"], vec!["one", "two", "three"]),
            (vec!["aaa", "bbb", "ccc"], vec!["aaa", "bXb", "ccc"]),
            (vec!["aaa", "bbb"], vec!["ccc", "ddd"]),
        ];
        for (src, dst) in cases {
            assert_eq!(replay(&src, &dst), dst, "replay {src:?} -> {dst:?}");
        }
    }

    #[test]
    fn agg_splits_at_newlines() {
        let script = chars::diff("aaa\nbbb\n", "aaa\nbXb\n");
        let lines = agg(&script);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], vec![(EditKind::Eql, "aaa\n".to_string())]);
    }
}
