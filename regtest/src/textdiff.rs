//! Line diffs for text artifacts: unified listing and a side-by-side view.

use difference::{Changeset, Difference};

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// One line of an edit script from baseline to obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOp {
    Equal(String),
    Removed(String),
    Added(String),
}

fn push_lines(ops: &mut Vec<LineOp>, chunk: &str, make: fn(String) -> LineOp) {
    for line in chunk.split('\n') {
        ops.push(make(line.to_string()));
    }
}

/// Line-level edit script turning `baseline` into `obtained`.
pub fn line_ops(baseline: &[&str], obtained: &[&str]) -> Vec<LineOp> {
    let mut ops = Vec::new();
    if baseline.is_empty() || obtained.is_empty() {
        ops.extend(baseline.iter().map(|l| LineOp::Removed(l.to_string())));
        ops.extend(obtained.iter().map(|l| LineOp::Added(l.to_string())));
        return ops;
    }
    let changeset = Changeset::new(&baseline.join("\n"), &obtained.join("\n"), "\n");
    for diff in changeset.diffs {
        match diff {
            Difference::Same(x) => push_lines(&mut ops, &x, LineOp::Equal),
            Difference::Rem(x) => push_lines(&mut ops, &x, LineOp::Removed),
            Difference::Add(x) => push_lines(&mut ops, &x, LineOp::Added),
        }
    }
    ops
}

fn format_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{start},0"),
        1 => format!("{}", start + 1),
        _ => format!("{},{len}", start + 1),
    }
}

/// Unified diff lines (`---`/`+++` headers, `@@` hunks); empty when equal.
pub fn unified_diff(
    baseline: &[&str],
    obtained: &[&str],
    from_name: &str,
    to_name: &str,
    context: usize,
) -> Vec<String> {
    let ops = line_ops(baseline, obtained);
    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, LineOp::Equal(_)))
        .map(|(i, _)| i)
        .collect();
    let Some(&first) = changes.first() else {
        return Vec::new();
    };

    // Group changes whose separating run of equal lines fits in two contexts.
    let mut groups: Vec<(usize, usize)> = vec![(first, first)];
    for &i in &changes[1..] {
        match groups.last_mut() {
            Some(group) if i - group.1 - 1 <= 2 * context => group.1 = i,
            _ => groups.push((i, i)),
        }
    }

    let mut out = vec![format!("--- {from_name}"), format!("+++ {to_name}")];
    for (first, last) in groups {
        let start = first.saturating_sub(context);
        let end = (last + context + 1).min(ops.len());
        let old_before = ops[..start]
            .iter()
            .filter(|op| !matches!(op, LineOp::Added(_)))
            .count();
        let new_before = ops[..start]
            .iter()
            .filter(|op| !matches!(op, LineOp::Removed(_)))
            .count();
        let hunk = &ops[start..end];
        let old_len = hunk.iter().filter(|op| !matches!(op, LineOp::Added(_))).count();
        let new_len = hunk.iter().filter(|op| !matches!(op, LineOp::Removed(_))).count();
        out.push(format!(
            "@@ -{} +{} @@",
            format_range(old_before, old_len),
            format_range(new_before, new_len)
        ));
        for op in hunk {
            out.push(match op {
                LineOp::Equal(l) => format!(" {l}"),
                LineOp::Removed(l) => format!("-{l}"),
                LineOp::Added(l) => format!("+{l}"),
            });
        }
    }
    out
}

/// Two-column rendering, baseline on the left and obtained on the right.
///
/// Markers between the columns: `|` changed, `<` only in baseline,
/// `>` only in obtained.
pub fn side_by_side(
    baseline: &[&str],
    obtained: &[&str],
    from_name: &str,
    to_name: &str,
) -> String {
    let ops = line_ops(baseline, obtained);
    let width = baseline
        .iter()
        .map(|l| l.chars().count())
        .chain(std::iter::once(from_name.chars().count()))
        .max()
        .unwrap_or(0);

    let mut rows: Vec<(Option<(usize, &str)>, char, Option<(usize, &str)>)> = Vec::new();
    let (mut old_no, mut new_no) = (0, 0);
    let mut i = 0;
    while i < ops.len() {
        match &ops[i] {
            LineOp::Equal(l) => {
                old_no += 1;
                new_no += 1;
                rows.push((Some((old_no, l.as_str())), ' ', Some((new_no, l.as_str()))));
                i += 1;
            }
            _ => {
                let mut removed = Vec::new();
                let mut added = Vec::new();
                while let Some(op) = ops.get(i) {
                    match op {
                        LineOp::Removed(l) => removed.push(l.as_str()),
                        LineOp::Added(l) => added.push(l.as_str()),
                        LineOp::Equal(_) => break,
                    }
                    i += 1;
                }
                for k in 0..removed.len().max(added.len()) {
                    let left = removed.get(k).map(|l| {
                        old_no += 1;
                        (old_no, *l)
                    });
                    let right = added.get(k).map(|l| {
                        new_no += 1;
                        (new_no, *l)
                    });
                    let marker = match (&left, &right) {
                        (Some(_), Some(_)) => '|',
                        (Some(_), None) => '<',
                        _ => '>',
                    };
                    rows.push((left, marker, right));
                }
            }
        }
    }

    let mut out = format!("{:>6} {from_name:<width$}   {to_name}\n", "");
    for (left, marker, right) in rows {
        let (ln, lt) = left.map_or((String::new(), ""), |(n, t)| (n.to_string(), t));
        let (rn, rt) = right.map_or((String::new(), ""), |(n, t)| (n.to_string(), t));
        let line = format!("{ln:>6} {lt:<width$} {marker} {rn:>6} {rt}");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_inputs_have_no_diff() {
        let lines = ["a", "b"];
        assert!(unified_diff(&lines, &lines, "b", "o", CONTEXT_LINES).is_empty());
    }

    #[test]
    fn single_change_hunk() {
        let baseline = ["1", "2", "3", "4", "5", "6", "7", "8"];
        let obtained = ["1", "2", "3", "4", "five", "6", "7", "8"];
        let diff = unified_diff(&baseline, &obtained, "base", "obt", 3);
        assert_eq!(&diff[..3], ["--- base", "+++ obt", "@@ -2,7 +2,7 @@"]);
        assert_eq!(diff.len(), 11);
        assert!(diff.contains(&"-5".to_string()));
        assert!(diff.contains(&"+five".to_string()));
        assert_eq!(diff.last().map(String::as_str), Some(" 8"));
    }

    #[test]
    fn distant_changes_split_into_hunks() {
        let baseline: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let mut obtained = baseline.clone();
        obtained[1] = "x".into();
        obtained[18] = "y".into();
        let b: Vec<&str> = baseline.iter().map(String::as_str).collect();
        let o: Vec<&str> = obtained.iter().map(String::as_str).collect();
        let diff = unified_diff(&b, &o, "b", "o", 3);
        assert_eq!(diff.iter().filter(|l| l.starts_with("@@")).count(), 2);
        assert!(diff.contains(&"@@ -1,5 +1,5 @@".to_string()));
    }

    #[test]
    fn empty_side_is_all_additions() {
        let diff = unified_diff(&[], &["a", "b"], "b", "o", 3);
        assert_eq!(diff[2], "@@ -0,0 +1,2 @@");
        assert_eq!(&diff[3..], ["+a", "+b"]);
    }

    #[test]
    fn side_by_side_marks_changes() {
        let view = side_by_side(&["a", "b"], &["a", "c", "d"], "baseline", "obtained");
        let lines: Vec<&str> = view.lines().collect();
        assert!(lines[0].contains("baseline"));
        assert!(lines[1].contains(" a ") && !lines[1].contains('|'));
        assert!(lines[2].contains('|'));
        assert!(lines[3].contains('>'));
    }
}
