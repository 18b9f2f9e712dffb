//! Unified-diff hunk application.
//!
//! Host patches are bare hunk lists (`@@ -a,b +c,d @@` followed by ` `, `-`
//! and `+` lines) without file headers. [`apply_patch`] replays them over a
//! base text and refuses to guess: any context or removal line that does not
//! match the base yields a [`PatchError`], leaving the caller to decide how
//! to degrade.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("malformed hunk header: {0}")]
    BadHeader(String),
    #[error("hunk line {line} does not match the base content")]
    ContextMismatch { line: usize },
    #[error("hunk at base line {line} starts before the previous hunk ended")]
    OutOfOrder { line: usize },
    #[error("hunk is shorter than its header declares")]
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    old_start: usize,
    old_len: usize,
    lines: Vec<HunkLine>,
}

/// End-of-file newline markers seen in a patch.
#[derive(Debug, Default, Clone, Copy)]
struct NewlineMarkers {
    old_missing: bool,
    new_missing: bool,
}

/// Apply `patch` to `base`, returning the patched text.
pub fn apply_patch(base: &str, patch: &str) -> Result<String, PatchError> {
    let (hunks, markers) = parse_hunks(patch)?;

    let base_has_newline = base.ends_with('\n');
    let base_lines: Vec<&str> = if base.is_empty() {
        Vec::new()
    } else {
        base.strip_suffix('\n').unwrap_or(base).split('\n').collect()
    };

    let mut out: Vec<&str> = Vec::with_capacity(base_lines.len());
    let mut cursor = 0usize;

    for hunk in &hunks {
        // A zero-length old range names the line *after* which to insert.
        let start = if hunk.old_len == 0 {
            hunk.old_start
        } else {
            hunk.old_start.saturating_sub(1)
        };
        if start < cursor {
            return Err(PatchError::OutOfOrder {
                line: hunk.old_start,
            });
        }
        if start > base_lines.len() {
            return Err(PatchError::ContextMismatch { line: start + 1 });
        }
        out.extend_from_slice(&base_lines[cursor..start]);
        cursor = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) | HunkLine::Remove(text) => {
                    if base_lines.get(cursor) != Some(&text.as_str()) {
                        return Err(PatchError::ContextMismatch { line: cursor + 1 });
                    }
                    if matches!(line, HunkLine::Context(_)) {
                        out.push(text.as_str());
                    }
                    cursor += 1;
                }
                HunkLine::Add(text) => out.push(text.as_str()),
            }
        }
    }
    out.extend_from_slice(&base_lines[cursor..]);

    if out.is_empty() {
        return Ok(String::new());
    }

    let trailing_newline = if markers.new_missing {
        false
    } else if markers.old_missing {
        true
    } else {
        base_has_newline || base.is_empty()
    };

    let mut result = out.join("\n");
    if trailing_newline {
        result.push('\n');
    }
    Ok(result)
}

/// Content of a new file described entirely by its patch: every added line,
/// in patch order, without the leading `+`.
pub fn added_lines(patch: &str) -> String {
    patch
        .split('\n')
        .filter(|line| line.starts_with('+') && !line.starts_with("+++"))
        .map(|line| &line[1..])
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_hunks(patch: &str) -> Result<(Vec<Hunk>, NewlineMarkers), PatchError> {
    let mut hunks = Vec::new();
    let mut markers = NewlineMarkers::default();
    let mut current: Option<(Hunk, usize, usize)> = None;

    for raw in patch.split('\n') {
        let complete = matches!(current, Some((_, 0, 0)));
        if complete && !raw.starts_with('\\') {
            if let Some((hunk, _, _)) = current.take() {
                hunks.push(hunk);
            }
        }

        if raw.starts_with("@@") {
            let (old_start, old_len, new_len) = parse_header(raw)?;
            current = Some((
                Hunk {
                    old_start,
                    old_len,
                    lines: Vec::new(),
                },
                old_len,
                new_len,
            ));
            continue;
        }

        let Some((hunk, old_left, new_left)) = current.as_mut() else {
            // File headers (`diff --git`, `---`, `+++`) and trailing blank lines.
            continue;
        };

        if raw.starts_with('\\') {
            match hunk.lines.last() {
                Some(HunkLine::Remove(_)) => markers.old_missing = true,
                Some(HunkLine::Add(_)) => markers.new_missing = true,
                Some(HunkLine::Context(_)) => {
                    markers.old_missing = true;
                    markers.new_missing = true;
                }
                None => {}
            }
            continue;
        }

        let (tag, text) = match raw.chars().next() {
            Some(tag @ (' ' | '-' | '+')) => (tag, &raw[1..]),
            // Some tools strip the single space of an empty context line.
            None => (' ', ""),
            Some(_) => return Err(PatchError::Truncated),
        };
        let line = match tag {
            ' ' => {
                *old_left = old_left.checked_sub(1).ok_or(PatchError::Truncated)?;
                *new_left = new_left.checked_sub(1).ok_or(PatchError::Truncated)?;
                HunkLine::Context(text.to_string())
            }
            '-' => {
                *old_left = old_left.checked_sub(1).ok_or(PatchError::Truncated)?;
                HunkLine::Remove(text.to_string())
            }
            _ => {
                *new_left = new_left.checked_sub(1).ok_or(PatchError::Truncated)?;
                HunkLine::Add(text.to_string())
            }
        };
        hunk.lines.push(line);
    }

    match current {
        Some((hunk, 0, 0)) => hunks.push(hunk),
        Some(_) => return Err(PatchError::Truncated),
        None => {}
    }

    Ok((hunks, markers))
}

/// Parses `@@ -old_start[,old_len] +new_start[,new_len] @@ ...`.
fn parse_header(line: &str) -> Result<(usize, usize, usize), PatchError> {
    let bad = || PatchError::BadHeader(line.to_string());
    let mut parts = line.split_whitespace();
    if parts.next() != Some("@@") {
        return Err(bad());
    }
    let old = parts.next().and_then(|p| p.strip_prefix('-')).ok_or_else(bad)?;
    let new = parts.next().and_then(|p| p.strip_prefix('+')).ok_or_else(bad)?;
    let (old_start, old_len) = parse_range(old).ok_or_else(bad)?;
    let (_, new_len) = parse_range(new).ok_or_else(bad)?;
    Ok((old_start, old_len, new_len))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_modification() {
        let base = "one\ntwo\nthree\n";
        let patch = "@@ -1,3 +1,3 @@\n one\n-two\n+2\n three";
        assert_eq!(apply_patch(base, patch).unwrap(), "one\n2\nthree\n");
    }

    #[test]
    fn test_apply_insert_at_start_and_end() {
        let base = "b\nc\n";
        let patch = "@@ -0,0 +1 @@\n+a\n@@ -2,0 +4 @@\n+d";
        assert_eq!(apply_patch(base, patch).unwrap(), "a\nb\nc\nd\n");
    }

    #[test]
    fn test_apply_multiple_hunks() {
        let base = "1\n2\n3\n4\n5\n6\n7\n8\n";
        let patch = "@@ -1,2 +1,2 @@\n-1\n+one\n 2\n@@ -7,2 +7,3 @@\n 7\n-8\n+eight\n+nine";
        assert_eq!(
            apply_patch(base, patch).unwrap(),
            "one\n2\n3\n4\n5\n6\n7\neight\nnine\n"
        );
    }

    #[test]
    fn test_context_mismatch() {
        let base = "one\ntwo\n";
        let patch = "@@ -1,2 +1,2 @@\n one\n-zwei\n+2";
        assert_eq!(
            apply_patch(base, patch),
            Err(PatchError::ContextMismatch { line: 2 })
        );
    }

    #[test]
    fn test_truncated_hunk() {
        let patch = "@@ -1,3 +1,3 @@\n one";
        assert_eq!(apply_patch("one\ntwo\nthree\n", patch), Err(PatchError::Truncated));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            apply_patch("x\n", "@@ nonsense @@\n x"),
            Err(PatchError::BadHeader(_))
        ));
    }

    #[test]
    fn test_no_newline_markers() {
        let base = "a\nb";
        let patch = "@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+c";
        assert_eq!(apply_patch(base, patch).unwrap(), "a\nc\n");

        let base = "a\nb\n";
        let patch = "@@ -1,2 +1,2 @@\n a\n-b\n+c\n\\ No newline at end of file";
        assert_eq!(apply_patch(base, patch).unwrap(), "a\nc");
    }

    #[test]
    fn test_new_file_from_empty_base() {
        let patch = "@@ -0,0 +1,2 @@\n+hello\n+world";
        assert_eq!(apply_patch("", patch).unwrap(), "hello\nworld\n");
    }

    #[test]
    fn test_added_lines() {
        let patch = "@@ -0,0 +1,3 @@\n+import os\n+\n+print(os.name)";
        assert_eq!(added_lines(patch), "import os\n\nprint(os.name)");
        assert_eq!(added_lines("+++ b/file\n+x"), "x");
    }
}
