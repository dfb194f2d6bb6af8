//! Restricted unified-diff ("V4A") parsing and application.
//!
//! The code-editing collaborator returns diffs in a deliberately small
//! format: a sequence of hunks, each a contiguous run of context (` `),
//! added (`+`) and removed (`-`) lines. A hunk applies only if its
//! context+removed lines appear verbatim and contiguous in the current file
//! content, scanning forward from where the previous hunk matched. There is
//! no fuzzy matching: if the model hallucinated context, the edit fails at
//! propose time and no pending row is written.

use crate::error::{ActionError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Add(String),
    Remove(String),
}

#[derive(Debug, Clone, Default)]
pub struct Hunk {
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// The lines this hunk expects to find in the file (context + removed).
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Context(s) | DiffLine::Remove(s) => Some(s.as_str()),
                DiffLine::Add(_) => None,
            })
            .collect()
    }

    /// The lines the matched span is replaced with (context + added).
    fn new_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                DiffLine::Context(s) | DiffLine::Add(s) => Some(s.as_str()),
                DiffLine::Remove(_) => None,
            })
            .collect()
    }
}

/// Parse a diff into hunks.
///
/// Accepts both the bare format (hunks separated by `@@` markers) and the
/// full patch-block wrapper (`*** Begin Patch` … `*** End Patch` with file
/// headers), which some models emit even when asked not to.
pub fn parse(diff: &str) -> Result<Vec<Hunk>> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current = Hunk::default();

    for raw in diff.lines() {
        // Wrapper noise: patch-block sentinels and file headers.
        if raw.starts_with("*** ") || raw.starts_with("--- ") || raw.starts_with("+++ ") {
            continue;
        }
        if raw.starts_with("@@") {
            if !current.lines.is_empty() {
                hunks.push(std::mem::take(&mut current));
            }
            continue;
        }

        let line = if let Some(rest) = raw.strip_prefix('+') {
            DiffLine::Add(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix('-') {
            DiffLine::Remove(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix(' ') {
            DiffLine::Context(rest.to_string())
        } else if raw.is_empty() {
            // A blank diff line is an empty context line whose leading
            // space was trimmed somewhere along the way.
            DiffLine::Context(String::new())
        } else {
            return Err(ActionError::DiffApply(format!(
                "unexpected diff line: {raw:?}"
            )));
        };
        current.lines.push(line);
    }

    if !current.lines.is_empty() {
        hunks.push(current);
    }
    if hunks.is_empty() {
        return Err(ActionError::DiffApply("diff contains no hunks".to_string()));
    }
    Ok(hunks)
}

/// Apply parsed hunks to `content`.
///
/// Each hunk's old lines must match an exact contiguous run of lines,
/// searched forward from the end of the previous hunk's replacement. A
/// hunk with no context and no removals appends at the end of the file.
pub fn apply(content: &str, hunks: &[Hunk]) -> Result<String> {
    let mut lines: Vec<String> = content.split('\n').map(String::from).collect();
    let mut search_from = 0usize;

    for (i, hunk) in hunks.iter().enumerate() {
        let old = hunk.old_lines();
        let new = hunk.new_lines();

        if old.is_empty() {
            // Pure addition with nothing to anchor on: append.
            search_from = lines.len() + new.len();
            lines.extend(new.into_iter().map(String::from));
            continue;
        }

        let at = find_span(&lines, &old, search_from).ok_or_else(|| {
            ActionError::DiffApply(format!(
                "hunk {} context not found (looking for {:?})",
                i + 1,
                old.first().copied().unwrap_or_default()
            ))
        })?;

        lines.splice(at..at + old.len(), new.iter().map(|s| s.to_string()));
        search_from = at + new.len();
    }

    Ok(lines.join("\n"))
}

/// Parse and apply in one step.
pub fn apply_diff(content: &str, diff: &str) -> Result<String> {
    let hunks = parse(diff)?;
    apply(content, &hunks)
}

fn find_span(lines: &[String], needle: &[&str], from: usize) -> Option<usize> {
    if needle.is_empty() || from + needle.len() > lines.len() {
        return None;
    }
    (from..=lines.len() - needle.len())
        .find(|&i| lines[i..i + needle.len()].iter().zip(needle).all(|(a, b)| a == b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "fn main() {\n    println!(\"hello\");\n}\n";

    #[test]
    fn single_hunk_replaces_matched_span() {
        let diff = " fn main() {\n-    println!(\"hello\");\n+    println!(\"goodbye\");\n }";
        let out = apply_diff(FILE, diff).unwrap();
        assert_eq!(out, "fn main() {\n    println!(\"goodbye\");\n}\n");
    }

    #[test]
    fn context_mismatch_is_an_error() {
        let diff = " fn main() {\n-    println!(\"HELLO\");\n+    println!(\"goodbye\");\n }";
        let err = apply_diff(FILE, diff).unwrap_err();
        assert!(matches!(err, ActionError::DiffApply(_)));
    }

    #[test]
    fn hunks_scan_forward_not_backward() {
        let content = "a\nb\na\nb\n";
        // First hunk rewrites the first "a"; second hunk's "a" must match
        // the later occurrence, not rematch the start.
        let diff = "-a\n+x\n@@\n-a\n+y";
        let out = apply_diff(content, diff).unwrap();
        assert_eq!(out, "x\nb\ny\nb\n");
    }

    #[test]
    fn second_hunk_cannot_match_before_first() {
        let content = "a\nb\n";
        // Second hunk wants "a", which only exists before the first match point.
        let diff = "-b\n+x\n@@\n-a\n+y";
        assert!(apply_diff(content, diff).is_err());
    }

    #[test]
    fn pure_addition_appends() {
        let diff = "+// trailer";
        let out = apply_diff("line\n", diff).unwrap();
        assert_eq!(out, "line\n\n// trailer");
    }

    #[test]
    fn patch_block_wrapper_is_tolerated() {
        let diff = "*** Begin Patch\n*** Update File: src/main.rs\n-fn main() {\n+fn start() {\n*** End Patch";
        let out = apply_diff(FILE, diff).unwrap();
        assert!(out.starts_with("fn start() {"));
    }

    #[test]
    fn multi_line_hunk_replaces_whole_span() {
        let content = "one\ntwo\nthree\nfour\n";
        let diff = " one\n-two\n-three\n+TWO\n four";
        let out = apply_diff(content, diff).unwrap();
        assert_eq!(out, "one\nTWO\nfour\n");
    }

    #[test]
    fn empty_diff_is_an_error() {
        assert!(apply_diff(FILE, "").is_err());
    }
}
