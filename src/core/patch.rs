//! Applies code returned by the model back onto the user's files
//!
//! Blocks are paired with files by a [`BlockMapping`], each pair is diffed
//! line by line, and the block's lines replace the file's contents.

#![allow(dead_code)]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ai::context::file_name;
use crate::core::parser::{extract_code_blocks, CodeBlock};
use crate::error::PatchError;

/// One line-level difference, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    Addition { line: usize, text: String },
    Deletion { line: usize, text: String },
    Substitution { line: usize, old: String, new: String },
}

impl fmt::Display for LineChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineChange::Addition { line, text } => write!(f, "+ Line {}: {}", line, text),
            LineChange::Deletion { line, text } => write!(f, "- Line {}: {}", line, text),
            LineChange::Substitution { line, old, new } => {
                write!(f, "-> Line {} changed from: {} to: {}", line, old, new)
            }
        }
    }
}

/// Positional line diff.
///
/// Lines only in `new` are additions, lines only in `original` are deletions,
/// and differing non-empty lines at the same index are substitutions.
pub fn diff_lines(original: &[String], new: &[String]) -> Vec<LineChange> {
    let mut changes = Vec::new();
    for i in 0..original.len().max(new.len()) {
        let line = i + 1;
        match (original.get(i), new.get(i)) {
            (None, Some(text)) => changes.push(LineChange::Addition {
                line,
                text: text.clone(),
            }),
            (Some(text), None) => changes.push(LineChange::Deletion {
                line,
                text: text.clone(),
            }),
            (Some(old), Some(new)) if old != new && !old.is_empty() && !new.is_empty() => {
                changes.push(LineChange::Substitution {
                    line,
                    old: old.clone(),
                    new: new.clone(),
                })
            }
            _ => {}
        }
    }
    changes
}

/// Result of patching one file
#[derive(Debug, Clone, PartialEq)]
pub struct CodeDiff {
    pub path: PathBuf,
    pub changes: Vec<LineChange>,
    /// Lines now in the file
    pub lines: Vec<String>,
}

/// Decides which block goes to which file
pub trait BlockMapping {
    fn assign<'a>(&self, blocks: &'a [CodeBlock], files: &[PathBuf])
        -> Vec<(PathBuf, &'a CodeBlock)>;
}

/// i-th block to i-th file; extras on either side are ignored
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalMapping;

impl BlockMapping for PositionalMapping {
    fn assign<'a>(
        &self,
        blocks: &'a [CodeBlock],
        files: &[PathBuf],
    ) -> Vec<(PathBuf, &'a CodeBlock)> {
        files.iter().cloned().zip(blocks.iter()).collect()
    }
}

/// Matches a block to the file named in its fence info, e.g. ```` ```rust main.rs ````
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotatedMapping;

impl BlockMapping for AnnotatedMapping {
    fn assign<'a>(
        &self,
        blocks: &'a [CodeBlock],
        files: &[PathBuf],
    ) -> Vec<(PathBuf, &'a CodeBlock)> {
        blocks
            .iter()
            .filter_map(|block| {
                let wanted = block.annotated_file()?;
                files
                    .iter()
                    .find(|path| path.ends_with(wanted) || file_name(path) == wanted)
                    .map(|path| (path.clone(), block))
            })
            .collect()
    }
}

/// Rewrite `path` with `new_lines`, returning what changed
pub fn patch_file(path: &Path, new_lines: &[String]) -> Result<CodeDiff, PatchError> {
    let patch_err = |source| PatchError {
        name: file_name(path),
        source,
    };

    let original = fs::read_to_string(path).map_err(patch_err)?;
    let original_lines: Vec<String> = original.lines().map(str::to_string).collect();
    let changes = diff_lines(&original_lines, new_lines);

    if original_lines != new_lines {
        let mut content = new_lines.join("\n");
        let trailing_newline = original.is_empty() || original.ends_with('\n');
        if trailing_newline && !new_lines.is_empty() {
            content.push('\n');
        }
        fs::write(path, content).map_err(patch_err)?;
        debug!(path = %path.display(), changes = changes.len(), "Patched file");
    }

    Ok(CodeDiff {
        path: path.to_path_buf(),
        changes,
        lines: new_lines.to_vec(),
    })
}

/// Everything that happened while applying a response's code blocks
#[derive(Debug, Default)]
pub struct PatchReport {
    pub blocks_found: usize,
    pub diffs: Vec<CodeDiff>,
    pub failures: Vec<PatchError>,
}

impl PatchReport {
    pub fn touched_files(&self) -> bool {
        !self.diffs.is_empty()
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.blocks_found == 0 {
            return write!(f, "\nFailed to extract code blocks from message.");
        }
        if self.diffs.is_empty() && self.failures.is_empty() {
            return write!(f, "\nNo code blocks matched the provided files.");
        }
        if !self.diffs.is_empty() {
            write!(f, "\nSuccessfully applied changes to files.\nChanges Summary:\n")?;
            for change in self.diffs.iter().flat_map(|d| &d.changes) {
                writeln!(f, "{}", change)?;
            }
        }
        for failure in &self.failures {
            write!(f, "\n{}", failure)?;
        }
        Ok(())
    }
}

/// Extract code blocks from `response` and write them into `files`
pub fn apply_code_blocks(
    response: &str,
    files: &[PathBuf],
    mapping: &dyn BlockMapping,
) -> PatchReport {
    let blocks = extract_code_blocks(response);
    let mut report = PatchReport {
        blocks_found: blocks.len(),
        ..PatchReport::default()
    };

    for (path, block) in mapping.assign(&blocks, files) {
        match patch_file(&path, &block.lines) {
            Ok(diff) => report.diffs.push(diff),
            Err(e) => {
                warn!("{}: {}", e, e.source);
                report.failures.push(e);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let a = lines(&["a", "b", "c"]);
        assert!(diff_lines(&a, &a).is_empty());
    }

    #[test]
    fn test_diff_shrink_records_deletions() {
        let original = lines(&["1", "2", "3", "4", "5"]);
        let new = lines(&["1", "2", "3"]);
        assert_eq!(
            diff_lines(&original, &new),
            vec![
                LineChange::Deletion { line: 4, text: "4".to_string() },
                LineChange::Deletion { line: 5, text: "5".to_string() },
            ]
        );
    }

    #[test]
    fn test_diff_grow_and_substitute() {
        let original = lines(&["x = 1", "", "y = 2"]);
        let new = lines(&["x = 10", "z = 0", "y = 2", "print(x)"]);
        assert_eq!(
            diff_lines(&original, &new),
            vec![
                LineChange::Substitution {
                    line: 1,
                    old: "x = 1".to_string(),
                    new: "x = 10".to_string()
                },
                LineChange::Addition { line: 4, text: "print(x)".to_string() },
            ]
        );
    }

    #[test]
    fn test_change_formatting() {
        assert_eq!(
            LineChange::Addition { line: 3, text: "c".into() }.to_string(),
            "+ Line 3: c"
        );
        assert_eq!(
            LineChange::Deletion { line: 4, text: "d".into() }.to_string(),
            "- Line 4: d"
        );
        assert_eq!(
            LineChange::Substitution { line: 1, old: "a".into(), new: "b".into() }.to_string(),
            "-> Line 1 changed from: a to: b"
        );
    }

    #[test]
    fn test_identical_block_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.py");
        let original = "def f():\n    return 1\n";
        fs::write(&path, original).unwrap();

        let response = "```python\ndef f():\n    return 1\n```";
        let report = apply_code_blocks(response, &[path.clone()], &PositionalMapping);

        assert_eq!(report.diffs.len(), 1);
        assert!(report.diffs[0].changes.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_shrink_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        fs::write(&path, "l1\nl2\nl3\nl4\nl5\n").unwrap();

        let report = apply_code_blocks("```\nl1\nl2\nl3\n```", &[path.clone()], &PositionalMapping);

        let changes = &report.diffs[0].changes;
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, LineChange::Deletion { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "l1\nl2\nl3\n");
        assert_eq!(
            report.to_string(),
            "\nSuccessfully applied changes to files.\nChanges Summary:\n- Line 4: l4\n- Line 5: l5\n"
        );
    }

    #[test]
    fn test_positional_mapping_ignores_extras() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "old a\n").unwrap();
        fs::write(&b, "old b\n").unwrap();

        // One block, two files: only the first file changes
        let report = apply_code_blocks("```\nnew a\n```", &[a.clone(), b.clone()], &PositionalMapping);
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(fs::read_to_string(&a).unwrap(), "new a\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "old b\n");

        // Two blocks, one file: the second block is ignored
        let report = apply_code_blocks("```\nA\n```\n```\nB\n```", &[a.clone()], &PositionalMapping);
        assert_eq!(report.blocks_found, 2);
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(fs::read_to_string(&a).unwrap(), "A\n");
    }

    #[test]
    fn test_annotated_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "a = 0\n").unwrap();
        fs::write(&b, "b = 0\n").unwrap();

        let response = "```python b.py\nb = 1\n```\n```python\nunnamed = 1\n```";
        let report = apply_code_blocks(response, &[a.clone(), b.clone()], &AnnotatedMapping);

        assert_eq!(report.diffs.len(), 1);
        assert_eq!(report.diffs[0].path, b);
        assert_eq!(fs::read_to_string(&a).unwrap(), "a = 0\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b = 1\n");
    }

    #[test]
    fn test_failure_does_not_block_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.rs");
        let ok = dir.path().join("ok.rs");
        fs::write(&ok, "old\n").unwrap();

        let response = "```\nfirst\n```\n```\nsecond\n```";
        let report = apply_code_blocks(response, &[missing, ok.clone()], &PositionalMapping);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "missing.rs");
        assert_eq!(fs::read_to_string(&ok).unwrap(), "second\n");
        assert!(report
            .to_string()
            .ends_with("\nFailed to apply changes to file: missing.rs"));
    }

    #[test]
    fn test_no_blocks_report() {
        let report = apply_code_blocks("No code here.", &[], &PositionalMapping);
        assert_eq!(report.to_string(), "\nFailed to extract code blocks from message.");
        assert!(!report.touched_files());
    }

    #[test]
    fn test_unmatched_blocks_report() {
        let report = apply_code_blocks("```\nx = 1\n```", &[], &PositionalMapping);
        assert_eq!(report.blocks_found, 1);
        assert_eq!(report.to_string(), "\nNo code blocks matched the provided files.");

        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.py");
        fs::write(&a, "a = 0\n").unwrap();
        let report = apply_code_blocks("```python other.py\nb = 1\n```", &[a.clone()], &AnnotatedMapping);
        assert_eq!(report.to_string(), "\nNo code blocks matched the provided files.");
        assert_eq!(fs::read_to_string(&a).unwrap(), "a = 0\n");
    }

    #[test]
    fn test_file_without_trailing_newline_keeps_style() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.txt");
        fs::write(&path, "one\ntwo").unwrap();

        patch_file(&path, &lines(&["one", "three"])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\nthree");
    }
}
