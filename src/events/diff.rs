//! Unified-diff scanner. Walks the diff text top to bottom, tracking the
//! current file from `diff --git` headers and the old/new line counters
//! from `@@` hunk headers, and collects one `HunkDiff` per hunk.

use anyhow::{Result, bail};
use regex::Regex;
use std::sync::LazyLock;

static FILE_HEADER_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^diff --git a/(\S+) b/\S+").expect("file header regex"));
static HUNK_HEADER_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+),(\d+) \+(\d+),(\d+) @@").expect("hunk header regex"));

/// One added or removed line, carrying its line number in the respective
/// image of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub num: u32,
    pub text: String,
}

/// One contiguous changed region of one file. Line ranges are 1-based and
/// inclusive; `new_end == new_start - 1` for pure deletions.
#[derive(Debug, Clone)]
pub struct HunkDiff {
    pub filename: String,
    pub old_start: u32,
    pub old_end: u32,
    pub old: Vec<DiffLine>,
    pub new_start: u32,
    pub new_end: u32,
    pub new: Vec<DiffLine>,
}

/// Scan unified-diff text into per-file hunks, preserving file-diff order.
/// Lines before the first file header or first hunk header are ignored; a
/// hunk header that does not match the expected shape is a hard error.
pub fn parse(diff: &str) -> Result<Vec<HunkDiff>> {
    let mut hunks: Vec<HunkDiff> = Vec::new();
    let mut filename = String::new();
    let mut old_line: u32 = 0;
    let mut new_line: u32 = 0;

    for line in diff.lines() {
        if let Some(captures) = FILE_HEADER_RX.captures(line) {
            filename = captures[1].to_string();
            continue;
        }
        if filename.is_empty() {
            continue;
        }
        // Metadata between the file header and the first hunk; `---`/`+++`
        // must not be classified as removed/added lines.
        if line.starts_with("index ") || line.starts_with("---") || line.starts_with("+++") {
            continue;
        }
        if line.starts_with("@@") {
            let Some(captures) = HUNK_HEADER_RX.captures(line) else {
                bail!("malformed hunk header, line was {line:?}");
            };
            let old_start: u32 = captures[1].parse().unwrap_or(0);
            let old_count: u32 = captures[2].parse().unwrap_or(0);
            let new_start: u32 = captures[3].parse().unwrap_or(0);
            let new_count: u32 = captures[4].parse().unwrap_or(0);
            old_line = old_start;
            new_line = new_start;
            hunks.push(HunkDiff {
                filename: filename.clone(),
                old_start,
                old_end: (old_start + old_count).saturating_sub(1),
                old: Vec::new(),
                new_start,
                new_end: (new_start + new_count).saturating_sub(1),
                new: Vec::new(),
            });
            continue;
        }
        let Some(hunk) = hunks.last_mut() else {
            continue;
        };
        if let Some(text) = line.strip_prefix('+') {
            hunk.new.push(DiffLine {
                num: new_line,
                text: text.to_string(),
            });
            new_line += 1;
        } else if let Some(text) = line.strip_prefix('-') {
            hunk.old.push(DiffLine {
                num: old_line,
                text: text.to_string(),
            });
            old_line += 1;
        } else {
            old_line += 1;
            new_line += 1;
        }
    }

    Ok(hunks)
}
