//! Diff-to-symbol correlator: intersects hunk line ranges with tag extents
//! to find modified definitions, and runs a best-effort lexical pass over
//! added lines to flag newly referenced identifiers.

pub mod diff;

use crate::index::SymbolIndex;
use crate::model::{ChangeEvent, ChangeKind};
use crate::tags::scan::run_tagging_tool;
use crate::tags::{Tag, TagFormat};
use anyhow::Result;
use self::diff::HunkDiff;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::debug;

// Best-effort lexical patterns, not a parser: an identifier immediately
// followed by `(` reads as a call, `<` followed by a capitalized identifier
// reads as a markup component. Both produce false positives and negatives.
static CALL_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z0-9]+)\(").expect("call regex"));
static COMPONENT_RX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Z]\w+)").expect("component regex"));

/// Identifiers never reported as references: language built-ins, primitive
/// type names, and the literal TODO marker.
const IGNORED_IDENTIFIERS: &[&str] = &[
    "append",
    "cap",
    "close",
    "copy",
    "delete",
    "image",
    "len",
    "make",
    "new",
    "print",
    "panic",
    "println",
    "real",
    "recover",
    "bool",
    "byte",
    "complex128",
    "complex64",
    "float32",
    "float64",
    "int",
    "int16",
    "int32",
    "int64",
    "int8",
    "rune",
    "string",
    "uint",
    "uint16",
    "uint32",
    "uint64",
    "uint8",
    "uintptr",
    "func",
    "TODO",
];

fn is_ignored(identifier: &str) -> bool {
    IGNORED_IDENTIFIERS.contains(&identifier)
}

/// Commit URL for event links; legacy host names are rewritten to their
/// public mirror.
pub fn commit_url(repo_slug: &str, commit: &str) -> String {
    let slug = repo_slug.replace("sourcegraph.com", "github.com");
    format!("https://www.{slug}/commit/{commit}")
}

/// Deterministic event identifier so clients can deduplicate across
/// repeated runs on the same commit.
pub fn event_id(kind: ChangeKind, name: &str, file: &str, url: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\x00");
    hasher.update(name.as_bytes());
    hasher.update(b"\x00");
    hasher.update(file.as_bytes());
    hasher.update(b"\x00");
    hasher.update(url.as_bytes());
    let hash = hasher.finalize();
    format!("evt_{}", &hash.to_hex()[..16])
}

/// Correlate raw unified-diff text against freshly built tag tables for the
/// changed files and return the ordered event list.
pub fn correlate(diff_text: &str, commit: &str, repo_slug: &str) -> Result<Vec<ChangeEvent>> {
    let hunks = diff::parse(diff_text)?;
    let files = changed_files(&hunks);
    if files.is_empty() {
        return Ok(Vec::new());
    }
    debug!(files = files.len(), hunks = hunks.len(), "correlating diff");

    let paths = files.iter().map(std::path::PathBuf::from).collect::<Vec<_>>();
    let tags = run_tagging_tool(TagFormat::Extended, &paths)?;
    let index = SymbolIndex::build(tags);
    let url = commit_url(repo_slug, commit);
    Ok(correlate_index(&hunks, &index, commit, &url))
}

/// Changed file names in diff order, deduplicated.
fn changed_files(hunks: &[HunkDiff]) -> Vec<String> {
    let mut files: Vec<String> = Vec::new();
    for hunk in hunks {
        if files.last().map(String::as_str) != Some(hunk.filename.as_str()) {
            files.push(hunk.filename.clone());
        }
    }
    files
}

/// Pure correlation pass over already-parsed hunks and an already-built
/// index. Modification events precede reference events; within each group
/// the order follows the tag/hunk scan order.
pub fn correlate_index(
    hunks: &[HunkDiff],
    index: &SymbolIndex,
    commit: &str,
    url: &str,
) -> Vec<ChangeEvent> {
    let mut hunks_by_file: HashMap<&str, Vec<&HunkDiff>> = HashMap::new();
    for hunk in hunks {
        hunks_by_file.entry(hunk.filename.as_str()).or_default().push(hunk);
    }

    let mut events = Vec::new();

    // A tag is modified when any hunk's new-side range intersects the tag's
    // extent; each tag is reported at most once.
    for file in index.files() {
        let Some(file_hunks) = hunks_by_file.get(file) else {
            continue;
        };
        for (tag, extent_end) in index.extents(file) {
            let overlaps = file_hunks
                .iter()
                .any(|hunk| !(hunk.new_start > extent_end || hunk.new_end < tag.line));
            if overlaps {
                events.push(modified_event(tag, commit, url));
            }
        }
    }

    // Every added line is scanned for call-like and markup-component
    // references; one event per occurrence, no deduplication across lines.
    for hunk in hunks {
        for line in &hunk.new {
            for captures in CALL_RX.captures_iter(&line.text) {
                let name = &captures[1];
                if !is_ignored(name) {
                    events.push(referenced_event(
                        name,
                        &hunk.filename,
                        url,
                        format!("function {name} was referenced"),
                        format!(
                            "function {name} was referenced in file {} in commit {commit}",
                            hunk.filename
                        ),
                    ));
                }
            }
            for captures in COMPONENT_RX.captures_iter(&line.text) {
                let name = &captures[1];
                if !is_ignored(name) {
                    events.push(referenced_event(
                        name,
                        &hunk.filename,
                        url,
                        format!("component {name} was used"),
                        format!(
                            "component {name} was used in file {} in commit {commit}",
                            hunk.filename
                        ),
                    ));
                }
            }
        }
    }

    events
}

fn modified_event(tag: &Tag, commit: &str, url: &str) -> ChangeEvent {
    ChangeEvent {
        id: event_id(ChangeKind::Modified, &tag.name, &tag.file, url),
        title: format!("{} {}{} was modified", tag.kind, tag.name, tag.signature),
        body: format!(
            "{} {}{} in {} was modified in commit {commit}",
            tag.kind, tag.name, tag.signature, tag.file
        ),
        url: url.to_string(),
        kind: ChangeKind::Modified,
    }
}

fn referenced_event(
    name: &str,
    file: &str,
    url: &str,
    title: String,
    body: String,
) -> ChangeEvent {
    ChangeEvent {
        id: event_id(ChangeKind::Referenced, name, file, url),
        title,
        body,
        url: url.to_string(),
        kind: ChangeKind::Referenced,
    }
}
