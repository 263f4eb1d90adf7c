//! In-memory symbol index built fresh per request from a parsed tag table.

use crate::tags::Tag;
use std::collections::HashMap;

/// Tags grouped by file, each file's tags sorted by line. Files keep the
/// order in which they first appeared in the tool's output so responses
/// follow scan order.
pub struct SymbolIndex {
    files: Vec<String>,
    by_file: HashMap<String, Vec<Tag>>,
}

impl SymbolIndex {
    pub fn build(tags: Vec<Tag>) -> Self {
        let mut files = Vec::new();
        let mut by_file: HashMap<String, Vec<Tag>> = HashMap::new();
        for tag in tags {
            if !by_file.contains_key(&tag.file) {
                files.push(tag.file.clone());
            }
            by_file.entry(tag.file.clone()).or_default().push(tag);
        }
        for tags in by_file.values_mut() {
            tags.sort_by_key(|tag| tag.line);
        }
        Self { files, by_file }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files in first-seen order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Tags of one file, sorted by line. Empty for unknown files.
    pub fn tags_for_file(&self, file: &str) -> &[Tag] {
        self.by_file.get(file).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every tag whose name matches exactly, in scan order. No ranking.
    pub fn find_by_name(&self, name: &str) -> Vec<&Tag> {
        self.files()
            .flat_map(|file| self.tags_for_file(file))
            .filter(|tag| tag.name == name)
            .collect()
    }

    /// Each tag of a file paired with the last line of its extent: one line
    /// before the next tag in the same file, unbounded for the last tag.
    /// Adjacent extents partition the file's line space.
    pub fn extents(&self, file: &str) -> Vec<(&Tag, u32)> {
        let tags = self.tags_for_file(file);
        tags.iter()
            .enumerate()
            .map(|(i, tag)| {
                let end = match tags.get(i + 1) {
                    Some(next) => next.line.saturating_sub(1),
                    None => u32::MAX,
                };
                (tag, end)
            })
            .collect()
    }
}
