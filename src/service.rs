//! Symbol resolution service: answers document-symbol, definition,
//! reference, and hover queries against a freshly built index scoped to one
//! file or one directory. Every query re-runs the tagging tool; nothing is
//! cached across requests.

use crate::config::Config;
use crate::index::SymbolIndex;
use crate::model::{Hover, Location, MarkedString, Position, Range, SymbolInformation, symbol_kind};
use crate::tags::scan::{self, ScanOptions};
use crate::tags::{Tag, TagFormat};
use crate::util;
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Delimiters that terminate the token under the cursor.
const TOKEN_DELIMITERS: &[char] = &[
    ' ', '\r', '\n', '\t', '(', ')', '"', '\'', '.', ',', '*', '-', '<', '>', ':',
];

/// Symbols defined in exactly the requested file, in tool output order.
pub fn document_symbols(path: &Path) -> Result<Vec<SymbolInformation>> {
    let tags = scan::run_tagging_tool(TagFormat::Extended, &[path.to_path_buf()])?;
    Ok(tags_to_symbols(tags.iter()))
}

/// Locations of every tag in the containing directory whose name equals the
/// token under the cursor. No ranking; all matches are returned.
pub fn definition(path: &Path, position: Position, options: ScanOptions) -> Result<Vec<Location>> {
    let content = util::read_to_string(path)?;
    let (token, _) = extract_token(&content, position)?;
    if token.is_empty() {
        return Ok(Vec::new());
    }
    debug!(%token, "definition lookup");

    let files = sibling_files(path, options)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let tags = scan::run_tagging_tool(TagFormat::Extended, &files)?;
    let index = SymbolIndex::build(tags);
    let matched = index.find_by_name(&token);
    debug!(matches = matched.len(), "definition lookup finished");

    Ok(tags_to_symbols(matched.into_iter())
        .into_iter()
        .map(|symbol| symbol.location)
        .collect())
}

/// Occurrences of the token under the cursor across every file in the
/// containing directory.
///
/// This is a plain substring scan, not semantic resolution: substring
/// collisions produce false positives and callers must tolerate them.
pub fn references(path: &Path, position: Position, options: ScanOptions) -> Result<Vec<Location>> {
    let content = util::read_to_string(path)?;
    let (token, _) = extract_token(&content, position)?;
    if token.is_empty() {
        return Ok(Vec::new());
    }
    debug!(%token, "reference scan");

    let mut locations = Vec::new();
    for file in sibling_files(path, options)? {
        // Directory neighbors may be binary; scan them lossily instead of
        // failing the whole request.
        let Ok(bytes) = std::fs::read(&file) else {
            warn!(file = %file.display(), "skipping unreadable file");
            continue;
        };
        let text = String::from_utf8_lossy(&bytes);
        let uri = util::path_to_uri(&file.to_string_lossy());
        for (line_idx, line) in text.split('\n').enumerate() {
            for (col, _) in line.match_indices(token.as_str()) {
                locations.push(Location {
                    uri: uri.clone(),
                    range: Range {
                        start: Position {
                            line: line_idx as u32,
                            character: col as u32,
                        },
                        end: Position {
                            line: line_idx as u32,
                            character: (col + token.len()) as u32,
                        },
                    },
                });
            }
        }
    }
    Ok(locations)
}

/// Fixed placeholder content; real documentation lookup is intentionally
/// not implemented.
pub fn hover() -> Hover {
    Hover {
        contents: vec![MarkedString {
            language: "markdown".to_string(),
            value: "Hello CTags!".to_string(),
        }],
    }
}

fn sibling_files(path: &Path, options: ScanOptions) -> Result<Vec<PathBuf>> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    scan::list_dir_files(dir.unwrap_or_else(|| Path::new(".")), options)
}

/// Map tags onto symbol records. The display range spans the column where
/// the name occurs inside the definition-line prefix; tags whose name never
/// occurs there have no recoverable position and are dropped, not surfaced
/// as zero-width ranges.
pub fn tags_to_symbols<'a>(tags: impl Iterator<Item = &'a Tag>) -> Vec<SymbolInformation> {
    let mut symbols = Vec::new();
    for tag in tags {
        let Some(name_idx) = tag.def_line_prefix.find(&tag.name) else {
            warn!(
                name = %tag.name,
                prefix = %tag.def_line_prefix,
                "dropping tag: name not found in definition line"
            );
            continue;
        };
        symbols.push(SymbolInformation {
            name: tag.name.clone(),
            kind: symbol_kind(&tag.kind),
            location: Location {
                uri: util::path_to_uri(&tag.file),
                range: Range {
                    start: Position {
                        line: tag.line - 1,
                        character: name_idx as u32,
                    },
                    end: Position {
                        line: tag.line - 1,
                        character: (name_idx + tag.name.len()) as u32,
                    },
                },
            },
            container_name: if tag.scope.is_empty() {
                None
            } else {
                Some(tag.scope.clone())
            },
        });
    }
    symbols
}

/// Extract the identifier under the cursor by scanning left and right from
/// the character offset until a delimiter. The line must exist; the
/// character offset is clamped to the line length.
pub fn extract_token(content: &str, position: Position) -> Result<(String, Range)> {
    let lines: Vec<&str> = content.split('\n').collect();
    let line_idx = position.line as usize;
    if line_idx >= lines.len() {
        bail!(
            "position line {} outside file ({} lines)",
            position.line,
            lines.len()
        );
    }
    let line = lines[line_idx];

    let mut character = (position.character as usize).min(line.len());
    while character > 0 && !line.is_char_boundary(character) {
        character -= 1;
    }

    let start = line[..character]
        .rfind(TOKEN_DELIMITERS)
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let end = line[character..]
        .find(TOKEN_DELIMITERS)
        .map(|idx| character + idx)
        .unwrap_or(line.len());

    let token = &line[start..end];
    if token.len() > Config::get().token_max_length {
        bail!(
            "token under cursor exceeds {} bytes",
            Config::get().token_max_length
        );
    }
    Ok((
        token.to_string(),
        Range {
            start: Position {
                line: position.line,
                character: start as u32,
            },
            end: Position {
                line: position.line,
                character: end as u32,
            },
        },
    ))
}
