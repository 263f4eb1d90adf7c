pub mod extended;
pub mod legacy;
pub mod scan;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// Which output grammar the tagging tool was asked to produce.
///
/// `Legacy` is the etags-style table (`-e`): one file-header line per file
/// followed by tag lines packed with non-printable separators and a byte
/// offset. `Extended` is the tab-delimited table (`--excmd=pattern
/// --fields=*`): a find command plus `key:value` extension fields per line.
#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum TagFormat {
    Legacy,
    Extended,
}

/// One symbol definition discovered by the tagging tool.
///
/// Both grammars produce this shape; `byte_off` is only present for the
/// legacy format, and the extension fields are only populated by the
/// extended format.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub file: String,
    pub name: String,
    /// 1-based source line of the definition.
    pub line: u32,
    /// Verbatim text of the definition line up to (legacy) or around
    /// (extended) the symbol; used to recover the symbol's column.
    pub def_line_prefix: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub signature: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub type_ref: String,
    /// Byte offset of the definition into the file (legacy format only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_off: Option<usize>,
}

/// Parse a complete tag table in the given format.
///
/// The first malformed line aborts the whole parse; downstream overlap
/// logic assumes a fully consistent file-to-line mapping, so partial
/// results are never returned.
pub fn parse(format: TagFormat, input: &str) -> Result<Vec<Tag>> {
    match format {
        TagFormat::Legacy => legacy::parse(input),
        TagFormat::Extended => extended::parse(input),
    }
}

/// Display formatting data derived from a tag: the keyword before the name,
/// the type text after it, and the separator when the type is
/// colon-introduced. `None` when the name does not occur in the
/// definition-line prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefFormat {
    pub name: String,
    pub keyword: String,
    #[serde(rename = "type")]
    pub type_text: String,
    pub kind: String,
    pub separator: String,
}

pub fn def_format(tag: &Tag) -> Option<DefFormat> {
    let name_idx = tag.def_line_prefix.find(&tag.name)?;
    let keyword = tag.def_line_prefix[..name_idx].trim();
    let after = &tag.def_line_prefix[name_idx + tag.name.len()..];
    let (separator, type_text) = match after.strip_prefix(':') {
        Some(rest) => (":", rest.trim().to_string()),
        None => ("", after.to_string()),
    };
    Some(DefFormat {
        name: tag.name.clone(),
        keyword: keyword.to_string(),
        type_text,
        kind: keyword.to_string(),
        separator: separator.to_string(),
    })
}

/// JSON dump record for the `tags` subcommand. Legacy tags carry a
/// definition span derived from the byte offset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDump<'a> {
    #[serde(flatten)]
    pub tag: &'a Tag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub def_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub def_end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DefFormat>,
}

pub fn dump(tags: &[Tag]) -> Vec<TagDump<'_>> {
    tags.iter()
        .map(|tag| TagDump {
            tag,
            def_start: tag.byte_off,
            def_end: tag.byte_off.map(|off| off + tag.name.len()),
            format: def_format(tag),
        })
        .collect()
}
