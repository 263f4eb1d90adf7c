//! Parser for the legacy (etags-style) tag table.
//!
//! The table alternates file-header lines (`filename,byteCount`) with tag
//! lines that pack the definition-line prefix, symbol name, line number and
//! byte offset into one line using three separator bytes: DEL (0x7f) before
//! the name, SOH (0x01) before the line number, and a comma before the byte
//! offset.

use super::Tag;
use anyhow::{Result, bail};

const SEP_TAG: char = '\x7f';
const SEP_POS: char = '\x01';
const SEP_COL: char = ',';

pub fn parse(input: &str) -> Result<Vec<Tag>> {
    let mut parser = Parser::default();
    for line in input.lines() {
        parser.parse_line(line.trim())?;
    }
    Ok(parser.tags)
}

#[derive(Default)]
struct Parser {
    cur_file: String,
    tags: Vec<Tag>,
}

impl Parser {
    fn parse_line(&mut self, line: &str) -> Result<()> {
        // Section separators (\x0c) trim to empty and fall through here.
        if line.is_empty() || line.starts_with('!') {
            return Ok(());
        }

        let Some(name_idx) = line.find(SEP_TAG) else {
            // File header line
            let parts: Vec<&str> = line.split(SEP_COL).collect();
            if parts.len() != 2 {
                bail!("tag table parse error: unrecognized format, line was {line:?}");
            }
            if parts[1].parse::<usize>().is_err() {
                bail!("tag table parse error: invalid byte count, line was {line:?}");
            }
            self.cur_file = parts[0].to_string();
            return Ok(());
        };

        // Tag line
        let Some(pos_rel) = line[name_idx..].find(SEP_POS) else {
            bail!(
                "tag table parse error: could not find separator {:?}, line was {line:?}",
                SEP_POS
            );
        };
        let pos_idx = name_idx + pos_rel;

        let Some(col_rel) = line[pos_idx..].find(SEP_COL) else {
            bail!(
                "tag table parse error: could not find separator {:?}, line was {line:?}",
                SEP_COL
            );
        };
        let col_idx = pos_idx + col_rel;

        let Ok(line_no) = line[pos_idx + 1..col_idx].parse::<u32>() else {
            bail!("tag table parse error: could not parse line number, line was {line:?}");
        };
        if line_no == 0 {
            bail!("tag table parse error: line number must be >= 1, line was {line:?}");
        }
        let Ok(byte_off) = line[col_idx + 1..].parse::<usize>() else {
            bail!("tag table parse error: could not parse byte offset, line was {line:?}");
        };

        self.tags.push(Tag {
            file: self.cur_file.clone(),
            def_line_prefix: line[..name_idx].to_string(),
            name: line[name_idx + 1..pos_idx].to_string(),
            line: line_no,
            byte_off: Some(byte_off),
            ..Default::default()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(lines: &[&str]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_parse_single_tag() {
        let input = table(&["\x0c", "main.go,120", "func doWork(\x7fdoWork\x015,87"]);
        let tags = parse(&input).unwrap();
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.file, "main.go");
        assert_eq!(tag.name, "doWork");
        assert_eq!(tag.line, 5);
        assert_eq!(tag.byte_off, Some(87));
        assert_eq!(tag.def_line_prefix, "func doWork(");
    }

    #[test]
    fn test_round_trip_of_name_line_offset() {
        // Re-deriving (name, line, byteOffset) from parsed fields reproduces
        // the original triple exactly.
        let cases = [("Foo", 5u32, 0usize), ("bar_baz", 12, 4096), ("X", 1, 1)];
        let mut lines = vec!["lib.rs,64".to_string()];
        for (name, line, off) in cases {
            lines.push(format!("fn {name}(\x7f{name}\x01{line},{off}"));
        }
        let tags = parse(&lines.join("\n")).unwrap();
        assert_eq!(tags.len(), cases.len());
        for (tag, (name, line, off)) in tags.iter().zip(cases) {
            assert_eq!(tag.name, name);
            assert_eq!(tag.line, line);
            assert_eq!(tag.byte_off, Some(off));
        }
    }

    #[test]
    fn test_tags_keep_current_file() {
        let input = table(&[
            "a.go,10",
            "func f(\x7ff\x011,0",
            "b.go,20",
            "func g(\x7fg\x012,5",
        ]);
        let tags = parse(&input).unwrap();
        assert_eq!(tags[0].file, "a.go");
        assert_eq!(tags[1].file, "b.go");
    }

    #[test]
    fn test_skips_blank_and_metadata_lines() {
        let input = table(&["", "!_TAG_FILE_FORMAT\t2", "a.go,10", "func f(\x7ff\x011,0"]);
        let tags = parse(&input).unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_malformed_line_aborts_with_zero_tags() {
        let err = parse("badline").unwrap_err();
        assert!(err.to_string().contains("badline"), "error was: {err}");
    }

    #[test]
    fn test_missing_position_separator() {
        let err = parse("a.go,10\nfunc f(\x7ff5,0").unwrap_err();
        assert!(err.to_string().contains("could not find separator"));
    }

    #[test]
    fn test_non_numeric_line_number() {
        let err = parse("a.go,10\nfunc f(\x7ff\x01five,0").unwrap_err();
        assert!(err.to_string().contains("could not parse line number"));
    }

    #[test]
    fn test_non_numeric_byte_offset() {
        let err = parse("a.go,10\nfunc f(\x7ff\x015,zero").unwrap_err();
        assert!(err.to_string().contains("could not parse byte offset"));
    }

    #[test]
    fn test_non_numeric_file_byte_count() {
        let err = parse("a.go,big").unwrap_err();
        assert!(err.to_string().contains("invalid byte count"));
    }
}
