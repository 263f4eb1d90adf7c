//! Parser for the extended (tab-delimited) tag table.
//!
//! Each line is `name \t file \t findCommand \t extensionFields...` where the
//! find command looks like `/^...$/;"` and the extension fields are
//! `key:value` pairs (`kind`, `language`, `line`, `scope`, `signature`,
//! `access`, `typeref`, ...). The definition-line prefix is recovered by
//! stripping the find-command delimiters and trailing anchor.

use super::Tag;
use anyhow::{Result, bail};
use std::collections::HashMap;

pub fn parse(input: &str) -> Result<Vec<Tag>> {
    let mut tags = Vec::new();
    for raw in input.lines() {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('!') {
            continue;
        }
        tags.push(parse_line(line)?);
    }
    Ok(tags)
}

fn parse_line(line: &str) -> Result<Tag> {
    let Some(t1) = line.find('\t') else {
        bail!("expected tab-delimited line with at least 4 fields, but got {line:?}");
    };
    let name = &line[..t1];

    let Some(t2_rel) = line[t1 + 1..].find('\t') else {
        bail!("expected tab-delimited line with at least 4 fields, but got {line:?}");
    };
    let t2 = t1 + 1 + t2_rel;
    let file = &line[t1 + 1..t2];

    let Some(t3_rel) = line[t2 + 1..].rfind(";\"") else {
        bail!("expected find command to terminate with ';\"', but got {line:?}");
    };
    let t3 = t3_rel + 2 + t2 + 1;
    if line.len() <= t3 || line.as_bytes()[t3] != b'\t' {
        bail!("expected tab immediately following ';\"', line was {line:?}");
    }
    let find_cmd = &line[t2 + 1..t3];

    let mut ext_fields: HashMap<&str, &str> = HashMap::new();
    for field in line[t3 + 1..].split('\t') {
        let Some(colon) = field.find(':') else {
            bail!("malformed extension field {field:?}, line was {line:?}");
        };
        ext_fields.insert(&field[..colon], &field[colon + 1..]);
    }

    let Some(line_no) = ext_fields.get("line").and_then(|v| v.parse::<u32>().ok()) else {
        bail!("could not parse line number, line was {line:?}");
    };
    if line_no == 0 {
        bail!("line number must be >= 1, line was {line:?}");
    }

    let field = |key: &str| ext_fields.get(key).copied().unwrap_or_default().to_string();
    Ok(Tag {
        name: name.to_string(),
        file: file.to_string(),
        line: line_no,
        def_line_prefix: find_cmd_to_def_line_prefix(find_cmd),
        kind: field("kind"),
        language: field("language"),
        scope: field("scope"),
        signature: field("signature"),
        access: field("access"),
        type_ref: field("typeref"),
        byte_off: None,
    })
}

fn find_cmd_to_def_line_prefix(find_cmd: &str) -> String {
    let def = find_cmd.strip_prefix("/^").unwrap_or(find_cmd);
    let def = def.strip_suffix("/;\"").unwrap_or(def);
    let def = def.strip_suffix('$').unwrap_or(def);
    def.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, file: &str, prefix: &str, fields: &str) -> String {
        format!("{name}\t{file}\t/^{prefix}$/;\"\t{fields}")
    }

    #[test]
    fn test_parse_full_line() {
        let input = line(
            "doWork",
            "main.go",
            "func doWork(x, y int) {",
            "kind:function\tlanguage:Go\tline:5\tsignature:(x, y int)\taccess:public",
        );
        let tags = parse(&input).unwrap();
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.name, "doWork");
        assert_eq!(tag.file, "main.go");
        assert_eq!(tag.line, 5);
        assert_eq!(tag.kind, "function");
        assert_eq!(tag.language, "Go");
        assert_eq!(tag.signature, "(x, y int)");
        assert_eq!(tag.access, "public");
        assert_eq!(tag.def_line_prefix, "func doWork(x, y int) {");
    }

    #[test]
    fn test_prefix_never_keeps_delimiters() {
        let input = line("f", "a.go", "func f() {", "kind:function\tline:1");
        let tag = &parse(&input).unwrap()[0];
        assert!(!tag.def_line_prefix.contains("/^"));
        assert!(!tag.def_line_prefix.contains("/;\""));
        assert!(!tag.def_line_prefix.ends_with('$'));
    }

    #[test]
    fn test_unanchored_find_command() {
        // Long definition lines lose the trailing `$` anchor.
        let input = "f\ta.go\t/^func f(a, b, c,/;\"\tkind:function\tline:9";
        let tag = &parse(input).unwrap()[0];
        assert_eq!(tag.def_line_prefix, "func f(a, b, c,");
    }

    #[test]
    fn test_scope_field() {
        let input = line("get", "a.py", "    def get(self):", "kind:member\tline:14\tscope:class:Cache");
        let tag = &parse(&input).unwrap()[0];
        assert_eq!(tag.scope, "class:Cache");
    }

    #[test]
    fn test_skips_metadata_and_blank_lines() {
        let input = format!(
            "!_TAG_PROGRAM_NAME\tUniversal Ctags\t/ctags/\n\n{}",
            line("f", "a.go", "func f() {", "kind:function\tline:1")
        );
        assert_eq!(parse(&input).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_tabs_is_hard_error() {
        let err = parse("justonefield").unwrap_err();
        assert!(err.to_string().contains("at least 4 fields"));
    }

    #[test]
    fn test_unterminated_find_command() {
        let err = parse("f\ta.go\t/^func f() {$/\tkind:function\tline:1").unwrap_err();
        assert!(err.to_string().contains(";\""), "error was: {err}");
    }

    #[test]
    fn test_non_numeric_line_is_hard_error() {
        let err = parse(&line("f", "a.go", "func f() {", "kind:function\tline:abc")).unwrap_err();
        assert!(err.to_string().contains("could not parse line number"));
    }

    #[test]
    fn test_missing_line_field_is_hard_error() {
        let err = parse(&line("f", "a.go", "func f() {", "kind:function")).unwrap_err();
        assert!(err.to_string().contains("could not parse line number"));
    }

    #[test]
    fn test_extension_field_without_colon() {
        let err = parse(&line("f", "a.go", "func f() {", "kind:function\tline:1\tbogus")).unwrap_err();
        assert!(err.to_string().contains("malformed extension field"));
    }
}
