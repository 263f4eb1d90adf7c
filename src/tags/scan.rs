//! Invocation of the external tagging tool and ignore-aware directory
//! listing. The tool is a black box: we hand it a file list (or ask for a
//! recursive scan), point it at a throwaway output file, and parse whatever
//! it wrote.

use super::{Tag, TagFormat, parse};
use crate::config::Config;
use crate::util;
use anyhow::{Context, Result, bail};
use ignore::WalkBuilder;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::debug;

/// Directories never handed to the tool in recursive mode.
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "vendor", "target"];

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub no_ignore: bool,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self { no_ignore }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { no_ignore: false }
    }
}

/// Run the tagging tool over the given files (empty list means a recursive
/// scan of the working tree) and parse its output table.
///
/// The table is written to a per-call temp directory so concurrent requests
/// never race on a shared output path. A non-zero exit status is propagated
/// as an error carrying the tool's stderr.
pub fn run_tagging_tool(format: TagFormat, files: &[PathBuf]) -> Result<Vec<Tag>> {
    let tmp = tempfile::tempdir().context("create temp dir for tag table")?;
    let out_path = tmp.path().join("tags");
    let args = build_args(format, &out_path, files);
    let bin = &Config::get().ctags_bin;

    debug!(tool = %bin, n_files = files.len(), recursive = files.is_empty(), "running tagging tool");
    let started = Instant::now();
    let output = Command::new(bin)
        .args(&args)
        .output()
        .with_context(|| format!("run {bin}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{bin} exited with {}: {}", output.status, stderr.trim());
    }
    debug!(elapsed = ?started.elapsed(), "tagging tool finished");

    let table = util::read_to_string(&out_path)?;
    parse(format, &table)
}

fn build_args(format: TagFormat, out_path: &Path, files: &[PathBuf]) -> Vec<OsString> {
    let out = out_path.as_os_str().to_os_string();
    let mut args: Vec<OsString> = match format {
        TagFormat::Legacy => vec!["-e".into(), "-f".into(), out],
        TagFormat::Extended => vec![
            "-f".into(),
            out,
            "--fields=*".into(),
            "--excmd=pattern".into(),
        ],
    };
    if files.is_empty() {
        args.push("-R".into());
    } else {
        args.extend(files.iter().map(|file| file.as_os_str().to_os_string()));
    }
    for dir in EXCLUDED_DIRS {
        args.push(format!("--exclude={dir}").into());
    }
    args
}

/// List the regular files directly inside `dir`, honoring ignore rules
/// unless disabled. Used by the cursor queries, which index one directory
/// at a time to bound cost.
pub fn list_dir_files(dir: &Path, options: ScanOptions) -> Result<Vec<PathBuf>> {
    let mut builder = WalkBuilder::new(dir);
    builder.max_depth(Some(1));
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    }
    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        if entry.file_type().map_or(false, |ft| ft.is_file()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}
