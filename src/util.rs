use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Convert a `file://` document URI into a filesystem path.
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let raw = uri.strip_prefix("file://").unwrap_or(uri);
    if raw.is_empty() {
        bail!("empty document uri {uri:?}");
    }
    Ok(PathBuf::from(raw))
}

pub fn path_to_uri(path: &str) -> String {
    format!("file://{path}")
}
