use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

/// Replaces `path` with `content` so a crash mid-write leaves either the old
/// file or the new one on disk, never a truncated mix.
///
/// The temporary sibling is flushed to disk before the rename and removed if
/// any step fails.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let staging = staging_path(parent_dir, path);
    let outcome = stage_and_swap(&staging, path, content);
    if outcome.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    outcome
}

fn staging_path(parent_dir: &Path, path: &Path) -> PathBuf {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("castpage");
    parent_dir.join(format!(
        ".{stem}.{}-{}.partial",
        std::process::id(),
        current_unix_timestamp_ms()
    ))
}

fn stage_and_swap(staging: &Path, path: &Path, content: &str) -> Result<()> {
    let mut file = File::create(staging)
        .with_context(|| format!("failed to create staging file {}", staging.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write staging file {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync staging file {}", staging.display()))?;
    drop(file);

    std::fs::rename(staging, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            path.display()
        )
    })
}
