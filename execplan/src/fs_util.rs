//! Crash-safe writes and corpus discovery.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

use crate::error::{ExecPlanError, Result};
use crate::paths::is_execplan_milestone_path;

/// Writes `contents` to `path` atomically.
///
/// Uses the temp-file + fsync + rename pattern; the temp file lives next to
/// the target so the rename never crosses filesystems, and it is removed
/// again if any step fails.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|e| ExecPlanError::io("create directory", parent, e))?;
    replace_file(path, contents).map_err(|e| ExecPlanError::io("write file", path, e))
}

/// The temp + fsync + rename step of [`atomic_write`]; the parent must exist.
pub(crate) fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_sibling(path);
    let written = File::create(&temp_path)
        .and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&temp_path, path));

    if written.is_err() {
        remove_leftover(&temp_path);
    }
    written
}

/// Best-effort removal of a file left by a failed write.
fn remove_leftover(path: &Path) {
    if let Err(e) = std::fs::remove_file(path)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial file");
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    path.with_file_name(format!(".{name}.{}.{nanos}.tmp", std::process::id()))
}

/// Creates `path` only if it does not exist yet, then writes and fsyncs it.
///
/// A partially written file is removed before the error is returned. An
/// existing file surfaces as `ErrorKind::AlreadyExists` so callers can retry
/// with a different name.
pub(crate) fn create_exclusive(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let written = file.write_all(contents).and_then(|()| file.sync_all());
    if let Err(e) = written {
        drop(file);
        remove_leftover(path);
        return Err(e);
    }
    Ok(())
}

/// Every ExecPlan document (`EP-*.md`, outside milestone subtrees) under
/// `execplans_dir`, sorted. A missing directory yields no files.
pub fn discover_plan_files(execplans_dir: &Path) -> Result<Vec<PathBuf>> {
    discover_plan_files_under(execplans_dir, execplans_dir)
}

/// Like [`discover_plan_files`] but limited to the subtree at `dir`;
/// milestone exclusion is still judged relative to `execplans_dir`.
pub(crate) fn discover_plan_files_under(dir: &Path, execplans_dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry during ExecPlan discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.starts_with("EP-") || !name.ends_with(".md") {
            continue;
        }
        if is_execplan_milestone_path(entry.path(), execplans_dir) {
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

/// Regular `*.md` files anywhere below `dir`, sorted. Missing dirs are empty.
pub(crate) fn markdown_files_recursive(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                if e.io_error().map(std::io::Error::kind) != Some(std::io::ErrorKind::NotFound) {
                    tracing::warn!(error = %e, "skipping unreadable entry during milestone scan");
                }
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

/// Regular `*.md` files directly inside `dir`, sorted. Missing dirs are empty.
pub(crate) fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ExecPlanError::io("list directory", dir, e)),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExecPlanError::io("list directory", dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "md") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
