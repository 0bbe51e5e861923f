//! Archive transaction for one ExecPlan root.
//!
//! Every physical step is recorded in an [`UndoLog`] as it completes. When a
//! later step fails the log is replayed in reverse so callers only ever see
//! the pre-archive or the post-archive tree.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ExecPlanError, Result};
use crate::front_matter::FrontMatter;
use crate::fs_util;
use crate::identity::{DayToken, ExecPlanId, parse_execplan_filename};
use crate::milestones::{high_water_path, milestone_owner, scan_active_milestones_for_archive};
use crate::paths::{
    ACTIVE_DIR, ARCHIVE_DIR, LayoutKind, MILESTONES_DIR, is_execplan_archive_path,
};
use crate::store::ResolvedPlan;
use crate::types::ExecPlanStatus;

/// Filesystem mutations performed by the archive transaction.
pub(crate) trait ArchiveFs {
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    /// Replaces an existing file's contents atomically.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

pub(crate) struct RealFs;

impl ArchiveFs for RealFs {
    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs_util::replace_file(path, contents)
    }
}

#[derive(Debug)]
enum UndoStep {
    CreatedDir(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
    Rewrote { path: PathBuf, original: Vec<u8> },
}

/// Completed steps of an in-flight archive, newest last.
pub(crate) struct UndoLog<'a> {
    fs: &'a dyn ArchiveFs,
    steps: Vec<UndoStep>,
}

impl<'a> UndoLog<'a> {
    pub(crate) fn new(fs: &'a dyn ArchiveFs) -> Self {
        Self {
            fs,
            steps: Vec::new(),
        }
    }

    /// Creates `path` and any missing ancestors, recording each new directory.
    pub(crate) fn ensure_dir(&mut self, path: &Path) -> Result<()> {
        let mut missing = Vec::new();
        let mut cursor = Some(path);
        while let Some(dir) = cursor {
            if dir.is_dir() {
                break;
            }
            missing.push(dir.to_path_buf());
            cursor = dir.parent();
        }
        for dir in missing.into_iter().rev() {
            self.create_dir(&dir)?;
        }
        Ok(())
    }

    pub(crate) fn create_dir(&mut self, path: &Path) -> Result<()> {
        self.fs
            .create_dir(path)
            .map_err(|e| ExecPlanError::io("create directory", path, e))?;
        self.steps.push(UndoStep::CreatedDir(path.to_path_buf()));
        Ok(())
    }

    pub(crate) fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        self.fs
            .rename(from, to)
            .map_err(|e| ExecPlanError::io("move", from, e))?;
        self.steps.push(UndoStep::Moved {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Atomically replaces `path`, keeping its previous bytes for rollback.
    pub(crate) fn rewrite(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        let original =
            std::fs::read(path).map_err(|e| ExecPlanError::io("read file", path, e))?;
        self.fs
            .write_atomic(path, contents)
            .map_err(|e| ExecPlanError::io("write file", path, e))?;
        self.steps.push(UndoStep::Rewrote {
            path: path.to_path_buf(),
            original,
        });
        Ok(())
    }

    pub(crate) fn commit(mut self) {
        self.steps.clear();
    }

    /// Replays the inverse of every recorded step, newest first, and returns
    /// the error the caller should surface.
    pub(crate) fn rollback(mut self, cause: ExecPlanError) -> ExecPlanError {
        tracing::warn!(error = %cause, steps = self.steps.len(), "rolling back archive");
        while let Some(step) = self.steps.pop() {
            let undone = match &step {
                UndoStep::CreatedDir(path) => {
                    if let Err(e) = self.fs.remove_dir(path) {
                        // A leftover empty directory does not change what the plan looks like.
                        tracing::warn!(path = %path.display(), error = %e, "could not remove directory during rollback");
                    }
                    continue;
                }
                UndoStep::Moved { from, to } => self.fs.rename(to, from).map_err(|e| (to, e)),
                UndoStep::Rewrote { path, original } => {
                    self.fs.write_atomic(path, original).map_err(|e| (path, e))
                }
            };
            if let Err((orphaned, source)) = undone {
                tracing::warn!(orphaned = %orphaned.display(), error = %source, "rollback step failed");
                return ExecPlanError::RollbackFailed {
                    orphaned: orphaned.clone(),
                    cause: cause.to_string(),
                    source,
                };
            }
        }
        cause
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ArchiveOutcome {
    pub source_plan_path: PathBuf,
    pub archived_plan_path: PathBuf,
    pub source_plan_root: PathBuf,
    pub archived_plan_root: PathBuf,
}

fn joined(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_plan_file_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("EP-") && n.ends_with(".md"))
}

/// Runs safety checks and moves the resolved plan into the dated archive.
/// The caller holds the plan's mutation lock.
pub(crate) fn archive_resolved_plan(
    execplans_dir: &Path,
    plan: &ResolvedPlan,
    day: DayToken,
    fs: &dyn ArchiveFs,
) -> Result<ArchiveOutcome> {
    let execplan_id = &plan.execplan_id;
    if is_execplan_archive_path(&plan.plan_path, execplans_dir) {
        return Err(ExecPlanError::Conflict(format!(
            "ExecPlan '{execplan_id}' is already archived."
        )));
    }

    let source_plan_root = plan.location.plan_root.clone();
    let shared_root = plan.location.layout == LayoutKind::LegacySharedActive;
    if shared_root {
        ensure_single_top_level_plan(&source_plan_root, &plan.plan_path)?;
    } else {
        ensure_single_plan_in_root(execplans_dir, &source_plan_root, &plan.plan_path)?;
        ensure_no_foreign_milestones(&source_plan_root, execplan_id)?;
    }
    ensure_no_active_milestones(&source_plan_root, execplan_id)?;

    let (year, month, day_of_month) = day.shard();
    let archive_parent = execplans_dir
        .join(ARCHIVE_DIR)
        .join(year)
        .join(month)
        .join(day_of_month);
    let root_name = source_plan_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archived_plan_root = archive_parent.join(format!("{execplan_id}_{root_name}"));
    if archived_plan_root.starts_with(&source_plan_root) {
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive ExecPlan safely because the destination resolves inside the source plan root. \
             This usually indicates a legacy top-level slug that conflicts with the '{ARCHIVE_DIR}' namespace. \
             Rename or migrate the legacy plan directory first. Destination: {}",
            archived_plan_root.display()
        )));
    }
    let legacy_milestones_root = source_plan_root.join(MILESTONES_DIR);
    if shared_root && legacy_milestones_root.exists() {
        let unexpected = unexpected_legacy_milestone_entries(&legacy_milestones_root, execplan_id)?;
        if !unexpected.is_empty() {
            return Err(ExecPlanError::Conflict(format!(
                "Cannot archive legacy active-root ExecPlan because mixed ownership artifacts were found under {}: {}",
                legacy_milestones_root.display(),
                joined(&unexpected)
            )));
        }
    }
    if archived_plan_root.exists() {
        return Err(ExecPlanError::Conflict(format!(
            "Archive destination already exists: {}",
            archived_plan_root.display()
        )));
    }

    let archived_plan_path = match plan.plan_path.strip_prefix(&source_plan_root) {
        Ok(relative) => archived_plan_root.join(relative),
        Err(_) => {
            return Err(ExecPlanError::UnrecognizedLayout {
                path: plan.plan_path.clone(),
                root: execplans_dir.to_path_buf(),
            });
        }
    };

    let mut undo = UndoLog::new(fs);
    let applied = (|| -> Result<()> {
        undo.ensure_dir(&archive_parent)?;
        if shared_root {
            undo.create_dir(&archived_plan_root)?;
            undo.rename(&plan.plan_path, &archived_plan_path)?;
            if legacy_milestones_root.exists() {
                undo.rename(
                    &legacy_milestones_root,
                    &archived_plan_root.join(MILESTONES_DIR),
                )?;
            }
        } else {
            undo.rename(&source_plan_root, &archived_plan_root)?;
        }
        mark_archived(&mut undo, &archived_plan_path, day)
    })();

    match applied {
        Ok(()) => {
            undo.commit();
            Ok(ArchiveOutcome {
                source_plan_path: plan.plan_path.clone(),
                archived_plan_path,
                source_plan_root,
                archived_plan_root,
            })
        }
        Err(e) => Err(undo.rollback(e)),
    }
}

fn ensure_single_top_level_plan(plan_root: &Path, plan_path: &Path) -> Result<()> {
    let top_level: Vec<PathBuf> = fs_util::markdown_files(plan_root)?
        .into_iter()
        .filter(|path| is_plan_file_name(path))
        .collect();
    if top_level.as_slice() != [plan_path.to_path_buf()] {
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive legacy active-root ExecPlan safely because multiple top-level ExecPlan files were found under {}: {}",
            plan_root.display(),
            joined(&top_level)
        )));
    }
    Ok(())
}

fn ensure_single_plan_in_root(execplans_dir: &Path, plan_root: &Path, plan_path: &Path) -> Result<()> {
    let files = fs_util::discover_plan_files_under(plan_root, execplans_dir)?;
    if files.as_slice() != [plan_path.to_path_buf()] {
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive entire ExecPlan directory safely because it contains multiple ExecPlan files. Plan root: {}. Files: {}",
            plan_root.display(),
            joined(&files)
        )));
    }
    Ok(())
}

/// Milestone-shaped files under the root that belong to another ExecPlan,
/// in either `milestones/{active,archive}/…` or bare `{active,archive}/…`.
fn ensure_no_foreign_milestones(plan_root: &Path, execplan_id: &ExecPlanId) -> Result<()> {
    let foreign: Vec<PathBuf> = fs_util::markdown_files_recursive(plan_root)
        .into_iter()
        .filter(|path| {
            let Ok(relative) = path.strip_prefix(plan_root) else {
                return false;
            };
            let parts: Vec<&str> = relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect();
            let bucket = |part: &str| part == ACTIVE_DIR || part == ARCHIVE_DIR;
            let milestone_shaped = (parts.len() >= 3 && parts[0] == MILESTONES_DIR && bucket(parts[1]))
                || (parts.len() >= 2 && bucket(parts[0]));
            milestone_shaped && milestone_owner(path).is_some_and(|owner| &owner != execplan_id)
        })
        .collect();
    if !foreign.is_empty() {
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive ExecPlan safely because the plan root contains milestone files for other ExecPlan IDs. Plan root: {}. Files: {}",
            plan_root.display(),
            joined(&foreign)
        )));
    }
    Ok(())
}

fn ensure_no_active_milestones(plan_root: &Path, execplan_id: &ExecPlanId) -> Result<()> {
    let scan = scan_active_milestones_for_archive(plan_root, execplan_id);
    if !scan.blocking_entries.is_empty() {
        let listed = scan
            .blocking_entries
            .iter()
            .map(|entry| {
                format!(
                    "{} ({})",
                    entry.path.display(),
                    entry.parse_error.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive ExecPlan because active milestone metadata is invalid. Fix or archive these milestones first. ExecPlan: {execplan_id}. Invalid active milestones: {listed}"
        )));
    }
    if !scan.active_milestones_for_execplan.is_empty() {
        let listed = scan
            .active_milestones_for_execplan
            .iter()
            .map(|entry| {
                format!(
                    "{} ({})",
                    entry.milestone_id.as_deref().unwrap_or_default(),
                    entry.path.display()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ExecPlanError::Conflict(format!(
            "Cannot archive ExecPlan while active milestones still exist. Archive or complete those milestones first. ExecPlan: {execplan_id}. Active milestones: {listed}"
        )));
    }
    Ok(())
}

/// Files under a shared `active/milestones/` that the move would carry off
/// but that do not belong to this plan.
fn unexpected_legacy_milestone_entries(
    milestones_root: &Path,
    execplan_id: &ExecPlanId,
) -> Result<Vec<PathBuf>> {
    let mut unexpected: Vec<PathBuf> = fs_util::markdown_files_recursive(milestones_root)
        .into_iter()
        .filter(|path| {
            let in_bucket = path
                .strip_prefix(milestones_root)
                .ok()
                .filter(|relative| relative.components().count() >= 2)
                .and_then(|relative| relative.components().next())
                .and_then(|first| first.as_os_str().to_str())
                .is_some_and(|first| first == ACTIVE_DIR || first == ARCHIVE_DIR);
            !(in_bucket && milestone_owner(path).as_ref() == Some(execplan_id))
        })
        .collect();

    let own_mark = high_water_path(milestones_root.parent().unwrap_or(milestones_root), execplan_id);
    let entries = std::fs::read_dir(milestones_root)
        .map_err(|e| ExecPlanError::io("list directory", milestones_root, e))?;
    for entry in entries {
        let path = entry
            .map_err(|e| ExecPlanError::io("list directory", milestones_root, e))?
            .path();
        let foreign_mark = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix('.'))
            .and_then(|n| n.strip_suffix(".seq"))
            .and_then(parse_execplan_filename)
            .is_some()
            && path != own_mark;
        if foreign_mark {
            unexpected.push(path);
        }
    }
    unexpected.sort();
    Ok(unexpected)
}

/// Sets `status: archived` and refreshes `updated`, keeping key order.
fn mark_archived(undo: &mut UndoLog<'_>, plan_path: &Path, day: DayToken) -> Result<()> {
    let text = std::fs::read_to_string(plan_path)
        .map_err(|e| ExecPlanError::io("read ExecPlan", plan_path, e))?;
    let invalid = |reason: String| ExecPlanError::InvalidDocument {
        path: plan_path.to_path_buf(),
        reason,
    };
    let mut front_matter = FrontMatter::parse_document(&text).map_err(|e| invalid(e.to_string()))?;
    front_matter.set("status", ExecPlanStatus::Archived.as_str());
    front_matter.set("updated", day.iso());
    let rewritten = front_matter
        .splice_into(&text)
        .map_err(|e| invalid(e.to_string()))?;
    undo.rewrite(plan_path, rewritten.as_bytes())
}
