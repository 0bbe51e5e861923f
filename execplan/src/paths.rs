//! Plan-root resolution across every ExecPlan directory layout.
//!
//! A path is classified by its components relative to the execplans root.
//! Layouts are tried in table order; the first match wins.

use std::path::{Component, Path, PathBuf};

use crate::error::{ExecPlanError, Result};

pub const ACTIVE_DIR: &str = "active";
pub const ARCHIVE_DIR: &str = "archive";
pub const MILESTONES_DIR: &str = "milestones";
pub const LOCKS_DIR: &str = ".locks";

/// Directory layout generation a plan root belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// `active/<slug>/…`
    CurrentActive,
    /// `active/<file>`: the `active/` directory is shared by several plans.
    LegacySharedActive,
    /// `archive/YYYY/MM/DD/<slug>/…`
    CurrentArchived,
    /// `<slug>/archive/…`
    LegacyArchived,
    /// `<slug>/…`
    LegacyBare,
}

impl LayoutKind {
    pub fn is_archived(&self) -> bool {
        matches!(self, LayoutKind::CurrentArchived | LayoutKind::LegacyArchived)
    }

    pub fn is_shared_root(&self) -> bool {
        matches!(self, LayoutKind::LegacySharedActive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLocation {
    pub layout: LayoutKind,
    pub plan_root: PathBuf,
    pub is_archived: bool,
}

/// Returns how many leading components form the plan root, if the layout matches.
type RootExtractor = fn(&[String]) -> Option<usize>;

const LAYOUTS: &[(LayoutKind, RootExtractor)] = &[
    (LayoutKind::CurrentActive, current_active_root),
    (LayoutKind::LegacySharedActive, shared_active_root),
    (LayoutKind::CurrentArchived, current_archived_root),
    (LayoutKind::LegacyArchived, legacy_archived_root),
    (LayoutKind::LegacyBare, legacy_bare_root),
];

fn current_active_root(parts: &[String]) -> Option<usize> {
    // `active/milestones/…` is the shared root's milestone namespace, not a slug.
    (parts.len() >= 3 && parts[0] == ACTIVE_DIR && parts[1] != MILESTONES_DIR).then_some(2)
}

fn shared_active_root(parts: &[String]) -> Option<usize> {
    if parts.first().map(String::as_str) != Some(ACTIVE_DIR) {
        return None;
    }
    let second = parts.get(1)?;
    (parts.len() == 2 || second == MILESTONES_DIR).then_some(1)
}

fn current_archived_root(parts: &[String]) -> Option<usize> {
    (parts.len() >= 6 && parts[0] == ARCHIVE_DIR && is_date_shard(&parts[1..4])).then_some(5)
}

fn legacy_archived_root(parts: &[String]) -> Option<usize> {
    (parts.len() >= 3 && parts[0] != ACTIVE_DIR && parts[1] == ARCHIVE_DIR).then_some(2)
}

fn legacy_bare_root(parts: &[String]) -> Option<usize> {
    (parts.len() >= 2 && parts[0] != ACTIVE_DIR).then_some(1)
}

fn is_date_shard(parts: &[String]) -> bool {
    let [year, month, day] = parts else {
        return false;
    };
    let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(year, 4) || !digits(month, 2) || !digits(day, 2) {
        return false;
    }
    let month: u32 = month.parse().unwrap_or(0);
    let day: u32 = day.parse().unwrap_or(0);
    (1..=12).contains(&month) && (1..=31).contains(&day)
}

fn is_milestone_bucket(part: &str) -> bool {
    part == ACTIVE_DIR || part == ARCHIVE_DIR
}

/// Components of `path` relative to `root`, plus the root form they are relative to.
///
/// Lexical comparison is tried first so that paths which do not exist yet
/// still classify; canonical forms are the fallback for symlinked roots.
fn relative_parts(path: &Path, root: &Path) -> Option<(Vec<String>, PathBuf)> {
    if let Some(parts) = lexical_parts(path, root) {
        return Some((parts, root.to_path_buf()));
    }
    let canonical_root = root.canonicalize().ok()?;
    let canonical_path = canonicalize_lenient(path)?;
    let parts = lexical_parts(&canonical_path, &canonical_root)?;
    Some((parts, canonical_root))
}

fn lexical_parts(path: &Path, root: &Path) -> Option<Vec<String>> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts)
}

/// Canonicalizes the longest existing ancestor and re-appends the rest.
fn canonicalize_lenient(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }
    let parent = path.parent()?;
    let name = path.file_name()?;
    Some(canonicalize_lenient(parent)?.join(name))
}

/// Resolves the layout, plan root and archived flag for `path`.
pub fn classify_execplan_path(path: &Path, execplans_root: &Path) -> Option<PlanLocation> {
    let (parts, root) = relative_parts(path, execplans_root)?;
    LAYOUTS.iter().find_map(|(layout, extract)| {
        let depth = extract(&parts)?;
        let plan_root = parts[..depth].iter().fold(root.clone(), |acc, p| acc.join(p));
        Some(PlanLocation {
            layout: *layout,
            plan_root,
            is_archived: layout.is_archived(),
        })
    })
}

pub fn get_execplan_plan_root(path: &Path, execplans_root: &Path) -> Result<PathBuf> {
    classify_execplan_path(path, execplans_root)
        .map(|location| location.plan_root)
        .ok_or_else(|| ExecPlanError::UnrecognizedLayout {
            path: path.to_path_buf(),
            root: execplans_root.to_path_buf(),
        })
}

/// True when `path` sits inside (or is) a `milestones/{active,archive}` directory.
pub fn is_execplan_milestone_path(path: &Path, execplans_root: &Path) -> bool {
    let Some((parts, _)) = relative_parts(path, execplans_root) else {
        return false;
    };
    let at = |index: usize| parts.get(index).map(String::as_str);
    let bucket_at = |index: usize| at(index).is_some_and(is_milestone_bucket);

    // active/<slug>/milestones/{active,archive}/…
    if at(0) == Some(ACTIVE_DIR) && at(2) == Some(MILESTONES_DIR) && bucket_at(3) {
        return true;
    }
    // archive/YYYY/MM/DD/<slug>/milestones/{active,archive}/…
    if parts.len() >= 7
        && at(0) == Some(ARCHIVE_DIR)
        && is_date_shard(&parts[1..4])
        && at(5) == Some(MILESTONES_DIR)
        && bucket_at(6)
    {
        return true;
    }
    // <slug>/milestones/{active,archive}/…
    if at(1) == Some(MILESTONES_DIR) && bucket_at(2) {
        return true;
    }
    // <slug>/archive/milestones/{active,archive}/…
    at(1) == Some(ARCHIVE_DIR) && at(2) == Some(MILESTONES_DIR) && bucket_at(3)
}

/// True when the plan root owning `path` is archived. Milestone paths never are.
pub fn is_execplan_archive_path(path: &Path, execplans_root: &Path) -> bool {
    if is_execplan_milestone_path(path, execplans_root) {
        return false;
    }
    classify_execplan_path(path, execplans_root).is_some_and(|location| location.is_archived)
}

/// `path` relative to `root` in POSIX form, or the absolute path when outside it.
pub fn display_relative(path: &Path, root: &Path) -> String {
    match lexical_parts(path, root) {
        Some(parts) => parts.join("/"),
        None => path.to_string_lossy().replace('\\', "/"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(relative: &str) -> Option<(LayoutKind, String, bool)> {
        let root = Path::new("/repo/.agent/exec_plans");
        classify_execplan_path(&root.join(relative), root).map(|loc| {
            (
                loc.layout,
                display_relative(&loc.plan_root, root),
                loc.is_archived,
            )
        })
    }

    #[test]
    fn test_layout_table_order() {
        assert_eq!(
            classify("active/auth/EP-20260207-001_auth.md"),
            Some((LayoutKind::CurrentActive, "active/auth".to_string(), false))
        );
        assert_eq!(
            classify("active/EP-20260207-001_auth.md"),
            Some((LayoutKind::LegacySharedActive, "active".to_string(), false))
        );
        assert_eq!(
            classify("archive/2026/02/12/EP-20260207-001_auth/EP-20260207-001_auth.md"),
            Some((
                LayoutKind::CurrentArchived,
                "archive/2026/02/12/EP-20260207-001_auth".to_string(),
                true
            ))
        );
        assert_eq!(
            classify("legacy/archive/EP-20260207-001.md"),
            Some((LayoutKind::LegacyArchived, "legacy/archive".to_string(), true))
        );
        assert_eq!(
            classify("legacy/EP-20260207-001.md"),
            Some((LayoutKind::LegacyBare, "legacy".to_string(), false))
        );
    }

    #[test]
    fn test_top_level_archive_file_is_bare_root() {
        assert_eq!(
            classify("archive/EP-20260207-001.md"),
            Some((LayoutKind::LegacyBare, "archive".to_string(), false))
        );
        // Invalid month falls through to the bare layout too.
        assert_eq!(
            classify("archive/2026/13/01/slug/EP-20260207-001.md").map(|c| c.0),
            Some(LayoutKind::LegacyBare)
        );
    }

    #[test]
    fn test_shared_root_milestones_resolve_to_active() {
        assert_eq!(
            classify("active/milestones/active/EP-20260207-001_MS001_spike.md"),
            Some((LayoutKind::LegacySharedActive, "active".to_string(), false))
        );
    }

    #[test]
    fn test_unrecognized_paths() {
        let root = Path::new("/repo/.agent/exec_plans");
        assert!(classify("EP-20260207-001.md").is_none());
        assert!(classify("active").is_none());
        let err = get_execplan_plan_root(Path::new("/elsewhere/EP-20260207-001.md"), root)
            .unwrap_err();
        assert!(matches!(err, ExecPlanError::UnrecognizedLayout { .. }));
    }

    #[test]
    fn test_milestone_paths() {
        let root = Path::new("/r");
        let yes = [
            "active/auth/milestones/active/MS001_spike.md",
            "active/auth/milestones/archive/MS001_spike.md",
            "archive/2026/02/12/EP-20260207-001_auth/milestones/archive/MS001.md",
            "legacy/milestones/active/MS001.md",
            "legacy/archive/milestones/archive/MS001.md",
            "active/milestones/active/EP-20260207-001_MS001.md",
        ];
        for relative in yes {
            assert!(
                is_execplan_milestone_path(&root.join(relative), root),
                "{relative}"
            );
        }
        let no = [
            "active/auth/EP-20260207-001_auth.md",
            "active/auth/milestones/notes.md",
            "archive/2026/02/12/EP-20260207-001_auth/EP-20260207-001_auth.md",
        ];
        for relative in no {
            assert!(
                !is_execplan_milestone_path(&root.join(relative), root),
                "{relative}"
            );
        }
    }

    #[test]
    fn test_archive_path_excludes_milestones() {
        let root = Path::new("/r");
        assert!(is_execplan_archive_path(
            &root.join("archive/2026/02/12/EP-20260207-001_auth/EP-20260207-001_auth.md"),
            root
        ));
        assert!(!is_execplan_archive_path(
            &root.join("archive/2026/02/12/EP-20260207-001_auth/milestones/archive/MS001.md"),
            root
        ));
        assert!(!is_execplan_archive_path(
            &root.join("active/auth/EP-20260207-001_auth.md"),
            root
        ));
    }

    #[test]
    fn test_symlinked_root_falls_back_to_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("active/auth")).unwrap();
        let canonical = real.canonicalize().unwrap();
        let file = canonical.join("active/auth/EP-20260207-001_auth.md");
        let root_with_dot = dir.path().join("real/../real");
        let location = classify_execplan_path(&file, &root_with_dot).unwrap();
        assert_eq!(location.layout, LayoutKind::CurrentActive);
        assert_eq!(location.plan_root, canonical.join("active/auth"));
    }
}
