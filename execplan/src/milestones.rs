//! Milestones: independently archivable sub-units of one ExecPlan.
//!
//! Milestone files live under `<plan_root>/milestones/{active,archive}/`.
//! Ownership is decided by the `EP-…_` filename prefix when present and by
//! the `execplan_id` front matter field otherwise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use regex_lite::Regex;

use crate::error::{ExecPlanError, Result};
use crate::front_matter::{FrontMatter, FrontMatterError, yaml_quote};
use crate::fs_util;
use crate::identity::{
    self, DayToken, ExecPlanId, MAX_SEQUENCE, MilestoneId, milestone_label, single_line_field,
};
use crate::lock::MutationLock;
use crate::paths::{ACTIVE_DIR, ARCHIVE_DIR, LayoutKind, MILESTONES_DIR};
use crate::store::{ResolvedPlan, resolve_plan};
use crate::template::{self, MILESTONE_TEMPLATE};
use crate::types::{ExecPlanDomain, ExecPlanStatus, MilestoneLocation};
use crate::workspace::ExecPlanWorkspace;

const SLUG_PATTERN: &str = r"[A-Za-z0-9][A-Za-z0-9_-]*";

#[allow(clippy::expect_used)]
fn legacy_filename_regex() -> &'static Regex {
    static LEGACY_RE: OnceCell<Regex> = OnceCell::new();
    LEGACY_RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(EP-\d{{8}}-\d{{3}})_MS(\d{{3}})(?:[_-]({SLUG_PATTERN}))?\.md$"
        ))
        .expect("valid legacy milestone filename regex")
    })
}

#[allow(clippy::expect_used)]
fn filename_regex() -> &'static Regex {
    static CURRENT_RE: OnceCell<Regex> = OnceCell::new();
    CURRENT_RE.get_or_init(|| {
        Regex::new(&format!(r"^MS(\d{{3}})(?:[_-]({SLUG_PATTERN}))?\.md$"))
            .expect("valid milestone filename regex")
    })
}

/// Parses `EP-YYYYMMDD-NNN/MS###`.
pub fn parse_milestone_id(value: &str) -> Option<MilestoneId> {
    MilestoneId::parse(value)
}

/// Components of a milestone filename in either naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneFileName {
    /// Set only for the legacy `<ExecPlanID>_MS###_<slug>.md` form.
    pub execplan_id: Option<ExecPlanId>,
    pub sequence: u16,
    pub slug: Option<String>,
}

/// Parses `MS###_<slug>.md` or `EP-YYYYMMDD-NNN_MS###_<slug>.md`.
pub fn parse_milestone_filename(filename: &str) -> Option<MilestoneFileName> {
    if let Some(caps) = legacy_filename_regex().captures(filename) {
        return Some(MilestoneFileName {
            execplan_id: ExecPlanId::parse(caps.get(1)?.as_str()),
            sequence: caps.get(2)?.as_str().parse().ok()?,
            slug: caps.get(3).map(|m| m.as_str().to_string()),
        });
    }
    let caps = filename_regex().captures(filename)?;
    Some(MilestoneFileName {
        execplan_id: None,
        sequence: caps.get(1)?.as_str().parse().ok()?,
        slug: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// One milestone-named file found under a plan's `milestones/` subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneFileScan {
    pub path: PathBuf,
    pub sequence: u16,
    pub location: MilestoneLocation,
    pub execplan_id: Option<ExecPlanId>,
    pub parse_error: Option<String>,
}

/// Active milestone as seen by the archive safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMilestoneScanEntry {
    pub path: PathBuf,
    pub execplan_id: Option<ExecPlanId>,
    pub milestone_id: Option<String>,
    pub sequence: Option<u16>,
    pub parse_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveMilestoneArchiveScan {
    pub active_milestones_for_execplan: Vec<ActiveMilestoneScanEntry>,
    pub blocking_entries: Vec<ActiveMilestoneScanEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneRef {
    pub milestone_id: MilestoneId,
    pub sequence: u16,
    pub execplan_id: ExecPlanId,
    pub location: MilestoneLocation,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CreateMilestoneRequest {
    pub execplan_id: String,
    pub title: String,
    pub slug: Option<String>,
    pub owner: Option<String>,
    pub domain: Option<String>,
    /// `YYYYMMDD`; defaults to today.
    pub date: Option<String>,
}

impl CreateMilestoneRequest {
    pub fn new(execplan_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            execplan_id: execplan_id.into(),
            title: title.into(),
            slug: None,
            owner: None,
            domain: None,
            date: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct MilestoneCreateResult {
    pub milestone_id: MilestoneId,
    pub sequence: u16,
    pub milestone_path: PathBuf,
    pub execplan_id: ExecPlanId,
    pub plan_path: PathBuf,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct MilestoneArchiveResult {
    pub milestone_id: MilestoneId,
    pub sequence: u16,
    pub source_path: PathBuf,
    pub archived_path: PathBuf,
    pub execplan_id: ExecPlanId,
    pub plan_path: PathBuf,
}

const EXECPLAN_ID_REQUIRED: &str =
    "front matter must include execplan_id in EP-YYYYMMDD-NNN format";

fn read_front_matter(path: &Path) -> std::result::Result<FrontMatter, String> {
    let text = std::fs::read(path).map_err(|e| format!("could not read milestone file: {e}"))?;
    let text = String::from_utf8(text).map_err(|_| "milestone file is not valid UTF-8".to_string())?;
    match FrontMatter::parse_document(&text) {
        Ok(front_matter) => Ok(front_matter),
        // A file without a block reads as empty metadata.
        Err(FrontMatterError::Missing) => Ok(FrontMatter::default()),
        Err(e) => Err(e.to_string()),
    }
}

fn front_matter_execplan_id(front_matter: &FrontMatter) -> Option<ExecPlanId> {
    front_matter
        .get_str("execplan_id")
        .and_then(|value| ExecPlanId::parse(value.trim()))
}

/// `execplan_id` from a milestone's front matter, or why it is unusable.
fn milestone_owner_with_error(path: &Path) -> std::result::Result<ExecPlanId, String> {
    let front_matter = read_front_matter(path)?;
    front_matter_execplan_id(&front_matter).ok_or_else(|| EXECPLAN_ID_REQUIRED.to_string())
}

/// Owner by filename prefix first, then by front matter.
pub(crate) fn milestone_owner(path: &Path) -> Option<ExecPlanId> {
    let name = path.file_name()?.to_str()?;
    if let Some(id) = identity::parse_execplan_filename(name) {
        return Some(id);
    }
    milestone_owner_with_error(path).ok()
}

fn is_owned_by(path: &Path, execplan_id: &ExecPlanId) -> bool {
    let Some(parsed) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_milestone_filename)
    else {
        return false;
    };
    match parsed.execplan_id {
        Some(prefix) => &prefix == execplan_id,
        None => milestone_owner_with_error(path).ok().as_ref() == Some(execplan_id),
    }
}

fn bucket_location(bucket: &str) -> Option<MilestoneLocation> {
    match bucket {
        ACTIVE_DIR => Some(MilestoneLocation::Active),
        ARCHIVE_DIR => Some(MilestoneLocation::Archived),
        _ => None,
    }
}

fn sort_key(location: MilestoneLocation) -> u8 {
    match location {
        MilestoneLocation::Active => 0,
        MilestoneLocation::Archived => 1,
    }
}

/// Every milestone-named file under `<plan_root>/milestones/{active,archive}`,
/// sorted by `(sequence, active first, path)`.
pub fn scan_plan_milestone_files(plan_root: &Path) -> Vec<MilestoneFileScan> {
    let milestones_root = plan_root.join(MILESTONES_DIR);
    let mut scanned = Vec::new();
    for path in fs_util::markdown_files_recursive(&milestones_root) {
        let Some(parsed) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_milestone_filename)
        else {
            continue;
        };
        let Some(location) = path
            .strip_prefix(&milestones_root)
            .ok()
            .and_then(|relative| relative.components().next())
            .and_then(|first| first.as_os_str().to_str())
            .and_then(bucket_location)
        else {
            continue;
        };

        let (execplan_id, parse_error) = match parsed.execplan_id {
            Some(id) => (Some(id), None),
            None => match milestone_owner_with_error(&path) {
                Ok(id) => (Some(id), None),
                Err(reason) => (None, Some(reason)),
            },
        };
        scanned.push(MilestoneFileScan {
            path,
            sequence: parsed.sequence,
            location,
            execplan_id,
            parse_error,
        });
    }
    scanned.sort_by(|a, b| {
        (a.sequence, sort_key(a.location), &a.path).cmp(&(b.sequence, sort_key(b.location), &b.path))
    });
    scanned
}

/// Active-location files whose owning ExecPlan cannot be determined.
pub fn list_invalid_active_milestone_files(plan_root: &Path) -> Vec<MilestoneFileScan> {
    scan_plan_milestone_files(plan_root)
        .into_iter()
        .filter(|file| file.location == MilestoneLocation::Active && file.parse_error.is_some())
        .collect()
}

fn scan_active_entry(path: PathBuf) -> ActiveMilestoneScanEntry {
    let mut entry = ActiveMilestoneScanEntry {
        path,
        execplan_id: None,
        milestone_id: None,
        sequence: None,
        parse_error: None,
    };
    let front_matter = match read_front_matter(&entry.path) {
        Ok(front_matter) => front_matter,
        Err(reason) => {
            entry.parse_error = Some(reason);
            return entry;
        }
    };
    let Some(execplan_id) = front_matter_execplan_id(&front_matter) else {
        entry.parse_error = Some(EXECPLAN_ID_REQUIRED.to_string());
        return entry;
    };
    entry.execplan_id = Some(execplan_id.clone());

    let raw_id = front_matter.get_trimmed("id");
    entry.milestone_id = raw_id.clone();
    let Some(milestone_id) = raw_id.as_deref().and_then(parse_milestone_id) else {
        entry.parse_error =
            Some("front matter must include id in EP-YYYYMMDD-NNN/MS### format".to_string());
        return entry;
    };
    entry.sequence = Some(milestone_id.sequence);
    if milestone_id.execplan_id != execplan_id {
        entry.parse_error =
            Some("front matter id and execplan_id refer to different ExecPlan IDs".to_string());
    }
    entry
}

/// Classifies every file under `milestones/active` by its front matter.
///
/// Owned, well-formed files land in `active_milestones_for_execplan`;
/// unreadable files and files owned by another ExecPlan are blocking.
pub fn scan_active_milestones_for_archive(
    plan_root: &Path,
    execplan_id: &ExecPlanId,
) -> ActiveMilestoneArchiveScan {
    let active_root = plan_root.join(MILESTONES_DIR).join(ACTIVE_DIR);
    let mut scan = ActiveMilestoneArchiveScan::default();
    for path in fs_util::markdown_files_recursive(&active_root) {
        let mut entry = scan_active_entry(path);
        if entry.parse_error.is_some() {
            scan.blocking_entries.push(entry);
            continue;
        }
        if entry.execplan_id.as_ref() != Some(execplan_id) {
            let other = entry
                .execplan_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            entry.parse_error = Some(format!(
                "active milestone is owned by different ExecPlan ID '{other}'"
            ));
            scan.blocking_entries.push(entry);
            continue;
        }
        scan.active_milestones_for_execplan.push(entry);
    }
    let by_sequence = |a: &ActiveMilestoneScanEntry, b: &ActiveMilestoneScanEntry| {
        (a.sequence.map(i32::from).unwrap_or(-1), &a.path)
            .cmp(&(b.sequence.map(i32::from).unwrap_or(-1), &b.path))
    };
    scan.active_milestones_for_execplan.sort_by(by_sequence);
    scan.blocking_entries.sort_by(by_sequence);
    scan
}

/// `milestones/.<ExecPlanID>.seq`: the highest sequence ever allocated.
pub(crate) fn high_water_path(plan_root: &Path, execplan_id: &ExecPlanId) -> PathBuf {
    plan_root
        .join(MILESTONES_DIR)
        .join(format!(".{execplan_id}.seq"))
}

fn read_high_water(plan_root: &Path, execplan_id: &ExecPlanId) -> Result<u16> {
    let path = high_water_path(plan_root, execplan_id);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ExecPlanError::io("read milestone high-water mark", &path, e)),
    };
    let raw = text.trim();
    match raw.parse::<u16>() {
        Ok(mark) if mark <= MAX_SEQUENCE => Ok(mark),
        Ok(_) => Err(ExecPlanError::InvalidDocument {
            path,
            reason: format!("milestone high-water mark {raw} exceeds {MAX_SEQUENCE}"),
        }),
        Err(_) => Err(ExecPlanError::InvalidDocument {
            path,
            reason: format!("expected a milestone sequence number, found {raw:?}"),
        }),
    }
}

/// `1 + max(owned sequences, malformed active sequences, high-water mark)`;
/// past 999 is a Conflict.
pub fn next_milestone_sequence(plan_root: &Path, execplan_id: &ExecPlanId) -> Result<u16> {
    let scanned_max = scan_plan_milestone_files(plan_root)
        .iter()
        .filter(|scanned| {
            scanned.execplan_id.as_ref() == Some(execplan_id)
                || (scanned.location == MilestoneLocation::Active && scanned.parse_error.is_some())
        })
        .map(|scanned| scanned.sequence)
        .max()
        .unwrap_or(0);
    let high_water = read_high_water(plan_root, execplan_id)?;
    scanned_max
        .max(high_water)
        .checked_add(1)
        .filter(|next| *next <= MAX_SEQUENCE)
        .ok_or_else(|| {
            ExecPlanError::Conflict(format!(
                "Milestone sequence overflow for {execplan_id}; max is {MAX_SEQUENCE}."
            ))
        })
}

fn parent_front_matter(plan_path: &Path) -> Result<FrontMatter> {
    let text = std::fs::read_to_string(plan_path)
        .map_err(|e| ExecPlanError::io("read ExecPlan", plan_path, e))?;
    match FrontMatter::parse_document(&text) {
        Ok(front_matter) => Ok(front_matter),
        Err(FrontMatterError::Missing) => Ok(FrontMatter::default()),
        Err(e) => Err(ExecPlanError::InvalidDocument {
            path: plan_path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn ensure_mutable(plan: &ResolvedPlan, front_matter: &FrontMatter) -> Result<()> {
    if plan.location.is_archived {
        return Err(ExecPlanError::Conflict(format!(
            "ExecPlan '{}' is archived and cannot accept new milestones.",
            plan.execplan_id
        )));
    }
    let status = front_matter
        .get_trimmed("status")
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    if status == ExecPlanStatus::Archived.as_str() {
        return Err(ExecPlanError::Conflict(format!(
            "ExecPlan '{}' has archived status and cannot accept new milestones.",
            plan.execplan_id
        )));
    }
    Ok(())
}

fn joined_paths<'a>(paths: impl Iterator<Item = &'a Path>) -> String {
    paths
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Creates the next milestone for an ExecPlan under its mutation lock.
pub fn create_execplan_milestone(
    ws: &ExecPlanWorkspace,
    request: &CreateMilestoneRequest,
) -> Result<MilestoneCreateResult> {
    let execplan_id = ExecPlanId::parse_arg(request.execplan_id.trim())?;
    let title = single_line_field(&request.title, "title")?;
    let slug = identity::derive_slug(request.slug.as_deref(), &title)?;
    let day = DayToken::parse_or_today(request.date.as_deref())?;
    if let Some(owner) = request.owner.as_deref() {
        single_line_field(owner, "owner")?;
    }
    if let Some(domain) = request.domain.as_deref() {
        ExecPlanDomain::parse_field(domain.trim())?;
    }

    let execplans_dir = ws.existing_execplans_dir()?;
    let _lock = MutationLock::acquire(&execplans_dir, &execplan_id, &ws.lock_backend)?;

    let plan = resolve_plan(&execplans_dir, &execplan_id)?;
    let parent = parent_front_matter(&plan.plan_path)?;
    ensure_mutable(&plan, &parent)?;

    let owner = match request.owner.as_deref() {
        Some(owner) => owner.to_string(),
        None => parent
            .get_trimmed("owner")
            .unwrap_or_else(|| ws.defaults.owner.clone()),
    };
    let owner = single_line_field(&owner, "owner")?;
    let domain = match request.domain.as_deref() {
        Some(domain) => domain.trim().to_string(),
        None => parent
            .get_trimmed("domain")
            .unwrap_or_else(|| ws.defaults.domain.as_str().to_string()),
    };
    let domain = ExecPlanDomain::parse_field(&domain)?;

    let plan_root = &plan.location.plan_root;
    let active_dir = plan_root.join(MILESTONES_DIR).join(ACTIVE_DIR);
    std::fs::create_dir_all(&active_dir)
        .map_err(|e| ExecPlanError::io("create directory", &active_dir, e))?;

    let invalid = list_invalid_active_milestone_files(plan_root);
    if !invalid.is_empty() {
        let joined = invalid
            .iter()
            .map(|file| {
                format!(
                    "{} ({})",
                    file.path.display(),
                    file.parse_error.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ExecPlanError::Conflict(format!(
            "Cannot create milestone because active milestone metadata is invalid. Fix these files first: {joined}"
        )));
    }

    let legacy_filename = plan.location.layout == LayoutKind::LegacySharedActive;
    let iso_day = day.iso();
    for _ in 0..ws.milestone_create_retries {
        let sequence = next_milestone_sequence(plan_root, &execplan_id)?;
        let milestone_id = MilestoneId::new(execplan_id.clone(), sequence);
        let filename = if legacy_filename {
            format!("{execplan_id}_{}_{slug}.md", milestone_label(sequence))
        } else {
            format!("{}_{slug}.md", milestone_label(sequence))
        };
        let milestone_path = active_dir.join(&filename);
        let vars = HashMap::from([
            ("milestone_id", milestone_id.to_string()),
            ("execplan_id", execplan_id.to_string()),
            ("ms", sequence.to_string()),
            ("title_yaml", yaml_quote(&title)),
            ("title_text", title.clone()),
            ("domain", domain.as_str().to_string()),
            ("owner_yaml", yaml_quote(&owner)),
            ("created", iso_day.clone()),
            ("updated", iso_day.clone()),
        ]);
        let content = template::render(MILESTONE_TEMPLATE, &vars)?;

        match fs_util::create_exclusive(&milestone_path, content.as_bytes()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %milestone_path.display(), "milestone filename taken, retrying");
                continue;
            }
            Err(e) => return Err(ExecPlanError::io("create milestone", &milestone_path, e)),
        }

        let mark = high_water_path(plan_root, &execplan_id);
        if let Err(e) = fs_util::atomic_write(&mark, format!("{sequence}\n").as_bytes()) {
            if let Err(cleanup) = std::fs::remove_file(&milestone_path) {
                tracing::warn!(
                    path = %milestone_path.display(),
                    error = %cleanup,
                    "failed to remove milestone after high-water write failed"
                );
            }
            return Err(e);
        }

        tracing::info!(
            execplan_id = %execplan_id,
            sequence,
            path = %milestone_path.display(),
            "created milestone"
        );
        return Ok(MilestoneCreateResult {
            milestone_id,
            sequence,
            milestone_path,
            execplan_id,
            plan_path: plan.plan_path,
            title,
        });
    }

    Err(ExecPlanError::Conflict(
        "Could not allocate a unique milestone ID due to concurrent writes. Retry the command."
            .to_string(),
    ))
}

/// Moves one active milestone into `milestones/archive/` under the mutation lock.
pub fn archive_execplan_milestone(
    ws: &ExecPlanWorkspace,
    execplan_id: &str,
    sequence: u16,
    date: Option<&str>,
) -> Result<MilestoneArchiveResult> {
    if sequence == 0 || sequence > MAX_SEQUENCE {
        return Err(ExecPlanError::Validation(format!(
            "Milestone sequence must be between 1 and {MAX_SEQUENCE}."
        )));
    }
    let execplan_id = ExecPlanId::parse_arg(execplan_id.trim())?;
    // Archived milestones are not date-sharded; the date is only validated.
    if let Some(date) = date {
        DayToken::parse(date)?;
    }
    let milestone_id = MilestoneId::new(execplan_id.clone(), sequence);

    let execplans_dir = ws.existing_execplans_dir()?;
    let _lock = MutationLock::acquire(&execplans_dir, &execplan_id, &ws.lock_backend)?;
    let plan = resolve_plan(&execplans_dir, &execplan_id)?;
    let milestones_root = plan.location.plan_root.join(MILESTONES_DIR);
    let active_dir = milestones_root.join(ACTIVE_DIR);
    let archive_dir = milestones_root.join(ARCHIVE_DIR);

    let same_sequence = |path: &PathBuf| {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_milestone_filename)
            .is_some_and(|parsed| parsed.sequence == sequence)
            && is_owned_by(path, &execplan_id)
    };

    let candidates: Vec<PathBuf> = fs_util::markdown_files(&active_dir)?
        .into_iter()
        .filter(same_sequence)
        .collect();
    let source_path = match candidates.as_slice() {
        [] => {
            return Err(ExecPlanError::NotFound(format!(
                "Active milestone {milestone_id} was not found under {}.",
                active_dir.display()
            )));
        }
        [single] => single.clone(),
        many => {
            return Err(ExecPlanError::Conflict(format!(
                "Multiple active milestone files found for {milestone_id}. Resolve duplicates: {}",
                joined_paths(many.iter().map(PathBuf::as_path))
            )));
        }
    };

    let Some(file_name) = source_path.file_name() else {
        return Err(ExecPlanError::Validation(format!(
            "Milestone path has no file name: {}",
            source_path.display()
        )));
    };
    let archived_path = archive_dir.join(file_name);
    if archived_path.exists() {
        return Err(ExecPlanError::Conflict(format!(
            "Archive destination already exists: {}",
            archived_path.display()
        )));
    }
    let already_archived: Vec<PathBuf> = fs_util::markdown_files(&archive_dir)?
        .into_iter()
        .filter(same_sequence)
        .collect();
    if !already_archived.is_empty() {
        return Err(ExecPlanError::Conflict(format!(
            "Archived milestone {milestone_id} already exists: {}",
            joined_paths(already_archived.iter().map(PathBuf::as_path))
        )));
    }

    std::fs::create_dir_all(&archive_dir)
        .map_err(|e| ExecPlanError::io("create directory", &archive_dir, e))?;
    std::fs::rename(&source_path, &archived_path)
        .map_err(|e| ExecPlanError::io("move milestone", &source_path, e))?;

    tracing::info!(
        execplan_id = %execplan_id,
        sequence,
        path = %archived_path.display(),
        "archived milestone"
    );
    Ok(MilestoneArchiveResult {
        milestone_id,
        sequence,
        source_path,
        archived_path,
        execplan_id,
        plan_path: plan.plan_path,
    })
}

/// Milestones owned by an ExecPlan, sorted by `(sequence, active first, path)`.
/// No lock is taken.
pub fn list_execplan_milestones(
    ws: &ExecPlanWorkspace,
    execplan_id: &str,
    include_archived: bool,
) -> Result<Vec<MilestoneRef>> {
    let execplan_id = ExecPlanId::parse_arg(execplan_id.trim())?;
    let execplans_dir = ws.existing_execplans_dir()?;
    let plan = resolve_plan(&execplans_dir, &execplan_id)?;

    Ok(scan_plan_milestone_files(&plan.location.plan_root)
        .into_iter()
        .filter(|scanned| scanned.execplan_id.as_ref() == Some(&execplan_id))
        .filter(|scanned| include_archived || scanned.location == MilestoneLocation::Active)
        .map(|scanned| MilestoneRef {
            milestone_id: MilestoneId::new(execplan_id.clone(), scanned.sequence),
            sequence: scanned.sequence,
            execplan_id: execplan_id.clone(),
            location: scanned.location,
            path: scanned.path,
        })
        .collect())
}
