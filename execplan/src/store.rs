//! Document store entry points for ExecPlans: create and archive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::archive::{self, ArchiveFs, RealFs};
use crate::error::{ExecPlanError, Result};
use crate::front_matter::yaml_quote;
use crate::fs_util;
use crate::identity::{
    self, DayToken, ExecPlanId, next_plan_sequence, parse_execplan_filename, single_line_field,
};
use crate::lock::MutationLock;
use crate::paths::{ACTIVE_DIR, PlanLocation, classify_execplan_path};
use crate::registry::{RegistryBuildOptions, RegistryBuildResult, build_execplan_registry};
use crate::template::{self, EXECPLAN_TEMPLATE};
use crate::types::{ExecPlanDomain, ExecPlanKind};
use crate::workspace::ExecPlanWorkspace;

/// Allocation attempts before giving up on a racing writer.
const CREATE_ATTEMPTS: u32 = 32;

#[derive(Debug, Clone)]
pub struct CreateExecPlanRequest {
    pub title: String,
    pub slug: Option<String>,
    pub owner: Option<String>,
    pub kind: Option<String>,
    pub domain: Option<String>,
    /// `YYYYMMDD`; defaults to today.
    pub date: Option<String>,
    /// Overrides the workspace's `update_on_mutation` policy.
    pub update_registry: Option<bool>,
}

impl CreateExecPlanRequest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            slug: None,
            owner: None,
            kind: None,
            domain: None,
            date: None,
            update_registry: None,
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

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
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

    pub fn with_update_registry(mut self, update: bool) -> Self {
        self.update_registry = Some(update);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExecPlanCreateResult {
    pub plan_id: ExecPlanId,
    pub plan_path: PathBuf,
    pub slug: String,
    pub registry_result: Option<RegistryBuildResult>,
}

#[derive(Debug, Clone)]
pub struct ExecPlanArchiveResult {
    pub plan_id: ExecPlanId,
    pub source_plan_path: PathBuf,
    pub archived_plan_path: PathBuf,
    pub source_plan_root: PathBuf,
    pub archived_plan_root: PathBuf,
    pub registry_result: Option<RegistryBuildResult>,
}

/// The unique plan file for an ID and the root it lives in.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedPlan {
    pub execplan_id: ExecPlanId,
    pub plan_path: PathBuf,
    pub location: PlanLocation,
}

/// Finds the single non-milestone plan file whose filename carries `execplan_id`.
pub(crate) fn resolve_plan(execplans_dir: &Path, execplan_id: &ExecPlanId) -> Result<ResolvedPlan> {
    let matches: Vec<PathBuf> = fs_util::discover_plan_files(execplans_dir)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_execplan_filename)
                .as_ref()
                == Some(execplan_id)
        })
        .collect();
    let plan_path = match matches.as_slice() {
        [] => {
            return Err(ExecPlanError::NotFound(format!(
                "ExecPlan '{execplan_id}' was not found under {}.",
                execplans_dir.display()
            )));
        }
        [single] => single.clone(),
        many => {
            let joined = many
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ExecPlanError::Conflict(format!(
                "ExecPlan ID '{execplan_id}' resolved to multiple files. Resolve duplicates first: {joined}"
            )));
        }
    };
    let location = classify_execplan_path(&plan_path, execplans_dir).ok_or_else(|| {
        ExecPlanError::UnrecognizedLayout {
            path: plan_path.clone(),
            root: execplans_dir.to_path_buf(),
        }
    })?;
    Ok(ResolvedPlan {
        execplan_id: execplan_id.clone(),
        plan_path,
        location,
    })
}

fn existing_plan_files(plan_root: &Path) -> Result<Vec<PathBuf>> {
    Ok(fs_util::markdown_files(plan_root)?
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("EP-"))
        })
        .collect())
}

fn ensure_slug_free(plan_root: &Path, slug: &str) -> Result<()> {
    let existing = existing_plan_files(plan_root)?;
    if existing.is_empty() {
        return Ok(());
    }
    let joined = existing
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ExecPlanError::Conflict(format!(
        "Cannot create ExecPlan because the active slug directory already contains an ExecPlan file. \
         Slug: {slug}. Existing files: {joined}. Use a new slug or archive/migrate the existing plan first."
    )))
}

fn id_in_use(execplans_dir: &Path, execplan_id: &ExecPlanId) -> Result<bool> {
    Ok(fs_util::discover_plan_files(execplans_dir)?.iter().any(|path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_execplan_filename)
            .as_ref()
            == Some(execplan_id)
    }))
}

fn rebuild_registry(ws: &ExecPlanWorkspace, requested: Option<bool>) -> Result<Option<RegistryBuildResult>> {
    if !requested.unwrap_or(ws.registry.update_on_mutation) {
        return Ok(None);
    }
    build_execplan_registry(ws, &RegistryBuildOptions::from(ws.registry)).map(Some)
}

/// Creates a new ExecPlan at `active/<slug>/<id>_<slug>.md`.
///
/// All input is validated before anything is written; the plan file is
/// created exclusively and never overwrites an existing document.
pub fn create_execplan(
    ws: &ExecPlanWorkspace,
    request: &CreateExecPlanRequest,
) -> Result<ExecPlanCreateResult> {
    let title = single_line_field(&request.title, "title")?;
    let owner = single_line_field(
        request.owner.as_deref().unwrap_or(&ws.defaults.owner),
        "owner",
    )?;
    let kind = match request.kind.as_deref() {
        Some(kind) => ExecPlanKind::parse_field(kind.trim())?,
        None => ws.defaults.kind,
    };
    let domain = match request.domain.as_deref() {
        Some(domain) => ExecPlanDomain::parse_field(domain.trim())?,
        None => ws.defaults.domain,
    };
    let slug = identity::plan_slug(request.slug.as_deref(), &title)?;
    let day = DayToken::parse_or_today(request.date.as_deref())?;

    let execplans_dir = ws.ensure_execplans_dir()?;
    let plan_root = execplans_dir.join(ACTIVE_DIR).join(&slug);
    ensure_slug_free(&plan_root, &slug)?;

    let iso_day = day.iso();
    for _ in 0..CREATE_ATTEMPTS {
        let sequence = next_plan_sequence(&execplans_dir, &day)?;
        let plan_id = ExecPlanId::new(&day, sequence)?;
        let lock = MutationLock::acquire(&execplans_dir, &plan_id, &ws.lock_backend)?;
        if id_in_use(&execplans_dir, &plan_id)? {
            tracing::debug!(execplan_id = %plan_id, "ExecPlan ID taken while locking, reallocating");
            continue;
        }
        ensure_slug_free(&plan_root, &slug)?;

        let created_root = !plan_root.exists();
        std::fs::create_dir_all(&plan_root)
            .map_err(|e| ExecPlanError::io("create directory", &plan_root, e))?;
        let plan_path = plan_root.join(format!("{plan_id}_{slug}.md"));
        let vars = HashMap::from([
            ("id", plan_id.to_string()),
            ("title_yaml", yaml_quote(&title)),
            ("title_text", title.clone()),
            ("kind", kind.as_str().to_string()),
            ("domain", domain.as_str().to_string()),
            ("owner_yaml", yaml_quote(&owner)),
            ("created", iso_day.clone()),
            ("updated", iso_day.clone()),
        ]);
        let written = template::render(EXECPLAN_TEMPLATE, &vars).and_then(|content| {
            fs_util::create_exclusive(&plan_path, content.as_bytes()).map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    ExecPlanError::Conflict(format!(
                        "ExecPlan file already exists: {}",
                        plan_path.display()
                    ))
                } else {
                    ExecPlanError::io("create ExecPlan", &plan_path, e)
                }
            })
        });
        if let Err(e) = written {
            if created_root && let Err(cleanup) = std::fs::remove_dir(&plan_root) {
                tracing::warn!(
                    path = %plan_root.display(),
                    error = %cleanup,
                    "failed to remove plan root after create failed"
                );
            }
            return Err(e);
        }
        drop(lock);

        tracing::info!(execplan_id = %plan_id, path = %plan_path.display(), "created ExecPlan");
        let registry_result = rebuild_registry(ws, request.update_registry)?;
        return Ok(ExecPlanCreateResult {
            plan_id,
            plan_path,
            slug,
            registry_result,
        });
    }

    Err(ExecPlanError::Conflict(
        "Could not allocate a unique ExecPlan ID due to concurrent writes. Retry the command."
            .to_string(),
    ))
}

/// Moves an ExecPlan's root into `archive/YYYY/MM/DD/<id>_<root-name>/` and
/// marks it archived. `date` is `YYYYMMDD` and defaults to today.
pub fn archive_execplan(
    ws: &ExecPlanWorkspace,
    execplan_id: &str,
    date: Option<&str>,
) -> Result<ExecPlanArchiveResult> {
    archive_execplan_with(ws, execplan_id, date, None, &RealFs)
}

/// Like [`archive_execplan`] with an explicit registry override.
pub fn archive_execplan_with_registry(
    ws: &ExecPlanWorkspace,
    execplan_id: &str,
    date: Option<&str>,
    update_registry: bool,
) -> Result<ExecPlanArchiveResult> {
    archive_execplan_with(ws, execplan_id, date, Some(update_registry), &RealFs)
}

pub(crate) fn archive_execplan_with(
    ws: &ExecPlanWorkspace,
    execplan_id: &str,
    date: Option<&str>,
    update_registry: Option<bool>,
    fs: &dyn ArchiveFs,
) -> Result<ExecPlanArchiveResult> {
    let plan_id = ExecPlanId::parse_arg(execplan_id.trim())?;
    let day = DayToken::parse_or_today(date)?;
    let execplans_dir = ws.existing_execplans_dir()?;

    let outcome = {
        let _lock = MutationLock::acquire(&execplans_dir, &plan_id, &ws.lock_backend)?;
        let plan = resolve_plan(&execplans_dir, &plan_id)?;
        archive::archive_resolved_plan(&execplans_dir, &plan, day, fs)?
    };

    tracing::info!(
        execplan_id = %plan_id,
        path = %outcome.archived_plan_path.display(),
        "archived ExecPlan"
    );
    let registry_result = rebuild_registry(ws, update_registry)?;
    Ok(ExecPlanArchiveResult {
        plan_id,
        source_plan_path: outcome.source_plan_path,
        archived_plan_path: outcome.archived_plan_path,
        source_plan_root: outcome.source_plan_root,
        archived_plan_root: outcome.archived_plan_root,
        registry_result,
    })
}
