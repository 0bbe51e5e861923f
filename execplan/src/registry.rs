//! Registry builder: full-corpus scan, validation, and the JSON snapshot.
//!
//! Problems found in documents are reported as [`RegistryIssue`]s so a whole
//! corpus can be checked in one pass. Only plans without errors make it into
//! the snapshot, and the snapshot is only written when the corpus is clean.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ExecPlanError, Result};
use crate::front_matter::{FrontMatter, FrontMatterError, scalar_text};
use crate::fs_util;
use crate::identity::{ExecPlanId, MilestoneId, parse_execplan_filename};
use crate::paths::{
    ACTIVE_DIR, ARCHIVE_DIR, MILESTONES_DIR, display_relative, get_execplan_plan_root,
    is_execplan_archive_path,
};
use crate::types::{ExecPlanDomain, ExecPlanKind, ExecPlanStatus, Risk, Touch};
use crate::workspace::{ExecPlanWorkspace, RegistryPolicy};

pub const REGISTRY_SCHEMA_VERSION: u32 = 1;

const REQUIRED_KEYS: [&str; 8] = [
    "id", "title", "status", "kind", "domain", "owner", "created", "updated",
];

/// Validated projection of one ExecPlan's front matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPlan {
    pub id: ExecPlanId,
    pub title: String,
    pub status: ExecPlanStatus,
    pub kind: ExecPlanKind,
    pub domain: ExecPlanDomain,
    pub owner: String,
    pub created: String,
    pub updated: String,
    pub tags: Vec<String>,
    pub touches: Vec<Touch>,
    pub risk: Option<Risk>,
    pub breaking: Option<bool>,
    pub migration: Option<bool>,
    pub links: BTreeMap<String, String>,
    pub depends_on: Vec<String>,
    pub supersedes: Vec<String>,
    /// Relative to the repository root, `/`-separated.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub schema_version: u32,
    pub plans: Vec<RegistryPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryIssue {
    pub severity: IssueSeverity,
    pub message: String,
    pub path: Option<String>,
}

impl RegistryIssue {
    fn error(message: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
            path: path.map(str::to_string),
        }
    }

    fn warning(message: impl Into<String>, path: &str) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
            path: Some(path.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryBuildResult {
    pub registry: Registry,
    pub issues: Vec<RegistryIssue>,
    pub output_path: Option<PathBuf>,
    pub wrote_registry: bool,
}

impl RegistryBuildResult {
    pub fn error_count(&self) -> usize {
        self.count(IssueSeverity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(IssueSeverity::Warning)
    }

    fn count(&self, severity: IssueSeverity) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == severity)
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryBuildOptions {
    pub include_timestamp: bool,
    /// Treat warnings as blocking for the write.
    pub fail_on_warn: bool,
}

impl From<RegistryPolicy> for RegistryBuildOptions {
    fn from(policy: RegistryPolicy) -> Self {
        Self {
            include_timestamp: policy.include_timestamp,
            fail_on_warn: policy.fail_on_warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveExecPlanSummary {
    pub id: ExecPlanId,
    pub title: String,
    pub status: ExecPlanStatus,
    pub path: String,
    pub active_milestones: usize,
    pub total_milestones: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryActivitySummary {
    pub active_execplans: usize,
    pub active_milestones: usize,
    pub total_milestones: usize,
}

/// `[a, "b, c"]` style inline lists; a bare scalar is a one-element list.
fn parse_inline_list(raw: &str) -> Vec<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Vec::new();
    }
    let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) else {
        return vec![value.to_string()];
    };

    let mut items = Vec::new();
    let mut token = String::new();
    let mut quote: Option<char> = None;
    for ch in inner.chars() {
        match (ch, quote) {
            ('\'' | '"', None) => quote = Some(ch),
            (c, Some(open)) if c == open => quote = None,
            (',', None) => items.push(std::mem::take(&mut token)),
            _ => token.push(ch),
        }
    }
    items.push(token);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn loose_text(value: &Value) -> String {
    scalar_text(value)
        .unwrap_or_else(|| serde_yaml::to_string(value).unwrap_or_default())
        .trim()
        .to_string()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(loose_text)
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(raw)) => parse_inline_list(raw),
        Some(other) => {
            let text = loose_text(other);
            if text.is_empty() { Vec::new() } else { vec![text] }
        }
    }
}

fn bool_or_none(value: Option<&Value>) -> std::result::Result<Option<bool>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(format!("Expected boolean or empty value, got '{s}'.")),
        },
        Some(other) => Err(format!(
            "Expected boolean or empty value, got '{}'.",
            loose_text(other)
        )),
    }
}

fn strict_date(value: &Value, field: &str) -> std::result::Result<String, String> {
    let candidate = match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return Err(format!("Field '{field}' must be a YYYY-MM-DD string.")),
    };
    let well_formed = candidate.len() == 10
        && NaiveDate::parse_from_str(&candidate, "%Y-%m-%d").is_ok();
    if !well_formed {
        return Err(format!(
            "Field '{field}' must be YYYY-MM-DD (got '{candidate}')."
        ));
    }
    Ok(candidate)
}

fn closed_value<T>(
    raw: &str,
    label: &str,
    parse: fn(&str) -> Option<T>,
    allowed: Vec<&'static str>,
    issues: &mut Vec<RegistryIssue>,
    path: &str,
) -> Option<T> {
    let parsed = parse(raw);
    if parsed.is_none() {
        issues.push(RegistryIssue::error(
            format!("Invalid {label} '{raw}'. Allowed values: {allowed:?}."),
            Some(path),
        ));
    }
    parsed
}

/// Validates one document's front matter. Returns the plan only when no
/// error was found; warnings are reported either way.
fn build_plan(
    front_matter: &FrontMatter,
    plan_path: &Path,
    path_text: &str,
    execplans_dir: &Path,
) -> (Option<RegistryPlan>, Vec<RegistryIssue>) {
    let mut issues = Vec::new();
    let path = Some(path_text);

    let mut missing: Vec<&str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !front_matter.contains_key(key))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        issues.push(RegistryIssue::error(
            format!("Missing required front matter keys: {missing:?}."),
            path,
        ));
        return (None, issues);
    }
    let text = |key: &str| front_matter.get(key).map(loose_text).unwrap_or_default();

    let raw_id = text("id");
    let id = ExecPlanId::parse(&raw_id);
    if id.is_none() {
        issues.push(RegistryIssue::error(
            format!("Invalid ExecPlan id '{raw_id}'. Expected format EP-YYYYMMDD-NNN."),
            path,
        ));
    }
    let file_name = plan_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match parse_execplan_filename(&file_name) {
        None => issues.push(RegistryIssue::error(
            format!("Filename '{file_name}' must start with canonical id EP-YYYYMMDD-NNN."),
            path,
        )),
        Some(filename_id) if filename_id.to_string() != raw_id => {
            issues.push(RegistryIssue::error(
                format!("Front matter id '{raw_id}' must match filename id '{filename_id}'."),
                path,
            ))
        }
        Some(_) => {}
    }

    let raw_status = text("status");
    let status = closed_value(
        &raw_status,
        "status",
        ExecPlanStatus::parse,
        ExecPlanStatus::allowed(),
        &mut issues,
        path_text,
    );
    let kind = closed_value(
        &text("kind"),
        "kind",
        ExecPlanKind::parse,
        ExecPlanKind::allowed(),
        &mut issues,
        path_text,
    );
    let domain = closed_value(
        &text("domain"),
        "domain",
        ExecPlanDomain::parse,
        ExecPlanDomain::allowed(),
        &mut issues,
        path_text,
    );

    let title = text("title");
    let owner = text("owner");
    if title.is_empty() {
        issues.push(RegistryIssue::error("Field 'title' must be non-empty.", path));
    }
    if owner.is_empty() {
        issues.push(RegistryIssue::error("Field 'owner' must be non-empty.", path));
    }

    let mut date_field = |key: &str| -> String {
        let value = front_matter.get(key).cloned().unwrap_or(Value::Null);
        strict_date(&value, key).unwrap_or_else(|message| {
            issues.push(RegistryIssue::error(message, path));
            String::new()
        })
    };
    let created = date_field("created");
    let updated = date_field("updated");

    let tags = string_list(front_matter.get("tags"));
    let touches: Vec<Touch> = string_list(front_matter.get("touches"))
        .iter()
        .filter_map(|touch| {
            closed_value(
                touch,
                "touches entry",
                Touch::parse,
                Touch::allowed(),
                &mut issues,
                path_text,
            )
        })
        .collect();

    let risk = match front_matter.get("risk") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => closed_value(
            &loose_text(value),
            "risk",
            Risk::parse,
            Risk::allowed(),
            &mut issues,
            path_text,
        ),
    };

    let (breaking, migration) = match (
        bool_or_none(front_matter.get("breaking")),
        bool_or_none(front_matter.get("migration")),
    ) {
        (Ok(breaking), Ok(migration)) => (breaking, migration),
        (Err(message), _) | (_, Err(message)) => {
            issues.push(RegistryIssue::error(message, path));
            (None, None)
        }
    };

    let links = match front_matter.get("links") {
        None | Some(Value::Null) => BTreeMap::new(),
        Some(Value::String(s)) if s.is_empty() => BTreeMap::new(),
        Some(Value::Mapping(mapping)) => mapping
            .iter()
            .map(|(key, value)| (loose_text(key), loose_text(value)))
            .collect(),
        Some(_) => {
            issues.push(RegistryIssue::error(
                "Field 'links' must be a mapping when provided.",
                path,
            ));
            BTreeMap::new()
        }
    };

    let depends_on = string_list(front_matter.get("depends_on"));
    let supersedes = string_list(front_matter.get("supersedes"));

    let in_archive = is_execplan_archive_path(plan_path, execplans_dir);
    if status == Some(ExecPlanStatus::Archived) && !in_archive {
        issues.push(RegistryIssue::warning(
            "status is 'archived' but plan file is not under an archive path.",
            path_text,
        ));
    }
    if in_archive && !status.is_some_and(|s| s.is_terminal()) {
        issues.push(RegistryIssue::warning(
            "Plan file is under archive path but status is neither 'archived' nor 'done'.",
            path_text,
        ));
    }

    if issues.iter().any(|issue| issue.severity == IssueSeverity::Error) {
        return (None, issues);
    }
    let (Some(id), Some(status), Some(kind), Some(domain)) = (id, status, kind, domain) else {
        return (None, issues);
    };
    let plan = RegistryPlan {
        id,
        title,
        status,
        kind,
        domain,
        owner,
        created,
        updated,
        tags,
        touches,
        risk,
        breaking,
        migration,
        links,
        depends_on,
        supersedes,
        path: path_text.to_string(),
    };
    (Some(plan), issues)
}

fn read_plan_front_matter(plan_path: &Path) -> std::result::Result<FrontMatter, String> {
    let text = std::fs::read_to_string(plan_path).map_err(|e| e.to_string())?;
    FrontMatter::parse_document(&text).map_err(|e| match e {
        FrontMatterError::Missing => {
            "Missing YAML front matter. File must start with a '---' block.".to_string()
        }
        other => other.to_string(),
    })
}

fn cross_check(plans: &[RegistryPlan], issues: &mut Vec<RegistryIssue>) {
    let mut by_id: HashMap<&ExecPlanId, &RegistryPlan> = HashMap::new();
    for plan in plans {
        if let Some(existing) = by_id.insert(&plan.id, plan) {
            issues.push(RegistryIssue::error(
                format!(
                    "Duplicate ExecPlan id '{}' found in '{}' and '{}'.",
                    plan.id, existing.path, plan.path
                ),
                None,
            ));
        }
    }

    for plan in plans {
        for (relation, related) in [
            ("depends_on", &plan.depends_on),
            ("supersedes", &plan.supersedes),
        ] {
            for related_id in related {
                let Some(parsed) = ExecPlanId::parse(related_id) else {
                    issues.push(RegistryIssue::error(
                        format!("Invalid {relation} id '{related_id}' in plan '{}'.", plan.id),
                        Some(plan.path.as_str()),
                    ));
                    continue;
                };
                if !by_id.contains_key(&parsed) {
                    issues.push(RegistryIssue::error(
                        format!(
                            "Unknown {relation} id '{related_id}' referenced by '{}'.",
                            plan.id
                        ),
                        Some(plan.path.as_str()),
                    ));
                }
            }
        }
    }
}

fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Scans and validates every ExecPlan without writing anything.
pub fn collect_execplan_registry(
    ws: &ExecPlanWorkspace,
    include_timestamp: bool,
) -> Result<RegistryBuildResult> {
    let execplans_dir = ws.existing_execplans_dir()?;
    let root = ws.canonical_root()?;

    let mut issues = Vec::new();
    let mut plans = Vec::new();
    for plan_path in fs_util::discover_plan_files(&execplans_dir)? {
        let path_text = display_relative(&plan_path, &root);
        let front_matter = match read_plan_front_matter(&plan_path) {
            Ok(front_matter) => front_matter,
            Err(reason) => {
                issues.push(RegistryIssue::error(
                    format!("Failed to parse ExecPlan front matter: {reason}"),
                    Some(path_text.as_str()),
                ));
                continue;
            }
        };
        let (plan, plan_issues) = build_plan(&front_matter, &plan_path, &path_text, &execplans_dir);
        issues.extend(plan_issues);
        plans.extend(plan);
    }

    cross_check(&plans, &mut issues);
    plans.sort_by(|a, b| a.id.cmp(&b.id));
    tracing::debug!(
        plans = plans.len(),
        issues = issues.len(),
        "collected ExecPlan registry"
    );

    Ok(RegistryBuildResult {
        registry: Registry {
            schema_version: REGISTRY_SCHEMA_VERSION,
            plans,
            generated_at: include_timestamp.then(utc_timestamp),
        },
        issues,
        output_path: None,
        wrote_registry: false,
    })
}

/// Serializes with sorted keys, two-space indent and a trailing newline.
pub fn render_registry_json(registry: &Registry) -> Result<String> {
    let value = serde_json::to_value(registry)?;
    let mut rendered = serde_json::to_string_pretty(&value)?;
    rendered.push('\n');
    Ok(rendered)
}

/// Collects the registry and writes it to the workspace's registry path
/// unless errors (or, with `fail_on_warn`, warnings) were found.
pub fn build_execplan_registry(
    ws: &ExecPlanWorkspace,
    options: &RegistryBuildOptions,
) -> Result<RegistryBuildResult> {
    let result = collect_execplan_registry(ws, options.include_timestamp)?;
    let errors = result.error_count();
    let warnings = result.warning_count();
    if errors > 0 || (options.fail_on_warn && warnings > 0) {
        tracing::warn!(errors, warnings, "registry not written");
        return Ok(result);
    }

    let output_path = ws.registry_path.clone();
    fs_util::atomic_write(&output_path, render_registry_json(&result.registry)?.as_bytes())?;
    tracing::info!(
        path = %output_path.display(),
        plans = result.registry.plans.len(),
        "wrote ExecPlan registry"
    );
    Ok(RegistryBuildResult {
        output_path: Some(output_path),
        wrote_registry: true,
        ..result
    })
}

/// Loads a previously written registry snapshot.
pub fn read_registry(path: &Path) -> Result<Registry> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExecPlanError::NotFound(format!(
                "Registry not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(ExecPlanError::io("read registry", path, e)),
    };
    serde_json::from_str(&text).map_err(|e| ExecPlanError::InvalidDocument {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Owned when the filename prefix (if any), `execplan_id`, and the `id`
/// prefix all name this plan.
fn is_owned_milestone_file(path: &Path, execplan_id: &ExecPlanId) -> bool {
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_execplan_filename);
    if prefix.is_some_and(|prefix| &prefix != execplan_id) {
        return false;
    }
    let Ok(front_matter) = FrontMatter::load(path) else {
        return false;
    };
    let declared = front_matter.get_trimmed("execplan_id");
    if declared.as_deref() != Some(execplan_id.to_string().as_str()) {
        return false;
    }
    front_matter
        .get_trimmed("id")
        .and_then(|id| MilestoneId::parse(&id))
        .is_some_and(|milestone| &milestone.execplan_id == execplan_id)
}

fn count_milestones(plan_path: &Path, execplan_id: &ExecPlanId, execplans_dir: &Path) -> (usize, usize) {
    let Ok(plan_root) = get_execplan_plan_root(plan_path, execplans_dir) else {
        return (0, 0);
    };
    let milestones_root = plan_root.join(MILESTONES_DIR);
    let count = |bucket: &str| {
        fs_util::markdown_files_recursive(&milestones_root.join(bucket))
            .iter()
            .filter(|path| is_owned_milestone_file(path, execplan_id))
            .count()
    };
    let active = count(ACTIVE_DIR);
    (active, active + count(ARCHIVE_DIR))
}

/// Non-archived plans with milestone progress re-scanned from disk.
pub fn list_active_execplan_summaries(
    registry: &Registry,
    ws: &ExecPlanWorkspace,
) -> Vec<ActiveExecPlanSummary> {
    let root = ws.canonical_root().unwrap_or_else(|_| ws.root.clone());
    let execplans_dir = ws
        .existing_execplans_dir()
        .unwrap_or_else(|_| ws.execplans_dir.clone());

    let mut summaries: Vec<ActiveExecPlanSummary> = registry
        .plans
        .iter()
        .filter(|plan| !plan.path.trim().is_empty())
        .filter_map(|plan| {
            let plan_path = root.join(plan.path.trim());
            if is_execplan_archive_path(&plan_path, &execplans_dir) {
                return None;
            }
            let (active_milestones, total_milestones) =
                count_milestones(&plan_path, &plan.id, &execplans_dir);
            Some(ActiveExecPlanSummary {
                id: plan.id.clone(),
                title: plan.title.trim().to_string(),
                status: plan.status,
                path: plan.path.clone(),
                active_milestones,
                total_milestones,
            })
        })
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    summaries
}

pub fn summarize_registry_activity(
    registry: &Registry,
    ws: &ExecPlanWorkspace,
) -> RegistryActivitySummary {
    list_active_execplan_summaries(registry, ws)
        .iter()
        .fold(RegistryActivitySummary::default(), |mut acc, summary| {
            acc.active_execplans += 1;
            acc.active_milestones += summary.active_milestones;
            acc.total_milestones += summary.total_milestones;
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const VALID: &str = "---\nid: EP-20260207-001\ntitle: \"Auth\"\nstatus: planned\nkind: feature\ndomain: backend\nowner: \"@codex\"\ncreated: 2026-02-07\nupdated: 2026-02-07\ntags: [auth, \"a, b\"]\ntouches:\n  - api\nrisk: low\nbreaking: \"false\"\nmigration:\nlinks:\n  issue: \"\"\ndepends_on: []\nsupersedes: []\n---\n\n# Auth\n";

    fn validate(relative: &str, doc: &str) -> (Option<RegistryPlan>, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let execplans = dir.path().to_path_buf();
        let plan_path = execplans.join(relative);
        let front_matter = FrontMatter::parse_document(doc).unwrap();
        let (plan, issues) = build_plan(&front_matter, &plan_path, relative, &execplans);
        (plan, issues.into_iter().map(|i| i.message).collect())
    }

    #[test]
    fn test_inline_list_tokenizer() {
        assert_eq!(parse_inline_list("[a, 'b, c', \"d\"]"), vec!["a", "b, c", "d"]);
        assert_eq!(parse_inline_list("plain"), vec!["plain"]);
        assert_eq!(parse_inline_list("[ ]"), Vec::<String>::new());
        assert_eq!(parse_inline_list("  "), Vec::<String>::new());
        assert_eq!(parse_inline_list("[a,,b]"), vec!["a", "b"]);
    }

    #[test]
    fn test_valid_plan_projection() {
        let (plan, issues) = validate("active/auth/EP-20260207-001_auth.md", VALID);
        assert_eq!(issues, Vec::<String>::new());
        let plan = plan.unwrap();
        assert_eq!(plan.id.to_string(), "EP-20260207-001");
        assert_eq!(plan.tags, vec!["auth".to_string(), "a, b".to_string()]);
        assert_eq!(plan.touches, vec![Touch::Api]);
        assert_eq!(plan.risk, Some(Risk::Low));
        assert_eq!(plan.breaking, Some(false));
        assert_eq!(plan.migration, None);
        assert_eq!(plan.links.get("issue").map(String::as_str), Some(""));
    }

    #[test]
    fn test_missing_keys_reported_sorted() {
        let (plan, issues) = validate(
            "active/a/EP-20260207-001_a.md",
            "---\nid: EP-20260207-001\ntitle: x\n---\n",
        );
        assert!(plan.is_none());
        assert_eq!(
            issues,
            vec![
                "Missing required front matter keys: [\"created\", \"domain\", \"kind\", \"owner\", \"status\", \"updated\"]."
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_field_errors_exclude_plan() {
        let doc = VALID
            .replace("status: planned", "status: shipped")
            .replace("created: 2026-02-07", "created: 2026-2-7")
            .replace("touches:\n  - api", "touches: [api, moon]")
            .replace("breaking: \"false\"", "breaking: maybe");
        let (plan, issues) = validate("active/auth/EP-20260207-002_auth.md", &doc);
        assert!(plan.is_none());
        assert_eq!(
            issues,
            vec![
                "Front matter id 'EP-20260207-001' must match filename id 'EP-20260207-002'."
                    .to_string(),
                "Invalid status 'shipped'. Allowed values: [\"active\", \"archived\", \"done\", \"paused\", \"planned\"]."
                    .to_string(),
                "Field 'created' must be YYYY-MM-DD (got '2026-2-7').".to_string(),
                "Invalid touches entry 'moon'. Allowed values: [\"agents\", \"api\", \"backend\", \"cli\", \"db\", \"docs\", \"frontend\", \"ops\", \"security\", \"tests\", \"ui\"]."
                    .to_string(),
                "Expected boolean or empty value, got 'maybe'.".to_string(),
            ]
        );
    }

    #[test]
    fn test_archive_status_mismatch_warnings() {
        let archived = VALID.replace("status: planned", "status: archived");
        let (plan, issues) = validate("active/auth/EP-20260207-001_auth.md", &archived);
        assert!(plan.is_some());
        assert_eq!(
            issues,
            vec!["status is 'archived' but plan file is not under an archive path.".to_string()]
        );

        let (plan, issues) = validate(
            "archive/2026/02/12/EP-20260207-001_auth/EP-20260207-001_auth.md",
            VALID,
        );
        assert!(plan.is_some());
        assert_eq!(
            issues,
            vec![
                "Plan file is under archive path but status is neither 'archived' nor 'done'."
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_cross_check_relations() {
        let (plan, _) = validate("active/auth/EP-20260207-001_auth.md", VALID);
        let mut plan = plan.unwrap();
        plan.depends_on = vec!["EP-20260101-001".to_string(), "nope".to_string()];
        plan.supersedes = vec!["EP-20260207-001".to_string()];
        let mut issues = Vec::new();
        cross_check(&[plan], &mut issues);
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Unknown depends_on id 'EP-20260101-001' referenced by 'EP-20260207-001'.",
                "Invalid depends_on id 'nope' in plan 'EP-20260207-001'.",
            ]
        );
    }

    #[test]
    fn test_registry_json_is_sorted_with_trailing_newline() {
        let (plan, _) = validate("active/auth/EP-20260207-001_auth.md", VALID);
        let registry = Registry {
            schema_version: REGISTRY_SCHEMA_VERSION,
            plans: vec![plan.unwrap()],
            generated_at: None,
        };
        let json = render_registry_json(&registry).unwrap();
        assert!(json.ends_with("}\n"));
        assert!(json.starts_with("{\n  \"plans\": [\n    {\n      \"breaking\": false,"));
        assert!(!json.contains("generated_at"));
        let parsed: Registry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, registry);
    }
}
