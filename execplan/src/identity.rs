//! Canonical ExecPlan identity, slugs, and day-scoped sequence allocation.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ExecPlanError, Result};
use crate::fs_util;
use crate::paths::{ACTIVE_DIR, ARCHIVE_DIR, MILESTONES_DIR};

/// Highest sequence representable in the three-digit ID suffix.
pub const MAX_SEQUENCE: u16 = 999;

/// Slugs that would collide with the top-level layout namespaces.
pub const RESERVED_ROOT_SLUGS: [&str; 2] = [ACTIVE_DIR, ARCHIVE_DIR];

/// Slugs that would collide with the milestone namespace inside `active/`.
pub const RESERVED_PLAN_SLUGS: [&str; 1] = [MILESTONES_DIR];

/// `EP-YYYYMMDD-NNN`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExecPlanId {
    date: String,
    sequence: u16,
}

impl ExecPlanId {
    pub fn new(day: &DayToken, sequence: u16) -> Result<Self> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ExecPlanError::Validation(format!(
                "ExecPlan sequence must be between 1 and {MAX_SEQUENCE} (got {sequence})."
            )));
        }
        Ok(Self {
            date: day.compact(),
            sequence,
        })
    }

    /// Parses the full-string form. Leading/trailing whitespace is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        let (id, rest) = split_id_prefix(value)?;
        if rest.is_empty() { Some(id) } else { None }
    }

    /// Like [`ExecPlanId::parse`] but reports a validation error.
    pub fn parse_arg(value: &str) -> Result<Self> {
        Self::parse(value).ok_or_else(|| {
            ExecPlanError::Validation(format!(
                "Invalid ExecPlan ID {value:?}. Expected EP-YYYYMMDD-NNN."
            ))
        })
    }

    /// Eight-digit date token.
    pub fn date_token(&self) -> &str {
        &self.date
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }
}

impl fmt::Display for ExecPlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EP-{}-{:03}", self.date, self.sequence)
    }
}

impl FromStr for ExecPlanId {
    type Err = ExecPlanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_arg(s)
    }
}

impl TryFrom<String> for ExecPlanId {
    type Error = ExecPlanError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse_arg(&value)
    }
}

impl From<ExecPlanId> for String {
    fn from(value: ExecPlanId) -> Self {
        value.to_string()
    }
}

/// Splits a leading canonical ID off `value`, returning the remainder.
fn split_id_prefix(value: &str) -> Option<(ExecPlanId, &str)> {
    let rest = value.strip_prefix("EP-")?;
    // `get` keeps non-ASCII input from splitting a char.
    let date = rest.get(..8)?;
    if !date.bytes().all(|b| b.is_ascii_digit()) || rest.get(8..9)? != "-" {
        return None;
    }
    let digits = rest.get(9..12)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sequence: u16 = digits.parse().ok()?;
    Some((
        ExecPlanId {
            date: date.to_string(),
            sequence,
        },
        rest.get(12..)?,
    ))
}

/// Extracts the canonical ID a filename starts with.
///
/// Accepts `EP-YYYYMMDD-NNN` followed by end of name, `.`, `_` or `-`, so
/// both `EP-20260207-001_slug.md` and `EP-20260207-001.md` resolve.
pub fn parse_execplan_filename(filename: &str) -> Option<ExecPlanId> {
    let (id, rest) = split_id_prefix(filename)?;
    match rest.chars().next() {
        None | Some('.') | Some('_') | Some('-') => Some(id),
        Some(_) => None,
    }
}

/// `EP-YYYYMMDD-NNN/MS###`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MilestoneId {
    pub execplan_id: ExecPlanId,
    pub sequence: u16,
}

impl MilestoneId {
    pub fn new(execplan_id: ExecPlanId, sequence: u16) -> Self {
        Self {
            execplan_id,
            sequence,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let (execplan_id, rest) = split_id_prefix(value.trim())?;
        let digits = rest.strip_prefix("/MS")?;
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            execplan_id,
            sequence: digits.parse().ok()?,
        })
    }

    /// `MS###` component.
    pub fn label(&self) -> String {
        milestone_label(self.sequence)
    }
}

impl fmt::Display for MilestoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/MS{:03}", self.execplan_id, self.sequence)
    }
}

pub fn milestone_label(sequence: u16) -> String {
    format!("MS{sequence:03}")
}

/// A local calendar day, the scope of plan sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayToken(NaiveDate);

impl DayToken {
    /// Parses `YYYYMMDD`; anything but eight digits forming a real date fails.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid =
            || ExecPlanError::Validation(format!("Date must use YYYYMMDD format (got {value:?})."));
        if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(DayToken)
            .map_err(|_| invalid())
    }

    pub fn today_local() -> Self {
        DayToken(Local::now().date_naive())
    }

    /// Parses `value` when given, otherwise uses today's local date.
    pub fn parse_or_today(value: Option<&str>) -> Result<Self> {
        match value {
            Some(value) => Self::parse(value),
            None => Ok(Self::today_local()),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        DayToken(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// `YYYYMMDD`
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// `YYYY-MM-DD`
    pub fn iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// `(YYYY, MM, DD)` components for archive sharding.
    pub fn shard(&self) -> (String, String, String) {
        (
            format!("{:04}", self.0.year()),
            format!("{:02}", self.0.month()),
            format!("{:02}", self.0.day()),
        )
    }
}

/// Normalizes free text into a filesystem-safe slug.
pub fn slugify(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(ch);
        } else {
            // Whitespace, '-' and every other character collapse into one dash.
            pending_dash = true;
        }
    }
    if pending_dash {
        slug.push('-');
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Derives the plan slug from an explicit slug or the title and rejects
/// empty or reserved results.
pub fn plan_slug(explicit: Option<&str>, title: &str) -> Result<String> {
    let slug = derive_slug(explicit, title)?;
    validate_plan_slug(&slug)?;
    Ok(slug)
}

/// Rejects slugs that are empty or collide with layout namespaces.
pub fn validate_plan_slug(slug: &str) -> Result<()> {
    if slug.is_empty() {
        return Err(ExecPlanError::Validation(
            "Could not derive a valid slug; provide a slug using letters/numbers.".to_string(),
        ));
    }
    if RESERVED_ROOT_SLUGS.contains(&slug) {
        return Err(ExecPlanError::Validation(format!(
            "Slug {slug:?} is reserved for ExecPlan directory layout roots; choose a different slug."
        )));
    }
    if RESERVED_PLAN_SLUGS.contains(&slug) {
        return Err(ExecPlanError::Validation(format!(
            "Slug {slug:?} is reserved for internal milestone namespace paths; choose a different slug."
        )));
    }
    Ok(())
}

pub(crate) fn derive_slug(explicit: Option<&str>, title: &str) -> Result<String> {
    let slug = slugify(explicit.unwrap_or(title));
    if slug.is_empty() {
        return Err(ExecPlanError::Validation(
            "Could not derive a valid slug; provide a slug using letters/numbers.".to_string(),
        ));
    }
    Ok(slug)
}

/// Trims `value` and requires a non-empty single line without control characters.
pub(crate) fn single_line_field(value: &str, field_name: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.chars().any(char::is_control) {
        return Err(ExecPlanError::Validation(format!(
            "Field '{field_name}' must be a single-line value without control characters."
        )));
    }
    if trimmed.is_empty() {
        return Err(ExecPlanError::Validation(format!(
            "Field '{field_name}' must be non-empty."
        )));
    }
    Ok(trimmed.to_string())
}

/// Next free plan sequence for `day`, counting every non-milestone
/// `EP-*.md` file under `execplans_dir` regardless of layout.
pub fn next_plan_sequence(execplans_dir: &Path, day: &DayToken) -> Result<u16> {
    let token = day.compact();
    let max = fs_util::discover_plan_files(execplans_dir)?
        .iter()
        .filter_map(|path| path.file_name()?.to_str().and_then(parse_execplan_filename))
        .filter(|id| id.date_token() == token)
        .map(|id| id.sequence())
        .max()
        .unwrap_or(0);
    let next = max + 1;
    if next > MAX_SEQUENCE {
        return Err(ExecPlanError::Conflict(format!(
            "ExecPlan sequence overflow for {token}; max is {MAX_SEQUENCE}."
        )));
    }
    tracing::debug!(day = %token, sequence = next, "allocated plan sequence");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execplan_id_roundtrip() {
        let id = ExecPlanId::parse("EP-20260207-001").unwrap();
        assert_eq!(id.date_token(), "20260207");
        assert_eq!(id.sequence(), 1);
        assert_eq!(id.to_string(), "EP-20260207-001");
    }

    #[test]
    fn test_execplan_id_rejects_malformed() {
        for bad in [
            "EP-2026027-001",
            "EP-20260207-01",
            "EP-20260207-0001",
            "ep-20260207-001",
            " EP-20260207-001",
            "EP-20260207_001",
        ] {
            assert!(ExecPlanId::parse(bad).is_none(), "{bad} should not parse");
        }
        assert!(ExecPlanId::parse_arg("nope").is_err());
    }

    #[test]
    fn test_parse_execplan_filename_variants() {
        let expected = ExecPlanId::parse("EP-20260207-001");
        assert_eq!(parse_execplan_filename("EP-20260207-001_auth.md"), expected);
        assert_eq!(parse_execplan_filename("EP-20260207-001.md"), expected);
        assert_eq!(parse_execplan_filename("EP-20260207-001-auth.md"), expected);
        assert_eq!(parse_execplan_filename("EP-20260207-001"), expected);
        assert_eq!(parse_execplan_filename("EP-20260207-0012.md"), None);
        assert_eq!(parse_execplan_filename("MS001_spike.md"), None);
    }

    #[test]
    fn test_non_ascii_ids_are_rejected() {
        for bad in [
            "EP-1234567é-001",
            "EP-20260207é001",
            "EP-20260207-0é1",
            "EP-é0260207-001",
            "EP-20260207-00é",
        ] {
            assert!(ExecPlanId::parse(bad).is_none(), "{bad} should not parse");
            assert!(MilestoneId::parse(&format!("{bad}/MS001")).is_none());
        }
        assert_eq!(parse_execplan_filename("EP-1234567é-001.md"), None);
        assert_eq!(parse_execplan_filename("EP-20260207-00ü_slug.md"), None);
        assert_eq!(
            parse_execplan_filename("EP-20260207-001é.md"),
            None,
            "suffix must start with a separator"
        );
        assert_eq!(
            parse_execplan_filename("EP-20260207-001_ünïcode.md"),
            ExecPlanId::parse("EP-20260207-001")
        );
    }

    #[test]
    fn test_milestone_id_parse() {
        let parsed = MilestoneId::parse("EP-20260207-001/MS012").unwrap();
        assert_eq!(parsed.execplan_id.to_string(), "EP-20260207-001");
        assert_eq!(parsed.sequence, 12);
        assert_eq!(parsed.to_string(), "EP-20260207-001/MS012");
        assert_eq!(parsed.label(), "MS012");
        assert!(MilestoneId::parse("EP-20260207-001/MS12").is_none());
        assert!(MilestoneId::parse("EP-20260207-001").is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Auth Refresh"), "auth-refresh");
        assert_eq!(slugify("  Hello,   World!! "), "hello-world");
        assert_eq!(slugify("snake_case -- kept"), "snake_case-kept");
        assert_eq!(slugify("__edge__"), "edge");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("Ünïcode plan"), "n-code-plan");
    }

    #[test]
    fn test_plan_slug_rejects_reserved() {
        let err = plan_slug(Some("Active"), "ignored").unwrap_err();
        assert!(err.to_string().contains("reserved for ExecPlan directory layout roots"));
        let err = plan_slug(Some("milestones"), "ignored").unwrap_err();
        assert!(err.to_string().contains("reserved for internal milestone namespace"));
        assert!(plan_slug(None, "???").is_err());
        assert_eq!(plan_slug(None, "Auth Refresh").unwrap(), "auth-refresh");
    }

    #[test]
    fn test_day_token() {
        let day = DayToken::parse("20260212").unwrap();
        assert_eq!(day.compact(), "20260212");
        assert_eq!(day.iso(), "2026-02-12");
        assert_eq!(
            day.shard(),
            ("2026".to_string(), "02".to_string(), "12".to_string())
        );
        assert!(DayToken::parse("2026-02-12").is_err());
        assert!(DayToken::parse("20260230").is_err());
        assert!(DayToken::parse("2026021").is_err());
    }

    #[test]
    fn test_single_line_field() {
        assert_eq!(single_line_field("  ok ", "title").unwrap(), "ok");
        assert!(single_line_field("two\nlines", "title").is_err());
        assert!(single_line_field("tab\there", "owner").is_err());
        assert!(single_line_field("   ", "owner").is_err());
    }

    #[test]
    fn test_next_plan_sequence_scans_day() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("active/a")).unwrap();
        std::fs::create_dir_all(root.join("legacy")).unwrap();
        std::fs::create_dir_all(root.join("active/a/milestones/active")).unwrap();
        std::fs::write(root.join("active/a/EP-20260207-003_a.md"), "x").unwrap();
        std::fs::write(root.join("legacy/EP-20260207-001.md"), "x").unwrap();
        std::fs::write(root.join("legacy/EP-20260208-009_other.md"), "x").unwrap();
        std::fs::write(root.join("legacy/EP-2026020é-001.md"), "x").unwrap();
        std::fs::write(
            root.join("active/a/milestones/active/EP-20260207-050_MS001_spike.md"),
            "x",
        )
        .unwrap();

        let day = DayToken::parse("20260207").unwrap();
        assert_eq!(next_plan_sequence(root, &day).unwrap(), 4);
        let other = DayToken::parse("20260209").unwrap();
        assert_eq!(next_plan_sequence(root, &other).unwrap(), 1);
    }
}
