//! Older directory layouts: the shared `active/` root and bare slug roots.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use agentrules_execplan::front_matter::FrontMatter;
use agentrules_execplan::{
    CreateMilestoneRequest, ErrorKind, LayoutKind, archive_execplan, archive_execplan_milestone,
    classify_execplan_path, create_execplan_milestone, list_execplan_milestones,
};
use common::{TestRepo, plan_doc};
use pretty_assertions::assert_eq;

const PLAN_ID: &str = "EP-20260207-001";

fn shared_root_repo() -> TestRepo {
    let repo = TestRepo::without_registry();
    repo.write("active/EP-20260207-001_auth.md", &plan_doc(PLAN_ID, "active"));
    repo
}

#[test]
fn shared_root_milestones_use_prefixed_filenames() {
    let repo = shared_root_repo();
    let created = create_execplan_milestone(
        &repo.ws,
        &CreateMilestoneRequest::new(PLAN_ID, "Spike").with_date("20260208"),
    )
    .unwrap();

    assert_eq!(
        repo.rel(&created.milestone_path),
        "active/milestones/active/EP-20260207-001_MS001_spike.md"
    );
    let listed = list_execplan_milestones(&repo.ws, PLAN_ID, false).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].milestone_id.to_string(), "EP-20260207-001/MS001");
}

#[test]
fn shared_root_archive_moves_plan_and_milestones() {
    let repo = shared_root_repo();
    create_execplan_milestone(&repo.ws, &CreateMilestoneRequest::new(PLAN_ID, "Spike")).unwrap();
    archive_execplan_milestone(&repo.ws, PLAN_ID, 1, None).unwrap();

    let archived = archive_execplan(&repo.ws, PLAN_ID, Some("20260212")).unwrap();
    assert_eq!(
        repo.rel(&archived.archived_plan_root),
        "archive/2026/02/12/EP-20260207-001_active"
    );
    assert_eq!(
        repo.rel(&archived.archived_plan_path),
        "archive/2026/02/12/EP-20260207-001_active/EP-20260207-001_auth.md"
    );
    assert!(repo.exists(
        "archive/2026/02/12/EP-20260207-001_active/milestones/archive/EP-20260207-001_MS001_spike.md"
    ));
    // The shared directory itself stays behind.
    assert!(repo.exists("active"));
    assert!(!repo.exists("active/EP-20260207-001_auth.md"));
    assert!(!repo.exists("active/milestones"));

    let front_matter = FrontMatter::load(&archived.archived_plan_path).unwrap();
    assert_eq!(front_matter.get_str("status").as_deref(), Some("archived"));
    assert_eq!(front_matter.get_str("updated").as_deref(), Some("2026-02-12"));
}

#[test]
fn shared_root_with_two_plans_is_refused() {
    let repo = shared_root_repo();
    repo.write(
        "active/EP-20260207-002_billing.md",
        &plan_doc("EP-20260207-002", "active"),
    );

    let err = archive_execplan(&repo.ws, PLAN_ID, Some("20260212")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(
        err.to_string().contains("multiple top-level ExecPlan files"),
        "{err}"
    );
    assert!(repo.exists("active/EP-20260207-001_auth.md"));
    assert!(!repo.exists("archive"));
}

#[test]
fn shared_root_with_foreign_milestone_state_is_refused() {
    let repo = shared_root_repo();
    repo.write("active/milestones/.EP-20260101-001.seq", "3\n");

    let err = archive_execplan(&repo.ws, PLAN_ID, Some("20260212")).unwrap_err();
    assert!(err.to_string().contains("mixed ownership artifacts"), "{err}");
    assert!(repo.exists("active/milestones/.EP-20260101-001.seq"));
    assert!(repo.exists("active/EP-20260207-001_auth.md"));
}

#[test]
fn legacy_bare_root_archives_whole_directory() {
    let repo = TestRepo::without_registry();
    let plan = repo.write("auth/EP-20260207-001_auth.md", &plan_doc(PLAN_ID, "active"));
    repo.write("auth/notes.md", "scratch\n");

    let location = classify_execplan_path(&plan, &repo.execplans()).unwrap();
    assert_eq!(location.layout, LayoutKind::LegacyBare);

    let archived = archive_execplan(&repo.ws, PLAN_ID, Some("20260212")).unwrap();
    assert_eq!(
        repo.rel(&archived.archived_plan_path),
        "archive/2026/02/12/EP-20260207-001_auth/EP-20260207-001_auth.md"
    );
    assert!(repo.exists("archive/2026/02/12/EP-20260207-001_auth/notes.md"));
    assert!(!repo.exists("auth"));
}

#[test]
fn legacy_archived_plan_is_not_archived_again() {
    let repo = TestRepo::without_registry();
    repo.write(
        "auth/archive/EP-20260207-001_auth.md",
        &plan_doc(PLAN_ID, "archived"),
    );

    let err = archive_execplan(&repo.ws, PLAN_ID, Some("20260212")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(err.to_string().contains("is already archived"), "{err}");
}
