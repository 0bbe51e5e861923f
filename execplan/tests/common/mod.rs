//! Shared fixtures for ExecPlan integration tests.

// Not every helper is used by every test binary
#![allow(dead_code)]
// Test utilities use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

use agentrules_execplan::{ExecPlanWorkspace, RegistryPolicy};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Repository root in a temp dir with the default `.agent/exec_plans` layout.
pub struct TestRepo {
    pub temp_dir: TempDir,
    pub ws: ExecPlanWorkspace,
}

impl TestRepo {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let ws = ExecPlanWorkspace::new(temp_dir.path());
        Self { temp_dir, ws }
    }

    /// Mutations leave the registry alone.
    pub fn without_registry() -> Self {
        let mut repo = Self::new();
        repo.ws = repo.ws.with_registry_policy(RegistryPolicy {
            update_on_mutation: false,
            ..RegistryPolicy::default()
        });
        repo
    }

    /// Canonical execplans directory, created on first use.
    pub fn execplans(&self) -> PathBuf {
        std::fs::create_dir_all(&self.ws.execplans_dir).expect("create execplans dir");
        self.ws
            .execplans_dir
            .canonicalize()
            .expect("canonical execplans dir")
    }

    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.execplans().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// `path` relative to the execplans directory, `/`-separated.
    pub fn rel(&self, path: &Path) -> String {
        path.strip_prefix(self.execplans())
            .expect("path under execplans dir")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.execplans().join(relative).exists()
    }

    /// Every plan document in the tree whose filename carries `id`.
    pub fn plan_files_for(&self, id: &str) -> Vec<String> {
        agentrules_execplan::discover_plan_files(&self.execplans())
            .unwrap()
            .iter()
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(id))
            .map(|p| self.rel(p))
            .collect()
    }
}

/// A complete, valid ExecPlan document.
pub fn plan_doc(id: &str, status: &str) -> String {
    format!(
        "---\nid: {id}\ntitle: \"Plan {id}\"\nstatus: {status}\nkind: feature\ndomain: backend\nowner: \"@codex\"\ncreated: 2026-01-01\nupdated: 2026-01-01\ntags: []\ntouches: []\nrisk: low\nbreaking: false\nmigration: false\nlinks: {{}}\ndepends_on: []\nsupersedes: []\n---\n\n# Plan {id}\n"
    )
}

/// Milestone front matter owned by `execplan_id`.
pub fn milestone_doc(execplan_id: &str, sequence: u16) -> String {
    format!(
        "---\nid: {execplan_id}/MS{sequence:03}\nexecplan_id: {execplan_id}\nms: {sequence}\ntitle: \"Milestone {sequence}\"\nstatus: planned\n---\n\n# Milestone {sequence}\n"
    )
}
