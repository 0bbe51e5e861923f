//! Resolved locations and policy shared by every entry point.

use std::path::{Path, PathBuf};

use crate::config::ExecPlanConfig;
use crate::error::{ExecPlanError, Result};
use crate::lock::LockBackend;
use crate::types::{ExecPlanDomain, ExecPlanKind};

/// Values applied when a create request leaves a field unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDefaults {
    pub owner: String,
    pub kind: ExecPlanKind,
    pub domain: ExecPlanDomain,
}

impl Default for CreateDefaults {
    fn default() -> Self {
        Self {
            owner: "@codex".to_string(),
            kind: ExecPlanKind::Feature,
            domain: ExecPlanDomain::Backend,
        }
    }
}

/// How mutations interact with the registry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryPolicy {
    pub update_on_mutation: bool,
    pub include_timestamp: bool,
    pub fail_on_warn: bool,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            update_on_mutation: true,
            include_timestamp: false,
            fail_on_warn: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecPlanWorkspace {
    pub root: PathBuf,
    pub execplans_dir: PathBuf,
    pub registry_path: PathBuf,
    pub lock_backend: LockBackend,
    pub registry: RegistryPolicy,
    pub milestone_create_retries: u32,
    pub defaults: CreateDefaults,
}

impl ExecPlanWorkspace {
    /// Workspace with built-in defaults rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = ExecPlanConfig::default();
        Self {
            execplans_dir: root.join(&config.paths.execplans_dir),
            registry_path: root.join(&config.paths.registry_path),
            lock_backend: config.lock.backend(),
            registry: RegistryPolicy::default(),
            milestone_create_retries: config.milestones.create_retries,
            defaults: CreateDefaults::default(),
            root,
        }
    }

    /// Resolves configured paths against `root`; absolute paths are kept.
    pub fn from_config(root: impl Into<PathBuf>, config: &ExecPlanConfig) -> Result<Self> {
        let root = root.into();
        let defaults = CreateDefaults {
            owner: config.defaults.owner.trim().to_string(),
            kind: ExecPlanKind::parse_field(&config.defaults.kind)?,
            domain: ExecPlanDomain::parse_field(&config.defaults.domain)?,
        };
        Ok(Self {
            execplans_dir: root.join(&config.paths.execplans_dir),
            registry_path: root.join(&config.paths.registry_path),
            lock_backend: config.lock.backend(),
            registry: RegistryPolicy {
                update_on_mutation: config.registry.update_on_mutation,
                include_timestamp: config.registry.include_timestamp,
                fail_on_warn: config.registry.fail_on_warn,
            },
            milestone_create_retries: config.milestones.create_retries.max(1),
            defaults,
            root,
        })
    }

    pub fn with_execplans_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.execplans_dir = self.root.join(dir);
        self
    }

    pub fn with_registry_path(mut self, path: impl AsRef<Path>) -> Self {
        self.registry_path = self.root.join(path);
        self
    }

    pub fn with_lock_backend(mut self, backend: LockBackend) -> Self {
        self.lock_backend = backend;
        self
    }

    pub fn with_registry_policy(mut self, policy: RegistryPolicy) -> Self {
        self.registry = policy;
        self
    }

    /// Canonical root; the directory must exist.
    pub(crate) fn canonical_root(&self) -> Result<PathBuf> {
        canonical_dir(&self.root, "Repository root")
    }

    /// Canonical execplans directory; the directory must exist.
    pub(crate) fn existing_execplans_dir(&self) -> Result<PathBuf> {
        canonical_dir(&self.execplans_dir, "ExecPlans directory")
    }

    /// Canonical execplans directory, created when missing.
    pub(crate) fn ensure_execplans_dir(&self) -> Result<PathBuf> {
        self.canonical_root()?;
        std::fs::create_dir_all(&self.execplans_dir)
            .map_err(|e| ExecPlanError::io("create directory", &self.execplans_dir, e))?;
        canonical_dir(&self.execplans_dir, "ExecPlans directory")
    }
}

fn canonical_dir(path: &Path, label: &str) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(ExecPlanError::NotFound(format!(
            "{label} not found: {}",
            path.display()
        )));
    }
    path.canonicalize()
        .map_err(|e| ExecPlanError::io("resolve directory", path, e))
}
