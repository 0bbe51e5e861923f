//! ExecPlan document engine.
//!
//! ExecPlans are Markdown planning documents with YAML front matter, stored
//! one per plan root under an execplans directory. This crate creates and
//! archives plans and their milestones under a per-ID cross-process lock,
//! classifies paths across every historical directory layout, and builds the
//! validated JSON registry of the whole corpus.
//!
//! Entry points take an [`ExecPlanWorkspace`], usually built from
//! [`config::ConfigLoader`] output via [`ExecPlanWorkspace::from_config`].

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod archive;
pub mod config;
pub mod error;
pub mod front_matter;
mod fs_util;
pub mod identity;
pub mod lock;
pub mod milestones;
pub mod paths;
pub mod registry;
pub mod store;
mod template;
pub mod types;
pub mod workspace;

pub use error::{ErrorKind, ExecPlanError, Result};
pub use fs_util::{atomic_write, discover_plan_files};
pub use identity::{DayToken, ExecPlanId, MilestoneId};
pub use lock::{LockBackend, MutationLock};
pub use milestones::{
    CreateMilestoneRequest, MilestoneArchiveResult, MilestoneCreateResult, MilestoneRef,
    archive_execplan_milestone, create_execplan_milestone, list_execplan_milestones,
};
pub use paths::{
    LayoutKind, PlanLocation, classify_execplan_path, get_execplan_plan_root,
    is_execplan_archive_path, is_execplan_milestone_path,
};
pub use registry::{
    ActiveExecPlanSummary, IssueSeverity, Registry, RegistryActivitySummary,
    RegistryBuildOptions, RegistryBuildResult, RegistryIssue, RegistryPlan,
    build_execplan_registry, collect_execplan_registry, list_active_execplan_summaries,
    read_registry, summarize_registry_activity,
};
pub use store::{
    CreateExecPlanRequest, ExecPlanArchiveResult, ExecPlanCreateResult, archive_execplan,
    archive_execplan_with_registry, create_execplan,
};
pub use types::{ExecPlanDomain, ExecPlanKind, ExecPlanStatus, MilestoneLocation, Risk, Touch};
pub use workspace::{CreateDefaults, ExecPlanWorkspace, RegistryPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
