/// Configuration for the ExecPlan engine
///
/// Layered the 12-factor way:
/// 1. Defaults (from code)
/// 2. Config file (`execplan.toml`)
/// 3. Environment variables (`EXECPLAN_*` prefix, `__` for nesting)
///
/// # Example
///
/// ```no_run
/// use agentrules_execplan::config::ConfigLoader;
///
/// let config = ConfigLoader::load_default().expect("Failed to load config");
/// assert!(config.registry.update_on_mutation);
/// ```
pub mod error;
pub mod loader;

pub use error::{ConfigError, Result};
pub use loader::{
    ConfigLoader, DefaultsConfig, ExecPlanConfig, LockBackendSetting, LockConfig,
    MilestonesConfig, PathsConfig, RegistryConfig,
};
