use crate::config::error::{ConfigError, Result};
use crate::lock::LockBackend;
use crate::types::{ExecPlanDomain, ExecPlanKind};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecPlanConfig {
    /// Where plans and the registry live, relative to the repository root
    #[serde(default)]
    pub paths: PathsConfig,

    /// Values used when a create request leaves a field unset
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registry rebuild policy
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub milestones: MilestonesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_execplans_dir")]
    pub execplans_dir: PathBuf,

    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default = "default_domain")]
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Rebuild the registry after every successful create/archive
    #[serde(default = "default_true")]
    pub update_on_mutation: bool,

    /// Stamp `generated_at` into written registries
    #[serde(default)]
    pub include_timestamp: bool,

    /// Refuse to write when any warning is reported
    #[serde(default)]
    pub fail_on_warn: bool,
}

/// Lock backend selection as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackendSetting {
    #[default]
    Auto,
    Blocking,
    Polling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default)]
    pub backend: LockBackendSetting,

    /// Attempts before the polling backend gives up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between polling attempts in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestonesConfig {
    /// Create-exclusive retries after a lost filename race
    #[serde(default = "default_create_retries")]
    pub create_retries: u32,
}

// Default value functions
fn default_execplans_dir() -> PathBuf {
    PathBuf::from(".agent/exec_plans")
}
fn default_registry_path() -> PathBuf {
    PathBuf::from(".agent/exec_plans/registry.json")
}
fn default_owner() -> String {
    "@codex".to_string()
}
fn default_kind() -> String {
    ExecPlanKind::Feature.as_str().to_string()
}
fn default_domain() -> String {
    ExecPlanDomain::Backend.as_str().to_string()
}
fn default_true() -> bool {
    true
}
fn default_retry_attempts() -> u32 {
    crate::lock::DEFAULT_RETRY_ATTEMPTS
}
fn default_retry_delay_ms() -> u64 {
    crate::lock::DEFAULT_RETRY_DELAY.as_millis() as u64
}
fn default_create_retries() -> u32 {
    32
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            execplans_dir: default_execplans_dir(),
            registry_path: default_registry_path(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            kind: default_kind(),
            domain: default_domain(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            update_on_mutation: default_true(),
            include_timestamp: false,
            fail_on_warn: false,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: LockBackendSetting::default(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for MilestonesConfig {
    fn default() -> Self {
        Self {
            create_retries: default_create_retries(),
        }
    }
}

impl LockConfig {
    /// Concrete backend for this platform and setting.
    pub fn backend(&self) -> LockBackend {
        let polling = LockBackend::Polling {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        };
        match self.backend {
            LockBackendSetting::Blocking => LockBackend::Blocking,
            LockBackendSetting::Polling => polling,
            LockBackendSetting::Auto => match LockBackend::platform_default() {
                LockBackend::Blocking => LockBackend::Blocking,
                LockBackend::Polling { .. } => polling,
            },
        }
    }
}

impl ExecPlanConfig {
    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<()> {
        if self.paths.execplans_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "paths.execplans_dir must not be empty".to_string(),
            ));
        }
        if self.paths.registry_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "paths.registry_path must not be empty".to_string(),
            ));
        }
        let owner = self.defaults.owner.trim();
        if owner.is_empty() || owner.chars().any(char::is_control) {
            return Err(ConfigError::ValidationError(format!(
                "defaults.owner must be a non-empty single-line value (got {:?})",
                self.defaults.owner
            )));
        }
        if ExecPlanKind::parse(&self.defaults.kind).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "defaults.kind {:?} is not one of {:?}",
                self.defaults.kind,
                ExecPlanKind::allowed()
            )));
        }
        if ExecPlanDomain::parse(&self.defaults.domain).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "defaults.domain {:?} is not one of {:?}",
                self.defaults.domain,
                ExecPlanDomain::allowed()
            )));
        }
        if self.lock.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "lock.retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.milestones.create_retries == 0 {
            return Err(ConfigError::ValidationError(
                "milestones.create_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loader with layered merging support
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration with layered merging:
    /// 1. Start with defaults (from Default implementations)
    /// 2. Merge config file if provided
    /// 3. Override with environment variables (EXECPLAN_ prefix)
    pub fn load(&self) -> Result<ExecPlanConfig> {
        let mut builder = Config::builder();

        let defaults_json = serde_json::to_string(&ExecPlanConfig::default())?;
        builder = builder.add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        if let Some(ref path) = self.config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_ref()));
            } else {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }

        // Example: EXECPLAN_REGISTRY__FAIL_ON_WARN=true
        builder = builder.add_source(
            Environment::with_prefix("EXECPLAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: ExecPlanConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::debug!(
            execplans_dir = %config.paths.execplans_dir.display(),
            file = ?self.config_path,
            "loaded ExecPlan configuration"
        );
        Ok(config)
    }

    /// Locate the default config file in standard locations:
    /// 1. Current directory: ./execplan.toml
    /// 2. User config: <config_dir>/agentrules/execplan.toml
    pub fn find_config_file() -> Option<PathBuf> {
        let cwd_config = PathBuf::from("./execplan.toml");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("agentrules").join("execplan.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<ExecPlanConfig> {
        let loader = if let Some(config_path) = Self::find_config_file() {
            ConfigLoader::new().with_file(config_path)
        } else {
            ConfigLoader::new()
        };

        loader.load()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
