//! Error types for ExecPlan operations
//!
//! Every create/archive entry point either fully succeeds or returns one of
//! these errors with the on-disk state unchanged. `RollbackFailed` is the
//! single exception: it names the path left behind by a failed undo.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// ExecPlan result type alias
pub type Result<T> = std::result::Result<T, ExecPlanError>;

/// ExecPlan error taxonomy
#[derive(Debug, Error)]
pub enum ExecPlanError {
    /// Bad input caught before any filesystem write.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(
        "ExecPlan path {} is not under a recognized ExecPlan layout rooted at {}.",
        path.display(),
        root.display()
    )]
    UnrecognizedLayout { path: PathBuf, root: PathBuf },

    #[error("Invalid document {}: {reason}", path.display())]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("Failed to {context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Could not acquire lock for {execplan_id} at {} within {attempts} attempts ({:?} apart)",
        lock_path.display(),
        delay
    )]
    LockTimeout {
        execplan_id: String,
        lock_path: PathBuf,
        attempts: u32,
        delay: Duration,
    },

    #[error(
        "Rollback did not succeed; orphaned path: {} (original failure: {cause}; rollback error: {source})",
        orphaned.display()
    )]
    RollbackFailed {
        orphaned: PathBuf,
        cause: String,
        source: std::io::Error,
    },

    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used by the reporting boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Filesystem,
    LockTimeout,
    /// State could not be restored after a partial archive.
    Fatal,
}

impl ExecPlanError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExecPlanError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecPlanError::Validation(_) | ExecPlanError::UnrecognizedLayout { .. } => {
                ErrorKind::Validation
            }
            ExecPlanError::NotFound(_) => ErrorKind::NotFound,
            ExecPlanError::Conflict(_) | ExecPlanError::InvalidDocument { .. } => {
                ErrorKind::Conflict
            }
            ExecPlanError::Io { .. } | ExecPlanError::Json(_) => ErrorKind::Filesystem,
            ExecPlanError::LockTimeout { .. } => ErrorKind::LockTimeout,
            ExecPlanError::RollbackFailed { .. } => ErrorKind::Fatal,
        }
    }

    /// True when callers may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecPlanError::LockTimeout { .. } => true,
            ExecPlanError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ExecPlanError::Validation("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ExecPlanError::UnrecognizedLayout {
                path: PathBuf::from("/x/y.md"),
                root: PathBuf::from("/z"),
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ExecPlanError::Conflict("dup".into()).kind(),
            ErrorKind::Conflict
        );
        let rollback = ExecPlanError::RollbackFailed {
            orphaned: PathBuf::from("/archive/2026/02/12/EP-20260207-001_auth"),
            cause: "disk full".into(),
            source: std::io::Error::other("busy"),
        };
        assert_eq!(rollback.kind(), ErrorKind::Fatal);
        assert!(rollback.to_string().contains("EP-20260207-001_auth"));
    }

    #[test]
    fn test_lock_timeout_is_retryable() {
        let err = ExecPlanError::LockTimeout {
            execplan_id: "EP-20260207-001".into(),
            lock_path: PathBuf::from(".locks/EP-20260207-001.lock"),
            attempts: 200,
            delay: Duration::from_millis(50),
        };
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
        assert!(!ExecPlanError::NotFound("gone".into()).is_retryable());
    }

    #[test]
    fn test_io_display_names_path() {
        let err = ExecPlanError::io(
            "write file",
            "/tmp/EP-20260207-001_auth.md",
            std::io::Error::other("denied"),
        );
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert!(
            err.to_string()
                .starts_with("Failed to write file /tmp/EP-20260207-001_auth.md")
        );
    }
}
