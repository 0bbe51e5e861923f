//! Closed value sets used in ExecPlan front matter.
//!
//! Each set renders to the lowercase token stored on disk and parses back
//! from it exactly (no case folding); unknown tokens are validation errors.

use serde::{Deserialize, Serialize};

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            /// Token as written in front matter.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($token => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            /// Allowed tokens, sorted, for error messages.
            pub fn allowed() -> Vec<&'static str> {
                let mut tokens: Vec<&'static str> = Self::all().iter().map(Self::as_str).collect();
                tokens.sort_unstable();
                tokens
            }

            pub(crate) fn parse_field(value: &str) -> crate::Result<Self> {
                Self::parse(value).ok_or_else(|| {
                    crate::ExecPlanError::Validation(format!(
                        "Invalid {} '{}'. Allowed: {:?}",
                        $label,
                        value,
                        Self::allowed()
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_set! {
    /// ExecPlan lifecycle status.
    ExecPlanStatus, "status" {
        Planned => "planned",
        Active => "active",
        Paused => "paused",
        Done => "done",
        Archived => "archived",
    }
}

closed_set! {
    ExecPlanKind, "kind" {
        Feature => "feature",
        Refactor => "refactor",
        Bugfix => "bugfix",
        Migration => "migration",
        Infra => "infra",
        Spike => "spike",
        Perf => "perf",
        Docs => "docs",
        Tests => "tests",
    }
}

closed_set! {
    ExecPlanDomain, "domain" {
        Backend => "backend",
        Frontend => "frontend",
        Console => "console",
        Infra => "infra",
        CrossCutting => "cross-cutting",
        Fullstack => "fullstack",
    }
}

closed_set! {
    /// Areas of the system a plan touches.
    Touch, "touches entry" {
        Api => "api",
        Db => "db",
        Ui => "ui",
        Cli => "cli",
        Agents => "agents",
        Ops => "ops",
        Security => "security",
        Tests => "tests",
        Docs => "docs",
        Backend => "backend",
        Frontend => "frontend",
    }
}

closed_set! {
    Risk, "risk" {
        Low => "low",
        Med => "med",
        High => "high",
    }
}

impl ExecPlanStatus {
    /// Statuses acceptable for a plan stored under an archive path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecPlanStatus::Archived | ExecPlanStatus::Done)
    }
}

/// Where a milestone file currently lives inside its plan root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneLocation {
    Active,
    Archived,
}

impl MilestoneLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneLocation::Active => "active",
            MilestoneLocation::Archived => "archived",
        }
    }
}
