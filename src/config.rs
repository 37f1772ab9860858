//! Engine configuration.
//!
//! A single YAML file configures the database location, the scheduler's
//! runaway cap, and the phase classification sets used by the assignment
//! resolver and the onboarding gate. Every field has a default so an empty
//! or missing file yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub phases: PhasesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            scheduler: SchedulerConfig::default(),
            phases: PhasesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path_str,
            source,
        })
    }
}

fn default_database() -> String {
    "ledgerdesk.db".to_string()
}

/// Scheduler runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Per-rule iteration cap for one run. 36 covers three years of
    /// monthly catch-up; a rule that exceeds it is counted as skipped
    /// rather than looping forever.
    #[serde(default = "default_runaway_limit")]
    pub runaway_limit: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            runaway_limit: default_runaway_limit(),
        }
    }
}

fn default_runaway_limit() -> u32 {
    36
}

/// Classification of a template's free-text phase label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseClass {
    Admin,
    Bookkeeper,
    Other,
}

/// Phase label sets driving assignment resolution and the onboarding gate.
/// Matching is case-insensitive on the trimmed label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasesConfig {
    #[serde(default = "default_admin_phases")]
    pub admin: Vec<String>,

    #[serde(default = "default_bookkeeper_phases")]
    pub bookkeeper: Vec<String>,
}

impl Default for PhasesConfig {
    fn default() -> Self {
        Self {
            admin: default_admin_phases(),
            bookkeeper: default_bookkeeper_phases(),
        }
    }
}

impl PhasesConfig {
    /// Classify a free-text phase label once at the lookup boundary.
    pub fn classify(&self, phase: &str) -> PhaseClass {
        let phase = phase.trim();
        if self.admin.iter().any(|p| p.eq_ignore_ascii_case(phase)) {
            PhaseClass::Admin
        } else if self.bookkeeper.iter().any(|p| p.eq_ignore_ascii_case(phase)) {
            PhaseClass::Bookkeeper
        } else {
            PhaseClass::Other
        }
    }
}

fn default_admin_phases() -> Vec<String> {
    [
        "admin setup",
        "contracts",
        "billing",
        "engagement",
        "payroll provider",
    ]
    .map(String::from)
    .to_vec()
}

fn default_bookkeeper_phases() -> Vec<String> {
    [
        "qbo setup",
        "bank feeds",
        "reconcile",
        "chart of accounts",
        "reporting",
        "cleanup",
    ]
    .map(String::from)
    .to_vec()
}
