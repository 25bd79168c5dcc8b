mod browse;
mod intake;
mod server;
mod storage;

pub use browse::*;
pub use intake::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::step::StepKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            errors.push(ConfigError {
                severity,
                field: field.into(),
                message: message.into(),
            });
        };

        if self.server.port == 0 {
            push(ConfigSeverity::Error, "server.port", "port must be greater than 0");
        }
        if self.server.host.is_empty() {
            push(ConfigSeverity::Error, "server.host", "host must not be empty");
        }
        if self.server.max_concurrent_requests == 0 {
            push(
                ConfigSeverity::Error,
                "server.max_concurrent_requests",
                "concurrency limit must be greater than 0",
            );
        }

        if self.intake.quiescence_ms == 0 {
            push(
                ConfigSeverity::Error,
                "intake.quiescence_ms",
                "quiescence window must be greater than 0",
            );
        }
        if self.intake.fuzzy_threshold > 100 {
            push(
                ConfigSeverity::Error,
                "intake.fuzzy_threshold",
                "threshold must be between 0 and 100",
            );
        }
        if self.intake.default_category.trim().is_empty() {
            push(
                ConfigSeverity::Error,
                "intake.default_category",
                "default category must not be empty",
            );
        }
        if self.intake.archive_chat_id == 0 {
            push(
                ConfigSeverity::Warning,
                "intake.archive_chat_id",
                "no archive chat configured; posts from any chat are accepted",
            );
        }

        if self.browse.steps.is_empty() {
            push(ConfigSeverity::Error, "browse.steps", "at least one step is required");
        }
        let mut seen = HashSet::new();
        if !self.browse.steps.iter().all(|s| seen.insert(*s)) {
            push(ConfigSeverity::Error, "browse.steps", "steps must not repeat");
        }
        if !self.browse.steps.is_empty() && !self.browse.steps.contains(&StepKind::Item) {
            push(
                ConfigSeverity::Warning,
                "browse.steps",
                "no `item` step; completing the flow delivers every matching file",
            );
        }
        if self.browse.cache_capacity == 0 {
            push(
                ConfigSeverity::Error,
                "browse.cache_capacity",
                "cache capacity must be greater than 0",
            );
        }

        let nav = &self.browse.navigation;
        if nav.back.is_empty() || nav.restart.is_empty() || nav.exit.is_empty() {
            push(
                ConfigSeverity::Error,
                "browse.navigation",
                "navigation labels must not be empty",
            );
        }

        errors
    }
}
