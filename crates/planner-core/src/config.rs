//! Planner configuration
//!
//! Layering, lowest priority first: defaults, TOML file, environment
//! (`PLANNER_BASE_URL`, `PLANNER_TOKEN`, `PLANNER_FAN_OUT_LIMIT`), then
//! whatever the caller sets through the `with_*` builders.

use crate::error::PlannerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of leaf summaries fetched concurrently
pub const DEFAULT_FAN_OUT_LIMIT: usize = 4;

/// Planner configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Backend base URL
    pub base_url: String,
    /// Bearer credential, forwarded verbatim
    pub token: Option<String>,
    /// Concurrency ceiling of the summary fan-out
    pub fan_out_limit: usize,
    /// Retry a 404 leaf summary against the tenant-agnostic endpoint
    pub legacy_summary_fallback: bool,
    /// Transport timeout; none by default
    pub request_timeout_secs: Option<u64>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl PlannerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    ///
    /// # Errors
    /// `PlannerError::Config` on invalid TOML
    pub fn from_toml_str(source: &str) -> Result<Self, PlannerError> {
        toml::from_str(source).map_err(|e| PlannerError::Config(e.to_string()))
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `PlannerError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlannerError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Apply `PLANNER_*` environment overrides
    ///
    /// # Errors
    /// `PlannerError::Config` if `PLANNER_FAN_OUT_LIMIT` is not a number
    pub fn with_env_overrides(self) -> Result<Self, PlannerError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup
    ///
    /// # Errors
    /// `PlannerError::Config` if the fan-out limit is not a number
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PlannerError> {
        if let Some(url) = lookup("PLANNER_BASE_URL") {
            self.base_url = url;
        }
        if let Some(token) = lookup("PLANNER_TOKEN") {
            self.token = Some(token);
        }
        if let Some(limit) = lookup("PLANNER_FAN_OUT_LIMIT") {
            self.fan_out_limit = limit.trim().parse().map_err(|_| {
                PlannerError::Config(format!("PLANNER_FAN_OUT_LIMIT is not a number: {limit}"))
            })?;
        }
        Ok(self)
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// With fan-out concurrency ceiling
    #[inline]
    #[must_use]
    pub fn with_fan_out_limit(mut self, limit: usize) -> Self {
        self.fan_out_limit = limit;
        self
    }

    /// With or without the legacy summary fallback
    #[inline]
    #[must_use]
    pub fn with_legacy_fallback(mut self, enabled: bool) -> Self {
        self.legacy_summary_fallback = enabled;
        self
    }

    /// Check invariants
    ///
    /// # Errors
    /// `PlannerError::Config` on a zero fan-out limit or empty base URL
    pub fn validate(&self) -> Result<(), PlannerError> {
        if self.fan_out_limit == 0 {
            return Err(PlannerError::Config("fan_out_limit must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(PlannerError::Config("base_url must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            token: None,
            fan_out_limit: DEFAULT_FAN_OUT_LIMIT,
            legacy_summary_fallback: true,
            request_timeout_secs: None,
            user_agent: concat!("planner/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
