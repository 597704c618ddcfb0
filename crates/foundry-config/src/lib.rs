//! Coordinator-level tunables.
//!
//! Everything in data model and component rules is either a
//! script-authored constant (scope `max_time`, builtin arities) or derived
//! at runtime (entity state, job readiness) — none of it is configuration.
//! What *is* configuration is entirely coordinator-side: how many steps an
//! interpreter gets per tick before it's forced to yield, how often the
//! scheduler polls for runnable jobs, how many jobs it advances at once,
//! and where subcontractor modules are loaded from. This module is a small
//! builder that populates from the environment and then lets field-by-field
//! overrides take precedence, rather than a file format —
//! script-level configuration stays inside the DSL itself (Non-goals).

pub mod error;

pub use error::{ConfigError, ConfigResult};

use std::path::PathBuf;
use std::time::Duration;

/// Default interpreter step budget per tick (`ttl`, default 1000).
pub const DEFAULT_TTL: u32 = 1000;
/// Default scheduler poll interval between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default bound on jobs advanced concurrently by one tick.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 16;

/// Coordinator-side tunables. Never serialized into a job blob — these
/// govern how the coordinator drives interpreters, not interpreter state
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Step budget handed to each `Runner` before it must yield a `Timeout`.
    pub default_ttl: u32,
    /// How often the scheduler's tick loop polls for runnable jobs.
    pub poll_interval: Duration,
    /// Upper bound on jobs advanced concurrently within one tick.
    pub max_concurrent_jobs: usize,
    /// Directories searched for subcontractor module manifests. The
    /// modules themselves are an out-of-scope collaborator ; this is
    /// only the search path the coordinator binary passes to whatever
    /// loader registers them.
    pub module_search_path: Vec<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            default_ttl: DEFAULT_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            module_search_path: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ttl(mut self, ttl: u32) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_module_search_path(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.module_search_path.extend(paths);
        self
    }

    /// Overlay values from the process environment on top of whatever the
    /// caller already set. Unset or unparseable variables leave
    /// the existing value untouched rather than erroring — env overlay is
    /// best-effort, not validation.
    pub fn populate_env(mut self) -> Self {
        if let Ok(v) = std::env::var("FOUNDRY_DEFAULT_TTL") {
            if let Ok(n) = v.parse() {
                self.default_ttl = n;
            }
        }
        if let Ok(v) = std::env::var("FOUNDRY_POLL_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.poll_interval = Duration::from_millis(n);
            }
        }
        if let Ok(v) = std::env::var("FOUNDRY_MAX_CONCURRENT_JOBS") {
            if let Ok(n) = v.parse() {
                self.max_concurrent_jobs = n;
            }
        }
        if let Ok(v) = std::env::var("FOUNDRY_MODULE_SEARCH_PATH") {
            self.module_search_path = std::env::split_paths(&v).collect();
        }
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_ttl == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_ttl".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_jobs".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CoordinatorConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let cfg = CoordinatorConfig::new().with_default_ttl(0);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn env_overlay_overrides_ttl() {
        // SAFETY: test-only, single-threaded env mutation scoped to this test.
        unsafe {
            std::env::set_var("FOUNDRY_DEFAULT_TTL", "42");
        }
        let cfg = CoordinatorConfig::new().populate_env();
        assert_eq!(cfg.default_ttl, 42);
        unsafe {
            std::env::remove_var("FOUNDRY_DEFAULT_TTL");
        }
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = CoordinatorConfig::new()
            .with_default_ttl(500)
            .with_max_concurrent_jobs(4)
            .with_module_search_path([PathBuf::from("/opt/foundry/modules")]);
        assert_eq!(cfg.default_ttl, 500);
        assert_eq!(cfg.max_concurrent_jobs, 4);
        assert_eq!(cfg.module_search_path, vec![PathBuf::from("/opt/foundry/modules")]);
    }
}
