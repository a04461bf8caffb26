use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64_opt(profile: &str, key: &str) -> Option<u64> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FORKGRID_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FORKGRID_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            engine: EngineConfig::from_env_profiled(p),
            logging: LoggingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  engine:   threshold={}, worker_threads={}, deadline_ms={}",
            self.engine.threshold,
            self.engine.worker_threads,
            self.engine
                .deadline_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!("  logging:  filter={}", self.logging.filter);
    }

    /// JSON view for reports.
    pub fn summary_json(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "engine": {
                "threshold": self.engine.threshold,
                "worker_threads": self.engine.worker_threads,
                "deadline_ms": self.engine.deadline_ms,
            },
            "logging": { "filter": self.logging.filter },
        })
    }
}

// ── Engine ────────────────────────────────────────────────────

/// Tunables for one parallel invocation, read from the environment.
/// Validation happens once they become a scheduler config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Leaf size: rows for row splitting, cells for quadrant splitting.
    pub threshold: usize,
    /// Worker pool size. 0 = available parallelism.
    pub worker_threads: usize,
    /// Wall-clock budget per invocation, if any.
    pub deadline_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: 64,
            worker_threads: 0,
            deadline_ms: None,
        }
    }
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            threshold: profiled_env_usize(p, "FORKGRID_THRESHOLD", defaults.threshold),
            worker_threads: profiled_env_usize(p, "FORKGRID_WORKER_THREADS", defaults.worker_threads),
            deadline_ms: profiled_env_u64_opt(p, "FORKGRID_DEADLINE_MS"),
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub filter: String,
}

impl LoggingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            filter: profiled_env_or(p, "FORKGRID_LOG", "info"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.threshold, 64);
        assert_eq!(config.worker_threads, 0);
        assert_eq!(config.deadline_ms, None);
    }

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        // Unique key names so parallel tests don't race on the environment.
        env::set_var("FORKGRID_TEST_PROFILE_KEY", "7");
        env::set_var("ZED_FORKGRID_TEST_PROFILE_KEY", "11");
        assert_eq!(profiled_env_usize("ZED", "FORKGRID_TEST_PROFILE_KEY", 0), 11);
        assert_eq!(profiled_env_usize("", "FORKGRID_TEST_PROFILE_KEY", 0), 7);
        assert_eq!(profiled_env_usize("", "FORKGRID_TEST_MISSING_KEY", 3), 3);
    }

    #[test]
    fn summary_reports_profile() {
        let config = Config {
            profile: String::new(),
            engine: EngineConfig::default(),
            logging: LoggingConfig { filter: "debug".to_string() },
        };
        let summary = config.summary_json();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["engine"]["threshold"], 64);
    }
}
