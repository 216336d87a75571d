use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Environment reader for one profile: `{PROFILE}_{KEY}` shadows `{KEY}`.
#[derive(Debug, Clone, Copy)]
struct ProfiledEnv<'a> {
    profile: &'a str,
}

impl<'a> ProfiledEnv<'a> {
    fn new(profile: &'a str) -> Self {
        Self { profile }
    }

    /// Non-empty value of the profiled key, else of the plain key.
    fn get(&self, key: &str) -> Option<String> {
        let read = |k: &str| env::var(k).ok().filter(|v| !v.is_empty());
        if self.profile.is_empty() {
            return read(key);
        }
        read(&format!("{}_{key}", self.profile)).or_else(|| read(key))
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Unparseable values fall back to `default`.
    fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| {
            matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub rules: RulesConfig,
    pub aggregation: AggregationConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `VIGIL_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env::var("VIGIL_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let profile = profile.trim().to_uppercase();
        let env = ProfiledEnv::new(&profile);
        Self {
            server: ServerConfig::read(env),
            rules: RulesConfig::read(env),
            aggregation: AggregationConfig::read(env),
            notify: NotifyConfig::read(env),
            profile,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  rules:       dir={}, watch={}", self.rules.dir.display(), self.rules.watch);
        tracing::info!(
            "  aggregation: sweep_every={}s, retention={}s",
            self.aggregation.sweep_interval_secs,
            self.aggregation.retention_secs
        );
        tracing::info!("  notify:      timeout={}s", self.notify.timeout_secs);
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn read(env: ProfiledEnv<'_>) -> Self {
        Self {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 3002),
            cors_origin: env.string("CORS_ORIGIN", "*"),
        }
    }
}

// ── Rules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    pub dir: PathBuf,
    /// Reload the rule set when files in `dir` change.
    pub watch: bool,
}

impl RulesConfig {
    fn read(env: ProfiledEnv<'_>) -> Self {
        Self {
            dir: PathBuf::from(env.string("RULES_DIR", "rules")),
            watch: env.flag("RULES_WATCH", false),
        }
    }
}

// ── Aggregation ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub sweep_interval_secs: u64,
    /// Idle buckets older than this are evicted. Must exceed every rule window.
    pub retention_secs: u64,
}

impl AggregationConfig {
    fn read(env: ProfiledEnv<'_>) -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval_secs: env.parse("AGGREGATION_SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            retention_secs: env.parse("AGGREGATION_RETENTION_SECS", defaults.retention_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            retention_secs: 600,
        }
    }
}

// ── Notify ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Upper bound on a single notification target call.
    pub timeout_secs: u64,
}

impl NotifyConfig {
    fn read(env: ProfiledEnv<'_>) -> Self {
        Self {
            timeout_secs: env.parse("NOTIFY_TIMEOUT_SECS", Self::default().timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_key_wins_over_plain_key() {
        env::set_var("VIGILTEST_AGGREGATION_RETENTION_SECS", "900");
        let cfg = Config::for_profile("vigiltest");
        assert_eq!(cfg.profile, "VIGILTEST");
        assert_eq!(cfg.aggregation.retention_secs, 900);
        env::remove_var("VIGILTEST_AGGREGATION_RETENTION_SECS");
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        let env = ProfiledEnv::new("VIGILBOOL");
        env::set_var("VIGILBOOL_RULES_WATCH", "Yes");
        assert!(env.flag("RULES_WATCH", false));
        env::set_var("VIGILBOOL_RULES_WATCH", "off");
        assert!(!env.flag("RULES_WATCH", true));
        env::remove_var("VIGILBOOL_RULES_WATCH");
    }

    #[test]
    fn unparseable_number_falls_back_to_default() {
        env::set_var("VIGILNUM_PORT", "not-a-port");
        assert_eq!(ProfiledEnv::new("VIGILNUM").parse("PORT", 3002u16), 3002);
        env::remove_var("VIGILNUM_PORT");
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let agg = AggregationConfig {
            sweep_interval_secs: 0,
            retention_secs: 600,
        };
        assert_eq!(agg.sweep_interval(), Duration::from_secs(1));
        assert_eq!(NotifyConfig { timeout_secs: 0 }.timeout(), Duration::from_secs(1));
    }
}
