//! Process configuration from environment variables.
//!
//! Only the Discord credentials are required at startup. Sandbox
//! credentials are optional here; their absence surfaces later as a
//! relayed execution failure rather than a refusal to boot.

use tracing::warn;

/// Default per-execution timeout in milliseconds (5 minutes).
const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Default sandbox memory limit in megabytes.
const DEFAULT_MAX_MEMORY_MB: u64 = 1024;

/// Default sandbox CPU limit.
const DEFAULT_MAX_CPUS: u64 = 2;

/// Default sandbox service URL.
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Fatal configuration problem.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Everything the relay reads from the environment.
#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub channel_id: String,
    pub api_url: String,
    pub sandbox_token: Option<String>,
    pub project_id: Option<String>,
    pub team_id: Option<String>,
    pub timeout_ms: u64,
    pub max_memory_mb: u64,
    pub max_cpus: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("api_url", &self.api_url)
            .field("sandbox_token", &self.sandbox_token.as_ref().map(|_| "[REDACTED]"))
            .field("project_id", &self.project_id)
            .field("team_id", &self.team_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_memory_mb", &self.max_memory_mb)
            .field("max_cpus", &self.max_cpus)
            .finish()
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error when a required variable is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let discord_token = require(&lookup, "DISCORD_BOT_TOKEN")?;
        let channel_id = require(&lookup, "DISCORD_CHANNEL_ID")?;

        Ok(Self {
            discord_token,
            channel_id,
            api_url: optional(&lookup, "SANDBOX_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            sandbox_token: optional(&lookup, "SANDBOX_TOKEN"),
            project_id: optional(&lookup, "SANDBOX_PROJECT_ID"),
            team_id: optional(&lookup, "SANDBOX_TEAM_ID"),
            timeout_ms: numeric_or_default(&lookup, "SANDBOX_TIMEOUT", DEFAULT_TIMEOUT_MS),
            max_memory_mb: numeric_or_default(&lookup, "SANDBOX_MAX_MEMORY", DEFAULT_MAX_MEMORY_MB),
            max_cpus: numeric_or_default(&lookup, "SANDBOX_MAX_CPUS", DEFAULT_MAX_CPUS),
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

/// Parse a positive numeric variable, falling back to `default` when the
/// variable is unset, non-numeric, or non-positive.
fn numeric_or_default(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    match optional(lookup, name) {
        None => default,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => value as u64,
            _ => {
                warn!(name, raw = %raw, default, "ignoring non-positive or unparseable value");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn missing_discord_token_fails() {
        let err = Config::from_lookup(lookup_from(&[("DISCORD_CHANNEL_ID", "123")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DISCORD_BOT_TOKEN")));
    }

    #[test]
    fn missing_channel_id_fails() {
        let err = Config::from_lookup(lookup_from(&[("DISCORD_BOT_TOKEN", "tok")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DISCORD_CHANNEL_ID")));
    }

    #[test]
    fn empty_required_value_counts_as_missing() {
        let err = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "   "),
            ("DISCORD_CHANNEL_ID", "123"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("DISCORD_BOT_TOKEN")));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DISCORD_CHANNEL_ID", "123"),
        ]))
        .unwrap();

        assert_eq!(config.timeout_ms, 300_000);
        assert_eq!(config.max_memory_mb, 1024);
        assert_eq!(config.max_cpus, 2);
        assert_eq!(config.api_url, "http://127.0.0.1:8080");
        assert!(config.sandbox_token.is_none());
        assert!(config.project_id.is_none());
    }

    #[test]
    fn numeric_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DISCORD_CHANNEL_ID", "123"),
            ("SANDBOX_TIMEOUT", "60000"),
            ("SANDBOX_MAX_MEMORY", "2048"),
            ("SANDBOX_MAX_CPUS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.timeout_ms, 60_000);
        assert_eq!(config.max_memory_mb, 2048);
        assert_eq!(config.max_cpus, 4);
    }

    #[test]
    fn non_positive_numeric_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DISCORD_CHANNEL_ID", "123"),
            ("SANDBOX_TIMEOUT", "0"),
            ("SANDBOX_MAX_MEMORY", "-5"),
            ("SANDBOX_MAX_CPUS", "lots"),
        ]))
        .unwrap();

        assert_eq!(config.timeout_ms, 300_000);
        assert_eq!(config.max_memory_mb, 1024);
        assert_eq!(config.max_cpus, 2);
    }

    #[test]
    fn blank_optional_credentials_are_treated_as_unset() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "tok"),
            ("DISCORD_CHANNEL_ID", "123"),
            ("SANDBOX_TOKEN", ""),
        ]))
        .unwrap();
        assert!(config.sandbox_token.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "discord-secret"),
            ("DISCORD_CHANNEL_ID", "123"),
            ("SANDBOX_TOKEN", "sandbox-secret"),
        ]))
        .unwrap();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("discord-secret"));
        assert!(!rendered.contains("sandbox-secret"));
        assert!(rendered.contains("123"));
    }
}
