//! Polling configuration
//!
//! Applications that wait on many operations usually want to tune backoff in
//! one place. `PollingConfig` is a small TOML document:
//!
//! ```toml
//! timeout_secs = 900
//!
//! [backoff]
//! initial_delay_ms = 500
//! multiplier = 2.0
//! max_delay_ms = "${OPTRACK_MAX_DELAY_MS:-30000}"
//! ```
//!
//! Environment variables are expanded before parsing, so values may be
//! written as `${VAR}` or `${VAR:-default}`. Only the integer fields
//! (`initial_delay_ms`, `max_delay_ms`, `timeout_secs`) accept a quoted
//! reference; `multiplier` must be written as a plain float.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::backoff::BackoffPolicy;
use crate::handle::WaitOptions;

/// Errors that can occur while loading polling configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config from {path}: {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid backoff policy: {0}")]
    InvalidBackoff(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Environment variable expansion failed: {0}")]
    EnvExpansionError(String),

    #[error("Failed to determine config directory")]
    ConfigDirError,
}

/// Settings applied to wait loops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay schedule between refreshes
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Give up waiting after this many seconds; unset waits indefinitely.
    /// Zero is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl PollingConfig {
    /// Load configuration from the standard location
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults.
    pub fn load_from_path(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            debug!(
                "No polling config at {}, using defaults",
                config_path.display()
            );
            return Ok(PollingConfig::default());
        }

        let content = fs::read_to_string(config_path).map_err(|e| ConfigError::LoadError {
            path: config_path.display().to_string(),
            source: e,
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text, expanding environment variables
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: PollingConfig = toml::from_str(&expanded)?;
        config.backoff.validate()?;
        if config.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "timeout_secs must be > 0; omit it to wait indefinitely".to_string(),
            ));
        }
        Ok(config)
    }

    /// Standard config file location (`<config dir>/optrack/polling.toml`)
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("io", "optrack", "optrack").ok_or(ConfigError::ConfigDirError)?;

        Ok(proj_dirs.config_dir().join("polling.toml"))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Wait options carrying this configuration's backoff and timeout
    pub fn wait_options(&self) -> WaitOptions {
        let options = WaitOptions::new().backoff(self.backoff.clone());
        match self.timeout() {
            Some(timeout) => options.timeout(timeout),
            None => options,
        }
    }

    /// Expand `${VAR}` and `${VAR:-default}` references
    ///
    /// Quoted integers (`"${VAR:-100}"`) are unquoted after expansion so that
    /// integer fields can be driven from the environment, including inside
    /// inline tables.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let expanded = shellexpand::env(content)
            .map_err(|e| ConfigError::EnvExpansionError(e.to_string()))?
            .into_owned();

        if expanded == content {
            return Ok(expanded);
        }

        Ok(unquote_integers(&expanded))
    }
}

/// Replace every basic string holding only ASCII digits with the bare integer
///
/// Anything else stays quoted, so `"inf"` or `"1.5"` still fails to parse as an
/// integer field.
fn unquote_integers(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(open) = rest.find(|c: char| c == '"' || c == '\'' || c == '#') {
        out.push_str(&rest[..open]);
        let marker = rest.as_bytes()[open];
        let tail = &rest[open + 1..];

        // Comments and literal strings are copied through untouched
        let close = match marker {
            b'#' => tail.find('\n').map(|i| i + 1).unwrap_or(tail.len()),
            b'\'' => tail.find('\'').map(|i| i + 1).unwrap_or(tail.len()),
            _ => basic_string_end(tail),
        };
        let body = &rest[open..open + 1 + close];

        match body.strip_prefix('"').and_then(|b| b.strip_suffix('"')) {
            Some(inner) if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) => {
                out.push_str(inner)
            }
            _ => out.push_str(body),
        }
        rest = &tail[close..];
    }

    out.push_str(rest);
    out
}

/// Length of a basic string's body including the closing quote
fn basic_string_end(tail: &str) -> usize {
    let mut escaped = false;
    for (i, c) in tail.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return i + 1,
            '\n' => return i,
            _ => {}
        }
    }
    tail.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_config_serialization() {
        let config = PollingConfig {
            backoff: BackoffPolicy::new(Duration::from_millis(500), 2.0, Duration::from_secs(30)),
            timeout_secs: Some(900),
        };

        let serialized = toml::to_string(&config).unwrap();
        let deserialized = PollingConfig::from_toml_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = PollingConfig::from_toml_str("").unwrap();
        assert_eq!(config, PollingConfig::default());
        assert!(config.timeout().is_none());
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let err = PollingConfig::from_toml_str(
            r#"
[backoff]
initial_delay_ms = 5000
max_delay_ms = 1000
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackoff(_)));
    }

    #[test]
    #[serial]
    fn test_env_var_expansion() {
        unsafe {
            std::env::set_var("OPTRACK_TEST_MAX_DELAY", "45000");
        }

        let config = PollingConfig::from_toml_str(
            r#"
[backoff]
max_delay_ms = "${OPTRACK_TEST_MAX_DELAY}"
"#,
        )
        .unwrap();
        assert_eq!(config.backoff.max_delay_ms, 45_000);

        unsafe {
            std::env::remove_var("OPTRACK_TEST_MAX_DELAY");
        }
    }

    #[test]
    #[serial]
    fn test_env_var_expansion_with_defaults() {
        unsafe {
            std::env::remove_var("OPTRACK_TEST_TIMEOUT");
        }

        let config = PollingConfig::from_toml_str(r#"timeout_secs = "${OPTRACK_TEST_TIMEOUT:-120}""#)
            .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = PollingConfig::from_toml_str("timeout_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }

    #[test]
    #[serial]
    fn test_env_var_expansion_in_inline_table() {
        unsafe {
            std::env::remove_var("OPTRACK_TEST_INLINE_MAX");
        }

        let config = PollingConfig::from_toml_str(
            r#"backoff = { initial_delay_ms = 250, max_delay_ms = "${OPTRACK_TEST_INLINE_MAX:-30000}" }"#,
        )
        .unwrap();
        assert_eq!(config.backoff.initial_delay_ms, 250);
        assert_eq!(config.backoff.max_delay_ms, 30_000);
    }

    #[test]
    #[serial]
    fn test_env_var_expansion_rejects_non_integers() {
        unsafe {
            std::env::set_var("OPTRACK_TEST_BAD_DELAY", "inf");
        }

        for content in [
            r#"timeout_secs = "${OPTRACK_TEST_BAD_DELAY}""#,
            r#"timeout_secs = "${OPTRACK_TEST_UNSET_DELAY:-.5}""#,
            r#"timeout_secs = "${OPTRACK_TEST_UNSET_DELAY:-1e3}""#,
        ] {
            let err = PollingConfig::from_toml_str(content).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError(_)), "{content}: {err}");
        }

        unsafe {
            std::env::remove_var("OPTRACK_TEST_BAD_DELAY");
        }
    }

    #[test]
    fn test_unquote_integers_skips_comments_and_literals() {
        let content = "a = \"12\" # \"34\"\nb = '56'\nc = \"x\\\"7\\\"\"\n";
        assert_eq!(
            unquote_integers(content),
            "a = 12 # \"34\"\nb = '56'\nc = \"x\\\"7\\\"\"\n"
        );
    }

    #[test]
    fn test_wait_options_from_config() {
        let config = PollingConfig {
            backoff: BackoffPolicy::fixed(Duration::from_secs(2)),
            timeout_secs: Some(60),
        };
        let options = config.wait_options();
        assert_eq!(options.backoff_policy(), Some(&BackoffPolicy::fixed(Duration::from_secs(2))));
        assert_eq!(options.timeout_duration(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_config_path_ends_with_file_name() {
        if let Ok(path) = PollingConfig::config_path() {
            assert!(path.ends_with("polling.toml"));
        }
    }
}
