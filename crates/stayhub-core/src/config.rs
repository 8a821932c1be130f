//! Configuration resolution for `StayHub`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/stayhub/settings.json)
//! 3. Project config (.stayhub/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete `StayHub` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            chat: ChatSettings::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Marketplace API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for REST calls, including the `/api` prefix.
    pub base_url: String,
    /// WebSocket URL of the real-time channel.
    pub ws_url: String,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:8080/ws".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Chat synchronization and real-time channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// How long an optimistic message may stay unconfirmed (milliseconds).
    pub send_timeout_ms: u64,
    /// Delay before the first reconnect attempt (seconds).
    pub reconnect_interval_secs: u64,
    /// Upper bound on the reconnect delay (seconds).
    pub reconnect_max_delay_secs: u64,
    /// Growth factor applied to the reconnect delay. `1.0` keeps it fixed.
    pub reconnect_multiplier: f64,
    /// STOMP heart-beat interval (seconds). `0` disables heart-beats.
    pub heartbeat_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            reconnect_interval_secs: 5,
            reconnect_max_delay_secs: 5,
            reconnect_multiplier: 1.0,
            heartbeat_secs: 10,
        }
    }
}

/// A settings file as written. Each field is optional, so a file only
/// overrides what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    api: ApiOverlay,
    chat: ChatOverlay,
    log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiOverlay {
    base_url: Option<String>,
    ws_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatOverlay {
    send_timeout_ms: Option<u64>,
    reconnect_interval_secs: Option<u64>,
    reconnect_max_delay_secs: Option<u64>,
    reconnect_multiplier: Option<f64>,
    heartbeat_secs: Option<u64>,
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
    }

    // Load project config
    if let Some(dir) = project_dir {
        let project_path = dir.join(".stayhub").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("stayhub").join("settings.json"))
}

/// Default location of the persisted session: `~/.stayhub/session.json`.
pub fn session_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".stayhub").join("session.json"))
}

fn load_config_file(path: &Path) -> Result<ConfigOverlay> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

fn merge_config(base: &mut Config, overlay: ConfigOverlay) {
    let ConfigOverlay {
        api,
        chat,
        log_level,
    } = overlay;
    set(&mut base.api.base_url, api.base_url);
    set(&mut base.api.ws_url, api.ws_url);
    set(&mut base.api.timeout_secs, api.timeout_secs);
    set(&mut base.chat.send_timeout_ms, chat.send_timeout_ms);
    set(&mut base.chat.reconnect_interval_secs, chat.reconnect_interval_secs);
    set(&mut base.chat.reconnect_max_delay_secs, chat.reconnect_max_delay_secs);
    set(&mut base.chat.reconnect_multiplier, chat.reconnect_multiplier);
    set(&mut base.chat.heartbeat_secs, chat.heartbeat_secs);
    set(&mut base.log_level, log_level);
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Apply `STAYHUB_*` overrides. `lookup` resolves a variable name to its value.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("STAYHUB_API_URL") {
        config.api.base_url = val;
    }
    if let Some(val) = lookup("STAYHUB_WS_URL") {
        config.api.ws_url = val;
    }
    if let Some(val) = lookup("STAYHUB_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Some(n) = lookup("STAYHUB_SEND_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.chat.send_timeout_ms = n;
    }
    if let Some(n) = lookup("STAYHUB_RECONNECT_SECS").and_then(|v| v.parse().ok()) {
        config.chat.reconnect_interval_secs = n;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_5s_send_timeout() {
        let config = Config::default();
        assert_eq!(config.chat.send_timeout_ms, 5_000);
    }

    #[test]
    fn default_reconnect_is_fixed_5s() {
        let config = Config::default();
        assert_eq!(config.chat.reconnect_interval_secs, 5);
        assert_eq!(config.chat.reconnect_max_delay_secs, 5);
        assert_eq!(config.chat.reconnect_multiplier, 1.0);
    }

    #[test]
    fn partial_file_falls_back_to_section_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api": {"base_url": "https://a/api", "ws_url": "wss://a/ws", "timeout_secs": 3}}"#)
                .unwrap();
        assert_eq!(config.api.base_url, "https://a/api");
        assert_eq!(config.chat.send_timeout_ms, 5_000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("STAYHUB_API_URL", "https://stay.example/api"),
            ("STAYHUB_SEND_TIMEOUT_MS", "2500"),
            ("STAYHUB_RECONNECT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.api.base_url, "https://stay.example/api");
        assert_eq!(config.chat.send_timeout_ms, 2_500);
        // Unparseable values are ignored
        assert_eq!(config.chat.reconnect_interval_secs, 5);
    }

    #[test]
    fn project_config_is_merged() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".stayhub");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(
            settings.join("settings.json"),
            r#"{"log_level": "debug", "chat": {"send_timeout_ms": 1000, "reconnect_interval_secs": 2, "reconnect_max_delay_secs": 30, "reconnect_multiplier": 2.0, "heartbeat_secs": 0}}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.chat.reconnect_max_delay_secs, 30);
    }

    #[test]
    fn later_files_override_only_the_fields_they_name() {
        let mut config = Config::default();
        let global = r#"{"api": {"base_url": "https://prod.example/api"}, "chat": {"heartbeat_secs": 0}}"#;
        merge_config(&mut config, serde_json::from_str(global).unwrap());
        merge_config(&mut config, serde_json::from_str(r#"{"log_level": "debug"}"#).unwrap());

        assert_eq!(config.api.base_url, "https://prod.example/api");
        assert_eq!(config.api.ws_url, "ws://localhost:8080/ws");
        assert_eq!(config.chat.heartbeat_secs, 0);
        assert_eq!(config.chat.send_timeout_ms, 5_000);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn project_file_with_one_chat_field_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".stayhub");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(
            settings.join("settings.json"),
            r#"{"chat": {"reconnect_max_delay_secs": 60}}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.chat.reconnect_max_delay_secs, 60);
        assert_eq!(config.chat.reconnect_multiplier, 1.0);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn broken_project_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".stayhub");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(settings.join("settings.json"), "{ nope").unwrap();

        let err = load_config(Some(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
