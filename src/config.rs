use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ingest::poller::{DEFAULT_MAX_MESSAGES, DEFAULT_POLL_INTERVAL};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Directory for rule files, bet ledger and logs. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    /// How many of the most recent visible messages each poll looks at.
    #[serde(default = "default_poll_max_messages")]
    poll_max_messages: usize,
    /// Bet check layout: `nick(id) [bets] before - after` when true,
    /// `nick(id) before - [bets] _after` when false.
    #[serde(default = "default_true")]
    deferred_bet_display: bool,
    #[serde(default = "default_admin_rules_file")]
    admin_rules_file: String,
    #[serde(default = "default_send_rules_file")]
    send_rules_file: String,
    /// JSON message snapshot written by the chat automation.
    snapshot_file: Option<String>,
    /// Group used when no group is given on the command line.
    group_id: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_poll_max_messages() -> usize {
    DEFAULT_MAX_MESSAGES
}

fn default_true() -> bool {
    true
}

fn default_admin_rules_file() -> String {
    "admin-command-replace.txt".to_string()
}

fn default_send_rules_file() -> String {
    "send-message-replace.txt".to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the config file
    pub config_path: PathBuf,
    /// Directory for state files (rules, ledger, logs).
    pub data_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub poll_max_messages: usize,
    pub deferred_bet_display: bool,
    pub admin_rules_path: PathBuf,
    pub send_rules_path: PathBuf,
    pub snapshot_file: Option<PathBuf>,
    pub group_id: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.poll_interval_ms == 0 {
            return Err(ConfigError::Validation("poll_interval_ms must be greater than zero".into()));
        }
        if file.poll_max_messages == 0 {
            return Err(ConfigError::Validation("poll_max_messages must be greater than zero".into()));
        }
        if file.admin_rules_file.trim().is_empty() || file.send_rules_file.trim().is_empty() {
            return Err(ConfigError::Validation("rule file names must not be empty".into()));
        }
        if file.admin_rules_file.trim() == file.send_rules_file.trim() {
            return Err(ConfigError::Validation(
                "admin_rules_file and send_rules_file must be different files".into(),
            ));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            config_path,
            admin_rules_path: data_dir.join(file.admin_rules_file.trim()),
            send_rules_path: data_dir.join(file.send_rules_file.trim()),
            snapshot_file: file.snapshot_file.map(PathBuf::from),
            group_id: file
                .group_id
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
            poll_interval_ms: file.poll_interval_ms,
            poll_max_messages: file.poll_max_messages,
            deferred_bet_display: file.deferred_bet_display,
            data_dir,
        })
    }
}
