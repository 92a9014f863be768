//! Configuration for the `msgbridge` binary.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/msgbridge/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};

use msgbridge_proto::peer::{PeerId, PeerIdParseError};

use crate::pipeline::{ComposeOptions, SessionConfig};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A peer identifier in the config or on the command line is malformed.
    #[error("invalid peer id {value:?}: {source}")]
    InvalidPeer {
        /// The offending value.
        value: String,
        /// Why it did not parse.
        source: PeerIdParseError,
    },

    /// `timestamp_format` contains a specifier chrono does not know.
    #[error("invalid timestamp format {0:?}")]
    InvalidTimestampFormat(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    account: AccountFileConfig,
    history: HistoryFileConfig,
    outgoing: OutgoingFileConfig,
    replay: ReplayFileConfig,
}

/// `[account]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AccountFileConfig {
    own_id: Option<String>,
}

/// `[history]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HistoryFileConfig {
    threshold_days: Option<u32>,
}

/// `[outgoing]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct OutgoingFileConfig {
    max_chunk_size: Option<usize>,
    max_chunk_count: Option<usize>,
    normalize_markup: Option<bool>,
}

/// `[replay]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReplayFileConfig {
    photo_latency_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved bridge configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The account the session runs as.
    pub own_id: PeerId,
    /// Inbound messages older than this many days are dropped; 0 keeps all.
    pub history_threshold_days: u32,
    /// Outgoing composition.
    pub compose: ComposeOptions,
    /// Simulated photo download latency in replay.
    pub photo_latency: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            own_id: PeerId::user(0),
            history_threshold_days: 14,
            compose: ComposeOptions::default(),
            photo_latency: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/msgbridge/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if the account id or timestamp format is malformed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `BridgeConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let own_id = match cli
            .own_id
            .as_deref()
            .or(file.account.own_id.as_deref())
        {
            Some(value) => value.parse().map_err(|source| ConfigError::InvalidPeer {
                value: value.to_string(),
                source,
            })?,
            None => defaults.own_id,
        };

        let timestamp_format = file
            .replay
            .timestamp_format
            .clone()
            .unwrap_or(defaults.timestamp_format);
        if StrftimeItems::new(&timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::InvalidTimestampFormat(timestamp_format));
        }

        Ok(Self {
            own_id,
            history_threshold_days: cli
                .history_days
                .or(file.history.threshold_days)
                .unwrap_or(defaults.history_threshold_days),
            compose: ComposeOptions {
                max_chunk_size: file
                    .outgoing
                    .max_chunk_size
                    .unwrap_or(defaults.compose.max_chunk_size),
                max_chunk_count: file
                    .outgoing
                    .max_chunk_count
                    .unwrap_or(defaults.compose.max_chunk_count),
                normalize_markup: file
                    .outgoing
                    .normalize_markup
                    .unwrap_or(defaults.compose.normalize_markup),
            },
            photo_latency: file
                .replay
                .photo_latency_ms
                .map_or(defaults.photo_latency, Duration::from_millis),
            timestamp_format,
        })
    }

    /// Session settings derived from this configuration.
    #[must_use]
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            own_id: self.own_id,
            compose: self.compose.clone(),
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Replay a recorded message stream through the ingestion pipeline")]
pub struct CliArgs {
    /// Path to config file (default: `~/.config/msgbridge/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Account the session runs as, e.g. `user:100`.
    #[arg(long, env = "MSGBRIDGE_OWN_ID")]
    pub own_id: Option<String>,

    /// JSON-lines file of inbound messages and peers to replay.
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Message to compose and send after the replay.
    #[arg(long, requires = "to")]
    pub send: Option<String>,

    /// Destination of `--send`, e.g. `chat:7`.
    #[arg(long)]
    pub to: Option<String>,

    /// Drop inbound messages older than this many days (0 keeps all).
    #[arg(long)]
    pub history_days: Option<u32>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "MSGBRIDGE_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/msgbridge.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Read the TOML config file.
///
/// An explicit `--config` path must exist. The per-user file under the
/// platform config dir is optional and its absence yields an empty config.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match dirs::config_dir() {
            Some(dir) => (dir.join("msgbridge").join("config.toml"), false),
            None => return Ok(ConfigFile::default()),
        },
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(ConfigFile::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    Ok(toml::from_str(&contents)?)
}
