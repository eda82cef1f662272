use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use adlog_coordinator::CoordinatorConfig;
use adlog_core::{EventType, SignerId};
use adlog_logging::LogConfig;

/// Application configuration, loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory for the content store and ledger
    pub data_dir: PathBuf,
    /// Ledger records re-projected into the cache before listing
    pub index_window: usize,
    pub coordinator: CoordinatorConfig,
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./adlog-data"),
            index_window: 10_000,
            coordinator: CoordinatorConfig::default(),
            logging: LogConfig {
                default_level: "warn".into(),
                ..LogConfig::default()
            },
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.data_dir.join("content")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.data_dir.join("ledger")
    }
}

#[derive(Parser)]
#[command(name = "adlog", about = "Record and query ad events across ledger, content store, and cache")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Signing identity for ledger appends (overrides the config file)
    #[arg(long, global = true)]
    pub signer: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Human-readable logs instead of JSONL
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Resolve the effective configuration: file, then flags
    pub fn app_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(signer) = &self.signer {
            config.coordinator.signer = SignerId::new(signer.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.default_level = level.clone();
        }
        if self.pretty {
            config.logging.console.pretty = true;
        }

        Ok(config)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Record a new event
    Create {
        /// Event type (impression, click, conversion, or 0-2)
        #[arg(long = "type")]
        event_type: EventType,
        /// Requester IP address
        #[arg(long)]
        ip: String,
        /// Device descriptor
        #[arg(long)]
        device: String,
        /// Location descriptor
        #[arg(long, default_value = "")]
        location: String,
        /// Event time; defaults to now (unix seconds)
        #[arg(long)]
        timestamp: Option<i64>,
        /// Owning account
        #[arg(long)]
        account: String,
    },
    /// Fetch one event by record id
    Get {
        record_id: String,
    },
    /// List the most recent events
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Page size; defaults to the configured default
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Finish a submission that timed out waiting for finality
    Resume {
        record_id: String,
        address: String,
    },
    /// Re-project the latest ledger records into the cache
    RebuildIndex {
        /// Maximum records to re-project
        #[arg(long)]
        max: Option<usize>,
    },
}
