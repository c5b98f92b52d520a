//! Configuration management for the server.

use std::env;
use std::time::Duration;
use tandem_engine::{EngineConfig, Normalization, RetryPolicy};

/// Server configuration loaded from environment variables.
///
/// Listen address and engine tuning always resolve (with defaults); each
/// store block is present only when its id and token are both set, so a
/// half-configured deployment still boots and reports "Not configured".
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Deadline for each remote call in a cycle
    pub timeout_per_call: Duration,
    /// Attempts per remote call, including the first
    pub retry_attempts: u32,
    /// Delay before the first retry (doubles per retry)
    pub retry_backoff: Duration,
    /// Sync cycles allowed in flight at once
    pub max_concurrent_cycles: usize,
    /// Cell normalization rule applied before fingerprinting
    pub normalization: Normalization,
    /// Store A: spreadsheet values API
    pub sheets: Option<SheetsConfig>,
    /// Store B: drive workbook API
    pub workbook: Option<WorkbookConfig>,
}

/// Store A configuration (Google-Sheets-style values API).
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    /// Values API base, e.g. `https://sheets.googleapis.com`
    pub api_base: String,
    /// Drive metadata API base, used for last-modified probes
    pub drive_api_base: String,
    /// Spreadsheet document id
    pub spreadsheet_id: String,
    /// Row/column range to reconcile, in A1 notation with sheet prefix
    pub range: String,
    /// Bearer token; acquisition is outside this server's scope
    pub token: String,
}

/// Store B configuration (Microsoft-Graph-style workbook API).
#[derive(Debug, Clone)]
pub struct WorkbookConfig {
    /// Graph API base, e.g. `https://graph.microsoft.com/v1.0`
    pub api_base: String,
    /// Drive item id of the workbook file
    pub drive_item_id: String,
    /// Worksheet name within the workbook
    pub worksheet: String,
    /// Optional explicit range; the used range when absent
    pub range: Option<String>,
    /// Bearer token; acquisition is outside this server's scope
    pub token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let timeout_per_call =
            Duration::from_millis(parse_or("SYNC_TIMEOUT_MS", 30_000)?);
        let retry_attempts = parse_or("SYNC_RETRY_ATTEMPTS", 3)? as u32;
        let retry_backoff =
            Duration::from_millis(parse_or("SYNC_RETRY_BACKOFF_MS", 250)?);
        let max_concurrent_cycles =
            parse_or("SYNC_MAX_CONCURRENT_CYCLES", 1)? as usize;

        let normalization = match env::var("CELL_NORMALIZATION") {
            Ok(raw) => raw
                .parse()
                .map_err(ConfigError::InvalidNormalization)?,
            Err(_) => Normalization::default(),
        };

        Ok(Self {
            host,
            port,
            timeout_per_call,
            retry_attempts,
            retry_backoff,
            max_concurrent_cycles,
            normalization,
            sheets: sheets_from_env(),
            workbook: workbook_from_env(),
        })
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            timeout_per_call: self.timeout_per_call,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts.max(1),
                initial_backoff: self.retry_backoff,
                backoff_factor: 2.0,
            },
            normalization: self.normalization,
            max_concurrent_cycles: self.max_concurrent_cycles.max(1),
        }
    }
}

fn sheets_from_env() -> Option<SheetsConfig> {
    let spreadsheet_id = non_empty("SHEETS_SPREADSHEET_ID")?;
    let token = non_empty("SHEETS_TOKEN")?;

    Some(SheetsConfig {
        api_base: env_or("SHEETS_API_BASE", "https://sheets.googleapis.com"),
        drive_api_base: env_or("SHEETS_DRIVE_API_BASE", "https://www.googleapis.com/drive/v3"),
        spreadsheet_id,
        range: env_or("SHEETS_RANGE", "Sheet1!A:Z"),
        token,
    })
}

fn workbook_from_env() -> Option<WorkbookConfig> {
    let drive_item_id = non_empty("GRAPH_DRIVE_ITEM_ID")?;
    let token = non_empty("GRAPH_TOKEN")?;

    Some(WorkbookConfig {
        api_base: env_or("GRAPH_API_BASE", "https://graph.microsoft.com/v1.0"),
        drive_item_id,
        worksheet: env_or("GRAPH_WORKSHEET", "Sheet1"),
        range: non_empty("GRAPH_RANGE"),
        token,
    })
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}

fn env_or(var: &str, default: &str) -> String {
    non_empty(var).unwrap_or_else(|| default.to_string())
}

fn parse_or(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match non_empty(var) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(var)),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value (expected an integer)")]
    InvalidNumber(&'static str),

    #[error("Invalid CELL_NORMALIZATION value: {0}")]
    InvalidNormalization(String),
}
