//! Configuration module for the log agent.
//!
//! This module provides environment-based configuration: backend URL,
//! log root, push interval and backoff ceiling, and per-category switches.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::source::LogCategory;

/// Default backend URL
const DEFAULT_BACKEND_URL: &str = "http://localhost:8086";

/// Default root directory holding one sub-directory per log category
const DEFAULT_LOG_ROOT: &str = "./logs";

/// Default nominal push interval in seconds
const DEFAULT_PUSH_INTERVAL_SECS: u64 = 10;

/// Default backoff ceiling in seconds
const DEFAULT_MAX_INTERVAL_SECS: u64 = 300;

const MIN_PUSH_INTERVAL_SECS: u64 = 1;
const MAX_PUSH_INTERVAL_SECS: u64 = 3600;

/// Hard ceiling for the backoff ceiling itself (one day)
const MAX_MAX_INTERVAL_SECS: u64 = 86_400;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STARTUP_DELAY_SECS: u64 = 1;

const DEFAULT_MAX_LINES_PER_PUSH: usize = 500;
const MAX_MAX_LINES_PER_PUSH: usize = 10_000;

/// Rotated files kept per category
const DEFAULT_MAX_BACKUP: usize = 30;

/// Multiplier applied to the push interval after a failed push.
pub const BACKOFF_FACTOR: f64 = 2.0;

/// Configuration for the log agent.
///
/// All settings can be configured via environment variables:
/// - `LOG_AGENT_BACKEND_URL`: collection endpoint base URL (default: http://localhost:8086)
/// - `LOG_AGENT_APP_ID` / `LOG_AGENT_APP_SECRET`: optional auth headers
/// - `LOG_AGENT_LOG_ROOT`: directory with one folder per category (default: ./logs)
/// - `LOG_AGENT_PUSH_INTERVAL_SECS`: nominal seconds between cycles (default: 10)
/// - `LOG_AGENT_MAX_INTERVAL_SECS`: backoff ceiling in seconds (default: 300)
/// - `LOG_AGENT_REQUEST_TIMEOUT_SECS`: HTTP request timeout (default: 10)
/// - `LOG_AGENT_STARTUP_DELAY_SECS`: delay before the first cycle (default: 1)
/// - `LOG_AGENT_MAX_LINES_PER_PUSH`: lines per request body (default: 500)
/// - `LOG_AGENT_MAX_BACKUP`: rotated files kept per category (default: 30, 0 keeps all)
/// - `LOG_AGENT_DISABLED_CATEGORIES`: comma separated category names
/// - `LOG_AGENT_CONTROL_FILE`: path of the shared control block
/// - `LOG_AGENT_MASTER_PID`: master PID when the control block has none
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the collection backend
    pub backend_url: String,

    /// Application id sent with every push
    pub app_id: Option<String>,

    /// Application secret sent with every push
    pub app_secret: Option<String>,

    /// Root directory of the category log folders
    pub log_root: PathBuf,

    /// Nominal interval between collection cycles
    pub push_interval: Duration,

    /// Ceiling for the backed-off interval
    pub max_interval: Duration,

    /// HTTP request timeout duration
    pub request_timeout: Duration,

    /// Delay before the first collection cycle
    pub startup_delay: Duration,

    /// Maximum number of log lines carried by one request
    pub max_lines_per_push: usize,

    /// Number of rotated files to keep per category (0 keeps everything)
    pub max_backup: usize,

    /// Categories switched off by static configuration
    pub disabled_categories: Vec<LogCategory>,

    /// Shared control block written by the master process
    pub control_file: Option<PathBuf>,

    /// Master PID used when the control block does not carry one
    pub master_pid: Option<u32>,
}

/// Error type for configuration loading failures
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    fn for_var(env_var: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            env_var: Some(env_var.to_string()),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse, falls
    /// outside its limits, if the backoff ceiling is below the push interval,
    /// or if a disabled category name is unknown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use log_agent::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load config");
    /// println!("Backend: {}", config.backend_url);
    /// ```
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url = env::var("LOG_AGENT_BACKEND_URL")
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let app_id = non_empty_var("LOG_AGENT_APP_ID");
        let app_secret = non_empty_var("LOG_AGENT_APP_SECRET");

        let log_root = env::var("LOG_AGENT_LOG_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_ROOT));

        let push_interval_secs = parse_bounded(
            "LOG_AGENT_PUSH_INTERVAL_SECS",
            DEFAULT_PUSH_INTERVAL_SECS,
            MIN_PUSH_INTERVAL_SECS,
            MAX_PUSH_INTERVAL_SECS,
        )?;

        let max_interval_secs = parse_bounded(
            "LOG_AGENT_MAX_INTERVAL_SECS",
            DEFAULT_MAX_INTERVAL_SECS.max(push_interval_secs),
            MIN_PUSH_INTERVAL_SECS,
            MAX_MAX_INTERVAL_SECS,
        )?;

        if max_interval_secs < push_interval_secs {
            return Err(ConfigError::for_var(
                "LOG_AGENT_MAX_INTERVAL_SECS",
                format!(
                    "max interval {}s is below the push interval ({}s)",
                    max_interval_secs, push_interval_secs
                ),
            ));
        }

        let request_timeout_secs: u64 = env::var("LOG_AGENT_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let startup_delay_secs: u64 = env::var("LOG_AGENT_STARTUP_DELAY_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STARTUP_DELAY_SECS);

        let max_lines_per_push = parse_bounded(
            "LOG_AGENT_MAX_LINES_PER_PUSH",
            DEFAULT_MAX_LINES_PER_PUSH as u64,
            1,
            MAX_MAX_LINES_PER_PUSH as u64,
        )? as usize;

        let max_backup = match env::var("LOG_AGENT_MAX_BACKUP") {
            Ok(value) => value.parse().map_err(|_| {
                ConfigError::for_var(
                    "LOG_AGENT_MAX_BACKUP",
                    format!("'{}' is not a valid number", value),
                )
            })?,
            Err(_) => DEFAULT_MAX_BACKUP,
        };

        let disabled_categories = match env::var("LOG_AGENT_DISABLED_CATEGORIES") {
            Ok(value) => parse_categories(&value)
                .map_err(|message| ConfigError::for_var("LOG_AGENT_DISABLED_CATEGORIES", message))?,
            Err(_) => Vec::new(),
        };

        let control_file = non_empty_var("LOG_AGENT_CONTROL_FILE").map(PathBuf::from);

        let master_pid = match env::var("LOG_AGENT_MASTER_PID") {
            Ok(value) => Some(value.parse().map_err(|_| {
                ConfigError::for_var(
                    "LOG_AGENT_MASTER_PID",
                    format!("'{}' is not a valid pid", value),
                )
            })?),
            Err(_) => None,
        };

        Ok(Self {
            backend_url,
            app_id,
            app_secret,
            log_root,
            push_interval: Duration::from_secs(push_interval_secs),
            max_interval: Duration::from_secs(max_interval_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            startup_delay: Duration::from_secs(startup_delay_secs),
            max_lines_per_push,
            max_backup,
            disabled_categories,
            control_file,
            master_pid,
        })
    }

    /// Whether static configuration allows collecting `category`.
    pub fn category_enabled(&self, category: LogCategory) -> bool {
        !self.disabled_categories.contains(&category)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            app_id: None,
            app_secret: None,
            log_root: PathBuf::from(DEFAULT_LOG_ROOT),
            push_interval: Duration::from_secs(DEFAULT_PUSH_INTERVAL_SECS),
            max_interval: Duration::from_secs(DEFAULT_MAX_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            startup_delay: Duration::from_secs(DEFAULT_STARTUP_DELAY_SECS),
            max_lines_per_push: DEFAULT_MAX_LINES_PER_PUSH,
            max_backup: DEFAULT_MAX_BACKUP,
            disabled_categories: Vec::new(),
            control_file: None,
            master_pid: None,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an unsigned variable, falling back to `default` when unset.
fn parse_bounded(env_var: &str, default: u64, min: u64, max: u64) -> Result<u64, ConfigError> {
    match env::var(env_var) {
        Ok(value) => {
            let parsed: u64 = value.trim().parse().map_err(|_| {
                ConfigError::for_var(env_var, format!("'{}' is not a valid number", value))
            })?;

            if parsed < min {
                return Err(ConfigError::for_var(
                    env_var,
                    format!("value {} is below minimum ({})", parsed, min),
                ));
            }

            if parsed > max {
                return Err(ConfigError::for_var(
                    env_var,
                    format!("value {} exceeds maximum ({})", parsed, max),
                ));
            }

            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}

/// Parse a comma separated list of category names.
pub(crate) fn parse_categories(value: &str) -> Result<Vec<LogCategory>, String> {
    let mut categories = Vec::new();
    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let category = LogCategory::from_name(name)
            .ok_or_else(|| format!("unknown log category '{}'", name))?;
        if !categories.contains(&category) {
            categories.push(category);
        }
    }
    Ok(categories)
}
