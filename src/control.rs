//! Shared control block written by the master process.
//!
//! The block is a small JSON document. The agent reads the master PID from it
//! once at startup and re-reads the rest before every collection cycle.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::source::LogCategory;

/// Contents of the control block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlBlock {
    /// PID of the master process
    #[serde(default)]
    pub master_pid: Option<u32>,

    /// Log filter directive to apply, e.g. `debug` or `log_agent=trace`
    #[serde(default)]
    pub log_level: Option<String>,

    /// Categories switched off at runtime
    #[serde(default)]
    pub disabled_categories: Vec<LogCategory>,
}

impl ControlBlock {
    pub fn is_disabled(&self, category: LogCategory) -> bool {
        self.disabled_categories.contains(&category)
    }
}

/// Errors reading the control block.
#[derive(Debug)]
pub enum ControlError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::Io { path, source } => {
                write!(f, "Cannot read control block {}: {}", path.display(), source)
            }
            ControlError::Parse { path, source } => {
                write!(f, "Malformed control block {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Io { source, .. } => Some(source),
            ControlError::Parse { source, .. } => Some(source),
        }
    }
}

/// Read access to the shared control state.
pub trait ControlState: Send {
    fn read(&self) -> Result<ControlBlock, ControlError>;

    fn master_pid(&self) -> Option<u32> {
        self.read().ok().and_then(|block| block.master_pid)
    }
}

/// Control block stored in a JSON file.
#[derive(Debug, Clone)]
pub struct FileControlState {
    path: PathBuf,
}

impl FileControlState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ControlState for FileControlState {
    fn read(&self) -> Result<ControlBlock, ControlError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| ControlError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&raw).map_err(|e| ControlError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }
}
