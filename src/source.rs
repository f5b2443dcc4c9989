//! Log source abstraction.
//!
//! A log source is one category of application log with its own active
//! file, read offset and enablement flag. The run loop drives every source
//! through the [`LogSource`] trait; [`crate::file_source::FileLogSource`] is
//! the file-backed implementation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log categories harvested by the agent, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Alarm,
    Policy,
    Plugin,
    Rasp,
}

impl LogCategory {
    /// All categories in declared collection order.
    pub fn all() -> &'static [LogCategory] {
        &[
            LogCategory::Alarm,
            LogCategory::Policy,
            LogCategory::Plugin,
            LogCategory::Rasp,
        ]
    }

    /// Name used for directories, file names and configuration.
    pub fn name(&self) -> &'static str {
        match self {
            LogCategory::Alarm => "alarm",
            LogCategory::Policy => "policy",
            LogCategory::Plugin => "plugin",
            LogCategory::Rasp => "rasp",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether the category's files are rotated daily.
    pub fn rotatable(&self) -> bool {
        !matches!(self, LogCategory::Plugin)
    }

    /// Backend path receiving this category's logs.
    pub fn endpoint(&self) -> &'static str {
        match self {
            LogCategory::Alarm => "/v1/agent/log/attack",
            LogCategory::Policy => "/v1/agent/log/policy",
            LogCategory::Plugin => "/v1/agent/log/plugin",
            LogCategory::Rasp => "/v1/agent/log/error",
        }
    }
}

impl std::fmt::Display for LogCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Health of a source. `Failed` is terminal for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Active,
    Failed { reason: String },
}

impl SourceState {
    pub fn is_failed(&self) -> bool {
        matches!(self, SourceState::Failed { .. })
    }
}

/// Errors raised while reading or checkpointing a source.
#[derive(Debug)]
pub enum SourceError {
    /// Filesystem access failed
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Status snapshot could not be encoded or decoded
    Snapshot {
        path: PathBuf,
        message: String,
    },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            SourceError::Snapshot { path, message } => {
                write!(f, "Invalid status snapshot {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io { source, .. } => Some(source),
            SourceError::Snapshot { .. } => None,
        }
    }
}

/// Operations the run loop needs from a log source.
///
/// Read position and last push time are advanced only through the
/// `commit_*` calls, which the run loop issues after a confirmed push.
pub trait LogSource: Send {
    fn category(&self) -> LogCategory;

    /// Whether the source has entered its sticky failed state.
    fn has_error(&self) -> bool;

    /// Whether the active file is due for rotation.
    fn need_rotate(&self) -> bool;

    fn get_collect_enable(&self) -> bool;

    fn set_collect_enable(&mut self, enabled: bool);

    fn get_active_log_file_path(&self) -> PathBuf;

    /// Settle the offset to read from, detecting replaced or truncated files.
    fn determine_read_position(&mut self);

    /// Extract unsent content. `None` means nothing to push.
    fn get_post_body(&mut self) -> Option<String>;

    fn get_complete_url(&self) -> String;

    fn commit_read_position(&mut self);

    fn commit_last_push_time(&mut self);

    fn persist_status_snapshot(&mut self);

    /// Rotation bookkeeping, run after the cycle's read with the flag
    /// captured before it. Implementations keep the old file active while
    /// it still holds unshipped lines.
    fn handle_rotation(&mut self, was_due: bool);
}
