//! File-backed log source.
//!
//! Each category lives in `<log_root>/<category>/`. Rotatable categories
//! write to a dated file `<category>.log.<YYYY-MM-DD>`, the others to
//! `<category>.log`. Progress is checkpointed in `<category>.status.json`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::source::{LogCategory, LogSource, SourceError, SourceState};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Settings shared by every file-backed source.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub backend_url: String,
    pub log_root: PathBuf,
    pub max_lines_per_push: usize,
    pub max_backup: usize,
}

impl SourceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            backend_url: config.backend_url.clone(),
            log_root: config.log_root.clone(),
            max_lines_per_push: config.max_lines_per_push,
            max_backup: config.max_backup,
        }
    }
}

/// Durable checkpoint of a source's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub category: LogCategory,

    /// File name (not path) of the file the offset refers to
    pub active_file: String,

    #[serde(default)]
    pub inode: u64,

    pub offset: u64,

    #[serde(default)]
    pub last_post_time: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    /// Load a snapshot, `Ok(None)` when none was written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, SourceError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SourceError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SourceError::Snapshot {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Write through a temp file and rename so readers never see a torn file.
    pub fn store(&self, path: &Path) -> Result<(), SourceError> {
        let body = serde_json::to_vec_pretty(self).map_err(|e| SourceError::Snapshot {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(|e| SourceError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Log source reading one category's files from disk.
pub struct FileLogSource {
    category: LogCategory,
    dir: PathBuf,
    url: String,
    max_lines_per_push: usize,
    max_backup: usize,
    state: SourceState,
    collect_enabled: bool,

    /// Date of the active file; `None` for categories that never rotate
    active_date: Option<NaiveDate>,

    /// Committed read offset
    offset: u64,

    /// End offset of the last extracted body, promoted on commit
    pending_offset: u64,

    /// Inode of the active file when the offset was settled (0 = unknown)
    inode: u64,

    last_post_time: Option<DateTime<Utc>>,
}

impl FileLogSource {
    /// Open the source for `category`, restoring progress from its snapshot.
    ///
    /// A directory that cannot be created puts the source in the failed
    /// state instead of returning an error.
    pub fn new(category: LogCategory, settings: &SourceSettings) -> Self {
        let dir = settings.log_root.join(category.name());
        let mut source = Self {
            category,
            url: format!("{}{}", settings.backend_url, category.endpoint()),
            dir,
            max_lines_per_push: settings.max_lines_per_push.max(1),
            max_backup: settings.max_backup,
            state: SourceState::Active,
            collect_enabled: true,
            active_date: category.rotatable().then(today),
            offset: 0,
            pending_offset: 0,
            inode: 0,
            last_post_time: None,
        };

        if let Err(e) = fs::create_dir_all(&source.dir) {
            source.fail(format!(
                "cannot create log directory {}: {}",
                source.dir.display(),
                e
            ));
            return source;
        }

        source.restore();
        source
    }

    /// Build one source per category, in declared order.
    pub fn all_from_config(config: &Config) -> Vec<Self> {
        let settings = SourceSettings::from_config(config);
        LogCategory::all()
            .iter()
            .map(|category| {
                let mut source = Self::new(*category, &settings);
                source.set_collect_enable(config.category_enabled(*category));
                source
            })
            .collect()
    }

    fn restore(&mut self) {
        let path = self.snapshot_path();
        let snapshot = match StatusSnapshot::load(&path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                warn!(category = %self.category, error = %e, "Ignoring status snapshot");
                return;
            }
        };

        self.last_post_time = snapshot.last_post_time;

        if snapshot.active_file != self.active_file_name() {
            // Resume a dated file left over from an earlier day; it is
            // rotated away once drained.
            match self.date_of(&snapshot.active_file) {
                Some(date) if self.dir.join(&snapshot.active_file).exists() => {
                    self.active_date = Some(date);
                }
                _ => return,
            }
        }

        self.offset = snapshot.offset;
        self.pending_offset = snapshot.offset;
        self.inode = snapshot.inode;
        debug!(
            category = %self.category,
            file = %snapshot.active_file,
            offset = snapshot.offset,
            "Restored status snapshot"
        );
    }

    /// Put the source into the sticky failed state.
    fn fail(&mut self, reason: String) {
        if self.state.is_failed() {
            return;
        }
        error!(category = %self.category, reason = %reason, "Log source disabled");
        self.state = SourceState::Failed { reason };
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn last_post_time(&self) -> Option<DateTime<Utc>> {
        self.last_post_time
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}.status.json", self.category.name()))
    }

    fn active_file_name(&self) -> String {
        match self.active_date {
            Some(date) => dated_file_name(self.category, date),
            None => format!("{}.log", self.category.name()),
        }
    }

    /// Date suffix of a rotated file of this category.
    fn date_of(&self, file_name: &str) -> Option<NaiveDate> {
        if !self.category.rotatable() {
            return None;
        }
        let prefix = format!("{}.log.", self.category.name());
        let suffix = file_name.strip_prefix(&prefix)?;
        NaiveDate::parse_from_str(suffix, DATE_FORMAT).ok()
    }

    /// Whether rotation is due relative to `today`.
    pub fn need_rotate_on(&self, today: NaiveDate) -> bool {
        self.active_date.is_some_and(|date| date != today)
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            category: self.category,
            active_file: self.active_file_name(),
            inode: self.inode,
            offset: self.offset,
            last_post_time: self.last_post_time,
        }
    }

    /// Remove the oldest rotated files beyond `max_backup`.
    fn prune_backups(&self) {
        if self.max_backup == 0 {
            return;
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(category = %self.category, error = %e, "Cannot list log directory");
                return;
            }
        };

        let active = self.active_file_name();
        let mut rotated: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                if name == active {
                    return None;
                }
                self.date_of(&name).map(|date| (date, entry.path()))
            })
            .collect();

        if rotated.len() <= self.max_backup {
            return;
        }
        rotated.sort();
        let excess = rotated.len() - self.max_backup;
        for (_, path) in rotated.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed rotated log file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot remove rotated log file"),
            }
        }
    }

    /// Whether complete lines remain past the committed offset.
    ///
    /// A trailing partial line does not count: nothing appends to a file
    /// once it is no longer today's.
    fn has_unshipped_lines(&mut self) -> bool {
        let path = self.get_active_log_file_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return false,
            Err(e) => {
                self.fail(format!("cannot open {}: {}", path.display(), e));
                return false;
            }
        };
        match read_lines(file, self.offset, 1) {
            Ok((entries, _)) => !entries.is_empty(),
            Err(e) => {
                self.fail(format!("cannot read {}: {}", path.display(), e));
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn with_active_date(mut self, date: NaiveDate) -> Self {
        if self.active_date.is_some() {
            self.active_date = Some(date);
        }
        self
    }
}

impl LogSource for FileLogSource {
    fn category(&self) -> LogCategory {
        self.category
    }

    fn has_error(&self) -> bool {
        self.state.is_failed()
    }

    fn need_rotate(&self) -> bool {
        self.need_rotate_on(today())
    }

    fn get_collect_enable(&self) -> bool {
        self.collect_enabled
    }

    fn set_collect_enable(&mut self, enabled: bool) {
        if self.collect_enabled != enabled {
            info!(category = %self.category, enabled = enabled, "Collection toggled");
        }
        self.collect_enabled = enabled;
    }

    fn get_active_log_file_path(&self) -> PathBuf {
        self.dir.join(self.active_file_name())
    }

    fn determine_read_position(&mut self) {
        let path = self.get_active_log_file_path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                self.fail(format!("cannot stat {}: {}", path.display(), e));
                return;
            }
        };

        if self.inode != 0 && meta.ino() != self.inode {
            info!(category = %self.category, file = %path.display(), "Active file replaced, reading from start");
            self.offset = 0;
        } else if meta.len() < self.offset {
            info!(
                category = %self.category,
                size = meta.len(),
                offset = self.offset,
                "Active file truncated, reading from start"
            );
            self.offset = 0;
        }
        self.inode = meta.ino();
        self.pending_offset = self.offset;
    }

    fn get_post_body(&mut self) -> Option<String> {
        let path = self.get_active_log_file_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                self.fail(format!("cannot open {}: {}", path.display(), e));
                return None;
            }
        };

        match read_lines(file, self.offset, self.max_lines_per_push) {
            Ok((entries, consumed)) => {
                self.pending_offset = self.offset + consumed;
                if entries.is_empty() {
                    return None;
                }
                match serde_json::to_string(&entries) {
                    Ok(body) => Some(body),
                    Err(e) => {
                        warn!(category = %self.category, error = %e, "Cannot encode post body");
                        None
                    }
                }
            }
            Err(e) => {
                self.fail(format!("cannot read {}: {}", path.display(), e));
                None
            }
        }
    }

    fn get_complete_url(&self) -> String {
        self.url.clone()
    }

    fn commit_read_position(&mut self) {
        self.offset = self.pending_offset;
    }

    fn commit_last_push_time(&mut self) {
        self.last_post_time = Some(Utc::now());
    }

    fn persist_status_snapshot(&mut self) {
        let path = self.snapshot_path();
        if let Err(e) = self.snapshot().store(&path) {
            warn!(category = %self.category, error = %e, "Cannot save status snapshot");
        }
    }

    fn handle_rotation(&mut self, was_due: bool) {
        if !was_due || self.active_date.is_none() || self.has_error() {
            return;
        }
        if self.collect_enabled && self.has_unshipped_lines() {
            debug!(
                category = %self.category,
                file = %self.active_file_name(),
                offset = self.offset,
                "Rotation deferred until the old file is shipped"
            );
            return;
        }
        let previous = self.active_file_name();
        self.active_date = Some(today());
        self.offset = 0;
        self.pending_offset = 0;
        self.inode = 0;
        info!(
            category = %self.category,
            from = %previous,
            to = %self.active_file_name(),
            "Switched to new active log file"
        );
        self.persist_status_snapshot();
        self.prune_backups();
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn dated_file_name(category: LogCategory, date: NaiveDate) -> String {
    format!("{}.log.{}", category.name(), date.format(DATE_FORMAT))
}

/// Read up to `max_lines` complete lines starting at `offset`.
///
/// Returns the decoded entries and the number of bytes consumed. A trailing
/// line without a newline is left unread; blank lines are consumed but not
/// returned.
fn read_lines(file: File, offset: u64, max_lines: usize) -> std::io::Result<(Vec<Value>, u64)> {
    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;

    let mut entries = Vec::new();
    let mut consumed = 0u64;
    let mut buf = Vec::new();

    while entries.len() < max_lines {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 || buf.last() != Some(&b'\n') {
            break;
        }
        consumed += n as u64;

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry = serde_json::from_str::<Value>(line)
            .unwrap_or_else(|_| Value::String(line.to_string()));
        entries.push(entry);
    }

    Ok((entries, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn settings(root: &Path) -> SourceSettings {
        SourceSettings {
            backend_url: "http://backend:8086".to_string(),
            log_root: root.to_path_buf(),
            max_lines_per_push: 100,
            max_backup: 2,
        }
    }

    fn append(path: &Path, text: &str) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    fn body_values(body: &str) -> Vec<Value> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_new_source_layout() {
        let tmp = TempDir::new().unwrap();
        let source = FileLogSource::new(LogCategory::Alarm, &settings(tmp.path()));

        assert!(!source.has_error());
        assert!(source.dir.is_dir());
        assert_eq!(
            source.get_complete_url(),
            "http://backend:8086/v1/agent/log/attack"
        );
        let expected = format!("alarm.log.{}", today().format(DATE_FORMAT));
        assert_eq!(
            source.get_active_log_file_path(),
            tmp.path().join("alarm").join(expected)
        );

        let plugin = FileLogSource::new(LogCategory::Plugin, &settings(tmp.path()));
        assert_eq!(
            plugin.get_active_log_file_path(),
            tmp.path().join("plugin").join("plugin.log")
        );
        assert!(!plugin.need_rotate());
    }

    #[test]
    fn test_missing_file_yields_no_body() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Policy, &settings(tmp.path()));
        source.determine_read_position();
        assert!(source.get_post_body().is_none());
        assert!(!source.has_error());
    }

    #[test]
    fn test_body_holds_complete_lines_until_commit() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Plugin, &settings(tmp.path()));
        let path = source.get_active_log_file_path();
        append(&path, "{\"event\":1}\nplain text\n\n{\"event\":");

        source.determine_read_position();
        let body = source.get_post_body().expect("body");
        assert_eq!(
            body_values(&body),
            vec![
                serde_json::json!({"event": 1}),
                Value::String("plain text".to_string())
            ]
        );

        // Not committed: the same content comes back.
        source.determine_read_position();
        assert_eq!(source.get_post_body().as_deref(), Some(body.as_str()));
        assert_eq!(source.offset(), 0);

        source.commit_read_position();
        assert_eq!(source.offset(), "{\"event\":1}\nplain text\n\n".len() as u64);

        // The partial line is picked up once finished.
        append(&path, "2}\n");
        source.determine_read_position();
        let body = source.get_post_body().expect("body");
        assert_eq!(body_values(&body), vec![serde_json::json!({"event": 2})]);
    }

    #[test]
    fn test_body_respects_line_limit() {
        let tmp = TempDir::new().unwrap();
        let mut cfg = settings(tmp.path());
        cfg.max_lines_per_push = 2;
        let mut source = FileLogSource::new(LogCategory::Plugin, &cfg);
        append(&source.get_active_log_file_path(), "a\nb\nc\n");

        source.determine_read_position();
        assert_eq!(body_values(&source.get_post_body().unwrap()).len(), 2);
        source.commit_read_position();

        source.determine_read_position();
        let rest = body_values(&source.get_post_body().unwrap());
        assert_eq!(rest, vec![Value::String("c".to_string())]);
    }

    #[test]
    fn test_truncated_file_resets_offset() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Plugin, &settings(tmp.path()));
        let path = source.get_active_log_file_path();
        append(&path, "first line\nsecond line\n");

        source.determine_read_position();
        source.get_post_body().unwrap();
        source.commit_read_position();

        fs::write(&path, "new\n").unwrap();
        source.determine_read_position();
        assert_eq!(source.offset(), 0);
        let body = source.get_post_body().unwrap();
        assert_eq!(body_values(&body), vec![Value::String("new".to_string())]);
    }

    #[test]
    fn test_replaced_file_resets_offset() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Plugin, &settings(tmp.path()));
        let path = source.get_active_log_file_path();
        append(&path, "one\n");

        source.determine_read_position();
        source.get_post_body().unwrap();
        source.commit_read_position();

        // Keep the old inode alive so the new file cannot reuse it.
        let moved = path.with_extension("old");
        fs::rename(&path, &moved).unwrap();
        append(&path, "two\nthree\n");

        source.determine_read_position();
        assert_eq!(source.offset(), 0);
        assert_eq!(body_values(&source.get_post_body().unwrap()).len(), 2);
    }

    #[test]
    fn test_snapshot_round_trip_restores_progress() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Rasp, &settings(tmp.path()));
        append(&source.get_active_log_file_path(), "x\ny\n");

        source.determine_read_position();
        source.get_post_body().unwrap();
        source.commit_read_position();
        source.commit_last_push_time();
        source.persist_status_snapshot();

        let restored = FileLogSource::new(LogCategory::Rasp, &settings(tmp.path()));
        assert_eq!(restored.offset(), 4);
        assert_eq!(restored.last_post_time(), source.last_post_time());
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("policy");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("policy.status.json"), "{not json").unwrap();

        let source = FileLogSource::new(LogCategory::Policy, &settings(tmp.path()));
        assert!(!source.has_error());
        assert_eq!(source.offset(), 0);
    }

    #[test]
    fn test_unwritable_root_fails_source() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("not-a-dir");
        fs::write(&root, "").unwrap();

        let source = FileLogSource::new(LogCategory::Alarm, &settings(&root));
        assert!(source.has_error());
        assert!(source.state().is_failed());
    }

    #[test]
    fn test_read_failure_is_sticky() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Plugin, &settings(tmp.path()));
        fs::create_dir_all(source.get_active_log_file_path()).unwrap();

        source.determine_read_position();
        assert!(source.get_post_body().is_none());
        assert!(source.has_error());

        fs::remove_dir(source.get_active_log_file_path()).unwrap();
        append(&source.get_active_log_file_path(), "late\n");
        assert!(source.has_error());
    }

    #[test]
    fn test_rotation_switches_to_today() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let mut source =
            FileLogSource::new(LogCategory::Alarm, &settings(tmp.path())).with_active_date(yesterday);
        let old_path = source.get_active_log_file_path();
        append(&old_path, "last words\n");

        let due = source.need_rotate();
        assert!(due);

        source.determine_read_position();
        let body = source.get_post_body().unwrap();
        assert_eq!(body_values(&body), vec![Value::String("last words".to_string())]);
        source.commit_read_position();

        source.handle_rotation(due);
        assert!(!source.need_rotate());
        assert_eq!(source.offset(), 0);
        assert_ne!(source.get_active_log_file_path(), old_path);

        let snapshot = StatusSnapshot::load(&source.snapshot_path()).unwrap().unwrap();
        assert_eq!(snapshot.active_file, source.active_file_name());
        assert_eq!(snapshot.offset, 0);
    }

    #[test]
    fn test_rotation_waits_for_backlog_beyond_line_limit() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let mut cfg = settings(tmp.path());
        cfg.max_lines_per_push = 2;
        let mut source = FileLogSource::new(LogCategory::Alarm, &cfg).with_active_date(yesterday);
        let old_path = source.get_active_log_file_path();
        append(&old_path, "a\nb\nc\nd\n");

        let due = source.need_rotate();
        source.determine_read_position();
        assert_eq!(body_values(&source.get_post_body().unwrap()).len(), 2);
        source.commit_read_position();
        source.handle_rotation(due);

        assert_eq!(source.get_active_log_file_path(), old_path);
        assert!(source.need_rotate());

        let due = source.need_rotate();
        source.determine_read_position();
        let rest = body_values(&source.get_post_body().unwrap());
        assert_eq!(
            rest,
            vec![Value::String("c".to_string()), Value::String("d".to_string())]
        );
        source.commit_read_position();
        source.handle_rotation(due);

        assert_ne!(source.get_active_log_file_path(), old_path);
        assert!(!source.need_rotate());
        assert_eq!(source.offset(), 0);
    }

    #[test]
    fn test_rotation_waits_for_failed_push() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let mut source =
            FileLogSource::new(LogCategory::Rasp, &settings(tmp.path())).with_active_date(yesterday);
        let old_path = source.get_active_log_file_path();
        append(&old_path, "x\n");

        // Push rejected: nothing committed.
        let due = source.need_rotate();
        source.determine_read_position();
        let body = source.get_post_body().unwrap();
        source.handle_rotation(due);
        assert_eq!(source.get_active_log_file_path(), old_path);
        assert!(!source.snapshot_path().exists());

        let due = source.need_rotate();
        source.determine_read_position();
        assert_eq!(source.get_post_body().as_deref(), Some(body.as_str()));
        source.commit_read_position();
        source.handle_rotation(due);
        assert_ne!(source.get_active_log_file_path(), old_path);
    }

    #[test]
    fn test_rotation_ignores_trailing_partial_line() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let mut source =
            FileLogSource::new(LogCategory::Alarm, &settings(tmp.path())).with_active_date(yesterday);
        let old_path = source.get_active_log_file_path();
        append(&old_path, "done\n\ncut off");

        let due = source.need_rotate();
        source.determine_read_position();
        source.get_post_body().unwrap();
        source.commit_read_position();
        source.handle_rotation(due);

        assert_ne!(source.get_active_log_file_path(), old_path);
    }

    #[test]
    fn test_disabled_source_rotates_without_draining() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let mut source =
            FileLogSource::new(LogCategory::Policy, &settings(tmp.path())).with_active_date(yesterday);
        let old_path = source.get_active_log_file_path();
        append(&old_path, "never collected\n");

        source.set_collect_enable(false);
        source.handle_rotation(true);
        assert_ne!(source.get_active_log_file_path(), old_path);
    }

    #[test]
    fn test_rotation_not_due_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut source = FileLogSource::new(LogCategory::Alarm, &settings(tmp.path()));
        let before = source.get_active_log_file_path();
        source.handle_rotation(false);
        assert_eq!(source.get_active_log_file_path(), before);
        assert!(!source.snapshot_path().exists());
    }

    #[test]
    fn test_rotation_prunes_old_backups() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("alarm");
        fs::create_dir_all(&dir).unwrap();
        let base = today();
        for days in 1..=4u64 {
            let date = base - chrono::Days::new(days);
            fs::write(dir.join(dated_file_name(LogCategory::Alarm, date)), "").unwrap();
        }
        fs::write(dir.join("alarm.notes"), "").unwrap();

        let mut source = FileLogSource::new(LogCategory::Alarm, &settings(tmp.path()))
            .with_active_date(base - chrono::Days::new(1));
        source.handle_rotation(true);

        let mut kept: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with("alarm.log."))
            .collect();
        kept.sort();
        assert_eq!(
            kept,
            vec![
                dated_file_name(LogCategory::Alarm, base - chrono::Days::new(2)),
                dated_file_name(LogCategory::Alarm, base - chrono::Days::new(1)),
            ]
        );
        assert!(dir.join("alarm.notes").exists());
    }

    #[test]
    fn test_leftover_dated_file_resumes_then_rotates() {
        let tmp = TempDir::new().unwrap();
        let yesterday = today().pred_opt().unwrap();
        let dir = tmp.path().join("policy");
        fs::create_dir_all(&dir).unwrap();
        let old_name = dated_file_name(LogCategory::Policy, yesterday);
        fs::write(dir.join(&old_name), "sent\nunsent\n").unwrap();
        StatusSnapshot {
            category: LogCategory::Policy,
            active_file: old_name.clone(),
            inode: 0,
            offset: 5,
            last_post_time: None,
        }
        .store(&dir.join("policy.status.json"))
        .unwrap();

        let mut source = FileLogSource::new(LogCategory::Policy, &settings(tmp.path()));
        assert_eq!(source.get_active_log_file_path(), dir.join(&old_name));
        assert!(source.need_rotate());

        source.determine_read_position();
        let body = source.get_post_body().unwrap();
        assert_eq!(body_values(&body), vec![Value::String("unsent".to_string())]);
    }

    #[test]
    fn test_all_from_config_applies_disabled_categories() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            log_root: tmp.path().to_path_buf(),
            disabled_categories: vec![LogCategory::Plugin],
            ..Config::default()
        };
        let sources = FileLogSource::all_from_config(&config);
        let enabled: Vec<(LogCategory, bool)> = sources
            .iter()
            .map(|s| (s.category(), s.get_collect_enable()))
            .collect();
        assert_eq!(
            enabled,
            vec![
                (LogCategory::Alarm, true),
                (LogCategory::Policy, true),
                (LogCategory::Plugin, false),
                (LogCategory::Rasp, true),
            ]
        );
    }
}
