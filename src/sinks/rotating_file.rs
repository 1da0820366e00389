//! Date-partitioned, size-capped file sink.
//!
//! Records for one stream of one service land in
//! `<root>/<service>/<MM-DD-YYYY>/<stream>-logs.log`. A new date directory is
//! opened when the local date changes, which is also when date directories
//! older than the retention window are pruned. Within a day the active file
//! rolls over into numbered backups (`.1`, `.2`, ...) once the next record
//! would push it past `max_bytes`.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Local, NaiveDate};
use log::{debug, warn};
use serde::Deserialize;

use super::worker::{DEFAULT_CHANNEL_CAPACITY, RecordWriter, SinkWorker};
use crate::{
    formatter::Rendered,
    sink::{ScribeSink, SinkBuildError, SinkError, SinkHealth},
};

pub const DEFAULT_MAX_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 5;
pub const DEFAULT_MAX_AGE_DAYS: u32 = 14;
const DATE_DIR_FORMAT: &str = "%m-%d-%Y";

pub type DateClock = fn() -> NaiveDate;

fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Size and age limits for file streams.
///
/// `max_bytes == 0` disables size rotation, `backup_count == 0` truncates in
/// place instead of keeping backups, and `max_age_days == 0` keeps every
/// date directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileRetention {
    pub max_bytes: u64,
    pub backup_count: usize,
    pub max_age_days: u32,
}

impl Default for FileRetention {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

/// Where and how one file stream is written.
#[derive(Clone, Debug)]
pub struct FileSinkConfig {
    root: PathBuf,
    service: String,
    stream: String,
    retention: FileRetention,
    capacity: usize,
    clock: DateClock,
}

impl FileSinkConfig {
    pub fn new(root: impl Into<PathBuf>, service: &str, stream: &str) -> Self {
        Self {
            root: root.into(),
            service: service.to_owned(),
            stream: stream.to_owned(),
            retention: FileRetention::default(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
            clock: today_local,
        }
    }

    pub fn with_retention(mut self, retention: FileRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Override how the current date is read.
    pub fn with_clock(mut self, clock: DateClock) -> Self {
        self.clock = clock;
        self
    }

    fn validate(&self) -> Result<(), SinkBuildError> {
        let invalid = |msg: &str| -> Result<(), SinkBuildError> {
            Err(SinkBuildError::InvalidConfig(msg.to_owned()))
        };
        if self.capacity == 0 {
            return invalid("capacity must be greater than zero");
        }
        for (label, value) in [("service", &self.service), ("stream", &self.stream)] {
            if value.trim().is_empty() {
                return invalid(&format!("{label} name must not be empty"));
            }
            if value.contains(['/', '\\']) || value == ".." {
                return invalid(&format!("{label} name must not contain path separators"));
            }
        }
        Ok(())
    }
}

/// Path of the active file for `stream` on `date`.
pub fn stream_path(root: &Path, service: &str, stream: &str, date: NaiveDate) -> PathBuf {
    root.join(service)
        .join(date.format(DATE_DIR_FORMAT).to_string())
        .join(format!("{stream}-logs.log"))
}

/// Size-based rollover for a single file.
struct SizeRotation {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
}

impl SizeRotation {
    fn should_rotate(&self, writer: &BufWriter<File>, next_record_bytes: u64) -> io::Result<bool> {
        if self.max_bytes == 0 {
            return Ok(false);
        }
        let current = writer.get_ref().metadata()?.len();
        let buffered = writer.buffer().len() as u64;
        Ok(current > 0 && current + buffered + next_record_bytes > self.max_bytes)
    }

    fn rotate(&self, writer: &mut BufWriter<File>) -> io::Result<()> {
        writer.flush()?;
        if self.backup_count == 0 {
            let file = writer.get_mut();
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            return Ok(());
        }
        remove_file_if_exists(&self.backup_path(self.backup_count))?;
        for idx in (1..self.backup_count).rev() {
            rename_file_if_exists(&self.backup_path(idx), &self.backup_path(idx + 1))?;
        }
        rename_file_if_exists(&self.path, &self.backup_path(1))?;
        *writer = open_append(&self.path)?;
        Ok(())
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| self.path.as_os_str().to_os_string());
        name.push(format!(".{index}"));
        self.path.with_file_name(name)
    }
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

fn rename_file_if_exists(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

struct ActiveFile {
    date: NaiveDate,
    writer: BufWriter<File>,
    rotation: SizeRotation,
}

/// Writer owned by the worker thread; switches files when the date changes.
struct DatedFileWriter {
    root: PathBuf,
    service: String,
    stream: String,
    retention: FileRetention,
    clock: DateClock,
    active: ActiveFile,
}

impl DatedFileWriter {
    fn open(config: &FileSinkConfig) -> io::Result<Self> {
        let date = (config.clock)();
        let active = Self::open_for(config.root.as_path(), config, date)?;
        let writer = Self {
            root: config.root.clone(),
            service: config.service.clone(),
            stream: config.stream.clone(),
            retention: config.retention,
            clock: config.clock,
            active,
        };
        writer.prune(date);
        Ok(writer)
    }

    fn open_for(root: &Path, config: &FileSinkConfig, date: NaiveDate) -> io::Result<ActiveFile> {
        let path = stream_path(root, &config.service, &config.stream, date);
        Ok(ActiveFile {
            date,
            writer: open_append(&path)?,
            rotation: SizeRotation {
                path,
                max_bytes: config.retention.max_bytes,
                backup_count: config.retention.backup_count,
            },
        })
    }

    fn roll_date(&mut self, today: NaiveDate) -> io::Result<()> {
        self.active.writer.flush()?;
        let path = stream_path(&self.root, &self.service, &self.stream, today);
        self.active = ActiveFile {
            date: today,
            writer: open_append(&path)?,
            rotation: SizeRotation {
                path,
                max_bytes: self.retention.max_bytes,
                backup_count: self.retention.backup_count,
            },
        };
        self.prune(today);
        Ok(())
    }

    /// Remove date directories older than the retention window.
    fn prune(&self, today: NaiveDate) {
        if self.retention.max_age_days == 0 {
            return;
        }
        let service_dir = self.root.join(&self.service);
        let entries = match fs::read_dir(&service_dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("{}: cannot scan {}: {err}", self.stream, service_dir.display());
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, DATE_DIR_FORMAT).ok())
            else {
                continue;
            };
            let age = (today - date).num_days();
            if age > i64::from(self.retention.max_age_days) {
                debug!("pruning expired log directory {}", entry.path().display());
                if let Err(err) = fs::remove_dir_all(entry.path()) {
                    warn!("failed to prune {}: {err}", entry.path().display());
                }
            }
        }
    }
}

impl RecordWriter for DatedFileWriter {
    fn write_rendered(&mut self, rendered: &Rendered) -> io::Result<()> {
        let today = (self.clock)();
        if today != self.active.date {
            self.roll_date(today)?;
        }
        let line = rendered.to_text();
        let ActiveFile {
            writer, rotation, ..
        } = &mut self.active;
        if rotation.should_rotate(writer, line.len() as u64 + 1)? {
            rotation.rotate(writer)?;
        }
        writeln!(writer, "{line}")?;
        writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.active.writer.flush()
    }
}

/// File sink for one stream (`error`, `general`, ...) of one service.
pub struct RotatingFileSink {
    name: String,
    worker: SinkWorker,
}

impl RotatingFileSink {
    /// Open today's file eagerly so misconfiguration fails at construction.
    pub fn new(config: FileSinkConfig) -> Result<Self, SinkBuildError> {
        config.validate()?;
        let writer = DatedFileWriter::open(&config)?;
        let name = format!("file:{}:{}", config.service, config.stream);
        let health = Arc::new(SinkHealth::new(name.clone()));
        let worker = SinkWorker::spawn(writer, config.capacity, health)?;
        Ok(Self { name, worker })
    }
}

impl ScribeSink for RotatingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, rendered: Rendered) -> Result<(), SinkError> {
        self.worker.submit(rendered)
    }

    fn flush(&self) -> bool {
        self.worker.flush()
    }

    fn close(&self) {
        self.worker.close();
    }

    fn is_closed(&self) -> bool {
        self.worker.is_closed()
    }

    fn is_degraded(&self) -> bool {
        self.worker.health().is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::tempdir;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn fixed_day() -> NaiveDate {
        day(2024, 3, 9)
    }

    #[test]
    fn path_follows_service_date_stream_layout() {
        let path = stream_path(Path::new("/var/log"), "api", "error", day(2024, 3, 9));
        assert_eq!(path, PathBuf::from("/var/log/api/03-09-2024/error-logs.log"));
    }

    #[test]
    fn writes_rendered_lines_to_dated_file() -> io::Result<()> {
        let dir = tempdir()?;
        let sink = RotatingFileSink::new(
            FileSinkConfig::new(dir.path(), "api", "general").with_clock(fixed_day),
        )
        .map_err(io::Error::other)?;
        sink.write(Rendered::Structured(json!({"message": "hi"})))
            .map_err(io::Error::other)?;
        sink.write(Rendered::Text("plain".into()))
            .map_err(io::Error::other)?;
        sink.close();

        let path = stream_path(dir.path(), "api", "general", fixed_day());
        assert_eq!(fs::read_to_string(path)?, "{\"message\":\"hi\"}\nplain\n");
        Ok(())
    }

    #[test]
    fn rotates_and_limits_backups() -> io::Result<()> {
        let dir = tempdir()?;
        let retention = FileRetention {
            max_bytes: 25,
            backup_count: 2,
            max_age_days: 0,
        };
        let config = FileSinkConfig::new(dir.path(), "api", "error")
            .with_retention(retention)
            .with_clock(fixed_day);
        let mut writer = DatedFileWriter::open(&config)?;
        for message in ["first record", "second record", "third record"] {
            writer.write_rendered(&Rendered::Text(message.into()))?;
        }

        let path = stream_path(dir.path(), "api", "error", fixed_day());
        let rotation = &writer.active.rotation;
        assert_eq!(fs::read_to_string(&path)?, "third record\n");
        assert_eq!(fs::read_to_string(rotation.backup_path(1))?, "second record\n");
        assert_eq!(fs::read_to_string(rotation.backup_path(2))?, "first record\n");
        assert!(!rotation.backup_path(3).exists());
        Ok(())
    }

    #[rstest]
    #[case(8, 0, "beta\n")]
    #[case(0, 3, "alpha\nbeta\n")]
    fn rotation_edge_settings(
        #[case] max_bytes: u64,
        #[case] backup_count: usize,
        #[case] expected: &str,
    ) -> io::Result<()> {
        let dir = tempdir()?;
        let retention = FileRetention {
            max_bytes,
            backup_count,
            max_age_days: 0,
        };
        let config = FileSinkConfig::new(dir.path(), "api", "general")
            .with_retention(retention)
            .with_clock(fixed_day);
        let mut writer = DatedFileWriter::open(&config)?;
        for message in ["alpha", "beta"] {
            writer.write_rendered(&Rendered::Text(message.into()))?;
        }
        let path = stream_path(dir.path(), "api", "general", fixed_day());
        assert_eq!(fs::read_to_string(&path)?, expected);
        assert!(!writer.active.rotation.backup_path(1).exists());
        Ok(())
    }

    static DAY_OFFSET: AtomicI64 = AtomicI64::new(0);

    fn moving_day() -> NaiveDate {
        fixed_day() + chrono::Duration::days(DAY_OFFSET.load(Ordering::SeqCst))
    }

    #[test]
    fn date_change_opens_new_directory_and_prunes_old_ones() -> io::Result<()> {
        let dir = tempdir()?;
        let stale = dir.path().join("api").join("01-01-2024");
        fs::create_dir_all(&stale)?;
        fs::create_dir_all(dir.path().join("api").join("not-a-date"))?;

        let retention = FileRetention {
            max_age_days: 14,
            ..FileRetention::default()
        };
        let config = FileSinkConfig::new(dir.path(), "api", "general")
            .with_retention(retention)
            .with_clock(moving_day);
        let mut writer = DatedFileWriter::open(&config)?;
        assert!(!stale.exists());
        assert!(dir.path().join("api").join("not-a-date").exists());

        writer.write_rendered(&Rendered::Text("day one".into()))?;
        DAY_OFFSET.store(1, Ordering::SeqCst);
        writer.write_rendered(&Rendered::Text("day two".into()))?;

        let first = stream_path(dir.path(), "api", "general", fixed_day());
        let second = stream_path(dir.path(), "api", "general", moving_day());
        assert_eq!(fs::read_to_string(first)?, "day one\n");
        assert_eq!(fs::read_to_string(second)?, "day two\n");
        Ok(())
    }

    #[rstest]
    #[case("", "error")]
    #[case("api", "")]
    #[case("../etc", "error")]
    fn rejects_bad_names(#[case] service: &str, #[case] stream: &str) {
        let dir = tempdir().expect("tempdir");
        let result = RotatingFileSink::new(FileSinkConfig::new(dir.path(), service, stream));
        assert!(matches!(result, Err(SinkBuildError::InvalidConfig(_))));
    }

    #[test]
    fn retention_deserialises_with_defaults() {
        let retention: FileRetention =
            serde_json::from_value(json!({"max_age_days": 7})).expect("valid retention");
        assert_eq!(retention.max_age_days, 7);
        assert_eq!(retention.max_bytes, DEFAULT_MAX_BYTES);
        assert_eq!(retention.backup_count, DEFAULT_BACKUP_COUNT);
    }
}
