use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const MAX_LOG_BYTES: u64 = 1024 * 1024;
const LOG_BACKUPS: usize = 3;

/// Where JSON log lines go besides the console.
#[derive(Debug)]
pub enum LogSink {
    File(File),
    ConsoleOnly(io::Error),
}

pub fn choose_sink(log_file: &Path) -> LogSink {
    match open_log_file(log_file) {
        Ok(file) => LogSink::File(file),
        Err(e) => LogSink::ConsoleOnly(e),
    }
}

/// Console output always; JSON lines in `log_file` when the file can be opened.
pub fn init(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, file_error) = match choose_sink(log_file) {
        LogSink::File(file) => (
            Some(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(file))),
            None,
        ),
        LogSink::ConsoleOnly(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    match file_error {
        None => info!(path = %log_file.display(), "File logging enabled"),
        Some(e) => warn!(
            path = %log_file.display(),
            error = %e,
            "Cannot open log file, logging to console only"
        ),
    }
}

fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    rotate(path, MAX_LOG_BYTES, LOG_BACKUPS)?;
    OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Shift `path` to `path.1` (and older backups up by one) once it exceeds `max_bytes`.
pub fn rotate(path: &Path, max_bytes: u64, backups: usize) -> io::Result<()> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size <= max_bytes || backups == 0 {
        return Ok(());
    }

    let oldest = backup_path(path, backups);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..backups).rev() {
        let from = backup_path(path, n);
        if from.exists() {
            fs::rename(&from, backup_path(path, n + 1))?;
        }
    }
    fs::rename(path, backup_path(path, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_small_log_is_kept() {
        let dir = temp_dir("log-small");
        let log = dir.join("analysis.log");
        fs::write(&log, "short").unwrap();

        rotate(&log, 1024, 3).unwrap();
        assert_eq!(fs::read_to_string(&log).unwrap(), "short");
        assert!(!backup_path(&log, 1).exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rotation_keeps_three_backups() {
        let dir = temp_dir("log-rotate");
        let log = dir.join("analysis.log");

        for round in 1..=4 {
            fs::write(&log, format!("round {round} {}", "x".repeat(32))).unwrap();
            rotate(&log, 16, 3).unwrap();
        }

        assert!(!log.exists());
        assert!(fs::read_to_string(backup_path(&log, 1)).unwrap().starts_with("round 4"));
        assert!(fs::read_to_string(backup_path(&log, 3)).unwrap().starts_with("round 2"));
        assert!(!backup_path(&log, 4).exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_log_is_fine() {
        let dir = temp_dir("log-missing");
        assert!(rotate(&dir.join("none.log"), 16, 3).is_ok());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = temp_dir("log-open");
        let log = dir.join("nested").join("analysis.log");
        assert!(open_log_file(&log).is_ok());
        assert!(log.exists());
        assert!(matches!(choose_sink(&log), LogSink::File(_)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unusable_log_path_falls_back_to_console() {
        let dir = temp_dir("log-blocked");
        let blocker = dir.join("logs");
        fs::write(&blocker, "not a directory").unwrap();
        let log = blocker.join("analysis.log");

        assert!(open_log_file(&log).is_err());
        assert!(matches!(choose_sink(&log), LogSink::ConsoleOnly(_)));
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");

        fs::remove_dir_all(&dir).unwrap();
    }
}
