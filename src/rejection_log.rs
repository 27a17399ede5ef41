//! Operator audit trail: duplicate rejections (warnings) and store failures (errors),
//! appended as `<timestamp> <LEVEL> <message>` lines. Logging never fails the run.

use crate::util::append_with_backoff;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }
}

pub trait EventLog {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// `2024-03-01 09:15:02,417 WARNING id field has duplicate value of 1`
pub fn format_line(ts: OffsetDateTime, level: Level, message: &str) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]");
    let stamp = ts.format(&fmt).unwrap_or_else(|_| ts.unix_timestamp().to_string());
    format!("{} {} {}\n", stamp, level.as_str(), message)
}

/// Appends to a file; on write failure reports to stderr and carries on.
pub struct FileEventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileEventLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = append_with_backoff(path, 16, 50)?;
        Ok(Self { path: path.to_path_buf(), file: Mutex::new(file) })
    }

    fn append(&self, level: Level, message: &str) {
        let line = format_line(OffsetDateTime::now_utc(), level, message);
        let res = {
            let mut f = self.file.lock();
            f.write_all(line.as_bytes()).and_then(|_| f.flush())
        };
        if let Err(e) = res {
            eprintln!("log write to {} failed ({}): {}", self.path.display(), e, line.trim_end());
            tracing::error!("log write to {} failed: {}", self.path.display(), e);
        }
    }
}

impl EventLog for FileEventLog {
    fn warn(&self, message: &str) {
        tracing::debug!("{}", message);
        self.append(Level::Warning, message);
    }

    fn error(&self, message: &str) {
        tracing::warn!("{}", message);
        self.append(Level::Error, message);
    }
}

/// Fallback sink when the log file cannot be opened.
pub struct StderrEventLog;

impl EventLog for StderrEventLog {
    fn warn(&self, message: &str) {
        eprint!("{}", format_line(OffsetDateTime::now_utc(), Level::Warning, message));
    }

    fn error(&self, message: &str) {
        eprint!("{}", format_line(OffsetDateTime::now_utc(), Level::Error, message));
    }
}
