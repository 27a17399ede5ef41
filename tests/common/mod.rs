#![allow(dead_code)]

use kvload::{EventLog, Level, Record, SourceError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Write a plain CSV file into `dir`.
pub fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    File::create(&p).unwrap().write_all(body.as_bytes()).unwrap();
    p
}

/// Write a zstd-compressed CSV file into `dir` (name should end in `.zst`).
pub fn write_zst_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    let f = File::create(&p).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    enc.write_all(body.as_bytes()).unwrap();
    enc.finish().unwrap();
    p
}

/// The three-row example: ids 1, 2, 1.
pub const USERS_CSV: &str = "id,name\n1,a\n2,b\n1,c\n";

/// Build an in-memory source from rows of `(field, value)` pairs.
pub fn rows(data: &[&[(&str, &str)]]) -> Vec<Result<Record, SourceError>> {
    data.iter().map(|r| Ok(Record::from_pairs(r.iter().copied()))).collect()
}

pub fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Event log that keeps entries in memory for assertions.
#[derive(Default)]
pub struct RecordingLog {
    entries: RefCell<Vec<(Level, String)>>,
}

impl RecordingLog {
    pub fn warnings(&self) -> Vec<String> {
        self.by_level(Level::Warning)
    }

    pub fn errors(&self) -> Vec<String> {
        self.by_level(Level::Error)
    }

    fn by_level(&self, level: Level) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl EventLog for RecordingLog {
    fn warn(&self, message: &str) {
        self.entries.borrow_mut().push((Level::Warning, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.entries.borrow_mut().push((Level::Error, message.to_string()));
    }
}

/// Read a text file line-by-line (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    BufReader::new(f).lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}
