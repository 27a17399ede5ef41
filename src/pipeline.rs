use crate::config::{LoadOptions, SourceOptions, StoreOptions, WriterOptions};
use crate::gate::{Claim, UniquenessGate};
use crate::record::{ContainerId, Record};
use crate::rejection_log::EventLog;
use crate::source::{CsvSource, SourceError};
use crate::store::{KvStore, RedisStore};
use crate::util::init_tracing_once;
use crate::writer::RecordWriter;
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;

/// Counters for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Data rows seen; also the last sequence number handed out.
    pub rows_seen: u64,
    pub accepted: u64,
    /// Duplicates of an already claimed key value.
    pub rejected: u64,
    /// Rows skipped because the claim itself failed.
    pub claim_errors: u64,
    pub written: u64,
    /// Containers lost in batches the store refused.
    pub write_errors: u64,
    pub batches: u64,
}

impl LoadSummary {
    pub fn has_store_errors(&self) -> bool {
        self.claim_errors > 0 || self.write_errors > 0
    }
}

/// Sequences source → gate → writer for one source.
///
/// Every data row gets the next sequence number, accepted or not, so rejected rows
/// leave gaps in the container ids. Claims always happen before the corresponding
/// container is buffered; a row whose claim fails is skipped and logged, never
/// written and never reported as a duplicate.
pub struct Coordinator<'a, S: KvStore + ?Sized> {
    store: &'a mut S,
    log: &'a dyn EventLog,
    writer: WriterOptions,
}

impl<'a, S: KvStore + ?Sized> Coordinator<'a, S> {
    pub fn new(store: &'a mut S, log: &'a dyn EventLog) -> Self {
        Self { store, log, writer: WriterOptions::default() }
    }

    pub fn writer_options(mut self, opts: WriterOptions) -> Self {
        self.writer = opts;
        self
    }

    /// Process `source` in order. Only input errors are returned; store errors are
    /// logged and counted in the summary. On an input error, containers already
    /// accepted are flushed before returning so their claims are not orphaned.
    pub fn run<I>(&mut self, source: I, key_field: &str, keyset_prefix: &str) -> Result<LoadSummary, SourceError>
    where
        I: IntoIterator<Item = Result<Record, SourceError>>,
    {
        let gate = UniquenessGate::new(self.log);
        let mut writer = RecordWriter::new(self.writer.clone());
        let mut summary = LoadSummary::default();
        let mut seq: u64 = 0;

        for item in source {
            let record = match item {
                Ok(r) => r,
                Err(e) => {
                    self.flush(&mut writer, &mut summary);
                    return Err(e);
                }
            };
            seq += 1;
            summary.rows_seen = seq;
            let id = ContainerId::new(keyset_prefix, seq);

            let Some(value) = record.get(key_field) else {
                self.flush(&mut writer, &mut summary);
                return Err(SourceError::MissingKeyField { field: key_field.to_string(), row: seq });
            };

            match gate.claim(&mut *self.store, key_field, value) {
                Ok(Claim::Accepted) => {
                    summary.accepted += 1;
                    writer.write(id, record);
                    if writer.is_full() {
                        self.flush(&mut writer, &mut summary);
                    }
                }
                Ok(Claim::Rejected) => summary.rejected += 1,
                Err(e) => {
                    summary.claim_errors += 1;
                    self.log.error(&format!("claim failed for {}={}: {}", key_field, value, e));
                }
            }
        }

        self.flush(&mut writer, &mut summary);
        tracing::info!(
            "rows={} accepted={} rejected={} claim_errors={} written={} write_errors={}",
            summary.rows_seen, summary.accepted, summary.rejected,
            summary.claim_errors, summary.written, summary.write_errors
        );
        Ok(summary)
    }

    fn flush(&mut self, writer: &mut RecordWriter, summary: &mut LoadSummary) {
        match writer.flush(&mut *self.store) {
            Ok(0) => {}
            Ok(n) => {
                summary.written += n as u64;
                summary.batches += 1;
            }
            Err(e) => {
                summary.write_errors += e.containers as u64;
                self.log.error(&format!("batch write of {} containers failed: {}", e.containers, e.source));
            }
        }
    }
}

/// File-to-Redis loader with builder-style configuration.
#[derive(Clone, Default)]
pub struct Loader {
    pub(crate) opts: LoadOptions,
}

impl Loader {
    pub fn new() -> Self {
        Self { opts: LoadOptions::default() }
    }

    // -------- Builder methods --------
    pub fn input(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input(path); self }
    pub fn key_field(mut self, field: impl Into<String>) -> Self { self.opts = self.opts.with_key_field(field); self }
    pub fn keyset_prefix(mut self, prefix: impl Into<String>) -> Self { self.opts = self.opts.with_keyset_prefix(prefix); self }
    pub fn store(mut self, store: StoreOptions) -> Self { self.opts = self.opts.with_store(store); self }
    pub fn source(mut self, source: SourceOptions) -> Self { self.opts = self.opts.with_source(source); self }
    pub fn writer(mut self, writer: WriterOptions) -> Self { self.opts = self.opts.with_writer(writer); self }
    pub fn flush_every(mut self, n: Option<usize>) -> Self { self.opts.writer = self.opts.writer.with_flush_every(n); self }
    pub fn transactional(mut self, yes: bool) -> Self { self.opts.writer = self.opts.writer.with_transactional(yes); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }

    /// Open the input and check the key field against its header.
    pub fn open_source(&self) -> Result<CsvSource> {
        if self.opts.key_field.is_empty() {
            bail!("key field is required");
        }
        let src = CsvSource::open(&self.opts.input, &self.opts.source)?;
        src.require_field(&self.opts.key_field)?;
        if !self.opts.progress {
            return Ok(src);
        }
        let label = self.opts.progress_label.clone().unwrap_or_else(|| {
            let name = self.opts.input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            format!("Loading {name}")
        });
        Ok(src.with_progress(label))
    }

    /// Load into an already connected store.
    pub fn run_with<S: KvStore + ?Sized>(&self, store: &mut S, log: &dyn EventLog) -> Result<LoadSummary> {
        init_tracing_once();
        let source = self.open_source()?;
        self.load(source, store, log)
    }

    /// Open the input, connect to Redis once, and load.
    pub fn run(&self, log: &dyn EventLog) -> Result<LoadSummary> {
        init_tracing_once();
        let source = self.open_source()?;
        let mut store = match RedisStore::connect(&self.opts.store) {
            Ok(s) => s,
            Err(e) => {
                log.error(&format!("cannot connect to {}: {}", self.opts.store.redacted_url(), e));
                return Err(e).with_context(|| format!("connect {}", self.opts.store.redacted_url()));
            }
        };
        self.load(source, &mut store, log)
    }

    fn load<S: KvStore + ?Sized>(&self, source: CsvSource, store: &mut S, log: &dyn EventLog) -> Result<LoadSummary> {
        let input = source.path().to_path_buf();
        tracing::info!(
            "loading {} (key field `{}`, keyset `{}`)",
            input.display(), self.opts.key_field, self.opts.keyset_prefix
        );
        Coordinator::new(store, log)
            .writer_options(self.opts.writer.clone())
            .run(source, &self.opts.key_field, &self.opts.keyset_prefix)
            .with_context(|| format!("loading {}", input.display()))
    }
}
