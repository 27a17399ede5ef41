//! Record source: a header-driven CSV reader yielding one `Record` per data row.
//! Plain files and `.zst` compressed files are both accepted.

use crate::config::SourceOptions;
use crate::progress::ProgressScope;
use crate::record::Record;
use crate::util::open_with_backoff;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use thiserror::Error;
use zstd::stream::read::Decoder;

/// Input-side failures. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open input {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot read header of {}", .path.display())]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("key field `{field}` is not a column of {}", .path.display())]
    KeyFieldNotInHeader { field: String, path: PathBuf },
    #[error("row {row} has no value for key field `{field}`")]
    MissingKeyField { field: String, row: u64 },
    #[error("malformed or unreadable row {row} in {}", .path.display())]
    Malformed {
        path: PathBuf,
        row: u64,
        #[source]
        source: csv::Error,
    },
}

/// A `Read` wrapper that counts raw (possibly compressed) bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EscapeState {
    FieldStart,
    /// Inside an unquoted field that is being re-emitted as a quoted one.
    Bare,
    BareEscape,
    Quoted,
    QuotedEscape,
    /// Saw a quote inside a quoted field: either a doubled quote or the close.
    QuotedQuote,
    /// Past the closing quote, up to the next delimiter or line break.
    Trailing,
}

/// Rewrites unquoted fields as quoted ones so the escape character is honoured
/// outside quotes too (`1,Smith\, John` is two fields). The csv reader only applies
/// escapes inside quotes; quoted fields and empty lines pass through unchanged.
struct UnquotedEscapes<R: Read> {
    inner: R,
    delimiter: u8,
    quote: u8,
    escape: u8,
    state: EscapeState,
    raw: Vec<u8>,
    out: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> UnquotedEscapes<R> {
    fn new(inner: R, delimiter: u8, quote: u8, escape: u8) -> Self {
        Self {
            inner,
            delimiter,
            quote,
            escape,
            state: EscapeState::FieldStart,
            raw: vec![0; 64 * 1024],
            out: Vec::with_capacity(80 * 1024),
            pos: 0,
            eof: false,
        }
    }

    fn is_break(b: u8) -> bool {
        b == b'\n' || b == b'\r'
    }

    fn push(&mut self, b: u8) {
        use EscapeState::*;
        let (q, esc, delim) = (self.quote, self.escape, self.delimiter);
        let state = self.state;
        self.state = match state {
            FieldStart | Trailing if b == delim || Self::is_break(b) => {
                self.out.push(b);
                FieldStart
            }
            FieldStart if b == q => {
                self.out.push(b);
                Quoted
            }
            FieldStart if b == esc => {
                self.out.extend_from_slice(&[q, esc]);
                BareEscape
            }
            FieldStart => {
                self.out.extend_from_slice(&[q, b]);
                Bare
            }
            Bare if b == delim || Self::is_break(b) => {
                self.out.extend_from_slice(&[q, b]);
                FieldStart
            }
            Bare if b == esc => {
                self.out.push(esc);
                BareEscape
            }
            Bare if b == q => {
                self.out.extend_from_slice(&[esc, q]);
                Bare
            }
            Bare | BareEscape => {
                self.out.push(b);
                Bare
            }
            Quoted if b == esc => {
                self.out.push(b);
                QuotedEscape
            }
            Quoted if b == q => {
                self.out.push(b);
                QuotedQuote
            }
            Quoted | QuotedEscape => {
                self.out.push(b);
                Quoted
            }
            QuotedQuote if b == q => {
                self.out.push(b);
                Quoted
            }
            QuotedQuote if b == delim || Self::is_break(b) => {
                self.out.push(b);
                FieldStart
            }
            QuotedQuote | Trailing => {
                self.out.push(b);
                Trailing
            }
        };
    }

    fn finish(&mut self) {
        if matches!(self.state, EscapeState::Bare | EscapeState::BareEscape) {
            self.out.push(self.quote);
        }
        self.state = EscapeState::FieldStart;
    }

    fn fill(&mut self) -> io::Result<()> {
        self.out.clear();
        self.pos = 0;
        while self.out.is_empty() && !self.eof {
            let n = self.inner.read(&mut self.raw)?;
            if n == 0 {
                self.eof = true;
                self.finish();
                break;
            }
            for i in 0..n {
                let b = self.raw[i];
                self.push(b);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for UnquotedEscapes<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.out.len() {
            self.fill()?;
        }
        let n = buf.len().min(self.out.len() - self.pos);
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

fn is_zstd(path: &Path) -> bool {
    path.extension().map(|e| e.eq_ignore_ascii_case("zst")).unwrap_or(false)
}

/// Lazy, finite, non-restartable sequence of records in file order.
pub struct CsvSource {
    path: PathBuf,
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
    row: u64,
    bytes_read: Arc<AtomicU64>,
    total_bytes: u64,
    progress: Option<ProgressScope>,
}

impl CsvSource {
    /// Open `path` and read its header row.
    pub fn open(path: &Path, opts: &SourceOptions) -> Result<Self, SourceError> {
        let open_err = |source: io::Error| SourceError::Open { path: path.to_path_buf(), source };

        let file: File = open_with_backoff(path, 16, 50).map_err(open_err)?;
        let total_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let counter = Arc::new(AtomicU64::new(0));
        let counting = CountingReader { inner: file, counter: counter.clone() };

        let raw: Box<dyn Read> = if is_zstd(path) {
            let mut decoder = Decoder::new(counting).map_err(open_err)?;
            decoder.window_log_max(31).map_err(open_err)?;
            Box::new(decoder)
        } else {
            Box::new(counting)
        };

        let raw: Box<dyn Read> = match opts.escape {
            Some(esc) => Box::new(UnquotedEscapes::new(raw, opts.delimiter, opts.quote, esc)),
            None => raw,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .quote(opts.quote)
            .escape(opts.escape)
            .double_quote(true)
            .has_headers(true)
            .flexible(false)
            .buffer_capacity(opts.read_buffer_bytes.max(8 * 1024))
            .from_reader(raw);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|source| SourceError::Header { path: path.to_path_buf(), source })?
            .iter()
            .map(str::to_string)
            .collect();

        tracing::debug!("{}: {} columns {:?}", path.display(), headers.len(), headers);

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records: rdr.into_records(),
            row: 0,
            bytes_read: counter,
            total_bytes,
            progress: None,
        })
    }

    /// Drive a byte progress bar (raw file bytes) while iterating.
    pub fn with_progress(mut self, label: impl Into<String>) -> Self {
        self.progress = Some(ProgressScope::bytes(label, self.total_bytes));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Fail early when `field` is not one of the header columns.
    pub fn require_field(&self, field: &str) -> Result<(), SourceError> {
        if self.headers.iter().any(|h| h == field) {
            Ok(())
        } else {
            Err(SourceError::KeyFieldNotInHeader { field: field.to_string(), path: self.path.clone() })
        }
    }

    /// Raw bytes consumed from the file so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    fn to_record(&self, row: &csv::StringRecord) -> Record {
        let mut rec = Record::with_capacity(self.headers.len());
        for (name, value) in self.headers.iter().zip(row.iter()) {
            rec.push(name.as_str(), value);
        }
        rec
    }
}

impl Iterator for CsvSource {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.records.next();
        if let Some(pb) = &self.progress {
            pb.set_bytes(self.bytes_read());
        }
        match next {
            None => {
                if let Some(pb) = self.progress.take() {
                    pb.finish(format!("{} rows read", self.row));
                }
                None
            }
            Some(res) => {
                self.row += 1;
                Some(match res {
                    Ok(row) => Ok(self.to_record(&row)),
                    Err(source) => Err(SourceError::Malformed { path: self.path.clone(), row: self.row, source }),
                })
            }
        }
    }
}
