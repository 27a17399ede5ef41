use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_DB: i64 = 0;

/// Connection parameters for the Redis store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: DEFAULT_DB,
            password: None,
        }
    }
}

impl StoreOptions {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// `redis://[:password@]host:port/db`
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Same as `url()` with the password masked; safe for logs.
    pub fn redacted_url(&self) -> String {
        match &self.password {
            Some(_) => format!("redis://:***@{}:{}/{}", self.host, self.port, self.db),
            None => self.url(),
        }
    }
}

/// Dialect of the delimited input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: Option<u8>,
    pub read_buffer_bytes: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: Some(b'\\'),
            read_buffer_bytes: 256 * 1024,
        }
    }
}

impl SourceOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }
    pub fn with_escape(mut self, escape: Option<u8>) -> Self {
        self.escape = escape;
        self
    }
}

/// Batching behaviour of container writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Flush once this many containers are buffered. `None` means one batch per source.
    pub flush_every: Option<usize>,
    /// Wrap each batch in MULTI/EXEC.
    pub transactional: bool,
}

impl WriterOptions {
    pub fn with_flush_every(mut self, n: Option<usize>) -> Self {
        self.flush_every = n.map(|n| n.max(1));
        self
    }
    pub fn with_transactional(mut self, yes: bool) -> Self {
        self.transactional = yes;
        self
    }
}

/// Everything one load run needs, with builder chaining.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub input: PathBuf,
    pub key_field: String,
    pub keyset_prefix: String,
    pub store: StoreOptions,
    pub source: SourceOptions,
    pub writer: WriterOptions,
    pub progress: bool,               // show progress bar
    pub progress_label: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            key_field: String::new(),
            keyset_prefix: String::new(),
            store: StoreOptions::default(),
            source: SourceOptions::default(),
            writer: WriterOptions::default(),
            progress: true,
            progress_label: None,
        }
    }
}

impl LoadOptions {
    pub fn with_input(mut self, path: impl AsRef<Path>) -> Self {
        self.input = path.as_ref().to_path_buf();
        self
    }
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }
    pub fn with_keyset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keyset_prefix = prefix.into();
        self
    }
    pub fn with_store(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }
    pub fn with_source(mut self, source: SourceOptions) -> Self {
        self.source = source;
        self
    }
    pub fn with_writer(mut self, writer: WriterOptions) -> Self {
        self.writer = writer;
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
}
