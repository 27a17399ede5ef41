mod config;
mod record;
mod source;
mod store;

mod gate;
mod writer;
mod rejection_log;
mod pipeline;

mod progress;
mod util;

pub use crate::config::{LoadOptions, SourceOptions, StoreOptions, WriterOptions, DEFAULT_DB, DEFAULT_HOST, DEFAULT_PORT};
pub use crate::record::{ContainerId, Record};
pub use crate::pipeline::{Coordinator, LoadSummary, Loader};

// Record source (CSV / CSV.zst) and its error type.
pub use crate::source::{CsvSource, SourceError};

// Store seam: Redis for real runs, in-memory for dry runs and tests.
pub use crate::store::{KvStore, MemoryStore, RedisStore, StoreError};

// Building blocks of the pipeline, usable on their own.
pub use crate::gate::{Claim, UniquenessGate};
pub use crate::writer::{BatchError, RecordWriter};

// Operator audit log.
pub use crate::rejection_log::{format_line, EventLog, FileEventLog, Level, StderrEventLog};

pub use crate::util::init_tracing_once;
