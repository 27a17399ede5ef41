//! Record writer: buffers accepted containers and submits them as pipelined batches.

use crate::config::WriterOptions;
use crate::record::{ContainerId, Record};
use crate::store::{KvStore, StoreError};

/// A batch that the store refused. The whole batch counts as failed.
#[derive(Debug)]
pub struct BatchError {
    pub containers: usize,
    pub source: StoreError,
}

pub struct RecordWriter {
    pending: Vec<(ContainerId, Record)>,
    opts: WriterOptions,
}

impl RecordWriter {
    pub fn new(opts: WriterOptions) -> Self {
        let cap = opts.flush_every.unwrap_or(1024).min(64 * 1024);
        Self { pending: Vec::with_capacity(cap), opts }
    }

    /// Queue a full write of `record` into the container `id`.
    pub fn write(&mut self, id: ContainerId, record: Record) {
        self.pending.push((id, record));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// True once the configured `flush_every` bound is reached.
    pub fn is_full(&self) -> bool {
        matches!(self.opts.flush_every, Some(n) if self.pending.len() >= n)
    }

    /// Submit everything buffered as one batch. The buffer is emptied whether or not
    /// the store accepts it. Returns the number of containers written.
    pub fn flush<S: KvStore + ?Sized>(&mut self, store: &mut S) -> Result<usize, BatchError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let batch = std::mem::take(&mut self.pending);
        let n = batch.len();
        match store.batch_hset(&batch, self.opts.transactional) {
            Ok(()) => {
                tracing::debug!("flushed {} containers", n);
                Ok(n)
            }
            Err(source) => Err(BatchError { containers: n, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn rec(id: &str) -> Record {
        Record::from_pairs([("id", id)])
    }

    #[test]
    fn nothing_reaches_the_store_before_flush() {
        let mut store = MemoryStore::new();
        let mut w = RecordWriter::new(WriterOptions::default());
        w.write(ContainerId::new("u", 1), rec("1"));
        w.write(ContainerId::new("u", 2), rec("2"));
        assert!(!w.is_full());
        assert_eq!(store.container_count(), 0);

        assert_eq!(w.flush(&mut store).unwrap(), 2);
        assert_eq!(store.container_count(), 2);
        assert_eq!(store.batches(), 1);
        assert_eq!(w.flush(&mut store).unwrap(), 0, "empty flush is a no-op");
        assert_eq!(store.batches(), 1);
    }

    #[test]
    fn flush_every_marks_buffer_full() {
        let mut w = RecordWriter::new(WriterOptions::default().with_flush_every(Some(2)));
        w.write(ContainerId::new("u", 1), rec("1"));
        assert!(!w.is_full());
        w.write(ContainerId::new("u", 2), rec("2"));
        assert!(w.is_full());
    }

    #[test]
    fn failed_batch_is_reported_whole_and_cleared() {
        let mut store = MemoryStore::new().fail_writes(true);
        let mut w = RecordWriter::new(WriterOptions::default());
        w.write(ContainerId::new("u", 1), rec("1"));
        w.write(ContainerId::new("u", 2), rec("2"));
        let err = w.flush(&mut store).unwrap_err();
        assert_eq!(err.containers, 2);
        assert_eq!(w.pending(), 0);
    }
}
