//! Key-value store seam: the two primitives the loader needs (atomic set-add and
//! batched hash writes), a Redis implementation, and an in-memory implementation.

use crate::config::StoreOptions;
use crate::record::{ContainerId, Record};
use ahash::{AHashMap, AHashSet};
use redis::Commands;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Connection(#[source] redis::RedisError),
    #[error("store operation timed out")]
    Timeout,
    #[error(transparent)]
    Redis(redis::RedisError),
    #[error("injected store failure: {0}")]
    Injected(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout
        } else if err.is_connection_refusal() || err.is_connection_dropped() || err.kind() == redis::ErrorKind::IoError {
            StoreError::Connection(err)
        } else {
            StoreError::Redis(err)
        }
    }
}

pub trait KvStore {
    /// Add `member` to `set`. `Ok(true)` if it was newly added, `Ok(false)` if it was
    /// already a member. Must be atomic on the store side.
    fn sadd(&mut self, set: &str, member: &str) -> Result<bool, StoreError>;

    /// Write every container in one round trip. Each entry sets all of the record's
    /// fields on the hash named by its id.
    fn batch_hset(&mut self, batch: &[(ContainerId, Record)], transactional: bool) -> Result<(), StoreError>;
}

/// Redis store over a single synchronous connection, opened once per run.
pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    pub fn connect(opts: &StoreOptions) -> Result<Self, StoreError> {
        let client = redis::Client::open(opts.url().as_str())?;
        let conn = client.get_connection().map_err(|e| match StoreError::from(e) {
            StoreError::Redis(e) => StoreError::Connection(e),
            other => other,
        })?;
        tracing::info!("connected to {}", opts.redacted_url());
        Ok(Self { conn })
    }
}

impl KvStore for RedisStore {
    fn sadd(&mut self, set: &str, member: &str) -> Result<bool, StoreError> {
        let added: i64 = self.conn.sadd(set, member)?;
        Ok(added == 1)
    }

    fn batch_hset(&mut self, batch: &[(ContainerId, Record)], transactional: bool) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        hset_pipeline(batch, transactional).query::<()>(&mut self.conn)?;
        Ok(())
    }
}

/// One `HMSET` per container, optionally wrapped in MULTI/EXEC.
fn hset_pipeline(batch: &[(ContainerId, Record)], transactional: bool) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    if transactional {
        pipe.atomic();
    }
    for (id, record) in batch {
        pipe.hset_multiple(id.as_str(), record.fields()).ignore();
    }
    pipe
}

/// In-process store with the same semantics as Redis for the two primitives.
/// Used for dry runs and tests; failures can be injected per member or per batch.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    sets: AHashMap<String, AHashSet<String>>,
    hashes: AHashMap<String, BTreeMap<String, String>>,
    fail_members: AHashSet<String>,
    fail_writes: bool,
    batches: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `sadd` fail for this member value (in any set).
    pub fn fail_claims_for(mut self, member: impl Into<String>) -> Self {
        self.fail_members.insert(member.into());
        self
    }

    /// Make every `batch_hset` fail while set.
    pub fn fail_writes(mut self, yes: bool) -> Self {
        self.fail_writes = yes;
        self
    }

    pub fn is_member(&self, set: &str, member: &str) -> bool {
        self.sets.get(set).map(|s| s.contains(member)).unwrap_or(false)
    }

    pub fn set_len(&self, set: &str) -> usize {
        self.sets.get(set).map(|s| s.len()).unwrap_or(0)
    }

    pub fn container(&self, id: &str) -> Option<&BTreeMap<String, String>> {
        self.hashes.get(id)
    }

    pub fn container_count(&self) -> usize {
        self.hashes.len()
    }

    /// Successful `batch_hset` calls so far.
    pub fn batches(&self) -> usize {
        self.batches
    }
}

impl KvStore for MemoryStore {
    fn sadd(&mut self, set: &str, member: &str) -> Result<bool, StoreError> {
        if self.fail_members.contains(member) {
            return Err(StoreError::Injected(format!("SADD {set} {member}")));
        }
        Ok(self.sets.entry(set.to_string()).or_default().insert(member.to_string()))
    }

    fn batch_hset(&mut self, batch: &[(ContainerId, Record)], _transactional: bool) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Injected(format!("pipeline of {} HSET", batch.len())));
        }
        for (id, record) in batch {
            let h = self.hashes.entry(id.as_str().to_string()).or_default();
            for (k, v) in record.iter() {
                h.insert(k.to_string(), v.to_string());
            }
        }
        self.batches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sadd_reports_first_insert_only() {
        let mut s = MemoryStore::new();
        assert!(s.sadd("id", "1").unwrap());
        assert!(!s.sadd("id", "1").unwrap());
        assert!(s.sadd("email", "1").unwrap(), "sets are independent");
        assert_eq!(s.set_len("id"), 1);
    }

    #[test]
    fn injected_claim_failure_leaves_set_untouched() {
        let mut s = MemoryStore::new().fail_claims_for("bad");
        assert!(matches!(s.sadd("id", "bad"), Err(StoreError::Injected(_))));
        assert!(!s.is_member("id", "bad"));
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let mut s = MemoryStore::new().fail_writes(true);
        let batch = vec![(ContainerId::new("u", 1), Record::from_pairs([("id", "1")]))];
        assert!(s.batch_hset(&batch, false).is_err());
        assert_eq!(s.container_count(), 0);
        assert_eq!(s.batches(), 0);
    }

    #[test]
    fn redis_errors_are_classified() {
        use redis::{ErrorKind, RedisError};
        use std::io;

        let timeout = RedisError::from(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(matches!(StoreError::from(timeout), StoreError::Timeout));

        let refused = RedisError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "down"));
        assert!(matches!(StoreError::from(refused), StoreError::Connection(_)));

        let reset = RedisError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert!(matches!(StoreError::from(reset), StoreError::Connection(_)));

        let io_kind = RedisError::from((ErrorKind::IoError, "x"));
        assert!(matches!(StoreError::from(io_kind), StoreError::Connection(_)));

        let wrong_type = RedisError::from((ErrorKind::TypeError, "WRONGTYPE"));
        assert!(matches!(StoreError::from(wrong_type), StoreError::Redis(_)));
    }

    #[test]
    fn transactional_batch_is_wrapped_in_multi_exec() {
        let batch = vec![
            (ContainerId::new("u", 1), Record::from_pairs([("id", "1"), ("name", "a")])),
            (ContainerId::new("u", 2), Record::from_pairs([("id", "2"), ("name", "b")])),
        ];

        let plain = String::from_utf8(hset_pipeline(&batch, false).get_packed_pipeline()).unwrap();
        assert_eq!(plain.matches("HMSET").count(), 2);
        assert!(!plain.contains("MULTI"));

        let atomic = String::from_utf8(hset_pipeline(&batch, true).get_packed_pipeline()).unwrap();
        assert_eq!(atomic.matches("HMSET").count(), 2);
        assert!(atomic.contains("MULTI"));
        assert!(atomic.contains("EXEC"));
    }
}
