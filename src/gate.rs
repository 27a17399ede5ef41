//! Uniqueness gate: claims a key value in the persistent set named after the key field.

use crate::rejection_log::EventLog;
use crate::store::{KvStore, StoreError};

/// Outcome of a successful claim attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// The value was absent and is now a member.
    Accepted,
    /// The value was already a member; nothing changed.
    Rejected,
}

pub struct UniquenessGate<'l> {
    log: &'l dyn EventLog,
}

impl<'l> UniquenessGate<'l> {
    pub fn new(log: &'l dyn EventLog) -> Self {
        Self { log }
    }

    /// Atomically add `value` to the set `set_name`.
    ///
    /// A store failure is returned as-is and is neither an acceptance nor a rejection;
    /// the caller decides how to account for it. Rejections are logged here.
    pub fn claim<S: KvStore + ?Sized>(
        &self,
        store: &mut S,
        set_name: &str,
        value: &str,
    ) -> Result<Claim, StoreError> {
        if store.sadd(set_name, value)? {
            Ok(Claim::Accepted)
        } else {
            self.log.warn(&format!("{} field has duplicate value of {}", set_name, value));
            Ok(Claim::Rejected)
        }
    }
}
