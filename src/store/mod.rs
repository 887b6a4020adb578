//! Store gateway contract.
//!
//! The engine needs batched reads, unordered bulk writes, and a single
//! atomic primitive used for the insert phase. Everything is keyed by the
//! business identifier, never by an internal storage handle.

pub mod memory;

use crate::audit::AuditRecord;
use crate::error::{StoreError, StoreResult};
use crate::mandate::{Creditor, Debtor, StoredMandate};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

pub use memory::{Faults, MemoryStore};

/// Backing store the reconciliation engine reads from and writes to.
///
/// Calls are issued sequentially from one thread. Implementations may pool
/// connections internally but must not assume a write in one batch is
/// visible to a concurrent reader of the next.
pub trait MandateStore {
    /// Atomic write scope returned by [`MandateStore::begin`].
    type Transaction<'a>: StoreTransaction
    where
        Self: 'a;

    /// Covering lookup of `mandateId -> lastUpdateDate` for the given ids.
    ///
    /// Ids not present in the store are absent from the result.
    fn fetch_update_dates(&self, ids: &[String]) -> StoreResult<HashMap<String, NaiveDateTime>>;

    /// Full stored mandates for the given ids.
    fn fetch_mandates(&self, ids: &[String]) -> StoreResult<HashMap<String, StoredMandate>>;

    /// Subset of `ids` that already has a creditor entity.
    fn existing_creditor_ids(&self, ids: &HashSet<String>) -> StoreResult<HashSet<String>>;

    /// Subset of `ids` that already has a debtor entity.
    fn existing_debtor_ids(&self, ids: &HashSet<String>) -> StoreResult<HashSet<String>>;

    /// Unordered bulk replace keyed by `mandateId`.
    ///
    /// One record's failure does not block the others; `Err` means the call
    /// as a whole did not reach the store.
    fn replace_mandates(&mut self, mandates: Vec<StoredMandate>) -> StoreResult<BulkWriteReport>;

    /// Unordered bulk append to the audit log.
    fn insert_audits(&mut self, audits: Vec<AuditRecord>) -> StoreResult<BulkWriteReport>;

    /// Starts an atomic multi-collection write.
    fn begin(&mut self) -> StoreResult<Self::Transaction<'_>>;
}

/// All-or-nothing write scope. Nothing staged is visible before `commit`.
pub trait StoreTransaction: Sized {
    fn insert_creditors(&mut self, creditors: Vec<Creditor>) -> StoreResult<()>;

    fn insert_debtors(&mut self, debtors: Vec<Debtor>) -> StoreResult<()>;

    fn insert_mandates(&mut self, mandates: Vec<StoredMandate>) -> StoreResult<()>;

    /// Applies every staged write, or none of them.
    fn commit(self) -> StoreResult<()>;

    /// Discards every staged write.
    fn abort(self);
}

/// A single document a bulk write could not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub key: String,
    pub error: StoreError,
}

/// Per-record outcome of an unordered bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteReport {
    /// Keys written, in request order.
    pub succeeded: Vec<String>,
    pub failed: Vec<WriteFailure>,
}
