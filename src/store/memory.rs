//! In-process store adapter.
//!
//! Keeps every collection in ordered maps, stages transactional writes until
//! commit, and can be persisted as a JSON snapshot between runs. [`Faults`]
//! lets tests make individual operations fail.

use crate::audit::AuditRecord;
use crate::error::{EngineError, StoreError, StoreResult};
use crate::mandate::{Creditor, Debtor, StoredMandate};
use crate::store::{BulkWriteReport, MandateStore, StoreTransaction, WriteFailure};
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

const MANDATES: &str = "mandates";
const CREDITORS: &str = "creditors";
const DEBTORS: &str = "debtors";

/// Injected failures. Not persisted.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Every operation fails with [`StoreError::Unavailable`].
    pub unavailable: bool,

    /// Number of upcoming commits that will be aborted.
    pub failing_commits: usize,

    /// Full mandate fetches fail; timestamp lookups still succeed.
    pub failing_fetches: bool,

    /// Mandate ids whose replacement is rejected.
    pub rejected_replacements: HashSet<String>,

    /// Bulk replace calls fail as a whole.
    pub failing_replacements: bool,

    /// Audit bulk writes fail as a whole.
    pub failing_audit_writes: bool,
}

/// Store backed by in-memory collections.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStore {
    mandates: BTreeMap<String, StoredMandate>,
    creditors: BTreeMap<String, Creditor>,
    debtors: BTreeMap<String, Debtor>,
    audits: Vec<AuditRecord>,

    #[serde(skip)]
    faults: Faults,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot, or starts empty if the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No snapshot at {}, starting empty", path.as_ref().display());
                return Ok(Self::new());
            }
            Err(e) => return Err(e.into()),
        };
        let store = serde_json::from_reader(BufReader::new(file))?;
        Ok(store)
    }

    /// Writes a snapshot, replacing any previous one only once fully written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngineError> {
        let path = path.as_ref();
        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Mutable access to injected failures.
    pub fn faults_mut(&mut self) -> &mut Faults {
        &mut self.faults
    }

    /// Seeds a mandate directly, bypassing the engine.
    pub fn put_mandate(&mut self, mandate: StoredMandate) {
        self.mandates.insert(mandate.mandate_id.clone(), mandate);
    }

    pub fn mandate(&self, mandate_id: &str) -> Option<&StoredMandate> {
        self.mandates.get(mandate_id)
    }

    pub fn mandate_count(&self) -> usize {
        self.mandates.len()
    }

    pub fn creditor(&self, creditor_id: &str) -> Option<&Creditor> {
        self.creditors.get(creditor_id)
    }

    pub fn creditor_count(&self) -> usize {
        self.creditors.len()
    }

    pub fn debtor(&self, debtor_id: &str) -> Option<&Debtor> {
        self.debtors.get(debtor_id)
    }

    pub fn debtor_count(&self) -> usize {
        self.debtors.len()
    }

    /// Full audit log in append order.
    pub fn audits(&self) -> &[AuditRecord] {
        &self.audits
    }

    /// Audit entries for one mandate, newest first.
    pub fn audits_for(&self, mandate_id: &str) -> Vec<&AuditRecord> {
        let mut entries: Vec<&AuditRecord> = self
            .audits
            .iter()
            .filter(|a| a.mandate_id == mandate_id)
            .collect();
        // Stable sort keeps append order for equal timestamps; reverse gives newest first.
        entries.sort_by_key(|a| a.change_timestamp);
        entries.reverse();
        entries
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.faults.unavailable {
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

impl MandateStore for MemoryStore {
    type Transaction<'a> = MemoryTransaction<'a>;

    fn fetch_update_dates(&self, ids: &[String]) -> StoreResult<HashMap<String, NaiveDateTime>> {
        self.check_available()?;
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.mandates
                    .get(id)
                    .map(|m| (id.clone(), m.last_update_date))
            })
            .collect())
    }

    fn fetch_mandates(&self, ids: &[String]) -> StoreResult<HashMap<String, StoredMandate>> {
        self.check_available()?;
        if self.faults.failing_fetches {
            return Err(StoreError::Unavailable("mandate fetch timed out".to_string()));
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.mandates.get(id).map(|m| (id.clone(), m.clone())))
            .collect())
    }

    fn existing_creditor_ids(&self, ids: &HashSet<String>) -> StoreResult<HashSet<String>> {
        self.check_available()?;
        Ok(ids
            .iter()
            .filter(|id| self.creditors.contains_key(*id))
            .cloned()
            .collect())
    }

    fn existing_debtor_ids(&self, ids: &HashSet<String>) -> StoreResult<HashSet<String>> {
        self.check_available()?;
        Ok(ids
            .iter()
            .filter(|id| self.debtors.contains_key(*id))
            .cloned()
            .collect())
    }

    fn replace_mandates(&mut self, mandates: Vec<StoredMandate>) -> StoreResult<BulkWriteReport> {
        self.check_available()?;
        if self.faults.failing_replacements {
            return Err(StoreError::Unavailable("bulk write not acknowledged".to_string()));
        }
        let mut report = BulkWriteReport::default();

        for mandate in mandates {
            let key = mandate.mandate_id.clone();
            if self.faults.rejected_replacements.contains(&key) {
                report.failed.push(WriteFailure {
                    error: StoreError::WriteRejected {
                        key: key.clone(),
                        reason: "injected rejection".to_string(),
                    },
                    key,
                });
                continue;
            }
            match self.mandates.get_mut(&key) {
                Some(slot) => {
                    *slot = mandate;
                    report.succeeded.push(key);
                }
                None => report.failed.push(WriteFailure {
                    error: StoreError::NotFound {
                        collection: MANDATES,
                        key: key.clone(),
                    },
                    key,
                }),
            }
        }

        Ok(report)
    }

    fn insert_audits(&mut self, audits: Vec<AuditRecord>) -> StoreResult<BulkWriteReport> {
        self.check_available()?;
        if self.faults.failing_audit_writes {
            return Err(StoreError::Unavailable("audit collection unavailable".to_string()));
        }

        let succeeded = audits.iter().map(|a| a.mandate_id.clone()).collect();
        self.audits.extend(audits);
        Ok(BulkWriteReport {
            succeeded,
            failed: Vec::new(),
        })
    }

    fn begin(&mut self) -> StoreResult<MemoryTransaction<'_>> {
        self.check_available()?;
        Ok(MemoryTransaction {
            store: self,
            creditors: Vec::new(),
            debtors: Vec::new(),
            mandates: Vec::new(),
        })
    }
}

/// Staged writes against a [`MemoryStore`], applied together on commit.
pub struct MemoryTransaction<'a> {
    store: &'a mut MemoryStore,
    creditors: Vec<Creditor>,
    debtors: Vec<Debtor>,
    mandates: Vec<StoredMandate>,
}

impl MemoryTransaction<'_> {
    /// Enforces the unique key of each collection across store and staged writes.
    fn check_unique(&self) -> StoreResult<()> {
        unique_keys(
            CREDITORS,
            self.creditors.iter().map(|c| c.creditor_id.as_str()),
            |k| self.store.creditors.contains_key(k),
        )?;
        unique_keys(
            DEBTORS,
            self.debtors.iter().map(|d| d.debtor_id.as_str()),
            |k| self.store.debtors.contains_key(k),
        )?;
        unique_keys(
            MANDATES,
            self.mandates.iter().map(|m| m.mandate_id.as_str()),
            |k| self.store.mandates.contains_key(k),
        )
    }
}

fn unique_keys<'k>(
    collection: &'static str,
    keys: impl Iterator<Item = &'k str>,
    exists: impl Fn(&str) -> bool,
) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if exists(key) || !seen.insert(key) {
            return Err(StoreError::DuplicateKey {
                collection,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert_creditors(&mut self, creditors: Vec<Creditor>) -> StoreResult<()> {
        self.creditors.extend(creditors);
        Ok(())
    }

    fn insert_debtors(&mut self, debtors: Vec<Debtor>) -> StoreResult<()> {
        self.debtors.extend(debtors);
        Ok(())
    }

    fn insert_mandates(&mut self, mandates: Vec<StoredMandate>) -> StoreResult<()> {
        self.mandates.extend(mandates);
        Ok(())
    }

    fn commit(self) -> StoreResult<()> {
        self.store.check_available()?;
        if self.store.faults.failing_commits > 0 {
            self.store.faults.failing_commits -= 1;
            return Err(StoreError::TransactionAborted(
                "injected commit failure".to_string(),
            ));
        }
        self.check_unique()
            .map_err(|e| StoreError::TransactionAborted(e.to_string()))?;

        let MemoryTransaction {
            store,
            creditors,
            debtors,
            mandates,
        } = self;
        for c in creditors {
            store.creditors.insert(c.creditor_id.clone(), c);
        }
        for d in debtors {
            store.debtors.insert(d.debtor_id.clone(), d);
        }
        for m in mandates {
            store.mandates.insert(m.mandate_id.clone(), m);
        }
        Ok(())
    }

    fn abort(self) {
        debug!(
            "Transaction aborted, discarding {} mandates, {} creditors, {} debtors",
            self.mandates.len(),
            self.creditors.len(),
            self.debtors.len()
        );
    }
}
