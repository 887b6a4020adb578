//! Core reconciliation engine.
//!
//! Reads a mandate extract in fixed-size batches and reconciles each batch
//! against the store in three phases: a timestamp-only classification
//! pre-pass, a full field diff for the ambiguous subset, and the writes.
//! Batches are processed strictly one after another.

use crate::audit::{AuditContext, AuditRecord};
use crate::config::ReconcileConfig;
use crate::diff::{apply_changes, diff};
use crate::error::{EngineError, Result, StoreResult};
use crate::mandate::{Creditor, Debtor, MandateRecord, StoredMandate};
use crate::reader::BatchReader;
use crate::store::{MandateStore, StoreTransaction};
use crate::summary::{RunStats, RunSummary};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// The mandate reconciliation engine.
///
/// Owns the store gateway and the run counters. Re-running the same file is
/// a no-op: every record then matches its stored timestamp or diffs empty.
pub struct Reconciler<S: MandateStore> {
    store: S,
    config: ReconcileConfig,
    stats: RunStats,
}

impl<S: MandateStore> Reconciler<S> {
    /// Creates an engine over `store`, rejecting an unusable configuration.
    pub fn new(store: S, config: ReconcileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Reconciler {
            store,
            config,
            stats: RunStats::default(),
        })
    }

    /// Reconciles a file. The audit source name is the file name.
    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<RunSummary> {
        let path = path.as_ref();
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!("Starting to process file: {}", path.display());
        let reader = BatchReader::from_path(path, &self.config)?;
        self.run(reader, source_file)
    }

    /// Reconciles any reader, recording `source_file` on audit entries.
    pub fn process_reader<R: Read>(&mut self, reader: R, source_file: &str) -> Result<RunSummary> {
        let reader = BatchReader::new(reader, &self.config)?;
        self.run(reader, source_file.to_string())
    }

    fn run<R: Read>(&mut self, mut reader: BatchReader<R>, source_file: String) -> Result<RunSummary> {
        let started = Instant::now();
        self.stats = RunStats::default();

        let ctx = AuditContext {
            batch_id: Uuid::new_v4(),
            source_file,
            actor: self.config.actor.clone(),
        };
        debug!("Run batch id {}", ctx.batch_id);

        loop {
            let batch = reader.next_batch(self.config.batch_size)?;
            if batch.is_empty() {
                break;
            }

            let before = self.stats.processed;
            self.process_batch(batch, &ctx)?;
            self.log_progress(before);
        }

        self.stats.parse_errors = reader.parse_errors();

        let summary = RunSummary {
            batch_id: ctx.batch_id,
            source_file: ctx.source_file,
            stats: self.stats.clone(),
            elapsed: started.elapsed(),
        };
        for line in summary.to_string().lines() {
            info!("{}", line);
        }
        Ok(summary)
    }

    /// Reconciles one batch.
    ///
    /// Only a failed classification lookup is returned as an error; every
    /// other failure is contained and counted.
    pub fn process_batch(&mut self, batch: Vec<MandateRecord>, ctx: &AuditContext) -> Result<()> {
        self.stats.processed += batch.len() as u64;
        let batch = self.dedupe(batch);

        let ids: Vec<String> = batch.iter().map(|r| r.mandate_id.clone()).collect();
        let known = self
            .store
            .fetch_update_dates(&ids)
            .map_err(EngineError::ClassificationLookup)?;

        let mut inserts = Vec::new();
        let mut ambiguous = Vec::new();
        for record in batch {
            match known.get(&record.mandate_id) {
                None => inserts.push(record),
                Some(stored) if *stored == record.last_update_date => {
                    self.stats.skipped_unchanged += 1;
                }
                Some(_) => ambiguous.push(record),
            }
        }
        debug!(
            "Classified batch: {} new, {} ambiguous, {} unchanged so far",
            inserts.len(),
            ambiguous.len(),
            self.stats.skipped_unchanged
        );

        let now = Utc::now();
        let mut audits = Vec::new();

        if !inserts.is_empty() {
            self.insert_new(inserts, ctx, now, &mut audits);
        }
        if !ambiguous.is_empty() {
            self.update_changed(ambiguous, ctx, now, &mut audits);
        }

        self.write_audits(audits);
        Ok(())
    }

    /// Current counters.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the engine, handing back the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Keeps only the last occurrence of each id, preserving file order.
    fn dedupe(&mut self, batch: Vec<MandateRecord>) -> Vec<MandateRecord> {
        let keep: HashSet<usize> = {
            let mut last: HashMap<&str, usize> = HashMap::with_capacity(batch.len());
            for (idx, record) in batch.iter().enumerate() {
                last.insert(record.mandate_id.as_str(), idx);
            }
            last.into_values().collect()
        };
        if keep.len() == batch.len() {
            return batch;
        }

        let mut kept = Vec::with_capacity(keep.len());
        for (idx, record) in batch.into_iter().enumerate() {
            if keep.contains(&idx) {
                kept.push(record);
            } else {
                debug!(
                    "Mandate {} repeated later in the batch, earlier line superseded",
                    record.mandate_id
                );
                self.stats.superseded += 1;
            }
        }
        kept
    }

    /// Inserts new mandates and their first-seen parties in one transaction.
    fn insert_new(
        &mut self,
        records: Vec<MandateRecord>,
        ctx: &AuditContext,
        now: DateTime<Utc>,
        audits: &mut Vec<AuditRecord>,
    ) {
        let count = records.len() as u64;

        let creditor_ids: HashSet<String> = records
            .iter()
            .filter_map(|r| r.attributes.creditor_id.clone())
            .collect();
        let debtor_ids: HashSet<String> = records
            .iter()
            .filter_map(|r| r.attributes.debtor_id())
            .collect();

        let existing = self
            .store
            .existing_creditor_ids(&creditor_ids)
            .and_then(|c| Ok((c, self.store.existing_debtor_ids(&debtor_ids)?)));
        let (mut known_creditors, mut known_debtors) = match existing {
            Ok(found) => found,
            Err(e) => {
                error!("Party lookup failed, {} inserts not attempted: {}", count, e);
                self.stats.errored += count;
                return;
            }
        };

        let mut creditors = Vec::new();
        let mut debtors = Vec::new();
        let mut mandates = Vec::with_capacity(records.len());
        let mut pending = Vec::with_capacity(records.len());

        for record in records {
            if let Some(creditor) = record.to_creditor(now) {
                if known_creditors.insert(creditor.creditor_id.clone()) {
                    creditors.push(creditor);
                }
            }
            if let Some(debtor) = record.to_debtor(now) {
                if known_debtors.insert(debtor.debtor_id.clone()) {
                    debtors.push(debtor);
                }
            }

            pending.push(ctx.insert(&record.mandate_id, record.last_update_date, now));
            mandates.push(record.into_stored(now));
        }

        let (new_creditors, new_debtors) = (creditors.len() as u64, debtors.len() as u64);
        let result = self
            .store
            .begin()
            .and_then(|tx| commit_inserts(tx, creditors, debtors, mandates));

        match result {
            Ok(()) => {
                self.stats.inserted += count;
                self.stats.new_creditors += new_creditors;
                self.stats.new_debtors += new_debtors;
                audits.extend(pending);
                debug!(
                    "Batch inserted {} mandates, {} creditors, {} debtors",
                    count, new_creditors, new_debtors
                );
            }
            Err(e) => {
                error!("Batch transaction failed, {} inserts rolled back: {}", count, e);
                self.stats.errored += count;
            }
        }
    }

    /// Diffs ambiguous records against their stored versions and replaces
    /// the ones that really changed.
    fn update_changed(
        &mut self,
        records: Vec<MandateRecord>,
        ctx: &AuditContext,
        now: DateTime<Utc>,
        audits: &mut Vec<AuditRecord>,
    ) {
        let ids: Vec<String> = records.iter().map(|r| r.mandate_id.clone()).collect();
        let existing = match self.store.fetch_mandates(&ids) {
            Ok(found) => found,
            Err(e) => {
                error!("Fetching {} stored mandates failed: {}", ids.len(), e);
                self.stats.errored += ids.len() as u64;
                return;
            }
        };

        let mut replacements: Vec<StoredMandate> = Vec::new();
        let mut pending: Vec<AuditRecord> = Vec::new();

        for record in records {
            let Some(stored) = existing.get(&record.mandate_id) else {
                warn!(
                    "Mandate {} disappeared between classification and fetch",
                    record.mandate_id
                );
                self.stats.errored += 1;
                continue;
            };

            let changes = diff(stored, &record);
            if changes.is_empty() {
                debug!(
                    "Mandate {} has a new timestamp but no field changes, skipping",
                    record.mandate_id
                );
                self.stats.skipped_no_change += 1;
                continue;
            }

            pending.push(ctx.update(
                &record.mandate_id,
                stored.last_update_date,
                record.last_update_date,
                changes,
                now,
            ));

            let mut merged = apply_changes(stored, record);
            merged.version = Some(stored.next_version());
            replacements.push(merged);
        }

        if replacements.is_empty() {
            return;
        }

        let attempted = replacements.len() as u64;
        match self.store.replace_mandates(replacements) {
            Ok(report) => {
                for failure in &report.failed {
                    warn!("Update of mandate {} failed: {}", failure.key, failure.error);
                }
                self.stats.errored += report.failed.len() as u64;
                self.stats.updated += report.succeeded.len() as u64;

                let written: HashSet<&str> = report.succeeded.iter().map(String::as_str).collect();
                audits.extend(
                    pending
                        .into_iter()
                        .filter(|a| written.contains(a.mandate_id.as_str())),
                );
                debug!(
                    "Bulk updated {} of {} mandates",
                    report.succeeded.len(),
                    attempted
                );
            }
            Err(e) => {
                error!("Bulk update of {} mandates failed: {}", attempted, e);
                self.stats.errored += attempted;
            }
        }
    }

    /// Appends audit records for primary writes that already succeeded.
    ///
    /// Not transactional with those writes: a failure here leaves them
    /// unaudited and is reported as a data-quality warning.
    fn write_audits(&mut self, audits: Vec<AuditRecord>) {
        if audits.is_empty() {
            return;
        }

        let count = audits.len() as u64;
        match self.store.insert_audits(audits) {
            Ok(report) => {
                for failure in &report.failed {
                    warn!(
                        "Data quality: audit for mandate {} not written: {}",
                        failure.key, failure.error
                    );
                }
                self.stats.audit_failures += report.failed.len() as u64;
            }
            Err(e) => {
                warn!(
                    "Data quality: {} audit records not written, primary writes stand: {}",
                    count, e
                );
                self.stats.audit_failures += count;
            }
        }
    }

    fn log_progress(&self, before: u64) {
        let interval = self.config.progress_interval;
        if interval > 0 && before / interval != self.stats.processed / interval {
            info!("Processed {} records...", self.stats.processed);
        }
    }
}

/// Stages every insert and commits, aborting on the first staging failure.
fn commit_inserts<T: StoreTransaction>(
    mut tx: T,
    creditors: Vec<Creditor>,
    debtors: Vec<Debtor>,
    mandates: Vec<StoredMandate>,
) -> StoreResult<()> {
    match stage_inserts(&mut tx, creditors, debtors, mandates) {
        Ok(()) => tx.commit(),
        Err(e) => {
            tx.abort();
            Err(e)
        }
    }
}

fn stage_inserts<T: StoreTransaction>(
    tx: &mut T,
    creditors: Vec<Creditor>,
    debtors: Vec<Debtor>,
    mandates: Vec<StoredMandate>,
) -> StoreResult<()> {
    if !creditors.is_empty() {
        tx.insert_creditors(creditors)?;
    }
    if !debtors.is_empty() {
        tx.insert_debtors(debtors)?;
    }
    tx.insert_mandates(mandates)
}
