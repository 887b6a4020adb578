//! # Mandate Reconciler
//!
//! A streaming reconciler that loads delimited direct-debit mandate extracts
//! into a store, producing inserts for new mandates, field-level updates for
//! changed ones, and an append-only audit trail of every change.
//!
//! ## Design Principles
//!
//! - **Bounded memory**: the file is read lazily, one batch at a time
//! - **Cheap pre-pass**: a timestamp-only covering lookup skips unchanged
//!   mandates without fetching them
//! - **Type-aware diffs**: amounts compare numerically, dates by day
//! - **Atomic inserts**: one transaction per insert sub-batch
//! - **Idempotent**: re-running a file writes nothing
//!
//! ## Example
//!
//! ```no_run
//! use mandate_reconciler::{MemoryStore, ReconcileConfig, Reconciler};
//!
//! let mut engine = Reconciler::new(MemoryStore::new(), ReconcileConfig::default()).unwrap();
//! let summary = engine.process_file("mandates.txt").unwrap();
//! println!("{}", summary);
//! ```

pub mod audit;
pub mod config;
pub mod decimal;
pub mod diff;
pub mod engine;
pub mod error;
pub mod mandate;
pub mod parser;
pub mod reader;
pub mod store;
pub mod summary;

pub use audit::{AuditContext, AuditRecord, ChangeKind, FieldChange};
pub use config::ReconcileConfig;
pub use decimal::{Amount, AmountError};
pub use engine::Reconciler;
pub use error::{EngineError, ParseError, Result, StoreError};
pub use mandate::{Creditor, Debtor, MandateAttributes, MandateRecord, StoredMandate};
pub use reader::BatchReader;
pub use store::{BulkWriteReport, MandateStore, MemoryStore, StoreTransaction};
pub use summary::{RunOutcome, RunStats, RunSummary};
