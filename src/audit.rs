//! Audit trail entries.
//!
//! Audit records are append-only: the engine creates one per insert and one
//! per update with a non-empty change-set, and never mutates or deletes them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One field-level difference, rendered as strings.
///
/// `None` means the field was absent on that side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl FieldChange {
    pub fn new(
        field_name: impl Into<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        FieldChange {
            field_name: field_name.into(),
            old_value,
            new_value,
        }
    }
}

/// Kind of change an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => f.write_str("INSERT"),
            ChangeKind::Update => f.write_str("UPDATE"),
        }
    }
}

/// Immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub mandate_id: String,
    pub change_kind: ChangeKind,
    pub change_timestamp: DateTime<Utc>,
    pub source_file: String,
    /// Stored change marker before the write. Absent for inserts.
    pub previous_update_date: Option<NaiveDateTime>,
    pub new_update_date: NaiveDateTime,
    /// Empty for inserts.
    pub field_changes: Vec<FieldChange>,
    /// Groups every audit entry from one reconciliation run.
    pub batch_id: Uuid,
    pub processed_by: String,
}

/// Run-scoped values stamped onto every audit record.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub batch_id: Uuid,
    pub source_file: String,
    pub actor: String,
}

impl AuditContext {
    /// Audit entry for a newly created mandate.
    pub fn insert(
        &self,
        mandate_id: &str,
        new_update_date: NaiveDateTime,
        now: DateTime<Utc>,
    ) -> AuditRecord {
        AuditRecord {
            mandate_id: mandate_id.to_string(),
            change_kind: ChangeKind::Insert,
            change_timestamp: now,
            source_file: self.source_file.clone(),
            previous_update_date: None,
            new_update_date,
            field_changes: Vec::new(),
            batch_id: self.batch_id,
            processed_by: self.actor.clone(),
        }
    }

    /// Audit entry for an update carrying its change-set.
    pub fn update(
        &self,
        mandate_id: &str,
        previous_update_date: NaiveDateTime,
        new_update_date: NaiveDateTime,
        field_changes: Vec<FieldChange>,
        now: DateTime<Utc>,
    ) -> AuditRecord {
        AuditRecord {
            mandate_id: mandate_id.to_string(),
            change_kind: ChangeKind::Update,
            change_timestamp: now,
            source_file: self.source_file.clone(),
            previous_update_date: Some(previous_update_date),
            new_update_date,
            field_changes,
            batch_id: self.batch_id,
            processed_by: self.actor.clone(),
        }
    }
}
