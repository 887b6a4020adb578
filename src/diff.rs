//! Field-level diffing of mandates.
//!
//! The comparable fields are listed once, in declaration order, in
//! [`FIELDS`]. System-owned fields (mandate id, change marker, creation
//! timestamp, version) are not in the table and therefore never diffed.

use crate::audit::FieldChange;
use crate::decimal::Amount;
use crate::mandate::{MandateAttributes, MandateRecord, StoredMandate};
use chrono::NaiveDate;

/// A typed view of one attribute.
///
/// Equality is type-aware: amounts compare by numeric value, dates by
/// calendar day, text exactly. `None` equals `None` only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(Option<&'a str>),
    Date(Option<NaiveDate>),
    Amount(Option<Amount>),
    Integer(Option<i32>),
}

impl FieldValue<'_> {
    /// String rendering used in audit records. Absent stays absent.
    pub fn render(&self) -> Option<String> {
        match self {
            FieldValue::Text(v) => v.map(str::to_string),
            FieldValue::Date(v) => v.map(|d| d.to_string()),
            FieldValue::Amount(v) => v.map(|a| a.to_string()),
            FieldValue::Integer(v) => v.map(|i| i.to_string()),
        }
    }
}

/// One row of the comparator table.
pub struct FieldComparator {
    pub name: &'static str,
    pub get: for<'a> fn(&'a MandateAttributes) -> FieldValue<'a>,
}

macro_rules! text {
    ($name:literal, $field:ident) => {
        FieldComparator {
            name: $name,
            get: |a| FieldValue::Text(a.$field.as_deref()),
        }
    };
}

macro_rules! date {
    ($name:literal, $field:ident) => {
        FieldComparator {
            name: $name,
            get: |a| FieldValue::Date(a.$field),
        }
    };
}

macro_rules! amount {
    ($name:literal, $field:ident) => {
        FieldComparator {
            name: $name,
            get: |a| FieldValue::Amount(a.$field),
        }
    };
}

/// Every diffable attribute, in declaration order.
pub static FIELDS: [FieldComparator; 26] = [
    text!("creditorId", creditor_id),
    text!("creditorName", creditor_name),
    text!("creditorAccountNumber", creditor_account_number),
    text!("creditorSortCode", creditor_sort_code),
    text!("creditorIban", creditor_iban),
    text!("creditorBic", creditor_bic),
    text!("debtorName", debtor_name),
    text!("debtorAccountNumber", debtor_account_number),
    text!("debtorSortCode", debtor_sort_code),
    text!("debtorIban", debtor_iban),
    text!("debtorBic", debtor_bic),
    text!("debtorEmail", debtor_email),
    text!("debtorPhone", debtor_phone),
    text!("mandateReference", mandate_reference),
    text!("mandateType", mandate_type),
    text!("frequency", frequency),
    text!("status", status),
    date!("signatureDate", signature_date),
    date!("effectiveDate", effective_date),
    date!("expiryDate", expiry_date),
    amount!("maxAmountPerTransaction", max_amount_per_transaction),
    amount!("maxAmountPerMonth", max_amount_per_month),
    FieldComparator {
        name: "maxTransactionsPerMonth",
        get: |a| FieldValue::Integer(a.max_transactions_per_month),
    },
    text!("currency", currency),
    text!("description", description),
    text!("schemeType", scheme_type),
];

// Adding an attribute breaks this destructuring until FIELDS is updated too.
#[allow(dead_code)]
fn table_covers(a: &MandateAttributes) {
    let MandateAttributes {
        creditor_id: _,
        creditor_name: _,
        creditor_account_number: _,
        creditor_sort_code: _,
        creditor_iban: _,
        creditor_bic: _,
        debtor_name: _,
        debtor_account_number: _,
        debtor_sort_code: _,
        debtor_iban: _,
        debtor_bic: _,
        debtor_email: _,
        debtor_phone: _,
        mandate_reference: _,
        mandate_type: _,
        frequency: _,
        status: _,
        signature_date: _,
        effective_date: _,
        expiry_date: _,
        max_amount_per_transaction: _,
        max_amount_per_month: _,
        max_transactions_per_month: _,
        currency: _,
        description: _,
        scheme_type: _,
    } = a;
}

/// Compares two attribute sets and returns the ordered change-set.
pub fn diff_attributes(existing: &MandateAttributes, candidate: &MandateAttributes) -> Vec<FieldChange> {
    FIELDS
        .iter()
        .filter_map(|field| {
            let old = (field.get)(existing);
            let new = (field.get)(candidate);
            if old == new {
                None
            } else {
                Some(FieldChange::new(field.name, old.render(), new.render()))
            }
        })
        .collect()
}

/// Diffs a stored mandate against a candidate from the file.
pub fn diff(existing: &StoredMandate, candidate: &MandateRecord) -> Vec<FieldChange> {
    diff_attributes(&existing.attributes, &candidate.attributes)
}

/// Merges a candidate onto a stored mandate.
///
/// Takes every attribute and the change marker from the candidate and keeps
/// the stored identity, creation timestamp and version. Version bumping is
/// left to the caller.
pub fn apply_changes(existing: &StoredMandate, candidate: MandateRecord) -> StoredMandate {
    StoredMandate {
        mandate_id: existing.mandate_id.clone(),
        last_update_date: candidate.last_update_date,
        attributes: candidate.attributes,
        created_at: existing.created_at,
        version: existing.version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::COLUMNS;
    use chrono::{NaiveDateTime, TimeZone, Utc};
    use std::str::FromStr;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn amount(s: &str) -> Option<Amount> {
        Some(Amount::from_str(s).unwrap())
    }

    fn stored() -> StoredMandate {
        let mut r = MandateRecord::new("MND-1", ts("2024-01-15 10:30:00"));
        r.attributes.status = Some("ACTIVE".to_string());
        r.attributes.max_amount_per_transaction = amount("100.00");
        r.attributes.expiry_date = NaiveDate::from_ymd_opt(2026, 12, 31);
        r.into_stored(Utc.with_ymd_and_hms(2024, 1, 15, 23, 0, 0).unwrap())
    }

    fn candidate() -> MandateRecord {
        let s = stored();
        MandateRecord {
            mandate_id: s.mandate_id,
            last_update_date: ts("2024-01-16 08:00:00"),
            attributes: s.attributes,
        }
    }

    #[test]
    fn test_identical_attributes_have_no_changes() {
        assert!(diff(&stored(), &candidate()).is_empty());
    }

    #[test]
    fn test_change_marker_is_not_diffed() {
        let mut c = candidate();
        c.last_update_date = ts("2030-01-01 00:00:00");
        assert!(diff(&stored(), &c).is_empty());
    }

    #[test]
    fn test_single_status_change() {
        let mut c = candidate();
        c.attributes.status = Some("SUSPENDED".to_string());

        let changes = diff(&stored(), &c);
        assert_eq!(
            changes,
            vec![FieldChange::new(
                "status",
                Some("ACTIVE".to_string()),
                Some("SUSPENDED".to_string())
            )]
        );
    }

    #[test]
    fn test_amount_compares_numerically() {
        let mut c = candidate();
        c.attributes.max_amount_per_transaction = amount("100.0");
        assert!(diff(&stored(), &c).is_empty());

        c.attributes.max_amount_per_transaction = amount("100.01");
        let changes = diff(&stored(), &c);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value.as_deref(), Some("100.00"));
        assert_eq!(changes[0].new_value.as_deref(), Some("100.01"));
    }

    #[test]
    fn test_absent_versus_present() {
        let mut c = candidate();
        c.attributes.expiry_date = None;
        c.attributes.description = Some("Gym".to_string());

        let changes = diff(&stored(), &c);
        assert_eq!(
            changes,
            vec![
                FieldChange::new("expiryDate", Some("2026-12-31".to_string()), None),
                FieldChange::new("description", None, Some("Gym".to_string())),
            ]
        );
    }

    #[test]
    fn test_changes_follow_declaration_order() {
        let mut c = candidate();
        c.attributes.scheme_type = Some("SEPA_CORE".to_string());
        c.attributes.creditor_name = Some("New Name".to_string());
        c.attributes.max_transactions_per_month = Some(3);

        let names: Vec<String> = diff(&stored(), &c).into_iter().map(|ch| ch.field_name).collect();
        assert_eq!(
            names,
            vec!["creditorName", "maxTransactionsPerMonth", "schemeType"]
        );
    }

    #[test]
    fn test_table_matches_file_columns() {
        let names: Vec<&str> = FIELDS.iter().map(|f| f.name).collect();
        assert_eq!(names, COLUMNS[2..].to_vec());
    }

    #[test]
    fn test_every_field_is_compared() {
        let empty = MandateAttributes::default();
        let full = MandateAttributes {
            creditor_id: Some("a".into()),
            creditor_name: Some("a".into()),
            creditor_account_number: Some("a".into()),
            creditor_sort_code: Some("a".into()),
            creditor_iban: Some("a".into()),
            creditor_bic: Some("a".into()),
            debtor_name: Some("a".into()),
            debtor_account_number: Some("a".into()),
            debtor_sort_code: Some("a".into()),
            debtor_iban: Some("a".into()),
            debtor_bic: Some("a".into()),
            debtor_email: Some("a".into()),
            debtor_phone: Some("a".into()),
            mandate_reference: Some("a".into()),
            mandate_type: Some("a".into()),
            frequency: Some("a".into()),
            status: Some("a".into()),
            signature_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            expiry_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            max_amount_per_transaction: amount("1"),
            max_amount_per_month: amount("1"),
            max_transactions_per_month: Some(1),
            currency: Some("a".into()),
            description: Some("a".into()),
            scheme_type: Some("a".into()),
        };
        table_covers(&full);
        assert_eq!(diff_attributes(&empty, &full).len(), FIELDS.len());
        assert!(diff_attributes(&full, &full).is_empty());
    }

    #[test]
    fn test_apply_changes_keeps_system_fields() {
        let mut existing = stored();
        existing.version = Some(4);
        let mut c = candidate();
        c.attributes.status = Some("CANCELLED".to_string());

        let merged = apply_changes(&existing, c);
        assert_eq!(merged.mandate_id, existing.mandate_id);
        assert_eq!(merged.created_at, existing.created_at);
        assert_eq!(merged.version, Some(4));
        assert_eq!(merged.last_update_date, ts("2024-01-16 08:00:00"));
        assert_eq!(merged.attributes.status.as_deref(), Some("CANCELLED"));
    }
}
