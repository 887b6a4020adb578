//! Mandate models: the parsed file record, its persisted counterpart, and the
//! party entities derived from it.

use crate::decimal::Amount;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every derived debtor identity key.
pub const DEBTOR_ID_PREFIX: &str = "DBT-";

/// Attribute fields shared by file records and stored mandates.
///
/// Every field is optional: an empty column in the source file is "absent",
/// which is distinct from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandateAttributes {
    // Creditor information
    pub creditor_id: Option<String>,
    pub creditor_name: Option<String>,
    pub creditor_account_number: Option<String>,
    pub creditor_sort_code: Option<String>,
    pub creditor_iban: Option<String>,
    pub creditor_bic: Option<String>,

    // Debtor information
    pub debtor_name: Option<String>,
    pub debtor_account_number: Option<String>,
    pub debtor_sort_code: Option<String>,
    pub debtor_iban: Option<String>,
    pub debtor_bic: Option<String>,
    pub debtor_email: Option<String>,
    pub debtor_phone: Option<String>,

    // Mandate terms
    pub mandate_reference: Option<String>,
    /// RECURRING, ONE_OFF
    pub mandate_type: Option<String>,
    /// WEEKLY, FORTNIGHTLY, MONTHLY, QUARTERLY, ANNUALLY
    pub frequency: Option<String>,
    /// ACTIVE, SUSPENDED, CANCELLED, PENDING
    pub status: Option<String>,
    pub signature_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,

    // Limits
    pub max_amount_per_transaction: Option<Amount>,
    pub max_amount_per_month: Option<Amount>,
    pub max_transactions_per_month: Option<i32>,
    pub currency: Option<String>,

    // Descriptive metadata
    pub description: Option<String>,
    /// BACS, SEPA_CORE, SEPA_B2B
    pub scheme_type: Option<String>,
}

impl MandateAttributes {
    /// Derived debtor identity for these attributes, if both inputs are present.
    pub fn debtor_id(&self) -> Option<String> {
        derive_debtor_id(
            self.debtor_sort_code.as_deref(),
            self.debtor_account_number.as_deref(),
        )
    }
}

/// One successfully parsed line of the source file.
///
/// Lives only for the duration of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandateRecord {
    /// Natural business key, stable across files.
    pub mandate_id: String,

    /// Source-system change marker.
    pub last_update_date: NaiveDateTime,

    #[serde(flatten)]
    pub attributes: MandateAttributes,
}

impl MandateRecord {
    /// Creates a record with no attribute values.
    pub fn new(mandate_id: impl Into<String>, last_update_date: NaiveDateTime) -> Self {
        MandateRecord {
            mandate_id: mandate_id.into(),
            last_update_date,
            attributes: MandateAttributes::default(),
        }
    }

    /// Creates the first stored version of this mandate.
    pub fn into_stored(self, now: DateTime<Utc>) -> StoredMandate {
        StoredMandate {
            mandate_id: self.mandate_id,
            last_update_date: self.last_update_date,
            attributes: self.attributes,
            created_at: now,
            version: Some(1),
        }
    }

    /// Builds the creditor party entity, keyed by the raw `creditorId`.
    pub fn to_creditor(&self, now: DateTime<Utc>) -> Option<Creditor> {
        let a = &self.attributes;
        let creditor_id = a.creditor_id.clone()?;
        Some(Creditor {
            creditor_id,
            creditor_name: a.creditor_name.clone(),
            account_number: a.creditor_account_number.clone(),
            sort_code: a.creditor_sort_code.clone(),
            iban: a.creditor_iban.clone(),
            bic: a.creditor_bic.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Builds the debtor party entity, keyed by the derived debtor identity.
    pub fn to_debtor(&self, now: DateTime<Utc>) -> Option<Debtor> {
        let a = &self.attributes;
        let debtor_id = a.debtor_id()?;
        Some(Debtor {
            debtor_id,
            name: a.debtor_name.clone(),
            account_number: a.debtor_account_number.clone(),
            sort_code: a.debtor_sort_code.clone(),
            iban: a.debtor_iban.clone(),
            bic: a.debtor_bic.clone(),
            email: a.debtor_email.clone(),
            phone: a.debtor_phone.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// A mandate as persisted in the store.
///
/// `created_at` and `version` are system-owned: the file never supplies them
/// and only the reconciliation engine writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMandate {
    pub mandate_id: String,
    pub last_update_date: NaiveDateTime,

    #[serde(flatten)]
    pub attributes: MandateAttributes,

    /// Set on insert, never overwritten.
    pub created_at: DateTime<Utc>,

    /// Optimistic concurrency marker. Absent on rows written by older loaders.
    #[serde(default)]
    pub version: Option<u32>,
}

impl StoredMandate {
    /// Version the next successful update must carry.
    pub fn next_version(&self) -> u32 {
        self.version.map_or(1, |v| v.saturating_add(1))
    }
}

/// Creditor party entity, materialized the first time a `creditorId` is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creditor {
    pub creditor_id: String,
    pub creditor_name: Option<String>,
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Debtor party entity, materialized the first time a derived debtor id is seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debtor {
    pub debtor_id: String,
    pub name: Option<String>,
    pub account_number: Option<String>,
    pub sort_code: Option<String>,
    pub iban: Option<String>,
    pub bic: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derives a debtor identity key from its sort code and account number.
///
/// Pure: always recomputed from the inputs, never cached. Dashes in the
/// sort code are dropped so `12-34-56` and `123456` map to the same debtor.
///
/// ```
/// use mandate_reconciler::mandate::derive_debtor_id;
///
/// assert_eq!(
///     derive_debtor_id(Some("20-00-00"), Some("55779911")).as_deref(),
///     Some("DBT-200000-55779911")
/// );
/// assert_eq!(derive_debtor_id(None, Some("55779911")), None);
/// ```
pub fn derive_debtor_id(sort_code: Option<&str>, account_number: Option<&str>) -> Option<String> {
    let sort_code = sort_code?.replace('-', "");
    let account_number = account_number?;
    Some(format!("{DEBTOR_ID_PREFIX}{sort_code}-{account_number}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap()
    }

    fn record() -> MandateRecord {
        let mut r = MandateRecord::new("MND-1", ts("2024-01-15 10:30:00"));
        r.attributes.creditor_id = Some("CRED-9".to_string());
        r.attributes.creditor_name = Some("Acme Utilities".to_string());
        r.attributes.debtor_sort_code = Some("12-34-56".to_string());
        r.attributes.debtor_account_number = Some("87654321".to_string());
        r.attributes.debtor_name = Some("Jane Doe".to_string());
        r
    }

    #[test]
    fn test_into_stored_sets_system_fields() {
        let stored = record().into_stored(now());
        assert_eq!(stored.version, Some(1));
        assert_eq!(stored.created_at, now());
        assert_eq!(stored.mandate_id, "MND-1");
    }

    #[test]
    fn test_next_version() {
        let mut stored = record().into_stored(now());
        assert_eq!(stored.next_version(), 2);
        stored.version = None;
        assert_eq!(stored.next_version(), 1);
    }

    #[test]
    fn test_debtor_id_is_derived_from_current_fields() {
        let mut r = record();
        assert_eq!(r.attributes.debtor_id().as_deref(), Some("DBT-123456-87654321"));

        r.attributes.debtor_account_number = Some("11112222".to_string());
        assert_eq!(r.attributes.debtor_id().as_deref(), Some("DBT-123456-11112222"));

        r.attributes.debtor_sort_code = None;
        assert_eq!(r.attributes.debtor_id(), None);
    }

    #[test]
    fn test_party_entities() {
        let r = record();
        let creditor = r.to_creditor(now()).unwrap();
        assert_eq!(creditor.creditor_id, "CRED-9");
        assert_eq!(creditor.creditor_name.as_deref(), Some("Acme Utilities"));

        let debtor = r.to_debtor(now()).unwrap();
        assert_eq!(debtor.debtor_id, "DBT-123456-87654321");
        assert_eq!(debtor.name.as_deref(), Some("Jane Doe"));

        let bare = MandateRecord::new("MND-2", ts("2024-01-15 10:30:00"));
        assert!(bare.to_creditor(now()).is_none());
        assert!(bare.to_debtor(now()).is_none());
    }

    #[test]
    fn test_stored_mandate_json_shape() {
        let stored = record().into_stored(now());
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["mandateId"], "MND-1");
        assert_eq!(json["creditorId"], "CRED-9");
        assert_eq!(json["version"], 1);

        let back: StoredMandate = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}
