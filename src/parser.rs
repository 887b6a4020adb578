//! Record parser: decodes one delimited line into a [`MandateRecord`].
//!
//! Decoding is positional. [`validate_header`] guards the positional layout
//! before any record is decoded, because a reordered file would otherwise
//! parse cleanly into the wrong fields.

use crate::decimal::Amount;
use crate::error::{EngineError, ParseError};
use crate::mandate::{MandateAttributes, MandateRecord};
use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Default field delimiter of mandate extracts.
pub const DEFAULT_DELIMITER: u8 = b'|';

/// Date-only format.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date-time format of `lastUpdateDate`.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// chrono accepts unpadded fields, the source format is zero-padded.
const DATE_LEN: usize = 10;
const DATE_TIME_LEN: usize = 19;

/// Column names in positional order.
pub const COLUMNS: [&str; 28] = [
    "mandateId",
    "lastUpdateDate",
    "creditorId",
    "creditorName",
    "creditorAccountNumber",
    "creditorSortCode",
    "creditorIban",
    "creditorBic",
    "debtorName",
    "debtorAccountNumber",
    "debtorSortCode",
    "debtorIban",
    "debtorBic",
    "debtorEmail",
    "debtorPhone",
    "mandateReference",
    "mandateType",
    "frequency",
    "status",
    "signatureDate",
    "effectiveDate",
    "expiryDate",
    "maxAmountPerTransaction",
    "maxAmountPerMonth",
    "maxTransactionsPerMonth",
    "currency",
    "description",
    "schemeType",
];

/// Number of fields every line must carry.
pub const FIELD_COUNT: usize = COLUMNS.len();

/// Checks that a header line describes the layout [`parse_fields`] decodes.
///
/// The column count must always match. Names are compared case-insensitively
/// when `check_names` is set.
pub fn validate_header<S: AsRef<str>>(header: &[S], check_names: bool) -> Result<(), EngineError> {
    if header.len() != FIELD_COUNT {
        return Err(EngineError::HeaderMismatch(format!(
            "expected {} columns, found {}",
            FIELD_COUNT,
            header.len()
        )));
    }

    if check_names {
        for (idx, (found, expected)) in header.iter().zip(COLUMNS.iter()).enumerate() {
            let found = found.as_ref().trim();
            if !found.eq_ignore_ascii_case(expected) {
                return Err(EngineError::HeaderMismatch(format!(
                    "column {} is {:?}, expected {:?}",
                    idx + 1,
                    found,
                    expected
                )));
            }
        }
    }

    Ok(())
}

/// Splits one raw line on `delimiter` and decodes it.
///
/// Trailing empty fields are kept, so `a|b|` has three fields.
pub fn parse_line(text: &str, delimiter: char, line: u64) -> Result<MandateRecord, ParseError> {
    let fields: Vec<&str> = text.split(delimiter).collect();
    parse_fields(&fields, line)
}

/// Decodes an already-split line.
pub fn parse_fields<S: AsRef<str>>(values: &[S], line: u64) -> Result<MandateRecord, ParseError> {
    if values.len() != FIELD_COUNT {
        return Err(ParseError::FieldCountMismatch {
            line,
            expected: FIELD_COUNT,
            found: values.len(),
        });
    }

    let f = Fields { values, line };

    let mandate_id = f.required(0)?.to_string();
    let last_update_date = f
        .date_time(1)?
        .ok_or(ParseError::MissingRequiredField {
            line,
            field: COLUMNS[1],
        })?;

    let attributes = MandateAttributes {
        creditor_id: f.text(2),
        creditor_name: f.text(3),
        creditor_account_number: f.text(4),
        creditor_sort_code: f.text(5),
        creditor_iban: f.text(6),
        creditor_bic: f.text(7),
        debtor_name: f.text(8),
        debtor_account_number: f.text(9),
        debtor_sort_code: f.text(10),
        debtor_iban: f.text(11),
        debtor_bic: f.text(12),
        debtor_email: f.text(13),
        debtor_phone: f.text(14),
        mandate_reference: f.text(15),
        mandate_type: f.text(16),
        frequency: f.text(17),
        status: f.text(18),
        signature_date: f.date(19)?,
        effective_date: f.date(20)?,
        expiry_date: f.date(21)?,
        max_amount_per_transaction: f.amount(22)?,
        max_amount_per_month: f.amount(23)?,
        max_transactions_per_month: f.integer(24)?,
        currency: f.text(25),
        description: f.text(26),
        scheme_type: f.text(27),
    };

    Ok(MandateRecord {
        mandate_id,
        last_update_date,
        attributes,
    })
}

/// Positional view over one line's fields.
struct Fields<'a, S> {
    values: &'a [S],
    line: u64,
}

impl<'a, S: AsRef<str>> Fields<'a, S> {
    /// Trimmed value, `None` when empty.
    fn raw(&self, idx: usize) -> Option<&'a str> {
        let values: &'a [S] = self.values;
        let value = values[idx].as_ref().trim();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    fn text(&self, idx: usize) -> Option<String> {
        self.raw(idx).map(str::to_string)
    }

    fn required(&self, idx: usize) -> Result<&'a str, ParseError> {
        self.raw(idx).ok_or(ParseError::MissingRequiredField {
            line: self.line,
            field: COLUMNS[idx],
        })
    }

    fn malformed(&self, idx: usize, value: &str, reason: impl ToString) -> ParseError {
        ParseError::MalformedField {
            line: self.line,
            field: COLUMNS[idx],
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn date(&self, idx: usize) -> Result<Option<NaiveDate>, ParseError> {
        self.raw(idx)
            .map(|v| {
                if v.len() != DATE_LEN {
                    return Err(self.malformed(idx, v, "expected YYYY-MM-DD"));
                }
                NaiveDate::parse_from_str(v, DATE_FORMAT).map_err(|e| self.malformed(idx, v, e))
            })
            .transpose()
    }

    fn date_time(&self, idx: usize) -> Result<Option<NaiveDateTime>, ParseError> {
        self.raw(idx)
            .map(|v| {
                if v.len() != DATE_TIME_LEN {
                    return Err(self.malformed(idx, v, "expected YYYY-MM-DD HH:MM:SS"));
                }
                NaiveDateTime::parse_from_str(v, DATE_TIME_FORMAT)
                    .map_err(|e| self.malformed(idx, v, e))
            })
            .transpose()
    }

    fn amount(&self, idx: usize) -> Result<Option<Amount>, ParseError> {
        self.raw(idx)
            .map(|v| Amount::from_str(v).map_err(|e| self.malformed(idx, v, e)))
            .transpose()
    }

    fn integer(&self, idx: usize) -> Result<Option<i32>, ParseError> {
        self.raw(idx)
            .map(|v| v.parse::<i32>().map_err(|e| self.malformed(idx, v, e)))
            .transpose()
    }
}
