//! Completeness filter for raw claim lines.
//!
//! A record takes part in merging only when it names a subject, a start date
//! and a claim (`claimID` or `fillID`). Records failing the check are dropped
//! by the spill writer; this is data-quality policy, not an error.

use crate::constants::{
    CLAIM_ID_FIELD, FILL_ID_FIELD, START_DATE_FIELD, STAGING_SEPARATOR, SUBJECT_ID_FIELD,
};
use crate::record::{key_text, RawRecord};

fn has_field(record: &RawRecord, field: &str) -> bool {
    record.get(field).is_some_and(|value| !value.is_null())
}

/// Returns `true` when `record` carries enough identity to be merged.
///
/// `null` values count as missing. A subject identifier that cannot be written
/// as a staging key (non-scalar, or containing `|` or a line break) also fails.
pub fn is_complete(record: &RawRecord) -> bool {
    let subject_ok = record
        .get(SUBJECT_ID_FIELD)
        .and_then(key_text)
        .is_some_and(|id| !id.contains([STAGING_SEPARATOR, '\n', '\r']));

    subject_ok
        && has_field(record, START_DATE_FIELD)
        && (has_field(record, CLAIM_ID_FIELD) || has_field(record, FILL_ID_FIELD))
}
