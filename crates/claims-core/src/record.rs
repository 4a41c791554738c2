//! Claim-line and merged-claim records.
//!
//! Raw records arrive from a [`RecordSource`](crate::source::RecordSource) as
//! untyped JSON objects. Once a record passes the completeness filter it is
//! converted into a [`ClaimLine`], whose fields use the closed
//! [`FieldValue`] union so the merger can dispatch on list vs scalar.

use crate::constants::{
    CLAIM_ID_FIELD, CLAIM_TYPE_FIELD, FILL_ID_FIELD, MISSING_CLAIM_ID, START_DATE_FIELD,
    SUBJECT_ID_FIELD,
};
use claims_types::{FieldValue, StartDateKey};
use serde_json::Value;
use std::collections::BTreeMap;

/// An untyped claim-line record as produced by a record source.
pub type RawRecord = serde_json::Map<String, Value>;

/// Renders a JSON value as a subject or claim key.
///
/// Strings are used as-is and numbers/booleans by their JSON text; `null`,
/// arrays and objects have no key form.
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// One claim line with its subject identifier removed.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ClaimLine {
    fields: BTreeMap<String, FieldValue>,
}

impl ClaimLine {
    /// Splits a raw record into its subject identifier and typed body.
    ///
    /// Returns `Ok(None)` when the record has no usable subject identifier and
    /// an error when a field value is not a scalar or a list of scalars.
    pub fn from_raw(mut raw: RawRecord) -> Result<Option<(String, ClaimLine)>, serde_json::Error> {
        let Some(subject_id) = raw.remove(SUBJECT_ID_FIELD).as_ref().and_then(key_text) else {
            return Ok(None);
        };
        let fields = serde_json::from_value(Value::Object(raw))?;
        Ok(Some((subject_id, ClaimLine { fields })))
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> BTreeMap<String, FieldValue> {
        self.fields
    }

    /// Key of the claim this line belongs to.
    ///
    /// `claimID` wins unless it is absent, `null` or the `"NA"` sentinel, in
    /// which case `fillID` is used. A line with neither falls back to `"NA"`.
    pub fn claim_group_key(&self) -> String {
        let key_of = |field: &str| {
            self.fields
                .get(field)
                .and_then(FieldValue::as_scalar)
                .and_then(|s| s.key_text())
        };

        key_of(CLAIM_ID_FIELD)
            .filter(|id| id != MISSING_CLAIM_ID)
            .or_else(|| key_of(FILL_ID_FIELD))
            .unwrap_or_else(|| MISSING_CLAIM_ID.to_string())
    }
}

impl FromIterator<(String, FieldValue)> for ClaimLine {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        ClaimLine {
            fields: iter.into_iter().collect(),
        }
    }
}

/// The consolidated record for one claim-group key.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MergedClaim {
    fields: BTreeMap<String, FieldValue>,
}

impl MergedClaim {
    pub(crate) fn from_fields(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// The claim-type tag stamped after merging.
    pub fn claim_type(&self) -> Option<String> {
        self.fields
            .get(CLAIM_TYPE_FIELD)
            .and_then(FieldValue::as_scalar)
            .and_then(|s| s.key_text())
    }

    pub fn start_date_key(&self) -> StartDateKey {
        StartDateKey::from_value(self.fields.get(START_DATE_FIELD))
    }
}
