//! Value types shared by the claim merge engine and its front ends.

use chrono::NaiveDate;
use std::str::FromStr;

/// Errors that can occur when interpreting claim-type tags.
#[derive(Debug, thiserror::Error)]
pub enum ClaimTypeError {
    /// The tag was empty or contained only whitespace
    #[error("claim type cannot be empty")]
    Empty,
    /// The tag is not one of the known claim categories
    #[error("unknown claim type: {0}")]
    Unknown(String),
}

/// Claim category a parser is configured for.
///
/// The tag is stamped on every merged claim as `claimType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimType {
    Inpatient,
    Outpatient,
    Carrier,
    Pde,
}

impl ClaimType {
    /// Every category, in declaration order.
    pub const ALL: [ClaimType; 4] = [
        ClaimType::Inpatient,
        ClaimType::Outpatient,
        ClaimType::Carrier,
        ClaimType::Pde,
    ];

    /// Returns the lowercase tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Inpatient => "inpatient",
            ClaimType::Outpatient => "outpatient",
            ClaimType::Carrier => "carrier",
            ClaimType::Pde => "pde",
        }
    }
}

impl FromStr for ClaimType {
    type Err = ClaimTypeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ClaimTypeError::Empty);
        }
        ClaimType::ALL
            .into_iter()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ClaimTypeError::Unknown(trimmed.to_owned()))
    }
}

impl std::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for ClaimType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for ClaimType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single field value carried by a claim line.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    /// Renders the scalar as a grouping key.
    ///
    /// `Null` has no key form and yields `None`.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Number(n) => Some(n.to_string()),
            Scalar::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Value equality: numbers compare numerically, so `100` equals `100.0`.
    pub fn same_value(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Number(a), Scalar::Number(b)) => numbers_equal(a, b),
            _ => self == other,
        }
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Field value: either one scalar or a list of scalars.
///
/// Lists carry additive facts (for example diagnosis codes observed on a line)
/// and are unioned on merge; scalars are resolved by the conflict policy.
/// JSON objects and nested arrays do not deserialize into this type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl FieldValue {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldValue::List(_))
    }

    /// Returns the scalar, or `None` for list values.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    /// Returns `true` for a scalar `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Scalar::Null))
    }

    /// Views the value as a list; a scalar becomes a one-element list.
    pub fn into_list(self) -> Vec<Scalar> {
        match self {
            FieldValue::List(items) => items,
            FieldValue::Scalar(s) => vec![s],
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Scalar(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Scalar(value.into())
    }
}

/// Total ordering key for `startDate` values.
///
/// Values parsing as `YYYY-MM-DD`, `YYYYMMDD` or an ISO datetime such as
/// `YYYY-MM-DDTHH:MM:SS` order by calendar date and come
/// before anything unparseable, which orders by its raw text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum StartDateKey {
    Date(NaiveDate),
    Raw(String),
}

impl StartDateKey {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .or_else(|| parse_compact_date(trimmed))
            .or_else(|| parse_datetime_date(trimmed))
            .map(StartDateKey::Date)
            .unwrap_or_else(|| StartDateKey::Raw(raw.to_owned()))
    }

    /// Builds the key from a field value; lists use their first element.
    pub fn from_value(value: Option<&FieldValue>) -> Self {
        let scalar = match value {
            Some(FieldValue::Scalar(s)) => Some(s),
            Some(FieldValue::List(items)) => items.first(),
            None => None,
        };
        match scalar.and_then(Scalar::key_text) {
            Some(text) => StartDateKey::parse(&text),
            None => StartDateKey::Raw(String::new()),
        }
    }
}

// YYYYMMDD, as written by CMS extracts.
fn parse_compact_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 8 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = text[0..4].parse().ok()?;
    let month = text[4..6].parse().ok()?;
    let day = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

// Date part of `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD HH:MM:SS`.
fn parse_datetime_date(text: &str) -> Option<NaiveDate> {
    let (date, _time) = text.split_once(['T', ' '])?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_type_parses_known_tags() {
        assert_eq!("inpatient".parse::<ClaimType>().unwrap(), ClaimType::Inpatient);
        assert_eq!(" PDE ".parse::<ClaimType>().unwrap(), ClaimType::Pde);
        assert!(matches!(
            "dental".parse::<ClaimType>(),
            Err(ClaimTypeError::Unknown(tag)) if tag == "dental"
        ));
        assert!(matches!("  ".parse::<ClaimType>(), Err(ClaimTypeError::Empty)));
    }

    #[test]
    fn claim_type_serialises_as_tag() {
        let json = serde_json::to_string(&ClaimType::Carrier).unwrap();
        assert_eq!(json, "\"carrier\"");
        let back: ClaimType = serde_json::from_str("\"outpatient\"").unwrap();
        assert_eq!(back, ClaimType::Outpatient);
    }

    #[test]
    fn field_value_distinguishes_lists_and_scalars() {
        let list: FieldValue = serde_json::from_str(r#"["A", 2, true]"#).unwrap();
        assert_eq!(
            list,
            FieldValue::List(vec![Scalar::from("A"), Scalar::from(2i64), Scalar::from(true)])
        );

        let scalar: FieldValue = serde_json::from_str("100").unwrap();
        assert_eq!(scalar, FieldValue::from(100i64));

        let null: FieldValue = serde_json::from_str("null").unwrap();
        assert!(null.is_null());
    }

    #[test]
    fn field_value_rejects_objects_and_nested_lists() {
        assert!(serde_json::from_str::<FieldValue>(r#"{"a": 1}"#).is_err());
        assert!(serde_json::from_str::<FieldValue>(r#"[[1, 2]]"#).is_err());
    }

    #[test]
    fn start_date_key_orders_dates_before_raw_text() {
        let mut keys = vec![
            StartDateKey::parse("unknown"),
            StartDateKey::parse("2020-03-01"),
            StartDateKey::parse("20200101"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                StartDateKey::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
                StartDateKey::Date(NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()),
                StartDateKey::Raw("unknown".into()),
            ]
        );
    }

    #[test]
    fn start_date_key_reads_numeric_dates() {
        let value = FieldValue::from(20210615i64);
        assert_eq!(
            StartDateKey::from_value(Some(&value)),
            StartDateKey::Date(NaiveDate::from_ymd_opt(2021, 6, 15).unwrap())
        );
    }

    #[test]
    fn start_date_key_keeps_datetimes_in_calendar_order() {
        let mut keys = vec![
            StartDateKey::parse("2021-01-01"),
            StartDateKey::parse("2020-06-01T10:00:00"),
            StartDateKey::parse("2020-01-01"),
            StartDateKey::parse("2020-09-01 08:30:00"),
        ];
        keys.sort();

        let date = |y, m, d| StartDateKey::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap());
        assert_eq!(
            keys,
            vec![date(2020, 1, 1), date(2020, 6, 1), date(2020, 9, 1), date(2021, 1, 1)]
        );
        assert_eq!(StartDateKey::parse("soon T later"), StartDateKey::Raw("soon T later".into()));
    }

    #[test]
    fn numbers_compare_by_value() {
        let int: Scalar = serde_json::from_str("100").unwrap();
        let float: Scalar = serde_json::from_str("100.0").unwrap();
        let other: Scalar = serde_json::from_str("100.5").unwrap();

        assert!(int.same_value(&float));
        assert!(!int.same_value(&other));
        assert!(Scalar::from("100").same_value(&Scalar::from("100")));
        assert!(!Scalar::from("100").same_value(&int));
    }
}
