//! Per-subject ordering of merged claims.

use crate::record::MergedClaim;

/// Orders one subject's merged claims by `startDate`.
///
/// The sort is stable, so claims with equal start dates keep the order in
/// which the merger emitted them.
pub fn order_by_start_date(claims: &mut [MergedClaim]) {
    claims.sort_by_key(MergedClaim::start_date_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{ClaimMerger, MergeStats, ScalarConflictPolicy};
    use claims_types::{ClaimType, FieldValue};
    use serde_json::json;

    fn claim(start: &str, id: &str) -> MergedClaim {
        let merger = ClaimMerger::new(ClaimType::Inpatient, ScalarConflictPolicy::LastWriteWins);
        let line = serde_json::from_value(json!({"startDate": start, "claimID": id})).unwrap();
        merger.merge(id, [line], &mut MergeStats::default())
    }

    fn ids(claims: &[MergedClaim]) -> Vec<FieldValue> {
        claims.iter().map(|c| c.get("claimID").cloned().unwrap()).collect()
    }

    #[test]
    fn orders_by_start_date() {
        let mut claims = vec![claim("2020-03-01", "c1"), claim("2020-01-01", "c2")];

        order_by_start_date(&mut claims);

        assert_eq!(ids(&claims), vec![FieldValue::from("c2"), FieldValue::from("c1")]);
    }

    #[test]
    fn equal_start_dates_keep_emission_order() {
        let mut claims = vec![
            claim("2020-02-01", "late"),
            claim("2020-01-01", "x"),
            claim("2020-01-01", "y"),
            claim("2020-01-01", "z"),
        ];

        order_by_start_date(&mut claims);

        assert_eq!(
            ids(&claims),
            vec![
                FieldValue::from("x"),
                FieldValue::from("y"),
                FieldValue::from("z"),
                FieldValue::from("late"),
            ]
        );
    }

    #[test]
    fn mixed_date_formats_order_by_calendar_date() {
        let mut claims = vec![claim("2020-03-01", "dashed"), claim("20200115", "compact")];

        order_by_start_date(&mut claims);

        assert_eq!(
            ids(&claims),
            vec![FieldValue::from("compact"), FieldValue::from("dashed")]
        );
    }
}
