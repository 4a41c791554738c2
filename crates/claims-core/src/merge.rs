//! Field-level conflict resolution for fragments of one claim.
//!
//! Fragments are folded left to right. List values are additive facts and are
//! unioned; scalar values are a single evolving truth resolved by the configured
//! [`ScalarConflictPolicy`]. Every scalar disagreement is reported as an `info`
//! event carrying the claim id, field, old and new value.

use crate::constants::{CLAIM_LINE_FIELD, CLAIM_TYPE_FIELD};
use crate::record::{ClaimLine, MergedClaim};
use crate::ClaimsError;
use claims_types::{ClaimType, FieldValue, Scalar};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::str::FromStr;

/// How a scalar field is resolved when a later fragment disagrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScalarConflictPolicy {
    /// The latest fragment is the most authoritative.
    #[default]
    LastWriteWins,
    /// The first value seen is kept.
    FirstWriteWins,
}

impl FromStr for ScalarConflictPolicy {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "last" => Ok(ScalarConflictPolicy::LastWriteWins),
            "first-write-wins" | "first" => Ok(ScalarConflictPolicy::FirstWriteWins),
            other => Err(ClaimsError::InvalidConfig(format!(
                "unknown scalar conflict policy: {other} (expected last-write-wins or first-write-wins)"
            ))),
        }
    }
}

/// Counters accumulated across merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub claims_merged: usize,
    pub scalar_conflicts: usize,
}

/// Merges claim-line fragments that share a claim-group key.
#[derive(Debug, Clone, Copy)]
pub struct ClaimMerger {
    claim_type: ClaimType,
    policy: ScalarConflictPolicy,
}

fn render(value: &FieldValue) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

// Set union in first-seen order; duplicates already in `existing` collapse too.
fn union(existing: Vec<Scalar>, incoming: Vec<Scalar>) -> Vec<Scalar> {
    let mut merged: Vec<Scalar> = Vec::with_capacity(existing.len() + incoming.len());
    for item in existing.into_iter().chain(incoming) {
        if !merged.iter().any(|seen| seen.same_value(&item)) {
            merged.push(item);
        }
    }
    merged
}

impl ClaimMerger {
    pub fn new(claim_type: ClaimType, policy: ScalarConflictPolicy) -> Self {
        Self { claim_type, policy }
    }

    pub fn claim_type(&self) -> ClaimType {
        self.claim_type
    }

    /// Folds `fragments` into one merged claim stamped with the claim type.
    ///
    /// `claim_id` is only used to label conflict events.
    pub fn merge(
        &self,
        claim_id: &str,
        fragments: impl IntoIterator<Item = ClaimLine>,
        stats: &mut MergeStats,
    ) -> MergedClaim {
        let mut merged: BTreeMap<String, FieldValue> = BTreeMap::new();

        for mut fragment in fragments {
            fragment.remove(CLAIM_LINE_FIELD);

            for (field, incoming) in fragment.into_fields() {
                let mut slot = match merged.entry(field) {
                    Entry::Vacant(slot) => {
                        slot.insert(incoming);
                        continue;
                    }
                    Entry::Occupied(slot) => slot,
                };

                match incoming {
                    FieldValue::List(items) => {
                        let existing = std::mem::replace(slot.get_mut(), FieldValue::List(Vec::new()));
                        *slot.get_mut() = FieldValue::List(union(existing.into_list(), items));
                    }
                    FieldValue::Scalar(value) if slot.get().is_list() => {
                        let existing = std::mem::replace(slot.get_mut(), FieldValue::List(Vec::new()));
                        *slot.get_mut() = FieldValue::List(union(existing.into_list(), vec![value]));
                    }
                    FieldValue::Scalar(value) => {
                        if slot.get().as_scalar().is_some_and(|old| old.same_value(&value)) {
                            continue;
                        }
                        let value = FieldValue::Scalar(value);
                        stats.scalar_conflicts += 1;
                        tracing::info!(
                            claim_id,
                            field = slot.key().as_str(),
                            old = %render(slot.get()),
                            new = %render(&value),
                            policy = ?self.policy,
                            "updating claim field"
                        );
                        if self.policy == ScalarConflictPolicy::LastWriteWins {
                            slot.insert(value);
                        }
                    }
                }
            }
        }

        merged.insert(
            CLAIM_TYPE_FIELD.to_string(),
            FieldValue::from(self.claim_type.as_str()),
        );
        stats.claims_merged += 1;
        MergedClaim::from_fields(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn line(value: Value) -> ClaimLine {
        serde_json::from_value(value).unwrap()
    }

    fn merge_with(policy: ScalarConflictPolicy, fragments: Vec<Value>) -> (MergedClaim, MergeStats) {
        let merger = ClaimMerger::new(ClaimType::Carrier, policy);
        let mut stats = MergeStats::default();
        let merged = merger.merge("c1", fragments.into_iter().map(line), &mut stats);
        (merged, stats)
    }

    fn merge(fragments: Vec<Value>) -> MergedClaim {
        merge_with(ScalarConflictPolicy::LastWriteWins, fragments).0
    }

    fn sorted_list(claim: &MergedClaim, field: &str) -> Vec<String> {
        let Some(FieldValue::List(items)) = claim.get(field) else {
            panic!("{field} is not a list");
        };
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        items.sort();
        items
    }

    #[test]
    fn disjoint_fields_merge_in_either_order() {
        let a = json!({"claimID": "c1", "status": "A"});
        let b = json!({"claimID": "c1", "amount": 10});

        assert_eq!(merge(vec![a.clone(), b.clone()]), merge(vec![b, a]));
    }

    #[test]
    fn list_union_is_commutative_and_deduplicating() {
        let a = json!({"codes": [1, 2]});
        let b = json!({"codes": [2, 3]});

        let forward = merge(vec![a.clone(), b.clone()]);
        let backward = merge(vec![b, a]);

        assert_eq!(sorted_list(&forward, "codes"), vec!["1", "2", "3"]);
        assert_eq!(sorted_list(&backward, "codes"), vec!["1", "2", "3"]);
    }

    #[test]
    fn union_collapses_duplicates_within_one_list() {
        let merged = merge(vec![json!({"dx": ["A", "A"]}), json!({"dx": ["A"]})]);

        assert_eq!(merged.get("dx"), Some(&FieldValue::List(vec![Scalar::from("A")])));
    }

    #[test]
    fn scalar_overwrite_is_last_write_wins() {
        let (merged, stats) = merge_with(
            ScalarConflictPolicy::LastWriteWins,
            vec![json!({"status": "A"}), json!({"status": "B"})],
        );

        assert_eq!(merged.get("status"), Some(&FieldValue::from("B")));
        assert_eq!(stats.scalar_conflicts, 1);
    }

    #[test]
    fn first_write_wins_keeps_original_scalar() {
        let (merged, stats) = merge_with(
            ScalarConflictPolicy::FirstWriteWins,
            vec![json!({"status": "A"}), json!({"status": "B"})],
        );

        assert_eq!(merged.get("status"), Some(&FieldValue::from("A")));
        assert_eq!(stats.scalar_conflicts, 1);
    }

    #[test]
    fn equal_scalars_are_not_conflicts() {
        let (_, stats) = merge_with(
            ScalarConflictPolicy::LastWriteWins,
            vec![json!({"status": "A"}), json!({"status": "A"})],
        );

        assert_eq!(stats.scalar_conflicts, 0);
        assert_eq!(stats.claims_merged, 1);
    }

    #[test]
    fn scalar_followed_by_list_is_unioned() {
        let merged = merge(vec![json!({"dx": "A"}), json!({"dx": ["B", "A"]})]);

        assert_eq!(
            merged.get("dx"),
            Some(&FieldValue::List(vec![Scalar::from("A"), Scalar::from("B")]))
        );
    }

    #[test]
    fn list_followed_by_scalar_is_unioned() {
        let (merged, stats) = merge_with(
            ScalarConflictPolicy::LastWriteWins,
            vec![json!({"dx": ["A", "B"]}), json!({"dx": "C"}), json!({"dx": "A"})],
        );

        assert_eq!(
            merged.get("dx"),
            Some(&FieldValue::List(vec![
                Scalar::from("A"),
                Scalar::from("B"),
                Scalar::from("C")
            ]))
        );
        assert_eq!(stats.scalar_conflicts, 0);
    }

    #[test]
    fn numerically_equal_scalars_are_not_conflicts() {
        let (merged, stats) = merge_with(
            ScalarConflictPolicy::LastWriteWins,
            vec![json!({"amount": 100}), json!({"amount": 100.0})],
        );

        assert_eq!(merged.get("amount"), Some(&FieldValue::from(100i64)));
        assert_eq!(stats.scalar_conflicts, 0);
    }

    #[test]
    fn claim_line_is_stripped_and_claim_type_stamped() {
        let merged = merge(vec![
            json!({"claimID": "c1", "claimLine": 1, "claimType": "bogus"}),
            json!({"claimID": "c1", "claimLine": 2}),
        ]);

        assert!(merged.get(CLAIM_LINE_FIELD).is_none());
        assert_eq!(merged.claim_type().as_deref(), Some("carrier"));
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!(
            "LAST".parse::<ScalarConflictPolicy>().unwrap(),
            ScalarConflictPolicy::LastWriteWins
        );
        assert_eq!(
            "first-write-wins".parse::<ScalarConflictPolicy>().unwrap(),
            ScalarConflictPolicy::FirstWriteWins
        );
        assert!("newest".parse::<ScalarConflictPolicy>().is_err());
    }
}
