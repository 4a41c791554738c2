//! Grouping reducer over the sorted staging file.
//!
//! The reducer makes one forward pass. [`GroupFold`] holds the current subject
//! and its fragments; when the subject changes the finished group is handed
//! back, split by claim-group key, merged and ordered. Memory is bounded by the
//! largest subject's fragment list, not by the input size.

use crate::assemble::order_by_start_date;
use crate::merge::{ClaimMerger, MergeStats};
use crate::record::{ClaimLine, MergedClaim};
use crate::staging::split_staging_line;
use crate::{ClaimsError, ClaimsResult};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

/// Merged claims per subject identifier, each list ordered by start date.
pub type MergedClaims = BTreeMap<String, Vec<MergedClaim>>;

/// Fold state of the reducer: the subject being accumulated and its lines.
#[derive(Debug, Default)]
pub struct GroupFold {
    current: Option<String>,
    fragments: Vec<ClaimLine>,
}

impl GroupFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one staging line.
    ///
    /// Returns the previous subject's fragments when `subject_id` starts a new run.
    pub fn push(&mut self, subject_id: String, line: ClaimLine) -> Option<(String, Vec<ClaimLine>)> {
        if self.current.as_deref() == Some(subject_id.as_str()) {
            self.fragments.push(line);
            return None;
        }

        let previous = self.current.replace(subject_id);
        let fragments = std::mem::replace(&mut self.fragments, vec![line]);
        previous.map(|subject| (subject, fragments))
    }

    /// Returns whatever is still accumulated at end of stream.
    pub fn finish(self) -> Option<(String, Vec<ClaimLine>)> {
        self.current.map(|subject| (subject, self.fragments))
    }
}

/// Partitions one subject's fragments by claim-group key, keeping first-seen key order.
pub fn group_by_claim(fragments: Vec<ClaimLine>) -> Vec<(String, Vec<ClaimLine>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<ClaimLine>)> = Vec::new();

    for fragment in fragments {
        let key = fragment.claim_group_key();
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(fragment),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![fragment]));
            }
        }
    }

    groups
}

/// Counters collected while reducing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub lines_read: usize,
    pub unreadable_lines: usize,
    pub split_subjects: usize,
    pub merge: MergeStats,
}

/// Streams sorted staging lines into merged claims per subject.
#[derive(Debug, Clone, Copy)]
pub struct GroupingReducer {
    merger: ClaimMerger,
}

impl GroupingReducer {
    pub fn new(merger: ClaimMerger) -> Self {
        Self { merger }
    }

    /// Reduces already-parsed `(subject, line)` pairs.
    pub fn reduce_lines(
        &self,
        lines: impl IntoIterator<Item = (String, ClaimLine)>,
        stats: &mut ReduceStats,
    ) -> MergedClaims {
        let mut out = MergedClaims::new();
        let mut fold = GroupFold::new();

        for (subject_id, line) in lines {
            stats.lines_read += 1;
            if let Some((subject, fragments)) = fold.push(subject_id, line) {
                self.dump(subject, fragments, &mut out, stats);
            }
        }
        if let Some((subject, fragments)) = fold.finish() {
            self.dump(subject, fragments, &mut out, stats);
        }

        out
    }

    /// Reduces a sorted staging file.
    ///
    /// Lines without a separator or with an unparseable payload are logged and
    /// skipped; read errors abort the run.
    pub fn reduce_reader<R: BufRead>(
        &self,
        reader: R,
        stats: &mut ReduceStats,
    ) -> ClaimsResult<MergedClaims> {
        let mut read_error = None;
        let mut unreadable = 0usize;

        let parsed = reader
            .lines()
            .enumerate()
            .map_while(|(idx, line)| match line {
                Ok(line) => Some((idx + 1, line)),
                Err(error) => {
                    read_error = Some(error);
                    None
                }
            })
            .filter_map(|(line_no, line)| {
                if line.trim().is_empty() {
                    return None;
                }
                let Some((subject, payload)) = split_staging_line(&line) else {
                    tracing::warn!(line = line_no, "skipping staging line without separator");
                    unreadable += 1;
                    return None;
                };
                match serde_json::from_str::<ClaimLine>(payload) {
                    Ok(claim_line) => Some((subject.to_string(), claim_line)),
                    Err(error) => {
                        tracing::warn!(line = line_no, %error, "skipping unparseable staging line");
                        unreadable += 1;
                        None
                    }
                }
            });

        let claims = self.reduce_lines(parsed, stats);
        stats.unreadable_lines += unreadable;

        match read_error {
            Some(error) => Err(ClaimsError::StagingRead(error)),
            None => Ok(claims),
        }
    }

    fn dump(
        &self,
        subject: String,
        fragments: Vec<ClaimLine>,
        out: &mut MergedClaims,
        stats: &mut ReduceStats,
    ) {
        let mut claims: Vec<MergedClaim> = group_by_claim(fragments)
            .into_iter()
            .map(|(claim_id, group)| self.merger.merge(&claim_id, group, &mut stats.merge))
            .collect();

        if let Some(existing) = out.get_mut(&subject) {
            stats.split_subjects += 1;
            tracing::warn!(
                subject_id = %subject,
                "subject appears in more than one run; staging input was not sorted"
            );
            existing.append(&mut claims);
            order_by_start_date(existing);
            return;
        }

        order_by_start_date(&mut claims);
        out.insert(subject, claims);
    }
}
