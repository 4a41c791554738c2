//! The claim parser: one merge run for a configured claim type.
//!
//! A run is strictly sequential: spill the source into an unsorted staging
//! file, sort it into a second staging file, then reduce the sorted file into
//! merged claims. Each stage finishes and releases its file before the next
//! starts. Both staging files are scoped to the run and removed on every exit
//! path.

use crate::config::CoreConfig;
use crate::constants::{CLAIM_TYPE_FIELD, SORTED_STAGING_PREFIX, UNSORTED_STAGING_PREFIX};
use crate::merge::ClaimMerger;
use crate::reducer::{GroupingReducer, MergedClaims, ReduceStats};
use crate::schema::SchemaLookup;
use crate::sort::ExternalSort;
use crate::source::RecordSource;
use crate::spill::spill_records;
use crate::staging::StagingFile;
use crate::{ClaimsError, ClaimsResult};
use claims_types::ClaimType;
use std::collections::BTreeSet;
use std::time::Instant;
use uuid::Uuid;

/// Summary of one merge run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MergeReport {
    pub run_id: String,
    pub claim_type: ClaimType,
    pub sort_strategy: String,
    pub records_seen: usize,
    pub records_staged: usize,
    pub incomplete_dropped: usize,
    pub unreadable_records: usize,
    pub sources_skipped: usize,
    pub unreadable_staging_lines: usize,
    pub subjects: usize,
    pub merged_claims: usize,
    pub scalar_conflicts: usize,
    pub split_subjects: usize,
    /// Fields seen on merged claims that the claim type's header does not list.
    pub unexpected_fields: BTreeSet<String>,
}

/// Merged claims plus the report of the run that produced them.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub claims: MergedClaims,
    pub report: MergeReport,
}

/// Merges claim lines for one claim type.
#[derive(Debug, Clone)]
pub struct ClaimParser {
    claim_type: ClaimType,
    config: CoreConfig,
    expected_fields: BTreeSet<String>,
}

impl ClaimParser {
    /// Creates a parser for `tag`.
    ///
    /// # Errors
    ///
    /// Returns `ClaimsError::UnknownClaimType` when `schema` does not recognize
    /// the tag. No files are touched before this check.
    pub fn new(tag: &str, schema: &dyn SchemaLookup, config: CoreConfig) -> ClaimsResult<Self> {
        if !schema.is_recognized(tag) {
            tracing::error!(claim_type = tag, "parser type not available");
            return Err(ClaimsError::UnknownClaimType(tag.to_string()));
        }

        let claim_type = tag
            .parse::<ClaimType>()
            .map_err(|_| ClaimsError::UnknownClaimType(tag.to_string()))?;

        let expected_fields = schema
            .expected_fields(tag)
            .unwrap_or_default()
            .iter()
            .cloned()
            .collect();

        Ok(Self {
            claim_type,
            config,
            expected_fields,
        })
    }

    pub fn claim_type(&self) -> ClaimType {
        self.claim_type
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Merges every record `source` yields into claims grouped by subject.
    ///
    /// Unopenable sources, incomplete records and unreadable lines are skipped
    /// and counted in the report. Staging or sort I/O failures abort the run.
    pub fn merge_claim_lines(&self, source: &mut dyn RecordSource) -> ClaimsResult<MergeOutcome> {
        let sorter = self.config.external_sort();
        self.merge_claim_lines_with(source, sorter.as_ref())
    }

    /// Like [`merge_claim_lines`](Self::merge_claim_lines), but sorts the
    /// staging file with `sorter` instead of the configured strategy.
    pub fn merge_claim_lines_with(
        &self,
        source: &mut dyn RecordSource,
        sorter: &dyn ExternalSort,
    ) -> ClaimsResult<MergeOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let _span = tracing::info_span!(
            "merge_claim_lines",
            run_id = %run_id,
            claim_type = %self.claim_type
        )
        .entered();
        let started = Instant::now();
        let work_dir = self.config.work_dir();

        let unsorted = StagingFile::create(work_dir, UNSORTED_STAGING_PREFIX)?;
        let spill = {
            let mut writer = unsorted.writer();
            spill_records(source, &mut writer)?
        };
        tracing::info!(
            records_seen = spill.records_seen,
            records_staged = spill.records_staged,
            incomplete = spill.incomplete_dropped,
            "claim lines staged"
        );

        let sorted = StagingFile::create(work_dir, SORTED_STAGING_PREFIX)?;
        sorter.sort(unsorted.path(), sorted.path())?;
        drop(unsorted);
        tracing::debug!(strategy = sorter.name(), "staging file sorted");

        let reducer = GroupingReducer::new(ClaimMerger::new(
            self.claim_type,
            self.config.scalar_policy(),
        ));
        let mut reduce = ReduceStats::default();
        let claims = reducer.reduce_reader(sorted.reader()?, &mut reduce)?;
        drop(sorted);

        let unexpected_fields = self.unexpected_fields(&claims);
        if !unexpected_fields.is_empty() {
            tracing::debug!(fields = ?unexpected_fields, "fields outside the claim type header");
        }

        let report = MergeReport {
            run_id,
            claim_type: self.claim_type,
            sort_strategy: sorter.name().to_string(),
            records_seen: spill.records_seen,
            records_staged: spill.records_staged,
            incomplete_dropped: spill.incomplete_dropped,
            unreadable_records: spill.unreadable_dropped + source.lines_skipped(),
            sources_skipped: source.sources_skipped(),
            unreadable_staging_lines: reduce.unreadable_lines,
            subjects: claims.len(),
            merged_claims: reduce.merge.claims_merged,
            scalar_conflicts: reduce.merge.scalar_conflicts,
            split_subjects: reduce.split_subjects,
            unexpected_fields,
        };

        tracing::info!(
            subjects = report.subjects,
            merged_claims = report.merged_claims,
            scalar_conflicts = report.scalar_conflicts,
            sources_skipped = report.sources_skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "claim merge complete"
        );

        Ok(MergeOutcome { claims, report })
    }

    fn unexpected_fields(&self, claims: &MergedClaims) -> BTreeSet<String> {
        if self.expected_fields.is_empty() {
            return BTreeSet::new();
        }
        claims
            .values()
            .flatten()
            .flat_map(|claim| claim.fields().keys())
            .filter(|field| field.as_str() != CLAIM_TYPE_FIELD && !self.expected_fields.contains(*field))
            .cloned()
            .collect()
    }
}

impl std::fmt::Display for ClaimParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} claim parser", self.claim_type)
    }
}
