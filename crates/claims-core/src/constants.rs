//! Field names and defaults used throughout the claims core crate.

/// Subject (member) identifier field on a raw claim line.
pub const SUBJECT_ID_FIELD: &str = "subjectID";

/// Service start date; orders merged claims per subject.
pub const START_DATE_FIELD: &str = "startDate";

/// Claim identifier carried by institutional and professional claim lines.
pub const CLAIM_ID_FIELD: &str = "claimID";

/// Fill identifier carried by prescription drug events.
pub const FILL_ID_FIELD: &str = "fillID";

/// Line-level detail dropped during merging.
pub const CLAIM_LINE_FIELD: &str = "claimLine";

/// Category stamped onto every merged claim.
pub const CLAIM_TYPE_FIELD: &str = "claimType";

/// Sentinel meaning "no claim id"; the fill id is used instead.
pub const MISSING_CLAIM_ID: &str = "NA";

/// Separates the subject identifier from the JSON payload in staging lines.
pub const STAGING_SEPARATOR: char = '|';

/// Filename prefix of the unsorted staging file.
pub const UNSORTED_STAGING_PREFIX: &str = "claim_lines_to_sort-";

/// Filename prefix of the sorted staging file.
pub const SORTED_STAGING_PREFIX: &str = "claim_lines_sorted-";

/// Filename prefix of sort run files.
pub const SORT_RUN_PREFIX: &str = "claim_lines_run-";

/// Suffix shared by all staging files.
pub const STAGING_SUFFIX: &str = ".txt";

/// Default number of staging lines held in memory per sort run.
pub const DEFAULT_SORT_CHUNK_LINES: usize = 100_000;

/// Default work directory for staging files.
pub const DEFAULT_WORK_DIR: &str = ".";
