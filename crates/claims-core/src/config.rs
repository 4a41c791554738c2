//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! [`ClaimParser`](crate::ClaimParser). Front ends read environment variables or
//! command-line flags; the helpers here only parse the optional raw values so the
//! core itself never touches process-wide state.

use crate::constants::DEFAULT_SORT_CHUNK_LINES;
use crate::merge::ScalarConflictPolicy;
use crate::sort::{ChunkedMergeSort, ExternalSort, SortStrategy, UnixSort};
use crate::{ClaimsError, ClaimsResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    work_dir: PathBuf,
    sort_chunk_lines: usize,
    sort_strategy: SortStrategy,
    scalar_policy: ScalarConflictPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `work_dir` holds the staging files of each run and must be an existing
    /// directory. `sort_chunk_lines` bounds how many staging lines the chunked
    /// sort keeps in memory and must be non-zero.
    pub fn new(
        work_dir: PathBuf,
        sort_chunk_lines: usize,
        sort_strategy: SortStrategy,
        scalar_policy: ScalarConflictPolicy,
    ) -> ClaimsResult<Self> {
        if !work_dir.is_dir() {
            return Err(ClaimsError::InvalidConfig(format!(
                "work directory does not exist or is not a directory: {}",
                work_dir.display()
            )));
        }

        if sort_chunk_lines == 0 {
            return Err(ClaimsError::InvalidConfig(
                "sort_chunk_lines must be greater than zero".into(),
            ));
        }

        Ok(Self {
            work_dir,
            sort_chunk_lines,
            sort_strategy,
            scalar_policy,
        })
    }

    /// Configuration with default sort and merge settings in `work_dir`.
    pub fn with_work_dir(work_dir: PathBuf) -> ClaimsResult<Self> {
        Self::new(
            work_dir,
            DEFAULT_SORT_CHUNK_LINES,
            SortStrategy::default(),
            ScalarConflictPolicy::default(),
        )
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn sort_chunk_lines(&self) -> usize {
        self.sort_chunk_lines
    }

    pub fn sort_strategy(&self) -> SortStrategy {
        self.sort_strategy
    }

    pub fn scalar_policy(&self) -> ScalarConflictPolicy {
        self.scalar_policy
    }

    /// Builds the external sort selected by this configuration.
    pub fn external_sort(&self) -> Box<dyn ExternalSort> {
        match self.sort_strategy {
            SortStrategy::ChunkedMerge => Box::new(ChunkedMergeSort::new(
                self.work_dir.clone(),
                self.sort_chunk_lines,
            )),
            SortStrategy::Unix => {
                Box::new(UnixSort::default().with_temp_dir(self.work_dir.clone()))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the sort chunk size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_SORT_CHUNK_LINES`].
pub fn sort_chunk_lines_from_env_value(value: Option<String>) -> ClaimsResult<usize> {
    match non_blank(value) {
        None => Ok(DEFAULT_SORT_CHUNK_LINES),
        Some(v) => v.parse::<usize>().map_err(|e| {
            ClaimsError::InvalidConfig(format!("invalid sort chunk size {v:?}: {e}"))
        }),
    }
}

/// Parse the sort strategy from an optional string value (`chunked` or `unix`).
pub fn sort_strategy_from_env_value(value: Option<String>) -> ClaimsResult<SortStrategy> {
    non_blank(value)
        .map(|v| v.parse::<SortStrategy>())
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Parse the scalar conflict policy from an optional string value
/// (`last-write-wins` or `first-write-wins`).
pub fn scalar_policy_from_env_value(value: Option<String>) -> ClaimsResult<ScalarConflictPolicy> {
    non_blank(value)
        .map(|v| v.parse::<ScalarConflictPolicy>())
        .transpose()
        .map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_rejects_missing_work_dir() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");

        let result = CoreConfig::with_work_dir(missing);

        assert!(matches!(result, Err(ClaimsError::InvalidConfig(_))));
    }

    #[test]
    fn new_rejects_zero_chunk_size() {
        let temp = TempDir::new().unwrap();

        let result = CoreConfig::new(
            temp.path().to_path_buf(),
            0,
            SortStrategy::ChunkedMerge,
            ScalarConflictPolicy::LastWriteWins,
        );

        assert!(matches!(result, Err(ClaimsError::InvalidConfig(_))));
    }

    #[test]
    fn defaults_apply_for_blank_env_values() {
        assert_eq!(
            sort_chunk_lines_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_SORT_CHUNK_LINES
        );
        assert_eq!(
            sort_strategy_from_env_value(None).unwrap(),
            SortStrategy::ChunkedMerge
        );
        assert_eq!(
            scalar_policy_from_env_value(Some(String::new())).unwrap(),
            ScalarConflictPolicy::LastWriteWins
        );
    }

    #[test]
    fn env_values_are_parsed() {
        assert_eq!(sort_chunk_lines_from_env_value(Some("250".into())).unwrap(), 250);
        assert_eq!(
            sort_strategy_from_env_value(Some("unix".into())).unwrap(),
            SortStrategy::Unix
        );
        assert_eq!(
            scalar_policy_from_env_value(Some("first-write-wins".into())).unwrap(),
            ScalarConflictPolicy::FirstWriteWins
        );
        assert!(sort_chunk_lines_from_env_value(Some("many".into())).is_err());
        assert!(scalar_policy_from_env_value(Some("random".into())).is_err());
    }
}
