//! Scoped staging files and the `subjectID|json` line format.
//!
//! Staging files are created with unique names inside the configured work
//! directory and removed when the [`StagingFile`] is dropped, on success and
//! error paths alike.

use crate::constants::{STAGING_SEPARATOR, STAGING_SUFFIX};
use crate::record::ClaimLine;
use crate::{ClaimsError, ClaimsResult};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;

/// A temporary line-delimited staging file.
#[derive(Debug)]
pub struct StagingFile {
    file: NamedTempFile,
}

impl StagingFile {
    /// Creates an empty staging file named `<prefix><random><suffix>` in `dir`.
    pub fn create(dir: &Path, prefix: &str) -> ClaimsResult<Self> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(dir)
            .map_err(|source| ClaimsError::StagingCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Buffered writer over the file's own handle.
    pub fn writer(&self) -> BufWriter<&File> {
        BufWriter::new(self.file.as_file())
    }

    /// Opens a fresh read handle positioned at the start of the file.
    pub fn reader(&self) -> ClaimsResult<BufReader<File>> {
        File::open(self.path())
            .map(BufReader::new)
            .map_err(ClaimsError::StagingRead)
    }
}

/// Formats one staging line (without the trailing newline).
pub fn format_staging_line(subject_id: &str, line: &ClaimLine) -> ClaimsResult<String> {
    let payload = serde_json::to_string(line).map_err(ClaimsError::Serialization)?;
    Ok(format!("{subject_id}{STAGING_SEPARATOR}{payload}"))
}

/// Splits a staging line into subject identifier and JSON payload.
pub fn split_staging_line(line: &str) -> Option<(&str, &str)> {
    line.split_once(STAGING_SEPARATOR)
}

/// Sort key of a staging line: everything before the first separator.
///
/// A line without a separator sorts by its whole text.
pub fn staging_key(line: &str) -> &str {
    split_staging_line(line).map_or(line, |(key, _)| key)
}
