//! Record sources feeding the spill writer.
//!
//! The merge engine pulls raw records one at a time through [`RecordSource`].
//! [`JsonLinesQueue`] is the file-backed implementation: a queue of JSON-lines
//! files read front to back, where files that cannot be opened and lines that
//! are not JSON objects are logged and skipped rather than aborting the run.

use crate::record::RawRecord;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// A lazy sequence of raw claim-line records.
pub trait RecordSource {
    /// Returns the next record, or `None` once every source is exhausted.
    fn next_record(&mut self) -> Option<RawRecord>;

    /// Number of sources that could not be opened and were skipped.
    fn sources_skipped(&self) -> usize {
        0
    }

    /// Number of lines that were not readable records and were skipped.
    fn lines_skipped(&self) -> usize {
        0
    }
}

/// Adapts any iterator of raw records into a [`RecordSource`].
#[derive(Debug)]
pub struct IterSource<I> {
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = RawRecord>,
{
    pub fn new(records: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl<I> RecordSource for IterSource<I>
where
    I: Iterator<Item = RawRecord>,
{
    fn next_record(&mut self) -> Option<RawRecord> {
        self.records.next()
    }
}

struct OpenSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

/// Queue of JSON-lines claim files.
///
/// Each file is removed once fully read, unless
/// [`keep_consumed_sources`](Self::keep_consumed_sources) is set.
pub struct JsonLinesQueue {
    pending: VecDeque<PathBuf>,
    current: Option<OpenSource>,
    remove_consumed: bool,
    sources_skipped: usize,
    lines_skipped: usize,
}

impl Default for JsonLinesQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonLinesQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            remove_consumed: true,
            sources_skipped: 0,
            lines_skipped: 0,
        }
    }

    /// Leaves source files in place after reading them.
    pub fn keep_consumed_sources(mut self) -> Self {
        self.remove_consumed = false;
        self
    }

    /// Adds a file to the back of the queue.
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.pending.push_back(path.into());
    }

    /// Queues every `.json`, `.jsonl` and `.ndjson` file directly under `dir`,
    /// in filename order. Returns how many files were queued.
    pub fn push_dir(&mut self, dir: &Path) -> std::io::Result<usize> {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_claim_file = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "json" | "jsonl" | "ndjson"));
            if path.is_file() && is_claim_file {
                found.push(path);
            }
        }
        found.sort();
        let count = found.len();
        self.pending.extend(found);
        Ok(count)
    }

    /// Number of files still waiting to be opened.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn open_next(&mut self) -> Option<OpenSource> {
        while let Some(path) = self.pending.pop_front() {
            match File::open(&path) {
                Ok(file) => {
                    tracing::debug!(path = %path.display(), "reading claim line file");
                    return Some(OpenSource {
                        lines: BufReader::new(file).lines(),
                        path,
                        line_no: 0,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        %error,
                        "skipping the claim line file since it can't be opened"
                    );
                    self.sources_skipped += 1;
                }
            }
        }
        None
    }

    fn finish_source(&mut self, source: OpenSource) {
        let OpenSource { path, lines, .. } = source;
        drop(lines);
        if !self.remove_consumed {
            return;
        }
        if let Err(error) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), %error, "failed to remove consumed claim line file");
        }
    }
}

impl RecordSource for JsonLinesQueue {
    fn next_record(&mut self) -> Option<RawRecord> {
        loop {
            let mut source = match self.current.take() {
                Some(source) => source,
                None => self.open_next()?,
            };

            match source.lines.next() {
                Some(Ok(line)) => {
                    source.line_no += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        self.current = Some(source);
                        continue;
                    }
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(Value::Object(record)) => {
                            self.current = Some(source);
                            return Some(record);
                        }
                        Ok(_) => {
                            tracing::warn!(
                                path = %source.path.display(),
                                line = source.line_no,
                                "skipping claim line that is not a JSON object"
                            );
                        }
                        Err(error) => {
                            tracing::warn!(
                                path = %source.path.display(),
                                line = source.line_no,
                                %error,
                                "skipping unparseable claim line"
                            );
                        }
                    }
                    self.lines_skipped += 1;
                    self.current = Some(source);
                }
                Some(Err(error)) => {
                    // The rest of the file is unreadable; keep it on disk for inspection.
                    tracing::warn!(
                        path = %source.path.display(),
                        line = source.line_no + 1,
                        %error,
                        "abandoning claim line file after read error"
                    );
                    self.sources_skipped += 1;
                }
                None => self.finish_source(source),
            }
        }
    }

    fn sources_skipped(&self) -> usize {
        self.sources_skipped
    }

    fn lines_skipped(&self) -> usize {
        self.lines_skipped
    }
}
