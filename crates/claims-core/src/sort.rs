//! External sort of staging files by subject identifier.
//!
//! Both strategies order lines by the bytes before the first `|` and keep equal
//! keys contiguous in input order. Neither needs the whole file in memory:
//! [`ChunkedMergeSort`] spills sorted runs to disk and k-way merges them, and
//! [`UnixSort`] delegates to the platform `sort` utility.

use crate::constants::{SORT_RUN_PREFIX, STAGING_SUFFIX};
use crate::staging::staging_key;
use crate::{ClaimsError, ClaimsResult};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Disk-backed sort of a staging file into `output`.
pub trait ExternalSort {
    fn sort(&self, input: &Path, output: &Path) -> ClaimsResult<()>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Which [`ExternalSort`] a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortStrategy {
    #[default]
    ChunkedMerge,
    Unix,
}

impl FromStr for SortStrategy {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chunked" | "chunked-merge" => Ok(SortStrategy::ChunkedMerge),
            "unix" => Ok(SortStrategy::Unix),
            other => Err(ClaimsError::InvalidConfig(format!(
                "unknown sort strategy: {other} (expected chunked or unix)"
            ))),
        }
    }
}

/// In-process external merge sort.
#[derive(Debug, Clone)]
pub struct ChunkedMergeSort {
    run_dir: PathBuf,
    chunk_lines: usize,
}

impl ChunkedMergeSort {
    /// Sorts at most `chunk_lines` lines in memory at a time, spilling runs to `run_dir`.
    pub fn new(run_dir: PathBuf, chunk_lines: usize) -> Self {
        Self {
            run_dir,
            chunk_lines: chunk_lines.max(1),
        }
    }

    fn sort_chunk(chunk: &mut [String]) {
        // `sort_by` is stable, so equal subjects keep their input order.
        chunk.sort_by(|a, b| staging_key(a).cmp(staging_key(b)));
    }

    fn spill_run(&self, chunk: &mut Vec<String>) -> ClaimsResult<NamedTempFile> {
        Self::sort_chunk(chunk);
        let run = tempfile::Builder::new()
            .prefix(SORT_RUN_PREFIX)
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&self.run_dir)
            .map_err(|source| ClaimsError::StagingCreate {
                path: self.run_dir.clone(),
                source,
            })?;
        write_lines(run.as_file(), chunk.drain(..))?;
        Ok(run)
    }
}

fn write_lines<W: Write>(out: W, lines: impl Iterator<Item = String>) -> ClaimsResult<()> {
    let mut writer = BufWriter::new(out);
    for line in lines {
        writeln!(writer, "{line}").map_err(ClaimsError::SortIo)?;
    }
    writer.flush().map_err(ClaimsError::SortIo)
}

struct RunHead {
    line: String,
    run: usize,
}

impl RunHead {
    fn rank(&self) -> (&str, usize) {
        (staging_key(&self.line), self.run)
    }
}

impl PartialEq for RunHead {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank()
    }
}

impl Eq for RunHead {}

impl PartialOrd for RunHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunHead {
    // Ties break on run index, which preserves input order across runs.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

fn next_line(
    readers: &mut [Lines<BufReader<File>>],
    run: usize,
) -> ClaimsResult<Option<RunHead>> {
    match readers[run].next() {
        Some(Ok(line)) => Ok(Some(RunHead { line, run })),
        Some(Err(error)) => Err(ClaimsError::SortIo(error)),
        None => Ok(None),
    }
}

impl ExternalSort for ChunkedMergeSort {
    fn sort(&self, input: &Path, output: &Path) -> ClaimsResult<()> {
        let reader = BufReader::new(File::open(input).map_err(ClaimsError::SortIo)?);

        let mut runs = Vec::new();
        let mut chunk = Vec::with_capacity(self.chunk_lines.min(8192));
        for line in reader.lines() {
            chunk.push(line.map_err(ClaimsError::SortIo)?);
            if chunk.len() >= self.chunk_lines {
                runs.push(self.spill_run(&mut chunk)?);
            }
        }

        let out = File::create(output).map_err(ClaimsError::SortIo)?;

        if runs.is_empty() {
            Self::sort_chunk(&mut chunk);
            return write_lines(out, chunk.into_iter());
        }
        if !chunk.is_empty() {
            runs.push(self.spill_run(&mut chunk)?);
        }
        tracing::debug!(runs = runs.len(), chunk_lines = self.chunk_lines, "merging sort runs");

        let mut readers = runs
            .iter()
            .map(|run| {
                File::open(run.path())
                    .map(|file| BufReader::new(file).lines())
                    .map_err(ClaimsError::SortIo)
            })
            .collect::<ClaimsResult<Vec<_>>>()?;

        let mut heap = BinaryHeap::with_capacity(readers.len());
        for run in 0..readers.len() {
            if let Some(head) = next_line(&mut readers, run)? {
                heap.push(Reverse(head));
            }
        }

        let mut writer = BufWriter::new(out);
        while let Some(Reverse(head)) = heap.pop() {
            writeln!(writer, "{}", head.line).map_err(ClaimsError::SortIo)?;
            if let Some(next) = next_line(&mut readers, head.run)? {
                heap.push(Reverse(next));
            }
        }
        writer.flush().map_err(ClaimsError::SortIo)
    }

    fn name(&self) -> &'static str {
        "chunked-merge"
    }
}

/// Sorts with the platform `sort` utility under the C locale.
///
/// Runs `sort -t '|' -k1,1 -s [-T <dir>] -o <output> <input>`.
#[derive(Debug, Clone)]
pub struct UnixSort {
    program: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl Default for UnixSort {
    fn default() -> Self {
        Self {
            program: PathBuf::from("sort"),
            temp_dir: None,
        }
    }
}

impl UnixSort {
    /// Uses `program` instead of the `sort` found on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Directs the utility's own temporary files to `dir`.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

impl ExternalSort for UnixSort {
    fn sort(&self, input: &Path, output: &Path) -> ClaimsResult<()> {
        let mut command = Command::new(&self.program);
        command.env("LC_ALL", "C").args(["-t", "|", "-k1,1", "-s"]);
        if let Some(dir) = &self.temp_dir {
            command.arg("-T").arg(dir);
        }
        command.arg("-o").arg(output).arg(input);

        let result = command.output().map_err(ClaimsError::SortIo)?;
        if !result.status.success() {
            return Err(ClaimsError::Sort(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "unix"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sorted_lines(sorter: &dyn ExternalSort, dir: &Path, input: &str) -> Vec<String> {
        let in_path = dir.join("in.txt");
        let out_path = dir.join("out.txt");
        fs::write(&in_path, input).unwrap();
        sorter.sort(&in_path, &out_path).unwrap();
        fs::read_to_string(&out_path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    const INPUT: &str = "m3|{\"n\":1}\nm1|{\"n\":2}\nm2|{\"n\":3}\nm1|{\"n\":4}\nm10|{\"n\":5}\nm1|{\"n\":6}\n";
    const EXPECTED: [&str; 6] = [
        "m1|{\"n\":2}",
        "m1|{\"n\":4}",
        "m1|{\"n\":6}",
        "m10|{\"n\":5}",
        "m2|{\"n\":3}",
        "m3|{\"n\":1}",
    ];

    #[test]
    fn chunked_sort_in_single_chunk() {
        let temp = TempDir::new().unwrap();
        let sorter = ChunkedMergeSort::new(temp.path().to_path_buf(), 100);

        assert_eq!(sorted_lines(&sorter, temp.path(), INPUT), EXPECTED);
    }

    #[test]
    fn chunked_sort_merges_many_runs_stably() {
        let temp = TempDir::new().unwrap();
        let runs = temp.path().join("runs");
        fs::create_dir(&runs).unwrap();
        let sorter = ChunkedMergeSort::new(runs.clone(), 2);

        assert_eq!(sorted_lines(&sorter, temp.path(), INPUT), EXPECTED);
        assert_eq!(fs::read_dir(&runs).unwrap().count(), 0, "run files must be removed");
    }

    #[test]
    fn chunked_sort_of_empty_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let sorter = ChunkedMergeSort::new(temp.path().to_path_buf(), 2);

        assert!(sorted_lines(&sorter, temp.path(), "").is_empty());
    }

    #[test]
    fn chunked_sort_reports_missing_input() {
        let temp = TempDir::new().unwrap();
        let sorter = ChunkedMergeSort::new(temp.path().to_path_buf(), 2);

        let result = sorter.sort(&temp.path().join("missing"), &temp.path().join("out"));

        assert!(matches!(result, Err(ClaimsError::SortIo(_))));
    }

    #[test]
    fn sort_strategy_parses() {
        assert_eq!("Chunked".parse::<SortStrategy>().unwrap(), SortStrategy::ChunkedMerge);
        assert_eq!("unix".parse::<SortStrategy>().unwrap(), SortStrategy::Unix);
        assert!("quick".parse::<SortStrategy>().is_err());
    }

    #[test]
    fn unix_sort_reports_missing_program() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("in.txt"), INPUT).unwrap();
        let sorter = UnixSort::default().with_program(temp.path().join("no-such-sort"));

        let result = sorter.sort(&temp.path().join("in.txt"), &temp.path().join("out.txt"));

        assert!(matches!(result, Err(ClaimsError::SortIo(_))));
    }

    #[cfg(unix)]
    #[test]
    fn unix_sort_matches_chunked_sort() {
        let available = Command::new("sort")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success());
        if !available {
            return;
        }

        let temp = TempDir::new().unwrap();
        let sorter = UnixSort::default().with_temp_dir(temp.path());

        assert_eq!(sorted_lines(&sorter, temp.path(), INPUT), EXPECTED);
    }
}
