//! Spill writer: streams complete records from a source into a staging file.

use crate::completeness::is_complete;
use crate::record::ClaimLine;
use crate::source::RecordSource;
use crate::staging::format_staging_line;
use crate::{ClaimsError, ClaimsResult};
use std::io::Write;

/// Counters collected while spilling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpillStats {
    pub records_seen: usize,
    pub records_staged: usize,
    pub incomplete_dropped: usize,
    pub unreadable_dropped: usize,
}

/// Drains `source` into `out`, one `subjectID|json` line per complete record.
///
/// Records are written in arrival order and only one is held at a time.
/// Incomplete records are dropped silently; records whose fields are not
/// scalars or lists of scalars are logged and dropped.
pub fn spill_records<W: Write>(
    source: &mut dyn RecordSource,
    out: &mut W,
) -> ClaimsResult<SpillStats> {
    let mut stats = SpillStats::default();

    while let Some(record) = source.next_record() {
        stats.records_seen += 1;

        if !is_complete(&record) {
            stats.incomplete_dropped += 1;
            tracing::trace!("dropping incomplete claim line");
            continue;
        }

        let (subject_id, line) = match ClaimLine::from_raw(record) {
            Ok(Some(split)) => split,
            Ok(None) => {
                stats.incomplete_dropped += 1;
                continue;
            }
            Err(error) => {
                stats.unreadable_dropped += 1;
                tracing::warn!(%error, "dropping claim line with unsupported field values");
                continue;
            }
        };

        let staged = format_staging_line(&subject_id, &line)?;
        writeln!(out, "{staged}").map_err(ClaimsError::StagingWrite)?;
        stats.records_staged += 1;
    }

    out.flush().map_err(ClaimsError::StagingWrite)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawRecord;
    use crate::source::IterSource;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn writes_complete_records_in_arrival_order() {
        let mut source = IterSource::new(vec![
            raw(json!({"subjectID": "b", "startDate": "2021-01-01", "claimID": "c2"})),
            raw(json!({"startDate": "2021-01-01", "claimID": "c9"})),
            raw(json!({"subjectID": "a", "startDate": "2021-01-01", "fillID": "f1"})),
        ]);
        let mut out = Vec::new();

        let stats = spill_records(&mut source, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"b|{"claimID":"c2","startDate":"2021-01-01"}"#,
                r#"a|{"fillID":"f1","startDate":"2021-01-01"}"#,
            ]
        );
        assert_eq!(
            stats,
            SpillStats {
                records_seen: 3,
                records_staged: 2,
                incomplete_dropped: 1,
                unreadable_dropped: 0,
            }
        );
    }

    #[test]
    fn drops_records_with_nested_objects() {
        let mut source = IterSource::new(vec![raw(json!({
            "subjectID": "a",
            "startDate": "2021-01-01",
            "claimID": "c1",
            "provider": {"npi": "123"},
        }))]);
        let mut out = Vec::new();

        let stats = spill_records(&mut source, &mut out).unwrap();

        assert!(out.is_empty());
        assert_eq!(stats.unreadable_dropped, 1);
    }

    #[test]
    fn staged_payload_has_no_subject_field() {
        let mut source = IterSource::new(vec![raw(json!({
            "subjectID": "m1",
            "startDate": "2021-01-01",
            "claimID": "c1",
            "note": "multi\nline",
        }))]);
        let mut out = Vec::new();

        spill_records(&mut source, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(!text.contains("subjectID"));
    }
}
