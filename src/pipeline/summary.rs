use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::report::write_json;
use crate::types::{OutcomeStatus, ProcessingOutcome};

/// Per-file accounting of a batch run plus its wall-clock time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// One entry per input file, in input order
    pub outcomes: Vec<ProcessingOutcome>,
    pub elapsed: Duration,
}

#[derive(Serialize)]
struct SummaryTable<'a> {
    elapsed_seconds: f64,
    succeeded: usize,
    failed: usize,
    rows: Vec<SummaryRow<'a>>,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    source_id: &'a str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    windows: Option<usize>,
}

impl RunSummary {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }

    /// Writes the `{source_id, status}` table and total elapsed time.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let table = SummaryTable {
            elapsed_seconds: self.elapsed.as_secs_f64(),
            succeeded: self.successes(),
            failed: self.failures(),
            rows: self
                .outcomes
                .iter()
                .map(|outcome| SummaryRow {
                    source_id: &outcome.source_id,
                    status: outcome.status.to_string(),
                    windows: match outcome.status {
                        OutcomeStatus::Success { windows } => Some(windows),
                        OutcomeStatus::Failed(_) => None,
                    },
                })
                .collect(),
        };
        write_json(path, &table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_serializes_outcomes() {
        let summary = RunSummary {
            outcomes: vec![
                ProcessingOutcome::success("a.wav", 2),
                ProcessingOutcome::failed("b.wav", "decode error"),
            ],
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(summary.successes(), 1);
        assert_eq!(summary.failures(), 1);
        assert_eq!(summary.failed().next().unwrap().source_id, "b.wav");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        summary.write_json(&path).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["elapsed_seconds"], 1.5);
        assert_eq!(parsed["rows"][0]["status"], "Success");
        assert_eq!(parsed["rows"][0]["windows"], 2);
        assert_eq!(parsed["rows"][1]["status"], "decode error");
    }
}
