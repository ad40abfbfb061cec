use crate::history::{History, Outcome};
use crate::road::RoadElement;
use serde::Serialize;

/// One lane departure found by the search.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    /// Positional index of the failing record in the history.
    pub index: usize,
    /// How the failing road was produced.
    pub method: String,
    pub generation: u32,
    /// The objective feature value the failure scored.
    pub feature: Option<f64>,
    /// MD5 hex digest of the serialized road, useful for deduplication
    /// and tracking across runs.
    pub digest: String,
}

/// Scans the history for FAIL records and summarizes each one.
pub fn collect_failures<E: RoadElement>(history: &History<E>) -> Vec<FailureReport> {
    history
        .iter()
        .enumerate()
        .filter(|(_, record)| record.outcome == Some(Outcome::Fail))
        .map(|(index, record)| {
            let serialized = serde_json::to_vec(&record.test).unwrap_or_default();
            FailureReport {
                index,
                method: record.method.clone(),
                generation: record.generation,
                feature: record.feature,
                digest: format!("{:x}", md5::compute(&serialized)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TestRecord;

    fn told(test: Vec<f64>, outcome: Outcome, feature: f64) -> TestRecord<f64> {
        let mut record = TestRecord::random(test);
        record.outcome = Some(outcome);
        record.feature = Some(feature);
        record
    }

    #[test]
    fn collects_only_failing_records() {
        let mut history: History<f64> = History::new();
        history.push(told(vec![0.01, 0.02], Outcome::Pass, 0.5));
        history.push(told(vec![0.03, 0.04], Outcome::Fail, 1.5));
        history.push(told(vec![0.05, 0.06], Outcome::Error, 0.0));
        history.push(told(vec![0.03, 0.04], Outcome::Fail, 1.7));

        let failures = collect_failures(&history);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[1].index, 3);
        assert_eq!(failures[0].feature, Some(1.5));
        // identical roads share a digest
        assert_eq!(failures[0].digest, failures[1].digest);
    }

    #[test]
    fn digest_distinguishes_different_roads() {
        let mut history: History<f64> = History::new();
        history.push(told(vec![0.01, 0.02], Outcome::Fail, 1.0));
        history.push(told(vec![0.02, 0.01], Outcome::Fail, 1.0));
        let failures = collect_failures(&history);
        assert_ne!(failures[0].digest, failures[1].digest);
    }

    #[test]
    fn empty_history_has_no_failures() {
        let history: History<f64> = History::new();
        assert!(collect_failures(&history).is_empty());
    }
}
