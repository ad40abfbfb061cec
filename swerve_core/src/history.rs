use crate::road::RoadElement;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

/// Defines errors that can arise during history operations.
///
/// These cover I/O problems when exporting the execution log to disk and
/// serialization failures for individual records.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// An I/O error occurred while writing the exported history file.
    /// Contains a string describing the underlying I/O error.
    #[error("History I/O error: {0}")]
    Io(String),

    /// A record could not be serialized for export.
    /// Contains a string describing the serialization error.
    #[error("History serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        HistoryError::Io(err.to_string())
    }
}
impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        HistoryError::Serialization(err.to_string())
    }
}

/// Classification of one test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The vehicle stayed in its lane.
    Pass,
    /// The vehicle left its lane.
    Fail,
    /// The executor raised an error; no feature value is available.
    Error,
    /// The road was rejected before execution.
    Invalid,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Error => "ERROR",
            Outcome::Invalid => "INVALID",
        };
        write!(f, "{label}")
    }
}

/// Lineage metadata for one parent, captured at the moment a child is created.
///
/// The `index` is the parent's positional index into the history, which is
/// stable for the lifetime of a run (records are never removed or reordered).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentInfo {
    pub index: usize,
    pub outcome: Outcome,
    pub feature: Option<f64>,
}

/// The parent(s) a candidate was derived from: one for mutation, two for
/// crossover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lineage {
    pub parent_1: ParentInfo,
    pub parent_2: Option<ParentInfo>,
}

/// A road candidate together with everything known about it: how it was
/// produced, its lineage, and (after execution) its outcome and the
/// objective feature value.
///
/// Engine-owned columns are typed fields; anything else an executor reports
/// lands in the `extras` map and is carried through to the export untouched.
#[derive(Debug, Clone)]
pub struct TestRecord<E: RoadElement> {
    pub test: Vec<E>,
    /// How this candidate was produced: `"random"` or an operator name.
    pub method: String,
    /// How many times this record has been consumed as a parent. Mutation
    /// parents are hard-set to 1; crossover wears parents down by increments.
    pub visited: u32,
    /// Depth in the lineage tree; random roads are generation 0.
    pub generation: u32,
    pub outcome: Option<Outcome>,
    /// The objective feature value reported by the executor. The column name
    /// is owned by the objective and only applied at export time.
    pub feature: Option<f64>,
    pub lineage: Option<Lineage>,
    pub extras: BTreeMap<String, JsonValue>,
}

impl<E: RoadElement> TestRecord<E> {
    /// Wraps a freshly generated road.
    pub fn random(test: Vec<E>) -> Self {
        Self {
            test,
            method: "random".to_string(),
            visited: 0,
            generation: 0,
            outcome: None,
            feature: None,
            lineage: None,
            extras: BTreeMap::new(),
        }
    }

    /// Wraps a mutated or recombined road together with its lineage.
    pub fn offspring(
        test: Vec<E>,
        method: &str,
        visited: u32,
        generation: u32,
        lineage: Lineage,
    ) -> Self {
        Self {
            test,
            method: method.to_string(),
            visited,
            generation,
            outcome: None,
            feature: None,
            lineage: Some(lineage),
            extras: BTreeMap::new(),
        }
    }

    /// Flattens the record into one export row. Absent columns (outcome,
    /// feature, lineage) are simply left out, so the schema is ragged across
    /// rows by design.
    fn to_row(&self, feature_name: &str) -> Result<JsonMap<String, JsonValue>, HistoryError> {
        let mut row = JsonMap::new();
        for (key, value) in &self.extras {
            row.insert(key.clone(), value.clone());
        }
        row.insert("test".to_string(), serde_json::to_value(&self.test)?);
        row.insert("method".to_string(), JsonValue::from(self.method.clone()));
        row.insert("visited".to_string(), JsonValue::from(self.visited));
        row.insert("generation".to_string(), JsonValue::from(self.generation));
        if let Some(outcome) = self.outcome {
            row.insert("outcome".to_string(), serde_json::to_value(outcome)?);
        }
        if let Some(feature) = self.feature {
            row.insert(feature_name.to_string(), JsonValue::from(feature));
        }
        if let Some(lineage) = &self.lineage {
            row.insert(
                "parent_1_index".to_string(),
                JsonValue::from(lineage.parent_1.index),
            );
            row.insert(
                "parent_1_outcome".to_string(),
                serde_json::to_value(lineage.parent_1.outcome)?,
            );
            if let Some(feature) = lineage.parent_1.feature {
                row.insert(format!("parent_1_{feature_name}"), JsonValue::from(feature));
            }
            if let Some(parent_2) = &lineage.parent_2 {
                row.insert("parent_2_index".to_string(), JsonValue::from(parent_2.index));
                row.insert(
                    "parent_2_outcome".to_string(),
                    serde_json::to_value(parent_2.outcome)?,
                );
                if let Some(feature) = parent_2.feature {
                    row.insert(format!("parent_2_{feature_name}"), JsonValue::from(feature));
                }
            }
        }
        Ok(row)
    }
}

/// The append-only execution log of one search run.
///
/// A record's positional index is its identity: parent back-references and
/// visit-count updates address records by index, so records are never
/// removed or reordered once appended. The only in-place mutation allowed
/// after a record is appended is the `visited` counter.
#[derive(Debug, Default)]
pub struct History<E: RoadElement> {
    records: Vec<TestRecord<E>>,
}

impl<E: RoadElement> History<E> {
    /// Creates a new, empty history.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Appends an executed record, returning its stable positional index.
    pub fn push(&mut self, record: TestRecord<E>) -> usize {
        let index = self.records.len();
        self.records.push(record);
        index
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TestRecord<E>> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TestRecord<E>> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestRecord<E>> {
        self.records.iter()
    }

    /// Hard-sets the visit counter of the record at `index`.
    ///
    /// Panics if `index` is out of range; indices handed to this method must
    /// come from this history.
    pub fn set_visited(&mut self, index: usize, visited: u32) {
        self.records[index].visited = visited;
    }

    /// Increments the visit counter of the record at `index` by one.
    ///
    /// Panics if `index` is out of range; indices handed to this method must
    /// come from this history.
    pub fn bump_visited(&mut self, index: usize) {
        self.records[index].visited += 1;
    }

    /// Whether any record carries a feature value yet.
    pub fn any_feature_recorded(&self) -> bool {
        self.records.iter().any(|record| record.feature.is_some())
    }

    /// Exports the history as a JSON array with one flat object per record.
    ///
    /// The objective feature columns are named after `feature_name`
    /// (`<feature>`, `parent_1_<feature>`, `parent_2_<feature>`). Rows only
    /// contain the columns that are present on them, so the schema is ragged;
    /// readers should treat missing columns as null. This is a
    /// human-inspectable log, not a resumable checkpoint.
    pub fn export_json(&self, path: &Path, feature_name: &str) -> Result<(), HistoryError> {
        let rows = self
            .records
            .iter()
            .map(|record| record.to_row(feature_name))
            .collect::<Result<Vec<_>, _>>()?;
        let file = File::create(path).map_err(|e| {
            HistoryError::Io(format!("Failed to create history file {path:?}: {e}"))
        })?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &rows).map_err(|e| {
            HistoryError::Serialization(format!(
                "Failed to serialize history to JSON for {path:?}: {e}"
            ))
        })?;
        Ok(())
    }
}
