use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::sample::{OperationKind, ValueCategory};
use crate::stats::OperationStats;

/// Stats per payload size, then per operation. Both levels iterate ascending.
pub type SizeResults = BTreeMap<u64, BTreeMap<OperationKind, OperationStats>>;

/// A pairing that could not be measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub category: ValueCategory,
    pub size: u64,
    /// The call that failed; `None` when the pairing stopped for another reason.
    #[serde(default)]
    pub operation: Option<OperationKind>,
    pub error: String,
}

impl FailureRecord {
    pub fn new(category: ValueCategory, size: u64, err: &BenchError) -> Self {
        Self {
            category,
            size,
            operation: err.operation(),
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub target: String,
    pub iterations: usize,
    pub warmup_iterations: usize,
    pub timestamp: DateTime<Utc>,
    pub value_sizes: Vec<u64>,
    pub json_sizes: Vec<u64>,
}

/// Everything one benchmark run measured, in the persisted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    #[serde(default)]
    pub string_operations: SizeResults,
    #[serde(default)]
    pub json_operations: SizeResults,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
    pub metadata: RunMetadata,
}

/// One entry of [`BenchmarkRun::iter_stats`].
#[derive(Debug, Clone, Copy)]
pub struct StatsEntry<'a> {
    pub category: ValueCategory,
    pub size: u64,
    pub operation: OperationKind,
    pub stats: &'a OperationStats,
}

impl BenchmarkRun {
    pub fn results(&self, category: ValueCategory) -> &SizeResults {
        match category {
            ValueCategory::Scalar => &self.string_operations,
            ValueCategory::Structured => &self.json_operations,
        }
    }

    /// Scalar before structured, sizes ascending, operations by name.
    pub fn iter_stats(&self) -> impl Iterator<Item = StatsEntry<'_>> + '_ {
        ValueCategory::ALL.into_iter().flat_map(move |category| {
            self.results(category).iter().flat_map(move |(size, ops)| {
                ops.iter().map(move |(operation, stats)| StatsEntry {
                    category,
                    size: *size,
                    operation: *operation,
                    stats,
                })
            })
        })
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BenchError> {
        let path = path.as_ref();
        let json = self.to_json().map_err(|err| BenchError::Persist {
            path: path.to_path_buf(),
            source: err.into(),
        })?;
        fs::write(path, json).map_err(|source| BenchError::Persist {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let missing = |reason: String| BenchError::MissingInput {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|err| missing(err.to_string()))?;
        serde_json::from_str(&text).map_err(|err| missing(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn stats(ops_per_second: f64) -> OperationStats {
        let avg = 1000.0 / ops_per_second;
        OperationStats {
            count: 10,
            min: avg * 0.5,
            max: avg * 2.0,
            avg,
            ops_per_second,
            percentiles: BTreeMap::from([
                ("p50".to_string(), avg),
                ("p99".to_string(), avg * 2.0),
            ]),
        }
    }

    /// Builds results from (size, operation, ops/sec) entries.
    pub(crate) fn results(entries: &[(u64, OperationKind, f64)]) -> SizeResults {
        let mut results = SizeResults::new();
        for (size, kind, ops) in entries {
            results.entry(*size).or_default().insert(*kind, stats(*ops));
        }
        results
    }

    pub(crate) fn run_with(
        string_operations: SizeResults,
        json_operations: SizeResults,
    ) -> BenchmarkRun {
        BenchmarkRun {
            metadata: RunMetadata {
                target: "http://localhost:3000/".to_string(),
                iterations: 10,
                warmup_iterations: 1,
                timestamp: Utc::now(),
                value_sizes: string_operations.keys().copied().collect(),
                json_sizes: json_operations.keys().copied().collect(),
            },
            string_operations,
            json_operations,
            failures: Vec::new(),
        }
    }

    #[test]
    fn save_then_load_is_lossless() {
        let mut run = run_with(
            results(&[
                (10, OperationKind::Set, 1234.5678),
                (10, OperationKind::Get, 2000.0),
                (1000, OperationKind::Set, 987.654_321),
            ]),
            results(&[(1, OperationKind::SetJson, 333.333_333_333)]),
        );
        run.failures.push(FailureRecord {
            category: ValueCategory::Structured,
            size: 100,
            operation: Some(OperationKind::GetJson),
            error: "get_json failed for key benchmark:json:100:3: key not found".to_string(),
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        run.save(&path).unwrap();
        let loaded = BenchmarkRun::load(&path).unwrap();

        assert_eq!(loaded, run);
        assert!(!loaded.is_complete());
        assert_eq!(loaded.failures[0].operation, Some(OperationKind::GetJson));
    }

    #[test]
    fn failure_records_name_the_failing_operation() {
        let failed = BenchError::OperationFailure {
            operation: OperationKind::Set,
            key: "benchmark:string:10:0".to_string(),
            reason: "operation timed out".to_string(),
        };
        let record = FailureRecord::new(ValueCategory::Scalar, 10, &failed);
        assert_eq!(record.operation, Some(OperationKind::Set));
        assert!(record.error.contains("operation timed out"));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["operation"], "set");
        assert_eq!(value["category"], "string");

        let aborted = FailureRecord::new(ValueCategory::Structured, 1, &BenchError::Aborted);
        assert_eq!(aborted.operation, None);
    }

    #[test]
    fn persisted_layout_uses_stable_names() {
        let run = run_with(
            results(&[(10, OperationKind::Set, 1000.0)]),
            results(&[(1, OperationKind::GetJson, 1000.0)]),
        );
        let value: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();

        let set = &value["string_operations"]["10"]["set"];
        assert_eq!(set["avg"], 1.0);
        assert_eq!(set["ops_per_second"], 1000.0);
        assert!(set["min"].is_number() && set["max"].is_number());
        assert!(value["json_operations"]["1"]["get_json"].is_object());
        assert_eq!(value["metadata"]["iterations"], 10);
        assert_eq!(value["metadata"]["warmup_iterations"], 1);
        assert!(value["metadata"]["timestamp"].is_string());
    }

    #[test]
    fn iteration_order_is_deterministic() {
        let run = run_with(
            results(&[
                (1000, OperationKind::Set, 1.0),
                (10, OperationKind::Set, 1.0),
                (10, OperationKind::Delete, 1.0),
            ]),
            results(&[(1, OperationKind::SetJson, 1.0)]),
        );
        let order: Vec<(u64, OperationKind)> =
            run.iter_stats().map(|e| (e.size, e.operation)).collect();
        assert_eq!(
            order,
            vec![
                (10, OperationKind::Delete),
                (10, OperationKind::Set),
                (1000, OperationKind::Set),
                (1, OperationKind::SetJson),
            ]
        );
    }

    #[test]
    fn load_reports_missing_and_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.json");
        assert!(matches!(
            BenchmarkRun::load(&absent),
            Err(BenchError::MissingInput { .. })
        ));

        let malformed = dir.path().join("malformed.json");
        fs::write(&malformed, r#"{"string_operations": {"10": "oops"}}"#).unwrap();
        assert!(matches!(
            BenchmarkRun::load(&malformed),
            Err(BenchError::MissingInput { .. })
        ));
    }
}
