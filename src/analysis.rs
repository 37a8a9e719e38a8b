//! Comparative metrics derived from a finished [`BenchmarkRun`].
//!
//! Everything here is a pure function of the run. Scans follow
//! [`BenchmarkRun::iter_stats`] order so ties resolve the same way every time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RatingThresholds;
use crate::error::BenchError;
use crate::report::{BenchmarkRun, SizeResults};
use crate::sample::{OperationKind, ValueCategory};
use crate::stats::percentile;

/// Qualitative throughput bucket, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    BelowExpectations,
    Acceptable,
    Good,
    Excellent,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::BelowExpectations => "below expectations",
            Rating::Acceptable => "acceptable",
            Rating::Good => "good",
            Rating::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RatingThresholds {
    /// A value exactly on a threshold falls into the lower bucket.
    pub fn rate(&self, ops_per_second: f64) -> Rating {
        if ops_per_second > self.excellent {
            Rating::Excellent
        } else if ops_per_second > self.good {
            Rating::Good
        } else if ops_per_second > self.acceptable {
            Rating::Acceptable
        } else {
            Rating::BelowExpectations
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation: OperationKind,
    pub category: ValueCategory,
    pub size: u64,
    pub ops_per_second: f64,
}

impl fmt::Display for OperationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} data with {} {} ({:.2} ops/sec)",
            self.operation,
            self.category,
            self.size,
            self.category.unit(),
            self.ops_per_second
        )
    }
}

/// How far the tail of a pairing's latency sits above its median.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variability {
    Low,
    Moderate,
    High,
}

impl Variability {
    /// Classifies a p99/p50 ratio: above 3 is high, above 2 moderate.
    pub fn classify(tail_ratio: f64) -> Self {
        if tail_ratio > 3.0 {
            Variability::High
        } else if tail_ratio > 2.0 {
            Variability::Moderate
        } else {
            Variability::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variability::Low => "low",
            Variability::Moderate => "moderate",
            Variability::High => "high",
        }
    }
}

impl fmt::Display for Variability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pairing whose p99 sits furthest above its p50.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TailLatency {
    pub operation: OperationKind,
    pub category: ValueCategory,
    pub size: u64,
    pub ratio: f64,
    pub variability: Variability,
}

/// Per-call latency spread across every measured pairing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyDistribution {
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparativeSummary {
    pub fastest: OperationRecord,
    pub slowest: OperationRecord,
    pub performance_ratio: f64,
    /// `None` when fewer than two scalar sizes were measured.
    pub string_size_impact: Option<f64>,
    /// `None` when fewer than two structured sizes were measured.
    pub json_size_impact: Option<f64>,
    pub average_throughput: f64,
    pub rating: Rating,
    pub latency: LatencyDistribution,
    /// `None` when no pairing carries both p50 and p99.
    #[serde(default)]
    pub tail_latency: Option<TailLatency>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ComparativeSummary {
    pub fn size_impact(&self, category: ValueCategory) -> Option<f64> {
        match category {
            ValueCategory::Scalar => self.string_size_impact,
            ValueCategory::Structured => self.json_size_impact,
        }
    }
}

pub fn summarize(
    run: &BenchmarkRun,
    thresholds: &RatingThresholds,
) -> Result<ComparativeSummary, BenchError> {
    let (fastest, slowest) = fastest_slowest(run).ok_or(BenchError::EmptySample)?;
    let average_throughput = average_throughput(run).ok_or(BenchError::EmptySample)?;
    let latency = latency_distribution(run).ok_or(BenchError::EmptySample)?;
    if slowest.ops_per_second <= 0.0 {
        return Err(BenchError::DivisionUndefined);
    }

    let string_size_impact = size_impact(&run.string_operations);
    let json_size_impact = size_impact(&run.json_operations);
    let recommendations = recommendations(run, [string_size_impact, json_size_impact]);

    Ok(ComparativeSummary {
        fastest,
        slowest,
        performance_ratio: fastest.ops_per_second / slowest.ops_per_second,
        string_size_impact,
        json_size_impact,
        average_throughput,
        rating: thresholds.rate(average_throughput),
        latency,
        tail_latency: tail_latency(run),
        recommendations,
    })
}

/// Highest and lowest throughput pairings; the first one seen wins a tie.
pub fn fastest_slowest(run: &BenchmarkRun) -> Option<(OperationRecord, OperationRecord)> {
    let mut extremes: Option<(OperationRecord, OperationRecord)> = None;
    for entry in run.iter_stats() {
        let record = OperationRecord {
            operation: entry.operation,
            category: entry.category,
            size: entry.size,
            ops_per_second: entry.stats.ops_per_second,
        };
        extremes = Some(match extremes {
            None => (record, record),
            Some((fastest, slowest)) => (
                if record.ops_per_second > fastest.ops_per_second {
                    record
                } else {
                    fastest
                },
                if record.ops_per_second < slowest.ops_per_second {
                    record
                } else {
                    slowest
                },
            ),
        });
    }
    extremes
}

/// Percentage throughput drop from the smallest to the largest size, using
/// the mean throughput over operations at each size. Negative when larger
/// payloads were faster.
pub fn size_impact(results: &SizeResults) -> Option<f64> {
    if results.len() < 2 {
        return None;
    }
    let (_, smallest) = results.first_key_value()?;
    let (_, largest) = results.last_key_value()?;
    let small = mean(smallest.values().map(|s| s.ops_per_second))?;
    let large = mean(largest.values().map(|s| s.ops_per_second))?;
    if small <= 0.0 {
        return None;
    }
    Some((small - large) / small * 100.0)
}

pub fn average_throughput(run: &BenchmarkRun) -> Option<f64> {
    mean(run.iter_stats().map(|entry| entry.stats.ops_per_second))
}

/// Converts each pairing's throughput back into a mean latency and cuts the
/// sorted latencies with the aggregator's percentile rule.
pub fn latency_distribution(run: &BenchmarkRun) -> Option<LatencyDistribution> {
    let mut latencies: Vec<f64> = run
        .iter_stats()
        .filter(|entry| entry.stats.ops_per_second > 0.0)
        .map(|entry| 1000.0 / entry.stats.ops_per_second)
        .collect();
    if latencies.is_empty() {
        return None;
    }
    latencies.sort_by(f64::total_cmp);

    Some(LatencyDistribution {
        min: latencies[0],
        p25: percentile(&latencies, 0.25)?,
        p50: percentile(&latencies, 0.5)?,
        p75: percentile(&latencies, 0.75)?,
        p90: percentile(&latencies, 0.9)?,
        p99: percentile(&latencies, 0.99)?,
        max: latencies[latencies.len() - 1],
    })
}

/// Largest p99/p50 ratio over pairings that report both; the first one seen
/// wins a tie.
pub fn tail_latency(run: &BenchmarkRun) -> Option<TailLatency> {
    let mut worst: Option<TailLatency> = None;
    for entry in run.iter_stats() {
        let stats = entry.stats;
        let (Some(p50), Some(p99)) = (stats.percentile("p50"), stats.percentile("p99")) else {
            continue;
        };
        if p50 <= 0.0 {
            continue;
        }
        let ratio = p99 / p50;
        if worst.map_or(true, |w| ratio > w.ratio) {
            worst = Some(TailLatency {
                operation: entry.operation,
                category: entry.category,
                size: entry.size,
                ratio,
                variability: Variability::classify(ratio),
            });
        }
    }
    worst
}

/// Mean throughput over every operation and size of one category.
pub fn category_throughput(run: &BenchmarkRun, category: ValueCategory) -> Option<f64> {
    mean(
        run.results(category)
            .values()
            .flat_map(|ops| ops.values().map(|s| s.ops_per_second)),
    )
}

fn recommendations(run: &BenchmarkRun, size_impacts: [Option<f64>; 2]) -> Vec<String> {
    let mut out = Vec::new();
    if size_impacts.iter().flatten().any(|impact| *impact > 50.0) {
        out.push("Consider using smaller values when possible to maximize performance".to_string());
    }
    if let (Some(json), Some(string)) = (
        category_throughput(run, ValueCategory::Structured),
        category_throughput(run, ValueCategory::Scalar),
    ) {
        if json < string * 0.7 {
            out.push(
                "Use string values instead of JSON when complex data structures are not required"
                    .to_string(),
            );
        }
    }
    out.push(
        "For latency-sensitive applications, consider using smaller values and simpler data structures"
            .to_string(),
    );
    out.push("For throughput-oriented applications, batch operations when possible".to_string());
    out
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
