mod analysis;
mod client;
mod collector;
mod config;
mod error;
mod report;
mod runner;
mod sample;
mod stats;
mod summary;

pub use analysis::{
    average_throughput, category_throughput, fastest_slowest, latency_distribution, size_impact,
    summarize, tail_latency, ComparativeSummary, LatencyDistribution, OperationRecord, Rating,
    TailLatency, Variability,
};
pub use client::{KvStore, VoltClient};
pub use collector::{invoke, AbortHandle, Collector, CycleSamples};
pub use config::{
    BenchmarkConfig, RatingThresholds, DEFAULT_ITERATIONS, DEFAULT_JSON_SIZES,
    DEFAULT_KEY_PREFIX, DEFAULT_PERCENTILES, DEFAULT_REQUEST_TIMEOUT, DEFAULT_VALUE_SIZES,
    DEFAULT_WARMUP,
};
pub use error::BenchError;
pub use report::{BenchmarkRun, FailureRecord, RunMetadata, SizeResults, StatsEntry};
pub use runner::{run_benchmark, run_with_store};
pub use sample::{
    DurationSample, KeyTemplate, OperationKind, Payload, ScopedTimer, SizeDescriptor,
    ValueCategory,
};
pub use stats::{
    aggregate, aggregate_millis, percentile, percentile_label, throughput, OperationStats,
};
pub use summary::render_markdown;
