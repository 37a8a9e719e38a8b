use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::client::{KvStore, VoltClient};
use crate::collector::{AbortHandle, Collector};
use crate::config::BenchmarkConfig;
use crate::error::BenchError;
use crate::report::{BenchmarkRun, FailureRecord, RunMetadata, SizeResults};
use crate::sample::{KeyTemplate, OperationKind, Payload, SizeDescriptor, ValueCategory};
use crate::stats::{self, OperationStats};

/// Benchmarks the Volt server at `config.endpoint` over HTTP.
pub async fn run_benchmark(
    config: &BenchmarkConfig,
    abort: &AbortHandle,
) -> Result<BenchmarkRun, BenchError> {
    let client = VoltClient::new(config.endpoint.clone(), config.request_timeout)
        .map_err(|err| BenchError::InvalidConfig(format!("{:#}", err)))?;
    run_with_store(&client, config, abort).await
}

/// Measures every configured (category, size) pairing, one call at a time.
///
/// A failing pairing is recorded in `failures` and the run moves on; only an
/// unreachable target or an abort stops it early.
pub async fn run_with_store<S: KvStore>(
    store: &S,
    config: &BenchmarkConfig,
    abort: &AbortHandle,
) -> Result<BenchmarkRun, BenchError> {
    let target = config.endpoint.to_string();
    if !store.health().await {
        return Err(BenchError::Connectivity {
            target,
            reason: "health check failed".to_string(),
        });
    }
    info!(
        %target,
        iterations = config.iterations,
        warmup = config.warmup,
        "starting benchmark"
    );

    let timestamp = Utc::now();
    let mut rng = config.rng();
    let collector =
        Collector::new(store, config.iterations, config.warmup).with_abort_handle(abort.clone());

    let mut string_operations = SizeResults::new();
    let mut json_operations = SizeResults::new();
    let mut failures = Vec::new();

    'pairings: for category in ValueCategory::ALL {
        for &size in config.sizes(category) {
            let descriptor = SizeDescriptor::new(category, size);
            info!(pairing = %descriptor, "benchmarking");

            match measure_pairing(&collector, config, descriptor, &mut rng).await {
                Ok(ops) => {
                    debug!(pairing = %descriptor, ?ops, "aggregated");
                    let results = match category {
                        ValueCategory::Scalar => &mut string_operations,
                        ValueCategory::Structured => &mut json_operations,
                    };
                    results.insert(size, ops);
                }
                Err(err) if err.is_fatal() && !matches!(err, BenchError::Aborted) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(pairing = %descriptor, error = %err, "pairing failed");
                    let aborted = matches!(err, BenchError::Aborted);
                    failures.push(FailureRecord::new(category, size, &err));
                    if aborted {
                        break 'pairings;
                    }
                }
            }
        }
    }

    Ok(BenchmarkRun {
        string_operations,
        json_operations,
        failures,
        metadata: RunMetadata {
            target,
            iterations: config.iterations,
            warmup_iterations: config.warmup,
            timestamp,
            value_sizes: config.value_sizes.clone(),
            json_sizes: config.json_sizes.clone(),
        },
    })
}

async fn measure_pairing<S: KvStore, R: rand::Rng>(
    collector: &Collector<'_, S>,
    config: &BenchmarkConfig,
    size: SizeDescriptor,
    rng: &mut R,
) -> Result<BTreeMap<OperationKind, OperationStats>, BenchError> {
    let payload = Payload::generate(size, rng);
    let keys = KeyTemplate::new(config.key_prefix.as_str(), size);
    let samples = collector.collect_cycle(size, &keys, &payload).await?;

    let mut ops = BTreeMap::new();
    for (kind, samples) in samples {
        ops.insert(kind, stats::aggregate(&samples, &config.percentiles)?);
    }
    Ok(ops)
}
