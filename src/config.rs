use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::sample::ValueCategory;

pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_WARMUP: usize = 10;
/// Scalar payload sizes in bytes.
pub const DEFAULT_VALUE_SIZES: [u64; 3] = [10, 100, 1000];
/// Structured payload sizes in fields.
pub const DEFAULT_JSON_SIZES: [u64; 3] = [1, 10, 100];
pub const DEFAULT_PERCENTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_KEY_PREFIX: &str = "benchmark";

/// Lower bounds (exclusive) of the throughput rating buckets, in ops/sec.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingThresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
}

impl Default for RatingThresholds {
    fn default() -> Self {
        Self {
            excellent: 5000.0,
            good: 1000.0,
            acceptable: 500.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    pub endpoint: Url,
    pub iterations: usize,
    pub warmup: usize,
    pub value_sizes: Vec<u64>,
    pub json_sizes: Vec<u64>,
    pub percentiles: Vec<f64>,
    pub request_timeout: Duration,
    pub key_prefix: String,
    /// Fixes payload generation when set.
    pub seed: Option<u64>,
}

impl BenchmarkConfig {
    pub fn try_new(endpoint: impl AsRef<str>) -> Result<Self> {
        let endpoint = Url::parse(endpoint.as_ref())
            .with_context(|| format!("invalid endpoint URL: {}", endpoint.as_ref()))?;
        if endpoint.cannot_be_a_base() {
            return Err(anyhow!("endpoint {} cannot be used as a base URL", endpoint));
        }

        Ok(Self {
            endpoint,
            iterations: DEFAULT_ITERATIONS,
            warmup: DEFAULT_WARMUP,
            value_sizes: DEFAULT_VALUE_SIZES.to_vec(),
            json_sizes: DEFAULT_JSON_SIZES.to_vec(),
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            seed: None,
        })
    }

    /// Builds the endpoint from a host (optionally carrying a scheme) and port.
    pub fn for_host(host: &str, port: u16) -> Result<Self> {
        let host = host.trim_end_matches('/');
        let endpoint = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}:{}", host, port)
        } else {
            format!("http://{}:{}", host, port)
        };
        Self::try_new(endpoint)
    }

    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        if iterations == 0 {
            return Err(anyhow!("iterations must be greater than zero"));
        }
        self.iterations = iterations;
        Ok(self)
    }

    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn with_value_sizes(mut self, sizes: Vec<u64>) -> Result<Self> {
        self.value_sizes = validate_sizes("value", sizes)?;
        Ok(self)
    }

    pub fn with_json_sizes(mut self, sizes: Vec<u64>) -> Result<Self> {
        self.json_sizes = validate_sizes("json", sizes)?;
        Ok(self)
    }

    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Result<Self> {
        if let Some(bad) = percentiles.iter().find(|p| !(**p > 0.0 && **p <= 1.0)) {
            return Err(anyhow!("percentile {} must be within (0, 1]", bad));
        }
        self.percentiles = percentiles;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        if !request_timeout.is_zero() {
            self.request_timeout = request_timeout;
        }
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(anyhow!("key prefix must not be empty"));
        }
        self.key_prefix = prefix;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn sizes(&self, category: ValueCategory) -> &[u64] {
        match category {
            ValueCategory::Scalar => &self.value_sizes,
            ValueCategory::Structured => &self.json_sizes,
        }
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn validate_sizes(label: &str, mut sizes: Vec<u64>) -> Result<Vec<u64>> {
    if sizes.is_empty() {
        return Err(anyhow!("{} sizes must not be empty", label));
    }
    if sizes.contains(&0) {
        return Err(anyhow!("{} sizes must be greater than zero", label));
    }
    sizes.sort_unstable();
    sizes.dedup();
    Ok(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BenchmarkConfig::for_host("localhost", 3000).unwrap();
        assert_eq!(config.endpoint.as_str(), "http://localhost:3000/");
        assert_eq!(config.iterations, 100);
        assert_eq!(config.warmup, 10);
        assert_eq!(config.sizes(ValueCategory::Scalar), &[10, 100, 1000]);
        assert_eq!(config.sizes(ValueCategory::Structured), &[1, 10, 100]);
    }

    #[test]
    fn host_may_carry_scheme() {
        let config = BenchmarkConfig::for_host("https://volt.internal/", 8443).unwrap();
        assert_eq!(config.endpoint.as_str(), "https://volt.internal:8443/");
    }

    #[test]
    fn rejects_degenerate_values() {
        let config = BenchmarkConfig::try_new("http://localhost:3000").unwrap();
        assert!(config.clone().with_iterations(0).is_err());
        assert!(config.clone().with_value_sizes(vec![]).is_err());
        assert!(config.clone().with_json_sizes(vec![1, 0]).is_err());
        assert!(config.clone().with_percentiles(vec![0.0]).is_err());
        assert!(config.clone().with_percentiles(vec![1.5]).is_err());
        assert!(config.with_key_prefix("").is_err());
        assert!(BenchmarkConfig::try_new("not a url").is_err());
    }

    #[test]
    fn sizes_are_sorted_and_deduplicated() {
        let config = BenchmarkConfig::try_new("http://localhost:3000")
            .unwrap()
            .with_value_sizes(vec![1000, 10, 100, 10])
            .unwrap();
        assert_eq!(config.value_sizes, vec![10, 100, 1000]);
    }

    #[test]
    fn zero_timeout_keeps_default() {
        let config = BenchmarkConfig::try_new("http://localhost:3000")
            .unwrap()
            .with_request_timeout(Duration::ZERO);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
