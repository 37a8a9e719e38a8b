use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voltbench::{
    render_markdown, run_benchmark, summarize, AbortHandle, BenchmarkConfig, BenchmarkRun,
    ComparativeSummary, RatingThresholds, ValueCategory,
};

#[derive(Parser, Debug)]
#[command(
    name = "voltbench",
    about = "Measure latency and throughput of a Volt key-value server"
)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark against a live server and write the results document
    Run {
        /// Host where the Volt server is running (a scheme may be included)
        host: String,

        /// Port the Volt server listens on
        port: u16,

        /// Where to write the JSON results
        #[arg(long, default_value = "volt_benchmark_results.json")]
        output: PathBuf,

        /// Measured iterations per operation and size
        #[arg(long, default_value_t = voltbench::DEFAULT_ITERATIONS)]
        iterations: usize,

        /// Untimed warm-up cycles per size
        #[arg(long, default_value_t = voltbench::DEFAULT_WARMUP)]
        warmup: usize,

        /// Scalar value sizes in bytes (comma separated)
        #[arg(long, value_delimiter = ',')]
        value_sizes: Option<Vec<u64>>,

        /// Structured value sizes in fields (comma separated)
        #[arg(long, value_delimiter = ',')]
        json_sizes: Option<Vec<u64>>,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,

        /// Namespace prepended to every benchmark key
        #[arg(long, default_value = voltbench::DEFAULT_KEY_PREFIX)]
        key_prefix: String,

        /// Seed for payload generation
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the comparative analysis of a results document
    Analyze {
        results: PathBuf,

        /// Emit the analysis as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Render a results document as a Markdown report
    Report {
        results: PathBuf,

        /// Where to write the report; printed to stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.cmd {
        Command::Run {
            host,
            port,
            output,
            iterations,
            warmup,
            value_sizes,
            json_sizes,
            timeout_secs,
            key_prefix,
            seed,
        } => {
            let mut config = BenchmarkConfig::for_host(&host, port)?
                .with_iterations(iterations)?
                .with_warmup(warmup)
                .with_request_timeout(Duration::from_secs(timeout_secs))
                .with_key_prefix(key_prefix)?;
            if let Some(sizes) = value_sizes {
                config = config.with_value_sizes(sizes)?;
            }
            if let Some(sizes) = json_sizes {
                config = config.with_json_sizes(sizes)?;
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            run(config, &output).await
        }
        Command::Analyze { results, json } => {
            let run = BenchmarkRun::load(&results)?;
            let summary = summarize(&run, &RatingThresholds::default())
                .with_context(|| format!("{} has no measurements to analyze", results.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&run, &summary);
            }
            Ok(())
        }
        Command::Report { results, output } => {
            let run = BenchmarkRun::load(&results)?;
            let summary = summarize(&run, &RatingThresholds::default()).ok();
            let doc = render_markdown(&run, summary.as_ref())?;
            match output {
                Some(path) => {
                    fs::write(&path, doc)
                        .with_context(|| format!("failed to write report {}", path.display()))?;
                    info!(path = %path.display(), "report written");
                }
                None => print!("{}", doc),
            }
            Ok(())
        }
    }
}

async fn run(config: BenchmarkConfig, output: &Path) -> Result<()> {
    let abort = AbortHandle::new();
    let signal = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current call");
            signal.abort();
        }
    });

    let run = run_benchmark(&config, &abort).await?;
    run.save(output)?;
    info!(path = %output.display(), "results saved");

    if let Ok(summary) = summarize(&run, &RatingThresholds::default()) {
        print_summary(&run, &summary);
    }

    if !run.is_complete() {
        for failure in &run.failures {
            eprintln!(
                "  {} {} {}: {}",
                failure.category,
                failure.size,
                failure.category.unit(),
                failure.error
            );
        }
        return Err(anyhow!(
            "{} of the benchmark pairings failed; partial results written to {}",
            run.failures.len(),
            output.display()
        ));
    }

    Ok(())
}

fn print_summary(run: &BenchmarkRun, summary: &ComparativeSummary) {
    println!("Target: {}", run.metadata.target);
    println!(
        "Iterations: {} (warm-up {})",
        run.metadata.iterations, run.metadata.warmup_iterations
    );
    println!("Fastest: {}", summary.fastest);
    println!("Slowest: {}", summary.slowest);
    println!("Performance ratio: {:.2}x", summary.performance_ratio);
    for category in ValueCategory::ALL {
        match summary.size_impact(category) {
            Some(impact) => println!("Size impact ({}): {:.2}%", category, impact),
            None => println!("Size impact ({}): n/a", category),
        }
    }
    let latency = &summary.latency;
    println!(
        "Latency (ms): p50={:.3} p90={:.3} p99={:.3} max={:.3}",
        latency.p50, latency.p90, latency.p99, latency.max
    );
    if let Some(tail) = &summary.tail_latency {
        println!(
            "Widest tail: {} {} {} {}, P99/P50 {:.2}x ({} variability)",
            tail.operation,
            tail.category,
            tail.size,
            tail.category.unit(),
            tail.ratio,
            tail.variability
        );
    }
    println!(
        "Average throughput: {:.2} ops/sec ({})",
        summary.average_throughput, summary.rating
    );
    for recommendation in &summary.recommendations {
        println!("- {}", recommendation);
    }
}
