use std::fmt::Write;

use crate::analysis::ComparativeSummary;
use crate::report::BenchmarkRun;
use crate::sample::ValueCategory;

/// Renders a run and its comparative summary as a Markdown document.
pub fn render_markdown(
    run: &BenchmarkRun,
    summary: Option<&ComparativeSummary>,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_report(&mut out, run, summary)?;
    Ok(out)
}

fn write_report(
    out: &mut String,
    run: &BenchmarkRun,
    summary: Option<&ComparativeSummary>,
) -> std::fmt::Result {
    let meta = &run.metadata;
    writeln!(out, "# Volt Benchmark Report")?;
    writeln!(out)?;
    writeln!(out, "- Target: {}", meta.target)?;
    writeln!(out, "- Date: {}", meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(
        out,
        "- Iterations: {} (after {} warm-up iterations)",
        meta.iterations, meta.warmup_iterations
    )?;
    writeln!(out)?;

    for category in ValueCategory::ALL {
        write_category(out, run, category)?;
    }

    if !run.failures.is_empty() {
        writeln!(out, "## Failures")?;
        writeln!(out)?;
        for failure in &run.failures {
            writeln!(
                out,
                "- {} {} {}: {}",
                failure.category,
                failure.size,
                failure.category.unit(),
                failure.error
            )?;
        }
        writeln!(out)?;
    }

    match summary {
        Some(summary) => write_conclusion(out, summary),
        None => writeln!(out, "No completed measurements to summarize."),
    }
}

fn write_category(
    out: &mut String,
    run: &BenchmarkRun,
    category: ValueCategory,
) -> std::fmt::Result {
    let (title, size_header) = match category {
        ValueCategory::Scalar => ("String Operations", "Value Size"),
        ValueCategory::Structured => ("JSON Operations", "Fields"),
    };
    writeln!(out, "## {}", title)?;
    writeln!(out)?;

    let results = run.results(category);
    if results.is_empty() {
        writeln!(out, "No {} operation results available.", category)?;
        return writeln!(out);
    }

    writeln!(
        out,
        "| {} | Operation | Min (ms) | Max (ms) | Avg (ms) | P99 (ms) | Ops/sec |",
        size_header
    )?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for (size, ops) in results {
        for (operation, stats) in ops {
            let p99 = stats
                .percentile("p99")
                .map(|v| format!("{:.3}", v))
                .unwrap_or_else(|| "n/a".to_string());
            writeln!(
                out,
                "| {} {} | {} | {:.3} | {:.3} | {:.3} | {} | {:.2} |",
                size,
                category.unit(),
                operation,
                stats.min,
                stats.max,
                stats.avg,
                p99,
                stats.ops_per_second
            )?;
        }
    }
    writeln!(out)
}

fn write_conclusion(out: &mut String, summary: &ComparativeSummary) -> std::fmt::Result {
    writeln!(out, "## Conclusion")?;
    writeln!(out)?;
    writeln!(
        out,
        "The Volt database shows {} performance in this benchmark, with an average throughput of {:.2} operations per second.",
        summary.rating, summary.average_throughput
    )?;
    writeln!(out)?;
    writeln!(out, "The fastest operation was {}.", summary.fastest)?;
    writeln!(out, "The slowest operation was {}.", summary.slowest)?;
    writeln!(
        out,
        "Performance ratio (fastest / slowest): {:.2}x.",
        summary.performance_ratio
    )?;
    writeln!(out)?;

    for category in ValueCategory::ALL {
        if let Some(impact) = summary.size_impact(category) {
            let direction = if impact >= 0.0 { "decreases" } else { "increases" };
            writeln!(
                out,
                "- {} values: throughput {} by {:.2}% from the smallest to the largest size.",
                category,
                direction,
                impact.abs()
            )?;
        }
    }

    let latency = &summary.latency;
    writeln!(out)?;
    writeln!(
        out,
        "Mean latency across pairings (ms): min {:.3}, p50 {:.3}, p90 {:.3}, p99 {:.3}, max {:.3}.",
        latency.min, latency.p50, latency.p90, latency.p99, latency.max
    )?;
    if let Some(tail) = &summary.tail_latency {
        writeln!(
            out,
            "The widest tail was {} on {} data with {} {}: P99/P50 ratio {:.2}x, {} latency variability.",
            tail.operation,
            tail.category,
            tail.size,
            tail.category.unit(),
            tail.ratio,
            tail.variability
        )?;
    }

    writeln!(out)?;
    writeln!(out, "### Recommendations")?;
    writeln!(out)?;
    for recommendation in &summary.recommendations {
        writeln!(out, "- {}", recommendation)?;
    }
    Ok(())
}
