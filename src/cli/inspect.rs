//! CLI commands: `pipescope steps | critical-path | metrics | invocations | summary`
//!
//! Read-only views over one run bundle.

use std::sync::Arc;

use pipescope_trace::{
    invocation_steps, peak_concurrency, timeline_bounds, timeline_duration_ms, FailureRecord,
    ProcessedStep, RunBundle, RuntimeMetrics, TraceView,
};

fn view(bundle: &RunBundle) -> TraceView {
    let mut view = TraceView::new();
    view.set_events(&Arc::from(bundle.events.clone()));
    view.set_timeline(&Arc::from(bundle.timeline.clone()));
    view
}

/// Print per-step records.
pub fn steps(bundle: &RunBundle, json: bool) -> anyhow::Result<()> {
    let view = view(bundle);

    if json {
        println!("{}", serde_json::to_string_pretty(view.steps())?);
        return Ok(());
    }

    println!();
    println!("  Steps  ({})", bundle.run.pipeline_name);
    print_step_table(view.steps(), |step| view.is_critical(&step.name));
    println!();
    Ok(())
}

/// Print the steps on the critical path, in timeline order.
pub fn critical_path(bundle: &RunBundle, json: bool) -> anyhow::Result<()> {
    let view = view(bundle);

    if json {
        println!("{}", serde_json::to_string_pretty(view.critical_path())?);
        return Ok(());
    }

    println!();
    println!("  Critical Path  ({})", bundle.run.pipeline_name);
    println!("  {}", "-".repeat(48));
    if view.critical_path().is_empty() {
        println!("  (timeline is empty)");
    } else {
        let mut seen = Vec::new();
        for entry in bundle.timeline.iter() {
            if view.is_critical(&entry.step_name) && !seen.contains(&&entry.step_name) {
                seen.push(&entry.step_name);
                println!("  * {}", entry.step_name);
            }
        }
    }
    if let Some(ms) = timeline_duration_ms(&bundle.timeline) {
        println!("  {}", "-".repeat(48));
        println!("  Span: {}", format_ms(ms as f64));
    }
    println!();
    Ok(())
}

/// Print runtime metrics.
pub fn metrics(bundle: &RunBundle, json: bool) -> anyhow::Result<()> {
    let view = view(bundle);
    let metrics = view.metrics();

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        return Ok(());
    }
    let origin = if view.finish().and_then(|f| f.metrics()).is_some() {
        "finish payload"
    } else {
        "event log"
    };

    println!();
    println!("  Runtime Metrics  (from {origin})");
    print_metrics(&metrics);
    println!();
    Ok(())
}

/// Print each invocation of a step.
pub fn invocations(bundle: &RunBundle, step: &str) -> anyhow::Result<()> {
    let runs = invocation_steps(&bundle.events, step);

    println!();
    println!("  Invocations of '{step}'");
    if runs.is_empty() {
        println!("  {}", "-".repeat(72));
        println!("  (step never started)");
    } else {
        print_step_table(&runs, |_| false);
    }
    println!();
    Ok(())
}

/// Print a one-screen overview of the run.
pub fn summary(bundle: &RunBundle) -> anyhow::Result<()> {
    let view = view(bundle);
    let run = &bundle.run;

    let failed = view
        .steps()
        .iter()
        .filter(|s| s.status == pipescope_trace::StepStatus::Failed)
        .count();
    let retried = view.steps().iter().filter(|s| s.was_retried()).count();

    println!();
    println!("  Run {}", run.run_id);
    println!("  {}", "-".repeat(48));
    println!("  Pipeline:     {} ({})", run.pipeline_name, run.pipeline_hash);
    println!("  Status:       {}", run.status);
    println!("  Started:      {}", run.start_time);
    if let Some(end) = &run.end_time {
        println!("  Ended:        {end}");
    }
    println!("  Duration:     {}", format_ms(run.duration_seconds * 1000.0));
    println!("  Events:       {}", bundle.events.len());
    println!(
        "  Steps:        {} ({} failed, {} retried)",
        view.steps().len(),
        failed,
        retried
    );
    if let Some((start, end)) = timeline_bounds(&bundle.timeline) {
        println!(
            "  Timeline:     {} .. {}",
            start.format("%H:%M:%S%.3f"),
            end.format("%H:%M:%S%.3f")
        );
        println!("  Concurrency:  {}", peak_concurrency(&bundle.timeline));
    }
    if !view.critical_path().is_empty() {
        let names: Vec<&str> = view.critical_path().iter().map(String::as_str).collect();
        println!("  Critical:     {}", names.join(", "));
    }
    if let Some(finish) = view.finish() {
        if let Some(error) = finish.error() {
            println!("  Error:        {error}");
        }
        print_failures("Failures", &finish.failures());
        print_failures("Diagnostics", &finish.diagnostics());
    }
    println!();
    Ok(())
}

fn print_failures(title: &str, records: &[FailureRecord]) {
    if records.is_empty() {
        return;
    }
    println!("  {}", "-".repeat(48));
    println!("  {title}");
    for record in records {
        println!(
            "  {:<20} {:<10} {:<13} {}",
            record.step.as_deref().unwrap_or("(run)"),
            record.kind.as_str(),
            record.source.as_str(),
            record.message().map(truncate).unwrap_or_default()
        );
    }
}

fn print_step_table(steps: &[ProcessedStep], critical: impl Fn(&ProcessedStep) -> bool) {
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<28} {:<10} {:>10} {:>8}  Error",
        "Step", "Status", "Duration", "Attempts"
    );
    println!("  {}", "-".repeat(72));

    if steps.is_empty() {
        println!("  (no steps recorded)");
        return;
    }

    for step in steps {
        let marker = if critical(step) { "*" } else { " " };
        let duration = step.duration_ms.map(format_ms).unwrap_or_else(|| "-".into());
        let error = step.error.as_deref().map(truncate).unwrap_or_default();
        println!(
            "  {marker}{:<27} {:<10} {:>10} {:>8}  {}",
            step.name, step.status.as_str(), duration, step.attempts, error
        );
    }
}

fn print_metrics(metrics: &RuntimeMetrics) {
    println!("  {}", "-".repeat(56));
    println!("  Tokens:            {}", metrics.tokens);
    println!("  Suspends:          {}", metrics.suspends);
    println!(
        "  Barriers:          {} waits, {} releases, {} timeouts",
        metrics.barriers.waits, metrics.barriers.releases, metrics.barriers.timeouts
    );
    println!(
        "  Maps:              {} started, {} workers, {} completed",
        metrics.maps.started, metrics.maps.workers, metrics.maps.completed
    );

    if !metrics.step_latency.is_empty() {
        println!("  {}", "-".repeat(56));
        println!(
            "  {:<24} {:>6} {:>10} {:>10}",
            "Step", "Count", "Mean", "Max"
        );
        for (name, stats) in &metrics.step_latency {
            let mean = stats
                .mean_s()
                .map(|s| format_ms(s * 1000.0))
                .unwrap_or_else(|| "-".into());
            println!(
                "  {:<24} {:>6} {:>10} {:>10}",
                name,
                stats.count,
                mean,
                format_ms(stats.max_s * 1000.0)
            );
        }
    }
}

fn format_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.0}ms")
    }
}

fn truncate(s: &str) -> String {
    const MAX: usize = 40;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX - 3).collect();
        format!("{head}...")
    }
}
