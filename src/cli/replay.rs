//! CLI command: `pipescope replay`
//!
//! Shows which nodes were running or finished at a point in the run, or
//! plays the run back in real time.

use std::time::Duration;

use pipescope_trace::{ReplaySession, ReplaySnapshot, RunBundle};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Print the node states at `at` milliseconds (end of run by default).
pub async fn seek(bundle: RunBundle, at: Option<u64>) -> anyhow::Result<()> {
    let mut session = ReplaySession::new(Duration::from_millis(50));
    session.load(bundle.events).await;

    let duration_ms = session.engine().read().await.duration_ms();
    let snapshot = session.seek(at.unwrap_or(duration_ms)).await;

    println!();
    println!(
        "  Replay {}  @ {}ms / {}ms",
        bundle.run.run_id, snapshot.time_ms, duration_ms
    );
    print_snapshot(&snapshot);
    println!();

    session.dispose().await;
    Ok(())
}

/// Play the run back, printing a line whenever node states change.
pub async fn play(bundle: RunBundle, tick: Duration, speed: f64) -> anyhow::Result<()> {
    let mut session = ReplaySession::new(tick);
    session.load(bundle.events).await;
    session.set_speed(speed).await;

    let duration_ms = session.engine().read().await.duration_ms();
    println!();
    println!(
        "  Playing {}  ({}ms at {}x, Ctrl+C to stop)",
        bundle.run.run_id, duration_ms, speed
    );
    println!("  {}", "-".repeat(56));

    let Some(mut rx) = session.play().await else {
        println!("  (no events to replay)");
        println!();
        return Ok(());
    };

    let mut last: Option<ReplaySnapshot> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                session.pause().await;
                println!("  (stopped)");
                break;
            }
            received = rx.recv() => match received {
                Ok(snapshot) => {
                    let done = snapshot.time_ms >= duration_ms;
                    print_changes(last.as_ref(), &snapshot);
                    last = Some(snapshot);
                    if done {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Replay output fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    if let Some(snapshot) = &last {
        println!("  {}", "-".repeat(56));
        print_snapshot(snapshot);
    }
    println!();

    session.dispose().await;
    Ok(())
}

fn print_snapshot(snapshot: &ReplaySnapshot) {
    println!("  {}", "-".repeat(56));
    println!("  {:<28} {:<10} {:>7} {:>7}", "Step", "Status", "Start", "End");
    println!("  {}", "-".repeat(56));

    if snapshot.active_steps.is_empty() {
        println!("  (nothing started yet)");
        return;
    }

    for (name, status) in &snapshot.active_steps {
        let timing = snapshot.step_timings.get(name);
        let start = timing
            .and_then(|t| t.start)
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".into());
        let end = timing
            .and_then(|t| t.end)
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".into());
        println!("  {:<28} {:<10} {:>7} {:>7}", name, status.as_str(), start, end);
    }
}

fn print_changes(previous: Option<&ReplaySnapshot>, current: &ReplaySnapshot) {
    for (name, status) in &current.active_steps {
        let before = previous.and_then(|p| p.active_steps.get(name));
        if before != Some(status) {
            println!("  {:>7}ms  {:<28} {}", current.time_ms, name, status);
        }
    }
}
