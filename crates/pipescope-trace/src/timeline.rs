//! Timeline - Duration range and concurrency over step intervals

use chrono::{DateTime, Utc};

use crate::event::{parse_timestamp, TimelineEntry};

/// Earliest start and latest end across the timeline
#[must_use]
pub fn timeline_bounds(timeline: &[TimelineEntry]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let starts = timeline.iter().filter_map(|e| parse_timestamp(&e.start_time));
    let ends = timeline.iter().filter_map(|e| parse_timestamp(&e.end_time));
    let first = starts.min()?;
    let last = ends.max()?;
    Some((first, last.max(first)))
}

/// Span of the timeline in milliseconds
#[must_use]
pub fn timeline_duration_ms(timeline: &[TimelineEntry]) -> Option<i64> {
    timeline_bounds(timeline).map(|(first, last)| (last - first).num_milliseconds())
}

/// Largest number of step invocations running at the same instant.
///
/// An invocation that ends exactly when another starts does not overlap it.
#[must_use]
pub fn peak_concurrency(timeline: &[TimelineEntry]) -> usize {
    let mut edges: Vec<(i64, i32)> = timeline
        .iter()
        .filter_map(TimelineEntry::interval_ms)
        .flat_map(|(start, end)| [(start, 1), (end, -1)])
        .collect();

    // Ends sort before starts at the same instant.
    edges.sort_unstable();

    let mut running: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in edges {
        running += delta;
        peak = peak.max(running);
    }
    peak as usize
}
