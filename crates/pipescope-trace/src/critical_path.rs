//! Critical path - The chain of step intervals that bounds a run
//!
//! Each timeline entry is a closed interval weighted by its duration. An
//! interval may follow another when it starts at or after the other's end
//! (no slack). The critical path is the chain with the largest cumulative
//! weight; ties go to the chain that ends last, then to the chain that
//! starts first.

use std::collections::BTreeSet;

use tracing::debug;

use crate::event::TimelineEntry;

#[derive(Debug, Clone, Copy)]
struct Interval<'a> {
    name: &'a str,
    start: i64,
    end: i64,
}

impl Interval<'_> {
    fn duration(&self) -> i64 {
        self.end - self.start
    }
}

/// Best chain ending at a given interval
#[derive(Debug, Clone, Copy)]
struct Chain {
    weight: i64,
    origin: i64,
    prev: Option<usize>,
}

/// Compute the set of step names lying on the critical path.
///
/// Entries whose timestamps cannot be parsed are ignored. A step that
/// appears on the path more than once is reported once.
#[must_use]
pub fn compute_critical_path(timeline: &[TimelineEntry]) -> BTreeSet<String> {
    let mut intervals: Vec<Interval<'_>> = timeline
        .iter()
        .filter_map(|entry| {
            let (start, end) = entry.interval_ms()?;
            Some(Interval {
                name: &entry.step_name,
                start,
                end,
            })
        })
        .collect();

    if intervals.is_empty() {
        return BTreeSet::new();
    }

    // Stable: entries with equal bounds keep their input order.
    intervals.sort_by_key(|iv| (iv.start, iv.end));

    let mut chains: Vec<Chain> = Vec::with_capacity(intervals.len());
    for (i, iv) in intervals.iter().enumerate() {
        // Any predecessor ends before `iv` starts, so it sorts before `iv`.
        let mut best: Option<usize> = None;
        for (j, candidate) in intervals[..i].iter().enumerate() {
            if candidate.end > iv.start {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    chains[j].weight > chains[b].weight
                        || (chains[j].weight == chains[b].weight
                            && chains[j].origin < chains[b].origin)
                }
            };
            if better {
                best = Some(j);
            }
        }

        chains.push(match best {
            Some(b) => Chain {
                weight: chains[b].weight + iv.duration(),
                origin: chains[b].origin,
                prev: Some(b),
            },
            None => Chain {
                weight: iv.duration(),
                origin: iv.start,
                prev: None,
            },
        });
    }

    let mut tail = 0;
    for i in 1..intervals.len() {
        let (cur, top) = (&chains[i], &chains[tail]);
        let better = (cur.weight, intervals[i].end, -cur.origin)
            > (top.weight, intervals[tail].end, -top.origin);
        if better {
            tail = i;
        }
    }

    let mut path = BTreeSet::new();
    let mut cursor = Some(tail);
    while let Some(i) = cursor {
        path.insert(intervals[i].name.to_string());
        cursor = chains[i].prev;
    }

    debug!(
        entries = timeline.len(),
        on_path = path.len(),
        weight_ms = chains[tail].weight,
        "Computed critical path"
    );
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, SecondsFormat, Utc};

    fn ts(ms: i64) -> String {
        DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms)
            .unwrap()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn entry(name: &str, start: i64, end: i64) -> TimelineEntry {
        TimelineEntry::new(name, ts(start), ts(end))
    }

    fn names(path: &BTreeSet<String>) -> Vec<&str> {
        path.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_timeline() {
        assert!(compute_critical_path(&[]).is_empty());
    }

    #[test]
    fn test_single_entry() {
        let path = compute_critical_path(&[entry("only", 0, 5)]);
        assert_eq!(names(&path), vec!["only"]);
    }

    #[test]
    fn test_sequential_chain() {
        let timeline = vec![entry("a", 0, 10), entry("b", 10, 30), entry("c", 30, 35)];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_follows_longest_branch() {
        let timeline = vec![
            entry("root", 0, 10),
            entry("short", 10, 20),
            entry("long", 10, 50),
            entry("sink", 50, 60),
        ];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["long", "root", "sink"]);
    }

    #[test]
    fn test_equal_chains_prefer_latest_end() {
        // x+y and p+q both weigh 20ms; p+q ends later.
        let timeline = vec![
            entry("x", 0, 5),
            entry("y", 5, 20),
            entry("p", 1, 16),
            entry("q", 16, 21),
        ];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["p", "q"]);
    }

    #[test]
    fn test_equal_chains_same_end_prefer_earliest_start() {
        let timeline = vec![entry("late", 2, 7), entry("early", 0, 5), entry("tail", 10, 20)];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["early", "tail"]);
    }

    #[test]
    fn test_overlapping_intervals_do_not_chain() {
        let timeline = vec![entry("a", 0, 10), entry("b", 5, 12)];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["a"]);
    }

    #[test]
    fn test_repeated_step_collapses_by_name() {
        let timeline = vec![entry("a", 0, 10), entry("b", 10, 20), entry("a", 20, 30)];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["a", "b"]);
    }

    #[test]
    fn test_unparseable_entries_ignored() {
        let timeline = vec![
            TimelineEntry::new("broken", "not-a-time", ts(100)),
            entry("ok", 0, 10),
        ];
        let path = compute_critical_path(&timeline);
        assert_eq!(names(&path), vec!["ok"]);
    }
}
