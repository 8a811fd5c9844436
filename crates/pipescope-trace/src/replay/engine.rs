//! Replay Engine - Node state as of an elapsed-time offset into a run

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::event::{EventType, PipelineEvent};
use crate::step::StepStatus;

/// Offsets of a step's latest invocation, in milliseconds since run start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StepTiming {
    /// Start offset (None when only the end was replayed)
    pub start: Option<u64>,
    /// End offset (None while running)
    pub end: Option<u64>,
}

/// Node state with every event at or before `time_ms` applied
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    /// Elapsed time the snapshot was taken at
    pub time_ms: u64,
    /// Status per step
    pub active_steps: BTreeMap<String, StepStatus>,
    /// Timing per step
    pub step_timings: BTreeMap<String, StepTiming>,
}

/// Deterministic, time-indexed replay of a run's event log.
///
/// Every seek re-derives the state from scratch, so the result depends only
/// on the loaded log and the target time, never on earlier seeks.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    events: Arc<[PipelineEvent]>,
    /// Event indices in `seq` order, paired with their offset from run start
    schedule: Vec<(usize, Option<u64>)>,
    duration_ms: u64,
    current_time_ms: u64,
    playing: bool,
    speed: f64,
    active_steps: BTreeMap<String, StepStatus>,
    step_timings: BTreeMap<String, StepTiming>,
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayEngine {
    /// Create an idle engine with no run loaded
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::from(Vec::new()),
            schedule: Vec::new(),
            duration_ms: 0,
            current_time_ms: 0,
            playing: false,
            speed: 1.0,
            active_steps: BTreeMap::new(),
            step_timings: BTreeMap::new(),
        }
    }

    /// Load the event log for a run, rewinding to the start.
    pub fn set_events(&mut self, events: impl Into<Arc<[PipelineEvent]>>) {
        let events = events.into();

        let run_start = events.iter().filter_map(PipelineEvent::timestamp_utc).min();
        let mut schedule: Vec<(usize, Option<u64>)> = events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let offset = run_start.zip(event.timestamp_utc()).map(|(start, at)| {
                    u64::try_from((at - start).num_milliseconds()).unwrap_or(0)
                });
                (i, offset)
            })
            .collect();
        schedule.sort_by_key(|&(i, _)| events[i].seq);

        self.duration_ms = schedule.iter().filter_map(|&(_, off)| off).max().unwrap_or(0);
        self.schedule = schedule;
        self.events = events;
        self.current_time_ms = 0;
        self.playing = false;
        self.active_steps.clear();
        self.step_timings.clear();

        debug!(
            events = self.events.len(),
            duration_ms = self.duration_ms,
            "Replay loaded"
        );
    }

    /// Drop the loaded run and return to the idle state
    pub fn reset(&mut self) {
        let speed = self.speed;
        *self = Self::new();
        self.speed = speed;
        trace!("Replay reset");
    }

    /// Re-derive node state as of `time_ms` elapsed since run start.
    ///
    /// Seeking with no run loaded leaves an empty snapshot.
    pub fn seek(&mut self, time_ms: u64) {
        self.current_time_ms = time_ms;
        self.active_steps.clear();
        self.step_timings.clear();

        for &(i, offset) in &self.schedule {
            let Some(offset) = offset.filter(|&off| off <= time_ms) else {
                continue;
            };
            let event = &self.events[i];
            if !event.is_step_scoped() {
                continue;
            }
            let Some(name) = event.step_name.as_deref() else {
                continue;
            };

            match event.event_type {
                EventType::StepStart => {
                    self.active_steps.insert(name.to_string(), StepStatus::Running);
                    self.step_timings.insert(
                        name.to_string(),
                        StepTiming {
                            start: Some(offset),
                            end: None,
                        },
                    );
                }
                EventType::StepEnd | EventType::StepError => {
                    let status = if event.event_type == EventType::StepEnd {
                        StepStatus::Success
                    } else {
                        StepStatus::Failed
                    };
                    self.active_steps.insert(name.to_string(), status);
                    self.step_timings.entry(name.to_string()).or_default().end = Some(offset);
                }
                _ => {}
            }
        }
    }

    /// Start advancing on [`ReplayEngine::tick`]. Playing from the end of
    /// the run rewinds to the start first.
    pub fn play(&mut self) {
        if !self.is_loaded() {
            return;
        }
        if self.current_time_ms >= self.duration_ms {
            self.seek(0);
        }
        self.playing = true;
    }

    /// Freeze the current time
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance the playback clock by `elapsed` wall-clock time scaled by the
    /// playback speed. Returns whether playback is still running; it stops
    /// on its own at the end of the run.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.playing {
            return false;
        }
        let advance = (elapsed.as_millis() as f64 * self.speed).round() as u64;
        let next = self
            .current_time_ms
            .saturating_add(advance)
            .min(self.duration_ms);
        self.seek(next);
        if next >= self.duration_ms {
            self.playing = false;
            debug!(time_ms = next, "Replay reached end of run");
        }
        self.playing
    }

    /// Set the playback speed multiplier. Non-positive or non-finite values
    /// are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed;
        }
    }

    /// Current state as an owned snapshot
    #[must_use]
    pub fn snapshot(&self) -> ReplaySnapshot {
        ReplaySnapshot {
            time_ms: self.current_time_ms,
            active_steps: self.active_steps.clone(),
            step_timings: self.step_timings.clone(),
        }
    }

    /// Whether a run is loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.events.is_empty()
    }

    /// Loaded event log
    #[must_use]
    pub fn events(&self) -> &Arc<[PipelineEvent]> {
        &self.events
    }

    /// Offset of the last event, in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Current scrub position, in milliseconds
    #[must_use]
    pub fn current_time_ms(&self) -> u64 {
        self.current_time_ms
    }

    /// Whether playback is running
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback speed multiplier
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Status per step at the current position
    #[must_use]
    pub fn active_steps(&self) -> &BTreeMap<String, StepStatus> {
        &self.active_steps
    }

    /// Timing per step at the current position
    #[must_use]
    pub fn step_timings(&self) -> &BTreeMap<String, StepTiming> {
        &self.step_timings
    }
}
