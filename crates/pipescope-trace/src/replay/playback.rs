//! Playback - Timer-driven replay and its session lifecycle

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::engine::{ReplayEngine, ReplaySnapshot};
use crate::event::PipelineEvent;

/// Snapshots buffered per subscriber before it starts lagging
const SNAPSHOT_CAPACITY: usize = 64;

/// Background clock that advances a [`ReplayEngine`] once per tick.
///
/// Each tick performs one seek and publishes the resulting snapshot. The
/// task ends when cancelled, when dropped, or when the engine stops playing
/// (paused, or the end of the run was reached).
pub struct Playback {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    snapshots: broadcast::Sender<ReplaySnapshot>,
}

impl Playback {
    /// Start ticking `engine` every `tick`
    #[must_use]
    pub fn spawn(engine: Arc<RwLock<ReplayEngine>>, tick: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CAPACITY);

        let task_cancel = cancel.clone();
        let task_snapshots = snapshots.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("Playback cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        let (playing, snapshot) = {
                            let mut engine = engine.write().await;
                            let playing = engine.tick(tick);
                            (playing, engine.snapshot())
                        };
                        // No subscribers is fine
                        let _ = task_snapshots.send(snapshot);
                        if !playing {
                            debug!("Playback stopped");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle,
            snapshots,
        }
    }

    /// Receive a snapshot after every tick
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReplaySnapshot> {
        self.snapshots.subscribe()
    }

    /// Stop the clock. A tick that has not yet taken the engine lock is
    /// abandoned.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.handle.abort();
    }

    /// Whether the clock task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the clock task to exit
    pub async fn finished(&mut self) {
        match (&mut self.handle).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(error = %e, "Playback task failed"),
        }
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// A replay view's engine plus its playback clock.
///
/// Loading another run, pausing, replaying or disposing the session stops
/// the clock and waits for its task to exit first, so a stale tick never
/// advances the engine after it has been re-armed.
pub struct ReplaySession {
    engine: Arc<RwLock<ReplayEngine>>,
    tick: Duration,
    playback: Option<Playback>,
}

impl ReplaySession {
    /// Create an idle session that ticks every `tick` while playing
    #[must_use]
    pub fn new(tick: Duration) -> Self {
        Self {
            engine: Arc::new(RwLock::new(ReplayEngine::new())),
            tick,
            playback: None,
        }
    }

    /// Shared handle to the engine
    #[must_use]
    pub fn engine(&self) -> Arc<RwLock<ReplayEngine>> {
        Arc::clone(&self.engine)
    }

    /// Load a run's event log, stopping any playback
    pub async fn load(&mut self, events: impl Into<Arc<[PipelineEvent]>>) {
        self.stop_playback().await;
        self.engine.write().await.set_events(events);
    }

    /// Seek to `time_ms` and return the snapshot
    pub async fn seek(&self, time_ms: u64) -> ReplaySnapshot {
        let mut engine = self.engine.write().await;
        engine.seek(time_ms);
        engine.snapshot()
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> ReplaySnapshot {
        self.engine.read().await.snapshot()
    }

    /// Set the playback speed multiplier
    pub async fn set_speed(&self, speed: f64) {
        self.engine.write().await.set_speed(speed);
    }

    /// Start playback. Returns a receiver for per-tick snapshots, or `None`
    /// when no run is loaded.
    pub async fn play(&mut self) -> Option<broadcast::Receiver<ReplaySnapshot>> {
        self.stop_playback().await;
        {
            let mut engine = self.engine.write().await;
            engine.play();
            if !engine.is_playing() {
                return None;
            }
        }

        let playback = Playback::spawn(self.engine(), self.tick);
        let receiver = playback.subscribe();
        self.playback = Some(playback);
        Some(receiver)
    }

    /// Pause playback, keeping the current position
    pub async fn pause(&mut self) {
        self.stop_playback().await;
        self.engine.write().await.pause();
    }

    /// Whether the clock is running
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Stop the clock and drop the loaded run
    pub async fn dispose(&mut self) {
        self.stop_playback().await;
        self.engine.write().await.reset();
    }

    async fn stop_playback(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
            playback.finished().await;
        }
    }
}
