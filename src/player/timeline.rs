//! Position polling loop
//!
//! A self-rescheduling chain of poll cycles reconciles the host-reported
//! playback position with the local timestamp. Each cycle checks a stop flag
//! first, so cancelling a chain means its next cycle never runs; starting a
//! chain cancels the previous one, keeping at most one chain live.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::time::{Duration, Instant, sleep};

use super::Player;
use crate::signal::TimeStep;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reference points carried between poll cycles.
#[derive(Debug, Default)]
pub struct TimelineClock {
    last_cycle_at: Option<Instant>,
    last_position_ms: Option<u64>,
}

impl Player {
    /// Start a fresh poll chain, cancelling any live one first.
    pub(crate) async fn start_poll_chain(&self) {
        let stop = Arc::new(AtomicBool::new(false));
        let previous = self.poll_stop.lock().await.replace(stop.clone());
        if let Some(previous) = previous {
            previous.store(true, Ordering::SeqCst);
        }

        // The span a stopped chain missed must not surface as one giant
        // delta; a restarted chain re-establishes its reference first.
        *self.clock.lock().await = TimelineClock::default();

        let player = self.clone();
        tokio::spawn(async move {
            loop {
                if stop.load(Ordering::SeqCst) {
                    tracing::debug!("Poll chain cancelled");
                    return;
                }
                if let Err(error) = player.poll_cycle().await {
                    tracing::warn!(%error, "Position poll failed");
                }
                sleep(POLL_INTERVAL).await;
            }
        });
    }

    /// Cancel the live poll chain's pending next cycle, if any.
    pub(crate) async fn stop_poll_chain(&self) {
        if let Some(stop) = self.poll_stop.lock().await.take() {
            stop.store(true, Ordering::SeqCst);
        }
    }

    /// One polling step.
    ///
    /// The first cycle only establishes the reference point. After that,
    /// while playing the timestamp follows the host position with the actual
    /// elapsed delta; while paused it is only re-synced (zero delta, flagged
    /// skipped) when the host position moved since the last cycle, which
    /// means a manual seek.
    pub(crate) async fn poll_cycle(&self) -> Result<()> {
        let position_ms = self.host.position().await?;
        let now = Instant::now();

        let mut clock = self.clock.lock().await;
        let Some(last_cycle_at) = clock.last_cycle_at else {
            clock.last_cycle_at = Some(now);
            clock.last_position_ms = Some(position_ms);
            return Ok(());
        };

        let delta_time = now.duration_since(last_cycle_at).as_secs_f64();
        let position_changed = clock.last_position_ms != Some(position_ms);
        clock.last_cycle_at = Some(now);
        clock.last_position_ms = Some(position_ms);
        drop(clock);

        let mut state = self.state.lock().await;
        if state.song.is_none() {
            return Ok(());
        }

        let step = if state.is_playing {
            Some(TimeStep {
                delta_time,
                skipped: None,
            })
        } else if position_changed {
            Some(TimeStep {
                delta_time: 0.0,
                skipped: Some(true),
            })
        } else {
            None
        };

        if let Some(step) = step {
            state.timestamp = position_ms as f64 / 1000.0;
            drop(state);
            self.signals.time_stepped.fire(step);
        }
        Ok(())
    }
}
