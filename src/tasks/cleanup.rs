//! Reset Token Cleanup Task
//!
//! Background job that periodically deletes expired password reset tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::ResetTokenStore;

// == Deletion Pass ==
/// Deletes every token that expired before the current wall-clock time.
///
/// Returns the number of deleted records.
pub async fn purge_expired_tokens(store: &dyn ResetTokenStore) -> Result<u64, StoreError> {
    store.delete_expired(Utc::now()).await
}

/// Runs one cleanup pass, logging the outcome.
///
/// Storage failures are logged as warnings and reported as `None`; the caller
/// is never interrupted by a failed pass.
pub async fn run_cleanup_pass(store: &dyn ResetTokenStore) -> Option<u64> {
    match purge_expired_tokens(store).await {
        Ok(count) => {
            info!("Deleted {} expired password reset tokens.", count);
            Some(count)
        }
        Err(e) => {
            warn!("Failed to delete expired password reset tokens: {}", e);
            None
        }
    }
}

// == Scheduler State ==
/// Lifecycle state of a [`CleanupScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer armed
    Stopped,
    /// Timer armed, passes dispatched every interval
    Running,
}

// == In-Flight Passes ==
/// Tick-spawned passes that were still running when the timer was stopped.
///
/// Dropping this value detaches the passes; they keep running as long as the
/// runtime does. Call [`InFlightPasses::wait`] to wait for them instead.
#[derive(Default)]
pub struct InFlightPasses {
    passes: JoinSet<()>,
}

impl InFlightPasses {
    /// Number of passes not yet reaped.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// True when no pass was in flight.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Waits until every pass has finished.
    pub async fn wait(mut self) {
        while let Some(result) = self.passes.join_next().await {
            if let Err(e) = result {
                warn!("Cleanup pass ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for InFlightPasses {
    fn drop(&mut self) {
        self.passes.detach_all();
    }
}

/// The armed timer task and its cancel switch.
struct Timer {
    handle: JoinHandle<JoinSet<()>>,
    cancel: oneshot::Sender<()>,
}

// == Cleanup Scheduler ==
/// Owns the repeating timer that drives cleanup passes.
///
/// Passes spawned by a tick run independently of the timer: `stop` cancels the
/// timer and hands back the passes still in flight.
pub struct CleanupScheduler {
    store: Arc<dyn ResetTokenStore>,
    interval: Duration,
    skip_overlap: bool,
    /// Set while a tick-spawned pass runs; only consulted with `skip_overlap`
    pass_running: Arc<AtomicBool>,
    timer: Mutex<Option<Timer>>,
}

impl CleanupScheduler {
    // == Constructor ==
    /// Creates a stopped scheduler that will run a pass every `interval`.
    pub fn new(store: Arc<dyn ResetTokenStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            skip_overlap: false,
            pass_running: Arc::new(AtomicBool::new(false)),
            timer: Mutex::new(None),
        }
    }

    /// Skips a tick while the previous pass is still running.
    ///
    /// Off by default: overlapping passes are harmless because the purge
    /// predicate is evaluated by the store itself.
    pub fn with_skip_overlap(mut self, skip: bool) -> Self {
        self.skip_overlap = skip;
        self
    }

    // == Start ==
    /// Runs one pass immediately, then arms the repeating timer.
    ///
    /// Calling `start` on a running scheduler does nothing. The scheduler lock
    /// is held during the immediate pass, so `state` and `stop` wait for it.
    pub async fn start(&self) {
        let mut timer = self.timer.lock().await;
        if timer.is_some() {
            debug!("Cleanup job already running");
            return;
        }

        run_cleanup_pass(self.store.as_ref()).await;

        let store = self.store.clone();
        let period = self.interval;
        let skip_overlap = self.skip_overlap;
        let pass_running = self.pass_running.clone();
        let (cancel, mut cancelled) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            // The immediate pass above stands in for the first tick
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut passes = JoinSet::new();

            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {
                        dispatch_pass(&mut passes, store.clone(), skip_overlap, &pass_running);
                    }
                    Some(result) = passes.join_next(), if !passes.is_empty() => {
                        if let Err(e) = result {
                            warn!("Cleanup pass ended abnormally: {}", e);
                        }
                    }
                }
            }
            passes
        });
        *timer = Some(Timer { handle, cancel });

        info!(
            "Started expired password reset token cleanup job (every {}s).",
            period.as_secs()
        );
    }

    /// Spawns [`CleanupScheduler::start`] so the caller is not held up by the
    /// immediate pass.
    ///
    /// Aborting the returned handle before it finishes cancels the start: no
    /// timer is armed and the scheduler lock is released.
    pub fn start_in_background(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move { scheduler.start().await })
    }

    // == Stop ==
    /// Cancels the timer and returns the passes it had dispatched that are
    /// still running. Stopping a stopped scheduler returns an empty set.
    pub async fn stop(&self) -> InFlightPasses {
        let Some(timer) = self.timer.lock().await.take() else {
            return InFlightPasses::default();
        };

        // A send error means the timer task is already gone
        let _ = timer.cancel.send(());
        let passes = match timer.handle.await {
            Ok(passes) => passes,
            Err(e) => {
                warn!("Cleanup timer task failed: {}", e);
                JoinSet::new()
            }
        };

        info!(
            "Stopped expired password reset token cleanup job ({} pass(es) in flight).",
            passes.len()
        );
        InFlightPasses { passes }
    }

    // == State ==
    /// Returns whether the timer is currently armed.
    pub async fn state(&self) -> SchedulerState {
        if self.timer.lock().await.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }
}

/// Clears the overlap flag when a pass ends, including by panic or abort.
struct PassGuard(Arc<AtomicBool>);

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Spawns one pass into `passes` without waiting for it.
fn dispatch_pass(
    passes: &mut JoinSet<()>,
    store: Arc<dyn ResetTokenStore>,
    skip_overlap: bool,
    pass_running: &Arc<AtomicBool>,
) {
    let guard = if skip_overlap {
        if pass_running.swap(true, Ordering::AcqRel) {
            debug!("Previous cleanup pass still running, skipping tick");
            return;
        }
        Some(PassGuard(pass_running.clone()))
    } else {
        None
    };

    passes.spawn(async move {
        let _guard = guard;
        run_cleanup_pass(store.as_ref()).await;
    });
}
