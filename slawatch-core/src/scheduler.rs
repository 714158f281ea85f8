//! Polling scheduler
//!
//! Named periodic refresh loops, one tokio task each:
//! - first tick fires immediately, then one per period
//! - a loop never starts tick n+1 before tick n settled (missed ticks skipped)
//! - pause/resume; resuming re-arms the cadence from the resume point
//! - stop/shutdown wait for the task, so nothing runs afterwards
//!
//! Tick failures are logged and swallowed: the last snapshot stays on screen.

use crate::error::Result;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Paused,
    Stopped,
}

type TickFn = Box<dyn FnMut() -> BoxFuture<'static, Result<()>> + Send>;

struct LoopHandle {
    state: watch::Sender<LoopState>,
    task: JoinHandle<()>,
    period: Duration,
}

impl LoopHandle {
    fn set(&self, next: LoopState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next || *current == LoopState::Stopped {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}

#[derive(Default)]
pub struct Scheduler {
    loops: Mutex<HashMap<String, LoopHandle>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a loop. The closure builds one tick; do the work inside the
    /// returned future so a cancelled tick leaves no side effects.
    ///
    /// Starting a name that is already running replaces the old loop.
    pub fn start<F, Fut>(&self, name: &str, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(LoopState::Running);
        let boxed: TickFn = Box::new(move || -> BoxFuture<'static, Result<()>> { Box::pin(tick()) });
        let task = tokio::spawn(run_loop(name.to_string(), period, state_rx, boxed));

        let handle = LoopHandle { state: state_tx, task, period };
        if let Some(old) = self.loops.lock().insert(name.to_string(), handle) {
            warn!("[{}] loop restarted, cancelling previous instance", name);
            old.set(LoopState::Stopped);
            old.task.abort();
        }
        info!("[{}] polling every {:?}", name, period);
    }

    /// Stop firing until resumed. An in-flight tick is abandoned.
    pub fn pause(&self, name: &str) -> bool {
        let changed = self.loops.lock().get(name).map(|h| h.set(LoopState::Paused)).unwrap_or(false);
        if changed {
            info!("[{}] paused", name);
        }
        changed
    }

    /// Resume a paused loop; the next tick comes one period from now.
    pub fn resume(&self, name: &str) -> bool {
        let changed = self.loops.lock().get(name).map(|h| h.set(LoopState::Running)).unwrap_or(false);
        if changed {
            info!("[{}] resumed", name);
        }
        changed
    }

    pub fn state(&self, name: &str) -> Option<LoopState> {
        self.loops.lock().get(name).map(|h| *h.state.borrow())
    }

    pub fn period(&self, name: &str) -> Option<Duration> {
        self.loops.lock().get(name).map(|h| h.period)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loops.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Cancel a loop and wait for its task to finish.
    pub async fn stop(&self, name: &str) -> bool {
        let handle = self.loops.lock().remove(name);
        match handle {
            Some(handle) => {
                Self::finish(name, handle).await;
                true
            }
            None => false,
        }
    }

    /// Cancel every loop (view teardown).
    pub async fn shutdown(&self) {
        let handles: Vec<(String, LoopHandle)> = self.loops.lock().drain().collect();
        for (name, handle) in handles {
            Self::finish(&name, handle).await;
        }
    }

    async fn finish(name: &str, handle: LoopHandle) {
        handle.state.send_replace(LoopState::Stopped);
        if let Err(e) = handle.task.await {
            if !e.is_cancelled() {
                warn!("[{}] loop task ended abnormally: {}", name, e);
            }
        }
        info!("[{}] stopped", name);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for (_, handle) in self.loops.get_mut().drain() {
            handle.state.send_replace(LoopState::Stopped);
            handle.task.abort();
        }
    }
}

fn ticker_from(start: Instant, period: Duration) -> Interval {
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_loop(name: String, period: Duration, mut state: watch::Receiver<LoopState>, mut tick: TickFn) {
    let mut ticker = ticker_from(Instant::now(), period);

    loop {
        let current = *state.borrow_and_update();
        match current {
            LoopState::Stopped => break,
            LoopState::Paused => {
                if state.changed().await.is_err() {
                    break;
                }
                if *state.borrow() == LoopState::Running {
                    ticker = ticker_from(Instant::now() + period, period);
                }
                continue;
            }
            LoopState::Running => {}
        }

        tokio::select! {
            biased;
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        debug!("[{}] tick", name);
        tokio::select! {
            biased;
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("[{}] in-flight tick abandoned", name);
            }
            result = tick() => {
                if let Err(e) = result {
                    warn!("[{}] refresh failed, keeping last snapshot: {}", name, e);
                }
            }
        }
    }

    debug!("[{}] loop exited", name);
}
