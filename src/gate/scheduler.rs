//! Idle scheduling.
//!
//! An [`IdleScheduler`] runs a task "when convenient": during an idle period if the environment
//! can tell, otherwise on the next turn of the event loop. Which adapter is used is decided once,
//! from [`Capabilities`], by [`scheduler_for`]. Tasks are always spawned, so they never run inside
//! the `run_when_idle` call itself.
//!
//! Every scheduled task is represented by a [`ScheduledCallback`] which can be cancelled until the
//! task has started.

use crate::config::GateConfig;
use crate::media::Capabilities;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Work handed to a scheduler. Its outcome is the task's own business.
pub type IdleTask = BoxFuture<'static, ()>;

pub trait IdleScheduler: Send + Sync {
    /// Adapter name, used in logs and events.
    fn name(&self) -> &'static str;

    /// Runs `task` once, asynchronously. `fallback_delay` is the delay used by adapters that
    /// cannot detect idleness.
    fn run_when_idle(&self, task: IdleTask, fallback_delay: Duration) -> ScheduledCallback;
}

/// Token for a task that has been handed to a scheduler.
#[derive(Debug)]
pub struct ScheduledCallback {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

impl ScheduledCallback {
    /// Spawns a task that first awaits `wait` and then runs `task`, unless cancelled before.
    fn spawn<W>(wait: W, task: IdleTask) -> Self
    where
        W: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let started = Arc::new(AtomicBool::new(false));

        let token = cancel.clone();
        let flag = started.clone();
        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = wait => {}
            }
            if token.is_cancelled() {
                return;
            }
            flag.store(true, Ordering::SeqCst);
            task.await;
        });

        Self { cancel, task: join, started }
    }

    /// Cancels the task. Returns true when this actually prevented it from running.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel();
        !self.has_started()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the task body has begun (it may still be running).
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the task has either run to completion or been cancelled.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            log::error!("scheduled callback task failed: {e}");
        }
    }
}

/// Tracks interactive work in progress. The environment is idle when nothing is busy.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    busy: Arc<watch::Sender<usize>>,
}

/// Marks work as in progress until dropped.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<watch::Sender<usize>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0usize);
        Self { busy: Arc::new(tx) }
    }

    pub fn begin(&self) -> BusyGuard {
        self.busy.send_modify(|n| *n += 1);
        BusyGuard { busy: self.busy.clone() }
    }

    pub fn busy_count(&self) -> usize {
        *self.busy.borrow()
    }

    pub fn is_idle(&self) -> bool {
        self.busy_count() == 0
    }

    /// Resolves once no work is in progress.
    pub async fn idle(&self) {
        let mut rx = self.busy.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

/// Native idle queue: waits for the [`ActivityMonitor`] to report idle, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct IdleQueueScheduler {
    monitor: ActivityMonitor,
    timeout: Duration,
}

impl IdleQueueScheduler {
    pub fn new(monitor: ActivityMonitor, timeout: Duration) -> Self {
        Self { monitor, timeout }
    }
}

impl IdleScheduler for IdleQueueScheduler {
    fn name(&self) -> &'static str {
        "idle-queue"
    }

    fn run_when_idle(&self, task: IdleTask, _fallback_delay: Duration) -> ScheduledCallback {
        let monitor = self.monitor.clone();
        let timeout = self.timeout;

        ScheduledCallback::spawn(
            async move {
                // Judge idleness after the current turn, not during it.
                tokio::task::yield_now().await;
                if tokio::time::timeout(timeout, monitor.idle()).await.is_err() {
                    log::debug!("idle timeout of {}ms elapsed, running anyway", timeout.as_millis());
                }
            },
            task,
        )
    }
}

/// Used when the environment cannot report idleness: runs after `fallback_delay`, or on the next
/// turn when the delay is zero.
#[derive(Debug, Clone, Default)]
pub struct DeferredTaskScheduler;

impl IdleScheduler for DeferredTaskScheduler {
    fn name(&self) -> &'static str {
        "deferred-task"
    }

    fn run_when_idle(&self, task: IdleTask, fallback_delay: Duration) -> ScheduledCallback {
        ScheduledCallback::spawn(
            async move {
                if fallback_delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(fallback_delay).await;
                }
            },
            task,
        )
    }
}

/// Picks the scheduler adapter for the given environment.
pub fn scheduler_for(
    capabilities: Capabilities,
    monitor: ActivityMonitor,
    config: &GateConfig,
) -> Arc<dyn IdleScheduler> {
    if capabilities.contains(Capabilities::IDLE_CALLBACK) {
        Arc::new(IdleQueueScheduler::new(monitor, config.idle_timeout))
    } else {
        log::debug!("idle callbacks unavailable, falling back to deferred tasks");
        Arc::new(DeferredTaskScheduler)
    }
}
