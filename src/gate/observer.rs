//! One-shot viewport proximity observer.
//!
//! [`ViewportProximityObserver::observe`] watches a [`HostElement`] and calls `on_enter` the
//! first time the host comes within `margin_px` of the visible viewport. The callback is stored
//! inside the `Watching` state and consumed on the transition to `Fired`, so it cannot run twice
//! no matter how often the host scrolls in and out afterwards.
//!
//! A host that is already near the viewport when observation starts fires without any scroll
//! event: the current viewport is checked before waiting for changes.

use crate::errors::GateError;
use crate::render::{Rect, Viewport};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A unique identifier for a host element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HostId(Uuid);

impl HostId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

/// The container a gate renders into, laid out in document coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostElement {
    pub id: HostId,
    pub rect: Rect,
    /// Detached hosts are not part of the document and cannot be observed.
    pub attached: bool,
}

impl HostElement {
    pub fn new(rect: Rect) -> Self {
        Self {
            id: HostId::new(),
            rect,
            attached: true,
        }
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }
}

pub type OnEnter = Box<dyn FnOnce() + Send + 'static>;

/// Observable lifecycle of an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    /// Waiting for the host to come near the viewport
    Watching,
    /// The callback has run; nothing else will happen
    Fired,
    /// Stopped before firing
    Disposed,
}

enum Trigger {
    Watching(OnEnter),
    Fired,
    Disposed,
}

impl Trigger {
    fn state(&self) -> ObserverState {
        match self {
            Trigger::Watching(_) => ObserverState::Watching,
            Trigger::Fired => ObserverState::Fired,
            Trigger::Disposed => ObserverState::Disposed,
        }
    }

    /// `Watching -> Fired`. Hands out the callback exactly once.
    fn fire(&mut self) -> Option<OnEnter> {
        match std::mem::replace(self, Trigger::Fired) {
            Trigger::Watching(cb) => Some(cb),
            other => {
                *self = other;
                None
            }
        }
    }

    /// `Watching -> Disposed`. Terminal states are left alone.
    fn dispose(&mut self) -> bool {
        if let Trigger::Watching(_) = self {
            *self = Trigger::Disposed;
            true
        } else {
            false
        }
    }
}

/// Live registration of a host with the viewport watcher.
struct ObservationHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ObservationHandle {
    fn disconnect(self) {
        self.cancel.cancel();
    }
}

pub struct ViewportProximityObserver {
    trigger: Arc<Mutex<Trigger>>,
    handle: Option<ObservationHandle>,
}

impl Debug for ViewportProximityObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportProximityObserver")
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ViewportProximityObserver {
    /// Starts watching `host`. `viewport` is the environment's intersection source; `None` means
    /// the environment has none, in which case the host is treated as near right away.
    ///
    /// Fails with [`GateError::MissingHostElement`] if the host is absent or detached. Nothing is
    /// registered in that case; callers retry on their next render.
    ///
    /// Must be called from within a tokio runtime. `on_enter` always runs on the watcher task,
    /// never inside this call.
    pub fn observe<F>(
        host: Option<&HostElement>,
        viewport: Option<watch::Receiver<Viewport>>,
        margin_px: u32,
        on_enter: F,
    ) -> Result<Self, GateError>
    where
        F: FnOnce() + Send + 'static,
    {
        let host = match host {
            Some(h) if h.attached => h,
            _ => return Err(GateError::MissingHostElement),
        };

        let trigger = Arc::new(Mutex::new(Trigger::Watching(Box::new(on_enter))));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(watch_proximity(
            host.rect,
            margin_px,
            viewport,
            trigger.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            trigger,
            handle: Some(ObservationHandle { cancel, task }),
        })
    }

    /// Stops watching. Safe to call repeatedly and after the observer has fired.
    pub fn dispose(&mut self) {
        if lock(&self.trigger).dispose() {
            log::debug!("proximity observer disposed before firing");
        }
        if let Some(handle) = self.handle.take() {
            handle.disconnect();
        }
    }

    pub fn state(&self) -> ObserverState {
        lock(&self.trigger).state()
    }

    /// True while the watcher task is still running.
    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.task.is_finished())
    }
}

impl Drop for ViewportProximityObserver {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock(trigger: &Mutex<Trigger>) -> std::sync::MutexGuard<'_, Trigger> {
    trigger.lock().unwrap_or_else(PoisonError::into_inner)
}

fn fire(trigger: &Mutex<Trigger>) {
    // The guard is released before the callback runs.
    let cb = lock(trigger).fire();
    if let Some(cb) = cb {
        cb();
    }
}

async fn watch_proximity(
    host: Rect,
    margin_px: u32,
    viewport: Option<watch::Receiver<Viewport>>,
    trigger: Arc<Mutex<Trigger>>,
    cancel: CancellationToken,
) {
    let Some(mut rx) = viewport else {
        log::debug!("no intersection source, treating host {:?} as near", host);
        if !cancel.is_cancelled() {
            fire(&trigger);
        }
        return;
    };

    loop {
        let near = rx.borrow_and_update().is_near(&host, margin_px);
        if near {
            fire(&trigger);
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    // Viewport source is gone (page torn down).
                    return;
                }
            }
        }
    }
}
