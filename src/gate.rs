//! Deferred mounting of the heavy visual layer.
//!
//! A [`DeferredMountGate`] shows a placeholder until three things have happened, in this order:
//!
//! 1. the page has committed a frame containing the placeholder ([`DeferredMountGate::on_first_paint`]),
//! 2. the host came within the proximity margin of the viewport,
//! 3. the idle scheduler found a quiet moment to run the load.
//!
//! Only then is the subsystem fetched and instantiated. If that fails the gate keeps showing the
//! placeholder forever; nothing is retried and nothing is reported to the page.

pub mod observer;
pub mod scheduler;
mod services;
mod state;

pub use observer::{HostElement, HostId, ObserverState, ViewportProximityObserver};
pub use scheduler::{
    scheduler_for, ActivityMonitor, BusyGuard, DeferredTaskScheduler, IdleQueueScheduler, IdleScheduler, IdleTask,
    ScheduledCallback,
};
pub use services::GateServices;
pub use state::MountState;

use crate::config::GateConfig;
use crate::errors::LoadError;
use crate::events::{GateEvent, GateId};
use crate::render::{PointerEvents, Viewport};
use crate::subsystem::{HeavyVisual, VisualProps};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Inputs from the embedding page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateProps {
    /// Passed unchanged to the mounted subsystem
    pub adaptive: bool,
    /// Placeholder height; falls back to [`GateConfig::min_placeholder_height`]
    pub min_height: Option<u32>,
}

/// The stand-in rendered until (or instead of) the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderBox {
    pub min_height: u32,
    pub pointer_events: PointerEvents,
}

#[derive(Debug, Clone)]
pub enum RenderNode {
    Placeholder(PlaceholderBox),
    Mounted(Arc<dyn HeavyVisual>),
}

impl RenderNode {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderNode::Placeholder(_))
    }
}

#[derive(Default)]
struct GateInner {
    state: MountState,
    painted: bool,
    observer: Option<ViewportProximityObserver>,
    scheduled: Option<ScheduledCallback>,
    visual: Option<Arc<dyn HeavyVisual>>,
    render_dirty: bool,
}

struct GateShared {
    id: GateId,
    props: VisualProps,
    placeholder: PlaceholderBox,
    margin_px: u32,
    fallback_delay: Duration,
    services: GateServices,
    /// Cancelled on teardown. Nothing changes state after that.
    alive: CancellationToken,
    inner: Mutex<GateInner>,
}

#[derive(Clone)]
pub struct DeferredMountGate {
    shared: Arc<GateShared>,
}

impl std::fmt::Debug for DeferredMountGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredMountGate")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("props", &self.shared.props)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}

impl DeferredMountGate {
    /// Creates a gate in [`MountState::Placeholder`]. Nothing is observed or scheduled until the
    /// first paint.
    pub fn new(props: GateProps, config: &GateConfig, services: GateServices) -> Self {
        let placeholder = PlaceholderBox {
            min_height: props.min_height.unwrap_or(config.min_placeholder_height),
            pointer_events: PointerEvents::None,
        };

        Self {
            shared: Arc::new(GateShared {
                id: GateId::new(),
                props: VisualProps { adaptive: props.adaptive },
                placeholder,
                margin_px: config.margin_px,
                fallback_delay: config.fallback_delay,
                services,
                alive: CancellationToken::new(),
                inner: Mutex::new(GateInner::default()),
            }),
        }
    }

    pub fn id(&self) -> GateId {
        self.shared.id
    }

    pub fn props(&self) -> VisualProps {
        self.shared.props
    }

    pub fn state(&self) -> MountState {
        self.lock().state
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.alive.is_cancelled()
    }

    /// State of the current proximity observer, if one is registered.
    pub fn observer_state(&self) -> Option<ObserverState> {
        self.lock().observer.as_ref().map(|o| o.state())
    }

    /// True while a load is scheduled but has not completed.
    pub fn has_pending_callback(&self) -> bool {
        self.lock().scheduled.as_ref().is_some_and(|cb| !cb.is_finished())
    }

    /// Returns whether the render output changed since the last call, and resets the flag.
    pub fn take_render_dirty(&self) -> bool {
        std::mem::take(&mut self.lock().render_dirty)
    }

    pub fn is_render_dirty(&self) -> bool {
        self.lock().render_dirty
    }

    /// Called by the host after every committed frame. Registers the host with a proximity
    /// observer the first time it is available. Returns true when observation started with this
    /// call.
    ///
    /// `viewport` is the environment's intersection source; `None` when it has none.
    pub fn on_first_paint(&self, host: Option<&HostElement>, viewport: Option<watch::Receiver<Viewport>>) -> bool {
        if self.is_torn_down() {
            return false;
        }

        let mut inner = self.lock();
        if !inner.painted {
            inner.painted = true;
            log::debug!("Gate[{}]: first paint", self.shared.id);
            self.emit(GateEvent::FirstPaint { gate: self.shared.id });
        }

        if inner.state != MountState::Placeholder || inner.observer.is_some() {
            return false;
        }

        let weak = Arc::downgrade(&self.shared);
        let on_enter = move || {
            if let Some(gate) = upgrade(&weak) {
                gate.on_proximity_triggered();
            }
        };

        match ViewportProximityObserver::observe(host, viewport, self.shared.margin_px, on_enter) {
            Ok(observer) => {
                inner.observer = Some(observer);
                log::debug!("Gate[{}]: observing host with {}px margin", self.shared.id, self.shared.margin_px);
                self.emit(GateEvent::ObservationStarted {
                    gate: self.shared.id,
                    margin_px: self.shared.margin_px,
                });
                true
            }
            Err(e) => {
                log::debug!("Gate[{}]: cannot observe yet: {e}", self.shared.id);
                self.emit(GateEvent::ObservationDeferred { gate: self.shared.id });
                false
            }
        }
    }

    /// The host came near the viewport. Moves to [`MountState::Loading`] and hands the load to
    /// the idle scheduler. Only the first call has an effect, and only after the host painted and
    /// an observer was registered.
    pub(crate) fn on_proximity_triggered(&self) {
        if self.is_torn_down() {
            return;
        }

        let mut inner = self.lock();
        if !inner.painted || inner.observer.is_none() {
            log::debug!("Gate[{}]: proximity trigger without an observer, ignoring", self.shared.id);
            return;
        }
        if let Err(e) = inner.state.transition(MountState::Loading) {
            log::debug!("Gate[{}]: ignoring proximity trigger: {e}", self.shared.id);
            return;
        }

        if let Some(mut observer) = inner.observer.take() {
            observer.dispose();
        }
        log::debug!("Gate[{}]: host is near the viewport", self.shared.id);
        self.emit(GateEvent::ProximityTriggered { gate: self.shared.id });

        let weak = Arc::downgrade(&self.shared);
        let task = async move {
            if let Some(gate) = upgrade(&weak) {
                gate.load_and_mount().await;
            }
        }
        .boxed();

        let scheduler = &self.shared.services.scheduler;
        inner.scheduled = Some(scheduler.run_when_idle(task, self.shared.fallback_delay));
        self.emit(GateEvent::IdleScheduled {
            gate: self.shared.id,
            scheduler: scheduler.name(),
        });
    }

    /// Fetches and instantiates the subsystem. Runs once, from the idle callback. Failures of any
    /// kind (including a panicking loader) end in [`MountState::Failed`] and are not propagated.
    pub async fn load_and_mount(&self) {
        {
            let inner = self.lock();
            if self.is_torn_down() || inner.state != MountState::Loading {
                return;
            }
            log::debug!("Gate[{}]: loading subsystem", self.shared.id);
            self.emit(GateEvent::LoadStarted { gate: self.shared.id });
        }

        let loader = self.shared.services.loader.clone();
        let props = self.shared.props;
        let result = AssertUnwindSafe(async move { loader.load(props).await })
            .catch_unwind()
            .await
            .unwrap_or(Err(LoadError::Panicked));

        let mut inner = self.lock();
        inner.scheduled = None;

        if self.is_torn_down() {
            log::debug!("Gate[{}]: torn down during load, dropping result", self.shared.id);
            return;
        }

        match result {
            Ok(visual) => {
                if let Err(e) = inner.state.transition(MountState::Mounted) {
                    log::error!("Gate[{}]: {e}", self.shared.id);
                    return;
                }
                let name = visual.name().to_string();
                inner.visual = Some(visual);
                inner.render_dirty = true;
                log::info!("Gate[{}]: mounted {name}", self.shared.id);
                self.emit(GateEvent::Mounted {
                    gate: self.shared.id,
                    subsystem: name,
                });
            }
            Err(err) => {
                if let Err(e) = inner.state.transition(MountState::Failed) {
                    log::error!("Gate[{}]: {e}", self.shared.id);
                    return;
                }
                inner.render_dirty = true;
                log::warn!("Gate[{}]: subsystem failed to load, keeping placeholder: {err}", self.shared.id);
                self.emit(GateEvent::LoadFailed {
                    gate: self.shared.id,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// What to draw for the current state.
    pub fn render(&self) -> RenderNode {
        let inner = self.lock();
        match (inner.state, &inner.visual) {
            (MountState::Mounted, Some(visual)) => RenderNode::Mounted(visual.clone()),
            _ => RenderNode::Placeholder(self.shared.placeholder),
        }
    }

    /// Releases the observer and cancels a pending load. Safe to call more than once.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        if self.shared.alive.is_cancelled() {
            return;
        }
        self.shared.alive.cancel();

        if let Some(mut observer) = inner.observer.take() {
            observer.dispose();
        }
        if let Some(scheduled) = inner.scheduled.take() {
            if scheduled.cancel() {
                log::debug!("Gate[{}]: cancelled pending load", self.shared.id);
            }
        }

        log::debug!("Gate[{}]: torn down in state {:?}", self.shared.id, inner.state);
        self.emit(GateEvent::TornDown { gate: self.shared.id });
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.shared.inner.lock().unwrap_or_else(|poisoned| {
            log::error!("Gate[{}]: state lock poisoned, recovering", self.shared.id);
            poisoned.into_inner()
        })
    }

    fn emit(&self, event: GateEvent) {
        // No subscribers is fine.
        let _ = self.shared.services.events.send(event);
    }
}

fn upgrade(weak: &Weak<GateShared>) -> Option<DeferredMountGate> {
    weak.upgrade().map(|shared| DeferredMountGate { shared })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DisplayItem, Rect};
    use crate::subsystem::{LoadFuture, SubsystemLoader};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast;

    #[derive(Debug)]
    struct StaticVisual {
        props: VisualProps,
    }

    impl HeavyVisual for StaticVisual {
        fn name(&self) -> &str {
            "static"
        }
        fn props(&self) -> VisualProps {
            self.props
        }
        fn initial_height(&self, viewport: &Viewport) -> u32 {
            viewport.height
        }
        fn paint(&self, _top: i32, _viewport: &Viewport) -> Vec<DisplayItem> {
            Vec::new()
        }
    }

    enum Outcome {
        Succeed,
        Fail,
        Panic,
    }

    struct ScriptedLoader {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl ScriptedLoader {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self { outcome, calls: AtomicUsize::new(0) })
        }
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SubsystemLoader for ScriptedLoader {
        fn load(&self, props: VisualProps) -> LoadFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Succeed => async move { Ok(Arc::new(StaticVisual { props }) as Arc<dyn HeavyVisual>) }.boxed(),
                Outcome::Fail => async { Err(LoadError::Instantiate("no webgl".into())) }.boxed(),
                Outcome::Panic => panic!("loader exploded"),
            }
        }
    }

    fn gate_with(
        loader: Arc<dyn SubsystemLoader>,
        scheduler: Arc<dyn IdleScheduler>,
        props: GateProps,
    ) -> (DeferredMountGate, broadcast::Receiver<GateEvent>) {
        let (events, rx) = broadcast::channel(64);
        let services = GateServices { scheduler, loader, events };
        (DeferredMountGate::new(props, &GateConfig::default(), services), rx)
    }

    fn gate(loader: Arc<dyn SubsystemLoader>) -> (DeferredMountGate, broadcast::Receiver<GateEvent>) {
        gate_with(loader, Arc::new(DeferredTaskScheduler), GateProps { adaptive: true, min_height: None })
    }

    fn near_host() -> (HostElement, watch::Sender<Viewport>) {
        let host = HostElement::new(Rect::new(0, 900, 1280, 800));
        let (tx, _rx) = watch::channel(Viewport::new(0, 0, 1280, 800));
        (host, tx)
    }

    async fn wait_for(rx: &mut broadcast::Receiver<GateEvent>, kind: &str) -> Vec<&'static str> {
        let mut seen = Vec::new();
        let res = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let ev = rx.recv().await.unwrap();
                seen.push(ev.kind());
                if ev.kind() == kind {
                    break;
                }
            }
        })
        .await;
        assert!(res.is_ok(), "timed out waiting for {kind}, saw {seen:?}");
        seen
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn new_gate_renders_inert_placeholder() {
        let (gate, _rx) = gate(ScriptedLoader::new(Outcome::Succeed));
        assert_eq!(gate.state(), MountState::Placeholder);

        let RenderNode::Placeholder(p) = gate.render() else {
            panic!("expected placeholder");
        };
        assert_eq!(p.min_height, GateConfig::default().min_placeholder_height);
        assert_eq!(p.pointer_events, PointerEvents::None);
    }

    #[tokio::test]
    async fn placeholder_height_can_be_overridden() {
        let props = GateProps { adaptive: false, min_height: Some(420) };
        let (gate, _rx) = gate_with(ScriptedLoader::new(Outcome::Succeed), Arc::new(DeferredTaskScheduler), props);
        let RenderNode::Placeholder(p) = gate.render() else {
            panic!("expected placeholder");
        };
        assert_eq!(p.min_height, 420);
    }

    #[tokio::test]
    async fn first_paint_without_host_defers_observation() {
        let loader = ScriptedLoader::new(Outcome::Succeed);
        let (gate, mut rx) = gate(loader.clone());
        let (host, vp) = near_host();

        assert!(!gate.on_first_paint(None, Some(vp.subscribe())));
        assert_eq!(gate.observer_state(), None);
        assert_eq!(rx.recv().await.unwrap().kind(), "FirstPaint");
        assert_eq!(rx.recv().await.unwrap().kind(), "ObservationDeferred");

        // next frame has the host
        assert!(gate.on_first_paint(Some(&host), Some(vp.subscribe())));
        // and further frames do not re-register
        assert!(!gate.on_first_paint(Some(&host), Some(vp.subscribe())));

        wait_for(&mut rx, "Mounted").await;
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn phases_run_in_order() {
        let (gate, mut rx) = gate(ScriptedLoader::new(Outcome::Succeed));
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        let seen = wait_for(&mut rx, "Mounted").await;

        assert_eq!(
            seen,
            vec!["FirstPaint", "ObservationStarted", "ProximityTriggered", "IdleScheduled", "LoadStarted", "Mounted"]
        );
        assert_eq!(gate.state(), MountState::Mounted);
        assert!(gate.take_render_dirty());
        assert!(!gate.take_render_dirty());
    }

    #[tokio::test]
    async fn mounted_visual_receives_props_unchanged() {
        let (gate, mut rx) = gate(ScriptedLoader::new(Outcome::Succeed));
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "Mounted").await;

        let RenderNode::Mounted(visual) = gate.render() else {
            panic!("expected mounted visual");
        };
        assert_eq!(visual.props(), VisualProps { adaptive: true });
    }

    #[tokio::test]
    async fn load_failure_keeps_placeholder() {
        let loader = ScriptedLoader::new(Outcome::Fail);
        let (gate, mut rx) = gate(loader.clone());
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "LoadFailed").await;

        assert_eq!(gate.state(), MountState::Failed);
        assert!(gate.render().is_placeholder());

        // nothing retries, even when poked again
        gate.on_proximity_triggered();
        assert!(!gate.on_first_paint(Some(&host), Some(vp.subscribe())));
        settle().await;
        assert_eq!(loader.calls(), 1);
        assert_eq!(gate.state(), MountState::Failed);
    }

    #[tokio::test]
    async fn panicking_loader_is_a_load_failure() {
        let (gate, mut rx) = gate(ScriptedLoader::new(Outcome::Panic));
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "LoadFailed").await;

        assert_eq!(gate.state(), MountState::Failed);
        assert!(gate.render().is_placeholder());
    }

    #[tokio::test]
    async fn proximity_without_observation_is_ignored() {
        let loader = ScriptedLoader::new(Outcome::Succeed);
        let (gate, mut rx) = gate(loader.clone());

        gate.on_proximity_triggered();
        settle().await;

        assert_eq!(gate.state(), MountState::Placeholder);
        assert!(!gate.has_pending_callback());
        assert!(rx.try_recv().is_err());
        assert_eq!(loader.calls(), 0);

        // painting without a host still does not allow it
        assert!(!gate.on_first_paint(None, None));
        gate.on_proximity_triggered();
        settle().await;
        assert_eq!(gate.state(), MountState::Placeholder);
        assert_eq!(loader.calls(), 0);
    }

    #[tokio::test]
    async fn proximity_trigger_only_counts_once() {
        let loader = ScriptedLoader::new(Outcome::Succeed);
        let (gate, mut rx) = gate(loader.clone());
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "Mounted").await;

        gate.on_proximity_triggered();
        vp.send_replace(Viewport::new(0, 100, 1280, 800));
        settle().await;

        assert_eq!(gate.state(), MountState::Mounted);
        assert!(!gate.state().can_transition_to(MountState::Loading));
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn loading_renders_like_placeholder() {
        let monitor = ActivityMonitor::new();
        let _busy = monitor.begin();
        let scheduler = Arc::new(IdleQueueScheduler::new(monitor.clone(), Duration::from_secs(30)));
        let (gate, mut rx) = gate_with(ScriptedLoader::new(Outcome::Succeed), scheduler, GateProps::default());
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "IdleScheduled").await;

        assert_eq!(gate.state(), MountState::Loading);
        assert!(gate.has_pending_callback());
        assert!(gate.render().is_placeholder());
    }

    #[tokio::test]
    async fn teardown_cancels_pending_load() {
        let monitor = ActivityMonitor::new();
        let busy = monitor.begin();
        let scheduler = Arc::new(IdleQueueScheduler::new(monitor.clone(), Duration::from_secs(30)));
        let loader = ScriptedLoader::new(Outcome::Succeed);
        let (gate, mut rx) = gate_with(loader.clone(), scheduler, GateProps::default());
        let (host, vp) = near_host();

        gate.on_first_paint(Some(&host), Some(vp.subscribe()));
        wait_for(&mut rx, "IdleScheduled").await;

        gate.teardown();
        gate.teardown();
        assert!(!gate.has_pending_callback());

        drop(busy);
        settle().await;

        assert_eq!(loader.calls(), 0);
        assert_eq!(gate.state(), MountState::Loading);
        wait_for(&mut rx, "TornDown").await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_teardown_emits_once() {
        let (gate, mut rx) = gate(ScriptedLoader::new(Outcome::Succeed));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                tokio::task::spawn_blocking(move || gate.teardown())
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(gate.is_torn_down());
        assert_eq!(rx.recv().await.unwrap().kind(), "TornDown");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn teardown_disposes_observer_and_blocks_new_work() {
        let loader = ScriptedLoader::new(Outcome::Succeed);
        let (gate, _rx) = gate(loader.clone());
        let host = HostElement::new(Rect::new(0, 5000, 1280, 800));
        let (vp, _) = watch::channel(Viewport::new(0, 0, 1280, 800));

        assert!(gate.on_first_paint(Some(&host), Some(vp.subscribe())));
        assert_eq!(gate.observer_state(), Some(ObserverState::Watching));

        gate.teardown();
        assert_eq!(gate.observer_state(), None);

        vp.send_replace(Viewport::new(0, 4800, 1280, 800));
        gate.on_proximity_triggered();
        assert!(!gate.on_first_paint(Some(&host), Some(vp.subscribe())));
        settle().await;

        assert_eq!(gate.state(), MountState::Placeholder);
        assert_eq!(loader.calls(), 0);
    }
}
