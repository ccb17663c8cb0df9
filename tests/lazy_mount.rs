use landing_mount::{
    config::GateConfig,
    media::{Capabilities, MediaPreferences},
    net::HttpSceneLoader,
    render::{DisplayItem, Viewport},
    subsystem::{LoadFuture, LocalSceneLoader, SubsystemLoader, VisualProps},
    GateEvent, HeavyVisual, MountState, PageView, RenderNode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use url::Url;

/// Wraps the bundled scene loader and records every call.
#[derive(Default)]
struct RecordingLoader {
    inner: LocalSceneLoader,
    calls: AtomicUsize,
    props: Mutex<Vec<VisualProps>>,
}

impl RecordingLoader {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen_props(&self) -> Vec<VisualProps> {
        self.props.lock().unwrap().clone()
    }
}

impl SubsystemLoader for RecordingLoader {
    fn load(&self, props: VisualProps) -> LoadFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.props.lock().unwrap().push(props);
        self.inner.load(props)
    }
}

fn desktop_page(capabilities: Capabilities, prefs: MediaPreferences) -> PageView {
    let _ = env_logger::builder().is_test(true).try_init();
    PageView::new(GateConfig::default(), Viewport::new(0, 0, 1280, 800), capabilities, prefs)
}

async fn next_outcome(rx: &mut broadcast::Receiver<GateEvent>) -> (GateEvent, Vec<&'static str>) {
    let mut seen = Vec::new();
    let res = timeout(Duration::from_secs(5), async {
        loop {
            let ev = rx.recv().await.unwrap();
            seen.push(ev.kind());
            if matches!(ev, GateEvent::Mounted { .. } | GateEvent::LoadFailed { .. }) {
                return ev;
            }
        }
    })
    .await;
    match res {
        Ok(ev) => (ev, seen),
        Err(_) => panic!("no outcome in time, saw {seen:?}"),
    }
}

async fn let_tasks_run() {
    sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn scrolling_into_margin_mounts_exactly_once() {
    let prefs = MediaPreferences {
        prefers_reduced_motion: true,
        coarse_pointer: false,
    };
    let mut page = desktop_page(Capabilities::all(), prefs);
    let mut rx = page.subscribe_events();
    let loader = Arc::new(RecordingLoader::default());
    let gate = page.mount_gate(2000, loader.clone());

    page.commit_frame();
    let_tasks_run().await;
    assert_eq!(gate.state(), MountState::Placeholder);
    assert_eq!(loader.calls(), 0);

    // Viewport bottom at 1700, still more than 200px away
    page.scroll_to(0, 900);
    page.commit_frame();
    let_tasks_run().await;
    assert_eq!(gate.state(), MountState::Placeholder);
    assert_eq!(loader.calls(), 0);

    // Bottom at 1800 plus the 200px margin touches the host at 2000
    page.scroll_to(0, 1000);
    page.commit_frame();

    let (outcome, seen) = next_outcome(&mut rx).await;
    assert!(matches!(outcome, GateEvent::Mounted { ref subsystem, .. } if subsystem == "particle-field"));
    assert_eq!(
        seen,
        vec!["FirstPaint", "ObservationStarted", "ProximityTriggered", "IdleScheduled", "LoadStarted", "Mounted"]
    );

    // Scrolling out and back in does not load again
    page.scroll_to(0, 0);
    page.commit_frame();
    page.scroll_to(0, 1500);
    page.commit_frame();
    let_tasks_run().await;

    assert_eq!(loader.calls(), 1);
    assert_eq!(loader.seen_props(), vec![VisualProps { adaptive: true }]);
    assert!(matches!(gate.render(), RenderNode::Mounted(ref v) if v.props().adaptive));
}

#[tokio::test]
async fn placeholder_reserves_the_mounted_height() {
    let mut page = desktop_page(Capabilities::all(), MediaPreferences::default());
    let mut rx = page.subscribe_events();
    let gate = page.mount_gate(0, Arc::new(LocalSceneLoader::default()));

    page.commit_frame();
    let reserved = match gate.render() {
        RenderNode::Placeholder(placeholder) => placeholder.min_height,
        RenderNode::Mounted(_) => panic!("mounted before the first frame"),
    };

    next_outcome(&mut rx).await;
    let RenderNode::Mounted(visual) = gate.render() else {
        panic!("gate did not mount");
    };

    let viewport = page.viewport();
    assert!(reserved >= visual.initial_height(&viewport));
    assert_eq!(reserved, 800);
}

#[tokio::test]
async fn host_already_in_view_mounts_without_scrolling() {
    let mut page = desktop_page(Capabilities::all(), MediaPreferences::default());
    let mut rx = page.subscribe_events();
    let gate = page.mount_gate(300, Arc::new(LocalSceneLoader::default()));

    page.commit_frame();
    next_outcome(&mut rx).await;
    assert_eq!(gate.state(), MountState::Mounted);
    assert_eq!(page.viewport().y, 0);

    assert!(page.needs_render());
    page.commit_frame();
    let painted = page.render_list().items.iter().filter(|i| matches!(i, DisplayItem::Circle { .. })).count();
    assert_eq!(painted, 1200);
}

#[tokio::test]
async fn missing_capabilities_fall_back() {
    let mut page = desktop_page(Capabilities::empty(), MediaPreferences::default());
    let mut rx = page.subscribe_events();
    let loader = Arc::new(RecordingLoader::default());
    let gate = page.mount_gate(5000, loader.clone());

    page.commit_frame();

    // Without an intersection source the host counts as near right away
    let mut scheduler = None;
    let res = timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await.unwrap() {
                GateEvent::IdleScheduled { scheduler: name, .. } => scheduler = Some(name),
                GateEvent::Mounted { .. } => break,
                _ => {}
            }
        }
    })
    .await;
    assert!(res.is_ok());

    assert_eq!(scheduler, Some("deferred-task"));
    assert_eq!(gate.state(), MountState::Mounted);
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn teardown_before_idle_never_loads() {
    let config = GateConfig::builder().idle_timeout(Duration::from_millis(200)).build().unwrap();
    let mut page = PageView::new(
        config,
        Viewport::new(0, 0, 1280, 800),
        Capabilities::all(),
        MediaPreferences::default(),
    );
    let mut rx = page.subscribe_events();
    let loader = Arc::new(RecordingLoader::default());
    let gate = page.mount_gate(0, loader.clone());

    // Keep the page busy so the idle callback cannot run before its timeout
    let busy = page.activity().begin();
    page.commit_frame();

    let res = timeout(Duration::from_secs(2), async {
        while !matches!(rx.recv().await.unwrap(), GateEvent::IdleScheduled { .. }) {}
    })
    .await;
    assert!(res.is_ok());
    assert_eq!(gate.state(), MountState::Loading);

    page.teardown();
    drop(busy);
    sleep(Duration::from_millis(400)).await;

    assert_eq!(loader.calls(), 0);
    assert_eq!(gate.state(), MountState::Loading);
    assert!(gate.render().is_placeholder());
}

#[tokio::test]
async fn unreachable_scene_keeps_placeholder() {
    let mut page = desktop_page(Capabilities::all(), MediaPreferences::default());
    let mut rx = page.subscribe_events();
    let loader = HttpSceneLoader::new(Url::parse("http://127.0.0.1:9/scene.json").unwrap());
    let gate = page.mount_gate(0, Arc::new(loader));

    page.commit_frame();
    let (outcome, _) = next_outcome(&mut rx).await;
    assert!(matches!(outcome, GateEvent::LoadFailed { .. }));
    assert_eq!(gate.state(), MountState::Failed);

    page.commit_frame();
    assert_eq!(page.render_list().placeholders().count(), 1);
}
