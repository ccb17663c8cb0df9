//! The landing page host.
//!
//! A [`PageView`] owns the scroll viewport, the sections that carry deferred gates, and the
//! display list for the last committed frame. It is the piece that calls
//! [`DeferredMountGate::on_first_paint`] after each frame and feeds viewport changes to the
//! proximity observers.

use crate::config::GateConfig;
use crate::events::GateEvent;
use crate::gate::{
    scheduler_for, ActivityMonitor, DeferredMountGate, GateProps, GateServices, HostElement, IdleScheduler, MountState,
    RenderNode,
};
use crate::media::{Capabilities, MediaFlags, MediaPreferences};
use crate::render::{Color, DisplayItem, Rect, RenderList, Viewport};
use crate::subsystem::SubsystemLoader;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const BACKGROUND: Color = Color { r: 0.04, g: 0.05, b: 0.09, a: 1.0 };

/// A page section hosting one gate.
struct Section {
    host: HostElement,
    gate: DeferredMountGate,
}

pub struct PageView {
    config: GateConfig,
    capabilities: Capabilities,
    prefs: MediaPreferences,
    /// Current viewport. Observers subscribe to this.
    viewport_tx: watch::Sender<Viewport>,
    event_tx: broadcast::Sender<GateEvent>,
    activity: ActivityMonitor,
    scheduler: Arc<dyn IdleScheduler>,
    sections: Vec<Section>,

    // Rendering commands for the last committed frame
    render_list: RenderList,
    /// Set when something changed since the last commit
    render_dirty: bool,
    /// Bumped on every committed frame
    scene_epoch: u64,
    torn_down: bool,
}

impl std::fmt::Debug for PageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageView")
            .field("viewport", &self.viewport())
            .field("capabilities", &self.capabilities)
            .field("sections", &self.sections.len())
            .field("scene_epoch", &self.scene_epoch)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl PageView {
    /// Creates a page. Capabilities are probed by the caller once; the scheduler adapter is picked
    /// here and shared by every gate on the page.
    pub fn new(config: GateConfig, viewport: Viewport, capabilities: Capabilities, prefs: MediaPreferences) -> Self {
        let (viewport_tx, _) = watch::channel(viewport);
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let activity = ActivityMonitor::new();
        let scheduler = scheduler_for(capabilities, activity.clone(), &config);

        log::debug!(
            "page created at {viewport:?} with scheduler {} and capabilities {capabilities:?}",
            scheduler.name()
        );

        Self {
            config,
            capabilities,
            prefs,
            viewport_tx,
            event_tx,
            activity,
            scheduler,
            sections: Vec::new(),
            render_list: RenderList::new(),
            render_dirty: true,
            scene_epoch: 0,
            torn_down: false,
        }
    }

    /// Current media conditions.
    pub fn media_flags(&self) -> MediaFlags {
        MediaFlags::evaluate(&self.viewport(), self.prefs, self.config.narrow_breakpoint)
    }

    /// Adds a section at document offset `top_px` with a gate around the subsystem produced by
    /// `loader`. Adaptive mode follows the current media conditions.
    pub fn mount_gate(&mut self, top_px: i32, loader: Arc<dyn SubsystemLoader>) -> DeferredMountGate {
        let props = GateProps {
            adaptive: self.media_flags().adaptive(),
            min_height: None,
        };
        self.mount_gate_with(top_px, props, loader)
    }

    pub fn mount_gate_with(
        &mut self,
        top_px: i32,
        props: GateProps,
        loader: Arc<dyn SubsystemLoader>,
    ) -> DeferredMountGate {
        let services = GateServices {
            scheduler: self.scheduler.clone(),
            loader,
            events: self.event_tx.clone(),
        };
        let gate = DeferredMountGate::new(props, &self.config, services);

        let height = props.min_height.unwrap_or(self.config.min_placeholder_height);
        let host = HostElement::new(Rect::new(0, top_px, self.viewport().width, height));

        log::debug!("page: section at {top_px}px hosts gate {} (adaptive: {})", gate.id(), props.adaptive);
        self.sections.push(Section { host, gate: gate.clone() });
        self.invalidate_render();
        gate
    }

    pub fn gates(&self) -> impl Iterator<Item = &DeferredMountGate> {
        self.sections.iter().map(|s| &s.gate)
    }

    /// Builds the display list for the current state and commits it as a frame. Afterwards every
    /// gate is told that its host has painted. Returns the new scene epoch.
    pub fn commit_frame(&mut self) -> u64 {
        if self.torn_down {
            return self.scene_epoch;
        }

        let _busy = self.activity.begin();
        let viewport = self.viewport();

        let mut rl = RenderList::new();
        rl.add_command(DisplayItem::Clear { color: BACKGROUND });

        for section in &self.sections {
            // The gate's own dirty flag is folded into this frame.
            section.gate.take_render_dirty();

            let top = section.host.rect.y;
            match section.gate.render() {
                RenderNode::Placeholder(placeholder) => rl.add_command(DisplayItem::Placeholder {
                    y: top as f32,
                    w: viewport.width as f32,
                    min_height: placeholder.min_height as f32,
                    pointer_events: placeholder.pointer_events,
                }),
                RenderNode::Mounted(visual) => rl.extend(visual.paint(top, &viewport)),
            }
        }

        self.render_list = rl;
        self.render_dirty = false;
        self.scene_epoch = self.scene_epoch.wrapping_add(1);

        for section in &self.sections {
            let source = self
                .capabilities
                .contains(Capabilities::INTERSECTION_OBSERVER)
                .then(|| self.viewport_tx.subscribe());
            section.gate.on_first_paint(Some(&section.host), source);
        }

        self.scene_epoch
    }

    /// Scrolls to the given document offset.
    pub fn scroll_to(&mut self, x: i32, y: i32) {
        let changed = self.viewport_tx.send_if_modified(|vp| {
            if vp.x == x && vp.y == y {
                return false;
            }
            vp.translate(x, y);
            true
        });
        if changed {
            self.invalidate_render();
        }
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32) {
        let vp = self.viewport();
        self.scroll_to(vp.x.saturating_add(dx), vp.y.saturating_add(dy));
    }

    /// Resizes the viewport. Section hosts take the new width for the next frame. Host geometry is
    /// fixed for a proximity observer once it started, and gates keep the adaptive mode chosen
    /// when they were mounted. Hosts span from `x = 0`, so a narrower host never leaves the
    /// viewport horizontally.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport_tx.send_modify(|vp| vp.resize(width, height));
        for section in &mut self.sections {
            section.host.rect.width = width;
        }
        self.invalidate_render();
    }

    /// Replaces scroll offset and size in one step, as a restored scroll position would.
    pub fn set_viewport(&mut self, vp: Viewport) {
        if self.viewport() != vp {
            self.viewport_tx.send_replace(vp);
            self.invalidate_render();
        }
    }

    #[inline]
    pub fn viewport(&self) -> Viewport {
        *self.viewport_tx.borrow()
    }

    #[inline]
    pub fn scene_epoch(&self) -> u64 {
        self.scene_epoch
    }

    /// Returns the render list of the last committed frame
    #[inline]
    pub fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    pub fn invalidate_render(&mut self) {
        self.render_dirty = true;
    }

    /// True when a new frame would differ from the committed one, including gates that mounted
    /// since.
    pub fn needs_render(&self) -> bool {
        self.render_dirty || self.sections.iter().any(|s| s.gate.is_render_dirty())
    }

    /// Lifecycle events of every gate on this page.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GateEvent> {
        self.event_tx.subscribe()
    }

    /// Busy/idle tracking shared with the idle scheduler.
    pub fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// True when every gate on the page reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.gates().all(|g| g.state().is_terminal())
    }

    pub fn mounted_count(&self) -> usize {
        self.gates().filter(|g| g.state() == MountState::Mounted).count()
    }

    /// Tears down every gate. Called on drop as well.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for section in &mut self.sections {
            section.gate.teardown();
            section.host.detach();
        }
        log::debug!("page: torn down {} section(s)", self.sections.len());
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for PageView {
    fn drop(&mut self) {
        self.teardown();
    }
}
