//! Drawing surface lifecycle.
//!
//! An `OverlaySurface` is the display list for one host region, sized to the
//! host in logical pixels times the device pixel ratio. The
//! `OverlaySurfaceManager` ties a surface to a viewport instance:
//!
//! ```text
//! Detached --attach_to--> Attaching --host laid out--> Attached --detach--> Detached
//! ```
//!
//! While attached it owns the animation loop handle and the listener ids it
//! registered on the viewport and the window. Detaching releases all of them
//! and the next attach starts from scratch, because the next viewport may be
//! an unrelated instance.

use egui::{Painter, Rect, Shape};

use super::animation::{AnimationDriver, LoopHandle};
use super::projector::Projector;
use super::render::{RenderStats, RenderStyle, render_pass};
use super::signals::{ListenerId, ListenerSet, RedrawScheduler};
use super::snapshot::Snapshot;

/// Viewport movement notifications an overlay subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewportEvent {
    Idle,
    ZoomChanged,
    BoundsChanged,
    CenterChanged,
}

impl ViewportEvent {
    pub const ALL: [ViewportEvent; 4] = [
        ViewportEvent::Idle,
        ViewportEvent::ZoomChanged,
        ViewportEvent::BoundsChanged,
        ViewportEvent::CenterChanged,
    ];
}

/// Window-level events; resize is the only one the overlay cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEvent {
    Resized,
}

/// A viewport an overlay surface can be attached to.
pub trait ViewportHost: Projector {
    /// Identity of this viewport instance. A replaced viewport gets a new id.
    fn instance_id(&self) -> u64;
    /// Logical rectangle of the host region, once it has been laid out.
    fn host_rect(&self) -> Option<Rect>;
    fn subscribe(&mut self, event: ViewportEvent, redraw: RedrawScheduler) -> ListenerId;
    fn unsubscribe(&mut self, id: ListenerId) -> bool;
}

/// Display list for one host region.
#[derive(Debug)]
pub struct OverlaySurface {
    id: u64,
    buffer_size: [u32; 2],
    shapes: Vec<Shape>,
}

impl OverlaySurface {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            buffer_size: [0, 0],
            shapes: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Match the buffer to `host` at `pixels_per_point`. Returns false and
    /// leaves everything as it was when the host has no area.
    pub fn resize(&mut self, host: Rect, pixels_per_point: f32) -> bool {
        let width = host.width();
        let height = host.height();
        if !(width > 0.0 && height > 0.0) {
            return false;
        }
        let ppp = if pixels_per_point > 0.0 { pixels_per_point } else { 1.0 };
        let buffer_size = [(width * ppp).floor() as u32, (height * ppp).floor() as u32];
        if buffer_size != self.buffer_size {
            log::debug!("Surface {} buffer {:?} -> {:?}", self.id, self.buffer_size, buffer_size);
            self.buffer_size = buffer_size;
        }
        true
    }

    /// Physical pixel size of the backing buffer.
    #[cfg(test)]
    pub fn buffer_size(&self) -> [u32; 2] {
        self.buffer_size
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Hand the current display list to egui.
    pub fn paint(&self, painter: &Painter) {
        painter.extend(self.shapes.iter().cloned());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Detached,
    Attaching,
    Attached,
}

struct Attachment {
    surface: OverlaySurface,
    animation: LoopHandle,
    viewport_listeners: Vec<ListenerId>,
    window_listener: ListenerId,
}

/// Owns the overlay surface for one host region and its attach/detach cycle.
pub struct OverlaySurfaceManager {
    name: &'static str,
    style: RenderStyle,
    state: SurfaceState,
    viewport_id: Option<u64>,
    redraw: RedrawScheduler,
    attachment: Option<Attachment>,
    next_surface_id: u64,
    last_stats: Option<RenderStats>,
}

impl OverlaySurfaceManager {
    pub fn new(name: &'static str, style: RenderStyle) -> Self {
        Self {
            name,
            style,
            state: SurfaceState::Detached,
            viewport_id: None,
            redraw: RedrawScheduler::new(),
            attachment: None,
            next_surface_id: 0,
            last_stats: None,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    #[cfg(test)]
    pub fn viewport_id(&self) -> Option<u64> {
        self.viewport_id
    }

    pub fn surface(&self) -> Option<&OverlaySurface> {
        self.attachment.as_ref().map(|a| &a.surface)
    }

    pub fn last_stats(&self) -> Option<RenderStats> {
        self.last_stats
    }

    /// Bind to `viewport`. Re-binding to the instance already bound is a no-op;
    /// binding to a different instance detaches from the old one first.
    ///
    /// The surface is only created once the viewport has been laid out; until
    /// then the manager sits in `Attaching` with no animation loop.
    pub fn attach_to<H: ViewportHost>(&mut self, viewport: &mut H, window: &mut ListenerSet<WindowEvent>, driver: &mut AnimationDriver) {
        if self.viewport_id == Some(viewport.instance_id()) && self.state != SurfaceState::Detached {
            return;
        }
        if self.state != SurfaceState::Detached {
            // The old viewport is out of reach here. Detaching replaces the
            // redraw scheduler, which lapses everything registered on it.
            self.detach::<H>(None, window, driver);
        }
        log::info!("{} overlay attaching to viewport {}", self.name, viewport.instance_id());
        self.viewport_id = Some(viewport.instance_id());
        self.state = SurfaceState::Attaching;
        self.try_complete_attach(viewport, window, driver);
    }

    fn try_complete_attach<H: ViewportHost>(&mut self, viewport: &mut H, window: &mut ListenerSet<WindowEvent>, driver: &mut AnimationDriver) {
        if viewport.host_rect().is_none() {
            return;
        }
        self.next_surface_id += 1;
        let surface = OverlaySurface::new(self.next_surface_id);

        // Fresh scheduler per attachment so nothing registered against an old
        // viewport can reach the new surface.
        self.redraw = RedrawScheduler::new();
        let viewport_listeners = ViewportEvent::ALL.iter().map(|event| viewport.subscribe(*event, self.redraw.clone())).collect();
        let window_listener = window.add(WindowEvent::Resized, self.redraw.clone());
        let animation = driver.start();

        self.attachment = Some(Attachment {
            surface,
            animation,
            viewport_listeners,
            window_listener,
        });
        self.state = SurfaceState::Attached;
        self.redraw.mark_dirty();
        log::info!("{} overlay attached (surface {})", self.name, self.next_surface_id);
    }

    /// Tear down: stop the loop, drop subscriptions, remove the surface, forget
    /// the viewport. Pass the viewport if it still exists so its listeners can
    /// be removed; pass `None` when it has already been dropped.
    pub fn detach<H: ViewportHost>(&mut self, viewport: Option<&mut H>, window: &mut ListenerSet<WindowEvent>, driver: &mut AnimationDriver) {
        if self.state == SurfaceState::Detached {
            return;
        }
        if let Some(attachment) = self.attachment.take() {
            driver.stop(attachment.animation);
            if let Some(viewport) = viewport {
                if self.viewport_id == Some(viewport.instance_id()) {
                    for id in attachment.viewport_listeners {
                        viewport.unsubscribe(id);
                    }
                }
            }
            window.remove(attachment.window_listener);
            log::info!("{} overlay detached (surface {} removed)", self.name, attachment.surface.id());
        }
        self.redraw = RedrawScheduler::new();
        self.viewport_id = None;
        self.last_stats = None;
        self.state = SurfaceState::Detached;
    }

    /// Run the frame's work for the bound viewport: advance the animation loop,
    /// collapse pending redraw requests, and render at most once.
    ///
    /// Returns the stats of the pass if one ran.
    pub fn frame<H: ViewportHost>(
        &mut self,
        viewport: &mut H,
        window: &mut ListenerSet<WindowEvent>,
        driver: &mut AnimationDriver,
        snapshot: &Snapshot,
        pixels_per_point: f32,
    ) -> Option<RenderStats> {
        if self.viewport_id != Some(viewport.instance_id()) {
            return None;
        }
        if self.state == SurfaceState::Attaching {
            self.try_complete_attach(viewport, window, driver);
        }
        let attachment = self.attachment.as_mut()?;

        let ticked = driver.tick(attachment.animation).is_some();
        let requested = self.redraw.take_dirty();
        if !ticked && !requested {
            return None;
        }

        let host = viewport.host_rect().unwrap_or(Rect::NOTHING);
        let stats = render_pass(&mut attachment.surface, host, pixels_per_point, &*viewport, snapshot, driver.phase(), &self.style);
        if stats.is_some() {
            self.last_stats = stats;
        }
        stats
    }

    /// Ask for one extra render on the next frame (e.g. new snapshot data).
    pub fn request_redraw(&self) {
        self.redraw.mark_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::snapshot::{EdgeRef, GeoNode};
    use egui::{Pos2, pos2, vec2};

    struct FakeViewport {
        id: u64,
        rect: Option<Rect>,
        listeners: ListenerSet<ViewportEvent>,
        projections: std::cell::Cell<usize>,
    }

    impl FakeViewport {
        fn new(id: u64) -> Self {
            Self {
                id,
                rect: Some(Rect::from_min_size(Pos2::ZERO, vec2(300.0, 200.0))),
                listeners: ListenerSet::new(),
                projections: std::cell::Cell::new(0),
            }
        }
    }

    impl Projector for FakeViewport {
        fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
            self.projections.set(self.projections.get() + 1);
            Some(pos2(lng as f32 * 10.0, lat as f32 * 10.0))
        }
    }

    impl ViewportHost for FakeViewport {
        fn instance_id(&self) -> u64 {
            self.id
        }
        fn host_rect(&self) -> Option<Rect> {
            self.rect
        }
        fn subscribe(&mut self, event: ViewportEvent, redraw: RedrawScheduler) -> ListenerId {
            self.listeners.add(event, redraw)
        }
        fn unsubscribe(&mut self, id: ListenerId) -> bool {
            self.listeners.remove(id)
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![GeoNode { lat: 0.0, lng: 0.0 }, GeoNode { lat: 1.0, lng: 1.0 }],
            vec![EdgeRef { a: 0, b: 1 }],
            Some(vec![2, 3]),
        )
    }

    struct Rig {
        manager: OverlaySurfaceManager,
        window: ListenerSet<WindowEvent>,
        driver: AnimationDriver,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                manager: OverlaySurfaceManager::new("test", RenderStyle::map_overlay()),
                window: ListenerSet::new(),
                driver: AnimationDriver::new(),
            }
        }

        fn attach(&mut self, viewport: &mut FakeViewport) {
            self.manager.attach_to(viewport, &mut self.window, &mut self.driver);
        }

        fn detach(&mut self, viewport: Option<&mut FakeViewport>) {
            self.manager.detach(viewport, &mut self.window, &mut self.driver);
        }

        fn frame(&mut self, viewport: &mut FakeViewport, snapshot: &Snapshot) -> Option<RenderStats> {
            self.manager.frame(viewport, &mut self.window, &mut self.driver, snapshot, 2.0)
        }
    }

    #[test]
    fn attach_subscribes_and_starts_one_loop() {
        let mut rig = Rig::new();
        let mut viewport = FakeViewport::new(1);
        rig.attach(&mut viewport);
        assert_eq!(rig.manager.state(), SurfaceState::Attached);
        assert_eq!(viewport.listeners.len(), 4);
        assert_eq!(rig.window.len(), 1);
        assert_eq!(rig.driver.running_loops(), 1);
        let stats = rig.frame(&mut viewport, &snapshot()).unwrap();
        assert_eq!(stats.nodes_drawn, 2);
        assert_eq!(rig.manager.surface().unwrap().buffer_size(), [600, 400]);
    }

    #[test]
    fn detach_releases_everything() {
        let mut rig = Rig::new();
        let mut viewport = FakeViewport::new(1);
        rig.attach(&mut viewport);
        rig.detach(Some(&mut viewport));
        assert_eq!(rig.manager.state(), SurfaceState::Detached);
        assert!(rig.manager.surface().is_none());
        assert!(rig.manager.viewport_id().is_none());
        assert!(viewport.listeners.is_empty());
        assert!(rig.window.is_empty());
        assert_eq!(rig.driver.running_loops(), 0);
        assert_eq!(rig.frame(&mut viewport, &snapshot()), None);
    }

    #[test]
    fn attach_detach_attach_leaves_exactly_one_loop() {
        let mut rig = Rig::new();
        let mut first = FakeViewport::new(1);
        rig.attach(&mut first);
        let first_surface = rig.manager.surface().unwrap().id();
        rig.detach(Some(&mut first));

        let mut second = FakeViewport::new(2);
        rig.attach(&mut second);
        assert_eq!(rig.driver.running_loops(), 1);
        assert_ne!(rig.manager.surface().unwrap().id(), first_surface);
        assert!(first.listeners.is_empty());
        assert_eq!(second.listeners.len(), 4);
        assert_eq!(rig.window.len(), 1);

        let phase_before = rig.driver.phase();
        rig.frame(&mut second, &snapshot());
        assert_eq!(rig.driver.phase(), phase_before + 1);
    }

    #[test]
    fn replacing_the_viewport_rebinds_without_leaking() {
        let mut rig = Rig::new();
        let mut first = FakeViewport::new(1);
        rig.attach(&mut first);
        let mut second = FakeViewport::new(2);
        rig.attach(&mut second);
        assert_eq!(rig.manager.viewport_id(), Some(2));
        assert_eq!(rig.driver.running_loops(), 1);
        assert_eq!(rig.window.len(), 1);
        assert!(first.listeners.is_empty());
        assert_eq!(second.listeners.len(), 4);
        // Stale viewport events no longer reach the manager.
        rig.frame(&mut second, &snapshot());
        first.listeners.emit(ViewportEvent::ZoomChanged);
        assert!(!rig.manager.redraw.is_dirty());
    }

    #[test]
    fn repeated_replacement_does_not_grow_old_registries() {
        let mut rig = Rig::new();
        let mut kept = FakeViewport::new(1);
        for id in 2..6 {
            rig.attach(&mut kept);
            let mut replacement = FakeViewport::new(id);
            rig.attach(&mut replacement);
            assert!(kept.listeners.is_empty());
            rig.detach(Some(&mut replacement));
            assert!(replacement.listeners.is_empty());
        }
        rig.attach(&mut kept);
        assert_eq!(kept.listeners.len(), 4);
        assert_eq!(rig.window.len(), 1);
    }

    #[test]
    fn waits_in_attaching_until_host_is_laid_out() {
        let mut rig = Rig::new();
        let mut viewport = FakeViewport::new(7);
        viewport.rect = None;
        rig.attach(&mut viewport);
        assert_eq!(rig.manager.state(), SurfaceState::Attaching);
        assert_eq!(rig.driver.running_loops(), 0);
        assert!(viewport.listeners.is_empty());
        assert_eq!(rig.frame(&mut viewport, &snapshot()), None);

        viewport.rect = Some(Rect::from_min_size(Pos2::ZERO, vec2(100.0, 100.0)));
        assert!(rig.frame(&mut viewport, &snapshot()).is_some());
        assert_eq!(rig.manager.state(), SurfaceState::Attached);
        assert_eq!(rig.driver.running_loops(), 1);
    }

    #[test]
    fn viewport_events_render_once_per_frame_without_a_tick() {
        let mut rig = Rig::new();
        let mut viewport = FakeViewport::new(1);
        rig.attach(&mut viewport);
        rig.frame(&mut viewport, &snapshot());

        // Simulate the loop being cancelled by someone else: only redraw requests remain.
        let other = rig.driver.start();
        assert_eq!(rig.frame(&mut viewport, &snapshot()), None);
        for event in ViewportEvent::ALL {
            viewport.listeners.emit(event);
        }
        rig.window.emit(WindowEvent::Resized);
        let phase = rig.driver.phase();
        assert!(rig.frame(&mut viewport, &snapshot()).is_some());
        assert_eq!(rig.frame(&mut viewport, &snapshot()), None);
        assert_eq!(rig.driver.phase(), phase);
        rig.driver.stop(other);
    }

    #[test]
    fn projection_is_requeried_every_frame() {
        let mut rig = Rig::new();
        let mut viewport = FakeViewport::new(1);
        rig.attach(&mut viewport);
        rig.frame(&mut viewport, &snapshot());
        let after_first = viewport.projections.get();
        rig.frame(&mut viewport, &snapshot());
        assert_eq!(viewport.projections.get(), after_first * 2);
    }

    #[test]
    fn frames_for_another_viewport_are_ignored() {
        let mut rig = Rig::new();
        let mut bound = FakeViewport::new(1);
        let mut stranger = FakeViewport::new(9);
        rig.attach(&mut bound);
        assert_eq!(rig.frame(&mut stranger, &snapshot()), None);
        assert_eq!(rig.driver.phase(), 0);
    }
}
