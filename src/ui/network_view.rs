//! # Network Tab
//!
//! Draws the graph without a map: node coordinates are placed by a fixed
//! linear mapping of a geographic bounding box onto the panel. The box comes
//! from the latest graph export when it carries one, otherwise from the
//! `[fallback]` config section.

use eframe::egui;
use egui::{Pos2, Rect, Sense};

use crate::overlay::{FallbackProjector, GeoBounds, ListenerId, ListenerSet, Projector, RedrawScheduler, ViewportEvent, ViewportHost};
use crate::ui::AppState;

/// Host region of the Network tab.
pub struct FallbackHost {
    id: u64,
    rect: Option<Rect>,
    bounds: GeoBounds,
    listeners: ListenerSet<ViewportEvent>,
}

impl FallbackHost {
    pub fn new(bounds: GeoBounds) -> Self {
        Self {
            id: 0,
            rect: None,
            bounds,
            listeners: ListenerSet::new(),
        }
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Switch to another bounding box. Degenerate boxes are ignored.
    pub fn set_bounds(&mut self, bounds: GeoBounds) {
        if bounds.is_degenerate() {
            log::warn!("Ignoring degenerate bounds {:?}", bounds);
            return;
        }
        if bounds != self.bounds {
            self.bounds = bounds;
            self.listeners.emit(ViewportEvent::BoundsChanged);
        }
    }

    pub fn set_rect(&mut self, rect: Rect) {
        if self.rect != Some(rect) {
            self.rect = Some(rect);
            self.listeners.emit(ViewportEvent::BoundsChanged);
        }
    }
}

impl Projector for FallbackHost {
    fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
        FallbackProjector::new(self.bounds, self.rect?).project(lat, lng)
    }
}

impl ViewportHost for FallbackHost {
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

/// Render the Network tab into `ui`.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.strong("Network");
        let b = state.network_host.bounds();
        ui.weak(format!("lat {:.3}..{:.3}  lng {:.3}..{:.3}", b.lat_min, b.lat_max, b.lng_min, b.lng_max));
    });
    ui.separator();

    let (rect, _response) = ui.allocate_exact_size(ui.available_size(), Sense::hover());
    state.network_host.set_rect(rect);

    state.network_overlay.attach_to(&mut state.network_host, &mut state.window_listeners, &mut state.network_driver);
    state.network_overlay.frame(
        &mut state.network_host,
        &mut state.window_listeners,
        &mut state.network_driver,
        state.session.store.snapshot(),
        ui.ctx().pixels_per_point(),
    );

    let painter = ui.painter_at(rect);
    painter.rect_stroke(rect, 8.0, ui.visuals().widgets.noninteractive.bg_stroke, egui::StrokeKind::Inside);
    if let Some(surface) = state.network_overlay.surface() {
        surface.paint(&painter);
    }
    if state.session.store.snapshot().is_empty() {
        painter.text(rect.center(), egui::Align2::CENTER_CENTER, "Generate a graph to see the network", egui::FontId::proportional(14.0), ui.visuals().weak_text_color());
    }
}
