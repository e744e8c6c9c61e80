//! # Slippy map viewport
//!
//! A Web Mercator view: the world at zoom `z` is a square of `256 · 2^z`
//! pixels. The viewport keeps a geographic center and a fractional zoom, and
//! maps between geographic and screen coordinates around the center of its
//! host rectangle.
//!
//! Movement produces viewport events for anything subscribed:
//! - panning emits `CenterChanged` and `BoundsChanged`
//! - zooming emits `ZoomChanged` and `BoundsChanged`
//! - a resized host emits `BoundsChanged`
//! - the first frame without movement after any of the above emits `Idle`
//!
//! Until the viewport has been laid out once there is no host rectangle and
//! the forward transform is unavailable.

use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Vec2, pos2, vec2};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};

use super::tiles::{TileCache, TileId};
use crate::overlay::{ListenerId, ListenerSet, Projector, RedrawScheduler, ViewportEvent, ViewportHost};

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 19.0;
/// Web Mercator latitude limit.
const MAX_LATITUDE: f64 = 85.051_128_78;
/// Zoom levels per scrolled point.
const SCROLL_ZOOM_RATE: f64 = 1.0 / 240.0;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Pixel position in the Mercator world at `zoom`.
pub fn world_pixel(lat: f64, lng: f64, zoom: f64) -> (f64, f64) {
    let size = TILE_SIZE * 2f64.powf(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

/// Inverse of `world_pixel`.
pub fn world_to_geo(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let size = TILE_SIZE * 2f64.powf(zoom);
    let lng = x / size * 360.0 - 180.0;
    let n = PI - 2.0 * PI * y / size;
    let lat = n.sinh().atan().to_degrees();
    (lat, lng)
}

/// One map instance. Replacing the map means constructing a new instance,
/// which gets a new identity.
pub struct MapInstance {
    id: u64,
    center: (f64, f64),
    zoom: f64,
    rect: Option<Rect>,
    listeners: ListenerSet<ViewportEvent>,
    moved: bool,
}

impl MapInstance {
    pub fn new(center_lat: f64, center_lng: f64, zoom: f64) -> Self {
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!("Map instance {} created at ({}, {}) zoom {}", id, center_lat, center_lng, zoom);
        Self {
            id,
            center: (center_lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), center_lng),
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            rect: None,
            listeners: ListenerSet::new(),
            moved: false,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Record the laid-out host rectangle.
    pub fn set_host_rect(&mut self, rect: Rect) {
        if self.rect != Some(rect) {
            self.rect = Some(rect);
            self.moved = true;
            self.listeners.emit(ViewportEvent::BoundsChanged);
        }
    }

    /// Move the view by a screen-space drag of `delta` points.
    pub fn pan_by(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        let (cx, cy) = world_pixel(self.center.0, self.center.1, self.zoom);
        let (lat, lng) = world_to_geo(cx - delta.x as f64, cy - delta.y as f64, self.zoom);
        self.center = (lat.clamp(-MAX_LATITUDE, MAX_LATITUDE), wrap_longitude(lng));
        self.moved = true;
        self.listeners.emit(ViewportEvent::CenterChanged);
        self.listeners.emit(ViewportEvent::BoundsChanged);
    }

    /// Change zoom by `delta` levels keeping the point under `anchor` fixed on screen.
    pub fn zoom_at(&mut self, delta: f64, anchor: Pos2) {
        let new_zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        if new_zoom == self.zoom {
            return;
        }
        let Some(rect) = self.rect else {
            self.zoom = new_zoom;
            self.listeners.emit(ViewportEvent::ZoomChanged);
            return;
        };
        let anchor_geo = self.unproject(anchor);
        self.zoom = new_zoom;
        if let Some((lat, lng)) = anchor_geo {
            let (ax, ay) = world_pixel(lat, lng, self.zoom);
            let offset = anchor - rect.center();
            let (clat, clng) = world_to_geo(ax - offset.x as f64, ay - offset.y as f64, self.zoom);
            self.center = (clat.clamp(-MAX_LATITUDE, MAX_LATITUDE), wrap_longitude(clng));
        }
        self.moved = true;
        self.listeners.emit(ViewportEvent::ZoomChanged);
        self.listeners.emit(ViewportEvent::BoundsChanged);
    }

    /// Called once per frame after input handling. Emits `Idle` on the first
    /// quiet frame after movement.
    pub fn settle(&mut self, interacting: bool) {
        if self.moved && !interacting {
            self.moved = false;
            self.listeners.emit(ViewportEvent::Idle);
        }
    }

    /// Screen position back to geographic coordinates.
    pub fn unproject(&self, pos: Pos2) -> Option<(f64, f64)> {
        let rect = self.rect?;
        let (cx, cy) = world_pixel(self.center.0, self.center.1, self.zoom);
        let offset = pos - rect.center();
        Some(world_to_geo(cx + offset.x as f64, cy + offset.y as f64, self.zoom))
    }

    /// Tiles covering the host rectangle and where each is drawn.
    pub fn visible_tiles(&self) -> Vec<(TileId, Rect)> {
        let Some(rect) = self.rect else {
            return Vec::new();
        };
        let z = self.zoom.round().clamp(MIN_ZOOM, MAX_ZOOM);
        let scale = 2f64.powf(self.zoom - z);
        let tiles_per_axis = 2u32.pow(z as u32);
        let (cx, cy) = world_pixel(self.center.0, self.center.1, z);
        let left = cx - rect.width() as f64 / 2.0 / scale;
        let top = cy - rect.height() as f64 / 2.0 / scale;
        let right = left + rect.width() as f64 / scale;
        let bottom = top + rect.height() as f64 / scale;

        let mut tiles = Vec::new();
        let y_range = ((top / TILE_SIZE).floor().max(0.0) as i64)..=((bottom / TILE_SIZE).floor().min(tiles_per_axis as f64 - 1.0) as i64);
        for ty in y_range {
            for tx in ((left / TILE_SIZE).floor() as i64)..=((right / TILE_SIZE).floor() as i64) {
                let x = tx.rem_euclid(tiles_per_axis as i64) as u32;
                let min = pos2(
                    rect.left() + ((tx as f64 * TILE_SIZE - left) * scale) as f32,
                    rect.top() + ((ty as f64 * TILE_SIZE - top) * scale) as f32,
                );
                let size = (TILE_SIZE * scale) as f32;
                tiles.push((TileId { z: z as u8, x, y: ty as u32 }, Rect::from_min_size(min, vec2(size, size))));
            }
        }
        tiles
    }

    /// Lay out, handle input and paint the map into the remaining space of `ui`.
    pub fn show(&mut self, ui: &mut egui::Ui, tiles: Option<&mut TileCache>) -> egui::Response {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        self.set_host_rect(rect);

        if response.dragged() {
            self.pan_by(response.drag_delta());
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                let anchor = response.hover_pos().unwrap_or(rect.center());
                self.zoom_at(scroll as f64 * SCROLL_ZOOM_RATE, anchor);
            }
        }
        let scrolling = response.hovered() && ui.input(|i| i.smooth_scroll_delta != Vec2::ZERO);
        self.settle(response.dragged() || scrolling);

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_rgb(226, 232, 240));
        if let Some(tiles) = tiles {
            let uv = Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0));
            for (id, tile_rect) in self.visible_tiles() {
                if let Some(texture) = tiles.texture(id) {
                    painter.image(texture.id(), tile_rect, uv, Color32::WHITE);
                }
            }
        }
        response
    }
}

fn wrap_longitude(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}

impl Projector for MapInstance {
    fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
        let rect = self.rect?;
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        let (cx, cy) = world_pixel(self.center.0, self.center.1, self.zoom);
        let (x, y) = world_pixel(lat, lng, self.zoom);
        Some(rect.center() + vec2((x - cx) as f32, (y - cy) as f32))
    }
}

impl ViewportHost for MapInstance {
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
