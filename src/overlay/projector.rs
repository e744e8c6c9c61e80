//! Geographic to screen projection.
//!
//! The render pass never holds on to a transform. It receives a `Projector`
//! for the frame it is drawing and asks it for every point, so a map that
//! moved since the last frame can never leave stale positions behind.

use egui::{Pos2, Rect, pos2};
use serde::Deserialize;

/// Capability to place a geographic coordinate in screen space.
///
/// Returns `None` when the point cannot be placed this frame (transform not
/// ready yet, non-finite input). Callers skip the point and move on.
pub trait Projector {
    fn project(&self, lat: f64, lng: f64) -> Option<Pos2>;
}

impl<P: Projector + ?Sized> Projector for &P {
    fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
        (**self).project(lat, lng)
    }
}

/// Geographic bounding box used by the fallback projection.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl GeoBounds {
    /// Area covered by the `islamabad_uniform` graph preset.
    pub const ISLAMABAD: GeoBounds = GeoBounds {
        lat_min: 33.55,
        lat_max: 33.78,
        lng_min: 72.95,
        lng_max: 73.22,
    };

    pub fn is_degenerate(&self) -> bool {
        let lat_span = self.lat_max - self.lat_min;
        let lng_span = self.lng_max - self.lng_min;
        !(lat_span.is_finite() && lng_span.is_finite()) || lat_span == 0.0 || lng_span == 0.0
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        GeoBounds::ISLAMABAD
    }
}

/// Fixed linear mapping of a bounding box onto a screen rectangle, north up.
#[derive(Debug, Clone, Copy)]
pub struct FallbackProjector {
    bounds: GeoBounds,
    rect: Rect,
}

impl FallbackProjector {
    pub fn new(bounds: GeoBounds, rect: Rect) -> Self {
        Self { bounds, rect }
    }
}

impl Projector for FallbackProjector {
    fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
        if self.bounds.is_degenerate() || !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        let x01 = (lng - self.bounds.lng_min) / (self.bounds.lng_max - self.bounds.lng_min);
        let y01 = 1.0 - (lat - self.bounds.lat_min) / (self.bounds.lat_max - self.bounds.lat_min);
        Some(pos2(
            self.rect.left() + (x01 * self.rect.width() as f64) as f32,
            self.rect.top() + (y01 * self.rect.height() as f64) as f32,
        ))
    }
}
