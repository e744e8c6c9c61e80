//! The per-frame render pass shared by the map overlay and the fallback view.

use egui::epaint::CircleShape;
use egui::{Color32, Rect, Shape, Stroke, Vec2, pos2, vec2};

use super::decimate::{self, FALLBACK_EDGE_BUDGET, MAP_EDGE_BUDGET};
use super::palette::{color_of, highlight_ring, needs_highlight_ring};
use super::projector::Projector;
use super::snapshot::Snapshot;
use super::surface::OverlaySurface;

/// Spacing of the reference grid in logical pixels.
pub const GRID_SPACING: f32 = 64.0;

/// Per-surface drawing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    pub edge_budget: usize,
    pub node_radius: f32,
    pub wobble: f32,
    pub grid_stroke: Stroke,
    pub edge_stroke: Stroke,
    pub background: Option<Color32>,
}

impl RenderStyle {
    /// Style drawn on top of the map.
    pub fn map_overlay() -> Self {
        Self {
            edge_budget: MAP_EDGE_BUDGET,
            node_radius: 2.2,
            wobble: 0.75,
            grid_stroke: Stroke::new(1.0, Color32::from_rgba_unmultiplied(2, 6, 23, 26)),
            edge_stroke: Stroke::new(1.0, edge_color()),
            background: None,
        }
    }

    /// Style for the map-less network view.
    pub fn fallback() -> Self {
        Self {
            edge_budget: FALLBACK_EDGE_BUDGET,
            node_radius: 2.0,
            wobble: 0.9,
            grid_stroke: Stroke::new(1.0, Color32::from_rgba_unmultiplied(2, 6, 23, 20)),
            edge_stroke: Stroke::new(1.0, edge_color()),
            background: Some(Color32::from_rgba_unmultiplied(2, 6, 23, 8)),
        }
    }
}

// Purple at 0.55 drawn with 0.18 global alpha.
fn edge_color() -> Color32 {
    Color32::from_rgba_unmultiplied(109, 40, 217, 25)
}

/// What the last pass drew and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub stride: usize,
    pub edges_drawn: usize,
    pub edges_skipped: usize,
    pub nodes_drawn: usize,
    pub nodes_skipped: usize,
}

/// Small positional wobble for node `index` at animation `phase`.
///
/// Neighbouring indices get different offsets so the graph shimmers instead
/// of sliding as one block. Computed in f64 so long sessions stay smooth.
pub fn jitter(phase: u64, index: usize, amplitude: f32) -> Vec2 {
    let t = phase as f64;
    let i = index as f64;
    let dx = (t * 0.016 + i * 0.13).sin() * amplitude as f64;
    let dy = (t * 0.014 + i * 0.11).cos() * amplitude as f64;
    vec2(dx as f32, dy as f32)
}

/// Draw one frame of `snapshot` into `surface`.
///
/// `host` is the logical rectangle the surface covers and `pixels_per_point`
/// the device pixel ratio. A zero-sized host leaves the surface untouched and
/// returns `None`. Points the projector cannot place and edges with invalid
/// endpoints are skipped.
pub fn render_pass(
    surface: &mut OverlaySurface,
    host: Rect,
    pixels_per_point: f32,
    projector: &dyn Projector,
    snapshot: &Snapshot,
    phase: u64,
    style: &RenderStyle,
) -> Option<RenderStats> {
    if !surface.resize(host, pixels_per_point) {
        return None;
    }
    surface.clear();

    if let Some(background) = style.background {
        surface.push(Shape::rect_filled(host, 0.0, background));
    }
    draw_grid(surface, host, style.grid_stroke);

    let mut stats = RenderStats {
        stride: decimate::stride(snapshot.edges().len(), style.edge_budget),
        ..Default::default()
    };
    if snapshot.is_empty() {
        return Some(stats);
    }

    let nodes = snapshot.nodes();
    for edge in decimate::select(snapshot.edges(), style.edge_budget) {
        let projected = edge.endpoints(nodes.len()).and_then(|(a, b)| {
            let pa = projector.project(nodes[a].lat, nodes[a].lng)?;
            let pb = projector.project(nodes[b].lat, nodes[b].lng)?;
            Some((pa, pb))
        });
        match projected {
            Some((pa, pb)) => {
                surface.push(Shape::line_segment([pa, pb], style.edge_stroke));
                stats.edges_drawn += 1;
            }
            None => stats.edges_skipped += 1,
        }
    }

    for (index, node) in nodes.iter().enumerate() {
        let Some(position) = projector.project(node.lat, node.lng) else {
            stats.nodes_skipped += 1;
            continue;
        };
        let code = snapshot.state_code(index);
        let stroke = if needs_highlight_ring(code) { highlight_ring() } else { Stroke::NONE };
        surface.push(Shape::Circle(CircleShape {
            center: position + jitter(phase, index, style.wobble),
            radius: style.node_radius,
            fill: color_of(code),
            stroke,
        }));
        stats.nodes_drawn += 1;
    }

    Some(stats)
}

fn draw_grid(surface: &mut OverlaySurface, host: Rect, stroke: Stroke) {
    let mut x = 0.0;
    while x < host.width() {
        let gx = host.left() + x;
        surface.push(Shape::line_segment([pos2(gx, host.top()), pos2(gx, host.bottom())], stroke));
        x += GRID_SPACING;
    }
    let mut y = 0.0;
    while y < host.height() {
        let gy = host.top() + y;
        surface.push(Shape::line_segment([pos2(host.left(), gy), pos2(host.right(), gy)], stroke));
        y += GRID_SPACING;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::palette::NodeState;
    use egui::Pos2;
    use crate::overlay::projector::{FallbackProjector, GeoBounds};
    use crate::overlay::snapshot::{EdgeRef, GeoNode};

    /// Identity-ish projector: lng → x, lat → y, scaled by 10.
    struct Linear;

    impl Projector for Linear {
        fn project(&self, lat: f64, lng: f64) -> Option<Pos2> {
            Some(pos2(lng as f32 * 10.0, lat as f32 * 10.0))
        }
    }

    /// Refuses every point, like a map whose projection is not ready.
    struct NotReady;

    impl Projector for NotReady {
        fn project(&self, _lat: f64, _lng: f64) -> Option<Pos2> {
            None
        }
    }

    /// Number of grid lines `draw_grid` emits for `host`.
    fn grid_line_count(host: Rect) -> usize {
        let per_axis = |extent: f32| if extent <= 0.0 { 0 } else { (extent / GRID_SPACING).ceil() as usize };
        per_axis(host.width()) + per_axis(host.height())
    }

    /// Centers of the node circles in a rendered surface, in draw order.
    fn node_centers(surface: &OverlaySurface) -> Vec<Pos2> {
        surface
            .shapes()
            .iter()
            .filter_map(|shape| match shape {
                Shape::Circle(circle) => Some(circle.center),
                _ => None,
            })
            .collect()
    }

    fn host() -> Rect {
        Rect::from_min_size(Pos2::ZERO, vec2(200.0, 100.0))
    }

    fn three_nodes() -> Vec<GeoNode> {
        vec![GeoNode { lat: 0.0, lng: 0.0 }, GeoNode { lat: 1.0, lng: 1.0 }, GeoNode { lat: 2.0, lng: 2.0 }]
    }

    fn style_with_budget(budget: usize) -> RenderStyle {
        RenderStyle {
            edge_budget: budget,
            ..RenderStyle::map_overlay()
        }
    }

    fn circles(surface: &OverlaySurface) -> Vec<CircleShape> {
        surface
            .shapes()
            .iter()
            .filter_map(|s| match s {
                Shape::Circle(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn invalid_edge_is_skipped_and_the_rest_drawn() {
        let snapshot = Snapshot::new(three_nodes(), vec![EdgeRef { a: 0, b: 1 }, EdgeRef { a: 1, b: 2 }, EdgeRef { a: 5, b: 9 }], None);
        let mut surface = OverlaySurface::new(1);
        let stats = render_pass(&mut surface, host(), 1.0, &Linear, &snapshot, 0, &style_with_budget(10)).unwrap();
        assert_eq!(stats.stride, 1);
        assert_eq!(stats.edges_drawn, 2);
        assert_eq!(stats.edges_skipped, 1);
        assert_eq!(stats.nodes_drawn, 3);
        let segments = surface.shapes().iter().filter(|s| matches!(s, Shape::LineSegment { .. })).count();
        assert_eq!(segments, grid_line_count(host()) + 2);
    }

    #[test]
    fn state_array_drives_colors_and_ring() {
        let snapshot = Snapshot::new(three_nodes(), Vec::new(), Some(vec![0, 2, 3]));
        let mut surface = OverlaySurface::new(1);
        render_pass(&mut surface, host(), 1.0, &Linear, &snapshot, 0, &RenderStyle::map_overlay()).unwrap();
        let drawn = circles(&surface);
        assert_eq!(drawn.len(), 3);
        assert_eq!(drawn[0].fill, NodeState::Susceptible.color());
        assert_eq!(drawn[1].fill, NodeState::Infected.color());
        assert_eq!(drawn[2].fill, NodeState::Quarantined.color());
        assert_eq!(drawn[0].stroke, Stroke::NONE);
        assert_eq!(drawn[1].stroke, Stroke::NONE);
        assert_eq!(drawn[2].stroke, highlight_ring());
    }

    #[test]
    fn nodes_past_the_state_array_are_susceptible() {
        let snapshot = Snapshot::new(three_nodes(), Vec::new(), Some(vec![2]));
        let mut surface = OverlaySurface::new(1);
        render_pass(&mut surface, host(), 1.0, &Linear, &snapshot, 0, &RenderStyle::fallback()).unwrap();
        let fills: Vec<Color32> = circles(&surface).iter().map(|c| c.fill).collect();
        assert_eq!(fills, vec![NodeState::Infected.color(), NodeState::Susceptible.color(), NodeState::Susceptible.color()]);
    }

    #[test]
    fn zero_width_host_leaves_surface_untouched() {
        let snapshot = Snapshot::new(three_nodes(), vec![EdgeRef { a: 0, b: 1 }], None);
        let mut surface = OverlaySurface::new(1);
        render_pass(&mut surface, host(), 2.0, &Linear, &snapshot, 0, &RenderStyle::map_overlay()).unwrap();
        let shapes_before = surface.shapes().len();
        let buffer_before = surface.buffer_size();

        let collapsed = Rect::from_min_size(Pos2::ZERO, vec2(0.0, 100.0));
        assert_eq!(render_pass(&mut surface, collapsed, 2.0, &Linear, &snapshot, 1, &RenderStyle::map_overlay()), None);
        assert_eq!(surface.shapes().len(), shapes_before);
        assert_eq!(surface.buffer_size(), buffer_before);
    }

    #[test]
    fn empty_snapshot_draws_only_the_grid() {
        let mut surface = OverlaySurface::new(1);
        let stats = render_pass(&mut surface, host(), 1.0, &Linear, &Snapshot::default(), 0, &RenderStyle::map_overlay()).unwrap();
        assert_eq!(stats.nodes_drawn, 0);
        assert_eq!(surface.shapes().len(), grid_line_count(host()));
    }

    #[test]
    fn unprojectable_points_are_skipped_not_fatal() {
        let snapshot = Snapshot::new(three_nodes(), vec![EdgeRef { a: 0, b: 1 }], Some(vec![1, 1, 1]));
        let mut surface = OverlaySurface::new(1);
        let stats = render_pass(&mut surface, host(), 1.0, &NotReady, &snapshot, 0, &RenderStyle::map_overlay()).unwrap();
        assert_eq!(stats.edges_drawn, 0);
        assert_eq!(stats.edges_skipped, 1);
        assert_eq!(stats.nodes_skipped, 3);
        assert!(circles(&surface).is_empty());
    }

    #[test]
    fn decimation_caps_drawn_edges() {
        let nodes = three_nodes();
        let edges: Vec<EdgeRef> = (0..20_000).map(|i| EdgeRef { a: i % 3, b: (i + 1) % 3 }).collect();
        let snapshot = Snapshot::new(nodes, edges, None);
        let mut surface = OverlaySurface::new(1);
        let stats = render_pass(&mut surface, host(), 1.0, &Linear, &snapshot, 0, &RenderStyle::map_overlay()).unwrap();
        assert_eq!(stats.stride, 2);
        assert_eq!(stats.edges_drawn, 10_000);
    }

    #[test]
    fn same_inputs_render_the_same_frame() {
        let snapshot = Snapshot::new(three_nodes(), vec![EdgeRef { a: 0, b: 2 }], Some(vec![3, 1, 4]));
        let projector = FallbackProjector::new(GeoBounds { lat_min: 0.0, lat_max: 2.0, lng_min: 0.0, lng_max: 2.0 }, host());
        let mut first = OverlaySurface::new(1);
        let mut second = OverlaySurface::new(2);
        render_pass(&mut first, host(), 1.5, &projector, &snapshot, 77, &RenderStyle::fallback());
        render_pass(&mut second, host(), 1.5, &projector, &snapshot, 77, &RenderStyle::fallback());
        assert_eq!(first.shapes(), second.shapes());
    }

    #[test]
    fn jitter_is_bounded_and_varies_by_node() {
        for phase in [0u64, 1, 1_000, 10_000_000] {
            for index in 0..50 {
                let j = jitter(phase, index, 0.75);
                assert!(j.x.abs() <= 0.75 + 1e-6 && j.y.abs() <= 0.75 + 1e-6);
            }
        }
        assert_ne!(jitter(10, 0, 0.9), jitter(10, 1, 0.9));
        assert_ne!(jitter(10, 0, 0.9), jitter(11, 0, 0.9));
    }

    #[test]
    fn node_centers_follow_jitter() {
        let snapshot = Snapshot::new(three_nodes(), Vec::new(), None);
        let mut surface = OverlaySurface::new(1);
        render_pass(&mut surface, host(), 1.0, &Linear, &snapshot, 5, &RenderStyle::map_overlay());
        let centers = node_centers(&surface);
        assert_eq!(centers[1], pos2(10.0, 10.0) + jitter(5, 1, 0.75));
    }
}
