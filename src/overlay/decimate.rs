//! Deterministic edge decimation.
//!
//! Large graphs carry tens of thousands of edges. Drawing all of them every
//! frame is too expensive, so each surface draws an evenly strided subset
//! instead. Striding keeps the same subset frame after frame for unchanged
//! data, unlike random sampling which flickers.

/// Edge budget for the map-backed overlay.
pub const MAP_EDGE_BUDGET: usize = 7_000;
/// Edge budget for the fallback network view.
pub const FALLBACK_EDGE_BUDGET: usize = 9_000;

/// Stride for `edge_count` edges under `budget`: `max(1, floor(edge_count / budget))`.
///
/// A zero budget is treated as a budget of one.
pub fn stride(edge_count: usize, budget: usize) -> usize {
    (edge_count / budget.max(1)).max(1)
}

/// Number of edges visited when iterating `edge_count` edges at `stride`.
#[cfg(test)]
fn selected_count(edge_count: usize, stride: usize) -> usize {
    edge_count.div_ceil(stride.max(1))
}

/// Iterate the decimated subset of `edges`, preserving order.
pub fn select<T>(edges: &[T], budget: usize) -> impl Iterator<Item = &T> {
    edges.iter().step_by(stride(edges.len(), budget))
}
