//! # Side Panel - Graph Generation and Counts
//!
//! The graph card holds the node count slider with Generate and Clear. Under
//! it, one pill per epidemic state shows the state's color and current count.

use eframe::egui;
use egui::{Color32, RichText, Stroke};

use crate::overlay::NodeState;
use crate::ui::{AppState, NODE_COUNT_MAX, NODE_COUNT_MIN, NODE_COUNT_STEP};

const PANEL_WIDTH: f32 = 260.0;

/// Render the left panel.
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::SidePanel::left("graph_panel").resizable(false).exact_width(PANEL_WIDTH).show(ctx, |ui| {
        ui.add_space(8.0);
        card(ui, "Graph", |ui| {
            ui.label("Nodes");
            ui.add_enabled(
                !state.session.busy,
                egui::Slider::new(&mut state.node_count, NODE_COUNT_MIN..=NODE_COUNT_MAX).step_by(NODE_COUNT_STEP as f64),
            );
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let label = if state.session.busy { "Generating…" } else { "Generate" };
                if ui.add_enabled(!state.session.busy, egui::Button::new(label)).clicked() {
                    state.generate();
                }
                if ui.add_enabled(!state.session.busy, egui::Button::new("Clear")).clicked() {
                    state.reset();
                }
            });
            if let Some(graph_id) = &state.session.graph_id {
                ui.add_space(4.0);
                ui.weak(format!("Graph {}", graph_id));
            }
            if let Some(sim_id) = &state.session.sim_id {
                ui.weak(format!("Simulation {}", sim_id));
            }
        });

        ui.add_space(8.0);
        card(ui, "Node states", |ui| {
            for node_state in NodeState::ALL {
                pill(ui, node_state, state.session.status.counts.get(node_state));
            }
            ui.add_space(4.0);
            ui.weak(format!("Total {}", state.session.status.counts.total()));
        });

        if let Some(stats) = state.map_overlay.last_stats().or(state.network_overlay.last_stats()) {
            ui.add_space(8.0);
            ui.weak(format!("Edges drawn {} (stride {})", stats.edges_drawn, stats.stride));
        }
    });
}

fn card(ui: &mut egui::Ui, title: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::new()
        .fill(Color32::WHITE)
        .stroke(Stroke::new(1.0, Color32::from_rgb(226, 232, 240)))
        .corner_radius(12.0)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.label(RichText::new(title).strong());
            ui.add_space(6.0);
            add_contents(ui);
        });
}

fn pill(ui: &mut egui::Ui, node_state: NodeState, count: u64) {
    ui.horizontal(|ui| {
        let (dot, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
        ui.painter().circle_filled(dot.center(), 5.0, node_state.color());
        ui.label(format!("{} {}", node_state.letter(), node_state.label()));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(RichText::new(count.to_string()).monospace().strong());
        });
    });
}
