//! # Top Panel - Playback Controls and Banners
//!
//! One row with the title, Play/Pause, Step, Reset, the speed selector, the
//! current simulation day and the time of the last status update. Below it,
//! when relevant, the quarantine policy banner and the last error.

use eframe::egui;
use egui::{Color32, RichText};

use crate::ui::{AppState, SPEEDS};

const POLICY_FILL: Color32 = Color32::from_rgb(239, 246, 255);
const POLICY_TEXT: Color32 = Color32::from_rgb(30, 64, 175);
const ERROR_FILL: Color32 = Color32::from_rgb(254, 242, 242);
const ERROR_TEXT: Color32 = Color32::from_rgb(153, 27, 27);

/// Render the top panel.
///
/// # Parameters
///
/// * `ctx` - egui context
/// * `state` - Mutable application state for reading the session and issuing commands
pub fn render(ctx: &egui::Context, state: &mut AppState) {
    egui::TopBottomPanel::top("top_controls").show(ctx, |ui| {
        ui.add_space(4.0);
        ui.horizontal(|ui| {
            ui.heading("Epidemic Graph");
            ui.separator();

            let can_control = state.session.has_session() && !state.session.busy;
            let play_label = if state.session.autoplay { "⏸ Pause" } else { "▶ Play" };
            if ui.add_enabled(can_control, egui::Button::new(play_label)).clicked() {
                state.toggle_autoplay();
            }
            if ui.add_enabled(can_control, egui::Button::new("Step")).clicked() {
                state.step();
            }
            if ui.add_enabled(!state.session.busy, egui::Button::new("Reset")).clicked() {
                state.reset();
            }

            ui.separator();
            ui.label("Speed:");
            for speed in SPEEDS {
                if ui.selectable_label(state.speed == speed, format!("{}x", speed)).clicked() {
                    state.set_speed(speed);
                }
            }

            ui.separator();
            ui.label("Day:");
            ui.label(RichText::new(state.session.status.day.to_string()).monospace().strong());

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let updated = match state.session.last_update {
                    Some(t) => t.format("%H:%M:%S").to_string(),
                    None => "--:--:--".to_string(),
                };
                ui.label(RichText::new(updated).monospace());
                ui.weak("Last update:");
                if state.session.busy {
                    ui.spinner();
                }
            });
        });

        if let Some(policy) = state.session.status.policy_banner() {
            banner(ui, POLICY_FILL, POLICY_TEXT, policy);
        }

        let mut dismiss = false;
        if let Some(error) = &state.session.error {
            egui::Frame::new().fill(ERROR_FILL).inner_margin(6.0).corner_radius(6.0).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(error).color(ERROR_TEXT));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        dismiss = ui.small_button("✕").clicked();
                    });
                });
            });
        }
        if dismiss {
            state.session.error = None;
        }
        ui.add_space(4.0);
    });
}

fn banner(ui: &mut egui::Ui, fill: Color32, text: Color32, message: &str) {
    egui::Frame::new().fill(fill).inner_margin(6.0).corner_radius(6.0).show(ui, |ui| {
        ui.set_width(ui.available_width());
        ui.label(RichText::new(message).color(text));
    });
}
