//! # Map Tab
//!
//! The slippy map with the graph overlay painted on top. When the map backend
//! is unavailable a placeholder explains why and the map overlay stays
//! detached; the Network tab still works.

use eframe::egui;

use crate::ui::AppState;

/// Render the Map tab into `ui`.
pub fn render(ui: &mut egui::Ui, state: &mut AppState) {
    if state.map.is_none() {
        placeholder(ui, state.map_unavailable.as_deref().unwrap_or("Map unavailable"));
        return;
    }

    let mut recenter = false;
    ui.horizontal(|ui| {
        recenter = ui.button("Recenter").clicked();
        if let Some(map) = &state.map {
            let (lat, lng) = map.center();
            ui.weak(format!("{:.4}, {:.4}  zoom {:.1}", lat, lng, map.zoom()));
        }
    });
    if recenter {
        state.recenter_map();
    }

    let Some(map) = state.map.as_mut() else {
        return;
    };
    let response = map.show(ui, state.tiles.as_mut());

    state.map_overlay.attach_to(map, &mut state.window_listeners, &mut state.map_driver);
    state.map_overlay.frame(
        map,
        &mut state.window_listeners,
        &mut state.map_driver,
        state.session.store.snapshot(),
        ui.ctx().pixels_per_point(),
    );

    let painter = ui.painter_at(response.rect);
    if let Some(surface) = state.map_overlay.surface() {
        surface.paint(&painter);
    }
    if let Some(attribution) = state.config.map.attribution.as_deref().filter(|_| state.tiles.is_some()) {
        painter.text(
            response.rect.right_bottom() - egui::vec2(4.0, 2.0),
            egui::Align2::RIGHT_BOTTOM,
            attribution,
            egui::FontId::proportional(10.0),
            ui.visuals().weak_text_color(),
        );
    }
}

fn placeholder(ui: &mut egui::Ui, reason: &str) {
    let (rect, _) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 8.0, ui.visuals().faint_bg_color);
    painter.text(
        rect.center() - egui::vec2(0.0, 10.0),
        egui::Align2::CENTER_CENTER,
        "Map unavailable",
        egui::FontId::proportional(16.0),
        ui.visuals().text_color(),
    );
    painter.text(
        rect.center() + egui::vec2(0.0, 12.0),
        egui::Align2::CENTER_CENTER,
        format!("{}. The Network tab shows the graph without a map.", reason),
        egui::FontId::proportional(12.0),
        ui.visuals().weak_text_color(),
    );
}
