//! # Results Tab
//!
//! The epidemic curve: one line per state over the simulated days, scaled to
//! the largest value seen in any state, followed by the same data as a table.

use eframe::egui;
use egui::{Color32, Pos2, Rect, Sense, Shape, Stroke, pos2};

use crate::client::types::Timeseries;
use crate::overlay::NodeState;
use crate::ui::AppState;

const CHART_PADDING: f32 = 26.0;
const CHART_HEIGHT: f32 = 240.0;
const GUIDE_INTERVALS: usize = 5;

/// Maps series points into a chart rectangle.
#[derive(Debug, Clone, Copy)]
pub struct ChartLayout {
    rect: Rect,
    points: usize,
    max_value: f32,
}

impl ChartLayout {
    pub fn new(rect: Rect, series: &Timeseries) -> Self {
        Self {
            rect,
            points: series.series.len(),
            max_value: series.max_value() as f32,
        }
    }

    pub fn x_at(&self, index: usize) -> f32 {
        let left = self.rect.left() + CHART_PADDING;
        if self.points <= 1 {
            return left;
        }
        left + index as f32 / (self.points - 1) as f32 * (self.rect.width() - 2.0 * CHART_PADDING)
    }

    pub fn y_at(&self, value: u64) -> f32 {
        self.rect.bottom() - CHART_PADDING - value as f32 / self.max_value * (self.rect.height() - 2.0 * CHART_PADDING)
    }

    /// y of the horizontal guide `i` in `0..=GUIDE_INTERVALS`, top to bottom.
    pub fn guide_y(&self, i: usize) -> f32 {
        self.rect.top() + CHART_PADDING + i as f32 / GUIDE_INTERVALS as f32 * (self.rect.height() - 2.0 * CHART_PADDING)
    }

    pub fn polyline(&self, series: &Timeseries, state: NodeState) -> Vec<Pos2> {
        series.series.iter().enumerate().map(|(i, p)| pos2(self.x_at(i), self.y_at(p.counts.get(state)))).collect()
    }
}

fn line_width(state: NodeState) -> f32 {
    if state == NodeState::Infected { 2.5 } else { 2.0 }
}

fn draw_chart(ui: &mut egui::Ui, series: &Timeseries) {
    let width = ui.available_width();
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, CHART_HEIGHT), Sense::hover());
    let painter = ui.painter_at(rect);
    let layout = ChartLayout::new(rect, series);

    painter.rect_filled(rect, 12.0, Color32::WHITE);
    let guide = Stroke::new(1.0, Color32::from_rgb(229, 231, 235));
    let axis = Stroke::new(1.0, Color32::from_rgb(203, 213, 225));
    let (left, right) = (rect.left() + CHART_PADDING, rect.right() - CHART_PADDING);
    for i in 0..=GUIDE_INTERVALS {
        let y = layout.guide_y(i);
        painter.line_segment([pos2(left, y), pos2(right, y)], guide);
    }
    let bottom = rect.bottom() - CHART_PADDING;
    painter.line_segment([pos2(left, bottom), pos2(right, bottom)], axis);
    painter.line_segment([pos2(left, rect.top() + CHART_PADDING), pos2(left, bottom)], axis);

    for state in NodeState::ALL {
        let points = layout.polyline(series, state);
        if points.len() >= 2 {
            painter.add(Shape::line(points, Stroke::new(line_width(state), state.color())));
        }
    }
}

fn draw_table(ui: &mut egui::Ui, series: &Timeseries) {
    use egui_extras::{Column, TableBuilder};

    let row_height = ui.text_style_height(&egui::TextStyle::Body) * 1.3;
    TableBuilder::new(ui)
        .striped(true)
        .vscroll(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::initial(60.0).at_least(40.0)) // Day
        .columns(Column::initial(80.0).at_least(50.0), NodeState::ALL.len())
        .header(row_height, |mut header| {
            header.col(|ui| {
                ui.strong("Day");
            });
            for state in NodeState::ALL {
                header.col(|ui| {
                    ui.strong(egui::RichText::new(state.letter()).color(state.color()));
                });
            }
        })
        .body(|body| {
            // Newest day first
            let row_count = series.series.len();
            body.rows(row_height, row_count, |mut row| {
                let point = &series.series[row_count - 1 - row.index()];
                row.col(|ui| {
                    ui.monospace(point.day.to_string());
                });
                for state in NodeState::ALL {
                    row.col(|ui| {
                        ui.monospace(point.counts.get(state).to_string());
                    });
                }
            });
        });
}

/// Render the Results tab into `ui`.
pub fn render(ui: &mut egui::Ui, state: &AppState) {
    let series = &state.session.series;
    if series.series.is_empty() {
        ui.weak("No results yet. Generate a graph and step the simulation.");
        return;
    }
    ui.horizontal(|ui| {
        for node_state in NodeState::ALL {
            ui.colored_label(node_state.color(), format!("● {}", node_state.label()));
        }
    });
    draw_chart(ui, series);
    ui.add_space(8.0);
    draw_table(ui, series);
}
