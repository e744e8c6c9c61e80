//! # Application State Management
//!
//! `AppState` owns everything the UI thread needs between frames and implements
//! `eframe::App`. Each frame it drains the messages from the simulation task,
//! notices window resizes, and then lays out the panels.
//!
//! Session data lives in `SessionView`, which applies task messages and drops
//! the ones that belong to an earlier epoch (a reset or a newer generate
//! happened after the request was issued).

use chrono::{DateTime, Local};
use eframe::egui;
use serde::{Deserialize, Serialize};

use super::network_view::FallbackHost;
use super::{DEFAULT_SPEED, SPEEDS, Tab, UICommand, UIRefreshState, clamp_node_count};
use crate::client::types::{SimStatus, Timeseries};
use crate::config::ViewerConfig;
use crate::map::{MapInstance, TileCache};
use crate::overlay::{AnimationDriver, GeoBounds, ListenerSet, OverlaySurfaceManager, PollTicket, RenderStyle, SnapshotStore, SurfaceState, WindowEvent};

/// Everything the UI knows about the current simulation session.
#[derive(Debug, Default)]
pub struct SessionView {
    pub store: SnapshotStore,
    pub graph_id: Option<String>,
    pub sim_id: Option<String>,
    pub status: SimStatus,
    pub series: Timeseries,
    pub busy: bool,
    pub autoplay: bool,
    pub error: Option<String>,
    pub last_update: Option<DateTime<Local>>,
    /// Bounding box announced by the latest graph export.
    pub graph_bounds: Option<GeoBounds>,
    status_seq: Option<u64>,
    series_seq: Option<u64>,
}

impl SessionView {
    pub fn has_session(&self) -> bool {
        self.sim_id.is_some()
    }

    /// Start a new epoch and clear every piece of session data.
    pub fn reset(&mut self) -> u64 {
        let epoch = self.store.begin_epoch();
        *self = SessionView {
            store: std::mem::take(&mut self.store),
            ..SessionView::default()
        };
        epoch
    }

    /// Start a new epoch for a generate request. The current graph, ids and
    /// results stay on screen until the replacement session reports in, so a
    /// failed generate leaves the last good session usable.
    pub fn begin_generate(&mut self) -> u64 {
        let epoch = self.store.advance_epoch();
        self.status_seq = None;
        self.series_seq = None;
        self.autoplay = false;
        self.error = None;
        self.busy = true;
        epoch
    }

    fn newer(last: &mut Option<u64>, ticket: PollTicket) -> bool {
        if last.is_some_and(|seq| ticket.seq <= seq) {
            return false;
        }
        *last = Some(ticket.seq);
        true
    }

    /// Apply one message from the simulation task.
    ///
    /// Returns true when the drawn snapshot changed.
    pub fn apply(&mut self, msg: UIRefreshState) -> bool {
        let epoch = self.store.epoch();
        match msg {
            UIRefreshState::Busy(busy) => {
                self.busy = busy;
                false
            }
            UIRefreshState::SessionStarted { ticket, graph_id, sim_id, status } => {
                if !self.store.is_current(ticket) {
                    return false;
                }
                self.graph_id = Some(graph_id);
                self.sim_id = Some(sim_id);
                if Self::newer(&mut self.status_seq, ticket) {
                    self.status = status;
                    self.last_update = Some(Local::now());
                }
                false
            }
            UIRefreshState::GraphLoaded { ticket, graph } => {
                let bounds = graph.meta.bounds.map(GeoBounds::from);
                if self.store.accept_graph(ticket, graph.nodes, graph.edges) {
                    log::info!("Graph loaded: {} nodes, {} edges", self.store.snapshot().nodes().len(), self.store.snapshot().edges().len());
                    self.graph_bounds = bounds;
                    true
                } else {
                    false
                }
            }
            UIRefreshState::StateLoaded { ticket, state } => self.store.accept_state(ticket, Some(state)),
            UIRefreshState::SeriesLoaded { ticket, series } => {
                if self.store.is_current(ticket) && Self::newer(&mut self.series_seq, ticket) {
                    self.series = series;
                }
                false
            }
            UIRefreshState::StatusUpdated { ticket, status } => {
                if self.store.is_current(ticket) && Self::newer(&mut self.status_seq, ticket) {
                    self.status = status;
                    self.last_update = Some(Local::now());
                }
                false
            }
            UIRefreshState::AutoplayChanged { epoch: msg_epoch, running } => {
                if msg_epoch == epoch {
                    self.autoplay = running;
                }
                false
            }
            UIRefreshState::Error { epoch: msg_epoch, message } => {
                // Errors from a previous epoch are still worth showing, but
                // must not stop autoplay of the current session.
                if msg_epoch == epoch {
                    self.autoplay = false;
                }
                self.error = Some(message);
                false
            }
        }
    }
}

/// Settings persisted across application sessions.
///
/// Only user preferences; no simulation data.
#[derive(Default, Serialize, Deserialize)]
struct PersistedSettings {
    node_count: Option<u32>,
    speed: Option<u32>,
    tab: Option<Tab>,
}

/// Central application state.
pub struct AppState {
    /// Optional alert message to display in a modal dialog.
    pub alert: Option<String>,
    pub ui_refresh_rx: crate::UIRefreshChannelReceiver,
    pub ui_command_tx: crate::UICommandChannelSender,
    pub config: ViewerConfig,

    pub session: SessionView,
    pub node_count: u32,
    pub speed: u32,
    pub tab: Tab,

    /// Redraw listeners for window-level events.
    pub window_listeners: ListenerSet<WindowEvent>,
    last_screen_rect: Option<egui::Rect>,

    /// Live map, or `None` when the map backend is unavailable.
    pub map: Option<MapInstance>,
    pub map_unavailable: Option<String>,
    pub tiles: Option<TileCache>,
    pub map_overlay: OverlaySurfaceManager,
    pub map_driver: AnimationDriver,

    pub network_host: FallbackHost,
    pub network_overlay: OverlaySurfaceManager,
    pub network_driver: AnimationDriver,
}

impl AppState {
    /// Create a new AppState, loading persisted settings if available.
    ///
    /// # Parameters
    ///
    /// * `rx` - Receiver for UI refresh messages from the simulation task
    /// * `tx` - Sender for commands to the simulation task
    /// * `config` - Loaded viewer configuration
    /// * `alert` - Startup problem to show right away, if any
    /// * `storage` - Optional persistent storage for loading saved settings
    pub fn new(
        rx: crate::UIRefreshChannelReceiver,
        tx: crate::UICommandChannelSender,
        config: ViewerConfig,
        alert: Option<String>,
        storage: Option<&dyn eframe::Storage>,
    ) -> Self {
        let persisted: PersistedSettings = storage.and_then(|s| eframe::get_value(s, "app_settings")).unwrap_or_default();

        let mut map_unavailable = config.map.unavailable_reason().map(str::to_string);
        let mut tiles = None;
        if map_unavailable.is_none() {
            match TileCache::spawn(&config.map, config.request_timeout_secs) {
                Ok(cache) => tiles = cache,
                Err(err) => {
                    log::error!("Map tiles unavailable: {:#}", err);
                    map_unavailable = Some(format!("Map tiles unavailable: {:#}", err));
                }
            }
        }
        let map = match &map_unavailable {
            None => Some(MapInstance::new(config.map.center_lat, config.map.center_lng, config.map.zoom)),
            Some(reason) => {
                log::warn!("Map backend unavailable: {}", reason);
                None
            }
        };

        let speed = persisted.speed.filter(|s| SPEEDS.contains(s)).unwrap_or(DEFAULT_SPEED);
        if tx.try_send(UICommand::SetSpeed(speed)).is_err() {
            log::warn!("Command queue full, speed not sent");
        }

        Self {
            alert,
            ui_refresh_rx: rx,
            ui_command_tx: tx,
            session: SessionView::default(),
            node_count: clamp_node_count(persisted.node_count.unwrap_or(config.node_count)),
            speed,
            tab: persisted.tab.unwrap_or_default(),
            window_listeners: ListenerSet::new(),
            last_screen_rect: None,
            map,
            map_unavailable,
            tiles,
            map_overlay: OverlaySurfaceManager::new("map", RenderStyle::map_overlay()),
            map_driver: AnimationDriver::new(),
            network_host: FallbackHost::new(config.fallback.bounds),
            network_overlay: OverlaySurfaceManager::new("network", RenderStyle::fallback()),
            network_driver: AnimationDriver::new(),
            config,
        }
    }

    /// Queue a command for the simulation task.
    pub fn send(&self, command: UICommand) {
        if let Err(err) = self.ui_command_tx.try_send(command) {
            log::warn!("Command queue full, dropping {:?}", err);
        }
    }

    pub fn generate(&mut self) {
        let epoch = self.session.begin_generate();
        self.send(UICommand::Generate {
            epoch,
            node_count: self.node_count,
        });
    }

    /// Stop autoplay and clear everything shown for the current session.
    pub fn reset(&mut self) {
        let epoch = self.session.reset();
        self.overlays_changed();
        self.send(UICommand::Reset { epoch });
    }

    pub fn step(&mut self) {
        if self.session.has_session() {
            self.send(UICommand::Step {
                epoch: self.session.store.epoch(),
                days: 1,
            });
        }
    }

    pub fn toggle_autoplay(&mut self) {
        if self.session.has_session() {
            self.send(UICommand::SetAutoplay {
                epoch: self.session.store.epoch(),
                running: !self.session.autoplay,
            });
        }
    }

    pub fn set_speed(&mut self, speed: u32) {
        if self.speed != speed {
            self.speed = speed;
            self.send(UICommand::SetSpeed(speed));
        }
    }

    /// Replace the map with a fresh instance at the configured center.
    pub fn recenter_map(&mut self) {
        let Some(old) = self.map.as_mut() else {
            return;
        };
        self.map_overlay.detach(Some(old), &mut self.window_listeners, &mut self.map_driver);
        self.map = Some(MapInstance::new(self.config.map.center_lat, self.config.map.center_lng, self.config.map.zoom));
        if let Some(tiles) = self.tiles.as_mut() {
            tiles.forget_failures();
        }
    }

    fn overlays_changed(&mut self) {
        self.network_host.set_bounds(self.session.graph_bounds.unwrap_or(self.config.fallback.bounds));
        self.map_overlay.request_redraw();
        self.network_overlay.request_redraw();
    }

    /// Detach overlays whose host is not on screen this frame.
    fn detach_hidden_overlays(&mut self) {
        if self.tab != Tab::Map && self.map_overlay.state() != SurfaceState::Detached {
            self.map_overlay.detach(self.map.as_mut(), &mut self.window_listeners, &mut self.map_driver);
        }
        if self.tab != Tab::Network && self.network_overlay.state() != SurfaceState::Detached {
            self.network_overlay.detach(Some(&mut self.network_host), &mut self.window_listeners, &mut self.network_driver);
        }
    }

    fn watch_window(&mut self, ctx: &egui::Context) {
        let screen = ctx.screen_rect();
        if self.last_screen_rect.is_some_and(|r| r != screen) {
            self.window_listeners.emit(WindowEvent::Resized);
        }
        self.last_screen_rect = Some(screen);
    }
}

impl eframe::App for AppState {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            node_count: Some(self.node_count),
            speed: Some(self.speed),
            tab: Some(self.tab),
        };
        eframe::set_value(storage, "app_settings", &settings);
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // The overlay animates continuously; one repaint per display frame.
        ctx.request_repaint();

        let mut snapshot_changed = false;
        while let Ok(msg) = self.ui_refresh_rx.try_receive() {
            snapshot_changed |= self.session.apply(msg);
        }
        if snapshot_changed {
            self.overlays_changed();
        }

        self.watch_window(ctx);
        if let Some(tiles) = self.tiles.as_mut() {
            tiles.poll(ctx);
        }

        if let Some(alert) = self.alert.clone() {
            egui::Window::new("Alert")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
                .show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(20.0);
                        ui.label(alert);
                        ui.add_space(20.0);

                        if ui.button("OK").clicked() {
                            self.alert = None;
                        }
                        ui.add_space(10.0);
                    });
                });
        }

        // Panels layout: top (fixed), left (fixed), tabs fill the remaining space
        super::top_panel::render(ctx, self);
        super::side_panel::render(ctx, self);
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for tab in Tab::ALL {
                    ui.selectable_value(&mut self.tab, tab, tab.label());
                }
            });
            ui.separator();
            self.detach_hidden_overlays();
            match self.tab {
                Tab::Map => super::map_view::render(ui, self),
                Tab::Network => super::network_view::render(ui, self),
                Tab::Results => super::results_view::render(ui, self),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::{GraphExport, GraphMeta, MetaBounds, StateCounts};
    use crate::overlay::GeoNode;

    fn graph(n: usize) -> GraphExport {
        GraphExport {
            nodes: (0..n).map(|i| GeoNode { lat: i as f64, lng: i as f64 }).collect(),
            edges: Vec::new(),
            meta: GraphMeta::default(),
        }
    }

    fn ticket(epoch: u64, seq: u64) -> PollTicket {
        PollTicket { epoch, seq }
    }

    #[test]
    fn results_of_a_reset_session_are_dropped() {
        let mut view = SessionView::default();
        let old = view.reset();
        let new = view.reset();
        assert!(!view.apply(UIRefreshState::GraphLoaded { ticket: ticket(old, 2), graph: graph(3) }));
        assert!(view.store.snapshot().is_empty());
        assert!(view.apply(UIRefreshState::GraphLoaded { ticket: ticket(new, 2), graph: graph(3) }));
        assert!(view.apply(UIRefreshState::StateLoaded { ticket: ticket(new, 3), state: vec![2, 2, 2] }));
        assert_eq!(view.store.snapshot().state_code(1), 2);
    }

    #[test]
    fn reset_clears_session_data() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        view.apply(UIRefreshState::SessionStarted {
            ticket: ticket(epoch, 1),
            graph_id: "g".into(),
            sim_id: "s".into(),
            status: SimStatus {
                day: 4,
                counts: StateCounts { infected: 3, ..Default::default() },
                policy_quarantine_on: true,
                policy_message: String::new(),
            },
        });
        view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 2), graph: graph(2) });
        assert!(view.has_session());
        assert_eq!(view.status.day, 4);

        let next = view.reset();
        assert_eq!(next, epoch + 1);
        assert!(!view.has_session());
        assert_eq!(view.status, SimStatus::default());
        assert!(view.store.snapshot().is_empty());
        assert_eq!(view.store.epoch(), next);
    }

    #[test]
    fn older_status_does_not_overwrite_newer() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        view.apply(UIRefreshState::StatusUpdated { ticket: ticket(epoch, 5), status: SimStatus { day: 5, ..Default::default() } });
        view.apply(UIRefreshState::StatusUpdated { ticket: ticket(epoch, 4), status: SimStatus { day: 4, ..Default::default() } });
        assert_eq!(view.status.day, 5);
        assert!(view.last_update.is_some());
    }

    #[test]
    fn error_keeps_the_snapshot_and_stops_autoplay() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 1), graph: graph(4) });
        view.apply(UIRefreshState::AutoplayChanged { epoch, running: true });
        assert!(view.autoplay);
        view.apply(UIRefreshState::Error { epoch, message: "POST /sim/s/step failed: 500".into() });
        assert!(!view.autoplay);
        assert_eq!(view.store.snapshot().nodes().len(), 4);
        assert_eq!(view.error.as_deref(), Some("POST /sim/s/step failed: 500"));
    }

    #[test]
    fn failed_generate_keeps_the_last_snapshot() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        view.apply(UIRefreshState::SessionStarted {
            ticket: ticket(epoch, 1),
            graph_id: "g".into(),
            sim_id: "s".into(),
            status: SimStatus { day: 3, ..Default::default() },
        });
        view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 2), graph: graph(4) });

        let next = view.begin_generate();
        assert!(view.busy);
        view.apply(UIRefreshState::Error { epoch: next, message: "POST /graph/generate/islamabad_uniform failed: 503".into() });
        view.apply(UIRefreshState::Busy(false));

        assert_eq!(view.store.snapshot().nodes().len(), 4);
        assert!(view.has_session());
        assert_eq!(view.status.day, 3);
        assert!(view.error.is_some());

        // Later results of the surviving session belong to the new epoch.
        assert!(view.apply(UIRefreshState::StateLoaded { ticket: ticket(next, 2), state: vec![2, 2, 2, 2] }));
        view.apply(UIRefreshState::StatusUpdated { ticket: ticket(next, 1), status: SimStatus { day: 4, ..Default::default() } });
        assert_eq!(view.status.day, 4);
    }

    #[test]
    fn successful_generate_replaces_the_old_graph() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 2), graph: graph(4) });
        let next = view.begin_generate();
        assert!(!view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 5), graph: graph(9) }));
        view.apply(UIRefreshState::SessionStarted {
            ticket: ticket(next, 1),
            graph_id: "g2".into(),
            sim_id: "s2".into(),
            status: SimStatus::default(),
        });
        assert!(view.apply(UIRefreshState::GraphLoaded { ticket: ticket(next, 2), graph: graph(6) }));
        assert_eq!(view.store.snapshot().nodes().len(), 6);
        assert_eq!(view.sim_id.as_deref(), Some("s2"));
    }

    #[test]
    fn graph_bounds_are_taken_from_export_meta() {
        let mut view = SessionView::default();
        let epoch = view.reset();
        let mut export = graph(1);
        export.meta.bounds = Some(MetaBounds { lat_min: 1.0, lat_max: 2.0, lng_min: 3.0, lng_max: 4.0 });
        view.apply(UIRefreshState::GraphLoaded { ticket: ticket(epoch, 1), graph: export });
        assert_eq!(view.graph_bounds.map(|b| b.lng_max), Some(4.0));
    }

    #[test]
    fn stale_autoplay_change_is_ignored() {
        let mut view = SessionView::default();
        let old = view.reset();
        view.reset();
        view.apply(UIRefreshState::AutoplayChanged { epoch: old, running: true });
        assert!(!view.autoplay);
    }
}
