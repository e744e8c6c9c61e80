// UI module for the epidemic graph viewer
//
// This module organizes the UI into separate components:
// - `top_panel`: Title, playback controls, speed and day readout, banners
// - `side_panel`: Graph generation card and per-state node counts
// - `map_view`: Map tab, slippy map with the graph overlay on top
// - `network_view`: Network tab, the overlay on a plain bounding-box projection
// - `results_view`: Results tab, epidemic curve chart and table
// - `app_state`: Application state management and main update loop

pub mod app_state;
pub mod map_view;
pub mod network_view;
pub mod results_view;
pub mod side_panel;
pub mod top_panel;

use serde::{Deserialize, Serialize};

use crate::client::types::{GraphExport, SimStatus, Timeseries};
use crate::overlay::PollTicket;

pub use app_state::AppState;

/// Messages from the simulation task to the UI.
///
/// Results carry the ticket of the request that produced them; the UI drops
/// any whose epoch is no longer current.
#[derive(Debug)]
pub enum UIRefreshState {
    Busy(bool),
    SessionStarted {
        ticket: PollTicket,
        graph_id: String,
        sim_id: String,
        status: SimStatus,
    },
    GraphLoaded {
        ticket: PollTicket,
        graph: GraphExport,
    },
    StateLoaded {
        ticket: PollTicket,
        state: Vec<i64>,
    },
    SeriesLoaded {
        ticket: PollTicket,
        series: Timeseries,
    },
    StatusUpdated {
        ticket: PollTicket,
        status: SimStatus,
    },
    AutoplayChanged {
        epoch: u64,
        running: bool,
    },
    Error {
        epoch: u64,
        message: String,
    },
}

/// Commands from the UI to the simulation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UICommand {
    /// Start a new session with a freshly generated graph.
    Generate { epoch: u64, node_count: u32 },
    Step { epoch: u64, days: u32 },
    SetAutoplay { epoch: u64, running: bool },
    SetSpeed(u32),
    /// Forget the current session.
    Reset { epoch: u64 },
}

/// Central area tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tab {
    #[default]
    Map,
    Network,
    Results,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Map, Tab::Network, Tab::Results];

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Map => "Map",
            Tab::Network => "Network",
            Tab::Results => "Results",
        }
    }
}

/// Autoplay step sizes offered in the speed selector.
pub const SPEEDS: [u32; 4] = [1, 2, 4, 8];
pub const DEFAULT_SPEED: u32 = 2;

/// Node count slider range and step.
pub const NODE_COUNT_MIN: u32 = 200;
pub const NODE_COUNT_MAX: u32 = 10_000;
pub const NODE_COUNT_STEP: u32 = 100;

/// Clamp a requested node count to the slider range and step.
pub fn clamp_node_count(n: u32) -> u32 {
    let clamped = n.clamp(NODE_COUNT_MIN, NODE_COUNT_MAX);
    (clamped / NODE_COUNT_STEP) * NODE_COUNT_STEP
}
