//! Simulation session bookkeeping.
//!
//! The controller owns the ids of the running session, the autoplay flag and
//! speed, and the ticket counter. It turns each `UICommand` (or autoplay tick)
//! into a sequence of backend calls and returns the messages the UI should see,
//! in order.

use anyhow::Result;

use super::api::SimApiClient;
use super::types::{GenerateResponse, GraphExport, SimStatus, StateExport, Timeseries};
use crate::overlay::PollTicket;
use crate::ui::{DEFAULT_SPEED, SPEEDS, UICommand, UIRefreshState, clamp_node_count};

/// The backend calls a session needs. Implemented by the HTTP client.
pub trait SimBackend {
    fn generate(&self, n: u32) -> Result<GenerateResponse>;
    fn graph_export(&self, graph_id: &str) -> Result<GraphExport>;
    fn state_export(&self, sim_id: &str) -> Result<StateExport>;
    fn timeseries(&self, sim_id: &str) -> Result<Timeseries>;
    fn step(&self, sim_id: &str, days: u32) -> Result<SimStatus>;
}

impl SimBackend for SimApiClient {
    fn generate(&self, n: u32) -> Result<GenerateResponse> {
        SimApiClient::generate(self, n)
    }
    fn graph_export(&self, graph_id: &str) -> Result<GraphExport> {
        SimApiClient::graph_export(self, graph_id)
    }
    fn state_export(&self, sim_id: &str) -> Result<StateExport> {
        SimApiClient::state_export(self, sim_id)
    }
    fn timeseries(&self, sim_id: &str) -> Result<Timeseries> {
        SimApiClient::timeseries(self, sim_id)
    }
    fn step(&self, sim_id: &str, days: u32) -> Result<SimStatus> {
        SimApiClient::step(self, sim_id, days)
    }
}

#[derive(Debug)]
pub struct SessionController {
    epoch: u64,
    seq: u64,
    graph_id: Option<String>,
    sim_id: Option<String>,
    autoplay: bool,
    speed: u32,
}

impl Default for SessionController {
    fn default() -> Self {
        Self {
            epoch: 0,
            seq: 0,
            graph_id: None,
            sim_id: None,
            autoplay: false,
            speed: DEFAULT_SPEED,
        }
    }
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[cfg(test)]
    pub fn sim_id(&self) -> Option<&str> {
        self.sim_id.as_deref()
    }

    #[cfg(test)]
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// True when the autoplay timer should be armed.
    pub fn autoplay_active(&self) -> bool {
        self.autoplay && self.sim_id.is_some()
    }

    fn next_ticket(&mut self) -> PollTicket {
        self.seq += 1;
        PollTicket {
            epoch: self.epoch,
            seq: self.seq,
        }
    }

    /// Move to `epoch` and stop autoplay. The running session, if any, stays
    /// usable until a replacement has been created.
    fn advance_epoch(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.seq = 0;
        self.autoplay = false;
    }

    /// Move to `epoch`, forgetting the session that belonged to the old one.
    fn enter_epoch(&mut self, epoch: u64) {
        self.advance_epoch(epoch);
        self.graph_id = None;
        self.sim_id = None;
    }

    pub fn handle<B: SimBackend>(&mut self, command: UICommand, backend: &B) -> Vec<UIRefreshState> {
        let mut out = Vec::new();
        match command {
            UICommand::Generate { epoch, node_count } => {
                self.advance_epoch(epoch);
                self.generate(clamp_node_count(node_count), backend, &mut out);
                out.push(UIRefreshState::Busy(false));
            }
            UICommand::Step { epoch, days } => {
                if epoch == self.epoch {
                    self.step(days, backend, &mut out);
                } else {
                    log::debug!("Ignoring step for stale epoch {} (current {})", epoch, self.epoch);
                }
            }
            UICommand::SetAutoplay { epoch, running } => {
                if epoch == self.epoch {
                    self.autoplay = running && self.sim_id.is_some();
                    log::info!("Autoplay {}", if self.autoplay { "started" } else { "paused" });
                    out.push(UIRefreshState::AutoplayChanged { epoch, running: self.autoplay });
                }
            }
            UICommand::SetSpeed(speed) => {
                if SPEEDS.contains(&speed) {
                    self.speed = speed;
                } else {
                    log::warn!("Ignoring unsupported speed {}", speed);
                }
            }
            UICommand::Reset { epoch } => {
                log::info!("Session reset (epoch {})", epoch);
                self.enter_epoch(epoch);
                out.push(UIRefreshState::AutoplayChanged { epoch, running: false });
            }
        }
        out
    }

    /// One autoplay interval elapsed: advance by `speed` days.
    pub fn autoplay_tick<B: SimBackend>(&mut self, backend: &B) -> Vec<UIRefreshState> {
        let mut out = Vec::new();
        if self.autoplay_active() {
            self.step(self.speed, backend, &mut out);
        }
        out
    }

    fn generate<B: SimBackend>(&mut self, node_count: u32, backend: &B, out: &mut Vec<UIRefreshState>) {
        log::info!("Generating graph with {} nodes", node_count);
        let ticket = self.next_ticket();
        let response = match backend.generate(node_count) {
            Ok(response) => response,
            Err(err) => return self.fail(err, out),
        };
        self.graph_id = Some(response.graph_id.clone());
        self.sim_id = Some(response.sim_id.clone());
        log::info!("Session started: graph {} sim {}", response.graph_id, response.sim_id);
        out.push(UIRefreshState::SessionStarted {
            ticket,
            graph_id: response.graph_id.clone(),
            sim_id: response.sim_id.clone(),
            status: response.status,
        });

        let ticket = self.next_ticket();
        match backend.graph_export(&response.graph_id) {
            Ok(graph) => out.push(UIRefreshState::GraphLoaded { ticket, graph }),
            Err(err) => return self.fail(err, out),
        }
        if let Err(err) = self.fetch_state(&response.sim_id, backend, out) {
            return self.fail(err, out);
        }
        if let Err(err) = self.fetch_series(&response.sim_id, backend, out) {
            self.fail(err, out);
        }
    }

    fn step<B: SimBackend>(&mut self, days: u32, backend: &B, out: &mut Vec<UIRefreshState>) {
        let Some(sim_id) = self.sim_id.clone() else {
            log::debug!("Step requested without a session");
            return;
        };
        let ticket = self.next_ticket();
        match backend.step(&sim_id, days.max(1)) {
            Ok(status) => out.push(UIRefreshState::StatusUpdated { ticket, status }),
            Err(err) => return self.fail(err, out),
        }
        if let Err(err) = self.fetch_series(&sim_id, backend, out) {
            return self.fail(err, out);
        }
        if let Err(err) = self.fetch_state(&sim_id, backend, out) {
            self.fail(err, out);
        }
    }

    fn fetch_state<B: SimBackend>(&mut self, sim_id: &str, backend: &B, out: &mut Vec<UIRefreshState>) -> Result<()> {
        let ticket = self.next_ticket();
        let state = backend.state_export(sim_id)?;
        out.push(UIRefreshState::StateLoaded { ticket, state: state.state });
        Ok(())
    }

    fn fetch_series<B: SimBackend>(&mut self, sim_id: &str, backend: &B, out: &mut Vec<UIRefreshState>) -> Result<()> {
        let ticket = self.next_ticket();
        let series = backend.timeseries(sim_id)?;
        out.push(UIRefreshState::SeriesLoaded { ticket, series });
        Ok(())
    }

    /// Report `err` and pause autoplay. The displayed snapshot is left alone.
    fn fail(&mut self, err: anyhow::Error, out: &mut Vec<UIRefreshState>) {
        log::error!("Simulation API error: {:#}", err);
        out.push(UIRefreshState::Error {
            epoch: self.epoch,
            message: format!("{:#}", err),
        });
        if self.autoplay {
            self.autoplay = false;
            out.push(UIRefreshState::AutoplayChanged {
                epoch: self.epoch,
                running: false,
            });
        }
    }
}
