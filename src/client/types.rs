//! Wire types of the simulation API.
//!
//! Every field the viewer does not strictly need is optional or defaulted, so
//! a partial response decodes to neutral values instead of failing.

use serde::{Deserialize, Serialize};

use crate::overlay::{EdgeRef, GeoBounds, GeoNode, NodeState};

/// Compartment counts keyed by the single-letter state names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    #[serde(rename = "S", default)]
    pub susceptible: u64,
    #[serde(rename = "E", default)]
    pub exposed: u64,
    #[serde(rename = "I", default)]
    pub infected: u64,
    #[serde(rename = "Q", default)]
    pub quarantined: u64,
    #[serde(rename = "R", default)]
    pub recovered: u64,
}

impl StateCounts {
    pub fn get(&self, state: NodeState) -> u64 {
        match state {
            NodeState::Susceptible => self.susceptible,
            NodeState::Exposed => self.exposed,
            NodeState::Infected => self.infected,
            NodeState::Quarantined => self.quarantined,
            NodeState::Recovered => self.recovered,
        }
    }

    pub fn total(&self) -> u64 {
        NodeState::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Simulation status returned by both generate and step.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimStatus {
    #[serde(default)]
    pub day: u64,
    #[serde(default)]
    pub counts: StateCounts,
    #[serde(default)]
    pub policy_quarantine_on: bool,
    #[serde(default)]
    pub policy_message: String,
}

impl SimStatus {
    /// Text for the policy banner, if the policy is active.
    pub fn policy_banner(&self) -> Option<&str> {
        if !self.policy_quarantine_on {
            None
        } else if self.policy_message.trim().is_empty() {
            Some("Auto-quarantine is active.")
        } else {
            Some(self.policy_message.as_str())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerateResponse {
    pub graph_id: String,
    pub sim_id: String,
    #[serde(flatten)]
    pub status: SimStatus,
}

/// Body of `POST /graph/generate/<preset>`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerateRequest {
    pub n: u32,
}

/// Body of `POST /sim/<id>/step`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepRequest {
    pub days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MetaBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl From<MetaBounds> for GeoBounds {
    fn from(b: MetaBounds) -> Self {
        GeoBounds {
            lat_min: b.lat_min,
            lat_max: b.lat_max,
            lng_min: b.lng_min,
            lng_max: b.lng_max,
        }
    }
}

/// Descriptive block attached to a graph export.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphMeta {
    #[serde(default)]
    pub bounds: Option<MetaBounds>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphExport {
    #[serde(default)]
    pub nodes: Vec<GeoNode>,
    #[serde(default)]
    pub edges: Vec<EdgeRef>,
    #[serde(default)]
    pub meta: GraphMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StateExport {
    #[serde(default)]
    pub state: Vec<i64>,
}

/// One day of the epidemic curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    #[serde(default)]
    pub day: u64,
    #[serde(flatten)]
    pub counts: StateCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Timeseries {
    #[serde(default)]
    pub series: Vec<SeriesPoint>,
}

impl Timeseries {
    /// Largest compartment value across all points; at least 1 so the chart
    /// never divides by zero.
    pub fn max_value(&self) -> u64 {
        self.series
            .iter()
            .flat_map(|p| NodeState::ALL.into_iter().map(move |s| p.counts.get(s)))
            .max()
            .unwrap_or(0)
            .max(1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub ok: bool,
}
