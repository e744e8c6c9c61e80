//! The (nodes, edges, state) triple the renderer draws, and the store that
//! decides which backend results are allowed to replace it.

use serde::{Deserialize, Serialize};

/// Graph node position. The node's identity is its index in the node list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoNode {
    pub lat: f64,
    pub lng: f64,
}

/// Undirected edge between two node indices, as sent by the backend.
///
/// Indices are kept signed so a malformed edge decodes and is skipped at
/// draw time instead of failing the whole export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub a: i64,
    pub b: i64,
}

impl EdgeRef {
    /// Both endpoints as valid indices into a node list of `node_count`, or `None`.
    pub fn endpoints(&self, node_count: usize) -> Option<(usize, usize)> {
        let a = usize::try_from(self.a).ok().filter(|a| *a < node_count)?;
        let b = usize::try_from(self.b).ok().filter(|b| *b < node_count)?;
        Some((a, b))
    }
}

/// Everything one render pass needs to know about the graph.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: Vec<GeoNode>,
    edges: Vec<EdgeRef>,
    state: Option<Vec<i64>>,
}

impl Snapshot {
    pub fn new(nodes: Vec<GeoNode>, edges: Vec<EdgeRef>, state: Option<Vec<i64>>) -> Self {
        Self { nodes, edges, state }
    }

    pub fn nodes(&self) -> &[GeoNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[EdgeRef] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// State code for node `index`. Missing or short state arrays read as Susceptible (0).
    pub fn state_code(&self, index: usize) -> i64 {
        self.state.as_ref().and_then(|s| s.get(index).copied()).unwrap_or(0)
    }

    #[cfg(test)]
    pub fn has_state(&self) -> bool {
        self.state.is_some()
    }
}

/// Tag attached by the polling task to every backend result.
///
/// `epoch` changes whenever the UI starts a new session or resets; `seq`
/// increases with every request issued inside an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollTicket {
    pub epoch: u64,
    pub seq: u64,
}

/// Holds the displayed snapshot and filters out results that arrive late.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshot: Snapshot,
    epoch: u64,
    graph_seq: Option<u64>,
    state_seq: Option<u64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start a new epoch but keep drawing the current snapshot until a graph
    /// for the new epoch is accepted. Anything still in flight for the old
    /// epoch will be rejected when it lands.
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.graph_seq = None;
        self.state_seq = None;
        self.epoch
    }

    /// Start a new epoch and clear the snapshot.
    pub fn begin_epoch(&mut self) -> u64 {
        self.snapshot = Snapshot::default();
        self.advance_epoch()
    }

    pub fn is_current(&self, ticket: PollTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Replace the whole snapshot. Only reached through the ticketed
    /// `accept_graph`.
    fn set_snapshot(&mut self, nodes: Vec<GeoNode>, edges: Vec<EdgeRef>, state: Option<Vec<i64>>) {
        self.snapshot = Snapshot::new(nodes, edges, state);
    }

    /// Apply a graph export. The previous state array belongs to the previous
    /// graph, so it is dropped with it.
    pub fn accept_graph(&mut self, ticket: PollTicket, nodes: Vec<GeoNode>, edges: Vec<EdgeRef>) -> bool {
        if !self.is_current(ticket) || self.graph_seq.is_some_and(|seq| ticket.seq <= seq) {
            log::debug!("Dropping stale graph export {:?} (epoch {})", ticket, self.epoch);
            return false;
        }
        self.graph_seq = Some(ticket.seq);
        self.state_seq = None;
        self.set_snapshot(nodes, edges, None);
        true
    }

    /// Apply a state export on top of the current graph.
    pub fn accept_state(&mut self, ticket: PollTicket, state: Option<Vec<i64>>) -> bool {
        let older_than_graph = self.graph_seq.is_some_and(|seq| ticket.seq < seq);
        if !self.is_current(ticket) || older_than_graph || self.state_seq.is_some_and(|seq| ticket.seq <= seq) {
            log::debug!("Dropping stale state export {:?} (epoch {})", ticket, self.epoch);
            return false;
        }
        self.state_seq = Some(ticket.seq);
        self.snapshot.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<GeoNode> {
        (0..n).map(|i| GeoNode { lat: i as f64, lng: i as f64 }).collect()
    }

    #[test]
    fn out_of_range_and_negative_edges_have_no_endpoints() {
        assert_eq!(EdgeRef { a: 0, b: 2 }.endpoints(3), Some((0, 2)));
        assert_eq!(EdgeRef { a: 5, b: 9 }.endpoints(3), None);
        assert_eq!(EdgeRef { a: -1, b: 0 }.endpoints(3), None);
        assert_eq!(EdgeRef { a: 0, b: 3 }.endpoints(3), None);
    }

    #[test]
    fn short_or_missing_state_defaults_to_susceptible() {
        let s = Snapshot::new(nodes(4), Vec::new(), Some(vec![2, 3]));
        assert_eq!(s.state_code(0), 2);
        assert_eq!(s.state_code(1), 3);
        assert_eq!(s.state_code(2), 0);
        assert_eq!(s.state_code(3), 0);
        let none = Snapshot::new(nodes(2), Vec::new(), None);
        assert_eq!(none.state_code(1), 0);
    }

    #[test]
    fn results_from_an_old_epoch_are_dropped() {
        let mut store = SnapshotStore::new();
        let old = store.begin_epoch();
        let new = store.begin_epoch();
        assert!(!store.accept_graph(PollTicket { epoch: old, seq: 1 }, nodes(3), Vec::new()));
        assert!(store.snapshot().is_empty());
        assert!(store.accept_graph(PollTicket { epoch: new, seq: 1 }, nodes(3), Vec::new()));
        assert_eq!(store.snapshot().nodes().len(), 3);
    }

    #[test]
    fn older_state_cannot_overwrite_newer_state() {
        let mut store = SnapshotStore::new();
        let epoch = store.begin_epoch();
        assert!(store.accept_graph(PollTicket { epoch, seq: 1 }, nodes(2), Vec::new()));
        assert!(store.accept_state(PollTicket { epoch, seq: 5 }, Some(vec![2, 2])));
        assert!(!store.accept_state(PollTicket { epoch, seq: 3 }, Some(vec![0, 0])));
        assert_eq!(store.snapshot().state_code(0), 2);
    }

    #[test]
    fn new_graph_drops_previous_state() {
        let mut store = SnapshotStore::new();
        let epoch = store.begin_epoch();
        store.accept_graph(PollTicket { epoch, seq: 1 }, nodes(2), Vec::new());
        store.accept_state(PollTicket { epoch, seq: 2 }, Some(vec![4, 4]));
        assert!(store.accept_graph(PollTicket { epoch, seq: 3 }, nodes(5), Vec::new()));
        assert!(!store.snapshot().has_state());
        assert!(!store.accept_state(PollTicket { epoch, seq: 2 }, Some(vec![1])));
    }

    #[test]
    fn advancing_the_epoch_keeps_drawing_the_old_graph() {
        let mut store = SnapshotStore::new();
        let first = store.begin_epoch();
        store.accept_graph(PollTicket { epoch: first, seq: 2 }, nodes(4), Vec::new());
        store.accept_state(PollTicket { epoch: first, seq: 3 }, Some(vec![2, 2, 2, 2]));

        let second = store.advance_epoch();
        assert_eq!(store.snapshot().nodes().len(), 4);
        assert_eq!(store.snapshot().state_code(3), 2);
        assert!(!store.accept_state(PollTicket { epoch: first, seq: 9 }, Some(vec![0; 4])));
        assert!(store.accept_graph(PollTicket { epoch: second, seq: 1 }, nodes(2), Vec::new()));
        assert_eq!(store.snapshot().nodes().len(), 2);
    }

    #[test]
    fn reset_clears_the_displayed_snapshot() {
        let mut store = SnapshotStore::new();
        store.set_snapshot(nodes(3), vec![EdgeRef { a: 0, b: 1 }], Some(vec![1, 1, 1]));
        store.begin_epoch();
        assert!(store.snapshot().is_empty());
        assert!(store.snapshot().edges().is_empty());
    }
}
