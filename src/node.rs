//! Simulated network node.
//!
//! A node couples one self-awareness engine (what it knows) with one
//! self-expression engine (how it chooses peers) and owns the random source
//! both draw from. It reacts to two messages per timestep:
//!
//! 1. [`Node::select`]: here are the peers you could reach, which do you pick?
//! 2. [`Node::update`]: here is what interacting with your picks yielded.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::awareness::{CapabilityKind, Knowledge, PeerValues, SelfAwareness};
use crate::config::NodeParams;
use crate::error::Result;
use crate::expression::SelfExpression;
use crate::random::{seeded_rng, SimRng};

/// Node identifier, dense from 0
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Seed for this node's random source
    pub fn seed(self) -> u64 {
        u64::from(self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered set of peers
pub type PeerSet = BTreeSet<NodeId>;

/// Raw attributes observed on one interaction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Attributes {
    /// What the interaction yielded
    pub benefit: f64,
    /// What the interaction cost
    pub cost: f64,
}

impl Attributes {
    /// Create attributes from a benefit and a cost
    pub fn new(benefit: f64, cost: f64) -> Self {
        Self { benefit, cost }
    }
}

/// Attributes per peer interacted with during one timestep
pub type Outcomes = BTreeMap<NodeId, Attributes>;

/// A simulated node
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    connected: bool,
    awareness: SelfAwareness,
    expression: SelfExpression,
    rng: SimRng,
}

impl Node {
    /// Create a node with the given strategy and capabilities.
    ///
    /// The strategy name is not validated here: an unknown name makes the
    /// node select nothing (with a warning) every timestep.
    pub fn new(
        id: NodeId,
        strategy: &str,
        connected: bool,
        capabilities: &[CapabilityKind],
        params: &NodeParams,
    ) -> Self {
        let node = Self {
            id,
            connected,
            awareness: SelfAwareness::with_capabilities(capabilities, params),
            expression: SelfExpression::new(strategy, params.strategies.clone()),
            rng: seeded_rng(id.seed()),
        };
        tracing::debug!(
            node = %id,
            strategy,
            connected,
            capabilities = ?node.awareness.enabled(),
            "node created"
        );
        node
    }

    /// Create a connected node with default capabilities and parameters
    pub fn with_defaults(id: NodeId, strategy: &str) -> Self {
        Self::new(
            id,
            strategy,
            true,
            CapabilityKind::default_set(),
            &NodeParams::default(),
        )
    }

    /// Get node ID
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name of the active strategy
    pub fn strategy(&self) -> &str {
        self.expression.strategy_name()
    }

    /// Switch to another strategy; learned state of the old one is kept
    pub fn set_strategy(&mut self, strategy: &str) {
        self.expression.set_strategy(strategy);
    }

    /// Read-only access to the self-awareness engine
    pub fn awareness(&self) -> &SelfAwareness {
        &self.awareness
    }

    /// Phase 1: learn the reachable peers and pick the relevant neighbourhood
    pub fn select(&mut self, possible: &PeerSet) -> PeerSet {
        self.awareness.notify_topology_changed(possible);
        let selected = self
            .expression
            .select(self.id, &self.awareness, &mut self.rng);

        tracing::trace!(node = %self.id, ?selected, "neighbourhood selected");
        selected
    }

    /// Phase 1 without recovery: a failing strategy surfaces its error
    /// instead of selecting nobody
    pub fn try_select(&mut self, possible: &PeerSet) -> Result<PeerSet> {
        self.awareness.notify_topology_changed(possible);
        self.expression.try_select(&self.awareness, &mut self.rng)
    }

    /// Number of timesteps on which the strategy failed and nobody was
    /// selected
    pub fn selection_failures(&self) -> u64 {
        self.expression.failures()
    }

    /// Phase 2: learn from the benefits and costs of the interactions
    pub fn update(&mut self, outcomes: &Outcomes) {
        self.awareness.notify_outcome(outcomes);
    }

    /// Check if node is connected to the network
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connect node to the network
    pub fn connect(&mut self) {
        self.connected = true;
    }

    /// Disconnect node from the network
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// Pheromone level per reachable peer
    pub fn taus(&self) -> Option<&PeerValues> {
        self.awareness.peer_values(Knowledge::Taus)
    }

    /// Accumulated utility per peer ever interacted with
    pub fn total_utilities(&self) -> Option<&PeerValues> {
        self.awareness.peer_values(Knowledge::TotalNodeUtilities)
    }

    /// Utility accumulated over all peers and timesteps
    pub fn cumulative_conjoint_utility(&self) -> Option<f64> {
        self.awareness.scalar(Knowledge::CumulativeConjointUtility)
    }

    /// Write `<id> <tau>...` as one line
    pub fn write_taus<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_row(out, self.id, self.taus())
    }

    /// Write `<id> <total utility>...` as one line
    pub fn write_total_utilities<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_row(out, self.id, self.total_utilities())
    }

    /// Write the cumulative conjoint utility as one line
    pub fn write_cumulative_conjoint_utility<W: Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", self.cumulative_conjoint_utility().unwrap_or(0.0))?;
        Ok(())
    }
}

fn write_row<W: Write + ?Sized>(out: &mut W, id: NodeId, values: Option<&PeerValues>) -> Result<()> {
    write!(out, "{id}")?;
    for value in values.into_iter().flat_map(|v| v.values()) {
        write!(out, " {value}")?;
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(ids: &[u32]) -> PeerSet {
        ids.iter().map(|&id| NodeId(id)).collect()
    }

    fn outcomes_for(selected: &PeerSet, benefit: f64) -> Outcomes {
        selected
            .iter()
            .map(|&id| (id, Attributes::new(benefit, 1.0)))
            .collect()
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(17).to_string(), "17");
        assert_eq!(NodeId::from(3), NodeId(3));
    }

    #[test]
    fn test_broadcast_returns_possible_peers() {
        let mut node = Node::with_defaults(NodeId(0), "broadcast");
        let possible = peers(&[1, 2, 3]);

        for benefit in [10.0, 0.0, 5.0] {
            let selected = node.select(&possible);
            assert_eq!(selected, possible);
            node.update(&outcomes_for(&selected, benefit));
        }

        let fewer = peers(&[2]);
        assert_eq!(node.select(&fewer), fewer);
    }

    #[test]
    fn test_ucb1_first_call_selects_everyone() {
        for id in [0, 1, 7, 99] {
            let mut node = Node::with_defaults(NodeId(id), "ucb1");
            let possible = peers(&[100, 101, 102]);
            assert_eq!(node.select(&possible).len(), 3);
        }
    }

    #[test]
    fn test_unknown_strategy_selects_nothing() {
        let mut node = Node::with_defaults(NodeId(0), "telepathy");
        assert!(node.select(&peers(&[1, 2])).is_empty());
        assert!(node.select(&peers(&[1, 2])).is_empty());
        assert_eq!(node.selection_failures(), 2);
        assert!(node.try_select(&peers(&[1, 2])).is_err());
    }

    #[test]
    fn test_missing_capabilities_surface_errors() {
        let mut node = Node::new(NodeId(0), "broadcast", true, &[], &NodeParams::default());
        assert!(node.try_select(&peers(&[1, 2])).is_err());
        assert!(node.select(&peers(&[1, 2])).is_empty());
        assert_eq!(node.selection_failures(), 1);
    }

    #[test]
    fn test_taus_track_possible_peers() {
        let mut node = Node::with_defaults(NodeId(0), "broadcast");
        node.select(&peers(&[1, 2, 3]));
        assert_eq!(node.taus().unwrap().len(), 3);

        node.select(&peers(&[2, 4]));
        let taus = node.taus().unwrap();
        assert_eq!(taus.keys().copied().collect::<PeerSet>(), peers(&[2, 4]));
        assert_eq!(taus[&NodeId(4)], 1.0);
    }

    #[test]
    fn test_connectivity_flag() {
        let mut node = Node::new(
            NodeId(2),
            "broadcast",
            false,
            CapabilityKind::default_set(),
            &NodeParams::default(),
        );
        assert!(!node.is_connected());
        node.connect();
        assert!(node.is_connected());
        node.disconnect();
        assert!(!node.is_connected());
    }

    #[test]
    fn test_write_sinks() {
        let mut node = Node::with_defaults(NodeId(0), "broadcast");
        let selected = node.select(&peers(&[1, 2]));
        node.update(&outcomes_for(&selected, 3.0));

        let mut taus = Vec::new();
        node.write_taus(&mut taus).unwrap();
        // 1.0 * 0.99 + 1.0
        assert_eq!(String::from_utf8(taus).unwrap(), "0 1.99 1.99\n");

        let mut utilities = Vec::new();
        node.write_total_utilities(&mut utilities).unwrap();
        assert_eq!(String::from_utf8(utilities).unwrap(), "0 1 1\n");

        let mut conjoint = Vec::new();
        node.write_cumulative_conjoint_utility(&mut conjoint).unwrap();
        assert_eq!(String::from_utf8(conjoint).unwrap(), "2\n");
    }

    #[test]
    fn test_same_id_same_choices() {
        let possible = peers(&[1, 2, 3, 4]);
        let mut a = Node::with_defaults(NodeId(5), "smooth");
        let mut b = Node::with_defaults(NodeId(5), "smooth");
        for _ in 0..20 {
            let left = a.select(&possible);
            let right = b.select(&possible);
            assert_eq!(left, right);
            a.update(&outcomes_for(&left, 1.0));
            b.update(&outcomes_for(&right, 1.0));
        }
    }
}
