//! Self-awareness: passive knowledge maintenance for a node.
//!
//! A node's self-awareness engine owns an ordered list of enabled
//! capabilities. Each capability maintains one piece of knowledge about the
//! node's environment and reacts to two notifications:
//!
//! - **topology changed**: the set of currently reachable peers was offered
//! - **outcome observed**: benefits and costs from the peers interacted with
//!
//! ```text
//!                   notify_topology_changed / notify_outcome
//!  Node ─────────────────────────────────────────────────────┐
//!                                                            v
//!   ┌─────────────────────── SelfAwareness ──────────────────────────┐
//!   │ [0] multi_attribute_utility → [1] network → [2] pheromones → … │
//!   └──────────────────────────────────────────────────────────────────┘
//!          ^                                  │
//!          └──── retrieve(Knowledge) ─────────┘  (first answer wins)
//! ```
//!
//! ## Ordering
//!
//! Notifications are delivered in enablement order. Later capabilities may
//! read knowledge that earlier capabilities have just updated: reward
//! tracking reads `LastNodeUtilities`, so utility accounting must be enabled
//! first. [`CapabilityKind::default_set`] encodes that order.
//!
//! ## Queries
//!
//! [`SelfAwareness::retrieve`] probes capabilities in the same order and
//! returns the first answer. When nothing answers, the result is `None` and a
//! warning is logged; callers decide how to degrade.

mod network;
mod pheromones;
mod rewards;
mod utility;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::NodeParams;
use crate::error::{Result, SimError};
use crate::node::{NodeId, Outcomes, PeerSet};

pub use network::Network;
pub use pheromones::Pheromones;
pub use rewards::{CumulativeRelaxedRewards, CumulativeRewards};
pub use utility::MultiAttributeUtility;

/// Per-peer scalar table (pheromones, utilities, reward sums).
pub type PeerValues = BTreeMap<NodeId, f64>;

/// Named pieces of knowledge a capability may provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Knowledge {
    /// Peers currently reachable
    PossibleNodes,
    /// Pheromone level per peer
    Taus,
    /// Most recent utility per peer
    LastNodeUtilities,
    /// Accumulated utility per peer
    TotalNodeUtilities,
    /// Sum of the most recent utilities
    LastConjointUtility,
    /// Sum of the accumulated utilities
    CumulativeConjointUtility,
    /// Exact running reward sum per peer
    CumulativeRewards,
    /// Exponentially smoothed reward per peer
    CumulativeRelaxedRewards,
}

impl Knowledge {
    /// Get the knowledge name as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Knowledge::PossibleNodes => "possible_nodes",
            Knowledge::Taus => "taus",
            Knowledge::LastNodeUtilities => "last_node_utilities",
            Knowledge::TotalNodeUtilities => "total_node_utilities",
            Knowledge::LastConjointUtility => "last_conjoint_utility",
            Knowledge::CumulativeConjointUtility => "cumulative_conjoint_utility",
            Knowledge::CumulativeRewards => "cumulative_rewards",
            Knowledge::CumulativeRelaxedRewards => "cumulative_relaxed_rewards",
        }
    }
}

impl std::fmt::Display for Knowledge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Borrowed answer to a knowledge query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KnowledgeValue<'a> {
    /// A set of peers
    Peers(&'a PeerSet),
    /// A per-peer table
    PeerValues(&'a PeerValues),
    /// A single number
    Scalar(f64),
}

impl<'a> KnowledgeValue<'a> {
    /// The peer set, if this answer is one
    pub fn as_peers(self) -> Option<&'a PeerSet> {
        match self {
            KnowledgeValue::Peers(peers) => Some(peers),
            _ => None,
        }
    }

    /// The per-peer table, if this answer is one
    pub fn as_peer_values(self) -> Option<&'a PeerValues> {
        match self {
            KnowledgeValue::PeerValues(values) => Some(values),
            _ => None,
        }
    }

    /// The scalar, if this answer is one
    pub fn as_scalar(self) -> Option<f64> {
        match self {
            KnowledgeValue::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// A self-awareness capability.
///
/// Both notification handlers default to doing nothing, so a capability only
/// implements the messages it cares about.
pub trait Capability: std::fmt::Debug {
    /// Which capability this is
    fn kind(&self) -> CapabilityKind;

    /// The set of reachable peers changed
    fn on_topology_changed(&mut self, _peers: &PeerSet, _view: &KnowledgeView<'_>) {}

    /// Benefits and costs were observed for the peers interacted with
    fn on_outcome(&mut self, _outcomes: &Outcomes, _view: &KnowledgeView<'_>) {}

    /// Answer a knowledge query, if this capability knows about it
    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>>;
}

/// Read-only access to the other capabilities of an engine.
///
/// Handed to a capability while it handles a notification. Probes the
/// capabilities enabled before it, then those enabled after it.
pub struct KnowledgeView<'a> {
    before: &'a [Box<dyn Capability>],
    after: &'a [Box<dyn Capability>],
}

impl<'a> KnowledgeView<'a> {
    /// Query the other capabilities in enablement order
    pub fn retrieve(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'a>> {
        self.before
            .iter()
            .chain(self.after.iter())
            .find_map(|cap| cap.provide(knowledge))
    }

    /// Query a per-peer table
    pub fn peer_values(&self, knowledge: Knowledge) -> Option<&'a PeerValues> {
        self.retrieve(knowledge).and_then(KnowledgeValue::as_peer_values)
    }
}

/// Capabilities that can be enabled in a node's self-awareness engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Reachable-peer cache
    Network,
    /// Evaporating pheromone per peer
    Pheromones,
    /// Additive multi-attribute utility accounting
    MultiAttributeUtility,
    /// Exact running reward sum per peer
    CumulativeRewards,
    /// Exponentially smoothed reward per peer
    CumulativeRelaxedRewards,
}

impl CapabilityKind {
    /// Get the capability name as accepted in configuration
    pub fn name(&self) -> &'static str {
        match self {
            CapabilityKind::Network => "network",
            CapabilityKind::Pheromones => "pheromones",
            CapabilityKind::MultiAttributeUtility => "multi_attribute_utility",
            CapabilityKind::CumulativeRewards => "cumulative_rewards",
            CapabilityKind::CumulativeRelaxedRewards => "cumulative_relaxed_rewards",
        }
    }

    /// Default enablement order for simulated nodes
    ///
    /// Utility accounting comes first because pheromones and both reward
    /// trackers read its `LastNodeUtilities` during the same notification.
    pub fn default_set() -> &'static [CapabilityKind] {
        &[
            CapabilityKind::MultiAttributeUtility,
            CapabilityKind::Network,
            CapabilityKind::Pheromones,
            CapabilityKind::CumulativeRewards,
            CapabilityKind::CumulativeRelaxedRewards,
        ]
    }

    /// Build a fresh capability instance
    pub fn build(&self, params: &NodeParams) -> Box<dyn Capability> {
        match self {
            CapabilityKind::Network => Box::new(Network::new()),
            CapabilityKind::Pheromones => Box::new(Pheromones::new(params.pheromones.clone())),
            CapabilityKind::MultiAttributeUtility => {
                Box::new(MultiAttributeUtility::new(params.utility.clone()))
            }
            CapabilityKind::CumulativeRewards => Box::new(CumulativeRewards::new()),
            CapabilityKind::CumulativeRelaxedRewards => {
                Box::new(CumulativeRelaxedRewards::new(params.rewards.relaxation_alpha))
            }
        }
    }
}

impl FromStr for CapabilityKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(CapabilityKind::Network),
            "pheromones" | "network_pheromones" => Ok(CapabilityKind::Pheromones),
            "multi_attribute_utility" | "utility" => Ok(CapabilityKind::MultiAttributeUtility),
            "cumulative_rewards" | "network_cumulative_rewards" => {
                Ok(CapabilityKind::CumulativeRewards)
            }
            "cumulative_relaxed_rewards" | "network_cumulative_relaxed_rewards" => {
                Ok(CapabilityKind::CumulativeRelaxedRewards)
            }
            other => Err(SimError::UnknownCapability(other.to_string())),
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-node self-awareness engine
#[derive(Debug, Default)]
pub struct SelfAwareness {
    capabilities: Vec<Box<dyn Capability>>,
}

impl SelfAwareness {
    /// Create an engine with no capabilities enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with the given capabilities enabled, in order
    pub fn with_capabilities(kinds: &[CapabilityKind], params: &NodeParams) -> Self {
        let mut engine = Self::new();
        for kind in kinds {
            engine.enable(kind.build(params));
        }
        engine
    }

    /// Enable a capability; it receives notifications after those already
    /// enabled
    pub fn enable(&mut self, capability: Box<dyn Capability>) {
        tracing::trace!(capability = %capability.kind(), "enabling capability");
        self.capabilities.push(capability);
    }

    /// Enabled capabilities, in enablement order
    pub fn enabled(&self) -> Vec<CapabilityKind> {
        self.capabilities.iter().map(|cap| cap.kind()).collect()
    }

    /// Deliver a topology change to every capability, in order
    pub fn notify_topology_changed(&mut self, peers: &PeerSet) {
        for index in 0..self.capabilities.len() {
            let (before, rest) = self.capabilities.split_at_mut(index);
            if let Some((current, after)) = rest.split_first_mut() {
                let view = KnowledgeView {
                    before: &*before,
                    after: &*after,
                };
                current.on_topology_changed(peers, &view);
            }
        }
    }

    /// Deliver observed outcomes to every capability, in order
    pub fn notify_outcome(&mut self, outcomes: &Outcomes) {
        for index in 0..self.capabilities.len() {
            let (before, rest) = self.capabilities.split_at_mut(index);
            if let Some((current, after)) = rest.split_first_mut() {
                let view = KnowledgeView {
                    before: &*before,
                    after: &*after,
                };
                current.on_outcome(outcomes, &view);
            }
        }
    }

    /// Retrieve knowledge from the first capability able to provide it.
    ///
    /// Returns `None` (and logs a warning) when no capability can answer.
    pub fn retrieve(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        let found = self
            .capabilities
            .iter()
            .find_map(|cap| cap.provide(knowledge));

        if found.is_none() {
            tracing::warn!(
                knowledge = %knowledge,
                "no enabled self-awareness capability can provide this knowledge"
            );
        }
        found
    }

    /// Reachable peers, if known
    pub fn peers(&self) -> Option<&PeerSet> {
        self.retrieve(Knowledge::PossibleNodes)
            .and_then(KnowledgeValue::as_peers)
    }

    /// A per-peer table, if known
    pub fn peer_values(&self, knowledge: Knowledge) -> Option<&PeerValues> {
        self.retrieve(knowledge)
            .and_then(KnowledgeValue::as_peer_values)
    }

    /// A scalar, if known
    pub fn scalar(&self, knowledge: Knowledge) -> Option<f64> {
        self.retrieve(knowledge).and_then(KnowledgeValue::as_scalar)
    }

    /// Reachable peers, or [`SimError::MissingKnowledge`]
    pub fn require_peers(&self) -> Result<&PeerSet> {
        self.peers()
            .ok_or(SimError::MissingKnowledge(Knowledge::PossibleNodes))
    }

    /// A per-peer table, or [`SimError::MissingKnowledge`]
    pub fn require_peer_values(&self, knowledge: Knowledge) -> Result<&PeerValues> {
        self.peer_values(knowledge)
            .ok_or(SimError::MissingKnowledge(knowledge))
    }
}

/// Drop entries for peers no longer reachable and seed new peers with
/// `initial`. Afterwards the table's keys equal `peers` exactly.
pub(crate) fn sync_peers(table: &mut PeerValues, peers: &PeerSet, initial: f64) {
    table.retain(|id, _| peers.contains(id));
    for id in peers {
        table.entry(*id).or_insert(initial);
    }
}
