//! Reachable-peer cache.

use super::{Capability, CapabilityKind, Knowledge, KnowledgeValue, KnowledgeView};
use crate::node::PeerSet;

/// Tracks the peers currently reachable by this node
#[derive(Debug, Clone, Default)]
pub struct Network {
    possible_nodes: PeerSet,
}

impl Network {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

impl Capability for Network {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Network
    }

    fn on_topology_changed(&mut self, peers: &PeerSet, _view: &KnowledgeView<'_>) {
        self.possible_nodes = peers.clone();
    }

    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        match knowledge {
            Knowledge::PossibleNodes => Some(KnowledgeValue::Peers(&self.possible_nodes)),
            _ => None,
        }
    }
}
