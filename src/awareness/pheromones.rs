//! Evaporating pheromone (reputation) per peer.
//!
//! Every outcome evaporates all tracked values by `1 - evaporation_rate`,
//! then reinforces by `delta` each peer whose last utility was positive.
//! Peers that stop being reachable are forgotten; peers that (re)appear start
//! again at `initial_tau`.

use super::{
    sync_peers, Capability, CapabilityKind, Knowledge, KnowledgeValue, KnowledgeView, PeerValues,
};
use crate::config::PheromoneConfig;
use crate::node::{Outcomes, PeerSet};

/// Pheromone table capability
#[derive(Debug, Clone)]
pub struct Pheromones {
    taus: PeerValues,
    config: PheromoneConfig,
}

impl Default for Pheromones {
    fn default() -> Self {
        Self::new(PheromoneConfig::default())
    }
}

impl Pheromones {
    /// Create an empty table with the given parameters
    pub fn new(config: PheromoneConfig) -> Self {
        Self {
            taus: PeerValues::new(),
            config,
        }
    }

    /// Current pheromone levels
    pub fn taus(&self) -> &PeerValues {
        &self.taus
    }
}

impl Capability for Pheromones {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Pheromones
    }

    fn on_topology_changed(&mut self, peers: &PeerSet, _view: &KnowledgeView<'_>) {
        sync_peers(&mut self.taus, peers, self.config.initial_tau);
    }

    fn on_outcome(&mut self, outcomes: &Outcomes, view: &KnowledgeView<'_>) {
        let retention = 1.0 - self.config.evaporation_rate;
        for tau in self.taus.values_mut() {
            *tau *= retention;
        }

        let Some(utilities) = view.peer_values(Knowledge::LastNodeUtilities) else {
            tracing::warn!("pheromones: last node utilities unavailable, skipping reinforcement");
            return;
        };

        for id in outcomes.keys() {
            let rewarded = utilities.get(id).is_some_and(|&u| u > 0.0);
            if rewarded {
                if let Some(tau) = self.taus.get_mut(id) {
                    *tau += self.config.delta;
                }
            }
        }
    }

    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        match knowledge {
            Knowledge::Taus => Some(KnowledgeValue::PeerValues(&self.taus)),
            _ => None,
        }
    }
}
