//! Reward tracking per peer.
//!
//! Both trackers share the pheromone table's lifecycle: reachable peers are
//! seeded at zero, unreachable ones are pruned. They read the utilities
//! produced by utility accounting in the same notification, so they must be
//! enabled after it.

use super::{
    sync_peers, Capability, CapabilityKind, Knowledge, KnowledgeValue, KnowledgeView, PeerValues,
};
use crate::config::RewardConfig;
use crate::node::{Outcomes, PeerSet};

/// Exact running sum of utility per peer
#[derive(Debug, Clone, Default)]
pub struct CumulativeRewards {
    cumulative_rewards: PeerValues,
}

impl CumulativeRewards {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }
}

impl Capability for CumulativeRewards {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::CumulativeRewards
    }

    fn on_topology_changed(&mut self, peers: &PeerSet, _view: &KnowledgeView<'_>) {
        sync_peers(&mut self.cumulative_rewards, peers, 0.0);
    }

    fn on_outcome(&mut self, outcomes: &Outcomes, view: &KnowledgeView<'_>) {
        let Some(utilities) = view.peer_values(Knowledge::LastNodeUtilities) else {
            tracing::warn!("cumulative rewards: last node utilities unavailable, skipping update");
            return;
        };

        for id in outcomes.keys() {
            let utility = utilities.get(id).copied().unwrap_or(0.0);
            *self.cumulative_rewards.entry(*id).or_insert(0.0) += utility;
        }
    }

    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        match knowledge {
            Knowledge::CumulativeRewards => {
                Some(KnowledgeValue::PeerValues(&self.cumulative_rewards))
            }
            _ => None,
        }
    }
}

/// Exponentially smoothed running estimate of utility per peer
#[derive(Debug, Clone)]
pub struct CumulativeRelaxedRewards {
    cumulative_relaxed_rewards: PeerValues,
    /// Smoothing factor
    alpha: f64,
}

impl Default for CumulativeRelaxedRewards {
    fn default() -> Self {
        Self::new(RewardConfig::default().relaxation_alpha)
    }
}

impl CumulativeRelaxedRewards {
    /// Create an empty tracker with smoothing factor `alpha`
    pub fn new(alpha: f64) -> Self {
        Self {
            cumulative_relaxed_rewards: PeerValues::new(),
            alpha,
        }
    }
}

impl Capability for CumulativeRelaxedRewards {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::CumulativeRelaxedRewards
    }

    fn on_topology_changed(&mut self, peers: &PeerSet, _view: &KnowledgeView<'_>) {
        sync_peers(&mut self.cumulative_relaxed_rewards, peers, 0.0);
    }

    fn on_outcome(&mut self, outcomes: &Outcomes, view: &KnowledgeView<'_>) {
        let Some(utilities) = view.peer_values(Knowledge::LastNodeUtilities) else {
            tracing::warn!(
                "cumulative relaxed rewards: last node utilities unavailable, skipping update"
            );
            return;
        };

        for id in outcomes.keys() {
            let utility = utilities.get(id).copied().unwrap_or(0.0);
            let estimate = self.cumulative_relaxed_rewards.entry(*id).or_insert(0.0);
            *estimate = (1.0 - self.alpha) * *estimate + self.alpha * utility;
        }
    }

    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        match knowledge {
            Knowledge::CumulativeRelaxedRewards => {
                Some(KnowledgeValue::PeerValues(&self.cumulative_relaxed_rewards))
            }
            _ => None,
        }
    }
}
