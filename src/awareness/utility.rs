//! Additive multi-attribute utility accounting.
//!
//! Raw `{benefit, cost}` attributes are scalarised with fixed weights:
//! `utility = w_benefit * benefit - w_cost * cost`. Per peer, the most recent
//! utility is kept (reset to zero when a peer yields no outcome) alongside a
//! running total that is never reset.

use super::{Capability, CapabilityKind, Knowledge, KnowledgeValue, KnowledgeView, PeerValues};
use crate::config::UtilityConfig;
use crate::node::{Attributes, Outcomes};

/// Utility accounting capability
#[derive(Debug, Clone)]
pub struct MultiAttributeUtility {
    last_node_utilities: PeerValues,
    total_node_utilities: PeerValues,
    weights: UtilityConfig,
}

impl Default for MultiAttributeUtility {
    fn default() -> Self {
        Self::new(UtilityConfig::default())
    }
}

impl MultiAttributeUtility {
    /// Create with the given attribute weights
    pub fn new(weights: UtilityConfig) -> Self {
        Self {
            last_node_utilities: PeerValues::new(),
            total_node_utilities: PeerValues::new(),
            weights,
        }
    }

    /// Scalar utility of one outcome
    pub fn utility(&self, values: &Attributes) -> f64 {
        self.weights.benefit_weight * values.benefit - self.weights.cost_weight * values.cost
    }

    /// Sum of the most recent utilities (0 when nothing is tracked)
    pub fn last_conjoint_utility(&self) -> f64 {
        self.last_node_utilities.values().sum()
    }

    /// Sum of all accumulated utilities (0 when nothing is tracked)
    pub fn cumulative_conjoint_utility(&self) -> f64 {
        self.total_node_utilities.values().sum()
    }
}

impl Capability for MultiAttributeUtility {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::MultiAttributeUtility
    }

    fn on_outcome(&mut self, outcomes: &Outcomes, _view: &KnowledgeView<'_>) {
        // Known peers without an outcome this step drop to zero.
        for (id, last) in &mut self.last_node_utilities {
            *last = match outcomes.get(id) {
                Some(values) => {
                    self.weights.benefit_weight * values.benefit
                        - self.weights.cost_weight * values.cost
                }
                None => 0.0,
            };
        }

        for (id, values) in outcomes {
            if !self.last_node_utilities.contains_key(id) {
                let utility = self.utility(values);
                self.last_node_utilities.insert(*id, utility);
            }
        }

        for (id, last) in &self.last_node_utilities {
            *self.total_node_utilities.entry(*id).or_insert(0.0) += *last;
        }
    }

    fn provide(&self, knowledge: Knowledge) -> Option<KnowledgeValue<'_>> {
        match knowledge {
            Knowledge::LastNodeUtilities => {
                Some(KnowledgeValue::PeerValues(&self.last_node_utilities))
            }
            Knowledge::TotalNodeUtilities => {
                Some(KnowledgeValue::PeerValues(&self.total_node_utilities))
            }
            Knowledge::LastConjointUtility => {
                Some(KnowledgeValue::Scalar(self.last_conjoint_utility()))
            }
            Knowledge::CumulativeConjointUtility => {
                Some(KnowledgeValue::Scalar(self.cumulative_conjoint_utility()))
            }
            _ => None,
        }
    }
}
