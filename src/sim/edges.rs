//! Reward parameters of directed edges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::EdgeSpec;
use crate::error::{Result, SimError};
use crate::node::NodeId;

/// Parameters of the benefit drawn on one directed edge:
/// `Bernoulli(p) * Gamma(alpha, theta)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    /// Probability that an interaction yields anything
    pub p: f64,
    /// Gamma shape
    pub alpha: f64,
    /// Gamma scale
    pub theta: f64,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            p: 1.0,
            alpha: 1.0,
            theta: 2.0,
        }
    }
}

impl EdgeParams {
    /// Create edge parameters
    pub fn new(p: f64, alpha: f64, theta: f64) -> Self {
        Self { p, alpha, theta }
    }

    /// Mean benefit of one interaction
    pub fn expected_benefit(&self) -> f64 {
        self.p * self.alpha * self.theta
    }

    fn problem(&self) -> Option<String> {
        if !(0.0..=1.0).contains(&self.p) {
            return Some(format!("p must be within [0, 1], got {}", self.p));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Some(format!("alpha must be > 0, got {}", self.alpha));
        }
        if !(self.theta > 0.0 && self.theta.is_finite()) {
            return Some(format!("theta must be > 0, got {}", self.theta));
        }
        None
    }
}

/// Edge parameters keyed by `(source, destination)`.
///
/// Pairs without an entry use the table default.
#[derive(Debug, Clone, Default)]
pub struct EdgeTable {
    edges: BTreeMap<(NodeId, NodeId), EdgeParams>,
    default: EdgeParams,
}

impl EdgeTable {
    /// Empty table using [`EdgeParams::default`] for every pair
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty table with a custom fallback
    pub fn with_default(default: EdgeParams) -> Result<Self> {
        if let Some(message) = default.problem() {
            return Err(SimError::InvalidParameter(format!("default edge: {message}")));
        }
        Ok(Self {
            edges: BTreeMap::new(),
            default,
        })
    }

    /// Build from configuration entries
    pub fn from_specs(specs: &[EdgeSpec]) -> Result<Self> {
        let mut table = Self::new();
        for spec in specs {
            table.insert(
                NodeId(spec.source),
                NodeId(spec.destination),
                EdgeParams::new(spec.p, spec.alpha, spec.theta),
            )?;
        }
        Ok(table)
    }

    /// Set the parameters of one directed edge.
    ///
    /// Self-edges and out-of-domain parameters are rejected.
    pub fn insert(&mut self, from: NodeId, to: NodeId, params: EdgeParams) -> Result<()> {
        if from == to {
            return Err(SimError::InvalidEdge {
                from,
                to,
                message: "self-edges are not allowed".to_string(),
            });
        }
        if let Some(message) = params.problem() {
            return Err(SimError::InvalidEdge { from, to, message });
        }
        self.edges.insert((from, to), params);
        Ok(())
    }

    /// Builder form of [`EdgeTable::insert`]
    pub fn with_edge(mut self, from: NodeId, to: NodeId, params: EdgeParams) -> Result<Self> {
        self.insert(from, to, params)?;
        Ok(self)
    }

    /// Parameters of the edge `from -> to`
    pub fn get(&self, from: NodeId, to: NodeId) -> EdgeParams {
        self.edges.get(&(from, to)).copied().unwrap_or(self.default)
    }

    /// Fallback for pairs without an entry
    pub fn default_params(&self) -> EdgeParams {
        self.default
    }

    /// Explicit entries, ordered by `(source, destination)`
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, EdgeParams)> + '_ {
        self.edges.iter().map(|(&(from, to), &params)| (from, to, params))
    }

    /// Number of explicit entries
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether there are no explicit entries
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Fail with [`SimError::UnknownNode`] if an entry names a node outside
    /// `0..node_count`
    pub(crate) fn check_nodes(&self, node_count: u32) -> Result<()> {
        for &(from, to) in self.edges.keys() {
            for id in [from, to] {
                if id.0 >= node_count {
                    return Err(SimError::UnknownNode(id));
                }
            }
        }
        Ok(())
    }
}
