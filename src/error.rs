//! Simulation error types.
//!
//! # Error Classification
//!
//! Errors fall into three groups, and callers treat each group differently:
//!
//! - **Fatal parameter errors**: `InvalidParameter` is returned to whoever
//!   asked for the computation (e.g. the gamma sampler) and is never coerced.
//! - **Locally recovered errors**: `UnknownStrategy`, `StrategyExecution` and
//!   `MissingKnowledge` are produced inside a node's decision engine. The
//!   self-expression engine logs them and selects nothing for that timestep,
//!   so they never reach the simulator.
//! - **Structural errors**: unresolvable event actions, invalid edges, a run
//!   invoked twice, bad configuration. These abort setup or the run.

use thiserror::Error;

use crate::awareness::Knowledge;
use crate::NodeId;

/// Simulation errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// A numeric parameter was outside its valid domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The active strategy name does not resolve to a known strategy.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A strategy failed while computing its selection.
    #[error("Strategy {strategy} failed: {message}")]
    StrategyExecution {
        /// Name of the failing strategy.
        strategy: String,
        /// Failure description.
        message: String,
    },

    /// No enabled self-awareness capability provides the requested knowledge.
    #[error("Missing knowledge: {0}")]
    MissingKnowledge(Knowledge),

    /// A capability name does not resolve to a known capability.
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    /// An event carries an action other than `add` or `remove`.
    #[error("Unable to handle event {name} with action {action}")]
    UnknownEventAction {
        /// Event name.
        name: String,
        /// The action that could not be resolved.
        action: String,
    },

    /// A node id outside the simulated population was referenced.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Edge reward parameters are malformed.
    #[error("Invalid edge {from} -> {to}: {message}")]
    InvalidEdge {
        /// Source node.
        from: NodeId,
        /// Destination node.
        to: NodeId,
        /// What is wrong with the edge.
        message: String,
    },

    /// The simulation was already run (or stepped to completion).
    #[error("Tried to run a simulation which has already been run")]
    AlreadyRun,

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Wrap a failure message as a strategy execution error.
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::StrategyExecution {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Whether the self-expression engine recovers from this error locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SimError::UnknownStrategy(_)
                | SimError::StrategyExecution { .. }
                | SimError::MissingKnowledge(_)
        )
    }
}

impl From<toml::de::Error> for SimError {
    fn from(err: toml::de::Error) -> Self {
        SimError::Config(err.to_string())
    }
}
