//! # Neighbourhood - Adaptive Neighbour Selection Simulator
//!
//! Discrete-time simulation of nodes in a dynamic network that each decide,
//! every timestep, which reachable peers to interact with. Nodes learn from
//! the benefits and costs of past interactions using evaporating pheromones,
//! multi-armed bandits and ensembles of strategies.
//!
//! ## Features
//!
//! - **Self-awareness**: composable knowledge capabilities (pheromones,
//!   utility accounting, reward tracking) with ordered notification
//! - **Self-expression**: 16 selection strategies across four families
//! - **Reproducibility**: every random draw comes from a seeded ChaCha8 stream
//! - **Topology events**: nodes leave and rejoin the network on schedule
//! - **Output sinks**: per-timestep traces of one observed node
//!
//! ## Architecture
//!
//! ```text
//!                       Simulator
//!   ┌────────────────────────────────────────────────────┐
//!   │  EventSchedule   EdgeTable   Gamma (run seed)      │
//!   │                                                    │
//!   │  Node 0          Node 1          ...   Node n-1    │
//!   │  ┌──────────────────────┐                          │
//!   │  │ SelfAwareness        │ <── update(outcomes)     │
//!   │  │   capabilities [..]  │                          │
//!   │  │ SelfExpression       │ ──> select(peers)        │
//!   │  │   strategy           │                          │
//!   │  │ rng (node id seed)   │                          │
//!   │  └──────────────────────┘                          │
//!   └────────────────────────────────────────────────────┘
//! ```
//!
//! ### Node Messages
//!
//! | Phase | Call                   | Effect                                       |
//! |-------|------------------------|----------------------------------------------|
//! | 1     | `Node::select(peers)`  | topology update, then strategy picks peers   |
//! | 2     | `Node::update(outcomes)` | utilities, pheromones and rewards updated  |
//!
//! ### Strategy Families
//!
//! | Family            | Examples                                      |
//! |-------------------|-----------------------------------------------|
//! | Base              | `broadcast`, `smooth`, `step`                 |
//! | Bandit-over-peers | `ucb1`, `epsilon_greedy`, `adaptive_pursuit`  |
//! | Ensemble          | `ensemble_majority_vote`, `ensemble_union_smooth_step` |
//! | Meta              | `meta_bandit_epsilon_greedy`                  |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::BTreeMap;
//! use neighbourhood::{EdgeTable, EventSchedule, NodeId, Simulator};
//!
//! let mut strategies = BTreeMap::new();
//! strategies.insert(NodeId(0), "ucb1".to_string());
//!
//! let mut sim = Simulator::new(4, EdgeTable::new(), EventSchedule::new(), &strategies, 42)?;
//! let summary = sim.run(1000)?;
//! println!("{}", summary.nodes[0].cumulative_conjoint_utility);
//! ```
//!
//! ### From Configuration
//!
//! ```rust,ignore
//! use neighbourhood::{Config, Simulator};
//!
//! let config = Config::from_file("scenario.toml")?;
//! let mut sim = Simulator::from_config(&config)?;
//! sim.run(config.simulation.steps)?;
//! ```
//!
//! ## Modules
//!
//! - [`random`]: Seeded random sources and the gamma variate sampler
//! - [`awareness`]: Self-awareness engine and capabilities
//! - [`expression`]: Self-expression engine and selection strategies
//! - [`node`]: Node and shared node types
//! - [`sim`]: Simulation driver, edges, events and output sinks
//! - [`config`]: Configuration management
//! - [`error`]: Error types and result aliases

pub mod awareness;
pub mod config;
pub mod error;
pub mod expression;
pub mod node;
pub mod random;
pub mod sim;

// Re-exports for convenience
pub use awareness::{Capability, CapabilityKind, Knowledge, KnowledgeValue, SelfAwareness};
pub use config::{Config, NodeParams, Overrides, StrategyParams};
pub use error::{Result, SimError};
pub use expression::{SelfExpression, Strategy};
pub use node::{Attributes, Node, NodeId, Outcomes, PeerSet};
pub use random::Gamma;
pub use sim::{
    EdgeParams, EdgeTable, Event, EventAction, EventSchedule, Recorder, RunSummary, SimState,
    Simulator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
