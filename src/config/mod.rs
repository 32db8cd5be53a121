//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables
//! - CLI arguments (for the `neighbourhood` binary)
//!
//! Every section is optional. Nodes without a `[[nodes]]` entry use
//! `simulation.default_strategy` and start connected; ordered node pairs
//! without an `[[edges]]` entry use the default edge parameters
//! (`p = 1`, `alpha = 1`, `theta = 2`).
//!
//! ```toml
//! [simulation]
//! num_nodes = 4
//! seed = 42
//! steps = 1000
//!
//! [[nodes]]
//! id = 0
//! strategy = "ucb1"
//!
//! [[edges]]
//! source = 0
//! destination = 1
//! p = 0.5
//! alpha = 2.0
//! theta = 1.0
//!
//! [[events]]
//! name = "outage"
//! time = 3
//! action = "remove"
//! node = 2
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::awareness::CapabilityKind;
use crate::error::{Result, SimError};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Run-level settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Pheromone parameters
    #[serde(default)]
    pub pheromones: PheromoneConfig,

    /// Utility weights
    #[serde(default)]
    pub utility: UtilityConfig,

    /// Reward tracking parameters
    #[serde(default)]
    pub rewards: RewardConfig,

    /// Strategy parameters shared by all nodes
    #[serde(default)]
    pub strategies: StrategyParams,

    /// Self-awareness capabilities enabled on every node, in order
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<CapabilityKind>,

    /// Per-node overrides
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,

    /// Per-edge reward parameters
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,

    /// Scheduled topology events
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            pheromones: PheromoneConfig::default(),
            utility: UtilityConfig::default(),
            rewards: RewardConfig::default(),
            strategies: StrategyParams::default(),
            capabilities: default_capabilities(),
            nodes: Vec::new(),
            edges: Vec::new(),
            events: Vec::new(),
        }
    }
}

fn default_capabilities() -> Vec<CapabilityKind> {
    CapabilityKind::default_set().to_vec()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SimError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| SimError::Config(format!("Failed to parse config: {e}")))?;

        // An explicitly empty list still means "the defaults".
        if config.capabilities.is_empty() {
            config.capabilities = default_capabilities();
        }
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().merge(Overrides::from_env())
    }

    /// Apply run-level overrides; unset fields keep the configured value
    pub fn merge(self, overrides: Overrides) -> Self {
        let simulation = SimulationConfig {
            seed: overrides.seed.unwrap_or(self.simulation.seed),
            steps: overrides.steps.unwrap_or(self.simulation.steps),
            num_nodes: overrides.num_nodes.unwrap_or(self.simulation.num_nodes),
            debug: self.simulation.debug || overrides.debug,
            ..self.simulation
        };

        Self { simulation, ..self }
    }

    /// Default config file location (`<config dir>/neighbourhood/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("neighbourhood").join("config.toml"))
    }

    /// Parameters handed to every node
    pub fn node_params(&self) -> NodeParams {
        NodeParams {
            pheromones: self.pheromones.clone(),
            utility: self.utility.clone(),
            rewards: self.rewards.clone(),
            strategies: self.strategies.clone(),
        }
    }

    /// Strategy name for a node, falling back to the default strategy
    pub fn strategy_for(&self, id: u32) -> &str {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .and_then(|n| n.strategy.as_deref())
            .unwrap_or(&self.simulation.default_strategy)
    }

    /// Whether a node starts connected
    pub fn connected_at_start(&self, id: u32) -> bool {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map_or(true, |n| n.connected)
    }
}

/// Run settings taken from the environment
///
/// | Variable               | Field       |
/// |------------------------|-------------|
/// | `NEIGHBOURHOOD_SEED`   | `seed`      |
/// | `NEIGHBOURHOOD_STEPS`  | `steps`     |
/// | `NEIGHBOURHOOD_NODES`  | `num_nodes` |
/// | `NEIGHBOURHOOD_DEBUG`  | `debug`     |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Run seed
    pub seed: Option<u64>,
    /// Number of timesteps
    pub steps: Option<u64>,
    /// Number of nodes
    pub num_nodes: Option<u32>,
    /// Force debug-level logging
    pub debug: bool,
}

impl Overrides {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unparsable values are ignored
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            seed: parsed(&lookup, "NEIGHBOURHOOD_SEED"),
            steps: parsed(&lookup, "NEIGHBOURHOOD_STEPS"),
            num_nodes: parsed(&lookup, "NEIGHBOURHOOD_NODES"),
            debug: parsed(&lookup, "NEIGHBOURHOOD_DEBUG").unwrap_or(false),
        }
    }
}

fn parsed<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparsable environment override");
            None
        }
    }
}

/// Run-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scenario name, used in logs and output file names
    pub name: String,

    /// Number of nodes, ids `0..num_nodes`
    pub num_nodes: u32,

    /// Run seed for the reward stream
    pub seed: u64,

    /// Number of timesteps
    pub steps: u64,

    /// Strategy for nodes without an override
    pub default_strategy: String,

    /// Node whose state is recorded by the output sinks
    pub observed_node: u32,

    /// Enable debug-level logging
    pub debug: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            num_nodes: 5,
            seed: 1,
            steps: 10_000,
            default_strategy: "broadcast".to_string(),
            observed_node: 0,
            debug: false,
        }
    }
}

/// Pheromone parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PheromoneConfig {
    /// Level given to newly reachable peers
    pub initial_tau: f64,

    /// Fraction lost on every outcome
    pub evaporation_rate: f64,

    /// Reinforcement for a peer with positive utility
    pub delta: f64,
}

impl Default for PheromoneConfig {
    fn default() -> Self {
        Self {
            initial_tau: 1.0,
            evaporation_rate: 0.01,
            delta: 1.0,
        }
    }
}

/// Additive utility weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityConfig {
    /// Weight of the benefit attribute
    pub benefit_weight: f64,

    /// Weight of the cost attribute
    pub cost_weight: f64,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            benefit_weight: 0.5,
            cost_weight: 0.5,
        }
    }
}

/// Reward tracking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Smoothing factor of the relaxed reward estimate
    pub relaxation_alpha: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            relaxation_alpha: 0.01,
        }
    }
}

/// Parameters of the selection strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// `step`: pheromone threshold (strictly exceeded to select)
    pub step_epsilon: f64,

    /// `step`: selection probability below the threshold
    pub step_eta: f64,

    /// `epsilon_greedy`: exploration probability
    pub bandit_epsilon: f64,

    /// `relaxed_epsilon_greedy`: exploration probability
    pub relaxed_bandit_epsilon: f64,

    /// `adaptive_pursuit`: probability floor
    pub pursuit_p_min: f64,

    /// `adaptive_pursuit`: learning rate
    pub pursuit_beta: f64,

    /// Meta bandits: exploration probability
    pub meta_bandit_epsilon: f64,

    /// Weighted majority vote: multiplicative penalty for a wrong vote
    pub vote_penalty: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            step_epsilon: 0.95,
            step_eta: 0.001,
            bandit_epsilon: 0.01,
            relaxed_bandit_epsilon: 0.01,
            pursuit_p_min: 0.1,
            pursuit_beta: 0.1,
            meta_bandit_epsilon: 0.01,
            vote_penalty: 0.5,
        }
    }
}

/// Everything a node needs besides its id, strategy and connectivity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeParams {
    /// Pheromone parameters
    pub pheromones: PheromoneConfig,
    /// Utility weights
    pub utility: UtilityConfig,
    /// Reward tracking parameters
    pub rewards: RewardConfig,
    /// Strategy parameters
    pub strategies: StrategyParams,
}

/// Per-node override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node id
    pub id: u32,

    /// Strategy name
    #[serde(default)]
    pub strategy: Option<String>,

    /// Whether the node starts connected
    #[serde(default = "default_true")]
    pub connected: bool,
}

fn default_true() -> bool {
    true
}

/// Reward parameters of one directed edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Source node
    pub source: u32,

    /// Destination node
    pub destination: u32,

    /// Bernoulli success probability
    #[serde(default = "default_p")]
    pub p: f64,

    /// Gamma shape
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Gamma scale
    #[serde(default = "default_theta")]
    pub theta: f64,
}

fn default_p() -> f64 {
    1.0
}

fn default_alpha() -> f64 {
    1.0
}

fn default_theta() -> f64 {
    2.0
}

/// A scheduled topology event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name
    pub name: String,

    /// Timestep at which the event fires
    pub time: u64,

    /// `add` or `remove`
    pub action: String,

    /// Node the event applies to
    pub node: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.simulation.num_nodes, 5);
        assert_eq!(config.simulation.steps, 10_000);
        assert_eq!(config.pheromones.initial_tau, 1.0);
        assert_eq!(config.strategies.step_epsilon, 0.95);
        assert_eq!(config.strategy_for(3), "broadcast");
        assert!(config.connected_at_start(3));
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [simulation]
            num_nodes = 4
            seed = 42
            steps = 100

            [pheromones]
            evaporation_rate = 0.05

            [[nodes]]
            id = 0
            strategy = "ucb1"

            [[nodes]]
            id = 3
            connected = false

            [[edges]]
            source = 0
            destination = 1
            p = 0.5

            [[events]]
            name = "outage"
            time = 3
            action = "remove"
            node = 2
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.simulation.num_nodes, 4);
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.simulation.default_strategy, "broadcast");
        assert_eq!(config.pheromones.evaporation_rate, 0.05);
        assert_eq!(config.pheromones.initial_tau, 1.0);
        assert_eq!(config.strategy_for(0), "ucb1");
        assert_eq!(config.strategy_for(3), "broadcast");
        assert!(!config.connected_at_start(3));
        assert_eq!(config.edges[0].p, 0.5);
        assert_eq!(config.edges[0].theta, 2.0);
        assert_eq!(config.events[0].action, "remove");
        assert_eq!(config.capabilities, CapabilityKind::default_set());
    }

    #[test]
    fn test_capability_list_from_toml() {
        let toml = r#"
            capabilities = ["multi_attribute_utility", "network", "pheromones"]
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.capabilities.len(), 3);
        assert_eq!(config.capabilities[2], CapabilityKind::Pheromones);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[simulation]\nnum_nodes = \"many\"").unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn test_default_config_enables_capabilities() {
        assert_eq!(Config::default().capabilities, CapabilityKind::default_set());
        assert_eq!(Config::from_env().capabilities, CapabilityKind::default_set());
    }

    #[test]
    fn test_merge_applies_set_overrides() {
        let mut file = Config::default();
        file.simulation.seed = 7;
        file.simulation.steps = 50;

        let merged = file.merge(Overrides {
            steps: Some(20),
            ..Overrides::default()
        });
        assert_eq!(merged.simulation.seed, 7);
        assert_eq!(merged.simulation.steps, 20);
    }

    #[test]
    fn test_merge_override_equal_to_default_wins() {
        let mut file = Config::default();
        file.simulation.seed = 7;
        file.simulation.num_nodes = 12;

        let overrides = Overrides::from_lookup(|key| match key {
            "NEIGHBOURHOOD_SEED" => Some("1".to_string()),
            "NEIGHBOURHOOD_NODES" => Some("5".to_string()),
            _ => None,
        });
        let merged = file.merge(overrides);
        assert_eq!(merged.simulation.seed, 1);
        assert_eq!(merged.simulation.num_nodes, 5);
        assert_eq!(merged.simulation.steps, 10_000);
    }

    #[test]
    fn test_overrides_ignore_garbage() {
        let overrides = Overrides::from_lookup(|key| match key {
            "NEIGHBOURHOOD_STEPS" => Some("lots".to_string()),
            "NEIGHBOURHOOD_DEBUG" => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(overrides.steps, None);
        assert!(overrides.debug);
    }
}
