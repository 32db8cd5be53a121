//! Discrete-time simulation driver.
//!
//! The simulator owns every node, the edge parameters, the event schedule
//! and the run-level random stream. One timestep runs as:
//!
//! ```text
//!   timestep += 1
//!        │
//!        v
//!   fire events(timestep)          add / remove: flip connectivity flags
//!        │
//!        v
//!   snapshot connectivity          every node sees the same topology
//!        │
//!        v
//!   for node in ascending id:
//!       selected = node.select(reachable peers)
//!       for peer in selected:      benefit = Bernoulli(p) * Gamma(alpha, theta)
//!                                  cost    = 1
//!       node.update(outcomes)
//!        │
//!        v
//!   callback(&simulator)
//! ```
//!
//! A simulator runs once: `Created -> Running -> Finished`.

mod edges;
mod events;
mod recorder;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::awareness::{CapabilityKind, PeerValues};
use crate::config::{Config, NodeParams};
use crate::error::{Result, SimError};
use crate::node::{Attributes, Node, NodeId, Outcomes, PeerSet};
use crate::random::Gamma;

pub use edges::{EdgeParams, EdgeTable};
pub use events::{Event, EventAction, EventSchedule};
pub use recorder::{output_paths, Recorder};

/// Strategy of nodes without an assignment
pub const DEFAULT_STRATEGY: &str = "broadcast";

/// Cost of every interaction
pub const INTERACTION_COST: f64 = 1.0;

/// Lifecycle of a simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimState {
    /// Built, no timestep run yet
    Created,
    /// At least one timestep run
    Running,
    /// A full run completed or aborted
    Finished,
}

/// The simulation
#[derive(Debug)]
pub struct Simulator {
    nodes: Vec<Node>,
    edges: EdgeTable,
    events: EventSchedule,
    gamma: Gamma,
    seed: u64,
    timestep: u64,
    state: SimState,
}

impl Simulator {
    /// Create a simulator of `node_count` connected nodes with default
    /// capabilities.
    ///
    /// Nodes missing from `strategies` run [`DEFAULT_STRATEGY`].
    pub fn new(
        node_count: u32,
        edges: EdgeTable,
        events: EventSchedule,
        strategies: &BTreeMap<NodeId, String>,
        seed: u64,
    ) -> Result<Self> {
        if let Some(&id) = strategies.keys().find(|id| id.0 >= node_count) {
            return Err(SimError::UnknownNode(id));
        }

        let nodes = (0..node_count)
            .map(NodeId)
            .map(|id| {
                let strategy = strategies
                    .get(&id)
                    .map_or(DEFAULT_STRATEGY, String::as_str);
                Node::with_defaults(id, strategy)
            })
            .collect();

        Self::with_nodes(nodes, edges, events, seed)
    }

    /// Create a simulator from prepared nodes.
    ///
    /// Node ids must be `0..nodes.len()` in order.
    pub fn with_nodes(
        nodes: Vec<Node>,
        edges: EdgeTable,
        events: EventSchedule,
        seed: u64,
    ) -> Result<Self> {
        for (index, node) in nodes.iter().enumerate() {
            if node.id().0 as usize != index {
                return Err(SimError::InvalidParameter(format!(
                    "node ids must be dense and ordered: found {} at position {index}",
                    node.id()
                )));
            }
        }

        let node_count = u32::try_from(nodes.len())
            .map_err(|_| SimError::InvalidParameter("too many nodes".to_string()))?;
        edges.check_nodes(node_count)?;
        events.check_nodes(node_count)?;

        for event in events.at(0) {
            tracing::warn!(event = %event.name, "event scheduled at timestep 0 never fires");
        }

        tracing::debug!(
            nodes = node_count,
            edges = edges.len(),
            events = events.len(),
            seed,
            "simulator created"
        );

        Ok(Self {
            nodes,
            edges,
            events,
            gamma: Gamma::seeded(seed),
            seed,
            timestep: 0,
            state: SimState::Created,
        })
    }

    /// Create a simulator from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let params: NodeParams = config.node_params();
        let capabilities: &[CapabilityKind] = &config.capabilities;

        if let Some(spec) = config
            .nodes
            .iter()
            .find(|spec| spec.id >= config.simulation.num_nodes)
        {
            return Err(SimError::UnknownNode(NodeId(spec.id)));
        }

        let nodes = (0..config.simulation.num_nodes)
            .map(|id| {
                Node::new(
                    NodeId(id),
                    config.strategy_for(id),
                    config.connected_at_start(id),
                    capabilities,
                    &params,
                )
            })
            .collect();

        Self::with_nodes(
            nodes,
            EdgeTable::from_specs(&config.edges)?,
            EventSchedule::from_specs(&config.events)?,
            config.simulation.seed,
        )
    }

    /// Current timestep; 0 before the first step
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Lifecycle state
    pub fn state(&self) -> SimState {
        self.state
    }

    /// Run seed
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// All nodes, ordered by id
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node by id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// Edge parameters
    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    /// Event schedule
    pub fn events(&self) -> &EventSchedule {
        &self.events
    }

    /// Peers `id` could reach right now: nobody if it is disconnected, else
    /// every other connected node
    pub fn possible_nodes_for(&self, id: NodeId) -> PeerSet {
        match self.node(id) {
            Some(node) if node.is_connected() => self
                .nodes
                .iter()
                .filter(|other| other.id() != id && other.is_connected())
                .map(Node::id)
                .collect(),
            _ => PeerSet::new(),
        }
    }

    /// Run one timestep, then hand the simulator to `callback`.
    ///
    /// Fails with [`SimError::AlreadyRun`] once the simulator has finished.
    pub fn step<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnOnce(&Simulator) -> Result<()>,
    {
        if self.state == SimState::Finished {
            return Err(SimError::AlreadyRun);
        }
        self.state = SimState::Running;
        self.advance()?;
        callback(self)
    }

    /// Run `steps` timesteps without observing them
    pub fn run(&mut self, steps: u64) -> Result<RunSummary> {
        self.run_with(steps, |_| Ok(()))
    }

    /// Run `steps` timesteps, handing the simulator to `callback` after each.
    ///
    /// Only a freshly created simulator can run. Any error aborts the run and
    /// leaves the simulator finished.
    pub fn run_with<F>(&mut self, steps: u64, mut callback: F) -> Result<RunSummary>
    where
        F: FnMut(&Simulator) -> Result<()>,
    {
        if self.state != SimState::Created {
            return Err(SimError::AlreadyRun);
        }
        self.state = SimState::Running;

        tracing::info!(
            nodes = self.nodes.len(),
            steps,
            seed = self.seed,
            "simulation started"
        );

        for _ in 0..steps {
            let result = self.advance().and_then(|()| callback(self));
            if let Err(e) = result {
                self.state = SimState::Finished;
                tracing::error!(timestep = self.timestep, error = %e, "simulation aborted");
                return Err(e);
            }
        }

        self.state = SimState::Finished;
        tracing::info!(timestep = self.timestep, "simulation finished");
        Ok(self.summary())
    }

    /// Snapshot of the current node state
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            seed: self.seed,
            steps: self.timestep,
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeSummary {
                    id: node.id(),
                    strategy: node.strategy().to_string(),
                    connected: node.is_connected(),
                    selection_failures: node.selection_failures(),
                    cumulative_conjoint_utility: node.cumulative_conjoint_utility().unwrap_or(0.0),
                    taus: node.taus().cloned().unwrap_or_default(),
                })
                .collect(),
        }
    }

    fn advance(&mut self) -> Result<()> {
        self.timestep += 1;
        self.fire_events();

        // Taken before any node acts.
        let snapshot: Vec<PeerSet> = self
            .nodes
            .iter()
            .map(|node| self.possible_nodes_for(node.id()))
            .collect();

        for (node, possible) in self.nodes.iter_mut().zip(snapshot) {
            let selected = node.select(&possible);

            let mut outcomes = Outcomes::new();
            for &peer in &selected {
                let edge = self.edges.get(node.id(), peer);
                let success = self.gamma.bernoulli(edge.p);
                let magnitude = self.gamma.sample(edge.alpha, edge.theta)?;
                outcomes.insert(
                    peer,
                    Attributes::new(success * magnitude, INTERACTION_COST),
                );
            }

            node.update(&outcomes);
        }

        Ok(())
    }

    fn fire_events(&mut self) {
        let timestep = self.timestep;
        for event in self.events.at(timestep) {
            tracing::debug!(
                timestep,
                event = %event.name,
                action = %event.action,
                node = %event.node,
                "triggering event"
            );

            let Some(node) = self.nodes.get_mut(event.node.0 as usize) else {
                continue;
            };
            match event.action {
                EventAction::Remove => {
                    if !node.is_connected() {
                        tracing::warn!(node = %event.node, "removing a node which is not connected");
                    }
                    node.disconnect();
                }
                EventAction::Add => {
                    if node.is_connected() {
                        tracing::warn!(node = %event.node, "adding a node which is already connected");
                    }
                    node.connect();
                }
            }
        }
    }
}

/// State of one node at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSummary {
    /// Node id
    pub id: NodeId,
    /// Strategy name
    pub strategy: String,
    /// Connectivity at the end
    pub connected: bool,
    /// Timesteps on which the strategy failed and selected nobody
    pub selection_failures: u64,
    /// Utility accumulated over all peers and timesteps
    pub cumulative_conjoint_utility: f64,
    /// Pheromone per reachable peer
    pub taus: PeerValues,
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Run seed
    pub seed: u64,
    /// Timesteps run
    pub steps: u64,
    /// Per-node state, ordered by id
    pub nodes: Vec<NodeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(node_count: u32, events: EventSchedule) -> Simulator {
        Simulator::new(
            node_count,
            EdgeTable::new(),
            events,
            &BTreeMap::new(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_first_timestep_is_one() {
        let mut sim = simulator(2, EventSchedule::new());
        assert_eq!(sim.state(), SimState::Created);

        sim.step(|s| {
            assert_eq!(s.timestep(), 1);
            Ok(())
        })
        .unwrap();
        assert_eq!(sim.state(), SimState::Running);
    }

    #[test]
    fn test_run_twice_fails() {
        let mut sim = simulator(2, EventSchedule::new());
        let summary = sim.run(3).unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(sim.state(), SimState::Finished);

        assert!(matches!(sim.run(3), Err(SimError::AlreadyRun)));
        assert!(matches!(sim.step(|_| Ok(())), Err(SimError::AlreadyRun)));
    }

    #[test]
    fn test_run_after_step_fails() {
        let mut sim = simulator(2, EventSchedule::new());
        sim.step(|_| Ok(())).unwrap();
        assert!(matches!(sim.run(1), Err(SimError::AlreadyRun)));
    }

    #[test]
    fn test_possible_nodes_respect_connectivity() {
        let events = EventSchedule::new().with_event(Event::new(
            "drop",
            1,
            EventAction::Remove,
            NodeId(1),
        ));
        let mut sim = simulator(3, events);
        sim.step(|s| {
            assert!(s.possible_nodes_for(NodeId(1)).is_empty());
            let peers: Vec<NodeId> = s.possible_nodes_for(NodeId(0)).into_iter().collect();
            assert_eq!(peers, vec![NodeId(2)]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_events_are_not_fatal() {
        let events = EventSchedule::new()
            .with_event(Event::new("add", 1, EventAction::Add, NodeId(0)))
            .with_event(Event::new("drop", 2, EventAction::Remove, NodeId(0)))
            .with_event(Event::new("drop again", 3, EventAction::Remove, NodeId(0)));
        let mut sim = simulator(2, events);
        sim.run(4).unwrap();
        assert!(!sim.node(NodeId(0)).unwrap().is_connected());
    }

    #[test]
    fn test_callback_error_aborts_run() {
        let mut sim = simulator(2, EventSchedule::new());
        let result = sim.run_with(10, |s| {
            if s.timestep() == 2 {
                Err(SimError::Config("stop".to_string()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(sim.timestep(), 2);
        assert_eq!(sim.state(), SimState::Finished);
    }

    #[test]
    fn test_unknown_nodes_rejected() {
        let mut strategies = BTreeMap::new();
        strategies.insert(NodeId(5), "ucb1".to_string());
        assert!(matches!(
            Simulator::new(3, EdgeTable::new(), EventSchedule::new(), &strategies, 1),
            Err(SimError::UnknownNode(NodeId(5)))
        ));

        let events =
            EventSchedule::new().with_event(Event::new("x", 1, EventAction::Add, NodeId(3)));
        assert!(Simulator::new(3, EdgeTable::new(), events, &BTreeMap::new(), 1).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_toml(
            r#"
            [simulation]
            num_nodes = 3
            seed = 9

            [[nodes]]
            id = 1
            strategy = "ucb1"
            connected = false

            [[events]]
            name = "join"
            time = 2
            action = "add"
            node = 1
            "#,
        )
        .unwrap();

        let mut sim = Simulator::from_config(&config).unwrap();
        assert_eq!(sim.seed(), 9);
        assert_eq!(sim.nodes()[1].strategy(), "ucb1");
        assert!(!sim.nodes()[1].is_connected());

        sim.run(2).unwrap();
        assert!(sim.nodes()[1].is_connected());
    }

    #[test]
    fn test_default_config_runs() {
        let config = Config::default();
        let mut sim = Simulator::from_config(&config).unwrap();
        let summary = sim.run(5).unwrap();

        assert_eq!(summary.nodes.len(), config.simulation.num_nodes as usize);
        for node in &summary.nodes {
            assert_eq!(node.selection_failures, 0);
            assert_eq!(node.taus.len(), summary.nodes.len() - 1);
            assert_ne!(node.cumulative_conjoint_utility, 0.0);
        }
    }

    #[test]
    fn test_summary_serialises() {
        let mut sim = simulator(2, EventSchedule::new());
        let summary = sim.run(2).unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"cumulative_conjoint_utility\""));
        assert_eq!(summary.nodes.len(), 2);
    }
}
