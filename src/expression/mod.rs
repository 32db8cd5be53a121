//! Self-expression: how a node chooses its relevant neighbourhood.
//!
//! The engine holds the name of one active [`Strategy`] and dispatches every
//! selection to it. Strategies come in four families:
//!
//! | Family           | Strategies                                                  |
//! |------------------|-------------------------------------------------------------|
//! | Base             | `broadcast`, `smooth`, `step`                               |
//! | Bandit-over-peers| `ucb1`, `epsilon_greedy`, `relaxed_epsilon_greedy`, `adaptive_pursuit` |
//! | Ensemble         | `ensemble_*` (set operations and votes over base strategies) |
//! | Meta             | `meta_*` (bandits and votes over whole strategies)          |
//!
//! Strategies read knowledge only through [`SelfAwareness`] and draw
//! randomness only from the node's own generator, so a node's choices are a
//! pure function of its seed and its observations.
//!
//! ## Failure handling
//!
//! A name that does not resolve, or a strategy that returns an error, never
//! reaches the simulator: [`SelfExpression::select`] logs a warning and the
//! node selects nobody for that timestep.

mod bandit;
mod base;
mod ensemble;
mod meta;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::awareness::{Knowledge, PeerValues, SelfAwareness};
use crate::config::StrategyParams;
use crate::error::{Result, SimError};
use crate::node::{NodeId, PeerSet};
use crate::random::{uniform, SimRng};

pub use bandit::{AdaptivePursuit, EpsilonGreedy, Ucb1};
pub use ensemble::WeightedMajorityVote;
pub use meta::{ArmStats, MetaBandit};

/// What a strategy may touch while selecting
pub struct Context<'a> {
    /// Knowledge of the node
    pub awareness: &'a SelfAwareness,
    /// The node's random source
    pub rng: &'a mut SimRng,
    /// Strategy parameters
    pub params: &'a StrategyParams,
}

impl Context<'_> {
    /// Draw a uniform variate in `[0, 1)` from the node's source
    pub fn uniform(&mut self) -> f64 {
        uniform(&mut *self.rng)
    }
}

/// Look up a peer in a knowledge table; a gap is a strategy failure
fn peer_value(
    table: &PeerValues,
    knowledge: Knowledge,
    peer: NodeId,
    strategy: Strategy,
) -> Result<f64> {
    table.get(&peer).copied().ok_or_else(|| {
        SimError::strategy(strategy.name(), format!("no {knowledge} entry for node {peer}"))
    })
}

/// Neighbourhood selection strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Every reachable peer
    Broadcast,
    /// Probability proportional to relative pheromone
    Smooth,
    /// Pheromone threshold
    Step,
    /// Upper confidence bound per peer against inaction
    Ucb1,
    /// Epsilon-greedy per peer against inaction
    EpsilonGreedy,
    /// Epsilon-greedy on smoothed rewards
    RelaxedEpsilonGreedy,
    /// Pursuit learning automaton per peer
    AdaptivePursuit,
    /// Broadcast or smooth, 50/50
    EnsembleExample,
    /// Peers chosen by both smooth and step
    EnsembleIntersectSmoothStep,
    /// Peers chosen by either smooth or step
    EnsembleUnionSmoothStep,
    /// Union of smooth and step (weighted sum placeholder)
    EnsembleWeightedSum,
    /// Uniform vote of broadcast, smooth and step
    EnsembleMajorityVote,
    /// Learned-weight vote of broadcast, smooth and step
    EnsembleWeightedMajorityVote,
    /// Broadcast or smooth, 50/50
    MetaBanditExample,
    /// Epsilon-greedy bandit over whole strategies
    MetaBanditEpsilonGreedy,
    /// Uniform vote of the bandit-over-peers strategies
    MetaEnsembleMajorityVote,
}

impl Strategy {
    /// Get the strategy name as accepted in configuration
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Broadcast => "broadcast",
            Strategy::Smooth => "smooth",
            Strategy::Step => "step",
            Strategy::Ucb1 => "ucb1",
            Strategy::EpsilonGreedy => "epsilon_greedy",
            Strategy::RelaxedEpsilonGreedy => "relaxed_epsilon_greedy",
            Strategy::AdaptivePursuit => "adaptive_pursuit",
            Strategy::EnsembleExample => "ensemble_example",
            Strategy::EnsembleIntersectSmoothStep => "ensemble_intersect_smooth_step",
            Strategy::EnsembleUnionSmoothStep => "ensemble_union_smooth_step",
            Strategy::EnsembleWeightedSum => "ensemble_weighted_sum",
            Strategy::EnsembleMajorityVote => "ensemble_majority_vote",
            Strategy::EnsembleWeightedMajorityVote => "ensemble_weighted_majority_vote",
            Strategy::MetaBanditExample => "meta_bandit_example",
            Strategy::MetaBanditEpsilonGreedy => "meta_bandit_epsilon_greedy",
            Strategy::MetaEnsembleMajorityVote => "meta_ensemble_majority_vote",
        }
    }

    /// All strategies, base strategies first
    pub fn all() -> &'static [Strategy] {
        &[
            Strategy::Broadcast,
            Strategy::Smooth,
            Strategy::Step,
            Strategy::Ucb1,
            Strategy::EpsilonGreedy,
            Strategy::RelaxedEpsilonGreedy,
            Strategy::AdaptivePursuit,
            Strategy::EnsembleExample,
            Strategy::EnsembleIntersectSmoothStep,
            Strategy::EnsembleUnionSmoothStep,
            Strategy::EnsembleWeightedSum,
            Strategy::EnsembleMajorityVote,
            Strategy::EnsembleWeightedMajorityVote,
            Strategy::MetaBanditExample,
            Strategy::MetaBanditEpsilonGreedy,
            Strategy::MetaEnsembleMajorityVote,
        ]
    }

    /// Whether the strategy keeps learned state between timesteps
    pub fn is_stateful(&self) -> bool {
        matches!(
            self,
            Strategy::Ucb1
                | Strategy::EpsilonGreedy
                | Strategy::AdaptivePursuit
                | Strategy::EnsembleWeightedMajorityVote
                | Strategy::MetaBanditEpsilonGreedy
                | Strategy::MetaEnsembleMajorityVote
        )
    }
}

impl FromStr for Strategy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Strategy::all()
            .iter()
            .find(|strategy| strategy.name() == wanted)
            .copied()
            .ok_or_else(|| SimError::UnknownStrategy(s.to_string()))
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Learned state of the stateful strategies, kept across strategy switches
#[derive(Debug, Default)]
struct Learned {
    ucb1: Ucb1,
    epsilon_greedy: EpsilonGreedy,
    adaptive_pursuit: AdaptivePursuit,
    weighted_vote: WeightedMajorityVote,
    meta_bandit: Option<MetaBandit>,
}

/// Per-node self-expression engine
#[derive(Debug)]
pub struct SelfExpression {
    strategy_name: String,
    strategy: Result<Strategy>,
    params: StrategyParams,
    learned: Learned,
    failures: u64,
}

impl SelfExpression {
    /// Create an engine running the named strategy
    pub fn new(strategy: &str, params: StrategyParams) -> Self {
        Self {
            strategy_name: strategy.to_string(),
            strategy: strategy.parse(),
            params,
            learned: Learned::default(),
            failures: 0,
        }
    }

    /// Name of the active strategy, as given
    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    /// The active strategy, if the name resolved
    pub fn strategy(&self) -> Option<Strategy> {
        self.strategy.as_ref().ok().copied()
    }

    /// Switch the active strategy
    pub fn set_strategy(&mut self, strategy: &str) {
        self.strategy_name = strategy.to_string();
        self.strategy = strategy.parse();
    }

    /// Strategy parameters
    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Learned arm statistics of the strategy bandit, once it has run
    pub fn meta_bandit(&self) -> Option<&MetaBandit> {
        self.learned.meta_bandit.as_ref()
    }

    /// Selections that failed and were replaced by an empty one
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Run the active strategy, recovering from any failure with an empty
    /// selection
    pub fn select(&mut self, node: NodeId, awareness: &SelfAwareness, rng: &mut SimRng) -> PeerSet {
        match self.try_select(awareness, rng) {
            Ok(selected) => selected,
            Err(e) => {
                self.failures += 1;
                tracing::warn!(
                    node = %node,
                    strategy = %self.strategy_name,
                    error = %e,
                    "neighbourhood selection failed, selecting no nodes"
                );
                PeerSet::new()
            }
        }
    }

    /// Run the active strategy, surfacing failures
    pub fn try_select(&mut self, awareness: &SelfAwareness, rng: &mut SimRng) -> Result<PeerSet> {
        let strategy = match &self.strategy {
            Ok(strategy) => *strategy,
            Err(_) => return Err(SimError::UnknownStrategy(self.strategy_name.clone())),
        };

        let mut ctx = Context {
            awareness,
            rng,
            params: &self.params,
        };
        self.learned.run(strategy, &mut ctx)
    }
}

impl Learned {
    fn run(&mut self, strategy: Strategy, ctx: &mut Context<'_>) -> Result<PeerSet> {
        match strategy {
            Strategy::Broadcast => base::broadcast(ctx),
            Strategy::Smooth => base::smooth(ctx),
            Strategy::Step => base::step(ctx),
            Strategy::Ucb1 => self.ucb1.select(ctx),
            Strategy::EpsilonGreedy => self.epsilon_greedy.select(ctx),
            Strategy::RelaxedEpsilonGreedy => bandit::relaxed_epsilon_greedy(ctx),
            Strategy::AdaptivePursuit => self.adaptive_pursuit.select(ctx),
            Strategy::EnsembleExample | Strategy::MetaBanditExample => ensemble::coin_flip(ctx),
            Strategy::EnsembleIntersectSmoothStep => ensemble::intersect_smooth_step(ctx),
            Strategy::EnsembleUnionSmoothStep | Strategy::EnsembleWeightedSum => {
                ensemble::union_smooth_step(ctx)
            }
            Strategy::EnsembleMajorityVote => ensemble::majority_vote(ctx),
            Strategy::EnsembleWeightedMajorityVote => self.weighted_vote.select(ctx),
            Strategy::MetaBanditEpsilonGreedy => self.meta_bandit_epsilon_greedy(ctx),
            Strategy::MetaEnsembleMajorityVote => self.meta_ensemble_majority_vote(ctx),
        }
    }

    fn meta_bandit_epsilon_greedy(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        // The payoff of the previous arm is booked before the next choice.
        let arm = match self.meta_bandit.as_mut() {
            Some(bandit) => {
                bandit.update(ctx);
                bandit.choose(ctx)
            }
            None => {
                let mut bandit = MetaBandit::new(meta::DEFAULT_ARMS, ctx);
                let arm = bandit.choose(ctx);
                self.meta_bandit = Some(bandit);
                arm
            }
        };

        tracing::trace!(arm = %arm, "strategy bandit played");
        let selected = self.run(arm, ctx);
        if let Some(bandit) = self.meta_bandit.as_mut() {
            bandit.record(arm);
        }
        selected
    }

    fn meta_ensemble_majority_vote(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        let ballots = [
            self.ucb1.select(ctx)?,
            self.epsilon_greedy.select(ctx)?,
            self.adaptive_pursuit.select(ctx)?,
        ];
        ensemble::uniform_vote(ctx, &ballots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::CapabilityKind;
    use crate::config::NodeParams;
    use crate::random::seeded_rng;

    fn awareness_with(peers: &[u32]) -> SelfAwareness {
        let mut awareness =
            SelfAwareness::with_capabilities(CapabilityKind::default_set(), &NodeParams::default());
        let peers: PeerSet = peers.iter().map(|&id| NodeId(id)).collect();
        awareness.notify_topology_changed(&peers);
        awareness
    }

    #[test]
    fn test_strategy_names_roundtrip() {
        for strategy in Strategy::all() {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), *strategy);
            assert_eq!(strategy.to_string(), strategy.name());
        }
        assert_eq!(Strategy::all().len(), 16);
    }

    #[test]
    fn test_unknown_strategy_name() {
        let err = "flood".parse::<Strategy>().unwrap_err();
        assert!(matches!(err, SimError::UnknownStrategy(ref name) if name == "flood"));
    }

    #[test]
    fn test_unknown_strategy_recovers_empty() {
        let awareness = awareness_with(&[1, 2, 3]);
        let mut rng = seeded_rng(0);
        let mut engine = SelfExpression::new("flood", StrategyParams::default());

        assert!(engine.strategy().is_none());
        assert!(matches!(
            engine.try_select(&awareness, &mut rng),
            Err(SimError::UnknownStrategy(_))
        ));
        assert!(engine.select(NodeId(0), &awareness, &mut rng).is_empty());
    }

    #[test]
    fn test_strategy_error_recovers_empty() {
        // Only the network capability: smooth cannot find pheromones.
        let mut awareness =
            SelfAwareness::with_capabilities(&[CapabilityKind::Network], &NodeParams::default());
        awareness.notify_topology_changed(&[NodeId(1)].into_iter().collect());

        let mut rng = seeded_rng(0);
        let mut engine = SelfExpression::new("smooth", StrategyParams::default());
        assert!(engine.try_select(&awareness, &mut rng).is_err());
        assert!(engine.select(NodeId(0), &awareness, &mut rng).is_empty());
    }

    #[test]
    fn test_set_strategy_switches_dispatch() {
        let awareness = awareness_with(&[1, 2, 3]);
        let mut rng = seeded_rng(0);
        let mut engine = SelfExpression::new("flood", StrategyParams::default());

        engine.set_strategy("broadcast");
        assert_eq!(engine.strategy(), Some(Strategy::Broadcast));
        assert_eq!(engine.select(NodeId(0), &awareness, &mut rng).len(), 3);
    }

    #[test]
    fn test_meta_vote_voters_learn_from_every_peer() {
        use crate::node::{Attributes, Outcomes};

        let mut awareness = awareness_with(&[1, 2, 3]);
        let mut rng = seeded_rng(2);
        let mut engine =
            SelfExpression::new("meta_ensemble_majority_vote", StrategyParams::default());

        let rounds = 30;
        let mut peer_one_left_out = 0;
        for _ in 0..rounds {
            let selected = engine.select(NodeId(0), &awareness, &mut rng);
            if !selected.contains(&NodeId(1)) {
                peer_one_left_out += 1;
            }
            // Peer 1 never pays, the others always do.
            let outcomes: Outcomes = selected
                .iter()
                .map(|&id| {
                    let benefit = if id == NodeId(1) { 0.0 } else { 4.0 };
                    (id, Attributes::new(benefit, 1.0))
                })
                .collect();
            awareness.notify_outcome(&outcomes);
        }

        assert!(peer_one_left_out > 0);
        let ucb1 = &engine.learned.ucb1;
        for id in [1, 2, 3] {
            let peer = NodeId(id);
            // UCB1 plays one arm per peer per call, whether or not the vote
            // kept the peer.
            assert_eq!(
                ucb1.selected_count(peer) + ucb1.unselected_count(peer),
                rounds
            );
            assert!(engine.learned.epsilon_greedy.selected_count(peer) >= 1);
        }
        assert!(engine.learned.adaptive_pursuit.node_probability(NodeId(1)) < 0.5);
        assert_eq!(engine.failures(), 0);
    }

    #[test]
    fn test_meta_bandit_created_on_first_use() {
        let awareness = awareness_with(&[1, 2]);
        let mut rng = seeded_rng(4);
        let mut engine =
            SelfExpression::new("meta_bandit_epsilon_greedy", StrategyParams::default());

        assert!(engine.meta_bandit().is_none());
        engine.select(NodeId(0), &awareness, &mut rng);
        let bandit = engine.meta_bandit().unwrap();
        assert_eq!(bandit.arms().len(), meta::DEFAULT_ARMS.len());
        assert!(bandit.last_used().is_some());
    }
}
