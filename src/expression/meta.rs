//! Bandit over whole strategies.
//!
//! Each arm is a complete selection strategy. Playing an arm means letting
//! that strategy choose the neighbourhood for one timestep; the arm is then
//! paid the conjoint utility the node observed for that timestep, booked at
//! the start of the following call.

use rand::seq::SliceRandom;
use serde::Serialize;

use super::{Context, Strategy};
use crate::awareness::Knowledge;

/// Arms of `meta_bandit_epsilon_greedy`
pub(super) const DEFAULT_ARMS: &[Strategy] = &[
    Strategy::Broadcast,
    Strategy::Smooth,
    Strategy::Step,
    Strategy::Ucb1,
    Strategy::AdaptivePursuit,
    Strategy::EpsilonGreedy,
];

/// Scale of the random seed payoffs used to break ties between fresh arms
const SEED_PAYOFF_SCALE: f64 = 1e6;

/// Play count and payoff sum of one arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmStats {
    /// Strategy behind the arm
    pub strategy: Strategy,
    /// Times the arm was paid
    pub count: u64,
    /// Sum of payoffs, including the tie-breaking seed
    pub payoff: f64,
}

impl ArmStats {
    /// Average payoff; `None` while the arm is unexplored
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.payoff / self.count as f64)
    }
}

/// Epsilon-greedy bandit over strategies
#[derive(Debug, Clone)]
pub struct MetaBandit {
    arms: Vec<ArmStats>,
    last_used: Option<Strategy>,
}

impl MetaBandit {
    /// Create arms with tiny random payoffs, drawn in arm order
    pub(super) fn new(strategies: &[Strategy], ctx: &mut Context<'_>) -> Self {
        let arms = strategies
            .iter()
            .map(|&strategy| ArmStats {
                strategy,
                count: 0,
                payoff: ctx.uniform() / SEED_PAYOFF_SCALE,
            })
            .collect();
        Self {
            arms,
            last_used: None,
        }
    }

    /// Arm statistics, in arm order
    pub fn arms(&self) -> &[ArmStats] {
        &self.arms
    }

    /// Arm played on the previous call
    pub fn last_used(&self) -> Option<Strategy> {
        self.last_used
    }

    /// Pay the previously played arm the last conjoint utility.
    ///
    /// Without utility accounting the update is skipped.
    pub(super) fn update(&mut self, ctx: &Context<'_>) {
        let Some(last) = self.last_used else {
            return;
        };
        let Some(utility) = ctx.awareness.scalar(Knowledge::LastConjointUtility) else {
            return;
        };
        if let Some(arm) = self.arms.iter_mut().find(|arm| arm.strategy == last) {
            arm.count += 1;
            arm.payoff += utility;
            tracing::trace!(arm = %last, utility, "strategy bandit paid");
        }
    }

    /// Choose the arm to play: the best arm with probability
    /// `1 - meta_bandit_epsilon`, otherwise a uniformly random one
    pub(super) fn choose(&self, ctx: &mut Context<'_>) -> Strategy {
        if ctx.uniform() > ctx.params.meta_bandit_epsilon {
            self.best()
        } else {
            self.arms
                .choose(&mut *ctx.rng)
                .map_or(Strategy::Broadcast, |arm| arm.strategy)
        }
    }

    /// Unexplored arms rank above explored ones; within each group the
    /// higher payoff (seed or average) wins, the first arm on ties.
    fn best(&self) -> Strategy {
        let rank = |arm: &ArmStats| match arm.average() {
            None => (1, arm.payoff),
            Some(average) => (0, average),
        };

        let mut best: Option<&ArmStats> = None;
        for arm in &self.arms {
            let better = match best {
                None => true,
                Some(current) => {
                    let (group, value) = rank(arm);
                    let (best_group, best_value) = rank(current);
                    group > best_group || (group == best_group && value > best_value)
                }
            };
            if better {
                best = Some(arm);
            }
        }
        best.map_or(Strategy::Broadcast, |arm| arm.strategy)
    }

    /// Remember the arm that was just played
    pub(super) fn record(&mut self, strategy: Strategy) {
        self.last_used = Some(strategy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::{CapabilityKind, SelfAwareness};
    use crate::config::{NodeParams, StrategyParams};
    use crate::node::{Attributes, NodeId, Outcomes, PeerSet};
    use crate::random::seeded_rng;

    fn awareness_with(ids: &[u32]) -> SelfAwareness {
        let mut awareness =
            SelfAwareness::with_capabilities(CapabilityKind::default_set(), &NodeParams::default());
        let peers: PeerSet = ids.iter().map(|&id| NodeId(id)).collect();
        awareness.notify_topology_changed(&peers);
        awareness
    }

    #[test]
    fn test_seed_payoffs_are_tiny_and_distinct() {
        let awareness = awareness_with(&[1]);
        let params = StrategyParams::default();
        let mut rng = seeded_rng(0);
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };

        let bandit = MetaBandit::new(DEFAULT_ARMS, &mut ctx);
        for arm in bandit.arms() {
            assert!(arm.payoff >= 0.0 && arm.payoff < 1.0 / SEED_PAYOFF_SCALE);
            assert_eq!(arm.count, 0);
            assert!(arm.average().is_none());
        }
        assert_ne!(bandit.arms()[0].payoff, bandit.arms()[1].payoff);
    }

    #[test]
    fn test_greedy_explores_fresh_arms_first() {
        let awareness = awareness_with(&[1]);
        let params = StrategyParams {
            meta_bandit_epsilon: 0.0,
            ..StrategyParams::default()
        };
        let mut rng = seeded_rng(0);
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };

        let mut bandit = MetaBandit::new(&[Strategy::Broadcast, Strategy::Smooth], &mut ctx);
        bandit.arms[0].count = 1;
        bandit.arms[0].payoff = 100.0;

        assert_eq!(bandit.choose(&mut ctx), Strategy::Smooth);
    }

    #[test]
    fn test_greedy_prefers_higher_average() {
        let awareness = awareness_with(&[1]);
        let params = StrategyParams {
            meta_bandit_epsilon: 0.0,
            ..StrategyParams::default()
        };
        let mut rng = seeded_rng(0);
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };

        let mut bandit = MetaBandit::new(&[Strategy::Broadcast, Strategy::Step], &mut ctx);
        bandit.arms[0].count = 4;
        bandit.arms[0].payoff = 4.0;
        bandit.arms[1].count = 2;
        bandit.arms[1].payoff = 6.0;

        assert_eq!(bandit.choose(&mut ctx), Strategy::Step);
    }

    #[test]
    fn test_update_pays_last_arm() {
        let mut awareness = awareness_with(&[1, 2]);
        let mut outcomes = Outcomes::new();
        outcomes.insert(NodeId(1), Attributes::new(3.0, 1.0));
        outcomes.insert(NodeId(2), Attributes::new(5.0, 1.0));
        awareness.notify_outcome(&outcomes);

        let params = StrategyParams::default();
        let mut rng = seeded_rng(0);
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };

        let mut bandit = MetaBandit::new(DEFAULT_ARMS, &mut ctx);
        bandit.update(&ctx);
        assert!(bandit.arms().iter().all(|arm| arm.count == 0));

        bandit.record(Strategy::Step);
        let seed = bandit.arms()[2].payoff;
        bandit.update(&ctx);

        let step = bandit.arms()[2];
        assert_eq!(step.strategy, Strategy::Step);
        assert_eq!(step.count, 1);
        assert!((step.payoff - seed - 3.0).abs() < 1e-12);
    }
}
