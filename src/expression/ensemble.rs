//! Ensembles of the base strategies.
//!
//! Set operations (`intersect`, `union`) combine the choices of smooth and
//! step. Votes tally, per peer, the strategies that chose it and include the
//! peer with probability proportional to its support.
//!
//! Ensemble members are evaluated in a fixed order so that they always
//! consume the node's random stream in the same sequence.

use std::collections::BTreeMap;

use super::{base, Context};
use crate::awareness::Knowledge;
use crate::error::Result;
use crate::node::{NodeId, PeerSet};

/// Broadcast or smooth, chosen by a fair coin.
pub(super) fn coin_flip(ctx: &mut Context<'_>) -> Result<PeerSet> {
    if ctx.uniform() < 0.5 {
        base::broadcast(ctx)
    } else {
        base::smooth(ctx)
    }
}

/// Peers chosen by both smooth and step.
pub(super) fn intersect_smooth_step(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let smooth = base::smooth(ctx)?;
    let step = base::step(ctx)?;
    Ok(smooth.intersection(&step).copied().collect())
}

/// Peers chosen by smooth or step.
pub(super) fn union_smooth_step(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let smooth = base::smooth(ctx)?;
    let step = base::step(ctx)?;
    Ok(smooth.union(&step).copied().collect())
}

/// Uniform vote of broadcast, smooth and step.
pub(super) fn majority_vote(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let ballots = [base::broadcast(ctx)?, base::smooth(ctx)?, base::step(ctx)?];
    uniform_vote(ctx, &ballots)
}

/// Include each reachable peer with probability `votes / ballots`.
///
/// Peers without a single vote are skipped without drawing.
pub(super) fn uniform_vote(ctx: &mut Context<'_>, ballots: &[PeerSet]) -> Result<PeerSet> {
    let awareness = ctx.awareness;
    let peers = awareness.require_peers()?;
    let mut chosen = PeerSet::new();
    if ballots.is_empty() {
        return Ok(chosen);
    }

    for &peer in peers {
        let votes = ballots.iter().filter(|b| b.contains(&peer)).count();
        if votes == 0 {
            continue;
        }
        let p = votes as f64 / ballots.len() as f64;
        if ctx.uniform() < p {
            chosen.insert(peer);
        }
    }
    Ok(chosen)
}

/// Number of strategies voting in [`WeightedMajorityVote`]
const VOTERS: usize = 3;

/// Weighted majority vote of broadcast, smooth and step.
///
/// Every voter starts with weight 1. A peer is included with probability
/// equal to the weight share of the voters that chose it. On the next call,
/// for every peer included last time, each voter whose ballot disagreed
/// with the outcome (voted for a peer that paid nothing, or against one that
/// paid) has its weight multiplied by `vote_penalty`. Weights are rescaled
/// so the largest is 1.
#[derive(Debug, Clone)]
pub struct WeightedMajorityVote {
    weights: [f64; VOTERS],
    last_ballots: BTreeMap<NodeId, [bool; VOTERS]>,
}

impl Default for WeightedMajorityVote {
    fn default() -> Self {
        Self {
            weights: [1.0; VOTERS],
            last_ballots: BTreeMap::new(),
        }
    }
}

impl WeightedMajorityVote {
    /// Current weights of broadcast, smooth and step
    pub fn weights(&self) -> [f64; VOTERS] {
        self.weights
    }

    pub(super) fn select(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        self.learn(ctx);

        let ballots = [base::broadcast(ctx)?, base::smooth(ctx)?, base::step(ctx)?];
        let total: f64 = self.weights.iter().sum();

        let awareness = ctx.awareness;
        let mut chosen = PeerSet::new();
        for &peer in awareness.require_peers()? {
            let votes = [
                ballots[0].contains(&peer),
                ballots[1].contains(&peer),
                ballots[2].contains(&peer),
            ];
            let support: f64 = votes
                .iter()
                .zip(self.weights.iter())
                .filter(|(voted, _)| **voted)
                .map(|(_, weight)| weight)
                .sum();
            if support <= 0.0 {
                continue;
            }

            if ctx.uniform() < support / total {
                chosen.insert(peer);
                self.last_ballots.insert(peer, votes);
            }
        }

        Ok(chosen)
    }

    fn learn(&mut self, ctx: &Context<'_>) {
        if self.last_ballots.is_empty() {
            return;
        }
        let ballots = std::mem::take(&mut self.last_ballots);

        let Some(utilities) = ctx.awareness.peer_values(Knowledge::LastNodeUtilities) else {
            return;
        };

        let penalty = ctx.params.vote_penalty;
        for (peer, votes) in &ballots {
            let paid = utilities.get(peer).is_some_and(|&u| u > 0.0);
            for (weight, voted) in self.weights.iter_mut().zip(votes) {
                if *voted != paid {
                    *weight *= penalty;
                }
            }
        }

        let max = self.weights.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            for weight in &mut self.weights {
                *weight /= max;
            }
        }
        tracing::trace!(weights = ?self.weights, "vote weights updated");
    }
}
