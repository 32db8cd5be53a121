//! Bandit-over-peers strategies.
//!
//! Each reachable peer is an independent two-armed bandit: interact with the
//! peer, or do nothing. The inaction arm always pays zero, so it serves as
//! the baseline a peer has to beat.
//!
//! Counters are kept per peer for the lifetime of the node and are not
//! pruned when a peer becomes unreachable; a returning peer resumes where it
//! left off.

use std::collections::BTreeMap;

use super::{peer_value, Context, Strategy};
use crate::awareness::Knowledge;
use crate::error::Result;
use crate::node::{NodeId, PeerSet};

/// UCB1 against the inaction arm
#[derive(Debug, Clone, Default)]
pub struct Ucb1 {
    selected: BTreeMap<NodeId, u64>,
    unselected: BTreeMap<NodeId, u64>,
}

impl Ucb1 {
    /// Times the peer arm was played
    pub fn selected_count(&self, peer: NodeId) -> u64 {
        self.selected.get(&peer).copied().unwrap_or(0)
    }

    /// Times the inaction arm was played
    pub fn unselected_count(&self, peer: NodeId) -> u64 {
        self.unselected.get(&peer).copied().unwrap_or(0)
    }

    pub(super) fn select(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        let awareness = ctx.awareness;
        let mut chosen = PeerSet::new();

        for &peer in awareness.require_peers()? {
            let selected = self.selected.entry(peer).or_insert(0);
            let unselected = self.unselected.entry(peer).or_insert(0);

            // Play each arm once before comparing them.
            if *selected == 0 {
                *selected += 1;
                chosen.insert(peer);
                continue;
            }
            if *unselected == 0 {
                *unselected += 1;
                continue;
            }

            let rewards = awareness.require_peer_values(Knowledge::CumulativeRewards)?;
            let reward = peer_value(rewards, Knowledge::CumulativeRewards, peer, Strategy::Ucb1)?;

            let plays = (*selected + *unselected) as f64;
            let exploration = 2.0 * plays.ln();
            let peer_ucb = reward / *selected as f64 + (exploration / *selected as f64).sqrt();
            let inaction_ucb = (exploration / *unselected as f64).sqrt();

            tracing::trace!(peer = %peer, peer_ucb, inaction_ucb, "ucb1");

            if peer_ucb > inaction_ucb {
                *selected += 1;
                chosen.insert(peer);
            } else {
                *unselected += 1;
            }
        }

        Ok(chosen)
    }
}

/// Epsilon-greedy on the exact average reward of each peer
#[derive(Debug, Clone, Default)]
pub struct EpsilonGreedy {
    selected: BTreeMap<NodeId, u64>,
}

impl EpsilonGreedy {
    /// Times the peer was selected
    pub fn selected_count(&self, peer: NodeId) -> u64 {
        self.selected.get(&peer).copied().unwrap_or(0)
    }

    pub(super) fn select(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        let awareness = ctx.awareness;
        let epsilon = ctx.params.bandit_epsilon;
        let mut chosen = PeerSet::new();

        for &peer in awareness.require_peers()? {
            let selected = self.selected.entry(peer).or_insert(0);

            // The inaction arm needs no trial: its reward is known to be 0.
            if *selected == 0 {
                *selected += 1;
                chosen.insert(peer);
                continue;
            }

            let rewards = awareness.require_peer_values(Knowledge::CumulativeRewards)?;
            let reward = peer_value(
                rewards,
                Knowledge::CumulativeRewards,
                peer,
                Strategy::EpsilonGreedy,
            )?;
            let average = reward / *selected as f64;

            let pick = if ctx.uniform() > epsilon {
                average > 0.0
            } else {
                ctx.uniform() > 0.5
            };

            if pick {
                *selected += 1;
                chosen.insert(peer);
            }
        }

        Ok(chosen)
    }
}

/// Epsilon-greedy on the smoothed reward estimate, without a trial phase.
///
/// A peer whose estimate is exactly zero counts as worth selecting, so fresh
/// peers are tried on the greedy branch.
pub(super) fn relaxed_epsilon_greedy(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let awareness = ctx.awareness;
    let peers = awareness.require_peers()?;
    if peers.is_empty() {
        return Ok(PeerSet::new());
    }

    let rewards = awareness.require_peer_values(Knowledge::CumulativeRelaxedRewards)?;
    let epsilon = ctx.params.relaxed_bandit_epsilon;
    let mut chosen = PeerSet::new();

    for &peer in peers {
        let pick = if ctx.uniform() > epsilon {
            let reward = peer_value(
                rewards,
                Knowledge::CumulativeRelaxedRewards,
                peer,
                Strategy::RelaxedEpsilonGreedy,
            )?;
            reward >= 0.0
        } else {
            ctx.uniform() > 0.5
        };

        if pick {
            chosen.insert(peer);
        }
    }

    Ok(chosen)
}

/// Pursuit learning automaton per peer.
///
/// Selection and inaction probabilities start at 0.5. The first call selects
/// every peer. Afterwards each peer is selected with its current selection
/// probability, and both probabilities then move a fraction `beta` of the way
/// towards `1 - p_min` or `p_min`, depending on whether the smoothed reward
/// of the peer is positive.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePursuit {
    node_probabilities: BTreeMap<NodeId, f64>,
    inaction_probabilities: BTreeMap<NodeId, f64>,
    initialised: bool,
}

const INITIAL_PROBABILITY: f64 = 0.5;

impl AdaptivePursuit {
    /// Current probability of selecting the peer
    pub fn node_probability(&self, peer: NodeId) -> f64 {
        self.node_probabilities
            .get(&peer)
            .copied()
            .unwrap_or(INITIAL_PROBABILITY)
    }

    /// Current probability of leaving the peer alone
    pub fn inaction_probability(&self, peer: NodeId) -> f64 {
        self.inaction_probabilities
            .get(&peer)
            .copied()
            .unwrap_or(INITIAL_PROBABILITY)
    }

    pub(super) fn select(&mut self, ctx: &mut Context<'_>) -> Result<PeerSet> {
        let awareness = ctx.awareness;
        let peers = awareness.require_peers()?;

        if !self.initialised {
            self.initialised = true;
            return Ok(peers.clone());
        }

        if peers.is_empty() {
            return Ok(PeerSet::new());
        }

        let rewards = awareness.require_peer_values(Knowledge::CumulativeRelaxedRewards)?;
        let p_min = ctx.params.pursuit_p_min;
        let p_max = 1.0 - p_min;
        let beta = ctx.params.pursuit_beta;
        let mut chosen = PeerSet::new();

        for &peer in peers {
            let node_p = self
                .node_probabilities
                .entry(peer)
                .or_insert(INITIAL_PROBABILITY);
            let inaction_p = self
                .inaction_probabilities
                .entry(peer)
                .or_insert(INITIAL_PROBABILITY);

            if ctx.uniform() < *node_p {
                chosen.insert(peer);
            }

            let reward = peer_value(
                rewards,
                Knowledge::CumulativeRelaxedRewards,
                peer,
                Strategy::AdaptivePursuit,
            )?;
            let (node_target, inaction_target) = if reward > 0.0 {
                (p_max, p_min)
            } else {
                (p_min, p_max)
            };
            *node_p += beta * (node_target - *node_p);
            *inaction_p += beta * (inaction_target - *inaction_p);
        }

        Ok(chosen)
    }
}
