//! Base strategies driven by pheromones.

use super::{peer_value, Context, Strategy};
use crate::awareness::Knowledge;
use crate::error::Result;
use crate::node::PeerSet;

/// Select every reachable peer.
pub(super) fn broadcast(ctx: &mut Context<'_>) -> Result<PeerSet> {
    Ok(ctx.awareness.require_peers()?.clone())
}

/// Select each peer with probability `(1 + tau) / max(tau)`.
pub(super) fn smooth(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let awareness = ctx.awareness;
    let peers = awareness.require_peers()?;
    if peers.is_empty() {
        return Ok(PeerSet::new());
    }

    let taus = awareness.require_peer_values(Knowledge::Taus)?;
    let max_tau = taus.values().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut selected = PeerSet::new();
    for &peer in peers {
        let tau = peer_value(taus, Knowledge::Taus, peer, Strategy::Smooth)?;
        let p = (1.0 + tau) / max_tau;
        if ctx.uniform() < p {
            selected.insert(peer);
        }
    }
    Ok(selected)
}

/// Select peers whose pheromone strictly exceeds `step_epsilon`; the rest
/// get a second chance with probability `step_eta`.
pub(super) fn step(ctx: &mut Context<'_>) -> Result<PeerSet> {
    let awareness = ctx.awareness;
    let peers = awareness.require_peers()?;
    if peers.is_empty() {
        return Ok(PeerSet::new());
    }

    let taus = awareness.require_peer_values(Knowledge::Taus)?;
    let epsilon = ctx.params.step_epsilon;
    let eta = ctx.params.step_eta;

    let mut selected = PeerSet::new();
    for &peer in peers {
        let tau = peer_value(taus, Knowledge::Taus, peer, Strategy::Step)?;
        if tau > epsilon || ctx.uniform() < eta {
            selected.insert(peer);
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awareness::{CapabilityKind, SelfAwareness};
    use crate::config::{NodeParams, PheromoneConfig, StrategyParams};
    use crate::node::NodeId;
    use crate::random::seeded_rng;

    fn awareness_with_tau(initial_tau: f64, ids: &[u32]) -> SelfAwareness {
        let params = NodeParams {
            pheromones: PheromoneConfig {
                initial_tau,
                ..PheromoneConfig::default()
            },
            ..NodeParams::default()
        };
        let mut awareness =
            SelfAwareness::with_capabilities(CapabilityKind::default_set(), &params);
        awareness.notify_topology_changed(&ids.iter().map(|&id| NodeId(id)).collect());
        awareness
    }

    #[test]
    fn test_broadcast_ignores_pheromones() {
        for tau in [0.0, 0.5, 100.0] {
            let awareness = awareness_with_tau(tau, &[1, 2, 3]);
            let mut rng = seeded_rng(1);
            let params = StrategyParams::default();
            let mut ctx = Context {
                awareness: &awareness,
                rng: &mut rng,
                params: &params,
            };
            assert_eq!(
                broadcast(&mut ctx).unwrap(),
                *awareness.peers().unwrap()
            );
        }
    }

    #[test]
    fn test_step_threshold_is_strict() {
        let params = StrategyParams {
            step_epsilon: 0.95,
            step_eta: 0.0,
            ..StrategyParams::default()
        };
        let mut rng = seeded_rng(1);

        let at_threshold = awareness_with_tau(0.95, &[1, 2, 3]);
        let mut ctx = Context {
            awareness: &at_threshold,
            rng: &mut rng,
            params: &params,
        };
        assert!(step(&mut ctx).unwrap().is_empty());

        let above = awareness_with_tau(0.950_001, &[1, 2, 3]);
        let mut ctx = Context {
            awareness: &above,
            rng: &mut rng,
            params: &params,
        };
        assert_eq!(step(&mut ctx).unwrap().len(), 3);
    }

    #[test]
    fn test_step_low_branch_uses_eta() {
        let params = StrategyParams {
            step_epsilon: 0.95,
            step_eta: 1.0,
            ..StrategyParams::default()
        };
        let awareness = awareness_with_tau(0.95, &[1, 2]);
        let mut rng = seeded_rng(1);
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };
        assert_eq!(step(&mut ctx).unwrap().len(), 2);
    }

    #[test]
    fn test_smooth_equal_taus_selects_all() {
        // p = (1 + 1) / 1 = 2
        let awareness = awareness_with_tau(1.0, &[1, 2, 3, 4]);
        let mut rng = seeded_rng(9);
        let params = StrategyParams::default();
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };
        assert_eq!(smooth(&mut ctx).unwrap().len(), 4);
    }

    #[test]
    fn test_smooth_without_peers_is_empty() {
        let awareness = awareness_with_tau(1.0, &[]);
        let mut rng = seeded_rng(9);
        let params = StrategyParams::default();
        let mut ctx = Context {
            awareness: &awareness,
            rng: &mut rng,
            params: &params,
        };
        assert!(smooth(&mut ctx).unwrap().is_empty());
    }
}
