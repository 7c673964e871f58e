// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Stage Dependency Graph
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Typed DAG of per-bin stage nodes.
//!
//! Each bin contributes a chain over the configured stages in causal
//! order; absent stages are simply not in the chain. With pair-production
//! fan-in enabled, a single join node waits for every bin's interpolation
//! and releases every bin's pair production. The graph is built and
//! checked for cycles once per configuration.

use crate::stage::StageKind;
use pic_types::error::{PicError, PicResult};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    Stage { bin: usize, kind: StageKind },
    /// Join with no work of its own, released once all predecessors finish.
    FanIn { before: StageKind },
}

#[derive(Debug, Clone)]
pub struct StageGraph {
    stages: Vec<StageKind>,
    n_bins: usize,
    nodes: Vec<GraphNode>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<usize>,
}

impl StageGraph {
    pub fn build(n_bins: usize, stages: &[StageKind], pair_fan_in: bool) -> PicResult<Self> {
        if n_bins == 0 {
            return Err(PicError::ConfigError(
                "stage graph needs at least one bin".to_string(),
            ));
        }
        if !stages.contains(&StageKind::Boundary) {
            return Err(PicError::ConfigError(
                "stage list must contain the boundary stage".to_string(),
            ));
        }
        if stages.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PicError::ConfigError(format!(
                "stages must be distinct and in causal order, got {stages:?}"
            )));
        }

        let per_bin = stages.len();
        let mut nodes = Vec::with_capacity(n_bins * per_bin + 1);
        for bin in 0..n_bins {
            for &kind in stages {
                nodes.push(GraphNode::Stage { bin, kind });
            }
        }
        let mut successors = vec![Vec::new(); nodes.len()];
        for bin in 0..n_bins {
            for s in 1..per_bin {
                successors[bin * per_bin + s - 1].push(bin * per_bin + s);
            }
        }

        let interp = stages.iter().position(|&k| k == StageKind::Interpolate);
        let pair = stages.iter().position(|&k| k == StageKind::PairProduce);
        if let (true, Some(interp), Some(pair)) = (pair_fan_in && n_bins > 1, interp, pair) {
            let join = nodes.len();
            nodes.push(GraphNode::FanIn {
                before: StageKind::PairProduce,
            });
            successors.push(Vec::new());
            for bin in 0..n_bins {
                successors[bin * per_bin + interp].push(join);
                successors[join].push(bin * per_bin + pair);
            }
        }

        let mut predecessors = vec![0; nodes.len()];
        for succ in &successors {
            for &s in succ {
                predecessors[s] += 1;
            }
        }

        let graph = StageGraph {
            stages: stages.to_vec(),
            n_bins,
            nodes,
            successors,
            predecessors,
        };
        graph.topological_order()?;
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn node(&self, id: usize) -> GraphNode {
        self.nodes[id]
    }

    pub fn node_id(&self, bin: usize, kind: StageKind) -> Option<usize> {
        let s = self.stages.iter().position(|&k| k == kind)?;
        (bin < self.n_bins).then(|| bin * self.stages.len() + s)
    }

    pub fn successors(&self, id: usize) -> &[usize] {
        &self.successors[id]
    }

    pub fn predecessor_count(&self, id: usize) -> usize {
        self.predecessors[id]
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&id| self.predecessors[id] == 0)
    }

    /// Kahn ordering; fails if the edges contain a cycle.
    pub fn topological_order(&self) -> PicResult<Vec<usize>> {
        let mut remaining = self.predecessors.clone();
        let mut ready: VecDeque<usize> = self.roots().collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(id) = ready.pop_front() {
            order.push(id);
            for &s in &self.successors[id] {
                remaining[s] -= 1;
                if remaining[s] == 0 {
                    ready.push_back(s);
                }
            }
        }
        if order.len() != self.len() {
            return Err(PicError::InvariantViolation(format!(
                "stage graph has a cycle: ordered {} of {} nodes",
                order.len(),
                self.len()
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: [StageKind; 7] = StageKind::ORDER;

    fn position(order: &[usize], id: usize) -> usize {
        order.iter().position(|&x| x == id).expect("node ordered")
    }

    #[test]
    fn test_chain_per_bin() {
        let stages = [StageKind::Interpolate, StageKind::Push, StageKind::Boundary];
        let g = StageGraph::build(3, &stages, true).expect("valid graph");
        assert_eq!(g.len(), 9);
        assert_eq!(g.roots().count(), 3);
        let push = g.node_id(1, StageKind::Push).expect("present");
        assert_eq!(g.successors(push), &[g.node_id(1, StageKind::Boundary).expect("present")]);
        assert!(g.node_id(1, StageKind::Ionize).is_none());
    }

    #[test]
    fn test_fan_in_orders_pair_after_all_interpolation() {
        let g = StageGraph::build(4, &FULL, true).expect("valid graph");
        assert_eq!(g.len(), 4 * 7 + 1);
        let order = g.topological_order().expect("acyclic");
        for b in 0..4 {
            let pair = g.node_id(b, StageKind::PairProduce).expect("present");
            for other in 0..4 {
                let interp = g.node_id(other, StageKind::Interpolate).expect("present");
                assert!(position(&order, interp) < position(&order, pair));
            }
            assert_eq!(g.predecessor_count(pair), 2);
        }
    }

    #[test]
    fn test_no_fan_in_keeps_bins_independent() {
        let g = StageGraph::build(4, &FULL, false).expect("valid graph");
        assert_eq!(g.len(), 28);
        let pair = g.node_id(2, StageKind::PairProduce).expect("present");
        assert_eq!(g.predecessor_count(pair), 1);
        assert!(!(0..g.len()).any(|id| matches!(g.node(id), GraphNode::FanIn { .. })));
    }

    #[test]
    fn test_rejects_bad_stage_lists() {
        assert!(StageGraph::build(2, &[StageKind::Push], false).is_err());
        assert!(StageGraph::build(
            2,
            &[StageKind::Boundary, StageKind::Push],
            false
        )
        .is_err());
        assert!(StageGraph::build(0, &FULL, false).is_err());
    }
}
