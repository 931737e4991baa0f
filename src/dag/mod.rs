//! The AND/OR solution DAG: every reconciliation is a path through it, and
//! the whole set of optimal reconciliations is represented without ever
//! enumerating them.
//!
//! A [`SolutionNode`] is one of:
//! - `Final` — a leaf association, no children.
//! - `Simple` (AND) — exactly two children, both required (a cospeciation,
//!   duplication, or host-switch event combining two subsolutions).
//! - `Multiple` (OR) — one or more children, any one of which realizes this
//!   node; `Multiple` nodes are never nested directly inside each other
//!   (callers merge them flat).
//!
//! Nodes live in a [`SolutionArena`] owned by one engine run and addressed by
//! [`NodeId`]; the whole arena is dropped as a unit when the run ends.

pub mod policy;

use crate::tree::NodeId as TreeNodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Cost sentinel for an infeasible subsolution (stands in for `+Inf`).
/// Chosen so that `INFINITE_COST + INFINITE_COST` cannot overflow `i64`,
/// even though callers are expected to short-circuit on it before adding.
/// Costs are signed: a cospeciation cost is conventionally negative to
/// reward it over other events.
pub const INFINITE_COST: i64 = i64::MAX / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Simple,
    Multiple,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Cospeciation,
    Duplication,
    HostSwitch,
    Leaf,
}

/// A parasite-host pairing at one DAG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Association {
    pub parasite: TreeNodeId,
    pub host: TreeNodeId,
}

#[derive(Debug, Clone)]
pub struct SolutionNode {
    pub cost: i64,
    pub association: Option<Association>,
    pub kind: Kind,
    pub event: Event,
    pub children: Vec<NodeId>,
    pub num_subsolutions: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DagError {
    #[error("a Simple (AND) node must have exactly two children, got {0}")]
    ArityMismatch(usize),
    #[error("a Multiple (OR) node must have at least one child")]
    EmptyChildren,
}

pub struct SolutionArena {
    nodes: Vec<SolutionNode>,
    empty: NodeId,
    /// Whether freshly-built nodes track `num_subsolutions` (T1 counting) or
    /// leave it at 1 (enumeration-only policies, where counting the DAG
    /// itself is not the point).
    accumulate: bool,
}

impl SolutionArena {
    pub fn new(accumulate: bool) -> Self {
        let mut nodes = Vec::new();
        nodes.push(SolutionNode {
            cost: INFINITE_COST,
            association: None,
            kind: Kind::Final,
            event: Event::Leaf,
            children: Vec::new(),
            num_subsolutions: 1,
        });
        Self {
            nodes,
            empty: NodeId(0),
            accumulate,
        }
    }

    pub fn get(&self, id: NodeId) -> &SolutionNode {
        &self.nodes[id.index()]
    }

    pub fn empty_solution(&self) -> NodeId {
        self.empty
    }

    pub fn is_empty_solution(&self, id: NodeId) -> bool {
        id == self.empty || self.get(id).cost >= INFINITE_COST
    }

    pub fn accumulate(&self) -> bool {
        self.accumulate
    }

    fn push(&mut self, node: SolutionNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn from_leaf_association(&mut self, association: Association, loss_cost: i64, distance: u64) -> NodeId {
        self.push(SolutionNode {
            cost: loss_cost * distance as i64,
            association: Some(association),
            kind: Kind::Final,
            event: Event::Leaf,
            children: Vec::new(),
            num_subsolutions: 1,
        })
    }

    fn num_subsolutions_for(&self, kind: Kind, children: &[NodeId]) -> u64 {
        if !self.accumulate {
            return 1;
        }
        match kind {
            Kind::Simple => children.iter().map(|c| self.get(*c).num_subsolutions).product(),
            Kind::Multiple => children.iter().map(|c| self.get(*c).num_subsolutions).sum(),
            Kind::Final => 1,
        }
    }

    /// Builds an AND node combining `first` and `second` under `event_cost`,
    /// or the empty solution if either child is already infeasible.
    pub fn cartesian(
        &mut self,
        event_cost: i64,
        first: NodeId,
        second: NodeId,
        association: Association,
        event: Event,
    ) -> NodeId {
        if self.is_empty_solution(first) || self.is_empty_solution(second) {
            return self.empty_solution();
        }
        let cost = event_cost + self.get(first).cost + self.get(second).cost;
        let children = vec![first, second];
        let num_subsolutions = self.num_subsolutions_for(Kind::Simple, &children);
        self.push(SolutionNode {
            cost,
            association: Some(association),
            kind: Kind::Simple,
            event,
            children,
            num_subsolutions,
        })
    }

    /// Returns a node identical to `solution` but with `loss_cost` added to
    /// its cost (zero or more loss events charged on a path that doesn't
    /// otherwise change the subsolution it represents).
    pub fn add_loss(&mut self, loss_cost: i64, solution: NodeId) -> NodeId {
        let s = self.get(solution).clone();
        self.push(SolutionNode {
            cost: s.cost + loss_cost,
            association: s.association,
            kind: s.kind,
            event: s.event,
            children: s.children,
            num_subsolutions: s.num_subsolutions,
        })
    }

    /// Flattens `first` and `second` into one OR node. `Multiple` nodes are
    /// never nested: if either input is already `Multiple`, its children are
    /// spliced in directly.
    pub fn merge(&mut self, first: NodeId, second: NodeId) -> Result<NodeId, DagError> {
        debug_assert_eq!(self.get(first).cost, self.get(second).cost);
        if self.is_empty_solution(first) && self.is_empty_solution(second) {
            return Ok(self.empty_solution());
        }
        let mut children = Vec::new();
        for s in [first, second] {
            if self.get(s).kind == Kind::Multiple {
                children.extend_from_slice(&self.get(s).children);
            } else {
                children.push(s);
            }
        }
        if children.is_empty() {
            return Err(DagError::EmptyChildren);
        }
        let cost = self.get(first).cost;
        let num_subsolutions = self.num_subsolutions_for(Kind::Multiple, &children);
        Ok(self.push(SolutionNode {
            cost,
            association: None,
            kind: Kind::Multiple,
            event: Event::Leaf,
            children,
            num_subsolutions,
        }))
    }

    /// Flattens a list of candidates into one OR node without requiring them
    /// to share a cost — unlike [`Self::merge`], which is the tied-cost case
    /// used by min-cost policies. The Best-K policy legitimately keeps
    /// children of differing cost under one `Multiple` node (the k cheapest),
    /// so its node cost is the minimum among its children rather than a
    /// shared value.
    pub fn merge_ranked(&mut self, children: Vec<NodeId>) -> NodeId {
        let mut flat = Vec::with_capacity(children.len());
        for s in children {
            if self.get(s).kind == Kind::Multiple {
                flat.extend_from_slice(&self.get(s).children);
            } else {
                flat.push(s);
            }
        }
        if flat.is_empty() {
            return self.empty_solution();
        }
        let cost = flat.iter().map(|&c| self.get(c).cost).min().unwrap();
        let num_subsolutions = self.num_subsolutions_for(Kind::Multiple, &flat);
        self.push(SolutionNode {
            cost,
            association: None,
            kind: Kind::Multiple,
            event: Event::Leaf,
            children: flat,
            num_subsolutions,
        })
    }

    /// Selects the minimum-cost node(s) from `candidates`, merging ties into
    /// one flat `Multiple` node.
    pub fn best_solution(&mut self, candidates: &[NodeId]) -> Result<NodeId, DagError> {
        let mut best = candidates[0];
        for &candidate in &candidates[1..] {
            let best_cost = self.get(best).cost;
            let cand_cost = self.get(candidate).cost;
            if best_cost > cand_cost {
                best = candidate;
            } else if best_cost == cand_cost {
                best = self.merge(best, candidate)?;
            }
        }
        Ok(best)
    }
}
