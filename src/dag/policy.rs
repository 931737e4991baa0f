//! The four pluggable solution policies, modelled as a sum type of strategy
//! objects (`PolicyKind`) rather than as trait objects, since the full set
//! is closed and known up front.
//!
//! - [`PolicyKind::MinCost`] with `counting = true` is T1's counting mode.
//! - [`PolicyKind::MinCost`] with `counting = false` is T1's enumeration
//!   mode, and also the prepass the T3/T4 equivalence engines run before
//!   building their class DAGs.
//! - [`PolicyKind::EventVector`] is T2: every DAG node also carries the set
//!   of distinct `(cospeciation, duplication, host-switch, loss)` vectors
//!   realized below it, each tagged with how many subsolutions produce it.
//! - [`PolicyKind::BestK`] bounds every OR node to at most `k` children,
//!   kept sorted by cost, for top-K-by-cost enumeration.

use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use super::{Association, DagError, Event, Kind, NodeId, SolutionArena};

/// A `(cospeciation, duplication, host_switch, loss)` event count tuple.
pub type EventVector = [u32; 4];

const COSPECIATION: usize = 0;
const DUPLICATION: usize = 1;
const HOST_SWITCH: usize = 2;
const LOSS: usize = 3;

fn event_slot(event: Event) -> usize {
    match event {
        Event::Cospeciation => COSPECIATION,
        Event::Duplication => DUPLICATION,
        Event::HostSwitch => HOST_SWITCH,
        Event::Leaf => unreachable!("a Simple node's event is never Leaf"),
    }
}

pub enum PolicyKind {
    MinCost {
        counting: bool,
    },
    EventVector {
        /// Per-DAG-node set of event vectors, each weighted by how many
        /// subsolutions below that node realize it.
        vectors: FxHashMap<NodeId, FxHashMap<EventVector, u64>>,
        /// Per-`Simple`-node loss count baked into its vectors at creation —
        /// constant for that node, needed to invert the combination back to
        /// its two children's vectors when walking a target vector back down.
        losses: FxHashMap<NodeId, u32>,
    },
    BestK {
        k: u64,
    },
}

impl PolicyKind {
    pub fn min_cost_counting() -> Self {
        PolicyKind::MinCost { counting: true }
    }

    pub fn min_cost_no_count() -> Self {
        PolicyKind::MinCost { counting: false }
    }

    pub fn event_vector() -> Self {
        PolicyKind::EventVector {
            vectors: FxHashMap::default(),
            losses: FxHashMap::default(),
        }
    }

    pub fn best_k(k: u64) -> Self {
        PolicyKind::BestK { k }
    }

    pub fn accumulate(&self) -> bool {
        match self {
            PolicyKind::MinCost { counting } => *counting,
            PolicyKind::EventVector { .. } => true,
            PolicyKind::BestK { .. } => false,
        }
    }

    /// Event vectors realized at `node`, for the `EventVector` policy only.
    pub fn event_vectors(&self, node: NodeId) -> Option<&FxHashMap<EventVector, u64>> {
        match self {
            PolicyKind::EventVector { vectors, .. } => vectors.get(&node),
            _ => None,
        }
    }

    /// The loss count baked into `node`'s vectors at creation time, for a
    /// `Simple` node under the `EventVector` policy only.
    pub fn node_losses(&self, node: NodeId) -> Option<u32> {
        match self {
            PolicyKind::EventVector { losses, .. } => losses.get(&node).copied(),
            _ => None,
        }
    }

    fn record_vectors(&mut self, node: NodeId, vectors: FxHashMap<EventVector, u64>) {
        if let PolicyKind::EventVector { vectors: table, .. } = self {
            table.insert(node, vectors);
        }
    }

    fn record_losses(&mut self, node: NodeId, num_losses: u32) {
        if let PolicyKind::EventVector { losses, .. } = self {
            losses.insert(node, num_losses);
        }
    }

    pub fn from_leaf_association(
        &mut self,
        arena: &mut SolutionArena,
        association: Association,
        loss_cost: i64,
        distance: u64,
    ) -> NodeId {
        let node = arena.from_leaf_association(association, loss_cost, distance);
        if matches!(self, PolicyKind::EventVector { .. }) {
            let mut vectors = FxHashMap::default();
            vectors.insert([0, 0, 0, distance as u32], 1);
            self.record_vectors(node, vectors);
        }
        node
    }

    pub fn cartesian(
        &mut self,
        arena: &mut SolutionArena,
        event_cost: i64,
        first: NodeId,
        second: NodeId,
        association: Association,
        event: Event,
        num_losses: u32,
    ) -> NodeId {
        match self {
            PolicyKind::MinCost { .. } => arena.cartesian(event_cost, first, second, association, event),
            PolicyKind::EventVector { .. } => {
                if arena.is_empty_solution(first) || arena.is_empty_solution(second) {
                    return arena.empty_solution();
                }
                let node = arena.cartesian(event_cost, first, second, association, event);
                let slot = event_slot(event);
                let mut combined: FxHashMap<EventVector, u64> = FxHashMap::default();
                let empty = FxHashMap::default();
                let left = self.event_vectors(first).unwrap_or(&empty).clone();
                let right = self.event_vectors(second).unwrap_or(&empty).clone();
                for (lv, lc) in &left {
                    for (rv, rc) in &right {
                        let mut v = *lv;
                        for i in 0..4 {
                            v[i] += rv[i];
                        }
                        v[slot] += 1;
                        v[LOSS] += num_losses;
                        *combined.entry(v).or_insert(0) += lc * rc;
                    }
                }
                self.record_vectors(node, combined);
                self.record_losses(node, num_losses);
                node
            }
            PolicyKind::BestK { k } => best_k_cartesian(arena, *k, event_cost, first, second, association, event),
        }
    }

    pub fn add_loss(&mut self, arena: &mut SolutionArena, loss_cost: i64, solution: NodeId) -> NodeId {
        let node = arena.add_loss(loss_cost, solution);
        if matches!(self, PolicyKind::EventVector { .. }) {
            let empty = FxHashMap::default();
            let source = self.event_vectors(solution).unwrap_or(&empty).clone();
            let mut bumped = FxHashMap::default();
            for (v, c) in source {
                let mut v = v;
                v[LOSS] += 1;
                *bumped.entry(v).or_insert(0) += c;
            }
            self.record_vectors(node, bumped);
        }
        node
    }

    pub fn merge(&mut self, arena: &mut SolutionArena, first: NodeId, second: NodeId) -> Result<NodeId, DagError> {
        match self {
            PolicyKind::MinCost { .. } => arena.merge(first, second),
            PolicyKind::EventVector { .. } => {
                if arena.is_empty_solution(first) && arena.is_empty_solution(second) {
                    return Ok(arena.empty_solution());
                }
                let node = arena.merge(first, second)?;
                let empty = FxHashMap::default();
                let mut combined = self.event_vectors(first).unwrap_or(&empty).clone();
                for (v, c) in self.event_vectors(second).unwrap_or(&empty).clone() {
                    *combined.entry(v).or_insert(0) += c;
                }
                self.record_vectors(node, combined);
                Ok(node)
            }
            PolicyKind::BestK { k } => Ok(best_k_merge(arena, *k, first, second)),
        }
    }

    pub fn best_solution(&mut self, arena: &mut SolutionArena, candidates: &[NodeId]) -> Result<NodeId, DagError> {
        match self {
            PolicyKind::MinCost { .. } | PolicyKind::EventVector { .. } => {
                let mut best = candidates[0];
                for &candidate in &candidates[1..] {
                    let best_cost = arena.get(best).cost;
                    let cand_cost = arena.get(candidate).cost;
                    if best_cost > cand_cost {
                        best = candidate;
                    } else if best_cost == cand_cost {
                        best = self.merge(arena, best, candidate)?;
                    }
                }
                Ok(best)
            }
            PolicyKind::BestK { k } => {
                let mut best = candidates[0];
                for &candidate in &candidates[1..] {
                    best = best_k_merge_impl(arena, *k, best, candidate)?;
                }
                Ok(best)
            }
        }
    }
}

/// `k == 1` degenerates to plain min-cost selection; `k > 1` keeps up to `k`
/// best candidates per OR node, merged via a sorted two-pointer sweep,
/// mirroring `BestKSolutionGenerator.k_merge` / `.cartesian`.
fn best_k_cartesian(
    arena: &mut SolutionArena,
    k: u64,
    event_cost: i64,
    first: NodeId,
    second: NodeId,
    association: Association,
    event: Event,
) -> NodeId {
    if arena.is_empty_solution(first) || arena.is_empty_solution(second) {
        return arena.empty_solution();
    }
    let first_multiple = arena.get(first).kind == Kind::Multiple;
    let second_multiple = arena.get(second).kind == Kind::Multiple;
    if !first_multiple && !second_multiple {
        return arena.cartesian(event_cost, first, second, association, event);
    }

    let first_children: Vec<NodeId> = if first_multiple {
        arena.get(first).children.clone()
    } else {
        vec![first]
    };
    let second_children: Vec<NodeId> = if second_multiple {
        arena.get(second).children.clone()
    } else {
        vec![second]
    };

    #[derive(PartialEq, Eq)]
    struct HeapEntry(i64, usize, usize);
    impl Ord for HeapEntry {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            other.0.cmp(&self.0)
        }
    }
    impl PartialOrd for HeapEntry {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut children = Vec::new();
    if first_multiple && second_multiple {
        let mut heap = BinaryHeap::new();
        for (j, &sc) in second_children.iter().enumerate() {
            heap.push(HeapEntry(arena.get(first_children[0]).cost + arena.get(sc).cost, 0, j));
        }
        while let Some(HeapEntry(_, i, j)) = heap.pop() {
            children.push(best_k_cartesian(
                arena,
                k,
                event_cost,
                first_children[i],
                second_children[j],
                association,
                event,
            ));
            if children.len() as u64 == k {
                break;
            }
            if i + 1 < first_children.len() {
                let ni = i + 1;
                heap.push(HeapEntry(
                    arena.get(first_children[ni]).cost + arena.get(second_children[j]).cost,
                    ni,
                    j,
                ));
            }
        }
    } else if first_multiple {
        for &fc in &first_children {
            children.push(best_k_cartesian(arena, k, event_cost, fc, second, association, event));
        }
    } else {
        for &sc in &second_children {
            children.push(best_k_cartesian(arena, k, event_cost, first, sc, association, event));
        }
    }

    if k == 1 {
        return children[0];
    }
    flatten_into_multiple(arena, children)
}

fn flatten_into_multiple(arena: &mut SolutionArena, children: Vec<NodeId>) -> NodeId {
    arena.merge_ranked(children)
}

fn best_k_merge(arena: &mut SolutionArena, k: u64, first: NodeId, second: NodeId) -> NodeId {
    best_k_merge_impl(arena, k, first, second).expect("best-k merge never hits an empty-children DagError")
}

fn best_k_merge_impl(arena: &mut SolutionArena, k: u64, first: NodeId, second: NodeId) -> Result<NodeId, DagError> {
    let first_empty = arena.is_empty_solution(first);
    let second_empty = arena.is_empty_solution(second);
    if first_empty && second_empty {
        return Ok(arena.empty_solution());
    }
    if first_empty {
        return Ok(second);
    }
    if second_empty {
        return Ok(first);
    }

    let first_multiple = arena.get(first).kind == Kind::Multiple;
    let second_multiple = arena.get(second).kind == Kind::Multiple;

    if !first_multiple && !second_multiple {
        if k == 1 {
            return Ok(if arena.get(first).cost <= arena.get(second).cost {
                first
            } else {
                second
            });
        }
        let ordered = if arena.get(first).cost <= arena.get(second).cost {
            vec![first, second]
        } else {
            vec![second, first]
        };
        return Ok(flatten_into_multiple(arena, ordered));
    }

    let first_candidates: Vec<NodeId> = if first_multiple {
        arena.get(first).children.clone()
    } else {
        vec![first]
    };
    let second_candidates: Vec<NodeId> = if second_multiple {
        arena.get(second).children.clone()
    } else {
        vec![second]
    };

    if k == 1 {
        return Ok(if arena.get(first_candidates[0]).cost <= arena.get(second_candidates[0]).cost {
            first_candidates[0]
        } else {
            second_candidates[0]
        });
    }

    let mut children = Vec::new();
    let (mut i, mut j) = (0, 0);
    while (children.len() as u64) < k && i < first_candidates.len() && j < second_candidates.len() {
        let fc = arena.get(first_candidates[i]).cost;
        let sc = arena.get(second_candidates[j]).cost;
        if fc < sc {
            children.push(first_candidates[i]);
            i += 1;
        } else if fc > sc {
            children.push(second_candidates[j]);
            j += 1;
        } else {
            children.push(first_candidates[i]);
            i += 1;
            if (children.len() as u64) < k {
                children.push(second_candidates[j]);
                j += 1;
            }
        }
    }
    while i < first_candidates.len() && (children.len() as u64) < k {
        children.push(first_candidates[i]);
        i += 1;
    }
    while j < second_candidates.len() && (children.len() as u64) < k {
        children.push(second_candidates[j]);
        j += 1;
    }

    Ok(flatten_into_multiple(arena, children))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeId as TNode;

    fn assoc(p: u32, h: u32) -> Association {
        Association {
            parasite: TNode(p),
            host: TNode(h),
        }
    }

    #[test]
    fn event_vector_leaf_starts_at_loss_distance() {
        let mut arena = SolutionArena::new(true);
        let mut policy = PolicyKind::event_vector();
        let leaf = policy.from_leaf_association(&mut arena, assoc(0, 0), 5, 2);
        let vectors = policy.event_vectors(leaf).unwrap();
        assert_eq!(vectors.get(&[0, 0, 0, 2]), Some(&1));
    }

    #[test]
    fn event_vector_cartesian_tags_event_and_sums_counts() {
        let mut arena = SolutionArena::new(true);
        let mut policy = PolicyKind::event_vector();
        let a = policy.from_leaf_association(&mut arena, assoc(0, 0), 0, 0);
        let b = policy.from_leaf_association(&mut arena, assoc(0, 1), 0, 0);
        let combined = policy.cartesian(&mut arena, 0, a, b, assoc(1, 0), Event::Cospeciation, 0);
        let vectors = policy.event_vectors(combined).unwrap();
        assert_eq!(vectors.get(&[1, 0, 0, 0]), Some(&1));
    }

    #[test]
    fn best_k_one_behaves_like_plain_min_cost() {
        let mut arena = SolutionArena::new(false);
        let mut policy = PolicyKind::best_k(1);
        let a = policy.from_leaf_association(&mut arena, assoc(0, 0), 1, 1);
        let b = policy.from_leaf_association(&mut arena, assoc(0, 1), 1, 2);
        let best = policy.best_solution(&mut arena, &[a, b]).unwrap();
        assert_eq!(best, a);
    }

    #[test]
    fn best_k_two_caps_children_at_k() {
        let mut arena = SolutionArena::new(false);
        let mut policy = PolicyKind::best_k(2);
        let a = policy.from_leaf_association(&mut arena, assoc(0, 0), 1, 1);
        let b = policy.from_leaf_association(&mut arena, assoc(0, 1), 1, 1);
        let c = policy.from_leaf_association(&mut arena, assoc(0, 2), 1, 1);
        let best = policy.best_solution(&mut arena, &[a, b, c]).unwrap();
        assert_eq!(arena.get(best).children.len(), 2);
    }

    #[test]
    fn best_k_merges_candidates_of_differing_cost() {
        let mut arena = SolutionArena::new(false);
        let mut policy = PolicyKind::best_k(3);
        // Costs 5, 5, 7 — distinct from each other, exercising the case a
        // tied-cost merge would reject outright.
        let a = policy.from_leaf_association(&mut arena, assoc(0, 0), 5, 1);
        let b = policy.from_leaf_association(&mut arena, assoc(0, 1), 5, 1);
        let c = policy.from_leaf_association(&mut arena, assoc(0, 2), 7, 1);
        let best = policy.best_solution(&mut arena, &[a, b, c]).unwrap();
        let node = arena.get(best);
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.cost, 5);
    }

    #[test]
    fn best_k_merges_two_single_candidates_of_differing_cost() {
        // Exercises the single-vs-single fast path in best_k_merge_impl
        // directly (neither candidate is already a Multiple node), which a
        // tied-cost merge would reject since 5 != 7.
        let mut arena = SolutionArena::new(false);
        let mut policy = PolicyKind::best_k(2);
        let a = policy.from_leaf_association(&mut arena, assoc(0, 0), 5, 1);
        let b = policy.from_leaf_association(&mut arena, assoc(0, 1), 7, 1);
        let best = policy.best_solution(&mut arena, &[a, b]).unwrap();
        let node = arena.get(best);
        assert_eq!(node.children, vec![a, b]);
        assert_eq!(node.cost, 5);
    }
}


