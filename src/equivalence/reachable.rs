//! H.1: indexes every solution-DAG node reachable from the final root into
//! a dense `[parasite][host]` matrix, top-down, so the class-DAG build (H.2)
//! never has to re-walk the whole solution DAG itself.

use rustc_hash::FxHashSet;

use crate::dag::{Kind, NodeId as DagNodeId, SolutionArena};
use crate::tree::{NodeId as TreeNodeId, Tree};

pub type ReachableMatrix = Vec<Vec<FxHashSet<DagNodeId>>>;

/// A `Simple` node is atomic; a `Multiple` node unwraps one level; a `Final`
/// node yields nothing. Matches [`super::class::ClassArena`]'s analogous
/// helper — both trace back to the same flatten in the reference algorithm.
fn flatten(arena: &SolutionArena, id: DagNodeId) -> Vec<DagNodeId> {
    match arena.get(id).kind {
        Kind::Simple => vec![id],
        Kind::Multiple => arena.get(id).children.clone(),
        Kind::Final => Vec::new(),
    }
}

pub fn fill_reachable_matrix(
    parasite: &Tree,
    host: &Tree,
    arena: &SolutionArena,
    root: DagNodeId,
) -> ReachableMatrix {
    let mut reachable: ReachableMatrix = vec![vec![FxHashSet::default(); host.len()]; parasite.len()];

    for node in flatten(arena, root) {
        let assoc = arena
            .get(node)
            .association
            .expect("a flattened top-level fragment always carries an association");
        reachable[parasite.index(assoc.parasite) as usize][host.index(assoc.host) as usize].insert(node);
    }

    fill(parasite, parasite.root(), host, arena, &mut reachable);
    reachable
}

fn fill(parasite: &Tree, p: TreeNodeId, host: &Tree, arena: &SolutionArena, reachable: &mut ReachableMatrix) {
    if parasite.is_leaf(p) {
        return;
    }
    let (p1, p2) = parasite.children(p).expect("internal node has two children");
    let p_idx = parasite.index(p) as usize;

    for h in 0..host.len() {
        let nodes: Vec<DagNodeId> = reachable[p_idx][h].iter().copied().collect();
        for node in nodes {
            let children = arena.get(node).children.clone();
            for left_child in flatten(arena, children[0]) {
                let a = arena
                    .get(left_child)
                    .association
                    .expect("a Simple/Multiple fragment always carries an association");
                reachable[parasite.index(p1) as usize][host.index(a.host) as usize].insert(left_child);
            }
            for right_child in flatten(arena, children[1]) {
                let a = arena
                    .get(right_child)
                    .association
                    .expect("a Simple/Multiple fragment always carries an association");
                reachable[parasite.index(p2) as usize][host.index(a.host) as usize].insert(right_child);
            }
        }
    }

    fill(parasite, p1, host, arena, reachable);
    fill(parasite, p2, host, arena, reachable);
}

/// The set of distinct host-side associations realized directly below an
/// OR node, or the single association of a non-`Multiple` node.
pub fn associations(arena: &SolutionArena, id: DagNodeId) -> Vec<crate::dag::Association> {
    let node = arena.get(id);
    if node.kind != Kind::Multiple {
        return node.association.into_iter().collect();
    }
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for &c in &node.children {
        if let Some(a) = arena.get(c).association {
            if seen.insert(a) {
                out.push(a);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Association;
    use crate::tree::{NodeId as TNode, TreeBuilder};

    fn assoc(p: u32, h: u32) -> Association {
        Association {
            parasite: TNode(p),
            host: TNode(h),
        }
    }

    fn single_leaf_trees() -> (Tree, Tree) {
        let mut pb = TreeBuilder::new();
        let pleaf = pb.leaf("p");
        let parasite = pb.build(pleaf).unwrap();

        let mut hb = TreeBuilder::new();
        let hleaf = hb.leaf("h");
        let host = hb.build(hleaf).unwrap();
        (parasite, host)
    }

    #[test]
    fn single_leaf_reconciliation_seeds_the_matrix() {
        let (parasite, host) = single_leaf_trees();
        let mut arena = SolutionArena::new(false);
        let root = arena.from_leaf_association(assoc(0, 0), 0, 0);

        let matrix = fill_reachable_matrix(&parasite, &host, &arena, root);
        assert!(matrix[0][0].is_empty(), "a bare Final root flattens to nothing, matching the reference quirk");
    }

    #[test]
    fn two_way_multiple_root_seeds_both_hosts() {
        let (parasite, host) = {
            let mut pb = TreeBuilder::new();
            let pleaf = pb.leaf("p");
            let parasite = pb.build(pleaf).unwrap();
            let mut hb = TreeBuilder::new();
            let a = hb.leaf("a");
            let b = hb.leaf("b");
            let root = hb.internal("root", a, b);
            let host = hb.build(root).unwrap();
            (parasite, host)
        };
        let mut arena = SolutionArena::new(false);
        let a = arena.from_leaf_association(assoc(0, 0), 0, 0);
        let b = arena.from_leaf_association(assoc(0, 1), 0, 0);
        let merged = arena.merge(a, b).unwrap();

        let matrix = fill_reachable_matrix(&parasite, &host, &arena, merged);
        assert_eq!(matrix[0][0].len(), 1);
        assert_eq!(matrix[0][1].len(), 1);
    }
}
