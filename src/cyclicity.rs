//! Acyclicity testing for a single reconciliation: does it respect a
//! consistent global time order once every host-switch event's temporal
//! constraints are taken into account (Stolzer et al.).
//!
//! Two stages:
//! 1. [`transfer_edges`] finds which pairs of host nodes are actually
//!    linked by a transfer in this reconciliation, via an offline
//!    lowest-common-ancestor sweep over the host tree (Tarjan's algorithm,
//!    backed by a weighted union-find with path halving).
//! 2. [`is_acyclic`] builds the Stolzer temporal-constraint digraph from
//!    those edges and checks it for cycles.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::tree::{NodeId, Tree};

/// Weighted quick-union with path halving.
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut p: usize) -> usize {
        while p != self.parent[p] {
            self.parent[p] = self.parent[self.parent[p]];
            p = self.parent[p];
        }
        p
    }

    pub fn union(&mut self, p: usize, q: usize) {
        let root_p = self.find(p);
        let root_q = self.find(q);
        if root_p == root_q {
            return;
        }
        if self.size[root_p] < self.size[root_q] {
            self.parent[root_p] = root_q;
            self.size[root_q] += self.size[root_p];
        } else {
            self.parent[root_q] = root_p;
            self.size[root_p] += self.size[root_q];
        }
    }
}

type Edge = (NodeId, NodeId);

struct LcaSweep<'a> {
    tree: &'a Tree,
    uf: UnionFind,
    colored: Vec<bool>,
    ancestor: Vec<NodeId>,
    pairs: &'a FxHashMap<NodeId, Vec<(NodeId, Edge)>>,
    out: FxHashSet<Edge>,
}

impl<'a> LcaSweep<'a> {
    fn visit(&mut self, u: NodeId) {
        self.ancestor[u.index()] = u;
        if let Some((left, right)) = self.tree.children(u) {
            for v in [left, right] {
                self.visit(v);
                self.uf.union(u.index(), v.index());
                let root = self.uf.find(u.index());
                self.ancestor[root] = u;
            }
        }
        self.colored[u.index()] = true;
        if let Some(entries) = self.pairs.get(&u) {
            for &(v, edge) in entries {
                if self.colored[v.index()] {
                    let lca = self.ancestor[self.uf.find(v.index())];
                    if lca != u && lca != v {
                        self.out.insert(edge);
                    }
                }
            }
        }
    }
}

/// Finds every transfer edge implied by `mapping` given the set of parasite
/// nodes where a host-switch happened (`transfer_candidates`).
pub fn transfer_edges(
    host_tree: &Tree,
    parasite: &Tree,
    mapping: &FxHashMap<NodeId, NodeId>,
    transfer_candidates: &[NodeId],
) -> FxHashSet<Edge> {
    let mut pairs: FxHashMap<NodeId, Vec<(NodeId, Edge)>> = FxHashMap::default();
    for &p in transfer_candidates {
        let h = mapping[&p];
        let (p1, p2) = parasite
            .children(p)
            .unwrap_or_else(|| panic!("transfer candidate must be an internal parasite node"));
        let h1 = mapping[&p1];
        let h2 = mapping[&p2];
        if h != h1 {
            pairs.entry(h).or_default().push((h1, (p, p1)));
            pairs.entry(h1).or_default().push((h, (p, p1)));
        }
        if h != h2 {
            pairs.entry(h).or_default().push((h2, (p, p2)));
            pairs.entry(h2).or_default().push((h, (p, p2)));
        }
    }

    let n = host_tree.len();
    let mut sweep = LcaSweep {
        tree: host_tree,
        uf: UnionFind::new(n),
        colored: vec![false; n],
        ancestor: vec![host_tree.root(); n],
        pairs: &pairs,
        out: FxHashSet::default(),
    };
    sweep.visit(host_tree.root());
    sweep.out
}

/// Builds the Stolzer temporal-constraint digraph over host nodes from the
/// transfer edges and reports whether it is acyclic.
pub fn is_acyclic(host_tree: &Tree, mapping: &FxHashMap<NodeId, NodeId>, transfer_edges: &FxHashSet<Edge>) -> bool {
    if transfer_edges.is_empty() {
        return true;
    }

    let mut graph: petgraph::graphmap::DiGraphMap<NodeId, ()> = petgraph::graphmap::DiGraphMap::new();
    let edges: Vec<Edge> = transfer_edges.iter().copied().collect();

    for &(g, h) in &edges {
        let (d, r) = (mapping[&g], mapping[&h]);
        graph.add_node(d);
        graph.add_node(r);
        if let Some(dp) = host_tree.parent(d) {
            graph.add_edge(dp, d, ());
        }
        if let Some(rp) = host_tree.parent(r) {
            graph.add_edge(rp, r, ());
        }
    }

    // Condition 1: a node in the graph dominates any of its proper
    // descendants that are also in the graph.
    let nodes: Vec<NodeId> = graph.nodes().collect();
    for &node in &nodes {
        for d in host_tree.proper_descendants(node) {
            if graph.contains_node(d) {
                graph.add_edge(node, d, ());
            }
        }
    }

    for &(g, h) in &edges {
        let (d, r) = (mapping[&g], mapping[&h]);
        for &(gp, hp) in &edges {
            if g == gp {
                // Condition 3: two transfers sharing the same source parasite.
                if let Some(dparent) = host_tree.parent(d) {
                    graph.add_edge(dparent, r, ());
                }
                if let Some(rparent) = host_tree.parent(r) {
                    graph.add_edge(rparent, d, ());
                }
            } else if host_tree.is_proper_ancestor_of(g, gp) {
                // Condition 2: one transfer's source is an ancestor of another's.
                let (dp, rp) = (mapping[&gp], mapping[&hp]);
                if let Some(dparent) = host_tree.parent(d) {
                    graph.add_edge(dparent, dp, ());
                    graph.add_edge(dparent, rp, ());
                }
                if let Some(rparent) = host_tree.parent(r) {
                    graph.add_edge(rparent, dp, ());
                    graph.add_edge(rparent, rp, ());
                }
            }
        }
    }

    !petgraph::algo::tarjan_scc(&graph)
        .into_iter()
        .any(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;

    fn chain_host() -> (Tree, NodeId, NodeId, NodeId) {
        let mut b = TreeBuilder::new();
        let a = b.leaf("a");
        let c = b.leaf("c");
        let ac = b.internal("ac", a, c);
        let d = b.leaf("d");
        let root = b.internal("root", ac, d);
        (b.build(root).unwrap(), a, c, d)
    }

    #[test]
    fn no_transfer_candidates_means_no_edges() {
        let (host, ..) = chain_host();
        let mapping = FxHashMap::default();
        let edges = transfer_edges(&host, &host, &mapping, &[]);
        assert!(edges.is_empty());
        assert!(is_acyclic(&host, &mapping, &edges));
    }

    /// `host` and `parasite` here deliberately have different shapes and
    /// node counts (4 host leaves vs 3 parasite leaves), so a NodeId that's
    /// valid in one tree's arena lands on an unrelated node — or panics on
    /// lookup — if read against the other tree.
    #[test]
    fn transfer_edges_resolves_children_against_the_parasite_tree() {
        let mut pb = TreeBuilder::new();
        let p0 = pb.leaf("p0");
        let p1 = pb.leaf("p1");
        let pa = pb.internal("pA", p0, p1);
        let p2 = pb.leaf("p2");
        let proot = pb.internal("proot", pa, p2);
        let parasite = pb.build(proot).unwrap();

        let mut hb = TreeBuilder::new();
        let h0 = hb.leaf("h0");
        let h1 = hb.leaf("h1");
        let ha = hb.internal("hA", h0, h1);
        let h2 = hb.leaf("h2");
        let h3 = hb.leaf("h3");
        let hbb = hb.internal("hB", h2, h3);
        let hroot = hb.internal("hroot", ha, hbb);
        let host = hb.build(hroot).unwrap();

        let mut mapping = FxHashMap::default();
        mapping.insert(proot, h2);
        mapping.insert(pa, h0);
        mapping.insert(p2, h3);

        let edges = transfer_edges(&host, &parasite, &mapping, &[proot]);
        let expected: FxHashSet<Edge> = [(proot, pa), (proot, p2)].into_iter().collect();
        assert_eq!(edges, expected);
    }

    #[test]
    fn union_find_merges_components() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(2, 3);
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(2));
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(3));
    }
}
