//! §4.I: the three enumeration strategies an embedder actually calls,
//! wiring engine + policy + task together so callers never touch
//! [`Engine`]/[`PolicyKind`] directly.
//!
//! - [`all`] — T1: every optimal reconciliation, optionally filtered to
//!   acyclic ones.
//! - [`per_vector`] — T2: one representative reconciliation per distinct
//!   event vector realized at the root, plus that vector's count.
//! - [`per_class`] — T3/T4: the class DAG, plus a way to materialize one
//!   representative reconciliation for a chosen class.
//! - [`best_k`] — the K lowest-cost reconciliations, without enumerating
//!   every optimal one first.

use rustc_hash::FxHashMap;

use crate::cyclicity::{is_acyclic, transfer_edges};
use crate::dag::policy::EventVector;
use crate::dag::{Association, NodeId as DagNodeId};
use crate::engine::Engine;
use crate::equivalence::class::ClassId;
use crate::equivalence::reconciliator::reconcile_class;
use crate::equivalence::{build_class_matrix, ClassMatrix};
use crate::error::ReconcileError;
use crate::options::{ReconciliationOptions, Task};
use crate::tree::{NodeId as TreeNodeId, Tree};
use crate::utils::cancellation::CancellationToken;
use crate::walker::{DagEnumerator, Reconciliation};

/// `<parasite_label>@<host_label>`, joined by `, ` across a reconciliation —
/// the rendering §6 specifies for an enumerated solution.
pub fn render_reconciliation(parasite: &Tree, host: &Tree, reconciliation: &Reconciliation) -> String {
    reconciliation
        .assignments
        .iter()
        .map(|(a, _)| render_association(parasite, host, *a))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_association(parasite: &Tree, host: &Tree, association: Association) -> String {
    format!("{}@{}", parasite.label(association.parasite), host.label(association.host))
}

/// T1 result: the optimal cost (cost-multiplier undone) and every optimal
/// reconciliation, already filtered to acyclic ones if
/// [`ReconciliationOptions::acyclic_only`] was set.
pub struct AllSolutions {
    pub optimal_cost: i64,
    pub reconciliations: Vec<Reconciliation>,
}

/// T1: run the DP under the counting min-cost policy, walk every
/// reconciliation below the optimal-cost root, and drop the ones whose
/// transfer edges aren't temporally consistent when `acyclic_only` is set.
pub fn all(
    host: &Tree,
    parasite: &Tree,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &CancellationToken,
) -> Result<AllSolutions, ReconcileError> {
    options.validate()?;
    debug_assert_eq!(options.task, Task::AllSolutions);

    let mut engine = Engine::new(host, parasite, leaf_map, options, cancellation);
    let root = engine.run()?;
    let optimal_cost = engine.arena.get(root).cost / options.cost_multiplier as i64;

    let acyclic_only = engine.flags().contains(crate::engine::EngineFlags::ACYCLIC_ONLY);
    let mut enumerator = DagEnumerator::new(&engine.arena, root);
    let mut reconciliations = Vec::new();
    while let Some(reconciliation) = enumerator.next() {
        cancellation.bail_if_cancelled()?;
        if acyclic_only {
            let mapping = reconciliation.mapping();
            let edges = transfer_edges(host, parasite, &mapping, &reconciliation.transfer_candidates);
            if !is_acyclic(host, &mapping, &edges) {
                continue;
            }
        }
        reconciliations.push(reconciliation);
    }

    Ok(AllSolutions {
        optimal_cost,
        reconciliations,
    })
}

/// Runs the DP under the Best-K policy (`options.best_k` bounds every OR
/// node to its `k` cheapest children) and walks every reconciliation below
/// the root, which by construction is at most `k` of them, already ordered
/// cheapest-first by the merge sweep that built it. Same `acyclic_only`
/// filtering as [`all`] — dropping cyclic ones can leave fewer than `k`.
pub fn best_k(
    host: &Tree,
    parasite: &Tree,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &CancellationToken,
) -> Result<Vec<Reconciliation>, ReconcileError> {
    options.validate()?;
    debug_assert_eq!(options.task, Task::BestK);

    let mut engine = Engine::new(host, parasite, leaf_map, options, cancellation);
    let root = engine.run()?;

    let acyclic_only = engine.flags().contains(crate::engine::EngineFlags::ACYCLIC_ONLY);
    let mut enumerator = DagEnumerator::new(&engine.arena, root);
    let mut reconciliations = Vec::new();
    while let Some(reconciliation) = enumerator.next() {
        cancellation.bail_if_cancelled()?;
        if acyclic_only {
            let mapping = reconciliation.mapping();
            let edges = transfer_edges(host, parasite, &mapping, &reconciliation.transfer_candidates);
            if !is_acyclic(host, &mapping, &edges) {
                continue;
            }
        }
        reconciliations.push(reconciliation);
    }
    Ok(reconciliations)
}

/// T2 result: one representative reconciliation per distinct event vector
/// realized at the root, paired with how many reconciliations share it.
pub struct VectorClass {
    pub vector: EventVector,
    pub count: u64,
    pub representative: Reconciliation,
}

/// T2: run the DP under the event-vector policy, then for every distinct
/// vector at the root walk only the branches whose children's realized
/// vectors combine (via the node's event and loss count) to that target —
/// one representative path per vector, the count coming straight from the
/// policy's per-node vector tally rather than a second enumeration pass.
pub fn per_vector(
    host: &Tree,
    parasite: &Tree,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &CancellationToken,
) -> Result<Vec<VectorClass>, ReconcileError> {
    options.validate()?;
    debug_assert_eq!(options.task, Task::EventVectors);

    let mut engine = Engine::new(host, parasite, leaf_map, options, cancellation);
    let root = engine.run()?;

    let vectors = engine
        .policy
        .event_vectors(root)
        .cloned()
        .unwrap_or_default();

    let mut out = Vec::with_capacity(vectors.len());
    for (vector, count) in vectors {
        cancellation.bail_if_cancelled()?;
        let representative = walk_one_matching_vector(&engine, root, vector)
            .ok_or_else(|| ReconcileError::Internal("event vector tallied at root but no matching path found".into()))?;
        out.push(VectorClass {
            vector,
            count,
            representative,
        });
    }
    Ok(out)
}

/// Walks one path realizing exactly `target`, always taking the first
/// matching branch at a `Multiple` fork and the first matching
/// `(left_vector, right_vector)` pairing at a `Simple` node — the node's own
/// baked-in loss count ([`PolicyKind::node_losses`]) disambiguates which
/// pairing actually produced `target`, since several pairings can share the
/// same raw event counts before losses are added.
fn walk_one_matching_vector(engine: &Engine<'_>, root: DagNodeId, target: EventVector) -> Option<Reconciliation> {
    let mut assignments = Vec::new();
    let mut transfer_candidates = Vec::new();
    walk_one_matching_vector_from(engine, root, target, &mut assignments, &mut transfer_candidates)?;
    Some(Reconciliation {
        assignments,
        transfer_candidates,
    })
}

fn walk_one_matching_vector_from(
    engine: &Engine<'_>,
    mut current: DagNodeId,
    target: EventVector,
    assignments: &mut Vec<(Association, crate::dag::Event)>,
    transfer_candidates: &mut Vec<TreeNodeId>,
) -> Option<()> {
    use crate::dag::Kind;

    loop {
        let node = engine.arena.get(current);
        match node.kind {
            Kind::Final => {
                if let Some(association) = node.association {
                    assignments.push((association, node.event));
                }
                return Some(());
            }
            Kind::Multiple => {
                current = node.children.iter().copied().find(|&c| {
                    engine
                        .policy
                        .event_vectors(c)
                        .is_some_and(|vs| vs.contains_key(&target))
                })?;
            }
            Kind::Simple => {
                let children = node.children.clone();
                let event = node.event;
                let association = node.association;
                let num_losses = engine.policy.node_losses(current)?;
                let left_vectors = engine.policy.event_vectors(children[0])?.clone();
                let right_vectors = engine.policy.event_vectors(children[1])?.clone();
                let (left_target, right_target) = left_vectors.keys().find_map(|&lv| {
                    right_vectors
                        .keys()
                        .find(|&&rv| combine_vectors(lv, rv, event, num_losses) == target)
                        .map(|&rv| (lv, rv))
                })?;
                if let Some(association) = association {
                    if event == crate::dag::Event::HostSwitch {
                        transfer_candidates.push(association.parasite);
                    }
                    assignments.push((association, event));
                }
                walk_one_matching_vector_from(engine, children[0], left_target, assignments, transfer_candidates)?;
                walk_one_matching_vector_from(engine, children[1], right_target, assignments, transfer_candidates)?;
                return Some(());
            }
        }
    }
}

fn combine_vectors(left: EventVector, right: EventVector, event: crate::dag::Event, num_losses: u32) -> EventVector {
    let mut v = left;
    for i in 0..4 {
        v[i] += right[i];
    }
    match event {
        crate::dag::Event::Cospeciation => v[0] += 1,
        crate::dag::Event::Duplication => v[1] += 1,
        crate::dag::Event::HostSwitch => v[2] += 1,
        crate::dag::Event::Leaf => unreachable!("a Simple node's event is never Leaf"),
    }
    v[3] += num_losses;
    v
}

/// T3/T4 result: the reduced class DAG plus the original solution arena and
/// root, so a caller can feed a chosen class into [`reconcile_representative`].
pub struct ClassResult<'a> {
    pub engine: Engine<'a>,
    pub root: DagNodeId,
    pub classes: ClassMatrix,
}

/// T3/T4: run the DP under the plain min-cost (no-count) policy, then build
/// and reduce the class DAG over the resulting solution DAG.
pub fn per_class<'a>(
    host: &'a Tree,
    parasite: &'a Tree,
    leaf_map: &'a FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &'a CancellationToken,
) -> Result<ClassResult<'a>, ReconcileError> {
    options.validate()?;
    debug_assert!(matches!(options.task, Task::EventPartition | Task::CdEquivalence));

    let mut engine = Engine::new(host, parasite, leaf_map, options, cancellation);
    let root = engine.run()?;
    let classes = build_class_matrix(parasite, host, &engine.arena, root, leaf_map, options.task);

    Ok(ClassResult { engine, root, classes })
}

/// Materializes one concrete reconciliation belonging to `class` — the
/// final step of T3/T4, invoked only once the caller has picked a class out
/// of [`ClassResult::classes`].
pub fn reconcile_representative(
    host: &Tree,
    parasite: &Tree,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &CancellationToken,
    classes: &ClassMatrix,
    class: ClassId,
) -> Result<Reconciliation, ReconcileError> {
    let (root, arena) = reconcile_class(host, parasite, leaf_map, options, cancellation, &classes.arena, class)?;
    let mut enumerator = DagEnumerator::new(&arena, root);
    enumerator
        .next()
        .ok_or_else(|| ReconcileError::Internal("constrained re-reconciliation produced an empty DAG".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CostVector;
    use crate::tree::TreeBuilder;

    fn two_leaf_pair() -> (Tree, Tree, FxHashMap<TreeNodeId, TreeNodeId>) {
        let mut pb = TreeBuilder::new();
        let pa = pb.leaf("pa");
        let pb_leaf = pb.leaf("pb");
        let proot = pb.internal("proot", pa, pb_leaf);
        let parasite = pb.build(proot).unwrap();

        let mut hb = TreeBuilder::new();
        let ha = hb.leaf("ha");
        let hb_leaf = hb.leaf("hb");
        let hroot = hb.internal("hroot", ha, hb_leaf);
        let host = hb.build(hroot).unwrap();

        let mut leaf_map = FxHashMap::default();
        leaf_map.insert(pa, ha);
        leaf_map.insert(pb_leaf, hb_leaf);
        (parasite, host, leaf_map)
    }

    fn options(task: Task) -> ReconciliationOptions {
        ReconciliationOptions {
            cost: CostVector {
                cospeciation: 0,
                duplication: 1,
                host_switch: 1,
                loss: 1,
            },
            task,
            ..ReconciliationOptions::default()
        }
    }

    #[test]
    fn all_solutions_finds_the_single_cospeciation() {
        let (parasite, host, leaf_map) = two_leaf_pair();
        let cancellation = CancellationToken::new();
        let result = all(&host, &parasite, &leaf_map, &options(Task::AllSolutions), &cancellation).unwrap();
        assert_eq!(result.optimal_cost, 0);
        assert_eq!(result.reconciliations.len(), 1);
    }

    #[test]
    fn per_class_reduces_to_one_class_for_a_unique_optimum() {
        let (parasite, host, leaf_map) = two_leaf_pair();
        let cancellation = CancellationToken::new();
        let result = per_class(&host, &parasite, &leaf_map, &options(Task::EventPartition), &cancellation).unwrap();
        assert!(!result.classes.arena.is_empty(result.classes.root));
    }

    #[test]
    fn best_k_respects_the_k_bound() {
        let (parasite, host, leaf_map) = two_leaf_pair();
        let cancellation = CancellationToken::new();
        let mut opts = options(Task::BestK);
        opts.best_k = Some(1);
        let result = best_k(&host, &parasite, &leaf_map, &opts, &cancellation).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn best_k_without_a_k_is_rejected_before_the_engine_runs() {
        let (parasite, host, leaf_map) = two_leaf_pair();
        let cancellation = CancellationToken::new();
        let opts = options(Task::BestK);
        assert!(best_k(&host, &parasite, &leaf_map, &opts, &cancellation).is_err());
    }

    #[test]
    fn best_k_honors_acyclic_only_like_all_does() {
        let (parasite, host, leaf_map) = two_leaf_pair();
        let cancellation = CancellationToken::new();
        let mut opts = options(Task::BestK);
        opts.best_k = Some(5);
        opts.acyclic_only = true;
        // This topology has no genuinely cyclic reconciliation, so the
        // filter should pass every candidate through unfiltered; this just
        // exercises the filter path runs without error rather than
        // asserting a specific count, since best_k with k exceeding the
        // candidate count returns all of them, cospeciation and
        // host-switches alike.
        let result = best_k(&host, &parasite, &leaf_map, &opts, &cancellation).unwrap();
        assert!(!result.is_empty());
        for r in &result {
            let mapping = r.mapping();
            let edges = transfer_edges(&host, &parasite, &mapping, &r.transfer_candidates);
            assert!(is_acyclic(&host, &mapping, &edges));
        }
    }
}
