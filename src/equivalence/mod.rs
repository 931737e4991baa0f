//! T3/T4 equivalence-class aggregation: instead of enumerating every
//! optimal reconciliation, build a second, smaller AND/OR DAG over
//! *equivalence classes* of reconciliations and canonicalize it to a fixed
//! point so isomorphic fragments collapse into one class.
//!
//! - [`reachable`] (H.1) indexes which solution-DAG nodes are reachable at
//!   each `(parasite, host)` cell.
//! - [`class`] (H.2 data model) is the class DAG itself.
//! - [`reduce`] (H.3) is the Partner/Absorption/Friend canonicalization.
//! - [`build_class_matrix`] (H.2 build) ties the three together, relabeling
//!   associations per the requested equivalence relation as it goes.
//! - [`reconciliator`] (H.4) re-runs the DP restricted to one class's
//!   prescribed events, to recover a representative reconciliation.

pub mod class;
pub mod reachable;
pub mod reconciliator;
pub mod reduce;

use rustc_hash::FxHashMap;

use crate::dag::{Event, NodeId as DagNodeId, SolutionArena};
use crate::options::Task;
use crate::tree::{NodeId as TreeNodeId, Tree};

use class::{ClassArena, ClassAssociation, ClassHost, ClassId};
use reachable::{associations, fill_reachable_matrix};
use reduce::Reducer;

pub struct ClassMatrix {
    pub arena: ClassArena,
    pub root: ClassId,
}

/// Builds the class DAG for T3 (`task == EventPartition`) or T4
/// (`task == CdEquivalence`). `leaf_map` is the parasite-leaf to host-leaf
/// mapping the reconciliation was run against.
pub fn build_class_matrix(
    parasite: &Tree,
    host: &Tree,
    solutions: &SolutionArena,
    root: DagNodeId,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    task: Task,
) -> ClassMatrix {
    debug_assert!(matches!(task, Task::EventPartition | Task::CdEquivalence));

    let reachable = fill_reachable_matrix(parasite, host, solutions, root);
    let mut arena = ClassArena::new();
    let mut class_matrix: Vec<Vec<ClassId>> = vec![vec![arena.empty_class(); host.len()]; parasite.len()];

    for &p in parasite.post_order() {
        let p_idx = parasite.index(p) as usize;

        if parasite.is_leaf(p) {
            let h = leaf_map[&p];
            class_matrix[p_idx][host.index(h) as usize] = arena.class_from_leaf(p, h);
            continue;
        }

        let (p1, p2) = parasite.children(p).expect("internal node has two children");
        let p1_idx = parasite.index(p1) as usize;
        let p2_idx = parasite.index(p2) as usize;

        for h_idx in 0..host.len() {
            let nodes: Vec<DagNodeId> = reachable[p_idx][h_idx].iter().copied().collect();
            for node in nodes {
                let children = solutions.get(node).children.clone();

                let mut left_sum = arena.empty_class();
                for left_assoc in associations(solutions, children[0]) {
                    let other = class_matrix[p1_idx][host.index(left_assoc.host) as usize];
                    left_sum = Reducer::new(&mut arena).merge(left_sum, other);
                }
                let mut right_sum = arena.empty_class();
                for right_assoc in associations(solutions, children[1]) {
                    let other = class_matrix[p2_idx][host.index(right_assoc.host) as usize];
                    right_sum = Reducer::new(&mut arena).merge(right_sum, other);
                }

                let event = solutions.get(node).event;
                let sub_sol = match task {
                    Task::EventPartition => sub_solution_event_partition(&mut arena, left_sum, right_sum, p, event),
                    Task::CdEquivalence => {
                        let node_host = solutions
                            .get(node)
                            .association
                            .expect("a reachable solution fragment always carries an association")
                            .host;
                        sub_solution_strong(&mut arena, left_sum, right_sum, p, node_host, event)
                    }
                    _ => unreachable!("build_class_matrix is only called for T3/T4"),
                };

                let existing = class_matrix[p_idx][h_idx];
                class_matrix[p_idx][h_idx] = Reducer::new(&mut arena).merge(existing, sub_sol);
            }
        }
    }

    let root_idx = parasite.index(parasite.root()) as usize;
    let mut root_sol = arena.empty_class();
    for h_idx in 0..host.len() {
        let cell = class_matrix[root_idx][h_idx];
        root_sol = Reducer::new(&mut arena).merge(root_sol, cell);
    }

    ClassMatrix { arena, root: root_sol }
}

/// T4: relabels every association's host to the real host the event landed
/// on, except a host-switch, whose target host is folded into one sentinel
/// (`ClassHost::Switch`) — two reconciliations that host-switch to different
/// hosts, but are otherwise identical, are the same CD-equivalence class.
fn sub_solution_strong(
    arena: &mut ClassArena,
    left_sum: ClassId,
    right_sum: ClassId,
    parasite: TreeNodeId,
    node_host: TreeNodeId,
    event: Event,
) -> ClassId {
    let host = if event == Event::HostSwitch {
        ClassHost::Switch
    } else {
        ClassHost::Real(node_host)
    };
    arena.cartesian(left_sum, right_sum, ClassAssociation { parasite, host }, event)
}

/// T3: every association's host is folded to one sentinel
/// (`ClassHost::General`) — classes are distinguished only by parasite
/// topology and event sequence, never by which host was visited.
fn sub_solution_event_partition(
    arena: &mut ClassArena,
    left_sum: ClassId,
    right_sum: ClassId,
    parasite: TreeNodeId,
    event: Event,
) -> ClassId {
    arena.cartesian(
        left_sum,
        right_sum,
        ClassAssociation {
            parasite,
            host: ClassHost::General,
        },
        event,
    )
}
