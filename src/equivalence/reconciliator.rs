//! H.4: recovers one concrete reconciliation belonging to a class built by
//! [`super::build_class_matrix`], by re-running the DP engine with every
//! parasite's event pinned to what that class already decided (and, for
//! CD-equivalence, every non-host-switch parasite's host pinned too).
//!
//! A class node may still be a `Multiple` internally — reduction collapses
//! *isomorphic* fragments, not every fragment into one — so recovering a
//! representative walk just has to pick one child at each such fork; any
//! choice yields a reconciliation in the same class.

use rustc_hash::FxHashMap;

use crate::dag::{Event, NodeId as DagNodeId, SolutionArena};
use crate::engine::Engine;
use crate::error::ReconcileError;
use crate::options::{ReconciliationOptions, Task};
use crate::tree::{NodeId as TreeNodeId, Tree};
use crate::utils::cancellation::CancellationToken;

use super::class::{ClassArena, ClassHost, ClassId, ClassKind};

/// Per-parasite constraints extracted from one representative walk through a
/// class: the event every internal parasite used, and — only where the
/// class actually pins it (T4, non-host-switch) — the host it landed on.
#[derive(Debug, Default)]
pub struct Constraints {
    pub events: FxHashMap<TreeNodeId, Event>,
    pub mapping: FxHashMap<TreeNodeId, TreeNodeId>,
}

/// Walks one arbitrary representative path through `class` (always taking
/// the first child at a `Multiple` fork) and records the event/host every
/// `Simple` node along the way pins for its parasite.
pub fn extract_constraints(arena: &ClassArena, class: ClassId) -> Constraints {
    let mut constraints = Constraints::default();
    visit(arena, class, &mut constraints);
    constraints
}

fn visit(arena: &ClassArena, id: ClassId, constraints: &mut Constraints) {
    let node = arena.get(id);
    match node.kind {
        ClassKind::Final => {}
        ClassKind::Multiple => {
            if let Some(&representative) = node.children.first() {
                visit(arena, representative, constraints);
            }
        }
        ClassKind::Simple => {
            let association = node
                .association
                .expect("a Simple class node always carries an association");
            let event = node.event.expect("a Simple class node always carries an event");
            constraints.events.insert(association.parasite, event);
            if let ClassHost::Real(host) = association.host {
                constraints.mapping.insert(association.parasite, host);
            }
            let children = node.children.clone();
            visit(arena, children[0], constraints);
            visit(arena, children[1], constraints);
        }
    }
}

/// Recovers one reconciliation belonging to `class`: builds a fresh engine,
/// pins it to the class's constraints, and re-runs the DP. T3 classes (no
/// `ClassHost::Real` associations, by construction) only pin events; T4
/// classes additionally pin hosts.
pub fn reconcile_class(
    host: &Tree,
    parasite: &Tree,
    leaf_map: &FxHashMap<TreeNodeId, TreeNodeId>,
    options: &ReconciliationOptions,
    cancellation: &CancellationToken,
    class_arena: &ClassArena,
    class: ClassId,
) -> Result<(DagNodeId, SolutionArena), ReconcileError> {
    let constraints = extract_constraints(class_arena, class);
    let mut engine = Engine::new(host, parasite, leaf_map, options, cancellation);
    let mapping = match options.task {
        Task::CdEquivalence => Some(&constraints.mapping),
        _ => None,
    };
    let root = engine.run_forced(&constraints.events, mapping)?;
    Ok((root, engine.arena))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::Event;
    use crate::equivalence::class::ClassAssociation;

    fn assoc(parasite: u32, host: ClassHost) -> ClassAssociation {
        ClassAssociation {
            parasite: TreeNodeId(parasite),
            host,
        }
    }

    #[test]
    fn extracts_event_and_host_along_one_representative_path() {
        let mut arena = ClassArena::new();
        let leaf_a = arena.class_from_leaf(TreeNodeId(0), TreeNodeId(0));
        let leaf_b = arena.class_from_leaf(TreeNodeId(1), TreeNodeId(1));
        let root = arena.cartesian(
            leaf_a,
            leaf_b,
            assoc(2, ClassHost::Real(TreeNodeId(2))),
            Event::Cospeciation,
        );

        let constraints = extract_constraints(&arena, root);
        assert_eq!(constraints.events.get(&TreeNodeId(2)), Some(&Event::Cospeciation));
        assert_eq!(constraints.mapping.get(&TreeNodeId(2)), Some(&TreeNodeId(2)));
    }

    #[test]
    fn host_switch_target_is_not_pinned() {
        let mut arena = ClassArena::new();
        let leaf_a = arena.class_from_leaf(TreeNodeId(0), TreeNodeId(0));
        let leaf_b = arena.class_from_leaf(TreeNodeId(1), TreeNodeId(1));
        let root = arena.cartesian(leaf_a, leaf_b, assoc(2, ClassHost::Switch), Event::HostSwitch);

        let constraints = extract_constraints(&arena, root);
        assert_eq!(constraints.events.get(&TreeNodeId(2)), Some(&Event::HostSwitch));
        assert!(!constraints.mapping.contains_key(&TreeNodeId(2)));
    }

    #[test]
    fn multiple_fork_follows_the_first_child() {
        let mut arena = ClassArena::new();
        let leaf_a = arena.class_from_leaf(TreeNodeId(0), TreeNodeId(0));
        let leaf_b = arena.class_from_leaf(TreeNodeId(1), TreeNodeId(1));
        let branch_one = arena.cartesian(
            leaf_a,
            leaf_b,
            assoc(2, ClassHost::Real(TreeNodeId(2))),
            Event::Cospeciation,
        );
        let leaf_c = arena.class_from_leaf(TreeNodeId(0), TreeNodeId(3));
        let leaf_d = arena.class_from_leaf(TreeNodeId(1), TreeNodeId(4));
        let branch_two = arena.cartesian(
            leaf_c,
            leaf_d,
            assoc(2, ClassHost::Real(TreeNodeId(5))),
            Event::Duplication,
        );
        let root = arena.make_multiple(vec![branch_one, branch_two]);

        let constraints = extract_constraints(&arena, root);
        assert_eq!(constraints.events.get(&TreeNodeId(2)), Some(&Event::Cospeciation));
        assert_eq!(constraints.mapping.get(&TreeNodeId(2)), Some(&TreeNodeId(2)));
    }
}
