//! Depth-first, left-first enumeration of every reconciliation encoded by
//! the solution DAG, in amortized O(path length) per step.
//!
//! Two cooperating structures:
//! - [`PathIterator`] walks one path from the DAG root down to a `Final`
//!   node (always descending into `children[0]` of a `Simple` node), then
//!   bubbles back up looking for the nearest ancestor it descended into via
//!   `children[0]`, stepping sideways into that ancestor's `children[1]`.
//! - [`ChoiceStack`] remembers, for every `Multiple` (OR) node the current
//!   path has passed through, which child is currently selected; advancing
//!   it after a full path is found is what drives enumeration to the next
//!   combination (innermost choice advances first, odometer-style).

use rustc_hash::FxHashMap;

use crate::dag::{Association, Event, Kind, NodeId, SolutionArena};

struct PathIterator {
    stack: Vec<NodeId>,
}

impl PathIterator {
    fn new(root: NodeId) -> Self {
        Self { stack: vec![root] }
    }

    fn done(&self) -> bool {
        self.stack.is_empty()
    }

    fn current(&self) -> NodeId {
        *self.stack.last().expect("current() called while done")
    }

    fn get_child(&mut self, arena: &SolutionArena, index: usize) -> NodeId {
        let child = arena.get(self.current()).children[index];
        self.stack.push(child);
        child
    }

    /// Advances one step: down-left from a non-`Final` node, or back up (and
    /// then right, once) from a `Final` node. Leaves the iterator `done` if
    /// there is nowhere left to go.
    fn move_to_next(&mut self, arena: &SolutionArena) {
        let starting = self.current();
        if arena.get(starting).kind != Kind::Final {
            let first_child = arena.get(starting).children[0];
            self.stack.push(first_child);
            return;
        }

        let mut current = self.stack.pop().expect("non-empty by invariant");
        let mut found = false;
        while let Some(&previous) = self.stack.last() {
            if arena.get(previous).kind == Kind::Simple && current == arena.get(previous).children[0] {
                found = true;
                break;
            }
            current = self.stack.pop().expect("non-empty while loop guard holds");
        }
        if found {
            let sibling = arena.get(self.current()).children[1];
            self.stack.push(sibling);
        }
    }

    fn get_next(&mut self, arena: &SolutionArena) -> Option<NodeId> {
        self.move_to_next(arena);
        if self.done() {
            None
        } else {
            Some(self.current())
        }
    }
}

/// One fully-resolved reconciliation: every parasite node's assigned host
/// and the event that placed it there.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub assignments: Vec<(Association, Event)>,
    /// Parasite nodes whose event was a host-switch, in discovery order —
    /// exactly the candidate set the cyclicity check needs.
    pub transfer_candidates: Vec<crate::tree::NodeId>,
}

impl Reconciliation {
    pub fn mapping(&self) -> FxHashMap<crate::tree::NodeId, crate::tree::NodeId> {
        self.assignments
            .iter()
            .map(|(a, _)| (a.parasite, a.host))
            .collect()
    }
}

/// Enumerates every reconciliation below `root`, one per call to
/// [`DagEnumerator::next`].
pub struct DagEnumerator<'a> {
    arena: &'a SolutionArena,
    root: NodeId,
    /// `(num_children - 1, selected_index)` per `Multiple` node along the
    /// current path, outermost first.
    choice_stack: Vec<(usize, usize)>,
    current_index: usize,
    exhausted: bool,
}

impl<'a> DagEnumerator<'a> {
    pub fn new(arena: &'a SolutionArena, root: NodeId) -> Self {
        Self {
            arena,
            root,
            choice_stack: Vec::new(),
            current_index: 0,
            exhausted: arena.is_empty_solution(root),
        }
    }

    fn next_merged_solution(&mut self, iterator: &mut PathIterator, current: NodeId) -> NodeId {
        let num_children = self.arena.get(current).children.len();
        if self.current_index >= self.choice_stack.len() {
            self.choice_stack.push((num_children - 1, 0));
            iterator.get_child(self.arena, 0)
        } else if self.current_index == self.choice_stack.len() - 1 {
            let (max_index, index) = self.choice_stack[self.current_index];
            let next_index = index + 1;
            self.choice_stack[self.current_index] = (max_index, next_index);
            iterator.get_child(self.arena, next_index)
        } else {
            let (_, index) = self.choice_stack[self.current_index];
            iterator.get_child(self.arena, index)
        }
    }

    fn clean_stack(&mut self) {
        self.current_index = 0;
        while let Some(&(max_index, index)) = self.choice_stack.last() {
            if index == max_index {
                self.choice_stack.pop();
            } else {
                break;
            }
        }
    }

    /// Walks one full path and returns the reconciliation it encodes, or
    /// `None` once every combination has been produced.
    pub fn next(&mut self) -> Option<Reconciliation> {
        if self.exhausted {
            return None;
        }

        let mut assignments = Vec::new();
        let mut transfer_candidates = Vec::new();

        let mut current = self.root;
        let mut iterator = PathIterator::new(self.root);
        while !iterator.done() {
            current = if self.arena.get(current).kind == Kind::Multiple {
                let next = self.next_merged_solution(&mut iterator, current);
                self.current_index += 1;
                next
            } else {
                let node = self.arena.get(current);
                if let Some(association) = node.association {
                    if node.event == Event::HostSwitch {
                        transfer_candidates.push(association.parasite);
                    }
                    assignments.push((association, node.event));
                }
                match iterator.get_next(self.arena) {
                    Some(n) => n,
                    None => break,
                }
            };
        }
        self.clean_stack();

        if self.choice_stack.is_empty() {
            self.exhausted = true;
        }

        Some(Reconciliation {
            assignments,
            transfer_candidates,
        })
    }
}
