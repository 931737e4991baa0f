//! The class DAG: same AND/OR shape as the solution DAG, but nodes carry no
//! cost and their association's host may be one of two sentinels instead of
//! a real host node — `General` for T3's event-partition equivalence (every
//! class is tagged only by parasite + event, never by host) and `Switch`
//! for T4's CD-equivalence (real host, except at a host-switch event, where
//! the switched-to host is folded away too).

use crate::{dag::Event, tree::NodeId as TreeNodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub u32);

impl ClassId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassHost {
    Real(TreeNodeId),
    /// T3: every association is folded to this sentinel.
    General,
    /// T4: the host a switch event lands on is folded to this sentinel.
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassAssociation {
    pub parasite: TreeNodeId,
    pub host: ClassHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Simple,
    Multiple,
    Final,
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub association: Option<ClassAssociation>,
    pub kind: ClassKind,
    pub event: Option<Event>,
    pub children: Vec<ClassId>,
}

pub struct ClassArena {
    nodes: Vec<ClassNode>,
    empty: ClassId,
}

impl ClassArena {
    pub fn new() -> Self {
        let mut nodes = Vec::new();
        nodes.push(ClassNode {
            association: None,
            kind: ClassKind::Final,
            event: None,
            children: Vec::new(),
        });
        Self {
            nodes,
            empty: ClassId(0),
        }
    }

    pub fn get(&self, id: ClassId) -> &ClassNode {
        &self.nodes[id.index()]
    }

    pub fn empty_class(&self) -> ClassId {
        self.empty
    }

    pub fn is_empty(&self, id: ClassId) -> bool {
        self.get(id).kind == ClassKind::Final && self.get(id).association.is_none()
    }

    fn push(&mut self, node: ClassNode) -> ClassId {
        let id = ClassId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn class_from_leaf(&mut self, parasite: TreeNodeId, host: TreeNodeId) -> ClassId {
        self.push(ClassNode {
            association: Some(ClassAssociation {
                parasite,
                host: ClassHost::Real(host),
            }),
            kind: ClassKind::Final,
            event: None,
            children: Vec::new(),
        })
    }

    pub fn cartesian(&mut self, first: ClassId, second: ClassId, association: ClassAssociation, event: Event) -> ClassId {
        if self.is_empty(first) || self.is_empty(second) {
            return self.empty;
        }
        self.push(ClassNode {
            association: Some(association),
            kind: ClassKind::Simple,
            event: Some(event),
            children: vec![first, second],
        })
    }

    /// Builds a `Simple` node without the emptiness short-circuit that
    /// [`Self::cartesian`] applies — used by the reduction engine to
    /// recombine already-nonempty fragments under a synthesized association.
    pub fn cartesian_raw(
        &mut self,
        association: ClassAssociation,
        kind: ClassKind,
        event: Option<Event>,
        left: ClassId,
        right: ClassId,
    ) -> ClassId {
        debug_assert_eq!(kind, ClassKind::Simple);
        self.push(ClassNode {
            association: Some(association),
            kind: ClassKind::Simple,
            event,
            children: vec![left, right],
        })
    }

    /// Flattens `children` (already-reduced, pairwise-distinct classes)
    /// into one `Multiple` node, or returns the lone child unwrapped.
    pub fn make_multiple(&mut self, mut children: Vec<ClassId>) -> ClassId {
        if children.len() == 1 {
            return children.remove(0);
        }
        self.push(ClassNode {
            association: None,
            kind: ClassKind::Multiple,
            event: None,
            children,
        })
    }

    /// Every immediate child of a `Multiple` node, or `id` itself otherwise
    /// (`full_flatten` in the original).
    pub fn full_flatten(&self, id: ClassId) -> Vec<ClassId> {
        if self.get(id).kind == ClassKind::Multiple {
            self.get(id).children.clone()
        } else {
            vec![id]
        }
    }
}
