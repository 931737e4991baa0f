//! Canonical reduction of a set of AND-gate classes to a fixed point.
//!
//! Three rules, applied repeatedly until nothing changes:
//! - **Partner**: two classes that share one side exactly get merged by
//!   recursively reducing their other side.
//! - **Absorption** (`less_than`): a class whose associations are a strict
//!   subset of another's (on both sides) is redundant and is dropped.
//! - **Friend**: two classes that overlap on one side and partially overlap
//!   on the other get split into up to three classes covering the
//!   union without duplication.
//!
//! Structural hashing is used only to order candidates and short-circuit
//! obviously-different classes; the canonical equality decision is always
//! the full recursive [`struct_eq`] comparison; the hash is explicitly not
//! a perfect hash of class identity.

use rustc_hash::FxHashMap;

use super::class::{ClassArena, ClassId, ClassKind};

pub struct Reducer<'a> {
    arena: &'a mut ClassArena,
    hash_cache: FxHashMap<ClassId, u64>,
}

impl<'a> Reducer<'a> {
    pub fn new(arena: &'a mut ClassArena) -> Self {
        Self {
            arena,
            hash_cache: FxHashMap::default(),
        }
    }

    pub fn arena(&mut self) -> &mut ClassArena {
        self.arena
    }

    /// Merges two classes into the canonical reduction of their union:
    /// the empty class is an identity, otherwise every non-`Multiple`
    /// fragment of both sides is pooled and reduced to a fixed point.
    pub fn merge(&mut self, first: ClassId, second: ClassId) -> ClassId {
        if self.arena.is_empty(second) {
            return first;
        }
        if self.arena.is_empty(first) {
            return second;
        }
        let mut children = Vec::new();
        for id in self.full_flatten(first) {
            self.set_insert_unique(&mut children, id);
        }
        for id in self.full_flatten(second) {
            self.set_insert_unique(&mut children, id);
        }
        self.reduce(&mut children);
        self.unwrap(children)
    }

    fn hash(&mut self, id: ClassId) -> u64 {
        if let Some(&h) = self.hash_cache.get(&id) {
            return h;
        }
        let node = self.arena.get(id).clone();
        let mut h = fxhash_seed(&node.association, node.event);
        match node.kind {
            ClassKind::Simple => {
                for c in self.left(id) {
                    h ^= self.hash(c) >> 1;
                }
                for c in self.right(id) {
                    h ^= self.hash(c) << 1;
                }
            }
            ClassKind::Multiple => {
                for &c in &node.children {
                    h ^= self.hash(c).rotate_left(7);
                }
            }
            ClassKind::Final => {}
        }
        self.hash_cache.insert(id, h);
        h
    }

    /// `flatten`: a `Simple` node is treated as atomic; a `Multiple` node is
    /// unwrapped one level; a `Final` (leaf) node yields nothing, since it
    /// has no children to unwrap — this mirrors the original's exact
    /// behavior rather than a tidier reading of "flatten".
    fn flatten(&self, id: ClassId) -> Vec<ClassId> {
        match self.arena.get(id).kind {
            ClassKind::Simple => vec![id],
            ClassKind::Multiple => self.arena.get(id).children.clone(),
            ClassKind::Final => Vec::new(),
        }
    }

    fn full_flatten(&self, id: ClassId) -> Vec<ClassId> {
        self.arena.full_flatten(id)
    }

    fn sorted(&mut self, mut ids: Vec<ClassId>) -> Vec<ClassId> {
        let keyed: Vec<(u64, ClassId)> = ids.drain(..).map(|id| (self.hash(id), id)).collect();
        let mut keyed = keyed;
        keyed.sort_by_key(|(h, _)| *h);
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    fn left(&mut self, id: ClassId) -> Vec<ClassId> {
        let child = self.arena.get(id).children[0];
        let flat = self.flatten(child);
        self.sorted(flat)
    }

    fn right(&mut self, id: ClassId) -> Vec<ClassId> {
        let child = self.arena.get(id).children[1];
        let flat = self.flatten(child);
        self.sorted(flat)
    }

    fn full_left(&mut self, id: ClassId) -> Vec<ClassId> {
        let child = self.arena.get(id).children[0];
        let flat = self.full_flatten(child);
        self.sorted(flat)
    }

    fn full_right(&mut self, id: ClassId) -> Vec<ClassId> {
        let child = self.arena.get(id).children[1];
        let flat = self.full_flatten(child);
        self.sorted(flat)
    }

    /// Full recursive structural equality; the canonical decider of class
    /// identity (the hash above is only a pre-filter).
    pub fn struct_eq(&mut self, a: ClassId, b: ClassId) -> bool {
        if a == b {
            return true;
        }
        let (na, nb) = (self.arena.get(a).clone(), self.arena.get(b).clone());
        if na.kind != nb.kind || na.association != nb.association || na.event != nb.event {
            return false;
        }
        match na.kind {
            ClassKind::Final => true,
            ClassKind::Simple => {
                self.struct_eq(na.children[0], nb.children[0]) && self.struct_eq(na.children[1], nb.children[1])
            }
            ClassKind::Multiple => {
                if na.children.len() != nb.children.len() {
                    return false;
                }
                let mut remaining = nb.children.clone();
                for &x in &na.children {
                    let pos = remaining.iter().position(|&y| self.struct_eq(x, y));
                    match pos {
                        Some(p) => {
                            remaining.remove(p);
                        }
                        None => return false,
                    }
                }
                true
            }
        }
    }

    fn list_eq(&mut self, a: &[ClassId], b: &[ClassId]) -> bool {
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).all(|(&x, &y)| self.struct_eq(x, y))
    }

    fn set_contains(&mut self, set: &[ClassId], target: ClassId) -> bool {
        set.iter().any(|&x| self.struct_eq(x, target))
    }

    fn set_insert_unique(&mut self, set: &mut Vec<ClassId>, target: ClassId) {
        if !self.set_contains(set, target) {
            set.push(target);
        }
    }

    fn set_union(&mut self, mut a: Vec<ClassId>, b: &[ClassId]) -> Vec<ClassId> {
        for &x in b {
            self.set_insert_unique(&mut a, x);
        }
        a
    }

    /// `a < b` under the original's hash-ordering tiebreak, used only to
    /// avoid checking an unordered pair twice.
    fn hash_less(&mut self, a: ClassId, b: ClassId) -> bool {
        self.hash(a) < self.hash(b)
    }

    /// `left`/`right`/`full_left`/`full_right` all index `children[0..1]`,
    /// which is only meaningful for a `Simple` (AND) node.
    fn has_children(&self, id: ClassId) -> bool {
        self.arena.get(id).kind == ClassKind::Simple
    }

    fn less_than(&mut self, a: ClassId, b: ClassId) -> bool {
        if !self.has_children(a) || !self.has_children(b) {
            return false;
        }
        let (assoc_a, event_a) = {
            let n = self.arena.get(a);
            (n.association, n.event)
        };
        let (assoc_b, event_b) = {
            let n = self.arena.get(b);
            (n.association, n.event)
        };
        if assoc_a != assoc_b || event_a != event_b {
            return false;
        }
        for j in 0..2 {
            let this = if j == 0 { self.full_left(a) } else { self.full_right(a) };
            let that = if j == 0 { self.full_left(b) } else { self.full_right(b) };
            let (inter, diff) = self.inter_diff(&this, &that);
            if !inter || !diff.is_empty() {
                return false;
            }
        }
        true
    }

    fn is_partner(&mut self, a: ClassId, b: ClassId, simple: bool) -> Option<ClassId> {
        if !self.has_children(a) || !self.has_children(b) {
            return None;
        }
        let (assoc_a, event_a, kind_a) = {
            let n = self.arena.get(a);
            (n.association, n.event, n.kind)
        };
        let (assoc_b, event_b) = {
            let n = self.arena.get(b);
            (n.association, n.event)
        };
        if assoc_a != assoc_b || event_a != event_b {
            return None;
        }
        let this_left = self.left(a);
        let that_left = self.left(b);
        let this_right = self.right(a);
        let that_right = self.right(b);

        if self.list_eq(&this_left, &that_left) {
            let mut right_set = self.set_union(this_right, &that_right);
            if simple {
                self.simple_reduce(&mut right_set);
            } else {
                self.reduce(&mut right_set);
            }
            let right_child = self.unwrap(right_set);
            let left_child = self.arena.get(a).children[0];
            let baby = self.arena.cartesian_raw(assoc_a.unwrap(), kind_a, event_a, left_child, right_child);
            return Some(baby);
        }
        if self.list_eq(&this_right, &that_right) {
            let mut left_set = self.set_union(this_left, &that_left);
            if simple {
                self.simple_reduce(&mut left_set);
            } else {
                self.reduce(&mut left_set);
            }
            let left_child = self.unwrap(left_set);
            let right_child = self.arena.get(a).children[1];
            let baby = self.arena.cartesian_raw(assoc_a.unwrap(), kind_a, event_a, left_child, right_child);
            return Some(baby);
        }
        None
    }

    fn unwrap(&mut self, nodes: Vec<ClassId>) -> ClassId {
        self.arena.make_multiple(nodes)
    }

    fn inter_diff(&mut self, this_set: &[ClassId], that_set: &[ClassId]) -> (bool, Vec<ClassId>) {
        let mut inter = false;
        let mut diff_set: Vec<ClassId> = Vec::new();
        for &this in this_set {
            let mut current = vec![this];
            for &that in that_set {
                let (intersect, diff_children) = self.local_inter_diff(&current, that);
                inter = inter || intersect;
                current = diff_children;
            }
            diff_set = self.set_union(diff_set, &current);
        }
        if !diff_set.is_empty() {
            self.simple_reduce(&mut diff_set);
        }
        (inter, diff_set)
    }

    fn local_inter_diff(&mut self, this_set: &[ClassId], that: ClassId) -> (bool, Vec<ClassId>) {
        if this_set.is_empty() {
            return (false, Vec::new());
        }
        if this_set.len() > 1 {
            let mut inter = false;
            let mut diff_set = Vec::new();
            for &this in this_set {
                let (i, d) = self.local_inter_diff(&[this], that);
                inter = inter || i;
                diff_set = self.set_union(diff_set, &d);
            }
            return (inter, diff_set);
        }

        let this = this_set[0];
        let (assoc_that, event_that) = {
            let n = self.arena.get(that);
            (n.association, n.event)
        };
        let (assoc_this, event_this, has_children) = {
            let n = self.arena.get(this);
            (n.association, n.event, !n.children.is_empty())
        };
        if assoc_that != assoc_this || event_that != event_this {
            return (false, vec![this]);
        }
        if !has_children {
            return (true, Vec::new());
        }

        let this_left = self.full_left(this);
        let this_right = self.full_right(this);
        let that_left = self.full_left(that);
        let that_right = self.full_right(that);

        let (left_inter, left_diff) = self.inter_diff(&this_left, &that_left);
        let (right_inter, right_diff) = self.inter_diff(&this_right, &that_right);

        let mut diff_set = Vec::new();
        let assoc = assoc_this.unwrap();
        if !left_diff.is_empty() {
            let left_baby = self.unwrap(left_diff);
            let right_child = self.arena.get(this).children[1];
            let node = self.arena.cartesian_raw(assoc, ClassKind::Simple, event_this, left_baby, right_child);
            self.set_insert_unique(&mut diff_set, node);
        }
        if !right_diff.is_empty() {
            let right_baby = self.unwrap(right_diff);
            let left_child = self.arena.get(this).children[0];
            let node = self.arena.cartesian_raw(assoc, ClassKind::Simple, event_this, left_child, right_baby);
            self.set_insert_unique(&mut diff_set, node);
        }
        (left_inter && right_inter, diff_set)
    }

    fn intersection(&mut self, this_set: &[ClassId], that_set: &[ClassId]) -> Vec<ClassId> {
        let mut inter_set = Vec::new();
        for &this in this_set {
            for &that in that_set {
                let found = self.local_intersection(this, that);
                inter_set = self.set_union(inter_set, &found);
            }
        }
        if !inter_set.is_empty() {
            self.simple_reduce(&mut inter_set);
        }
        inter_set
    }

    fn local_intersection(&mut self, this: ClassId, that: ClassId) -> Vec<ClassId> {
        let (assoc_that, event_that) = {
            let n = self.arena.get(that);
            (n.association, n.event)
        };
        let (assoc_this, event_this, has_children) = {
            let n = self.arena.get(this);
            (n.association, n.event, !n.children.is_empty())
        };
        if assoc_that != assoc_this || event_that != event_this {
            return Vec::new();
        }
        if !has_children {
            return vec![this];
        }

        let this_left = self.full_left(this);
        let this_right = self.full_right(this);
        let that_left = self.full_left(that);
        let that_right = self.full_right(that);

        let left_inter = self.intersection(&this_left, &that_left);
        let right_inter = self.intersection(&this_right, &that_right);
        if left_inter.is_empty() || right_inter.is_empty() {
            return Vec::new();
        }
        let assoc = assoc_this.unwrap();
        let left = self.unwrap(left_inter);
        let right = self.unwrap(right_inter);
        vec![self.arena.cartesian_raw(assoc, ClassKind::Simple, event_this, left, right)]
    }

    /// Up to a three-way split covering the union of `a` and `b` without
    /// duplicating shared coverage. Returns `None` if the two classes don't
    /// overlap enough to be worth splitting.
    fn is_friend(&mut self, a: ClassId, b: ClassId) -> Option<(ClassId, ClassId, Option<ClassId>)> {
        if !self.has_children(a) || !self.has_children(b) {
            return None;
        }
        let (assoc_a, event_a) = {
            let n = self.arena.get(a);
            (n.association, n.event)
        };
        let (assoc_b, event_b) = {
            let n = self.arena.get(b);
            (n.association, n.event)
        };
        if assoc_a != assoc_b || event_a != event_b {
            return None;
        }

        let this_left = self.full_left(a);
        let that_left = self.full_left(b);
        let this_right = self.full_right(a);
        let that_right = self.full_right(b);

        let (left_intersect, left_diff) = self.inter_diff(&this_left, &that_left);
        if left_intersect && left_diff.is_empty() {
            let (right_intersect, right_diff) = self.inter_diff(&this_right, &that_right);
            if right_intersect {
                let right_baby = self.unwrap(right_diff);
                let left_child = self.arena.get(a).children[0];
                let baby =
                    self.arena
                        .cartesian_raw(assoc_a.unwrap(), ClassKind::Simple, event_a, left_child, right_baby);
                return Some((baby, b, None));
            }
            return None;
        }

        let (right_intersect, right_diff) = self.inter_diff(&this_right, &that_right);
        if right_intersect && right_diff.is_empty() {
            if left_intersect {
                let left_baby = self.unwrap(left_diff);
                let right_child = self.arena.get(a).children[1];
                let baby =
                    self.arena
                        .cartesian_raw(assoc_a.unwrap(), ClassKind::Simple, event_a, left_baby, right_child);
                return Some((baby, b, None));
            }
            return None;
        }

        let (left_intersect_rev, left_diff_rev) = self.inter_diff(&that_left, &this_left);
        if left_intersect_rev && left_diff_rev.is_empty() {
            let (right_intersect_rev, right_diff_rev) = self.inter_diff(&that_right, &this_right);
            if right_intersect_rev {
                let right_baby = self.unwrap(right_diff_rev);
                let left_child = self.arena.get(b).children[0];
                let baby =
                    self.arena
                        .cartesian_raw(assoc_a.unwrap(), ClassKind::Simple, event_a, left_child, right_baby);
                return Some((a, baby, None));
            }
            return None;
        }

        let (right_intersect_rev, right_diff_rev) = self.inter_diff(&that_right, &this_right);
        if right_intersect_rev && right_diff_rev.is_empty() {
            if left_intersect_rev {
                let left_baby = self.unwrap(left_diff_rev);
                let right_child = self.arena.get(b).children[1];
                let baby =
                    self.arena
                        .cartesian_raw(assoc_a.unwrap(), ClassKind::Simple, event_a, left_baby, right_child);
                return Some((a, baby, None));
            }
            return None;
        }

        if right_intersect && left_intersect {
            let left_baby = self.unwrap(left_diff);
            let right_child_a = self.arena.get(a).children[1];
            let first_baby =
                self.arena
                    .cartesian_raw(assoc_a.unwrap(), ClassKind::Simple, event_a, left_baby, right_child_a);

            let left_intersection = self.intersection(&this_left, &that_left);
            let middle_left = self.unwrap(left_intersection);
            let middle_right = self.unwrap(right_diff);
            let second_baby = self.arena.cartesian_raw(
                assoc_a.unwrap(),
                ClassKind::Simple,
                event_a,
                middle_left,
                middle_right,
            );
            return Some((first_baby, second_baby, Some(b)));
        }
        None
    }

    /// Partner + Absorption + Friend, to a fixed point.
    pub fn reduce(&mut self, classes: &mut Vec<ClassId>) {
        loop {
            let mut to_remove: Vec<ClassId> = Vec::new();
            let mut to_add: Vec<ClassId> = Vec::new();
            let mut broke = false;

            'outer: for &a in classes.iter() {
                for &b in classes.iter() {
                    if self.hash_less(a, b) || self.struct_eq(a, b) {
                        continue;
                    }
                    if let Some(baby) = self.is_partner(a, b, false) {
                        self.set_insert_unique(&mut to_remove, a);
                        self.set_insert_unique(&mut to_remove, b);
                        self.set_insert_unique(&mut to_add, baby);
                        broke = true;
                        break 'outer;
                    }
                    if self.less_than(a, b) {
                        self.set_insert_unique(&mut to_remove, a);
                    } else if self.less_than(b, a) {
                        self.set_insert_unique(&mut to_remove, b);
                    } else if let Some((first, second, third)) = self.is_friend(a, b) {
                        self.set_insert_unique(&mut to_remove, a);
                        self.set_insert_unique(&mut to_remove, b);
                        self.set_insert_unique(&mut to_add, first);
                        self.set_insert_unique(&mut to_add, second);
                        if let Some(third) = third {
                            self.set_insert_unique(&mut to_add, third);
                        }
                        broke = true;
                        break 'outer;
                    }
                }
                if broke {
                    break;
                }
            }

            classes.retain(|c| !to_remove.iter().any(|r| r == c));
            for add in &to_add {
                self.set_insert_unique(classes, *add);
            }
            if to_add.is_empty() {
                break;
            }
        }
    }

    /// Partner rule only — the cheaper pass used inside [`Self::reduce`]'s
    /// own recursive calls where Absorption/Friend would be redundant work.
    pub fn simple_reduce(&mut self, classes: &mut Vec<ClassId>) {
        loop {
            let mut to_remove: Vec<ClassId> = Vec::new();
            let mut to_add: Vec<ClassId> = Vec::new();
            let mut broke = false;

            'outer: for &a in classes.iter() {
                for &b in classes.iter() {
                    if self.hash_less(a, b) || self.struct_eq(a, b) {
                        continue;
                    }
                    if let Some(baby) = self.is_partner(a, b, true) {
                        self.set_insert_unique(&mut to_remove, a);
                        self.set_insert_unique(&mut to_remove, b);
                        self.set_insert_unique(&mut to_add, baby);
                        broke = true;
                        break 'outer;
                    }
                }
                if broke {
                    break;
                }
            }

            classes.retain(|c| !to_remove.iter().any(|r| r == c));
            for add in &to_add {
                self.set_insert_unique(classes, *add);
            }
            if to_add.is_empty() {
                break;
            }
        }
    }
}

fn fxhash_seed(association: &Option<super::class::ClassAssociation>, event: Option<crate::dag::Event>) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    association.hash(&mut hasher);
    match event {
        Some(e) => (e as u8).hash(&mut hasher),
        None => 0xffu8.hash(&mut hasher),
    }
    hasher.finish()
}
