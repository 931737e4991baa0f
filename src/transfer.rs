//! Transfer-set computation: for a host node, the set of hosts a
//! host-switch from it may land on — every leaf reachable by walking the
//! sibling spine outward from `host`, optionally bounded by a distance
//! threshold (counted in tree hops).

use rustc_hash::FxHashMap;

use crate::tree::{NodeId, Tree};

pub struct TransferSets {
    distance_threshold: Option<u32>,
    cache: FxHashMap<NodeId, Vec<NodeId>>,
}

impl TransferSets {
    pub fn new(distance_threshold: Option<u32>) -> Self {
        Self {
            distance_threshold,
            cache: FxHashMap::default(),
        }
    }

    pub fn for_host(&mut self, host_tree: &Tree, host: NodeId) -> Vec<NodeId> {
        if let Some(cached) = self.cache.get(&host) {
            return cached.clone();
        }
        let result = match self.distance_threshold {
            Some(limit) => bounded_walk(host_tree, host, limit),
            None => unbounded_walk(host_tree, host),
        };
        self.cache.insert(host, result.clone());
        result
    }
}

/// Walks down to the leftmost leaf under `start`.
fn leftmost_leaf(tree: &Tree, mut node: NodeId) -> NodeId {
    while let Some((left, _)) = tree.children(node) {
        node = left;
    }
    node
}

fn unbounded_walk(tree: &Tree, host: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut target = match tree.sibling(host) {
        Some(s) => s,
        None => return result, // host is the root, no sibling spine
    };
    loop {
        let mut previous: Option<NodeId> = None;
        let mut next = target;
        loop {
            // `is_destination` is false exactly when this step is a climb
            // back up to a parent — a waypoint for finding the next leaf,
            // not itself a leaf the sibling spine should expose.
            let is_destination;
            next = match previous {
                None => {
                    is_destination = true;
                    leftmost_leaf(tree, target)
                }
                Some(prev) => {
                    let parent = tree.parent(prev).expect("spine walk never reaches the root here");
                    let (left, right) = tree.children(parent).expect("parent of a leaf is internal");
                    if prev == left {
                        is_destination = true;
                        leftmost_leaf(tree, right)
                    } else {
                        is_destination = false;
                        parent
                    }
                }
            };
            if is_destination {
                result.push(next);
            }
            if next == target {
                break;
            }
            previous = Some(next);
        }

        let parent = tree.parent(target).expect("checked not-root below");
        if tree.is_root(parent) {
            break;
        }
        target = tree.sibling(parent).expect("parent is not the root, so it has a sibling");
    }
    result
}

fn bounded_walk(tree: &Tree, host: NodeId, limit: u32) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut target = match tree.sibling(host) {
        Some(s) => s,
        None => return result,
    };
    let mut distance = 2u32;

    loop {
        let mut previous: Option<NodeId> = None;
        let mut next = target;
        loop {
            // Same distinction as `unbounded_walk`: the `else` climb-to-parent
            // arm is a waypoint, never a destination, regardless of distance.
            let is_destination;
            next = match previous {
                None => {
                    is_destination = true;
                    let mut cur = target;
                    while tree.children(cur).is_some() && distance < limit {
                        cur = tree.children(cur).unwrap().0;
                        distance += 1;
                    }
                    cur
                }
                Some(prev) => {
                    let parent = tree.parent(prev).expect("spine walk never reaches the root here");
                    distance -= 1;
                    let (left, _) = tree.children(parent).expect("parent of a leaf is internal");
                    if prev == left && distance <= limit {
                        is_destination = true;
                        let mut cur = tree.children(parent).unwrap().1;
                        distance += 1;
                        while tree.children(cur).is_some() && distance < limit {
                            cur = tree.children(cur).unwrap().0;
                            distance += 1;
                        }
                        cur
                    } else {
                        is_destination = false;
                        parent
                    }
                }
            };
            if is_destination {
                result.push(next);
            }
            if next == target {
                break;
            }
            previous = Some(next);
        }

        let parent = tree.parent(target).expect("checked not-root below");
        if tree.is_root(parent) {
            break;
        }
        target = tree.sibling(parent).expect("parent is not the root, so it has a sibling");
        distance += 1;
    }
    result
}
