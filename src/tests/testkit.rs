use std::sync::Once;

use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::tree::{NodeId, Tree, TreeBuilder};

fn init_test_logger_internal() {
    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_bracketed_fields(true)
        .with_deferred_spans(false)
        .with_wraparound(25)
        .with_indent_lines(true)
        .with_timer(tracing_tree::time::Uptime::default())
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_targets(false);

    tracing_subscriber::registry()
        .with(tree_layer)
        .with(EnvFilter::from_default_env())
        .init();
}

lazy_static! {
    static ref TRACING_INIT: Once = Once::new();
}

#[allow(dead_code)]
pub fn init_logger() {
    TRACING_INIT.call_once(|| {
        init_test_logger_internal();
    });
}

/// Two leaves on each side, identical topology, one leaf-to-leaf map — the
/// only optimal reconciliation is a single cospeciation.
pub fn two_leaf_pair() -> (Tree, Tree, FxHashMap<NodeId, NodeId>) {
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

/// Four parasite leaves over four host leaves, both trees shaped as two
/// cherries under a root, but the leaf map only ever lands in the `hA`
/// cherry — `pB`'s subtree has no cospeciation available anywhere and must
/// duplicate, host-switch, or pay losses to reach a host, unlike
/// [`two_leaf_pair`]'s single forced path.
pub fn four_leaf_asymmetric() -> (Tree, Tree, FxHashMap<NodeId, NodeId>) {
    let mut pb = TreeBuilder::new();
    let p0 = pb.leaf("p0");
    let p1 = pb.leaf("p1");
    let pa = pb.internal("pA", p0, p1);
    let p2 = pb.leaf("p2");
    let p3 = pb.leaf("p3");
    let pbb = pb.internal("pB", p2, p3);
    let proot = pb.internal("proot", pa, pbb);
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

    let mut leaf_map = FxHashMap::default();
    leaf_map.insert(p0, h0);
    leaf_map.insert(p1, h1);
    leaf_map.insert(p2, h0);
    leaf_map.insert(p3, h1);
    (parasite, host, leaf_map)
}
