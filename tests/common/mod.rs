#![allow(dead_code)]

use std::collections::HashSet;

use vereda::{GraphStore, GraphStoreBuilder, NO_NODE, VehicleFlagsCodec};

pub fn ram_graph() -> GraphStore {
    GraphStoreBuilder::new()
        .codec(Box::new(VehicleFlagsCodec::car()))
        .create(1 << 16)
        .expect("create in-memory graph")
}

/// Collects the edge ids on `node`'s adjacency chain, asserting no
/// tombstone is reachable.
pub fn chain_edges(graph: &GraphStore, node: i32) -> Vec<i32> {
    let mut explorer = graph.explorer();
    explorer.set_base_node(node).expect("node in bounds");
    let mut edges = Vec::new();
    while explorer.next().expect("chain walk") {
        assert_ne!(
            explorer.adj_node(),
            NO_NODE,
            "tombstone reachable from node {node}"
        );
        edges.push(explorer.edge());
    }
    edges
}

/// Checks the structural invariants: canonical orientation, adjacency
/// symmetry (each live edge exactly once per endpoint chain, once total
/// for self-loops), and that chains only hold live edges.
pub fn assert_graph_sound(graph: &GraphStore) {
    let chains: Vec<Vec<i32>> = (0..graph.node_count())
        .map(|node| chain_edges(graph, node))
        .collect();

    let mut live = HashSet::new();
    let mut iter = graph.all_edges();
    while iter.next() {
        let (edge, base, adj) = (iter.edge(), iter.base_node(), iter.adj_node());
        assert!(base <= adj, "edge {edge} stored as {base}-{adj}");
        assert!(
            base >= 0 && adj < graph.node_count(),
            "edge {edge} endpoints {base}-{adj} out of range"
        );
        live.insert(edge);
        let from_base = chains[base as usize].iter().filter(|&&e| e == edge).count();
        assert_eq!(from_base, 1, "edge {edge} seen {from_base} times from {base}");
        if base != adj {
            let from_adj = chains[adj as usize].iter().filter(|&&e| e == edge).count();
            assert_eq!(from_adj, 1, "edge {edge} seen {from_adj} times from {adj}");
        }
    }

    for (node, chain) in chains.iter().enumerate() {
        for edge in chain {
            assert!(
                live.contains(edge),
                "chain of node {node} holds dead edge {edge}"
            );
        }
    }
}

/// Distances of all filter-accepted edges at `node`, sorted.
pub fn sorted_distances(graph: &GraphStore, node: i32) -> Vec<f64> {
    let mut explorer = graph.explorer();
    explorer.set_base_node(node).expect("node in bounds");
    let mut distances = Vec::new();
    while explorer.next().expect("chain walk") {
        distances.push(explorer.distance());
    }
    distances.sort_by(f64::total_cmp);
    distances
}
