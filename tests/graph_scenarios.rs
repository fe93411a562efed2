mod common;

use common::{assert_graph_sound, chain_edges, ram_graph, sorted_distances};
use vereda::{CandidateEdge, EdgeRef, FilterFn, FlagsCodec, GraphError, VehicleFlagsCodec};

#[test]
fn triangle_build() {
    let mut graph = ram_graph();
    graph.set_node(0, 0.0, 0.0).expect("node 0");
    graph.set_node(1, 0.0, 1.0).expect("node 1");
    graph.set_node(2, 1.0, 0.0).expect("node 2");
    graph.add_edge_with_defaults(0, 1, 1000.0, true).expect("edge 0-1");
    graph.add_edge_with_defaults(1, 2, 1414.0, true).expect("edge 1-2");
    graph.add_edge_with_defaults(0, 2, 1000.0, true).expect("edge 0-2");

    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);
    assert_eq!(sorted_distances(&graph, 0), vec![1000.0, 1000.0]);
    assert_eq!(sorted_distances(&graph, 1), vec![1000.0, 1414.0]);
    assert_eq!(sorted_distances(&graph, 2), vec![1000.0, 1414.0]);
    assert_graph_sound(&graph);
}

#[test]
fn self_loop_is_iterated_once() {
    let mut graph = ram_graph();
    graph.set_node(0, 1.0, 1.0).expect("node 0");
    graph.add_edge_with_defaults(0, 0, 500.0, true).expect("loop edge");

    let chain = chain_edges(&graph, 0);
    assert_eq!(chain.len(), 1);

    let mut explorer = graph.explorer();
    explorer.set_base_node(0).expect("base");
    assert!(explorer.next().expect("advance"));
    assert_eq!(explorer.base_node(), 0);
    assert_eq!(explorer.adj_node(), 0);
    assert_eq!(explorer.distance(), 500.0);
    assert!(!explorer.next().expect("end of chain"));
    assert_graph_sound(&graph);
}

#[test]
fn orientation_round_trip() {
    let codec = VehicleFlagsCodec::car();
    let forward = codec.default_flags(false);

    let mut graph = ram_graph();
    let edge = graph.add_edge(5, 3, 100.0, forward).expect("edge 5-3");

    let mut explorer = graph.explorer();
    explorer.set_base_node(5).expect("base 5");
    assert!(explorer.next().expect("advance"));
    assert_eq!(explorer.adj_node(), 3);
    assert_eq!(explorer.flags(), forward);

    explorer.set_base_node(3).expect("base 3");
    assert!(explorer.next().expect("advance"));
    assert_eq!(explorer.adj_node(), 5);
    assert_eq!(explorer.flags(), codec.swap_direction(forward));

    // storing the observed flags back must not change a single bit
    let stored_before = {
        let mut iter = graph.all_edges();
        assert!(iter.next());
        iter.flags()
    };
    let seen_from_3 = codec.swap_direction(forward);
    let at = EdgeRef {
        edge: edge.edge,
        base: 3,
        adj: 5,
    };
    graph.set_edge_flags(&at, seen_from_3).expect("set flags");
    let stored_after = {
        let mut iter = graph.all_edges();
        assert!(iter.next());
        iter.flags()
    };
    assert_eq!(stored_before, stored_after);
    assert_graph_sound(&graph);
}

#[test]
fn single_edge_probe_matches_caller_orientation() {
    let codec = VehicleFlagsCodec::car();
    let forward = codec.default_flags(false);

    let mut graph = ram_graph();
    let edge = graph.add_edge(5, 3, 100.0, forward).expect("edge 5-3");

    let from_3 = graph
        .edge_props(edge.edge, 3)
        .expect("probe")
        .expect("adjacent matches");
    assert_eq!(from_3.base_node(), 5);
    assert_eq!(from_3.adj_node(), 3);
    assert_eq!(from_3.flags(), forward);

    let from_5 = graph
        .edge_props(edge.edge, 5)
        .expect("probe")
        .expect("adjacent matches");
    assert_eq!(from_5.base_node(), 3);
    assert_eq!(from_5.adj_node(), 5);
    assert_eq!(from_5.flags(), codec.swap_direction(forward));

    assert!(graph.edge_props(edge.edge, 4).expect("probe").is_none());
}

#[test]
fn parallel_edges_are_kept_apart() {
    let mut graph = ram_graph();
    graph.add_edge_with_defaults(0, 1, 100.0, true).expect("first");
    graph.add_edge_with_defaults(0, 1, 200.0, true).expect("second");

    assert_eq!(graph.edge_count(), 2);
    assert_eq!(sorted_distances(&graph, 0), vec![100.0, 200.0]);
    assert_eq!(sorted_distances(&graph, 1), vec![100.0, 200.0]);
    assert_graph_sound(&graph);
}

#[test]
fn street_names_intern_through_the_dictionary() {
    let mut graph = ram_graph();
    let first = graph.add_edge_with_defaults(0, 1, 100.0, true).expect("edge");
    let second = graph.add_edge_with_defaults(1, 2, 100.0, true).expect("edge");

    graph.set_edge_name(first.edge, "Hauptstraße").expect("name");
    graph.set_edge_name(second.edge, "").expect("empty name");

    assert_eq!(graph.edge_name(first.edge).expect("get"), "Hauptstraße");
    assert_eq!(graph.edge_name(second.edge).expect("get"), "");

    let mut explorer = graph.explorer();
    explorer.set_base_node(0).expect("base");
    assert!(explorer.next().expect("advance"));
    assert_eq!(explorer.name().expect("name"), "Hauptstraße");
}

#[test]
fn distance_updates_are_visible_to_cursors() {
    let mut graph = ram_graph();
    let edge = graph.add_edge_with_defaults(0, 1, 100.0, true).expect("edge");
    graph.set_edge_distance(edge.edge, 250.5).expect("update");
    assert_eq!(sorted_distances(&graph, 0), vec![250.5]);
}

#[test]
fn explorer_filter_skips_rejected_edges() {
    let mut graph = ram_graph();
    graph.add_edge_with_defaults(0, 1, 100.0, true).expect("short");
    graph.add_edge_with_defaults(0, 2, 900.0, true).expect("long");

    let mut explorer =
        graph.explorer_with(FilterFn(|edge: &CandidateEdge| edge.distance > 500.0));
    explorer.set_base_node(0).expect("base");
    assert!(explorer.next().expect("advance"));
    assert_eq!(explorer.adj_node(), 2);
    assert!(!explorer.next().expect("end"));
}

#[test]
fn detach_requires_an_advanced_cursor() {
    let mut graph = ram_graph();
    graph.add_edge_with_defaults(0, 1, 100.0, true).expect("edge");

    let explorer = graph.explorer();
    assert!(matches!(explorer.detach(), Err(GraphError::DetachBeforeAdvance)));

    let all = graph.all_edges();
    assert!(matches!(all.detach(), Err(GraphError::DetachBeforeAdvance)));

    let mut explorer = graph.explorer();
    explorer.set_base_node(0).expect("base");
    assert!(matches!(explorer.detach(), Err(GraphError::DetachBeforeAdvance)));
    assert!(explorer.next().expect("advance"));
    let at = explorer.detach().expect("detached");
    assert_eq!((at.base, at.adj), (0, 1));
}

#[test]
fn node_coordinates_round_trip_through_quantization() {
    let mut graph = ram_graph();
    graph.set_node(0, 52.312_412_3, 13.412_398_7).expect("node");
    assert!((graph.latitude(0) - 52.312_412_3).abs() < 1e-6);
    assert!((graph.longitude(0) - 13.412_398_7).abs() < 1e-6);
}
