mod common;

use common::ram_graph;
use vereda::{EdgeRef, GeoPoint, GeometryMode};

fn lon(points: &[GeoPoint]) -> Vec<f64> {
    points.iter().map(|p| p.lon).collect()
}

/// Node 0 at (0,0), node 1 at (0,2), three pillars between them.
fn graph_with_pillars() -> (vereda::GraphStore, EdgeRef) {
    let mut graph = ram_graph();
    graph.set_node(0, 0.0, 0.0).expect("node 0");
    graph.set_node(1, 0.0, 2.0).expect("node 1");
    let edge = graph.add_edge_with_defaults(0, 1, 2000.0, true).expect("edge");
    graph
        .set_way_geometry(
            &edge,
            &[
                GeoPoint::new(0.0, 0.5),
                GeoPoint::new(0.0, 1.0),
                GeoPoint::new(0.0, 1.5),
            ],
        )
        .expect("geometry");
    (graph, edge)
}

#[test]
fn full_fetch_reads_base_to_adj_from_either_side() {
    let (graph, edge) = graph_with_pillars();

    let from_0 = graph.way_geometry(&edge, GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&from_0), vec![0.0, 0.5, 1.0, 1.5, 2.0]);

    let reversed = EdgeRef {
        edge: edge.edge,
        base: 1,
        adj: 0,
    };
    let from_1 = graph.way_geometry(&reversed, GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&from_1), vec![2.0, 1.5, 1.0, 0.5, 0.0]);
    assert!(from_1.iter().all(|p| p.lat == 0.0));
}

#[test]
fn endpoint_inclusion_mirrors_under_reversal() {
    let (graph, edge) = graph_with_pillars();
    let reversed = EdgeRef {
        edge: edge.edge,
        base: 1,
        adj: 0,
    };

    let pillars = graph
        .way_geometry(&reversed, GeometryMode::PillarsOnly)
        .expect("fetch");
    assert_eq!(lon(&pillars), vec![1.5, 1.0, 0.5]);

    let with_base = graph
        .way_geometry(&reversed, GeometryMode::WithBase)
        .expect("fetch");
    assert_eq!(lon(&with_base), vec![2.0, 1.5, 1.0, 0.5]);

    let with_adj = graph
        .way_geometry(&reversed, GeometryMode::WithAdj)
        .expect("fetch");
    assert_eq!(lon(&with_adj), vec![1.5, 1.0, 0.5, 0.0]);
}

#[test]
fn geometry_set_from_the_reversed_side_reads_back_consistently() {
    let mut graph = ram_graph();
    graph.set_node(0, 0.0, 0.0).expect("node 0");
    graph.set_node(1, 0.0, 2.0).expect("node 1");
    let edge = graph.add_edge_with_defaults(0, 1, 2000.0, true).expect("edge");

    // pillar list as seen walking from node 1 toward node 0
    let from_1 = EdgeRef {
        edge: edge.edge,
        base: 1,
        adj: 0,
    };
    graph
        .set_way_geometry(
            &from_1,
            &[
                GeoPoint::new(0.0, 1.5),
                GeoPoint::new(0.0, 1.0),
                GeoPoint::new(0.0, 0.5),
            ],
        )
        .expect("geometry");

    let from_0 = graph.way_geometry(&edge, GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&from_0), vec![0.0, 0.5, 1.0, 1.5, 2.0]);
}

#[test]
fn missing_geometry_yields_endpoints_only() {
    let mut graph = ram_graph();
    graph.set_node(0, 0.0, 0.0).expect("node 0");
    graph.set_node(1, 0.0, 2.0).expect("node 1");
    let edge = graph.add_edge_with_defaults(0, 1, 2000.0, true).expect("edge");

    let pillars = graph
        .way_geometry(&edge, GeometryMode::PillarsOnly)
        .expect("fetch");
    assert!(pillars.is_empty());

    let full = graph.way_geometry(&edge, GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&full), vec![0.0, 2.0]);
}

#[test]
fn overwriting_geometry_replaces_the_polyline() {
    let (mut graph, edge) = graph_with_pillars();

    graph
        .set_way_geometry(&edge, &[GeoPoint::new(0.0, 1.0)])
        .expect("overwrite");
    let full = graph.way_geometry(&edge, GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&full), vec![0.0, 1.0, 2.0]);

    graph.set_way_geometry(&edge, &[]).expect("clear");
    let pillars = graph
        .way_geometry(&edge, GeometryMode::PillarsOnly)
        .expect("fetch");
    assert!(pillars.is_empty());
}

#[test]
fn explorer_fetches_geometry_oriented_to_its_base() {
    let (graph, _) = graph_with_pillars();

    let mut explorer = graph.explorer();
    explorer.set_base_node(1).expect("base 1");
    assert!(explorer.next().expect("advance"));
    let points = explorer.way_geometry(GeometryMode::Full).expect("fetch");
    assert_eq!(lon(&points), vec![2.0, 1.5, 1.0, 0.5, 0.0]);
}
