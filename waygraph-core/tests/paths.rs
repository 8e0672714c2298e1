//! End-to-end route reconstruction against a flushed-and-reloaded graph.

use tempfile::TempDir;

use waygraph_core::{
    AccessMode, CarEncoder, Directory, DistanceCalc, EdgeEntry, GraphStorage, Haversine,
    Indication, Path, PointList, Storable,
};

/// A small L-shaped network:
///
/// ```text
/// 0 --(Harbor Road, pillar bend)-- 1 --(Harbor Road)-- 2
///                                                      |
///                                               (Mill Lane)
///                                                      |
///                                                      3
/// ```
fn build(tmp: &TempDir) -> (GraphStorage, Vec<u32>) {
    let dir = Directory::new(tmp.path().join("net"), AccessMode::Ram).unwrap();
    let mut g = GraphStorage::with_defaults(dir);
    g.create_new(8).unwrap();

    let coords = [(50.0, 8.0), (50.0, 8.01), (50.0, 8.02), (50.01, 8.02)];
    for (node, &(lat, lon)) in coords.iter().enumerate() {
        g.set_node(node as u32, lat, lon).unwrap();
    }

    let harbor = g.add_name("Harbor Road").unwrap();
    let mill = g.add_name("Mill Lane").unwrap();

    let calc = Haversine;
    let specs = [((0u32, 1u32), harbor), ((1, 2), harbor), ((2, 3), mill)];
    let mut edges = Vec::new();
    for &((a, b), name) in &specs {
        let dist = calc.calc_dist(
            g.latitude(a),
            g.longitude(a),
            g.latitude(b),
            g.longitude(b),
        );
        edges.push(
            g.edge(a, b, dist, CarEncoder::flags(50, true), name)
                .unwrap(),
        );
    }

    // A gentle bend between 0 and 1.
    let mut pillars = PointList::new();
    pillars.add(50.001, 8.005);
    g.set_way_geometry(edges[0], 0, &pillars).unwrap();

    (g, edges)
}

#[test]
fn a_route_survives_flush_and_reload() {
    let tmp = TempDir::new().unwrap();
    let (mut g, edges) = build(&tmp);
    g.flush().unwrap();
    g.close();

    let dir = Directory::new(tmp.path().join("net"), AccessMode::Ram).unwrap();
    let mut g = GraphStorage::with_defaults(dir);
    assert!(g.load_existing().unwrap());

    // Route 0 -> 1 -> 2 -> 3, as a routing algorithm would hand it over.
    let root = EdgeEntry::root(0);
    let hop1 = EdgeEntry::chained(edges[0], 1, root);
    let hop2 = EdgeEntry::chained(edges[1], 2, hop1);
    let goal = EdgeEntry::chained(edges[2], 3, hop2);

    let enc = CarEncoder;
    let mut path = Path::new(&g, &enc).extract(&goal);
    assert!(path.found());
    assert_eq!(path.edge_ids(), &edges[..]);
    assert_eq!(path.calc_nodes(), &[0, 1, 2, 3]);

    // Distance matches the haversine lengths the edges were built with,
    // within the millimetre quantization.
    let calc = Haversine;
    let expected: f64 = [(0u32, 1u32), (1, 2), (2, 3)]
        .iter()
        .map(|&(a, b)| {
            calc.calc_dist(g.latitude(a), g.longitude(a), g.latitude(b), g.longitude(b))
        })
        .sum();
    assert!((path.distance() - expected).abs() < 0.01, "{}", path.distance());

    // 50 km/h over the whole route.
    let expected_time = [(0u32, 1u32), (1, 2), (2, 3)]
        .iter()
        .map(|&(a, b)| {
            let d = calc.calc_dist(g.latitude(a), g.longitude(a), g.latitude(b), g.longitude(b));
            (d * 3.6 / 50.0) as i64
        })
        .sum::<i64>();
    assert!((path.time_seconds() - expected_time).abs() <= 1);

    // The polyline includes the pillar bend right after the source.
    let points = path.calc_points();
    assert_eq!(points.size(), 5);
    assert_eq!(points.latitude(0), 50.0);
    assert_eq!(points.longitude(1), 8.005);
    assert_eq!(points.longitude(4), 8.02);

    // One instruction per street, the turn named after the street it leaves.
    let ways = path.calc_ways();
    assert_eq!(ways.size(), 2);
    assert_eq!(ways.indication(0), Indication::ContinueOnStreet);
    assert_eq!(ways.name(0), "Harbor Road");
    assert_eq!(ways.indication(1), Indication::TurnLeft);
    assert_eq!(ways.name(1), "Harbor Road");

    let distances = path.calc_distances().to_vec();
    assert_eq!(distances.len(), 3);
    assert!((distances.iter().sum::<f64>() - path.distance()).abs() < 1e-9);
}

#[test]
fn the_reverse_route_mirrors_the_polyline() {
    let tmp = TempDir::new().unwrap();
    let (g, edges) = build(&tmp);

    // Route 3 -> 2 -> 1 -> 0.
    let root = EdgeEntry::root(3);
    let hop1 = EdgeEntry::chained(edges[2], 2, root);
    let hop2 = EdgeEntry::chained(edges[1], 1, hop1);
    let goal = EdgeEntry::chained(edges[0], 0, hop2);

    let enc = CarEncoder;
    let mut path = Path::new(&g, &enc).extract(&goal);
    assert_eq!(path.calc_nodes(), &[3, 2, 1, 0]);

    let points = path.calc_points();
    assert_eq!(points.size(), 5);
    assert_eq!(points.latitude(0), 50.01);
    // The pillar bend now shows up just before the goal node.
    assert_eq!(points.longitude(3), 8.005);
    assert_eq!(points.longitude(4), 8.0);
}
