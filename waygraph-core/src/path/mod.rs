//! Path reconstruction from a shortest-path tree.
//!
//! A routing algorithm hands over its goal entry; walking the parent links
//! back to the tree root yields the edges of the route in reverse. From
//! those the path rebuilds the node sequence, the full point polyline
//! (pillar nodes included), per-edge distances and turn instructions.

use std::f64::consts::PI;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::flags::VehicleEncoder;
use crate::graph::{EdgeId, GraphStorage, NodeId};
use crate::util::{Indication, PointList, WayList};

/// One entry of a predecessor chain. The tree root carries no edge.
#[derive(Debug, Clone)]
pub struct EdgeEntry {
    pub edge: Option<EdgeId>,
    pub end_node: NodeId,
    pub parent: Option<Rc<EdgeEntry>>,
}

impl EdgeEntry {
    /// Root of a predecessor tree, placed on the source node.
    pub fn root(end_node: NodeId) -> Rc<Self> {
        Rc::new(Self {
            edge: None,
            end_node,
            parent: None,
        })
    }

    /// Entry for arriving at `end_node` via `edge`.
    pub fn chained(edge: EdgeId, end_node: NodeId, parent: Rc<EdgeEntry>) -> Rc<Self> {
        Rc::new(Self {
            edge: Some(edge),
            end_node,
            parent: Some(parent),
        })
    }
}

/// A reconstructed route. All `calc_*` results are cached after the first
/// call.
pub struct Path<'a> {
    graph: &'a GraphStorage,
    vehicle: &'a dyn VehicleEncoder,
    found: bool,
    from_node: Option<NodeId>,
    edge_ids: Vec<EdgeId>,
    distance_m: f64,
    time_s: i64,
    cached_points: Option<PointList>,
    cached_nodes: Option<Vec<NodeId>>,
    cached_ways: Option<WayList>,
    cached_distances: Option<Vec<f64>>,
}

impl<'a> Path<'a> {
    pub fn new(graph: &'a GraphStorage, vehicle: &'a dyn VehicleEncoder) -> Self {
        Self {
            graph,
            vehicle,
            found: false,
            from_node: None,
            edge_ids: Vec::new(),
            distance_m: 0.0,
            time_s: 0,
            cached_points: None,
            cached_nodes: None,
            cached_ways: None,
            cached_distances: None,
        }
    }

    /// Walk the predecessor chain from `goal` back to the tree root and
    /// take over its edges, source to goal.
    pub fn extract(mut self, goal: &EdgeEntry) -> Self {
        let mut current = goal;
        loop {
            match current.edge {
                Some(edge) => {
                    self.process_distance(edge, current.end_node);
                    current = current
                        .parent
                        .as_deref()
                        .expect("predecessor entry with an edge has no parent");
                }
                None => {
                    self.from_node = Some(current.end_node);
                    break;
                }
            }
        }
        self.edge_ids.reverse();
        self.found = true;
        self
    }

    fn process_distance(&mut self, edge: EdgeId, end_node: NodeId) {
        let view = self
            .graph
            .edge_props(edge, end_node)
            .unwrap_or_else(|| panic!("edge {edge} does not touch node {end_node}"));
        self.distance_m += view.dist_m;
        let speed = self.vehicle.speed(view.flags);
        if speed > 0.0 {
            // 3.6 converts m at km/h into whole seconds.
            self.time_s += (view.dist_m * 3.6 / speed) as i64;
        }
        self.edge_ids.push(edge);
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn from_node(&self) -> Option<NodeId> {
        self.from_node
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    /// Total route length in meters.
    pub fn distance(&self) -> f64 {
        self.distance_m
    }

    /// Total travel time in seconds.
    pub fn time_seconds(&self) -> i64 {
        self.time_s
    }

    /// Full polyline of the route: source node, pillar nodes, every tower
    /// node up to the goal.
    pub fn calc_points(&mut self) -> &PointList {
        if self.cached_points.is_none() {
            let points = self.build_points();
            self.cached_points = Some(points);
        }
        self.cached_points.as_ref().expect("points cached above")
    }

    /// Tower-node sequence of the route.
    pub fn calc_nodes(&mut self) -> &[NodeId] {
        if self.cached_nodes.is_none() {
            let nodes = self.build_nodes();
            self.cached_nodes = Some(nodes);
        }
        self.cached_nodes.as_ref().expect("nodes cached above")
    }

    /// Turn instructions with the street names they refer to.
    pub fn calc_ways(&mut self) -> &WayList {
        if self.cached_ways.is_none() {
            let ways = self.build_ways();
            self.cached_ways = Some(ways);
        }
        self.cached_ways.as_ref().expect("ways cached above")
    }

    /// Per-edge distances in travel order.
    pub fn calc_distances(&mut self) -> &[f64] {
        if self.cached_distances.is_none() {
            let distances = self.build_distances();
            self.cached_distances = Some(distances);
        }
        self.cached_distances
            .as_ref()
            .expect("distances cached above")
    }

    /// Tower nodes shared between two routes.
    pub fn calc_identical_nodes(&mut self, other: &mut Path<'_>) -> FxHashSet<NodeId> {
        let mine: FxHashSet<NodeId> = self.calc_nodes().iter().copied().collect();
        other
            .calc_nodes()
            .iter()
            .filter(|node| mine.contains(node))
            .copied()
            .collect()
    }

    fn build_points(&self) -> PointList {
        let mut points = PointList::with_capacity(self.edge_ids.len() + 1);
        if !self.found {
            return points;
        }
        let mut node = self.from_node.expect("extracted path has a source node");
        points.add(self.graph.latitude(node), self.graph.longitude(node));
        for &edge in &self.edge_ids {
            let view = self
                .graph
                .edge_props(edge, node)
                .unwrap_or_else(|| panic!("edge {edge} does not touch node {node}"));
            // The view arrives at `node`, so its pillar polyline runs
            // against the travel direction; flip it before appending.
            let mut pillars = self.graph.way_geometry(edge, view.base);
            pillars.reverse();
            for i in 0..pillars.size() {
                points.add(pillars.latitude(i), pillars.longitude(i));
            }
            node = view.base;
            points.add(self.graph.latitude(node), self.graph.longitude(node));
        }
        points
    }

    fn build_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.edge_ids.len() + 1);
        if !self.found {
            return nodes;
        }
        let mut node = self.from_node.expect("extracted path has a source node");
        nodes.push(node);
        for &edge in &self.edge_ids {
            let view = self
                .graph
                .edge_props(edge, node)
                .unwrap_or_else(|| panic!("edge {edge} does not touch node {node}"));
            node = view.base;
            nodes.push(node);
        }
        nodes
    }

    fn build_distances(&self) -> Vec<f64> {
        let mut distances = Vec::with_capacity(self.edge_ids.len());
        if !self.found {
            return distances;
        }
        let mut node = self.from_node.expect("extracted path has a source node");
        for &edge in &self.edge_ids {
            let view = self
                .graph
                .edge_props(edge, node)
                .unwrap_or_else(|| panic!("edge {edge} does not touch node {node}"));
            distances.push(view.dist_m);
            node = view.base;
        }
        distances
    }

    fn build_ways(&self) -> WayList {
        let mut ways = WayList::with_capacity(self.edge_ids.len());
        if !self.found {
            return ways;
        }
        let mut node = self.from_node.expect("extracted path has a source node");
        let mut prev_lat = self.graph.latitude(node);
        let mut prev_lon = self.graph.longitude(node);
        let mut prev_orientation = 0.0_f64;
        let mut current_name = String::new();

        for (i, &edge) in self.edge_ids.iter().enumerate() {
            let view = self
                .graph
                .edge_props(edge, node)
                .unwrap_or_else(|| panic!("edge {edge} does not touch node {node}"));
            node = view.base;
            let lat = self.graph.latitude(node);
            let lon = self.graph.longitude(node);
            let edge_name = self.graph.name(edge);

            if i == 0 {
                ways.add(Indication::ContinueOnStreet, edge_name.clone());
                current_name = edge_name;
            } else if edge_name != current_name {
                let mut orientation = (lat - prev_lat).atan2(lon - prev_lon);
                if orientation < 0.0 {
                    orientation += 2.0 * PI;
                }
                // Compare against the previous heading across the +-pi wrap.
                let unwrapped = if prev_orientation >= 0.0 {
                    if orientation < prev_orientation - PI {
                        orientation + 2.0 * PI
                    } else {
                        orientation
                    }
                } else if orientation > prev_orientation + PI {
                    orientation - 2.0 * PI
                } else {
                    orientation
                };
                let indication = if unwrapped > prev_orientation {
                    Indication::TurnLeft
                } else if unwrapped < prev_orientation {
                    Indication::TurnRight
                } else {
                    Indication::ContinueOnStreet
                };
                // The turn is announced with the street being left.
                ways.add(indication, current_name.clone());
                current_name = edge_name;
                prev_orientation = orientation;
            } else {
                // A continuing street re-bases the reference heading.
                prev_orientation = 0.0;
            }
            prev_lat = lat;
            prev_lon = lon;
        }
        ways
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::CarEncoder;
    use crate::graph::GraphStorage;
    use crate::store::{AccessMode, Directory, Storable};
    use tempfile::TempDir;

    fn storage(tmp: &TempDir) -> GraphStorage {
        let dir = Directory::new(tmp.path().join("graph"), AccessMode::Ram).unwrap();
        let mut g = GraphStorage::with_defaults(dir);
        g.create_new(16).unwrap();
        g
    }

    /// Chain of edges, each entry arriving at the next node.
    fn chain(entries: &[(EdgeId, NodeId)], source: NodeId) -> Rc<EdgeEntry> {
        let mut current = EdgeEntry::root(source);
        for &(edge, end_node) in entries {
            current = EdgeEntry::chained(edge, end_node, current);
        }
        current
    }

    #[test]
    fn extract_accumulates_distance_and_time() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 0.01).unwrap();
        g.set_node(2, 0.0, 0.02).unwrap();
        let flags = CarEncoder::flags(50, true);
        let e0 = g.edge(0, 1, 1000.0, flags, 0).unwrap();
        let e1 = g.edge(1, 2, 500.0, flags, 0).unwrap();

        let goal = chain(&[(e0, 1), (e1, 2)], 0);
        let enc = CarEncoder;
        let path = Path::new(&g, &enc).extract(&goal);

        assert!(path.found());
        assert_eq!(path.from_node(), Some(0));
        assert_eq!(path.edge_ids(), &[e0, e1]);
        assert_eq!(path.distance(), 1500.0);
        // 1000 m at 50 km/h = 72 s, 500 m = 36 s.
        assert_eq!(path.time_seconds(), 72 + 36);
    }

    #[test]
    fn nodes_bracket_every_edge() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        for n in 0..4u32 {
            g.set_node(n, 0.0, n as f64).unwrap();
        }
        let mut edges = Vec::new();
        for n in 0..3u32 {
            edges.push((g.edge_bidir(n, n + 1, 10.0, true, 0).unwrap(), n + 1));
        }

        let goal = chain(&edges, 0);
        let enc = CarEncoder;
        let mut path = Path::new(&g, &enc).extract(&goal);

        let nodes = path.calc_nodes().to_vec();
        assert_eq!(nodes.len(), path.edge_ids().len() + 1);
        assert_eq!(nodes, vec![0, 1, 2, 3]);
        for (i, &edge) in path.edge_ids().iter().enumerate() {
            let view = g.edge_props(edge, nodes[i + 1]).unwrap();
            assert_eq!(view.adj, nodes[i + 1]);
            assert_eq!(view.base, nodes[i]);
        }
        assert_eq!(path.calc_distances(), &[10.0, 10.0, 10.0]);
    }

    #[test]
    fn points_follow_travel_direction_including_pillars() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 3.0).unwrap();
        let edge = g.edge_bidir(0, 1, 300.0, true, 0).unwrap();
        let mut pillars = PointList::new();
        pillars.add(0.0, 1.0);
        pillars.add(0.0, 2.0);
        g.set_way_geometry(edge, 0, &pillars).unwrap();

        let enc = CarEncoder;

        // Travelling 0 -> 1.
        let goal = chain(&[(edge, 1)], 0);
        let mut path = Path::new(&g, &enc).extract(&goal);
        let points = path.calc_points();
        let lons: Vec<f64> = (0..points.size()).map(|i| points.longitude(i)).collect();
        assert_eq!(lons, vec![0.0, 1.0, 2.0, 3.0]);

        // Travelling 1 -> 0 yields the mirror image.
        let goal = chain(&[(edge, 0)], 1);
        let mut path = Path::new(&g, &enc).extract(&goal);
        let points = path.calc_points();
        let lons: Vec<f64> = (0..points.size()).map(|i| points.longitude(i)).collect();
        assert_eq!(lons, vec![3.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn left_turn_is_announced_with_the_incoming_street() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 1.0).unwrap();
        g.set_node(2, 1.0, 1.0).unwrap();
        let first = g.add_name("First Street").unwrap();
        let second = g.add_name("Second Street").unwrap();
        let e0 = g.edge_bidir(0, 1, 111_000.0, true, first).unwrap();
        let e1 = g.edge_bidir(1, 2, 111_000.0, true, second).unwrap();

        let goal = chain(&[(e0, 1), (e1, 2)], 0);
        let enc = CarEncoder;
        let mut path = Path::new(&g, &enc).extract(&goal);
        let ways = path.calc_ways();

        assert_eq!(ways.size(), 2);
        assert_eq!(ways.indication(0), Indication::ContinueOnStreet);
        assert_eq!(ways.name(0), "First Street");
        assert_eq!(ways.indication(1), Indication::TurnLeft);
        assert_eq!(ways.name(1), "First Street");
    }

    #[test]
    fn right_turn_after_a_left_bend() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 1.0).unwrap();
        g.set_node(2, 1.0, 1.0).unwrap();
        g.set_node(3, 1.0, 2.0).unwrap();
        let a = g.add_name("Alder Road").unwrap();
        let b = g.add_name("Birch Road").unwrap();
        let c = g.add_name("Cedar Road").unwrap();
        let e0 = g.edge_bidir(0, 1, 111_000.0, true, a).unwrap();
        let e1 = g.edge_bidir(1, 2, 111_000.0, true, b).unwrap();
        let e2 = g.edge_bidir(2, 3, 111_000.0, true, c).unwrap();

        let goal = chain(&[(e0, 1), (e1, 2), (e2, 3)], 0);
        let enc = CarEncoder;
        let mut path = Path::new(&g, &enc).extract(&goal);
        let ways = path.calc_ways();

        assert_eq!(ways.size(), 3);
        assert_eq!(ways.indication(1), Indication::TurnLeft);
        assert_eq!(ways.name(1), "Alder Road");
        assert_eq!(ways.indication(2), Indication::TurnRight);
        assert_eq!(ways.name(2), "Birch Road");
    }

    #[test]
    fn unchanged_street_emits_no_instruction() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        g.set_node(1, 0.0, 1.0).unwrap();
        g.set_node(2, 1.0, 1.0).unwrap();
        let name = g.add_name("Long Street").unwrap();
        let e0 = g.edge_bidir(0, 1, 111_000.0, true, name).unwrap();
        let e1 = g.edge_bidir(1, 2, 111_000.0, true, name).unwrap();

        let goal = chain(&[(e0, 1), (e1, 2)], 0);
        let enc = CarEncoder;
        let mut path = Path::new(&g, &enc).extract(&goal);
        let ways = path.calc_ways();

        assert_eq!(ways.size(), 1);
        assert_eq!(ways.indication(0), Indication::ContinueOnStreet);
        assert_eq!(ways.name(0), "Long Street");
    }

    #[test]
    fn unextracted_path_yields_empty_results() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 0.0, 0.0).unwrap();
        let enc = CarEncoder;
        let mut path = Path::new(&g, &enc);

        assert!(!path.found());
        assert_eq!(path.distance(), 0.0);
        assert!(path.calc_points().is_empty());
        assert!(path.calc_nodes().is_empty());
        assert!(path.calc_ways().is_empty());
        assert!(path.calc_distances().is_empty());
    }

    #[test]
    fn zero_length_chain_is_a_found_path_on_one_node() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        g.set_node(0, 1.0, 2.0).unwrap();
        let enc = CarEncoder;
        let goal = EdgeEntry::root(0);
        let mut path = Path::new(&g, &enc).extract(&goal);

        assert!(path.found());
        assert_eq!(path.edge_ids().len(), 0);
        assert_eq!(path.calc_nodes(), &[0]);
        assert_eq!(path.calc_points().size(), 1);
        assert_eq!(path.calc_points().latitude(0), 1.0);
    }

    #[test]
    fn identical_nodes_intersects_two_routes() {
        let tmp = TempDir::new().unwrap();
        let mut g = storage(&tmp);
        for n in 0..5u32 {
            g.set_node(n, 0.0, n as f64).unwrap();
        }
        let e01 = g.edge_bidir(0, 1, 10.0, true, 0).unwrap();
        let e12 = g.edge_bidir(1, 2, 10.0, true, 0).unwrap();
        let e13 = g.edge_bidir(1, 3, 10.0, true, 0).unwrap();
        let e34 = g.edge_bidir(3, 4, 10.0, true, 0).unwrap();

        let enc = CarEncoder;
        let mut one = Path::new(&g, &enc).extract(&chain(&[(e01, 1), (e12, 2)], 0));
        let mut two = Path::new(&g, &enc).extract(&chain(&[(e01, 1), (e13, 3), (e34, 4)], 0));

        let shared = one.calc_identical_nodes(&mut two);
        assert!(shared.contains(&0));
        assert!(shared.contains(&1));
        assert!(!shared.contains(&2));
        assert!(!shared.contains(&4));
    }
}
