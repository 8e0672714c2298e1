//! The persistable graph: four named areas behind one directory.
//!
//! Nodes, edges, way geometry and street names each live in their own
//! store. Node and edge records are fixed-width runs of i32 words addressed
//! as `id * entry_size`; adjacency is an intrusive linked list threaded
//! through the shared edge records via the two link slots.
//!
//! Record layouts:
//!
//! ```text
//! node: [edge_ref, lat, lon]
//! edge: [node_a, node_b, link_a, link_b, dist, flags, name_ref, geo_ref]
//! ```
//!
//! Every stored edge satisfies `node_a <= node_b`; flags and polylines are
//! kept in that canonical direction and swapped on access from the other
//! end.

use std::collections::BTreeMap;

use bit_vec::BitVec;
use rustc_hash::FxHashSet;
use tracing::debug;

use waygraph_common::{Error, Result};

use crate::bitutil::{degree_to_int, dist_to_int, identity_hash, int_to_degree, int_to_dist, BBox};
use crate::flags::{CarEncoder, CombinedEncoder};
use crate::names::NameIndex;
use crate::store::{DataAccess, Directory, Storable};
use crate::util::PointList;

use super::{
    AcceptAll, AdjacentEdges, AllEdges, EdgeFilter, EdgeId, EdgeView, NodeId, MAX_CHAIN_HOPS,
    NO_EDGE,
};

const NODE_ENTRY_SIZE: usize = 3;
const N_EDGE_REF: usize = 0;
const N_LAT: usize = 1;
const N_LON: usize = 2;

const EDGE_ENTRY_SIZE: usize = 8;
const E_NODEA: usize = 0;
const E_NODEB: usize = 1;
const E_LINKA: usize = 2;
const E_LINKB: usize = 3;
const E_DIST: usize = 4;
const E_FLAGS: usize = 5;
const E_NAME: usize = 6;
const E_GEO: usize = 7;

// Header slots of the nodes store.
const H_IDENTITY: usize = 0;
const H_NODE_ENTRY: usize = 1;
const H_NODE_COUNT: usize = 2;
const H_MIN_LON: usize = 3;
const H_MAX_LON: usize = 4;
const H_MIN_LAT: usize = 5;
const H_MAX_LAT: usize = 6;

// Header slots of the edges store.
const H_EDGE_ENTRY: usize = 0;
const H_EDGE_COUNT: usize = 1;

// Header slot of the geometry store.
const H_MAX_GEO: usize = 0;

const NODES_FILE: &str = "nodes";
// Historical file name, kept verbatim for on-disk compatibility.
const EDGES_FILE: &str = "egdes";
const GEOMETRY_FILE: &str = "geometry";
const NAMES_FILE: &str = "names";

/// Hashed into the nodes header so a reload can reject files written by a
/// different record layout.
const LAYOUT_IDENTITY: &str = "waygraph_core::graph::GraphStorage";

pub struct GraphStorage {
    dir: Directory,
    nodes: DataAccess,
    edges: DataAccess,
    geometry: DataAccess,
    names: NameIndex,
    encoder: Box<dyn CombinedEncoder + Send + Sync>,
    node_count: usize,
    edge_count: usize,
    bounds: BBox,
    /// Word offset of the next free slot in the geometry area. Starts at 1:
    /// offset 0 is reserved so a `geo_ref` of 0 can mean "no pillar nodes".
    max_geo_ref: usize,
    /// Transient; never persisted.
    removed: Option<BitVec>,
}

impl GraphStorage {
    pub fn new(dir: Directory, encoder: Box<dyn CombinedEncoder + Send + Sync>) -> Self {
        let nodes = dir.find_create(NODES_FILE);
        let edges = dir.find_create(EDGES_FILE);
        let geometry = dir.find_create(GEOMETRY_FILE);
        let names = NameIndex::new(dir.find_create(NAMES_FILE));
        Self {
            dir,
            nodes,
            edges,
            geometry,
            names,
            encoder,
            node_count: 0,
            edge_count: 0,
            bounds: BBox::inverse(),
            max_geo_ref: 1,
            removed: None,
        }
    }

    /// Storage with the standard car codec.
    pub fn with_defaults(dir: Directory) -> Self {
        Self::new(dir, Box::new(CarEncoder))
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    pub fn nodes(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn bounds(&self) -> BBox {
        self.bounds
    }

    pub fn names(&self) -> &NameIndex {
        &self.names
    }

    /// Intern a street name, returning the reference to store on edges.
    pub fn add_name(&mut self, name: &str) -> Result<i32> {
        self.names.add(name)
    }

    /// Street name of an edge.
    pub fn name(&self, edge: EdgeId) -> String {
        assert!((edge as usize) < self.edge_count, "edge {edge} out of bounds");
        self.names.get(self.edges.get_int(Self::e_index(edge, E_NAME)))
    }

    #[inline]
    fn n_index(node: NodeId, field: usize) -> usize {
        node as usize * NODE_ENTRY_SIZE + field
    }

    #[inline]
    fn e_index(edge: EdgeId, field: usize) -> usize {
        edge as usize * EDGE_ENTRY_SIZE + field
    }

    pub fn set_node(&mut self, node: NodeId, lat: f64, lon: f64) -> Result<()> {
        self.ensure_node_index(node)?;
        let lat_i = degree_to_int(lat);
        let lon_i = degree_to_int(lon);
        self.nodes.set_int(Self::n_index(node, N_LAT), lat_i);
        self.nodes.set_int(Self::n_index(node, N_LON), lon_i);
        self.bounds.extend(lat_i, lon_i);
        Ok(())
    }

    pub fn latitude(&self, node: NodeId) -> f64 {
        assert!((node as usize) < self.node_count, "node {node} out of bounds");
        int_to_degree(self.nodes.get_int(Self::n_index(node, N_LAT)))
    }

    pub fn longitude(&self, node: NodeId) -> f64 {
        assert!((node as usize) < self.node_count, "node {node} out of bounds");
        int_to_degree(self.nodes.get_int(Self::n_index(node, N_LON)))
    }

    /// Grow the node area up to and including `node`. New slots start with
    /// an empty adjacency chain.
    fn ensure_node_index(&mut self, node: NodeId) -> Result<()> {
        let needed = node as usize + 1;
        if needed <= self.node_count {
            return Ok(());
        }
        self.nodes.ensure_capacity(needed * NODE_ENTRY_SIZE * 4)?;
        for fresh in self.node_count..needed {
            self.nodes
                .set_int(fresh * NODE_ENTRY_SIZE + N_EDGE_REF, NO_EDGE);
        }
        if let Some(removed) = &mut self.removed {
            removed.grow(needed - removed.len(), false);
        }
        self.node_count = needed;
        Ok(())
    }

    /// Insert an edge between `a` and `b`. `flags` are interpreted in the
    /// `a -> b` direction; the stored record is canonicalized.
    pub fn edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        dist_m: f64,
        flags: u32,
        name_ref: i32,
    ) -> Result<EdgeId> {
        self.ensure_node_index(a.max(b))?;
        assert!(
            self.edge_count < i32::MAX as usize,
            "edge id space exhausted"
        );
        let edge = self.edge_count as EdgeId;
        self.edge_count += 1;
        self.edges
            .ensure_capacity(self.edge_count * EDGE_ENTRY_SIZE * 4)?;

        self.connect_new_edge(a, edge);
        if a != b {
            self.connect_new_edge(b, edge);
        }
        self.write_edge(
            edge,
            a,
            b,
            NO_EDGE,
            NO_EDGE,
            dist_to_int(dist_m),
            flags,
            name_ref,
            0,
        );
        Ok(edge)
    }

    /// Insert an edge with the encoder's default flags.
    pub fn edge_bidir(
        &mut self,
        a: NodeId,
        b: NodeId,
        dist_m: f64,
        both_directions: bool,
        name_ref: i32,
    ) -> Result<EdgeId> {
        let flags = self.encoder.flags_default(both_directions);
        self.edge(a, b, dist_m, flags, name_ref)
    }

    /// Append `new_edge` at the tail of `node`'s adjacency chain, so that
    /// iteration order equals insertion order.
    fn connect_new_edge(&mut self, node: NodeId, new_edge: EdgeId) {
        let ref_index = Self::n_index(node, N_EDGE_REF);
        let head = self.nodes.get_int(ref_index);
        if head == NO_EDGE {
            self.nodes.set_int(ref_index, new_edge as i32);
            return;
        }
        let mut current = head as EdgeId;
        let mut hops = 0;
        loop {
            let slot = self.link_slot(current, node);
            let next = self.edges.get_int(slot);
            if next == NO_EDGE {
                self.edges.set_int(slot, new_edge as i32);
                return;
            }
            current = next as EdgeId;
            hops += 1;
            assert!(
                hops < MAX_CHAIN_HOPS,
                "adjacency chain of node {node} exceeds {MAX_CHAIN_HOPS} hops"
            );
        }
    }

    /// Word index of the link slot of `edge` that belongs to `node`.
    fn link_slot(&self, edge: EdgeId, node: NodeId) -> usize {
        let base = edge as usize * EDGE_ENTRY_SIZE;
        if self.edges.get_int(base + E_NODEA) == node as i32 {
            base + E_LINKA
        } else {
            assert!(
                self.edges.get_int(base + E_NODEB) == node as i32,
                "edge {edge} is not incident to node {node}"
            );
            base + E_LINKB
        }
    }

    /// Next edge after `edge` in `node`'s adjacency chain.
    pub(crate) fn link_of(&self, edge: EdgeId, node: NodeId) -> i32 {
        self.edges.get_int(self.link_slot(edge, node))
    }

    fn other_node(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let base = edge as usize * EDGE_ENTRY_SIZE;
        let node_a = self.edges.get_int(base + E_NODEA);
        if node_a == node as i32 {
            self.edges.get_int(base + E_NODEB) as NodeId
        } else {
            node_a as NodeId
        }
    }

    /// Write the full edge record, swapping into canonical `a <= b` order.
    #[allow(clippy::too_many_arguments)]
    fn write_edge(
        &mut self,
        edge: EdgeId,
        mut a: NodeId,
        mut b: NodeId,
        mut link_a: i32,
        mut link_b: i32,
        dist: i32,
        mut flags: u32,
        name_ref: i32,
        geo_ref: i32,
    ) {
        if a > b {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut link_a, &mut link_b);
            flags = self.encoder.swap_direction(flags);
        }
        let base = edge as usize * EDGE_ENTRY_SIZE;
        self.edges.set_int(base + E_NODEA, a as i32);
        self.edges.set_int(base + E_NODEB, b as i32);
        self.edges.set_int(base + E_LINKA, link_a);
        self.edges.set_int(base + E_LINKB, link_b);
        self.edges.set_int(base + E_DIST, dist);
        self.edges.set_int(base + E_FLAGS, flags as i32);
        self.edges.set_int(base + E_NAME, name_ref);
        self.edges.set_int(base + E_GEO, geo_ref);
    }

    /// The edge as seen from `base`. Flags come out oriented `base -> adj`.
    pub(crate) fn view(&self, edge: EdgeId, base: NodeId) -> EdgeView {
        let eb = edge as usize * EDGE_ENTRY_SIZE;
        let node_a = self.edges.get_int(eb + E_NODEA) as NodeId;
        let node_b = self.edges.get_int(eb + E_NODEB) as NodeId;
        let mut flags = self.edges.get_int(eb + E_FLAGS) as u32;
        let adj = if base == node_a {
            node_b
        } else {
            assert!(base == node_b, "edge {edge} is not incident to node {base}");
            flags = self.encoder.swap_direction(flags);
            node_a
        };
        EdgeView {
            edge,
            base,
            adj,
            dist_m: int_to_dist(self.edges.get_int(eb + E_DIST)),
            flags,
            name_ref: self.edges.get_int(eb + E_NAME),
        }
    }

    /// The edge in canonical orientation (`base == node_a`).
    pub(crate) fn canonical_view(&self, edge: EdgeId) -> EdgeView {
        let node_a = self.edges.get_int(Self::e_index(edge, E_NODEA)) as NodeId;
        self.view(edge, node_a)
    }

    /// Iterate the edges incident to `node` in insertion order.
    pub fn edges(&self, node: NodeId) -> AdjacentEdges<'_, AcceptAll> {
        self.edges_filtered(node, AcceptAll)
    }

    /// Iterate the edges incident to `node` that pass `filter`.
    pub fn edges_filtered<F: EdgeFilter>(&self, node: NodeId, filter: F) -> AdjacentEdges<'_, F> {
        assert!((node as usize) < self.node_count, "node {node} out of bounds");
        AdjacentEdges {
            graph: self,
            node,
            next_edge: self.nodes.get_int(Self::n_index(node, N_EDGE_REF)),
            filter,
        }
    }

    /// Iterate every edge record once, in id order.
    pub fn all_edges(&self) -> AllEdges<'_> {
        AllEdges {
            graph: self,
            next: 0,
        }
    }

    /// Single-edge view from the perspective of arriving at `end_node`:
    /// the returned view has `adj == end_node`. `None` when `end_node`
    /// matches neither endpoint.
    pub fn edge_props(&self, edge: EdgeId, end_node: NodeId) -> Option<EdgeView> {
        assert!((edge as usize) < self.edge_count, "edge {edge} out of bounds");
        let node_a = self.edges.get_int(Self::e_index(edge, E_NODEA)) as NodeId;
        let node_b = self.edges.get_int(Self::e_index(edge, E_NODEB)) as NodeId;
        if end_node == node_b {
            Some(self.view(edge, node_a))
        } else if end_node == node_a {
            Some(self.view(edge, node_b))
        } else {
            None
        }
    }

    /// Rewrite an edge's flags. `flags` are interpreted in the
    /// `base -> other` direction, matching what a cursor positioned at
    /// `base` reports.
    pub fn set_flags(&mut self, edge: EdgeId, base: NodeId, flags: u32) {
        assert!((edge as usize) < self.edge_count, "edge {edge} out of bounds");
        let eb = edge as usize * EDGE_ENTRY_SIZE;
        let node_a = self.edges.get_int(eb + E_NODEA) as NodeId;
        let node_b = self.edges.get_int(eb + E_NODEB) as NodeId;
        let link_a = self.edges.get_int(eb + E_LINKA);
        let link_b = self.edges.get_int(eb + E_LINKB);
        let dist = self.edges.get_int(eb + E_DIST);
        let name_ref = self.edges.get_int(eb + E_NAME);
        let geo_ref = self.edges.get_int(eb + E_GEO);
        if base == node_a {
            self.write_edge(edge, node_a, node_b, link_a, link_b, dist, flags, name_ref, geo_ref);
        } else {
            assert!(base == node_b, "edge {edge} is not incident to node {base}");
            self.write_edge(edge, node_b, node_a, link_b, link_a, dist, flags, name_ref, geo_ref);
        }
    }

    /// Attach a pillar-node polyline to an edge. `points` are given in
    /// `base -> other` travel order; on disk the polyline is always stored
    /// in canonical `node_a -> node_b` order.
    pub fn set_way_geometry(&mut self, edge: EdgeId, base: NodeId, points: &PointList) -> Result<()> {
        assert!((edge as usize) < self.edge_count, "edge {edge} out of bounds");
        let eb = edge as usize * EDGE_ENTRY_SIZE;
        let node_a = self.edges.get_int(eb + E_NODEA) as NodeId;
        let node_b = self.edges.get_int(eb + E_NODEB) as NodeId;
        assert!(
            base == node_a || base == node_b,
            "edge {edge} is not incident to node {base}"
        );
        if points.is_empty() {
            self.edges.set_int(eb + E_GEO, 0);
            return Ok(());
        }

        let count = points.size();
        let start = self.max_geo_ref;
        let end = start + 1 + 2 * count;
        self.geometry.ensure_capacity(end * 4)?;
        self.geometry.set_int(start, count as i32);
        let reversed = base == node_b && node_a != node_b;
        for i in 0..count {
            let src = if reversed { count - 1 - i } else { i };
            self.geometry
                .set_int(start + 1 + 2 * i, degree_to_int(points.latitude(src)));
            self.geometry
                .set_int(start + 2 + 2 * i, degree_to_int(points.longitude(src)));
        }
        self.max_geo_ref = end;
        self.edges.set_int(eb + E_GEO, start as i32);
        Ok(())
    }

    /// The pillar-node polyline of an edge, oriented `base -> other`.
    /// Empty when the edge has none.
    pub fn way_geometry(&self, edge: EdgeId, base: NodeId) -> PointList {
        assert!((edge as usize) < self.edge_count, "edge {edge} out of bounds");
        let eb = edge as usize * EDGE_ENTRY_SIZE;
        let geo_ref = self.edges.get_int(eb + E_GEO);
        if geo_ref == 0 {
            return PointList::new();
        }
        let node_a = self.edges.get_int(eb + E_NODEA) as NodeId;
        let node_b = self.edges.get_int(eb + E_NODEB) as NodeId;
        assert!(
            base == node_a || base == node_b,
            "edge {edge} is not incident to node {base}"
        );
        let start = geo_ref as usize;
        let count = self.geometry.get_int(start) as usize;
        let mut points = PointList::with_capacity(count);
        for i in 0..count {
            points.add(
                int_to_degree(self.geometry.get_int(start + 1 + 2 * i)),
                int_to_degree(self.geometry.get_int(start + 2 + 2 * i)),
            );
        }
        if base == node_b && node_a != node_b {
            points.reverse();
        }
        points
    }

    pub fn mark_node_removed(&mut self, node: NodeId) {
        assert!((node as usize) < self.node_count, "node {node} out of bounds");
        let node_count = self.node_count;
        let removed = self
            .removed
            .get_or_insert_with(|| BitVec::from_elem(node_count, false));
        if removed.len() < node_count {
            removed.grow(node_count - removed.len(), false);
        }
        removed.set(node as usize, true);
    }

    pub fn is_node_removed(&self, node: NodeId) -> bool {
        self.removed
            .as_ref()
            .and_then(|r| r.get(node as usize))
            .unwrap_or(false)
    }

    /// All `(edge, other_endpoint)` pairs of `node`, by raw chain walk.
    fn incident_edges(&self, node: NodeId) -> Vec<(EdgeId, NodeId)> {
        let mut out = Vec::new();
        let mut current = self.nodes.get_int(Self::n_index(node, N_EDGE_REF));
        let mut hops = 0;
        while current != NO_EDGE {
            let edge = current as EdgeId;
            out.push((edge, self.other_node(edge, node)));
            current = self.link_of(edge, node);
            hops += 1;
            assert!(
                hops <= MAX_CHAIN_HOPS,
                "adjacency chain of node {node} exceeds {MAX_CHAIN_HOPS} hops"
            );
        }
        out
    }

    /// Splice every edge towards a removed node out of `node`'s chain.
    fn disconnect_removed_edges(&mut self, node: NodeId, removed: &BitVec) {
        let ref_index = Self::n_index(node, N_EDGE_REF);
        let mut prev: i32 = NO_EDGE;
        let mut current = self.nodes.get_int(ref_index);
        let mut hops = 0;
        while current != NO_EDGE {
            let edge = current as EdgeId;
            let other = self.other_node(edge, node);
            let next = self.link_of(edge, node);
            if removed.get(other as usize) == Some(true) {
                if prev == NO_EDGE {
                    self.nodes.set_int(ref_index, next);
                } else {
                    let slot = self.link_slot(prev as EdgeId, node);
                    self.edges.set_int(slot, next);
                }
            } else {
                prev = current;
            }
            current = next;
            hops += 1;
            assert!(
                hops <= MAX_CHAIN_HOPS,
                "adjacency chain of node {node} exceeds {MAX_CHAIN_HOPS} hops"
            );
        }
    }

    fn reverse_geometry_in_place(&mut self, start: usize) {
        let count = self.geometry.get_int(start) as usize;
        let mut i = 0;
        let mut j = count.saturating_sub(1);
        while i < j {
            let (left, right) = (start + 1 + 2 * i, start + 1 + 2 * j);
            for field in 0..2 {
                let tmp = self.geometry.get_int(left + field);
                self.geometry
                    .set_int(left + field, self.geometry.get_int(right + field));
                self.geometry.set_int(right + field, tmp);
            }
            i += 1;
            j -= 1;
        }
    }

    /// Compact the node area in place after `mark_node_removed` calls.
    ///
    /// The highest-indexed live nodes move down into the freed slots, live
    /// adjacency chains are unlinked from removed neighbors, and affected
    /// edge records are rewritten with remapped endpoints. Edge records
    /// whose endpoints were all removed stay behind as unreachable orphans;
    /// `edge_count` does not change.
    pub fn optimize(&mut self) -> Result<()> {
        let Some(removed) = self.removed.take() else {
            return Ok(());
        };
        let removed_ids: Vec<usize> = removed
            .iter()
            .enumerate()
            .filter(|(_, r)| *r)
            .map(|(i, _)| i)
            .collect();
        if removed_ids.is_empty() {
            return Ok(());
        }
        let removed_count = removed_ids.len();
        debug!(removed = removed_count, nodes = self.node_count, "compacting node area");

        // Pair each removed slot, lowest first, with the highest-indexed
        // live node. Once the candidate mover sits at or below the next
        // removed slot, the remaining removals are all above the remaining
        // live nodes and collapse by count alone.
        let mut old_to_new: BTreeMap<usize, usize> = BTreeMap::new();
        let mut mover = self.node_count as i64 - 1;
        for &del in &removed_ids {
            while mover >= 0 && removed.get(mover as usize) == Some(true) {
                mover -= 1;
            }
            if mover <= del as i64 {
                break;
            }
            old_to_new.insert(mover as usize, del);
            mover -= 1;
        }

        // Live nodes whose chains or edge records must be touched: the
        // neighbors of removed nodes and the neighbors of movers.
        let mut to_update: FxHashSet<NodeId> = FxHashSet::default();
        for &del in &removed_ids {
            for (_, other) in self.incident_edges(del as NodeId) {
                if removed.get(other as usize) != Some(true) {
                    to_update.insert(other);
                }
            }
        }
        for &old in old_to_new.keys() {
            for (_, other) in self.incident_edges(old as NodeId) {
                if removed.get(other as usize) != Some(true) {
                    to_update.insert(other);
                }
            }
        }

        for &node in &to_update {
            self.disconnect_removed_edges(node, &removed);
        }

        for (&old, &new) in &old_to_new {
            for field in 0..NODE_ENTRY_SIZE {
                let value = self.nodes.get_int(old * NODE_ENTRY_SIZE + field);
                self.nodes.set_int(new * NODE_ENTRY_SIZE + field, value);
            }
        }

        for edge in 0..self.edge_count as u32 {
            let eb = edge as usize * EDGE_ENTRY_SIZE;
            let a = self.edges.get_int(eb + E_NODEA) as NodeId;
            let b = self.edges.get_int(eb + E_NODEB) as NodeId;
            if !to_update.contains(&a) && !to_update.contains(&b) {
                continue;
            }
            let new_a = old_to_new
                .get(&(a as usize))
                .map(|&n| n as NodeId)
                .unwrap_or(a);
            let new_b = old_to_new
                .get(&(b as usize))
                .map(|&n| n as NodeId)
                .unwrap_or(b);
            let link_a = self.edges.get_int(eb + E_LINKA);
            let link_b = self.edges.get_int(eb + E_LINKB);
            let dist = self.edges.get_int(eb + E_DIST);
            let flags = self.edges.get_int(eb + E_FLAGS) as u32;
            let name_ref = self.edges.get_int(eb + E_NAME);
            let geo_ref = self.edges.get_int(eb + E_GEO);
            // The stored polyline follows the canonical order; keep it that
            // way when the remap flips which endpoint is smaller.
            if new_a > new_b && geo_ref != 0 {
                self.reverse_geometry_in_place(geo_ref as usize);
            }
            self.write_edge(edge, new_a, new_b, link_a, link_b, dist, flags, name_ref, geo_ref);
        }

        self.node_count -= removed_count;
        self.nodes
            .trim_to(self.node_count * NODE_ENTRY_SIZE * 4)?;
        debug!(nodes = self.node_count, "compaction done");
        Ok(())
    }

    /// Replay every node and edge into `other`, re-interning names and
    /// copying pillar geometry. Edge ids are preserved.
    pub fn copy_to(&self, other: &mut GraphStorage) -> Result<()> {
        for node in 0..self.node_count as u32 {
            other.set_node(node, self.latitude(node), self.longitude(node))?;
        }
        for edge in 0..self.edge_count as u32 {
            let view = self.canonical_view(edge);
            let name_ref = other.add_name(&self.names.get(view.name_ref))?;
            let copied = other.edge(view.base, view.adj, view.dist_m, view.flags, name_ref)?;
            debug_assert_eq!(copied, edge);
            let geometry = self.way_geometry(edge, view.base);
            if !geometry.is_empty() {
                other.set_way_geometry(copied, view.base, &geometry)?;
            }
        }
        Ok(())
    }
}

impl Storable for GraphStorage {
    /// `size_hint` is the expected node count.
    fn create_new(&mut self, size_hint: usize) -> Result<()> {
        let hint = size_hint.max(1);
        self.nodes.create_new(hint * NODE_ENTRY_SIZE * 4)?;
        self.edges.create_new(hint * EDGE_ENTRY_SIZE * 4)?;
        self.geometry.create_new(hint * 4)?;
        self.names.create_new(hint * 4)?;
        self.node_count = 0;
        self.edge_count = 0;
        self.bounds = BBox::inverse();
        self.max_geo_ref = 1;
        self.removed = None;
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        let found = [
            (self.nodes.load_existing()?, NODES_FILE),
            (self.edges.load_existing()?, EDGES_FILE),
            (self.geometry.load_existing()?, GEOMETRY_FILE),
            (self.names.load_existing()?, NAMES_FILE),
        ];
        if found.iter().all(|(loaded, _)| !loaded) {
            return Ok(false);
        }
        if let Some((_, missing)) = found.iter().find(|(loaded, _)| !loaded) {
            return Err(Error::MissingSibling((*missing).to_string()));
        }

        let expected = identity_hash(LAYOUT_IDENTITY);
        if self.nodes.get_header(H_IDENTITY) != expected {
            return Err(Error::InvalidFormat(
                "nodes file was written by an unknown storage layout".to_string(),
            ));
        }
        if self.nodes.get_header(H_NODE_ENTRY) != NODE_ENTRY_SIZE as i32
            || self.edges.get_header(H_EDGE_ENTRY) != EDGE_ENTRY_SIZE as i32
        {
            return Err(Error::InvalidFormat(format!(
                "record sizes {}/{} do not match this layout",
                self.nodes.get_header(H_NODE_ENTRY),
                self.edges.get_header(H_EDGE_ENTRY)
            )));
        }
        if self.nodes.version() != self.edges.version() {
            return Err(Error::VersionMismatch(format!(
                "nodes flushed {} times but edges {} times",
                self.nodes.version(),
                self.edges.version()
            )));
        }

        self.node_count = self.nodes.get_header(H_NODE_COUNT) as usize;
        self.edge_count = self.edges.get_header(H_EDGE_COUNT) as usize;
        self.bounds = BBox {
            min_lon: self.nodes.get_header(H_MIN_LON),
            max_lon: self.nodes.get_header(H_MAX_LON),
            min_lat: self.nodes.get_header(H_MIN_LAT),
            max_lat: self.nodes.get_header(H_MAX_LAT),
        };
        self.max_geo_ref = self.geometry.get_header(H_MAX_GEO) as usize;
        self.removed = None;
        debug!(
            nodes = self.node_count,
            edges = self.edge_count,
            names = self.names.name_count(),
            "loaded graph"
        );
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        self.nodes
            .set_header(H_IDENTITY, identity_hash(LAYOUT_IDENTITY));
        self.nodes.set_header(H_NODE_ENTRY, NODE_ENTRY_SIZE as i32);
        self.nodes.set_header(H_NODE_COUNT, self.node_count as i32);
        self.nodes.set_header(H_MIN_LON, self.bounds.min_lon);
        self.nodes.set_header(H_MAX_LON, self.bounds.max_lon);
        self.nodes.set_header(H_MIN_LAT, self.bounds.min_lat);
        self.nodes.set_header(H_MAX_LAT, self.bounds.max_lat);
        self.edges.set_header(H_EDGE_ENTRY, EDGE_ENTRY_SIZE as i32);
        self.edges.set_header(H_EDGE_COUNT, self.edge_count as i32);
        self.geometry.set_header(H_MAX_GEO, self.max_geo_ref as i32);

        self.nodes.flush()?;
        self.edges.flush()?;
        self.geometry.flush()?;
        self.names.flush()?;
        debug!(
            nodes = self.node_count,
            edges = self.edge_count,
            "flushed graph"
        );
        Ok(())
    }

    fn close(&mut self) {
        self.nodes.close();
        self.edges.close();
        self.geometry.close();
        self.names.close();
    }

    fn capacity(&self) -> usize {
        self.nodes.capacity()
            + self.edges.capacity()
            + self.geometry.capacity()
            + self.names.capacity()
    }
}
