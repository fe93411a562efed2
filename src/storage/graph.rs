//! Packed-array graph storage.
//!
//! Nodes and edges live in two fixed-stride record regions. Each edge
//! record carries the two adjacency links of its endpoints, forming one
//! singly-linked chain per node without any per-node vectors; edge ids
//! are stable for the lifetime of the graph. Every stored edge is kept
//! in canonical orientation (`node_a <= node_b`, flags pointing a->b),
//! normalized in a single choke point ([`GraphStore::write_edge`]).
//!
//! Node removal is deferred: ids are marked and [`GraphStore::optimize`]
//! later relocates tail nodes into the freed slots in place. Edge slots
//! are never reclaimed; dead edges become tombstones that every cursor
//! skips.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::codec::{codec_for_list, FlagsCodec};
use crate::error::{GraphError, Result};
use crate::geo::{degree_to_int, dist_to_int, int_to_degree, int_to_dist, BoundingBox, GeoPoint};
use crate::names::NameIndex;
use crate::props::Properties;
use crate::store::{DataAccess, Directory};

use super::cursor::{AllEdges, AllEdgesIter, EdgeExplorer, EdgeFilter, EdgeRef, SingleEdge};

pub const NO_NODE: i32 = -1;
pub const NO_EDGE: i32 = -1;

/// Safety fuse for adjacency walks. Road networks never approach this
/// degree; a longer chain means the link protocol was violated.
pub const MAX_EDGES: i32 = 1000;

const STORAGE_FINGERPRINT: i32 = 0x5645_5247;

// edge record layout: node_a, node_b, link_a, link_b, dist, flags,
// geo_ref, name_ref
pub(crate) const E_NODEA: u64 = 0;
pub(crate) const E_NODEB: u64 = 4;
pub(crate) const E_LINKA: u64 = 8;
pub(crate) const E_LINKB: u64 = 12;
pub(crate) const E_DIST: u64 = 16;
pub(crate) const E_FLAGS: u64 = 20;
pub(crate) const E_GEO: u64 = 24;
pub(crate) const E_NAME: u64 = 28;
pub(crate) const EDGE_ENTRY_BYTES: u32 = 32;

// node record layout: edge_ref, lat, lon
pub(crate) const N_EDGE_REF: u64 = 0;
pub(crate) const N_LAT: u64 = 4;
pub(crate) const N_LON: u64 = 8;
pub(crate) const NODE_ENTRY_BYTES: u32 = 12;

// geometry word 0 stands for "no geometry"; the first words stay unused
const INITIAL_GEO_REF: i32 = 4;

const CODEC_LIST_KEY: &str = "graph.flag_codecs";

pub(crate) fn node_ptr(node: i32) -> u64 {
    debug_assert!(node >= 0);
    node as u64 * u64::from(NODE_ENTRY_BYTES)
}

pub(crate) fn edge_ptr(edge: i32) -> u64 {
    debug_assert!(edge >= 0);
    edge as u64 * u64::from(EDGE_ENTRY_BYTES)
}

/// The link field of `node_this` inside the edge record at
/// `edge_pointer`, chosen purely from the endpoint order.
pub(crate) fn link_pos(node_this: i32, node_other: i32, edge_pointer: u64) -> u64 {
    if node_this <= node_other {
        edge_pointer + E_LINKA
    } else {
        edge_pointer + E_LINKB
    }
}

/// Which endpoints to include when fetching an edge polyline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GeometryMode {
    PillarsOnly,
    WithBase,
    WithAdj,
    Full,
}

impl GeometryMode {
    pub fn includes_base(self) -> bool {
        matches!(self, GeometryMode::WithBase | GeometryMode::Full)
    }

    pub fn includes_adj(self) -> bool {
        matches!(self, GeometryMode::WithAdj | GeometryMode::Full)
    }
}

/// Graph storage over five named regions: `nodes`, `edges`, `geometry`,
/// plus the name dictionary and the properties map.
///
/// Life cycle: construct (directly or via
/// [`super::GraphStoreBuilder`]), configure, then `create` or
/// `load_existing`, use, `flush`, `close`. Mutation requires `&mut
/// self`, so read cursors can never observe a graph mid-change.
pub struct GraphStore {
    dir: Directory,
    nodes: Box<dyn DataAccess>,
    edges: Box<dyn DataAccess>,
    geometry: Box<dyn DataAccess>,
    names: NameIndex,
    props: Properties,
    codec: Option<Box<dyn FlagsCodec>>,
    node_count: i32,
    edge_count: i32,
    bounds: BoundingBox,
    removed_nodes: Option<BTreeSet<i32>>,
    max_geo_ref: i32,
    initialized: bool,
}

impl GraphStore {
    /// The codec may be `None` only when an existing graph will be
    /// loaded; `load_existing` then adopts the codec stored with it.
    pub fn new(dir: Directory, codec: Option<Box<dyn FlagsCodec>>) -> Result<Self> {
        let nodes = dir.find("nodes")?;
        let edges = dir.find("edges")?;
        let geometry = dir.find("geometry")?;
        let names = NameIndex::new(dir.find("names")?);
        let props = Properties::new(dir.find("properties")?);
        Ok(Self {
            dir,
            nodes,
            edges,
            geometry,
            names,
            props,
            codec,
            node_count: 0,
            edge_count: 0,
            bounds: BoundingBox::INVERSE,
            removed_nodes: None,
            max_geo_ref: INITIAL_GEO_REF,
            initialized: false,
        })
    }

    pub fn directory(&self) -> &Directory {
        &self.dir
    }

    pub fn node_count(&self) -> i32 {
        self.node_count
    }

    pub fn edge_count(&self) -> i32 {
        self.edge_count
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn capacity(&self) -> u64 {
        self.nodes.capacity()
            + self.edges.capacity()
            + self.geometry.capacity()
            + self.names.capacity()
            + self.props.capacity()
    }

    /// One-line summary of counts and region sizes.
    pub fn details(&self) -> String {
        const MB: u64 = 1 << 20;
        format!(
            "edges: {} ({} MB), nodes: {} ({} MB), names: ({} MB), geometry: {} ({} MB), bounds: {:?}",
            self.edge_count,
            self.edges.capacity() / MB,
            self.node_count,
            self.nodes.capacity() / MB,
            self.names.capacity() / MB,
            self.max_geo_ref,
            self.geometry.capacity() / MB,
            self.bounds,
        )
    }

    pub fn set_segment_size(&mut self, bytes: u32) -> Result<()> {
        if self.initialized {
            return Err(GraphError::AlreadyInitialized("segment size"));
        }
        self.nodes.set_segment_size(bytes)?;
        self.edges.set_segment_size(bytes)?;
        self.geometry.set_segment_size(bytes)?;
        self.names.set_segment_size(bytes)?;
        self.props.set_segment_size(bytes)?;
        Ok(())
    }

    pub(crate) fn codec(&self) -> &dyn FlagsCodec {
        self.codec
            .as_deref()
            .expect("flags codec is configured after create or load_existing")
    }

    fn require_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(GraphError::NotConfigured("call create or load_existing first"))
        }
    }

    // ----- lifecycle -------------------------------------------------

    pub fn create(&mut self, byte_count: u64) -> Result<()> {
        if self.initialized {
            return Err(GraphError::AlreadyInitialized("create"));
        }
        if self.codec.is_none() {
            return Err(GraphError::NotConfigured(
                "a flags codec is required before create",
            ));
        }
        let initial = byte_count.max(100);
        self.nodes.create(initial)?;
        let node_capacity = self.nodes.capacity();
        self.init_node_refs(0, node_capacity);
        self.edges.create(initial)?;
        self.geometry.create(initial)?;
        self.names.create(1000)?;
        self.props.create(100)?;
        let list = self.codec().encoder_list();
        self.props.put(CODEC_LIST_KEY, list);
        self.props.put_current_versions();
        self.initialized = true;
        info!(bytes = initial, "created graph regions");
        Ok(())
    }

    /// Loads a graph persisted under this directory. `Ok(false)` means
    /// nothing is stored there; a partially present or incompatible
    /// graph is an error and the store must be discarded.
    pub fn load_existing(&mut self) -> Result<bool> {
        if self.initialized {
            return Err(GraphError::AlreadyInitialized("load_existing"));
        }
        if !self.edges.load_existing()? {
            return Ok(false);
        }
        if !self.nodes.load_existing()? {
            return Err(GraphError::Corruption("nodes region missing".into()));
        }
        if !self.geometry.load_existing()? {
            return Err(GraphError::Corruption("geometry region missing".into()));
        }
        if !self.names.load_existing()? {
            return Err(GraphError::Corruption("names region missing".into()));
        }
        if !self.props.load_existing()? {
            return Err(GraphError::Corruption("properties region missing".into()));
        }
        self.props.check_versions(true)?;

        let stored_list = self.props.get(CODEC_LIST_KEY).unwrap_or("").to_owned();
        if self.codec.is_none() {
            if stored_list.is_empty() {
                return Err(GraphError::Corruption(
                    "no flags codec configured and none stored in the graph".into(),
                ));
            }
            warn!(list = %stored_list, "adopting flags codec stored in graph");
            self.codec = Some(codec_for_list(&stored_list)?);
        } else if !stored_list.is_empty() {
            let configured = self.codec().encoder_list();
            if !configured.eq_ignore_ascii_case(&stored_list) {
                return Err(GraphError::Corruption(format!(
                    "flag codec mismatch: configured {configured:?}, stored {stored_list:?}"
                )));
            }
        }

        if self.nodes.get_header(0) != STORAGE_FINGERPRINT {
            return Err(GraphError::Corruption(
                "graph was not created by this storage implementation".into(),
            ));
        }
        let node_stride = self.nodes.get_header(4);
        if node_stride != NODE_ENTRY_BYTES as i32 {
            return Err(GraphError::Corruption(format!(
                "unsupported node record stride {node_stride}"
            )));
        }
        self.node_count = self.nodes.get_header(8);
        self.bounds = BoundingBox {
            min_lon: int_to_degree(self.nodes.get_header(12)),
            max_lon: int_to_degree(self.nodes.get_header(16)),
            min_lat: int_to_degree(self.nodes.get_header(20)),
            max_lat: int_to_degree(self.nodes.get_header(24)),
        };

        let edge_stride = self.edges.get_header(0);
        if edge_stride != EDGE_ENTRY_BYTES as i32 {
            return Err(GraphError::Corruption(format!(
                "unsupported edge record stride {edge_stride}"
            )));
        }
        self.edge_count = self.edges.get_header(4);
        let stored_fingerprint = self.edges.get_header(8);
        if stored_fingerprint != self.codec().fingerprint() {
            return Err(GraphError::Corruption(
                "flag codec fingerprint differs from the stored graph".into(),
            ));
        }

        self.max_geo_ref = self.geometry.get_header(0);
        self.initialized = true;
        info!(
            nodes = self.node_count,
            edges = self.edge_count,
            "loaded existing graph"
        );
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.require_initialized()?;
        let bounds = self.bounds;
        self.nodes.set_header(0, STORAGE_FINGERPRINT);
        self.nodes.set_header(4, NODE_ENTRY_BYTES as i32);
        self.nodes.set_header(8, self.node_count);
        self.nodes.set_header(12, degree_to_int(bounds.min_lon));
        self.nodes.set_header(16, degree_to_int(bounds.max_lon));
        self.nodes.set_header(20, degree_to_int(bounds.min_lat));
        self.nodes.set_header(24, degree_to_int(bounds.max_lat));

        self.edges.set_header(0, EDGE_ENTRY_BYTES as i32);
        self.edges.set_header(4, self.edge_count);
        let fingerprint = self.codec().fingerprint();
        self.edges.set_header(8, fingerprint);

        self.geometry.set_header(0, self.max_geo_ref);

        self.props.flush()?;
        self.geometry.flush()?;
        self.names.flush()?;
        self.edges.flush()?;
        self.nodes.flush()?;
        debug!("flushed graph regions");
        Ok(())
    }

    pub fn close(&mut self) {
        self.props.close();
        self.geometry.close();
        self.names.close();
        self.edges.close();
        self.nodes.close();
    }

    /// Clones the whole graph into `other`, which must already be
    /// created with a codec carrying the same encoder list.
    pub fn copy_to(&self, other: &mut GraphStore) -> Result<()> {
        self.require_initialized()?;
        if !other.initialized {
            return Err(GraphError::NotConfigured(
                "create the target graph before copy_to",
            ));
        }
        let source_list = self.codec().encoder_list();
        let target_list = other.codec().encoder_list();
        if !source_list.eq_ignore_ascii_case(&target_list) {
            return Err(GraphError::Corruption(format!(
                "flag codec mismatch: source {source_list:?}, target {target_list:?}"
            )));
        }
        self.nodes.copy_to(other.nodes.as_mut())?;
        self.edges.copy_to(other.edges.as_mut())?;
        self.geometry.copy_to(other.geometry.as_mut())?;
        self.names.copy_to(&mut other.names)?;
        self.props.copy_to(&mut other.props)?;
        other.node_count = self.node_count;
        other.edge_count = self.edge_count;
        other.bounds = self.bounds;
        other.max_geo_ref = self.max_geo_ref;
        other.removed_nodes = self.removed_nodes.clone();
        Ok(())
    }

    // ----- node table ------------------------------------------------

    pub fn set_node(&mut self, node: i32, lat: f64, lon: f64) -> Result<()> {
        self.require_initialized()?;
        if node < 0 {
            return Err(GraphError::NodeOutOfBounds {
                id: node,
                count: self.node_count,
            });
        }
        self.ensure_node_index(node)?;
        let pointer = node_ptr(node);
        self.nodes.set_int(pointer + N_LAT, degree_to_int(lat));
        self.nodes.set_int(pointer + N_LON, degree_to_int(lon));
        self.bounds.extend(lat, lon);
        Ok(())
    }

    /// Callers must stay below [`GraphStore::node_count`]; reads beyond
    /// it are unspecified.
    pub fn latitude(&self, node: i32) -> f64 {
        int_to_degree(self.nodes.get_int(node_ptr(node) + N_LAT))
    }

    pub fn longitude(&self, node: i32) -> f64 {
        int_to_degree(self.nodes.get_int(node_ptr(node) + N_LON))
    }

    fn ensure_node_index(&mut self, node: i32) -> Result<()> {
        if node < self.node_count {
            return Ok(());
        }
        let old_count = self.node_count;
        self.node_count = node.checked_add(1).ok_or(GraphError::NodeOutOfBounds {
            id: node,
            count: self.node_count,
        })?;
        if self
            .nodes
            .inc_capacity(self.node_count as u64 * u64::from(NODE_ENTRY_BYTES))?
        {
            let new_capacity = self.nodes.capacity();
            self.init_node_refs(old_count as u64 * u64::from(NODE_ENTRY_BYTES), new_capacity);
        }
        Ok(())
    }

    /// Writes the empty-chain sentinel into every node slot revealed by
    /// a capacity grow, up to the new capacity high-water.
    fn init_node_refs(&mut self, from_bytes: u64, to_bytes: u64) {
        let mut pointer = from_bytes + N_EDGE_REF;
        while pointer + 4 <= to_bytes {
            self.nodes.set_int(pointer, NO_EDGE);
            pointer += u64::from(NODE_ENTRY_BYTES);
        }
    }

    // ----- edge table ------------------------------------------------

    pub fn add_edge(&mut self, node_a: i32, node_b: i32, distance: f64, flags: i32) -> Result<EdgeRef> {
        self.require_initialized()?;
        if node_a < 0 || node_b < 0 {
            return Err(GraphError::NodeOutOfBounds {
                id: node_a.min(node_b),
                count: self.node_count,
            });
        }
        self.ensure_node_index(node_a.max(node_b))?;
        let edge = self.next_edge_slot()?;
        self.write_edge(edge, node_a, node_b, NO_EDGE, NO_EDGE, dist_to_int(distance), flags);
        self.connect_new_edge(node_a, edge);
        if node_a != node_b {
            self.connect_new_edge(node_b, edge);
        }
        Ok(EdgeRef {
            edge,
            base: node_a,
            adj: node_b,
        })
    }

    pub fn add_edge_with_defaults(
        &mut self,
        node_a: i32,
        node_b: i32,
        distance: f64,
        both_directions: bool,
    ) -> Result<EdgeRef> {
        self.require_initialized()?;
        let flags = self.codec().default_flags(both_directions);
        self.add_edge(node_a, node_b, distance, flags)
    }

    fn next_edge_slot(&mut self) -> Result<i32> {
        let edge = self.edge_count;
        self.edge_count = self.edge_count.checked_add(1).ok_or(GraphError::TooManyEdges)?;
        self.edges
            .inc_capacity(self.edge_count as u64 * u64::from(EDGE_ENTRY_BYTES))?;
        Ok(edge)
    }

    /// Splices `new_edge` at the head of `node`'s adjacency chain.
    fn connect_new_edge(&mut self, node: i32, new_edge: i32) {
        let pointer = node_ptr(node);
        let head = self.nodes.get_int(pointer + N_EDGE_REF);
        if head > NO_EDGE {
            let eptr = edge_ptr(new_edge);
            let other = self.other_node(node, eptr);
            self.edges.set_int(link_pos(node, other, eptr), head);
        }
        self.nodes.set_int(pointer + N_EDGE_REF, new_edge);
    }

    /// The single place that stores an edge record. Normalizes to
    /// canonical orientation: endpoints, links, and flags are swapped
    /// together whenever `node_a > node_b`. `geo_ref` and `name_ref`
    /// are left untouched.
    fn write_edge(
        &mut self,
        edge: i32,
        node_a: i32,
        node_b: i32,
        link_a: i32,
        link_b: i32,
        dist: i32,
        flags: i32,
    ) {
        let (node_a, node_b, link_a, link_b, flags) = if node_a > node_b {
            let swapped = self.codec().swap_direction(flags);
            (node_b, node_a, link_b, link_a, swapped)
        } else {
            (node_a, node_b, link_a, link_b, flags)
        };
        let pointer = edge_ptr(edge);
        self.edges.set_int(pointer + E_NODEA, node_a);
        self.edges.set_int(pointer + E_NODEB, node_b);
        self.edges.set_int(pointer + E_LINKA, link_a);
        self.edges.set_int(pointer + E_LINKB, link_b);
        self.edges.set_int(pointer + E_DIST, dist);
        self.edges.set_int(pointer + E_FLAGS, flags);
    }

    pub(crate) fn head_edge(&self, node: i32) -> i32 {
        self.nodes.get_int(node_ptr(node) + N_EDGE_REF)
    }

    pub(crate) fn other_node(&self, node: i32, edge_pointer: u64) -> i32 {
        let node_a = self.edges.get_int(edge_pointer + E_NODEA);
        if node_a == node {
            self.edges.get_int(edge_pointer + E_NODEB)
        } else {
            node_a
        }
    }

    pub(crate) fn edge_int(&self, offset: u64) -> i32 {
        self.edges.get_int(offset)
    }

    pub(crate) fn name_at(&self, edge_pointer: u64) -> Result<String> {
        self.names.get(self.edges.get_int(edge_pointer + E_NAME))
    }

    pub(crate) fn distance_at(&self, edge_pointer: u64) -> f64 {
        int_to_dist(self.edges.get_int(edge_pointer + E_DIST))
    }

    // ----- cursors ---------------------------------------------------

    pub fn explorer(&self) -> EdgeExplorer<'_, AllEdges> {
        EdgeExplorer::new(self, AllEdges)
    }

    pub fn explorer_with<F: EdgeFilter>(&self, filter: F) -> EdgeExplorer<'_, F> {
        EdgeExplorer::new(self, filter)
    }

    pub fn all_edges(&self) -> AllEdgesIter<'_> {
        AllEdgesIter::new(self)
    }

    /// Probes a single edge by id. Returns `Ok(None)` when the edge
    /// exists but neither endpoint equals `expected_adj`; the returned
    /// cursor is based at the opposite endpoint.
    pub fn edge_props(&self, edge: i32, expected_adj: i32) -> Result<Option<SingleEdge<'_>>> {
        if edge <= NO_EDGE || edge >= self.edge_count {
            return Err(GraphError::EdgeOutOfBounds {
                id: edge,
                count: self.edge_count,
            });
        }
        if expected_adj < 0 {
            return Err(GraphError::NodeOutOfBounds {
                id: expected_adj,
                count: self.node_count,
            });
        }
        let pointer = edge_ptr(edge);
        let node_a = self.edges.get_int(pointer + E_NODEA);
        if node_a == NO_NODE {
            return Err(GraphError::EdgeRemoved(edge));
        }
        let node_b = self.edges.get_int(pointer + E_NODEB);
        if expected_adj == node_b {
            Ok(Some(SingleEdge::new(self, edge, node_a, node_b, false)))
        } else if expected_adj == node_a {
            Ok(Some(SingleEdge::new(self, edge, node_b, node_a, true)))
        } else {
            Ok(None)
        }
    }

    // ----- edge mutation ---------------------------------------------

    fn check_edge(&self, edge: i32) -> Result<u64> {
        if edge <= NO_EDGE || edge >= self.edge_count {
            return Err(GraphError::EdgeOutOfBounds {
                id: edge,
                count: self.edge_count,
            });
        }
        let pointer = edge_ptr(edge);
        if self.edges.get_int(pointer + E_NODEA) == NO_NODE {
            return Err(GraphError::EdgeRemoved(edge));
        }
        Ok(pointer)
    }

    pub fn set_edge_distance(&mut self, edge: i32, distance: f64) -> Result<()> {
        let pointer = self.check_edge(edge)?;
        self.edges.set_int(pointer + E_DIST, dist_to_int(distance));
        Ok(())
    }

    /// Stores `flags` as seen from `at.base`; canonical orientation is
    /// restored on the way down.
    pub fn set_edge_flags(&mut self, at: &EdgeRef, flags: i32) -> Result<()> {
        let pointer = self.check_edge(at.edge)?;
        debug_assert!({
            let node_a = self.edges.get_int(pointer + E_NODEA);
            let node_b = self.edges.get_int(pointer + E_NODEB);
            (node_a == at.base && node_b == at.adj) || (node_a == at.adj && node_b == at.base)
        });
        let next_base = self.edges.get_int(link_pos(at.base, at.adj, pointer));
        let next_adj = self.edges.get_int(link_pos(at.adj, at.base, pointer));
        let dist = self.edges.get_int(pointer + E_DIST);
        self.write_edge(at.edge, at.base, at.adj, next_base, next_adj, dist, flags);
        Ok(())
    }

    pub fn set_edge_name(&mut self, edge: i32, name: &str) -> Result<()> {
        let pointer = self.check_edge(edge)?;
        let reference = self.names.put(name)?;
        self.edges.set_int(pointer + E_NAME, reference);
        Ok(())
    }

    pub fn edge_name(&self, edge: i32) -> Result<String> {
        let pointer = self.check_edge(edge)?;
        self.name_at(pointer)
    }

    // ----- geometry heap ---------------------------------------------

    /// Stores the pillar polyline of an edge, oriented from `at.base`
    /// to `at.adj`. An empty slice clears the geometry.
    pub fn set_way_geometry(&mut self, at: &EdgeRef, pillars: &[GeoPoint]) -> Result<()> {
        let pointer = self.check_edge(at.edge)?;
        self.set_way_geometry_at(pillars, pointer, at.base > at.adj)
    }

    /// Fetches the polyline reading from `at.base` to `at.adj`,
    /// including endpoints as requested by `mode`.
    pub fn way_geometry(&self, at: &EdgeRef, mode: GeometryMode) -> Result<Vec<GeoPoint>> {
        let pointer = self.check_edge(at.edge)?;
        self.fetch_way_geometry_at(pointer, at.base > at.adj, mode, at.base, at.adj)
    }

    /// Allocates `pairs * 2 + 1` words on the geometry heap and returns
    /// the previous high-water mark. Nothing is ever reclaimed.
    fn next_geo_ref(&mut self, pairs: i32) -> Result<i32> {
        let reference = self.max_geo_ref;
        let words = pairs
            .checked_mul(2)
            .and_then(|words| words.checked_add(1))
            .ok_or_else(|| GraphError::Corruption("geometry blob too large".into()))?;
        self.max_geo_ref = self
            .max_geo_ref
            .checked_add(words)
            .ok_or_else(|| GraphError::Corruption("geometry heap word space exhausted".into()))?;
        Ok(reference)
    }

    fn set_way_geometry_at(
        &mut self,
        pillars: &[GeoPoint],
        edge_pointer: u64,
        reverse: bool,
    ) -> Result<()> {
        if pillars.is_empty() {
            self.edges.set_int(edge_pointer + E_GEO, 0);
            return Ok(());
        }
        let count = i32::try_from(pillars.len())
            .map_err(|_| GraphError::Corruption("geometry blob too large".into()))?;
        let reference = self.next_geo_ref(count)?;
        self.edges.set_int(edge_pointer + E_GEO, reference);
        let byte_pos = reference as u64 * 4;
        let byte_len = pillars.len() as u64 * 8 + 4;
        self.geometry.inc_capacity(byte_pos + byte_len)?;

        let mut bytes = Vec::with_capacity(byte_len as usize);
        bytes.extend_from_slice(&count.to_le_bytes());
        if reverse {
            for point in pillars.iter().rev() {
                bytes.extend_from_slice(&degree_to_int(point.lat).to_le_bytes());
                bytes.extend_from_slice(&degree_to_int(point.lon).to_le_bytes());
            }
        } else {
            for point in pillars {
                bytes.extend_from_slice(&degree_to_int(point.lat).to_le_bytes());
                bytes.extend_from_slice(&degree_to_int(point.lon).to_le_bytes());
            }
        }
        self.geometry.set_bytes(byte_pos, &bytes);
        Ok(())
    }

    pub(crate) fn fetch_way_geometry_at(
        &self,
        edge_pointer: u64,
        reverse: bool,
        mode: GeometryMode,
        base: i32,
        adj: i32,
    ) -> Result<Vec<GeoPoint>> {
        let reference = self.edges.get_int(edge_pointer + E_GEO);
        let mut stored: Vec<GeoPoint> = Vec::new();
        if reference > 0 {
            let byte_pos = reference as u64 * 4;
            let count = self.geometry.get_int(byte_pos);
            if count < 0 {
                return Err(GraphError::Corruption(format!(
                    "geometry blob at {reference} has negative length"
                )));
            }
            let mut bytes = vec![0u8; count as usize * 8];
            self.geometry.get_bytes(byte_pos + 4, &mut bytes);
            stored.reserve(count as usize);
            for pair in bytes.chunks_exact(8) {
                let lat = i32::from_le_bytes(pair[0..4].try_into().expect("pair has 4 lat bytes"));
                let lon = i32::from_le_bytes(pair[4..8].try_into().expect("pair has 4 lon bytes"));
                stored.push(GeoPoint::new(int_to_degree(lat), int_to_degree(lon)));
            }
        } else if !mode.includes_base() && !mode.includes_adj() {
            return Ok(stored);
        }

        let mut points = Vec::with_capacity(stored.len() + 2);
        if reverse {
            if mode.includes_adj() {
                points.push(self.node_point(adj));
            }
        } else if mode.includes_base() {
            points.push(self.node_point(base));
        }
        points.extend_from_slice(&stored);
        if reverse {
            if mode.includes_base() {
                points.push(self.node_point(base));
            }
            points.reverse();
        } else if mode.includes_adj() {
            points.push(self.node_point(adj));
        }
        Ok(points)
    }

    fn node_point(&self, node: i32) -> GeoPoint {
        GeoPoint::new(self.latitude(node), self.longitude(node))
    }

    // ----- node removal ----------------------------------------------

    pub fn mark_node_removed(&mut self, node: i32) -> Result<()> {
        if node < 0 || node >= self.node_count {
            return Err(GraphError::NodeOutOfBounds {
                id: node,
                count: self.node_count,
            });
        }
        self.removed_nodes
            .get_or_insert_with(BTreeSet::new)
            .insert(node);
        Ok(())
    }

    pub fn is_node_removed(&self, node: i32) -> bool {
        self.removed_nodes
            .as_ref()
            .is_some_and(|set| set.contains(&node))
    }

    pub fn has_pending_removals(&self) -> bool {
        self.removed_nodes.as_ref().is_some_and(|set| !set.is_empty())
    }

    /// Consumes the removal set: disconnects and tombstones every edge
    /// touching a removed node, relocates tail nodes into the freed
    /// slots, and rewrites the affected edge records. Edge slots are
    /// not reclaimed, so `edge_count` is unchanged.
    pub fn optimize(&mut self) -> Result<()> {
        self.require_initialized()?;
        let Some(removed) = self.removed_nodes.take() else {
            return Ok(());
        };
        if removed.is_empty() {
            return Ok(());
        }
        let removed_count = removed.len();
        let invalidated = self.in_place_node_remove(&removed)?;
        self.nodes
            .trim_to(self.node_count as u64 * u64::from(NODE_ENTRY_BYTES))?;
        info!(
            removed = removed_count,
            invalidated,
            nodes = self.node_count,
            "compacted node space"
        );
        Ok(())
    }

    /// Returns the number of edges tombstoned by this pass.
    fn in_place_node_remove(&mut self, removed: &BTreeSet<i32>) -> Result<usize> {
        // Build the relabel map (tail survivor -> freed slot) and the
        // touch set of nodes whose chains reference a removed node.
        let mut relabel: BTreeMap<i32, i32> = BTreeMap::new();
        let mut touched: BTreeSet<i32> = removed.clone();
        let mut tail = self.node_count;
        for &remove_node in removed {
            let mut edge = self.head_edge(remove_node);
            let mut hops = 0;
            while edge != NO_EDGE {
                hops += 1;
                if hops > MAX_EDGES {
                    return Err(chain_overflow(remove_node));
                }
                let pointer = edge_ptr(edge);
                let other = self.other_node(remove_node, pointer);
                touched.insert(other);
                let next = self.edges.get_int(link_pos(remove_node, other, pointer));
                if next == edge {
                    return Err(self_link(edge, remove_node));
                }
                edge = next;
            }
            tail -= 1;
            while tail >= 0 && removed.contains(&tail) {
                tail -= 1;
            }
            if tail >= remove_node {
                relabel.insert(tail, remove_node);
            }
        }

        // Splice out and tombstone every edge ending in a removed node.
        // The ascending walk guarantees a tombstone met mid-chain was
        // invalidated from its node_a side, so its node_b link stays
        // readable.
        let mut invalidated = 0;
        for &node in &touched {
            let mut prev_pointer: Option<u64> = None;
            let mut edge = self.head_edge(node);
            let mut hops = 0;
            while edge != NO_EDGE {
                hops += 1;
                if hops > MAX_EDGES {
                    return Err(chain_overflow(node));
                }
                let pointer = edge_ptr(edge);
                let other = self.other_node(node, pointer);
                let next = self.edges.get_int(link_pos(node, other, pointer));
                if next == edge {
                    return Err(self_link(edge, node));
                }
                if other != NO_NODE && removed.contains(&other) {
                    self.splice_out(node, prev_pointer, next);
                    self.edges.set_int(pointer + E_NODEA, NO_NODE);
                    invalidated += 1;
                } else {
                    prev_pointer = Some(pointer);
                }
                edge = next;
            }
        }

        // Survivors adjacent to a relocating tail node: their edge
        // records carry endpoint ids that are about to go stale.
        let mut move_touched: FxHashSet<i32> = FxHashSet::default();
        for &old_id in relabel.keys() {
            let mut edge = self.head_edge(old_id);
            let mut hops = 0;
            while edge != NO_EDGE {
                hops += 1;
                if hops > MAX_EDGES {
                    return Err(chain_overflow(old_id));
                }
                let pointer = edge_ptr(edge);
                let other = self.other_node(old_id, pointer);
                let next = self.edges.get_int(link_pos(old_id, other, pointer));
                if next == edge {
                    return Err(self_link(edge, old_id));
                }
                edge = next;
                if other == NO_NODE {
                    continue;
                }
                if removed.contains(&other) {
                    return Err(GraphError::Corruption(format!(
                        "node {old_id} still linked to removed node {other} after disconnect"
                    )));
                }
                move_touched.insert(other);
            }
        }

        // Move tail node records into the freed slots. The edge_ref
        // travels with the record, so chains stay intact; only endpoint
        // ids inside edge records are stale now.
        let mut record = [0u8; NODE_ENTRY_BYTES as usize];
        for (&old_id, &new_id) in &relabel {
            self.nodes.get_bytes(node_ptr(old_id), &mut record);
            self.nodes.set_bytes(node_ptr(new_id), &record);
        }

        // Rewrite every edge referencing a relocated endpoint. Routing
        // through write_edge restores canonical orientation; when the
        // endpoint order flips, the stored pillar sequence flips too.
        for edge in 0..self.edge_count {
            let pointer = edge_ptr(edge);
            let node_a = self.edges.get_int(pointer + E_NODEA);
            if node_a == NO_NODE {
                continue;
            }
            let node_b = self.edges.get_int(pointer + E_NODEB);
            if !move_touched.contains(&node_a) && !move_touched.contains(&node_b) {
                continue;
            }
            let updated_a = relabel.get(&node_a).copied().unwrap_or(node_a);
            let updated_b = relabel.get(&node_b).copied().unwrap_or(node_b);
            let link_a = self.edges.get_int(link_pos(node_a, node_b, pointer));
            let link_b = self.edges.get_int(link_pos(node_b, node_a, pointer));
            let dist = self.edges.get_int(pointer + E_DIST);
            let flags = self.edges.get_int(pointer + E_FLAGS);
            self.write_edge(edge, updated_a, updated_b, link_a, link_b, dist, flags);
            if (updated_a < updated_b) != (node_a < node_b) {
                let pillars = self.fetch_way_geometry_at(
                    pointer,
                    true,
                    GeometryMode::PillarsOnly,
                    NO_NODE,
                    NO_NODE,
                )?;
                self.set_way_geometry_at(&pillars, pointer, false)?;
            }
        }

        self.node_count -= removed.len() as i32;

        #[cfg(debug_assertions)]
        self.verify_node_removal()?;

        Ok(invalidated)
    }

    /// Redirects the pointer that used to reach a spliced-out edge:
    /// either the node's chain head or the link field of the previous
    /// surviving edge.
    fn splice_out(&mut self, node: i32, prev_pointer: Option<u64>, next: i32) {
        match prev_pointer {
            None => self.nodes.set_int(node_ptr(node) + N_EDGE_REF, next),
            Some(pointer) => {
                let link = if self.edges.get_int(pointer + E_NODEA) == node {
                    pointer + E_LINKA
                } else {
                    pointer + E_LINKB
                };
                self.edges.set_int(link, next);
            }
        }
    }

    #[cfg(debug_assertions)]
    fn verify_node_removal(&self) -> Result<()> {
        for edge in 0..self.edge_count {
            let pointer = edge_ptr(edge);
            let node_a = self.edges.get_int(pointer + E_NODEA);
            if node_a == NO_NODE {
                continue;
            }
            let node_b = self.edges.get_int(pointer + E_NODEB);
            if node_a < 0 || node_b < 0 || node_a >= self.node_count || node_b >= self.node_count {
                return Err(GraphError::Corruption(format!(
                    "edge {edge} references {node_a}-{node_b} outside the {} remaining nodes",
                    self.node_count
                )));
            }
        }
        for node in 0..self.node_count {
            let mut edge = self.head_edge(node);
            let mut hops = 0;
            while edge != NO_EDGE {
                hops += 1;
                if hops > MAX_EDGES {
                    return Err(chain_overflow(node));
                }
                let pointer = edge_ptr(edge);
                let node_a = self.edges.get_int(pointer + E_NODEA);
                let node_b = self.edges.get_int(pointer + E_NODEB);
                if node_a == NO_NODE {
                    return Err(GraphError::Corruption(format!(
                        "chain of node {node} reaches tombstoned edge {edge}"
                    )));
                }
                if node_a != node && node_b != node {
                    return Err(GraphError::Corruption(format!(
                        "chain of node {node} reaches foreign edge {edge} ({node_a}-{node_b})"
                    )));
                }
                let other = self.other_node(node, pointer);
                edge = self.edges.get_int(link_pos(node, other, pointer));
            }
        }
        Ok(())
    }
}

fn chain_overflow(node: i32) -> GraphError {
    GraphError::CorruptChain(format!(
        "no end of adjacency chain for node {node} within {MAX_EDGES} edges"
    ))
}

fn self_link(edge: i32, node: i32) -> GraphError {
    GraphError::CorruptChain(format!("edge {edge} links to itself on node {node}"))
}
