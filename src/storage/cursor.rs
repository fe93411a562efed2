//! Read cursors over the edge table.
//!
//! Every cursor borrows the store immutably, so the borrow checker
//! rules out traversal during mutation. Writes go through `&mut
//! GraphStore` methods addressed by a detached [`EdgeRef`].

use crate::error::{GraphError, Result};
use crate::geo::GeoPoint;

use super::graph::{
    edge_ptr, link_pos, GeometryMode, GraphStore, E_FLAGS, E_NODEA, E_NODEB, MAX_EDGES, NO_EDGE,
    NO_NODE,
};

/// Detached edge position: the id plus the orientation it was observed
/// in. Any structural mutation of the graph invalidates it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EdgeRef {
    pub edge: i32,
    pub base: i32,
    pub adj: i32,
}

/// Edge view handed to filters during a chain walk; `flags` are already
/// oriented from `base` to `adj`.
#[derive(Clone, Copy, Debug)]
pub struct CandidateEdge {
    pub edge: i32,
    pub base: i32,
    pub adj: i32,
    pub flags: i32,
    pub distance: f64,
}

pub trait EdgeFilter {
    fn accept(&self, edge: &CandidateEdge) -> bool;
}

/// Accepts every edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllEdges;

impl EdgeFilter for AllEdges {
    fn accept(&self, _edge: &CandidateEdge) -> bool {
        true
    }
}

/// Adapter turning a closure into an [`EdgeFilter`].
pub struct FilterFn<F>(pub F);

impl<F: Fn(&CandidateEdge) -> bool> EdgeFilter for FilterFn<F> {
    fn accept(&self, edge: &CandidateEdge) -> bool {
        (self.0)(edge)
    }
}

/// Per-node adjacency iterator.
///
/// Position with [`EdgeExplorer::set_base_node`], then advance with
/// [`EdgeExplorer::next`]; the getters describe the current edge as
/// seen from the base node.
pub struct EdgeExplorer<'g, F = AllEdges> {
    store: &'g GraphStore,
    filter: F,
    base: i32,
    next_edge: i32,
    edge_id: i32,
    adj: i32,
    edge_pointer: u64,
    advanced: bool,
}

impl<'g, F: EdgeFilter> EdgeExplorer<'g, F> {
    pub(crate) fn new(store: &'g GraphStore, filter: F) -> Self {
        Self {
            store,
            filter,
            base: NO_NODE,
            next_edge: NO_EDGE,
            edge_id: NO_EDGE,
            adj: NO_NODE,
            edge_pointer: 0,
            advanced: false,
        }
    }

    pub fn set_base_node(&mut self, node: i32) -> Result<()> {
        if node < 0 || node >= self.store.node_count() {
            return Err(GraphError::NodeOutOfBounds {
                id: node,
                count: self.store.node_count(),
            });
        }
        self.base = node;
        self.next_edge = self.store.head_edge(node);
        self.edge_id = self.next_edge;
        self.advanced = false;
        Ok(())
    }

    /// Advances to the next filter-accepted edge of the base node.
    pub fn next(&mut self) -> Result<bool> {
        let mut scanned = 0;
        loop {
            if self.next_edge == NO_EDGE {
                return Ok(false);
            }
            if scanned >= MAX_EDGES {
                return Err(GraphError::CorruptChain(format!(
                    "no end of adjacency chain for node {} within {MAX_EDGES} edges",
                    self.base
                )));
            }
            scanned += 1;
            self.edge_id = self.next_edge;
            self.edge_pointer = edge_ptr(self.edge_id);
            self.adj = self.store.other_node(self.base, self.edge_pointer);
            self.next_edge = self
                .store
                .edge_int(link_pos(self.base, self.adj, self.edge_pointer));
            if self.next_edge == self.edge_id {
                return Err(GraphError::CorruptChain(format!(
                    "edge {} links to itself on node {}",
                    self.edge_id, self.base
                )));
            }
            self.advanced = true;
            let candidate = CandidateEdge {
                edge: self.edge_id,
                base: self.base,
                adj: self.adj,
                flags: self.flags(),
                distance: self.distance(),
            };
            if self.filter.accept(&candidate) {
                return Ok(true);
            }
        }
    }

    pub fn edge(&self) -> i32 {
        self.edge_id
    }

    pub fn base_node(&self) -> i32 {
        self.base
    }

    pub fn adj_node(&self) -> i32 {
        self.adj
    }

    pub fn distance(&self) -> f64 {
        self.store.distance_at(self.edge_pointer)
    }

    /// Flags as seen from the base node.
    pub fn flags(&self) -> i32 {
        let stored = self.store.edge_int(self.edge_pointer + E_FLAGS);
        if self.base > self.adj {
            self.store.codec().swap_direction(stored)
        } else {
            stored
        }
    }

    pub fn name(&self) -> Result<String> {
        self.store.name_at(self.edge_pointer)
    }

    /// Polyline from the base node to the adjacent node.
    pub fn way_geometry(&self, mode: GeometryMode) -> Result<Vec<GeoPoint>> {
        self.store.fetch_way_geometry_at(
            self.edge_pointer,
            self.base > self.adj,
            mode,
            self.base,
            self.adj,
        )
    }

    pub fn detach(&self) -> Result<EdgeRef> {
        if !self.advanced {
            return Err(GraphError::DetachBeforeAdvance);
        }
        Ok(EdgeRef {
            edge: self.edge_id,
            base: self.base,
            adj: self.adj,
        })
    }
}

/// Linear scan over every live edge record, skipping tombstones. Reads
/// the stored, canonical orientation; flag mutation must go through a
/// per-node cursor that carries orientation.
pub struct AllEdgesIter<'g> {
    store: &'g GraphStore,
    edge_id: i32,
    node_a: i32,
}

impl<'g> AllEdgesIter<'g> {
    pub(crate) fn new(store: &'g GraphStore) -> Self {
        Self {
            store,
            edge_id: NO_EDGE,
            node_a: NO_NODE,
        }
    }

    pub fn next(&mut self) -> bool {
        while self.edge_id + 1 < self.store.edge_count() {
            self.edge_id += 1;
            self.node_a = self.store.edge_int(edge_ptr(self.edge_id) + E_NODEA);
            if self.node_a != NO_NODE {
                return true;
            }
        }
        false
    }

    pub fn max_id(&self) -> i32 {
        self.store.edge_count()
    }

    pub fn edge(&self) -> i32 {
        self.edge_id
    }

    pub fn base_node(&self) -> i32 {
        self.node_a
    }

    pub fn adj_node(&self) -> i32 {
        self.store.edge_int(edge_ptr(self.edge_id) + E_NODEB)
    }

    pub fn distance(&self) -> f64 {
        self.store.distance_at(edge_ptr(self.edge_id))
    }

    /// The stored flags word, always canonical.
    pub fn flags(&self) -> i32 {
        self.store.edge_int(edge_ptr(self.edge_id) + E_FLAGS)
    }

    pub fn name(&self) -> Result<String> {
        self.store.name_at(edge_ptr(self.edge_id))
    }

    pub fn way_geometry(&self, mode: GeometryMode) -> Result<Vec<GeoPoint>> {
        let adj = self.adj_node();
        self.store.fetch_way_geometry_at(
            edge_ptr(self.edge_id),
            self.node_a > adj,
            mode,
            self.node_a,
            adj,
        )
    }

    pub fn detach(&self) -> Result<EdgeRef> {
        if self.edge_id <= NO_EDGE || self.node_a == NO_NODE {
            return Err(GraphError::DetachBeforeAdvance);
        }
        Ok(EdgeRef {
            edge: self.edge_id,
            base: self.node_a,
            adj: self.adj_node(),
        })
    }
}

/// Snapshot cursor for one edge, produced by
/// [`GraphStore::edge_props`]. The base node is the endpoint opposite
/// the probe's expected adjacent node; `switch_flags` keeps the flags
/// consistent with that view.
pub struct SingleEdge<'g> {
    store: &'g GraphStore,
    edge_id: i32,
    base: i32,
    adj: i32,
    switch_flags: bool,
}

impl<'g> SingleEdge<'g> {
    pub(crate) fn new(
        store: &'g GraphStore,
        edge_id: i32,
        base: i32,
        adj: i32,
        switch_flags: bool,
    ) -> Self {
        Self {
            store,
            edge_id,
            base,
            adj,
            switch_flags,
        }
    }

    pub fn edge(&self) -> i32 {
        self.edge_id
    }

    pub fn base_node(&self) -> i32 {
        self.base
    }

    pub fn adj_node(&self) -> i32 {
        self.adj
    }

    pub fn distance(&self) -> f64 {
        self.store.distance_at(edge_ptr(self.edge_id))
    }

    pub fn flags(&self) -> i32 {
        let stored = self.store.edge_int(edge_ptr(self.edge_id) + E_FLAGS);
        if self.switch_flags {
            self.store.codec().swap_direction(stored)
        } else {
            stored
        }
    }

    pub fn name(&self) -> Result<String> {
        self.store.name_at(edge_ptr(self.edge_id))
    }

    pub fn way_geometry(&self, mode: GeometryMode) -> Result<Vec<GeoPoint>> {
        self.store.fetch_way_geometry_at(
            edge_ptr(self.edge_id),
            self.base > self.adj,
            mode,
            self.base,
            self.adj,
        )
    }

    pub fn edge_ref(&self) -> EdgeRef {
        EdgeRef {
            edge: self.edge_id,
            base: self.base,
            adj: self.adj,
        }
    }
}
