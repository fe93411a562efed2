//! Embedded storage engine for road-routing graphs.
//!
//! A graph is a pair of packed record tables over byte-addressable
//! regions: geo-located nodes and undirected edges carrying distance,
//! direction flags, a street-name reference, and an optional pillar
//! polyline. Adjacency is threaded through link fields inside the edge
//! records themselves, so edge ids stay stable while nodes can be
//! relabeled in place after deletions.
//!
//! ```no_run
//! use vereda::{GraphStoreBuilder, VehicleFlagsCodec};
//!
//! let mut graph = GraphStoreBuilder::new()
//!     .codec(Box::new(VehicleFlagsCodec::car()))
//!     .create(1 << 20)?;
//! graph.set_node(0, 52.52, 13.40)?;
//! graph.set_node(1, 52.53, 13.41)?;
//! graph.add_edge_with_defaults(0, 1, 1200.0, true)?;
//!
//! let mut explorer = graph.explorer();
//! explorer.set_base_node(0)?;
//! while explorer.next()? {
//!     println!("0 -> {} ({} m)", explorer.adj_node(), explorer.distance());
//! }
//! # Ok::<(), vereda::GraphError>(())
//! ```

pub mod codec;
pub mod error;
pub mod geo;
pub mod names;
pub mod props;
pub mod storage;
pub mod store;

pub use crate::codec::{codec_for_list, FlagsCodec, VehicleFlagsCodec};
pub use crate::error::{GraphError, Result};
pub use crate::geo::{BoundingBox, GeoPoint};
pub use crate::storage::{
    AllEdges, AllEdgesIter, CandidateEdge, EdgeExplorer, EdgeFilter, EdgeRef, FilterFn,
    GeometryMode, GraphStore, GraphStoreBuilder, SingleEdge, MAX_EDGES, NO_EDGE, NO_NODE,
};
pub use crate::store::{AccessKind, DataAccess, Directory};
