//! Graph storage core: packed node/edge tables, adjacency chains,
//! traversal cursors, in-place compaction, and persistence.

mod cursor;
mod graph;
mod options;

pub use cursor::{
    AllEdges, AllEdgesIter, CandidateEdge, EdgeExplorer, EdgeFilter, EdgeRef, FilterFn, SingleEdge,
};
pub use graph::{GeometryMode, GraphStore, MAX_EDGES, NO_EDGE, NO_NODE};
pub use options::GraphStoreBuilder;
