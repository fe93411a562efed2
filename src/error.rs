use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage not configured: {0}")]
    NotConfigured(&'static str),
    #[error("storage already initialized: {0}")]
    AlreadyInitialized(&'static str),
    #[error("corruption detected: {0}")]
    Corruption(String),
    #[error("edge id {id} out of bounds [0, {count})")]
    EdgeOutOfBounds { id: i32, count: i32 },
    #[error("node id {id} out of bounds [0, {count})")]
    NodeOutOfBounds { id: i32, count: i32 },
    #[error("edge {0} already removed")]
    EdgeRemoved(i32),
    #[error("too many edges, the edge id space is exhausted")]
    TooManyEdges,
    #[error("adjacency chain corrupt: {0}")]
    CorruptChain(String),
    #[error("cursor must advance before detaching")]
    DetachBeforeAdvance,
}
