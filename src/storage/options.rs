use std::path::PathBuf;

use crate::codec::FlagsCodec;
use crate::error::{GraphError, Result};
use crate::store::{AccessKind, Directory};

use super::graph::GraphStore;

/// Builder for a [`GraphStore`] and its backing directory.
///
/// A builder without a location yields a purely in-memory graph. With a
/// location the access kind defaults to [`AccessKind::RamStore`].
pub struct GraphStoreBuilder {
    location: Option<PathBuf>,
    access: Option<AccessKind>,
    segment_size: Option<u32>,
    codec: Option<Box<dyn FlagsCodec>>,
}

impl GraphStoreBuilder {
    pub fn new() -> Self {
        Self {
            location: None,
            access: None,
            segment_size: None,
            codec: None,
        }
    }

    pub fn location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    pub fn access(mut self, kind: AccessKind) -> Self {
        self.access = Some(kind);
        self
    }

    pub fn segment_size(mut self, bytes: u32) -> Self {
        self.segment_size = Some(bytes);
        self
    }

    pub fn codec(mut self, codec: Box<dyn FlagsCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Constructs the store; callers then `create` or `load_existing`.
    pub fn build(self) -> Result<GraphStore> {
        let dir = match self.location {
            Some(path) => Directory::open(path, self.access.unwrap_or(AccessKind::RamStore))?,
            None => {
                if self.access.is_some_and(AccessKind::is_persistent) {
                    return Err(GraphError::NotConfigured(
                        "persistent access kinds need a location",
                    ));
                }
                Directory::ram()
            }
        };
        let mut store = GraphStore::new(dir, self.codec)?;
        if let Some(bytes) = self.segment_size {
            store.set_segment_size(bytes)?;
        }
        Ok(store)
    }

    /// Builds and immediately creates empty regions of `byte_count`.
    pub fn create(self, byte_count: u64) -> Result<GraphStore> {
        let mut store = self.build()?;
        store.create(byte_count)?;
        Ok(store)
    }
}

impl Default for GraphStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
