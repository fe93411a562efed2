//! Small persisted key/value map used for format-version and codec
//! bookkeeping, stored as `key=value` lines in its own region.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{GraphError, Result};
use crate::store::DataAccess;

pub const VERSION_NODES: u32 = 1;
pub const VERSION_EDGES: u32 = 1;
pub const VERSION_GEOMETRY: u32 = 1;
pub const VERSION_NAMES: u32 = 1;

const VERSION_KEYS: [(&str, u32); 4] = [
    ("graph.version.nodes", VERSION_NODES),
    ("graph.version.edges", VERSION_EDGES),
    ("graph.version.geometry", VERSION_GEOMETRY),
    ("graph.version.names", VERSION_NAMES),
];

pub struct Properties {
    region: Box<dyn DataAccess>,
    map: BTreeMap<String, String>,
}

impl Properties {
    pub fn new(region: Box<dyn DataAccess>) -> Self {
        Self {
            region,
            map: BTreeMap::new(),
        }
    }

    pub fn create(&mut self, initial_bytes: u64) -> Result<()> {
        self.region.create(initial_bytes.max(16))?;
        self.map.clear();
        Ok(())
    }

    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.region.load_existing()? {
            return Ok(false);
        }
        let len = self.region.get_header(0);
        if len < 0 {
            return Err(GraphError::Corruption("properties length is negative".into()));
        }
        let mut bytes = vec![0u8; len as usize];
        self.region.get_bytes(0, &mut bytes);
        let text = String::from_utf8(bytes)
            .map_err(|_| GraphError::Corruption("properties are not UTF-8".into()))?;
        self.map.clear();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(GraphError::Corruption(format!(
                    "malformed properties line {line:?}"
                )));
            };
            self.map.insert(key.to_owned(), value.to_owned());
        }
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        let mut text = String::new();
        for (key, value) in &self.map {
            text.push_str(key);
            text.push('=');
            text.push_str(value);
            text.push('\n');
        }
        self.region.inc_capacity(text.len() as u64)?;
        self.region.set_bytes(0, text.as_bytes());
        self.region.set_header(0, text.len() as i32);
        self.region.flush()
    }

    pub fn close(&mut self) {
        self.region.close();
    }

    pub fn capacity(&self) -> u64 {
        self.region.capacity()
    }

    pub fn set_segment_size(&mut self, bytes: u32) -> Result<()> {
        self.region.set_segment_size(bytes)
    }

    pub fn put(&mut self, key: &str, value: impl Into<String>) {
        self.map.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Records the current format version of every region.
    pub fn put_current_versions(&mut self) {
        for (key, version) in VERSION_KEYS {
            self.put(key, version.to_string());
        }
    }

    /// Compares stored format versions against this build. With
    /// `strict` a mismatch is fatal; otherwise it is only logged and
    /// reported through the return value.
    pub fn check_versions(&self, strict: bool) -> Result<bool> {
        for (key, expected) in VERSION_KEYS {
            let found = self.get(key);
            if found != Some(expected.to_string().as_str()) {
                if strict {
                    return Err(GraphError::Corruption(format!(
                        "{key} mismatch: stored {found:?}, this build expects {expected}"
                    )));
                }
                warn!(key, ?found, expected, "format version mismatch");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn copy_to(&self, other: &mut Properties) -> Result<()> {
        self.region.copy_to(other.region.as_mut())?;
        other.map = self.map.clone();
        Ok(())
    }
}
