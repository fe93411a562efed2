use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::error::{GraphError, Result};

use super::{
    align_to_segments, decode_region_header, encode_region_header, read_header_slot,
    write_header_slot, DataAccess, DEFAULT_SEGMENT_BYTES, REGION_HEADER_BYTES,
};

/// Heap-resident region made of equally sized segments.
///
/// With a backing path the whole region is written out on `flush` and
/// read back by `load_existing`; without one it is scratch memory.
pub struct RamAccess {
    name: String,
    path: Option<PathBuf>,
    header: [u8; REGION_HEADER_BYTES as usize],
    segments: Vec<Vec<u8>>,
    segment_size: u32,
}

impl RamAccess {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            header: [0; REGION_HEADER_BYTES as usize],
            segments: Vec::new(),
            segment_size: DEFAULT_SEGMENT_BYTES,
        }
    }

    pub fn with_file(name: impl Into<String>, path: PathBuf) -> Self {
        let mut access = Self::new(name);
        access.path = Some(path);
        access
    }

    fn grow_to(&mut self, bytes: u64) {
        let wanted = align_to_segments(bytes, self.segment_size) / u64::from(self.segment_size);
        while (self.segments.len() as u64) < wanted {
            self.segments.push(vec![0; self.segment_size as usize]);
        }
    }
}

impl DataAccess for RamAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self, initial_bytes: u64) -> Result<()> {
        self.segments.clear();
        self.header = [0; REGION_HEADER_BYTES as usize];
        self.grow_to(initial_bytes.max(1));
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }
        let mut file = File::open(&path)?;
        let mut header = [0u8; REGION_HEADER_BYTES as usize];
        file.read_exact(&mut header).map_err(|_| {
            GraphError::Corruption(format!("region {} file shorter than its header", self.name))
        })?;
        let (capacity, segment_size) = decode_region_header(&self.name, &header)?;
        if capacity % u64::from(segment_size) != 0 {
            return Err(GraphError::Corruption(format!(
                "region {} capacity is not segment aligned",
                self.name
            )));
        }
        let mut segments = Vec::with_capacity((capacity / u64::from(segment_size)) as usize);
        let mut remaining = capacity;
        while remaining > 0 {
            let mut segment = vec![0u8; segment_size as usize];
            file.read_exact(&mut segment).map_err(|_| {
                GraphError::Corruption(format!("region {} file truncated", self.name))
            })?;
            segments.push(segment);
            remaining -= u64::from(segment_size);
        }
        self.header = header;
        self.segment_size = segment_size;
        self.segments = segments;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let capacity = self.capacity();
        let segment_size = self.segment_size;
        encode_region_header(&mut self.header, capacity, segment_size);
        let mut file = File::create(&path)?;
        file.write_all(&self.header)?;
        for segment in &self.segments {
            file.write_all(segment)?;
        }
        file.sync_data()?;
        Ok(())
    }

    fn close(&mut self) {
        self.segments.clear();
    }

    fn capacity(&self) -> u64 {
        self.segments.len() as u64 * u64::from(self.segment_size)
    }

    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool> {
        if new_bytes <= self.capacity() {
            return Ok(false);
        }
        self.grow_to(new_bytes);
        Ok(true)
    }

    fn trim_to(&mut self, bytes: u64) -> Result<()> {
        let keep = align_to_segments(bytes, self.segment_size) / u64::from(self.segment_size);
        self.segments.truncate(keep as usize);
        Ok(())
    }

    fn get_bytes(&self, offset: u64, buf: &mut [u8]) {
        let seg = u64::from(self.segment_size);
        let mut at = offset;
        let mut filled = 0;
        while filled < buf.len() {
            let segment = &self.segments[(at / seg) as usize];
            let within = (at % seg) as usize;
            let len = (buf.len() - filled).min(segment.len() - within);
            buf[filled..filled + len].copy_from_slice(&segment[within..within + len]);
            filled += len;
            at += len as u64;
        }
    }

    fn set_bytes(&mut self, offset: u64, bytes: &[u8]) {
        let seg = u64::from(self.segment_size);
        let mut at = offset;
        let mut written = 0;
        while written < bytes.len() {
            let segment = &mut self.segments[(at / seg) as usize];
            let within = (at % seg) as usize;
            let len = (bytes.len() - written).min(segment.len() - within);
            segment[within..within + len].copy_from_slice(&bytes[written..written + len]);
            written += len;
            at += len as u64;
        }
    }

    fn get_header(&self, slot_offset: u32) -> i32 {
        read_header_slot(&self.header, slot_offset)
    }

    fn set_header(&mut self, slot_offset: u32, value: i32) {
        write_header_slot(&mut self.header, slot_offset, value);
    }

    fn set_segment_size(&mut self, bytes: u32) -> Result<()> {
        if !self.segments.is_empty() {
            return Err(GraphError::AlreadyInitialized("segment size after create"));
        }
        self.segment_size = bytes.max(4).next_multiple_of(4);
        Ok(())
    }

    fn segment_size(&self) -> u32 {
        self.segment_size
    }
}
