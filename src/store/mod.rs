//! Byte-addressable region storage.
//!
//! Each region is an independently growable array of bytes with a small
//! fixed header, addressed by name through a [`Directory`]. The graph
//! core only ever consumes the [`DataAccess`] contract; whether a region
//! lives on the heap, is file-backed, or memory-mapped is invisible to
//! it apart from flush cost.
//!
//! Region file layout (little-endian throughout):
//!
//! ```text
//! 0..4    magic
//! 4..12   body capacity in bytes
//! 12..16  segment size
//! 20..48  seven user header slots
//! 48..100 reserved
//! 100..   body
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GraphError, Result};

mod mmap;
mod ram;

pub use mmap::MmapAccess;
pub use ram::RamAccess;

pub(crate) const REGION_MAGIC: i32 = 0x5652_4441;
pub(crate) const REGION_HEADER_BYTES: u64 = 100;
pub(crate) const USER_SLOT_BASE: usize = 20;
pub(crate) const USER_SLOTS: u32 = 7;

pub const DEFAULT_SEGMENT_BYTES: u32 = 1 << 20;

/// Random-access byte region with a seven-slot header.
///
/// Offsets address the body only; the header is reached through
/// `get_header`/`set_header`. Out-of-range body access is a caller bug
/// and panics rather than corrupting silently.
pub trait DataAccess {
    fn name(&self) -> &str;

    /// Allocates a fresh body of at least `initial_bytes`, discarding
    /// any previous content.
    fn create(&mut self, initial_bytes: u64) -> Result<()>;

    /// Loads a previously flushed region. `Ok(false)` means nothing was
    /// persisted under this name; a malformed file is an error.
    fn load_existing(&mut self) -> Result<bool>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self);

    fn capacity(&self) -> u64;

    /// Grows the body to hold at least `new_bytes`, in whole segments.
    /// Returns whether capacity actually changed.
    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool>;

    /// Shrinks the body to the smallest segment multiple covering
    /// `bytes`. Never grows.
    fn trim_to(&mut self, bytes: u64) -> Result<()>;

    fn get_int(&self, offset: u64) -> i32 {
        let mut buf = [0u8; 4];
        self.get_bytes(offset, &mut buf);
        i32::from_le_bytes(buf)
    }

    fn set_int(&mut self, offset: u64, value: i32) {
        self.set_bytes(offset, &value.to_le_bytes());
    }

    fn get_bytes(&self, offset: u64, buf: &mut [u8]);

    fn set_bytes(&mut self, offset: u64, bytes: &[u8]);

    /// Reads one of the seven user header slots; `slot_offset` is the
    /// byte offset of the slot (0, 4, ..., 24).
    fn get_header(&self, slot_offset: u32) -> i32;

    fn set_header(&mut self, slot_offset: u32, value: i32);

    /// Only valid before `create`/`load_existing`; rounded up to a
    /// multiple of 4.
    fn set_segment_size(&mut self, bytes: u32) -> Result<()>;

    fn segment_size(&self) -> u32;

    /// Copies header slots and body into `other`, which must already be
    /// created. `other` keeps its own backing and segment size.
    fn copy_to(&self, other: &mut dyn DataAccess) -> Result<()> {
        other.inc_capacity(self.capacity())?;
        for slot in 0..USER_SLOTS {
            other.set_header(slot * 4, self.get_header(slot * 4));
        }
        let mut buf = [0u8; 8192];
        let total = self.capacity().min(other.capacity());
        let mut offset = 0u64;
        while offset < total {
            let len = ((total - offset) as usize).min(buf.len());
            self.get_bytes(offset, &mut buf[..len]);
            other.set_bytes(offset, &buf[..len]);
            offset += len as u64;
        }
        Ok(())
    }
}

pub(crate) fn align_to_segments(bytes: u64, segment_size: u32) -> u64 {
    let seg = u64::from(segment_size);
    bytes.div_ceil(seg) * seg
}

pub(crate) fn read_header_slot(header: &[u8], slot_offset: u32) -> i32 {
    assert!(slot_offset < USER_SLOTS * 4 && slot_offset % 4 == 0, "bad header slot");
    let at = USER_SLOT_BASE + slot_offset as usize;
    i32::from_le_bytes(header[at..at + 4].try_into().expect("slot is 4 bytes"))
}

pub(crate) fn write_header_slot(header: &mut [u8], slot_offset: u32, value: i32) {
    assert!(slot_offset < USER_SLOTS * 4 && slot_offset % 4 == 0, "bad header slot");
    let at = USER_SLOT_BASE + slot_offset as usize;
    header[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn encode_region_header(header: &mut [u8], capacity: u64, segment_size: u32) {
    header[0..4].copy_from_slice(&REGION_MAGIC.to_le_bytes());
    header[4..12].copy_from_slice(&capacity.to_le_bytes());
    header[12..16].copy_from_slice(&segment_size.to_le_bytes());
}

pub(crate) fn decode_region_header(name: &str, header: &[u8]) -> Result<(u64, u32)> {
    let magic = i32::from_le_bytes(header[0..4].try_into().expect("magic is 4 bytes"));
    if magic != REGION_MAGIC {
        return Err(GraphError::Corruption(format!(
            "region {name} has an unrecognized header"
        )));
    }
    let capacity = u64::from_le_bytes(header[4..12].try_into().expect("capacity is 8 bytes"));
    let segment_size = u32::from_le_bytes(header[12..16].try_into().expect("segment size is 4 bytes"));
    if segment_size == 0 || segment_size % 4 != 0 {
        return Err(GraphError::Corruption(format!(
            "region {name} has segment size {segment_size}"
        )));
    }
    Ok((capacity, segment_size))
}

/// How a [`Directory`] backs its regions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessKind {
    /// Heap only; flush is a no-op and nothing survives the process.
    Ram,
    /// Heap during use, written to one file per region on flush.
    RamStore,
    /// Memory-mapped file per region.
    Mmap,
}

impl AccessKind {
    pub fn is_persistent(self) -> bool {
        !matches!(self, AccessKind::Ram)
    }
}

/// Factory for named regions sharing one base path and access kind.
#[derive(Clone, Debug)]
pub struct Directory {
    base: Option<PathBuf>,
    kind: AccessKind,
}

impl Directory {
    /// Purely in-memory directory; useful for tests and scratch graphs.
    pub fn ram() -> Self {
        Self {
            base: None,
            kind: AccessKind::Ram,
        }
    }

    pub fn open(base: impl AsRef<Path>, kind: AccessKind) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self {
            base: Some(base),
            kind,
        })
    }

    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    pub fn location(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    pub fn find(&self, name: &str) -> Result<Box<dyn DataAccess>> {
        match self.kind {
            AccessKind::Ram => Ok(Box::new(RamAccess::new(name))),
            AccessKind::RamStore => {
                let base = self.require_base()?;
                Ok(Box::new(RamAccess::with_file(name, base.join(name))))
            }
            AccessKind::Mmap => {
                let base = self.require_base()?;
                Ok(Box::new(MmapAccess::new(name, base.join(name))))
            }
        }
    }

    fn require_base(&self) -> Result<&Path> {
        self.base
            .as_deref()
            .ok_or(GraphError::NotConfigured("file-backed regions need a base path"))
    }
}
