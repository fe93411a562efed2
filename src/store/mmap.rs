use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use memmap2::MmapMut;

use crate::error::{GraphError, Result};

use super::{
    align_to_segments, decode_region_header, encode_region_header, read_header_slot,
    write_header_slot, DataAccess, DEFAULT_SEGMENT_BYTES, REGION_HEADER_BYTES,
};

/// Memory-mapped region. The header occupies the first bytes of the
/// map; growth re-extends the file and remaps.
pub struct MmapAccess {
    name: String,
    path: PathBuf,
    file: Option<File>,
    map: Option<MmapMut>,
    capacity: u64,
    segment_size: u32,
}

impl MmapAccess {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
            file: None,
            map: None,
            capacity: 0,
            segment_size: DEFAULT_SEGMENT_BYTES,
        }
    }

    fn map(&self) -> &MmapMut {
        self.map.as_ref().expect("region is open")
    }

    fn map_mut(&mut self) -> &mut MmapMut {
        self.map.as_mut().expect("region is open")
    }

    fn remap(&mut self, file_len: u64) -> Result<()> {
        self.map = None;
        let file = self.file.as_ref().expect("region is open");
        file.set_len(file_len)?;
        self.map = Some(unsafe { MmapMut::map_mut(file)? });
        Ok(())
    }
}

impl DataAccess for MmapAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self, initial_bytes: u64) -> Result<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        self.file = Some(file);
        self.capacity = align_to_segments(initial_bytes.max(1), self.segment_size);
        self.remap(REGION_HEADER_BYTES + self.capacity)?;
        let capacity = self.capacity;
        let segment_size = self.segment_size;
        encode_region_header(&mut self.map_mut()[..], capacity, segment_size);
        Ok(())
    }

    fn load_existing(&mut self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let file_len = file.metadata()?.len();
        if file_len < REGION_HEADER_BYTES {
            return Err(GraphError::Corruption(format!(
                "region {} file shorter than its header",
                self.name
            )));
        }
        let map = unsafe { MmapMut::map_mut(&file)? };
        let (capacity, segment_size) =
            decode_region_header(&self.name, &map[..REGION_HEADER_BYTES as usize])?;
        if file_len < REGION_HEADER_BYTES + capacity {
            return Err(GraphError::Corruption(format!(
                "region {} file truncated",
                self.name
            )));
        }
        self.file = Some(file);
        self.map = Some(map);
        self.capacity = capacity;
        self.segment_size = segment_size;
        Ok(true)
    }

    fn flush(&mut self) -> Result<()> {
        let capacity = self.capacity;
        let segment_size = self.segment_size;
        encode_region_header(&mut self.map_mut()[..], capacity, segment_size);
        self.map().flush()?;
        Ok(())
    }

    fn close(&mut self) {
        self.map = None;
        self.file = None;
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn inc_capacity(&mut self, new_bytes: u64) -> Result<bool> {
        if new_bytes <= self.capacity {
            return Ok(false);
        }
        self.capacity = align_to_segments(new_bytes, self.segment_size);
        self.remap(REGION_HEADER_BYTES + self.capacity)?;
        Ok(true)
    }

    fn trim_to(&mut self, bytes: u64) -> Result<()> {
        let wanted = align_to_segments(bytes, self.segment_size);
        if wanted >= self.capacity {
            return Ok(());
        }
        self.capacity = wanted;
        self.remap(REGION_HEADER_BYTES + self.capacity)?;
        Ok(())
    }

    fn get_bytes(&self, offset: u64, buf: &mut [u8]) {
        let at = (REGION_HEADER_BYTES + offset) as usize;
        buf.copy_from_slice(&self.map()[at..at + buf.len()]);
    }

    fn set_bytes(&mut self, offset: u64, bytes: &[u8]) {
        let at = (REGION_HEADER_BYTES + offset) as usize;
        self.map_mut()[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn get_header(&self, slot_offset: u32) -> i32 {
        read_header_slot(&self.map()[..REGION_HEADER_BYTES as usize], slot_offset)
    }

    fn set_header(&mut self, slot_offset: u32, value: i32) {
        write_header_slot(
            &mut self.map_mut()[..REGION_HEADER_BYTES as usize],
            slot_offset,
            value,
        );
    }

    fn set_segment_size(&mut self, bytes: u32) -> Result<()> {
        if self.map.is_some() {
            return Err(GraphError::AlreadyInitialized("segment size after create"));
        }
        self.segment_size = bytes.max(4).next_multiple_of(4);
        Ok(())
    }

    fn segment_size(&self) -> u32 {
        self.segment_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_write_reload_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("region");

        {
            let mut access = MmapAccess::new("region", path.clone());
            access.set_segment_size(64).expect("segment size");
            access.create(64).expect("create");
            access.set_int(0, i32::MIN);
            access.set_int(60, 7);
            access.set_header(8, 99);
            access.flush().expect("flush");
            access.close();
        }

        let mut access = MmapAccess::new("region", path);
        assert!(access.load_existing().expect("load"));
        assert_eq!(access.segment_size(), 64);
        assert_eq!(access.get_int(0), i32::MIN);
        assert_eq!(access.get_int(60), 7);
        assert_eq!(access.get_header(8), 99);
    }

    #[test]
    fn growth_zero_fills_new_capacity() {
        let dir = TempDir::new().expect("temp dir");
        let mut access = MmapAccess::new("region", dir.path().join("region"));
        access.set_segment_size(32).expect("segment size");
        access.create(32).expect("create");
        assert!(access.inc_capacity(100).expect("grow"));
        assert_eq!(access.capacity(), 128);
        assert_eq!(access.get_int(96), 0);
    }

    #[test]
    fn trim_never_grows() {
        let dir = TempDir::new().expect("temp dir");
        let mut access = MmapAccess::new("region", dir.path().join("region"));
        access.set_segment_size(32).expect("segment size");
        access.create(96).expect("create");
        access.trim_to(40).expect("trim");
        assert_eq!(access.capacity(), 64);
        access.trim_to(512).expect("trim beyond capacity");
        assert_eq!(access.capacity(), 64);
    }
}
