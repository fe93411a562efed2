//! Append-only street-name dictionary.
//!
//! Names are interned into their own region as length-prefixed UTF-8;
//! the returned reference is the byte offset of the record. Offset 0 is
//! reserved for the empty string. Ways usually arrive in runs sharing
//! one name, so the last insertion is memoized.

use tracing::warn;

use crate::error::{GraphError, Result};
use crate::store::DataAccess;

const MAX_NAME_BYTES: usize = 255;

pub struct NameIndex {
    region: Box<dyn DataAccess>,
    byte_pointer: u32,
    last_put: Option<(String, i32)>,
}

impl NameIndex {
    pub fn new(region: Box<dyn DataAccess>) -> Self {
        Self {
            region,
            byte_pointer: 0,
            last_put: None,
        }
    }

    pub fn create(&mut self, initial_bytes: u64) -> Result<()> {
        self.region.create(initial_bytes.max(16))?;
        // offset 0 holds the empty string record
        self.region.set_bytes(0, &[0]);
        self.byte_pointer = 1;
        Ok(())
    }

    pub fn load_existing(&mut self) -> Result<bool> {
        if !self.region.load_existing()? {
            return Ok(false);
        }
        let pointer = self.region.get_header(0);
        if pointer <= 0 {
            return Err(GraphError::Corruption(
                "name dictionary header is missing its high-water mark".into(),
            ));
        }
        self.byte_pointer = pointer as u32;
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.region.set_header(0, self.byte_pointer as i32);
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

    /// Interns `name` and returns its reference. The empty string is
    /// always 0. Names beyond 255 bytes are truncated on a character
    /// boundary.
    pub fn put(&mut self, name: &str) -> Result<i32> {
        if name.is_empty() {
            return Ok(0);
        }
        if let Some((last, reference)) = &self.last_put {
            if last == name {
                return Ok(*reference);
            }
        }
        let mut end = name.len();
        if end > MAX_NAME_BYTES {
            end = MAX_NAME_BYTES;
            while !name.is_char_boundary(end) {
                end -= 1;
            }
            warn!(bytes = end, "street name too long, truncated: {name:?}");
        }
        let bytes = &name.as_bytes()[..end];
        if self.byte_pointer > i32::MAX as u32 - (MAX_NAME_BYTES as u32 + 1) {
            return Err(GraphError::Corruption("name dictionary exhausted".into()));
        }
        let reference = self.byte_pointer as i32;
        self.region
            .inc_capacity(u64::from(self.byte_pointer) + 1 + bytes.len() as u64)?;
        self.region.set_bytes(u64::from(self.byte_pointer), &[bytes.len() as u8]);
        self.region
            .set_bytes(u64::from(self.byte_pointer) + 1, bytes);
        self.byte_pointer += 1 + bytes.len() as u32;
        self.last_put = Some((name.to_owned(), reference));
        Ok(reference)
    }

    pub fn get(&self, reference: i32) -> Result<String> {
        if reference == 0 {
            return Ok(String::new());
        }
        if reference < 0 || reference as u32 >= self.byte_pointer {
            return Err(GraphError::Corruption(format!(
                "name reference {reference} out of bounds"
            )));
        }
        let mut len = [0u8; 1];
        self.region.get_bytes(reference as u64, &mut len);
        let mut bytes = vec![0u8; len[0] as usize];
        self.region.get_bytes(reference as u64 + 1, &mut bytes);
        String::from_utf8(bytes)
            .map_err(|_| GraphError::Corruption(format!("name at {reference} is not UTF-8")))
    }

    pub fn copy_to(&self, other: &mut NameIndex) -> Result<()> {
        self.region.copy_to(other.region.as_mut())?;
        other.byte_pointer = self.byte_pointer;
        other.last_put = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RamAccess;

    fn scratch() -> NameIndex {
        let mut names = NameIndex::new(Box::new(RamAccess::new("names")));
        names.create(64).expect("create");
        names
    }

    #[test]
    fn empty_string_is_reference_zero() {
        let mut names = scratch();
        assert_eq!(names.put("").expect("put"), 0);
        assert_eq!(names.get(0).expect("get"), "");
    }

    #[test]
    fn put_get_round_trip() {
        let mut names = scratch();
        let main = names.put("Main Street").expect("put");
        let elm = names.put("Elm Street").expect("put");
        assert_ne!(main, elm);
        assert_eq!(names.get(main).expect("get"), "Main Street");
        assert_eq!(names.get(elm).expect("get"), "Elm Street");
    }

    #[test]
    fn consecutive_identical_puts_share_a_reference() {
        let mut names = scratch();
        let first = names.put("Ringstraße").expect("put");
        let second = names.put("Ringstraße").expect("put");
        assert_eq!(first, second);
    }

    #[test]
    fn overlong_names_truncate_on_char_boundary() {
        let mut names = scratch();
        let long: String = "ü".repeat(200);
        let reference = names.put(&long).expect("put");
        let stored = names.get(reference).expect("get");
        assert!(stored.len() <= 255);
        assert!(long.starts_with(&stored));
    }

    #[test]
    fn out_of_bounds_reference_is_corruption() {
        let names = scratch();
        assert!(names.get(500).is_err());
        assert!(names.get(-3).is_err());
    }
}
