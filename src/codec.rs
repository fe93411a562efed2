//! Direction/access flag codec for the 32-bit flags word stored in each
//! edge record.
//!
//! All stored flags are oriented from the canonically lower endpoint to
//! the higher one; readers observing an edge from the other side apply
//! [`FlagsCodec::swap_direction`] at read time.

use crate::error::{GraphError, Result};

/// Interprets the per-edge flags word.
///
/// Implementations must be pure: the same input always yields the same
/// output, and [`FlagsCodec::fingerprint`] must be stable across runs
/// because it is persisted and cross-checked on load.
pub trait FlagsCodec {
    /// Flags for a freshly inserted edge, open in one or both directions.
    fn default_flags(&self, both_directions: bool) -> i32;

    /// Mirrors the directional bits; everything else passes through.
    fn swap_direction(&self, flags: i32) -> i32;

    fn is_forward(&self, flags: i32) -> bool;

    fn is_backward(&self, flags: i32) -> bool;

    /// Human-readable list of the encoders baked into this codec,
    /// persisted alongside the graph.
    fn encoder_list(&self) -> String;

    /// Stable hash of the encoder list, stored in the edges header.
    fn fingerprint(&self) -> i32 {
        fnv1a(self.encoder_list().as_bytes())
    }
}

const FORWARD: i32 = 0x1;
const BACKWARD: i32 = 0x2;
const DIRECTION_MASK: i32 = FORWARD | BACKWARD;

/// Single-vehicle codec: bit 0 is travel along the stored direction,
/// bit 1 against it. Higher bits pass through untouched.
#[derive(Clone, Debug)]
pub struct VehicleFlagsCodec {
    vehicle: String,
}

impl VehicleFlagsCodec {
    pub fn new(vehicle: impl Into<String>) -> Self {
        Self {
            vehicle: vehicle.into(),
        }
    }

    pub fn car() -> Self {
        Self::new("car")
    }
}

impl FlagsCodec for VehicleFlagsCodec {
    fn default_flags(&self, both_directions: bool) -> i32 {
        if both_directions {
            FORWARD | BACKWARD
        } else {
            FORWARD
        }
    }

    fn swap_direction(&self, flags: i32) -> i32 {
        let dir = flags & DIRECTION_MASK;
        if dir == FORWARD || dir == BACKWARD {
            return flags ^ DIRECTION_MASK;
        }
        flags
    }

    fn is_forward(&self, flags: i32) -> bool {
        flags & FORWARD != 0
    }

    fn is_backward(&self, flags: i32) -> bool {
        flags & BACKWARD != 0
    }

    fn encoder_list(&self) -> String {
        self.vehicle.clone()
    }
}

/// Rebuilds a codec from the encoder list persisted in the properties
/// region. Used by the load path when no codec was configured up front.
pub fn codec_for_list(list: &str) -> Result<Box<dyn FlagsCodec>> {
    let vehicle = list.trim();
    if vehicle.is_empty() || !vehicle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GraphError::Corruption(format!(
            "unusable encoder list {list:?} in stored graph"
        )));
    }
    Ok(Box::new(VehicleFlagsCodec::new(vehicle.to_ascii_lowercase())))
}

fn fnv1a(bytes: &[u8]) -> i32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash as i32
}
