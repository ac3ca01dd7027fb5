//! Stable 128-bit object identifiers.
//!
//! A [`Guid`] stands in for a live object reference inside a serialized
//! prefab document. Live handles ([`ObjectId`](crate::ObjectId)) are only
//! valid within one [`Scene`](crate::Scene); GUIDs survive save/load
//! cycles and are the keys of the load-time GUID → object map.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A globally unique, stable object identifier.
///
/// The nil GUID is a sentinel meaning "no object" on the wire.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guid(Uuid);

impl Guid {
    /// The nil GUID. Never assigned to a live object.
    pub const NIL: Self = Self(Uuid::nil());

    /// Mint a fresh random GUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns `true` for the nil sentinel.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Reconstruct a GUID from its 16 raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// The 16 raw bytes of this GUID, as written to the wire.
    pub fn to_bytes(self) -> [u8; 16] {
        *self.0.as_bytes()
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::NIL
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.0.simple())
    }
}
