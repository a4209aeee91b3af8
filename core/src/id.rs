use std::{fmt, str::FromStr, time::SystemTime};

use thiserror::Error;
use ulid::Ulid;

/// An error that happens if a string cannot be parsed into an [`ObjectId`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid object ID `{input}': {reason}")]
pub struct InvalidObjectId {
    input: String,
    reason: String,
}

/// Identifies a stored object or a place. IDs are time-ordered, so sorting
/// them yields creation order. The string form is the 26 character Crockford
/// base32 encoding of the underlying ULID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Ulid);

impl ObjectId {
    /// Generates a new unique ID
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Returns the big-endian byte representation. Use this for storage keys
    /// to maintain sort order!
    pub fn to_be_bytes(self) -> [u8; 16] {
        self.0 .0.to_be_bytes()
    }

    /// Restores an ID from its big-endian byte representation
    pub fn from_be_bytes(bytes: [u8; 16]) -> Self {
        Self(Ulid(u128::from_be_bytes(bytes)))
    }

    /// Restores an ID from a slice that must be exactly 16 bytes long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; 16] = bytes.try_into().ok()?;
        Some(Self::from_be_bytes(bytes))
    }

    /// The point in time this ID was generated at
    pub fn timestamp(self) -> SystemTime {
        self.0.datetime()
    }
}

impl From<Ulid> for ObjectId {
    fn from(value: Ulid) -> Self {
        Self(value)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim())
            .map(Self)
            .map_err(|err| InvalidObjectId {
                input: s.to_string(),
                reason: err.to_string(),
            })
    }
}
