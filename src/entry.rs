use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

/// The length of an entry, program or alarm: 35 data bytes plus a checksum.
pub const ENTRY_LENGTH: usize = 36;

/// Offset of the checksum byte within an entry.
pub const CHECKSUM_OFFSET: usize = ENTRY_LENGTH - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Program,
    Alarm,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::Program => "program",
            EntryKind::Alarm => "alarm",
        })
    }
}

/// A single checksummed 36 byte record as stored in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    kind: EntryKind,
    bytes: [u8; ENTRY_LENGTH],
}

impl Entry {
    /// Wraps raw bytes, verifying the length and the checksum.
    pub fn new(kind: EntryKind, raw: &[u8]) -> Result<Self> {
        let bytes: [u8; ENTRY_LENGTH] = raw
            .try_into()
            .map_err(|_| Error::WrongLength(raw.len()))?;

        let computed = checksum(&bytes);
        let stored = bytes[CHECKSUM_OFFSET];
        if computed != stored {
            return Err(Error::ChecksumMismatch { computed, stored });
        }

        Ok(Self { kind, bytes })
    }

    /// Builds an entry from its data bytes, filling in the checksum.
    pub fn seal(kind: EntryKind, data: &[u8; CHECKSUM_OFFSET]) -> Self {
        let mut bytes = [0u8; ENTRY_LENGTH];
        bytes[..CHECKSUM_OFFSET].copy_from_slice(data);
        bytes[CHECKSUM_OFFSET] = checksum(&bytes);
        Self { kind, bytes }
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn bytes(&self) -> [u8; ENTRY_LENGTH] {
        self.bytes
    }
}

/// Unsigned sum of the first 35 bytes, truncated to 8 bits.
///
/// Panics if `bytes` is shorter than 35 bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes[..CHECKSUM_OFFSET]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}
