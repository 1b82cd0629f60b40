//! Identifier newtypes.
//!
//! Type-safe wrappers around the raw integers found in the on-disk format,
//! preventing accidental mixing of object identifiers, transaction ids and
//! log positions.

use serde::Serialize;
use std::fmt;

/// Object identifier.
///
/// A 32-bit value naming a database, relation, attribute or type across the
/// cluster. Zero is never a valid object.
///
/// # Example
///
/// ```rust
/// use pgsift_common::types::Oid;
///
/// let oid = Oid::new(1262);
/// assert_eq!(oid.as_u32(), 1262);
/// assert!(oid.is_valid());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
pub struct Oid(u32);

impl Oid {
    /// The invalid (zero) object identifier.
    pub const INVALID: Self = Self(0);

    /// First OID assigned to user-created objects.
    pub const FIRST_NORMAL: Self = Self(16384);

    /// Creates an `Oid` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(oid: u32) -> Self {
        Self(oid)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true unless this is the zero sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Oid {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<u32> for Oid {
    #[inline]
    fn from(oid: u32) -> Self {
        Self(oid)
    }
}

impl From<Oid> for u32 {
    #[inline]
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

/// Transaction identifier.
///
/// Found in tuple headers (`xmin`/`xmax`) and WAL records. Zero is invalid;
/// ids 1 and 2 are reserved by the engine for bootstrap and frozen tuples.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
pub struct TransactionId(u32);

impl TransactionId {
    /// The invalid (zero) transaction id.
    pub const INVALID: Self = Self(0);

    /// Creates a `TransactionId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(xid: u32) -> Self {
        Self(xid)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true unless this is the zero sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Log sequence number: a 64-bit position in the write-ahead log.
///
/// Displayed the way the engine prints it, as `high/low` hex halves.
///
/// # Example
///
/// ```rust
/// use pgsift_common::types::Lsn;
///
/// let lsn = Lsn::new(0x1_04F0_2290);
/// assert_eq!(lsn.to_string(), "1/4F02290");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
pub struct Lsn(u64);

impl Lsn {
    /// The invalid (zero) position.
    pub const INVALID: Self = Self(0);

    /// Creates an `Lsn` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    /// Reconstructs an `Lsn` from its stored halves (high word first).
    #[inline]
    #[must_use]
    pub const fn from_parts(hi: u32, lo: u32) -> Self {
        Self(((hi as u64) << 32) | lo as u64)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true unless this is the zero sentinel.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lsn({self})")
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}/{:X}", self.0 >> 32, self.0 & 0xFFFF_FFFF)
    }
}

impl From<u64> for Lsn {
    #[inline]
    fn from(lsn: u64) -> Self {
        Self(lsn)
    }
}
