//! Fixed-width identifiers: [`HatId`] (256 bits) and [`Address`] (160 bits).
//!
//! Both are stored big-endian so that byte order equals numeric order, and
//! both expose their raw bytes through `zerocopy`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::HatsError;
use crate::layout::{self, MAX_LEVELS};
use crate::Domain;

/// A hat identifier.
///
/// The top 32 bits name the tree (its domain), followed by `MAX_LEVELS`
/// 16-bit segments giving the path from the top hat. A segment of 0 means
/// "no node at this level".
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct HatId {
    domain: U32,
    segments: [U16; MAX_LEVELS],
}

impl HatId {
    /// The all-zero identifier. Never names a hat.
    pub fn zero() -> Self {
        Self::new_zeroed()
    }

    /// The top hat of `domain`.
    pub fn top_hat(domain: Domain) -> Self {
        let mut id = Self::zero();
        id.domain = U32::new(domain);
        id
    }

    /// Build an identifier from a domain and a path of 1-based child indices.
    ///
    /// ```
    /// use hats_tree::{HatId, local_level};
    ///
    /// let hat = HatId::from_path(1, &[2, 1]).unwrap();
    /// assert_eq!(local_level(hat), 2);
    /// assert_eq!(hat.to_string(), "0x0000000100020001000000000000000000000000000000000000000000000000");
    /// ```
    pub fn from_path(domain: Domain, path: &[u16]) -> Result<Self, HatsError> {
        path.iter().try_fold(Self::top_hat(domain), |parent, &index| {
            layout::child_id(parent, u32::from(index))
        })
    }

    /// Reinterpret 32 big-endian bytes as an identifier.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        zerocopy::transmute!(bytes)
    }

    pub fn to_be_bytes(self) -> [u8; 32] {
        zerocopy::transmute!(self)
    }

    #[inline]
    pub fn domain(&self) -> Domain {
        self.domain.get()
    }

    /// Raw segment at `level` (0-based). Out-of-range levels read as 0.
    #[inline]
    pub fn segment_at(&self, level: usize) -> u16 {
        self.segments.get(level).map_or(0, |s| s.get())
    }

    pub(crate) fn with_segment(mut self, level: usize, index: u16) -> Self {
        self.segments[level] = U16::new(index);
        self
    }

    pub(crate) fn segments(&self) -> impl Iterator<Item = u16> + '_ {
        self.segments.iter().map(|s| s.get())
    }

    /// True if the identifier has a nonzero domain and no gaps in its path.
    pub fn is_well_formed(&self) -> bool {
        if self.domain() == 0 {
            return false;
        }
        let level = layout::local_level(*self) as usize;
        self.segments().take(level).all(|s| s != 0)
    }
}

impl Default for HatId {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for HatId {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for HatId {}

impl Hash for HatId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl PartialOrd for HatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HatId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for HatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.as_bytes()))
    }
}

impl fmt::Debug for HatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HatId({self})")
    }
}

impl FromStr for HatId {
    type Err = HatsError;

    /// Parses `0x`-prefixed hex of at most 64 digits. Shorter input is
    /// left-padded, as for any other 256-bit integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HatsError::InvalidHex {
            input: s.to_string(),
        };
        let digits = strip_hex_prefix(s).ok_or_else(invalid)?;
        if digits.is_empty() || digits.len() > 64 {
            return Err(invalid());
        }
        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes).map_err(|_| invalid())?;
        Ok(Self::from_be_bytes(bytes))
    }
}

/// A 20-byte account address: a caller or a wearer.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
)]
#[repr(transparent)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// An address made of one repeated byte. Handy for fixtures.
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    pub const fn to_bytes(self) -> [u8; 20] {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = HatsError;

    /// Addresses must be written out in full: `0x` followed by 40 hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HatsError::InvalidHex {
            input: s.to_string(),
        };
        let digits = strip_hex_prefix(s).ok_or_else(invalid)?;
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

macro_rules! impl_hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

impl_hex_serde!(HatId);
impl_hex_serde!(Address);
