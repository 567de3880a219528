//! Module-relative addresses as they appear in address tables and mod files.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// An offset relative to a module's base address.
///
/// Accepts `0x`-prefixed hex strings in either case, or plain integers.
/// Always renders as a lowercase `0x` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub u64);

impl Address {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Parse a hex address string (with `0x` or `0X` prefix)
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| Error::InvalidAddress(format!("'{}' is missing the 0x prefix", s)))?;

    if digits.is_empty() {
        return Err(Error::InvalidAddress(format!("'{}' has no digits", s)));
    }

    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::InvalidAddress(format!("'{}': {}", s, e)))
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_address(s).map(Address)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AddressVisitor;

impl Visitor<'_> for AddressVisitor {
    type Value = Address;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 0x-prefixed hex string or a non-negative integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Address, E> {
        Ok(Address(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Address, E> {
        u64::try_from(v)
            .map(Address)
            .map_err(|_| E::custom(format!("negative address {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Address, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(AddressVisitor)
    }
}
