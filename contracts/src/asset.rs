//! # Assets
//!
//! The vault holds two asset classes: the chain's native currency and one
//! configured ERC20 token. On the wire an asset is the string `"native"`
//! or the token's `0x` address.

use std::fmt;
use std::str::FromStr;

use locked_vault_protocol::address::{Address, AddressError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which balance an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// An ERC20 token, identified by contract address.
    Token(Address),
}

impl Asset {
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }

    /// The token address, or `None` for native currency.
    pub fn token(&self) -> Option<Address> {
        match self {
            Asset::Native => None,
            Asset::Token(addr) => Some(*addr),
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Token(addr) => f.write_str(&addr.to_hex()),
        }
    }
}

impl FromStr for Asset {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(Asset::Native);
        }
        Ok(Asset::Token(s.parse()?))
    }
}

impl Serialize for Asset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Asset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
