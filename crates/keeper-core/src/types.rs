use crate::error::{KeeperError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of one day bucket in seconds.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Index of the absolute day bucket containing `timestamp`.
///
/// Buckets are aligned to the unix epoch, so two timestamps one second apart
/// can fall into different buckets.
pub fn day_index(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn to_base_units(&self) -> u128 {
        self.0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Reward owed for `gas` cost units at `rate` base units per unit.
    pub fn for_gas(gas: u64, rate: u128) -> Result<Self> {
        (gas as u128)
            .checked_mul(rate)
            .map(Self)
            .ok_or(KeeperError::Overflow("gas * rewards_per_gas"))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for TokenAmount {
    fn from(units: u128) -> Self {
        Self(units)
    }
}

/// Identity of an owner, keeper, contract or pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Deterministic address derived from a short label, handy for fixtures
    /// and simulation actors.
    pub fn from_label(label: &str) -> Self {
        let mut bytes = [0u8; 32];
        for (i, b) in label.bytes().take(32).enumerate() {
            bytes[i] = b;
        }
        Self(bytes)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

impl FromStr for AccountAddress {
    type Err = KeeperError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(raw)
            .map_err(|e| KeeperError::InvalidConfig(format!("invalid address {}: {}", s, e)))?;
        let bytes: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            KeeperError::InvalidConfig(format!("address must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}
