use crate::types::TokenAmount;
use serde::{Deserialize, Serialize};

/// Owner-tunable vault parameters applied at construction.
///
/// Both default to zero, so a fresh vault pays nothing until the owner
/// configures it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Base token units paid per cost unit
    pub rewards_per_gas: u64,
    /// Cap on total payout within one day bucket
    pub max_daily_rewards: u64,
}

impl VaultConfig {
    pub fn rewards_per_gas(&self) -> u128 {
        self.rewards_per_gas as u128
    }

    pub fn max_daily_rewards(&self) -> TokenAmount {
        TokenAmount::from_base_units(self.max_daily_rewards as u128)
    }
}
