use crate::error::{KeeperError, Result};
use crate::types::AccountAddress;
use std::collections::HashSet;

/// Owner role plus the set of keepers allowed to draw payouts.
///
/// Checked by value at the start of each gated operation.
#[derive(Debug, Clone)]
pub struct AccessRegistry {
    owner: AccountAddress,
    keepers: HashSet<AccountAddress>,
}

impl AccessRegistry {
    pub fn new(owner: AccountAddress) -> Self {
        Self {
            owner,
            keepers: HashSet::new(),
        }
    }

    pub fn owner(&self) -> AccountAddress {
        self.owner
    }

    pub fn ensure_owner(&self, caller: AccountAddress) -> Result<()> {
        if caller != self.owner {
            return Err(KeeperError::Unauthorized { caller });
        }
        Ok(())
    }

    pub fn ensure_keeper(&self, caller: AccountAddress) -> Result<()> {
        if !self.keepers.contains(&caller) {
            return Err(KeeperError::NotApprovedKeeper { caller });
        }
        Ok(())
    }

    pub fn is_keeper(&self, id: &AccountAddress) -> bool {
        self.keepers.contains(id)
    }

    /// Returns false if the keeper was already approved.
    pub fn approve(&mut self, caller: AccountAddress, keeper: AccountAddress) -> Result<bool> {
        self.ensure_owner(caller)?;
        Ok(self.keepers.insert(keeper))
    }

    /// Returns false if the keeper was not approved.
    pub fn disapprove(&mut self, caller: AccountAddress, keeper: AccountAddress) -> Result<bool> {
        self.ensure_owner(caller)?;
        Ok(self.keepers.remove(&keeper))
    }

    pub fn transfer_ownership(
        &mut self,
        caller: AccountAddress,
        new_owner: AccountAddress,
    ) -> Result<()> {
        self.ensure_owner(caller)?;
        self.owner = new_owner;
        Ok(())
    }

    pub fn keepers(&self) -> impl Iterator<Item = &AccountAddress> {
        self.keepers.iter()
    }
}
