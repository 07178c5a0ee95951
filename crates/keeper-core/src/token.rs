use crate::error::{KeeperError, Result};
use crate::types::{AccountAddress, TokenAmount};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The payment medium the vault pays keepers with.
///
/// `transfer` must either move the full amount or fail; it never performs a
/// short transfer.
#[async_trait]
pub trait RewardsToken: Send + Sync {
    /// Identity of the token itself.
    fn id(&self) -> AccountAddress;

    async fn balance_of(&self, holder: AccountAddress) -> Result<TokenAmount>;

    async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()>;
}

/// In-memory token ledger.
pub struct MemoryToken {
    id: AccountAddress,
    balances: RwLock<HashMap<AccountAddress, TokenAmount>>,
}

impl MemoryToken {
    pub fn new(id: AccountAddress) -> Self {
        Self {
            id,
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// Credit `amount` out of thin air. Stands in for an external top-up.
    pub async fn mint(&self, to: AccountAddress, amount: TokenAmount) -> Result<()> {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(to).or_insert(TokenAmount::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or(KeeperError::Overflow("mint"))?;
        let balance_after = *entry;

        info!(
            to = %to,
            amount = %amount,
            balance_after = %balance_after,
            "💰 Tokens minted"
        );
        Ok(())
    }

    pub async fn total_supply(&self) -> TokenAmount {
        let balances = self.balances.read().await;
        TokenAmount::from_base_units(balances.values().map(|b| b.to_base_units()).sum())
    }
}

#[async_trait]
impl RewardsToken for MemoryToken {
    fn id(&self) -> AccountAddress {
        self.id
    }

    async fn balance_of(&self, holder: AccountAddress) -> Result<TokenAmount> {
        let balances = self.balances.read().await;
        Ok(balances.get(&holder).copied().unwrap_or(TokenAmount::ZERO))
    }

    async fn transfer(
        &self,
        from: AccountAddress,
        to: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        // Hold the write lock across check and update so the move is atomic
        let mut balances = self.balances.write().await;

        let from_balance = balances.get(&from).copied().unwrap_or(TokenAmount::ZERO);
        let new_from_balance =
            from_balance
                .checked_sub(amount)
                .ok_or(KeeperError::InsufficientBalance {
                    holder: from,
                    has: from_balance,
                    needs: amount,
                })?;

        if amount == TokenAmount::ZERO || from == to {
            return Ok(());
        }

        let to_balance = balances.get(&to).copied().unwrap_or(TokenAmount::ZERO);
        let new_to_balance = to_balance
            .checked_add(amount)
            .ok_or(KeeperError::Overflow("recipient balance"))?;

        balances.insert(from, new_from_balance);
        balances.insert(to, new_to_balance);

        debug!(
            from = %from,
            to = %to,
            amount = %amount,
            from_balance_after = %new_from_balance,
            to_balance_after = %new_to_balance,
            "💸 Tokens transferred"
        );
        Ok(())
    }
}
