use crate::access::AccessRegistry;
use crate::clock::Clock;
use crate::config::VaultConfig;
use crate::error::{KeeperError, Result};
use crate::token::RewardsToken;
use crate::types::{day_index, AccountAddress, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Number of payout records retained in memory.
const MAX_PAYOUT_HISTORY: usize = 1000;

/// A successful payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub keeper: AccountAddress,
    pub recipient: AccountAddress,
    pub gas: u64,
    pub reward: TokenAmount,
    pub timestamp: u64,
    pub day: u64,
}

/// Point-in-time view of the vault's counters and balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub owner: AccountAddress,
    pub rewards_token: AccountAddress,
    pub rewards_per_gas: u128,
    pub max_daily_rewards: TokenAmount,
    pub rewards_today: TokenAmount,
    pub last_update: u64,
    pub balance: TokenAmount,
    pub approved_keepers: usize,
}

struct VaultState {
    access: AccessRegistry,
    rewards_per_gas: u128,
    max_daily_rewards: TokenAmount,
    rewards_today: TokenAmount,
    last_update: u64,
    payouts: VecDeque<PayoutRecord>,
}

/// Budget-constrained payout ledger.
///
/// All counters live behind one mutex; every operation holds it for its whole
/// duration, so operations commit one at a time.
pub struct RewardVault {
    address: AccountAddress,
    token: Arc<dyn RewardsToken>,
    clock: Arc<dyn Clock>,
    state: Mutex<VaultState>,
}

impl RewardVault {
    pub fn new(
        address: AccountAddress,
        owner: AccountAddress,
        token: Arc<dyn RewardsToken>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            address,
            token,
            clock,
            state: Mutex::new(VaultState {
                access: AccessRegistry::new(owner),
                rewards_per_gas: 0,
                max_daily_rewards: TokenAmount::ZERO,
                rewards_today: TokenAmount::ZERO,
                last_update: 0,
                payouts: VecDeque::new(),
            }),
        }
    }

    pub fn with_config(mut self, config: &VaultConfig) -> Self {
        let state = self.state.get_mut();
        state.rewards_per_gas = config.rewards_per_gas();
        state.max_daily_rewards = config.max_daily_rewards();
        self
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }

    pub fn rewards_token(&self) -> AccountAddress {
        self.token.id()
    }

    // ----- owner operations -----

    pub async fn set_max_daily_rewards(
        &self,
        caller: AccountAddress,
        amount: TokenAmount,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access.ensure_owner(caller)?;
        let old = state.max_daily_rewards;
        state.max_daily_rewards = amount;
        info!(old = %old, new = %amount, "⚙️ Max daily rewards updated");
        Ok(())
    }

    pub async fn set_rewards_per_gas(&self, caller: AccountAddress, rate: u128) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access.ensure_owner(caller)?;
        let old = state.rewards_per_gas;
        state.rewards_per_gas = rate;
        info!(old, new = rate, "⚙️ Rewards per gas updated");
        Ok(())
    }

    pub async fn approve_keeper(&self, caller: AccountAddress, keeper: AccountAddress) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.access.approve(caller, keeper)? {
            info!(keeper = %keeper, "🔓 Keeper approved");
        }
        Ok(())
    }

    pub async fn disapprove_keeper(
        &self,
        caller: AccountAddress,
        keeper: AccountAddress,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.access.disapprove(caller, keeper)? {
            info!(keeper = %keeper, "🔒 Keeper disapproved");
        }
        Ok(())
    }

    pub async fn transfer_ownership(
        &self,
        caller: AccountAddress,
        new_owner: AccountAddress,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access.transfer_ownership(caller, new_owner)?;
        info!(old_owner = %caller, new_owner = %new_owner, "🔄 Vault ownership transferred");
        Ok(())
    }

    /// Move `amount` from the vault to the owner.
    pub async fn withdraw(&self, caller: AccountAddress, amount: TokenAmount) -> Result<()> {
        let state = self.state.lock().await;
        state.access.ensure_owner(caller)?;
        self.token.transfer(self.address, caller, amount).await?;
        info!(owner = %caller, amount = %amount, "💸 Vault withdrawal");
        Ok(())
    }

    // ----- keeper operations -----

    /// Pay `recipient` for `gas` cost units at the configured rate.
    ///
    /// The calling keeper must be approved. The daily counter resets when the
    /// current time falls in a later day bucket than the last payout; an
    /// earlier timestamp is charged to the last payout's bucket.
    /// The budget check runs before the balance check; either failure leaves
    /// counters and balances untouched.
    pub async fn collect_rewards_for_gas(
        &self,
        caller: AccountAddress,
        recipient: AccountAddress,
        gas: u64,
    ) -> Result<TokenAmount> {
        let mut state = self.state.lock().await;
        state.access.ensure_keeper(caller)?;

        let now = self.clock.now();
        // A clock that steps back stays in the bucket of the latest payout
        let today = day_index(now.max(state.last_update));
        let paid_today = if today != day_index(state.last_update) {
            TokenAmount::ZERO
        } else {
            state.rewards_today
        };

        let reward = TokenAmount::for_gas(gas, state.rewards_per_gas)?;
        let new_total = paid_today
            .checked_add(reward)
            .ok_or(KeeperError::Overflow("rewards_today"))?;

        if new_total > state.max_daily_rewards {
            warn!(
                keeper = %caller,
                requested = %reward,
                paid_today = %paid_today,
                max_daily = %state.max_daily_rewards,
                "❌ Payout rejected: daily budget exhausted"
            );
            return Err(KeeperError::BudgetExceeded {
                requested: reward,
                paid_today,
                max_daily: state.max_daily_rewards,
            });
        }

        if let Err(e) = self.token.transfer(self.address, recipient, reward).await {
            warn!(keeper = %caller, requested = %reward, error = %e, "❌ Payout transfer failed");
            return Err(e);
        }

        state.rewards_today = new_total;
        state.last_update = state.last_update.max(now);

        state.payouts.push_back(PayoutRecord {
            keeper: caller,
            recipient,
            gas,
            reward,
            timestamp: now,
            day: today,
        });
        if state.payouts.len() > MAX_PAYOUT_HISTORY {
            state.payouts.pop_front();
        }

        info!(
            keeper = %caller,
            recipient = %recipient,
            gas,
            reward = %reward,
            rewards_today = %new_total,
            "💰 Rewards paid"
        );
        debug!(day = today, last_update = state.last_update, "Vault counters updated");

        Ok(reward)
    }

    // ----- views -----

    pub async fn owner(&self) -> AccountAddress {
        self.state.lock().await.access.owner()
    }

    pub async fn rewards_per_gas(&self) -> u128 {
        self.state.lock().await.rewards_per_gas
    }

    pub async fn max_daily_rewards(&self) -> TokenAmount {
        self.state.lock().await.max_daily_rewards
    }

    /// Total paid out in the day bucket of the last payout.
    ///
    /// Not reset by the day boundary itself: after a rollover this still
    /// reports the previous day's total until the next payout.
    pub async fn rewards_today(&self) -> TokenAmount {
        self.state.lock().await.rewards_today
    }

    pub async fn last_update(&self) -> u64 {
        self.state.lock().await.last_update
    }

    pub async fn is_approved_keeper(&self, id: AccountAddress) -> bool {
        self.state.lock().await.access.is_keeper(&id)
    }

    pub async fn balance(&self) -> Result<TokenAmount> {
        self.token.balance_of(self.address).await
    }

    pub async fn payout_history(&self) -> Vec<PayoutRecord> {
        self.state.lock().await.payouts.iter().cloned().collect()
    }

    pub async fn snapshot(&self) -> Result<VaultSnapshot> {
        let state = self.state.lock().await;
        let balance = self.token.balance_of(self.address).await?;
        Ok(VaultSnapshot {
            owner: state.access.owner(),
            rewards_token: self.token.id(),
            rewards_per_gas: state.rewards_per_gas,
            max_daily_rewards: state.max_daily_rewards,
            rewards_today: state.rewards_today,
            last_update: state.last_update,
            balance,
            approved_keepers: state.access.keepers().count(),
        })
    }
}
