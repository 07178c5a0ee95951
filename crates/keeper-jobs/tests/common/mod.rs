#![allow(dead_code)]

use keeper_core::{
    AccountAddress, ManualClock, MemoryToken, RewardVault, TokenAmount, SECONDS_PER_DAY,
};
use keeper_jobs::{Controller, CostSchedule, JobScheduler, MemoryController, SchedulerConfig};
use std::sync::Arc;

pub const START: u64 = 20 * SECONDS_PER_DAY + 7_200;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub token: Arc<MemoryToken>,
    pub vault: Arc<RewardVault>,
    pub scheduler: Arc<JobScheduler>,
    pub owner: AccountAddress,
    pub keeper: AccountAddress,
}

pub fn amount(units: u128) -> TokenAmount {
    TokenAmount::from_base_units(units)
}

/// Costs small enough to reason about budgets by hand.
pub fn small_costs() -> CostSchedule {
    CostSchedule {
        job_overhead: 5,
        timestamp_read: 1,
        pool_lookup: 2,
        sort: 50,
        price_update: 20,
        reweigh: 30,
        reindex: 40,
    }
}

pub struct HarnessBuilder {
    config: SchedulerConfig,
    rewards_per_gas: u128,
    max_daily_rewards: u128,
    funding: u128,
    approve_scheduler: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: SchedulerConfig::default(),
            rewards_per_gas: 1,
            max_daily_rewards: 100_000_000,
            funding: 1_000_000_000,
            approve_scheduler: true,
        }
    }
}

impl HarnessBuilder {
    pub fn costs(mut self, costs: CostSchedule) -> Self {
        self.config.costs = costs;
        self
    }

    pub fn max_daily_rewards(mut self, units: u128) -> Self {
        self.max_daily_rewards = units;
        self
    }

    pub fn funding(mut self, units: u128) -> Self {
        self.funding = units;
        self
    }

    pub fn unapproved(mut self) -> Self {
        self.approve_scheduler = false;
        self
    }

    pub async fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(START));
        let controller = Arc::new(MemoryController::new(clock.clone()));
        self.build_with(clock, controller).await
    }

    pub async fn build_with(self, clock: Arc<ManualClock>, controller: Arc<dyn Controller>) -> Harness {
        let token = Arc::new(MemoryToken::new(AccountAddress::from_label("TKN")));
        let owner = AccountAddress::from_bytes([0xAA; 32]);
        let keeper = AccountAddress::from_bytes([0xBB; 32]);

        let vault = Arc::new(RewardVault::new(
            AccountAddress::from_label("vault"),
            owner,
            token.clone(),
            clock.clone(),
        ));
        vault.set_rewards_per_gas(owner, self.rewards_per_gas).await.unwrap();
        vault
            .set_max_daily_rewards(owner, amount(self.max_daily_rewards))
            .await
            .unwrap();
        token.mint(vault.address(), amount(self.funding)).await.unwrap();

        let scheduler = Arc::new(
            JobScheduler::new(
                AccountAddress::from_label("jobs"),
                controller,
                vault.clone(),
                clock.clone(),
                self.config,
            )
            .unwrap(),
        );
        if self.approve_scheduler {
            vault.approve_keeper(owner, scheduler.address()).await.unwrap();
        }

        Harness {
            clock,
            token,
            vault,
            scheduler,
            owner,
            keeper,
        }
    }
}
