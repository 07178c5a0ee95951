use crate::config::NodeConfig;
use anyhow::{Context, Result};
use keeper_core::{
    AccountAddress, Clock, KeeperError, ManualClock, MemoryToken, RewardVault, RewardsToken,
    TokenAmount, VaultSnapshot, SECONDS_PER_DAY,
};
use keeper_jobs::{CategoryId, Controller, JobReceipt, JobScheduler, MemoryController};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of a simulated keeper run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub days: u64,
    pub rounds: u64,
    pub attempts: u64,
    pub successes: u64,
    /// Failed attempts grouped by error kind
    pub rejections: BTreeMap<String, u64>,
    pub total_paid: TokenAmount,
    /// Keeper address (hex) to the total it earned
    pub payouts_per_keeper: BTreeMap<String, TokenAmount>,
    pub vault: VaultSnapshot,
}

/// Drives a fully in-memory deployment against a manual clock: a funded
/// vault, a memory controller and a scheduler, with a rotating set of
/// keepers attempting every job each round.
pub struct Simulation {
    config: NodeConfig,
    clock: Arc<ManualClock>,
    token: Arc<MemoryToken>,
    vault: Arc<RewardVault>,
    scheduler: Arc<JobScheduler>,
    keepers: Vec<AccountAddress>,
}

impl Simulation {
    pub async fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let sim = &config.simulation;

        let clock = Arc::new(ManualClock::new(sim.start_timestamp));
        let token = Arc::new(MemoryToken::new(AccountAddress::from_label("rewards-token")));
        let owner = AccountAddress::from_label("vault-owner");

        let vault = Arc::new(
            RewardVault::new(
                AccountAddress::from_label("reward-vault"),
                owner,
                token.clone(),
                clock.clone(),
            )
            .with_config(&config.vault),
        );
        token
            .mint(vault.address(), TokenAmount::from(u128::from(sim.vault_funding)))
            .await
            .context("funding vault")?;

        let controller: Arc<dyn Controller> = Arc::new(MemoryController::new(clock.clone()));
        let scheduler = Arc::new(JobScheduler::new(
            AccountAddress::from_label("job-scheduler"),
            controller,
            vault.clone(),
            clock.clone(),
            config.scheduler.clone(),
        )?);
        vault.approve_keeper(owner, scheduler.address()).await?;

        let keepers = (0..sim.keepers)
            .map(|i| AccountAddress::from_label(&format!("keeper-{}", i)))
            .collect();

        info!(
            vault = %vault.address(),
            scheduler = %scheduler.address(),
            keepers = sim.keepers,
            funding = sim.vault_funding,
            "🚀 Simulation deployed"
        );

        Ok(Self {
            config,
            clock,
            token,
            vault,
            scheduler,
            keepers,
        })
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }

    pub fn vault(&self) -> &Arc<RewardVault> {
        &self.vault
    }

    pub fn keepers(&self) -> &[AccountAddress] {
        &self.keepers
    }

    pub async fn run(&self) -> Result<SimulationReport> {
        let sim = &self.config.simulation;
        let rounds = sim.days.saturating_mul(SECONDS_PER_DAY) / sim.step_secs;
        let mut tally = Tally::default();

        for round in 0..rounds {
            let keeper = self.keepers[(round % self.keepers.len() as u64) as usize];
            debug!(round, keeper = %keeper, now = self.clock.now(), "Keeper round");

            for category in 0..sim.categories {
                self.run_category(keeper, category, &mut tally).await?;
            }
            self.clock.advance(sim.step_secs);
        }

        let mut payouts_per_keeper = BTreeMap::new();
        for keeper in &self.keepers {
            payouts_per_keeper.insert(keeper.to_hex(), self.token.balance_of(*keeper).await?);
        }

        let report = SimulationReport {
            days: sim.days,
            rounds,
            attempts: tally.attempts,
            successes: tally.successes,
            rejections: tally.rejections,
            total_paid: tally.total_paid,
            payouts_per_keeper,
            vault: self.vault.snapshot().await?,
        };

        info!(
            rounds,
            attempts = report.attempts,
            successes = report.successes,
            total_paid = %report.total_paid,
            "🏁 Simulation finished"
        );
        Ok(report)
    }

    async fn run_category(
        &self,
        keeper: AccountAddress,
        category: CategoryId,
        tally: &mut Tally,
    ) -> Result<()> {
        let pools = self.config.simulation.pools_per_category;

        tally.record(
            self.scheduler
                .order_category_tokens_by_market_cap(keeper, category)
                .await,
        )?;
        tally.record(self.scheduler.update_category_prices(keeper, category).await)?;

        for pool_index in 0..pools {
            tally.record(
                self.scheduler
                    .reindex_category_pool(keeper, category, pool_index)
                    .await,
            )?;

            let pool = self
                .scheduler
                .controller()
                .compute_pool_address(category, pool_index)
                .await?;
            tally.record(self.scheduler.reweigh_pool(keeper, pool).await)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Tally {
    attempts: u64,
    successes: u64,
    rejections: BTreeMap<String, u64>,
    total_paid: TokenAmount,
}

impl Tally {
    /// Count one job attempt. Expected keeper-level rejections are tallied;
    /// anything else aborts the run.
    fn record(&mut self, outcome: keeper_core::Result<JobReceipt>) -> Result<()> {
        self.attempts += 1;
        match outcome {
            Ok(receipt) => {
                self.successes += 1;
                self.total_paid = self
                    .total_paid
                    .checked_add(receipt.reward)
                    .ok_or(KeeperError::Overflow("simulation total paid"))?;
            }
            Err(e @ KeeperError::Overflow(_)) | Err(e @ KeeperError::InvalidConfig(_)) => {
                return Err(e.into());
            }
            Err(e) => {
                *self.rejections.entry(e.kind().to_string()).or_insert(0) += 1;
            }
        }
        Ok(())
    }
}
