use crate::config::SchedulerConfig;
use crate::controller::{CategoryId, Controller, PoolId};
use crate::gas::GasMeter;
use crate::guard::ReentrancyGuard;
use keeper_core::{AccountAddress, Clock, KeeperError, Result, RewardVault, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    OrderCategoryTokens,
    UpdateCategoryPrices,
    ReweighPool,
    ReindexPool,
    ReindexCategoryPool,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCategoryTokens => "order_category_tokens_by_market_cap",
            Self::UpdateCategoryPrices => "update_category_prices",
            Self::ReweighPool => "reweigh_pool",
            Self::ReindexPool => "reindex_pool",
            Self::ReindexCategoryPool => "reindex_category_pool",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReceipt {
    pub job: JobKind,
    pub caller: AccountAddress,
    pub gas_used: u64,
    pub reward: TokenAmount,
    /// Whether a category sort ran as part of the job
    pub sorted: bool,
    pub completed_at: u64,
}

/// Permissionless entry point for controller upkeep.
///
/// Every job takes the reentrancy lock, checks its rate limit, delegates to
/// the controller inside a controller transaction, and pays the caller from
/// the vault. The scheduler itself must be an approved keeper of the vault.
/// If any step fails the controller transaction is rolled back and no
/// scheduler state is written.
///
/// Each job runs on its own tokio task. A caller that stops polling (a
/// `timeout` or a losing `select!` branch) does not cancel the job: it still
/// commits or rolls back, and the caller only loses the receipt.
pub struct JobScheduler {
    core: Arc<SchedulerCore>,
}

struct SchedulerCore {
    address: AccountAddress,
    controller: Arc<dyn Controller>,
    vault: Arc<RewardVault>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    guard: ReentrancyGuard,
    last_category_price_update: RwLock<HashMap<CategoryId, u64>>,
}

impl JobScheduler {
    pub fn new(
        address: AccountAddress,
        controller: Arc<dyn Controller>,
        vault: Arc<RewardVault>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: Arc::new(SchedulerCore {
                address,
                controller,
                vault,
                clock,
                config,
                guard: ReentrancyGuard::new(),
                last_category_price_update: RwLock::new(HashMap::new()),
            }),
        })
    }

    pub fn address(&self) -> AccountAddress {
        self.core.address
    }

    pub fn controller(&self) -> &Arc<dyn Controller> {
        &self.core.controller
    }

    pub fn vault(&self) -> &Arc<RewardVault> {
        &self.core.vault
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    pub fn min_sort_delay(&self) -> u64 {
        self.core.config.min_sort_delay_secs
    }

    pub fn min_price_update_delay(&self) -> u64 {
        self.core.config.min_price_update_delay_secs
    }

    /// Timestamp of the last price refresh run through this scheduler, 0 if none.
    pub async fn last_category_price_update(&self, category: CategoryId) -> u64 {
        self.core.last_category_price_update(category).await
    }

    /// True while a job is in flight, including one whose caller went away.
    pub fn is_locked(&self) -> bool {
        self.core.guard.is_entered()
    }

    // ----- jobs -----

    pub async fn order_category_tokens_by_market_cap(
        &self,
        caller: AccountAddress,
        category: CategoryId,
    ) -> Result<JobReceipt> {
        let core = Arc::clone(&self.core);
        run_to_completion(async move {
            core.order_category_tokens_by_market_cap(caller, category)
                .await
        })
        .await
    }

    pub async fn update_category_prices(
        &self,
        caller: AccountAddress,
        category: CategoryId,
    ) -> Result<JobReceipt> {
        let core = Arc::clone(&self.core);
        run_to_completion(async move { core.update_category_prices(caller, category).await }).await
    }

    /// No scheduler-level rate limit; the controller gates reweighs itself.
    pub async fn reweigh_pool(&self, caller: AccountAddress, pool: PoolId) -> Result<JobReceipt> {
        let core = Arc::clone(&self.core);
        run_to_completion(async move { core.reweigh_pool(caller, pool).await }).await
    }

    pub async fn reindex_pool(&self, caller: AccountAddress, pool: PoolId) -> Result<JobReceipt> {
        let core = Arc::clone(&self.core);
        run_to_completion(async move { core.reindex_pool(caller, pool).await }).await
    }

    /// Reindex the `pool_index`-th pool of `category`, sorting the category
    /// first if its last sort is at least `min_sort_delay` old. Both calls are
    /// paid in a single payout.
    pub async fn reindex_category_pool(
        &self,
        caller: AccountAddress,
        category: CategoryId,
        pool_index: u64,
    ) -> Result<JobReceipt> {
        let core = Arc::clone(&self.core);
        run_to_completion(async move {
            core.reindex_category_pool(caller, category, pool_index)
                .await
        })
        .await
    }
}

/// Drive `job` on a detached task and wait for it.
async fn run_to_completion<F>(job: F) -> Result<JobReceipt>
where
    F: Future<Output = Result<JobReceipt>> + Send + 'static,
{
    match tokio::spawn(job).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(KeeperError::Controller(anyhow::anyhow!(
            "job task aborted: {}",
            e
        ))),
    }
}

impl SchedulerCore {
    async fn last_category_price_update(&self, category: CategoryId) -> u64 {
        let updates = self.last_category_price_update.read().await;
        updates.get(&category).copied().unwrap_or(0)
    }

    async fn order_category_tokens_by_market_cap(
        &self,
        caller: AccountAddress,
        category: CategoryId,
    ) -> Result<JobReceipt> {
        let _entered = self.guard.enter()?;
        let job = JobKind::OrderCategoryTokens;

        self.atomically(job, async {
            let mut meter = self.config.costs.meter();
            let now = self.clock.now();

            let last = self.last_sort(category, &mut meter).await?;
            let ready_at = last.saturating_add(self.config.min_sort_delay_secs);
            if now < ready_at {
                return Err(KeeperError::RateLimitNotElapsed {
                    job: job.as_str(),
                    target: format!("category {}", category),
                    ready_at,
                    now,
                });
            }

            self.controller
                .order_category_tokens_by_market_cap(category)
                .await?;
            meter.charge("sort", self.config.costs.sort);

            self.settle(job, caller, &meter, true).await
        })
        .await
    }

    async fn update_category_prices(
        &self,
        caller: AccountAddress,
        category: CategoryId,
    ) -> Result<JobReceipt> {
        let _entered = self.guard.enter()?;
        let job = JobKind::UpdateCategoryPrices;

        self.atomically(job, async {
            let mut meter = self.config.costs.meter();
            let now = self.clock.now();

            let last = self.last_category_price_update(category).await;
            let ready_at = last.saturating_add(self.config.min_price_update_delay_secs);
            if now < ready_at {
                return Err(KeeperError::RateLimitNotElapsed {
                    job: job.as_str(),
                    target: format!("category {}", category),
                    ready_at,
                    now,
                });
            }

            self.controller.update_category_prices(category).await?;
            meter.charge("price_update", self.config.costs.price_update);

            let receipt = self.settle(job, caller, &meter, false).await?;

            // Written only once payment has succeeded
            self.last_category_price_update
                .write()
                .await
                .insert(category, now);
            Ok(receipt)
        })
        .await
    }

    async fn reweigh_pool(&self, caller: AccountAddress, pool: PoolId) -> Result<JobReceipt> {
        let _entered = self.guard.enter()?;
        let job = JobKind::ReweighPool;

        self.atomically(job, async {
            let mut meter = self.config.costs.meter();
            self.controller.reweigh_pool(pool).await?;
            meter.charge("reweigh", self.config.costs.reweigh);
            self.settle(job, caller, &meter, false).await
        })
        .await
    }

    async fn reindex_pool(&self, caller: AccountAddress, pool: PoolId) -> Result<JobReceipt> {
        let _entered = self.guard.enter()?;
        let job = JobKind::ReindexPool;

        self.atomically(job, async {
            let mut meter = self.config.costs.meter();
            self.controller.reindex_pool(pool).await?;
            meter.charge("reindex", self.config.costs.reindex);
            self.settle(job, caller, &meter, false).await
        })
        .await
    }

    async fn reindex_category_pool(
        &self,
        caller: AccountAddress,
        category: CategoryId,
        pool_index: u64,
    ) -> Result<JobReceipt> {
        let _entered = self.guard.enter()?;
        let job = JobKind::ReindexCategoryPool;

        self.atomically(job, async {
            let mut meter = self.config.costs.meter();
            let now = self.clock.now();

            let pool = self
                .controller
                .compute_pool_address(category, pool_index)
                .await?;
            meter.charge("pool_lookup", self.config.costs.pool_lookup);

            let last = self.last_sort(category, &mut meter).await?;
            let stale = now >= last.saturating_add(self.config.min_sort_delay_secs);
            if stale {
                debug!(category, last_sort = last, now, "Category sort stale, sorting before reindex");
                self.controller
                    .order_category_tokens_by_market_cap(category)
                    .await?;
                meter.charge("sort", self.config.costs.sort);
            }

            self.controller.reindex_pool(pool).await?;
            meter.charge("reindex", self.config.costs.reindex);

            self.settle(job, caller, &meter, stale).await
        })
        .await
    }

    // ----- helpers -----

    async fn last_sort(&self, category: CategoryId, meter: &mut GasMeter) -> Result<u64> {
        let last = self.controller.get_last_category_update(category).await?;
        meter.charge("timestamp_read", self.config.costs.timestamp_read);
        Ok(last)
    }

    async fn settle(
        &self,
        job: JobKind,
        caller: AccountAddress,
        meter: &GasMeter,
        sorted: bool,
    ) -> Result<JobReceipt> {
        let gas_used = meter.used();
        debug!(job = %job, gas_used, charges = ?meter.charges(), "⛽ Job metered");

        let reward = self
            .vault
            .collect_rewards_for_gas(self.address, caller, gas_used)
            .await?;

        Ok(JobReceipt {
            job,
            caller,
            gas_used,
            reward,
            sorted,
            completed_at: self.clock.now(),
        })
    }

    /// Run `body` inside a controller transaction, committing on success and
    /// rolling back on any error. `body` ends with the payout, the last step
    /// that can fail; after it a commit error is logged, not returned.
    async fn atomically<F>(&self, job: JobKind, body: F) -> Result<JobReceipt>
    where
        F: Future<Output = Result<JobReceipt>>,
    {
        self.controller.begin_transaction().await?;

        match body.await {
            Ok(receipt) => {
                // The caller is already paid, so the job stands
                if let Err(commit_err) = self.controller.commit_transaction().await {
                    error!(job = %job, error = %commit_err, "Controller commit failed after payout");
                }
                info!(
                    job = %job,
                    caller = %receipt.caller,
                    gas_used = receipt.gas_used,
                    reward = %receipt.reward,
                    sorted = receipt.sorted,
                    "✅ Job completed"
                );
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_err) = self.controller.rollback_transaction().await {
                    warn!(job = %job, error = %rollback_err, "Controller rollback failed");
                }
                warn!(job = %job, error = %e, kind = e.kind(), "❌ Job rolled back");
                Err(e)
            }
        }
    }
}
