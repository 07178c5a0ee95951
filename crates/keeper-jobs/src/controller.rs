use anyhow::Result;
use async_trait::async_trait;
use keeper_core::AccountAddress;

pub type CategoryId = u64;
pub type PoolId = AccountAddress;

/// The index-management system the scheduler performs upkeep on.
///
/// Maintenance calls run inside a transaction opened by the scheduler; on any
/// failure later in the job the scheduler rolls it back, so implementations
/// must be able to undo everything done since `begin_transaction`.
///
/// The scheduler commits only after the caller has been paid, so
/// `commit_transaction` must not fail once `begin_transaction` has succeeded
/// and the maintenance calls have returned. A commit error is logged and the
/// job still counts as done.
#[async_trait]
pub trait Controller: Send + Sync {
    async fn get_last_category_update(&self, category: CategoryId) -> Result<u64>;
    async fn order_category_tokens_by_market_cap(&self, category: CategoryId) -> Result<()>;

    async fn update_category_prices(&self, category: CategoryId) -> Result<()>;
    async fn last_price_update(&self, category: CategoryId) -> Result<u64>;

    async fn reweigh_pool(&self, pool: PoolId) -> Result<()>;
    async fn last_reweigh(&self, pool: PoolId) -> Result<u64>;

    async fn reindex_pool(&self, pool: PoolId) -> Result<()>;
    async fn last_reindex(&self, pool: PoolId) -> Result<u64>;

    async fn compute_pool_address(&self, category: CategoryId, pool_index: u64) -> Result<PoolId>;

    async fn begin_transaction(&self) -> Result<()>;
    async fn commit_transaction(&self) -> Result<()>;
    async fn rollback_transaction(&self) -> Result<()>;
}
