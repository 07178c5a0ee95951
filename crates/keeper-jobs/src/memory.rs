use crate::controller::{CategoryId, Controller, PoolId};
use anyhow::{bail, Result};
use async_trait::async_trait;
use blake3::Hasher;
use keeper_core::{AccountAddress, Clock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
struct ControllerState {
    last_category_update: HashMap<CategoryId, u64>,
    last_price_update: HashMap<CategoryId, u64>,
    last_reweigh: HashMap<PoolId, u64>,
    last_reindex: HashMap<PoolId, u64>,
}

/// In-memory controller that records when each maintenance action last ran.
///
/// Pool identities are derived from `(category, index)` so the resolving
/// reindex form can be exercised without a real pool registry.
pub struct MemoryController {
    clock: Arc<dyn Clock>,
    reweigh_delay: u64,
    state: RwLock<ControllerState>,
    transaction_backup: RwLock<Option<ControllerState>>,
}

impl MemoryController {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            reweigh_delay: 0,
            state: RwLock::new(ControllerState::default()),
            transaction_backup: RwLock::new(None),
        }
    }

    /// Reject reweighs of the same pool closer together than `secs`.
    pub fn with_reweigh_delay(mut self, secs: u64) -> Self {
        self.reweigh_delay = secs;
        self
    }

    pub async fn in_transaction(&self) -> bool {
        self.transaction_backup.read().await.is_some()
    }
}

#[async_trait]
impl Controller for MemoryController {
    async fn get_last_category_update(&self, category: CategoryId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.last_category_update.get(&category).copied().unwrap_or(0))
    }

    async fn order_category_tokens_by_market_cap(&self, category: CategoryId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.last_category_update.insert(category, now);
        info!(category, timestamp = now, "📊 Category sorted by market cap");
        Ok(())
    }

    async fn update_category_prices(&self, category: CategoryId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.last_price_update.insert(category, now);
        info!(category, timestamp = now, "📊 Category prices updated");
        Ok(())
    }

    async fn last_price_update(&self, category: CategoryId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.last_price_update.get(&category).copied().unwrap_or(0))
    }

    async fn reweigh_pool(&self, pool: PoolId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        if let Some(last) = state.last_reweigh.get(&pool) {
            if now < last.saturating_add(self.reweigh_delay) {
                bail!(
                    "Pool {} reweighed at {}, next reweigh allowed at {}",
                    pool,
                    last,
                    last + self.reweigh_delay
                );
            }
        }
        state.last_reweigh.insert(pool, now);
        info!(pool = %pool, timestamp = now, "🔄 Pool reweighed");
        Ok(())
    }

    async fn last_reweigh(&self, pool: PoolId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.last_reweigh.get(&pool).copied().unwrap_or(0))
    }

    async fn reindex_pool(&self, pool: PoolId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.last_reindex.insert(pool, now);
        info!(pool = %pool, timestamp = now, "🔄 Pool reindexed");
        Ok(())
    }

    async fn last_reindex(&self, pool: PoolId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.last_reindex.get(&pool).copied().unwrap_or(0))
    }

    async fn compute_pool_address(&self, category: CategoryId, pool_index: u64) -> Result<PoolId> {
        let mut hasher = Hasher::new();
        hasher.update(b"keeper-pool");
        hasher.update(&category.to_le_bytes());
        hasher.update(&pool_index.to_le_bytes());
        Ok(AccountAddress::from_bytes(*hasher.finalize().as_bytes()))
    }

    async fn begin_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        if backup.is_some() {
            bail!("Transaction already in progress");
        }
        *backup = Some(self.state.read().await.clone());
        debug!("📝 Controller transaction started");
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        if backup.take().is_none() {
            bail!("No transaction in progress");
        }
        debug!("✅ Controller transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut backup = self.transaction_backup.write().await;
        let saved = backup
            .take()
            .ok_or_else(|| anyhow::anyhow!("No transaction in progress"))?;
        *self.state.write().await = saved;
        debug!("❌ Controller transaction rolled back");
        Ok(())
    }
}
