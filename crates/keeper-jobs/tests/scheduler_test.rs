mod common;

use common::{amount, small_costs, HarnessBuilder, START};
use keeper_core::{AccountAddress, KeeperError, ManualClock, RewardsToken, TokenAmount};
use keeper_jobs::{
    CostSchedule, JobKind, MemoryController, SchedulerConfig, MIN_PRICE_UPDATE_DELAY,
    MIN_SORT_DELAY,
};
use std::sync::Arc;

#[tokio::test]
async fn test_constructor() {
    let h = HarnessBuilder::default().build().await;

    assert_eq!(MIN_SORT_DELAY, 86_400 * 7 / 2);
    assert_eq!(MIN_PRICE_UPDATE_DELAY, 86_400);
    assert_eq!(h.scheduler.min_sort_delay(), MIN_SORT_DELAY);
    assert_eq!(h.scheduler.min_price_update_delay(), MIN_PRICE_UPDATE_DELAY);
    assert!(Arc::ptr_eq(h.scheduler.vault(), &h.vault));
    assert!(!h.scheduler.is_locked());
}

#[tokio::test]
async fn test_constructor_rejects_invalid_config() {
    let clock = Arc::new(ManualClock::new(START));
    let h = HarnessBuilder::default().build().await;

    let mut config = SchedulerConfig::default();
    config.costs.sort = 0;
    let result = keeper_jobs::JobScheduler::new(
        AccountAddress::from_label("jobs-2"),
        Arc::new(MemoryController::new(clock.clone())),
        h.vault.clone(),
        clock,
        config,
    );
    assert!(matches!(result, Err(KeeperError::InvalidConfig(_))));
}

#[tokio::test]
async fn test_order_category_pays_at_least_base_cost() {
    let h = HarnessBuilder::default().build().await;
    let costs = CostSchedule::default();

    let receipt = h
        .scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap();

    assert_eq!(receipt.job, JobKind::OrderCategoryTokens);
    assert!(receipt.sorted);
    assert!(receipt.gas_used >= costs.sort);
    assert!(h.token.balance_of(h.keeper).await.unwrap() >= amount(costs.sort as u128));
    assert_eq!(receipt.reward, h.token.balance_of(h.keeper).await.unwrap());

    // Base fn was called
    let controller = h.scheduler.controller();
    assert_eq!(controller.get_last_category_update(1).await.unwrap(), START);
}

#[tokio::test]
async fn test_order_category_rate_limit() {
    let h = HarnessBuilder::default().build().await;

    h.scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap();

    let err = h
        .scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        KeeperError::RateLimitNotElapsed { ready_at, now, .. }
            if ready_at == START + MIN_SORT_DELAY && now == START
    ));

    // Other categories are independent
    h.scheduler
        .order_category_tokens_by_market_cap(h.keeper, 2)
        .await
        .unwrap();

    // One second short of the threshold
    h.clock.set(START + MIN_SORT_DELAY - 1);
    assert!(matches!(
        h.scheduler
            .order_category_tokens_by_market_cap(h.keeper, 1)
            .await,
        Err(KeeperError::RateLimitNotElapsed { .. })
    ));

    // Exactly at the threshold
    h.clock.set(START + MIN_SORT_DELAY);
    h.scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap();
    assert_eq!(
        h.scheduler
            .controller()
            .get_last_category_update(1)
            .await
            .unwrap(),
        START + MIN_SORT_DELAY
    );
}

#[tokio::test]
async fn test_rate_limited_call_pays_nothing() {
    let h = HarnessBuilder::default().build().await;

    h.scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap();
    let balance = h.token.balance_of(h.keeper).await.unwrap();
    let paid_today = h.vault.rewards_today().await;

    assert!(h
        .scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .is_err());
    assert_eq!(h.token.balance_of(h.keeper).await.unwrap(), balance);
    assert_eq!(h.vault.rewards_today().await, paid_today);
}

#[tokio::test]
async fn test_update_category_prices() {
    let h = HarnessBuilder::default().build().await;
    let costs = CostSchedule::default();

    assert_eq!(h.scheduler.last_category_price_update(1).await, 0);

    let receipt = h.scheduler.update_category_prices(h.keeper, 1).await.unwrap();
    assert_eq!(receipt.job, JobKind::UpdateCategoryPrices);
    assert!(receipt.reward >= amount(costs.price_update as u128));

    assert_eq!(
        h.scheduler.controller().last_price_update(1).await.unwrap(),
        START
    );
    assert_eq!(h.scheduler.last_category_price_update(1).await, START);

    let err = h
        .scheduler
        .update_category_prices(h.keeper, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, KeeperError::RateLimitNotElapsed { .. }));

    h.clock.advance(MIN_PRICE_UPDATE_DELAY);
    h.scheduler.update_category_prices(h.keeper, 1).await.unwrap();
    assert_eq!(
        h.scheduler.last_category_price_update(1).await,
        START + MIN_PRICE_UPDATE_DELAY
    );
}

#[tokio::test]
async fn test_reweigh_pool_has_no_scheduler_limit() {
    let h = HarnessBuilder::default().build().await;
    let pool = AccountAddress::from_bytes([0x42; 32]);
    let costs = CostSchedule::default();

    let receipt = h.scheduler.reweigh_pool(h.keeper, pool).await.unwrap();
    assert!(receipt.reward >= amount(costs.reweigh as u128));
    assert_eq!(
        h.scheduler.controller().last_reweigh(pool).await.unwrap(),
        START
    );

    // Immediately again: the scheduler does not gate it
    h.clock.advance(1);
    h.scheduler.reweigh_pool(h.keeper, pool).await.unwrap();
    assert_eq!(
        h.scheduler.controller().last_reweigh(pool).await.unwrap(),
        START + 1
    );
}

#[tokio::test]
async fn test_controller_gating_surfaces_and_pays_nothing() {
    let clock = Arc::new(ManualClock::new(START));
    let controller = Arc::new(MemoryController::new(clock.clone()).with_reweigh_delay(3_600));
    let h = HarnessBuilder::default().build_with(clock, controller).await;
    let pool = AccountAddress::from_bytes([0x42; 32]);

    h.scheduler.reweigh_pool(h.keeper, pool).await.unwrap();
    let balance = h.token.balance_of(h.keeper).await.unwrap();

    h.clock.advance(60);
    let err = h.scheduler.reweigh_pool(h.keeper, pool).await.unwrap_err();
    assert!(matches!(err, KeeperError::Controller(_)));
    assert_eq!(h.token.balance_of(h.keeper).await.unwrap(), balance);
    assert!(!h.scheduler.is_locked());
}

#[tokio::test]
async fn test_reindex_pool_direct() {
    let h = HarnessBuilder::default().build().await;
    let pool = AccountAddress::from_bytes([0x43; 32]);
    let costs = CostSchedule::default();

    let receipt = h.scheduler.reindex_pool(h.keeper, pool).await.unwrap();
    assert_eq!(receipt.job, JobKind::ReindexPool);
    assert!(!receipt.sorted);
    assert!(receipt.reward >= amount(costs.reindex as u128));
    assert_eq!(
        h.scheduler.controller().last_reindex(pool).await.unwrap(),
        START
    );
}

#[tokio::test]
async fn test_reindex_category_pool_sorts_when_stale() {
    let h = HarnessBuilder::default().costs(small_costs()).build().await;
    let controller = h.scheduler.controller().clone();
    let pool = controller.compute_pool_address(3, 1).await.unwrap();

    // Never sorted: stale
    let receipt = h
        .scheduler
        .reindex_category_pool(h.keeper, 3, 1)
        .await
        .unwrap();
    assert!(receipt.sorted);
    assert_eq!(controller.get_last_category_update(3).await.unwrap(), START);
    assert_eq!(controller.last_reindex(pool).await.unwrap(), START);
    // overhead + pool lookup + timestamp read + sort + reindex
    assert_eq!(receipt.gas_used, 5 + 2 + 1 + 50 + 40);
    assert_eq!(receipt.reward, amount(98));

    // Recently sorted: only the reindex runs
    h.clock.advance(3_600);
    let receipt = h
        .scheduler
        .reindex_category_pool(h.keeper, 3, 1)
        .await
        .unwrap();
    assert!(!receipt.sorted);
    assert_eq!(controller.get_last_category_update(3).await.unwrap(), START);
    assert_eq!(controller.last_reindex(pool).await.unwrap(), START + 3_600);
    assert_eq!(receipt.gas_used, 5 + 2 + 1 + 40);

    // Paid once per job
    assert_eq!(h.vault.payout_history().await.len(), 2);
    assert_eq!(h.token.balance_of(h.keeper).await.unwrap(), amount(98 + 48));

    // Exactly at the threshold it is stale again
    h.clock.set(START + MIN_SORT_DELAY);
    let receipt = h
        .scheduler
        .reindex_category_pool(h.keeper, 3, 1)
        .await
        .unwrap();
    assert!(receipt.sorted);
    assert_eq!(
        controller.get_last_category_update(3).await.unwrap(),
        START + MIN_SORT_DELAY
    );
}

#[tokio::test]
async fn test_failed_payment_rolls_back_maintenance() {
    // Cap below the cost of any job
    let h = HarnessBuilder::default()
        .costs(small_costs())
        .max_daily_rewards(10)
        .build()
        .await;
    let controller = h.scheduler.controller().clone();

    let err = h
        .scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, KeeperError::BudgetExceeded { .. }));
    assert_eq!(controller.get_last_category_update(1).await.unwrap(), 0);

    let err = h
        .scheduler
        .update_category_prices(h.keeper, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, KeeperError::BudgetExceeded { .. }));
    assert_eq!(controller.last_price_update(1).await.unwrap(), 0);
    assert_eq!(h.scheduler.last_category_price_update(1).await, 0);

    let err = h
        .scheduler
        .reindex_category_pool(h.keeper, 1, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, KeeperError::BudgetExceeded { .. }));
    let pool = controller.compute_pool_address(1, 0).await.unwrap();
    assert_eq!(controller.last_reindex(pool).await.unwrap(), 0);
    assert_eq!(controller.get_last_category_update(1).await.unwrap(), 0);

    assert!(!h.scheduler.is_locked());
    assert_eq!(h.vault.rewards_today().await, TokenAmount::ZERO);
    assert_eq!(h.token.balance_of(h.keeper).await.unwrap(), TokenAmount::ZERO);

    // Raising the cap lets the same jobs through
    h.vault
        .set_max_daily_rewards(h.owner, amount(10_000))
        .await
        .unwrap();
    h.scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap();
    h.scheduler.update_category_prices(h.keeper, 1).await.unwrap();
    assert_eq!(h.scheduler.last_category_price_update(1).await, START);
}

#[tokio::test]
async fn test_insufficient_vault_balance_rolls_back() {
    let h = HarnessBuilder::default()
        .costs(small_costs())
        .funding(50)
        .build()
        .await;
    let pool = AccountAddress::from_bytes([0x44; 32]);

    // reindex costs 45 > nothing left after the first
    h.scheduler.reindex_pool(h.keeper, pool).await.unwrap();
    h.clock.advance(10);
    let err = h.scheduler.reindex_pool(h.keeper, pool).await.unwrap_err();
    assert!(matches!(err, KeeperError::InsufficientBalance { .. }));
    assert_eq!(
        h.scheduler.controller().last_reindex(pool).await.unwrap(),
        START
    );
    assert_eq!(h.vault.balance().await.unwrap(), amount(5));
}

#[tokio::test]
async fn test_unapproved_scheduler_cannot_pay() {
    let h = HarnessBuilder::default().unapproved().build().await;

    let err = h
        .scheduler
        .order_category_tokens_by_market_cap(h.keeper, 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        KeeperError::NotApprovedKeeper { caller } if caller == h.scheduler.address()
    ));
    assert_eq!(
        h.scheduler
            .controller()
            .get_last_category_update(1)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_concurrent_jobs_are_serialized() {
    let h = HarnessBuilder::default().costs(small_costs()).build().await;

    let mut handles = Vec::new();
    for i in 0..16u64 {
        let scheduler = h.scheduler.clone();
        let keeper = h.keeper;
        handles.push(tokio::spawn(async move {
            scheduler
                .reindex_pool(keeper, AccountAddress::from_bytes([i as u8; 32]))
                .await
        }));
    }

    let mut succeeded = 0u128;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(KeeperError::ReentrancyViolation) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert!(succeeded >= 1);
    assert!(!h.scheduler.is_locked());
    // Every success was paid exactly once
    assert_eq!(h.token.balance_of(h.keeper).await.unwrap(), amount(45 * succeeded));
    assert_eq!(h.vault.payout_history().await.len() as u128, succeeded);
}
