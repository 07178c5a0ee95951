use crate::gas::CostSchedule;
use keeper_core::{KeeperError, Result, SECONDS_PER_DAY};
use serde::{Deserialize, Serialize};

/// Minimum time between two sorts of the same category: 3.5 days.
pub const MIN_SORT_DELAY: u64 = SECONDS_PER_DAY * 7 / 2;

/// Minimum time between two price refreshes of the same category: 1 day.
pub const MIN_PRICE_UPDATE_DELAY: u64 = SECONDS_PER_DAY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_sort_delay_secs: u64,
    pub min_price_update_delay_secs: u64,
    pub costs: CostSchedule,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_sort_delay_secs: MIN_SORT_DELAY,
            min_price_update_delay_secs: MIN_PRICE_UPDATE_DELAY,
            costs: CostSchedule::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_sort_delay_secs == 0 {
            return Err(KeeperError::InvalidConfig(
                "min_sort_delay_secs must be positive".to_string(),
            ));
        }
        if self.min_price_update_delay_secs == 0 {
            return Err(KeeperError::InvalidConfig(
                "min_price_update_delay_secs must be positive".to_string(),
            ));
        }

        // A zero-priced delegate would let a job cost the keeper more than it pays
        let costs = &self.costs;
        for (name, units) in [
            ("sort", costs.sort),
            ("price_update", costs.price_update),
            ("reweigh", costs.reweigh),
            ("reindex", costs.reindex),
        ] {
            if units == 0 {
                return Err(KeeperError::InvalidConfig(format!(
                    "cost for {} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}
