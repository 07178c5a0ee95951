//! Declared cost model standing in for native execution metering.
//!
//! Costs come from configuration, never from the caller, so a keeper cannot
//! inflate what it is paid. Every delegated controller call is charged at its
//! table price, which keeps a job's payout at or above the cost of the bare
//! maintenance call it wraps.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cost units charged per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSchedule {
    /// Charged once per job: lock handling, bookkeeping and the payout itself
    pub job_overhead: u64,
    /// Each timestamp read from the controller
    pub timestamp_read: u64,
    pub pool_lookup: u64,
    pub sort: u64,
    pub price_update: u64,
    pub reweigh: u64,
    pub reindex: u64,
}

impl Default for CostSchedule {
    fn default() -> Self {
        Self {
            job_overhead: 30_000,
            timestamp_read: 2_100,
            pool_lookup: 5_000,
            sort: 150_000,
            price_update: 120_000,
            reweigh: 400_000,
            reindex: 600_000,
        }
    }
}

impl CostSchedule {
    /// Open a meter with the per-job overhead already charged.
    pub fn meter(&self) -> GasMeter {
        let mut meter = GasMeter::default();
        meter.charge("job_overhead", self.job_overhead);
        meter
    }
}

/// Running total of cost units consumed by one job.
#[derive(Debug, Default, Clone)]
pub struct GasMeter {
    used: u64,
    charges: Vec<(&'static str, u64)>,
}

impl GasMeter {
    pub fn charge(&mut self, label: &'static str, units: u64) {
        self.used = self.used.saturating_add(units);
        self.charges.push((label, units));
        debug!(label, units, total = self.used, "⛽ Gas charged");
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn charges(&self) -> &[(&'static str, u64)] {
        &self.charges
    }
}
