use anyhow::{bail, Context, Result};
use keeper_core::VaultConfig;
use keeper_jobs::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub vault: VaultConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json"
    pub format: String,
    pub file_output: Option<PathBuf>,
    pub module_filters: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub days: u64,
    pub keepers: u32,
    pub categories: u64,
    pub pools_per_category: u64,
    /// Tokens minted into the vault before the run
    pub vault_funding: u64,
    /// Unix timestamp the simulated clock starts at
    pub start_timestamp: u64,
    /// Seconds between keeper rounds
    pub step_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            days: 7,
            keepers: 3,
            categories: 2,
            pools_per_category: 2,
            vault_funding: 50_000_000,
            start_timestamp: 1_600_000_000,
            step_secs: 3_600,
        }
    }
}

impl NodeConfig {
    /// Defaults that actually pay out; a bare `VaultConfig` pays nothing.
    pub fn with_sample_rates() -> Self {
        Self {
            vault: VaultConfig {
                rewards_per_gas: 1,
                max_daily_rewards: 5_000_000,
            },
            ..Self::default()
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(rate) = parse_env("KEEPER_REWARDS_PER_GAS") {
            self.vault.rewards_per_gas = rate;
        }
        if let Some(max) = parse_env("KEEPER_MAX_DAILY_REWARDS") {
            self.vault.max_daily_rewards = max;
        }

        if let Some(delay) = parse_env("KEEPER_MIN_SORT_DELAY") {
            self.scheduler.min_sort_delay_secs = delay;
        }
        if let Some(delay) = parse_env("KEEPER_MIN_PRICE_UPDATE_DELAY") {
            self.scheduler.min_price_update_delay_secs = delay;
        }

        if let Ok(level) = env::var("KEEPER_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("KEEPER_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }

        if let Some(days) = parse_env("KEEPER_SIM_DAYS") {
            self.simulation.days = days;
        }
        if let Some(funding) = parse_env("KEEPER_VAULT_FUNDING") {
            self.simulation.vault_funding = funding;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => bail!("Unknown log format: {}", other),
        }

        let sim = &self.simulation;
        if sim.keepers == 0 {
            bail!("simulation.keepers must be at least 1");
        }
        if sim.step_secs == 0 {
            bail!("simulation.step_secs must be positive");
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
