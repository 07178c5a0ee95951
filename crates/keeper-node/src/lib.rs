pub mod config;
pub mod logging;
pub mod simulate;

pub use config::{LoggingConfig, NodeConfig, SimulationConfig};
pub use simulate::{Simulation, SimulationReport};

/// File name `keeper init` writes and other commands look for by default.
pub const DEFAULT_CONFIG_FILE: &str = "keeper.toml";
