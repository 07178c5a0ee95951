use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keeper_node::{logging, NodeConfig, Simulation, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keeper")]
#[command(about = "Keeper rewards - budgeted payouts for permissionless upkeep jobs", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file with sample reward rates
    Init {
        /// Output directory for configuration
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Run an in-memory keeper simulation and print the report as JSON
    Simulate {
        /// Number of simulated days
        #[arg(long)]
        days: Option<u64>,

        /// Number of keepers taking turns
        #[arg(long)]
        keepers: Option<u32>,

        /// Number of controller categories
        #[arg(long)]
        categories: Option<u64>,
    },

    /// Print the effective configuration after file, env and defaults are merged
    ShowConfig,
}

/// File config if given or present in the working directory, then env overrides.
fn load_config(path: Option<&Path>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            NodeConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => NodeConfig::with_sample_rates(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (ignore if it doesn't)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        // Fall back to basic logging
        let log_level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| format!("keeper={}", log_level)),
            ))
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Init { output, force } => {
            info!(output_dir = ?output, "🧬 Initializing keeper configuration");
            std::fs::create_dir_all(&output)?;

            let config_path = output.join(DEFAULT_CONFIG_FILE);
            if config_path.exists() && !force {
                warn!(path = ?config_path, "⚠️ Configuration exists, pass --force to overwrite");
                return Ok(());
            }

            NodeConfig::with_sample_rates().save_to_file(&config_path)?;
            info!(path = ?config_path, "✅ Configuration saved");
            Ok(())
        }

        Commands::Simulate {
            days,
            keepers,
            categories,
        } => {
            if let Some(days) = days {
                config.simulation.days = days;
            }
            if let Some(keepers) = keepers {
                config.simulation.keepers = keepers;
            }
            if let Some(categories) = categories {
                config.simulation.categories = categories;
            }

            info!(
                days = config.simulation.days,
                keepers = config.simulation.keepers,
                categories = config.simulation.categories,
                rewards_per_gas = config.vault.rewards_per_gas,
                max_daily_rewards = config.vault.max_daily_rewards,
                "🧪 Starting simulation"
            );

            let simulation = Simulation::new(config).await?;
            let report = simulation.run().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serializing report")?
            );
            Ok(())
        }

        Commands::ShowConfig => {
            config.validate()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
