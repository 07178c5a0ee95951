pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod token;
pub mod types;
pub mod vault;

pub use access::AccessRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VaultConfig;
pub use error::{KeeperError, Result};
pub use token::{MemoryToken, RewardsToken};
pub use types::{day_index, AccountAddress, TokenAmount, SECONDS_PER_DAY};
pub use vault::{PayoutRecord, RewardVault, VaultSnapshot};
