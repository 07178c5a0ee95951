pub mod config;
pub mod controller;
pub mod gas;
pub mod guard;
pub mod memory;
pub mod scheduler;

pub use config::{SchedulerConfig, MIN_PRICE_UPDATE_DELAY, MIN_SORT_DELAY};
pub use controller::{CategoryId, Controller, PoolId};
pub use gas::{CostSchedule, GasMeter};
pub use guard::{EnteredGuard, ReentrancyGuard};
pub use memory::MemoryController;
pub use scheduler::{JobKind, JobReceipt, JobScheduler};
