use crate::types::{AccountAddress, TokenAmount};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("Caller {caller} is not the owner")]
    Unauthorized { caller: AccountAddress },

    #[error("Caller {caller} is not an approved keeper")]
    NotApprovedKeeper { caller: AccountAddress },

    #[error("{job} for {target} not ready until {ready_at} (now {now})")]
    RateLimitNotElapsed {
        job: &'static str,
        target: String,
        ready_at: u64,
        now: u64,
    },

    #[error("Exceeds maximum daily rewards: requested {requested}, paid today {paid_today}, max {max_daily}")]
    BudgetExceeded {
        requested: TokenAmount,
        paid_today: TokenAmount,
        max_daily: TokenAmount,
    },

    #[error("Insufficient balance: {holder} has {has}, needs {needs}")]
    InsufficientBalance {
        holder: AccountAddress,
        has: TokenAmount,
        needs: TokenAmount,
    },

    #[error("Reentrant call rejected")]
    ReentrancyViolation,

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Controller call failed: {0:#}")]
    Controller(anyhow::Error),
}

impl KeeperError {
    /// Whether the condition that triggered the error clears on its own
    /// (time passing, budget reset, lock released).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitNotElapsed { .. } | Self::BudgetExceeded { .. } | Self::ReentrancyViolation
        )
    }

    /// Stable short name, used as a label in summaries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotApprovedKeeper { .. } => "not_approved_keeper",
            Self::RateLimitNotElapsed { .. } => "rate_limit_not_elapsed",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ReentrancyViolation => "reentrancy_violation",
            Self::Overflow(_) => "overflow",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Controller(_) => "controller",
        }
    }
}

// A controller that calls back into the scheduler surfaces the scheduler's own
// error through anyhow; unwrap it so callers see the original variant.
impl From<anyhow::Error> for KeeperError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<KeeperError>() {
            Ok(inner) => inner,
            Err(other) => Self::Controller(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeeperError>;
