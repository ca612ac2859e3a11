//! Configuration for the trading assistant

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::engine::KickPolicy;
use crate::exchange::DEFAULT_BASE_URL;
use crate::types::Balance;

/// Execution mode determines whether orders are simulated or sent to the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionMode {
    /// Paper account, no orders leave the process
    #[default]
    Simulation,
    /// Signed orders against the exchange
    Live,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulation => write!(f, "Simulation"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Every tunable of the poll loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Execution mode (simulation or live)
    pub mode: ExecutionMode,

    /// Base currency (e.g., "BTC")
    pub base: String,

    /// Quote currency (e.g., "USD")
    pub quote: String,

    /// REST API root
    pub base_url: String,

    /// Submit auto-trade suggestions instead of only showing them
    pub auto_place: bool,

    /// Initial lock depth (0 disables the lock)
    pub lock_depth: usize,

    /// Distance from the lock after a kick
    pub kick_step: Decimal,

    /// Kicks before the lock is relaxed by one level
    pub kick_relax_every: u32,

    /// Lock depth at or below which relaxation still happens
    pub kick_relax_ceiling: usize,

    /// Price step for manual up/down repricing
    pub tick_size: Decimal,

    /// Tally bucket width
    pub bucket_width: Decimal,

    /// Samples before the sell board locks
    pub sell_window: u32,

    /// Samples before the buy board locks
    pub buy_window: u32,

    /// Exchange fee rate (0.0026 = 0.26%)
    pub fee_rate: Decimal,

    /// Base balance below which the account counts as flat in base
    pub base_dust: Decimal,

    /// Base balance above which a new manual order sells everything
    pub base_sell_min: Decimal,

    /// Quote balance threshold for side selection
    pub quote_min: Decimal,

    /// Run an archive update every N cycles
    pub archive_every: u64,

    /// Refresh ticker and last price every N cycles
    pub ticker_every: u64,

    /// Wait for input this long between cycles (ms)
    pub idle_timeout_ms: u64,

    /// Per-request HTTP timeout (seconds)
    pub http_timeout_secs: u64,

    /// Retries for idempotent requests
    pub http_retries: u32,

    /// Pause between retries (ms)
    pub retry_backoff_ms: u64,

    /// SQLite ledger file
    pub ledger_path: PathBuf,

    /// Records shown by the history view
    pub history_page: usize,

    /// Ladder rows rendered per side
    pub book_rows: usize,

    /// Rows summed for the top-of-book volume statistics
    pub volume_depth: usize,

    /// Starting paper balance in simulation mode
    pub paper_balance: Balance,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulation,
            base: "BTC".to_string(),
            quote: "USD".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auto_place: false,
            lock_depth: 5,
            kick_step: dec!(2.0),
            kick_relax_every: 4,
            kick_relax_ceiling: 5,
            tick_size: dec!(1),
            bucket_width: dec!(0.1),
            sell_window: 60,
            buy_window: 8,
            fee_rate: dec!(0.0026),
            base_dust: dec!(0.01),
            base_sell_min: dec!(0.02),
            quote_min: dec!(100),
            archive_every: 3000,
            ticker_every: 300,
            idle_timeout_ms: 200,
            http_timeout_secs: 10,
            http_retries: 2,
            retry_backoff_ms: 500,
            ledger_path: PathBuf::from("ledger.db"),
            history_page: 40,
            book_rows: 40,
            volume_depth: 10,
            paper_balance: Balance {
                base: Decimal::ZERO,
                quote: dec!(1000),
            },
        }
    }
}

impl TraderConfig {
    /// Ledger namespace for the traded pair (e.g., "BTC/USD")
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }

    pub fn is_live(&self) -> bool {
        self.mode == ExecutionMode::Live
    }

    pub fn kick_policy(&self) -> KickPolicy {
        KickPolicy {
            step: self.kick_step,
            relax_every: self.kick_relax_every,
            relax_ceiling: self.kick_relax_ceiling,
            ..KickPolicy::default()
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Whether cycle `n` runs the periodic archive update
    pub fn is_archive_cycle(&self, n: u64) -> bool {
        self.archive_every > 0 && n > 0 && n % self.archive_every == 0
    }

    /// Whether cycle `n` refreshes the ticker
    pub fn is_ticker_cycle(&self, n: u64) -> bool {
        self.ticker_every > 0 && n > 0 && n % self.ticker_every == 0
    }
}
