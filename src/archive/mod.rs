//! Local trade ledger and its synchronization with the exchange history

pub mod store;
pub mod sync;

pub use store::{LedgerStore, SqliteLedger};
pub use sync::{is_profit, ArchiveSource, ArchiveStatus, SyncReport, TradeArchiveSync};
