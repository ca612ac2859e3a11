// Library crate - decision engine, exchange collaborators, trade ledger and
// the interactive session loop

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::{ExecutionMode, TraderConfig};
pub use error::{EngineError, EngineResult};
pub use types::*;
