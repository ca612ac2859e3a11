//! Interactive session: loop state, operator input, presentation and the
//! poll loop that ties them to the exchange

pub mod advisor;
pub mod commands;
pub mod context;
pub mod input;
pub mod poll;
pub mod present;

// Re-export commonly used types
pub use advisor::{advise, intended_side};
pub use context::SessionContext;
pub use input::{InputEvent, InputSource, StdinInput};
pub use poll::{was_filled, Session};
pub use present::{Alert, Presenter, RenderModel, TerminalPresenter};
