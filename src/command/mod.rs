//! Command and flow execution layer.
//!
//! States launch asynchronous work through this module: one-shot
//! [`Command`]s released right after execution, and longer-lived [`Flow`]s
//! tracked by the [`CommandExecutor`] until the driver drains them at
//! machine exit.

mod executor;
mod traits;

pub use executor::CommandExecutor;
pub use traits::{Command, Flow};
