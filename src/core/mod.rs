//! Core state machine types.
//!
//! This module contains the leaf types of the runtime:
//! - The `State` authoring contract
//! - Transition descriptors and behavior flags
//! - The bounded back-navigation history
//! - The diagnostic transition trace

mod history;
mod state;
mod trace;
mod transition;

pub use history::BoundedHistory;
pub use state::State;
pub use trace::{TraceKind, TransitionRecord, TransitionTrace};
pub use transition::{StateBehavior, TransitionDescriptor, TransitionKind};

pub(crate) use state::BoxedState;
pub(crate) use transition::{StateCreator, TransitionInner};
