//! Machine assembly and driving.
//!
//! [`StateMachineBuilder`] validates configuration and produces a
//! [`StateMachine`]; the machine drives states through their lifecycle,
//! handing each one a [`StateContext`] through which it builds transitions,
//! launches commands and flows, and spawns nested sub-machines.

mod builder;
mod context;
mod driver;
mod factory;
mod recovery;

pub use builder::{BehaviorRegistry, BuildError, StateMachineBuilder, DEFAULT_HISTORY_CAPACITY};
pub use context::StateContext;
pub use driver::{MachinePhase, StateMachine};
pub use factory::{StateMachineFactory, StateTransitionFactory};
pub use recovery::{RecoveryPolicy, RecoveryTarget};
