//! Machina: a hierarchical asynchronous state machine runtime
//!
//! A machine drives states through an initialize → execute → exit lifecycle.
//! Each state returns a transition descriptor naming what happens next:
//! advance to another state, go back to the previous one, or exit the
//! machine. States, commands, and flows are resolved by type through a
//! pluggable [`Resolver`], and every unit of work receives a
//! [`CancellationToken`] linked to the machine that launched it.
//!
//! # Core Concepts
//!
//! - **State**: Async lifecycle unit implementing the [`State`] trait
//! - **Transitions**: Descriptors built through the [`StateContext`],
//!   applied by the driver after the state exits
//! - **History**: Bounded stack of exited states backing `Back` navigation
//! - **Commands and flows**: One-shot and long-lived side work run through
//!   the [`CommandExecutor`]
//! - **Recovery**: A [`RecoveryPolicy`] substitutes a transition when a
//!   state faults
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use anyhow::Result;
//! use machina::{
//!     async_trait, CancellationToken, State, StateContext, StateMachineBuilder,
//!     TransitionDescriptor, TypeRegistry,
//! };
//!
//! struct Greet {
//!     name: String,
//! }
//!
//! #[async_trait]
//! impl State for Greet {
//!     type Payload = String;
//!
//!     fn set_payload(&mut self, name: String) {
//!         self.name = name;
//!     }
//!
//!     async fn execute(
//!         &mut self,
//!         ctx: &StateContext,
//!         _token: &CancellationToken,
//!     ) -> Result<TransitionDescriptor> {
//!         println!("hello, {}", self.name);
//!         Ok(ctx.go_to::<Farewell>(()))
//!     }
//! }
//!
//! struct Farewell;
//!
//! #[async_trait]
//! impl State for Farewell {
//!     type Payload = ();
//!
//!     fn set_payload(&mut self, _payload: ()) {}
//!
//!     async fn execute(
//!         &mut self,
//!         ctx: &StateContext,
//!         _token: &CancellationToken,
//!     ) -> Result<TransitionDescriptor> {
//!         Ok(ctx.exit())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let mut registry = TypeRegistry::new();
//! registry.register(|| Greet { name: String::new() });
//! registry.register(|| Farewell);
//!
//! let mut machine = StateMachineBuilder::new(Arc::new(registry)).build()?;
//! machine.run::<Greet>("world".to_string()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Resolver`]: resolver::Resolver
//! [`CommandExecutor`]: command::CommandExecutor
//! [`RecoveryPolicy`]: machine::RecoveryPolicy

pub mod cancel;
pub mod command;
pub mod core;
pub mod error;
pub mod machine;
pub mod resolver;

// Re-export commonly used types
pub use crate::cancel::CancellationScope;
pub use crate::command::{Command, CommandExecutor, Flow};
pub use crate::core::{
    BoundedHistory, State, StateBehavior, TraceKind, TransitionDescriptor, TransitionKind,
    TransitionRecord, TransitionTrace,
};
pub use crate::error::MachineError;
pub use crate::machine::{
    BehaviorRegistry, BuildError, MachinePhase, RecoveryPolicy, RecoveryTarget, StateContext,
    StateMachine, StateMachineBuilder, StateMachineFactory, StateTransitionFactory,
    DEFAULT_HISTORY_CAPACITY,
};
pub use crate::resolver::{ResolveError, Resolver, TypeKey, TypeRegistry};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
