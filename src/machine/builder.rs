//! Configuration surface for constructing state machines.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::{State, StateBehavior};
use crate::machine::driver::{MachineConfig, StateMachine};
use crate::machine::recovery::RecoveryPolicy;
use crate::resolver::{Resolver, TypeKey};

/// History entries kept when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 16;

/// Explicit registration table mapping state types to their behavior flags.
///
/// Resolved at machine construction time; a state type without a
/// registration gets [`StateBehavior::default`].
#[derive(Debug, Default)]
pub struct BehaviorRegistry {
    table: HashMap<TypeKey, StateBehavior>,
}

impl BehaviorRegistry {
    pub fn register<S: State>(&mut self, behavior: StateBehavior) -> &mut Self {
        self.table.insert(TypeKey::of::<S>(), behavior);
        self
    }

    pub fn lookup(&self, key: TypeKey) -> StateBehavior {
        self.table.get(&key).copied().unwrap_or_default()
    }
}

/// Errors from invalid machine configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("history capacity must be at least 1")]
    InvalidHistoryCapacity,
}

/// Fluent construction of a [`StateMachine`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use machina::{RecoveryPolicy, StateMachineBuilder, TypeRegistry};
///
/// # fn demo() -> Result<(), machina::BuildError> {
/// let registry = TypeRegistry::new();
/// let machine = StateMachineBuilder::new(Arc::new(registry))
///     .history_capacity(8)
///     .recovery(RecoveryPolicy::Exit)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct StateMachineBuilder {
    resolver: Arc<dyn Resolver>,
    behaviors: BehaviorRegistry,
    recovery: RecoveryPolicy,
    history_capacity: usize,
}

impl StateMachineBuilder {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            behaviors: BehaviorRegistry::default(),
            recovery: RecoveryPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Register behavior flags for a state type.
    pub fn behavior<S: State>(mut self, behavior: StateBehavior) -> Self {
        self.behaviors.register::<S>(behavior);
        self
    }

    /// Recovery policy applied when a state faults. Defaults to
    /// [`RecoveryPolicy::GoBack`].
    pub fn recovery(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery = policy;
        self
    }

    /// Maximum number of states kept for back-navigation.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Validate the configuration and construct the machine.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        let history_capacity = NonZeroUsize::new(self.history_capacity)
            .ok_or(BuildError::InvalidHistoryCapacity)?;

        let config = MachineConfig {
            resolver: self.resolver,
            behaviors: Arc::new(self.behaviors),
            recovery: self.recovery,
            history_capacity,
        };

        Ok(StateMachine::with_config(config, CancellationToken::new()))
    }
}
