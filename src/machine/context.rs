//! The facade handed to states during their lifecycle.

use crate::command::CommandExecutor;
use crate::core::{State, TransitionDescriptor};
use crate::machine::factory::{StateMachineFactory, StateTransitionFactory};

/// Everything a state may reach for while it runs: transition construction,
/// nested sub-machines for composite states, and the command executor.
///
/// States receive a `&StateContext` in every lifecycle call, so they can
/// describe their next transition without depending on the factory types
/// directly.
#[derive(Clone)]
pub struct StateContext {
    transitions: StateTransitionFactory,
    machines: StateMachineFactory,
    commands: CommandExecutor,
}

impl StateContext {
    pub(crate) fn new(
        transitions: StateTransitionFactory,
        machines: StateMachineFactory,
        commands: CommandExecutor,
    ) -> Self {
        Self {
            transitions,
            machines,
            commands,
        }
    }

    pub fn transitions(&self) -> &StateTransitionFactory {
        &self.transitions
    }

    /// Factory for nested sub-machines (composite states).
    pub fn machines(&self) -> &StateMachineFactory {
        &self.machines
    }

    /// Executor for commands and flows, linked to this machine's root token.
    pub fn commands(&self) -> &CommandExecutor {
        &self.commands
    }

    /// Shorthand for `self.transitions().go_to::<S>(payload)`.
    pub fn go_to<S: State>(&self, payload: S::Payload) -> TransitionDescriptor {
        self.transitions.go_to::<S>(payload)
    }

    /// Shorthand for `self.transitions().back()`.
    pub fn back(&self) -> TransitionDescriptor {
        self.transitions.back()
    }

    /// Shorthand for `self.transitions().exit()`.
    pub fn exit(&self) -> TransitionDescriptor {
        self.transitions.exit()
    }
}
