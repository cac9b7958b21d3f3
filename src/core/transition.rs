//! Transition descriptors returned by executing states.

use std::fmt;

use crate::core::state::BoxedState;
use crate::error::MachineError;
use crate::resolver::TypeKey;

/// What a state asked the machine to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionKind {
    /// Advance to a new state.
    ToState,
    /// Return to the most recent state in history.
    Back,
    /// Terminate the machine.
    Exit,
}

/// Behavior flags attached to a target state type.
///
/// Looked up from the machine's registration table when a descriptor is
/// created; an unregistered type gets both flags `false`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateBehavior {
    /// The state is never pushed to history, so it can never be the target of
    /// a later `Back` transition.
    pub prohibit_return_to_state: bool,
    /// Re-run `initialize` even when the machine re-enters an existing
    /// instance via `Back`.
    pub initialize_on_transition: bool,
}

/// One-shot constructor for the next state instance: resolves it, injects the
/// payload, and boxes it for the driver.
pub(crate) type StateCreator = Box<dyn FnOnce() -> Result<BoxedState, MachineError> + Send>;

pub(crate) enum TransitionInner {
    ToState {
        target: TypeKey,
        behavior: StateBehavior,
        creator: StateCreator,
    },
    Back,
    Exit,
}

/// The decision of what happens next: go to a new state, go back, or exit.
///
/// Immutable once built. A creator for the next state is present exactly when
/// the kind is [`TransitionKind::ToState`]; the private representation makes
/// any other combination unrepresentable.
pub struct TransitionDescriptor {
    inner: TransitionInner,
}

impl TransitionDescriptor {
    pub(crate) fn to_state(target: TypeKey, behavior: StateBehavior, creator: StateCreator) -> Self {
        Self {
            inner: TransitionInner::ToState {
                target,
                behavior,
                creator,
            },
        }
    }

    pub(crate) fn back() -> Self {
        Self {
            inner: TransitionInner::Back,
        }
    }

    pub(crate) fn exit() -> Self {
        Self {
            inner: TransitionInner::Exit,
        }
    }

    pub fn kind(&self) -> TransitionKind {
        match self.inner {
            TransitionInner::ToState { .. } => TransitionKind::ToState,
            TransitionInner::Back => TransitionKind::Back,
            TransitionInner::Exit => TransitionKind::Exit,
        }
    }

    /// Target state type for `ToState` descriptors.
    pub fn target(&self) -> Option<TypeKey> {
        match &self.inner {
            TransitionInner::ToState { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// Behavior flags of the target; defaults for `Back` and `Exit`.
    pub fn behavior(&self) -> StateBehavior {
        match &self.inner {
            TransitionInner::ToState { behavior, .. } => *behavior,
            _ => StateBehavior::default(),
        }
    }

    pub(crate) fn into_inner(self) -> TransitionInner {
        self.inner
    }
}

impl fmt::Debug for TransitionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            TransitionInner::ToState {
                target, behavior, ..
            } => f
                .debug_struct("TransitionDescriptor")
                .field("kind", &TransitionKind::ToState)
                .field("target", &target.short_name())
                .field("behavior", behavior)
                .finish(),
            TransitionInner::Back => f
                .debug_struct("TransitionDescriptor")
                .field("kind", &TransitionKind::Back)
                .finish(),
            TransitionInner::Exit => f
                .debug_struct("TransitionDescriptor")
                .field("kind", &TransitionKind::Exit)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_descriptor_has_no_target_and_default_behavior() {
        let descriptor = TransitionDescriptor::back();

        assert_eq!(descriptor.kind(), TransitionKind::Back);
        assert_eq!(descriptor.target(), None);
        assert_eq!(descriptor.behavior(), StateBehavior::default());
    }

    #[test]
    fn exit_descriptor_has_no_target() {
        let descriptor = TransitionDescriptor::exit();

        assert_eq!(descriptor.kind(), TransitionKind::Exit);
        assert_eq!(descriptor.target(), None);
    }

    #[test]
    fn behavior_defaults_to_both_flags_off() {
        let behavior = StateBehavior::default();

        assert!(!behavior.prohibit_return_to_state);
        assert!(!behavior.initialize_on_transition);
    }
}
