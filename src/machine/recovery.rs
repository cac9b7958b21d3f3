//! Recovery policy applied when a state's lifecycle faults.

use std::fmt;
use std::sync::Arc;

use crate::core::{State, TransitionDescriptor};
use crate::machine::factory::StateTransitionFactory;

type TargetFn = dyn Fn(&StateTransitionFactory) -> TransitionDescriptor + Send + Sync;

/// Deferred construction of the recovery transition for
/// [`RecoveryPolicy::GoToState`].
#[derive(Clone)]
pub struct RecoveryTarget(Arc<TargetFn>);

/// The substitute transition applied when a state's initialize, execute, or
/// exit faults.
///
/// The fault is absorbed: the machine behaves as if the state had returned
/// the substitute descriptor. A fault while applying the substitute itself is
/// fatal and surfaces from `run`.
#[derive(Clone, Default)]
pub enum RecoveryPolicy {
    /// Behave as if the faulted state returned a back transition.
    #[default]
    GoBack,
    /// Behave as if it returned an exit transition.
    Exit,
    /// Behave as if it returned a transition to a fixed recovery state.
    GoToState(RecoveryTarget),
}

impl RecoveryPolicy {
    /// Recover by transitioning to state `S`, which must take no payload.
    pub fn go_to<S>() -> Self
    where
        S: State<Payload = ()>,
    {
        RecoveryPolicy::GoToState(RecoveryTarget(Arc::new(|transitions| {
            transitions.go_to::<S>(())
        })))
    }

    pub(crate) fn descriptor(&self, transitions: &StateTransitionFactory) -> TransitionDescriptor {
        match self {
            RecoveryPolicy::GoBack => transitions.back(),
            RecoveryPolicy::Exit => transitions.exit(),
            RecoveryPolicy::GoToState(target) => (target.0)(transitions),
        }
    }
}

impl fmt::Debug for RecoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryPolicy::GoBack => write!(f, "GoBack"),
            RecoveryPolicy::Exit => write!(f, "Exit"),
            RecoveryPolicy::GoToState(_) => write!(f, "GoToState"),
        }
    }
}
