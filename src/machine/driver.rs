//! The state machine driving loop.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::CommandExecutor;
use crate::core::{
    BoundedHistory, BoxedState, State, StateBehavior, TraceKind, TransitionDescriptor,
    TransitionInner, TransitionRecord, TransitionTrace,
};
use crate::error::MachineError;
use crate::machine::builder::BehaviorRegistry;
use crate::machine::context::StateContext;
use crate::machine::factory::{StateMachineFactory, StateTransitionFactory};
use crate::machine::recovery::RecoveryPolicy;
use crate::resolver::{ResolveError, Resolver, TypeKey};

/// Where the driver is in its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MachinePhase {
    Idle,
    Initializing,
    Executing,
    Exiting,
    Terminated,
}

/// Shared configuration of a machine and the sub-machines it spawns.
#[derive(Clone)]
pub(crate) struct MachineConfig {
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) behaviors: Arc<BehaviorRegistry>,
    pub(crate) recovery: RecoveryPolicy,
    pub(crate) history_capacity: NonZeroUsize,
}

/// A state waiting in history for a possible `Back` transition.
struct HistoryEntry {
    state: BoxedState,
    behavior: StateBehavior,
}

/// The state currently owned by the loop.
struct ActiveState {
    state: BoxedState,
    behavior: StateBehavior,
    /// Freshly created, as opposed to re-entered from history.
    fresh: bool,
}

/// Drives states through their initialize → execute → exit cycle, resolves
/// each returned [`TransitionDescriptor`] into the next state, maintains the
/// bounded back-navigation history, and applies the recovery policy when a
/// state faults.
///
/// One `run` per machine: the loop terminates exactly once, and a second
/// `run` call is rejected with [`MachineError::MachineTerminated`]. Cancel
/// the machine from outside through [`cancellation_token`]; active flows are
/// drained before `run` returns [`MachineError::Cancelled`].
///
/// [`cancellation_token`]: StateMachine::cancellation_token
pub struct StateMachine {
    id: Uuid,
    config: MachineConfig,
    root: CancellationToken,
    context: StateContext,
    executor: CommandExecutor,
    history: BoundedHistory<HistoryEntry>,
    trace: TransitionTrace,
    phase: MachinePhase,
}

impl StateMachine {
    pub(crate) fn with_config(config: MachineConfig, root: CancellationToken) -> Self {
        let transitions = StateTransitionFactory::new(
            Arc::clone(&config.resolver),
            Arc::clone(&config.behaviors),
        );
        let machines = StateMachineFactory::new(config.clone(), root.clone());
        let executor = CommandExecutor::new(Arc::clone(&config.resolver), root.clone());
        let context = StateContext::new(transitions, machines, executor.clone());

        Self {
            id: Uuid::new_v4(),
            history: BoundedHistory::new(config.history_capacity),
            trace: TransitionTrace::new(),
            phase: MachinePhase::Idle,
            config,
            root,
            context,
            executor,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MachinePhase {
        self.phase
    }

    /// Root token of this machine. Cancelling it propagates to every state,
    /// command, flow, and sub-machine launched by this machine.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Diagnostic trace of every transition applied so far.
    pub fn trace(&self) -> &TransitionTrace {
        &self.trace
    }

    /// Number of states currently reachable via `Back`.
    pub fn history_depth(&self) -> usize {
        self.history.len()
    }

    /// Run the machine starting from state `S`.
    ///
    /// Resolves only on fatal faults: type-resolution failure, a fault while
    /// applying a recovery transition, a flow failing to finish during the
    /// exit drain, cancellation, or reuse of a terminated machine.
    /// Recoverable state faults are absorbed by the recovery policy and are
    /// visible only through the resulting transition. Active flows are
    /// drained on every termination path, fatal ones included.
    pub async fn run<S: State>(&mut self, payload: S::Payload) -> Result<(), MachineError> {
        if self.phase == MachinePhase::Terminated {
            return Err(MachineError::MachineTerminated);
        }

        debug!(
            machine = %self.id,
            state = TypeKey::of::<S>().short_name(),
            "state machine starting"
        );

        let result = self.drive::<S>(payload).await;
        if result.is_err() {
            // Termination in error still owes started flows their finish.
            if let Err(fault) = self.drain_flows().await {
                warn!(machine = %self.id, error = %fault, "flow drain failed during termination");
            }
        }
        self.phase = MachinePhase::Terminated;
        debug!(machine = %self.id, ok = result.is_ok(), "state machine terminated");
        result
    }

    async fn drive<S: State>(&mut self, payload: S::Payload) -> Result<(), MachineError> {
        let descriptor = self.context.transitions().go_to::<S>(payload);
        let TransitionInner::ToState {
            behavior, creator, ..
        } = descriptor.into_inner()
        else {
            unreachable!("go_to always produces a state transition");
        };

        let mut current = ActiveState {
            state: creator()?,
            behavior,
            fresh: true,
        };

        loop {
            if self.root.is_cancelled() {
                debug!(machine = %self.id, "root token cancelled");
                return Err(MachineError::Cancelled);
            }

            let token = self.root.child_token();
            let (descriptor, recovered) = match self.drive_cycle(&mut current, &token).await {
                Ok(descriptor) => (descriptor, false),
                Err(fault) => (self.recover(current.state.key(), fault)?, true),
            };

            match descriptor.into_inner() {
                TransitionInner::ToState {
                    target,
                    behavior,
                    creator,
                } => {
                    let from = current.state.name();
                    self.trace.record(TransitionRecord {
                        kind: TraceKind::Advance,
                        from: from.to_string(),
                        to: Some(target.short_name().to_string()),
                        recovered,
                        timestamp: Utc::now(),
                    });

                    if !current.behavior.prohibit_return_to_state {
                        self.history.push(HistoryEntry {
                            state: current.state,
                            behavior: current.behavior,
                        });
                    }

                    let next = match creator() {
                        Ok(next) => next,
                        Err(fault) if recovered => {
                            return Err(MachineError::RecoveryFailed {
                                state: from,
                                source: Box::new(fault),
                            });
                        }
                        Err(fault) => return Err(fault),
                    };

                    current = ActiveState {
                        state: next,
                        behavior,
                        fresh: true,
                    };
                }
                TransitionInner::Back => match self.history.pop() {
                    Some(entry) => {
                        self.trace.record(TransitionRecord {
                            kind: TraceKind::Back,
                            from: current.state.name().to_string(),
                            to: Some(entry.state.name().to_string()),
                            recovered,
                            timestamp: Utc::now(),
                        });

                        current = ActiveState {
                            state: entry.state,
                            behavior: entry.behavior,
                            fresh: false,
                        };
                    }
                    // Back with no history to return to becomes an exit.
                    None => return self.finish(&current, recovered).await,
                },
                TransitionInner::Exit => return self.finish(&current, recovered).await,
            }
        }
    }

    /// One initialize → execute → exit cycle of the current state.
    /// Initialization is skipped when re-entering an instance from history,
    /// unless its behavior forces it.
    async fn drive_cycle(
        &mut self,
        current: &mut ActiveState,
        token: &CancellationToken,
    ) -> anyhow::Result<TransitionDescriptor> {
        if current.fresh || current.behavior.initialize_on_transition {
            self.phase = MachinePhase::Initializing;
            debug!(machine = %self.id, state = current.state.name(), "initializing state");
            current.state.initialize(&self.context, token).await?;
        }
        current.fresh = false;

        self.phase = MachinePhase::Executing;
        debug!(machine = %self.id, state = current.state.name(), "executing state");
        let descriptor = current.state.execute(&self.context, token).await?;

        self.phase = MachinePhase::Exiting;
        current.state.exit(&self.context, token).await?;

        Ok(descriptor)
    }

    /// Map a state fault to the substitute transition dictated by the
    /// recovery policy. Resolution failures are never absorbed.
    fn recover(
        &self,
        state: TypeKey,
        fault: anyhow::Error,
    ) -> Result<TransitionDescriptor, MachineError> {
        if let Some(resolution) = fault
            .chain()
            .find_map(|cause| cause.downcast_ref::<ResolveError>())
        {
            return Err(MachineError::Resolution(resolution.clone()));
        }

        warn!(
            machine = %self.id,
            state = state.short_name(),
            error = %fault,
            "state faulted, applying recovery policy"
        );
        Ok(self.config.recovery.descriptor(self.context.transitions()))
    }

    async fn finish(
        &mut self,
        current: &ActiveState,
        recovered: bool,
    ) -> Result<(), MachineError> {
        self.trace.record(TransitionRecord {
            kind: TraceKind::Exit,
            from: current.state.name().to_string(),
            to: None,
            recovered,
            timestamp: Utc::now(),
        });

        self.phase = MachinePhase::Exiting;
        self.drain_flows().await
    }

    async fn drain_flows(&self) -> Result<(), MachineError> {
        let token = self.root.child_token();
        self.executor.finish_active_flows(&token).await
    }
}
