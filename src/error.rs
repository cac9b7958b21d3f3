//! Fatal error taxonomy surfaced from a running machine.

use crate::resolver::ResolveError;
use thiserror::Error;

/// Errors that terminate a state machine run.
///
/// Recoverable faults (a state's initialize/execute/exit failing) are absorbed
/// by the machine's recovery policy and never appear here; `run` rejects only
/// for the fatal categories below.
#[derive(Debug, Error)]
pub enum MachineError {
    /// The type-resolution capability could not produce a requested instance.
    /// Always fatal, including when a state propagates one out of a command
    /// or flow invocation.
    #[error("type resolution failed")]
    Resolution(#[from] ResolveError),

    /// `run` was called on a machine that already reached its terminal phase.
    #[error("run() called on a terminated state machine")]
    MachineTerminated,

    /// The machine's root cancellation token was cancelled while running.
    /// Active flows are drained before this is returned.
    #[error("state machine cancelled")]
    Cancelled,

    /// A flow's `finish` faulted while the machine was draining active flows
    /// at exit. Every flow is still finished and released before this
    /// surfaces; only the first fault is reported.
    #[error("flow '{flow}' failed to finish")]
    FlowFinishFailed {
        flow: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Applying the recovery transition itself failed after a state fault.
    #[error("recovery transition failed after a fault in state '{state}'")]
    RecoveryFailed {
        state: &'static str,
        #[source]
        source: Box<MachineError>,
    },
}
