//! Execution of commands and flows on behalf of a running machine.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cancel::CancellationScope;
use crate::command::traits::{Command, FinishableFlow, Flow};
use crate::error::MachineError;
use crate::resolver::{resolve_instance, Resolver};

/// A flow that started successfully, kept with the scope it is running
/// under. Field order makes the flow release before its scope.
struct ActiveFlow {
    flow: Box<dyn FinishableFlow>,
    _scope: CancellationScope,
}

/// Runs one-shot commands and multi-step flows for a machine, linking their
/// cancellation to the machine's root token and tracking in-flight flows
/// until they are finished.
///
/// Cloning yields a handle to the same active-flow set: the driver holds one
/// for draining at exit, and every [`StateContext`] holds one for states to
/// launch work through.
///
/// [`StateContext`]: crate::machine::StateContext
#[derive(Clone)]
pub struct CommandExecutor {
    resolver: Arc<dyn Resolver>,
    machine_token: CancellationToken,
    // Mutated only on the machine's cooperative control flow; the lock is
    // never held across an await.
    active: Arc<Mutex<Vec<ActiveFlow>>>,
}

impl CommandExecutor {
    pub(crate) fn new(resolver: Arc<dyn Resolver>, machine_token: CancellationToken) -> Self {
        Self {
            resolver,
            machine_token,
            active: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Resolve a command, run it once under a scope linking `token` with the
    /// machine's root token, and release the command and then the scope
    /// whether it succeeds, faults, or is cancelled.
    pub async fn run_command<C: Command>(
        &self,
        token: &CancellationToken,
        payload: C::Payload,
    ) -> Result<C::Output> {
        let mut command = resolve_instance::<C>(self.resolver.as_ref())?;
        let scope = CancellationScope::link(&self.machine_token, token);

        command.set_payload(payload);
        let result = command.execute(scope.token()).await;

        drop(command);
        drop(scope);
        result
    }

    /// Resolve a flow and start it under a linked scope.
    ///
    /// On success the flow joins the active set, owned by this executor from
    /// that point with its scope kept alive beside it, and the start output
    /// is returned while the flow keeps running. On a start failure the flow
    /// and then the scope are released immediately and the fault propagates.
    pub async fn run_flow<F: Flow>(
        &self,
        token: &CancellationToken,
        payload: F::Payload,
    ) -> Result<F::Output> {
        let mut flow = resolve_instance::<F>(self.resolver.as_ref())?;
        let scope = CancellationScope::link(&self.machine_token, token);

        flow.set_payload(payload);
        match flow.start(scope.token()).await {
            Ok(output) => {
                debug!(flow = FinishableFlow::name(&flow), "flow started");
                self.active.lock().push(ActiveFlow {
                    flow: Box::new(flow),
                    _scope: scope,
                });
                Ok(output)
            }
            Err(fault) => {
                drop(flow);
                drop(scope);
                Err(fault)
            }
        }
    }

    /// Finish every active flow concurrently and release each exactly once.
    ///
    /// Resolves immediately when no flows are active. Otherwise all `finish`
    /// calls are fanned out and joined, so one flow faulting does not block
    /// the others, and every flow, then the shared scope, is released
    /// regardless of outcome. The first finish fault is surfaced after
    /// cleanup.
    pub async fn finish_active_flows(
        &self,
        token: &CancellationToken,
    ) -> Result<(), MachineError> {
        let mut flows = std::mem::take(&mut *self.active.lock());
        if flows.is_empty() {
            return Ok(());
        }

        debug!(count = flows.len(), "finishing active flows");
        let scope = CancellationScope::link(&self.machine_token, token);

        let results = futures::future::join_all(
            flows
                .iter_mut()
                .map(|active| active.flow.finish(scope.token())),
        )
        .await;

        let names: Vec<&'static str> = flows.iter().map(|active| active.flow.name()).collect();
        drop(flows);
        drop(scope);

        let mut first_fault = None;
        for (name, result) in names.into_iter().zip(results) {
            if let Err(fault) = result {
                warn!(flow = name, error = %fault, "flow failed to finish");
                if first_fault.is_none() {
                    first_fault = Some(MachineError::FlowFinishFailed {
                        flow: name,
                        source: fault.into(),
                    });
                }
            }
        }

        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Number of flows currently tracked.
    pub fn active_flow_count(&self) -> usize {
        self.active.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    use crate::resolver::TypeRegistry;

    /// Increments a shared counter when dropped.
    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct EchoCommand {
        payload: Option<String>,
        _probe: DropProbe,
    }

    #[async_trait]
    impl Command for EchoCommand {
        type Payload = String;
        type Output = String;

        fn set_payload(&mut self, payload: String) {
            self.payload = Some(payload);
        }

        async fn execute(&mut self, _token: &CancellationToken) -> Result<String> {
            match self.payload.take() {
                Some(payload) => Ok(format!("echo:{payload}")),
                None => Err(anyhow!("payload missing")),
            }
        }
    }

    struct FailingCommand {
        _probe: DropProbe,
    }

    #[async_trait]
    impl Command for FailingCommand {
        type Payload = ();
        type Output = ();

        fn set_payload(&mut self, _payload: ()) {}

        async fn execute(&mut self, _token: &CancellationToken) -> Result<()> {
            Err(anyhow!("command blew up"))
        }
    }

    struct TokenWatchCommand;

    #[async_trait]
    impl Command for TokenWatchCommand {
        type Payload = ();
        type Output = bool;

        fn set_payload(&mut self, _payload: ()) {}

        async fn execute(&mut self, token: &CancellationToken) -> Result<bool> {
            let observed = timeout(Duration::from_secs(1), token.cancelled())
                .await
                .is_ok();
            Ok(observed)
        }
    }

    struct TrackedFlow {
        fail_start: bool,
        fail_finish: bool,
        finished: Arc<AtomicUsize>,
        _probe: DropProbe,
    }

    #[async_trait]
    impl Flow for TrackedFlow {
        type Payload = ();
        type Output = &'static str;

        fn set_payload(&mut self, _payload: ()) {}

        async fn start(&mut self, _token: &CancellationToken) -> Result<&'static str> {
            if self.fail_start {
                Err(anyhow!("start refused"))
            } else {
                Ok("started")
            }
        }

        async fn finish(&mut self, _token: &CancellationToken) -> Result<()> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail_finish {
                Err(anyhow!("finish refused"))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        executor: CommandExecutor,
        machine_token: CancellationToken,
        drops: Arc<AtomicUsize>,
        finishes: Arc<AtomicUsize>,
    }

    fn fixture(fail_start: bool, fail_finish: bool) -> Fixture {
        let drops = Arc::new(AtomicUsize::new(0));
        let finishes = Arc::new(AtomicUsize::new(0));
        let machine_token = CancellationToken::new();

        let mut registry = TypeRegistry::new();
        {
            let drops = Arc::clone(&drops);
            registry.register(move || EchoCommand {
                payload: None,
                _probe: DropProbe(Arc::clone(&drops)),
            });
        }
        {
            let drops = Arc::clone(&drops);
            registry.register(move || FailingCommand {
                _probe: DropProbe(Arc::clone(&drops)),
            });
        }
        registry.register(|| TokenWatchCommand);
        {
            let drops = Arc::clone(&drops);
            let finishes = Arc::clone(&finishes);
            registry.register(move || TrackedFlow {
                fail_start,
                fail_finish,
                finished: Arc::clone(&finishes),
                _probe: DropProbe(Arc::clone(&drops)),
            });
        }

        Fixture {
            executor: CommandExecutor::new(Arc::new(registry), machine_token.clone()),
            machine_token,
            drops,
            finishes,
        }
    }

    #[tokio::test]
    async fn run_command_returns_result_and_releases_command() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        let output = fx
            .executor
            .run_command::<EchoCommand>(&token, "hi".to_string())
            .await
            .unwrap();

        assert_eq!(output, "echo:hi");
        assert_eq!(fx.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn faulted_command_is_still_released() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        let result = fx.executor.run_command::<FailingCommand>(&token, ()).await;

        assert!(result.is_err());
        assert_eq!(fx.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unregistered_command_yields_resolution_error() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        struct NotRegistered;

        #[async_trait]
        impl Command for NotRegistered {
            type Payload = ();
            type Output = ();

            fn set_payload(&mut self, _payload: ()) {}

            async fn execute(&mut self, _token: &CancellationToken) -> Result<()> {
                Ok(())
            }
        }

        let result = fx.executor.run_command::<NotRegistered>(&token, ()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn command_token_observes_machine_cancellation() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        fx.machine_token.cancel();
        let observed = fx
            .executor
            .run_command::<TokenWatchCommand>(&token, ())
            .await
            .unwrap();

        assert!(observed);
    }

    #[tokio::test]
    async fn command_token_observes_local_cancellation_without_touching_machine() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();
        token.cancel();

        let observed = fx
            .executor
            .run_command::<TokenWatchCommand>(&token, ())
            .await
            .unwrap();

        assert!(observed);
        assert!(!fx.machine_token.is_cancelled());
    }

    #[tokio::test]
    async fn started_flow_joins_active_set() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        let output = fx.executor.run_flow::<TrackedFlow>(&token, ()).await.unwrap();

        assert_eq!(output, "started");
        assert_eq!(fx.executor.active_flow_count(), 1);
        assert_eq!(fx.drops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_start_releases_flow_immediately() {
        let fx = fixture(true, false);
        let token = CancellationToken::new();

        let result = fx.executor.run_flow::<TrackedFlow>(&token, ()).await;

        assert!(result.is_err());
        assert_eq!(fx.executor.active_flow_count(), 0);
        assert_eq!(fx.drops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finish_with_no_active_flows_is_a_no_op() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        fx.executor.finish_active_flows(&token).await.unwrap();

        assert_eq!(fx.finishes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn finish_runs_and_releases_every_flow_exactly_once() {
        let fx = fixture(false, false);
        let token = CancellationToken::new();

        for _ in 0..3 {
            fx.executor.run_flow::<TrackedFlow>(&token, ()).await.unwrap();
        }

        fx.executor.finish_active_flows(&token).await.unwrap();

        assert_eq!(fx.finishes.load(Ordering::SeqCst), 3);
        assert_eq!(fx.drops.load(Ordering::SeqCst), 3);
        assert_eq!(fx.executor.active_flow_count(), 0);
    }

    #[tokio::test]
    async fn finish_fault_does_not_block_other_flows_or_cleanup() {
        let fx = fixture(false, true);
        let token = CancellationToken::new();

        for _ in 0..2 {
            fx.executor.run_flow::<TrackedFlow>(&token, ()).await.unwrap();
        }

        let result = fx.executor.finish_active_flows(&token).await;

        assert!(matches!(
            result,
            Err(MachineError::FlowFinishFailed { .. })
        ));
        assert_eq!(fx.finishes.load(Ordering::SeqCst), 2);
        assert_eq!(fx.drops.load(Ordering::SeqCst), 2);
        assert_eq!(fx.executor.active_flow_count(), 0);
    }
}
