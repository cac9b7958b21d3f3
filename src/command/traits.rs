//! Authoring contracts for commands and flows.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::resolver::TypeKey;

/// A short-lived asynchronous unit: payload in, result out, released
/// immediately after one `execute` call on every path.
#[async_trait]
pub trait Command: Send + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;

    fn set_payload(&mut self, payload: Self::Payload);

    async fn execute(&mut self, token: &CancellationToken) -> Result<Self::Output>;
}

/// A long-lived asynchronous unit started by a state and reconciled later.
///
/// After a successful `start` the flow is owned by the [`CommandExecutor`]
/// until `finish` is called on it, either explicitly or by the driver draining
/// active flows at machine exit. Release happens through `Drop`, exactly once
/// per flow.
///
/// [`CommandExecutor`]: crate::command::CommandExecutor
#[async_trait]
pub trait Flow: Send + 'static {
    type Payload: Send + 'static;
    type Output: Send + 'static;

    fn set_payload(&mut self, payload: Self::Payload);

    async fn start(&mut self, token: &CancellationToken) -> Result<Self::Output>;

    async fn finish(&mut self, token: &CancellationToken) -> Result<()>;
}

/// Erased view of a registered flow: all the executor needs after start is
/// the ability to finish it and a name for diagnostics.
#[async_trait]
pub(crate) trait FinishableFlow: Send {
    fn name(&self) -> &'static str;

    async fn finish(&mut self, token: &CancellationToken) -> Result<()>;
}

#[async_trait]
impl<F: Flow> FinishableFlow for F {
    fn name(&self) -> &'static str {
        TypeKey::of::<F>().short_name()
    }

    async fn finish(&mut self, token: &CancellationToken) -> Result<()> {
        Flow::finish(self, token).await
    }
}
