//! The state authoring contract and its type-erased runtime form.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::transition::TransitionDescriptor;
use crate::machine::StateContext;
use crate::resolver::TypeKey;

/// One executable step of a state machine.
///
/// A state receives its payload through [`set_payload`](State::set_payload)
/// before any lifecycle call, then runs an `initialize` → `execute` → `exit`
/// cycle owned exclusively by the driver. `execute` returns a
/// [`TransitionDescriptor`] built through the [`StateContext`] facade:
/// advance to another state, go back, or exit the machine.
///
/// `initialize` and `exit` default to no-ops. Every lifecycle method receives
/// a cancellation token that is a child of the machine's root token.
///
/// # Example
///
/// ```rust
/// use machina::{async_trait, CancellationToken, State, StateContext, TransitionDescriptor};
///
/// struct Countdown {
///     remaining: u32,
/// }
///
/// #[async_trait]
/// impl State for Countdown {
///     type Payload = u32;
///
///     fn set_payload(&mut self, payload: u32) {
///         self.remaining = payload;
///     }
///
///     async fn execute(
///         &mut self,
///         ctx: &StateContext,
///         _token: &CancellationToken,
///     ) -> anyhow::Result<TransitionDescriptor> {
///         if self.remaining == 0 {
///             Ok(ctx.exit())
///         } else {
///             Ok(ctx.go_to::<Countdown>(self.remaining - 1))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait State: Send + Sync + 'static {
    /// Value injected into the state before its lifecycle begins.
    type Payload: Send + 'static;

    fn set_payload(&mut self, payload: Self::Payload);

    async fn initialize(
        &mut self,
        _ctx: &StateContext,
        _token: &CancellationToken,
    ) -> Result<()> {
        Ok(())
    }

    async fn execute(
        &mut self,
        ctx: &StateContext,
        token: &CancellationToken,
    ) -> Result<TransitionDescriptor>;

    async fn exit(&mut self, _ctx: &StateContext, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

/// Object-safe form of [`State`] the driver owns and stores in history.
#[async_trait]
pub(crate) trait AnyState: Send + Sync {
    fn key(&self) -> TypeKey;
    fn name(&self) -> &'static str;

    async fn initialize(&mut self, ctx: &StateContext, token: &CancellationToken) -> Result<()>;

    async fn execute(
        &mut self,
        ctx: &StateContext,
        token: &CancellationToken,
    ) -> Result<TransitionDescriptor>;

    async fn exit(&mut self, ctx: &StateContext, token: &CancellationToken) -> Result<()>;
}

#[async_trait]
impl<S: State> AnyState for S {
    fn key(&self) -> TypeKey {
        TypeKey::of::<S>()
    }

    fn name(&self) -> &'static str {
        TypeKey::of::<S>().short_name()
    }

    async fn initialize(&mut self, ctx: &StateContext, token: &CancellationToken) -> Result<()> {
        State::initialize(self, ctx, token).await
    }

    async fn execute(
        &mut self,
        ctx: &StateContext,
        token: &CancellationToken,
    ) -> Result<TransitionDescriptor> {
        State::execute(self, ctx, token).await
    }

    async fn exit(&mut self, ctx: &StateContext, token: &CancellationToken) -> Result<()> {
        State::exit(self, ctx, token).await
    }
}

pub(crate) type BoxedState = Box<dyn AnyState>;
