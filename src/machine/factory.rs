//! Construction of transition descriptors and nested sub-machines.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{State, StateCreator, TransitionDescriptor};
use crate::machine::builder::BehaviorRegistry;
use crate::machine::driver::{MachineConfig, StateMachine};
use crate::resolver::{resolve_instance, Resolver, TypeKey};

/// Builds [`TransitionDescriptor`]s for "go to state", "go back", and "exit".
///
/// For a state transition the factory captures a one-shot creator that
/// resolves the target through the machine's [`Resolver`] and injects the
/// payload when the driver applies the transition. Behavior flags for the
/// target type are looked up once, here, from the machine's registration
/// table. Nothing is executed and no instance is created until the driver
/// invokes the creator.
#[derive(Clone)]
pub struct StateTransitionFactory {
    resolver: Arc<dyn Resolver>,
    behaviors: Arc<BehaviorRegistry>,
}

impl StateTransitionFactory {
    pub(crate) fn new(resolver: Arc<dyn Resolver>, behaviors: Arc<BehaviorRegistry>) -> Self {
        Self {
            resolver,
            behaviors,
        }
    }

    /// Descriptor advancing to state `S` with its payload.
    pub fn go_to<S: State>(&self, payload: S::Payload) -> TransitionDescriptor {
        let target = TypeKey::of::<S>();
        let behavior = self.behaviors.lookup(target);
        let resolver = Arc::clone(&self.resolver);

        let creator: StateCreator = Box::new(move || {
            let mut state = resolve_instance::<S>(resolver.as_ref())?;
            state.set_payload(payload);
            Ok(Box::new(state))
        });

        TransitionDescriptor::to_state(target, behavior, creator)
    }

    /// Descriptor returning to the most recent state in history.
    pub fn back(&self) -> TransitionDescriptor {
        TransitionDescriptor::back()
    }

    /// Descriptor terminating the machine.
    pub fn exit(&self) -> TransitionDescriptor {
        TransitionDescriptor::exit()
    }
}

/// Creates nested sub-machines for composite states.
///
/// A sub-machine shares its parent's resolver, behavior table, recovery
/// policy, and history capacity; its root cancellation token is a child of
/// the parent machine's, so cancelling the parent cancels every nested
/// machine in flight.
#[derive(Clone)]
pub struct StateMachineFactory {
    config: MachineConfig,
    parent_token: CancellationToken,
}

impl StateMachineFactory {
    pub(crate) fn new(config: MachineConfig, parent_token: CancellationToken) -> Self {
        Self {
            config,
            parent_token,
        }
    }

    /// A fresh sub-machine nested under the parent's cancellation.
    pub fn create(&self) -> StateMachine {
        StateMachine::with_config(self.config.clone(), self.parent_token.child_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    use crate::core::{StateBehavior, TransitionInner, TransitionKind};
    use crate::machine::StateContext;
    use crate::resolver::TypeRegistry;

    struct Fixture {
        payload: Option<u32>,
    }

    #[async_trait]
    impl State for Fixture {
        type Payload = u32;

        fn set_payload(&mut self, payload: u32) {
            self.payload = Some(payload);
        }

        async fn execute(
            &mut self,
            ctx: &StateContext,
            _token: &CancellationToken,
        ) -> Result<TransitionDescriptor> {
            Ok(ctx.exit())
        }
    }

    fn factory(behavior: Option<StateBehavior>) -> StateTransitionFactory {
        let mut registry = TypeRegistry::new();
        registry.register(|| Fixture { payload: None });

        let mut behaviors = BehaviorRegistry::default();
        if let Some(behavior) = behavior {
            behaviors.register::<Fixture>(behavior);
        }

        StateTransitionFactory::new(Arc::new(registry), Arc::new(behaviors))
    }

    #[test]
    fn go_to_builds_a_state_descriptor_with_target() {
        let descriptor = factory(None).go_to::<Fixture>(5);

        assert_eq!(descriptor.kind(), TransitionKind::ToState);
        assert_eq!(descriptor.target(), Some(TypeKey::of::<Fixture>()));
        assert_eq!(descriptor.behavior(), StateBehavior::default());
    }

    #[test]
    fn registered_behavior_is_attached_to_the_descriptor() {
        let behavior = StateBehavior {
            prohibit_return_to_state: true,
            initialize_on_transition: true,
        };
        let descriptor = factory(Some(behavior)).go_to::<Fixture>(1);

        assert_eq!(descriptor.behavior(), behavior);
    }

    #[test]
    fn creator_resolves_and_boxes_the_state() {
        let descriptor = factory(None).go_to::<Fixture>(9);

        let TransitionInner::ToState { creator, .. } = descriptor.into_inner() else {
            panic!("expected a state transition");
        };
        let state = creator().unwrap();
        assert_eq!(state.name(), "Fixture");
    }

    #[test]
    fn creator_surfaces_resolution_failures() {
        let factory = StateTransitionFactory::new(
            Arc::new(TypeRegistry::new()),
            Arc::new(BehaviorRegistry::default()),
        );
        let descriptor = factory.go_to::<Fixture>(1);

        let TransitionInner::ToState { creator, .. } = descriptor.into_inner() else {
            panic!("expected a state transition");
        };
        assert!(creator().is_err());
    }

    #[test]
    fn back_and_exit_have_no_creator() {
        let factory = factory(None);

        assert_eq!(factory.back().kind(), TransitionKind::Back);
        assert_eq!(factory.exit().kind(), TransitionKind::Exit);
        assert_eq!(factory.back().target(), None);
        assert_eq!(factory.exit().target(), None);
    }
}
