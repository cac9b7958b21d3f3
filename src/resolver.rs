//! Abstract type-resolution capability.
//!
//! The runtime never constructs states, commands, or flows directly; it asks a
//! [`Resolver`] for a fresh instance by [`TypeKey`]. A dependency-injection
//! container can implement `Resolver` to supply scoped instances; the
//! closure-based [`TypeRegistry`] covers tests and embedders without one.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use thiserror::Error;

/// Identity of a resolvable type: its `TypeId` plus the type name for
/// diagnostics.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for a concrete type.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, for logs and traces.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

/// Errors raised by a [`Resolver`]. Resolution failures are fatal to the
/// machine that requested them; there is no retry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no registration for type '{0}'")]
    Unregistered(&'static str),

    #[error("registration for type '{0}' produced a different type")]
    TypeMismatch(&'static str),
}

/// The `resolve(type) -> instance` capability consumed by the transition
/// factory and the command executor.
///
/// Implementations must yield a fresh or correctly scoped instance per call.
pub trait Resolver: Send + Sync {
    fn resolve(&self, key: TypeKey) -> Result<Box<dyn Any + Send>, ResolveError>;
}

/// Resolve and downcast to a concrete type.
pub(crate) fn resolve_instance<T: Send + 'static>(
    resolver: &dyn Resolver,
) -> Result<T, ResolveError> {
    let key = TypeKey::of::<T>();
    resolver
        .resolve(key)?
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| ResolveError::TypeMismatch(key.name()))
}

type FactoryFn = Box<dyn Fn() -> Box<dyn Any + Send> + Send + Sync>;

/// Closure-based [`Resolver`] implementation.
///
/// Each registration is a factory producing a fresh instance per resolution,
/// standing in for an external dependency-injection container.
///
/// # Example
///
/// ```rust
/// use machina::{Resolver, TypeKey, TypeRegistry};
///
/// struct Greeter {
///     greeting: &'static str,
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.register(|| Greeter { greeting: "hello" });
///
/// assert!(registry.resolve(TypeKey::of::<Greeter>()).is_ok());
/// assert!(registry.resolve(TypeKey::of::<String>()).is_err());
/// ```
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<TypeKey, FactoryFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `T`, replacing any previous registration.
    pub fn register<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories
            .insert(TypeKey::of::<T>(), Box::new(move || Box::new(factory())));
        self
    }
}

impl Resolver for TypeRegistry {
    fn resolve(&self, key: TypeKey) -> Result<Box<dyn Any + Send>, ResolveError> {
        self.factories
            .get(&key)
            .map(|factory| factory())
            .ok_or(ResolveError::Unregistered(key.name()))
    }
}
