//! Dependency injection container.
//!
//! Service methods declare some parameters as injected dependencies. Those
//! parameters are never bound from the request body; the method resolves
//! them from a [`Container`] built once at startup and shared read-only by
//! every request.
//!
//! Trait objects can be registered directly, which is how repositories and
//! outbound clients are swapped for test doubles.
//!
//! # Example
//!
//! ```rust
//! use kairos_core::di::{Container, Inject};
//! use std::sync::Arc;
//!
//! trait Clock: Send + Sync {
//!     fn now(&self) -> u64;
//! }
//!
//! struct FixedClock;
//!
//! impl Clock for FixedClock {
//!     fn now(&self) -> u64 {
//!         42
//!     }
//! }
//!
//! let mut container = Container::new();
//! container.register::<dyn Clock>(Arc::new(FixedClock));
//!
//! let clock: Inject<dyn Clock> = Inject::from_container(&container).unwrap();
//! assert_eq!(clock.now(), 42);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::KairosError;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone, Error)]
#[error("failed to inject {type_name}: {reason}")]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The reason for the failure.
    pub reason: String,
}

impl InjectionError {
    /// Creates a new injection error for a missing service.
    pub fn not_registered<T: ?Sized>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }
}

impl From<InjectionError> for KairosError {
    fn from(err: InjectionError) -> Self {
        KairosError::internal_with_source("dependency resolution failed", err)
    }
}

/// A dependency injection container.
///
/// Services are stored as `Arc<T>` keyed by the type they were registered
/// under. The container is filled at startup and never mutated afterwards,
/// so it is shared between requests without locking.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers a service under the type `T`.
    ///
    /// Registering the same type twice replaces the earlier instance.
    pub fn register<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with<T: ?Sized + Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        self.register(service);
        self
    }

    /// Resolves a service from the container.
    ///
    /// Returns `None` if the service is not registered.
    #[must_use]
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| s.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Resolves a service or returns an error.
    pub fn resolve_required<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn contains<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .finish()
    }
}

/// A resolved injected dependency.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Inject<T> {
    /// Creates a new `Inject` wrapper.
    pub fn new(inner: Arc<T>) -> Self {
        Self(inner)
    }

    /// Converts into the inner `Arc`.
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: ?Sized> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> std::ops::Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject<T> {
    /// Extracts the service from a container.
    pub fn from_container(container: &Container) -> Result<Self, InjectionError> {
        container.resolve_required::<T>().map(Inject)
    }
}
