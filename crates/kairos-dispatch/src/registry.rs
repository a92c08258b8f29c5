//! Service registry and method resolution.
//!
//! Services are registered once at startup through [`ServiceRegistryBuilder`].
//! Each service lists its methods in a [`MethodTable`]: name, access level,
//! declared parameters and handler. The finished [`ServiceRegistry`] is
//! immutable and shared across requests.
//!
//! Method names are unique per service. Overloads are rejected at build time
//! so that resolution never has to pick between candidates.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use kairos_dispatch::{Invocation, MethodTable, ParameterDescriptor, Reply, Service, ServiceRegistry};
//!
//! struct Greeter;
//!
//! impl Greeter {
//!     async fn hello(self: Arc<Self>, inv: Invocation) -> kairos_core::KairosResult<Reply> {
//!         let name: String = inv.arg("name")?;
//!         Ok(Reply::text(format!("hello {name}")))
//!     }
//! }
//!
//! impl Service for Greeter {
//!     const NAME: &'static str = "Greeter";
//!
//!     fn register(table: &mut MethodTable<Self>) {
//!         table.public("Hello", vec![ParameterDescriptor::string("name")], Self::hello);
//!     }
//! }
//!
//! let registry = ServiceRegistry::builder().service(Greeter).build().unwrap();
//! assert!(registry.resolve("Greeter", "Hello").is_ok());
//! assert!(registry.resolve("Greeter", "Goodbye").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use kairos_core::{Container, KairosError, KairosResult};
use thiserror::Error;

use crate::invocation::Invocation;
use crate::key::ServiceMethodKey;
use crate::params::ParameterDescriptor;
use crate::policy::{AccessLevel, AccessRegistry};
use crate::reply::Reply;

/// Future returned by a method handler.
pub type MethodFuture = BoxFuture<'static, KairosResult<Reply>>;

/// Type-erased method handler.
pub type MethodHandler = Arc<dyn Fn(Invocation) -> MethodFuture + Send + Sync>;

/// A named group of methods exposed for dispatch.
pub trait Service: Send + Sync + Sized + 'static {
    /// Name used in request paths.
    const NAME: &'static str;

    /// Declares the service's methods.
    fn register(table: &mut MethodTable<Self>);
}

/// One invocable method.
#[derive(Clone)]
pub struct MethodDescriptor {
    name: &'static str,
    access: AccessLevel,
    params: Vec<ParameterDescriptor>,
    handler: MethodHandler,
}

impl MethodDescriptor {
    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared access level.
    #[must_use]
    pub fn access(&self) -> AccessLevel {
        self.access
    }

    /// Returns the declared parameters in order.
    #[must_use]
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Invokes the method.
    pub fn invoke(&self, invocation: Invocation) -> MethodFuture {
        (self.handler)(invocation)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Method declarations of a single service instance.
pub struct MethodTable<S> {
    instance: Arc<S>,
    methods: Vec<MethodDescriptor>,
}

impl<S: Service> MethodTable<S> {
    fn new(instance: Arc<S>) -> Self {
        Self {
            instance,
            methods: Vec::new(),
        }
    }

    /// Declares a method callable without credentials.
    pub fn public<F, Fut>(&mut self, name: &'static str, params: Vec<ParameterDescriptor>, f: F) -> &mut Self
    where
        F: Fn(Arc<S>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = KairosResult<Reply>> + Send + 'static,
    {
        self.method(name, AccessLevel::Public, params, f)
    }

    /// Declares a method that requires an authenticated caller.
    pub fn protected<F, Fut>(&mut self, name: &'static str, params: Vec<ParameterDescriptor>, f: F) -> &mut Self
    where
        F: Fn(Arc<S>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = KairosResult<Reply>> + Send + 'static,
    {
        self.method(name, AccessLevel::Protected, params, f)
    }

    /// Declares a method with an explicit access level.
    pub fn method<F, Fut>(
        &mut self,
        name: &'static str,
        access: AccessLevel,
        params: Vec<ParameterDescriptor>,
        f: F,
    ) -> &mut Self
    where
        F: Fn(Arc<S>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = KairosResult<Reply>> + Send + 'static,
    {
        let instance = Arc::clone(&self.instance);
        let handler: MethodHandler = Arc::new(move |inv: Invocation| -> MethodFuture {
            Box::pin(f(Arc::clone(&instance), inv))
        });

        self.methods.push(MethodDescriptor {
            name,
            access,
            params,
            handler,
        });
        self
    }
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two services share a name.
    #[error("service '{service}' is registered twice")]
    DuplicateService {
        /// The service name.
        service: String,
    },

    /// A service declares the same method name more than once.
    #[error("method '{service}.{method}' is declared more than once; overloads are not supported")]
    DuplicateMethod {
        /// The service name.
        service: String,
        /// The method name.
        method: String,
    },

    /// A name cannot appear as a path segment.
    #[error("invalid name '{name}': names must be non-empty and must not contain '/'")]
    InvalidName {
        /// The offending name.
        name: String,
    },
}

/// Resolution failures. Both map to 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No service with this name.
    #[error("service not found: {service}")]
    ServiceNotFound {
        /// The requested service.
        service: String,
    },

    /// The service exists but has no such method.
    #[error("method not found: {service}.{method}")]
    MethodNotFound {
        /// The requested service.
        service: String,
        /// The requested method.
        method: String,
    },
}

impl From<ResolveError> for KairosError {
    fn from(err: ResolveError) -> Self {
        match &err {
            ResolveError::ServiceNotFound { service } => KairosError::NotFound {
                message: err.to_string(),
                resource_type: Some("service".to_string()),
                resource_id: Some(service.clone()),
            },
            ResolveError::MethodNotFound { service, method } => KairosError::NotFound {
                message: err.to_string(),
                resource_type: Some("method".to_string()),
                resource_id: Some(format!("{service}.{method}")),
            },
        }
    }
}

type PendingService = Box<dyn FnOnce() -> (&'static str, Vec<MethodDescriptor>) + Send>;

/// Builder for [`ServiceRegistry`].
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    container: Container,
    services: Vec<PendingService>,
}

impl ServiceRegistryBuilder {
    /// Sets the dependency container handed to every invocation.
    #[must_use]
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Adds a service.
    #[must_use]
    pub fn service<S: Service>(self, service: S) -> Self {
        self.shared_service(Arc::new(service))
    }

    /// Adds a service that is already shared elsewhere.
    #[must_use]
    pub fn shared_service<S: Service>(mut self, service: Arc<S>) -> Self {
        self.services.push(Box::new(move || {
            let mut table = MethodTable::new(service);
            S::register(&mut table);
            (S::NAME, table.methods)
        }));
        self
    }

    /// Validates the declarations and builds the registry.
    pub fn build(self) -> Result<ServiceRegistry, RegistryError> {
        let mut services: HashMap<&'static str, HashMap<&'static str, Arc<MethodDescriptor>>> =
            HashMap::new();
        let mut access = AccessRegistry::new();

        for pending in self.services {
            let (service, methods) = pending();
            check_name(service)?;
            if services.contains_key(service) {
                return Err(RegistryError::DuplicateService {
                    service: service.to_string(),
                });
            }

            let mut table = HashMap::with_capacity(methods.len());
            for method in methods {
                check_name(method.name)?;
                if table.contains_key(method.name) {
                    return Err(RegistryError::DuplicateMethod {
                        service: service.to_string(),
                        method: method.name.to_string(),
                    });
                }
                access.insert(ServiceMethodKey::new(service, method.name), method.access);
                table.insert(method.name, Arc::new(method));
            }

            tracing::debug!(service, methods = table.len(), "registered service");
            services.insert(service, table);
        }

        Ok(ServiceRegistry {
            services,
            access,
            container: Arc::new(self.container),
        })
    }
}

fn check_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.contains('/') {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Immutable table of dispatchable services.
pub struct ServiceRegistry {
    services: HashMap<&'static str, HashMap<&'static str, Arc<MethodDescriptor>>>,
    access: AccessRegistry,
    container: Arc<Container>,
}

impl ServiceRegistry {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Finds a method. Names match exactly.
    pub fn resolve(&self, service: &str, method: &str) -> Result<Arc<MethodDescriptor>, ResolveError> {
        let methods = self
            .services
            .get(service)
            .ok_or_else(|| ResolveError::ServiceNotFound {
                service: service.to_string(),
            })?;

        methods
            .get(method)
            .cloned()
            .ok_or_else(|| ResolveError::MethodNotFound {
                service: service.to_string(),
                method: method.to_string(),
            })
    }

    /// Returns the access levels of every registered method.
    #[must_use]
    pub fn access(&self) -> &AccessRegistry {
        &self.access
    }

    /// Returns the dependency container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Returns the registered service names, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.services.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Returns the total number of registered methods.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.services.values().map(HashMap::len).sum()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.service_names())
            .field("methods", &self.method_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::BoundArguments;
    use crate::policy::PolicyEvaluator;
    use kairos_core::{CallerIdentity, RequestContext};

    struct Counter {
        start: i64,
    }

    impl Counter {
        async fn next(self: Arc<Self>, _inv: Invocation) -> KairosResult<Reply> {
            Ok(Reply::Json((self.start + 1).into()))
        }

        async fn reset(self: Arc<Self>, _inv: Invocation) -> KairosResult<Reply> {
            Ok(Reply::Empty)
        }
    }

    impl Service for Counter {
        const NAME: &'static str = "Counter";

        fn register(table: &mut MethodTable<Self>) {
            table
                .public("Next", Vec::new(), Self::next)
                .protected("Reset", Vec::new(), Self::reset);
        }
    }

    struct Overloaded;

    impl Service for Overloaded {
        const NAME: &'static str = "Overloaded";

        fn register(table: &mut MethodTable<Self>) {
            table
                .public("Get", Vec::new(), |_, _| async { Ok(Reply::Empty) })
                .public("Get", vec![ParameterDescriptor::string("id")], |_, _| async {
                    Ok(Reply::Empty)
                });
        }
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::builder()
            .service(Counter { start: 41 })
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve() {
        let registry = registry();
        let method = registry.resolve("Counter", "Next").unwrap();
        assert_eq!(method.name(), "Next");
        assert_eq!(method.access(), AccessLevel::Public);
    }

    #[test]
    fn test_resolve_distinguishes_service_and_method() {
        let registry = registry();
        assert_eq!(
            registry.resolve("Nope", "Next").unwrap_err(),
            ResolveError::ServiceNotFound {
                service: "Nope".to_string()
            }
        );
        assert!(matches!(
            registry.resolve("Counter", "Nope").unwrap_err(),
            ResolveError::MethodNotFound { .. }
        ));
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert!(registry().resolve("counter", "next").is_err());
    }

    #[test]
    fn test_access_registry_is_derived() {
        let registry = registry();
        let anonymous = CallerIdentity::anonymous();
        assert!(!registry
            .access()
            .evaluate(&ServiceMethodKey::new("Counter", "Next"), &anonymous)
            .is_deny());
        assert!(registry
            .access()
            .evaluate(&ServiceMethodKey::new("Counter", "Reset"), &anonymous)
            .is_deny());
    }

    #[test]
    fn test_overloads_are_rejected() {
        let err = ServiceRegistry::builder()
            .service(Overloaded)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateMethod {
                service: "Overloaded".to_string(),
                method: "Get".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_services_are_rejected() {
        let err = ServiceRegistry::builder()
            .service(Counter { start: 0 })
            .service(Counter { start: 1 })
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateService { .. }));
    }

    #[test]
    fn test_resolve_error_maps_to_not_found() {
        let err: KairosError = ResolveError::ServiceNotFound {
            service: "X".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "service not found: X");
    }

    #[tokio::test]
    async fn test_invoke() {
        let registry = registry();
        let method = registry.resolve("Counter", "Next").unwrap();
        let inv = Invocation::new(
            RequestContext::new(),
            BoundArguments::default(),
            Arc::clone(registry.container()),
        );
        match method.invoke(inv).await.unwrap() {
            Reply::Json(value) => assert_eq!(value, 42),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
