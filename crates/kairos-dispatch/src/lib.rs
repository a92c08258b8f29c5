//! # Kairos Dispatch
//!
//! Dynamic service dispatch: requests to `.../services/{Service}/{Method}`
//! are resolved against a [`ServiceRegistry`] built at startup.
//!
//! ## Modules
//!
//! - [`ServiceMethodKey`] - `{service, method}` parsed from the request path
//! - [`AccessRegistry`] - Per-method access levels, fail-closed
//! - [`ParameterDescriptor`] - Declared parameter schemas
//! - [`bind`] - Binds a JSON body to declared parameters
//! - [`ServiceRegistry`] - Method lookup and invocation
//! - [`Reply`] - The value a method returns

#![doc(html_root_url = "https://docs.rs/kairos-dispatch/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod binder;
mod invocation;
mod key;
mod params;
mod policy;
mod registry;
mod reply;
mod validate;

pub use binder::{bind, parse_body, BindingError, BoundArguments, BoundValue};
pub use invocation::Invocation;
pub use key::{ServiceMethodKey, DEFAULT_DISPATCH_PREFIX};
pub use params::{ComplexCheck, ParamKind, ParameterDescriptor, PrimitiveKind};
pub use policy::{AccessLevel, AccessRegistry, Decision, PolicyEvaluator, AUTHENTICATION_REQUIRED};
pub use registry::{
    MethodDescriptor, MethodFuture, MethodHandler, MethodTable, RegistryError, ResolveError,
    Service, ServiceRegistry, ServiceRegistryBuilder,
};
pub use reply::{ByteStream, Reply};
pub use validate::{Validate, Validator};
