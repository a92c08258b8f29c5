//! Everything a method receives when it is invoked.

use std::sync::Arc;

use kairos_core::{CallerIdentity, Container, Inject, KairosError, KairosResult, RequestContext};
use serde::de::DeserializeOwned;

use crate::binder::BoundArguments;

/// One call to a service method.
///
/// Carries the request context, the bound arguments and access to the
/// dependency container for injected parameters.
#[derive(Debug, Clone)]
pub struct Invocation {
    context: RequestContext,
    args: BoundArguments,
    container: Arc<Container>,
}

impl Invocation {
    /// Creates an invocation.
    #[must_use]
    pub fn new(context: RequestContext, args: BoundArguments, container: Arc<Container>) -> Self {
        Self {
            context,
            args,
            container,
        }
    }

    /// Returns the request context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &CallerIdentity {
        self.context.identity()
    }

    /// Returns the authenticated caller's id.
    ///
    /// Fails with an authentication error for anonymous callers.
    pub fn caller_id(&self) -> KairosResult<&str> {
        self.identity()
            .user_id()
            .ok_or_else(|| KairosError::authentication("authentication required"))
    }

    /// Returns all bound arguments.
    #[must_use]
    pub fn args(&self) -> &BoundArguments {
        &self.args
    }

    /// Deserializes the bound argument `name`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> KairosResult<T> {
        self.args.get(name)
    }

    /// Deserializes an optional bound argument.
    pub fn arg_opt<T: DeserializeOwned>(&self, name: &str) -> KairosResult<Option<T>> {
        self.args.get_opt(name)
    }

    /// Resolves an injected dependency.
    pub fn inject<T: ?Sized + Send + Sync + 'static>(&self) -> KairosResult<Inject<T>> {
        Inject::from_container(&self.container).map_err(KairosError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind;
    use crate::params::ParameterDescriptor;
    use serde_json::json;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct Fixed;

    impl Clock for Fixed {
        fn now(&self) -> u64 {
            42
        }
    }

    fn invocation(identity: CallerIdentity) -> Invocation {
        let params = [
            ParameterDescriptor::string("taskId"),
            ParameterDescriptor::integer("limit").with_default(3),
            ParameterDescriptor::injected("clock"),
        ];
        let body = json!({"taskId": "t1"});
        let args = bind(&params, body.as_object().unwrap()).unwrap();
        let container = Container::new().with::<dyn Clock>(Arc::new(Fixed));

        Invocation::new(
            RequestContext::new().with_identity(identity),
            args,
            Arc::new(container),
        )
    }

    #[test]
    fn test_arguments() {
        let inv = invocation(CallerIdentity::anonymous());
        assert_eq!(inv.arg::<String>("taskId").unwrap(), "t1");
        assert_eq!(inv.arg::<u32>("limit").unwrap(), 3);
        assert!(inv.arg::<String>("missing").is_err());
    }

    #[test]
    fn test_injection() {
        let inv = invocation(CallerIdentity::anonymous());
        assert_eq!(inv.inject::<dyn Clock>().unwrap().now(), 42);
        assert!(inv.inject::<String>().is_err());
    }

    #[test]
    fn test_caller_id() {
        assert!(invocation(CallerIdentity::anonymous()).caller_id().is_err());
        let inv = invocation(CallerIdentity::user("u7", "member"));
        assert_eq!(inv.caller_id().unwrap(), "u7");
    }
}
