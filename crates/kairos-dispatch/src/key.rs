//! Service/method keys.
//!
//! A [`ServiceMethodKey`] names one invocable operation. It is built per
//! request from the URL path and used to look up both the access level and
//! the method itself.

use std::fmt;

/// Default path segment that marks a dynamic-dispatch request.
pub const DEFAULT_DISPATCH_PREFIX: &str = "services";

/// Identifies a service method as `{service, method}`.
///
/// # Example
///
/// ```
/// use kairos_dispatch::ServiceMethodKey;
///
/// let key = ServiceMethodKey::from_path("/api/services/TaskService/GetTaskAsync", "services")
///     .unwrap();
/// assert_eq!(key.service(), "TaskService");
/// assert_eq!(key.method(), "GetTaskAsync");
/// assert_eq!(key.to_string(), "TaskService.GetTaskAsync");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceMethodKey {
    service: String,
    method: String,
}

impl ServiceMethodKey {
    /// Creates a key from a service and method name.
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Parses a request path into a key.
    ///
    /// The path is split on `/` with empty segments ignored. It matches when
    /// a segment equal to `prefix` is followed by exactly two more segments.
    /// Returns `None` for every other path, which is then not a dispatch
    /// request at all.
    #[must_use]
    pub fn from_path(path: &str, prefix: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let marker = segments.iter().position(|s| *s == prefix)?;

        match &segments[marker + 1..] {
            [service, method] => Some(Self::new(*service, *method)),
            _ => None,
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for ServiceMethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_with_prefix_at_root() {
        let key = ServiceMethodKey::from_path("/services/UserService/Ping", "services").unwrap();
        assert_eq!(key, ServiceMethodKey::new("UserService", "Ping"));
    }

    #[test]
    fn test_from_path_with_leading_segments() {
        let key =
            ServiceMethodKey::from_path("/api/v1/services/TaskService/ListTasksAsync", "services")
                .unwrap();
        assert_eq!(key.service(), "TaskService");
        assert_eq!(key.method(), "ListTasksAsync");
    }

    #[test]
    fn test_from_path_ignores_trailing_slash() {
        let key = ServiceMethodKey::from_path("/services/UserService/Ping/", "services");
        assert!(key.is_some());
    }

    #[test]
    fn test_from_path_too_short() {
        assert!(ServiceMethodKey::from_path("/services/TaskService", "services").is_none());
        assert!(ServiceMethodKey::from_path("/services", "services").is_none());
        assert!(ServiceMethodKey::from_path("/", "services").is_none());
    }

    #[test]
    fn test_from_path_too_long() {
        assert!(ServiceMethodKey::from_path("/services/A/B/C", "services").is_none());
    }

    #[test]
    fn test_from_path_without_prefix() {
        assert!(ServiceMethodKey::from_path("/health/live/now", "services").is_none());
    }

    #[test]
    fn test_from_path_custom_prefix() {
        let key = ServiceMethodKey::from_path("/rpc/TaskService/GetTaskAsync", "rpc").unwrap();
        assert_eq!(key.to_string(), "TaskService.GetTaskAsync");
    }
}
