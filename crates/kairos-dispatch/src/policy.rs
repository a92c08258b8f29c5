//! Access policy evaluation.
//!
//! Every service method has an [`AccessLevel`]. The levels live in an
//! [`AccessRegistry`] that is filled at startup and read-only afterwards.
//! A key missing from the registry is treated as [`AccessLevel::Protected`],
//! so a forgotten registration can never widen access.
//!
//! The evaluator only gates authentication. Role and ownership checks belong
//! to the invoked method, which raises
//! [`KairosError::AccessDenied`](kairos_core::KairosError::AccessDenied).
//!
//! # Example
//!
//! ```
//! use kairos_core::CallerIdentity;
//! use kairos_dispatch::{AccessLevel, AccessRegistry, Decision, PolicyEvaluator, ServiceMethodKey};
//!
//! let mut registry = AccessRegistry::new();
//! registry.insert(ServiceMethodKey::new("UserService", "LoginAsync"), AccessLevel::Public);
//!
//! let anonymous = CallerIdentity::anonymous();
//! let login = ServiceMethodKey::new("UserService", "LoginAsync");
//! let unknown = ServiceMethodKey::new("UserService", "Nope");
//!
//! assert_eq!(registry.evaluate(&login, &anonymous), Decision::Allow);
//! assert!(registry.evaluate(&unknown, &anonymous).is_deny());
//! ```

use std::collections::HashMap;

use kairos_core::CallerIdentity;
use serde::{Deserialize, Serialize};

use crate::key::ServiceMethodKey;

/// Reason attached to a denial for unauthenticated callers.
pub const AUTHENTICATION_REQUIRED: &str = "authentication required";

/// Access level of a service method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Callable without credentials.
    Public,
    /// Requires an authenticated caller.
    #[default]
    Protected,
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed.
    Allow,
    /// The call is rejected.
    Deny {
        /// The reason for denial.
        reason: String,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Deny`].
    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

/// Decides whether a caller may invoke a service method.
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates the call identified by `key` for `caller`.
    fn evaluate(&self, key: &ServiceMethodKey, caller: &CallerIdentity) -> Decision;
}

/// Static mapping from service method to access level.
#[derive(Debug, Clone, Default)]
pub struct AccessRegistry {
    levels: HashMap<ServiceMethodKey, AccessLevel>,
}

impl AccessRegistry {
    /// Creates an empty registry. Every lookup resolves to `Protected`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the access level of a method.
    pub fn insert(&mut self, key: ServiceMethodKey, level: AccessLevel) {
        self.levels.insert(key, level);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, service: &str, method: &str, level: AccessLevel) -> Self {
        self.insert(ServiceMethodKey::new(service, method), level);
        self
    }

    /// Returns the access level for `key`, `Protected` when unknown.
    #[must_use]
    pub fn level_of(&self, key: &ServiceMethodKey) -> AccessLevel {
        self.levels.get(key).copied().unwrap_or(AccessLevel::Protected)
    }

    /// Returns the number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns `true` if there are no explicit entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl PolicyEvaluator for AccessRegistry {
    fn evaluate(&self, key: &ServiceMethodKey, caller: &CallerIdentity) -> Decision {
        match self.level_of(key) {
            AccessLevel::Public => Decision::Allow,
            AccessLevel::Protected if caller.is_authenticated() => Decision::Allow,
            AccessLevel::Protected => Decision::Deny {
                reason: AUTHENTICATION_REQUIRED.to_string(),
            },
        }
    }
}
