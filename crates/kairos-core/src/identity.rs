//! Caller identity.
//!
//! A [`CallerIdentity`] is produced once per request by the identity stage
//! and read by the access policy and by service methods that need to know
//! who is calling. It is never mutated after the identity stage runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The role name that grants administrative operations.
pub const ADMIN_ROLE: &str = "admin";

/// Authentication outcome for the current request.
///
/// # Example
///
/// ```rust
/// use kairos_core::CallerIdentity;
///
/// let anonymous = CallerIdentity::anonymous();
/// assert!(!anonymous.is_authenticated());
///
/// let user = CallerIdentity::user("u-1", "member");
/// assert!(user.is_authenticated());
/// assert_eq!(user.log_id(), "user:u-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    is_authenticated: bool,
    user_id: Option<String>,
    role: Option<String>,
    claims: BTreeMap<String, serde_json::Value>,
}

impl CallerIdentity {
    /// Creates an unauthenticated identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates an authenticated user identity with a role.
    #[must_use]
    pub fn user(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            user_id: Some(user_id.into()),
            role: Some(role.into()),
            claims: BTreeMap::new(),
        }
    }

    /// Creates an authenticated identity from a decoded claim set.
    ///
    /// `sub` becomes the user id and `role` the role, when present.
    /// Returns `None` unless `sub` is a non-empty string.
    #[must_use]
    pub fn from_claims(claims: BTreeMap<String, serde_json::Value>) -> Option<Self> {
        let user_id = claims
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .filter(|sub| !sub.is_empty())?
            .to_string();
        let role = claims
            .get("role")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        Some(Self {
            is_authenticated: true,
            user_id: Some(user_id),
            role,
            claims,
        })
    }

    /// Adds a claim to this identity.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Returns `true` if the request carried a valid credential.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Returns the authenticated user id.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the caller's role.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// Returns `true` if the caller holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_authenticated && self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Returns all claims carried by the credential.
    #[must_use]
    pub fn claims(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.claims
    }

    /// Returns a single claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// This never includes tokens or other secrets.
    #[must_use]
    pub fn log_id(&self) -> String {
        match (self.is_authenticated, self.user_id.as_deref()) {
            (true, Some(id)) => format!("user:{id}"),
            (true, None) => "user:unknown".to_string(),
            (false, _) => "anonymous".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_anonymous_identity() {
        let identity = CallerIdentity::anonymous();
        assert!(!identity.is_authenticated());
        assert!(identity.user_id().is_none());
        assert!(!identity.is_admin());
        assert_eq!(identity.log_id(), "anonymous");
    }

    #[test]
    fn test_user_identity() {
        let identity = CallerIdentity::user("u123", "member");
        assert!(identity.is_authenticated());
        assert_eq!(identity.user_id(), Some("u123"));
        assert_eq!(identity.role(), Some("member"));
        assert!(!identity.is_admin());
    }

    #[test]
    fn test_admin_identity() {
        assert!(CallerIdentity::user("root", ADMIN_ROLE).is_admin());
    }

    #[test]
    fn test_from_claims() {
        let mut claims = BTreeMap::new();
        claims.insert("sub".to_string(), json!("u42"));
        claims.insert("role".to_string(), json!("admin"));
        claims.insert("name".to_string(), json!("Ada"));

        let identity = CallerIdentity::from_claims(claims).unwrap();
        assert!(identity.is_authenticated());
        assert_eq!(identity.user_id(), Some("u42"));
        assert!(identity.is_admin());
        assert_eq!(identity.claim("name"), Some(&json!("Ada")));
        assert_eq!(identity.claims().len(), 3);
    }

    #[test]
    fn test_from_claims_without_subject() {
        assert!(CallerIdentity::from_claims(BTreeMap::new()).is_none());
    }

    #[test]
    fn test_from_claims_rejects_non_string_subject() {
        for sub in [json!(42), json!(null), json!({"id": "u1"}), json!("")] {
            let mut claims = BTreeMap::new();
            claims.insert("sub".to_string(), sub.clone());
            claims.insert("role".to_string(), json!("admin"));
            assert!(CallerIdentity::from_claims(claims).is_none(), "sub = {sub}");
        }
    }
}
