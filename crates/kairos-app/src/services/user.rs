//! `UserService`.

use std::sync::Arc;

use chrono::Utc;
use kairos_core::{KairosError, KairosResult};
use kairos_dispatch::{Invocation, MethodTable, ParameterDescriptor, Reply, Service};
use uuid::Uuid;

use super::require_admin;
use crate::auth::{hash_password, verify_password, TokenIssuer};
use crate::models::{LoginResult, Registration, Role, User, UserProfile};
use crate::repository::UserRepository;

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Accounts and sign-in.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    issuer: Arc<TokenIssuer>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl UserService {
    /// Creates the service.
    pub fn new(users: Arc<dyn UserRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self { users, issuer }
    }

    /// Creates an account directly, bypassing registration validation.
    ///
    /// Used at startup to seed the configured admin. An existing account
    /// with the same email is left untouched.
    pub async fn ensure_user(&self, email: &str, name: &str, password: &str, role: Role) -> KairosResult<UserProfile> {
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Ok(existing.profile());
        }
        let user = self.create_user(email, name, password, role).await?;
        tracing::info!(user_id = %user.id, role = role.as_str(), "account seeded");
        Ok(user)
    }

    async fn create_user(&self, email: &str, name: &str, password: &str, role: Role) -> KairosResult<UserProfile> {
        let user = self
            .users
            .insert(User {
                id: Uuid::now_v7().to_string(),
                email: email.trim().to_string(),
                name: name.trim().to_string(),
                role,
                password_hash: hash_password(password)?,
                created_at: Utc::now(),
            })
            .await?;
        Ok(user.profile())
    }

    async fn register(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let registration: Registration = inv.arg("registration")?;
        let profile = self
            .create_user(&registration.email, &registration.name, &registration.password, Role::Member)
            .await?;
        tracing::info!(user_id = %profile.id, "user registered");
        Reply::json(&profile)
    }

    async fn login(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let email: String = inv.arg("email")?;
        let password: String = inv.arg("password")?;

        let user = match self.users.find_by_email(email.trim()).await? {
            Some(user) if verify_password(&password, &user.password_hash) => user,
            _ => {
                tracing::debug!("login rejected");
                return Err(KairosError::authentication(INVALID_CREDENTIALS));
            }
        };

        let issued = self.issuer.issue(&user)?;
        Reply::json(&LoginResult {
            token: issued.token,
            expires_at: issued.expires_at,
            user: user.profile(),
        })
    }

    async fn profile(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        let user_id = inv.caller_id()?;
        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| KairosError::not_found_resource("user", user_id))?;
        Reply::json(&user.profile())
    }

    async fn list(self: Arc<Self>, inv: Invocation) -> KairosResult<Reply> {
        require_admin(inv.identity(), "UserService.ListUsersAsync")?;

        let profiles: Vec<UserProfile> = self.users.list().await?.iter().map(User::profile).collect();
        Reply::json(&profiles)
    }

    async fn ping(self: Arc<Self>, _inv: Invocation) -> KairosResult<Reply> {
        Ok(Reply::text("pong"))
    }
}

impl Service for UserService {
    const NAME: &'static str = "UserService";

    fn register(table: &mut MethodTable<Self>) {
        table
            .public(
                "RegisterAsync",
                vec![ParameterDescriptor::complex::<Registration>("registration")],
                Self::register,
            )
            .public(
                "LoginAsync",
                vec![ParameterDescriptor::string("email"), ParameterDescriptor::string("password")],
                Self::login,
            )
            .protected("GetProfileAsync", Vec::new(), Self::profile)
            .protected("ListUsersAsync", Vec::new(), Self::list)
            .public("Ping", Vec::new(), Self::ping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryUserRepository;
    use kairos_core::ErrorCategory;

    fn service() -> UserService {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(TokenIssuer::new("user-test-secret-with-at-least-32-bytes", None, 60)),
        )
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let service = service();
        let first = service
            .ensure_user("root@example.com", "Root", "admin-password", Role::Admin)
            .await
            .unwrap();
        let second = service
            .ensure_user("ROOT@example.com", "Other", "ignored", Role::Member)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let service = service();
        service
            .create_user("ada@example.com", "Ada", "password1", Role::Member)
            .await
            .unwrap();
        let err = service
            .create_user("ada@example.com", "Ada", "password1", Role::Member)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Conflict);
    }
}
