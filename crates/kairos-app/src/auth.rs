//! Token issuance and password hashing.
//!
//! Tokens are HS256 JWTs with `sub`, `role`, `email`, `iat`, `exp` and, when
//! configured, `iss`. The identity stage of the pipeline validates them with
//! the same secret. Passwords are stored as Argon2id PHC strings.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use kairos_config::AuthSection;
use kairos_core::{KairosError, KairosResult};
use rand_core::OsRng;
use serde::Serialize;

use crate::models::User;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    sub: &'a str,
    role: &'a str,
    email: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<&'a str>,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The encoded JWT.
    pub token: String,
    /// When it stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Signs access tokens.
pub struct TokenIssuer {
    key: EncodingKey,
    issuer: Option<String>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Creates an issuer.
    pub fn new(secret: &str, issuer: Option<String>, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            issuer,
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000)),
        }
    }

    /// Creates an issuer from the auth section of the configuration.
    pub fn from_config(auth: &AuthSection) -> Self {
        Self::new(&auth.jwt_secret, auth.issuer.clone(), auth.token_ttl_secs)
    }

    /// Issues a token for `user`.
    pub fn issue(&self, user: &User) -> KairosResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| KairosError::internal("token lifetime out of range"))?;
        let claims = Claims {
            sub: &user.id,
            role: user.role.as_str(),
            email: &user.email,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.as_deref(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| KairosError::internal_with_source("failed to sign token", e))?;

        Ok(IssuedToken { token, expires_at })
    }
}

/// Hashes a password with Argon2id and a fresh random salt.
///
/// The result is a PHC string carrying the algorithm, parameters and salt,
/// so [`verify_password`] needs nothing else.
pub fn hash_password(password: &str) -> KairosResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| KairosError::internal(format!("failed to hash password: {e}")))
}

/// Checks a password against a stored PHC string.
///
/// Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use jsonwebtoken::{DecodingKey, Validation};
    use std::collections::BTreeMap;

    const SECRET: &str = "auth-test-secret-with-at-least-32-bytes";

    fn user(role: Role) -> User {
        User {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issued_token_decodes() {
        let issuer = TokenIssuer::new(SECRET, Some("kairos".to_string()), 60);
        let issued = issuer.issue(&user(Role::Admin)).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["kairos"]);
        let data = jsonwebtoken::decode::<BTreeMap<String, serde_json::Value>>(
            &issued.token,
            &DecodingKey::from_secret(SECRET.as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(data.claims["sub"], "u-1");
        assert_eq!(data.claims["role"], "admin");
        assert_eq!(data.claims["exp"], issued.expires_at.timestamp());
    }

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("correct horse").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("correct horse!", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", "no-separator"));
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "$argon2id$v=19$m=19456,t=2,p=1$bm90LWEtaGFzaA"));
    }

    #[test]
    fn test_unsalted_digest_is_not_accepted() {
        let legacy = "0123456789abcdef$5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        assert!(!verify_password("password", legacy));
    }
}
