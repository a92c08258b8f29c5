//! Identity stage.
//!
//! Resolves the [`CallerIdentity`] of a request from an HS256 bearer token.
//! The token is looked up in, by priority:
//!
//! 1. the cookie named by [`IdentitySettings::cookie_name`]
//! 2. the `Authorization: Bearer` header
//! 3. the query parameter named by [`IdentitySettings::query_param`]
//!
//! The first source that is present is the only one used. A missing or
//! invalid token leaves the caller anonymous; this stage never rejects a
//! request. Rejection belongs to the dispatch stage's policy gate.

use std::collections::BTreeMap;

use http::header;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use kairos_core::CallerIdentity;
use serde_json::Value;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};

/// Default cookie and query parameter name.
pub const DEFAULT_TOKEN_NAME: &str = "access_token";

/// Where the credential of a request was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// The access token cookie.
    Cookie,
    /// The `Authorization: Bearer` header.
    Header,
    /// The access token query parameter.
    Query,
}

/// Token validation settings.
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    /// HMAC secret shared with the token issuer.
    pub secret: String,
    /// Required `iss` claim, when set.
    pub issuer: Option<String>,
    /// Cookie holding the token.
    pub cookie_name: String,
    /// Query parameter holding the token.
    pub query_param: String,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
}

impl IdentitySettings {
    /// Creates settings with default token names.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: None,
            cookie_name: DEFAULT_TOKEN_NAME.to_string(),
            query_param: DEFAULT_TOKEN_NAME.to_string(),
            leeway_secs: 30,
        }
    }

    /// Requires the given issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// Resolves caller identity from bearer tokens.
pub struct IdentityMiddleware {
    settings: IdentitySettings,
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for IdentityMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMiddleware")
            .field("issuer", &self.settings.issuer)
            .field("cookie_name", &self.settings.cookie_name)
            .field("query_param", &self.settings.query_param)
            .finish_non_exhaustive()
    }
}

impl IdentityMiddleware {
    /// Creates the stage.
    #[must_use]
    pub fn new(settings: IdentitySettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = settings.leeway_secs;
        if let Some(ref iss) = settings.issuer {
            validation.set_issuer(&[iss]);
        }

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            settings,
            validation,
        }
    }

    /// Finds the credential of a request.
    #[must_use]
    pub fn extract_token(&self, request: &Request) -> Option<(TokenSource, String)> {
        if let Some(token) = cookie(request, &self.settings.cookie_name) {
            return Some((TokenSource::Cookie, token));
        }

        if let Some(token) = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            return Some((TokenSource::Header, token.to_string()));
        }

        query_param(request, &self.settings.query_param).map(|t| (TokenSource::Query, t))
    }

    /// Validates a token and returns the identity it carries.
    ///
    /// A token whose `sub` is not a non-empty string is rejected.
    pub fn authenticate(&self, token: &str) -> Result<CallerIdentity, jsonwebtoken::errors::Error> {
        let data = jsonwebtoken::decode::<BTreeMap<String, Value>>(token, &self.key, &self.validation)?;
        CallerIdentity::from_claims(data.claims).ok_or_else(|| ErrorKind::InvalidSubject.into())
    }

    fn resolve(&self, request: &Request) -> CallerIdentity {
        let Some((source, token)) = self.extract_token(request) else {
            return CallerIdentity::anonymous();
        };

        match self.authenticate(&token) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!(?source, error = %e, "rejected bearer token");
                CallerIdentity::anonymous()
            }
        }
    }
}

fn cookie(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn query_param(request: &Request, name: &str) -> Option<String> {
    request
        .uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

impl Middleware for IdentityMiddleware {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            ctx.set_identity(self.resolve(&request));
            next.run(ctx, request).await
        })
    }
}
