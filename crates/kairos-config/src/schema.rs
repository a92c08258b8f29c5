//! Configuration sections.
//!
//! Every section rejects unknown fields and fills missing ones with the
//! defaults below.

use serde::{Deserialize, Serialize};

/// Deployment environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development. Relaxed secret checks.
    #[default]
    Development,
    /// Shared pre-production environment.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Upper bound on one request, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Drain window on shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_ms: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable, multi-line.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. `info` or `kairos_dispatch=debug,info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Colored output (pretty format only).
    #[serde(default)]
    pub ansi_enabled: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Json,
            ansi_enabled: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Token issuance and validation.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// HMAC secret for HS256 tokens.
    #[serde(default)]
    pub jwt_secret: String,

    /// `iss` claim written and required.
    #[serde(default = "default_issuer")]
    pub issuer: Option<String>,

    /// Lifetime of issued tokens.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Cookie carrying the token.
    #[serde(default = "default_token_name")]
    pub cookie_name: String,

    /// Query parameter carrying the token.
    #[serde(default = "default_token_name")]
    pub query_param: String,

    /// Clock skew tolerated on expiry.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// Admin account seeded at startup, when both are set.
    #[serde(default)]
    pub admin_email: Option<String>,

    /// Password of the seeded admin account.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for AuthSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSection")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("query_param", &self.query_param)
            .field("leeway_secs", &self.leeway_secs)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_issuer(),
            token_ttl_secs: default_token_ttl(),
            cookie_name: default_token_name(),
            query_param: default_token_name(),
            leeway_secs: default_leeway(),
            admin_email: None,
            admin_password: None,
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_issuer() -> Option<String> {
    Some("kairos".to_string())
}

fn default_token_ttl() -> u64 {
    3600
}

fn default_token_name() -> String {
    "access_token".to_string()
}

fn default_leeway() -> u64 {
    30
}

/// Service dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    /// Path segment that introduces `{Service}/{Method}`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Whether 5xx and 404 bodies carry the underlying message.
    #[serde(default = "default_true")]
    pub expose_error_details: bool,

    /// Reuse an incoming `x-request-id` instead of generating one.
    #[serde(default)]
    pub trust_request_id: bool,

    /// Most bytes a streamed method result may produce.
    #[serde(default = "default_max_stream_bytes")]
    pub max_stream_bytes: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            expose_error_details: true,
            trust_request_id: false,
            max_stream_bytes: default_max_stream_bytes(),
        }
    }
}

fn default_max_stream_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_prefix() -> String {
    "services".to_string()
}

fn default_true() -> bool {
    true
}

/// OpenAI-compatible provider settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AiSection {
    /// Base URL of the API, without `/chat/completions`.
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// Chat model name.
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// API key. AI methods fail with 502 while unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider call timeout.
    #[serde(default = "default_ai_timeout")]
    pub timeout_ms: u64,
}

impl std::fmt::Debug for AiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiSection")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            model: default_ai_model(),
            api_key: None,
            timeout_ms: default_ai_timeout(),
        }
    }
}

fn default_ai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_ai_timeout() -> u64 {
    20_000
}
