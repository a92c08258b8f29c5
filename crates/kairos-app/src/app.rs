//! Application assembly.
//!
//! [`App::build`] turns a validated [`KairosConfig`] into a ready
//! [`Server`]: repositories, token issuer and completion provider are
//! created, the services registered, and the five pipeline stages wired with
//! the configured token sources, dispatch prefix and error exposure.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kairos_config::{KairosConfig, LogFormat};
use kairos_core::Container;
use kairos_dispatch::ServiceRegistry;
use kairos_middleware::stages::{
    AccessLogMiddleware, DispatchMiddleware, IdentityMiddleware, IdentitySettings,
    RequestIdMiddleware, ResponseMiddleware,
};
use kairos_middleware::{Pipeline, Stage};
use kairos_server::{Server, ServerConfig};
use kairos_telemetry::LogConfig;

use crate::ai::{provider_from_config, CompletionProvider};
use crate::auth::TokenIssuer;
use crate::models::Role;
use crate::repository::{InMemoryTaskRepository, InMemoryUserRepository, TaskRepository, UserRepository};
use crate::services::{AiService, TaskService, UserService};

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "kairos";

/// A fully wired application.
pub struct App {
    config: KairosConfig,
    server: Server,
    users: Arc<UserService>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("environment", &self.config.environment)
            .field("http_addr", &self.config.server.http_addr)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Wires the application with in-memory storage and the configured
    /// completion provider.
    pub fn build(config: KairosConfig) -> anyhow::Result<Self> {
        let provider = provider_from_config(&config.ai).context("failed to create AI provider")?;
        Self::with_provider(config, provider)
    }

    /// Wires the application with an explicit completion provider.
    pub fn with_provider(config: KairosConfig, provider: Arc<dyn CompletionProvider>) -> anyhow::Result<Self> {
        let tasks: Arc<dyn TaskRepository> = Arc::new(InMemoryTaskRepository::new());
        let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
        let issuer = Arc::new(TokenIssuer::from_config(&config.auth));

        let user_service = Arc::new(UserService::new(users, issuer));

        let mut container = Container::new();
        container.register::<dyn CompletionProvider>(provider);

        let registry = ServiceRegistry::builder()
            .container(container)
            .service(TaskService::new(Arc::clone(&tasks)))
            .shared_service(Arc::clone(&user_service))
            .service(AiService::new(tasks))
            .build()
            .context("failed to build service registry")?;

        tracing::info!(
            services = ?registry.service_names(),
            methods = registry.method_count(),
            "service registry built"
        );

        let pipeline = build_pipeline(&config, Arc::new(registry));
        let server = Server::new(server_config(&config), pipeline);

        Ok(Self {
            config,
            server,
            users: user_service,
        })
    }

    /// Creates the configured admin account, if any.
    pub async fn seed_admin(&self) -> anyhow::Result<()> {
        let auth = &self.config.auth;
        let (Some(email), Some(password)) = (auth.admin_email.as_deref(), auth.admin_password.as_deref()) else {
            return Ok(());
        };

        self.users
            .ensure_user(email, "Administrator", password, Role::Admin)
            .await
            .context("failed to seed admin account")?;
        Ok(())
    }

    /// Returns the configuration the app was built from.
    pub fn config(&self) -> &KairosConfig {
        &self.config
    }

    /// Returns the user service, for seeding accounts.
    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// Returns the server without starting it.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Consumes the app, returning its server.
    pub fn into_server(self) -> Server {
        self.server
    }
}

/// Builds the request pipeline for `registry` from configuration.
pub fn build_pipeline(config: &KairosConfig, registry: Arc<ServiceRegistry>) -> Pipeline {
    let auth = &config.auth;
    let identity = IdentitySettings {
        secret: auth.jwt_secret.clone(),
        issuer: auth.issuer.clone(),
        cookie_name: auth.cookie_name.clone(),
        query_param: auth.query_param.clone(),
        leeway_secs: auth.leeway_secs,
    };

    let request_id = if config.dispatch.trust_request_id {
        RequestIdMiddleware::trust_incoming()
    } else {
        RequestIdMiddleware::new()
    };

    let expose = config.dispatch.expose_error_details;

    Pipeline::builder()
        .stage(Stage::RequestId, request_id)
        .stage(Stage::AccessLog, AccessLogMiddleware::new())
        .stage(Stage::Identity, IdentityMiddleware::new(identity))
        .stage(
            Stage::Dispatch,
            DispatchMiddleware::new(registry)
                .with_prefix(config.dispatch.prefix.clone())
                .expose_error_details(expose),
        )
        .stage(
            Stage::Response,
            ResponseMiddleware::new()
                .expose_error_details(expose)
                .with_max_stream_bytes(config.dispatch.max_stream_bytes),
        )
        .build()
}

/// Maps the server section onto the server's own settings.
pub fn server_config(config: &KairosConfig) -> ServerConfig {
    let server = &config.server;
    ServerConfig::builder()
        .http_addr(server.http_addr.clone())
        .request_timeout(Duration::from_millis(server.request_timeout_ms))
        .shutdown_timeout(Duration::from_secs(server.shutdown_timeout_secs))
        .max_body_bytes(server.max_body_bytes)
        .service(SERVICE_NAME, env!("CARGO_PKG_VERSION"))
        .build()
}

/// Maps the logging section onto the logger's settings.
pub fn log_config(config: &KairosConfig) -> LogConfig {
    let logging = &config.logging;
    let json_format = logging.format == LogFormat::Json;
    LogConfig {
        enabled: true,
        level: logging.level.clone(),
        json_format,
        ansi: logging.ansi_enabled && !json_format,
        file_line_info: !json_format,
        include_target: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_has_every_stage() {
        let app = App::build(KairosConfig::default()).unwrap();
        assert_eq!(
            app.server().pipeline().stage_names(),
            vec!["request_id", "access_log", "identity", "dispatch", "response"]
        );
    }

    #[test]
    fn test_server_config_mapping() {
        let mut config = KairosConfig::default();
        config.server.request_timeout_ms = 1500;
        let server = server_config(&config);
        assert_eq!(server.request_timeout(), Duration::from_millis(1500));
        assert_eq!(server.service_name(), SERVICE_NAME);
    }

    #[test]
    fn test_log_config_mapping() {
        let dev = log_config(&KairosConfig::development());
        assert!(!dev.json_format);
        assert!(dev.ansi);

        let prod = log_config(&KairosConfig::production());
        assert!(prod.json_format);
        assert!(!prod.ansi);
    }

    #[tokio::test]
    async fn test_seed_admin_only_when_configured() {
        let app = App::build(KairosConfig::default()).unwrap();
        app.seed_admin().await.unwrap();

        let mut config = KairosConfig::default();
        config.auth.admin_email = Some("root@example.com".to_string());
        config.auth.admin_password = Some("root-password".to_string());
        let app = App::build(config).unwrap();
        app.seed_admin().await.unwrap();
        // Seeding twice keeps the first account.
        app.seed_admin().await.unwrap();
    }
}
