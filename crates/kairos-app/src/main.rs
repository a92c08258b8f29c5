//! Kairos task service - entry point.

use std::path::PathBuf;

use kairos_app::{log_config, App};
use kairos_config::{ConfigLoader, KairosConfig};
use kairos_server::ShutdownSignal;
use tracing::{error, info};

/// Default configuration file, read when present.
const DEFAULT_CONFIG_FILE: &str = "kairos.toml";

/// Prefix of environment overrides, e.g. `KAIROS__SERVER__HTTP_ADDR`.
const ENV_PREFIX: &str = "KAIROS";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("kairos {}", env!("CARGO_PKG_VERSION"));
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Kairos - task service with dynamic service dispatch

USAGE:
    kairos [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file, TOML or JSON (default: ./kairos.toml if present)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    KAIROS__ENVIRONMENT                development | staging | production
    KAIROS__SERVER__HTTP_ADDR          Listen address (default: 0.0.0.0:8080)
    KAIROS__AUTH__JWT_SECRET           Token signing secret (required outside development)
    KAIROS__AUTH__ADMIN_EMAIL          Admin account seeded at startup
    KAIROS__AUTH__ADMIN_PASSWORD       Password of the seeded admin
    KAIROS__AI__API_KEY                Key for the chat completions provider
    RUST_LOG                           Overrides the configured log filter

A .env file in the working directory is loaded before environment overrides.
"
    );
}

fn load_config(args: &Args) -> Result<KairosConfig, kairos_config::ConfigError> {
    let loader = ConfigLoader::new().with_defaults();
    let loader = match &args.config {
        Some(path) => loader.with_file(path)?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    loader.with_dotenv()?.with_env_prefix(ENV_PREFIX).load()
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logging is configured from the file, so config errors go to stderr.
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = kairos_telemetry::init_logging(&log_config(&config)) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = config.environment.as_str(),
        addr = %config.server.http_addr,
        "starting kairos"
    );

    let app = match App::build(config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to build application");
            std::process::exit(1);
        }
    };

    if let Err(e) = app.seed_admin().await {
        error!(error = %format!("{e:#}"), "startup failed");
        std::process::exit(1);
    }

    let shutdown = ShutdownSignal::with_os_signals();
    if let Err(e) = app.into_server().run_with_shutdown(shutdown).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }

    info!("kairos stopped");
}
