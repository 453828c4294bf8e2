// # siipd - SI-IP Daemon
//
// Thin integration layer around siip-core:
// 1. Load and validate configuration (file + environment)
// 2. Initialize logging
// 3. Register DNS providers and build the selected one
// 4. Run the UpdateController until SIGINT/SIGTERM
//
// ## Configuration
//
// - `CONFIG_FILE`: Optional TOML file (`[global]`, `[aws]`, `[cloudflare]`, `[log]`)
// - `DNS_PROVIDER`: `aws` (default) or `cloudflare`
// - `RECORD_NAME`: Record to keep in sync
// - `REFRESH_INTERVAL`: Poll interval and record TTL in seconds (default 300)
// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `HOSTED_ZONE_ID`: Route 53
// - `CF_API_TOKEN`, `CF_ZONE_ID`: Cloudflare
// - `SIIP_LOG_LEVEL`: Log filter (default `info`)
// - `SIIP_LOG_FORMAT`: `text` (default) or `json`
//
// ## Example
//
// ```bash
// export DNS_PROVIDER=aws
// export RECORD_NAME=home.example.com
// export AWS_ACCESS_KEY_ID=AKIA...
// export AWS_SECRET_ACCESS_KEY=...
// export HOSTED_ZONE_ID=Z0123456789
//
// siipd
// ```

use anyhow::Result;
use siip_core::{Config, LogFormat, ProviderRegistry, UpdateController};
use siip_ip_http::HttpIpResolver;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long to wait for the update loop to finish in-flight work after a stop
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiipExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SiipExitCode> for ExitCode {
    fn from(code: SiipExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Classify a daemon error for the process exit code
fn exit_code_for(err: &anyhow::Error) -> SiipExitCode {
    match err.downcast_ref::<siip_core::Error>() {
        Some(e) if e.is_startup_fatal() => SiipExitCode::ConfigError,
        _ => SiipExitCode::RuntimeError,
    }
}

fn main() -> ExitCode {
    // Load configuration from file and environment
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SiipExitCode::ConfigError.into();
        }
    };

    // Validate before any network activity
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SiipExitCode::ConfigError.into();
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SiipExitCode::ConfigError.into();
    }

    info!(
        operation = "startup",
        service = "si-ip",
        version = env!("CARGO_PKG_VERSION"),
        config = %config.redacted(),
        "Starting SI-IP"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(operation = "startup", error = %e, "Failed to create tokio runtime");
            return SiipExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => SiipExitCode::CleanShutdown,
            Err(e) => {
                error!(operation = "startup", error = %e, "Fatal error");
                exit_code_for(&e)
            }
        }
    });

    code.into()
}

/// Install the global subscriber from the `[log]` settings
fn init_tracing(
    config: &Config,
) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    }
}

/// Run the daemon until shutdown or a fatal startup error
async fn run_daemon(config: Config) -> Result<()> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "route53")]
    siip_provider_route53::register(&registry);

    #[cfg(feature = "cloudflare")]
    siip_provider_cloudflare::register(&registry);

    debug!(providers = ?registry.list_providers(), "Registered DNS providers");

    let provider = registry.create_provider(&config)?;
    let resolver = HttpIpResolver::new()?;

    let (controller, mut events) = UpdateController::new(Box::new(resolver), provider, &config)?;
    let controller = Arc::new(controller);

    let runner = Arc::clone(&controller);
    let mut run = tokio::spawn(async move { runner.run().await });

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            joined = &mut run => {
                // The loop only ends on its own when startup failed
                joined??;
                return Ok(());
            }
            Some(event) = events.recv() => {
                debug!(event = ?event, "Controller event");
            }
            received = &mut shutdown => {
                let signal = received?;
                info!(
                    operation = "shutdown",
                    shutdown_type = "user_initiated",
                    signal,
                    "Shutting down SI-IP"
                );
                controller.stop();
                break;
            }
        }
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut run).await {
        Ok(joined) => joined?.map_err(Into::into),
        Err(_) => {
            warn!(
                operation = "shutdown",
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "Update loop did not stop in time, aborting"
            );
            run.abort();
            Ok(())
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
