//! compmon - composition monitor
//!
//! Polls a remote composition REST API, keeps a flattened last-known-good
//! view of its layers and clips, and serves that view over a local HTTP read
//! API with an SSE event stream.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use compmon::services::{
    check_connection, host_composition_name, ClipTrigger, ConnectionStatus, EngineTimeouts,
    HttpTransport, Scheduler, SchedulerConfig, Transport, UpdateCoordinator,
};
use compmon::{build_router, AppState};
use compmon_common::config::{
    load_config, ConfigOverrides, ConfigSource, LoggingConfig, TomlConfig,
};
use compmon_common::events::EventBus;

/// Command-line arguments for compmon
#[derive(Parser, Debug)]
#[command(name = "compmon")]
#[command(about = "Monitors a remote composition over its REST API")]
#[command(version)]
struct Args {
    /// Configuration file (overrides COMPMON_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Remote API host
    #[arg(long, env = "COMPMON_HOST")]
    host: Option<String>,

    /// Remote API port
    #[arg(short, long, env = "COMPMON_PORT")]
    port: Option<u16>,

    /// Address the read API listens on
    #[arg(short, long, env = "COMPMON_LISTEN")]
    listen: Option<String>,

    /// Check that the remote API is reachable and exit
    #[arg(long, conflicts_with = "once")]
    check: bool,

    /// Run a single update cycle, print it as JSON and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_source) = load_config(args.config.as_deref())?;
    config.apply_overrides(&ConfigOverrides {
        host: args.host.clone(),
        port: args.port,
        listen_addr: args.listen.clone(),
    });
    config.validate()?;

    init_tracing(&config.logging)?;

    info!(
        "Starting compmon v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("COMPMON_REVISION"),
        env!("COMPMON_BUILT_AT"),
        env!("COMPMON_PROFILE")
    );
    match &config_source {
        ConfigSource::BuiltInDefaults { .. } => warn!("Configuration: {}", config_source),
        _ => info!("Configuration: {}", config_source),
    }

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(config.base_url()).context("Failed to create HTTP client")?,
    );
    info!("Remote API: {}", config.base_url());

    if args.check {
        return run_check(transport.as_ref(), &config).await;
    }

    if args.once {
        return run_once(transport, &config).await;
    }

    serve(transport, config).await
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level {:?}", logging.level))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &logging.file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.init(),
    }
    Ok(())
}

async fn run_check(transport: &dyn Transport, config: &TomlConfig) -> Result<()> {
    match check_connection(transport, config.timeouts.composition()).await {
        ConnectionStatus::Reachable { composition_name } => {
            println!("Connected to {} (composition: {})", config.base_url(), composition_name);
            Ok(())
        }
        ConnectionStatus::UnexpectedStatus(status) => {
            bail!("{} answered with HTTP {}", config.base_url(), status)
        }
        ConnectionStatus::Unreachable(reason) => {
            bail!("{} is unreachable: {}", config.base_url(), reason)
        }
    }
}

async fn run_once(transport: Arc<dyn Transport>, config: &TomlConfig) -> Result<()> {
    let mut coordinator = UpdateCoordinator::new(transport, EngineTimeouts::from(&config.timeouts))
        .with_fallback_name(host_composition_name(&config.host));
    let update = coordinator.update().await?;
    println!("{}", serde_json::to_string_pretty(&update)?);
    Ok(())
}

async fn serve(transport: Arc<dyn Transport>, config: TomlConfig) -> Result<()> {
    match check_connection(transport.as_ref(), config.timeouts.composition()).await {
        ConnectionStatus::Reachable { .. } => {}
        status => warn!(
            "Remote API not ready ({:?}), polling will keep retrying",
            status
        ),
    }

    let event_bus = EventBus::new(100);
    let cancel = CancellationToken::new();

    let coordinator =
        UpdateCoordinator::new(transport.clone(), EngineTimeouts::from(&config.timeouts))
            .with_fallback_name(host_composition_name(&config.host));
    let (scheduler, handle) = Scheduler::new(
        coordinator,
        SchedulerConfig {
            poll_interval: config.poll_interval(),
            rediscover_interval: config.rediscover_interval(),
        },
        event_bus.clone(),
        cancel.clone(),
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    let trigger = ClipTrigger::new(transport, config.timeouts.trigger());
    let app = build_router(AppState::new(handle, trigger, event_bus));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    info!("Listening on http://{}", config.listen_addr);
    info!("Health check: http://{}/health", config.listen_addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    cancel.cancel();
    scheduler_task.await.context("Scheduler task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
