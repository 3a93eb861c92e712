//! meterd - The session billing service
//!
//! This is the main entry point for the meterd service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Session manager and tick scheduler
//! - Call host
//! - HTTP server

use anyhow::{Context, Result};
use clap::Parser;
use meter_config::{Policy, load_config};
use meter_core::CoreEvent;
use meter_host_api::{CallHost, HostEvent, LoggingHost};
use meter_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use meter_util::{DB_FILENAME, default_config_path};
use meterd::{AppState, ChannelSink, Dispatcher, TickScheduler, build_router};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// meterd - Per-minute billing for metered consultations
#[derive(Parser, Debug)]
#[command(name = "meterd")]
#[command(about = "Per-minute billing service for metered consultations", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/meterd/config.toml)
    #[arg(short, long, env = "METERD_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Listen address override (or set METERD_LISTEN env var)
    #[arg(long, env = "METERD_LISTEN")]
    listen: Option<SocketAddr>,

    /// Data directory override (or set METERD_DATA_DIR env var)
    #[arg(short, long, env = "METERD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    state: AppState,
    scheduler: Arc<TickScheduler>,
    dispatcher: Dispatcher,
    core_events: mpsc::UnboundedReceiver<CoreEvent>,
    host: Arc<dyn CallHost>,
    store: Arc<dyn Store>,
    listen_addr: SocketAddr,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let policy: Policy = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            warn!(config_path = %args.config.display(), "Config file not found, using defaults");
            Policy::default()
        };

        info!(
            config_path = %args.config.display(),
            tick_interval_secs = policy.billing.tick_seconds(),
            on_exhausted = policy.billing.on_exhausted.as_str(),
            "Configuration loaded"
        );

        let listen_addr = match args.listen {
            Some(addr) => addr,
            None => policy
                .service
                .listen_addr
                .parse()
                .with_context(|| format!("Invalid listen address {:?}", policy.service.listen_addr))?,
        };

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        // Create data directory
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize store
        let db_path = data_dir.join(DB_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;
        store.append_audit(AuditEvent::new(AuditEventType::ConfigLoaded {
            tick_interval_seconds: policy.billing.tick_seconds(),
            platform_fee_rate: policy.billing.platform_fee_rate,
        }))?;

        let host: Arc<dyn CallHost> = Arc::new(LoggingHost::new());

        let (sink, core_events) = ChannelSink::new();
        let period = policy.billing.tick_interval;
        let state = AppState::new(store.clone(), policy.billing, Arc::new(sink), host.clone());
        let scheduler = Arc::new(TickScheduler::new(state.manager.clone(), period));
        let dispatcher = Dispatcher::new(state.manager.clone(), scheduler.clone(), host.clone());

        Ok(Self {
            state,
            scheduler,
            dispatcher,
            core_events,
            host,
            store,
            listen_addr,
        })
    }

    async fn run(mut self) -> Result<()> {
        // Pick up sessions left active by a previous run
        self.scheduler
            .restore()
            .context("Failed to restore active sessions")?;

        // Hosts without an event stream get an idle channel
        let (_idle_tx, idle_rx) = mpsc::unbounded_channel::<HostEvent>();
        let mut host_events = self.host.subscribe().unwrap_or(idle_rx);

        // Start HTTP server
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.listen_addr))?;
        info!(listen_addr = %self.listen_addr, "HTTP server listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = build_router(self.state.clone());
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        });

        // Set up signal handlers
        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // Core events (session transitions, warnings, charges)
                Some(event) = self.core_events.recv() => {
                    self.dispatcher.handle_core_event(event).await;
                }

                // Host events (participant left)
                Some(event) = host_events.recv() => {
                    self.dispatcher.handle_host_event(event).await;
                }
            }
        }

        // Graceful shutdown
        info!("Shutting down meterd");

        let _ = shutdown_tx.send(());
        if let Err(e) = server.await {
            warn!(error = %e, "HTTP server task failed");
        }

        // Flush events emitted by in-flight requests
        while let Ok(event) = self.core_events.try_recv() {
            self.dispatcher.handle_core_event(event).await;
        }

        // Sessions stay active in the store and resume billing on next start
        self.scheduler.shutdown();

        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "meterd starting"
    );

    if meter_util::is_mock_time_active() {
        warn!(now = %meter_util::now(), "Mock time is active; timestamps are not real");
    }

    // Create and run the service
    let service = Service::new(&args)?;
    service.run().await
}
