use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use podpulse::cli::{format_dry_run, Args};
use podpulse::cluster::KubeClusterClient;
use podpulse::monitor::Monitor;
use podpulse::server::{create_router, AppState, API_PREFIX};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = match args.verbose {
        0 => "warn,podpulse=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load .env file if specified, then re-read args so it backs env options
    let args = match args.apply_env_file(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let namespaces = match args.resolve_namespaces() {
        Ok(namespaces) => namespaces,
        Err(e) => {
            error!("Invalid namespace configuration: {}", e);
            process::exit(1);
        }
    };

    let service_host = std::env::var("KUBERNETES_SERVICE_HOST").ok();
    let source = args.cluster_source(service_host.as_deref());

    // Dry-run mode: print resolved configuration and exit
    if args.dry_run {
        let output = format_dry_run(&args, &source, &namespaces);
        println!("{}", output);
        return;
    }

    if let Err(e) = run(args, source, namespaces).await {
        error!("Server error: {:#}", e);
        process::exit(1);
    }
}

async fn run(
    args: Args,
    source: podpulse::cluster::ClusterSource,
    namespaces: Vec<podpulse::config::NamespaceConfig>,
) -> anyhow::Result<()> {
    let config = args.monitor_config();

    info!("Using cluster source: {}", source);
    let client = Arc::new(KubeClusterClient::new(source, config.request_timeout));
    let monitor = Arc::new(Monitor::new(client, namespaces, config));

    // A cluster that is down at startup is retried by the poller
    if !monitor.initialize().await {
        warn!("Cluster unavailable at startup, will retry on the next poll");
    }
    let scheduler = monitor.start_background();

    let app = create_router(AppState::new(monitor));
    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("Server listening on {}", addr);
    info!("Endpoints:");
    info!("  GET  {}/pods              - All pods with stats", API_PREFIX);
    info!("  GET  {}/pods/{{namespace}}  - Pods in one namespace", API_PREFIX);
    info!("  GET  {}/stats             - Aggregate stats", API_PREFIX);
    info!("  GET  {}/namespaces        - Namespace configuration", API_PREFIX);
    info!("  POST {}/action            - Start/stop/restart", API_PREFIX);
    info!("  POST {}/action/bulk       - Bulk actions", API_PREFIX);
    info!("  GET  {}/health            - Health check", API_PREFIX);
    info!("  GET  /ws                             - Push channel");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    scheduler.shutdown().await;
    served?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
