use anyhow::Context;
use clap::Parser;
use seat_reservation::{
    apply_env_overrides, http, merge_properties_file, parse_properties_file,
    run_with_graceful_shutdown, CounterStoreShutdown, JobQueueShutdown, ReservationService,
    ServiceConfig, ShutdownCoordinator,
};
use std::{net::SocketAddr, path::PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "reservation-server")]
#[command(about = "Seat reservation service backed by a job queue")]
struct Args {
    /// Port to listen on, overrides `server.port`
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Config file path
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Properties applied on top of the config file
    #[arg(long = "override-config")]
    override_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = load_config(&args)?;
    info!("Starting {} with {} seats", config.application_id, config.initial_seats);

    let service = ReservationService::new(&config)
        .await
        .context("failed to initialize reservation service")?;

    if config.queue.process_on_startup {
        service
            .start_processing()
            .context("failed to register reservation worker")?;
    } else {
        warn!("Queue processing is disabled until GET /process is called");
    }

    let coordinator = ShutdownCoordinator::new(config.shutdown_timeout());
    coordinator
        .register_component(Box::new(JobQueueShutdown::new(service.queue().clone())))
        .await;
    coordinator
        .register_component(Box::new(CounterStoreShutdown::new(service.seats())))
        .await;

    let app = http::router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server is listening on {}", addr);

    run_with_graceful_shutdown(
        "reservation-server",
        || async move {
            axum::serve(listener, app).await?;
            Ok(())
        },
        coordinator,
    )
    .await?;

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {:?}", path);
            parse_properties_file(path, "reservation-server")
                .with_context(|| format!("failed to load config {:?}", path))?
        }
        None => ServiceConfig {
            application_id: "reservation-server".to_string(),
            ..ServiceConfig::default()
        },
    };

    if let Some(path) = &args.override_config {
        info!("Loading override config from: {:?}", path);
        config = merge_properties_file(config, path)
            .with_context(|| format!("failed to load override config {:?}", path))?;
    }

    config = apply_env_overrides(config).context("invalid environment override")?;

    if let Some(port) = args.port {
        config.port = port;
    }

    Ok(config)
}
