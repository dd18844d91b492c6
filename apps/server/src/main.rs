use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use taxi_server::{
    config::load_config,
    db::Store,
    http_server,
    state::AppState,
    tasks::{spawn_location_simulator, LocationSimulator},
    telephony::{TelephonyError, TelephonyService, TwilioGateway},
    AppError, BroadcastHub, Result,
};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Initializing server...");
    let config = load_config()?;

    let store = Store::connect(&config.database_url, config.db_max_connections).await?;

    let gateway = TwilioGateway::new(config.twilio.clone()).map_err(|e| match e {
        TelephonyError::Config(reason) => AppError::invalid_env("TWILIO_API_BASE", reason),
        other => AppError::Telephony(other),
    })?;
    let telephony = TelephonyService::new(Arc::new(gateway), config.numbers.clone());

    let (taxi_tx, taxi_rx) = watch::channel(config.initial_taxi.clone());
    let hub = BroadcastHub::new(taxi_rx);

    let simulator = LocationSimulator::new(StdRng::from_entropy(), config.bounds);
    let simulator_handle = spawn_location_simulator(simulator, taxi_tx, hub.clone(), config.tick);

    let app_state = AppState {
        store,
        hub,
        telephony,
    };
    let router = http_server::create_router(app_state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(AppError::ServerBind)?;
    info!("HTTP/WebSocket server listening on {}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Io)?;

    simulator_handle.shutdown().await?;
    info!("Server shut down.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
