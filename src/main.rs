use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use storefront_api::config::{init_tracing, load_config};
use storefront_api::gateway::HttpPaymentGateway;
use storefront_api::{app_router, db, events, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    let pool = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;

    if config.auto_migrate {
        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;
    }

    let gateway = Arc::new(HttpPaymentGateway::new(
        config.payment_api_base.clone(),
        config.payment_secret_key.clone(),
    ));

    let (event_sender, event_receiver) = events::channel(256);
    tokio::spawn(events::process_events(event_receiver));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(pool, gateway, event_sender, config);
    let app = app_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
