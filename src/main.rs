use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info, warn};

use dulce_bocatto as api;
use api::services::checkout::{CheckoutGateway, StripeCheckoutClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    let checkout_gateway: Option<Arc<dyn CheckoutGateway>> =
        match StripeCheckoutClient::from_config(&cfg)? {
            Some(client) => {
                info!(api_base = %cfg.stripe_api_base, "Card checkout enabled");
                Some(Arc::new(client))
            }
            None => {
                warn!("No card provider key configured; only manual payments are accepted");
                None
            }
        };

    let app_state = api::AppState::new(Arc::new(db_pool), cfg.clone(), checkout_gateway);
    let app = api::app_router(app_state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    info!("dulce-bocatto listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dulce-bocatto stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
