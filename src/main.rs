//! OpenSASE Storefront - cart, checkout and order tracking service

use anyhow::Result;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_storefront::api::{self, AppState};
use opensase_storefront::checkout::CheckoutService;
use opensase_storefront::config::Config;
use opensase_storefront::gateway::PgGateway;
use opensase_storefront::notify::{LogNotifier, NatsNotifier, Notifier};
use opensase_storefront::store::{CartStore, FileSnapshotStorage};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opensase_storefront=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?config, "configuration loaded");

    let gateway = Arc::new(PgGateway::connect(&config.database_url, config.max_connections).await?);
    sqlx::migrate!("./migrations").run(gateway.pool()).await?;

    let notifier: Arc<dyn Notifier> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsNotifier::new(client)),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, order events will only be logged");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let mut cart = CartStore::new(FileSnapshotStorage::new(&config.snapshot_dir));
    if let Err(error) = cart.hydrate() {
        tracing::error!(%error, dir = %config.snapshot_dir.display(), "cart snapshot unreadable, changes will not be saved");
    }

    let state = AppState {
        checkout: Arc::new(CheckoutService::new(gateway.clone(), notifier, cart)),
        catalog: gateway,
        orders_per_page: config.orders_per_page,
    };
    let app = api::router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let addr = config.socket_addr();
    tracing::info!("🚀 OpenSASE Storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
