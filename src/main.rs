//! TechStore - electronics storefront and admin console service

use std::sync::Arc;

use anyhow::Result;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use techstore::contact::ContactRelay;
use techstore::images::FsImageStore;
use techstore::publisher::{EventPublisher, LogPublisher, NatsPublisher};
use techstore::repository::PgRepository;
use techstore::{router, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = PgPoolOptions::new().max_connections(10).connect(config.database_url.expose_secret()).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, logging events instead");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    tokio::fs::create_dir_all(&config.image_dir).await?;
    let images = Arc::new(FsImageStore::new(config.image_dir.clone(), config.image_base_url.clone()));
    let contact = ContactRelay::new(reqwest::Client::new(), config.contact_form_url.clone());
    let state = AppState::new(Arc::new(PgRepository::new(db)), images, events, contact);
    let app = router(state, Some(config.image_dir.as_path()));

    let addr = config.socket_addr();
    tracing::info!("TechStore listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
