use anyhow::Result;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::{
    AppState,
    config::ApiConfig,
    middleware::TokenVerifier,
    routes,
    stream::{MessageHub, StreamSettings},
};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    let config = ApiConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let token_verifier = TokenVerifier::from_env()?;
    let message_hub = MessageHub::new(config.stream_channel_capacity as usize);

    // Channels of conversations nobody streams any more
    let hub = message_hub.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            hub.cleanup().await;
        }
    });

    let stream_settings = StreamSettings {
        poll_interval: config.stream_poll_interval(),
    };

    let app_state = AppState::new(
        pool,
        token_verifier,
        message_hub,
        stream_settings,
        config.default_time_zone()?,
    );

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API service listening on {}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
