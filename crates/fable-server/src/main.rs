mod config;

use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fable_api::auth::hash_password;
use fable_api::{AppState, AppStateInner, TokenIssuer};

use crate::config::Config;

/// Password shared by the demo accounts created with FABLE_SEED_DEMO.
const DEMO_PASSWORD: &str = "password123";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fable=debug,fable_api=debug,fable_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = fable_db::Database::open(&config.db_path)?;
    if config.seed_demo {
        let hash = hash_password(DEMO_PASSWORD)
            .map_err(|e| anyhow::anyhow!("hashing demo password: {}", e))?;
        if !db.seed_demo(&hash)? {
            info!("Database already has users, skipping demo seed");
        }
    }

    if !config.cookie_secure {
        warn!("Refresh cookie is not marked Secure; only use this over plain-HTTP development setups");
    }

    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenIssuer::new(config.jwt_secret.clone(), config.refresh_secret.clone()),
        cookie_secure: config.cookie_secure,
    });

    let cors = match &config.origin_url {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::permissive(),
    };

    let app = fable_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Fable server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
