use std::future::IntoFuture;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_tungstenite::accept_async;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod bus;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod projects;
pub mod protocol;
pub mod resolver;
pub mod routes;
pub mod store;
pub mod utils;

use auth::AuthManager;
use config::Config;
use context::AppContext;
use handlers::handle_websocket;
use store::postgres::{PgThreadStore, create_pool};

/// Accept loop for realtime connections. Each connection runs on its own
/// task; a failed upgrade just drops the socket.
pub async fn run_websocket_server(app_context: AppContext, listener: TcpListener) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to accept socket: {}", e);
                continue;
            }
        };

        let ctx = app_context.clone();

        tokio::spawn(async move {
            if let Ok(ws_stream) = accept_async(socket).await {
                handle_websocket(ws_stream, addr, ctx).await;
            }
        });
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    // Connect to database
    let pool = create_pool(&config.database_url, &config.db).await?;
    tracing::info!("Connected to database");

    // Apply database migrations
    tracing::info!("Applying database migrations...");
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Database migrations applied successfully.");

    let store = Arc::new(PgThreadStore::new(pool));
    let auth_manager = Arc::new(AuthManager::new(&config));

    let app_context = AppContext::new(store, auth_manager, config.clone());

    // Realtime listener
    let ws_addr = format!("0.0.0.0:{}", config.ws_port);
    let ws_listener = TcpListener::bind(&ws_addr).await?;
    tracing::info!("Atrium server listening on {} (WebSocket)", ws_addr);

    // HTTP API listener
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let http_listener = TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP server listening on http://{}", http_addr);

    let router = routes::create_router(Arc::new(app_context.clone()));
    let websocket_server = run_websocket_server(app_context, ws_listener);
    let http_server = axum::serve(http_listener, router).into_future();

    tokio::select! {
        _ = websocket_server => {
            tracing::info!("WebSocket server shut down.");
        },
        res = http_server => {
            if let Err(e) = res {
                tracing::error!("HTTP server failed: {}", e);
            }
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received. Shutting down...");
        }
    }

    Ok(())
}
