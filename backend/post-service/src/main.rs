use std::io;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use post_service::config::{Config, StoreBackend};
use post_service::handlers;
use post_service::metrics;
use post_service::state::AppState;
use post_service::store::{EntityStore, MemoryStore, MongoStore};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Post Service
///
/// Serves the forum's post, comment, like, share and bookmark endpoints.
///
/// # Routes
///
/// - `/api/v1/posts/*` - feeds, create and delete posts, likes and shares
/// - `/api/v1/users/{id}/*` - another user's posts, media and likes
/// - `/api/v1/comments/*` - comments and replies
/// - `/api/v1/bookmarks/*` - bookmarks and the bookmark feed
/// - `/api/v1/preferences/me` - tag weights learned from the caller's likes
/// - `/health`, `/ready`, `/metrics`
///
/// Runs on port 8082 by default (POST_SERVICE_PORT). `STORE_BACKEND=memory`
/// starts it without MongoDB.
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log.json);
    metrics::register_process_metrics();

    tracing::info!("Starting post-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    match config.database.backend {
        StoreBackend::Mongo => {
            let store = MongoStore::connect(&config.database).await.map_err(|e| {
                tracing::error!("MongoDB connection failed: {}", e);
                io::Error::new(
                    io::ErrorKind::Other,
                    format!("Failed to connect to MongoDB: {e}"),
                )
            })?;
            serve(store, config).await
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data does not survive a restart");
            serve(MemoryStore::new(), config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=debug,mongodb=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn serve<S: EntityStore>(store: S, config: Config) -> io::Result<()> {
    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(
        cascade_scope = ?config.delete.cascade_scope,
        "Starting HTTP server at {}",
        bind_address
    );

    let state = web::Data::new(AppState::new(
        Arc::new(store),
        config.feed.clone(),
        config.delete.cascade_scope,
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .configure(handlers::configure::<S>)
    })
    .bind(&bind_address)?
    .run()
    .await
}
