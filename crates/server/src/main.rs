use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiosk_core::{
    create_authenticator, load_config, validate_config, AccessTokenSigner, Authenticator,
    CredentialCache, HttpGenerationProvider, JwtSigner, Kiosk, KvStore, PassthroughCompositor,
    SqliteKvStore,
};
use kiosk_server::api::create_router;
use kiosk_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("KIOSK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);
    info!(
        "Image tasks {}, video tasks {}",
        if config.tasks.image_online { "online" } else { "offline" },
        if config.tasks.video_online { "online" } else { "offline" },
    );

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create SQLite key-value store shared by every tenant
    let store: Arc<dyn KvStore> = Arc::new(
        SqliteKvStore::new(&config.database.path).context("Failed to create store")?,
    );
    info!("Store initialized");

    // Credentials: provider JWTs and kiosk access tokens
    let provider_tokens = Arc::new(CredentialCache::new(
        JwtSigner::new(config.provider.clone(), &config.credential),
        Arc::clone(&store),
    ));
    let access_tokens = Arc::new(CredentialCache::new(
        AccessTokenSigner::new(&config.credential),
        Arc::clone(&store),
    ));

    // Generation provider
    let provider = HttpGenerationProvider::new(&config.provider, provider_tokens)
        .context("Failed to create generation provider")?;
    info!("Generation provider at {}", config.provider.base_url);

    let kiosk = Arc::new(Kiosk::new(
        Arc::clone(&store),
        Arc::new(provider),
        Arc::new(PassthroughCompositor::new()),
        config.tasks.clone(),
        config.printing.clone(),
    ));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        kiosk,
        access_tokens,
    ));
    info!("Config hash: {}", state.config_hash());

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
