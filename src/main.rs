use std::sync::Arc;

use tracing::{error, info, warn};

use wa_panel::api::{self, AppState};
use wa_panel::config::AppConfig;
use wa_panel::error::StartupError;
use wa_panel::live::LiveHub;
use wa_panel::store::{self, Database, migrations};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // A missing .env file is fine; real environment variables still apply
    let dotenv = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let config = AppConfig::from_env().inspect_err(|e| error!(error = %e, "Invalid configuration"))?;

    eprintln!("📱 WA Panel v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.database.kind());
    eprintln!("   API: http://{}:{}/", config.bind_addr, config.port);
    eprintln!("   Live updates: ws://{}:{}/ws\n", config.bind_addr, config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = store::connect(&config.database)
        .await
        .inspect_err(|e| error!(error = %e, "Failed to connect to database"))?;

    if let Err(e) = migrations::init_schema(db.as_ref()).await {
        error!(error = %e, "Schema initialization failed");
        db.close().await.ok();
        return Err(e.into());
    }

    // ── HTTP server ──────────────────────────────────────────────────────
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let state = AppState::new(config, Arc::clone(&db), LiveHub::new());
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .inspect_err(|e| error!(error = %e, addr = %addr, "Failed to bind"))?;
    info!(addr = %addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Shutting down");
    if let Err(e) = db.close().await {
        warn!(error = %e, "Failed to close database cleanly");
    }
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        // Without a signal handler the server runs until killed
        std::future::pending::<()>().await;
    }
}
