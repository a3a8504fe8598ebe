use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use relay_core::{AdminCredentials, RelayConfig, SessionStore, UploadStore};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use relay_server::http::{self, HttpState};
use relay_server::server;
use relay_server::subsystems::coordinator::SessionCoordinator;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    #[arg(long)]
    health: bool,

    /// Import a legacy sessions.json before serving
    #[arg(long, value_name = "FILE")]
    import_legacy: Option<PathBuf>,

    /// Write every session to a legacy sessions.json and exit
    #[arg(long, value_name = "FILE")]
    export_legacy: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match RelayConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let pool = match relay_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match relay_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ SQLite ready: {}", v),
            Err(e) => {
                println!("❌ SQLite check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Relay DB health check passed");
        return Ok(());
    }

    let store = SessionStore::new(pool);

    if let Some(path) = &args.export_legacy {
        let count = relay_core::legacy::export_sessions_file(&store, path).await?;
        println!("Exported {} sessions to {}", count, path.display());
        return Ok(());
    }

    if let Some(path) = &args.import_legacy {
        let count = relay_core::legacy::import_sessions_file(&store, path).await?;
        tracing::info!(count, path = %path.display(), "Legacy sessions imported");
    }

    let admin = AdminCredentials::new(config.storage.admin_path());
    admin.ensure(&config.admin.initial_password).await?;

    let uploads = UploadStore::new(config.storage.upload_path());
    uploads.ensure_dir().await?;

    let sender = relay_core::create_sender(&config.delivery)?;
    tracing::info!(backend = sender.name(), "Delivery backend ready");

    let coordinator = SessionCoordinator::new(store, uploads, Arc::from(sender), &config.delivery);
    coordinator.recover().await?;

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.http.enabled {
        let state = HttpState {
            coordinator: coordinator.clone(),
            admin,
            config: config.clone(),
        };
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = http::start_http_server(state, http_shutdown).await {
                tracing::error!("HTTP server error: {}", e);
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, coordinator.clone(), tx.subscribe()).await?;

    coordinator.shutdown().await;
    Ok(())
}
