//! flatbase HTTP API server.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};

use flatbase::auth::session;
use flatbase::server::{router, AppState, Config};
use flatbase::store::random_id;

/// flatbase HTTP API server.
#[derive(Parser, Debug)]
#[command(name = "flatbase-server")]
#[command(about = "Schema-driven REST + SSE server over append-only CSV files")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "flatbase.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;

    // Environment beats config; with neither, sessions die with the process.
    let secret = match std::env::var("FLATBASE_SECRET") {
        Ok(secret) => secret,
        Err(_) => match &config.session_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!("no session secret configured, using a random one");
                random_id()
            }
        },
    };
    session::init_secret(secret)?;

    tracing::info!(data_dir = %config.data_dir, "opening store");
    let state = AppState::from_config(&config)?;

    let mut app = router(state).layer(TraceLayer::new_for_http());
    if let Some(static_dir) = &config.static_dir {
        app = app.nest_service("/static", ServeDir::new(static_dir));
    }

    let addr: SocketAddr = config.bind_addr().parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
