//! OneAccount Auth - Demo Server
//!
//! Serves the callback endpoint with the authentication middleware and
//! echoes the recovered user data once a client has been authorized.

use std::net::SocketAddr;

use axum::{Json, Router, response::IntoResponse, routing::any};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use oneaccount_auth::{Collaborators, Config, OneAccount, OneAccountData};

#[derive(Parser, Debug)]
#[command(name = "oneaccount-auth")]
#[command(about = "Demo server for the OneAccount authentication middleware")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Callback path intercepted by the middleware (default: oneaccountauth)
    #[arg(long, env = "ONEACCOUNT_CALLBACK_PATH")]
    callback_path: Option<String>,

    /// Verification endpoint (e.g., a local mock of the OneAccount API)
    #[arg(long, env = "ONEACCOUNT_VERIFY_URL")]
    verify_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

async fn callback(data: OneAccountData) -> impl IntoResponse {
    let user = data.json::<serde_json::Value>().unwrap_or(serde_json::Value::Null);
    Json(serde_json::json!({ "authenticated": true, "user": user }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "oneaccount-auth",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::new();
    config.callback_path = cli.callback_path;
    if let Some(url) = cli.verify_url {
        config.verify_url = url;
    }

    let oa = OneAccount::new(config, Collaborators::default())?;
    let callback_route = format!("/{}", oa.callback_path());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        callback = %callback_route,
        "Starting OneAccount demo server"
    );

    let router = Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(&callback_route, any(callback))
        .layer(axum::middleware::from_fn_with_state(oa.clone(), oneaccount_auth::authenticate))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

    oa.shutdown();
    tracing::info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Received shutdown signal");
}
