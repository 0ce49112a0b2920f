mod admin;
mod app;
mod auth;
mod clock;
mod config;
mod db;
mod error;
mod hunt;
mod limit;
#[cfg(test)]
mod memory;
mod state;
mod vision;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "touchgrass=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    state.auth.cleanup_expired().await;

    let (host, port) = (state.config.host.clone(), state.config.port);
    let app = app::build_app(state);
    app::serve(app, &host, port).await
}
