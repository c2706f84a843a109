mod config;
mod frame;
mod rate_limit;
mod routes;
mod services;
mod state;
mod ttl;
mod validate;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::HubConfig::from_env();
    let state = state::AppState::new(config);

    // Spawn background TTL sweeps.
    let _sweeps = services::sweep::spawn_sweep_tasks(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "partyhub listening");
    axum::serve(listener, app).await.expect("server failed");
}
