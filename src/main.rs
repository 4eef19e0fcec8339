use std::sync::Arc;

use learner_portal::{client::HttpPortalApi, config::Config, routes};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{trace::TraceLayer, cors::{Any, CorsLayer}};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "learner_portal=info,axum=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env();
    tracing::info!(lms = %cfg.lms_base_url, catalog = %cfg.catalog_api_base_url, "upstream endpoints");

    let http = reqwest::Client::builder().gzip(true).build()?;
    let api = HttpPortalApi::new(http, &cfg);
    let port = cfg.port;

    let app = routes::router(routes::AppState { api: Arc::new(api), config: Arc::new(cfg) }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
    );

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
