use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tableside_gateway::config::Config;
use tableside_gateway::gateway::bus::{PubSubBus, RedisBus};
use tableside_gateway::gateway::emitter::Emitter;
use tableside_gateway::gateway::Gateway;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Redis is optional; without it the gateway serves this instance only.
    let bus: Option<Arc<dyn PubSubBus>> = match &config.redis_url {
        Some(url) => match RedisBus::connect(url).await {
            Ok(bus) => Some(Arc::new(bus)),
            Err(e) => {
                tracing::warn!(error = %e, "redis unreachable; running single-instance");
                None
            }
        },
        None => None,
    };

    // Domain services that run in this process take a clone of `emitter`.
    let emitter = Emitter::new();
    let gateway = Gateway::start(&config, bus, emitter)
        .await
        .expect("fresh emitter is unbound");

    tracing::info!(
        path = %config.gateway_path,
        allowed_origins = ?config.allowed_origins,
        "tableside-gateway configured"
    );

    let app = tableside_gateway::routes::router(&config.gateway_path)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway.app_state(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "tableside-gateway listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
