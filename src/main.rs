use anyhow::Context;
use embedding_service::api::{create_router, AppState};
use embedding_service::application::EmbedService;
use embedding_service::infrastructure::{AppConfig, TextEmbedding};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load().context("failed to load configuration")?;
    info!(model = %config.model.name, "Loading embedding model");

    let embedding = match TextEmbedding::load(config.model.clone()).await {
        Ok(embedding) => embedding,
        Err(e) => {
            let detail = format!("{e:#}");
            error!(model = %config.model.name, error = %detail, "Failed to load embedding model");
            return Err(e);
        }
    };

    let embed_service = Arc::new(EmbedService::new(
        Arc::new(embedding),
        config.limits.max_batch_texts,
        config.limits.inference_batch_size,
    ));
    info!(
        model = %embed_service.model_name(),
        dimension = embed_service.dimension(),
        max_batch_texts = config.limits.max_batch_texts,
        "Embedding model ready"
    );

    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid SERVER_HOST {:?}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app = create_router(AppState::new(embed_service, config));

    info!("Embedding service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Embedding service stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "embedding_service=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
