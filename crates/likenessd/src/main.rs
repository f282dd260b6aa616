use anyhow::{Context, Result};
use likeness_core::{AgeService, AssetIndex, ModelHandle, SimilarityService};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dto;
mod engine;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("likenessd starting");

    let config = config::Config::from_env();
    tracing::info!(
        model_dir = %config.model_dir.display(),
        gallery = %config.gallery_dir.display(),
        "configuration loaded"
    );

    // A model that fails to load leaves its service answering with empty results.
    let age_model = ModelHandle::from_manifest(&config.age_manifest);
    let similarity_model = ModelHandle::from_manifest(&config.similarity_manifest);

    let status = Arc::new(routes::ServiceStatus {
        version: env!("CARGO_PKG_VERSION"),
        age_model_loaded: age_model.is_loaded(),
        similarity_model_loaded: similarity_model.is_loaded(),
        gallery_root: config.gallery_dir.display().to_string(),
    });

    let engine = engine::spawn_engine(
        AgeService::new(age_model),
        SimilarityService::new(similarity_model, AssetIndex::new(&config.gallery_dir)),
        config.queue_depth,
    )?;

    let app = routes::router(routes::AppState { engine, status }, config.max_upload_bytes);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "likenessd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("likenessd shutting down");

    Ok(())
}
