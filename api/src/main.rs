use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use tubely::config::{Config, StorageBackend};
use tubely::storage::{LocalStorage, S3Storage, Storage};
use tubely::{AppState, build_app, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let storage = match &config.storage {
        StorageBackend::Local => Storage::Local(LocalStorage::new(
            &config.assets_root,
            config.asset_base_url.clone(),
        )),
        StorageBackend::S3 { bucket, region } => {
            Storage::S3(S3Storage::connect(bucket, region, config.presign_expiry).await)
        }
    };
    storage.ensure_ready().await?;

    match &config.storage {
        StorageBackend::Local => tracing::info!(
            root = %config.assets_root.display(),
            base_url = %config.asset_base_url,
            "using local asset storage"
        ),
        StorageBackend::S3 { bucket, region } => {
            tracing::info!(%bucket, %region, "using S3 asset storage")
        }
    }

    let state = Arc::new(AppState {
        db: pool,
        storage,
        media_tools: config.media_tools.clone(),
        jwt_secret: config.jwt_secret.into_bytes(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, build_app(state)).await?;
    Ok(())
}
