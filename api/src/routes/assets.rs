//! Serving locally stored assets (/assets/*)

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use crate::AppState;
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/assets/{*path}", get(serve_asset))
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// GET /assets/*path - only available with the local storage backend
async fn serve_asset(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if path.contains("..") || path.contains('\0') {
        return Err(ApiError::not_found("Asset not found"));
    }

    let root = state
        .storage
        .local_root()
        .ok_or_else(|| ApiError::not_found("Asset not found"))?;

    // canonicalize() resolves symlinks; the result must stay under the root
    let canonical = root
        .join(&path)
        .canonicalize()
        .map_err(|_| ApiError::not_found("Asset not found"))?;
    let root_canonical = root
        .canonicalize()
        .log_500("Failed to canonicalize assets root")?;

    if !canonical.starts_with(&root_canonical) {
        return Err(ApiError::not_found("Asset not found"));
    }

    let bytes = tokio::fs::read(&canonical)
        .await
        .map_err(|_| ApiError::not_found("Asset not found"))?;

    // Asset names are random and never reused
    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&canonical)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_app;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn serves_stored_asset_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("thumbnails")).unwrap();
        std::fs::write(dir.path().join("thumbnails/abc.png"), b"png-bytes").unwrap();

        let response = test_app(dir.path())
            .oneshot(
                Request::get("/assets/thumbnails/abc.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"png-bytes");
    }

    #[tokio::test]
    async fn missing_asset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path())
            .oneshot(Request::get("/assets/nope.mp4").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let response = test_app(&assets)
            .oneshot(
                Request::get("/assets/%2E%2E/secret.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
