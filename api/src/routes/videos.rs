//! Video endpoints (/api/videos, /api/thumbnail_upload, /api/video_upload)

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::AppState;
use crate::constants::{MAX_THUMBNAIL_UPLOAD_SIZE, MAX_VIDEO_UPLOAD_SIZE, THUMBNAIL_KEY_PREFIX};
use crate::domain::videos::{self, Video};
use crate::media::{self, THUMBNAIL_MEDIA_TYPES, VIDEO_MEDIA_TYPE};
use crate::services::error::{ApiError, LogErr};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/videos", get(list_videos).post(create_video))
        .route("/api/videos/{video_id}", get(get_video).delete(delete_video))
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(MAX_THUMBNAIL_UPLOAD_SIZE)),
        )
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(DefaultBodyLimit::max(MAX_VIDEO_UPLOAD_SIZE)),
        )
}

fn parse_video_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid ID"))
}

/// Load a video and check that `user_id` owns it
async fn load_owned_video(state: &AppState, video_id: Uuid, user_id: Uuid) -> Result<Video, ApiError> {
    let video = videos::get_video(&state.db, video_id)
        .await
        .log_500("Error retrieving video")?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    if video.user_id != user_id {
        return Err(ApiError::unauthorized("Not the owner of this video"));
    }
    Ok(video)
}

/// Persist a record that now points at `new_pointer`, then drop the asset it
/// used to point at. On DB failure the new asset is removed instead.
async fn save_with_new_asset(
    state: &AppState,
    video: &Video,
    new_pointer: &str,
    previous: Option<String>,
) -> Result<(), ApiError> {
    if let Err(e) = videos::update_video(&state.db, video).await {
        tracing::error!(video_id = %video.id, error = %e, "Error updating video");
        if let Err(cleanup_err) = state.storage.delete(new_pointer).await {
            tracing::warn!(pointer = new_pointer, error = %cleanup_err, "Failed to clean up orphaned asset");
        }
        return Err(ApiError::internal("Error updating video"));
    }

    if let Some(previous) = previous.filter(|p| p != new_pointer) {
        if let Err(e) = state.storage.delete(&previous).await {
            tracing::warn!(pointer = %previous, error = %e, "Failed to delete replaced asset");
        }
    }
    Ok(())
}

async fn signed(state: &AppState, video: Video) -> Result<Video, ApiError> {
    state
        .storage
        .sign_video(video)
        .await
        .log_500("Error generating video URL")
}

/// Sign a record whose new asset is already committed
async fn signed_after_upload(state: &AppState, video: Video) -> Result<Video, ApiError> {
    let video_id = video.id;
    state.storage.sign_video(video).await.map_err(|e| {
        tracing::error!(%video_id, error = %e, "upload stored, signing failed");
        ApiError::internal("Upload saved but its URL could not be generated")
    })
}

#[derive(Debug, Deserialize)]
struct CreateVideoRequest {
    title: String,
    #[serde(default)]
    description: String,
}

/// POST /api/videos - Create a draft video
async fn create_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Video>), ApiError> {
    let Json(req) = body.log_400("Invalid video payload")?;
    if req.title.trim().is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    let video = videos::create_video(&state.db, user_id, req.title.trim(), &req.description)
        .await
        .log_500("Error creating video")?;

    tracing::info!(video_id = %video.id, %user_id, "created video");
    Ok((StatusCode::CREATED, Json(signed(&state, video).await?)))
}

/// GET /api/videos - The caller's videos, newest first
async fn list_videos(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Video>>, ApiError> {
    let rows = videos::list_videos_for_user(&state.db, user_id)
        .await
        .log_500("Error retrieving videos")?;

    let mut out = Vec::with_capacity(rows.len());
    for video in rows {
        out.push(signed(&state, video).await?);
    }
    Ok(Json(out))
}

/// GET /api/videos/:id
async fn get_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    let video = load_owned_video(&state, video_id, user_id).await?;
    Ok(Json(signed(&state, video).await?))
}

/// DELETE /api/videos/:id - Remove the record and its stored assets
async fn delete_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    let video = load_owned_video(&state, video_id, user_id).await?;

    if !videos::delete_video(&state.db, video_id)
        .await
        .log_500("Error deleting video")?
    {
        return Err(ApiError::not_found("Video not found"));
    }

    for pointer in [video.thumbnail_url, video.video_url].into_iter().flatten() {
        if let Err(e) = state.storage.delete(&pointer).await {
            tracing::warn!(%video_id, pointer = %pointer, error = %e, "Failed to delete asset of removed video");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/thumbnail_upload/:id - multipart field "thumbnail", JPEG or PNG
async fn upload_thumbnail(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    tracing::info!(%video_id, %user_id, "uploading thumbnail");

    let mut multipart = multipart.log_400("Error parsing thumbnail")?;
    let field = loop {
        match multipart.next_field().await.log_400("Error parsing thumbnail")? {
            Some(field) if field.name() == Some("thumbnail") => break field,
            Some(_) => continue,
            None => return Err(ApiError::bad_request("Unable to form thumbnail")),
        }
    };

    let media_type = field
        .content_type()
        .and_then(media::parse_media_type)
        .ok_or_else(|| ApiError::bad_request("Missing Content-Type for thumbnail"))?;
    if !THUMBNAIL_MEDIA_TYPES.contains(&media_type.as_str()) {
        return Err(ApiError::bad_request("Thumbnail must be a JPEG or PNG image"));
    }

    let data = field.bytes().await.log_400("Error reading thumbnail")?;

    let mut video = load_owned_video(&state, video_id, user_id).await?;

    let key = format!("{}/{}", THUMBNAIL_KEY_PREFIX, media::asset_path(&media_type));
    let pointer = state
        .storage
        .put_bytes(&key, data, &media_type)
        .await
        .log_500("Error saving thumbnail")?;

    let previous = video.thumbnail_url.replace(pointer.clone());
    save_with_new_asset(&state, &video, &pointer, previous).await?;

    Ok(Json(signed_after_upload(&state, video).await?))
}

/// POST /api/video_upload/:id - multipart field "video", MP4 only.
/// The upload is probed for its aspect ratio and remuxed for fast start
/// before it is stored.
async fn upload_video(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, ApiError> {
    let video_id = parse_video_id(&video_id)?;
    tracing::info!(%video_id, %user_id, "uploading video");

    let mut multipart = multipart.log_400("Error parsing video")?;
    let mut field = loop {
        match multipart.next_field().await.log_400("Error parsing video")? {
            Some(field) if field.name() == Some("video") => break field,
            Some(_) => continue,
            None => return Err(ApiError::bad_request("Unable to form video")),
        }
    };

    let media_type = field.content_type().and_then(media::parse_media_type);
    if media_type.as_deref() != Some(VIDEO_MEDIA_TYPE) {
        return Err(ApiError::bad_request("Video must be mp4 filetype"));
    }

    let mut video = load_owned_video(&state, video_id, user_id).await?;

    // Removed with everything in it when this handler returns
    let work_dir = tempfile::Builder::new()
        .prefix("tubely-upload")
        .tempdir()
        .log_500("Error creating temp dir")?;
    let upload_path = work_dir.path().join("upload.mp4");

    let mut file = tokio::fs::File::create(&upload_path)
        .await
        .log_500("Error creating temp file")?;
    let mut written = 0usize;
    while let Some(chunk) = field.chunk().await.log_400("Error reading video")? {
        written += chunk.len();
        file.write_all(&chunk).await.log_500("Error writing temp file")?;
    }
    file.flush().await.log_500("Error writing temp file")?;
    drop(file);
    tracing::debug!(%video_id, bytes = written, "buffered upload");

    let ratio = media::probe_aspect_ratio(&state.media_tools, &upload_path)
        .await
        .log_500("Error reading video aspect ratio")?;
    let processed_path = media::process_for_fast_start(&state.media_tools, &upload_path)
        .await
        .log_500("Error processing video")?;

    let mut key = format!("{}/{}", ratio.key_prefix(), media::random_asset_id());
    if state.storage.local_root().is_some() {
        // Served straight from disk, so keep the extension for content sniffing
        key.push_str(&media::media_type_to_ext(VIDEO_MEDIA_TYPE));
    }

    let pointer = state
        .storage
        .put_file(&key, &processed_path, VIDEO_MEDIA_TYPE)
        .await
        .log_500("Error uploading video")?;
    tracing::info!(%video_id, ratio = ratio.as_str(), %key, "stored video");

    let previous = video.video_url.replace(pointer.clone());
    save_with_new_asset(&state, &video, &pointer, previous).await?;

    Ok(Json(signed_after_upload(&state, video).await?))
}
