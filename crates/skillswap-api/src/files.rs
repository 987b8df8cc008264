use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use skillswap_types::Error;
use skillswap_types::api::{Claims, UploadFileRequest};
use skillswap_types::models::{Role, SharedFile};

use crate::error::ApiResult;
use crate::validation::{
    sanitize_text, validate_description, validate_file_size, validate_file_type,
};
use crate::{AppState, blocking};

/// Upload a file shared with a community: bytes to the object store,
/// metadata row to the database.
pub async fn upload(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UploadFileRequest>,
) -> ApiResult<(StatusCode, Json<SharedFile>)> {
    validate_file_type(&req.file_name)?;
    let description = sanitize_text(&req.description);
    validate_description(&description, 300)?;

    let bytes = B64
        .decode(req.data.as_bytes())
        .map_err(|_| Error::validation("File data is not valid base64"))?;
    validate_file_size(bytes.len())?;

    let file_id = Uuid::new_v4();
    let path = state.storage.object_path(
        &format!("community-files/{community_id}"),
        file_id,
        &req.file_name,
    );

    // Membership and channel checks before any bytes land on disk.
    let db = state.db.clone();
    let cid = community_id.to_string();
    let uploader = claims.sub;
    let channel_id = req.channel_id;
    blocking(move || {
        if db.get_community(&cid)?.is_none() {
            return Ok(Err(Error::NotFound("community")));
        }
        if !db.is_member(&cid, &uploader.to_string())? {
            return Ok(Err(Error::Forbidden));
        }
        if let Some(channel_id) = channel_id {
            match db.get_channel(&channel_id.to_string())? {
                Some(channel) if channel.community_id.to_string() == cid => {}
                _ => return Ok(Err(Error::NotFound("channel"))),
            }
        }
        Ok(Ok(()))
    })
    .await??;

    state
        .storage
        .save(&path, &bytes)
        .await
        .map_err(Error::Backend)?;

    let file = SharedFile {
        id: file_id,
        community_id,
        channel_id: req.channel_id,
        file_name: req.file_name,
        content_type: req.content_type,
        size_bytes: bytes.len() as u64,
        url: state.storage.download_url(file_id),
        uploaded_by: claims.sub,
        description,
        tags: req.tags,
        uploaded_at: Utc::now(),
    };

    let db = state.db.clone();
    let record = file.clone();
    let stored_path = path.clone();
    if let Err(e) = blocking(move || db.insert_file(&record, &stored_path)).await {
        // Metadata failed; don't leave an orphaned object behind.
        let _ = state.storage.delete(&path).await;
        return Err(e);
    }

    Ok((StatusCode::CREATED, Json(file)))
}

#[derive(Debug, Deserialize)]
pub struct FileListQuery {
    pub channel_id: Option<Uuid>,
    pub limit: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    Path(community_id): Path<Uuid>,
    Query(query): Query<FileListQuery>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<Json<Vec<SharedFile>>> {
    let limit = query.limit.unwrap_or(30).min(100);
    let db = state.db.clone();
    let files = blocking(move || {
        db.community_files(
            &community_id.to_string(),
            query.channel_id.map(|id| id.to_string()).as_deref(),
            limit,
        )
    })
    .await?;
    Ok(Json(files))
}

pub async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let (file, storage_path) = blocking(move || db.get_file(&file_id.to_string()))
        .await?
        .ok_or(Error::NotFound("file"))?;

    let bytes = state
        .storage
        .read(&storage_path)
        .await
        .map_err(|_| Error::NotFound("file"))?;

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        bytes,
    ))
}

/// Uploader-or-admin delete: removes the metadata row first, then the
/// stored object.
pub async fn delete(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();
    let storage_path = blocking(move || {
        let Some((file, storage_path)) = db.get_file(&file_id.to_string())? else {
            return Ok(Err(Error::NotFound("file")));
        };
        if file.uploaded_by != claims.sub && claims.role != Role::Admin {
            return Ok(Err(Error::Forbidden));
        }
        db.delete_file(&file_id.to_string())?;
        Ok(Ok(storage_path))
    })
    .await??;

    state
        .storage
        .delete(&storage_path)
        .await
        .map_err(Error::Backend)?;

    Ok(StatusCode::NO_CONTENT)
}
